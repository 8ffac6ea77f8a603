use crate::ir::model::Expression;
use crate::types::{Error, Result};

use super::super::context::ExecutionContext;
use super::super::scheduler::RunOutcome;
use super::eval_in;

pub(crate) async fn execute(duration: &Expression, ctx: &mut ExecutionContext) -> Result<RunOutcome> {
    let value = eval_in(duration, ctx).await?;
    let seconds = value
        .as_int()
        .ok_or_else(|| Error::type_error("wait duration must be an integer number of seconds"))?;
    if seconds < 0 {
        return Err(Error::type_error("wait duration must not be negative"));
    }
    let clock = ctx.clock.clone();
    clock.sleep(std::time::Duration::from_secs(seconds as u64)).await;
    Ok(RunOutcome::Completed)
}
