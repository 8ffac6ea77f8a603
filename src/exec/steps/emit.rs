use crate::ir::model::Expression;
use crate::types::Result;

use super::super::context::ExecutionContext;
use super::super::ledger::Event;
use super::super::scheduler::RunOutcome;
use super::eval_in;

pub(crate) async fn execute(name: &str, payload: &Expression, ctx: &mut ExecutionContext) -> Result<RunOutcome> {
    let value = eval_in(payload, ctx).await?;
    ctx.ledger.append(Event::CustomEvent {
        name: name.to_string(),
        payload: value,
    });
    Ok(RunOutcome::Completed)
}
