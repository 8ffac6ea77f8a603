use crate::ir::model::Expression;
use crate::types::Result;

use super::super::context::ExecutionContext;
use super::super::ledger::Event;
use super::super::scheduler::RunOutcome;
use super::eval_in;

pub(crate) async fn execute(
    step_id: &str,
    bindings: &[(Option<String>, Expression)],
    ctx: &mut ExecutionContext,
) -> Result<RunOutcome> {
    for (name, expr) in bindings {
        let value = eval_in(expr, ctx).await?;
        if let Some(name) = name {
            ctx.bindings.insert(name.clone(), value.clone());
            ctx.ledger.append(Event::BindingSet {
                step_id: step_id.to_string(),
                name: name.clone(),
                value,
            });
        }
    }
    Ok(RunOutcome::Completed)
}
