use crate::ir::model::{Expression, OnFailure};
use crate::types::Result;

use super::super::context::ExecutionContext;
use super::super::ledger::Event;
use super::super::scheduler::RunOutcome;
use super::eval_in;

pub(crate) async fn execute(
    step_id: &str,
    venue: &str,
    method: &str,
    args: &[Expression],
    on_failure: &OnFailure,
    ctx: &mut ExecutionContext,
) -> Result<RunOutcome> {
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        values.push(eval_in(arg, ctx).await?);
    }

    let outcome = match on_failure {
        OnFailure::Retry(max) => call_with_retries(venue, method, values, *max, ctx).await,
        OnFailure::Revert => {
            call_adapter(venue, method, values, ctx).await?;
            Ok(RunOutcome::Completed)
        }
        OnFailure::Continue => match call_adapter(venue, method, values, ctx).await {
            Ok(_) => Ok(RunOutcome::Completed),
            Err(e) => {
                ctx.ledger.append(Event::GuardFailed {
                    step_id: step_id.to_string(),
                    message: e.to_string(),
                });
                Ok(RunOutcome::Completed)
            }
        },
    };

    ctx.metrics.record_action();
    if ctx.simulate {
        ctx.ledger.append(Event::ActionSimulated {
            step_id: step_id.to_string(),
            venue: venue.to_string(),
            method: method.to_string(),
        });
    } else {
        ctx.ledger.append(Event::ActionExecuted {
            step_id: step_id.to_string(),
            venue: venue.to_string(),
            method: method.to_string(),
        });
    }
    outcome
}

/// Routes through the adapter's quote/simulate path under `simulate`, the
/// real invocation otherwise — the only place a spell's declared `simulate`
/// mode actually reaches the venue boundary.
async fn call_adapter(
    venue: &str,
    method: &str,
    values: Vec<crate::types::Value>,
    ctx: &ExecutionContext,
) -> Result<crate::types::Value> {
    if ctx.simulate {
        ctx.adapters.invoke_simulated(venue, method, values).await
    } else {
        ctx.adapters.invoke(venue, method, values).await
    }
}

async fn call_with_retries(
    venue: &str,
    method: &str,
    values: Vec<crate::types::Value>,
    max_retries: u32,
    ctx: &mut ExecutionContext,
) -> Result<RunOutcome> {
    let mut attempt = 0;
    loop {
        match call_adapter(venue, method, values.clone(), ctx).await {
            Ok(_) => return Ok(RunOutcome::Completed),
            Err(e) => {
                if attempt >= max_retries {
                    return Err(e);
                }
                ctx.metrics.record_retry();
                let backoff = ctx.config.defaults.retry_backoff_base * 2u32.pow(attempt);
                ctx.clock.sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}
