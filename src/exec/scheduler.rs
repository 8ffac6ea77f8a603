//! Drives a validated spell's top-level steps to completion.
//!
//! Nested steps (a conditional's `then`/`else`, a loop's body, a parallel
//! branch, a try block) are not scheduled independently — they're driven by
//! their parent step's executor, which calls back into [`execute_steps`].
//! That makes scheduler ↔ step-executor mutually recursive, so both entry
//! points are boxed the same way `eval::expression::evaluate` is.

use futures::future::BoxFuture;

use crate::eval::{evaluate, EvalContext};
use crate::ir::SpellIr;
use crate::parser::ast::GuardSeverity;
use crate::types::{Error, Result};

use super::context::ExecutionContext;
use super::ledger::Event;
use super::steps;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Halted,
}

/// Runs a whole spell: the manual handler's top-level steps if one is
/// declared, otherwise the first handler's — in source order.
pub async fn run(ir: &SpellIr, ctx: &mut ExecutionContext) -> Result<RunOutcome> {
    ctx.ledger.append(Event::RunStarted {
        spell_name: ir.name.clone(),
    });
    let top_level: &[String] = match ir.default_trigger() {
        Some(entry) => &entry.top_level,
        None => &[],
    };
    let outcome = execute_steps(top_level, ir, ctx).await;
    match &outcome {
        Ok(_) => {
            ctx.ledger.append(Event::RunCompleted);
        }
        Err(e) => {
            ctx.ledger.append(Event::RunFailed {
                error_code: e.code().to_string(),
                message: e.to_string(),
            });
        }
    }
    outcome
}

/// Evaluates every declared guard after a step completes. A failing
/// `error`-severity guard aborts the run; `warn`/`info` guards only log.
async fn check_guards(ir: &SpellIr, ctx: &ExecutionContext) -> Result<()> {
    for guard in &ir.guards {
        let eval_ctx = EvalContext::full(
            &ctx.bindings,
            &ctx.params,
            &ctx.state.persistent,
            &ctx.state.ephemeral,
            &ctx.aliases,
            &ctx.eval_invoker(),
        );
        let value = evaluate(&guard.check, &eval_ctx).await?;
        if value.is_truthy() {
            continue;
        }
        ctx.ledger.append(Event::GuardFailed {
            step_id: guard.id.clone(),
            message: guard.message.clone(),
        });
        if guard.severity == GuardSeverity::Error {
            return Err(Error::GuardFailed(guard.message.clone()));
        }
    }
    Ok(())
}

/// Executes `ids` in order, stopping early on `halt` or the first error.
pub fn execute_steps<'a>(
    ids: &'a [String],
    ir: &'a SpellIr,
    ctx: &'a mut ExecutionContext,
) -> BoxFuture<'a, Result<RunOutcome>> {
    Box::pin(async move {
        for id in ids {
            match execute_step_by_id(id, ir, ctx).await? {
                RunOutcome::Halted => return Ok(RunOutcome::Halted),
                RunOutcome::Completed => {}
            }
        }
        Ok(RunOutcome::Completed)
    })
}

pub fn execute_step_by_id<'a>(
    id: &'a str,
    ir: &'a SpellIr,
    ctx: &'a mut ExecutionContext,
) -> BoxFuture<'a, Result<RunOutcome>> {
    Box::pin(async move {
        ctx.check_cancelled()?;
        let step = ir.step(id).ok_or_else(|| Error::unknown_step_reference(id))?;
        ctx.ledger.append(Event::StepStarted {
            step_id: step.id.clone(),
            kind: step.kind.label().to_string(),
        });
        ctx.metrics.record_step();

        let result = steps::dispatch(step, ir, ctx).await;

        let result = match result {
            Ok(outcome) => {
                ctx.ledger.append(Event::StepCompleted {
                    step_id: step.id.clone(),
                });
                check_guards(ir, ctx).await.map(|_| outcome)
            }
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            ctx.metrics.record_failure();
            ctx.metrics.record_error();
            ctx.ledger.append(Event::StepFailed {
                step_id: step.id.clone(),
                error_code: e.code().to_string(),
                message: e.to_string(),
            });
        }
        result
    })
}
