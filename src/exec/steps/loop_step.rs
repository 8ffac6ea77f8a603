use crate::ir::model::LoopType;
use crate::types::{Error, Result};
use crate::ir::SpellIr;

use super::super::context::ExecutionContext;
use super::super::scheduler::{execute_steps, RunOutcome};
use super::eval_in;

pub(crate) async fn execute(
    loop_type: &LoopType,
    body_steps: &[String],
    ir: &SpellIr,
    ctx: &mut ExecutionContext,
) -> Result<RunOutcome> {
    let max_iterations = ctx.config.defaults.max_loop_iterations as u64;

    match loop_type {
        LoopType::For { var, iter } => {
            let iterable = eval_in(iter, ctx).await?;
            let items = iterable
                .as_array()
                .ok_or_else(|| Error::type_error("for loop source must be an array"))?
                .to_vec();
            for item in items {
                ctx.bindings.insert(var.clone(), item);
                if let RunOutcome::Halted = execute_steps(body_steps, ir, ctx).await? {
                    return Ok(RunOutcome::Halted);
                }
            }
            Ok(RunOutcome::Completed)
        }
        LoopType::Repeat { count } => {
            let count_value = eval_in(count, ctx).await?;
            let count = count_value
                .as_int()
                .ok_or_else(|| Error::type_error("repeat count must be an integer"))?;
            if count < 0 {
                return Err(Error::type_error("repeat count must not be negative"));
            }
            for _ in 0..count as u64 {
                if let RunOutcome::Halted = execute_steps(body_steps, ir, ctx).await? {
                    return Ok(RunOutcome::Halted);
                }
            }
            Ok(RunOutcome::Completed)
        }
        LoopType::Until { cond } => {
            let mut iterations: u64 = 0;
            loop {
                if let RunOutcome::Halted = execute_steps(body_steps, ir, ctx).await? {
                    return Ok(RunOutcome::Halted);
                }
                iterations += 1;
                let done = eval_in(cond, ctx).await?;
                if done.is_truthy() {
                    return Ok(RunOutcome::Completed);
                }
                if iterations >= max_iterations {
                    return Err(Error::type_error(format!(
                        "until loop exceeded max_loop_iterations ({max_iterations})"
                    )));
                }
            }
        }
    }
}
