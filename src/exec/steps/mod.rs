//! One executor per step kind, dispatched from [`super::scheduler`].

mod action;
mod advisory;
mod compute;
mod conditional;
mod emit;
mod halt;
mod loop_step;
mod parallel;
mod pipeline;
mod try_step;
mod wait;

use crate::eval::{evaluate, EvalContext};
use crate::ir::model::{Step, StepKind};
use crate::ir::SpellIr;
use crate::parser::ast::Expr;
use crate::types::{Result, Value};

use super::context::ExecutionContext;
use super::scheduler::RunOutcome;

pub(crate) async fn dispatch(step: &Step, ir: &SpellIr, ctx: &mut ExecutionContext) -> Result<RunOutcome> {
    match &step.kind {
        StepKind::Compute { bindings } => compute::execute(&step.id, bindings, ctx).await,
        StepKind::Conditional {
            cond,
            then_steps,
            else_steps,
        } => conditional::execute(cond, then_steps, else_steps, ir, ctx).await,
        StepKind::Loop { loop_type, body_steps } => loop_step::execute(loop_type, body_steps, ir, ctx).await,
        StepKind::Parallel { join, branches } => parallel::execute(join, branches, ir, ctx).await,
        StepKind::Pipeline { source, stages, binding } => pipeline::execute(source, stages, binding, ctx).await,
        StepKind::Try { body_steps, catches } => try_step::execute(body_steps, catches, ir, ctx).await,
        StepKind::Action {
            venue,
            method,
            args,
            on_failure,
        } => action::execute(&step.id, venue, method, args, on_failure, ctx).await,
        StepKind::Emit { name, payload } => emit::execute(name, payload, ctx).await,
        StepKind::Wait { duration } => wait::execute(duration, ctx).await,
        StepKind::Halt => halt::execute(),
        StepKind::Advisory {
            advisor,
            prompt,
            timeout,
            fallback,
            skills,
            output_schema,
            output_binding,
        } => {
            advisory::execute(
                &step.id,
                advisor.as_deref(),
                prompt,
                timeout,
                fallback,
                skills,
                output_schema.as_ref(),
                output_binding.as_deref(),
                ctx,
            )
            .await
        }
        StepKind::Atomic { body_steps } => {
            let outcome = super::scheduler::execute_steps(body_steps, ir, ctx).await?;
            Ok(outcome)
        }
    }
}

/// Evaluates `expr` against a step executor's running context.
pub(crate) async fn eval_in(expr: &Expr, ctx: &ExecutionContext) -> Result<Value> {
    let invoker = ctx.eval_invoker();
    let eval_ctx = EvalContext::full(
        &ctx.bindings,
        &ctx.params,
        &ctx.state.persistent,
        &ctx.state.ephemeral,
        &ctx.aliases,
        &invoker,
    );
    evaluate(expr, &eval_ctx).await
}
