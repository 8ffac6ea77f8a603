use crate::ir::SpellIr;
use crate::parser::ast::Expr;
use crate::types::Result;

use super::super::context::ExecutionContext;
use super::super::scheduler::{execute_steps, RunOutcome};
use super::eval_in;

pub(crate) async fn execute(
    cond: &Expr,
    then_steps: &[String],
    else_steps: &[String],
    ir: &SpellIr,
    ctx: &mut ExecutionContext,
) -> Result<RunOutcome> {
    let value = eval_in(cond, ctx).await?;
    if value.is_truthy() {
        execute_steps(then_steps, ir, ctx).await
    } else {
        execute_steps(else_steps, ir, ctx).await
    }
}
