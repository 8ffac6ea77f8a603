use std::collections::BTreeMap;

use crate::ir::model::CatchIr;
use crate::ir::SpellIr;
use crate::types::{Result, Value};

use super::super::context::ExecutionContext;
use super::super::scheduler::{execute_steps, RunOutcome};

pub(crate) async fn execute(
    body_steps: &[String],
    catches: &[CatchIr],
    ir: &SpellIr,
    ctx: &mut ExecutionContext,
) -> Result<RunOutcome> {
    match execute_steps(body_steps, ir, ctx).await {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            let matching = catches
                .iter()
                .find(|c| matches!(&c.pattern, Some(p) if p == e.code()))
                .or_else(|| catches.iter().find(|c| c.pattern.is_none()));

            match matching {
                Some(catch) => {
                    let mut error = BTreeMap::new();
                    error.insert("code".to_string(), Value::String(e.code().to_string()));
                    error.insert("message".to_string(), Value::String(e.to_string()));
                    ctx.bindings.insert("error".to_string(), Value::Object(error));
                    execute_steps(&catch.body_steps, ir, ctx).await
                }
                None => Err(e),
            }
        }
    }
}
