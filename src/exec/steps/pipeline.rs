use crate::eval::{evaluate, EvalContext};
use crate::ir::model::{Expression, PipelineStageIr, SortDir};
use crate::types::{Error, Result, Value};

use super::super::context::ExecutionContext;
use super::super::scheduler::RunOutcome;
use super::eval_in;

/// Evaluates `source` (must be an array), applies each stage in order, and
/// binds the final array to `binding` if one was named.
pub(crate) async fn execute(
    source: &Expression,
    stages: &[PipelineStageIr],
    binding: &Option<String>,
    ctx: &mut ExecutionContext,
) -> Result<RunOutcome> {
    let source_value = eval_in(source, ctx).await?;
    let mut items = source_value
        .as_array()
        .ok_or_else(|| Error::type_error("pipeline source must be an array"))?
        .to_vec();

    for stage in stages {
        items = apply_stage(items, stage, ctx).await?;
    }

    if let Some(name) = binding {
        ctx.bindings.insert(name.clone(), Value::Array(items));
    }
    Ok(RunOutcome::Completed)
}

async fn apply_stage(items: Vec<Value>, stage: &PipelineStageIr, ctx: &ExecutionContext) -> Result<Vec<Value>> {
    match stage {
        PipelineStageIr::Where(pred) => {
            let mut kept = Vec::with_capacity(items.len());
            for (index, item) in items.into_iter().enumerate() {
                let keep = eval_with_item(pred, &item, index, ctx).await?;
                if keep.is_truthy() {
                    kept.push(item);
                }
            }
            Ok(kept)
        }
        PipelineStageIr::Map(expr) => {
            let mut mapped = Vec::with_capacity(items.len());
            for (index, item) in items.into_iter().enumerate() {
                mapped.push(eval_with_item(expr, &item, index, ctx).await?);
            }
            Ok(mapped)
        }
        PipelineStageIr::Sort(by, dir) => {
            let mut scored = Vec::with_capacity(items.len());
            for (index, item) in items.into_iter().enumerate() {
                let key = eval_with_item(by, &item, index, ctx).await?;
                scored.push((key, item));
            }
            scored.sort_by(|(a, _), (b, _)| sort_key(a, b));
            if *dir == SortDir::Desc {
                scored.reverse();
            }
            Ok(scored.into_iter().map(|(_, item)| item).collect())
        }
        PipelineStageIr::Take(n) => Ok(items.into_iter().take(*n).collect()),
        PipelineStageIr::Skip(n) => Ok(items.into_iter().skip(*n).collect()),
    }
}

async fn eval_with_item(expr: &Expression, item: &Value, index: usize, ctx: &ExecutionContext) -> Result<Value> {
    let mut bindings = ctx.bindings.clone();
    bindings.insert("item".to_string(), item.clone());
    bindings.insert("index".to_string(), Value::Int(index as i64));
    let invoker = ctx.eval_invoker();
    let eval_ctx = EvalContext::full(
        &bindings,
        &ctx.params,
        &ctx.state.persistent,
        &ctx.state.ephemeral,
        &ctx.aliases,
        &invoker,
    );
    evaluate(expr, &eval_ctx).await
}

fn sort_key(a: &Value, b: &Value) -> std::cmp::Ordering {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Amount(x), Value::Amount(y)) => x.cmp(y),
        _ => std::cmp::Ordering::Equal,
    }
}
