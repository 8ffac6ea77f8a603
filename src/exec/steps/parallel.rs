use futures::future::join_all;

use crate::eval::{evaluate, EvalContext};
use crate::ir::model::{Expression, JoinPolicy, SortDir};
use crate::ir::SpellIr;
use crate::types::{Error, Result, Value};

use super::super::context::ExecutionContext;
use super::super::scheduler::{execute_steps, RunOutcome};

/// Runs every branch against its own forked binding scope, then merges the
/// winner(s) back into the parent scope according to `join`.
///
/// Branches run concurrently to completion regardless of policy — `first`
/// and `any(n)` don't cancel the remaining branches early, they just pick
/// among whichever branches succeeded once everything has finished. A
/// speculative-cancellation scheduler is out of scope here.
pub(crate) async fn execute(
    join: &JoinPolicy,
    branches: &[Vec<String>],
    ir: &SpellIr,
    ctx: &mut ExecutionContext,
) -> Result<RunOutcome> {
    let tasks = branches.iter().map(|branch| {
        let mut forked = ctx.fork_scope();
        async move {
            let outcome = execute_steps(branch, ir, &mut forked).await;
            (outcome, forked)
        }
    });
    let results = join_all(tasks).await;

    let mut successes: Vec<ExecutionContext> = Vec::new();
    let mut first_err: Option<Error> = None;
    for (outcome, forked) in results {
        match outcome {
            Ok(_) => successes.push(forked),
            Err(e) => {
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
    }

    match join {
        JoinPolicy::All => {
            if let Some(e) = first_err {
                return Err(e);
            }
            for branch_ctx in successes {
                ctx.merge_scope(branch_ctx);
            }
            Ok(RunOutcome::Completed)
        }
        JoinPolicy::First => {
            let winner = successes
                .into_iter()
                .next()
                .ok_or_else(|| first_err.unwrap_or_else(|| Error::type_error("no parallel branch succeeded")))?;
            ctx.merge_scope(winner);
            Ok(RunOutcome::Completed)
        }
        JoinPolicy::Any(n) => {
            if successes.len() < *n {
                return Err(first_err.unwrap_or_else(|| {
                    Error::type_error(format!("fewer than {n} parallel branches succeeded"))
                }));
            }
            for branch_ctx in successes.into_iter().take(*n) {
                ctx.merge_scope(branch_ctx);
            }
            Ok(RunOutcome::Completed)
        }
        JoinPolicy::Majority => {
            if successes.len() * 2 <= branches.len() {
                return Err(first_err.unwrap_or_else(|| Error::type_error("no majority of parallel branches succeeded")));
            }
            for branch_ctx in successes {
                ctx.merge_scope(branch_ctx);
            }
            Ok(RunOutcome::Completed)
        }
        JoinPolicy::Best(expr, dir) => {
            if successes.is_empty() {
                return Err(first_err.unwrap_or_else(|| Error::type_error("no parallel branch succeeded")));
            }
            let winner = pick_best(successes, expr, *dir).await?;
            ctx.merge_scope(winner);
            Ok(RunOutcome::Completed)
        }
    }
}

async fn pick_best(
    candidates: Vec<ExecutionContext>,
    expr: &Expression,
    dir: SortDir,
) -> Result<ExecutionContext> {
    let mut scored = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let invoker = candidate.eval_invoker();
        let eval_ctx = EvalContext::full(
            &candidate.bindings,
            &candidate.params,
            &candidate.state.persistent,
            &candidate.state.ephemeral,
            &candidate.aliases,
            &invoker,
        );
        let score = evaluate(expr, &eval_ctx).await?;
        scored.push((score, candidate));
    }
    let mut best_index = 0;
    for i in 1..scored.len() {
        let better = match dir {
            SortDir::Desc => score_ordering(&scored[i].0, &scored[best_index].0)? == std::cmp::Ordering::Greater,
            SortDir::Asc => score_ordering(&scored[i].0, &scored[best_index].0)? == std::cmp::Ordering::Less,
        };
        if better {
            best_index = i;
        }
    }
    Ok(scored.into_iter().nth(best_index).unwrap().1)
}

fn score_ordering(a: &Value, b: &Value) -> Result<std::cmp::Ordering> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(x.cmp(y)),
        (Value::Float(x), Value::Float(y)) => x
            .partial_cmp(y)
            .ok_or_else(|| Error::type_error("best() expression produced NaN")),
        (Value::Amount(x), Value::Amount(y)) => Ok(x.cmp(y)),
        _ => match (as_f64(a), as_f64(b)) {
            (Some(x), Some(y)) => x
                .partial_cmp(&y)
                .ok_or_else(|| Error::type_error("best() expression produced NaN")),
            _ => Err(Error::type_error("best() expression must be numeric")),
        },
    }
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}
