use std::collections::BTreeMap;

use crate::ir::model::Expression;
use crate::parser::ast::OutputSchema;
use crate::types::{Result, Value};

use super::super::context::ExecutionContext;
use super::super::ledger::Event;
use super::super::scheduler::RunOutcome;
use super::eval_in;

/// Advisory steps never actually consult an external advisor here — there's
/// no agent/LLM boundary in this runtime — so execution is the fallback
/// path: the step is recorded on the ledger for observability and its
/// `fallback` expression is evaluated. When an `outputSchema` is declared,
/// the fallback value is coerced to it (spec §6) before being bound to
/// `outputBinding`. A fallback that fails to evaluate is recorded as
/// `AdvisoryFailed` in addition to the generic `step_failed` the scheduler
/// appends.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn execute(
    step_id: &str,
    advisor: Option<&str>,
    prompt: &str,
    _timeout: &Option<Expression>,
    fallback: &Expression,
    skills: &[String],
    output_schema: Option<&OutputSchema>,
    output_binding: Option<&str>,
    ctx: &mut ExecutionContext,
) -> Result<RunOutcome> {
    ctx.ledger.append(Event::AdvisoryStarted {
        step_id: step_id.to_string(),
        prompt: format!("{}{}", advisor.map(|a| format!("@{a} ")).unwrap_or_default(), prompt),
        skills: skills.to_vec(),
    });
    ctx.metrics.record_advisory_call();

    let raw = match eval_in(fallback, ctx).await {
        Ok(v) => v,
        Err(e) => {
            ctx.ledger.append(Event::AdvisoryFailed {
                step_id: step_id.to_string(),
                error_code: e.code().to_string(),
                message: e.to_string(),
            });
            return Err(e);
        }
    };
    let value = match output_schema {
        Some(schema) => coerce(&raw, schema),
        None => raw,
    };

    if let Some(name) = output_binding {
        ctx.bindings.insert(name.to_string(), value.clone());
    }
    ctx.ledger.append(Event::AdvisoryCompleted {
        step_id: step_id.to_string(),
        value,
    });
    Ok(RunOutcome::Completed)
}

/// Coerces a raw advisory value to its declared `outputSchema` (spec §6).
/// Coercion never fails: out-of-schema input degrades to a schema-shaped
/// default (`0` for non-finite numbers, the first enum value for an
/// unrecognized string, `[]`/`{}` for a shape mismatch) rather than
/// aborting the step.
fn coerce(value: &Value, schema: &OutputSchema) -> Value {
    match schema {
        OutputSchema::Boolean => Value::Bool(value.is_truthy()),
        OutputSchema::Number => {
            let f = match value {
                Value::Int(i) => *i as f64,
                Value::Float(f) => *f,
                Value::String(s) => s.parse::<f64>().unwrap_or(0.0),
                _ => 0.0,
            };
            Value::Float(if f.is_finite() { f } else { 0.0 })
        }
        OutputSchema::String => match value {
            Value::String(s) => Value::String(s.clone()),
            other => Value::String(other.to_string()),
        },
        OutputSchema::Enum(variants) => {
            let s = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            if variants.iter().any(|v| v == &s) {
                Value::String(s)
            } else if let Some(first) = variants.first() {
                Value::String(first.clone())
            } else {
                value.clone()
            }
        }
        OutputSchema::Object(fields) => {
            let empty = BTreeMap::new();
            let source = match value {
                Value::Object(map) => map,
                _ => &empty,
            };
            let mut out = BTreeMap::new();
            for (name, field_schema) in fields {
                let raw = source.get(name).cloned().unwrap_or(Value::Null);
                out.insert(name.clone(), coerce(&raw, field_schema));
            }
            Value::Object(out)
        }
        OutputSchema::Array(item_schema) => match value {
            Value::Array(items) => Value::Array(items.iter().map(|i| coerce(i, item_schema)).collect()),
            _ => Value::Array(Vec::new()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerces_numeric_string_to_number() {
        assert_eq!(coerce(&Value::String("42".to_string()), &OutputSchema::Number), Value::Float(42.0));
    }

    #[test]
    fn non_finite_number_degrades_to_zero() {
        assert_eq!(coerce(&Value::String("not a number".to_string()), &OutputSchema::Number), Value::Float(0.0));
    }

    #[test]
    fn enum_value_outside_declared_set_falls_back_to_first_variant() {
        let schema = OutputSchema::Enum(vec!["yes".to_string(), "no".to_string()]);
        assert_eq!(coerce(&Value::String("maybe".to_string()), &schema), Value::String("yes".to_string()));
    }

    #[test]
    fn boolean_coercion_follows_truthiness() {
        assert_eq!(coerce(&Value::Int(0), &OutputSchema::Boolean), Value::Bool(false));
        assert_eq!(coerce(&Value::Int(5), &OutputSchema::Boolean), Value::Bool(true));
    }

    #[test]
    fn non_array_coerces_to_empty_array() {
        assert_eq!(
            coerce(&Value::Null, &OutputSchema::Array(Box::new(OutputSchema::Number))),
            Value::Array(vec![])
        );
    }
}
