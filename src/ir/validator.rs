//! Structural and semantic validation of a generated `SpellIr`.
//!
//! Cycle detection is Kahn's algorithm over the `dependsOn` edges of the
//! top-level step list (nested step ids referenced from `then_steps` /
//! `body_steps` / branch lists are validated for existence but are not part
//! of the top-level dependency graph — they execute under their parent's
//! control-flow step, not via `dependsOn`).

use std::collections::{HashMap, HashSet, VecDeque};

use crate::ir::model::{SpellIr, Step, StepKind};
use crate::parser::ast::Expr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: &'static str,
    pub message: String,
    pub step_id: Option<String>,
}

impl Diagnostic {
    fn error(code: &'static str, message: impl Into<String>, step_id: Option<&str>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
            step_id: step_id.map(str::to_string),
        }
    }

    fn warning(code: &'static str, message: impl Into<String>, step_id: Option<&str>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
            step_id: step_id.map(str::to_string),
        }
    }
}

/// Assets Grimoire recognizes without a live venue registry; anything else
/// in an `asset: "..."` literal triggers `UNKNOWN_ASSET` as a warning, not
/// a hard failure, since a custom venue may legitimately mint its own tag.
const KNOWN_ASSETS: &[&str] = &["ETH", "WETH", "USDC", "USDT", "DAI", "WBTC"];

pub fn validate(ir: &SpellIr) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    if ir.steps.is_empty() {
        diagnostics.push(Diagnostic::warning(
            "NO_STEPS",
            "spell has no steps",
            None,
        ));
        return diagnostics;
    }

    let all_ids: HashSet<&str> = all_step_ids(&ir.steps).into_iter().collect();

    for step in &ir.steps {
        for dep in &step.depends_on {
            if !all_ids.contains(dep.as_str()) {
                diagnostics.push(Diagnostic::error(
                    "UNKNOWN_STEP_REFERENCE",
                    format!("step {} depends on unknown step {}", step.id, dep),
                    Some(&step.id),
                ));
            }
        }
        let mut nested = Vec::new();
        collect_nested_refs(step, &mut nested);
        for r in nested {
            if !all_ids.contains(r) {
                diagnostics.push(Diagnostic::error(
                    "UNKNOWN_STEP_REFERENCE",
                    format!("step {} references unknown nested step {}", step.id, r),
                    Some(&step.id),
                ));
            }
        }
        validate_step_kind(step, &ir.venues, &mut diagnostics);
    }

    for entry in &ir.triggers {
        for id in &entry.top_level {
            if !all_ids.contains(id.as_str()) {
                diagnostics.push(Diagnostic::error(
                    "UNKNOWN_STEP_REFERENCE",
                    format!("trigger top level references unknown step {id}"),
                    None,
                ));
            }
        }
    }

    diagnostics.extend(detect_cycles(&ir.steps));
    diagnostics
}

fn all_step_ids(steps: &[Step]) -> Vec<&str> {
    steps.iter().map(|s| s.id.as_str()).collect()
}

/// Gathers the step ids a control-flow step references in its nested
/// branches (`then_steps`/`body_steps`/branch lists/catch bodies) so they
/// can be checked for existence the same way `depends_on` edges are.
fn collect_nested_refs<'a>(step: &'a Step, out: &mut Vec<&'a str>) {
    match &step.kind {
        StepKind::Conditional { then_steps, else_steps, .. } => {
            out.extend(then_steps.iter().map(String::as_str));
            out.extend(else_steps.iter().map(String::as_str));
        }
        StepKind::Loop { body_steps, .. } => out.extend(body_steps.iter().map(String::as_str)),
        StepKind::Parallel { branches, .. } => {
            for branch in branches {
                out.extend(branch.iter().map(String::as_str));
            }
        }
        StepKind::Try { body_steps, catches } => {
            out.extend(body_steps.iter().map(String::as_str));
            for catch in catches {
                out.extend(catch.body_steps.iter().map(String::as_str));
            }
        }
        StepKind::Atomic { body_steps } => out.extend(body_steps.iter().map(String::as_str)),
        _ => {}
    }
}

fn validate_step_kind(step: &Step, venues: &[String], out: &mut Vec<Diagnostic>) {
    match &step.kind {
        StepKind::Advisory {
            timeout, skills, ..
        } => {
            if timeout.is_none() {
                out.push(Diagnostic::error(
                    "ADVISORY_NO_TIMEOUT",
                    format!("advisory step {} declares no timeout", step.id),
                    Some(&step.id),
                ));
            }
            for skill in skills {
                if !venues.iter().any(|v| v == skill) {
                    out.push(Diagnostic::error(
                        "UNKNOWN_ADVISOR",
                        format!("advisory step {} references unknown advisor @{}", step.id, skill),
                        Some(&step.id),
                    ));
                }
            }
        }
        StepKind::Action { venue, args, .. } => {
            if !venues.iter().any(|v| v == venue) {
                out.push(Diagnostic::warning(
                    "AUTO_VENUE",
                    format!(
                        "action step {} targets @{} which was not declared with `use`",
                        step.id, venue
                    ),
                    Some(&step.id),
                ));
            }
            for arg in args {
                check_unknown_assets(arg, &step.id, out);
            }
        }
        StepKind::Compute { bindings } => {
            for (_, expr) in bindings {
                check_unknown_assets(expr, &step.id, out);
            }
        }
        _ => {}
    }
}

fn check_unknown_assets(expr: &Expr, step_id: &str, out: &mut Vec<Diagnostic>) {
    if let Expr::Object(fields) = expr {
        for (key, value) in fields {
            if key == "asset" {
                if let Expr::String(tag) = value {
                    if !KNOWN_ASSETS.contains(&tag.as_str()) {
                        out.push(Diagnostic::warning(
                            "UNKNOWN_ASSET",
                            format!("unrecognized asset tag {tag:?} in step {step_id}"),
                            Some(step_id),
                        ));
                    }
                }
            }
        }
    }
}

/// Kahn's algorithm: repeatedly remove steps with in-degree zero. Anything
/// left over once no more steps can be removed is part of (or depends on)
/// a cycle.
fn detect_cycles(steps: &[Step]) -> Vec<Diagnostic> {
    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    let ids: HashSet<&str> = steps.iter().map(|s| s.id.as_str()).collect();

    for step in steps {
        in_degree.entry(step.id.as_str()).or_insert(0);
        for dep in &step.depends_on {
            if ids.contains(dep.as_str()) {
                *in_degree.entry(step.id.as_str()).or_insert(0) += 1;
                dependents.entry(dep.as_str()).or_default().push(step.id.as_str());
            }
        }
    }

    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, &d)| d == 0)
        .map(|(&id, _)| id)
        .collect();
    let mut visited = 0;

    while let Some(id) = queue.pop_front() {
        visited += 1;
        if let Some(next) = dependents.get(id) {
            for &n in next {
                let d = in_degree.get_mut(n).unwrap();
                *d -= 1;
                if *d == 0 {
                    queue.push_back(n);
                }
            }
        }
    }

    if visited == steps.len() {
        return Vec::new();
    }

    in_degree
        .into_iter()
        .filter(|(_, d)| *d > 0)
        .map(|(id, _)| Diagnostic::error("DEPENDENCY_CYCLE", format!("step {id} is part of a dependency cycle"), Some(id)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::model::{SpellIr, Step, StepKind, TriggerEntry};
    use crate::transformer::TriggerSpec;
    use crate::types::SpellId;

    fn ir_with_steps(steps: Vec<Step>) -> SpellIr {
        let top_level = steps.iter().map(|s| s.id.clone()).collect();
        SpellIr {
            spell_id: SpellId::new(),
            name: "t".to_string(),
            params: vec![],
            state_persistent: vec![],
            state_ephemeral: vec![],
            guards: vec![],
            aliases: vec![],
            venues: vec![],
            triggers: vec![TriggerEntry {
                trigger: TriggerSpec::Manual,
                top_level,
            }],
            steps,
        }
    }

    #[test]
    fn detects_simple_cycle() {
        let steps = vec![
            Step {
                id: "a".to_string(),
                kind: StepKind::Halt,
                depends_on: vec!["b".to_string()],
            },
            Step {
                id: "b".to_string(),
                kind: StepKind::Halt,
                depends_on: vec!["a".to_string()],
            },
        ];
        let diags = validate(&ir_with_steps(steps));
        assert!(diags.iter().any(|d| d.code == "DEPENDENCY_CYCLE"));
    }

    #[test]
    fn flags_unknown_step_reference() {
        let steps = vec![Step {
            id: "a".to_string(),
            kind: StepKind::Halt,
            depends_on: vec!["ghost".to_string()],
        }];
        let diags = validate(&ir_with_steps(steps));
        assert!(diags.iter().any(|d| d.code == "UNKNOWN_STEP_REFERENCE"));
    }

    #[test]
    fn empty_spell_is_a_warning_not_an_error() {
        let diags = validate(&ir_with_steps(vec![]));
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, Severity::Warning);
    }
}
