//! Whole-pipeline scenarios: source text in, `ExecutionResult`/diagnostics
//! out, exercising the compiler and scheduler together rather than any one
//! module in isolation.

use std::sync::Arc;

use grimoire::adapters::{AdapterRegistry, MockAdapter};
use grimoire::compiler::compile_spell;
use grimoire::exec::{self, Event, ExecutionContext, InstantClock};
use grimoire::ir::StepKind;
use grimoire::lexer::{Keyword, Tokenizer};
use grimoire::types::{ChainId, Config, RunId, SpellId};

fn new_context() -> ExecutionContext {
    let mut registry = AdapterRegistry::new();
    registry.register(Arc::new(MockAdapter::new("mock", vec![ChainId::new(1)])));
    ExecutionContext::new(
        RunId::new(),
        SpellId::new(),
        Arc::new(registry),
        Arc::new(InstantClock::default()),
        Config::default(),
    )
}

#[test]
fn minimal_spell_compiles_to_one_compute_step() {
    let src = "spell \"minimal\":\n  on manual:\n    let x = 42\n";
    let result = compile_spell(src);
    assert!(result.success, "{:?}", result.errors);
    let ir = result.ir.unwrap();
    let compute_steps: Vec<_> = ir
        .steps
        .iter()
        .filter(|s| matches!(s.kind, StepKind::Compute { .. }))
        .collect();
    assert_eq!(compute_steps.len(), 1);
}

#[test]
fn duration_literals_scale_to_seconds() {
    let tokens = Tokenizer::new("10s 5m 2h 1d").tokenize().unwrap();
    let numbers: Vec<f64> = tokens
        .iter()
        .filter_map(|t| match t.kind {
            grimoire::lexer::TokenKind::Number(n) => Some(n),
            _ => None,
        })
        .collect();
    assert_eq!(numbers, vec![10.0, 300.0, 7200.0, 86400.0]);
}

#[test]
fn percentage_literals_become_fractions() {
    let tokens = Tokenizer::new("50% 0.5% 100%").tokenize().unwrap();
    let percentages: Vec<f64> = tokens
        .iter()
        .filter_map(|t| match t.kind {
            grimoire::lexer::TokenKind::Percentage(p) => Some(p),
            _ => None,
        })
        .collect();
    assert_eq!(percentages, vec![0.5, 0.005, 1.0]);
}

#[test]
fn keyword_lookup_recognizes_control_flow_words() {
    assert_eq!(Keyword::lookup("if"), Some(Keyword::If));
    assert_eq!(Keyword::lookup("parallel"), Some(Keyword::Parallel));
    assert_eq!(Keyword::lookup("not_a_keyword"), None);
}

#[test]
fn dependency_cycle_is_rejected_by_the_validator() {
    use grimoire::ir::{validate, Severity, SpellIr, Step, TriggerEntry};
    use grimoire::transformer::TriggerSpec;

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
    let ir = SpellIr {
        spell_id: SpellId::new(),
        name: "cyclic".to_string(),
        params: vec![],
        state_persistent: vec![],
        state_ephemeral: vec![],
        guards: vec![],
        aliases: vec![],
        venues: vec![],
        triggers: vec![TriggerEntry {
            trigger: TriggerSpec::Manual,
            top_level: vec!["a".to_string(), "b".to_string()],
        }],
        steps,
    };
    let diagnostics = validate(&ir);
    assert!(diagnostics
        .iter()
        .any(|d| d.code == "DEPENDENCY_CYCLE" && d.severity == Severity::Error));
}

#[tokio::test]
async fn advisory_records_started_event_and_resolves_via_fallback() {
    let src = "spell \"advisory-demo\":\n  on manual:\n    advisory \"should we proceed?\" timeout 30s fallback true\n";
    let result = compile_spell(src);
    assert!(result.success, "{:?}", result.errors);
    let ir = result.ir.unwrap();

    let mut ctx = new_context();
    exec::run(&ir, &mut ctx).await.unwrap();

    let entries = ctx.ledger.entries();
    assert!(entries.iter().any(|e| matches!(e.event, Event::AdvisoryStarted { .. })));
    assert!(entries.iter().any(|e| matches!(e.event, Event::AdvisoryCompleted { .. })));
    assert!(entries.iter().any(|e| matches!(e.event, Event::RunCompleted)));
}

#[tokio::test]
async fn simulate_mode_never_performs_a_real_wall_clock_wait() {
    let src = "spell \"wait-demo\":\n  on manual:\n    wait 3600\n";
    let result = compile_spell(src);
    assert!(result.success, "{:?}", result.errors);
    let ir = result.ir.unwrap();

    let mut ctx = new_context();
    let started = std::time::Instant::now();
    exec::run(&ir, &mut ctx).await.unwrap();
    assert!(started.elapsed() < std::time::Duration::from_millis(500));
}

#[tokio::test]
async fn conditional_inside_a_for_loop_emits_exactly_one_custom_event() {
    let src = "spell \"fan-out\":\n  on manual:\n    let items = [1, 20, 3]\n    for i in items:\n      if i > 10:\n        emit \"big\": {v: i}\n";
    let result = compile_spell(src);
    assert!(result.success, "{:?}", result.errors);
    let ir = result.ir.unwrap();

    let mut ctx = new_context();
    exec::run(&ir, &mut ctx).await.unwrap();

    let custom_events: Vec<_> = ctx
        .ledger
        .entries()
        .into_iter()
        .filter(|e| matches!(e.event, Event::CustomEvent { .. }))
        .collect();
    assert_eq!(custom_events.len(), 1);
    if let Event::CustomEvent { name, payload } = &custom_events[0].event {
        assert_eq!(name, "big");
        assert_eq!(payload.as_str(), None);
    }
}

#[tokio::test]
async fn action_step_runs_against_the_mock_adapter_under_simulation() {
    let src = "spell \"action-demo\":\n  use @mock\n  on manual:\n    action @mock.quote(1)\n";
    let result = compile_spell(src);
    assert!(result.success, "{:?}", result.errors);
    let ir = result.ir.unwrap();

    let mut ctx = new_context();
    exec::run(&ir, &mut ctx).await.unwrap();
    assert_eq!(ctx.metrics.snapshot().steps_executed, ir.steps.len() as u64);
}
