//! Owns the mutable state a run threads through its steps: bindings,
//! metrics, the ledger, and the venue/clock collaborators steps call out
//! to. Mirrors the owned-subsystem-struct shape this problem family uses
//! for its top-level actor, minus the actor — there's no message loop,
//! just a struct the scheduler drives directly.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;

use crate::adapters::AdapterRegistry;
use crate::eval::VenueInvoker;
use crate::parser::ast::AliasDef;
use crate::types::{Config, Result, RunId, SpellId, Value};

use super::ledger::InMemoryLedger;

/// Injectable source of "now" and "sleep", so `wait` steps never need a
/// real wall-clock pause in tests.
pub trait Clock: Send + Sync {
    fn sleep<'a>(&'a self, duration: Duration) -> BoxFuture<'a, ()>;
}

pub struct RealClock;

impl Clock for RealClock {
    fn sleep<'a>(&'a self, duration: Duration) -> BoxFuture<'a, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// A clock that resolves instantly, recording how long it was asked to
/// wait — the default under `simulate` and in tests.
#[derive(Default)]
pub struct InstantClock {
    pub total_waited: std::sync::Mutex<Duration>,
}

impl Clock for InstantClock {
    fn sleep<'a>(&'a self, duration: Duration) -> BoxFuture<'a, ()> {
        *self.total_waited.lock().expect("clock mutex poisoned") += duration;
        Box::pin(async {})
    }
}

#[derive(Debug, Default, Clone)]
pub struct Metrics {
    pub steps_executed: u64,
    pub steps_failed: u64,
    pub actions_retried: u64,
    pub actions_executed: u64,
    pub advisory_calls: u64,
    pub errors: u64,
    pub gas_used: u64,
}

/// The persistent/ephemeral state variables a run carries, seeded from the
/// spell's `state:` declarations and mutated as `persistent(name)`/
/// `ephemeral(name)` bindings are written during execution.
#[derive(Debug, Default, Clone)]
pub struct StateScope {
    pub persistent: HashMap<String, Value>,
    pub ephemeral: HashMap<String, Value>,
}

pub struct ExecutionContext {
    pub run_id: RunId,
    pub spell_id: SpellId,
    pub bindings: HashMap<String, Value>,
    pub params: HashMap<String, Value>,
    pub state: StateScope,
    pub aliases: HashMap<String, AliasDef>,
    pub ledger: Arc<InMemoryLedger>,
    pub adapters: Arc<AdapterRegistry>,
    pub clock: Arc<dyn Clock>,
    pub config: Config,
    pub metrics: Arc<MetricsCell>,
    /// When true, `action` steps never reach a live venue — they resolve
    /// through the adapter's quote/simulate path and the real effect
    /// (`action_executed`) never fires.
    pub simulate: bool,
    cancel: Arc<AtomicBool>,
}

#[derive(Default)]
pub struct MetricsCell {
    steps_executed: AtomicU64,
    steps_failed: AtomicU64,
    actions_retried: AtomicU64,
    actions_executed: AtomicU64,
    advisory_calls: AtomicU64,
    errors: AtomicU64,
    gas_used: AtomicU64,
}

impl MetricsCell {
    pub fn record_step(&self) {
        self.steps_executed.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.steps_failed.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.actions_retried.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub fn record_action(&self) {
        self.actions_executed.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub fn record_advisory_call(&self) {
        self.advisory_calls.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub fn record_gas(&self, amount: u64) {
        self.gas_used.fetch_add(amount, AtomicOrdering::Relaxed);
    }

    pub fn snapshot(&self) -> Metrics {
        Metrics {
            steps_executed: self.steps_executed.load(AtomicOrdering::Relaxed),
            steps_failed: self.steps_failed.load(AtomicOrdering::Relaxed),
            actions_retried: self.actions_retried.load(AtomicOrdering::Relaxed),
            actions_executed: self.actions_executed.load(AtomicOrdering::Relaxed),
            advisory_calls: self.advisory_calls.load(AtomicOrdering::Relaxed),
            errors: self.errors.load(AtomicOrdering::Relaxed),
            gas_used: self.gas_used.load(AtomicOrdering::Relaxed),
        }
    }
}

impl ExecutionContext {
    pub fn new(
        run_id: RunId,
        spell_id: SpellId,
        adapters: Arc<AdapterRegistry>,
        clock: Arc<dyn Clock>,
        config: Config,
    ) -> Self {
        Self {
            run_id,
            spell_id,
            bindings: HashMap::new(),
            params: HashMap::new(),
            state: StateScope::default(),
            aliases: HashMap::new(),
            ledger: Arc::new(InMemoryLedger::new()),
            adapters,
            clock,
            config,
            metrics: Arc::new(MetricsCell::default()),
            simulate: true,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// An isolated copy sharing the ledger/adapters/clock/metrics/cancel
    /// signal but with its own binding scope — used to run `parallel`
    /// branches without them clobbering each other's bindings before the
    /// join policy picks a winner.
    pub fn fork_scope(&self) -> Self {
        Self {
            run_id: self.run_id.clone(),
            spell_id: self.spell_id.clone(),
            bindings: self.bindings.clone(),
            params: self.params.clone(),
            state: self.state.clone(),
            aliases: self.aliases.clone(),
            ledger: Arc::clone(&self.ledger),
            adapters: Arc::clone(&self.adapters),
            clock: Arc::clone(&self.clock),
            config: self.config.clone(),
            metrics: Arc::clone(&self.metrics),
            simulate: self.simulate,
            cancel: Arc::clone(&self.cancel),
        }
    }

    pub fn merge_scope(&mut self, other: ExecutionContext) {
        self.bindings.extend(other.bindings);
        self.state.persistent.extend(other.state.persistent);
        self.state.ephemeral.extend(other.state.ephemeral);
    }

    pub fn eval_invoker(&self) -> ContextInvoker<'_> {
        ContextInvoker { adapters: &self.adapters }
    }

    /// Requests cancellation; checked by the scheduler between steps and by
    /// long-running loop/pipeline bodies.
    pub fn request_cancel(&self) {
        self.cancel.store(true, AtomicOrdering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(AtomicOrdering::Relaxed)
    }

    pub fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(crate::types::Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Adapts [`ExecutionContext`]'s adapter registry to `eval`'s
/// venue-invocation trait without `eval` depending on `adapters`.
pub struct ContextInvoker<'a> {
    adapters: &'a AdapterRegistry,
}

impl<'a> VenueInvoker for ContextInvoker<'a> {
    fn invoke<'b>(&'b self, venue: &'b str, method: &'b str, args: Vec<Value>) -> BoxFuture<'b, Result<Value>> {
        Box::pin(self.adapters.invoke(venue, method, args))
    }
}
