//! Run-state persistence.
//!
//! An `async_trait` interface in the same shape as this problem family's
//! usual pluggable-backend persistence traits: a default in-memory
//! implementation ships in-crate for `simulate`/tests, with real backends
//! (file, database) implementable out of tree. Keyed by `spellId` — a run
//! always reads/writes against its own spell's persistent state and run
//! history, never another spell's.

mod memory;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::exec::LedgerEntry;
use crate::types::{Result, RunId, SpellId, Value};

pub use memory::InMemoryStateStore;

/// Metrics snapshot attached to a completed run (spec §6). `gas_used` is
/// serialized as a decimal string to avoid precision loss across the JSON
/// boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetrics {
    pub steps_executed: u64,
    pub steps_failed: u64,
    pub actions_retried: u64,
    pub actions_executed: u64,
    pub advisory_calls: u64,
    pub errors: u64,
    pub gas_used: String,
}

impl From<crate::exec::Metrics> for RunMetrics {
    fn from(m: crate::exec::Metrics) -> Self {
        Self {
            steps_executed: m.steps_executed,
            steps_failed: m.steps_failed,
            actions_retried: m.actions_retried,
            actions_executed: m.actions_executed,
            advisory_calls: m.advisory_calls,
            errors: m.errors,
            gas_used: m.gas_used.to_string(),
        }
    }
}

/// A persisted run record: `{runId, timestamp, success, error?, duration,
/// metrics, finalState}` (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: RunId,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
    pub metrics: RunMetrics,
    pub final_state: HashMap<String, Value>,
}

/// Persists a spell's state (persistent bindings), run history, and
/// ledgers, keyed by `spellId` (spec §6).
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self, spell_id: &SpellId) -> Result<Option<HashMap<String, Value>>>;
    async fn save(&self, spell_id: &SpellId, state: &HashMap<String, Value>) -> Result<()>;
    async fn add_run(&self, spell_id: &SpellId, record: RunRecord) -> Result<()>;
    async fn save_ledger(&self, spell_id: &SpellId, run_id: &RunId, entries: Vec<LedgerEntry>) -> Result<()>;
    async fn get_runs(&self, spell_id: &SpellId, limit: Option<usize>) -> Result<Vec<RunRecord>>;
    async fn load_ledger(&self, spell_id: &SpellId, run_id: &RunId) -> Result<Vec<LedgerEntry>>;
    async fn list_spells(&self) -> Result<Vec<SpellId>>;
}
