//! Append-only event log for a run.
//!
//! Every entry is also emitted as a `tracing` event at a matching severity,
//! so a run is legible from logs alone without reading the ledger back.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub event: Event,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    RunStarted { spell_name: String },
    RunCompleted,
    RunFailed { error_code: String, message: String },
    StepStarted { step_id: String, kind: String },
    StepCompleted { step_id: String },
    StepFailed { step_id: String, error_code: String, message: String },
    GuardFailed { step_id: String, message: String },
    CustomEvent { name: String, payload: Value },
    AdvisoryStarted {
        step_id: String,
        prompt: String,
        skills: Vec<String>,
    },
    AdvisoryCompleted { step_id: String, value: Value },
    AdvisoryFailed { step_id: String, error_code: String, message: String },
    BindingSet { step_id: String, name: String, value: Value },
    ActionSimulated { step_id: String, venue: String, method: String },
    ActionExecuted { step_id: String, venue: String, method: String },
}

pub struct InMemoryLedger {
    entries: Mutex<Vec<LedgerEntry>>,
    seq: AtomicU64,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            seq: AtomicU64::new(0),
        }
    }

    pub fn append(&self, event: Event) -> u64 {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        emit_trace(&event);
        let entry = LedgerEntry {
            seq,
            timestamp: Utc::now(),
            event,
        };
        self.entries.lock().expect("ledger mutex poisoned").push(entry);
        seq
    }

    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.entries.lock().expect("ledger mutex poisoned").clone()
    }
}

fn emit_trace(event: &Event) {
    match event {
        Event::RunStarted { spell_name } => tracing::info!(spell_name, "run started"),
        Event::RunCompleted => tracing::info!("run completed"),
        Event::RunFailed { error_code, message } => {
            tracing::error!(error_code, message, "run failed")
        }
        Event::StepStarted { step_id, kind } => tracing::debug!(step_id, kind, "step started"),
        Event::StepCompleted { step_id } => tracing::info!(step_id, "step completed"),
        Event::StepFailed {
            step_id,
            error_code,
            message,
        } => tracing::warn!(step_id, error_code, message, "step failed"),
        Event::GuardFailed { step_id, message } => tracing::warn!(step_id, message, "guard failed"),
        Event::CustomEvent { name, .. } => tracing::info!(name, "custom event emitted"),
        Event::AdvisoryStarted { step_id, skills, .. } => {
            tracing::info!(step_id, ?skills, "advisory started")
        }
        Event::AdvisoryCompleted { step_id, .. } => tracing::info!(step_id, "advisory completed"),
        Event::AdvisoryFailed {
            step_id,
            error_code,
            message,
        } => tracing::warn!(step_id, error_code, message, "advisory failed"),
        Event::BindingSet { step_id, name, .. } => tracing::debug!(step_id, name, "binding set"),
        Event::ActionSimulated { step_id, venue, method } => {
            tracing::info!(step_id, venue, method, "action simulated")
        }
        Event::ActionExecuted { step_id, venue, method } => {
            tracing::info!(step_id, venue, method, "action executed")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_assigns_increasing_sequence_numbers() {
        let ledger = InMemoryLedger::new();
        let a = ledger.append(Event::RunCompleted);
        let b = ledger.append(Event::RunCompleted);
        assert!(b > a);
        assert_eq!(ledger.entries().len(), 2);
    }
}
