//! In-memory `StateStore`, the default for `simulate` and for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::exec::LedgerEntry;
use crate::types::{Result, RunId, SpellId, Value};

use super::{RunRecord, StateStore};

#[derive(Default)]
struct SpellRecord {
    state: HashMap<String, Value>,
    runs: Vec<RunRecord>,
    ledgers: HashMap<RunId, Vec<LedgerEntry>>,
}

#[derive(Default)]
pub struct InMemoryStateStore {
    spells: Mutex<HashMap<SpellId, SpellRecord>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn load(&self, spell_id: &SpellId) -> Result<Option<HashMap<String, Value>>> {
        Ok(self
            .spells
            .lock()
            .expect("state store mutex poisoned")
            .get(spell_id)
            .map(|record| record.state.clone()))
    }

    async fn save(&self, spell_id: &SpellId, state: &HashMap<String, Value>) -> Result<()> {
        self.spells
            .lock()
            .expect("state store mutex poisoned")
            .entry(spell_id.clone())
            .or_default()
            .state = state.clone();
        Ok(())
    }

    async fn add_run(&self, spell_id: &SpellId, record: RunRecord) -> Result<()> {
        self.spells
            .lock()
            .expect("state store mutex poisoned")
            .entry(spell_id.clone())
            .or_default()
            .runs
            .push(record);
        Ok(())
    }

    async fn save_ledger(&self, spell_id: &SpellId, run_id: &RunId, entries: Vec<LedgerEntry>) -> Result<()> {
        self.spells
            .lock()
            .expect("state store mutex poisoned")
            .entry(spell_id.clone())
            .or_default()
            .ledgers
            .insert(run_id.clone(), entries);
        Ok(())
    }

    async fn get_runs(&self, spell_id: &SpellId, limit: Option<usize>) -> Result<Vec<RunRecord>> {
        let spells = self.spells.lock().expect("state store mutex poisoned");
        let Some(record) = spells.get(spell_id) else {
            return Ok(Vec::new());
        };
        let mut runs = record.runs.clone();
        runs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if let Some(limit) = limit {
            runs.truncate(limit);
        }
        Ok(runs)
    }

    async fn load_ledger(&self, spell_id: &SpellId, run_id: &RunId) -> Result<Vec<LedgerEntry>> {
        Ok(self
            .spells
            .lock()
            .expect("state store mutex poisoned")
            .get(spell_id)
            .and_then(|record| record.ledgers.get(run_id).cloned())
            .unwrap_or_default())
    }

    async fn list_spells(&self) -> Result<Vec<SpellId>> {
        Ok(self
            .spells
            .lock()
            .expect("state store mutex poisoned")
            .keys()
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RunMetrics;

    fn sample_run() -> RunRecord {
        RunRecord {
            run_id: RunId::new(),
            timestamp: chrono::Utc::now(),
            success: true,
            error: None,
            duration_ms: 12,
            metrics: RunMetrics {
                steps_executed: 1,
                steps_failed: 0,
                actions_retried: 0,
                actions_executed: 0,
                advisory_calls: 0,
                errors: 0,
                gas_used: "0".to_string(),
            },
            final_state: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn save_then_load_round_trips_state() {
        let store = InMemoryStateStore::new();
        let spell_id = SpellId::new();
        let mut state = HashMap::new();
        state.insert("balance".to_string(), Value::Int(10));
        store.save(&spell_id, &state).await.unwrap();
        let loaded = store.load(&spell_id).await.unwrap().unwrap();
        assert_eq!(loaded.get("balance"), Some(&Value::Int(10)));
    }

    #[tokio::test]
    async fn load_is_none_for_a_spell_never_saved() {
        let store = InMemoryStateStore::new();
        assert!(store.load(&SpellId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_runs_honors_limit_and_newest_first_order() {
        let store = InMemoryStateStore::new();
        let spell_id = SpellId::new();
        let mut first = sample_run();
        first.timestamp = chrono::Utc::now() - chrono::Duration::seconds(10);
        let second = sample_run();
        store.add_run(&spell_id, first.clone()).await.unwrap();
        store.add_run(&spell_id, second.clone()).await.unwrap();
        let runs = store.get_runs(&spell_id, Some(1)).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].run_id, second.run_id);
    }

    #[tokio::test]
    async fn ledger_round_trips_by_run_id() {
        let store = InMemoryStateStore::new();
        let spell_id = SpellId::new();
        let run_id = RunId::new();
        store.save_ledger(&spell_id, &run_id, vec![]).await.unwrap();
        let loaded = store.load_ledger(&spell_id, &run_id).await.unwrap();
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn list_spells_reflects_saved_state() {
        let store = InMemoryStateStore::new();
        let spell_id = SpellId::new();
        store.save(&spell_id, &HashMap::new()).await.unwrap();
        assert_eq!(store.list_spells().await.unwrap(), vec![spell_id]);
    }
}
