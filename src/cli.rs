//! `grimoire` command-line surface: `validate`, `simulate`, `run`, `venues`.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser as ClapParser, Subcommand};

use crate::adapters::{AdapterRegistry, MockAdapter};
use crate::compiler::compile_spell;
use crate::exec::{self, ExecutionContext, InstantClock, RealClock};
use crate::store::{InMemoryStateStore, RunMetrics, RunRecord, StateStore};
use crate::types::{ChainId, Config, RunId, SpellId};

#[derive(Debug, ClapParser)]
#[command(name = "grimoire", about = "Compiler and runtime for Grimoire spells")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Parse, generate IR, and validate a spell without executing it.
    Validate {
        spell_path: PathBuf,
        #[arg(long)]
        strict: bool,
    },
    /// Compile then execute a spell in simulation mode (no real wall-clock
    /// waits, no persisted state unless `--state-dir` is given).
    Simulate {
        spell_path: PathBuf,
        #[arg(long)]
        chain: Option<u64>,
        #[arg(long)]
        state_dir: Option<PathBuf>,
        #[arg(long)]
        no_state: bool,
    },
    /// Compile then execute a spell for real.
    Run {
        spell_path: PathBuf,
        #[arg(long)]
        chain: Option<u64>,
        #[arg(long)]
        state_dir: Option<PathBuf>,
    },
    /// List the adapters this build of the runtime knows about.
    Venues {
        #[arg(long)]
        json: bool,
    },
}

pub async fn dispatch(cli: Cli) -> i32 {
    match cli.command {
        Command::Validate { spell_path, strict } => validate_cmd(&spell_path, strict),
        Command::Simulate {
            spell_path,
            chain,
            state_dir: _,
            no_state,
        } => execute_cmd(&spell_path, chain, true, !no_state).await,
        Command::Run { spell_path, chain, state_dir: _ } => execute_cmd(&spell_path, chain, false, true).await,
        Command::Venues { json } => venues_cmd(json),
    }
}

fn read_source(path: &PathBuf) -> Result<String, i32> {
    std::fs::read_to_string(path).map_err(|e| {
        eprintln!("error: could not read {}: {e}", path.display());
        1
    })
}

fn validate_cmd(path: &PathBuf, strict: bool) -> i32 {
    let source = match read_source(path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let result = compile_spell(&source);
    for warning in &result.warnings {
        eprintln!("warning: {warning}");
    }
    for error in &result.errors {
        eprintln!("error: {error}");
    }
    if !result.success || (strict && !result.warnings.is_empty()) {
        1
    } else {
        0
    }
}

async fn execute_cmd(path: &PathBuf, chain: Option<u64>, simulate: bool, persist: bool) -> i32 {
    let source = match read_source(path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let result = compile_spell(&source);
    for error in &result.errors {
        eprintln!("error: {error}");
    }
    let Some(ir) = result.ir.filter(|_| result.success) else {
        return 1;
    };

    let mut registry = AdapterRegistry::new();
    registry.register(Arc::new(MockAdapter::new("mock", vec![ChainId::new(chain.unwrap_or(1))])));

    let clock: Arc<dyn exec::Clock> = if simulate {
        Arc::new(InstantClock::default())
    } else {
        Arc::new(RealClock)
    };

    // Acquired before the run and released (its handle dropped) on every
    // exit path below, including failure, so a crashed run still leaves a
    // record behind. `--state-dir` is accepted but not yet honored: only
    // the in-memory backend exists, so persistence doesn't outlive this
    // process.
    let store: Option<Arc<dyn StateStore>> = persist.then(|| Arc::new(InMemoryStateStore::new()) as Arc<dyn StateStore>);
    // Stable per spell-file identity, so repeated CLI invocations against
    // the same path share persistent state and run history.
    let spell_id = SpellId::from_string(path.display().to_string()).unwrap_or_else(|_| SpellId::new());

    let run_id = RunId::new();
    let mut ctx = ExecutionContext::new(run_id.clone(), spell_id.clone(), Arc::new(registry), clock, Config::from_env());
    ctx.simulate = simulate;
    if let Some(store) = &store {
        if let Some(persisted) = store.load(&spell_id).await.unwrap_or(None) {
            ctx.state.persistent = persisted;
        }
    }

    let started = std::time::Instant::now();
    let outcome = exec::run(&ir, &mut ctx).await;
    let duration_ms = started.elapsed().as_millis() as u64;

    if let Some(store) = &store {
        let entries = ctx.ledger.entries();
        if let Err(e) = store.save_ledger(&spell_id, &run_id, entries).await {
            eprintln!("warning: failed to persist ledger: {e}");
        }
        if let Err(e) = store.save(&spell_id, &ctx.state.persistent).await {
            eprintln!("warning: failed to persist state: {e}");
        }
        let record = RunRecord {
            run_id: run_id.clone(),
            timestamp: chrono::Utc::now(),
            success: outcome.is_ok(),
            error: outcome.as_ref().err().map(|e| e.to_string()),
            duration_ms,
            metrics: RunMetrics::from(ctx.metrics.snapshot()),
            final_state: ctx.bindings.clone(),
        };
        if let Err(e) = store.add_run(&spell_id, record).await {
            eprintln!("warning: failed to persist run record: {e}");
        }
    }

    match outcome {
        Ok(_) => 0,
        Err(e) => {
            eprintln!("error: {e}");
            1
        }
    }
}

fn venues_cmd(json: bool) -> i32 {
    let mut registry = AdapterRegistry::new();
    registry.register(Arc::new(MockAdapter::new("mock", vec![ChainId::new(1)])));
    let names = registry.names();
    if json {
        println!("{}", serde_json::json!(names));
    } else {
        for name in names {
            println!("{name}");
        }
    }
    0
}
