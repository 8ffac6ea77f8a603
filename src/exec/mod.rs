//! Step execution: the scheduler that walks a validated [`crate::ir::SpellIr`]
//! and the per-kind step executors it dispatches to.

pub mod context;
pub mod ledger;
pub mod scheduler;
pub mod steps;

pub use context::{Clock, ExecutionContext, InstantClock, Metrics, RealClock};
pub use ledger::{Event, InMemoryLedger, LedgerEntry};
pub use scheduler::{run, RunOutcome};
