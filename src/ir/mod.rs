//! The IR data model, its generator, and its validator.

pub mod generator;
pub mod model;
pub mod validator;

pub use generator::generate;
pub use model::{
    CatchIr, Expression, JoinPolicy, LoopType, OnFailure, PipelineStageIr, SortDir, SpellIr, Step, StepKind,
    TriggerEntry,
};
pub use validator::{validate, Diagnostic, Severity};
