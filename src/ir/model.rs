//! The flat, DAG-shaped intermediate representation the scheduler executes.

use serde::{Deserialize, Serialize};

use crate::parser::ast::{AliasDef, Expr, GuardDef, OutputSchema, ParamDef, StateVarDef};
use crate::transformer::TriggerSpec;
use crate::types::SpellId;

/// Expressions are unchanged between the surface AST and the IR — lowering
/// only restructures statements into the flat `Step` graph; expression
/// trees are evaluated in place by `eval::expression`.
pub type Expression = Expr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpellIr {
    pub spell_id: SpellId,
    pub name: String,
    pub params: Vec<ParamDef>,
    pub state_persistent: Vec<StateVarDef>,
    pub state_ephemeral: Vec<StateVarDef>,
    pub guards: Vec<GuardDef>,
    pub aliases: Vec<AliasDef>,
    pub venues: Vec<String>,
    /// One entry per `on <trigger>:` handler; each carries its own
    /// top-level step ids but all handlers share the rest of `steps`.
    pub triggers: Vec<TriggerEntry>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerEntry {
    #[serde(with = "trigger_spec_serde")]
    pub trigger: TriggerSpec,
    /// Ids of the steps at this handler's outermost scope, in source order.
    /// Everything else in `steps` is nested under one of these (or under a
    /// step nested under one of these) and is driven by its parent rather
    /// than scheduled directly.
    pub top_level: Vec<String>,
}

impl SpellIr {
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// The manual handler, or the first declared handler if none is manual —
    /// the entry point `exec::run` uses when no explicit trigger is chosen.
    pub fn default_trigger(&self) -> Option<&TriggerEntry> {
        self.triggers
            .iter()
            .find(|t| matches!(t.trigger, TriggerSpec::Manual))
            .or_else(|| self.triggers.first())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub kind: StepKind,
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StepKind {
    /// `None` binding names mark a bare expression statement (e.g. a lone
    /// action/advisory-free call kept for its side effect) batched into the
    /// same compute step purely to preserve source order — nothing is
    /// bound to scope for it.
    Compute {
        bindings: Vec<(Option<String>, Expression)>,
    },
    Conditional {
        cond: Expression,
        then_steps: Vec<String>,
        else_steps: Vec<String>,
    },
    Loop {
        loop_type: LoopType,
        body_steps: Vec<String>,
    },
    Parallel {
        join: JoinPolicy,
        branches: Vec<Vec<String>>,
    },
    Pipeline {
        source: Box<Expression>,
        stages: Vec<PipelineStageIr>,
        binding: Option<String>,
    },
    Try {
        body_steps: Vec<String>,
        catches: Vec<CatchIr>,
    },
    Action {
        venue: String,
        method: String,
        args: Vec<Expression>,
        on_failure: OnFailure,
    },
    Emit {
        name: String,
        payload: Expression,
    },
    Wait {
        duration: Expression,
    },
    Halt,
    Advisory {
        advisor: Option<String>,
        prompt: String,
        timeout: Option<Expression>,
        fallback: Expression,
        skills: Vec<String>,
        output_schema: Option<OutputSchema>,
        output_binding: Option<String>,
    },
    /// All-or-nothing grouping: bindings produced by the body are only
    /// merged into the enclosing scope if every step in it succeeds.
    Atomic { body_steps: Vec<String> },
}

impl StepKind {
    pub fn label(&self) -> &'static str {
        match self {
            StepKind::Compute { .. } => "compute",
            StepKind::Conditional { .. } => "conditional",
            StepKind::Loop { .. } => "loop",
            StepKind::Parallel { .. } => "parallel",
            StepKind::Pipeline { .. } => "pipeline",
            StepKind::Try { .. } => "try",
            StepKind::Action { .. } => "action",
            StepKind::Emit { .. } => "emit",
            StepKind::Wait { .. } => "wait",
            StepKind::Halt => "halt",
            StepKind::Advisory { .. } => "advisory",
            StepKind::Atomic { .. } => "atomic",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LoopType {
    For { var: String, iter: Expression },
    Repeat { count: Expression },
    Until { cond: Expression },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JoinPolicy {
    All,
    First,
    Any(usize),
    Majority,
    Best(Box<Expression>, SortDir),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDir {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PipelineStageIr {
    Where(Expression),
    Sort(Expression, SortDir),
    Map(Expression),
    Take(usize),
    Skip(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatchIr {
    pub pattern: Option<String>,
    pub body_steps: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnFailure {
    Revert,
    Continue,
    Retry(u32),
}

mod trigger_spec_serde {
    use super::TriggerSpec;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(tag = "kind", content = "value")]
    enum Wire {
        Manual,
        Cron(String),
        Event(String),
    }

    pub fn serialize<S: Serializer>(t: &TriggerSpec, s: S) -> Result<S::Ok, S::Error> {
        let wire = match t {
            TriggerSpec::Manual => Wire::Manual,
            TriggerSpec::Cron(c) => Wire::Cron(c.clone()),
            TriggerSpec::Event(e) => Wire::Event(e.clone()),
        };
        wire.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<TriggerSpec, D::Error> {
        Ok(match Wire::deserialize(d)? {
            Wire::Manual => TriggerSpec::Manual,
            Wire::Cron(c) => TriggerSpec::Cron(c),
            Wire::Event(e) => TriggerSpec::Event(e),
        })
    }
}
