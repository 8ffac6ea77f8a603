//! Abstract syntax tree produced by the parser.
//!
//! The AST stays close to surface syntax — statement-level sugar (trigger
//! shorthand, venue groups, assignment batching) is resolved later by
//! `transformer` and `ir::generator`.

use serde::{Deserialize, Serialize};

use crate::types::Position;

#[derive(Debug, Clone, PartialEq)]
pub struct SpellAst {
    pub name: String,
    pub version: Option<String>,
    pub params: Vec<ParamDef>,
    pub state_persistent: Vec<StateVarDef>,
    pub state_ephemeral: Vec<StateVarDef>,
    pub guards: Vec<GuardDef>,
    pub aliases: Vec<AliasDef>,
    pub venues: Vec<String>,
    pub triggers: Vec<TriggerHandler>,
}

/// One `on <trigger>: <body>` handler. A spell may declare several — a
/// `manual` entry point alongside a `schedule(...)` one, say — each with
/// its own statement body; they share everything else in `SpellAst`.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerHandler {
    pub trigger: Trigger,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    Manual,
    Hourly,
    Daily,
    Schedule(String),
    Event(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDef {
    pub name: String,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateVarDef {
    pub name: String,
    pub initial: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuardSeverity {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardDef {
    pub id: String,
    pub check: Expr,
    pub severity: GuardSeverity,
    pub message: String,
}

/// A resolvable `venueRef(alias)` target: `{alias, chain, address}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AliasDef {
    pub alias: String,
    pub chain: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Let {
        name: String,
        value: Expr,
    },
    Compute(Expr),
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },
    For {
        var: String,
        iter: Expr,
        body: Vec<Stmt>,
    },
    Repeat {
        count: Expr,
        body: Vec<Stmt>,
    },
    Until {
        cond: Expr,
        body: Vec<Stmt>,
    },
    Parallel {
        join: JoinPolicy,
        branches: Vec<Vec<Stmt>>,
    },
    Pipeline {
        source: Expr,
        stages: Vec<PipelineStage>,
        binding: Option<String>,
    },
    Try {
        body: Vec<Stmt>,
        catches: Vec<CatchClause>,
    },
    Action {
        venue: String,
        method: String,
        args: Vec<Expr>,
        on_failure: OnFailure,
    },
    Emit {
        name: String,
        payload: Expr,
    },
    Wait {
        duration: Expr,
    },
    Halt,
    Advisory {
        advisor: Option<String>,
        prompt: String,
        timeout: Option<Expr>,
        fallback: Expr,
        skills: Vec<String>,
        output_schema: Option<OutputSchema>,
        output_binding: Option<String>,
    },
    /// All-or-nothing grouping: if any statement in the body errors, none
    /// of the bindings it produced are visible afterward (unlike a bare
    /// block, where a partial prefix's bindings stick around).
    Atomic(Vec<Stmt>),
}

/// Advisor output coercion rule (spec §6): the raw fallback/tool value is
/// coerced to this shape before it's bound to `outputBinding`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OutputSchema {
    Boolean,
    Number,
    String,
    Enum(Vec<String>),
    Object(Vec<(String, OutputSchema)>),
    Array(Box<OutputSchema>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinPolicy {
    All,
    First,
    Any(usize),
    Majority,
    Best(Box<Expr>, SortDir),
}

#[derive(Debug, Clone, PartialEq, Eq, Copy)]
pub enum SortDir {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineStage {
    Where(Expr),
    Sort(Expr, SortDir),
    Map(Expr),
    Take(usize),
    Skip(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub pattern: Option<String>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OnFailure {
    Revert,
    Continue,
    Retry(u32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Null,
    Bool(bool),
    Number(f64),
    Percentage(f64),
    String(String),
    Address(String),
    VenueRef(String),
    Ident(String),
    /// `param(name)` — reads a declared spell parameter.
    Param(String),
    /// `persistent(name)` — reads a declared persistent state variable.
    Persistent(String),
    /// `ephemeral(name)` — reads a declared ephemeral (per-run) state variable.
    Ephemeral(String),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    FieldAccess {
        base: Box<Expr>,
        field: String,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
    MethodCall {
        venue: String,
        method: String,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}
