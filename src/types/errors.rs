//! The crate's error taxonomy.
//!
//! Every error Grimoire can produce — lexical, syntactic, semantic, runtime,
//! or I/O — is a variant of [`Error`]. Codes are part of the stable surface:
//! callers match on [`Error::code`] rather than parsing the `Display`
//! message.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// A source position, attached to lexical/syntactic errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Main error enum for the Grimoire compiler and runtime.
#[derive(Error, Debug, Clone)]
pub enum Error {
    // ── Lexical ──────────────────────────────────────────────────
    #[error("unterminated string literal at {pos}")]
    UnterminatedString { pos: Position },

    #[error("unterminated advisory block at {pos}")]
    UnterminatedAdvisory { pos: Position },

    #[error("empty venue reference at {pos}")]
    EmptyVenueRef { pos: Position },

    #[error("unexpected character {ch:?} at {pos}")]
    UnexpectedCharacter { ch: char, pos: Position },

    // ── Syntactic ────────────────────────────────────────────────
    #[error("parse error at {pos}: {message}")]
    ParseError { message: String, pos: Position },

    // ── Semantic ─────────────────────────────────────────────────
    #[error("unknown step reference: {0}")]
    UnknownStepReference(String),

    #[error("dependency cycle detected involving step {0}")]
    DependencyCycle(String),

    #[error("unknown advisor: {0}")]
    UnknownAdvisor(String),

    #[error("advisory step {0} has no positive timeout")]
    AdvisoryNoTimeout(String),

    #[error("unknown asset: {0}")]
    UnknownAsset(String),

    // ── Runtime ──────────────────────────────────────────────────
    #[error("unknown binding: {0}")]
    UnknownBinding(String),

    #[error("division by zero")]
    DivByZero,

    #[error("type error: {0}")]
    TypeError(String),

    #[error("guard failed: {0}")]
    GuardFailed(String),

    #[error("step failed: {step_id}: {message}")]
    StepFailed { step_id: String, message: String },

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("cancelled")]
    Cancelled,

    // ── I/O ──────────────────────────────────────────────────────
    #[error("file read error: {0}")]
    FileReadError(String),

    #[error("state load error: {0}")]
    StateLoadError(String),

    #[error("state save error: {0}")]
    StateSaveError(String),

    // ── Serialization (ambient, unavoidable at the CLI/StateStore
    // boundary) ──────────────────────────────────────────────────
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// The stable, machine-matchable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Error::UnterminatedString { .. } => "UNTERMINATED_STRING",
            Error::UnterminatedAdvisory { .. } => "UNTERMINATED_ADVISORY",
            Error::EmptyVenueRef { .. } => "EMPTY_VENUE_REF",
            Error::UnexpectedCharacter { .. } => "UNEXPECTED_CHARACTER",
            Error::ParseError { .. } => "GRIMOIRE_PARSE_ERROR",
            Error::UnknownStepReference(_) => "UNKNOWN_STEP_REFERENCE",
            Error::DependencyCycle(_) => "DEPENDENCY_CYCLE",
            Error::UnknownAdvisor(_) => "UNKNOWN_ADVISOR",
            Error::AdvisoryNoTimeout(_) => "ADVISORY_NO_TIMEOUT",
            Error::UnknownAsset(_) => "UNKNOWN_ASSET",
            Error::UnknownBinding(_) => "UNKNOWN_BINDING",
            Error::DivByZero => "DIV_BY_ZERO",
            Error::TypeError(_) => "TYPE_ERROR",
            Error::GuardFailed(_) => "GUARD_FAILED",
            Error::StepFailed { .. } => "STEP_FAILED",
            Error::Timeout(_) => "TIMEOUT",
            Error::Cancelled => "CANCELLED",
            Error::FileReadError(_) => "FILE_READ_ERROR",
            Error::StateLoadError(_) => "STATE_LOAD_ERROR",
            Error::StateSaveError(_) => "STATE_SAVE_ERROR",
            Error::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    pub fn parse(message: impl Into<String>, pos: Position) -> Self {
        Error::ParseError {
            message: message.into(),
            pos,
        }
    }

    pub fn unknown_step_reference(id: impl Into<String>) -> Self {
        Error::UnknownStepReference(id.into())
    }

    pub fn step_failed(step_id: impl Into<String>, message: impl Into<String>) -> Self {
        Error::StepFailed {
            step_id: step_id.into(),
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Error::TypeError(message.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::FileReadError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable_strings() {
        assert_eq!(Error::DivByZero.code(), "DIV_BY_ZERO");
        assert_eq!(Error::UnknownBinding("x".into()).code(), "UNKNOWN_BINDING");
        assert_eq!(
            Error::DependencyCycle("a".into()).code(),
            "DEPENDENCY_CYCLE"
        );
    }

    #[test]
    fn position_displays_line_column() {
        let pos = Position::new(3, 7);
        assert_eq!(pos.to_string(), "3:7");
    }
}
