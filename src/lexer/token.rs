//! Token kinds produced by the tokenizer.

use crate::types::Position;

/// A single lexical token with its source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Position,
}

impl Token {
    pub fn new(kind: TokenKind, pos: Position) -> Self {
        Self { kind, pos }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // ── Structure ────────────────────────────────────────────────
    Newline,
    Indent,
    Dedent,
    Eof,

    // ── Literals ─────────────────────────────────────────────────
    Ident(String),
    Keyword(Keyword),
    /// Integer or decimal literal, pre-scaled for duration suffixes
    /// (`s`→×1, `m`→×60, `h`→×3600, `d`→×86400) into seconds.
    Number(f64),
    /// `12%` is tokenized directly to its fractional value, `0.12`.
    Percentage(f64),
    String(String),
    /// `0x`-prefixed hex literal, lowercase-normalized, prefix retained.
    Address(String),
    /// `@name` venue/skill reference.
    VenueRef(String),
    /// `**free text**` inline advisor prompt block.
    Advisory(String),
    True,
    False,
    Null,

    // ── Punctuation / operators ─────────────────────────────────
    Colon,
    Comma,
    Dot,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Arrow, // ->
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Spell,
    On,
    Manual,
    Hourly,
    Daily,
    Schedule,
    Event,
    Let,
    If,
    Else,
    For,
    In,
    Until,
    Repeat,
    Parallel,
    Pipeline,
    Try,
    Catch,
    Action,
    Emit,
    Wait,
    Halt,
    Advisory,
    Venue,
    Use,
    Fallback,
    Timeout,
    OnFailure,
    Revert,
    Continue,
    Retry,
    All,
    First,
    Any,
    Majority,
    Best,
    Where,
    Sort,
    Map,
    Take,
    Skip,
    Asc,
    Desc,
    Atomic,
    Params,
    Guards,
    State,
    Persistent,
    Ephemeral,
    Aliases,
    Version,
}

impl Keyword {
    /// Maps a lowercase identifier to its keyword, if it is one.
    pub fn lookup(ident: &str) -> Option<Keyword> {
        use Keyword::*;
        Some(match ident {
            "spell" => Spell,
            "on" => On,
            "manual" => Manual,
            "hourly" => Hourly,
            "daily" => Daily,
            "schedule" => Schedule,
            "event" => Event,
            "let" => Let,
            "if" => If,
            "else" => Else,
            "for" => For,
            "in" => In,
            "until" => Until,
            "repeat" => Repeat,
            "parallel" => Parallel,
            "pipeline" => Pipeline,
            "try" => Try,
            "catch" => Catch,
            "action" => Action,
            "emit" => Emit,
            "wait" => Wait,
            "halt" => Halt,
            "advisory" => Advisory,
            "venue" => Venue,
            "use" => Use,
            "fallback" => Fallback,
            "timeout" => Timeout,
            "onFailure" => OnFailure,
            "revert" => Revert,
            "continue" => Continue,
            "retry" => Retry,
            "all" => All,
            "first" => First,
            "any" => Any,
            "majority" => Majority,
            "best" => Best,
            "where" => Where,
            "sort" => Sort,
            "map" => Map,
            "take" => Take,
            "skip" => Skip,
            "asc" => Asc,
            "desc" => Desc,
            "atomic" => Atomic,
            "params" => Params,
            "guards" => Guards,
            "state" => State,
            "persistent" => Persistent,
            "ephemeral" => Ephemeral,
            "aliases" => Aliases,
            "version" => Version,
            _ => return None,
        })
    }
}
