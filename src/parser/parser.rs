//! Recursive-descent parser: token stream to [`SpellAst`].
//!
//! Error recovery happens only at statement boundaries: a malformed
//! statement is recorded as an error and the parser resynchronizes at the
//! next `NEWLINE` seen at the enclosing block's indentation, so one bad
//! line doesn't stop the whole spell from being diagnosed.

use crate::lexer::{Keyword, Token, TokenKind};
use crate::types::{Error, Position, Result};

use super::ast::*;

/// Result of a parse attempt: the AST (if the top-level structure could be
/// recovered at all) plus every error collected along the way.
pub struct ParseOutcome {
    pub ast: Option<SpellAst>,
    pub errors: Vec<Error>,
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<Error>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
        }
    }

    pub fn parse(mut self) -> ParseOutcome {
        let ast = match self.parse_spell() {
            Ok(ast) => Some(ast),
            Err(e) => {
                self.errors.push(e);
                None
            }
        };
        ParseOutcome {
            ast,
            errors: self.errors,
        }
    }

    fn parse_spell(&mut self) -> Result<SpellAst> {
        self.expect_keyword(Keyword::Spell)?;
        let name = self.expect_spell_name()?;
        self.expect(TokenKind::Colon)?;
        self.skip_newlines();
        self.expect(TokenKind::Indent)?;

        let mut version = None;
        let mut params = Vec::new();
        let mut state_persistent = Vec::new();
        let mut state_ephemeral = Vec::new();
        let mut guards = Vec::new();
        let mut aliases = Vec::new();

        self.skip_newlines();
        loop {
            if self.check_keyword(Keyword::Version) {
                self.advance();
                self.expect(TokenKind::Colon)?;
                version = Some(self.expect_string()?);
            } else if self.check_keyword(Keyword::Params) {
                self.advance();
                params = self.parse_params_section()?;
            } else if self.check_keyword(Keyword::State) {
                self.advance();
                let (persistent, ephemeral) = self.parse_state_section()?;
                state_persistent = persistent;
                state_ephemeral = ephemeral;
            } else if self.check_keyword(Keyword::Guards) {
                self.advance();
                guards = self.parse_guards_section()?;
            } else if self.check_keyword(Keyword::Aliases) {
                self.advance();
                aliases = self.parse_aliases_section()?;
            } else {
                break;
            }
            self.skip_newlines();
        }

        let mut venues = Vec::new();
        if self.check_keyword(Keyword::Use) {
            self.advance();
            venues = self.parse_venue_list()?;
            self.skip_newlines();
        }

        let mut triggers = Vec::new();
        loop {
            let trigger = self.parse_trigger()?;
            self.skip_newlines();
            let body = self.parse_trigger_body()?;
            triggers.push(TriggerHandler { trigger, body });
            if !self.check_keyword(Keyword::On) {
                break;
            }
        }
        if self.check(&TokenKind::Dedent) {
            self.advance();
        }

        Ok(SpellAst {
            name,
            version,
            params,
            state_persistent,
            state_ephemeral,
            guards,
            aliases,
            venues,
            triggers,
        })
    }

    /// A trigger handler's body is a standard nested block (indented one
    /// level deeper than its `on <trigger>:` line), same as an `if`/`loop`
    /// body. Returning to the handler's own indentation after the block's
    /// `Dedent` either starts another `on` handler or ends the spell.
    fn parse_trigger_body(&mut self) -> Result<Vec<Stmt>> {
        self.skip_newlines();
        self.expect(TokenKind::Indent)?;
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::Dedent) && !self.check(&TokenKind::Eof) {
            match self.parse_stmt() {
                Ok(stmt) => stmts.push(stmt),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize();
                }
            }
            self.skip_newlines();
        }
        if self.check(&TokenKind::Dedent) {
            self.advance();
        }
        Ok(stmts)
    }

    fn parse_params_section(&mut self) -> Result<Vec<ParamDef>> {
        self.expect(TokenKind::Colon)?;
        self.skip_newlines();
        self.expect(TokenKind::Indent)?;
        let mut params = Vec::new();
        while !self.check(&TokenKind::Dedent) && !self.check(&TokenKind::Eof) {
            let name = self.expect_ident()?;
            let default = if self.check(&TokenKind::Assign) {
                self.advance();
                Some(self.parse_expr()?)
            } else {
                None
            };
            params.push(ParamDef { name, default });
            self.skip_newlines();
        }
        self.expect(TokenKind::Dedent)?;
        Ok(params)
    }

    fn parse_state_section(&mut self) -> Result<(Vec<StateVarDef>, Vec<StateVarDef>)> {
        self.expect(TokenKind::Colon)?;
        self.skip_newlines();
        self.expect(TokenKind::Indent)?;
        let mut persistent = Vec::new();
        let mut ephemeral = Vec::new();
        while !self.check(&TokenKind::Dedent) && !self.check(&TokenKind::Eof) {
            if self.check_keyword(Keyword::Persistent) {
                self.advance();
                persistent = self.parse_state_var_list()?;
            } else if self.check_keyword(Keyword::Ephemeral) {
                self.advance();
                ephemeral = self.parse_state_var_list()?;
            } else {
                return Err(self.error("expected `persistent:` or `ephemeral:`"));
            }
            self.skip_newlines();
        }
        self.expect(TokenKind::Dedent)?;
        Ok((persistent, ephemeral))
    }

    fn parse_state_var_list(&mut self) -> Result<Vec<StateVarDef>> {
        self.expect(TokenKind::Colon)?;
        self.skip_newlines();
        self.expect(TokenKind::Indent)?;
        let mut vars = Vec::new();
        while !self.check(&TokenKind::Dedent) && !self.check(&TokenKind::Eof) {
            let name = self.expect_ident()?;
            self.expect(TokenKind::Assign)?;
            let initial = self.parse_expr()?;
            vars.push(StateVarDef { name, initial });
            self.skip_newlines();
        }
        self.expect(TokenKind::Dedent)?;
        Ok(vars)
    }

    fn parse_guards_section(&mut self) -> Result<Vec<GuardDef>> {
        self.expect(TokenKind::Colon)?;
        self.skip_newlines();
        self.expect(TokenKind::Indent)?;
        let mut guards = Vec::new();
        while !self.check(&TokenKind::Dedent) && !self.check(&TokenKind::Eof) {
            let id = self.expect_ident()?;
            self.expect(TokenKind::Colon)?;
            let check = self.parse_expr()?;
            let severity = self.parse_guard_severity()?;
            let message = self.expect_string()?;
            guards.push(GuardDef {
                id,
                check,
                severity,
                message,
            });
            self.skip_newlines();
        }
        self.expect(TokenKind::Dedent)?;
        Ok(guards)
    }

    fn parse_guard_severity(&mut self) -> Result<GuardSeverity> {
        match self.peek_kind().clone() {
            TokenKind::Ident(s) if s == "info" => {
                self.advance();
                Ok(GuardSeverity::Info)
            }
            TokenKind::Ident(s) if s == "warn" => {
                self.advance();
                Ok(GuardSeverity::Warn)
            }
            TokenKind::Ident(s) if s == "error" => {
                self.advance();
                Ok(GuardSeverity::Error)
            }
            other => Err(self.error(format!(
                "expected guard severity (info/warn/error), found {other:?}"
            ))),
        }
    }

    fn parse_aliases_section(&mut self) -> Result<Vec<AliasDef>> {
        self.expect(TokenKind::Colon)?;
        self.skip_newlines();
        self.expect(TokenKind::Indent)?;
        let mut aliases = Vec::new();
        while !self.check(&TokenKind::Dedent) && !self.check(&TokenKind::Eof) {
            let alias = self.expect_ident()?;
            self.expect(TokenKind::Assign)?;
            self.expect_venue_ref()?;
            let chain = self.expect_ident()?;
            let address = self.expect_address()?;
            aliases.push(AliasDef {
                alias,
                chain,
                address,
            });
            self.skip_newlines();
        }
        self.expect(TokenKind::Dedent)?;
        Ok(aliases)
    }

    fn parse_trigger(&mut self) -> Result<Trigger> {
        self.expect_keyword(Keyword::On)?;
        let trigger = if self.check_keyword(Keyword::Manual) {
            self.advance();
            Trigger::Manual
        } else if self.check_keyword(Keyword::Hourly) {
            self.advance();
            Trigger::Hourly
        } else if self.check_keyword(Keyword::Daily) {
            self.advance();
            Trigger::Daily
        } else if self.check_keyword(Keyword::Schedule) {
            self.advance();
            self.expect(TokenKind::LParen)?;
            let cron = self.expect_string()?;
            self.expect(TokenKind::RParen)?;
            Trigger::Schedule(cron)
        } else if self.check_keyword(Keyword::Event) {
            self.advance();
            self.expect(TokenKind::LParen)?;
            let name = self.expect_string()?;
            self.expect(TokenKind::RParen)?;
            Trigger::Event(name)
        } else {
            return Err(self.error("expected a trigger (manual, hourly, daily, schedule(..), event(..))"));
        };
        self.expect(TokenKind::Colon)?;
        Ok(trigger)
    }

    fn parse_venue_list(&mut self) -> Result<Vec<String>> {
        let mut venues = vec![self.expect_venue_ref()?];
        while self.check(&TokenKind::Comma) {
            self.advance();
            venues.push(self.expect_venue_ref()?);
        }
        Ok(venues)
    }

    fn parse_block_until_dedent(&mut self) -> Result<Vec<Stmt>> {
        let mut stmts = Vec::new();
        self.skip_newlines();
        while !self.check(&TokenKind::Dedent) && !self.check(&TokenKind::Eof) {
            match self.parse_stmt() {
                Ok(stmt) => stmts.push(stmt),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize();
                }
            }
            self.skip_newlines();
        }
        if self.check(&TokenKind::Dedent) {
            self.advance();
        }
        Ok(stmts)
    }

    /// Skips to just past the next `NEWLINE`/`DEDENT`/`EOF` at the current
    /// nesting depth, so one malformed statement doesn't cascade.
    fn synchronize(&mut self) {
        let mut depth = 0i32;
        loop {
            match self.peek_kind() {
                TokenKind::Eof => return,
                TokenKind::Indent => {
                    depth += 1;
                    self.advance();
                }
                TokenKind::Dedent => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                    self.advance();
                }
                TokenKind::Newline if depth == 0 => {
                    self.advance();
                    return;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn parse_nested_block(&mut self) -> Result<Vec<Stmt>> {
        self.expect(TokenKind::Colon)?;
        self.skip_newlines();
        self.expect(TokenKind::Indent)?;
        self.parse_block_until_dedent()
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        let pos = self.peek_pos();
        let kind = if self.check_keyword(Keyword::Let) {
            self.advance();
            let name = self.expect_ident()?;
            self.expect(TokenKind::Assign)?;
            let value = self.parse_expr()?;
            StmtKind::Let { name, value }
        } else if self.check_keyword(Keyword::If) {
            self.advance();
            let cond = self.parse_expr()?;
            let then_body = self.parse_nested_block()?;
            let mut else_body = Vec::new();
            if self.check_keyword(Keyword::Else) {
                self.advance();
                else_body = if self.check_keyword(Keyword::If) {
                    vec![self.parse_stmt()?]
                } else {
                    self.parse_nested_block()?
                };
            }
            StmtKind::If {
                cond,
                then_body,
                else_body,
            }
        } else if self.check_keyword(Keyword::For) {
            self.advance();
            let var = self.expect_ident()?;
            self.expect_keyword(Keyword::In)?;
            let iter = self.parse_expr()?;
            let body = self.parse_nested_block()?;
            StmtKind::For { var, iter, body }
        } else if self.check_keyword(Keyword::Repeat) {
            self.advance();
            let count = self.parse_expr()?;
            let body = self.parse_nested_block()?;
            StmtKind::Repeat { count, body }
        } else if self.check_keyword(Keyword::Until) {
            self.advance();
            let cond = self.parse_expr()?;
            let body = self.parse_nested_block()?;
            StmtKind::Until { cond, body }
        } else if self.check_keyword(Keyword::Parallel) {
            self.advance();
            let join = self.parse_join_policy()?;
            self.expect(TokenKind::Colon)?;
            self.skip_newlines();
            self.expect(TokenKind::Indent)?;
            let mut branches = Vec::new();
            while !self.check(&TokenKind::Dedent) && !self.check(&TokenKind::Eof) {
                branches.push(self.parse_nested_block()?);
                self.skip_newlines();
            }
            if self.check(&TokenKind::Dedent) {
                self.advance();
            }
            StmtKind::Parallel { join, branches }
        } else if self.check_keyword(Keyword::Pipeline) {
            self.advance();
            let source = self.parse_expr()?;
            let binding = if self.check(&TokenKind::Arrow) {
                self.advance();
                Some(self.expect_ident()?)
            } else {
                None
            };
            self.expect(TokenKind::Colon)?;
            self.skip_newlines();
            self.expect(TokenKind::Indent)?;
            let mut stages = Vec::new();
            while !self.check(&TokenKind::Dedent) && !self.check(&TokenKind::Eof) {
                stages.push(self.parse_pipeline_stage()?);
                self.skip_newlines();
            }
            if self.check(&TokenKind::Dedent) {
                self.advance();
            }
            StmtKind::Pipeline { source, stages, binding }
        } else if self.check_keyword(Keyword::Try) {
            self.advance();
            let body = self.parse_nested_block()?;
            let mut catches = Vec::new();
            while self.check_keyword(Keyword::Catch) {
                self.advance();
                let pattern = if self.check(&TokenKind::Colon) {
                    None
                } else {
                    Some(self.expect_ident()?)
                };
                let catch_body = self.parse_nested_block()?;
                catches.push(CatchClause {
                    pattern,
                    body: catch_body,
                });
            }
            StmtKind::Try { body, catches }
        } else if self.check_keyword(Keyword::Action) {
            self.advance();
            let venue = self.expect_venue_ref()?;
            self.expect(TokenKind::Dot)?;
            let method = self.expect_ident()?;
            self.expect(TokenKind::LParen)?;
            let args = self.parse_expr_list(&TokenKind::RParen)?;
            self.expect(TokenKind::RParen)?;
            let mut on_failure = OnFailure::Revert;
            if self.check(&TokenKind::Colon) {
                self.advance();
                self.skip_newlines();
                self.expect(TokenKind::Indent)?;
                self.expect_keyword(Keyword::OnFailure)?;
                self.expect(TokenKind::Colon)?;
                on_failure = self.parse_on_failure()?;
                self.skip_newlines();
                self.expect(TokenKind::Dedent)?;
            }
            StmtKind::Action {
                venue,
                method,
                args,
                on_failure,
            }
        } else if self.check_keyword(Keyword::Emit) {
            self.advance();
            if matches!(self.peek_kind(), TokenKind::Ident(_)) && *self.peek_kind_at(1) == TokenKind::LParen {
                let name = self.expect_ident()?;
                self.advance(); // LParen
                let mut fields = Vec::new();
                if !self.check(&TokenKind::RParen) {
                    loop {
                        let key = self.expect_ident()?;
                        self.expect(TokenKind::Assign)?;
                        let value = self.parse_expr()?;
                        fields.push((key, value));
                        if self.check(&TokenKind::Comma) {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RParen)?;
                StmtKind::Emit {
                    name,
                    payload: Expr::Object(fields),
                }
            } else {
                let name = self.expect_string()?;
                self.expect(TokenKind::Colon)?;
                let payload = self.parse_expr()?;
                StmtKind::Emit { name, payload }
            }
        } else if self.check_keyword(Keyword::Wait) {
            self.advance();
            let duration = self.parse_expr()?;
            StmtKind::Wait { duration }
        } else if self.check_keyword(Keyword::Halt) {
            self.advance();
            StmtKind::Halt
        } else if self.check_keyword(Keyword::Atomic) {
            self.advance();
            let body = self.parse_nested_block()?;
            StmtKind::Atomic(body)
        } else if self.check_keyword(Keyword::Advisory) {
            self.advance();
            let advisor = if matches!(self.peek_kind(), TokenKind::VenueRef(_)) {
                Some(self.expect_venue_ref()?)
            } else {
                None
            };
            let prompt = self.expect_advisory_or_string()?;
            let mut timeout = None;
            if self.check_keyword(Keyword::Timeout) {
                self.advance();
                timeout = Some(self.parse_expr()?);
            }
            self.expect_keyword(Keyword::Fallback)?;
            let fallback = self.parse_expr()?;
            let output_binding = if self.check(&TokenKind::Arrow) {
                self.advance();
                Some(self.expect_ident()?)
            } else {
                None
            };
            let output_schema = if matches!(self.peek_kind(), TokenKind::Ident(s) if s == "schema") {
                self.advance();
                Some(self.parse_output_schema()?)
            } else {
                None
            };
            let mut skills = Vec::new();
            if self.check(&TokenKind::Colon) {
                self.advance();
                self.skip_newlines();
                self.expect(TokenKind::Indent)?;
                while let TokenKind::VenueRef(_) = self.peek_kind() {
                    skills.push(self.expect_venue_ref()?);
                    if self.check(&TokenKind::Comma) {
                        self.advance();
                    }
                }
                self.skip_newlines();
                self.expect(TokenKind::Dedent)?;
            }
            StmtKind::Advisory {
                advisor,
                prompt,
                timeout,
                fallback,
                skills,
                output_schema,
                output_binding,
            }
        } else {
            StmtKind::Compute(self.parse_expr()?)
        };
        Ok(Stmt { kind, pos })
    }

    fn parse_on_failure(&mut self) -> Result<OnFailure> {
        if self.check_keyword(Keyword::Revert) {
            self.advance();
            Ok(OnFailure::Revert)
        } else if self.check_keyword(Keyword::Continue) {
            self.advance();
            Ok(OnFailure::Continue)
        } else if self.check_keyword(Keyword::Retry) {
            self.advance();
            self.expect(TokenKind::LParen)?;
            let n = self.expect_number()? as u32;
            self.expect(TokenKind::RParen)?;
            Ok(OnFailure::Retry(n))
        } else {
            Err(self.error("expected revert, continue, or retry(n)"))
        }
    }

    fn parse_join_policy(&mut self) -> Result<JoinPolicy> {
        if self.check_keyword(Keyword::All) {
            self.advance();
            Ok(JoinPolicy::All)
        } else if self.check_keyword(Keyword::First) {
            self.advance();
            Ok(JoinPolicy::First)
        } else if self.check_keyword(Keyword::Any) {
            self.advance();
            self.expect(TokenKind::LParen)?;
            let n = self.expect_number()? as usize;
            self.expect(TokenKind::RParen)?;
            Ok(JoinPolicy::Any(n))
        } else if self.check_keyword(Keyword::Majority) {
            self.advance();
            Ok(JoinPolicy::Majority)
        } else if self.check_keyword(Keyword::Best) {
            self.advance();
            self.expect(TokenKind::LParen)?;
            let expr = self.parse_expr()?;
            let dir = if self.check_keyword(Keyword::Desc) {
                self.advance();
                SortDir::Desc
            } else if self.check_keyword(Keyword::Asc) {
                self.advance();
                SortDir::Asc
            } else {
                SortDir::Desc
            };
            self.expect(TokenKind::RParen)?;
            Ok(JoinPolicy::Best(Box::new(expr), dir))
        } else {
            Ok(JoinPolicy::All)
        }
    }

    fn parse_output_schema(&mut self) -> Result<OutputSchema> {
        match self.peek_kind().clone() {
            TokenKind::Ident(s) if s == "boolean" => {
                self.advance();
                Ok(OutputSchema::Boolean)
            }
            TokenKind::Ident(s) if s == "number" => {
                self.advance();
                Ok(OutputSchema::Number)
            }
            TokenKind::Ident(s) if s == "string" => {
                self.advance();
                Ok(OutputSchema::String)
            }
            TokenKind::Ident(s) if s == "enum" => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let mut values = Vec::new();
                if !self.check(&TokenKind::RParen) {
                    loop {
                        values.push(self.expect_string()?);
                        if self.check(&TokenKind::Comma) {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RParen)?;
                Ok(OutputSchema::Enum(values))
            }
            other => Err(self.error(format!(
                "expected an output schema (boolean/number/string/enum(...)), found {other:?}"
            ))),
        }
    }

    fn parse_pipeline_stage(&mut self) -> Result<PipelineStage> {
        if self.check_keyword(Keyword::Where) {
            self.advance();
            Ok(PipelineStage::Where(self.parse_expr()?))
        } else if self.check_keyword(Keyword::Sort) {
            self.advance();
            let expr = self.parse_expr()?;
            let dir = if self.check_keyword(Keyword::Desc) {
                self.advance();
                SortDir::Desc
            } else {
                if self.check_keyword(Keyword::Asc) {
                    self.advance();
                }
                SortDir::Asc
            };
            Ok(PipelineStage::Sort(expr, dir))
        } else if self.check_keyword(Keyword::Map) {
            self.advance();
            Ok(PipelineStage::Map(self.parse_expr()?))
        } else if self.check_keyword(Keyword::Take) {
            self.advance();
            Ok(PipelineStage::Take(self.expect_number()? as usize))
        } else if self.check_keyword(Keyword::Skip) {
            self.advance();
            Ok(PipelineStage::Skip(self.expect_number()? as usize))
        } else {
            Err(self.error("expected a pipeline stage (where/sort/map/take/skip)"))
        }
    }

    // ── Expressions (precedence climbing) ───────────────────────

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_and()?;
        while self.check(&TokenKind::Or) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Binary {
                op: BinaryOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_equality()?;
        while self.check(&TokenKind::And) {
            self.advance();
            let rhs = self.parse_equality()?;
            lhs = Expr::Binary {
                op: BinaryOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_comparison()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Eq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::NotEq,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_comparison()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::LtEq => BinaryOp::LtEq,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::GtEq => BinaryOp::GtEq,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if self.check(&TokenKind::Minus) {
            self.advance();
            let expr = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                expr: Box::new(expr),
            });
        }
        if self.check(&TokenKind::Not) {
            self.advance();
            let expr = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                expr: Box::new(expr),
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.check(&TokenKind::Dot) {
                self.advance();
                let field = self.expect_ident()?;
                expr = Expr::FieldAccess {
                    base: Box::new(expr),
                    field,
                };
            } else if self.check(&TokenKind::LBracket) {
                self.advance();
                let index = self.parse_expr()?;
                self.expect(TokenKind::RBracket)?;
                expr = Expr::Index {
                    base: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let kind = self.peek_kind().clone();
        match kind {
            TokenKind::Null => {
                self.advance();
                Ok(Expr::Null)
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Bool(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Bool(false))
            }
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::Number(n))
            }
            TokenKind::Percentage(p) => {
                self.advance();
                Ok(Expr::Percentage(p))
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(Expr::String(s))
            }
            TokenKind::Address(a) => {
                self.advance();
                Ok(Expr::Address(a))
            }
            TokenKind::VenueRef(v) => {
                self.advance();
                if self.check(&TokenKind::Dot) {
                    self.advance();
                    let method = self.expect_ident()?;
                    self.expect(TokenKind::LParen)?;
                    let args = self.parse_expr_list(&TokenKind::RParen)?;
                    self.expect(TokenKind::RParen)?;
                    Ok(Expr::MethodCall {
                        venue: v,
                        method,
                        args,
                    })
                } else {
                    Ok(Expr::VenueRef(v))
                }
            }
            TokenKind::Ident(name) => {
                self.advance();
                if self.check(&TokenKind::LParen) {
                    self.advance();
                    if name == "param" {
                        let target = self.expect_ident()?;
                        self.expect(TokenKind::RParen)?;
                        return Ok(Expr::Param(target));
                    }
                    if name == "index" {
                        let base = self.parse_expr()?;
                        self.expect(TokenKind::Comma)?;
                        let index = self.parse_expr()?;
                        self.expect(TokenKind::RParen)?;
                        return Ok(Expr::Index {
                            base: Box::new(base),
                            index: Box::new(index),
                        });
                    }
                    let args = self.parse_expr_list(&TokenKind::RParen)?;
                    self.expect(TokenKind::RParen)?;
                    Ok(Expr::Call { name, args })
                } else {
                    Ok(Expr::Ident(name))
                }
            }
            TokenKind::Keyword(Keyword::Persistent) => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let target = self.expect_ident()?;
                self.expect(TokenKind::RParen)?;
                Ok(Expr::Persistent(target))
            }
            TokenKind::Keyword(Keyword::Ephemeral) => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let target = self.expect_ident()?;
                self.expect(TokenKind::RParen)?;
                Ok(Expr::Ephemeral(target))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::LBracket => {
                self.advance();
                let items = self.parse_expr_list(&TokenKind::RBracket)?;
                self.expect(TokenKind::RBracket)?;
                Ok(Expr::Array(items))
            }
            TokenKind::LBrace => {
                self.advance();
                let mut fields = Vec::new();
                while !self.check(&TokenKind::RBrace) {
                    let key = self.expect_object_key()?;
                    self.expect(TokenKind::Colon)?;
                    let value = self.parse_expr()?;
                    fields.push((key, value));
                    if self.check(&TokenKind::Comma) {
                        self.advance();
                    } else {
                        break;
                    }
                }
                self.expect(TokenKind::RBrace)?;
                Ok(Expr::Object(fields))
            }
            _ => Err(self.error("expected an expression")),
        }
    }

    fn parse_expr_list(&mut self, terminator: &TokenKind) -> Result<Vec<Expr>> {
        let mut items = Vec::new();
        if self.check(terminator) {
            return Ok(items);
        }
        items.push(self.parse_expr()?);
        while self.check(&TokenKind::Comma) {
            self.advance();
            items.push(self.parse_expr()?);
        }
        Ok(items)
    }

    // ── Token helpers ────────────────────────────────────────────

    fn peek_kind(&self) -> &TokenKind {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn peek_kind_at(&self, offset: usize) -> &TokenKind {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn peek_pos(&self) -> Position {
        self.tokens[self.pos.min(self.tokens.len() - 1)].pos
    }

    fn advance(&mut self) -> &Token {
        let tok = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn check_keyword(&self, kw: Keyword) -> bool {
        matches!(self.peek_kind(), TokenKind::Keyword(k) if *k == kw)
    }

    fn skip_newlines(&mut self) {
        while self.check(&TokenKind::Newline) {
            self.advance();
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<()> {
        if self.check(&kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("expected {kind:?}, found {:?}", self.peek_kind())))
        }
    }

    fn expect_keyword(&mut self, kw: Keyword) -> Result<()> {
        if self.check_keyword(kw) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("expected keyword {kw:?}, found {:?}", self.peek_kind())))
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.peek_kind().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(self.error(format!("expected an identifier, found {other:?}"))),
        }
    }

    fn expect_object_key(&mut self) -> Result<String> {
        match self.peek_kind().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(s)
            }
            other => Err(self.error(format!("expected an object key, found {other:?}"))),
        }
    }

    fn expect_string(&mut self) -> Result<String> {
        match self.peek_kind().clone() {
            TokenKind::String(s) => {
                self.advance();
                Ok(s)
            }
            other => Err(self.error(format!("expected a string literal, found {other:?}"))),
        }
    }

    /// A spell name is usually a quoted string but a bare identifier is
    /// also accepted (`spell Minimal:`), matching the grammar's informal
    /// examples.
    fn expect_spell_name(&mut self) -> Result<String> {
        match self.peek_kind().clone() {
            TokenKind::String(s) => {
                self.advance();
                Ok(s)
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(self.error(format!("expected a spell name, found {other:?}"))),
        }
    }

    fn expect_address(&mut self) -> Result<String> {
        match self.peek_kind().clone() {
            TokenKind::Address(a) => {
                self.advance();
                Ok(a)
            }
            other => Err(self.error(format!("expected a 0x-address literal, found {other:?}"))),
        }
    }

    fn expect_advisory_or_string(&mut self) -> Result<String> {
        match self.peek_kind().clone() {
            TokenKind::Advisory(s) | TokenKind::String(s) => {
                self.advance();
                Ok(s)
            }
            other => Err(self.error(format!("expected an advisory prompt, found {other:?}"))),
        }
    }

    fn expect_venue_ref(&mut self) -> Result<String> {
        match self.peek_kind().clone() {
            TokenKind::VenueRef(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(self.error(format!("expected a venue reference (@name), found {other:?}"))),
        }
    }

    fn expect_number(&mut self) -> Result<f64> {
        match self.peek_kind().clone() {
            TokenKind::Number(n) => {
                self.advance();
                Ok(n)
            }
            other => Err(self.error(format!("expected a number, found {other:?}"))),
        }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::parse(message.into(), self.peek_pos())
    }
}
