//! AST to `SpellSource`: trigger lowering and venue-group flattening.
//!
//! This pass removes surface sugar that has no bearing on IR generation —
//! `hourly`/`daily` become explicit cron expressions, `schedule(...)`/
//! `event(...)` pass their argument through, and `use @a, @b` groups are
//! deduplicated into a flat venue list — so `ir::generator` only ever sees
//! one canonical trigger shape per handler. Declarative sections (params,
//! state, guards, aliases) pass through unchanged; they have no sugar to
//! remove, only validation the generator performs once it has bindings to
//! check them against.

use crate::parser::{AliasDef, GuardDef, ParamDef, SpellAst, StateVarDef, Stmt, Trigger};
use crate::types::Result;

/// Canonical, desugared trigger.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerSpec {
    Manual,
    Cron(String),
    Event(String),
}

/// One handler's lowered trigger plus its statement body.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerEntry {
    pub trigger: TriggerSpec,
    pub body: Vec<Stmt>,
}

/// The neutral representation handed to IR generation.
#[derive(Debug, Clone, PartialEq)]
pub struct SpellSource {
    pub name: String,
    pub version: Option<String>,
    pub params: Vec<ParamDef>,
    pub state_persistent: Vec<StateVarDef>,
    pub state_ephemeral: Vec<StateVarDef>,
    pub guards: Vec<GuardDef>,
    pub aliases: Vec<AliasDef>,
    pub venues: Vec<String>,
    pub triggers: Vec<TriggerEntry>,
}

pub fn transform(ast: SpellAst) -> Result<SpellSource> {
    let mut venues = Vec::new();
    for v in ast.venues {
        if !venues.contains(&v) {
            venues.push(v);
        }
    }

    let triggers = ast
        .triggers
        .into_iter()
        .map(|handler| TriggerEntry {
            trigger: lower_trigger(handler.trigger),
            body: handler.body,
        })
        .collect();

    Ok(SpellSource {
        name: ast.name,
        version: ast.version,
        params: ast.params,
        state_persistent: ast.state_persistent,
        state_ephemeral: ast.state_ephemeral,
        guards: ast.guards,
        aliases: ast.aliases,
        venues,
        triggers,
    })
}

fn lower_trigger(trigger: Trigger) -> TriggerSpec {
    match trigger {
        Trigger::Manual => TriggerSpec::Manual,
        Trigger::Hourly => TriggerSpec::Cron("0 * * * *".to_string()),
        Trigger::Daily => TriggerSpec::Cron("0 0 * * *".to_string()),
        Trigger::Schedule(cron) => TriggerSpec::Cron(cron),
        Trigger::Event(name) => TriggerSpec::Event(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Tokenizer;
    use crate::parser::Parser;

    fn transform_src(src: &str) -> SpellSource {
        let tokens = Tokenizer::new(src).tokenize().unwrap();
        let outcome = Parser::new(tokens).parse();
        transform(outcome.ast.unwrap()).unwrap()
    }

    #[test]
    fn hourly_lowers_to_cron() {
        let source = transform_src("spell \"x\":\n  on hourly:\n    halt\n");
        assert_eq!(source.triggers[0].trigger, TriggerSpec::Cron("0 * * * *".to_string()));
    }

    #[test]
    fn venue_groups_are_deduplicated() {
        let src = "spell \"x\":\n  use @a, @b, @a\n  on manual:\n    halt\n";
        let source = transform_src(src);
        assert_eq!(source.venues, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn multiple_triggers_each_keep_their_own_body() {
        let src = "spell \"x\":\n  on manual:\n    halt\n  on hourly:\n    wait 5\n";
        let source = transform_src(src);
        assert_eq!(source.triggers.len(), 2);
        assert_eq!(source.triggers[0].trigger, TriggerSpec::Manual);
        assert_eq!(source.triggers[1].trigger, TriggerSpec::Cron("0 * * * *".to_string()));
    }
}
