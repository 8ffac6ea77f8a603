//! Recursive-descent parser: tokens to a surface-syntax AST.

pub mod ast;
mod parser;

pub use ast::*;
pub use parser::{ParseOutcome, Parser};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Tokenizer;

    fn parse_ok(src: &str) -> SpellAst {
        let tokens = Tokenizer::new(src).tokenize().expect("tokenize");
        let outcome = Parser::new(tokens).parse();
        assert!(outcome.errors.is_empty(), "errors: {:?}", outcome.errors);
        outcome.ast.expect("ast")
    }

    #[test]
    fn parses_minimal_manual_spell() {
        let src = "spell \"noop\":\n  on manual:\n    halt\n";
        let ast = parse_ok(src);
        assert_eq!(ast.name, "noop");
        assert_eq!(ast.triggers.len(), 1);
        assert_eq!(ast.triggers[0].trigger, Trigger::Manual);
        assert_eq!(ast.triggers[0].body.len(), 1);
        assert_eq!(ast.triggers[0].body[0].kind, StmtKind::Halt);
    }

    #[test]
    fn parses_let_and_if() {
        let src = "spell \"x\":\n  on manual:\n    let a = 1 + 2\n    if a > 2:\n      halt\n";
        let ast = parse_ok(src);
        let body = &ast.triggers[0].body;
        assert_eq!(body.len(), 2);
        assert!(matches!(body[0].kind, StmtKind::Let { .. }));
        assert!(matches!(body[1].kind, StmtKind::If { .. }));
    }

    #[test]
    fn recovers_from_malformed_statement() {
        let src = "spell \"x\":\n  on manual:\n    let = \n    halt\n";
        let tokens = Tokenizer::new(src).tokenize().unwrap();
        let outcome = Parser::new(tokens).parse();
        assert!(!outcome.errors.is_empty());
        let ast = outcome.ast.expect("partial ast despite error");
        assert!(ast.triggers[0].body.iter().any(|s| s.kind == StmtKind::Halt));
    }

    #[test]
    fn parses_multiple_trigger_handlers() {
        let src = "spell \"x\":\n  on manual:\n    halt\n  on hourly:\n    wait 1\n";
        let ast = parse_ok(src);
        assert_eq!(ast.triggers.len(), 2);
        assert_eq!(ast.triggers[1].trigger, Trigger::Hourly);
    }

    #[test]
    fn parses_params_state_guards_and_aliases() {
        let src = "spell \"x\":\n  version: \"1.0\"\n  params:\n    amount = 10\n  state:\n    persistent:\n      total = 0\n    ephemeral:\n      seen = false\n  guards:\n    nonNegative: total >= 0 error \"must stay non-negative\"\n  aliases:\n    main = @uniswap ethereum 0xabc\n  on manual:\n    halt\n";
        let ast = parse_ok(src);
        assert_eq!(ast.version.as_deref(), Some("1.0"));
        assert_eq!(ast.params.len(), 1);
        assert_eq!(ast.state_persistent.len(), 1);
        assert_eq!(ast.state_ephemeral.len(), 1);
        assert_eq!(ast.guards.len(), 1);
        assert_eq!(ast.aliases.len(), 1);
        assert_eq!(ast.aliases[0].alias, "main");
        assert_eq!(ast.aliases[0].chain, "ethereum");
    }

    #[test]
    fn single_quoted_strings_are_equivalent_to_double_quoted() {
        let src = "spell 'x':\n  on manual:\n    emit 'evt': {a: 1}\n";
        let ast = parse_ok(src);
        assert_eq!(ast.name, "x");
    }
}
