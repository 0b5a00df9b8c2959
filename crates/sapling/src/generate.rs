//! Compiles a [`Grammar`] into a [`LanguageTable`].
//!
//! Generation runs in two passes: [`prepare`] numbers symbols and flattens
//! rules into productions, then `tables` builds the LR(1) automaton and
//! resolves conflicts with precedence and associativity. Equal-core states
//! are merged unless their tokens could be confused. Conflicts that remain
//! become multi-action cells that the parser explores in parallel.

mod prepare;
mod tables;

use crate::grammar::Grammar;
use crate::language::{Language, LanguageError, LanguageTable, ProductionInfo, LANGUAGE_VERSION};
use crate::scanner::ExternalScanner;
use crate::validate::{validate, ValidationError};
use std::sync::Arc;

/// Errors raised while compiling a grammar.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// The grammar defines no rules.
    #[error("grammar has no rules")]
    EmptyGrammar,

    /// Structural validation failed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A rule or declaration names a symbol that is not defined.
    #[error("undefined symbol '{0}'")]
    UndefinedSymbol(String),

    /// The start rule is a single token.
    #[error("start rule '{0}' must not be a token")]
    TokenStartRule(String),

    /// The word token names something other than a token.
    #[error("word token '{0}' is not a token rule")]
    InvalidWord(String),

    /// A rule node lacks its value.
    #[error("{0} rule is missing its value")]
    MissingValue(&'static str),

    /// A rule node lacks its content.
    #[error("{0} rule is missing its content")]
    MissingContent(&'static str),

    /// An external token is declared with something other than a name or string.
    #[error("external tokens must be names or strings, found {0}")]
    InvalidExternal(&'static str),

    /// A token contains a rule kind that cannot be matched lexically.
    #[error("{0} rules cannot appear inside a token")]
    NonLexicalToken(&'static str),

    /// An extra is not a token.
    #[error("extra '{0}' is not a token")]
    NonTokenExtra(String),

    /// The grammar needs more symbols than the table format holds.
    #[error("too many symbols")]
    TooManySymbols,

    /// The automaton needs more states than the table format holds.
    #[error("too many parser states")]
    TooManyStates,

    /// A rule expands into too many alternatives.
    #[error("rule '{0}' expands into too many alternatives")]
    TooManyAlternatives(String),

    /// An inline rule refers to itself.
    #[error("inline rule '{0}' is recursive")]
    RecursiveInline(String),

    /// A named precedence is not listed in `precedences`.
    #[error("undefined precedence '{0}'")]
    UndefinedPrecedence(String),

    /// The generated table could not be loaded.
    #[error(transparent)]
    Language(#[from] LanguageError),
}

/// Compiles a grammar into a table artifact.
///
/// # Errors
///
/// Returns an error if the grammar is invalid or cannot be lowered into a
/// table. Unresolved conflicts are not errors; they are logged and kept.
pub fn generate(grammar: &Grammar) -> Result<LanguageTable, GenerateError> {
    validate(grammar)?;
    let prepared = prepare::prepare(grammar)?;
    tracing::debug!(
        grammar = %grammar.name,
        symbols = prepared.symbols.len(),
        productions = prepared.productions.len(),
        "prepared grammar"
    );
    let tables = tables::build(&prepared)?;

    let productions = prepared
        .productions
        .iter()
        .map(|production| ProductionInfo {
            lhs: production.lhs,
            fields: production.steps.iter().map(|step| step.field).collect(),
            aliases: production.steps.iter().map(|step| step.alias).collect(),
            dynamic_precedence: production.dynamic_precedence,
        })
        .collect();

    tracing::info!(
        grammar = %grammar.name,
        states = tables.state_count,
        "generated parse table"
    );

    Ok(LanguageTable {
        version: LANGUAGE_VERSION,
        name: grammar.name.clone(),
        symbols: prepared.symbols,
        fields: prepared.fields,
        productions,
        state_count: tables.state_count,
        parse_table: tables.parse_table,
        action_lists: tables.action_lists,
        lex_states: tables.lex_states,
        state_lex_states: tables.state_lex_states,
        lex_rules: prepared.lex_rules,
        extras: prepared.extras,
        externals: prepared.externals,
        word: prepared.word,
        start_symbol: prepared.start,
    })
}

impl Language {
    /// Compiles a grammar without external tokens.
    ///
    /// # Errors
    ///
    /// See [`generate`] and [`Language::from_table`].
    pub fn generate(grammar: &Grammar) -> Result<Self, GenerateError> {
        Ok(Self::from_table(generate(grammar)?, None)?)
    }

    /// Compiles a grammar whose external tokens come from `scanner`.
    ///
    /// # Errors
    ///
    /// See [`generate`] and [`Language::from_table`].
    pub fn generate_with_scanner(
        grammar: &Grammar,
        scanner: Arc<dyn ExternalScanner>,
    ) -> Result<Self, GenerateError> {
        Ok(Self::from_table(generate(grammar)?, Some(scanner))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::dsl::{choice, field, pattern, prec_left, seq, string, sym};
    use crate::language::SymbolKind;

    #[test]
    fn test_generate_builds_loadable_table() {
        let grammar = Grammar::new("arith")
            .rule(
                "expr",
                choice(vec![
                    prec_left(
                        1,
                        seq(vec![
                            field("left", sym("expr")),
                            string("+"),
                            field("right", sym("expr")),
                        ]),
                    ),
                    sym("number"),
                ]),
            )
            .rule("number", pattern(r"\d+"));
        let language = Language::generate(&grammar).unwrap();
        assert_eq!(language.name(), "arith");
        assert_eq!(language.symbol_name(language.start_symbol()), Some("expr"));
        assert_eq!(language.field_id_for_name("right"), Some(1));
        assert!(language.state_count() > 1);
    }

    #[test]
    fn test_generate_is_deterministic() {
        let grammar = Grammar::new("list")
            .rule("list", crate::grammar::dsl::repeat(sym("item")))
            .rule("item", choice(vec![string("a"), string("b")]));
        assert_eq!(generate(&grammar).unwrap(), generate(&grammar).unwrap());
    }

    #[test]
    fn test_externals_require_a_scanner() {
        let grammar = Grammar::new("ext")
            .rule("doc", sym("raw"))
            .external("raw");
        let table = generate(&grammar).unwrap();
        assert_eq!(table.symbols[1].kind, SymbolKind::External);
        assert!(matches!(
            Language::generate(&grammar),
            Err(GenerateError::Language(LanguageError::MissingScanner(_)))
        ));
    }

    #[test]
    fn test_undefined_symbol_is_rejected() {
        let grammar = Grammar::new("bad").rule("doc", sym("missing"));
        assert!(generate(&grammar).is_err());
    }
}
