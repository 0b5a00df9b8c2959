//! Compiled languages: the immutable parse table the engine runs on.
//!
//! A [`LanguageTable`] is plain data, serializable as a versioned artifact.
//! A [`Language`] wraps a table together with its compiled token matchers and
//! optional external scanner behind an [`Arc`], so one handle can be shared by
//! any number of parsers on any number of threads.

use crate::scanner::ExternalScanner;
use regex::bytes::Regex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Identifies a grammar symbol (token or node kind).
pub type Symbol = u16;

/// Identifies a parser state.
pub type StateId = u32;

/// Identifies a field name.
pub type FieldId = u16;

/// Identifies a production.
pub type ProductionId = u32;

/// The end-of-input symbol.
pub const END_SYMBOL: Symbol = 0;

/// The symbol of ERROR nodes and unrecognized-input tokens.
pub const ERROR_SYMBOL: Symbol = u16::MAX;

/// Version of the table format. Tables from other versions are rejected.
pub const LANGUAGE_VERSION: u32 = 1;

/// What a symbol is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolKind {
    /// End of input.
    End,
    /// Token matched by a literal or a pattern.
    Terminal,
    /// Token produced by the external scanner.
    External,
    /// Rule from the grammar.
    NonTerminal,
    /// Rule synthesized by the generator (repetitions).
    Auxiliary,
    /// Name that only exists as an alias.
    Alias,
}

/// Naming metadata for one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolInfo {
    /// Node kind shown to users.
    pub name: String,
    /// Named nodes come from named rules; anonymous ones from literals.
    pub named: bool,
    /// Hidden symbols are stored but never surfaced by navigation.
    pub visible: bool,
    /// Symbol category.
    pub kind: SymbolKind,
}

/// One table action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParseAction {
    /// Consume the lookahead and move to the state.
    Shift(StateId),
    /// Reduce by the production.
    Reduce(ProductionId),
    /// Input is complete.
    Accept,
}

/// Reduction metadata for a production.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionInfo {
    /// Symbol produced by the reduction.
    pub lhs: Symbol,
    /// Field name of each child step.
    pub fields: Vec<Option<FieldId>>,
    /// Alias of each child step.
    pub aliases: Vec<Option<Symbol>>,
    /// Dynamic precedence contributed by the production.
    pub dynamic_precedence: i32,
}

impl ProductionInfo {
    /// Number of non-extra children the production pops.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.fields.len()
    }
}

/// How a lexical rule matches text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenMatcher {
    /// Exact bytes.
    Literal(String),
    /// A regular expression, matched anchored at the current position.
    Pattern(String),
}

/// A lexical rule producing one terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexRule {
    /// Terminal produced on a match.
    pub symbol: Symbol,
    /// How text is matched.
    pub matcher: TokenMatcher,
    /// Lexical precedence, consulted between equal-length matches.
    pub precedence: i32,
    /// Only valid when no extra precedes it.
    pub immediate: bool,
}

/// The serializable table artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageTable {
    /// Table format version, see [`LANGUAGE_VERSION`].
    pub version: u32,
    /// Grammar name.
    pub name: String,
    /// Every symbol, indexed by [`Symbol`].
    pub symbols: Vec<SymbolInfo>,
    /// Field names, indexed by [`FieldId`].
    pub fields: Vec<String>,
    /// Productions, indexed by [`ProductionId`].
    pub productions: Vec<ProductionInfo>,
    /// Number of parser states.
    pub state_count: u32,
    /// Row-major `state x symbol` entries. For terminals, an index into
    /// `action_lists`; for nonterminals, the goto state plus one. Zero means
    /// no entry.
    pub parse_table: Vec<u32>,
    /// Distinct action lists. Index zero is the empty list.
    pub action_lists: Vec<Vec<ParseAction>>,
    /// Terminals valid in each lex state.
    pub lex_states: Vec<Vec<Symbol>>,
    /// Lex state of each parser state.
    pub state_lex_states: Vec<u16>,
    /// Lexical rules in declaration order.
    pub lex_rules: Vec<LexRule>,
    /// Tokens allowed anywhere.
    pub extras: Vec<Symbol>,
    /// Tokens produced by the external scanner, in scanner index order.
    pub externals: Vec<Symbol>,
    /// Keyword-extraction token.
    pub word: Option<Symbol>,
    /// Symbol of the root node.
    pub start_symbol: Symbol,
}

/// Errors raised while loading a table.
#[derive(Debug, thiserror::Error)]
pub enum LanguageError {
    /// The table was produced by an incompatible generator.
    #[error("table version {found} is not supported (expected {expected})")]
    VersionMismatch {
        /// Version found in the table.
        found: u32,
        /// Version this engine reads.
        expected: u32,
    },

    /// A token pattern failed to compile.
    #[error("invalid pattern for token '{token}': {source}")]
    InvalidPattern {
        /// Token name.
        token: String,
        /// Regex compilation error.
        #[source]
        source: Box<regex::Error>,
    },

    /// The grammar declares external tokens but no scanner was supplied.
    #[error("grammar '{0}' declares external tokens but no external scanner was provided")]
    MissingScanner(String),

    /// The table is internally inconsistent.
    #[error("malformed table: {0}")]
    Malformed(String),

    /// The artifact could not be read.
    #[error("table JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug)]
pub(crate) enum CompiledMatcher {
    Literal(Vec<u8>),
    Pattern(Regex),
}

impl CompiledMatcher {
    /// Length of the match at the start of `text`, if non-empty.
    pub(crate) fn match_len(&self, text: &[u8]) -> Option<usize> {
        let len = match self {
            Self::Literal(bytes) => text.starts_with(bytes).then_some(bytes.len())?,
            Self::Pattern(regex) => regex.find(text)?.end(),
        };
        (len > 0).then_some(len)
    }

    pub(crate) fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }
}

struct LanguageInner {
    table: LanguageTable,
    matchers: Vec<CompiledMatcher>,
    symbol_rules: FxHashMap<Symbol, usize>,
    extra: Vec<bool>,
    field_ids: FxHashMap<String, FieldId>,
    scanner: Option<Arc<dyn ExternalScanner>>,
}

/// A compiled grammar, cheap to clone and safe to share between threads.
#[derive(Clone)]
pub struct Language(Arc<LanguageInner>);

impl fmt::Debug for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Language")
            .field("name", &self.0.table.name)
            .field("symbols", &self.0.table.symbols.len())
            .field("states", &self.0.table.state_count)
            .field("external_scanner", &self.0.scanner.is_some())
            .finish()
    }
}

impl Language {
    /// Loads a table, compiling its token patterns.
    ///
    /// # Errors
    ///
    /// Fails on a version mismatch, an uncompilable pattern, a table whose
    /// dimensions disagree, or external tokens without a scanner.
    pub fn from_table(
        table: LanguageTable,
        scanner: Option<Arc<dyn ExternalScanner>>,
    ) -> Result<Self, LanguageError> {
        if table.version != LANGUAGE_VERSION {
            return Err(LanguageError::VersionMismatch {
                found: table.version,
                expected: LANGUAGE_VERSION,
            });
        }
        let expected_cells = table.state_count as usize * table.symbols.len();
        if table.parse_table.len() != expected_cells
            || table.state_lex_states.len() != table.state_count as usize
        {
            return Err(LanguageError::Malformed(format!(
                "expected {expected_cells} cells for {} states",
                table.state_count
            )));
        }
        if !table.externals.is_empty() && scanner.is_none() {
            return Err(LanguageError::MissingScanner(table.name.clone()));
        }

        let mut matchers = Vec::with_capacity(table.lex_rules.len());
        let mut symbol_rules = FxHashMap::default();
        for (index, rule) in table.lex_rules.iter().enumerate() {
            let matcher = match &rule.matcher {
                TokenMatcher::Literal(text) => CompiledMatcher::Literal(text.as_bytes().to_vec()),
                TokenMatcher::Pattern(source) => {
                    let anchored = format!(r"\A(?:{source})");
                    let regex = Regex::new(&anchored).map_err(|source| {
                        LanguageError::InvalidPattern {
                            token: table
                                .symbols
                                .get(usize::from(rule.symbol))
                                .map_or_else(String::new, |info| info.name.clone()),
                            source: Box::new(source),
                        }
                    })?;
                    CompiledMatcher::Pattern(regex)
                }
            };
            matchers.push(matcher);
            symbol_rules.entry(rule.symbol).or_insert(index);
        }

        let mut extra = vec![false; table.symbols.len()];
        for &symbol in &table.extras {
            if let Some(slot) = extra.get_mut(usize::from(symbol)) {
                *slot = true;
            }
        }
        let field_ids = table
            .fields
            .iter()
            .enumerate()
            .filter_map(|(index, name)| Some((name.clone(), FieldId::try_from(index).ok()?)))
            .collect();

        Ok(Self(Arc::new(LanguageInner {
            table,
            matchers,
            symbol_rules,
            extra,
            field_ids,
            scanner,
        })))
    }

    /// Loads a table artifact from JSON.
    ///
    /// # Errors
    ///
    /// See [`Language::from_table`]; also fails on malformed JSON.
    pub fn from_json(
        json: &str,
        scanner: Option<Arc<dyn ExternalScanner>>,
    ) -> Result<Self, LanguageError> {
        Self::from_table(serde_json::from_str(json)?, scanner)
    }

    /// The underlying table artifact.
    #[must_use]
    pub fn table(&self) -> &LanguageTable {
        &self.0.table
    }

    /// Grammar name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.table.name
    }

    /// Table format version.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.0.table.version
    }

    /// Number of symbols, excluding the ERROR symbol.
    #[must_use]
    pub fn symbol_count(&self) -> usize {
        self.0.table.symbols.len()
    }

    /// Number of parser states.
    #[must_use]
    pub fn state_count(&self) -> usize {
        self.0.table.state_count as usize
    }

    /// Node kind of a symbol.
    #[must_use]
    pub fn symbol_name(&self, symbol: Symbol) -> Option<&str> {
        if symbol == ERROR_SYMBOL {
            return Some("ERROR");
        }
        self.info(symbol).map(|info| info.name.as_str())
    }

    /// Whether nodes of this symbol are named.
    #[must_use]
    pub fn symbol_is_named(&self, symbol: Symbol) -> bool {
        symbol == ERROR_SYMBOL || self.info(symbol).is_some_and(|info| info.named)
    }

    /// Whether nodes of this symbol appear during navigation.
    #[must_use]
    pub fn symbol_is_visible(&self, symbol: Symbol) -> bool {
        symbol == ERROR_SYMBOL || self.info(symbol).is_some_and(|info| info.visible)
    }

    /// Every symbol with the given kind name and namedness.
    #[must_use]
    pub fn symbols_for_kind(&self, kind: &str, named: bool) -> Vec<Symbol> {
        if named && kind == "ERROR" {
            return vec![ERROR_SYMBOL];
        }
        self.0
            .table
            .symbols
            .iter()
            .enumerate()
            .filter(|(_, info)| info.name == kind && info.named == named && info.visible)
            .filter_map(|(index, _)| Symbol::try_from(index).ok())
            .collect()
    }

    /// First symbol with the given kind name and namedness.
    #[must_use]
    pub fn id_for_node_kind(&self, kind: &str, named: bool) -> Option<Symbol> {
        self.symbols_for_kind(kind, named).into_iter().next()
    }

    /// Number of distinct field names.
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.0.table.fields.len()
    }

    /// Name of a field.
    #[must_use]
    pub fn field_name_for_id(&self, id: FieldId) -> Option<&str> {
        self.0.table.fields.get(usize::from(id)).map(String::as_str)
    }

    /// Id of a field name.
    #[must_use]
    pub fn field_id_for_name(&self, name: &str) -> Option<FieldId> {
        self.0.field_ids.get(name).copied()
    }

    /// Symbol the root node is built from.
    #[must_use]
    pub fn start_symbol(&self) -> Symbol {
        self.0.table.start_symbol
    }

    fn info(&self, symbol: Symbol) -> Option<&SymbolInfo> {
        self.0.table.symbols.get(usize::from(symbol))
    }

    fn cell(&self, state: StateId, symbol: Symbol) -> u32 {
        let table = &self.0.table;
        if usize::from(symbol) >= table.symbols.len() {
            return 0;
        }
        let index = state as usize * table.symbols.len() + usize::from(symbol);
        table.parse_table.get(index).copied().unwrap_or(0)
    }

    /// Actions for a terminal lookahead in a state.
    pub(crate) fn actions(&self, state: StateId, symbol: Symbol) -> &[ParseAction] {
        if self.is_nonterminal(symbol) {
            return &[];
        }
        let entry = self.cell(state, symbol) as usize;
        self.0
            .table
            .action_lists
            .get(entry)
            .map_or(&[][..], Vec::as_slice)
    }

    /// Whether any action exists for the terminal in the state.
    pub(crate) fn has_actions(&self, state: StateId, symbol: Symbol) -> bool {
        !self.actions(state, symbol).is_empty()
    }

    /// Goto state after reducing to a nonterminal.
    pub(crate) fn goto(&self, state: StateId, symbol: Symbol) -> Option<StateId> {
        if !self.is_nonterminal(symbol) {
            return None;
        }
        self.cell(state, symbol).checked_sub(1)
    }

    pub(crate) fn is_nonterminal(&self, symbol: Symbol) -> bool {
        self.info(symbol).is_some_and(|info| {
            matches!(
                info.kind,
                SymbolKind::NonTerminal | SymbolKind::Auxiliary | SymbolKind::Alias
            )
        })
    }

    pub(crate) fn lex_state(&self, state: StateId) -> u16 {
        self.0
            .table
            .state_lex_states
            .get(state as usize)
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn valid_terminals(&self, lex_state: u16) -> &[Symbol] {
        self.0
            .table
            .lex_states
            .get(usize::from(lex_state))
            .map_or(&[][..], Vec::as_slice)
    }

    pub(crate) fn is_extra(&self, symbol: Symbol) -> bool {
        self.0
            .extra
            .get(usize::from(symbol))
            .copied()
            .unwrap_or(false)
    }

    pub(crate) fn production(&self, id: ProductionId) -> Option<&ProductionInfo> {
        self.0.table.productions.get(id as usize)
    }

    pub(crate) fn lex_rules(&self) -> impl Iterator<Item = (&LexRule, &CompiledMatcher)> {
        self.0.table.lex_rules.iter().zip(&self.0.matchers)
    }

    pub(crate) fn matcher_for(&self, symbol: Symbol) -> Option<&CompiledMatcher> {
        self.0
            .symbol_rules
            .get(&symbol)
            .and_then(|&index| self.0.matchers.get(index))
    }

    pub(crate) fn externals(&self) -> &[Symbol] {
        &self.0.table.externals
    }

    pub(crate) fn scanner(&self) -> Option<&dyn ExternalScanner> {
        self.0.scanner.as_deref()
    }

    pub(crate) fn word(&self) -> Option<Symbol> {
        self.0.table.word
    }

    /// Whether two handles share the same compiled table.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_table() -> LanguageTable {
        LanguageTable {
            version: LANGUAGE_VERSION,
            name: "tiny".into(),
            symbols: vec![
                SymbolInfo {
                    name: "end".into(),
                    named: false,
                    visible: false,
                    kind: SymbolKind::End,
                },
                SymbolInfo {
                    name: "x".into(),
                    named: false,
                    visible: true,
                    kind: SymbolKind::Terminal,
                },
                SymbolInfo {
                    name: "root".into(),
                    named: true,
                    visible: true,
                    kind: SymbolKind::NonTerminal,
                },
            ],
            fields: vec!["body".into()],
            productions: vec![ProductionInfo {
                lhs: 2,
                fields: vec![Some(0)],
                aliases: vec![None],
                dynamic_precedence: 0,
            }],
            state_count: 1,
            parse_table: vec![0, 1, 0],
            action_lists: vec![vec![], vec![ParseAction::Shift(0)]],
            lex_states: vec![vec![1]],
            state_lex_states: vec![0],
            lex_rules: vec![LexRule {
                symbol: 1,
                matcher: TokenMatcher::Pattern("x+".into()),
                precedence: 0,
                immediate: false,
            }],
            extras: vec![],
            externals: vec![],
            word: None,
            start_symbol: 2,
        }
    }

    #[test]
    fn test_lookups() {
        let language = Language::from_table(tiny_table(), None).unwrap();
        assert_eq!(language.symbol_name(2), Some("root"));
        assert_eq!(language.symbol_name(ERROR_SYMBOL), Some("ERROR"));
        assert_eq!(language.id_for_node_kind("x", false), Some(1));
        assert_eq!(language.id_for_node_kind("x", true), None);
        assert_eq!(language.field_id_for_name("body"), Some(0));
        assert_eq!(language.actions(0, 1), &[ParseAction::Shift(0)]);
        assert!(language.actions(0, 0).is_empty());
        assert_eq!(language.goto(0, 2), None);
    }

    #[test]
    fn test_patterns_are_anchored() {
        let language = Language::from_table(tiny_table(), None).unwrap();
        let matcher = language.matcher_for(1).unwrap();
        assert_eq!(matcher.match_len(b"xxy"), Some(2));
        assert_eq!(matcher.match_len(b"yxx"), None);
    }

    #[test]
    fn test_version_mismatch_is_rejected() {
        let mut table = tiny_table();
        table.version = 99;
        assert!(matches!(
            Language::from_table(table, None),
            Err(LanguageError::VersionMismatch { found: 99, .. })
        ));
    }

    #[test]
    fn test_table_round_trips_through_json() {
        let table = tiny_table();
        let json = serde_json::to_string(&table).unwrap();
        let language = Language::from_json(&json, None).unwrap();
        assert_eq!(language.table(), &table);
    }
}
