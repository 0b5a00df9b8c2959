//! Core structures and parsing logic for Tree-sitter style grammars.
//!
//! This module defines the in-memory representation of a grammar, either
//! deserialized from Tree-sitter's JSON format with [`serde_json`] or written
//! in Rust with the combinators in [`dsl`]. The table generator consumes it.

pub mod dsl;
pub mod rules;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use rules::{Rule, RuleType, RuleValue};

/// Represents a full grammar definition.
///
/// This structure mirrors the serialized JSON format produced by
/// `tree-sitter generate --json`. It captures the complete rule set along with
/// auxiliary metadata such as precedences, conflicts, and supertypes.
///
/// Rules are kept in declaration order. Unless [`Grammar::start`] names one
/// explicitly, the first rule is the start rule.
///
/// See <https://tree-sitter.github.io/tree-sitter/assets/schemas/grammar.schema.json>
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grammar {
    /// Optional `$schema` field from the JSON, typically used for schema
    /// validation or editor integration.
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// The short name of the grammar (e.g. `"javascript"` or `"jcl"`).
    pub name: String,

    /// Optional name of a base grammar that this one inherits from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherits: Option<String>,

    /// Explicit start rule. Defaults to the first entry of `rules`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,

    /// All rule identifiers mapped to their definitions, in declaration order.
    pub rules: IndexMap<String, Rule>,

    /// "Extras" that may appear between other tokens, such as whitespace or comments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Vec<Rule>>,

    /// Rules implemented externally via a scanner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub externals: Option<Vec<Rule>>,

    /// Names of rules that should be inlined into other rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline: Option<Vec<String>>,

    /// Ordered precedence lists. Earlier entries bind tighter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precedences: Option<Vec<Vec<Rule>>>,

    /// Explicit conflict groups expected during parsing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflicts: Option<Vec<Vec<String>>>,

    /// Context-specific reserved word definitions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserved: Option<IndexMap<String, Vec<Rule>>>,

    /// The rule name used to identify word tokens (keywords, identifiers, etc.).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word: Option<String>,

    /// A list of node supertypes, grouping related syntactic forms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supertypes: Option<Vec<String>>,
}

/// Parse a JSON grammar definition into a strongly typed [`Grammar`] structure.
///
/// # Errors
///
/// Returns [`GrammarError::JsonParse`] if the provided string is not valid JSON
/// or fails schema deserialization.
pub fn parse_grammar(json: &str) -> Result<Grammar, GrammarError> {
    Ok(serde_json::from_str(json)?)
}

/// Possible errors raised during grammar parsing or validation.
#[derive(Debug, thiserror::Error)]
pub enum GrammarError {
    /// The input JSON was syntactically invalid or structurally mismatched.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Higher-level structural or semantic validation failure.
    #[error("validation error: {0}")]
    Validation(String),
}

impl Grammar {
    /// Starts an empty grammar with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
            inherits: None,
            start: None,
            rules: IndexMap::new(),
            extras: None,
            externals: None,
            inline: None,
            precedences: None,
            conflicts: None,
            reserved: None,
            word: None,
            supertypes: None,
        }
    }

    /// Adds (or replaces) a named rule.
    #[must_use]
    pub fn rule(mut self, name: impl Into<String>, rule: Rule) -> Self {
        self.rules.insert(name.into(), rule);
        self
    }

    /// Adds a rule that may appear between any two tokens.
    #[must_use]
    pub fn extra(mut self, rule: Rule) -> Self {
        self.extras.get_or_insert_with(Vec::new).push(rule);
        self
    }

    /// Declares a token produced by the external scanner.
    #[must_use]
    pub fn external(mut self, name: impl Into<String>) -> Self {
        self.externals
            .get_or_insert_with(Vec::new)
            .push(dsl::sym(name));
        self
    }

    /// Declares a group of rules whose LR conflicts are intentional.
    #[must_use]
    pub fn conflict(mut self, names: &[&str]) -> Self {
        self.conflicts
            .get_or_insert_with(Vec::new)
            .push(names.iter().map(ToString::to_string).collect());
        self
    }

    /// Marks a rule for inlining at every use site.
    #[must_use]
    pub fn inline(mut self, name: impl Into<String>) -> Self {
        self.inline.get_or_insert_with(Vec::new).push(name.into());
        self
    }

    /// Sets the keyword-extraction word token.
    #[must_use]
    pub fn word(mut self, name: impl Into<String>) -> Self {
        self.word = Some(name.into());
        self
    }

    /// Appends a named precedence list, highest first.
    #[must_use]
    pub fn precedences(mut self, names: &[&str]) -> Self {
        self.precedences
            .get_or_insert_with(Vec::new)
            .push(names.iter().map(|name| dsl::string(*name)).collect());
        self
    }

    /// Overrides the start rule.
    #[must_use]
    pub fn start(mut self, name: impl Into<String>) -> Self {
        self.start = Some(name.into());
        self
    }

    /// Name of the rule parsing starts from.
    #[must_use]
    pub fn start_rule(&self) -> Option<&str> {
        match &self.start {
            Some(name) => Some(name.as_str()),
            None => self.rules.keys().next().map(String::as_str),
        }
    }

    /// The effective extras. A grammar that never mentions extras gets
    /// whitespace, the same default Tree-sitter applies.
    #[must_use]
    pub fn effective_extras(&self) -> Vec<Rule> {
        self.extras
            .clone()
            .unwrap_or_else(|| vec![dsl::pattern(r"\s")])
    }

    /// Whether `name` was declared in the grammar's `conflicts` list together
    /// with every other symbol in `names`.
    #[must_use]
    pub fn declares_conflict(&self, names: &[&str]) -> bool {
        self.conflicts.as_ref().is_some_and(|groups| {
            groups
                .iter()
                .any(|group| names.iter().all(|name| group.iter().any(|g| g == name)))
        })
    }

    /// Serializes the grammar back to Tree-sitter's JSON format.
    ///
    /// # Errors
    ///
    /// Returns [`GrammarError::JsonParse`] if serialization fails.
    pub fn to_json(&self) -> Result<String, GrammarError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::dsl::{choice, pattern, prec_left, seq, string, sym};
    use super::*;

    #[test]
    fn test_parse_simple_grammar() {
        let json = r#"{
            "name": "test",
            "rules": {
                "source_file": {
                    "type": "SYMBOL",
                    "name": "expression"
                },
                "expression": {
                    "type": "CHOICE",
                    "members": [
                        {
                            "type": "STRING",
                            "value": "hello"
                        },
                        {
                            "type": "PATTERN",
                            "value": "[0-9]+"
                        }
                    ]
                }
            }
        }"#;

        let grammar = parse_grammar(json).unwrap();
        assert_eq!(grammar.name, "test");
        assert_eq!(grammar.rules.len(), 2);
        assert_eq!(grammar.start_rule(), Some("source_file"));
    }

    #[test]
    fn test_parse_precedence() {
        let json = r#"{
            "name": "test",
            "rules": {
                "expr": {
                    "type": "PREC_LEFT",
                    "value": 1,
                    "content": {
                        "type": "SEQ",
                        "members": [
                            {"type": "SYMBOL", "name": "expr"},
                            {"type": "STRING", "value": "+"},
                            {"type": "SYMBOL", "name": "expr"}
                        ]
                    }
                }
            }
        }"#;

        let grammar = parse_grammar(json).unwrap();
        let expr_rule = grammar.rules.get("expr").unwrap();
        assert_eq!(expr_rule.precedence(), Some(1));
        assert!(matches!(expr_rule.rule_type, RuleType::PrecLeft));
    }

    #[test]
    fn test_parse_rejects_unknown_rule_type() {
        let json = r#"{"name": "t", "rules": {"a": {"type": "NOPE"}}}"#;
        assert!(matches!(
            parse_grammar(json),
            Err(GrammarError::JsonParse(_))
        ));
    }

    #[test]
    fn test_builder_matches_json() {
        let built = Grammar::new("arith")
            .rule(
                "expr",
                choice(vec![
                    prec_left(1, seq(vec![sym("expr"), string("+"), sym("expr")])),
                    sym("number"),
                ]),
            )
            .rule("number", pattern(r"\d+"));

        let json = built.to_json().unwrap();
        let reparsed = parse_grammar(&json).unwrap();
        assert_eq!(reparsed, built);
        assert_eq!(reparsed.rules.keys().collect::<Vec<_>>(), ["expr", "number"]);
    }

    #[test]
    fn test_default_extras_are_whitespace() {
        let grammar = Grammar::new("g").rule("a", string("a"));
        assert_eq!(grammar.effective_extras(), vec![pattern(r"\s")]);

        let grammar = grammar.extra(pattern(" "));
        assert_eq!(grammar.effective_extras(), vec![pattern(" ")]);
    }
}
