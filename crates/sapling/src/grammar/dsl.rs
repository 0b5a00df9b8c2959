//! Rule combinators for writing grammars in Rust.
//!
//! These mirror the functions of Tree-sitter's `grammar.js` DSL, so a grammar
//! reads the same in either place:
//!
//! ```
//! use sapling::grammar::dsl::{choice, pattern, prec_left, seq, string, sym};
//! use sapling::Grammar;
//!
//! let grammar = Grammar::new("arith")
//!     .rule("expr", choice(vec![
//!         prec_left(1, seq(vec![sym("expr"), string("+"), sym("expr")])),
//!         sym("number"),
//!     ]))
//!     .rule("number", pattern(r"\d+"));
//! assert_eq!(grammar.start_rule(), Some("expr"));
//! ```

use super::rules::{Rule, RuleType, RuleValue};

/// The empty rule.
#[must_use]
pub fn blank() -> Rule {
    Rule::bare(RuleType::Blank)
}

/// A literal string token.
#[must_use]
pub fn string(value: impl Into<String>) -> Rule {
    Rule {
        value: Some(RuleValue::String(value.into())),
        ..Rule::bare(RuleType::String)
    }
}

/// A regular-expression token.
#[must_use]
pub fn pattern(value: impl Into<String>) -> Rule {
    Rule {
        value: Some(RuleValue::String(value.into())),
        ..Rule::bare(RuleType::Pattern)
    }
}

/// A reference to another rule.
#[must_use]
pub fn sym(name: impl Into<String>) -> Rule {
    Rule {
        name: Some(name.into()),
        ..Rule::bare(RuleType::Symbol)
    }
}

/// Rules in sequence.
#[must_use]
pub fn seq(members: Vec<Rule>) -> Rule {
    Rule {
        members,
        ..Rule::bare(RuleType::Seq)
    }
}

/// One of several alternatives.
#[must_use]
pub fn choice(members: Vec<Rule>) -> Rule {
    Rule {
        members,
        ..Rule::bare(RuleType::Choice)
    }
}

/// Zero or one occurrence.
#[must_use]
pub fn optional(rule: Rule) -> Rule {
    choice(vec![rule, blank()])
}

fn wrap(rule_type: RuleType, rule: Rule) -> Rule {
    Rule {
        content: Some(Box::new(rule)),
        ..Rule::bare(rule_type)
    }
}

fn wrap_with_value(rule_type: RuleType, value: RuleValue, rule: Rule) -> Rule {
    Rule {
        value: Some(value),
        ..wrap(rule_type, rule)
    }
}

/// Zero or more occurrences.
#[must_use]
pub fn repeat(rule: Rule) -> Rule {
    wrap(RuleType::Repeat, rule)
}

/// One or more occurrences.
#[must_use]
pub fn repeat1(rule: Rule) -> Rule {
    wrap(RuleType::Repeat1, rule)
}

/// Collapses a rule into a single token.
#[must_use]
pub fn token(rule: Rule) -> Rule {
    wrap(RuleType::Token, rule)
}

/// A token that may not be preceded by extras.
#[must_use]
pub fn immediate_token(rule: Rule) -> Rule {
    wrap(RuleType::ImmediateToken, rule)
}

/// Static precedence. Inside [`token`] it sets lexical precedence instead.
#[must_use]
pub fn prec(level: i32, rule: Rule) -> Rule {
    wrap_with_value(RuleType::Prec, RuleValue::Integer(level), rule)
}

/// Left-associative precedence.
#[must_use]
pub fn prec_left(level: i32, rule: Rule) -> Rule {
    wrap_with_value(RuleType::PrecLeft, RuleValue::Integer(level), rule)
}

/// Right-associative precedence.
#[must_use]
pub fn prec_right(level: i32, rule: Rule) -> Rule {
    wrap_with_value(RuleType::PrecRight, RuleValue::Integer(level), rule)
}

/// Precedence by name, resolved against the grammar's `precedences` lists.
#[must_use]
pub fn prec_named(name: impl Into<String>, rule: Rule) -> Rule {
    wrap_with_value(RuleType::Prec, RuleValue::String(name.into()), rule)
}

/// Precedence applied at runtime, when choosing between ambiguous parses.
#[must_use]
pub fn prec_dynamic(level: i32, rule: Rule) -> Rule {
    wrap_with_value(RuleType::PrecDynamic, RuleValue::Integer(level), rule)
}

/// Names the edge to the child nodes produced by `rule`.
#[must_use]
pub fn field(name: impl Into<String>, rule: Rule) -> Rule {
    Rule {
        name: Some(name.into()),
        ..wrap(RuleType::Field, rule)
    }
}

/// Renames the node produced by `rule`.
#[must_use]
pub fn alias(rule: Rule, name: impl Into<String>, named: bool) -> Rule {
    Rule {
        value: Some(RuleValue::String(name.into())),
        named: Some(named),
        ..wrap(RuleType::Alias, rule)
    }
}
