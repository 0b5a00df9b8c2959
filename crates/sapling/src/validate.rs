//! Validation routines for grammars.
//!
//! This module performs structural checks over [`Grammar`](crate::grammar::Grammar)
//! definitions, such as verifying symbol references, ensuring all rules are reachable,
//! detecting left recursion, and confirming precedence consistency. It runs
//! before table generation and from the `sapling validate` command.

use crate::grammar::{Grammar, Rule, RuleType};
use rustc_hash::{FxHashMap, FxHashSet};

/// Represents a validation failure encountered when checking a grammar.
///
/// Validation errors indicate issues such as undefined symbols or an empty
/// rule set. Softer findings (unreachable rules, mixed precedences) are only
/// logged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    /// The descriptive human-readable error message.
    pub message: String,
}

impl ValidationError {
    /// Creates a new [`ValidationError`] from a message string.
    fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

/// Performs semantic validation of a [`Grammar`](crate::grammar::Grammar).
///
/// This function runs several consistency passes over the grammar:
///
/// - Checks that the grammar has a start rule.
/// - Checks that all referenced symbols are defined.
/// - Warns about unreachable rules.
/// - Reports immediate left recursion.
/// - Verifies precedence consistency.
///
/// # Errors
///
/// Returns a [`ValidationError`] if any structural rule violation is detected.
pub fn validate(grammar: &Grammar) -> Result<(), ValidationError> {
    let start = grammar
        .start_rule()
        .ok_or_else(|| ValidationError::new("grammar has no rules"))?;
    if !grammar.rules.contains_key(start) {
        return Err(ValidationError::new(format!(
            "start rule '{start}' is not defined"
        )));
    }

    check_undefined_symbols(grammar)?;
    check_unreachable_rules(grammar, start);
    check_left_recursion(grammar);
    check_precedence(grammar);

    Ok(())
}

fn defined_names(grammar: &Grammar) -> FxHashSet<&str> {
    let mut defined: FxHashSet<&str> = grammar.rules.keys().map(String::as_str).collect();
    for external in grammar.externals.iter().flatten() {
        if let Some(name) = external.symbol_name() {
            defined.insert(name);
        }
    }
    defined
}

fn check_undefined_symbols(grammar: &Grammar) -> Result<(), ValidationError> {
    let defined = defined_names(grammar);

    for (rule_name, rule) in &grammar.rules {
        check_rule_symbols(rule, &defined, rule_name)?;
    }
    for extra in grammar.extras.iter().flatten() {
        check_rule_symbols(extra, &defined, "extras")?;
    }

    let named_lists = [
        ("word", grammar.word.iter().collect::<Vec<_>>()),
        ("inline", grammar.inline.iter().flatten().collect()),
        ("supertypes", grammar.supertypes.iter().flatten().collect()),
        ("conflicts", grammar.conflicts.iter().flatten().flatten().collect()),
    ];
    for (context, names) in named_lists {
        if let Some(name) = names.into_iter().find(|name| !defined.contains(name.as_str())) {
            return Err(ValidationError::new(format!(
                "undefined symbol '{name}' referenced in {context}"
            )));
        }
    }

    Ok(())
}

fn check_rule_symbols(
    rule: &Rule,
    defined: &FxHashSet<&str>,
    context: &str,
) -> Result<(), ValidationError> {
    if let Some(name) = rule.symbol_name() {
        if !defined.contains(name) {
            return Err(ValidationError::new(format!(
                "undefined symbol '{name}' referenced in rule '{context}'"
            )));
        }
    }
    if matches!(rule.rule_type, RuleType::Symbol) && rule.name.is_none() {
        return Err(ValidationError::new(format!(
            "SYMBOL without a name in rule '{context}'"
        )));
    }
    for child in rule.children() {
        check_rule_symbols(child, defined, context)?;
    }
    Ok(())
}

fn check_unreachable_rules(grammar: &Grammar, entry_point: &str) {
    let mut reachable = FxHashSet::default();
    let mut to_visit = vec![entry_point.to_string()];
    for extra in grammar.extras.iter().flatten() {
        collect_referenced_symbols(extra, &mut to_visit);
    }

    while let Some(rule_name) = to_visit.pop() {
        if !reachable.insert(rule_name.clone()) {
            continue;
        }

        if let Some(rule) = grammar.rules.get(&rule_name) {
            collect_referenced_symbols(rule, &mut to_visit);
        }
    }

    for rule_name in grammar.rules.keys() {
        let inline_contains = grammar
            .inline
            .as_ref()
            .is_some_and(|v| v.contains(rule_name));

        if !reachable.contains(rule_name) && !inline_contains {
            tracing::warn!(rule = %rule_name, "unreachable rule");
        }
    }
}

fn collect_referenced_symbols(rule: &Rule, symbols: &mut Vec<String>) {
    if let Some(name) = rule.symbol_name() {
        symbols.push(name.to_string());
    }
    for child in rule.children() {
        collect_referenced_symbols(child, symbols);
    }
}

fn check_left_recursion(grammar: &Grammar) {
    for (rule_name, rule) in &grammar.rules {
        if has_immediate_left_recursion(rule, rule_name) {
            tracing::debug!(rule = %rule_name, "left-recursive rule");
        }
    }
}

fn has_immediate_left_recursion(rule: &Rule, target: &str) -> bool {
    match rule.rule_type {
        RuleType::Symbol => rule.name.as_deref() == Some(target),

        RuleType::Seq => rule
            .members
            .first()
            .is_some_and(|first| has_immediate_left_recursion(first, target)),

        RuleType::Choice => rule
            .members
            .iter()
            .any(|member| has_immediate_left_recursion(member, target)),

        RuleType::Prec
        | RuleType::PrecLeft
        | RuleType::PrecRight
        | RuleType::PrecDynamic
        | RuleType::Field
        | RuleType::Alias
        | RuleType::Repeat
        | RuleType::Repeat1 => rule
            .content
            .as_ref()
            .is_some_and(|content| has_immediate_left_recursion(content, target)),

        RuleType::Blank
        | RuleType::String
        | RuleType::Pattern
        | RuleType::Token
        | RuleType::ImmediateToken
        | RuleType::Reserved => false,
    }
}

fn check_precedence(grammar: &Grammar) {
    let mut prec_levels: FxHashMap<&str, Vec<i32>> = FxHashMap::default();

    for (rule_name, rule) in &grammar.rules {
        collect_precedence_levels(rule, &mut prec_levels, rule_name);
    }

    for (rule_name, rule) in &grammar.rules {
        if let Some(levels) = prec_levels.get(rule_name.as_str()) {
            let mut distinct = levels.clone();
            distinct.sort_unstable();
            distinct.dedup();
            if distinct.len() > 1 && !matches!(rule.rule_type, RuleType::Choice) {
                tracing::warn!(rule = %rule_name, ?distinct, "rule mixes precedence levels");
            }
        }
    }

    let declared: FxHashSet<&str> = grammar
        .precedences
        .iter()
        .flatten()
        .flatten()
        .filter_map(|entry| entry.string_value().or_else(|| entry.symbol_name()))
        .collect();
    for rule in grammar.rules.values() {
        check_named_precedences(rule, &declared);
    }
}

fn check_named_precedences(rule: &Rule, declared: &FxHashSet<&str>) {
    if let Some(name) = rule.precedence_name() {
        if !declared.contains(name) {
            tracing::warn!(precedence = %name, "precedence name is not declared in `precedences`");
        }
    }
    for child in rule.children() {
        check_named_precedences(child, declared);
    }
}

fn collect_precedence_levels<'g>(
    rule: &Rule,
    levels: &mut FxHashMap<&'g str, Vec<i32>>,
    context: &'g str,
) {
    if let Some(p) = rule.precedence() {
        if !matches!(rule.rule_type, RuleType::PrecDynamic) {
            levels.entry(context).or_default().push(p);
        }
    }
    if matches!(rule.rule_type, RuleType::Token | RuleType::ImmediateToken) {
        return;
    }
    for child in rule.children() {
        collect_precedence_levels(child, levels, context);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::dsl::{choice, pattern, prec_left, seq, string, sym};

    #[test]
    fn test_valid_grammar_passes() {
        let grammar = Grammar::new("arith")
            .rule(
                "expr",
                choice(vec![
                    prec_left(1, seq(vec![sym("expr"), string("+"), sym("expr")])),
                    sym("number"),
                ]),
            )
            .rule("number", pattern(r"\d+"));
        assert_eq!(validate(&grammar), Ok(()));
    }

    #[test]
    fn test_undefined_symbol_is_rejected() {
        let grammar = Grammar::new("g").rule("a", seq(vec![sym("b"), string("x")]));
        let err = validate(&grammar).unwrap_err();
        assert_eq!(err.message, "undefined symbol 'b' referenced in rule 'a'");
    }

    #[test]
    fn test_external_symbols_count_as_defined() {
        let grammar = Grammar::new("g")
            .rule("a", seq(vec![sym("heredoc"), string("x")]))
            .external("heredoc");
        assert_eq!(validate(&grammar), Ok(()));
    }

    #[test]
    fn test_empty_grammar_is_rejected() {
        let err = validate(&Grammar::new("empty")).unwrap_err();
        assert_eq!(err.to_string(), "grammar has no rules");
    }

    #[test]
    fn test_undefined_conflict_member_is_rejected() {
        let grammar = Grammar::new("g")
            .rule("a", string("x"))
            .conflict(&["a", "ghost"]);
        let err = validate(&grammar).unwrap_err();
        assert!(err.message.contains("'ghost'"));
    }

    #[test]
    fn test_left_recursion_detection() {
        let rule = choice(vec![seq(vec![sym("list"), string(",")]), string("x")]);
        assert!(has_immediate_left_recursion(&rule, "list"));
        assert!(!has_immediate_left_recursion(&rule, "other"));
    }
}
