//! Tree pattern queries.
//!
//! A [`Query`] is compiled once per language from S-expression patterns and
//! can then be run over any node of any tree of that language:
//!
//! ```text
//! (call_expression function: (identifier) @callee)
//! ((identifier) @constant (#match? @constant "^[A-Z_]+$"))
//! [(number) (string)] @literal
//! ```
//!
//! Matching is lazy: [`Query::matches`] walks the tree in document order and
//! yields matches as it finds them. Children of a pattern match the node's
//! visible children in order, with gaps allowed unless a `.` anchor is given.

mod ast;
mod compile;

use crate::language::{FieldId, Language};
use crate::tree::Node;
use ast::{Argument, Kind, Pattern, PatternKind, Predicate, Quantifier, Rule, Step};
use std::collections::VecDeque;
use std::fmt;

/// What a query compile error is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryErrorKind {
    /// Malformed pattern text.
    Syntax,
    /// A node kind the language does not have.
    NodeType,
    /// A field name the language does not have.
    Field,
    /// A predicate refers to a capture its pattern does not define.
    Capture,
    /// Unknown predicate or wrong predicate arguments.
    Predicate,
    /// Well-formed but meaningless pattern structure.
    Structure,
}

impl fmt::Display for QueryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Syntax => "syntax",
            Self::NodeType => "node type",
            Self::Field => "field",
            Self::Capture => "capture",
            Self::Predicate => "predicate",
            Self::Structure => "structure",
        })
    }
}

/// A query that failed to compile.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} error at {row}:{column} (byte {offset}): {message}")]
pub struct QueryError {
    /// Category of the problem.
    pub kind: QueryErrorKind,
    /// Byte offset in the query source.
    pub offset: usize,
    /// Zero-based row of `offset`.
    pub row: usize,
    /// Zero-based byte column of `offset`.
    pub column: usize,
    /// Human-readable description.
    pub message: String,
}

/// A compiled set of patterns.
#[derive(Debug)]
pub struct Query {
    language: Language,
    rules: Vec<Rule>,
    capture_names: Vec<String>,
}

/// One node captured by a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryCapture<'tree> {
    /// The captured node.
    pub node: Node<'tree>,
    /// Index into [`Query::capture_names`].
    pub index: u32,
}

/// One way a pattern matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryMatch<'tree> {
    /// Index of the pattern in the query source.
    pub pattern_index: usize,
    /// Captured nodes, outer patterns first.
    pub captures: Vec<QueryCapture<'tree>>,
}

impl<'tree> QueryMatch<'tree> {
    /// Nodes captured under one name.
    pub fn nodes_for_capture_index(&self, index: u32) -> impl Iterator<Item = Node<'tree>> + '_ {
        self.captures
            .iter()
            .filter(move |capture| capture.index == index)
            .map(|capture| capture.node)
    }
}

impl Query {
    /// Compiles `source` for `language`.
    ///
    /// # Errors
    ///
    /// Returns a [`QueryError`] locating the first problem.
    pub fn new(language: &Language, source: &str) -> Result<Self, QueryError> {
        let (rules, capture_names) = compile::Compiler::new(language, source).compile()?;
        tracing::debug!(
            patterns = rules.len(),
            captures = capture_names.len(),
            language = language.name(),
            "compiled query"
        );
        Ok(Self {
            language: language.clone(),
            rules,
            capture_names,
        })
    }

    /// The language the query was compiled for.
    #[must_use]
    pub fn language(&self) -> &Language {
        &self.language
    }

    /// Number of top-level patterns.
    #[must_use]
    pub fn pattern_count(&self) -> usize {
        self.rules.len()
    }

    /// Where a pattern starts in the query source.
    #[must_use]
    pub fn start_byte_for_pattern(&self, index: usize) -> Option<usize> {
        self.rules.get(index).map(|rule| rule.start_byte)
    }

    /// Capture names, indexed by [`QueryCapture::index`].
    #[must_use]
    pub fn capture_names(&self) -> &[String] {
        &self.capture_names
    }

    /// Index of a capture name.
    #[must_use]
    pub fn capture_index_for_name(&self, name: &str) -> Option<u32> {
        self.capture_names
            .iter()
            .position(|existing| existing == name)
            .and_then(|index| u32::try_from(index).ok())
    }

    /// Lazily matches every pattern against `node` and its descendants.
    ///
    /// `source` is the text the tree was parsed from; predicates compare
    /// against it. Calling this again restarts from the beginning.
    #[must_use]
    pub fn matches<'query, 'tree>(&'query self, node: Node<'tree>, source: &'tree [u8]) -> QueryMatches<'query, 'tree> {
        QueryMatches {
            query: self,
            source,
            stack: vec![node],
            pending: VecDeque::new(),
            range: None,
        }
    }
}

/// Iterator over the matches of a [`Query`].
#[derive(Clone)]
pub struct QueryMatches<'query, 'tree> {
    query: &'query Query,
    source: &'tree [u8],
    stack: Vec<Node<'tree>>,
    pending: VecDeque<QueryMatch<'tree>>,
    range: Option<std::ops::Range<usize>>,
}

impl QueryMatches<'_, '_> {
    /// Only reports matches on nodes that intersect `range`.
    #[must_use]
    pub fn with_byte_range(mut self, range: std::ops::Range<usize>) -> Self {
        self.range = Some(range);
        self
    }

    fn in_range(&self, node: Node<'_>) -> bool {
        self.range.as_ref().is_none_or(|range| {
            let (start, end) = (node.start_byte(), node.end_byte());
            if start == end {
                range.start <= start && start <= range.end
            } else {
                start < range.end && end > range.start
            }
        })
    }
}

impl<'tree> Iterator for QueryMatches<'_, 'tree> {
    type Item = QueryMatch<'tree>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(found) = self.pending.pop_front() {
                return Some(found);
            }
            let node = self.stack.pop()?;
            if !self.in_range(node) {
                continue;
            }
            self.stack.extend(node.children().rev());
            for (pattern_index, rule) in self.query.rules.iter().enumerate() {
                for captures in rule_matches(rule, node) {
                    if predicates_hold(&rule.predicates, &captures, self.source) {
                        self.pending.push_back(QueryMatch {
                            pattern_index,
                            captures,
                        });
                    }
                }
            }
        }
    }
}

type Captures<'tree> = Vec<QueryCapture<'tree>>;
type Children<'tree> = Vec<(Option<FieldId>, Node<'tree>)>;

fn visible_children(node: Node<'_>) -> Children<'_> {
    node.visible_children()
        .map(|(_, field, child)| (field, child))
        .collect()
}

fn same_node(a: Node<'_>, b: Node<'_>) -> bool {
    a.id() == b.id() && a.start_byte() == b.start_byte()
}

fn push_unique<'tree>(out: &mut Vec<Captures<'tree>>, captures: Captures<'tree>) {
    let duplicate = out.iter().any(|existing| {
        existing.len() == captures.len()
            && existing
                .iter()
                .zip(&captures)
                .all(|(a, b)| a.index == b.index && same_node(a.node, b.node))
    });
    if !duplicate {
        out.push(captures);
    }
}

fn own_captures<'tree>(pattern: &Pattern, node: Node<'tree>) -> Captures<'tree> {
    pattern
        .captures
        .iter()
        .map(|&index| QueryCapture { node, index })
        .collect()
}

fn rule_matches<'tree>(rule: &Rule, node: Node<'tree>) -> Vec<Captures<'tree>> {
    let PatternKind::Group(steps) = &rule.pattern.kind else {
        return match_node(&rule.pattern, node);
    };
    let Some((first, rest)) = steps.split_first() else {
        return Vec::new();
    };
    let siblings = node
        .parent()
        .map_or_else(|| vec![(None, node)], visible_children);
    let Some(index) = siblings.iter().position(|(_, sibling)| same_node(*sibling, node)) else {
        return Vec::new();
    };
    if first.field.is_some() && first.field != siblings[index].0 {
        return Vec::new();
    }
    let mut out = Vec::new();
    for captures in match_node(&first.pattern, node) {
        for (_, captures) in match_steps(rest, &siblings, index + 1, captures, false) {
            push_unique(&mut out, captures);
        }
    }
    out
}

fn kind_matches(kind: &Kind, node: Node<'_>) -> bool {
    match kind {
        Kind::Any => true,
        Kind::AnyNamed => node.is_named(),
        Kind::Named(name) => node.is_named() && node.kind() == name,
        Kind::Anonymous(text) => !node.is_named() && node.kind() == text,
        Kind::Missing(None) => node.is_missing(),
        Kind::Missing(Some((name, named))) => node.is_missing() && node.is_named() == *named && node.kind() == name,
    }
}

/// Every capture set with which `pattern` matches `node` itself.
fn match_node<'tree>(pattern: &Pattern, node: Node<'tree>) -> Vec<Captures<'tree>> {
    match &pattern.kind {
        PatternKind::Node(node_pattern) => {
            if !kind_matches(&node_pattern.kind, node)
                || node_pattern
                    .negated_fields
                    .iter()
                    .any(|&field| node.child_by_field_id(field).is_some())
            {
                return Vec::new();
            }
            let own = own_captures(pattern, node);
            if node_pattern.steps.is_empty() && !node_pattern.anchored_end {
                return vec![own];
            }
            let children = visible_children(node);
            let mut out = Vec::new();
            for (end, captures) in match_steps(&node_pattern.steps, &children, 0, Vec::new(), false) {
                if node_pattern.anchored_end && children[end..].iter().any(|(_, child)| child.is_named()) {
                    continue;
                }
                let mut all = own.clone();
                all.extend(captures);
                push_unique(&mut out, all);
            }
            out
        }
        PatternKind::Alternation(alternatives) => {
            let mut out = Vec::new();
            for alternative in alternatives {
                for mut captures in match_node(alternative, node) {
                    captures.extend(own_captures(pattern, node));
                    push_unique(&mut out, captures);
                }
            }
            out
        }
        PatternKind::Group(_) => Vec::new(),
    }
}

/// Every way `steps` can match `children` from `pos`, as the position after
/// the last matched child plus the captures so far.
fn match_steps<'tree>(
    steps: &[Step],
    children: &Children<'tree>,
    pos: usize,
    captures: Captures<'tree>,
    force_anchor: bool,
) -> Vec<(usize, Captures<'tree>)> {
    let Some((step, rest)) = steps.split_first() else {
        return vec![(pos, captures)];
    };
    let anchored = step.anchored || force_anchor;
    let continue_with = |next: usize, more: Captures<'tree>| {
        let mut captures = captures.clone();
        captures.extend(more);
        match_steps(rest, children, next, captures, false)
    };

    match step.quantifier {
        Quantifier::One | Quantifier::ZeroOrOne => {
            let mut out = Vec::new();
            for (next, more) in match_once(step, children, pos, anchored) {
                out.extend(continue_with(next, more));
            }
            if out.is_empty() && step.quantifier == Quantifier::ZeroOrOne {
                return continue_with(pos, Vec::new());
            }
            out
        }
        Quantifier::ZeroOrMore | Quantifier::OneOrMore => {
            let mut runs: Vec<(usize, Captures<'tree>)> = vec![(pos, Vec::new())];
            loop {
                let Some((current, so_far)) = runs.last() else {
                    break;
                };
                let repeat_anchored = if runs.len() == 1 { anchored } else { true };
                let Some((next, more)) = match_once(step, children, *current, repeat_anchored).into_iter().next() else {
                    break;
                };
                if next <= *current {
                    break;
                }
                let mut extended = so_far.clone();
                extended.extend(more);
                runs.push((next, extended));
            }
            let min = usize::from(step.quantifier == Quantifier::OneOrMore);
            for (count, (next, more)) in runs.into_iter().enumerate().rev() {
                if count < min {
                    break;
                }
                let out = continue_with(next, more);
                if !out.is_empty() {
                    return out;
                }
            }
            Vec::new()
        }
    }
}

/// Every placement of a single occurrence of `step` at or after `pos`.
fn match_once<'tree>(step: &Step, children: &Children<'tree>, pos: usize, anchored: bool) -> Vec<(usize, Captures<'tree>)> {
    if let PatternKind::Group(steps) = &step.pattern.kind {
        return match_steps(steps, children, pos, Vec::new(), anchored);
    }
    let mut out = Vec::new();
    for index in pos..children.len() {
        if index > pos && anchored && children[index - 1].1.is_named() {
            break;
        }
        let (field, child) = children[index];
        if step.field.is_some() && field != step.field {
            continue;
        }
        for captures in match_node(&step.pattern, child) {
            out.push((index + 1, captures));
        }
    }
    out
}

fn node_text<'s>(node: Node<'_>, source: &'s [u8]) -> &'s [u8] {
    source.get(node.start_byte()..node.end_byte()).unwrap_or_default()
}

fn predicates_hold(predicates: &[Predicate], captures: &Captures<'_>, source: &[u8]) -> bool {
    let texts = |index: u32| {
        captures
            .iter()
            .filter(move |capture| capture.index == index)
            .map(move |capture| node_text(capture.node, source))
    };
    predicates.iter().all(|predicate| match predicate {
        Predicate::Eq {
            capture,
            other,
            negate,
        } => texts(*capture).all(|text| {
            let equal = match other {
                Argument::Text(value) => text == value.as_bytes(),
                Argument::Capture(other) => texts(*other).all(|other| other == text),
            };
            equal != *negate
        }),
        Predicate::Match {
            capture,
            regex,
            negate,
        } => texts(*capture).all(|text| regex.is_match(text) != *negate),
        Predicate::AnyOf {
            capture,
            values,
            negate,
        } => texts(*capture).all(|text| values.iter().any(|value| value.as_bytes() == text) != *negate),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::dsl::{choice, field, optional, pattern, prec_left, repeat, seq, string, sym};
    use crate::grammar::Grammar;
    use crate::{Parser, Tree};
    use pretty_assertions::assert_eq;

    fn calls() -> Language {
        let grammar = Grammar::new("calls")
            .rule("program", repeat(sym("_expression")))
            .rule(
                "_expression",
                choice(vec![sym("call_expression"), sym("identifier"), sym("number")]),
            )
            .rule(
                "call_expression",
                seq(vec![
                    field("function", sym("identifier")),
                    string("("),
                    optional(seq(vec![
                        sym("_expression"),
                        repeat(seq(vec![string(","), sym("_expression")])),
                    ])),
                    string(")"),
                ]),
            )
            .rule("identifier", pattern("[a-z_]+"))
            .rule("number", pattern(r"\d+"));
        Language::generate(&grammar).unwrap()
    }

    fn parse(language: &Language, text: &str) -> Tree {
        let mut parser = Parser::new();
        parser.set_language(language);
        parser.parse(text, None).unwrap()
    }

    fn captured(language: &Language, query: &str, text: &str) -> Vec<Vec<(String, String)>> {
        let query = Query::new(language, query).unwrap();
        let tree = parse(language, text);
        query
            .matches(tree.root_node(), text.as_bytes())
            .map(|found| {
                found
                    .captures
                    .iter()
                    .map(|capture| {
                        (
                            query.capture_names()[capture.index as usize].clone(),
                            capture.node.utf8_text(text.as_bytes()).unwrap().to_string(),
                        )
                    })
                    .collect()
            })
            .collect()
    }

    fn pair(name: &str, text: &str) -> (String, String) {
        (name.to_string(), text.to_string())
    }

    #[test]
    fn test_field_capture() {
        let language = calls();
        assert_eq!(
            captured(&language, "(call_expression function: (identifier) @fn)", "foo(1)"),
            [vec![pair("fn", "foo")]]
        );
    }

    #[test]
    fn test_every_placement_is_a_match() {
        let language = calls();
        let matches = captured(&language, "(call_expression (identifier) @id)", "f(a, b)");
        assert_eq!(
            matches,
            [vec![pair("id", "f")], vec![pair("id", "a")], vec![pair("id", "b")]]
        );
    }

    #[test]
    fn test_anchor_selects_first_named_child() {
        let language = calls();
        assert_eq!(
            captured(&language, "(call_expression . (identifier) @first)", "f(a, b)"),
            [vec![pair("first", "f")]]
        );
        assert_eq!(
            captured(&language, "(call_expression (_) @last .)", "f(a, 2)"),
            [vec![pair("last", "2")]]
        );
    }

    #[test]
    fn test_repetition_collects_adjacent_siblings() {
        let language = calls();
        assert_eq!(
            captured(&language, "(call_expression (number)* @nums)", "f(1, 2, x)"),
            [vec![pair("nums", "1"), pair("nums", "2")]]
        );
    }

    #[test]
    fn test_alternation_and_wildcards() {
        let language = calls();
        assert_eq!(
            captured(&language, "[(number) (identifier)] @leaf", "f(1)"),
            [vec![pair("leaf", "f")], vec![pair("leaf", "1")]]
        );
        assert_eq!(captured(&language, "\"(\" @open", "f(g())").len(), 2);
    }

    #[test]
    fn test_predicates() {
        let language = calls();
        assert_eq!(
            captured(&language, "((identifier) @id (#eq? @id \"bar\"))", "foo(bar, baz)").len(),
            1
        );
        assert_eq!(
            captured(&language, "((identifier) @id (#match? @id \"^ba\"))", "foo(bar, baz)").len(),
            2
        );
        assert_eq!(
            captured(
                &language,
                "((identifier) @id (#not-any-of? @id \"foo\" \"baz\"))",
                "foo(bar, baz)"
            ),
            [vec![pair("id", "bar")]]
        );
    }

    #[test]
    fn test_negated_field() {
        let language = calls();
        assert!(captured(&language, "(call_expression !function) @c", "f(1)").is_empty());
    }

    #[test]
    fn test_byte_range_limits_matches() {
        let language = calls();
        let text = "a b c";
        let tree = parse(&language, text);
        let query = Query::new(&language, "(identifier) @id").unwrap();
        let found: Vec<_> = query
            .matches(tree.root_node(), text.as_bytes())
            .with_byte_range(2..3)
            .collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].captures[0].node.start_byte(), 2);
    }

    #[test]
    fn test_error_nodes_can_be_queried() {
        let grammar = Grammar::new("arith")
            .rule(
                "expr",
                choice(vec![
                    prec_left(1, seq(vec![sym("expr"), string("+"), sym("expr")])),
                    sym("number"),
                ]),
            )
            .rule("number", pattern(r"\d+"));
        let language = Language::generate(&grammar).unwrap();
        let tree = parse(&language, "1+");
        let query = Query::new(&language, "(ERROR) @error").unwrap();
        let found: Vec<_> = query.matches(tree.root_node(), b"1+").collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].captures[0].node.range().bytes(), 1..2);
    }

    #[test]
    fn test_compile_errors_report_offsets() {
        let language = calls();
        let error = |source: &str| Query::new(&language, source).unwrap_err();

        let unterminated = error("(call_expression");
        assert_eq!(unterminated.kind, QueryErrorKind::Syntax);
        assert_eq!(unterminated.offset, 16);

        let unknown = error("(program)\n(bogus)");
        assert_eq!(unknown.kind, QueryErrorKind::NodeType);
        assert_eq!((unknown.offset, unknown.row, unknown.column), (11, 1, 1));

        assert_eq!(error("(call_expression nope: (identifier))").kind, QueryErrorKind::Field);
        assert_eq!(error("((identifier) @a (#eq? @b \"x\"))").kind, QueryErrorKind::Capture);
        assert_eq!(error("((identifier) @a (#frobnicate? @a))").kind, QueryErrorKind::Predicate);
        assert_eq!(error("[]").kind, QueryErrorKind::Structure);
    }
}
