use crate::language::FieldId;
use regex::bytes::Regex;

/// Which nodes a node pattern accepts.
#[derive(Debug, Clone)]
pub(super) enum Kind {
    /// `_`: any node.
    Any,
    /// `(_)`: any named node.
    AnyNamed,
    /// `(identifier)` or `(ERROR)`.
    Named(String),
    /// `"+"`.
    Anonymous(String),
    /// `(MISSING)` or `(MISSING kind)`.
    Missing(Option<(String, bool)>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Quantifier {
    One,
    ZeroOrOne,
    ZeroOrMore,
    OneOrMore,
}

#[derive(Debug, Clone)]
pub(super) struct NodePattern {
    pub kind: Kind,
    pub steps: Vec<Step>,
    /// `.` before the closing parenthesis: the last step must match the last
    /// named child.
    pub anchored_end: bool,
    pub negated_fields: Vec<FieldId>,
}

#[derive(Debug, Clone)]
pub(super) enum PatternKind {
    Node(NodePattern),
    Alternation(Vec<Pattern>),
    /// Consecutive siblings, `((a) (b))`.
    Group(Vec<Step>),
}

#[derive(Debug, Clone)]
pub(super) struct Pattern {
    pub kind: PatternKind,
    pub captures: Vec<u32>,
}

/// One child position inside a node or group.
#[derive(Debug, Clone)]
pub(super) struct Step {
    pub field: Option<FieldId>,
    pub pattern: Pattern,
    pub quantifier: Quantifier,
    /// Preceded by `.`: no named sibling may be skipped to reach it.
    pub anchored: bool,
}

#[derive(Debug, Clone)]
pub(super) enum Argument {
    Capture(u32),
    Text(String),
}

#[derive(Debug, Clone)]
pub(super) enum Predicate {
    Eq {
        capture: u32,
        other: Argument,
        negate: bool,
    },
    Match {
        capture: u32,
        regex: Regex,
        negate: bool,
    },
    AnyOf {
        capture: u32,
        values: Vec<String>,
        negate: bool,
    },
}

/// A top-level pattern with the predicates written inside it.
#[derive(Debug, Clone)]
pub(super) struct Rule {
    pub pattern: Pattern,
    pub predicates: Vec<Predicate>,
    pub start_byte: usize,
}
