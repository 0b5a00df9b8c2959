//! Recursive-descent compiler for the pattern language.
//!
//! ```text
//! query      = (pattern captures)*
//! pattern    = node | alternation | group | "_" | STRING
//! node       = "(" (KIND | "_" | "ERROR" | "MISSING" [KIND | STRING]) item* ")"
//! group      = "(" item+ ")"
//! alternation= "[" (pattern captures)+ "]"
//! item       = "." | "!" FIELD | [FIELD ":"] pattern quantifier? captures | predicate
//! quantifier = "?" | "*" | "+"
//! captures   = ("@" NAME)*
//! predicate  = "(" "#" NAME (("@" NAME) | STRING | NAME)* ")"
//! ```
//!
//! `;` starts a comment that runs to the end of the line.

use super::ast::{Argument, Kind, NodePattern, Pattern, PatternKind, Predicate, Quantifier, Rule, Step};
use super::{QueryError, QueryErrorKind};
use crate::language::{FieldId, Language};
use crate::point::extent_of;
use regex::bytes::Regex;
use rustc_hash::FxHashSet;

/// Predicate arguments before capture names are resolved.
enum RawArgument {
    Capture(String, usize),
    Text(String),
}

struct RawPredicate {
    name: String,
    offset: usize,
    arguments: Vec<RawArgument>,
}

pub(super) struct Compiler<'a> {
    language: &'a Language,
    source: &'a str,
    pos: usize,
    capture_names: Vec<String>,
    /// Captures defined by the pattern being compiled.
    defined: FxHashSet<u32>,
    predicates: Vec<RawPredicate>,
}

/// Result of parsing one parenthesized or bracketed form.
enum Parsed {
    Pattern(Pattern),
    Predicate,
}

impl<'a> Compiler<'a> {
    pub(super) fn new(language: &'a Language, source: &'a str) -> Self {
        Self {
            language,
            source,
            pos: 0,
            capture_names: Vec::new(),
            defined: FxHashSet::default(),
            predicates: Vec::new(),
        }
    }

    pub(super) fn compile(mut self) -> Result<(Vec<Rule>, Vec<String>), QueryError> {
        let mut rules = Vec::new();
        loop {
            self.skip_trivia();
            let Some(c) = self.peek() else {
                break;
            };
            let start_byte = self.pos;
            self.defined.clear();
            self.predicates.clear();

            let pattern = match c {
                b'.' => return Err(self.error(QueryErrorKind::Structure, "anchor outside of a node")),
                b'@' => return Err(self.error(QueryErrorKind::Structure, "capture without a pattern")),
                _ => match self.parse_pattern()? {
                    Parsed::Pattern(pattern) => pattern,
                    Parsed::Predicate => {
                        return Err(self.error_at(
                            QueryErrorKind::Structure,
                            start_byte,
                            "predicate outside of a pattern",
                        ))
                    }
                },
            };
            self.skip_trivia();
            if matches!(self.peek(), Some(b'?' | b'*' | b'+')) {
                return Err(self.error(QueryErrorKind::Structure, "quantifier on a top-level pattern"));
            }
            let mut pattern = pattern;
            pattern.captures.extend(self.parse_captures()?);
            if let PatternKind::Group(steps) = &pattern.kind {
                let first_is_single = steps
                    .first()
                    .is_some_and(|step| step.quantifier == Quantifier::One && !matches!(step.pattern.kind, PatternKind::Group(_)));
                if !first_is_single || !pattern.captures.is_empty() {
                    return Err(self.error_at(
                        QueryErrorKind::Structure,
                        start_byte,
                        "a top-level group must start with a single pattern and cannot be captured",
                    ));
                }
            }
            let predicates = self.resolve_predicates()?;
            rules.push(Rule {
                pattern,
                predicates,
                start_byte,
            });
        }
        Ok((rules, self.capture_names))
    }

    fn peek(&self) -> Option<u8> {
        self.source.as_bytes().get(self.pos).copied()
    }

    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_ascii_whitespace() {
                self.pos += 1;
            } else if c == b';' {
                while self.peek().is_some_and(|c| c != b'\n') {
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn error(&self, kind: QueryErrorKind, message: impl Into<String>) -> QueryError {
        self.error_at(kind, self.pos, message)
    }

    fn error_at(&self, kind: QueryErrorKind, offset: usize, message: impl Into<String>) -> QueryError {
        let offset = offset.min(self.source.len());
        let point = extent_of(&self.source.as_bytes()[..offset]);
        QueryError {
            kind,
            offset,
            row: point.row,
            column: point.column,
            message: message.into(),
        }
    }

    fn expect(&mut self, c: u8) -> Result<(), QueryError> {
        self.skip_trivia();
        if self.peek() == Some(c) {
            self.pos += 1;
            Ok(())
        } else {
            let found = self
                .peek()
                .map_or_else(|| "end of input".to_string(), |found| format!("'{}'", found as char));
            Err(self.error(QueryErrorKind::Syntax, format!("expected '{}', found {found}", c as char)))
        }
    }

    fn identifier(&mut self) -> Option<&'a str> {
        let source = self.source;
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || matches!(c, b'_' | b'-' | b'.' | b'?' | b'!'))
        {
            self.pos += 1;
        }
        (self.pos > start).then(|| &source[start..self.pos])
    }

    fn string(&mut self) -> Result<String, QueryError> {
        let source = self.source;
        let start = self.pos;
        self.pos += 1;
        let mut value = String::new();
        let mut chars = source[self.pos..].char_indices();
        while let Some((index, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos += index + 1;
                    return Ok(value);
                }
                '\\' => match chars.next() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, 'r')) => value.push('\r'),
                    Some((_, '0')) => value.push('\0'),
                    Some((_, other)) => value.push(other),
                    None => break,
                },
                c => value.push(c),
            }
        }
        Err(self.error_at(QueryErrorKind::Syntax, start, "unterminated string"))
    }

    /// A single pattern: node, group, alternation, wildcard or string.
    fn parse_pattern(&mut self) -> Result<Parsed, QueryError> {
        self.skip_trivia();
        match self.peek() {
            Some(b'(') => self.parse_parenthesized(),
            Some(b'[') => self.parse_alternation().map(Parsed::Pattern),
            Some(b'"') => {
                let offset = self.pos;
                let text = self.string()?;
                if self.language.symbols_for_kind(&text, false).is_empty() {
                    return Err(self.error_at(
                        QueryErrorKind::NodeType,
                        offset,
                        format!("unknown anonymous node \"{text}\""),
                    ));
                }
                Ok(Parsed::Pattern(node_pattern(Kind::Anonymous(text))))
            }
            Some(b'_') => {
                self.pos += 1;
                Ok(Parsed::Pattern(node_pattern(Kind::Any)))
            }
            Some(c) => Err(self.error(QueryErrorKind::Syntax, format!("unexpected '{}'", c as char))),
            None => Err(self.error(QueryErrorKind::Syntax, "unexpected end of input")),
        }
    }

    fn parse_parenthesized(&mut self) -> Result<Parsed, QueryError> {
        self.pos += 1;
        self.skip_trivia();
        match self.peek() {
            Some(b'#') => {
                self.parse_predicate()?;
                Ok(Parsed::Predicate)
            }
            Some(b'(' | b'[' | b'"') => {
                let (steps, anchored_end, negated) = self.parse_items()?;
                if steps.is_empty() {
                    return Err(self.error(QueryErrorKind::Structure, "empty group"));
                }
                if anchored_end || !negated.is_empty() {
                    return Err(self.error(QueryErrorKind::Structure, "anchors and negated fields need a parent node"));
                }
                self.expect(b')')?;
                Ok(Parsed::Pattern(simplify_group(steps)))
            }
            Some(b')') => Err(self.error(QueryErrorKind::Syntax, "empty pattern")),
            None => Err(self.error(QueryErrorKind::Syntax, "unexpected end of input")),
            Some(_) => {
                let offset = self.pos;
                let Some(name) = self.identifier() else {
                    return Err(self.error(QueryErrorKind::Syntax, "expected a node kind"));
                };
                let kind = match name {
                    "_" => Kind::AnyNamed,
                    "MISSING" => self.parse_missing()?,
                    _ => {
                        if self.language.symbols_for_kind(name, true).is_empty() {
                            return Err(self.error_at(
                                QueryErrorKind::NodeType,
                                offset,
                                format!("unknown node kind '{name}'"),
                            ));
                        }
                        Kind::Named(name.to_string())
                    }
                };
                let (steps, anchored_end, negated_fields) = self.parse_items()?;
                self.expect(b')')?;
                Ok(Parsed::Pattern(Pattern {
                    kind: PatternKind::Node(NodePattern {
                        kind,
                        steps,
                        anchored_end,
                        negated_fields,
                    }),
                    captures: Vec::new(),
                }))
            }
        }
    }

    fn parse_missing(&mut self) -> Result<Kind, QueryError> {
        self.skip_trivia();
        let offset = self.pos;
        let target = match self.peek() {
            Some(b'"') => {
                let text = self.string()?;
                Some((text, false))
            }
            Some(c) if c.is_ascii_alphabetic() || c == b'_' => {
                let name = self.identifier().unwrap_or_default().to_string();
                Some((name, true))
            }
            _ => None,
        };
        if let Some((name, named)) = &target {
            if self.language.symbols_for_kind(name, *named).is_empty() {
                return Err(self.error_at(
                    QueryErrorKind::NodeType,
                    offset,
                    format!("unknown node kind '{name}'"),
                ));
            }
        }
        Ok(Kind::Missing(target))
    }

    /// Items up to (not including) a closing parenthesis.
    fn parse_items(&mut self) -> Result<(Vec<Step>, bool, Vec<FieldId>), QueryError> {
        let mut steps = Vec::new();
        let mut negated = Vec::new();
        let mut anchored = false;
        loop {
            self.skip_trivia();
            match self.peek() {
                Some(b')') | None => break,
                Some(b'.') => {
                    self.pos += 1;
                    anchored = true;
                }
                Some(b'!') => {
                    self.pos += 1;
                    negated.push(self.parse_field_name()?);
                }
                Some(c) if c.is_ascii_alphabetic() => {
                    let field = self.parse_field_name()?;
                    self.expect(b':')?;
                    if let Some(step) = self.parse_step(Some(field), anchored)? {
                        steps.push(step);
                        anchored = false;
                    }
                }
                Some(_) => {
                    if let Some(step) = self.parse_step(None, anchored)? {
                        steps.push(step);
                        anchored = false;
                    }
                }
            }
        }
        Ok((steps, anchored, negated))
    }

    fn parse_field_name(&mut self) -> Result<FieldId, QueryError> {
        let offset = self.pos;
        let Some(name) = self.identifier() else {
            return Err(self.error(QueryErrorKind::Syntax, "expected a field name"));
        };
        self.language.field_id_for_name(name).ok_or_else(|| {
            self.error_at(QueryErrorKind::Field, offset, format!("unknown field '{name}'"))
        })
    }

    /// A pattern with its quantifier and captures. Predicates yield `None`.
    fn parse_step(&mut self, field: Option<FieldId>, anchored: bool) -> Result<Option<Step>, QueryError> {
        let offset = self.pos;
        let mut pattern = match self.parse_pattern()? {
            Parsed::Pattern(pattern) => pattern,
            Parsed::Predicate => {
                if field.is_some() || anchored {
                    return Err(self.error_at(QueryErrorKind::Structure, offset, "a predicate cannot take a field or anchor"));
                }
                return Ok(None);
            }
        };
        let quantifier = match self.peek() {
            Some(b'?') => Quantifier::ZeroOrOne,
            Some(b'*') => Quantifier::ZeroOrMore,
            Some(b'+') => Quantifier::OneOrMore,
            _ => Quantifier::One,
        };
        if quantifier != Quantifier::One {
            self.pos += 1;
        }
        pattern.captures.extend(self.parse_captures()?);
        Ok(Some(Step {
            field,
            pattern,
            quantifier,
            anchored,
        }))
    }

    fn parse_alternation(&mut self) -> Result<Pattern, QueryError> {
        let open = self.pos;
        self.pos += 1;
        let mut alternatives = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                Some(b']') => {
                    self.pos += 1;
                    break;
                }
                None => return Err(self.error(QueryErrorKind::Syntax, "unterminated alternation")),
                Some(_) => {
                    let offset = self.pos;
                    let Parsed::Pattern(mut pattern) = self.parse_pattern()? else {
                        return Err(self.error_at(QueryErrorKind::Structure, offset, "predicate inside an alternation"));
                    };
                    pattern.captures.extend(self.parse_captures()?);
                    alternatives.push(pattern);
                }
            }
        }
        if alternatives.is_empty() {
            return Err(self.error_at(QueryErrorKind::Structure, open, "empty alternation"));
        }
        Ok(Pattern {
            kind: PatternKind::Alternation(alternatives),
            captures: Vec::new(),
        })
    }

    fn parse_captures(&mut self) -> Result<Vec<u32>, QueryError> {
        let mut captures = Vec::new();
        loop {
            self.skip_trivia();
            if self.peek() != Some(b'@') {
                return Ok(captures);
            }
            self.pos += 1;
            let Some(name) = self.identifier() else {
                return Err(self.error(QueryErrorKind::Syntax, "expected a capture name"));
            };
            let index = self.capture_index(name);
            self.defined.insert(index);
            captures.push(index);
        }
    }

    fn capture_index(&mut self, name: &str) -> u32 {
        let index = match self.capture_names.iter().position(|existing| existing == name) {
            Some(index) => index,
            None => {
                self.capture_names.push(name.to_string());
                self.capture_names.len() - 1
            }
        };
        u32::try_from(index).unwrap_or(u32::MAX)
    }

    fn parse_predicate(&mut self) -> Result<(), QueryError> {
        let offset = self.pos;
        self.pos += 1;
        let Some(name) = self.identifier() else {
            return Err(self.error(QueryErrorKind::Syntax, "expected a predicate name"));
        };
        let mut arguments = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                Some(b')') => {
                    self.pos += 1;
                    break;
                }
                Some(b'@') => {
                    let at = self.pos;
                    self.pos += 1;
                    let Some(capture) = self.identifier() else {
                        return Err(self.error(QueryErrorKind::Syntax, "expected a capture name"));
                    };
                    arguments.push(RawArgument::Capture(capture.to_string(), at));
                }
                Some(b'"') => arguments.push(RawArgument::Text(self.string()?)),
                Some(c) if c.is_ascii_alphanumeric() || c == b'_' => {
                    let word = self.identifier().unwrap_or_default();
                    arguments.push(RawArgument::Text(word.to_string()));
                }
                Some(c) => return Err(self.error(QueryErrorKind::Syntax, format!("unexpected '{}' in predicate", c as char))),
                None => return Err(self.error(QueryErrorKind::Syntax, "unterminated predicate")),
            }
        }
        self.predicates.push(RawPredicate {
            name: name.to_string(),
            offset,
            arguments,
        });
        Ok(())
    }

    fn resolve_predicates(&mut self) -> Result<Vec<Predicate>, QueryError> {
        let raw = std::mem::take(&mut self.predicates);
        let mut predicates = Vec::with_capacity(raw.len());
        for predicate in raw {
            predicates.push(self.resolve_predicate(predicate)?);
        }
        Ok(predicates)
    }

    fn resolve_argument(&self, argument: RawArgument) -> Result<Argument, QueryError> {
        match argument {
            RawArgument::Text(text) => Ok(Argument::Text(text)),
            RawArgument::Capture(name, offset) => {
                let index = self
                    .capture_names
                    .iter()
                    .position(|existing| *existing == name)
                    .and_then(|index| u32::try_from(index).ok())
                    .filter(|index| self.defined.contains(index));
                index.map(Argument::Capture).ok_or_else(|| {
                    self.error_at(QueryErrorKind::Capture, offset, format!("undefined capture '@{name}'"))
                })
            }
        }
    }

    fn resolve_predicate(&self, predicate: RawPredicate) -> Result<Predicate, QueryError> {
        let RawPredicate {
            name,
            offset,
            arguments,
        } = predicate;
        let invalid = |message: String| self.error_at(QueryErrorKind::Predicate, offset, message);

        let mut arguments = arguments.into_iter();
        let capture = match arguments.next().map(|argument| self.resolve_argument(argument)).transpose()? {
            Some(Argument::Capture(capture)) => capture,
            _ => return Err(invalid(format!("#{name} expects a capture as its first argument"))),
        };
        let rest = arguments
            .map(|argument| self.resolve_argument(argument))
            .collect::<Result<Vec<_>, _>>()?;

        let negate = name.starts_with("not-");
        match name.trim_start_matches("not-") {
            "eq?" => {
                let [other] = <[Argument; 1]>::try_from(rest)
                    .map_err(|_| invalid(format!("#{name} expects two arguments")))?;
                Ok(Predicate::Eq {
                    capture,
                    other,
                    negate,
                })
            }
            "match?" => {
                let [Argument::Text(source)] = <[Argument; 1]>::try_from(rest)
                    .map_err(|_| invalid(format!("#{name} expects a capture and a pattern")))?
                else {
                    return Err(invalid(format!("#{name} expects a string pattern")));
                };
                let regex = Regex::new(&source).map_err(|error| invalid(format!("invalid regex: {error}")))?;
                Ok(Predicate::Match {
                    capture,
                    regex,
                    negate,
                })
            }
            "any-of?" => {
                let values = rest
                    .into_iter()
                    .map(|argument| match argument {
                        Argument::Text(text) => Ok(text),
                        Argument::Capture(_) => Err(invalid(format!("#{name} expects strings after the capture"))),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                if values.is_empty() {
                    return Err(invalid(format!("#{name} expects at least one value")));
                }
                Ok(Predicate::AnyOf {
                    capture,
                    values,
                    negate,
                })
            }
            _ => Err(invalid(format!("unknown predicate #{name}"))),
        }
    }
}

fn node_pattern(kind: Kind) -> Pattern {
    Pattern {
        kind: PatternKind::Node(NodePattern {
            kind,
            steps: Vec::new(),
            anchored_end: false,
            negated_fields: Vec::new(),
        }),
        captures: Vec::new(),
    }
}

/// A group of one plain step is just that step's pattern.
fn simplify_group(mut steps: Vec<Step>) -> Pattern {
    let single = steps.len() == 1
        && steps[0].quantifier == Quantifier::One
        && steps[0].field.is_none()
        && !steps[0].anchored;
    match steps.pop() {
        Some(step) if single => step.pattern,
        Some(step) => {
            steps.push(step);
            Pattern {
                kind: PatternKind::Group(steps),
                captures: Vec::new(),
            }
        }
        None => Pattern {
            kind: PatternKind::Group(steps),
            captures: Vec::new(),
        },
    }
}
