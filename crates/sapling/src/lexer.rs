//! Context-aware tokenizer.
//!
//! The parser asks for one token at a time, passing the lex state of its
//! current parse state. Only terminals valid in that state (plus extras) are
//! considered, so the same text can lex differently in different contexts.

use crate::language::{Language, Symbol, END_SYMBOL, ERROR_SYMBOL};
use crate::point::Length;
use crate::scanner::{ScanCursor, ScannerState};
use crate::tree::subtree::{Subtree, SubtreeData, ERROR_LEX_STATE};

/// Where and how to lex.
pub(crate) struct LexRequest<'s> {
    pub position: Length,
    pub lex_state: u16,
    pub after_extra: bool,
    pub external_state: &'s ScannerState,
}

pub(crate) struct Lexer<'a> {
    language: &'a Language,
    text: &'a [u8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Candidate {
    symbol: Symbol,
    len: usize,
    precedence: i32,
    literal: bool,
}

impl Candidate {
    /// Longer, then higher precedence, then literal over pattern, then
    /// earlier symbol.
    fn beats(&self, other: &Self) -> bool {
        (self.len, self.precedence, self.literal, std::cmp::Reverse(self.symbol))
            > (other.len, other.precedence, other.literal, std::cmp::Reverse(other.symbol))
    }
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(language: &'a Language, text: &'a [u8]) -> Self {
        Self { language, text }
    }

    /// Produces the token at `request.position`. Never fails: unrecognized
    /// input becomes an ERROR token and end of input an END token.
    pub(crate) fn lex(&self, request: &LexRequest<'_>) -> Subtree {
        let position = request.position.bytes;
        let valid = self.language.valid_terminals(request.lex_state);

        if let Some(token) = self.scan_external(request, valid) {
            return token;
        }

        if position >= self.text.len() {
            let mut data = SubtreeData::leaf(self.language, END_SYMBOL, Length::ZERO);
            data.lex_state = request.lex_state;
            return data.into();
        }

        let rest = &self.text[position..];
        if let Some(best) = self.best_match(rest, Some(valid), request.after_extra) {
            return self.token(request, best.symbol, best.len, request.lex_state);
        }
        if let Some(best) = self.best_match(rest, None, request.after_extra) {
            tracing::trace!(position, symbol = best.symbol, "lexed in error mode");
            return self.token(request, best.symbol, best.len, ERROR_LEX_STATE);
        }

        let len = self.unrecognized_len(rest);
        tracing::debug!(position, len, "unrecognized input");
        self.token(request, ERROR_SYMBOL, len, ERROR_LEX_STATE)
    }

    fn token(&self, request: &LexRequest<'_>, symbol: Symbol, len: usize, lex_state: u16) -> Subtree {
        let start = request.position.bytes;
        let mut data = SubtreeData::leaf(self.language, symbol, Length::of(&self.text[start..start + len]));
        data.lookahead_bytes = self.line_lookahead(start + len);
        data.lex_state = lex_state;
        data.after_extra = request.after_extra;
        data.into()
    }

    /// Bytes from `end` through the end of its line; one past the text at
    /// end of input.
    fn line_lookahead(&self, end: usize) -> usize {
        match self.text.get(end..).and_then(|rest| rest.iter().position(|&b| b == b'\n')) {
            Some(newline) => newline + 1,
            None => self.text.len().saturating_sub(end) + 1,
        }
    }

    fn is_valid(&self, symbol: Symbol, valid: Option<&[Symbol]>) -> bool {
        match valid {
            Some(valid) => valid.binary_search(&symbol).is_ok() || self.language.is_extra(symbol),
            None => true,
        }
    }

    fn best_match(&self, rest: &[u8], valid: Option<&[Symbol]>, after_extra: bool) -> Option<Candidate> {
        let word = self
            .language
            .word()
            .and_then(|word| self.language.matcher_for(word))
            .and_then(|matcher| matcher.match_len(rest));

        let mut best: Option<Candidate> = None;
        for (rule, matcher) in self.language.lex_rules() {
            if (rule.immediate && after_extra) || !self.is_valid(rule.symbol, valid) {
                continue;
            }
            let Some(len) = matcher.match_len(rest) else {
                continue;
            };
            let candidate = Candidate {
                symbol: rule.symbol,
                len,
                precedence: rule.precedence,
                literal: matcher.is_literal(),
            };
            // A keyword is only a keyword when it is the whole word.
            if candidate.literal && word.is_some_and(|word_len| word_len > len) && self.is_keyword(&rest[..len]) {
                continue;
            }
            if best.is_none_or(|best| candidate.beats(&best)) {
                best = Some(candidate);
            }
        }
        best
    }

    fn is_keyword(&self, literal: &[u8]) -> bool {
        self.language
            .word()
            .and_then(|word| self.language.matcher_for(word))
            .and_then(|matcher| matcher.match_len(literal))
            == Some(literal.len())
    }

    /// Length of the unrecognized run: up to the next position where any rule
    /// matches, at least one character.
    fn unrecognized_len(&self, rest: &[u8]) -> usize {
        let mut len = char_len(rest);
        while len < rest.len() {
            let matches = self
                .language
                .lex_rules()
                .any(|(_, matcher)| matcher.match_len(&rest[len..]).is_some());
            if matches {
                break;
            }
            len += char_len(&rest[len..]);
        }
        len
    }

    fn scan_external(&self, request: &LexRequest<'_>, valid: &[Symbol]) -> Option<Subtree> {
        let scanner = self.language.scanner()?;
        let externals = self.language.externals();
        let flags: Vec<bool> = externals
            .iter()
            .map(|symbol| valid.binary_search(symbol).is_ok())
            .collect();
        if !flags.contains(&true) {
            return None;
        }

        let start = request.position.bytes.min(self.text.len());
        let mut cursor = ScanCursor::new(self.text, start);
        let mut state = request.external_state.clone();
        let index = scanner.scan(&mut cursor, &flags, &mut state)?;
        let symbol = *externals.get(index)?;
        let end = cursor.token_end().min(self.text.len());
        if end <= start || !flags.get(index).copied().unwrap_or(false) {
            return None;
        }

        let mut data = SubtreeData::leaf(self.language, symbol, Length::of(&self.text[start..end]));
        data.lookahead_bytes = self
            .line_lookahead(end)
            .max(cursor.examined_end().saturating_sub(end));
        data.lex_state = request.lex_state;
        data.after_extra = request.after_extra;
        data.last_external = Some(state);
        tracing::trace!(position = start, symbol, len = end - start, "external token");
        Some(data.into())
    }
}

fn char_len(text: &[u8]) -> usize {
    match text.first() {
        None => 0,
        Some(&b) if b < 0x80 => 1,
        Some(&b) if b >= 0xF0 => 4.min(text.len()),
        Some(&b) if b >= 0xE0 => 3.min(text.len()),
        Some(&b) if b >= 0xC0 => 2.min(text.len()),
        Some(_) => 1,
    }
}
