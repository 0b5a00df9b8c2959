//! Hand-written scanners for tokens that regular rules cannot express.
//!
//! A scanner is stateless code; everything it remembers between tokens lives
//! in a [`ScannerState`], an opaque byte string the scanner encodes itself.
//! The parser stores the state reached after every external token on that
//! token, and restores it from the nearest preceding external token when it
//! resumes (including after an edit). Nothing is captured in closures or
//! globals, so incremental reparses see exactly the state a fresh parse would.

use std::fmt;
use std::sync::Arc;

/// Serialized external scanner state.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ScannerState(Arc<[u8]>);

impl ScannerState {
    /// Wraps serialized bytes.
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Arc::from(bytes.into()))
    }

    /// The serialized bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Replaces the serialized bytes.
    pub fn set(&mut self, bytes: impl Into<Vec<u8>>) {
        self.0 = Arc::from(bytes.into());
    }

    /// Whether the scanner is in its initial state.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ScannerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScannerState({:?})", String::from_utf8_lossy(&self.0))
    }
}

/// A scanner for the grammar's `externals`.
pub trait ExternalScanner: Send + Sync {
    /// Tries to recognize one token at the cursor.
    ///
    /// `valid[i]` says whether external token `i` (in `externals` order) is
    /// acceptable here. On success, return that index; the token ends at the
    /// last [`ScanCursor::mark_end`] or, if never called, the cursor position.
    /// The scanner may update `state`; the update is discarded if it returns
    /// `None`.
    fn scan(
        &self,
        cursor: &mut ScanCursor<'_>,
        valid: &[bool],
        state: &mut ScannerState,
    ) -> Option<usize>;
}

/// Read access to the input for an [`ExternalScanner`].
///
/// Tracks the furthest byte examined so edits there invalidate the token.
#[derive(Debug)]
pub struct ScanCursor<'a> {
    text: &'a [u8],
    start: usize,
    position: usize,
    marked_end: Option<usize>,
    examined: usize,
}

impl<'a> ScanCursor<'a> {
    pub(crate) fn new(text: &'a [u8], start: usize) -> Self {
        Self {
            text,
            start,
            position: start,
            marked_end: None,
            examined: start,
        }
    }

    /// Byte at the cursor, or `None` at end of input.
    pub fn lookahead(&mut self) -> Option<u8> {
        self.peek(0)
    }

    /// Byte `offset` bytes past the cursor.
    pub fn peek(&mut self, offset: usize) -> Option<u8> {
        let index = self.position + offset;
        self.examined = self.examined.max(index + 1);
        self.text.get(index).copied()
    }

    /// Whether the input continues with `bytes` at the cursor.
    pub fn starts_with(&mut self, bytes: &[u8]) -> bool {
        self.examined = self.examined.max(self.position + bytes.len());
        self.text[self.position..].starts_with(bytes)
    }

    /// Moves past one byte. Does nothing at end of input.
    pub fn advance(&mut self) {
        if self.position < self.text.len() {
            self.position += 1;
        }
    }

    /// Moves past the rest of the line, including its newline.
    pub fn advance_line(&mut self) {
        while let Some(byte) = self.lookahead() {
            self.advance();
            if byte == b'\n' {
                break;
            }
        }
    }

    /// Ends the token at the current position.
    pub fn mark_end(&mut self) {
        self.marked_end = Some(self.position);
    }

    /// Whether the cursor sits at the start of a line.
    #[must_use]
    pub fn is_at_line_start(&self) -> bool {
        self.position == 0 || self.text.get(self.position - 1) == Some(&b'\n')
    }

    /// Whether the cursor sits at the end of input.
    #[must_use]
    pub fn is_at_eof(&self) -> bool {
        self.position >= self.text.len()
    }

    /// Bytes consumed since the token started.
    #[must_use]
    pub fn consumed(&self) -> usize {
        self.position - self.start
    }

    pub(crate) fn token_end(&self) -> usize {
        self.marked_end.unwrap_or(self.position)
    }

    pub(crate) fn examined_end(&self) -> usize {
        self.examined.max(self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_tracks_examined_bytes() {
        let mut cursor = ScanCursor::new(b"ab\ncd", 0);
        assert_eq!(cursor.lookahead(), Some(b'a'));
        cursor.advance_line();
        assert!(cursor.is_at_line_start());
        cursor.mark_end();
        assert!(cursor.starts_with(b"cd"));
        assert_eq!(cursor.token_end(), 3);
        assert_eq!(cursor.examined_end(), 5);
        assert_eq!(cursor.consumed(), 3);
    }

    #[test]
    fn test_state_is_a_value() {
        let mut state = ScannerState::default();
        assert!(state.is_empty());
        let before = state.clone();
        state.set(b"$$".to_vec());
        assert_eq!(state.as_bytes(), b"$$");
        assert_ne!(state, before);
    }
}
