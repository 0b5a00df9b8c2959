//! External scanner for in-stream data.
//!
//! The state is the active delimiter. It is empty until a `DLM=` operand
//! sets it, and empty again once the delimiter line has been seen. With the
//! default `/*` delimiter, a `//` line also ends the data.

use sapling::{ExternalScanner, ScanCursor, ScannerState};

const DATA_LINES: usize = 0;
const DELIMITER: usize = 1;
const DLM_VALUE: usize = 2;

const DEFAULT_DELIMITER: &[u8] = b"/*";

/// Scans `data_lines`, `delimiter` and `dlm_value`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JclScanner;

impl ExternalScanner for JclScanner {
    fn scan(
        &self,
        cursor: &mut ScanCursor<'_>,
        valid: &[bool],
        state: &mut ScannerState,
    ) -> Option<usize> {
        let valid = |index: usize| valid.get(index).copied().unwrap_or(false);

        if valid(DLM_VALUE) {
            let value = scan_dlm_value(cursor)?;
            state.set(value);
            return Some(DLM_VALUE);
        }
        if !cursor.is_at_line_start() {
            return None;
        }

        let default = state.is_empty();
        let delimiter = if default {
            DEFAULT_DELIMITER.to_vec()
        } else {
            state.as_bytes().to_vec()
        };

        if valid(DELIMITER) && cursor.starts_with(&delimiter) {
            for _ in 0..delimiter.len() {
                cursor.advance();
            }
            state.set(Vec::new());
            return Some(DELIMITER);
        }

        if valid(DATA_LINES) {
            // A blank line right after a statement is whitespace, not data.
            if is_blank_line(cursor) {
                return None;
            }
            let mut lines = 0;
            while !cursor.is_at_eof()
                && !cursor.starts_with(&delimiter)
                && !(default && cursor.starts_with(b"//"))
            {
                cursor.advance_line();
                cursor.mark_end();
                lines += 1;
            }
            tracing::trace!(lines, "in-stream data");
            return (lines > 0).then_some(DATA_LINES);
        }

        None
    }
}

fn is_blank_line(cursor: &mut ScanCursor<'_>) -> bool {
    let mut offset = 0;
    loop {
        match cursor.peek(offset) {
            None | Some(b'\n') => return true,
            Some(b' ' | b'\t' | b'\r') => offset += 1,
            Some(_) => return false,
        }
    }
}

/// Reads a `DLM=` value, quoted or bare. Doubled quotes stand for one quote.
fn scan_dlm_value(cursor: &mut ScanCursor<'_>) -> Option<Vec<u8>> {
    let mut value = Vec::new();
    if cursor.lookahead() == Some(b'\'') {
        cursor.advance();
        loop {
            match cursor.lookahead()? {
                b'\n' => return None,
                b'\'' => {
                    cursor.advance();
                    if cursor.lookahead() != Some(b'\'') {
                        break;
                    }
                    value.push(b'\'');
                    cursor.advance();
                }
                byte => {
                    value.push(byte);
                    cursor.advance();
                }
            }
        }
    } else {
        while let Some(byte) = cursor.lookahead() {
            if matches!(byte, b',' | b')' | b' ' | b'\t' | b'\r' | b'\n') {
                break;
            }
            value.push(byte);
            cursor.advance();
        }
    }
    (!value.is_empty()).then_some(value)
}
