//! A Rust-native tree-sitter: incremental GLR parsing with persistent syntax
//! trees.
//!
//! A typical session compiles a [`Grammar`] into a [`Language`], parses text
//! into a [`Tree`], edits it and reparses incrementally:
//!
//! ```
//! use sapling::grammar::dsl::{choice, pattern, prec_left, seq, string, sym};
//! use sapling::{Grammar, InputEdit, Language, Parser};
//!
//! let grammar = Grammar::new("sum")
//!     .rule(
//!         "expr",
//!         choice(vec![
//!             prec_left(1, seq(vec![sym("expr"), string("+"), sym("expr")])),
//!             sym("number"),
//!         ]),
//!     )
//!     .rule("number", pattern(r"\d+"));
//! let language = Language::generate(&grammar).unwrap();
//!
//! let mut parser = Parser::new();
//! parser.set_language(&language);
//! let tree = parser.parse("1 + 2", None).unwrap();
//! assert!(!tree.has_error());
//!
//! let edit = InputEdit::replace(b"1 + 2", 4..5, b"30");
//! let tree = parser.reparse(&tree, &[edit], "1 + 30").unwrap().unwrap();
//! assert_eq!(tree.root_node().end_byte(), 6);
//! ```
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(clippy::multiple_crate_versions)]

/// Core structures and parsing logic for Tree-sitter grammars.
///
/// This module defines how Sapling understands and manipulates the
/// declarative shape of a language: the grammar itself. Everything else
/// builds upon these types.
pub mod grammar;

/// Grammar validation and consistency checking utilities.
///
/// Validation exists to protect downstream stages (table generation and
/// parsing) from malformed grammars.
pub mod validate;

/// Grammar compilation into parse tables.
pub mod generate;

/// Compiled languages and the table artifact.
pub mod language;

/// External scanners and their serialized state.
pub mod scanner;

/// Rows, columns and byte ranges.
pub mod point;

mod lexer;

/// The GLR parser.
pub mod parser;

/// Syntax trees, nodes and cursors.
pub mod tree;

/// Edit descriptors and tree editing.
pub mod edit;

/// Pattern queries over trees.
pub mod query;

/// Rope-backed documents.
pub mod text;

pub use edit::{EditError, InputEdit};
pub use generate::{generate, GenerateError};
pub use grammar::{parse_grammar, Grammar, GrammarError, Rule};
pub use language::{
    FieldId, Language, LanguageError, LanguageTable, Symbol, ERROR_SYMBOL, LANGUAGE_VERSION,
};
pub use parser::{ParseOptions, Parser};
pub use point::{Point, Range};
pub use query::{Query, QueryCapture, QueryError, QueryErrorKind, QueryMatch, QueryMatches};
pub use scanner::{ExternalScanner, ScanCursor, ScannerState};
pub use text::{TextBuffer, TextError};
pub use tree::{Leaf, Node, SyntaxError, Tree, TreeCursor};
pub use validate::{validate, ValidationError};
