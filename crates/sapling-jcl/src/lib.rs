//! IBM z/OS JCL for sapling.
//!
//! [`language()`] compiles the grammar once per process and hands out cheap
//! clones of the result:
//!
//! ```
//! use sapling::Parser;
//!
//! let mut parser = Parser::new();
//! parser.set_language(&sapling_jcl::language());
//! let tree = parser
//!     .parse("//MYJOB    JOB (ACCT),'ME',CLASS=A\n//STEP1    EXEC PGM=IEFBR14\n", None)
//!     .unwrap();
//! assert_eq!(
//!     tree.root_node().to_sexp(),
//!     "(source_file (job_statement name: (name) (subparameter_list (simple_value)) \
//!      (quoted_string) (parameter keyword: (keyword) value: (simple_value))) \
//!      (exec_statement name: (name) program: (program_name)))"
//! );
//! ```
#![allow(clippy::multiple_crate_versions)]

mod extract;
mod grammar;
mod scanner;

pub use extract::{
    extract, to_csv, to_json_report, DatasetBreakdown, Datasets, ExtractError, Extraction,
    Extractor, Summary,
};
pub use grammar::grammar;
pub use scanner::JclScanner;

use sapling::{GenerateError, Language};
use std::sync::{Arc, OnceLock};

static LANGUAGE: OnceLock<Language> = OnceLock::new();

/// The JCL language, compiled on first use.
///
/// # Errors
///
/// Fails if the grammar does not compile, which is a bug in this crate.
pub fn try_language() -> Result<Language, GenerateError> {
    if let Some(language) = LANGUAGE.get() {
        return Ok(language.clone());
    }
    let language = Language::generate_with_scanner(&grammar(), Arc::new(JclScanner))?;
    tracing::debug!(
        symbols = language.symbol_count(),
        states = language.state_count(),
        "compiled JCL grammar"
    );
    Ok(LANGUAGE.get_or_init(|| language).clone())
}

/// The JCL language, shared by every parser in the process.
///
/// # Panics
///
/// If the grammar does not compile; see [`try_language`].
#[must_use]
pub fn language() -> Language {
    try_language().expect("the JCL grammar compiles")
}

/// Whether `name` is a valid job, step or DD name: one to eight characters,
/// a letter or national character (`#`, `@`, `$`) first, then letters,
/// digits or national characters.
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    let national = |byte: u8| matches!(byte, b'#' | b'@' | b'$');
    match name.as_bytes() {
        [first, rest @ ..] if rest.len() < 8 => {
            (first.is_ascii_uppercase() || national(*first))
                && rest
                    .iter()
                    .all(|&byte| byte.is_ascii_uppercase() || byte.is_ascii_digit() || national(byte))
        }
        _ => false,
    }
}
