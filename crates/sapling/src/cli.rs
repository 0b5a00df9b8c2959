//! The `sapling` command line tool.

use anyhow::Context as _;
use clap::{Parser as _, Subcommand};
use sapling::{parse_grammar, validate, Grammar, Language, Parser, Query};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(clap::Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log more; repeat for more detail. `RUST_LOG` overrides this.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Checks a grammar.json file for structural errors.
    Validate {
        /// Path to the grammar.
        grammar: PathBuf,
    },

    /// Compiles a grammar.json file into a parse table artifact.
    Generate {
        /// Path to the grammar.
        grammar: PathBuf,
        /// Where to write the table; defaults to standard output.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Parses a file and prints its syntax tree.
    Parse {
        /// Path to the grammar.
        grammar: PathBuf,
        /// File to parse.
        file: PathBuf,
        /// Print nothing; only report errors through the exit code.
        #[arg(short, long)]
        quiet: bool,
        /// Report how long parsing took.
        #[arg(short, long)]
        time: bool,
    },

    /// Runs a query over a file and prints the captures.
    Query {
        /// Path to the grammar.
        grammar: PathBuf,
        /// File holding the query patterns.
        query: PathBuf,
        /// File to parse and query.
        file: PathBuf,
    },
}

fn read(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn load_grammar(path: &Path) -> anyhow::Result<Grammar> {
    parse_grammar(&read(path)?).with_context(|| format!("invalid grammar in {}", path.display()))
}

fn load_language(path: &Path) -> anyhow::Result<Language> {
    let grammar = load_grammar(path)?;
    Language::generate(&grammar).with_context(|| format!("failed to generate {}", path.display()))
}

fn parse_file(language: &Language, path: &Path) -> anyhow::Result<(String, sapling::Tree)> {
    let text = read(path)?;
    let mut parser = Parser::new();
    parser.set_language(language);
    let tree = parser
        .parse(&text, None)
        .context("parser has no language")?;
    Ok((text, tree))
}

/// Runs a subcommand; `Ok(false)` means it ran but found problems.
fn run(command: Command) -> anyhow::Result<bool> {
    match command {
        Command::Validate { grammar } => {
            validate(&load_grammar(&grammar)?)?;
            println!("{}: ok", grammar.display());
            Ok(true)
        }
        Command::Generate { grammar, output } => {
            let table = sapling::generate(&load_grammar(&grammar)?)?;
            let json = serde_json::to_string_pretty(&table)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
                    tracing::info!(path = %path.display(), "wrote table");
                }
                None => println!("{json}"),
            }
            Ok(true)
        }
        Command::Parse {
            grammar,
            file,
            quiet,
            time,
        } => {
            let language = load_language(&grammar)?;
            let started = Instant::now();
            let (_, tree) = parse_file(&language, &file)?;
            let elapsed = started.elapsed();
            if !quiet {
                println!("{tree}");
            }
            if time {
                eprintln!("{}\t{} ms", file.display(), elapsed.as_secs_f64() * 1000.0);
            }
            for error in tree.errors() {
                eprintln!("{}: {error}", file.display());
            }
            Ok(!tree.has_error())
        }
        Command::Query {
            grammar,
            query,
            file,
        } => {
            let language = load_language(&grammar)?;
            let query_source = read(&query)?;
            let query = Query::new(&language, &query_source)
                .with_context(|| format!("invalid query in {}", query.display()))?;
            let (text, tree) = parse_file(&language, &file)?;
            for found in query.matches(tree.root_node(), text.as_bytes()) {
                for capture in &found.captures {
                    let name = &query.capture_names()[capture.index as usize];
                    let node_text = capture.node.utf8_text(text.as_bytes()).unwrap_or_default();
                    println!(
                        "pattern: {} capture: {name} {} `{node_text}`",
                        found.pattern_index,
                        capture.node.range()
                    );
                }
            }
            Ok(true)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli.command) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_arguments() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
