//! Command line behaviour of the `sapling` binary.

#![cfg(feature = "cli")]

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

const SUM_GRAMMAR: &str = r#"{
    "name": "sum",
    "rules": {
        "expr": {
            "type": "CHOICE",
            "members": [
                {
                    "type": "PREC_LEFT",
                    "value": 1,
                    "content": {
                        "type": "SEQ",
                        "members": [
                            {"type": "FIELD", "name": "left", "content": {"type": "SYMBOL", "name": "expr"}},
                            {"type": "STRING", "value": "+"},
                            {"type": "FIELD", "name": "right", "content": {"type": "SYMBOL", "name": "expr"}}
                        ]
                    }
                },
                {"type": "SYMBOL", "name": "number"}
            ]
        },
        "number": {"type": "PATTERN", "value": "\\d+"}
    }
}"#;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let workspace = Self {
            dir: TempDir::new().unwrap(),
        };
        workspace.write("grammar.json", SUM_GRAMMAR);
        workspace
    }

    fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

fn sapling() -> Command {
    Command::cargo_bin("sapling").unwrap()
}

#[test]
fn test_validate_accepts_grammar() {
    let workspace = Workspace::new();
    sapling()
        .arg("validate")
        .arg(workspace.path("grammar.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("ok"));
}

#[test]
fn test_validate_rejects_undefined_symbol() {
    let workspace = Workspace::new();
    let grammar = workspace.write(
        "broken.json",
        r#"{"name": "broken", "rules": {"a": {"type": "SYMBOL", "name": "b"}}}"#,
    );
    sapling()
        .arg("validate")
        .arg(grammar)
        .assert()
        .failure()
        .stderr(predicate::str::contains("undefined symbol 'b'"));
}

#[test]
fn test_generate_writes_table() {
    let workspace = Workspace::new();
    let output = workspace.path("table.json");
    sapling()
        .arg("generate")
        .arg(workspace.path("grammar.json"))
        .arg("-o")
        .arg(&output)
        .assert()
        .success();
    let table: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(output).unwrap()).unwrap();
    assert_eq!(table["version"], 1);
    assert_eq!(table["name"], "sum");
}

#[test]
fn test_parse_prints_tree() {
    let workspace = Workspace::new();
    let input = workspace.write("input.txt", "1 + 2");
    sapling()
        .arg("parse")
        .arg(workspace.path("grammar.json"))
        .arg(input)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("(expr [0, 0] - [0, 5]"))
        .stdout(predicate::str::contains("right: (expr [0, 4] - [0, 5]"))
        .stdout(predicate::str::contains("(number [0, 0] - [0, 1])"));
}

#[test]
fn test_parse_fails_on_syntax_errors() {
    let workspace = Workspace::new();
    let input = workspace.write("input.txt", "1 +");
    sapling()
        .arg("parse")
        .arg(workspace.path("grammar.json"))
        .arg(input)
        .arg("--quiet")
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("input.txt"));
}

#[test]
fn test_query_prints_captures() {
    let workspace = Workspace::new();
    let input = workspace.write("input.txt", "1 + 22");
    let query = workspace.write("query.scm", "; numbers on the right\n(expr right: (expr (number) @right))\n");
    sapling()
        .arg("query")
        .arg(workspace.path("grammar.json"))
        .arg(query)
        .arg(input)
        .assert()
        .success()
        .stdout("pattern: 0 capture: right [0, 4] - [0, 6] `22`\n");
}

#[test]
fn test_query_reports_compile_errors() {
    let workspace = Workspace::new();
    let input = workspace.write("input.txt", "1");
    let query = workspace.write("query.scm", "(nonsense) @n");
    sapling()
        .arg("query")
        .arg(workspace.path("grammar.json"))
        .arg(query)
        .arg(input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown node kind 'nonsense'"));
}
