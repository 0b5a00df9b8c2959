//! The JCL grammar, written with the rule combinators.
//!
//! Every statement starts with `//`, an optional name field and an operation
//! keyword. Operands are comma separated; a trailing comma followed by a
//! `//` line continues the statement. `//*` comments may appear anywhere.
//!
//! In-stream data after `DD *` or `DD DATA` comes from the external scanner
//! (see [`crate::scanner`]) as `data_lines`, followed by a `delimiter`.

use sapling::grammar::dsl::{
    alias, choice, field, optional, pattern, prec, prec_left, repeat, seq, string, sym,
};
use sapling::{Grammar, Rule};

/// Name field of a statement: up to eight characters, optionally qualified
/// by a step name (`STEP1.SYSIN`).
const NAME: &str = r"[A-Z#@$][A-Z0-9#@$]{0,7}(?:\.[A-Z#@$][A-Z0-9#@$]{0,7})?";

/// Builds the grammar.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn grammar() -> Grammar {
    Grammar::new("jcl")
        .extra(pattern(r"\s"))
        .extra(sym("comment"))
        .external("data_lines")
        .external("delimiter")
        .external("dlm_value")
        .rule("source_file", repeat(sym("_statement")))
        .rule(
            "_statement",
            choice(vec![
                sym("job_statement"),
                sym("exec_statement"),
                sym("dd_statement"),
                sym("proc_statement"),
                sym("pend_statement"),
                sym("if_statement"),
                sym("else_statement"),
                sym("endif_statement"),
                sym("set_statement"),
                sym("include_statement"),
                sym("jcllib_statement"),
                sym("null_statement"),
            ]),
        )
        .rule(
            "job_statement",
            seq(vec![
                string("//"),
                field("name", sym("name")),
                string("JOB"),
                optional(sym("_parameters")),
            ]),
        )
        .rule(
            "exec_statement",
            statement(
                "EXEC",
                vec![
                    choice(vec![
                        seq(vec![string("PGM="), field("program", sym("program_name"))]),
                        seq(vec![string("PROC="), field("procedure", sym("proc_name"))]),
                        field("procedure", sym("proc_name")),
                    ]),
                    repeat(seq(vec![sym("_comma"), sym("_parameter")])),
                ],
            ),
        )
        .rule(
            "dd_statement",
            statement(
                "DD",
                vec![optional(choice(vec![
                    seq(vec![
                        choice(vec![string("*"), string("DATA")]),
                        repeat(seq(vec![sym("_comma"), sym("_parameter")])),
                        optional(field("data", sym("inline_data"))),
                    ]),
                    seq(vec![
                        string("DUMMY"),
                        repeat(seq(vec![sym("_comma"), sym("_parameter")])),
                    ]),
                    sym("_parameters"),
                ]))],
            ),
        )
        .rule(
            "inline_data",
            choice(vec![
                seq(vec![sym("data_lines"), optional(sym("delimiter"))]),
                sym("delimiter"),
            ]),
        )
        .rule(
            "proc_statement",
            statement("PROC", vec![optional(sym("_parameters"))]),
        )
        .rule("pend_statement", statement("PEND", Vec::new()))
        .rule(
            "if_statement",
            statement(
                "IF",
                vec![field("condition", sym("_condition")), string("THEN")],
            ),
        )
        .rule("else_statement", statement("ELSE", Vec::new()))
        .rule("endif_statement", statement("ENDIF", Vec::new()))
        .rule(
            "set_statement",
            statement(
                "SET",
                vec![
                    sym("symbol_assignment"),
                    repeat(seq(vec![sym("_comma"), sym("symbol_assignment")])),
                ],
            ),
        )
        .rule(
            "include_statement",
            statement(
                "INCLUDE",
                vec![string("MEMBER="), field("member", sym("member_name"))],
            ),
        )
        .rule(
            "jcllib_statement",
            statement(
                "JCLLIB",
                vec![
                    string("ORDER="),
                    choice(vec![
                        sym("dataset_name"),
                        seq(vec![
                            string("("),
                            sym("dataset_name"),
                            repeat(seq(vec![sym("_comma"), sym("dataset_name")])),
                            string(")"),
                        ]),
                    ]),
                ],
            ),
        )
        .rule("null_statement", pattern(r"//[ \t]*(?:\r?\n|$)"))
        .rule("comment", pattern(r"//\*[^\n]*"))
        .rule("name", pattern(NAME))
        .rule("program_name", pattern(r"[A-Z#@$&*][A-Z0-9#@$&.]*"))
        .rule("proc_name", pattern(r"&?[A-Z#@$][A-Z0-9#@$]{0,7}"))
        .rule("member_name", pattern(r"&?[A-Z#@$][A-Z0-9#@$]{0,7}"))
        // Operands
        .rule("_comma", seq(vec![string(","), optional(sym("continuation"))]))
        .rule("continuation", string("//"))
        .rule(
            "_parameters",
            seq(vec![
                sym("_parameter"),
                repeat(seq(vec![sym("_comma"), sym("_parameter")])),
            ]),
        )
        .rule(
            "_parameter",
            choice(vec![
                sym("parameter"),
                sym("_value"),
                sym("dataset_parameter"),
                sym("dlm_parameter"),
            ]),
        )
        .rule(
            "parameter",
            seq(vec![
                field("keyword", alias(sym("simple_value"), "keyword", true)),
                string("="),
                field("value", choice(vec![sym("_value"), sym("parameter")])),
            ]),
        )
        .rule(
            "_value",
            choice(vec![
                sym("simple_value"),
                sym("quoted_string"),
                sym("symbolic_parameter"),
                sym("subparameter_list"),
                sym("referback"),
            ]),
        )
        .rule("simple_value", pattern(r"\*|[A-Z0-9#@$][A-Z0-9#@$.]*"))
        .rule("quoted_string", pattern(r"'(?:[^'\n]|'')*'"))
        .rule(
            "symbolic_parameter",
            pattern(r"&[A-Z#@$][A-Z0-9#@$]*(?:\.[A-Z0-9#@$.&]*)?"),
        )
        .rule(
            "subparameter_list",
            seq(vec![
                string("("),
                optional(sym("_item")),
                repeat(seq(vec![sym("_comma"), optional(sym("_item"))])),
                string(")"),
            ]),
        )
        .rule("_item", choice(vec![sym("_value"), sym("parameter")]))
        // Datasets
        .rule(
            "dataset_parameter",
            seq(vec![
                choice(vec![string("DSN="), string("DSNAME=")]),
                field("dataset", sym("_dataset")),
            ]),
        )
        .rule(
            "_dataset",
            choice(vec![
                sym("dataset_name"),
                sym("gdg_dataset"),
                sym("member_dataset"),
                sym("temporary_dataset"),
                sym("referback"),
            ]),
        )
        .rule(
            "dataset_name",
            pattern(r"(?:[A-Z#@$]|&[A-Z#@$])[A-Z0-9#@$&.]*"),
        )
        .rule("temporary_dataset", pattern(r"&&[A-Z#@$][A-Z0-9#@$]*"))
        .rule(
            "referback",
            pattern(r"\*\.[A-Z#@$][A-Z0-9#@$]*(?:\.[A-Z#@$][A-Z0-9#@$]*)*"),
        )
        .rule(
            "gdg_dataset",
            seq(vec![
                field("base", sym("dataset_name")),
                string("("),
                field("generation", sym("generation")),
                string(")"),
            ]),
        )
        .rule("generation", pattern(r"[+-]?\d+"))
        .rule(
            "member_dataset",
            seq(vec![
                field(
                    "base",
                    choice(vec![sym("dataset_name"), sym("temporary_dataset")]),
                ),
                string("("),
                field("member", sym("member_name")),
                string(")"),
            ]),
        )
        .rule(
            "dlm_parameter",
            seq(vec![string("DLM="), field("value", sym("dlm_value"))]),
        )
        // Conditions
        .rule(
            "_condition",
            choice(vec![
                sym("comparison"),
                sym("abend_condition"),
                sym("not_condition"),
                sym("binary_condition"),
                sym("parenthesized_condition"),
            ]),
        )
        .rule(
            "comparison",
            seq(vec![
                field("left", sym("return_code")),
                field("operator", sym("comparison_operator")),
                field("right", sym("number")),
            ]),
        )
        .rule(
            "return_code",
            pattern(r"(?:[A-Z#@$][A-Z0-9#@$]{0,7}\.){0,2}RC"),
        )
        .rule(
            "comparison_operator",
            choice(
                ["=", "!=", "¬=", "<", ">", "<=", ">=", "EQ", "NE", "LT", "GT", "LE", "GE"]
                    .into_iter()
                    .map(string)
                    .collect(),
            ),
        )
        .rule("number", pattern(r"\d+"))
        .rule(
            "abend_condition",
            seq(vec![
                string("ABEND"),
                optional(seq(vec![
                    string("="),
                    field("value", choice(vec![string("TRUE"), string("FALSE")])),
                ])),
            ]),
        )
        .rule(
            "not_condition",
            prec(3, seq(vec![string("NOT"), field("operand", sym("_condition"))])),
        )
        .rule(
            "binary_condition",
            choice(vec![
                prec_left(2, binary(&["AND", "&"])),
                prec_left(1, binary(&["OR", "|"])),
            ]),
        )
        .rule(
            "parenthesized_condition",
            seq(vec![string("("), sym("_condition"), string(")")]),
        )
        // SET
        .rule(
            "symbol_assignment",
            seq(vec![
                field("name", sym("symbol_name")),
                string("="),
                field("value", sym("_value")),
            ]),
        )
        .rule("symbol_name", pattern(r"&?[A-Z#@$][A-Z0-9#@$]{0,7}"))
}

/// `// [name] OPERATION operands...`
fn statement(operation: &str, operands: Vec<Rule>) -> Rule {
    let mut members = vec![
        string("//"),
        optional(field("name", sym("name"))),
        string(operation),
    ];
    members.extend(operands);
    seq(members)
}

fn binary(operators: &[&str]) -> Rule {
    seq(vec![
        field("left", sym("_condition")),
        field(
            "operator",
            choice(operators.iter().copied().map(string).collect()),
        ),
        field("right", sym("_condition")),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use sapling::validate;

    #[test]
    fn test_grammar_validates() {
        let grammar = grammar();
        validate(&grammar).unwrap();
        assert_eq!(grammar.start_rule(), Some("source_file"));
    }

    #[test]
    fn test_grammar_round_trips_through_json() {
        let grammar = grammar();
        let parsed = sapling::parse_grammar(&grammar.to_json().unwrap()).unwrap();
        assert_eq!(parsed, grammar);
    }
}
