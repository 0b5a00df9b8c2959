//! Parsing JCL statements and whole jobs.

use pretty_assertions::assert_eq;
use rstest::rstest;
use sapling::{InputEdit, Parser, TextBuffer, Tree};

const INTCALC: &str = include_str!("fixtures/INTCALC.jcl");

fn parser() -> Parser {
    let mut parser = Parser::new();
    parser.set_language(&sapling_jcl::language());
    parser
}

fn parse(source: &str) -> Tree {
    parser().parse(source, None).unwrap()
}

#[rstest]
#[case::job("//MYJOB    JOB\n", "job_statement")]
#[case::job_with_accounting("//MYJOB JOB (ACCT),'NAME',CLASS=A,MSGCLASS=X\n", "job_statement")]
#[case::exec_program("//STEP1 EXEC PGM=IEFBR14\n", "exec_statement")]
#[case::exec_procedure("// EXEC MYPROC\n", "exec_statement")]
#[case::exec_proc_keyword("//S1 EXEC PROC=MYPROC,HLQ=TEST\n", "exec_statement")]
#[case::exec_parameters("//S2 EXEC PGM=SORT,PARM='A,B',COND=((4,LT),(8,EQ,S1))\n", "exec_statement")]
#[case::dd_dataset("//IN DD DSN=MY.DATA,DISP=SHR\n", "dd_statement")]
#[case::dd_dummy("//OUT DD DUMMY\n", "dd_statement")]
#[case::dd_sysout("//SYSOUT DD SYSOUT=*\n", "dd_statement")]
#[case::dd_instream("//SYSIN DD *\nDATA\n/*\n", "dd_statement")]
#[case::dd_empty_list("//OUT DD SYSOUT=(A,,FORM)\n", "dd_statement")]
#[case::dd_override("//STEP1.SYSIN DD DSN=A.B,DISP=SHR\n", "dd_statement")]
#[case::dd_volume("//OLD DD DSN=X.Y,VOL=SER=VOL001,UNIT=3390\n", "dd_statement")]
#[case::proc("//MYPROC PROC HLQ=TEST,ENV='DEV'\n", "proc_statement")]
#[case::pend("// PEND\n", "pend_statement")]
#[case::if_rc("// IF (RC = 0) THEN\n", "if_statement")]
#[case::if_step_rc("//T1 IF STEP1.RC <= 4 AND NOT ABEND THEN\n", "if_statement")]
#[case::else_("// ELSE\n", "else_statement")]
#[case::endif("// ENDIF\n", "endif_statement")]
#[case::set("// SET HLQ=PROD,&ENV='TEST'\n", "set_statement")]
#[case::include("// INCLUDE MEMBER=COMMON\n", "include_statement")]
#[case::jcllib("//LIBS JCLLIB ORDER=(MY.PROCLIB,SYS1.PROCLIB)\n", "jcllib_statement")]
#[case::jcllib_single("// JCLLIB ORDER=MY.PROCLIB\n", "jcllib_statement")]
#[case::null("//\n", "null_statement")]
fn test_statement_parses(#[case] source: &str, #[case] kind: &str) {
    let tree = parse(source);
    assert!(!tree.has_error(), "{source}\n{tree}");
    let root = tree.root_node();
    assert_eq!(root.kind(), "source_file");
    assert_eq!(root.named_child_count(), 1);
    assert_eq!(root.named_child(0).unwrap().kind(), kind);
}

#[test]
fn test_comment_only() {
    let tree = parse("//* NOTHING BUT A COMMENT\n");
    assert!(!tree.has_error());
    assert_eq!(tree.root_node().to_sexp(), "(source_file (comment))");
}

#[test]
fn test_continuation() {
    let source = "//IN DD DSN=MY.DATA,\n//          DISP=SHR\n";
    let tree = parse(source);
    assert!(!tree.has_error(), "{tree}");
    assert_eq!(
        tree.root_node().to_sexp(),
        "(source_file (dd_statement name: (name) (dataset_parameter dataset: (dataset_name)) \
         (continuation) (parameter keyword: (keyword) value: (simple_value))))"
    );
}

#[test]
fn test_dataset_forms() {
    let tree = parse("//IN DD DSN=MY.GDG(+1),DSN=MY.PDS(MEM),DSN=&&TMP,DSN=*.S1.DD\n");
    assert!(!tree.has_error(), "{tree}");
    assert_eq!(
        tree.root_node().to_sexp(),
        "(source_file (dd_statement name: (name) \
         (dataset_parameter dataset: (gdg_dataset base: (dataset_name) generation: (generation))) \
         (dataset_parameter dataset: (member_dataset base: (dataset_name) member: (member_name))) \
         (dataset_parameter dataset: (temporary_dataset)) \
         (dataset_parameter dataset: (referback))))"
    );
}

#[test]
fn test_condition_precedence() {
    let tree = parse("// IF RC = 0 OR RC = 4 AND ABEND=FALSE THEN\n");
    assert!(!tree.has_error(), "{tree}");
    assert_eq!(
        tree.root_node().to_sexp(),
        "(source_file (if_statement condition: (binary_condition \
         left: (comparison left: (return_code) operator: (comparison_operator) right: (number)) \
         right: (binary_condition \
         left: (comparison left: (return_code) operator: (comparison_operator) right: (number)) \
         right: (abend_condition)))))"
    );
}

#[test]
fn test_nested_subparameters() {
    let tree = parse("//OUT DD SPACE=(CYL,(5,5),RLSE)\n");
    assert!(!tree.has_error(), "{tree}");
    assert_eq!(
        tree.root_node().to_sexp(),
        "(source_file (dd_statement name: (name) (parameter keyword: (keyword) value: \
         (subparameter_list (simple_value) (subparameter_list (simple_value) (simple_value)) \
         (simple_value)))))"
    );
}

#[test]
fn test_sample_parses_cleanly() {
    let tree = parse(INTCALC);
    assert!(!tree.has_error(), "{:?}", tree.errors());
    assert!(tree.is_complete());
    assert_eq!(tree.root_node().end_byte(), INTCALC.len());
    assert_eq!(tree.unparse(INTCALC.as_bytes()), INTCALC.as_bytes());
}

#[test]
fn test_missing_operand_is_reported() {
    let tree = parse("//MYJOB JOB\n//STEP1 EXEC\n//IN DD DSN=A.B\n");
    assert!(tree.has_error());
    assert!(!tree.errors().is_empty());
}

#[test]
fn test_custom_delimiter_is_one_token() {
    let source = "//SYSIN DD DATA,DLM=$$\n//NOT JCL\n  MORE DATA\n$$\n";
    let tree = parse(source);
    assert!(!tree.has_error(), "{tree}");
    let data: Vec<_> = tree
        .leaves()
        .into_iter()
        .filter(|leaf| tree.language().symbol_name(leaf.symbol) == Some("data_lines"))
        .map(|leaf| &source[leaf.range.start_byte..leaf.range.end_byte])
        .collect();
    assert_eq!(data, ["//NOT JCL\n  MORE DATA\n"]);
}

#[test]
fn test_incremental_edit_matches_fresh_parse() {
    let mut parser = parser();
    let tree = parser.parse(INTCALC, None).unwrap();

    let start = INTCALC.find("PGM=SORT").unwrap() + 4;
    let edit = InputEdit::replace(INTCALC.as_bytes(), start..start + 4, b"ICEMAN");
    let edited_source = format!("{}ICEMAN{}", &INTCALC[..start], &INTCALC[start + 4..]);

    let edited = tree.edit(&edit).unwrap();
    let reparsed = parser.parse(&edited_source, Some(&edited)).unwrap();
    let fresh = parser.parse(&edited_source, None).unwrap();
    assert_eq!(reparsed, fresh);
    assert!(!reparsed.has_error());
}

#[test]
fn test_editing_inline_data_through_a_buffer() {
    let mut parser = parser();
    let mut buffer = TextBuffer::from(INTCALC);
    let tree = buffer.parse(&mut parser, None).unwrap();

    // Turn the in-stream delimiter into data, then restore it.
    let start = INTCALC.find("\n/*\n").unwrap() + 1;
    let edit = buffer.replace(start..start + 2, "XX").unwrap();
    let broken = buffer
        .parse(&mut parser, Some(&tree.edit(&edit).unwrap()))
        .unwrap();
    assert_eq!(broken, parser.parse(buffer.to_string(), None).unwrap());

    let edit = buffer.replace(start..start + 2, "/*").unwrap();
    let restored = buffer
        .parse(&mut parser, Some(&broken.edit(&edit).unwrap()))
        .unwrap();
    assert_eq!(restored, tree);
}
