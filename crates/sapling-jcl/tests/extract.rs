//! Extracting jobs, programs and datasets.

use pretty_assertions::assert_eq;
use sapling_jcl::{to_csv, to_json_report, Datasets, Extractor};
use std::path::Path;

const INTCALC: &str = include_str!("fixtures/INTCALC.jcl");

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

#[test]
fn test_extracts_sample() {
    let extraction = sapling_jcl::extract(INTCALC).unwrap();
    assert!(!extraction.has_error());
    assert_eq!(extraction.jobs, ["INTCALC"]);
    assert_eq!(extraction.programs, ["IEFBR14", "INTCALC", "SORT", "IEBGENER"]);
    assert_eq!(extraction.procedures, ["RPTPROC"]);
    assert_eq!(
        extraction.datasets,
        Datasets {
            regular: strings(&[
                "&SYSUID..INTCALC.REPORT",
                "&SYSUID..LOADLIB",
                "&SYSUID..ACCOUNT.VSAM.KSDS",
                "&SYSUID..RATES.DATA(CURRENT)",
            ]),
            gdg: strings(&["&SYSUID..TRANSACT.BKUP(+1)"]),
            temporary: strings(&["&&WORK", "&&SORTED"]),
            referback: strings(&["*.STEP020.TRANOUT"]),
        }
    );

    let counts: Vec<(&str, usize)> = extraction
        .statements
        .iter()
        .map(|(kind, count)| (kind.as_str(), *count))
        .collect();
    assert_eq!(
        counts,
        [
            ("dd_statement", 13),
            ("else_statement", 1),
            ("endif_statement", 1),
            ("exec_statement", 5),
            ("if_statement", 1),
            ("jcllib_statement", 1),
            ("job_statement", 1),
            ("null_statement", 1),
            ("set_statement", 1),
        ]
    );

    let summary = extraction.summary();
    assert_eq!(summary.total_jobs, 1);
    assert_eq!(summary.total_programs, 4);
    assert_eq!(summary.total_datasets, 8);
}

#[test]
fn test_extract_file_and_csv() {
    let mut extractor = Extractor::new().unwrap();
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/INTCALC.jcl");
    let extraction = extractor.extract_file(&path).unwrap();
    assert_eq!(extraction.file.as_deref(), Some("INTCALC.jcl"));

    let csv = to_csv(&[extraction]);
    let mut lines = csv.lines();
    assert_eq!(
        lines.next(),
        Some("File,Jobs,Programs,Regular_Datasets,GDG_Datasets,Temp_Datasets,Referback_Datasets,Parse_Errors")
    );
    assert_eq!(
        lines.next(),
        Some("INTCALC.jcl,INTCALC,IEFBR14;INTCALC;SORT;IEBGENER,4,1,2,1,0")
    );
    assert_eq!(lines.next(), None);
}

#[test]
fn test_missing_file() {
    let mut extractor = Extractor::new().unwrap();
    let err = extractor
        .extract_file(Path::new("does/not/exist.jcl"))
        .unwrap_err();
    assert!(err.to_string().contains("does/not/exist.jcl"));
}

#[test]
fn test_extractor_is_reusable() {
    let mut extractor = Extractor::new().unwrap();
    let first = extractor.extract("//A JOB\n");
    let second = extractor.extract("//B JOB\n");
    assert_eq!(first.jobs, ["A"]);
    assert_eq!(second.jobs, ["B"]);
}

#[test]
fn test_extract_dir() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("B.JCL"), "//BJOB JOB\n//S1 EXEC PGM=IEFBR14\n").unwrap();
    std::fs::write(dir.path().join("a.jcl"), "//AJOB JOB\n//S1 EXEC PGM=SORT\n").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "//NOTJCL JOB\n").unwrap();
    std::fs::create_dir(dir.path().join("nested.jcl")).unwrap();

    let mut extractor = Extractor::new().unwrap();
    let extractions = extractor.extract_dir(dir.path()).unwrap();
    let files: Vec<_> = extractions
        .iter()
        .map(|extraction| extraction.file.as_deref().unwrap())
        .collect();
    assert_eq!(files, ["B.JCL", "a.jcl"]);
    assert_eq!(extractions[0].jobs, ["BJOB"]);
    assert_eq!(extractions[1].programs, ["SORT"]);

    let report: serde_json::Value =
        serde_json::from_str(&to_json_report(&extractions).unwrap()).unwrap();
    let results = report["extraction_results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["file"], "B.JCL");
    assert_eq!(results[1]["extraction_summary"]["total_programs"], 1);

    let csv = to_csv(&extractions);
    assert_eq!(csv.lines().count(), 3);
}

#[test]
fn test_extract_missing_dir() {
    let mut extractor = Extractor::new().unwrap();
    let err = extractor.extract_dir(Path::new("no/such/dir")).unwrap_err();
    assert!(err.to_string().contains("no/such/dir"));
}
