//! Pulls jobs, programs and datasets out of JCL.

use crate::try_language;
use sapling::{GenerateError, Parser, Query, QueryError, Tree};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

const QUERY: &str = r"
(job_statement name: (name) @job)
(exec_statement program: (program_name) @program)
(exec_statement procedure: (proc_name) @procedure)
(dataset_parameter dataset: (_) @dataset)
";

const CSV_HEADER: &str =
    "File,Jobs,Programs,Regular_Datasets,GDG_Datasets,Temp_Datasets,Referback_Datasets,Parse_Errors";

/// Something that stopped an extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// The grammar did not compile.
    #[error(transparent)]
    Generate(#[from] GenerateError),
    /// The extraction query did not compile.
    #[error(transparent)]
    Query(#[from] QueryError),
    /// A JCL file could not be read.
    #[error("failed to read {path}")]
    Io {
        /// The file.
        path: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Dataset names by kind, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Datasets {
    /// Cataloged datasets, including `NAME(MEMBER)`.
    pub regular: Vec<String>,
    /// Generation data groups such as `NAME(+1)`.
    pub gdg: Vec<String>,
    /// `&&NAME` datasets.
    pub temporary: Vec<String>,
    /// `*.STEP.DD` refer-backs.
    pub referback: Vec<String>,
}

impl Datasets {
    /// Number of datasets of every kind.
    #[must_use]
    pub fn total(&self) -> usize {
        self.regular.len() + self.gdg.len() + self.temporary.len() + self.referback.len()
    }

    fn push(&mut self, kind: &str, base_kind: Option<&str>, text: String) {
        let list = match (kind, base_kind) {
            ("gdg_dataset", _) => &mut self.gdg,
            ("temporary_dataset", _) | ("member_dataset", Some("temporary_dataset")) => {
                &mut self.temporary
            }
            ("referback", _) => &mut self.referback,
            _ => &mut self.regular,
        };
        list.push(text);
    }
}

/// Counts per dataset kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetBreakdown {
    /// Regular datasets.
    pub regular: usize,
    /// GDG datasets.
    pub gdg: usize,
    /// Temporary datasets.
    pub temporary: usize,
    /// Refer-backs.
    pub referback: usize,
}

/// Totals for one file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Number of JOB statements.
    pub total_jobs: usize,
    /// Number of `PGM=` steps.
    pub total_programs: usize,
    /// Number of datasets of every kind.
    pub total_datasets: usize,
    /// Datasets per kind.
    pub dataset_breakdown: DatasetBreakdown,
}

/// What one JCL source contains.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    /// File name, when the source came from a file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Job names.
    pub jobs: Vec<String>,
    /// Programs run by `EXEC PGM=`.
    pub programs: Vec<String>,
    /// Procedures run by `EXEC`.
    pub procedures: Vec<String>,
    /// Datasets named by `DSN=`.
    pub datasets: Datasets,
    /// Number of statements of each kind.
    pub statements: BTreeMap<String, usize>,
    /// Number of syntax errors in the parse.
    pub parse_errors: usize,
}

#[derive(Serialize)]
struct Report<'a> {
    #[serde(flatten)]
    extraction: &'a Extraction,
    extraction_summary: Summary,
}

impl<'a> From<&'a Extraction> for Report<'a> {
    fn from(extraction: &'a Extraction) -> Self {
        Self {
            extraction,
            extraction_summary: extraction.summary(),
        }
    }
}

#[derive(Serialize)]
struct Reports<'a> {
    extraction_results: Vec<Report<'a>>,
}

impl Extraction {
    /// Whether the source parsed with errors.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.parse_errors > 0
    }

    /// Totals for the extraction.
    #[must_use]
    pub fn summary(&self) -> Summary {
        Summary {
            total_jobs: self.jobs.len(),
            total_programs: self.programs.len(),
            total_datasets: self.datasets.total(),
            dataset_breakdown: DatasetBreakdown {
                regular: self.datasets.regular.len(),
                gdg: self.datasets.gdg.len(),
                temporary: self.datasets.temporary.len(),
                referback: self.datasets.referback.len(),
            },
        }
    }

    /// Pretty JSON of the extraction together with its summary.
    ///
    /// # Errors
    ///
    /// Only if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&Report::from(self))
    }

    fn csv_row(&self) -> String {
        [
            csv_field(self.file.as_deref().unwrap_or_default()),
            csv_field(&self.jobs.join(";")),
            csv_field(&self.programs.join(";")),
            self.datasets.regular.len().to_string(),
            self.datasets.gdg.len().to_string(),
            self.datasets.temporary.len().to_string(),
            self.datasets.referback.len().to_string(),
            self.parse_errors.to_string(),
        ]
        .join(",")
    }
}

/// Pretty JSON of several extractions as `{"extraction_results": [...]}`,
/// each with its summary.
///
/// # Errors
///
/// Only if serialization fails.
pub fn to_json_report(extractions: &[Extraction]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&Reports {
        extraction_results: extractions.iter().map(Report::from).collect(),
    })
}

/// One CSV line per extraction, with a header.
#[must_use]
pub fn to_csv(extractions: &[Extraction]) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for extraction in extractions {
        out.push_str(&extraction.csv_row());
        out.push('\n');
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// A parser and compiled query, reusable across sources.
#[derive(Debug)]
pub struct Extractor {
    parser: Parser,
    query: Query,
}

impl Extractor {
    /// Builds an extractor for the shared JCL language.
    ///
    /// # Errors
    ///
    /// Fails if the grammar or the extraction query does not compile.
    pub fn new() -> Result<Self, ExtractError> {
        let language = try_language()?;
        let mut parser = Parser::new();
        parser.set_language(&language);
        let query = Query::new(&language, QUERY)?;
        Ok(Self { parser, query })
    }

    /// Parses `source` and extracts from it.
    pub fn extract(&mut self, source: &str) -> Extraction {
        match self.parser.parse(source, None) {
            Some(tree) => self.extract_tree(&tree, source),
            None => Extraction::default(),
        }
    }

    /// Extracts from an already parsed tree of `source`.
    #[must_use]
    pub fn extract_tree(&self, tree: &Tree, source: &str) -> Extraction {
        let mut extraction = Extraction {
            parse_errors: tree.errors().len(),
            ..Extraction::default()
        };

        for statement in tree.root_node().named_children() {
            if statement.kind().ends_with("_statement") {
                *extraction
                    .statements
                    .entry(statement.kind().to_string())
                    .or_default() += 1;
            }
        }

        let names = self.query.capture_names();
        for found in self.query.matches(tree.root_node(), source.as_bytes()) {
            for capture in &found.captures {
                let Ok(text) = capture.node.utf8_text(source.as_bytes()) else {
                    continue;
                };
                let text = text.to_string();
                match names.get(capture.index as usize).map(String::as_str) {
                    Some("job") => extraction.jobs.push(text),
                    Some("program") => extraction.programs.push(text),
                    Some("procedure") => extraction.procedures.push(text),
                    _ => {
                        let base = capture.node.child_by_field_name("base");
                        extraction.datasets.push(
                            capture.node.kind(),
                            base.map(|base| base.kind()),
                            text,
                        );
                    }
                }
            }
        }

        tracing::debug!(
            jobs = extraction.jobs.len(),
            programs = extraction.programs.len(),
            datasets = extraction.datasets.total(),
            errors = extraction.parse_errors,
            "extracted"
        );
        extraction
    }

    /// Reads and extracts a file, recording its name.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read.
    pub fn extract_file(&mut self, path: &Path) -> Result<Extraction, ExtractError> {
        let source = std::fs::read_to_string(path).map_err(|source| ExtractError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut extraction = self.extract(&source);
        extraction.file = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        Ok(extraction)
    }

    /// Extracts every `.jcl` file (in any letter case) directly inside
    /// `dir`, in file name order.
    ///
    /// # Errors
    ///
    /// Fails if the directory or one of its JCL files cannot be read.
    pub fn extract_dir(&mut self, dir: &Path) -> Result<Vec<Extraction>, ExtractError> {
        let io_error = |path: &Path| {
            let path = path.display().to_string();
            move |source: std::io::Error| ExtractError::Io { path, source }
        };
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(io_error(dir))? {
            let path = entry.map_err(io_error(dir))?.path();
            let is_jcl = path
                .extension()
                .is_some_and(|extension| extension.eq_ignore_ascii_case("jcl"));
            if is_jcl && path.is_file() {
                files.push(path);
            }
        }
        files.sort();

        let mut extractions = Vec::with_capacity(files.len());
        for path in files {
            tracing::info!(path = %path.display(), "processing");
            extractions.push(self.extract_file(&path)?);
        }
        Ok(extractions)
    }
}

/// Extracts from `source` with a fresh [`Extractor`].
///
/// # Errors
///
/// See [`Extractor::new`].
pub fn extract(source: &str) -> Result<Extraction, ExtractError> {
    Ok(Extractor::new()?.extract(source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_dataset_kinds() {
        let source = "\
//COPY     EXEC PGM=IEBGENER
//SYSUT1   DD DSN=PROD.INPUT,DISP=SHR
//SYSUT2   DD DSN=PROD.HISTORY(+1),DISP=(NEW,CATLG)
//WORK     DD DSN=&&TEMP,DISP=(NEW,PASS)
//LIB      DD DSN=PROD.PDS(MEMBER),DISP=SHR
//TEMPMEM  DD DSN=&&LOAD(PGM),DISP=(NEW,PASS)
//BACK     DD DSN=*.COPY.SYSUT1,DISP=SHR
";
        let extraction = extract(source).unwrap();
        assert!(!extraction.has_error());
        assert_eq!(
            extraction.datasets,
            Datasets {
                regular: vec!["PROD.INPUT".into(), "PROD.PDS(MEMBER)".into()],
                gdg: vec!["PROD.HISTORY(+1)".into()],
                temporary: vec!["&&TEMP".into(), "&&LOAD(PGM)".into()],
                referback: vec!["*.COPY.SYSUT1".into()],
            }
        );
        assert_eq!(extraction.programs, ["IEBGENER"]);
        assert_eq!(extraction.statements["dd_statement"], 6);
    }

    #[test]
    fn test_procedures_are_not_programs() {
        let extraction = extract("//RUN  EXEC MYPROC\n//RUN2 EXEC PROC=OTHER\n").unwrap();
        assert!(extraction.programs.is_empty());
        assert_eq!(extraction.procedures, ["MYPROC", "OTHER"]);
    }

    #[test]
    fn test_summary_and_json() {
        let extraction = extract("//MYJOB JOB\n//S1 EXEC PGM=IEFBR14\n//DD1 DD DSN=A.B,DISP=SHR\n").unwrap();
        let summary = extraction.summary();
        assert_eq!(summary.total_jobs, 1);
        assert_eq!(summary.total_programs, 1);
        assert_eq!(summary.total_datasets, 1);
        assert_eq!(summary.dataset_breakdown.regular, 1);

        let json: serde_json::Value = serde_json::from_str(&extraction.to_json().unwrap()).unwrap();
        assert_eq!(json["jobs"][0], "MYJOB");
        assert_eq!(json["extraction_summary"]["total_datasets"], 1);
        assert!(json.get("file").is_none());
    }

    #[test]
    fn test_csv() {
        let extraction = Extraction {
            file: Some("A,B.jcl".into()),
            jobs: vec!["J1".into(), "J2".into()],
            programs: vec!["P".into()],
            datasets: Datasets {
                gdg: vec!["X(0)".into()],
                ..Datasets::default()
            },
            ..Extraction::default()
        };
        assert_eq!(
            to_csv(&[extraction]),
            format!("{CSV_HEADER}\n\"A,B.jcl\",J1;J2,P,0,1,0,0,0\n")
        );
    }

    #[test]
    fn test_errors_are_counted() {
        let extraction = extract("//MYJOB JOB\n//S1 EXEC\n").unwrap();
        assert!(extraction.has_error());
        assert_eq!(extraction.jobs, ["MYJOB"]);
    }
}
