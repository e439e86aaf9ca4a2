use std::path::PathBuf;
use crate::cli::Arguments;
use lazy_static::lazy_static;
use thiserror::Error;

// Generic report columns
pub const SAMPLE_ID: &str = "SAMPLE_ID";
pub const STATUS: &str = "STATUS";
pub const STATUS_FAILED: &str = "Failed";
pub const STATUS_COMPLETED: &str = "Completed";

// Contamination removal summary CSV
pub const CONTAMINATION_REMOVAL_SAMPLE_ID_COL: &str = "sample_name";
pub const CONTAMINATION_REMOVAL_PRESERVED_READS_COL: &str = "preserved_reads";
pub const EXPECTED_CONTAMINATION_REMOVAL_HEADERS: &[&str] = &[
    CONTAMINATION_REMOVAL_SAMPLE_ID_COL,
    "input_reads",
    CONTAMINATION_REMOVAL_PRESERVED_READS_COL,
    "removed_reads",
];

// Primer autodetection summary CSV
pub const PRIMER_AUTODETECTION_SAMPLE_ID_COL: &str = "sample_id";
pub const EXPECTED_PRIMER_AUTODETECTION_HEADERS: &[&str] = &[
    PRIMER_AUTODETECTION_SAMPLE_ID_COL,
    "primer_input",
    "primer_identifier",
    "primer_ambiguity",
];

// ncov QC summary CSV
pub const NCOV_SAMPLE_ID_COL: &str = "sample_name";
pub const NCOV_QC_PASS_COL: &str = "qc_pass";
pub const EXPECTED_NCOV_HEADERS: &[&str] = &[
    NCOV_SAMPLE_ID_COL,
    "pct_N_bases",
    "pct_covered_bases",
    "longest_no_N_run",
    "num_aligned_reads",
    NCOV_QC_PASS_COL,
    "fasta",
    "bam",
];

// pangolin lineage report CSV
pub const PANGOLIN_SAMPLE_ID_COL: &str = "taxon";
pub const PANGOLIN_QC_STATUS_COL: &str = "qc_status";
pub const PANGOLIN_PANGO_DESIGNATION_VERSION_COL: &str = "version";
pub const EXPECTED_PANGOLIN_HEADERS: &[&str] = &[
    PANGOLIN_SAMPLE_ID_COL,
    "lineage",
    "conflict",
    "ambiguity_score",
    "scorpio_call",
    "scorpio_support",
    "scorpio_conflict",
    "scorpio_notes",
    PANGOLIN_PANGO_DESIGNATION_VERSION_COL,
    "pangolin_version",
    "scorpio_version",
    "constellation_version",
    "is_designated",
    PANGOLIN_QC_STATUS_COL,
    "qc_notes",
    "note",
    "pangolin_data_version",
];

// Column prefixes applied in the results file
pub const CONTAMINATION_REMOVAL_COL_PREFIX: &str = "contamination_removal";
pub const PRIMER_AUTODETECTION_COL_PREFIX: &str = "primer";
pub const NCOV_COL_PREFIX: &str = "ncov";
pub const PANGOLIN_COL_PREFIX: &str = "pangolin";

// These columns point to specific files and are not needed in the results file
pub const COLUMNS_TO_REMOVE_FROM_RESULTS_FILE: &[&str] = &["ncov_fasta", "ncov_bam"];

// Static filenames
pub const PIPELINE_RESULTS_LOG: &str = "generate_pipeline_results_files.log";
pub const NCOV_QC_CSV: &str = "ncov_qc.csv";
pub const PANGOLIN_LINEAGES_CSV: &str = "all_lineages_report.csv";
pub const RESULTS_CSV: &str = "results.csv";
pub const RESULTFILES_JSON: &str = "resultfiles.json";


/// Shape of a CSV file produced by one pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableSchema {
    pub name: &'static str,
    pub sample_id_col: &'static str,
    pub columns: &'static [&'static str],
}

/// How a stage decides that a sample recorded in its table passed QC.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QcRule {
    /// Numeric column must be strictly positive; zero fails.
    PositiveCount(&'static str),
    /// No QC gate is defined, every recorded sample passes.
    AlwaysPass,
    /// Boolean column, `true` passes and `false` fails.
    Flag(&'static str),
    /// Text column with one passing and one failing value.
    Status { column: &'static str, pass: &'static str, fail: &'static str },
}

/// Which samples a stage is expected to see.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputRule {
    FullPopulation,
    PreviousPassed,
    /// Previous stage's passed samples, unless `Stage` did not execute in which
    /// case the full population is used (consensus input).
    PreviousPassedUnlessSkipped(Stage),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    ContaminationRemoval,
    PrimerAutodetection,
    Ncov,
    Pangolin,
}

impl Stage {
    /// Pipeline order.
    pub const ALL: [Stage; 4] = [
        Stage::ContaminationRemoval,
        Stage::PrimerAutodetection,
        Stage::Ncov,
        Stage::Pangolin,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::ContaminationRemoval => "contamination_removal",
            Stage::PrimerAutodetection => "primer_autodetection",
            Stage::Ncov => "ncov",
            Stage::Pangolin => "pangolin",
        }
    }

    /// Human readable name used in notification messages.
    pub fn label(&self) -> &'static str {
        match self {
            Stage::ContaminationRemoval => "contamination removal",
            Stage::PrimerAutodetection => "primer autodetection",
            Stage::Ncov => "ncov",
            Stage::Pangolin => "pangolin",
        }
    }

    pub fn col_prefix(&self) -> &'static str {
        match self {
            Stage::ContaminationRemoval => CONTAMINATION_REMOVAL_COL_PREFIX,
            Stage::PrimerAutodetection => PRIMER_AUTODETECTION_COL_PREFIX,
            Stage::Ncov => NCOV_COL_PREFIX,
            Stage::Pangolin => PANGOLIN_COL_PREFIX,
        }
    }

    pub fn schema(&self) -> TableSchema {
        match self {
            Stage::ContaminationRemoval => TableSchema {
                name: "contamination removal",
                sample_id_col: CONTAMINATION_REMOVAL_SAMPLE_ID_COL,
                columns: EXPECTED_CONTAMINATION_REMOVAL_HEADERS,
            },
            Stage::PrimerAutodetection => TableSchema {
                name: "primer autodetection",
                sample_id_col: PRIMER_AUTODETECTION_SAMPLE_ID_COL,
                columns: EXPECTED_PRIMER_AUTODETECTION_HEADERS,
            },
            Stage::Ncov => TableSchema {
                name: "ncov qc",
                sample_id_col: NCOV_SAMPLE_ID_COL,
                columns: EXPECTED_NCOV_HEADERS,
            },
            Stage::Pangolin => TableSchema {
                name: "pangolin",
                sample_id_col: PANGOLIN_SAMPLE_ID_COL,
                columns: EXPECTED_PANGOLIN_HEADERS,
            },
        }
    }

    pub fn qc_rule(&self) -> QcRule {
        match self {
            Stage::ContaminationRemoval => QcRule::PositiveCount(CONTAMINATION_REMOVAL_PRESERVED_READS_COL),
            // no QC currently defined for primer autodetection
            Stage::PrimerAutodetection => QcRule::AlwaysPass,
            Stage::Ncov => QcRule::Flag(NCOV_QC_PASS_COL),
            Stage::Pangolin => QcRule::Status { column: PANGOLIN_QC_STATUS_COL, pass: "pass", fail: "fail" },
        }
    }

    pub fn input_rule(&self) -> InputRule {
        match self {
            Stage::ContaminationRemoval => InputRule::FullPopulation,
            Stage::PrimerAutodetection | Stage::Ncov => InputRule::PreviousPassed,
            Stage::Pangolin => InputRule::PreviousPassedUnlessSkipped(Stage::ContaminationRemoval),
        }
    }

    /// Whether a QC failure at this stage fails the sample overall. Only zero
    /// preserved reads after contamination removal does.
    pub fn qc_failure_is_fatal(&self) -> bool {
        matches!(self, Stage::ContaminationRemoval)
    }

    pub fn unknown_event(&self) -> String {
        format!("unknown_{}", self.name())
    }

    pub fn failed_event(&self) -> String {
        format!("failed_{}", self.name())
    }

    pub fn passed_event(&self) -> String {
        format!("passed_{}", self.name())
    }
}


lazy_static! {
    /// (source, target) renames applied to the merged results table, in stage order.
    pub static ref COLUMNS_TO_RENAME_IN_RESULTS_FILE: Vec<(String, String)> = {
        let mut renames = Vec::new();
        for stage in Stage::ALL {
            let schema = stage.schema();
            let prefix = stage.col_prefix();
            for col in schema.columns.iter().filter(|c| **c != schema.sample_id_col) {
                let target = if stage == Stage::Pangolin && *col == PANGOLIN_PANGO_DESIGNATION_VERSION_COL {
                    // renamed completely
                    format!("{}_pango_designation_version", PANGOLIN_COL_PREFIX)
                } else if col.starts_with(prefix) {
                    col.to_string()
                } else {
                    format!("{}_{}", prefix, col)
                };
                if target != *col {
                    renames.push((col.to_string(), target));
                }
            }
        }
        renames
    };
}


#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Unexpected columns in {table} table: missing {missing:?}, unexpected {unexpected:?}")]
    SchemaMismatch {
        table: String,
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("Unknown value '{value}' in column '{column}' of {stage} table for sample '{sample}'")]
    UnknownQcValue {
        stage: String,
        sample: String,
        column: String,
        value: String,
    },

    #[error("Cannot {operation} column '{column}': not present in results table")]
    ColumnOperation {
        operation: String,
        column: String,
    },

    #[error("Sample '{sample}' appears more than once in {table} table")]
    DuplicateSample {
        table: String,
        sample: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}


pub struct RunConfig {
    pub cwd: PathBuf,
    pub args: Arguments,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renames_prefix_every_stage_column() {
        let renames: Vec<&str> = COLUMNS_TO_RENAME_IN_RESULTS_FILE.iter().map(|(_, t)| t.as_str()).collect();
        assert!(renames.contains(&"contamination_removal_preserved_reads"));
        assert!(renames.contains(&"ncov_qc_pass"));
        assert!(renames.contains(&"pangolin_lineage"));
        assert!(renames.contains(&"pangolin_pango_designation_version"));
        assert!(!renames.contains(&"pangolin_pangolin_version"));
        assert!(!renames.contains(&"primer_primer_identifier"));
    }

    #[test]
    fn test_dropped_columns_are_rename_targets() {
        for col in COLUMNS_TO_REMOVE_FROM_RESULTS_FILE {
            assert!(
                COLUMNS_TO_RENAME_IN_RESULTS_FILE.iter().any(|(_, t)| t == col),
                "{} should be produced by a rename",
                col
            );
        }
    }

    #[test]
    fn test_event_names() {
        assert_eq!(Stage::ContaminationRemoval.unknown_event(), "unknown_contamination_removal");
        assert_eq!(Stage::Ncov.failed_event(), "failed_ncov");
        assert_eq!(Stage::Pangolin.passed_event(), "passed_pangolin");
    }

    #[test]
    fn test_error_messages_name_the_offender() {
        let err = PipelineError::UnknownQcValue {
            stage: "pangolin".to_string(),
            sample: "S1".to_string(),
            column: "qc_status".to_string(),
            value: "maybe".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("maybe"));
        assert!(msg.contains("qc_status"));
        assert!(msg.contains("S1"));
    }
}
