use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq)]
pub enum Technology {
    #[default]
    Illumina,
    #[value(name = "ont")]
    ONT,
    /// Already assembled consensus sequences (FASTA input)
    Unknown,
}

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "seqtoid-results", version, about = "Generate pipeline results files")]
pub struct Arguments {

    #[arg(long, help = "The name of the analysis run")]
    pub analysis_run_name: String,

    #[arg(long, help = "The sample metadata file")]
    pub metadata_file: String,

    #[arg(long, help = "Contamination removal pipeline resulting csv file")]
    pub contamination_removal_csv_file: Option<String>,

    #[arg(long, help = "Primer autodetection pipeline resulting csv file")]
    pub primer_autodetection_csv_file: Option<String>,

    #[arg(long, help = "ncov pipeline qc csv file")]
    pub ncov_qc_csv_file: Option<String>,

    #[arg(long, help = "pangolin pipeline resulting csv file")]
    pub pangolin_csv_file: Option<String>,

    #[arg(long, default_value = "results.csv", help = "CSV file containing the summary of results")]
    pub output_results_csv_file: String,

    #[arg(long, default_value = "results.json", help = "JSON file containing the summary of results")]
    pub output_results_json_file: String,

    #[arg(long, default_value = "resultfiles.json", help = "JSON file containing all the expected files per sample")]
    pub output_resultfiles_json_file: String,

    #[arg(long, help = "Output path where sample result files are stored (e.g. s3://bucket/path/analysis_run)")]
    pub output_path: String,

    #[arg(long = "sequencing-technology", value_enum)]
    pub technology: Technology,

    #[arg(short = 'v', long = "verbose", action)]
    pub verbose: bool,

    #[arg(long, help = "Optional file to write the log to instead of stderr")]
    pub log_file: Option<String>,
}

impl Arguments {
    /// Stage CSV inputs in pipeline order, paired with the option name for error messages.
    pub fn stage_inputs(&self) -> [(&'static str, Option<&String>); 4] {
        [
            ("--contamination-removal-csv-file", self.contamination_removal_csv_file.as_ref()),
            ("--primer-autodetection-csv-file", self.primer_autodetection_csv_file.as_ref()),
            ("--ncov-qc-csv-file", self.ncov_qc_csv_file.as_ref()),
            ("--pangolin-csv-file", self.pangolin_csv_file.as_ref()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_args() {
        let args = Arguments::try_parse_from([
            "seqtoid-results",
            "--analysis-run-name", "run1",
            "--metadata-file", "metadata.csv",
            "--output-path", "s3://bucket/run1",
            "--sequencing-technology", "ont",
        ])
        .unwrap();
        assert_eq!(args.technology, Technology::ONT);
        assert_eq!(args.output_results_csv_file, "results.csv");
        assert!(args.pangolin_csv_file.is_none());
    }

    #[test]
    fn test_technology_is_required() {
        let result = Arguments::try_parse_from([
            "seqtoid-results",
            "--analysis-run-name", "run1",
            "--metadata-file", "metadata.csv",
            "--output-path", "out",
        ]);
        assert!(result.is_err(), "Missing --sequencing-technology should be rejected");
    }
}
