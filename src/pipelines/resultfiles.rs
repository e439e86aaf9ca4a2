// src/pipelines/resultfiles.rs: Expected result files per sample

use log::debug;

use crate::cli::Technology;
use crate::config::defs::{
    Stage, NCOV_QC_CSV, PANGOLIN_LINEAGES_CSV, PIPELINE_RESULTS_LOG, RESULTFILES_JSON, RESULTS_CSV,
};
use crate::pipelines::cascade::{Cascade, SampleSet};
use crate::utils::slugs::{get_file_with_type, join_path, FileType, ResultFile, ResultFiles};


/// Samples for which each stage produced artifacts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleIdResultFiles {
    /// all samples of the analysis run
    pub all_samples: Vec<String>,
    /// samples which completed contamination removal with reads left
    pub contamination_removal_completed_samples: SampleSet,
    /// samples which completed primer autodetection, whether passing or failing its QC
    pub primer_autodetection_completed_samples: SampleSet,
    /// samples which completed ncov, whether passing or failing its QC
    pub ncov_completed_samples: SampleSet,
}

impl SampleIdResultFiles {
    /// Completion sets derived from the cascade. A stage that did not execute,
    /// or a run of assembled sequences, completed no samples.
    ///
    /// # Arguments
    ///
    /// * `all_samples` - All samples of the analysis run.
    /// * `cascade` - Stage outcomes.
    /// * `technology` - Sequencing technology of the run.
    pub fn from_cascade(all_samples: &[String], cascade: &Cascade, technology: Technology) -> Self {
        let completed = |stage: Stage, include_failed_qc: bool| -> SampleSet {
            let outcome = cascade.outcome(stage);
            if technology == Technology::Unknown || !outcome.executed {
                return SampleSet::new();
            }
            let mut samples = outcome.passed.clone();
            if include_failed_qc {
                samples.extend(outcome.failed_qc.iter().cloned());
            }
            samples
        };

        SampleIdResultFiles {
            all_samples: all_samples.to_vec(),
            // no reads left means no further artifacts
            contamination_removal_completed_samples: completed(Stage::ContaminationRemoval, false),
            primer_autodetection_completed_samples: completed(Stage::PrimerAutodetection, true),
            ncov_completed_samples: completed(Stage::Ncov, true),
        }
    }
}


struct TechnologyFiles {
    clean_fastq: &'static [FileType],
    fastqc: &'static [FileType],
    ncov_bam: &'static [FileType],
    ncov_fasta: &'static [FileType],
    ncov_variants: &'static [FileType],
}

const ILLUMINA_FILES: TechnologyFiles = TechnologyFiles {
    clean_fastq: &[
        FileType::read("_1.fastq.gz", "fastq-cleaned-sequence-data", 1),
        FileType::read("_2.fastq.gz", "fastq-cleaned-sequence-data", 2),
    ],
    fastqc: &[
        FileType::read("_1_fastqc.zip", "fastqc-qc", 1),
        FileType::read("_2_fastqc.zip", "fastqc-qc", 2),
    ],
    ncov_bam: &[
        FileType::new(".sorted.bam", "bam-untrimmed"),
        FileType::new(".sorted.bam.bai", "bai-untrimmed"),
        FileType::new(".mapped.primertrimmed.sorted.bam", "bam-trimmed"),
        FileType::new(".mapped.primertrimmed.sorted.bam.bai", "bai-trimmed"),
    ],
    ncov_fasta: &[FileType::new(".primertrimmed.consensus.fa", "fasta-consensus")],
    ncov_variants: &[FileType::new(".variants.tsv", "tsv-final")],
};

const ONT_FILES: TechnologyFiles = TechnologyFiles {
    clean_fastq: &[FileType::new("_1.fastq.gz", "fastq-cleaned-sequence-data")],
    fastqc: &[FileType::new("_1_fastqc.zip", "fastqc-qc")],
    ncov_bam: &[
        FileType::new(".sorted.bam", "bam-untrimmed"),
        FileType::new(".sorted.bam.bai", "bai-untrimmed"),
        FileType::new(".primertrimmed.rg.sorted.bam", "bam-trimmed"),
        FileType::new(".primertrimmed.rg.sorted.bam.bai", "bai-trimmed"),
    ],
    ncov_fasta: &[
        FileType::new(".consensus.fa", "fasta-consensus"),
        FileType::new(".preconsensus.fa", "fasta-preconsensus"),
    ],
    ncov_variants: &[
        FileType::new(".pass.vcf.gz", "vcf-final"),
        FileType::new(".pass.vcf.gz.tbi", "tbi-final"),
    ],
};

const NCOV_TYPING: &[FileType] = &[
    FileType::new(".typing.csv", "csv-typing"),
    FileType::new(".variants.csv", "csv-typing-variants"),
    FileType::new(".csq.vcf", "vcf-typing-consequences"),
];

const PRIMER_AUTODETECTION_CSVS: &[FileType] = &[
    FileType::new("_primer_data.csv", "csv-primer-data"),
    FileType::new("_primer_detection.csv", "csv-primer-detection"),
];

const REHEADERED_FASTA: &[FileType] = &[FileType::new(".fasta", "fasta-final")];


/// Returns {sample_id: expected output files} for every sample of the run.
///
/// # Arguments
///
/// * `output_path` - Where the analysis run stores its results (path or URI).
/// * `sample_ids_result_files` - Completion sets of the run.
/// * `technology` - Sequencing technology of the run.
pub fn get_expected_output_files_per_sample(
    output_path: &str,
    sample_ids_result_files: &SampleIdResultFiles,
    technology: Technology,
) -> ResultFiles {
    let mut output_files: ResultFiles = sample_ids_result_files
        .all_samples
        .iter()
        .map(|s| (s.clone(), Vec::new()))
        .collect();

    let mut append = |sample_id: &str, inner_dirs: &[&str], filetypes: &[FileType]| {
        output_files
            .entry(sample_id.to_string())
            .or_default()
            .extend(get_file_with_type(output_path, inner_dirs, filetypes, sample_id));
    };

    let files = match technology {
        Technology::Unknown => {
            // assembled sequences only go through pangolin
            for sample_id in &sample_ids_result_files.all_samples {
                append(sample_id, &["reheadered_fasta"], REHEADERED_FASTA);
            }
            return output_files;
        }
        Technology::Illumina => &ILLUMINA_FILES,
        Technology::ONT => &ONT_FILES,
    };

    for sample_id in &sample_ids_result_files.contamination_removal_completed_samples {
        // only samples with preserved reads have a clean fastq, and fastqc ran on it
        append(sample_id, &["contamination_removal", "cleaned_fastq"], files.clean_fastq);
        append(sample_id, &["fastqc"], files.fastqc);
    }

    for sample_id in &sample_ids_result_files.all_samples {
        append(
            sample_id,
            &["contamination_removal", "counting"],
            &[FileType::new(".txt", "txt-cleaned-sequence-count")],
        );
        append(
            sample_id,
            &["contamination_removal"],
            &[FileType::new("_contamination_removal.csv", "csv-cleaned-sequence-count")],
        );
    }

    for sample_id in &sample_ids_result_files.primer_autodetection_completed_samples {
        append(sample_id, &["primer_autodetection"], PRIMER_AUTODETECTION_CSVS);
    }

    for sample_id in &sample_ids_result_files.ncov_completed_samples {
        append(sample_id, &["ncov2019-artic", "output_bam"], files.ncov_bam);
        append(sample_id, &["ncov2019-artic", "output_fasta"], files.ncov_fasta);
        append(sample_id, &["ncov2019-artic", "output_typing"], NCOV_TYPING);
        append(sample_id, &["ncov2019-artic", "output_variants"], files.ncov_variants);
        append(sample_id, &["ncov2019-artic", "output_plots"], &[FileType::new(".depth.png", "png-qc")]);
        append(sample_id, &["reheadered_fasta"], REHEADERED_FASTA);
    }

    debug!(
        "Expected {} result files for {} samples",
        output_files.values().map(|f| f.len()).sum::<usize>(),
        output_files.len()
    );
    output_files
}


/// Every file a successful run is expected to write when all samples complete
/// every stage, run level files included.
pub fn expected_run_files(output_path: &str, sample_ids: &[String], technology: Technology) -> Vec<String> {
    let completed: SampleSet = if technology == Technology::Unknown {
        SampleSet::new()
    } else {
        sample_ids.iter().cloned().collect()
    };
    let sample_ids_result_files = SampleIdResultFiles {
        all_samples: sample_ids.to_vec(),
        contamination_removal_completed_samples: completed.clone(),
        primer_autodetection_completed_samples: completed.clone(),
        ncov_completed_samples: completed,
    };
    let per_sample = get_expected_output_files_per_sample(output_path, &sample_ids_result_files, technology);
    collect_run_files(output_path, &per_sample, technology)
}

/// Flattens per sample files and appends the run level files.
pub fn collect_run_files(output_path: &str, per_sample: &ResultFiles, technology: Technology) -> Vec<String> {
    let mut output_files: Vec<String> = per_sample
        .values()
        .flat_map(|files| files.iter().map(|f: &ResultFile| f.file.clone()))
        .collect();

    output_files.push(join_path(output_path, &["logs", PIPELINE_RESULTS_LOG]));
    if technology != Technology::Unknown {
        output_files.push(join_path(output_path, &["ncov2019-artic", NCOV_QC_CSV]));
    }
    output_files.push(join_path(output_path, &["pangolin", PANGOLIN_LINEAGES_CSV]));
    output_files.push(join_path(output_path, &[RESULTS_CSV]));
    output_files.push(join_path(output_path, &[RESULTFILES_JSON]));
    output_files
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipelines::cascade::StageTables;
    use crate::utils::table::StageTable;

    fn samples(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn set(ids: &[&str]) -> SampleSet {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn read_stage_tables() -> StageTables {
        let contamination = "sample_name,input_reads,preserved_reads,removed_reads\nA,10,5,5\nB,10,5,5\nC,10,0,10\n";
        let primer = "sample_id,primer_input,primer_identifier,primer_ambiguity\nA,a.fq,ARTIC_v4,False\nB,b.fq,ARTIC_v4,False\n";
        let ncov = "sample_name,pct_N_bases,pct_covered_bases,longest_no_N_run,num_aligned_reads,qc_pass,fasta,bam\n\
                    A,1,99,29000,500,True,a.fa,a.bam\nB,60,40,100,20,False,b.fa,b.bam\n";
        StageTables {
            contamination_removal: StageTable::from_reader(contamination.as_bytes(), &Stage::ContaminationRemoval.schema()).unwrap(),
            primer_autodetection: StageTable::from_reader(primer.as_bytes(), &Stage::PrimerAutodetection.schema()).unwrap(),
            ncov: StageTable::from_reader(ncov.as_bytes(), &Stage::Ncov.schema()).unwrap(),
            pangolin: StageTable::empty(&Stage::Pangolin.schema()),
        }
    }

    #[test]
    fn test_completion_sets() {
        let all = samples(&["A", "B", "C"]);
        let cascade = Cascade::run(&all, &read_stage_tables()).unwrap();
        let completed = SampleIdResultFiles::from_cascade(&all, &cascade, Technology::Illumina);

        assert_eq!(completed.contamination_removal_completed_samples, set(&["A", "B"]));
        assert_eq!(completed.primer_autodetection_completed_samples, set(&["A", "B"]));
        // B fails ncov QC but still produced ncov artifacts
        assert_eq!(completed.ncov_completed_samples, set(&["A", "B"]));
    }

    #[test]
    fn test_completion_sets_empty_for_assembled_input() {
        let all = samples(&["A", "B", "C"]);
        let cascade = Cascade::run(&all, &read_stage_tables()).unwrap();
        let completed = SampleIdResultFiles::from_cascade(&all, &cascade, Technology::Unknown);
        assert!(completed.contamination_removal_completed_samples.is_empty());
        assert!(completed.primer_autodetection_completed_samples.is_empty());
        assert!(completed.ncov_completed_samples.is_empty());
    }

    #[test]
    fn test_completion_sets_empty_when_no_stage_executed() {
        let all = samples(&["X", "Y"]);
        let cascade = Cascade::run(&all, &StageTables::empty()).unwrap();
        let completed = SampleIdResultFiles::from_cascade(&all, &cascade, Technology::ONT);
        assert!(completed.contamination_removal_completed_samples.is_empty());
        assert!(completed.primer_autodetection_completed_samples.is_empty());
        assert!(completed.ncov_completed_samples.is_empty());
    }

    #[test]
    fn test_unknown_technology_only_expects_fasta() {
        let sample_ids_result_files = SampleIdResultFiles {
            all_samples: samples(&["X"]),
            ..Default::default()
        };
        let files = get_expected_output_files_per_sample("s3://b/run", &sample_ids_result_files, Technology::Unknown);
        assert_eq!(files["X"].len(), 1);
        assert_eq!(files["X"][0].file, "s3://b/run/reheadered_fasta/X.fasta");
        assert_eq!(files["X"][0].file_type, "fasta-final");
    }

    #[test]
    fn test_illumina_files_follow_completion() {
        let sample_ids_result_files = SampleIdResultFiles {
            all_samples: samples(&["A", "C"]),
            contamination_removal_completed_samples: set(&["A"]),
            primer_autodetection_completed_samples: set(&["A"]),
            ncov_completed_samples: set(&["A"]),
        };
        let files = get_expected_output_files_per_sample("/out", &sample_ids_result_files, Technology::Illumina);

        // C only has the contamination removal counts
        let c_files: Vec<&str> = files["C"].iter().map(|f| f.file.as_str()).collect();
        assert_eq!(
            c_files,
            vec!["/out/contamination_removal/counting/C.txt", "/out/contamination_removal/C_contamination_removal.csv"]
        );

        let a_files: Vec<&str> = files["A"].iter().map(|f| f.file.as_str()).collect();
        assert!(a_files.contains(&"/out/contamination_removal/cleaned_fastq/A_2.fastq.gz"));
        assert!(a_files.contains(&"/out/primer_autodetection/A_primer_detection.csv"));
        assert!(a_files.contains(&"/out/ncov2019-artic/output_bam/A.mapped.primertrimmed.sorted.bam"));
        assert!(a_files.contains(&"/out/ncov2019-artic/output_plots/A.depth.png"));
        assert!(a_files.contains(&"/out/reheadered_fasta/A.fasta"));
        // 2 fastq + 2 fastqc + 2 counts + 2 primer + 4 bam + 1 fasta + 3 typing + 1 variants + 1 plot + 1 reheadered
        assert_eq!(a_files.len(), 19);
    }

    #[test]
    fn test_ont_files() {
        let sample_ids_result_files = SampleIdResultFiles {
            all_samples: samples(&["A"]),
            contamination_removal_completed_samples: set(&["A"]),
            primer_autodetection_completed_samples: set(&["A"]),
            ncov_completed_samples: set(&["A"]),
        };
        let files = get_expected_output_files_per_sample("/out", &sample_ids_result_files, Technology::ONT);
        let a_files: Vec<&str> = files["A"].iter().map(|f| f.file.as_str()).collect();
        assert!(a_files.contains(&"/out/ncov2019-artic/output_variants/A.pass.vcf.gz.tbi"));
        assert!(a_files.contains(&"/out/ncov2019-artic/output_fasta/A.preconsensus.fa"));
        assert!(!a_files.contains(&"/out/contamination_removal/cleaned_fastq/A_2.fastq.gz"));
    }

    #[test]
    fn test_expected_run_files() {
        let files = expected_run_files("/out", &samples(&["X"]), Technology::Unknown);
        assert_eq!(
            files,
            vec![
                "/out/reheadered_fasta/X.fasta",
                "/out/logs/generate_pipeline_results_files.log",
                "/out/pangolin/all_lineages_report.csv",
                "/out/results.csv",
                "/out/resultfiles.json",
            ]
        );
        let files = expected_run_files("/out", &samples(&["X"]), Technology::Illumina);
        assert!(files.contains(&"/out/ncov2019-artic/ncov_qc.csv".to_string()));
    }
}
