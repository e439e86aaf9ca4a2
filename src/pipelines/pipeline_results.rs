use std::path::{Path, PathBuf};

use log::info;

use crate::config::defs::{PipelineError, RunConfig, Stage, SAMPLE_ID};
use crate::pipelines::cascade::{Cascade, StageTables};
use crate::pipelines::results::{generate_results_table, write_results_csv, ReportSchema};
use crate::pipelines::resultfiles::{get_expected_output_files_per_sample, SampleIdResultFiles};
use crate::utils::convert::{csv_to_json, write_json};
use crate::utils::notifications::NotificationSink;
use crate::utils::table::{load_sample_ids, load_stage_table};


/// Resolves a user supplied path against the working directory.
fn resolve(cwd: &Path, file: &str) -> PathBuf {
    let path = PathBuf::from(file);
    if path.is_absolute() { path } else { cwd.join(path) }
}

/// Fails fast on input files that do not exist, before anything is loaded.
fn validate_file_inputs(config: &RunConfig) -> Result<(), PipelineError> {
    let args = &config.args;
    let mut inputs = vec![("--metadata-file", Some(&args.metadata_file))];
    inputs.extend(args.stage_inputs());
    for (option, file) in inputs {
        if let Some(file) = file {
            let path = resolve(&config.cwd, file);
            if !path.is_file() {
                return Err(PipelineError::InvalidConfig(format!("{} {} does not exist", option, path.display())));
            }
        }
    }
    Ok(())
}

/// Loads the four stage tables; a stage without a CSV gets an empty table.
pub async fn load_stage_tables(config: &RunConfig) -> Result<StageTables, PipelineError> {
    let [contamination_removal, primer_autodetection, ncov, pangolin] = config.args.stage_inputs().map(|(_, f)| f);
    let load = |stage: Stage, file: Option<&String>| {
        let path = file.map(|f| resolve(&config.cwd, f));
        async move { load_stage_table(path.as_deref(), &stage.schema()).await }
    };
    Ok(StageTables {
        contamination_removal: load(Stage::ContaminationRemoval, contamination_removal).await?,
        primer_autodetection: load(Stage::PrimerAutodetection, primer_autodetection).await?,
        ncov: load(Stage::Ncov, ncov).await?,
        pangolin: load(Stage::Pangolin, pangolin).await?,
    })
}


/// Generates the pipeline results files of an analysis run: the results CSV,
/// its JSON form and the expected result files JSON. Stage notifications are
/// published to `sink`.
///
/// # Arguments
///
/// * `config` - RunConfig struct from main.
/// * `sink` - Where stage notifications are published.
///
/// # Returns
/// The stage cascade of the run.
pub async fn run(config: &RunConfig, sink: &dyn NotificationSink) -> Result<Cascade, PipelineError> {
    let args = &config.args;
    info!("Generating pipeline results files for analysis run {}", args.analysis_run_name);

    validate_file_inputs(config)?;
    let schema = ReportSchema::new()?;

    // data loading
    let all_samples = load_sample_ids(&resolve(&config.cwd, &args.metadata_file)).await?;
    info!("{} samples in analysis run", all_samples.len());
    let tables = load_stage_tables(config).await?;

    let cascade = Cascade::run(&all_samples, &tables)?;
    cascade.publish(&args.analysis_run_name, sink);

    let failed_samples = cascade.global_failed_samples();
    info!("{} of {} samples failed", failed_samples.len(), all_samples.len());

    let results_csv = resolve(&config.cwd, &args.output_results_csv_file);
    let results_table = generate_results_table(&all_samples, &tables, &failed_samples, &schema)?;
    write_results_csv(&results_table, &results_csv).await?;
    info!("Results written to {}", results_csv.display());

    let results_json = resolve(&config.cwd, &args.output_results_json_file);
    csv_to_json(&results_csv, &results_json, SAMPLE_ID).await?;

    let sample_ids_result_files = SampleIdResultFiles::from_cascade(&all_samples, &cascade, args.technology);
    let output_files = get_expected_output_files_per_sample(&args.output_path, &sample_ids_result_files, args.technology);
    let resultfiles_json = resolve(&config.cwd, &args.output_resultfiles_json_file);
    write_json(&output_files, &resultfiles_json).await?;
    info!("Expected result files written to {}", resultfiles_json.display());

    Ok(cascade)
}
