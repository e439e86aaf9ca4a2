use std::env;
use std::fs::File;
use std::io::Write;
use std::time::Instant;

use anyhow::{Context, Result};
use env_logger::{Builder, Target};
use log::{self, LevelFilter, debug, error, info};

use seqtoid_results::cli::parse;
use seqtoid_results::config::defs::RunConfig;
use seqtoid_results::utils::notifications::LogSink;
use seqtoid_results::pipelines::pipeline_results;


#[tokio::main]
async fn main() -> Result<()> {
    let run_start = Instant::now();

    let args = parse();

    let log_level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut builder = Builder::new();
    builder
        .filter_level(log_level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        });
    if let Some(log_file) = &args.log_file {
        let file = File::create(log_file).with_context(|| format!("Cannot create log file {}", log_file))?;
        builder.target(Target::Pipe(Box::new(file)));
    }
    builder.init();

    let cwd = env::current_dir()?;
    debug!("The current directory is {:?}", cwd);

    let run_config = RunConfig { cwd, args };

    if let Err(e) = pipeline_results::run(&run_config, &LogSink).await {
        error!("Pipeline failed: {} at {} milliseconds.", e, run_start.elapsed().as_millis());
        std::process::exit(1);
    }

    info!("Run complete: {} milliseconds.", run_start.elapsed().as_millis());
    Ok(())
}
