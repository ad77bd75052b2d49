use std::process::ExitCode;

use clap::{Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crossword_etl::config::ConfigLoader;
use crossword_etl::domain::AnswerPolicy;
use crossword_etl::error::EtlError;
use crossword_etl::fetch::HttpSourceClient;
use crossword_etl::output::{JsonOutput, LogSink, OutputMode};
use crossword_etl::pipeline::{CleanResult, LoadResult, Pipeline, ProgressSink, RunSummary};

#[derive(Parser)]
#[command(name = "crossword-etl")]
#[command(about = "Download, clean and load cryptic crossword clues")]
#[command(version, author)]
struct Cli {
    /// Path to a JSON config file (defaults to ./crossword-etl.json when present)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Print stage results as JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    /// Override the configured answer policy
    #[arg(long, global = true, value_enum)]
    answer_policy: Option<AnswerPolicy>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Fetch, clean and load (default)")]
    Run,
    #[command(about = "Download the raw dataset")]
    Fetch,
    #[command(about = "Clean the downloaded dataset")]
    Clean,
    #[command(about = "Load the cleaned dataset into the database")]
    Load,
    #[command(about = "Create the database and table")]
    InitDb,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<EtlError>() {
            eprintln!("stage `{}` failed", err.stage());
            if err.is_transient() {
                eprintln!("the source may be temporarily unavailable; re-run to retry");
            }
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &EtlError) -> u8 {
    match error {
        EtlError::MissingInput(_) | EtlError::ConfigRead(_) => 2,
        EtlError::Network(_) | EtlError::HttpStatus { .. } => 3,
        EtlError::RawDecode(_)
        | EtlError::RawNotArray
        | EtlError::Schema { .. }
        | EtlError::RecordShape { .. } => 4,
        EtlError::EmptyDataset => 5,
        EtlError::Storage(_) => 6,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();
    let mut config = match ConfigLoader::resolve(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            init_logging(None);
            error!(stage = "config", kind = err.stage(), error = %err, "stage failed");
            return Err(err.into());
        }
    };
    if let Some(policy) = cli.answer_policy {
        config.answer_policy = policy;
    }

    init_logging(Some(&config.log_level));

    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };
    let sink: &dyn ProgressSink = match output_mode {
        OutputMode::Json => &JsonOutput,
        OutputMode::Human => &LogSink,
    };

    let client = HttpSourceClient::new(config.request_timeout)?;
    let pipeline = Pipeline::new(config, client);

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let summary = pipeline.run(sink)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_run(&summary).into_diagnostic()?,
                OutputMode::Human => print_run_summary(&summary),
            }
        }
        Commands::Fetch => {
            let result = pipeline.fetch(sink)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_fetch(&result).into_diagnostic()?,
                OutputMode::Human => {
                    println!("fetched {} bytes into {}", result.bytes, result.raw_path)
                }
            }
        }
        Commands::Clean => {
            let result = pipeline.clean(sink)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_clean(&result).into_diagnostic()?,
                OutputMode::Human => print_clean(&result),
            }
        }
        Commands::Load => {
            let result = pipeline.load(sink)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_load(&result).into_diagnostic()?,
                OutputMode::Human => print_load(&result),
            }
        }
        Commands::InitDb => {
            let result = pipeline.init_db(sink)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_init(&result).into_diagnostic()?,
                OutputMode::Human => {
                    println!("table {} ready in {}", result.table, result.database)
                }
            }
        }
    }
    Ok(())
}

/// `RUST_LOG` wins over the configured level; `info` when neither parses.
fn init_logging(level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_clean(result: &CleanResult) {
    println!(
        "cleaned {} raw records: kept {}, dropped {}, duplicates {} (policy {})",
        result.raw_records,
        result.clean_records,
        result.dropped,
        result.duplicates,
        result.answer_policy
    );
    println!("clean dataset: {}", result.clean_path);
}

fn print_load(result: &LoadResult) {
    println!(
        "inserted {} of {} rows into {} ({} already present)",
        result.report.inserted, result.report.submitted, result.table, result.report.skipped
    );
    println!("database: {} ({} rows total)", result.database, result.total_rows);
}

fn print_run_summary(summary: &RunSummary) {
    println!("crossword-etl run ({}) started {}", summary.environment, summary.started_at);
    println!(
        "fetched {} bytes from {}",
        summary.fetch.bytes, summary.fetch.url
    );
    print_clean(&summary.clean);
    print_load(&summary.load);
}
