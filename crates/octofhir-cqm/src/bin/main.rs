//! Clinical quality measure command-line interface

use clap::{Args, Parser, Subcommand};
use octofhir_cqm::cli::output::{self, OutputFormat};
use octofhir_cqm::cli::resolver::{MeasureSelection, PeriodArgs};
use octofhir_cqm::cli::{evaluate, event, measures};
use std::path::PathBuf;

/// Clinical quality measure tool
#[derive(Parser)]
#[command(name = "cqm")]
#[command(author, version, about = "Clinical quality measure evaluation", long_about = None)]
struct Cli {
    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (json, table, pretty)
    #[arg(short = 'f', long, global = true)]
    format: Option<String>,

    /// Output file (default: stdout)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    color: String,

    #[command(subcommand)]
    command: Commands,
}

/// Measure selection and evaluation period
#[derive(Args)]
struct EvalArgs {
    /// Bundled measure key (repeatable; default: all bundled measures)
    #[arg(short, long = "measure")]
    measures: Vec<String>,

    /// Measure definition JSON file (repeatable)
    #[arg(short, long = "definition")]
    definitions: Vec<PathBuf>,

    /// Value set JSON file merged over the bundled library
    #[arg(long)]
    value_sets: Option<PathBuf>,

    /// Evaluation date, YYYY-MM-DD (default: today)
    #[arg(long)]
    now: Option<String>,

    /// Measurement period start, YYYY-MM-DD (default: one year before now)
    #[arg(long)]
    period_start: Option<String>,

    /// Measurement period end, YYYY-MM-DD (default: now)
    #[arg(long)]
    period_end: Option<String>,
}

impl EvalArgs {
    fn split(self) -> (MeasureSelection, PeriodArgs) {
        (
            MeasureSelection {
                keys: self.measures,
                definitions: self.definitions,
                value_sets: self.value_sets,
            },
            PeriodArgs {
                now: self.now,
                period_start: self.period_start,
                period_end: self.period_end,
            },
        )
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a patient snapshot
    Evaluate {
        /// Patient record JSON file
        record: PathBuf,

        #[command(flatten)]
        args: EvalArgs,
    },

    /// Handle a clinical event against a directory of patient snapshots
    Event {
        /// Event kind, e.g. LAB_REPORT_CREATED
        #[arg(short, long)]
        kind: String,

        /// Patient the event belongs to
        #[arg(short, long)]
        patient: Option<String>,

        /// Directory of <patient-id>.json snapshots
        #[arg(short, long, default_value = ".")]
        records: PathBuf,

        #[command(flatten)]
        args: EvalArgs,
    },

    /// List bundled measures
    Measures,
}

#[tokio::main]
async fn main() {
    human_panic::setup_panic!();

    let cli = Cli::parse();

    output::setup_colors(&cli.color);

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new().filter_level(level).parse_default_env().init();

    let output_format = OutputFormat::parse(cli.format.as_deref().unwrap_or("pretty"));

    let result = match cli.command {
        Commands::Evaluate { record, args } => {
            let (selection, period) = args.split();
            evaluate::evaluate(evaluate::EvaluateConfig {
                record,
                selection,
                period,
                verbose: cli.verbose,
                output_format,
                output_file: cli.output.clone(),
            })
        }

        Commands::Event {
            kind,
            patient,
            records,
            args,
        } => {
            let (selection, period) = args.split();
            event::handle_event(event::EventConfig {
                kind,
                patient,
                records,
                selection,
                period,
                verbose: cli.verbose,
                output_format,
                output_file: cli.output.clone(),
            })
            .await
        }

        Commands::Measures => measures::list(measures::MeasuresConfig {
            output_format,
            output_file: cli.output.clone(),
        }),
    };

    if let Err(e) = result {
        eprintln!("{}", output::format_error(&e));
        std::process::exit(1);
    }
}
