#![forbid(unsafe_code)]

mod cmd;
mod output;

use std::env;
use std::process::ExitCode;

use clap::{CommandFactory, Parser, Subcommand};
use edgeprop_core::timing::{self, StageTimer};
use output::{CliError, OutputMode, render_error};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "ep: edge-state label propagation over road networks",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit stage timing report to stderr.
    #[arg(long, global = true)]
    timing: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Derive the output mode from flags.
    const fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Instances",
        about = "Convert a text edge list into a topology file",
        long_about = "Read `u v` pairs (and optionally a node list) and write the binary .epg topology.",
        after_help = "EXAMPLES:\n    # Convert an edge list\n    ep convert --input city.edges --output data/city.epg\n\n    # Keep isolated intersections\n    ep convert --input city.edges --nodes city.nodes --output data/city.epg"
    )]
    Convert(cmd::convert::ConvertArgs),

    #[command(
        next_help_heading = "Propagation",
        about = "Propagate labels over an instance",
        long_about = "Seed, diffuse and label every edge of an instance, then write the state side file.",
        after_help = "EXAMPLES:\n    # Run with defaults\n    ep run --instance-dir data --name city\n\n    # Reproducible run with a projection for plotting\n    ep run --instance-dir data --name city --seed 7 --projection city.jsonl\n\n    # Emit machine-readable output\n    ep run --instance-dir data --name city --json"
    )]
    Run(cmd::run::RunArgs),

    #[command(
        next_help_heading = "Instances",
        about = "Summarize an instance",
        long_about = "Report node and edge counts, degree statistics, self-loops, attached side files and the topology hash.",
        after_help = "EXAMPLES:\n    # Inspect an instance\n    ep inspect --instance-dir data --name city"
    )]
    Inspect(cmd::inspect::InspectArgs),

    #[command(
        next_help_heading = "Maintenance",
        about = "Generate shell completion scripts",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    ep completions bash"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("EDGEPROP_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "edgeprop=debug,info"
        } else {
            "edgeprop=info,warn"
        })
    });

    let format = env::var("EDGEPROP_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let timing_enabled = cli.timing || timing::timing_enabled_from_env();
    let mut timer = StageTimer::new(timing_enabled);
    let output = cli.output_mode();

    let command_result = match cli.command {
        Commands::Convert(ref args) => {
            timer.time("convert", || cmd::convert::run_convert(args, output))
        }
        Commands::Run(ref args) => cmd::run::run_run(args, output, &mut timer),
        Commands::Inspect(ref args) => {
            timer.time("inspect", || cmd::inspect::run_inspect(args, output))
        }
        Commands::Completions(ref args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
    };

    if timing_enabled {
        cmd::run::report_timings(timer.stages())?;
    }

    match command_result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            render_error(output, &CliError::from_anyhow(&err))?;
            Ok(ExitCode::FAILURE)
        }
    }
}
