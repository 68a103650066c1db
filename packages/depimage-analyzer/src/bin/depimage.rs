//! `depimage` — symbolic string analysis CLI.
//!
//! # Usage
//!
//! ```bash
//! depimage ./graphs user_input --contexts=HTML,URL --threads=4
//! ```

use clap::Parser;
use depimage_analyzer::config::AnalyzerConfig;
use depimage_analyzer::errors::EngineError;
use depimage_analyzer::features::analyzer::Analyzer;
use depimage_analyzer::features::automaton::Limits;
use depimage_analyzer::features::catalogue::Context;
use depimage_analyzer::features::driver;
use depimage_analyzer::features::ssv::SsvEngine;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

#[derive(Parser)]
#[command(name = "depimage")]
#[command(about = "Symbolic string analysis over DepGraphs for sanitizer validation", long_about = None)]
struct Cli {
    /// Root directory to recursively search for `.dot` DepGraph files.
    graph_directory: PathBuf,

    /// Name of the tainted input node to treat as the analysis entry point.
    input_field_name: String,

    /// Comma-separated subset of HTML,HTML_ATTR,JS,URL,SQL,MFE.
    #[arg(long, default_value = "HTML,HTML_ATTR,JAVASCRIPT,URL,SQL,MFE")]
    contexts: String,

    /// Worker thread count; defaults to hardware concurrency.
    #[arg(long)]
    threads: Option<usize>,

    /// Write the report to a file instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Bound on Kleene iteration per SCC before widening.
    #[arg(long, default_value_t = 64)]
    iteration_bound: usize,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let contexts: Result<Vec<Context>, String> = cli
        .contexts
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Context::from_str)
        .collect();
    let contexts = match contexts {
        Ok(c) => c,
        Err(e) => {
            eprintln!("invalid --contexts: {e}");
            return ExitCode::FAILURE;
        }
    };

    if !cli.graph_directory.is_dir() {
        eprintln!("graph directory does not exist: {}", cli.graph_directory.display());
        return ExitCode::FAILURE;
    }

    let config = AnalyzerConfig {
        graph_directory: cli.graph_directory,
        input_field_name: cli.input_field_name,
        contexts,
        threads: cli.threads.unwrap_or_else(num_cpus::get),
        output: cli.output,
        iteration_bound: cli.iteration_bound,
        limits: Limits::default(),
    };

    if let Err(e) = config.validate() {
        eprintln!("invalid configuration: {e}");
        return ExitCode::FAILURE;
    }

    let analyzer = Analyzer::new(SsvEngine::default());
    let report = match driver::run(&analyzer, &config) {
        Ok(r) => r,
        Err(EngineError::InternalInvariant(msg)) => {
            eprintln!("internal invariant violated: {msg}");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            eprintln!("analysis failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    if report.files_analyzed() == 0 && report.failed.is_empty() {
        eprintln!("no .dot files found under {}", config.graph_directory.display());
        return ExitCode::FAILURE;
    }

    let text = driver::render_report(&report);
    match &config.output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, &text) {
                eprintln!("failed to write report to {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        }
        None => print!("{text}"),
    }

    ExitCode::SUCCESS
}
