//! The cbsgen command-line interface.
//!
//! Resolves configuration, installs logging and dispatches to the parse,
//! lower and check handlers. Handlers return the number of errors they
//! reported; any error makes the process exit with status 1.

use crate::cli::args::{CbsArgs, Command, Format};
use crate::config::Config;
use crate::discovery::SourceDiscoverer;
use crate::driver::{dump_json, parse_batch, BatchReport};
use crate::errors::{io_error, print_error, CbsError};
use crate::lower::{lower_document, render_all, to_json};
use clap::Parser;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

pub mod args;
pub mod output;

/// The main entry point for the CLI.
pub fn run() {
    let args = CbsArgs::parse();
    init_tracing(args.verbose);

    let config = match &args.config {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{:?}", miette::Report::new(e));
                process::exit(2);
            }
        },
        None => Config::default(),
    };

    let result = match args.command {
        Command::Parse {
            paths,
            json,
            out_dir,
        } => handle_parse(&config, paths, json, out_dir),
        Command::Lower { paths, format } => handle_lower(&config, paths, format),
        Command::Check { paths } => handle_check(&config, paths),
    };

    match result {
        Ok(0) => {}
        Ok(_) => process::exit(1),
        Err(e) => {
            print_error(e);
            process::exit(1);
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "cbsgen=debug" } else { "cbsgen=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_paths(config: &Config, paths: Vec<PathBuf>) -> Result<BatchReport, CbsError> {
    let roots = if paths.is_empty() {
        vec![config.funcon_dir.clone()]
    } else {
        paths
    };
    let files = SourceDiscoverer::discover(&roots)?;
    Ok(parse_batch(&files, &config.parse_options()))
}

// ============================================================================
// HANDLERS
// ============================================================================

fn handle_parse(
    config: &Config,
    paths: Vec<PathBuf>,
    json: bool,
    out_dir: Option<PathBuf>,
) -> Result<usize, CbsError> {
    let batch = parse_paths(config, paths)?;

    if let Some(dir) = out_dir {
        for file in &batch.files {
            let path = dump_json(&file.document, &dir, &file.stem())?;
            output::print_written(&path);
        }
    }

    if json {
        let text = serde_json::to_string_pretty(&batch.document())
            .map_err(|e| io_error("<stdout>", &std::io::Error::from(e)))?;
        println!("{}", text);
    } else {
        output::print_counts(&batch);
    }

    let files = batch.files.len();
    let (_, errors) = batch.into_parts();
    let count = errors.len();
    output::print_errors(errors);
    output::print_summary(files, count);
    Ok(count)
}

fn handle_lower(config: &Config, paths: Vec<PathBuf>, format: Format) -> Result<usize, CbsError> {
    let batch = parse_paths(config, paths)?;
    let files = batch.files.len();
    let (document, mut errors) = batch.into_parts();

    let report = lower_document(&document, &config.lower_options());
    match format {
        Format::Text => print!("{}", render_all(&report.specs)),
        Format::Json => {
            let text = to_json(&report.specs)
                .map_err(|e| io_error("<stdout>", &std::io::Error::from(e)))?;
            println!("{}", text);
        }
    }
    output::print_warnings(&report.specs);

    errors.extend(report.errors);
    let count = errors.len();
    output::print_errors(errors);
    output::print_summary(files, count);
    Ok(count)
}

fn handle_check(config: &Config, paths: Vec<PathBuf>) -> Result<usize, CbsError> {
    let batch = parse_paths(config, paths)?;
    let files = batch.files.len();
    let (document, mut errors) = batch.into_parts();

    let report = lower_document(&document, &config.lower_options());
    errors.extend(report.errors);
    let count = errors.len();
    output::print_errors(errors);
    output::print_summary(files, count);
    Ok(count)
}
