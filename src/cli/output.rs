//! User-facing output for the CLI: counts, summaries and written files.
//! Diagnostics go to stderr, results to stdout.

use crate::driver::BatchReport;
use crate::errors::{print_error, CbsError};
use crate::lower::NodeSpec;
use std::io::Write;
use std::path::Path;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

// ============================================================================
// RESULTS
// ============================================================================

/// Prints per-file declaration counts followed by per-kind totals.
pub fn print_counts(batch: &BatchReport) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    for file in &batch.files {
        let _ = stdout.set_color(ColorSpec::new().set_bold(true));
        let _ = write!(stdout, "{}", file.name);
        let _ = stdout.reset();
        let _ = writeln!(stdout, ": {} declarations", file.document.len());
    }

    let document = batch.document();
    for (keyword, count) in document.counts() {
        if count > 0 {
            let _ = writeln!(stdout, "  {:<15} {}", keyword, count);
        }
    }
}

pub fn print_written(path: &Path) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)));
    let _ = writeln!(stdout, "wrote {}", path.display());
    let _ = stdout.reset();
}

/// Lists lowering warnings on stderr, one line per warning.
pub fn print_warnings(specs: &[NodeSpec]) {
    let mut stderr = StandardStream::stderr(ColorChoice::Auto);
    for spec in specs {
        for warning in &spec.warnings {
            let _ = stderr.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)));
            let _ = write!(stderr, "warning");
            let _ = stderr.reset();
            let _ = writeln!(stderr, ": {} ({}): {}", spec.name, spec.origin, warning);
        }
    }
}

// ============================================================================
// DIAGNOSTICS
// ============================================================================

pub fn print_errors(errors: Vec<CbsError>) {
    for error in errors {
        print_error(error);
    }
}

/// Final one-line summary on stderr.
pub fn print_summary(files: usize, errors: usize) {
    let mut stderr = StandardStream::stderr(ColorChoice::Auto);
    if errors == 0 {
        let _ = stderr.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true));
        let _ = write!(stderr, "ok");
    } else {
        let _ = stderr.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true));
        let _ = write!(stderr, "{} error(s)", errors);
    }
    let _ = stderr.reset();
    let _ = writeln!(stderr, " in {} file(s)", files);
}
