//! Helpers shared by the integration tests.

#![allow(dead_code)]

use cbsgen::config::{LowerOptions, ParseOptions};
use cbsgen::driver::{parse_file, FileReport};
use cbsgen::lower::{lower_document, LoweringReport, NodeSpec};
use std::path::PathBuf;

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn parse_fixture(name: &str) -> FileReport {
    parse_file(&fixture(name), &ParseOptions::default())
}

/// Lowers everything except built-in funcons.
pub fn lower_all() -> LowerOptions {
    LowerOptions {
        skip: Vec::new(),
        skip_builtin: true,
    }
}

pub fn lower_fixture(name: &str, options: &LowerOptions) -> LoweringReport {
    let report = parse_fixture(name);
    assert!(report.is_ok(), "{} did not parse: {:?}", name, report.errors);
    lower_document(&report.document, options)
}

pub fn spec<'a>(report: &'a LoweringReport, name: &str) -> &'a NodeSpec {
    report
        .specs
        .iter()
        .find(|s| s.name == name)
        .unwrap_or_else(|| panic!("no spec for {}", name))
}
