mod common;

use cbsgen::config::Config;
use cbsgen::discovery::SourceDiscoverer;
use cbsgen::driver::{dump_json, parse_batch, parse_source};
use cbsgen::errors::ErrorKind;
use cbsgen::syntax::keywords::Keyword;
use cbsgen::{Document, ParseOptions};
use common::{fixture, parse_fixture};
use pretty_assertions::assert_eq;
use std::fs;

#[test]
fn json_dumps_reload_as_the_same_document() {
    let report = parse_fixture("booleans.cbs");
    let dir = tempfile::tempdir().unwrap();

    let path = dump_json(&report.document, dir.path(), &report.stem()).unwrap();
    assert_eq!(path, dir.path().join("booleans.json"));

    let reloaded: Document = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(reloaded, report.document);
}

#[test]
fn configured_depth_limits_apply_per_component() {
    let config = Config::from_yaml("cbsgen.yaml", "max_depth: 3\n").unwrap();
    let text = "Funcon shallow : values\nFuncon deep(_:f(g(h(i(j))))) : values";
    let report = parse_source("deep.cbs", text, &config.parse_options());

    assert_eq!(report.errors.len(), 1);
    match &report.errors[0].kind {
        ErrorKind::RecursionLimit { limit, .. } => assert_eq!(*limit, 3),
        other => panic!("unexpected error {:?}", other),
    }
    assert!(report.document.funcon("shallow").is_some());
}

#[test]
fn syntax_errors_carry_file_spans() {
    let text = "Type fine\n\nFuncon broken(_:values : values\n";
    let report = parse_source("spans.cbs", text, &ParseOptions::default());
    let error = &report.errors[0];

    assert_eq!(error.source_name(), "spans.cbs");
    let component = error.source_info.component.as_ref().unwrap();
    assert_eq!(component.line, 2);
    let cleaned_start = "Type fine\n".len();
    assert!(error.source_info.primary_span.offset() >= cleaned_start);
}

#[test]
fn discovery_feeds_batches_in_sorted_order() {
    let dir = tempfile::tempdir().unwrap();
    fs::copy(fixture("flowing.cbs"), dir.path().join("b.cbs")).unwrap();
    fs::copy(fixture("booleans.cbs"), dir.path().join("a.cbs")).unwrap();

    let files = SourceDiscoverer::discover(&[dir.path()]).unwrap();
    let batch = parse_batch(&files, &ParseOptions::default());
    let stems: Vec<_> = batch.files.iter().map(|f| f.stem()).collect();
    assert_eq!(stems, vec!["a", "b"]);

    let doc = batch.document();
    let first = doc.get(Keyword::Funcon).first().and_then(|d| d.name());
    assert_eq!(first, Some("not"));
}

#[test]
fn unreadable_files_do_not_stop_the_batch() {
    let paths = vec![fixture("missing.cbs"), fixture("booleans.cbs")];
    let batch = parse_batch(&paths, &ParseOptions::default());
    assert_eq!(batch.error_count(), 1);
    assert_eq!(batch.document().funcons().count(), 3);
}
