//! File driver.
//!
//! Cleans a source, splits it into components and parses each one on its
//! own. A component that fails to parse contributes an error to the report
//! and nothing else; its siblings are parsed regardless.

use crate::ast::Declaration;
use crate::config::ParseOptions;
use crate::document::Document;
use crate::errors::{io_error, CbsError, ComponentContext, ErrorReporting, ParseContext, SourceContext};
use crate::syntax::keywords::Keyword;
use crate::syntax::{clean, parse_component, split};
use miette::SourceSpan;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Outcome of parsing one file.
#[derive(Debug)]
pub struct FileReport {
    pub name: String,
    pub document: Document,
    pub errors: Vec<CbsError>,
}

impl FileReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// File name without directory or extension.
    pub fn stem(&self) -> String {
        Path::new(&self.name)
            .file_stem()
            .map_or_else(|| self.name.clone(), |s| s.to_string_lossy().into_owned())
    }
}

/// Outcome of parsing several files.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
}

impl BatchReport {
    /// All files merged into one document, in file order.
    pub fn document(&self) -> Document {
        let mut document = Document::new();
        for file in &self.files {
            document.merge(file.document.clone());
        }
        document
    }

    pub fn errors(&self) -> impl Iterator<Item = &CbsError> {
        self.files.iter().flat_map(|f| f.errors.iter())
    }

    pub fn error_count(&self) -> usize {
        self.files.iter().map(|f| f.errors.len()).sum()
    }

    pub fn into_parts(self) -> (Document, Vec<CbsError>) {
        let mut document = Document::new();
        let mut errors = Vec::new();
        for file in self.files {
            document.merge(file.document);
            errors.extend(file.errors);
        }
        (document, errors)
    }
}

// ============================================================================
// PARSING
// ============================================================================

pub fn parse_source(name: &str, text: &str, options: &ParseOptions) -> FileReport {
    let cleaned = clean(text);
    let file_ctx = ParseContext::new(SourceContext::from_file(name, cleaned.as_str()));
    let split = split(&cleaned);

    let mut report = FileReport {
        name: name.to_string(),
        document: Document::new(),
        errors: Vec::new(),
    };

    if let Some(stray) = &split.leading {
        let token = stray.text.split_whitespace().next().unwrap_or_default();
        report.errors.push(file_ctx.syntax(
            vec!["declaration keyword".to_string()],
            &format!("'{}'", token),
            SourceSpan::from(stray.offset..stray.offset + token.len()),
        ));
    }

    let mut last = None;
    for (index, component) in split.components.iter().enumerate() {
        debug!(
            "{}:{}: parsing {} component",
            name, component.line, component.keyword
        );
        let ctx = file_ctx.for_component(
            ComponentContext {
                keyword: component.keyword.to_string(),
                index,
                line: component.line,
            },
            component.offset,
        );
        match parse_component(component.keyword, &component.text, &ctx, options) {
            Ok(declarations) => {
                for declaration in declarations {
                    place(&mut report.document, &mut last, declaration);
                }
            }
            Err(err) => {
                debug!("{}:{}: {}", name, component.line, err);
                report.errors.push(err);
            }
        }
    }

    info!(
        "parsed {}: {} declarations, {} errors",
        name,
        report.document.len(),
        report.errors.len()
    );
    report
}

pub fn parse_file(path: &Path, options: &ParseOptions) -> FileReport {
    let name = path.display().to_string();
    match fs::read_to_string(path) {
        Ok(text) => parse_source(&name, &text, options),
        Err(err) => FileReport {
            errors: vec![io_error(&name, &err)],
            name,
            document: Document::new(),
        },
    }
}

pub fn parse_batch(paths: &[PathBuf], options: &ParseOptions) -> BatchReport {
    BatchReport {
        files: paths.iter().map(|p| parse_file(p, options)).collect(),
    }
}

/// Adds a declaration to the document. A standalone rule joins the funcon
/// it follows when that funcon heads the rule's pattern; a standalone alias
/// joins the declaration it follows when it names it. Otherwise both are
/// kept as entries of their own.
fn place(document: &mut Document, last: &mut Option<Keyword>, declaration: Declaration) {
    match declaration {
        Declaration::Rule(rule) => {
            if let Some(Declaration::Funcon(funcon)) =
                last.and_then(|k| document.last_mut(k))
            {
                if rule.rule.head_name().is_some_and(|h| funcon.answers_to(h)) {
                    funcon.rules.push(rule.rule);
                    return;
                }
            }
            debug!("keeping orphan rule at {}", rule.origin);
            document.push(Declaration::Rule(rule));
        }
        Declaration::Alias(alias) => {
            if let Some(previous) = last.and_then(|k| document.last_mut(k)) {
                if previous.name() == Some(alias.original.as_str()) {
                    if let Some(aliases) = previous.aliases_mut() {
                        aliases.push(alias);
                        return;
                    }
                }
            }
            document.push(Declaration::Alias(alias));
        }
        other => {
            *last = Some(other.keyword());
            document.push(other);
        }
    }
}

// ============================================================================
// OUTPUT
// ============================================================================

/// Writes `document` as pretty JSON to `<dir>/<stem>.json`.
pub fn dump_json(document: &Document, dir: &Path, stem: &str) -> Result<PathBuf, CbsError> {
    let path = dir.join(format!("{}.json", stem));
    let shown = path.display().to_string();
    fs::create_dir_all(dir).map_err(|e| io_error(&dir.display().to_string(), &e))?;
    let file = fs::File::create(&path).map_err(|e| io_error(&shown, &e))?;
    serde_json::to_writer_pretty(io::BufWriter::new(file), document)
        .map_err(|e| io_error(&shown, &io::Error::from(e)))?;
    debug!(path = %shown, "wrote document dump");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ErrorCategory, ErrorKind};

    const BOOLEANS: &str = "\
### Booleans

[
  Datatype booleans
  Funcon   not
]

Datatype booleans ::= true | false

Funcon not(_:booleans) : booleans
/* Negation */
Alias neg = not
Rule not(false) ~> true
Rule not(true) ~> false
";

    #[test]
    fn attaches_adjacent_rules_and_aliases() {
        let report = parse_source("Booleans.cbs", BOOLEANS, &ParseOptions::default());
        assert!(report.is_ok(), "{:?}", report.errors);
        let funcon = report.document.funcon("not").unwrap();
        assert_eq!(funcon.rules.len(), 2);
        assert_eq!(funcon.aliases[0].alias, "neg");
        assert_eq!(report.document.orphan_rules().count(), 0);
        assert_eq!(report.stem(), "Booleans");
    }

    #[test]
    fn broken_component_does_not_stop_siblings() {
        let text = "Funcon f(_:values : values\nFuncon g : values\nRule g ~> h";
        let report = parse_source("broken.cbs", text, &ParseOptions::default());
        assert_eq!(report.errors.len(), 1);
        assert!(matches!(report.errors[0].kind, ErrorKind::Syntax { .. }));
        assert_eq!(report.errors[0].source_info.component.as_ref().map(|c| c.index), Some(0));
        assert!(report.document.funcon("g").is_some());
    }

    #[test]
    fn unmatched_rules_stay_orphans() {
        let text = "Funcon f : values\nRule g(X) ~> X";
        let report = parse_source("orphan.cbs", text, &ParseOptions::default());
        assert_eq!(report.document.orphan_rules().count(), 1);
        assert!(report.document.funcon("f").unwrap().rules.is_empty());
    }

    #[test]
    fn stray_leading_text_is_a_syntax_error() {
        let report = parse_source("stray.cbs", "oops\nType t", &ParseOptions::default());
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.document.types().count(), 1);
    }

    #[test]
    fn missing_files_are_io_errors() {
        let report = parse_file(Path::new("/nonexistent/missing.cbs"), &ParseOptions::default());
        assert_eq!(report.errors[0].category(), ErrorCategory::Io);
        assert!(report.document.is_empty());
    }
}
