//! cbsgen error handling.
//!
//! Every failure in the pipeline is a [`CbsError`]: what went wrong (an
//! [`ErrorKind`]), where it happened ([`SourceInfo`]) and how to help
//! ([`DiagnosticInfo`]). Errors are created through an [`ErrorReporting`]
//! context so that spans and codes stay consistent per phase.

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceSpan};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// SOURCE CONTEXT - Error reporting infrastructure
// ============================================================================

/// Named source text an error points into.
#[derive(Debug, Clone)]
pub struct SourceContext {
    pub name: String,
    pub content: String,
}

impl SourceContext {
    /// Create a source context from real file content.
    pub fn from_file(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Convert to NamedSource for use with miette error reporting.
    pub fn to_named_source(&self) -> Arc<NamedSource<String>> {
        Arc::new(NamedSource::new(self.name.clone(), self.content.clone()))
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Which component of a file an error belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentContext {
    pub keyword: String,
    /// Zero-based position of the component in its file.
    pub index: usize,
    /// One-based line of the component's keyword in the cleaned text.
    pub line: usize,
}

// ============================================================================
// ERROR TYPE
// ============================================================================

/// The single error type.
#[derive(Debug)]
pub struct CbsError {
    /// What went wrong.
    pub kind: ErrorKind,
    /// Where it happened.
    pub source_info: SourceInfo,
    /// How to help.
    pub diagnostic_info: DiagnosticInfo,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ErrorKind {
    // Parse errors
    #[error("syntax error: expected {}, found {found}", .expected.join(" | "))]
    Syntax { expected: Vec<String>, found: String },
    #[error("{measure} exceeds the limit of {limit}")]
    RecursionLimit { measure: String, limit: usize },
    #[error("invalid {literal_type} '{value}'")]
    InvalidLiteral { literal_type: String, value: String },
    #[error("malformed {construct}")]
    MalformedConstruct { construct: String },

    // Lowering errors
    #[error("arity error in '{name}': {reason}")]
    ArityConsistency { name: String, reason: String },
    #[error("'{name}' referenced by '{referenced_by}' is not declared")]
    UnresolvedReference { name: String, referenced_by: String },

    #[error("cannot read '{path}': {message}")]
    Io { path: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Parse,
    Lowering,
    Io,
}

impl ErrorKind {
    /// Get the error category for test assertions.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Syntax { .. }
            | Self::RecursionLimit { .. }
            | Self::InvalidLiteral { .. }
            | Self::MalformedConstruct { .. } => ErrorCategory::Parse,

            Self::ArityConsistency { .. } | Self::UnresolvedReference { .. } => {
                ErrorCategory::Lowering
            }

            Self::Io { .. } => ErrorCategory::Io,
        }
    }

    /// Get error code suffix for diagnostic codes.
    pub const fn code_suffix(&self) -> &'static str {
        match self {
            Self::Syntax { .. } => "syntax",
            Self::RecursionLimit { .. } => "recursion_limit",
            Self::InvalidLiteral { .. } => "invalid_literal",
            Self::MalformedConstruct { .. } => "malformed_construct",
            Self::ArityConsistency { .. } => "arity_consistency",
            Self::UnresolvedReference { .. } => "unresolved_reference",
            Self::Io { .. } => "io",
        }
    }

    fn primary_label(&self) -> &'static str {
        match self {
            Self::Syntax { .. } => "unexpected input here",
            Self::RecursionLimit { .. } => "nested too deeply",
            Self::InvalidLiteral { .. } => "invalid literal",
            Self::MalformedConstruct { .. } => "malformed syntax",
            Self::ArityConsistency { .. } => "arity cannot be reconciled",
            Self::UnresolvedReference { .. } => "unresolved name",
            Self::Io { .. } => "unreadable",
        }
    }

    fn default_help(&self) -> Option<String> {
        match self {
            Self::RecursionLimit { limit, .. } => Some(format!(
                "keep nesting below {} levels or raise the limit in the config",
                limit
            )),
            Self::ArityConsistency { .. } => Some(
                "a declaration may have at most one parameter marked `*` or `+`".to_string(),
            ),
            Self::UnresolvedReference { name, .. } => {
                Some(format!("declare '{}' or include the file that does", name))
            }
            _ => None,
        }
    }
}

/// Context-specific source information.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub source: Arc<NamedSource<String>>,
    pub primary_span: SourceSpan,
    pub phase: String,
    pub component: Option<ComponentContext>,
}

/// Diagnostic enhancement data.
#[derive(Debug, Clone)]
pub struct DiagnosticInfo {
    pub help: Option<String>,
    pub error_code: String,
}

impl CbsError {
    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// Name of the source the error points into.
    pub fn source_name(&self) -> &str {
        self.source_info.source.name()
    }
}

impl std::error::Error for CbsError {}

impl fmt::Display for CbsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(component) = &self.source_info.component {
            write!(
                f,
                " (in {} component #{} at line {})",
                component.keyword,
                component.index + 1,
                component.line
            )?;
        }
        Ok(())
    }
}

impl Diagnostic for CbsError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(&self.diagnostic_info.error_code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.diagnostic_info
            .help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn fmt::Display>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let labels = vec![LabeledSpan::new_with_span(
            Some(self.kind.primary_label().to_string()),
            self.source_info.primary_span,
        )];
        Some(Box::new(labels.into_iter()))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&*self.source_info.source)
    }
}

// ============================================================================
// ERROR CREATION CONTEXTS
// ============================================================================

/// Context-aware error creation.
pub trait ErrorReporting {
    /// Create an error with context-appropriate enhancements.
    fn report(&self, kind: ErrorKind, span: SourceSpan) -> CbsError;

    fn syntax(&self, expected: Vec<String>, found: &str, span: SourceSpan) -> CbsError {
        self.report(
            ErrorKind::Syntax {
                expected,
                found: found.into(),
            },
            span,
        )
    }

    fn malformed(&self, construct: &str, span: SourceSpan) -> CbsError {
        self.report(
            ErrorKind::MalformedConstruct {
                construct: construct.into(),
            },
            span,
        )
    }

    fn arity(&self, name: &str, reason: impl Into<String>, span: SourceSpan) -> CbsError {
        self.report(
            ErrorKind::ArityConsistency {
                name: name.into(),
                reason: reason.into(),
            },
            span,
        )
    }

    fn unresolved(&self, name: &str, referenced_by: &str, span: SourceSpan) -> CbsError {
        self.report(
            ErrorKind::UnresolvedReference {
                name: name.into(),
                referenced_by: referenced_by.into(),
            },
            span,
        )
    }
}

fn build_error(
    kind: ErrorKind,
    source: &SourceContext,
    span: SourceSpan,
    phase: &str,
    component: Option<ComponentContext>,
) -> CbsError {
    let error_code = format!("cbs::{}::{}", phase, kind.code_suffix());
    let help = kind.default_help();
    CbsError {
        kind,
        source_info: SourceInfo {
            source: source.to_named_source(),
            primary_span: clamp(span, source.len()),
            phase: phase.to_string(),
            component,
        },
        diagnostic_info: DiagnosticInfo { help, error_code },
    }
}

/// Reports errors found while parsing one component of a file. Spans given
/// to [`ErrorReporting::report`] are relative to the component text and get
/// shifted to file offsets.
#[derive(Debug, Clone)]
pub struct ParseContext {
    pub source: SourceContext,
    pub component: Option<ComponentContext>,
    pub offset: usize,
}

impl ParseContext {
    pub fn new(source: SourceContext) -> Self {
        Self {
            source,
            component: None,
            offset: 0,
        }
    }

    pub fn for_component(&self, component: ComponentContext, offset: usize) -> Self {
        Self {
            source: self.source.clone(),
            component: Some(component),
            offset,
        }
    }
}

impl ErrorReporting for ParseContext {
    fn report(&self, kind: ErrorKind, span: SourceSpan) -> CbsError {
        let shifted = SourceSpan::new((span.offset() + self.offset).into(), span.len());
        build_error(kind, &self.source, shifted, "parse", self.component.clone())
    }
}

/// Reports errors found while lowering one declaration. The source is the
/// pretty-printed declaration so diagnostics still show an excerpt.
#[derive(Debug, Clone)]
pub struct LoweringContext {
    pub source: SourceContext,
}

impl LoweringContext {
    pub fn new(origin: &str, rendered: impl Into<String>) -> Self {
        Self {
            source: SourceContext::from_file(origin, rendered),
        }
    }

    /// Span covering the whole declaration.
    pub fn whole(&self) -> SourceSpan {
        SourceSpan::from(0..self.source.len())
    }

    /// Span of the first occurrence of `needle`, or the whole declaration.
    pub fn find(&self, needle: &str) -> SourceSpan {
        match self.source.content.find(needle) {
            Some(start) => SourceSpan::from(start..start + needle.len()),
            None => self.whole(),
        }
    }
}

impl ErrorReporting for LoweringContext {
    fn report(&self, kind: ErrorKind, span: SourceSpan) -> CbsError {
        build_error(kind, &self.source, span, "lower", None)
    }
}

/// Error for a file that could not be read.
pub fn io_error(path: &str, err: &std::io::Error) -> CbsError {
    build_error(
        ErrorKind::Io {
            path: path.to_string(),
            message: err.to_string(),
        },
        &SourceContext::from_file(path, ""),
        unspanned(),
        "io",
        None,
    )
}

/// Placeholder span for errors not tied to a source location.
pub fn unspanned() -> SourceSpan {
    SourceSpan::from(0..0)
}

fn clamp(span: SourceSpan, len: usize) -> SourceSpan {
    let start = span.offset().min(len);
    let end = (span.offset() + span.len()).min(len);
    SourceSpan::from(start..end)
}

// ============================================================================
// ERROR FORMATTING UTILITIES
// ============================================================================

/// Prints a CbsError with full miette diagnostics.
pub fn print_error(error: CbsError) {
    use miette::Report;
    let report = Report::new(error);
    eprintln!("{report:?}");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> ParseContext {
        ParseContext::new(SourceContext::from_file("demo.cbs", "Funcon a : b\nFuncon (c"))
    }

    #[test]
    fn parse_errors_shift_spans_by_component_offset() {
        let component = ComponentContext {
            keyword: "Funcon".into(),
            index: 1,
            line: 2,
        };
        let ctx = context().for_component(component, 13);
        let err = ctx.syntax(vec!["identifier".into()], "(", SourceSpan::from(7..8));
        assert_eq!(err.source_info.primary_span.offset(), 20);
        assert_eq!(err.diagnostic_info.error_code, "cbs::parse::syntax");
        assert_eq!(err.category(), ErrorCategory::Parse);
        assert!(err.to_string().contains("component #2 at line 2"));
    }

    #[test]
    fn spans_are_clamped_to_the_source() {
        let err = context().malformed("term", SourceSpan::from(500..600));
        assert_eq!(err.source_info.primary_span.offset(), context().source.len());
        assert_eq!(err.source_info.primary_span.len(), 0);
    }

    #[test]
    fn lowering_errors_carry_default_help() {
        let ctx = LoweringContext::new("demo.cbs:1", "Funcon f(_:T*, _:U*) : V");
        let err = ctx.arity("f", "two variadic parameters", ctx.whole());
        assert_eq!(err.category(), ErrorCategory::Lowering);
        assert_eq!(err.diagnostic_info.error_code, "cbs::lower::arity_consistency");
        assert!(err.diagnostic_info.help.is_some());
    }

    #[test]
    fn syntax_message_lists_expected_alternatives() {
        let kind = ErrorKind::Syntax {
            expected: vec!["identifier".into(), "number".into()],
            found: ")".into(),
        };
        assert_eq!(
            kind.to_string(),
            "syntax error: expected identifier | number, found )"
        );
    }
}
