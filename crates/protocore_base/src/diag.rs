//! Diagnostics: the single channel by which every pass reports problems.
//!
//! A pass (lexer, parser, walker, validator) never fails outright. It
//! always returns its value *and* a [`Report`] — an append-only bag of
//! [`Diagnostic`]s — so that downstream tooling (an LSP, a linter) can keep
//! operating on a partial IR even when the input had errors. Rendering a
//! diagnostic into text-with-source-snippets is a renderer's job, not
//! this crate's; we only emit and classify.

use crate::span::Span;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;

/// How serious a [`Diagnostic`] is. Ordered from most to least severe.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum Severity {
    /// An internal compiler error: a bug in this crate, captured by a
    /// panic guard rather than raised by normal control flow.
    Ice,
    Error,
    Warning,
    Remark,
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Ice => "internal compiler error",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Remark => "remark",
            Severity::Note => "note",
        };
        f.write_str(s)
    }
}

/// One labeled source location attached to a diagnostic. `label` is
/// typically something like "expected here" or "first defined here".
#[derive(Clone, Debug)]
pub struct Snippet {
    pub span: Span,
    pub label: Option<String>,
}

impl Snippet {
    pub fn new(span: Span) -> Self {
        Snippet { span, label: None }
    }

    pub fn labeled(span: Span, label: impl Into<String>) -> Self {
        Snippet { span, label: Some(label.into()) }
    }
}

/// A proposed edit: replace the byte range `span` with `replacement`.
#[derive(Clone, Debug)]
pub struct Suggestion {
    pub span: Span,
    pub replacement: String,
    pub message: String,
}

impl Suggestion {
    pub fn new(span: Span, replacement: impl Into<String>, message: impl Into<String>) -> Self {
        Suggestion { span, replacement: replacement.into(), message: message.into() }
    }
}

/// A single structured diagnostic: a severity, a primary message, zero or
/// more labeled snippets, free-form notes and help text, and zero or more
/// suggested edits.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub snippets: Vec<Snippet>,
    pub notes: Vec<String>,
    pub helps: Vec<String>,
    pub suggestions: Vec<Suggestion>,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Diagnostic {
            severity,
            message: message.into(),
            snippets: Vec::new(),
            notes: Vec::new(),
            helps: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn ice(message: impl Into<String>) -> Self {
        Self::new(Severity::Ice, message)
    }

    /// Builder-style: attach an unlabeled primary snippet.
    pub fn with_span(mut self, span: Span) -> Self {
        self.snippets.push(Snippet::new(span));
        self
    }

    pub fn with_labeled_span(mut self, span: Span, label: impl Into<String>) -> Self {
        self.snippets.push(Snippet::labeled(span, label));
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.helps.push(help.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: Suggestion) -> Self {
        self.suggestions.push(suggestion);
        self
    }

    pub fn primary_span(&self) -> Option<Span> {
        self.snippets.first().map(|s| s.span)
    }
}

/// An append-only collection of diagnostics produced by one pass.
///
/// `Report` never drops entries and is the only thing a pass uses to
/// communicate problems — passes always return, and the caller inspects
/// the report's severity rather than unwinding a `Result::Err`.
#[derive(Clone, Debug, Default)]
pub struct Report {
    diagnostics: Vec<Diagnostic>,
}

impl Report {
    pub fn new() -> Self {
        Report::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn extend(&mut self, other: Report) {
        self.diagnostics.extend(other.diagnostics);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn has_severity_at_least(&self, severity: Severity) -> bool {
        self.diagnostics.iter().any(|d| d.severity <= severity)
    }

    /// A failed compilation: any diagnostic at `Error` or worse. Does not
    /// by itself account for a `deny_warnings` session policy — callers
    /// that want warnings to fail too should also check
    /// [`Self::has_severity_at_least`]`(Severity::Warning)`.
    pub fn is_failure(&self) -> bool {
        self.has_severity_at_least(Severity::Error)
    }

    /// Orders the diagnostics produced for a single file by the byte
    /// offset of their primary span. Diagnostics with no span sort first.
    /// Cross-file ordering is intentionally left to the caller.
    pub fn sort_by_primary_span(&mut self) {
        self.diagnostics.sort_by_key(|d| d.primary_span().map(|s| s.start));
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

impl IntoIterator for Report {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;
    fn into_iter(self) -> Self::IntoIter {
        self.diagnostics.into_iter()
    }
}

impl FromIterator<Diagnostic> for Report {
    fn from_iter<I: IntoIterator<Item = Diagnostic>>(iter: I) -> Self {
        Report { diagnostics: iter.into_iter().collect() }
    }
}

/// Fatal conditions that abort a pass before it can produce a [`Report`]
/// at all — things a caller must treat as a hard stop rather than a
/// diagnosable-but-continuable condition (file too big, not UTF-8,
/// unbreakable import cycle, I/O failure).
#[derive(Debug, Error)]
pub enum OpenError {
    /// Distinguished from the other variants so a union opener can try
    /// its next child instead of aborting.
    #[error("{0}: not found")]
    NotFound(String),
    #[error("{path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
    #[error("{path}: file exceeds the maximum allowed size of {max} bytes")]
    TooLarge { path: String, max: i64 },
    #[error("{path}: input is UTF-16, not UTF-8")]
    Utf16Detected { path: String },
    #[error("{path}: input is not valid UTF-8 and appears to be a binary file")]
    BinaryFile { path: String },
    #[error("{path}: invalid UTF-8 byte at offset {offset}")]
    InvalidUtf8Byte { path: String, offset: usize },
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("import cycle detected: {}", chain.join(" -> "))]
    Cycle { chain: Vec<String> },
    #[error("cannot resolve import {path:?}")]
    Unresolved { path: String },
}

/// An internal compiler error captured by [`guard_ice`]. Carries whatever
/// context the guarded closure's caller attached (e.g. the lexer's cursor
/// position) alongside the panic payload's message.
#[derive(Debug, Error)]
#[error("internal compiler error{}: {payload}", context.as_ref().map(|c| format!(" ({c})")).unwrap_or_default())]
pub struct IceError {
    pub payload: String,
    pub context: Option<String>,
}

fn panic_payload_to_string(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Runs `f`, converting any panic inside it into an [`IceError`] rather
/// than unwinding past the caller. `context` is evaluated only if a panic
/// actually occurs, so it can be a cheap closure capturing e.g. the
/// lexer's current cursor offset.
///
/// This is the panic guard described for the lexer's main loop and the
/// walker's DFS: every iteration runs inside `guard_ice` so that a bug in
/// this crate surfaces as a `Severity::Ice` diagnostic in the caller's
/// `Report` instead of crashing the whole compilation session.
pub fn guard_ice<F, T>(context: impl FnOnce() -> String, f: F) -> Result<T, IceError>
where
    F: FnOnce() -> T,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Ok(value),
        Err(payload) => Err(IceError { payload: panic_payload_to_string(payload), context: Some(context()) }),
    }
}

impl IceError {
    /// Converts a captured ICE into a diagnostic at the session boundary,
    /// the point where internal errors stop being `Result`s and become
    /// just another entry in the `Report`.
    pub fn into_diagnostic(self) -> Diagnostic {
        let mut diag = Diagnostic::ice(format!("internal compiler error: {}", self.payload));
        if let Some(context) = self.context {
            diag = diag.with_note(context);
        }
        diag
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::{FileId, SourceFile, SourceMap};

    fn dummy_span() -> (SourceMap, Span) {
        let mut map = SourceMap::new();
        let id: FileId = map.add(SourceFile::new("t.proto", "message M {}"));
        (map, Span::new(id, 0, 7))
    }

    #[test]
    fn report_is_failure_only_with_error_or_worse() {
        let mut report = Report::new();
        assert!(!report.is_failure());
        report.push(Diagnostic::warning("unused import"));
        assert!(!report.is_failure());
        report.push(Diagnostic::error("duplicate field number"));
        assert!(report.is_failure());
    }

    #[test]
    fn severity_ordering_places_ice_as_most_severe() {
        assert!(Severity::Ice < Severity::Error);
        assert!(Severity::Error < Severity::Warning);
        assert!(Severity::Warning < Severity::Remark);
        assert!(Severity::Remark < Severity::Note);
    }

    #[test]
    fn diagnostic_builder_accumulates_snippets_and_suggestions() {
        let (_map, span) = dummy_span();
        let diag = Diagnostic::error("field number 1 is reused")
            .with_labeled_span(span, "first used here")
            .with_labeled_span(span, "reused here")
            .with_note("field numbers must be unique within a message")
            .with_suggestion(Suggestion::new(span, "2", "renumber this field"));
        assert_eq!(diag.snippets.len(), 2);
        assert_eq!(diag.notes.len(), 1);
        assert_eq!(diag.suggestions.len(), 1);
        assert_eq!(diag.primary_span(), Some(span));
    }

    #[test]
    fn sort_by_primary_span_orders_by_byte_offset() {
        let mut map = SourceMap::new();
        let id = map.add(SourceFile::new("t", "abcdefgh"));
        let mut report = Report::new();
        report.push(Diagnostic::error("late").with_span(Span::new(id, 5, 6)));
        report.push(Diagnostic::error("early").with_span(Span::new(id, 1, 2)));
        report.push(Diagnostic::error("no span"));
        report.sort_by_primary_span();
        let messages: Vec<_> = report.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages, vec!["no span", "early", "late"]);
    }

    #[test]
    fn guard_ice_converts_panic_into_ice_error() {
        let result: Result<(), IceError> = guard_ice(|| "cursor at offset 42".to_string(), || {
            panic!("cursor failed to advance");
        });
        let err = result.unwrap_err();
        assert!(err.payload.contains("cursor failed to advance"));
        assert_eq!(err.context.as_deref(), Some("cursor at offset 42"));
    }

    #[test]
    fn guard_ice_passes_through_normal_results() {
        let result: Result<i32, IceError> = guard_ice(|| "unused".to_string(), || 2 + 2);
        assert_eq!(result.unwrap(), 4);
    }

    #[test]
    fn ice_error_converts_to_ice_severity_diagnostic() {
        let err = IceError { payload: "boom".to_string(), context: Some("at token 3".to_string()) };
        let diag = err.into_diagnostic();
        assert_eq!(diag.severity, Severity::Ice);
        assert!(diag.message.contains("boom"));
        assert_eq!(diag.notes, vec!["at token 3".to_string()]);
    }
}
