//! Import path canonicalization, the `Opener`/`Importer` boundary
//! traits, and transitive (public) import closure.

use protocore_base::{Diagnostic, Report, Span};
use rustc_hash::FxHashSet;
use std::path::Path as StdPath;

use crate::model::ImportedFile;

/// An error canonicalizing an import path: the path itself escapes or
/// otherwise cannot be made into a dedup key.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CanonicalizeError {
    #[error("import path is absolute: {0}")]
    Absolute(String),
    #[error("import path escapes its root via '..': {0}")]
    ParentEscape(String),
}

/// Canonicalizes an import's source spelling into the dedup key used for
/// the session's import table: backslashes become forward slashes, `.`
/// segments are dropped, runs of separators collapse to one, and a
/// leading Windows drive letter (`C:\...`) is warned about (not
/// rejected — some build systems emit these) via the returned
/// diagnostic, if any.
pub fn canonicalize_import_path(raw: &str, span: Span) -> Result<(String, Option<Diagnostic>), CanonicalizeError> {
    let mut warning = None;
    let mut rest = raw;

    if let Some(colon) = rest.find(':') {
        if colon == 1 && rest.as_bytes()[0].is_ascii_alphabetic() {
            warning = Some(
                Diagnostic::warning(format!("import path '{raw}' has a Windows drive-letter prefix")).with_span(span),
            );
            rest = &rest[colon + 1..];
        }
    }

    let normalized = rest.replace('\\', "/");

    if normalized.starts_with('/') {
        return Err(CanonicalizeError::Absolute(raw.to_string()));
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in normalized.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(CanonicalizeError::ParentEscape(raw.to_string())),
            other => segments.push(other),
        }
    }

    Ok((segments.join("/"), warning))
}

/// `Open(path) -> (File, Error)`. Distinct from
/// [`Importer`]: an `Opener` turns a path into file *contents*
/// (bytes/text, registered in the session's `SourceMap`) with no
/// knowledge of the compilation graph; an `Importer` turns an already-
/// opened and lexed/parsed/lowered dependency into a [`crate::model::File`].
/// Openers compose — a union opener tries each child in declared order
/// and returns the first success, only reporting "not found" if every
/// child does. Well-known types do not go through an `Opener` at all:
/// [`crate::wkt::resolve`] hands the session a ready-built `File`
/// directly, short-circuiting open/lex/parse/lower for those paths.
pub trait Opener {
    /// Errors must distinguish "not found" (so a union opener can try
    /// the next child) from other I/O failures (which should abort
    /// immediately).
    fn open(&self, path: &str) -> Result<OpenedSource, protocore_base::OpenError>;
}

pub struct OpenedSource {
    pub path: String,
    pub contents: String,
}

/// Tries each child opener in order; the first to return anything other
/// than [`protocore_base::OpenError::NotFound`] wins.
pub struct UnionOpener {
    children: Vec<Box<dyn Opener>>,
}

impl UnionOpener {
    pub fn new(children: Vec<Box<dyn Opener>>) -> Self {
        UnionOpener { children }
    }
}

impl Opener for UnionOpener {
    fn open(&self, path: &str) -> Result<OpenedSource, protocore_base::OpenError> {
        for child in &self.children {
            match child.open(path) {
                Err(protocore_base::OpenError::NotFound(_)) => continue,
                other => return other,
            }
        }
        Err(protocore_base::OpenError::NotFound(path.to_string()))
    }
}

/// A filesystem-backed opener rooted at one or more include directories,
/// tried in order — the common case for a real build.
pub struct DirectoryOpener {
    roots: Vec<std::path::PathBuf>,
}

impl DirectoryOpener {
    pub fn new(roots: Vec<std::path::PathBuf>) -> Self {
        DirectoryOpener { roots }
    }
}

impl Opener for DirectoryOpener {
    fn open(&self, path: &str) -> Result<OpenedSource, protocore_base::OpenError> {
        for root in &self.roots {
            let candidate = root.join(path);
            if candidate.is_file() {
                let contents = std::fs::read_to_string(&candidate)
                    .map_err(|source| protocore_base::OpenError::Io { path: candidate.display().to_string(), source })?;
                return Ok(OpenedSource { path: path.to_string(), contents });
            }
        }
        Err(protocore_base::OpenError::NotFound(path.to_string()))
    }
}

/// `(index, canonical_path, import_decl) -> (File, Error)`. `index` is
/// `-1` for the implicit `descriptor.proto` import and the
/// declaration-order index (0-based) otherwise; a cycle is signaled
/// by [`protocore_base::ImportError::Cycle`] carrying the decl chain.
pub trait Importer {
    fn import(&mut self, index: i32, canonical_path: &str, decl_span: Span) -> Result<crate::model::File, protocore_base::ImportError>;
}

const IMPLICIT_DESCRIPTOR_PATH: &str = "google/protobuf/descriptor.proto";

/// One frame of the in-progress import stack, used to detect and report
/// cycles with the full decl chain.
#[derive(Clone, Debug)]
pub struct ImportFrame {
    pub path: String,
    pub decl_span: Span,
}

/// Tracks which canonical paths are currently being imported (to detect
/// cycles) and which have finished importing (to dedup), across one
/// whole compilation session.
#[derive(Default)]
pub struct ImportStack {
    in_progress: Vec<ImportFrame>,
    finished: FxHashSet<String>,
}

impl ImportStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes `path` onto the in-progress stack, returning a cycle
    /// diagnostic (one snippet per edge in the chain, oldest first) if
    /// `path` is already an ancestor.
    pub fn enter(&mut self, path: &str, decl_span: Span) -> Result<(), Report> {
        if let Some(cycle_start) = self.in_progress.iter().position(|f| f.path == path) {
            let mut report = Report::new();
            let mut diag = Diagnostic::error(format!("detected cyclic import while importing \"{path}\""));
            for frame in &self.in_progress[cycle_start..] {
                diag = diag.with_labeled_span(frame.decl_span, format!("\"{}\" imported here", frame.path));
            }
            diag = diag.with_labeled_span(decl_span, format!("\"{path}\" imported here, closing the cycle"));
            report.push(diag);
            return Err(report);
        }
        self.in_progress.push(ImportFrame { path: path.to_string(), decl_span });
        Ok(())
    }

    pub fn exit(&mut self, path: &str) {
        self.in_progress.retain(|f| f.path != path);
        self.finished.insert(path.to_string());
    }

    pub fn is_finished(&self, path: &str) -> bool {
        self.finished.contains(path)
    }
}

/// Materializes the transitive-public-import closure for a file's
/// already-resolved direct imports: for each direct import, its
/// `public` imports are appended (uniquely, keyed by
/// canonical path) to the importing file's visible import set. This is
/// a breadth-first walk, not a one-level append, since a `public`
/// import's own `public` imports are visible too.
pub fn transitive_closure(direct: &[ImportedFile], public_imports_of: impl Fn(&str) -> Vec<ImportedFile>) -> Vec<ImportedFile> {
    let mut seen: FxHashSet<String> = direct.iter().map(|i| i.canonical_path.clone()).collect();
    let mut result = direct.to_vec();
    let mut frontier: Vec<String> =
        direct.iter().filter(|i| i.kind == protocore_ast::ImportKind::Public).map(|i| i.canonical_path.clone()).collect();

    while let Some(path) = frontier.pop() {
        for child in public_imports_of(&path) {
            if seen.insert(child.canonical_path.clone()) {
                if child.kind == protocore_ast::ImportKind::Public {
                    frontier.push(child.canonical_path.clone());
                }
                result.push(ImportedFile { transitive: true, ..child });
            }
        }
    }

    result
}

/// `true` if `path` is the implicit descriptor import every file
/// carries.
pub fn is_implicit_descriptor(path: &str) -> bool {
    path == IMPLICIT_DESCRIPTOR_PATH
}

pub fn implicit_descriptor_path() -> &'static str {
    IMPLICIT_DESCRIPTOR_PATH
}

/// `true` if `path` looks like a `.proto` file reference at all (used
/// only for a cheap sanity diagnostic before handing a path to an
/// `Importer`; real extension checking is the caller's business).
pub fn looks_like_proto_path(path: &str) -> bool {
    StdPath::new(path).extension().map(|ext| ext == "proto").unwrap_or(false)
}
