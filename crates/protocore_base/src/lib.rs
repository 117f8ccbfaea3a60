//! Arenas, interning, source spans, and diagnostics shared by every crate
//! in the protocore front-end.
//!
//! Nothing in this crate knows about Protobuf syntax; it is the load-bearing
//! substrate that the lexer, AST, IR, and validator crates build on:
//!
//! - [`id`]: 32-bit compressed pointers ([`Ptr`]) and biased nullable ids
//!   ([`Id`]) into typed [`Arena`]s.
//! - [`intern`]: a concurrent string interner ([`Interner`]) producing
//!   [`Name`] handles, with short identifiers packed inline.
//! - [`span`]: [`SourceFile`]/[`SourceMap`]/[`Span`] and the byte-offset to
//!   `(line, column)` machinery in four [`ColumnUnit`]s.
//! - [`diag`]: [`Diagnostic`]/[`Report`] and the [`guard_ice`] panic guard.

mod diag;
mod id;
mod intern;
mod span;

pub use diag::{
    guard_ice, Diagnostic, IceError, ImportError, OpenError, Report, Severity, Snippet, Suggestion,
};
pub use id::{Arena, Id, Ptr};
pub use intern::{Interner, Name, NameEq};
pub use span::{ColumnUnit, FileId, Location, SourceFile, SourceMap, Span};
