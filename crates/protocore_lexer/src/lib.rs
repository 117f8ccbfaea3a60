//! Token stream and lexical analysis for Protobuf source files.
//!
//! [`lex`] turns a registered [`protocore_base::SourceFile`] into a
//! [`TokenStream`] (leaves fused into bracket trees, with out-of-band
//! metadata) plus a [`protocore_base::Report`] of diagnostics. [`open_source`]
//! runs the prelude checks (size, UTF-16/BOM, UTF-8 validity) that must
//! pass before a file is even eligible for lexing.

mod config;
mod lexer;
mod numbers;
mod prelude;
mod strings;
mod token;

pub use config::{AffixKind, KeywordAction, LexerConfig};
pub use lexer::{lex, open_source};
pub use prelude::check_prelude;
pub use strings::{unescape, EscapeError, EscapeSpan, UnescapeResult};
pub use token::{Leaf, Metadata, NumberValue, TokenId, TokenKind, TokenNode, TokenStream, Tree};
