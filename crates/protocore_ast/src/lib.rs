//! AST node kinds and the recursive-descent Protobuf parser.
//!
//! [`parse_file`] turns a lexed [`protocore_lexer::TokenStream`] into an
//! [`AstContext`]: one arena per declaration/expression/type kind plus a
//! [`FileAst`] summary tying them together. Every node is addressed by an
//! [`protocore_base::Id`], never a pointer, so the whole context can be
//! moved, dropped, or (later) rebound into an IR without lifetime
//! gymnastics.

mod any;
mod arena_ctx;
mod cursor;
mod decl;
mod expr;
mod parser;
mod ty;

pub use any::{DeclAny, ExprAny, Path, TagAny, TypeAny};
pub use arena_ctx::AstContext;
pub use cursor::Cursor;
pub use decl::*;
pub use expr::{Expr, ExprKind};
pub use parser::{parse_file, ParseOutput};
pub use ty::{ScalarType, TypeKind, TypeNode};
