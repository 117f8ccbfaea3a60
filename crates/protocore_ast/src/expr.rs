//! The constant expression grammar shared by option values, field
//! numbers, and reserved/extension range bounds.

use crate::any::Path;
use protocore_base::{Id, Name, Span};
use protocore_lexer::TokenId;

/// One constant expression. Numeric/string literals reference the
/// lexer's [`TokenId`] rather than duplicating the parsed value — the
/// evaluator fetches the value from the token stream's
/// metadata side map when it needs it.
#[derive(Clone, Debug)]
pub enum ExprKind {
    Int { token: TokenId },
    Float { token: TokenId },
    Str { token: TokenId },
    Bool(bool),
    /// A bare or qualified path: an enum value reference in a default
    /// value, or an identifier naming a feature/option field.
    Path(Path),
    /// The `max` keyword, valid only inside a range expression's upper
    /// bound.
    Max,
    /// A unary-minus-prefixed literal, e.g. `-1`.
    Negative(Id<Expr>),
    /// `{ field: value, ... }` aggregate option syntax.
    MessageLiteral(Vec<(Name, Id<Expr>)>),
    Array(Vec<Id<Expr>>),
}

#[derive(Clone, Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}
