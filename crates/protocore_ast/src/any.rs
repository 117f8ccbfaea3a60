//! Polymorphic node handles (`DeclAny`, `ExprAny`, `TypeAny`, `TagAny`)
//! and the qualified-name `Path` used throughout the grammar.
//!
//! Protobuf's "constant" grammar (an integer, a float, a bool, a string,
//! a path to an enum value, the `max` keyword, a message literal, an
//! array) is exactly the grammar used for both option values and field
//! tags/range bounds, so `ExprAny` and `TagAny` both resolve to the same
//! `Id<Expr>` handle — one arena, tagged internally by `ExprKind`, rather
//! than a separate arena per expression shape. `TypeAny` is likewise
//! `Id<TypeNode>` tagged internally by `TypeKind`. `DeclAny` is the one
//! case with genuinely heterogeneous per-kind data (a `Service` looks
//! nothing like a `Field`), so it stays a closed enum over one `Id<T>`
//! per declaration kind, dispatched by kind with no virtual call.

use crate::decl::*;
use crate::expr::Expr;
use crate::ty::TypeNode;
use protocore_base::{Id, Name, Span};

/// A possibly-qualified, possibly-absolute (leading-dot) dotted path,
/// e.g. `.google.protobuf.Any` or `Foo.Bar`.
#[derive(Clone, Debug, Default)]
pub struct Path {
    pub leading_dot: bool,
    pub segments: Vec<Name>,
}

impl Path {
    pub fn single(name: Name) -> Self {
        Path { leading_dot: false, segments: vec![name] }
    }
}

/// A reference to any expression node: option values and field-number /
/// range-bound tags share this grammar, so both names alias the same
/// handle.
pub type ExprAny = Id<Expr>;
pub type TagAny = Id<Expr>;
pub type TypeAny = Id<TypeNode>;

/// A reference to any top-level-or-nested declaration, tagged by kind.
#[derive(Clone, Copy, Debug)]
pub enum DeclAny {
    Message(Id<Message>),
    Enum(Id<EnumDecl>),
    EnumValue(Id<EnumValueDecl>),
    Field(Id<Field>),
    Group(Id<Group>),
    Oneof(Id<Oneof>),
    Extend(Id<Extend>),
    Service(Id<Service>),
    Method(Id<Method>),
    Option(Id<OptionDecl>),
    Package(Id<PackageDecl>),
    Import(Id<ImportDecl>),
    Syntax(Id<SyntaxDecl>),
    Reserved(Id<ReservedDecl>),
    Extensions(Id<ExtensionsDecl>),
    Empty(Id<EmptyDecl>),
    /// A declaration recovery could not repair; downstream passes skip
    /// it, but its span is retained so it still shows up in e.g.
    /// outline views.
    Corrupt(Span),
}
