//! Declaration node kinds: the file's top-level and nested grammar
//! productions (message, enum, field, service, ...).

use crate::any::{DeclAny, ExprAny, Path, TagAny, TypeAny};
use protocore_base::{Id, Name, Span};
use protocore_lexer::TokenId;

/// `optional` / `required` / `repeated`, or absent (proto3 singular, or
/// editions where presence comes from features instead of a label).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FieldLabel {
    None,
    Optional,
    Required,
    Repeated,
}

/// One `(name, value)` entry inside a bracketed field option list or a
/// top-level/body-level `option` statement's value, when that value is
/// itself a message literal.
#[derive(Clone, Debug)]
pub struct OptionEntry {
    pub path: Path,
    pub value: ExprAny,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct Message {
    pub name: Name,
    pub body: Vec<DeclAny>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct EnumDecl {
    pub name: Name,
    pub body: Vec<DeclAny>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct EnumValueDecl {
    pub name: Name,
    pub number: TagAny,
    pub options: Vec<OptionEntry>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct Field {
    pub label: FieldLabel,
    pub ty: TypeAny,
    pub name: Name,
    pub number: TagAny,
    pub options: Vec<OptionEntry>,
    pub span: Span,
}

/// A proto2 `group`: syntactically a field with an inline nested message
/// body. The walker later lowers this into a first-class message plus a
/// DELIMITED-encoded field referencing it, but at the AST level it is
/// kept as this single node, matching how it is actually written in
/// source.
#[derive(Clone, Debug)]
pub struct Group {
    pub label: FieldLabel,
    pub name: Name,
    pub number: TagAny,
    pub options: Vec<OptionEntry>,
    pub body: Vec<DeclAny>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct Oneof {
    pub name: Name,
    pub body: Vec<DeclAny>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct Extend {
    pub extendee: Path,
    pub body: Vec<DeclAny>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct Service {
    pub name: Name,
    pub body: Vec<DeclAny>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct Method {
    pub name: Name,
    pub input_type: Path,
    pub input_streaming: bool,
    pub output_type: Path,
    pub output_streaming: bool,
    pub options: Vec<OptionEntry>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct OptionDecl {
    pub path: Path,
    pub value: ExprAny,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct PackageDecl {
    pub path: Path,
    pub span: Span,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ImportKind {
    Plain,
    Public,
    Weak,
}

#[derive(Clone, Debug)]
pub struct ImportDecl {
    pub kind: ImportKind,
    pub path_token: TokenId,
    pub span: Span,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SyntaxKind {
    Proto2,
    Proto3,
    Edition,
}

#[derive(Clone, Debug)]
pub struct SyntaxDecl {
    pub kind: SyntaxKind,
    /// For `SyntaxKind::Edition`, the edition string token (e.g.
    /// `"2023"`); absent for `proto2`/`proto3`.
    pub edition_token: Option<TokenId>,
    pub span: Span,
}

/// One entry in a `reserved` statement: either a closed numeric range or
/// a reserved field/enum-value name.
#[derive(Clone, Debug)]
pub enum ReservedItem {
    Range { start: TagAny, end: Option<TagAny> },
    Name(TokenId),
}

#[derive(Clone, Debug)]
pub struct ReservedDecl {
    pub items: Vec<ReservedItem>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct ExtensionsDecl {
    pub ranges: Vec<(TagAny, Option<TagAny>)>,
    pub options: Vec<OptionEntry>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct EmptyDecl {
    pub span: Span,
}

/// The whole file: syntax/edition declaration, package, imports, and the
/// flat sequence of top-level declarations (messages, enums, services,
/// extends, top-level options).
#[derive(Clone, Debug, Default)]
pub struct FileAst {
    pub syntax: Option<Id<SyntaxDecl>>,
    pub package: Option<Id<PackageDecl>>,
    pub imports: Vec<Id<ImportDecl>>,
    pub top_level: Vec<DeclAny>,
}
