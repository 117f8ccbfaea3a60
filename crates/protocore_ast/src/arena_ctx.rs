//! Owned arena storage for one file's AST.
//!
//! One struct bundles every per-kind arena so the parser and every later
//! pass get a single handle to all of a file's node storage, the way
//! `rustc_ast`'s node arenas are grouped under one context rather than
//! threaded individually through each function signature. Our arenas are
//! index-addressed (`Id<T>`/`Arena<T>` from `protocore_base`) rather than
//! reference-addressed, so `AstContext` owns its arenas outright and has
//! no lifetime parameter.

use crate::decl::{
    EmptyDecl, EnumDecl, EnumValueDecl, Extend, ExtensionsDecl, Field, FileAst, Group,
    ImportDecl, Message, Method, Oneof, OptionDecl, PackageDecl, ReservedDecl, Service,
    SyntaxDecl,
};
use crate::expr::Expr;
use crate::ty::TypeNode;
use protocore_base::{Arena, Id};

/// Every arena needed to hold one file's parsed AST, plus the file-level
/// summary ([`FileAst`]) tying them together.
#[derive(Default)]
pub struct AstContext {
    pub messages: Arena<Message>,
    pub enums: Arena<EnumDecl>,
    pub enum_values: Arena<EnumValueDecl>,
    pub fields: Arena<Field>,
    pub groups: Arena<Group>,
    pub oneofs: Arena<Oneof>,
    pub extends: Arena<Extend>,
    pub services: Arena<Service>,
    pub methods: Arena<Method>,
    pub options: Arena<OptionDecl>,
    pub packages: Arena<PackageDecl>,
    pub imports: Arena<ImportDecl>,
    pub syntaxes: Arena<SyntaxDecl>,
    pub reserveds: Arena<ReservedDecl>,
    pub extensions: Arena<ExtensionsDecl>,
    pub empties: Arena<EmptyDecl>,
    pub exprs: Arena<Expr>,
    pub types: Arena<TypeNode>,
    pub file: FileAst,
}

impl AstContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_expr(&mut self, expr: Expr) -> Id<Expr> {
        Id::of(self.exprs.alloc(expr))
    }

    pub fn alloc_type(&mut self, ty: TypeNode) -> Id<TypeNode> {
        Id::of(self.types.alloc(ty))
    }
}
