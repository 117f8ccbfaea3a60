//! Recursive-descent construction of the AST from a fused token tree.
//!
//! Because [`protocore_lexer::lex`] has already matched every bracket
//! into a [`protocore_lexer::Tree`], this parser never hunts for a
//! closing brace itself — descending into a message body is just
//! recursing into that body's tree children with a fresh [`Cursor`].
//! Recovery is correspondingly simple: on an unexpected token, skip to
//! the next `;` (or the end of the current scope, which the lexer has
//! already bounded for us) and keep going.

use crate::any::{DeclAny, ExprAny, Path, TagAny, TypeAny};
use crate::arena_ctx::AstContext;
use crate::cursor::Cursor;
use crate::decl::*;
use crate::expr::{Expr, ExprKind};
use crate::ty::{ScalarType, TypeKind, TypeNode};
use protocore_base::{Diagnostic, FileId, Id, Interner, Name, Report, SourceMap, Span};
use protocore_lexer::{Leaf, TokenKind, TokenNode, TokenStream};

/// Everything produced by parsing one file: the populated arena context
/// and whatever diagnostics recovery along the way produced.
pub struct ParseOutput {
    pub ast: AstContext,
    pub report: Report,
}

/// Parses `stream` (already lexed from `file`, registered in `map`) into
/// an [`AstContext`]. `interner` is the session's shared string table —
/// every [`Name`] in the resulting AST was produced by it.
pub fn parse_file(map: &SourceMap, file: FileId, stream: &TokenStream, interner: &Interner) -> ParseOutput {
    let mut parser = Parser { map, file, stream, interner, ast: AstContext::new(), report: Report::new() };
    let eof = Span::new(file, map.get(file).len() as u32, map.get(file).len() as u32);
    let mut cursor = Cursor::new(stream.roots(), map, eof);
    parser.parse_top_level(&mut cursor);
    parser.report.sort_by_primary_span();
    ParseOutput { ast: parser.ast, report: parser.report }
}

struct Parser<'a> {
    map: &'a SourceMap,
    file: FileId,
    stream: &'a TokenStream,
    interner: &'a Interner,
    ast: AstContext,
    report: Report,
}

impl<'a> Parser<'a> {
    fn intern_leaf(&self, cursor: &Cursor<'a>, leaf: &Leaf) -> Name {
        self.interner.intern(cursor.text(leaf))
    }

    fn error(&mut self, span: Span, message: impl Into<String>) {
        self.report.push(Diagnostic::error(message).with_span(span));
    }

    /// Skips tokens in `cursor` up to and including the next `;`, or to
    /// the end of `cursor`'s scope if none is found. Returns the span of
    /// everything skipped, for a [`DeclAny::Corrupt`] node.
    fn synchronize(&mut self, cursor: &mut Cursor<'a>) -> Span {
        let start = cursor.here();
        let mut last = start;
        while !cursor.is_eof() {
            if cursor.eat_punct(";").is_some() {
                return start.merge(last);
            }
            if let Some(node) = cursor.bump() {
                last = node.span();
            }
        }
        start.merge(last)
    }

    // ---- top level -------------------------------------------------

    fn parse_top_level(&mut self, cursor: &mut Cursor<'a>) {
        while !cursor.is_eof() {
            if let Some(decl) = self.parse_top_level_decl(cursor) {
                match decl {
                    TopDecl::Syntax(id) => self.ast.file.syntax = Some(id),
                    TopDecl::Package(id) => self.ast.file.package = Some(id),
                    TopDecl::Import(id) => self.ast.file.imports.push(id),
                    TopDecl::Other(d) => self.ast.file.top_level.push(d),
                }
            }
        }
    }

    fn parse_top_level_decl(&mut self, cursor: &mut Cursor<'a>) -> Option<TopDecl> {
        if cursor.eat_punct(";").is_some() {
            return Some(TopDecl::Other(DeclAny::Empty(Id::of(self.ast.empties.alloc(EmptyDecl { span: cursor.here() })))));
        }
        if cursor.at_ident("syntax") {
            return self.parse_syntax(cursor, SyntaxKind::Proto2 /* placeholder, corrected inside */).map(TopDecl::Syntax);
        }
        if cursor.at_ident("edition") {
            return self.parse_edition(cursor).map(TopDecl::Syntax);
        }
        if cursor.at_ident("package") {
            return self.parse_package(cursor).map(TopDecl::Package);
        }
        if cursor.at_ident("import") {
            return self.parse_import(cursor).map(TopDecl::Import);
        }
        if cursor.at_ident("option") {
            return self.parse_option_stmt(cursor).map(|id| TopDecl::Other(DeclAny::Option(id)));
        }
        if cursor.at_ident("message") {
            return self.parse_message(cursor).map(|id| TopDecl::Other(DeclAny::Message(id)));
        }
        if cursor.at_ident("enum") {
            return self.parse_enum(cursor).map(|id| TopDecl::Other(DeclAny::Enum(id)));
        }
        if cursor.at_ident("service") {
            return self.parse_service(cursor).map(|id| TopDecl::Other(DeclAny::Service(id)));
        }
        if cursor.at_ident("extend") {
            return self.parse_extend(cursor).map(|id| TopDecl::Other(DeclAny::Extend(id)));
        }

        let span = cursor.here();
        self.error(span, "expected a top-level declaration (message, enum, service, extend, import, package, option, syntax/edition)");
        let corrupt_span = self.synchronize(cursor);
        Some(TopDecl::Other(DeclAny::Corrupt(corrupt_span)))
    }

    fn parse_syntax(&mut self, cursor: &mut Cursor<'a>, _placeholder: SyntaxKind) -> Option<Id<SyntaxDecl>> {
        let start = cursor.here();
        cursor.eat_ident("syntax");
        cursor.eat_punct("=");
        let kind_token = self.expect_string(cursor, "\"proto2\" or \"proto3\"")?;
        let text = self.string_value(kind_token);
        let kind = match text.as_str() {
            "proto2" => SyntaxKind::Proto2,
            "proto3" => SyntaxKind::Proto3,
            other => {
                self.error(cursor.here(), format!("unknown syntax {other:?}, expected \"proto2\" or \"proto3\""));
                SyntaxKind::Proto3
            }
        };
        cursor.eat_punct(";");
        let span = start.merge(cursor.here());
        Some(Id::of(self.ast.syntaxes.alloc(SyntaxDecl { kind, edition_token: None, span })))
    }

    fn parse_edition(&mut self, cursor: &mut Cursor<'a>) -> Option<Id<SyntaxDecl>> {
        let start = cursor.here();
        cursor.eat_ident("edition");
        cursor.eat_punct("=");
        let edition_token = self.expect_string(cursor, "an edition string, e.g. \"2023\"")?;
        cursor.eat_punct(";");
        let span = start.merge(cursor.here());
        Some(Id::of(self.ast.syntaxes.alloc(SyntaxDecl { kind: SyntaxKind::Edition, edition_token: Some(edition_token), span })))
    }

    fn parse_package(&mut self, cursor: &mut Cursor<'a>) -> Option<Id<PackageDecl>> {
        let start = cursor.here();
        cursor.eat_ident("package");
        let path = self.parse_path(cursor)?;
        cursor.eat_punct(";");
        let span = start.merge(cursor.here());
        Some(Id::of(self.ast.packages.alloc(PackageDecl { path, span })))
    }

    fn parse_import(&mut self, cursor: &mut Cursor<'a>) -> Option<Id<ImportDecl>> {
        let start = cursor.here();
        cursor.eat_ident("import");
        let kind = if cursor.eat_ident("public").is_some() {
            ImportKind::Public
        } else if cursor.eat_ident("weak").is_some() {
            ImportKind::Weak
        } else {
            ImportKind::Plain
        };
        let path_token = self.expect_string(cursor, "an import path string")?;
        cursor.eat_punct(";");
        let span = start.merge(cursor.here());
        Some(Id::of(self.ast.imports.alloc(ImportDecl { kind, path_token, span })))
    }

    // ---- message / enum / service -----------------------------------

    fn parse_message(&mut self, cursor: &mut Cursor<'a>) -> Option<Id<Message>> {
        let start = cursor.here();
        cursor.eat_ident("message");
        let name = self.expect_ident(cursor, "a message name")?;
        let mut body_cursor = self.expect_brace_body(cursor)?;
        let body = self.parse_message_body(&mut body_cursor);
        let span = start.merge(cursor.here());
        Some(Id::of(self.ast.messages.alloc(Message { name, body, span })))
    }

    fn parse_message_body(&mut self, cursor: &mut Cursor<'a>) -> Vec<DeclAny> {
        let mut decls = Vec::new();
        while !cursor.is_eof() {
            if cursor.eat_punct(";").is_some() {
                decls.push(DeclAny::Empty(Id::of(self.ast.empties.alloc(EmptyDecl { span: cursor.here() }))));
                continue;
            }
            if cursor.at_ident("message") {
                if let Some(id) = self.parse_message(cursor) {
                    decls.push(DeclAny::Message(id));
                }
                continue;
            }
            if cursor.at_ident("enum") {
                if let Some(id) = self.parse_enum(cursor) {
                    decls.push(DeclAny::Enum(id));
                }
                continue;
            }
            if cursor.at_ident("extend") {
                if let Some(id) = self.parse_extend(cursor) {
                    decls.push(DeclAny::Extend(id));
                }
                continue;
            }
            if cursor.at_ident("oneof") {
                if let Some(id) = self.parse_oneof(cursor) {
                    decls.push(DeclAny::Oneof(id));
                }
                continue;
            }
            if cursor.at_ident("option") {
                if let Some(id) = self.parse_option_stmt(cursor) {
                    decls.push(DeclAny::Option(id));
                }
                continue;
            }
            if cursor.at_ident("reserved") {
                if let Some(id) = self.parse_reserved(cursor) {
                    decls.push(DeclAny::Reserved(id));
                }
                continue;
            }
            if cursor.at_ident("extensions") {
                if let Some(id) = self.parse_extensions(cursor) {
                    decls.push(DeclAny::Extensions(id));
                }
                continue;
            }
            if self.at_field_start(cursor) {
                if let Some(decl) = self.parse_field_or_group(cursor) {
                    decls.push(decl);
                }
                continue;
            }
            let span = cursor.here();
            self.error(span, "expected a field, nested type, or body declaration inside a message");
            decls.push(DeclAny::Corrupt(self.synchronize(cursor)));
        }
        decls
    }

    fn parse_enum(&mut self, cursor: &mut Cursor<'a>) -> Option<Id<EnumDecl>> {
        let start = cursor.here();
        cursor.eat_ident("enum");
        let name = self.expect_ident(cursor, "an enum name")?;
        let mut body_cursor = self.expect_brace_body(cursor)?;
        let mut body = Vec::new();
        while !body_cursor.is_eof() {
            if body_cursor.eat_punct(";").is_some() {
                body.push(DeclAny::Empty(Id::of(self.ast.empties.alloc(EmptyDecl { span: body_cursor.here() }))));
                continue;
            }
            if body_cursor.at_ident("option") {
                if let Some(id) = self.parse_option_stmt(&mut body_cursor) {
                    body.push(DeclAny::Option(id));
                }
                continue;
            }
            if body_cursor.at_ident("reserved") {
                if let Some(id) = self.parse_reserved(&mut body_cursor) {
                    body.push(DeclAny::Reserved(id));
                }
                continue;
            }
            if let Some(id) = self.parse_enum_value(&mut body_cursor) {
                body.push(DeclAny::EnumValue(id));
                continue;
            }
            let span = body_cursor.here();
            self.error(span, "expected an enum value, option, or reserved declaration");
            body.push(DeclAny::Corrupt(self.synchronize(&mut body_cursor)));
        }
        let span = start.merge(cursor.here());
        Some(Id::of(self.ast.enums.alloc(EnumDecl { name, body, span })))
    }

    fn parse_enum_value(&mut self, cursor: &mut Cursor<'a>) -> Option<Id<EnumValueDecl>> {
        let start = cursor.here();
        let name_leaf = cursor.eat_any_ident()?;
        let name = self.intern_leaf(cursor, &name_leaf);
        if cursor.eat_punct("=").is_none() {
            self.error(cursor.here(), "expected '=' after enum value name");
            return Some(Id::of(self.ast.enum_values.alloc(EnumValueDecl {
                name,
                number: TagAny::NULL,
                options: Vec::new(),
                span: start.merge(cursor.here()),
            })));
        }
        let number = self.parse_tag_expr(cursor).unwrap_or(TagAny::NULL);
        let options = self.parse_trailing_options(cursor);
        cursor.eat_punct(";");
        let span = start.merge(cursor.here());
        Some(Id::of(self.ast.enum_values.alloc(EnumValueDecl { name, number, options, span })))
    }

    fn parse_service(&mut self, cursor: &mut Cursor<'a>) -> Option<Id<Service>> {
        let start = cursor.here();
        cursor.eat_ident("service");
        let name = self.expect_ident(cursor, "a service name")?;
        let mut body_cursor = self.expect_brace_body(cursor)?;
        let mut body = Vec::new();
        while !body_cursor.is_eof() {
            if body_cursor.eat_punct(";").is_some() {
                continue;
            }
            if body_cursor.at_ident("option") {
                if let Some(id) = self.parse_option_stmt(&mut body_cursor) {
                    body.push(DeclAny::Option(id));
                }
                continue;
            }
            if body_cursor.at_ident("rpc") {
                if let Some(id) = self.parse_method(&mut body_cursor) {
                    body.push(DeclAny::Method(id));
                }
                continue;
            }
            let span = body_cursor.here();
            self.error(span, "expected an rpc method or option declaration inside a service");
            body.push(DeclAny::Corrupt(self.synchronize(&mut body_cursor)));
        }
        let span = start.merge(cursor.here());
        Some(Id::of(self.ast.services.alloc(Service { name, body, span })))
    }

    fn parse_method(&mut self, cursor: &mut Cursor<'a>) -> Option<Id<Method>> {
        let start = cursor.here();
        cursor.eat_ident("rpc");
        let name = self.expect_ident(cursor, "a method name")?;
        let mut input_paren = self.expect_paren(cursor)?;
        let input_streaming = input_paren.eat_ident("stream").is_some();
        let input_type = self.parse_path(&mut input_paren).unwrap_or_default();
        if cursor.eat_ident("returns").is_none() {
            self.error(cursor.here(), "expected 'returns' after rpc input type");
        }
        let mut output_paren = self.expect_paren(cursor)?;
        let output_streaming = output_paren.eat_ident("stream").is_some();
        let output_type = self.parse_path(&mut output_paren).unwrap_or_default();

        let options = if let Some(mut body) = cursor.eat_tree("{") {
            let mut opts = Vec::new();
            while !body.is_eof() {
                if body.eat_punct(";").is_some() {
                    continue;
                }
                if body.at_ident("option") {
                    if let Some(entry) = self.parse_option_entry_stmt(&mut body) {
                        opts.push(entry);
                    }
                    continue;
                }
                self.error(body.here(), "expected an option declaration inside an rpc method body");
                self.synchronize(&mut body);
            }
            opts
        } else {
            cursor.eat_punct(";");
            Vec::new()
        };
        let span = start.merge(cursor.here());
        Some(Id::of(self.ast.methods.alloc(Method {
            name,
            input_type,
            input_streaming,
            output_type,
            output_streaming,
            options,
            span,
        })))
    }

    fn parse_oneof(&mut self, cursor: &mut Cursor<'a>) -> Option<Id<Oneof>> {
        let start = cursor.here();
        cursor.eat_ident("oneof");
        let name = self.expect_ident(cursor, "a oneof name")?;
        let mut body_cursor = self.expect_brace_body(cursor)?;
        let mut body = Vec::new();
        while !body_cursor.is_eof() {
            if body_cursor.eat_punct(";").is_some() {
                continue;
            }
            if body_cursor.at_ident("option") {
                if let Some(id) = self.parse_option_stmt(&mut body_cursor) {
                    body.push(DeclAny::Option(id));
                }
                continue;
            }
            if self.at_field_start(&body_cursor) {
                if let Some(decl) = self.parse_field_or_group(&mut body_cursor) {
                    body.push(decl);
                }
                continue;
            }
            let span = body_cursor.here();
            self.error(span, "expected a field or option declaration inside a oneof");
            body.push(DeclAny::Corrupt(self.synchronize(&mut body_cursor)));
        }
        let span = start.merge(cursor.here());
        Some(Id::of(self.ast.oneofs.alloc(Oneof { name, body, span })))
    }

    fn parse_extend(&mut self, cursor: &mut Cursor<'a>) -> Option<Id<Extend>> {
        let start = cursor.here();
        cursor.eat_ident("extend");
        let extendee = self.parse_path(cursor)?;
        let mut body_cursor = self.expect_brace_body(cursor)?;
        let mut body = Vec::new();
        while !body_cursor.is_eof() {
            if body_cursor.eat_punct(";").is_some() {
                continue;
            }
            if self.at_field_start(&body_cursor) {
                if let Some(decl) = self.parse_field_or_group(&mut body_cursor) {
                    body.push(decl);
                }
                continue;
            }
            let span = body_cursor.here();
            self.error(span, "expected an extension field inside an extend block");
            body.push(DeclAny::Corrupt(self.synchronize(&mut body_cursor)));
        }
        let span = start.merge(cursor.here());
        Some(Id::of(self.ast.extends.alloc(Extend { extendee, body, span })))
    }

    // ---- fields / groups --------------------------------------------

    /// A field/group declaration may start with a label (`optional`,
    /// `required`, `repeated`), with `map<` sugar, with the `group`
    /// keyword, or directly with a type name — anything that isn't one
    /// of the other body keywords is plausibly a field, so recovery
    /// falls through to the generic "expected a declaration" error if
    /// this heuristic and the real parse both fail.
    fn at_field_start(&self, cursor: &Cursor<'a>) -> bool {
        !cursor.is_eof()
            && !cursor.at_ident("message")
            && !cursor.at_ident("enum")
            && !cursor.at_ident("extend")
            && !cursor.at_ident("oneof")
            && !cursor.at_ident("option")
            && !cursor.at_ident("reserved")
            && !cursor.at_ident("extensions")
            && !cursor.at_punct(";")
            && matches!(cursor.peek(), Some(TokenNode::Leaf(l)) if l.kind == TokenKind::Identifier)
    }

    fn parse_field_or_group(&mut self, cursor: &mut Cursor<'a>) -> Option<DeclAny> {
        let start = cursor.here();
        let label = if cursor.eat_ident("optional").is_some() {
            FieldLabel::Optional
        } else if cursor.eat_ident("required").is_some() {
            FieldLabel::Required
        } else if cursor.eat_ident("repeated").is_some() {
            FieldLabel::Repeated
        } else {
            FieldLabel::None
        };

        if cursor.at_ident("group") {
            cursor.eat_ident("group");
            let name = self.expect_ident(cursor, "a group name")?;
            cursor.eat_punct("=");
            let number = self.parse_tag_expr(cursor).unwrap_or(TagAny::NULL);
            let options = self.parse_trailing_options(cursor);
            let mut body_cursor = self.expect_brace_body(cursor)?;
            let body = self.parse_message_body(&mut body_cursor);
            let span = start.merge(cursor.here());
            return Some(DeclAny::Group(Id::of(self.ast.groups.alloc(Group { label, name, number, options, body, span }))));
        }

        let ty = self.parse_type(cursor)?;
        let name = self.expect_ident(cursor, "a field name")?;
        if cursor.eat_punct("=").is_none() {
            self.error(cursor.here(), "expected '=' after field name");
        }
        let number = self.parse_tag_expr(cursor).unwrap_or(TagAny::NULL);
        let options = self.parse_trailing_options(cursor);
        cursor.eat_punct(";");
        let span = start.merge(cursor.here());
        Some(DeclAny::Field(Id::of(self.ast.fields.alloc(Field { label, ty, name, number, options, span }))))
    }

    /// `[opt = val, ...]` immediately after a field/enum-value/extensions
    /// declaration's number, if present.
    fn parse_trailing_options(&mut self, cursor: &mut Cursor<'a>) -> Vec<OptionEntry> {
        if let Some(mut inner) = cursor.eat_tree("[") {
            self.parse_option_entries(&mut inner, ",")
        } else {
            Vec::new()
        }
    }

    fn parse_option_entries(&mut self, cursor: &mut Cursor<'a>, separator: &str) -> Vec<OptionEntry> {
        let mut entries = Vec::new();
        while !cursor.is_eof() {
            let start = cursor.here();
            let Some(path) = self.parse_option_name(cursor) else {
                self.error(cursor.here(), "expected an option name");
                self.synchronize(cursor);
                continue;
            };
            if cursor.eat_punct("=").is_none() {
                self.error(cursor.here(), "expected '=' after option name");
            }
            let value = self.parse_expr(cursor).unwrap_or_else(|| self.ast.alloc_expr(Expr { kind: ExprKind::Bool(false), span: cursor.here() }));
            let span = start.merge(cursor.here());
            entries.push(OptionEntry { path, value, span });
            if cursor.eat_punct(separator).is_none() {
                break;
            }
        }
        entries
    }

    /// An option statement's or option entry's name: a dotted path where
    /// any segment may be parenthesized (an extension name), e.g.
    /// `(pb.cpp).string_type` or `features.field_presence`.
    fn parse_option_name(&mut self, cursor: &mut Cursor<'a>) -> Option<Path> {
        let mut segments = Vec::new();
        let leading_dot = cursor.eat_punct(".").is_some();
        loop {
            if let Some(mut inner) = cursor.eat_tree("(") {
                let inner_path = self.parse_path(&mut inner)?;
                let joined = self.join_path(&inner_path);
                segments.push(self.interner.intern(&format!("({joined})")));
            } else {
                let leaf = cursor.eat_any_ident()?;
                segments.push(self.intern_leaf(cursor, &leaf));
            }
            if cursor.eat_punct(".").is_none() {
                break;
            }
        }
        Some(Path { leading_dot, segments })
    }

    fn join_path(&self, path: &Path) -> String {
        let parts: Vec<String> = path.segments.iter().map(|n| self.interner.resolve(*n)).collect();
        format!("{}{}", if path.leading_dot { "." } else { "" }, parts.join("."))
    }

    // ---- option statement --------------------------------------------

    fn parse_option_stmt(&mut self, cursor: &mut Cursor<'a>) -> Option<Id<OptionDecl>> {
        let start = cursor.here();
        cursor.eat_ident("option");
        let path = self.parse_option_name(cursor)?;
        if cursor.eat_punct("=").is_none() {
            self.error(cursor.here(), "expected '=' after option name");
        }
        let value = self.parse_expr(cursor)?;
        cursor.eat_punct(";");
        let span = start.merge(cursor.here());
        Some(Id::of(self.ast.options.alloc(OptionDecl { path, value, span })))
    }

    /// Like [`Self::parse_option_stmt`] but returns the `(path, value)`
    /// pair directly for contexts (rpc method options) that store it
    /// inline rather than as a `DeclAny::Option`.
    fn parse_option_entry_stmt(&mut self, cursor: &mut Cursor<'a>) -> Option<OptionEntry> {
        let id = self.parse_option_stmt(cursor)?;
        let decl = &self.ast.options[id];
        Some(OptionEntry { path: decl.path.clone(), value: decl.value, span: decl.span })
    }

    // ---- reserved / extensions ----------------------------------------

    fn parse_reserved(&mut self, cursor: &mut Cursor<'a>) -> Option<Id<ReservedDecl>> {
        let start = cursor.here();
        cursor.eat_ident("reserved");
        let mut items = Vec::new();
        loop {
            if matches!(cursor.peek(), Some(TokenNode::Leaf(l)) if l.kind == TokenKind::String) {
                let leaf = cursor.eat_any_string()?;
                items.push(ReservedItem::Name(leaf.id));
            } else {
                let first = self.parse_tag_expr(cursor)?;
                let end = if cursor.eat_ident("to").is_some() {
                    if cursor.eat_ident("max").is_some() {
                        Some(self.ast.alloc_expr(Expr { kind: ExprKind::Max, span: cursor.here() }))
                    } else {
                        self.parse_tag_expr(cursor)
                    }
                } else {
                    None
                };
                items.push(ReservedItem::Range { start: first, end });
            }
            if cursor.eat_punct(",").is_none() {
                break;
            }
        }
        cursor.eat_punct(";");
        let span = start.merge(cursor.here());
        Some(Id::of(self.ast.reserveds.alloc(ReservedDecl { items, span })))
    }

    fn parse_extensions(&mut self, cursor: &mut Cursor<'a>) -> Option<Id<ExtensionsDecl>> {
        let start = cursor.here();
        cursor.eat_ident("extensions");
        let mut ranges = Vec::new();
        loop {
            let first = self.parse_tag_expr(cursor)?;
            let end = if cursor.eat_ident("to").is_some() {
                if cursor.eat_ident("max").is_some() {
                    Some(self.ast.alloc_expr(Expr { kind: ExprKind::Max, span: cursor.here() }))
                } else {
                    self.parse_tag_expr(cursor)
                }
            } else {
                None
            };
            ranges.push((first, end));
            if cursor.eat_punct(",").is_none() {
                break;
            }
        }
        let options = self.parse_trailing_options(cursor);
        cursor.eat_punct(";");
        let span = start.merge(cursor.here());
        Some(Id::of(self.ast.extensions.alloc(ExtensionsDecl { ranges, options, span })))
    }

    // ---- types ----------------------------------------------------------

    fn parse_type(&mut self, cursor: &mut Cursor<'a>) -> Option<TypeAny> {
        let start = cursor.here();
        if cursor.at_ident("map") {
            let is_map = matches!(cursor.peek2(), Some(TokenNode::Tree(t)) if cursor.text(&t.open) == "<");
            if is_map {
                cursor.eat_ident("map");
                let mut inner = cursor.eat_tree("<")?;
                let key_leaf = inner.eat_any_ident()?;
                let key = ScalarType::from_keyword(inner.text(&key_leaf)).unwrap_or_else(|| {
                    self.error(key_leaf.span, "map key must be an integral or string scalar type");
                    ScalarType::Int32
                });
                inner.eat_punct(",");
                let value_id = self.parse_type(&mut inner)?;
                let value = Box::new(self.ast.types[value_id].clone());
                let span = start.merge(cursor.here());
                return Some(self.ast.alloc_type(TypeNode { kind: TypeKind::Map { key, value }, span }));
            }
        }

        let path = self.parse_path(cursor)?;
        let span = start.merge(cursor.here());
        if !path.leading_dot && path.segments.len() == 1 {
            let text = self.interner.resolve(path.segments[0]);
            if let Some(scalar) = ScalarType::from_keyword(&text) {
                return Some(self.ast.alloc_type(TypeNode { kind: TypeKind::Scalar(scalar), span }));
            }
        }
        Some(self.ast.alloc_type(TypeNode { kind: TypeKind::Named(path), span }))
    }

    fn parse_path(&mut self, cursor: &mut Cursor<'a>) -> Option<Path> {
        let leading_dot = cursor.eat_punct(".").is_some();
        let mut segments = Vec::new();
        let first = cursor.eat_any_ident()?;
        segments.push(self.intern_leaf(cursor, &first));
        while cursor.eat_punct(".").is_some() {
            let leaf = cursor.eat_any_ident()?;
            segments.push(self.intern_leaf(cursor, &leaf));
        }
        Some(Path { leading_dot, segments })
    }

    // ---- constant expression grammar -----------------------------------

    /// Field numbers, range bounds, and enum value numbers all share
    /// this production.
    fn parse_tag_expr(&mut self, cursor: &mut Cursor<'a>) -> Option<TagAny> {
        self.parse_expr(cursor)
    }

    fn parse_expr(&mut self, cursor: &mut Cursor<'a>) -> Option<ExprAny> {
        let start = cursor.here();
        if cursor.eat_punct("-").is_some() {
            let inner = self.parse_expr(cursor)?;
            let span = start.merge(cursor.here());
            return Some(self.ast.alloc_expr(Expr { kind: ExprKind::Negative(inner), span }));
        }
        if cursor.eat_ident("max").is_some() {
            return Some(self.ast.alloc_expr(Expr { kind: ExprKind::Max, span: start.merge(cursor.here()) }));
        }
        if cursor.eat_ident("true").is_some() {
            return Some(self.ast.alloc_expr(Expr { kind: ExprKind::Bool(true), span: start.merge(cursor.here()) }));
        }
        if cursor.eat_ident("false").is_some() {
            return Some(self.ast.alloc_expr(Expr { kind: ExprKind::Bool(false), span: start.merge(cursor.here()) }));
        }
        match cursor.peek() {
            Some(TokenNode::Leaf(leaf)) if leaf.kind == TokenKind::Number => {
                let leaf = *leaf;
                cursor.bump();
                let is_float = self.stream.metadata(leaf.id).map(|m| m.is_float).unwrap_or(false);
                let kind = if is_float { ExprKind::Float { token: leaf.id } } else { ExprKind::Int { token: leaf.id } };
                Some(self.ast.alloc_expr(Expr { kind, span: leaf.span }))
            }
            Some(TokenNode::Leaf(leaf)) if leaf.kind == TokenKind::String => {
                let leaf = *leaf;
                cursor.bump();
                Some(self.ast.alloc_expr(Expr { kind: ExprKind::Str { token: leaf.id }, span: leaf.span }))
            }
            Some(TokenNode::Leaf(leaf)) if leaf.kind == TokenKind::Identifier => {
                let path = self.parse_path(cursor)?;
                let span = start.merge(cursor.here());
                let _ = leaf;
                Some(self.ast.alloc_expr(Expr { kind: ExprKind::Path(path), span }))
            }
            Some(TokenNode::Tree(tree)) if cursor.text(&tree.open) == "{" => {
                let mut inner = cursor.eat_tree("{")?;
                let fields = self.parse_message_literal_fields(&mut inner);
                Some(self.ast.alloc_expr(Expr { kind: ExprKind::MessageLiteral(fields), span: start.merge(cursor.here()) }))
            }
            Some(TokenNode::Tree(tree)) if cursor.text(&tree.open) == "[" => {
                let mut inner = cursor.eat_tree("[")?;
                let mut items = Vec::new();
                while !inner.is_eof() {
                    if let Some(expr) = self.parse_expr(&mut inner) {
                        items.push(expr);
                    }
                    if inner.eat_punct(",").is_none() {
                        break;
                    }
                }
                Some(self.ast.alloc_expr(Expr { kind: ExprKind::Array(items), span: start.merge(cursor.here()) }))
            }
            _ => {
                self.error(cursor.here(), "expected a constant: a number, string, bool, identifier, '{...}', or '[...]'");
                None
            }
        }
    }

    fn parse_message_literal_fields(&mut self, cursor: &mut Cursor<'a>) -> Vec<(Name, ExprAny)> {
        let mut fields = Vec::new();
        while !cursor.is_eof() {
            let key_path = self.parse_option_name(cursor);
            let Some(key_path) = key_path else {
                self.error(cursor.here(), "expected a message literal field name");
                self.synchronize(cursor);
                continue;
            };
            let key = key_path.segments.last().copied().unwrap_or_default();
            cursor.eat_punct(":");
            if let Some(value) = self.parse_expr(cursor) {
                fields.push((key, value));
            }
            let _ = cursor.eat_punct(",").is_some() || cursor.eat_punct(";").is_some();
        }
        fields
    }

    // ---- small expectation helpers -------------------------------------

    fn expect_ident(&mut self, cursor: &mut Cursor<'a>, what: &str) -> Option<Name> {
        match cursor.eat_any_ident() {
            Some(leaf) => Some(self.intern_leaf(cursor, &leaf)),
            None => {
                self.error(cursor.here(), format!("expected {what}"));
                None
            }
        }
    }

    fn expect_string(&mut self, cursor: &mut Cursor<'a>, what: &str) -> Option<protocore_lexer::TokenId> {
        match cursor.eat_any_string() {
            Some(leaf) => Some(leaf.id),
            None => {
                self.error(cursor.here(), format!("expected {what}"));
                None
            }
        }
    }

    fn expect_brace_body(&mut self, cursor: &mut Cursor<'a>) -> Option<Cursor<'a>> {
        match cursor.eat_tree("{") {
            Some(c) => Some(c),
            None => {
                self.error(cursor.here(), "expected '{'");
                None
            }
        }
    }

    fn expect_paren(&mut self, cursor: &mut Cursor<'a>) -> Option<Cursor<'a>> {
        match cursor.eat_tree("(") {
            Some(c) => Some(c),
            None => {
                self.error(cursor.here(), "expected '('");
                None
            }
        }
    }

    fn string_value(&self, token: protocore_lexer::TokenId) -> String {
        self.stream.metadata(token).and_then(|m| m.string_value.clone()).unwrap_or_default()
    }
}

enum TopDecl {
    Syntax(Id<SyntaxDecl>),
    Package(Id<PackageDecl>),
    Import(Id<ImportDecl>),
    Other(DeclAny),
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocore_lexer::{lex, LexerConfig};

    fn parse(text: &str) -> (AstContext, Report, Interner, SourceMap, FileId) {
        let interner = Interner::new();
        let mut map = SourceMap::new();
        let file = map.add(protocore_base::SourceFile::new("t.proto", text));
        let (stream, lex_report) = lex(&map, file, &LexerConfig::protobuf());
        assert!(lex_report.is_empty(), "unexpected lex errors: {lex_report:?}");
        let output = parse_file(&map, file, &stream, &interner);
        (output.ast, output.report, interner, map, file)
    }

    #[test]
    fn parses_syntax_and_package() {
        let (ast, report, interner, _map, _file) = parse(r#"syntax = "proto3"; package foo.bar;"#);
        assert!(report.is_empty(), "{report:?}");
        let syntax = &ast.syntaxes[ast.file.syntax.unwrap()];
        assert_eq!(syntax.kind, SyntaxKind::Proto3);
        let package = &ast.packages[ast.file.package.unwrap()];
        assert_eq!(interner.resolve(package.path.segments[0]), "foo");
        assert_eq!(interner.resolve(package.path.segments[1]), "bar");
    }

    #[test]
    fn parses_simple_message_with_field() {
        let (ast, report, interner, _map, _file) = parse("message M { int32 x = 1; }");
        assert!(report.is_empty(), "{report:?}");
        assert_eq!(ast.file.top_level.len(), 1);
        let DeclAny::Message(id) = ast.file.top_level[0] else { panic!("expected message") };
        let message = &ast.messages[id];
        assert_eq!(interner.resolve(message.name), "M");
        assert_eq!(message.body.len(), 1);
        let DeclAny::Field(field_id) = message.body[0] else { panic!("expected field") };
        let field = &ast.fields[field_id];
        assert_eq!(interner.resolve(field.name), "x");
        assert!(matches!(ast.types[field.ty].kind, TypeKind::Scalar(ScalarType::Int32)));
    }

    #[test]
    fn parses_field_with_bracketed_options() {
        let (ast, report, interner, _map, _file) = parse("message M { repeated int32 x = 1 [packed = true, json_name = \"xx\"]; }");
        assert!(report.is_empty(), "{report:?}");
        let DeclAny::Message(id) = ast.file.top_level[0] else { panic!() };
        let DeclAny::Field(field_id) = ast.messages[id].body[0] else { panic!() };
        let field = &ast.fields[field_id];
        assert_eq!(field.label, FieldLabel::Repeated);
        assert_eq!(field.options.len(), 2);
        assert_eq!(interner.resolve(field.options[0].path.segments[0]), "packed");
    }

    #[test]
    fn parses_map_field_type() {
        let (ast, report, _interner, _map, _file) = parse("message M { map<string, int32> counts = 1; }");
        assert!(report.is_empty(), "{report:?}");
        let DeclAny::Message(id) = ast.file.top_level[0] else { panic!() };
        let DeclAny::Field(field_id) = ast.messages[id].body[0] else { panic!() };
        let field = &ast.fields[field_id];
        match &ast.types[field.ty].kind {
            TypeKind::Map { key, value } => {
                assert_eq!(*key, ScalarType::String);
                assert!(matches!(value.kind, TypeKind::Scalar(ScalarType::Int32)));
            }
            other => panic!("expected map type, got {other:?}"),
        }
    }

    #[test]
    fn parses_oneof_with_two_fields() {
        let (ast, report, _interner, _map, _file) = parse("message M { oneof kind { int32 a = 1; string b = 2; } }");
        assert!(report.is_empty(), "{report:?}");
        let DeclAny::Message(id) = ast.file.top_level[0] else { panic!() };
        let DeclAny::Oneof(oneof_id) = ast.messages[id].body[0] else { panic!() };
        assert_eq!(ast.oneofs[oneof_id].body.len(), 2);
    }

    #[test]
    fn parses_enum_with_reserved() {
        let (ast, report, interner, _map, _file) = parse("enum E { reserved 2, 3; A = 0; B = 1; }");
        assert!(report.is_empty(), "{report:?}");
        let DeclAny::Enum(id) = ast.file.top_level[0] else { panic!() };
        let e = &ast.enums[id];
        assert_eq!(e.body.len(), 3);
        let DeclAny::EnumValue(v0) = e.body[1] else { panic!() };
        assert_eq!(interner.resolve(ast.enum_values[v0].name), "A");
    }

    #[test]
    fn parses_extensions_and_extend() {
        let (ast, report, _interner, _map, _file) =
            parse("message M { extensions 100 to 199; } extend M { optional int32 ext = 100; }");
        assert!(report.is_empty(), "{report:?}");
        let DeclAny::Message(id) = ast.file.top_level[0] else { panic!() };
        let DeclAny::Extensions(ext_id) = ast.messages[id].body[0] else { panic!() };
        assert_eq!(ast.extensions[ext_id].ranges.len(), 1);
        let DeclAny::Extend(extend_id) = ast.file.top_level[1] else { panic!() };
        assert_eq!(ast.extends[extend_id].body.len(), 1);
    }

    #[test]
    fn parses_service_with_streaming_rpc() {
        let (ast, report, interner, _map, _file) =
            parse("service S { rpc Do(stream ReqT) returns (RespT); }");
        assert!(report.is_empty(), "{report:?}");
        let DeclAny::Service(id) = ast.file.top_level[0] else { panic!() };
        let DeclAny::Method(method_id) = ast.services[id].body[0] else { panic!() };
        let method = &ast.methods[method_id];
        assert!(method.input_streaming);
        assert!(!method.output_streaming);
        assert_eq!(interner.resolve(method.input_type.segments[0]), "ReqT");
    }

    #[test]
    fn recovers_from_unexpected_top_level_token() {
        let (ast, report, _interner, _map, _file) = parse("message M {} ???; message N {}");
        assert!(report.iter().any(|d| d.severity == protocore_base::Severity::Error));
        // Both the well-formed messages before and after the garbage are
        // still recovered.
        let message_count = ast.file.top_level.iter().filter(|d| matches!(d, DeclAny::Message(_))).count();
        assert_eq!(message_count, 2);
    }

    #[test]
    fn parses_extension_option_name() {
        let (ast, report, _interner, _map, _file) =
            parse("message M { int32 x = 1 [(my.custom_option) = 5]; }");
        assert!(report.is_empty(), "{report:?}");
        let DeclAny::Message(id) = ast.file.top_level[0] else { panic!() };
        let DeclAny::Field(field_id) = ast.messages[id].body[0] else { panic!() };
        assert_eq!(ast.fields[field_id].options.len(), 1);
    }

    #[test]
    fn parses_negative_default_value_option() {
        let (ast, report, _interner, _map, _file) = parse("message M { int32 x = 1 [default = -5]; }");
        assert!(report.is_empty(), "{report:?}");
        let DeclAny::Message(id) = ast.file.top_level[0] else { panic!() };
        let DeclAny::Field(field_id) = ast.messages[id].body[0] else { panic!() };
        let opt = &ast.fields[field_id].options[0];
        assert!(matches!(ast.exprs[opt.value].kind, ExprKind::Negative(_)));
    }
}
