//! The AST → IR walker.
//!
//! Runs in two passes over one file's AST, the usual declare/define
//! split for a language with forward references (a field may name a
//! message declared later in the same file):
//!
//! 1. **Declare**: a DFS over every `Message`/`EnumDecl` (nested ones
//!    included) allocates an IR `Type` stub — name, full name, parent —
//!    and registers it in the [`SymbolTable`], before any field is
//!    looked at. This is what lets `message A { B b = 1; } message B {}`
//!    resolve.
//! 2. **Define**: a second DFS fills in each `Type`'s members, oneofs,
//!    reserved/extension ranges, and nested-type list, resolving every
//!    field's type reference against the now-complete symbol table.
//!
//! Top-level types are pushed onto `File.types` first, in source order,
//! so `top_level_count` marks a contiguous prefix; nested
//! types are appended as the define pass discovers them.

use protocore_ast::{
    AstContext, DeclAny, Field, FieldLabel as AstFieldLabel, Group, Message, OptionEntry, Path,
    TypeKind, TypeNode,
};
use protocore_base::{Diagnostic, Id, Interner, Name, Report, SourceMap};
use protocore_lexer::TokenStream;
use rustc_hash::FxHashMap;

use crate::model::{
    Edition, Extend as IrExtend, ExtensionRange, ExtensionDeclaration, FieldType, File, IrArena,
    Member, Method, Oneof as IrOneof, Presence, ReservedName, ReservedRange, Service, Type,
};
use crate::symbols::{resolve_scoped, Symbol, SymbolTable};

/// Maps an AST message/enum node to the `Type` stub allocated for it in
/// the declare pass, so the define pass can find it again without
/// re-walking from the root.
#[derive(Default)]
struct StubMap {
    messages: FxHashMap<Id<Message>, Id<Type>>,
    enums: FxHashMap<Id<protocore_ast::EnumDecl>, Id<Type>>,
}

struct Walker<'a> {
    ast: &'a AstContext,
    interner: &'a Interner,
    map: &'a SourceMap,
    stream: &'a TokenStream,
    arena: &'a mut IrArena,
    symbols: &'a mut SymbolTable,
    stubs: StubMap,
    report: Report,
    package: Name,
    edition: Edition,
    /// Running tally of types discovered so far, in the order they'll
    /// land in `File.types`.
    types_in_order: Vec<Id<Type>>,
}

/// Lowers one parsed file's `AstContext` into IR. `package` is the
/// already-resolved dotted package name (or `Name::EMPTY`); `edition`
/// is the file's resolved edition. `map`/`stream` back the literal text
/// (numeric tokens) and unescaped string metadata (reserved-name
/// tokens) that the AST itself only references by id.
#[allow(clippy::too_many_arguments)]
pub fn walk_file(
    ast: &AstContext,
    interner: &Interner,
    map: &SourceMap,
    stream: &TokenStream,
    arena: &mut IrArena,
    symbols: &mut SymbolTable,
    package: Name,
    edition: Edition,
    syntax_is_proto2: bool,
) -> (File, Report) {
    let mut walker = Walker {
        ast,
        interner,
        map,
        stream,
        arena,
        symbols,
        stubs: StubMap::default(),
        report: Report::new(),
        package,
        edition,
        types_in_order: Vec::new(),
    };

    let top_level_decls = &ast.file.top_level;

    // Pass 1: declare every top-level and nested message/enum.
    for decl in top_level_decls {
        walker.declare_decl(*decl, package);
    }

    let top_level_count = walker.types_in_order.len();

    // Pass 2: define members for every top-level type (which recurses
    // into nested types, appending them to `types_in_order` as found).
    let mut extends = Vec::new();
    let mut services = Vec::new();
    let mut file_options = Vec::new();
    for decl in top_level_decls {
        walker.define_decl(*decl, package, &mut extends, &mut services, &mut file_options);
    }

    let file = File {
        path: String::new(),
        package: if package == Name::EMPTY { None } else { Some(package) },
        edition: Some(edition),
        syntax_is_proto2,
        imports: Vec::new(),
        types: walker.types_in_order,
        top_level_count,
        extends,
        services,
        options: file_options,
    };

    (file, walker.report)
}

fn join_scope(interner: &Interner, scope: Name, name: Name) -> Name {
    let scope_text = interner.resolve(scope);
    let name_text = interner.resolve(name);
    if scope_text.is_empty() {
        interner.intern(&name_text)
    } else {
        interner.intern(&format!("{scope_text}.{name_text}"))
    }
}

impl<'a> Walker<'a> {
    fn declare_decl(&mut self, decl: DeclAny, scope: Name) {
        match decl {
            DeclAny::Message(id) => self.declare_message(id, scope),
            DeclAny::Enum(id) => self.declare_enum(id, scope),
            _ => {}
        }
    }

    fn declare_message(&mut self, id: Id<Message>, scope: Name) {
        let msg = &self.ast.messages[id];
        let full_name = join_scope(self.interner, scope, msg.name);
        let stub = self.arena.alloc_type(Type {
            name: msg.name,
            full_name,
            is_enum: false,
            parent: None,
            members: Vec::new(),
            oneofs: Vec::new(),
            nested: Vec::new(),
            reserved_ranges: Vec::new(),
            reserved_names: Vec::new(),
            extension_ranges: Vec::new(),
            extension_declarations: Vec::new(),
            map_entry: false,
            map_field: None,
            message_set_wire_format: false,
            options: Vec::new(),
            ast: Some(msg.span),
        });
        self.stubs.messages.insert(id, stub);
        self.symbols.insert(scope, full_name, Symbol::Type(stub));
        self.types_in_order.push(stub);

        for body_decl in &msg.body {
            self.declare_decl(*body_decl, full_name);
        }
    }

    fn declare_enum(&mut self, id: Id<protocore_ast::EnumDecl>, scope: Name) {
        let e = &self.ast.enums[id];
        let full_name = join_scope(self.interner, scope, e.name);
        let stub = self.arena.alloc_type(Type {
            name: e.name,
            full_name,
            is_enum: true,
            parent: None,
            members: Vec::new(),
            oneofs: Vec::new(),
            nested: Vec::new(),
            reserved_ranges: Vec::new(),
            reserved_names: Vec::new(),
            extension_ranges: Vec::new(),
            extension_declarations: Vec::new(),
            map_entry: false,
            map_field: None,
            message_set_wire_format: false,
            options: Vec::new(),
            ast: Some(e.span),
        });
        self.stubs.enums.insert(id, stub);
        self.symbols.insert(scope, full_name, Symbol::Type(stub));
        self.types_in_order.push(stub);
        // Enum value names are registered during `define_enum`, once
        // their numbers are known, into the *enclosing* scope — an enum
        // value's name is visible alongside its enum's siblings, not
        // nested inside the enum.
    }

    fn define_decl(&mut self, decl: DeclAny, scope: Name, extends: &mut Vec<Id<IrExtend>>, services: &mut Vec<Id<Service>>, file_options: &mut Vec<OptionEntry>) {
        match decl {
            DeclAny::Message(id) => self.define_message(id, scope),
            DeclAny::Enum(id) => self.define_enum(id, scope),
            DeclAny::Extend(id) => {
                if let Some(extend) = self.define_extend(id, scope) {
                    extends.push(extend);
                }
            }
            DeclAny::Service(id) => services.push(self.define_service(id, scope)),
            DeclAny::Option(id) => {
                let opt = &self.ast.options[id];
                file_options.push(OptionEntry { path: opt.path.clone(), value: opt.value, span: opt.span });
            }
            _ => {}
        }
    }

    fn define_message(&mut self, id: Id<Message>, scope: Name) {
        let stub = *self.stubs.messages.get(&id).expect("message must have been declared");
        let msg = &self.ast.messages[id];
        let full_name = self.arena.types.get(stub.to_ptr().unwrap()).full_name;

        let mut members = Vec::new();
        let mut oneofs = Vec::new();
        let mut nested = Vec::new();
        let mut reserved_ranges = Vec::new();
        let mut reserved_names = Vec::new();
        let mut extension_ranges = Vec::new();
        let mut extension_declarations = Vec::new();
        let mut options = Vec::new();
        let mut message_set_wire_format = false;

        for body_decl in &msg.body {
            match *body_decl {
                DeclAny::Field(field_id) => {
                    let (member, entry_type) = self.define_field(field_id, stub, full_name);
                    members.push(member);
                    if let Some(entry_type) = entry_type {
                        nested.push(entry_type);
                    }
                }
                DeclAny::Group(group_id) => {
                    let (member, nested_type) = self.define_group(group_id, stub, full_name);
                    members.push(member);
                    nested.push(nested_type);
                }
                DeclAny::Oneof(oneof_id) => {
                    oneofs.push(self.define_oneof(oneof_id, stub, &mut members, &mut nested));
                }
                DeclAny::Message(nested_id) => {
                    nested.push(*self.stubs.messages.get(&nested_id).unwrap());
                    self.define_message(nested_id, full_name);
                }
                DeclAny::Enum(nested_id) => {
                    nested.push(*self.stubs.enums.get(&nested_id).unwrap());
                    self.define_enum(nested_id, full_name);
                }
                DeclAny::Reserved(reserved_id) => {
                    let decl = &self.ast.reserveds[reserved_id];
                    for item in &decl.items {
                        match item {
                            protocore_ast::ReservedItem::Range { start, end } => {
                                if let Some(range) = self.evaluate_range(*start, *end) {
                                    reserved_ranges.push(range);
                                }
                            }
                            protocore_ast::ReservedItem::Name(token) => {
                                reserved_names.push(ReservedName { name: self.name_from_string_token(*token), ast: decl.span });
                            }
                        }
                    }
                }
                DeclAny::Extensions(ext_id) => {
                    let decl = &self.ast.extensions[ext_id];
                    for (start, end) in &decl.ranges {
                        if let Some(range) = self.evaluate_range(*start, *end) {
                            extension_ranges.push(ExtensionRange { start: range.start, end: range.end });
                        }
                    }
                    options.extend(decl.options.iter().cloned());
                }
                DeclAny::Option(opt_id) => {
                    let opt = &self.ast.options[opt_id];
                    if self.is_message_set_option(&opt.path) {
                        message_set_wire_format = true;
                    }
                    options.push(OptionEntry { path: opt.path.clone(), value: opt.value, span: opt.span });
                }
                DeclAny::Extend(_) | DeclAny::Empty(_) | DeclAny::Corrupt(_) | DeclAny::Service(_) | DeclAny::Method(_) | DeclAny::Package(_) | DeclAny::Import(_) | DeclAny::Syntax(_) | DeclAny::EnumValue(_) => {}
            }
        }

        let type_mut = self.arena.types.get_mut(stub.to_ptr().unwrap());
        type_mut.members = members;
        type_mut.oneofs = oneofs;
        type_mut.nested = nested;
        type_mut.reserved_ranges = reserved_ranges;
        type_mut.reserved_names = reserved_names;
        type_mut.extension_ranges = extension_ranges;
        type_mut.extension_declarations = extension_declarations;
        type_mut.options = options;
        type_mut.message_set_wire_format = message_set_wire_format;
    }

    fn is_message_set_option(&self, path: &Path) -> bool {
        path.segments.len() == 1 && self.interner.resolve(path.segments[0]) == "message_set_wire_format"
    }

    fn define_enum(&mut self, id: Id<protocore_ast::EnumDecl>, scope: Name) {
        let stub = *self.stubs.enums.get(&id).expect("enum must have been declared");
        let e = &self.ast.enums[id];
        let full_name = self.arena.types.get(stub.to_ptr().unwrap()).full_name;

        let mut members = Vec::new();
        let mut reserved_ranges = Vec::new();
        let mut reserved_names = Vec::new();
        let mut options = Vec::new();

        for body_decl in &e.body {
            match *body_decl {
                DeclAny::EnumValue(value_id) => {
                    let value_decl = &self.ast.enum_values[value_id];
                    let mut member = Member::new(
                        value_decl.name,
                        value_decl.name,
                        FieldType::Scalar(protocore_ast::ScalarType::Int32),
                        AstFieldLabel::None,
                        Presence::Explicit,
                        stub,
                        stub,
                    );
                    member.ast = Some(value_decl.span);
                    member.declared_number_expr = Some(value_decl.number);
                    member.options = value_decl.options.clone();
                    let member_id = self.arena.alloc_member(member);
                    members.push(member_id);
                    let value_full_name = join_scope(self.interner, scope, value_decl.name);
                    self.symbols.insert(scope, value_full_name, Symbol::EnumValue { owner: stub, index: members.len() - 1 });
                }
                DeclAny::Reserved(reserved_id) => {
                    let decl = &self.ast.reserveds[reserved_id];
                    for item in &decl.items {
                        match item {
                            protocore_ast::ReservedItem::Range { start, end } => {
                                if let Some(range) = self.evaluate_enum_range(*start, *end) {
                                    reserved_ranges.push(range);
                                }
                            }
                            protocore_ast::ReservedItem::Name(token) => {
                                reserved_names.push(ReservedName { name: self.name_from_string_token(*token), ast: decl.span });
                            }
                        }
                    }
                }
                DeclAny::Option(opt_id) => {
                    let opt = &self.ast.options[opt_id];
                    options.push(OptionEntry { path: opt.path.clone(), value: opt.value, span: opt.span });
                }
                _ => {}
            }
        }

        let type_mut = self.arena.types.get_mut(stub.to_ptr().unwrap());
        type_mut.members = members;
        type_mut.reserved_ranges = reserved_ranges;
        type_mut.reserved_names = reserved_names;
        type_mut.options = options;
    }

    /// Defines one `Field` declaration, returning its `Member` and, for
    /// `map<K, V>` sugar, the synthesized entry `Type` nested under
    /// `owner` so the caller can fold it into `owner`'s own `nested`
    /// list the same way it already does for a `group`'s nested type.
    fn define_field(&mut self, field_id: Id<Field>, owner: Id<Type>, scope: Name) -> (Id<Member>, Option<Id<Type>>) {
        let field = self.ast.fields[field_id].clone();
        let node = self.ast.types[field.ty].clone();
        if let TypeKind::Map { key, value } = &node.kind {
            let (member_id, entry_id) = self.define_map_field(&field, *key, value, owner, scope);
            return (member_id, Some(entry_id));
        }
        let ty = self.resolve_type_node(&node, owner, scope);
        let presence = presence_for_label(field.label, field.ty, self.ast);
        let mut member = Member::new(field.name, json_name_of(self.interner, field.name), ty, field.label, presence, owner, owner);
        member.ast = Some(field.span);
        member.declared_number_expr = Some(field.number);
        member.options = field.options.clone();
        member.default_value = default_option_value(&member.options, self.interner);
        (self.arena.alloc_member(member), None)
    }

    /// Handles `map<K, V> m = N;`: the field's own type becomes a
    /// repeated reference to a synthesized `MEntry` message nested in
    /// `owner`. The entry type is appended to `types_in_order`
    /// immediately (it has no forward-reference concerns, so it skips
    /// the declare pass).
    fn define_map_field(&mut self, field: &Field, key: protocore_ast::ScalarType, value: &TypeNode, owner: Id<Type>, scope: Name) -> (Id<Member>, Id<Type>) {
        let entry_name_text = {
            let raw = self.interner.resolve(field.name);
            format!("{}Entry", title_case(&raw))
        };
        let entry_name = self.interner.intern(&entry_name_text);
        let entry_full_name = join_scope(self.interner, scope, entry_name);
        let entry_id = self.arena.alloc_type(Type {
            name: entry_name,
            full_name: entry_full_name,
            is_enum: false,
            parent: Some(owner),
            members: Vec::new(),
            oneofs: Vec::new(),
            nested: Vec::new(),
            reserved_ranges: Vec::new(),
            reserved_names: Vec::new(),
            extension_ranges: Vec::new(),
            extension_declarations: Vec::new(),
            map_entry: true,
            map_field: None,
            message_set_wire_format: false,
            options: Vec::new(),
            ast: Some(field.span),
        });
        self.symbols.insert(scope, entry_full_name, Symbol::Type(entry_id));
        self.types_in_order.push(entry_id);

        let key_name = self.interner.intern("key");
        let mut key_member = Member::new(key_name, key_name, FieldType::Scalar(key), AstFieldLabel::None, Presence::Implicit, entry_id, entry_id);
        key_member.number = 1;
        let key_member_id = self.arena.alloc_member(key_member);

        let value_name = self.interner.intern("value");
        let value_ty = self.resolve_type_node(value, entry_id, entry_full_name);
        let mut value_member = Member::new(value_name, value_name, value_ty, AstFieldLabel::None, Presence::Implicit, entry_id, entry_id);
        value_member.number = 2;
        let value_member_id = self.arena.alloc_member(value_member);

        {
            let entry_type = self.arena.types.get_mut(entry_id.to_ptr().unwrap());
            entry_type.members = vec![key_member_id, value_member_id];
        }

        let mut field_member = Member::new(
            field.name,
            json_name_of(self.interner, field.name),
            FieldType::Message(crate::model::TypeRef::local(entry_id)),
            AstFieldLabel::Repeated,
            Presence::Repeated,
            owner,
            owner,
        );
        field_member.ast = Some(field.span);
        field_member.declared_number_expr = Some(field.number);
        field_member.options = field.options.clone();
        field_member.map_entry = Some(entry_id);
        let field_member_id = self.arena.alloc_member(field_member);

        self.arena.types.get_mut(entry_id.to_ptr().unwrap()).map_field = Some(field_member_id);

        (field_member_id, entry_id)
    }

    /// A proto2 `group`: lowered to a nested message (named by
    /// title-casing the field's lowercase name) plus a `Delimited`-
    /// encoded field referencing it.
    fn define_group(&mut self, group_id: Id<Group>, owner: Id<Type>, scope: Name) -> (Id<Member>, Id<Type>) {
        let group = &self.ast.groups[group_id].clone();
        let type_name_text = title_case(&self.interner.resolve(group.name));
        let type_name = self.interner.intern(&type_name_text);
        let full_name = join_scope(self.interner, scope, type_name);
        let nested_id = self.arena.alloc_type(Type {
            name: type_name,
            full_name,
            is_enum: false,
            parent: Some(owner),
            members: Vec::new(),
            oneofs: Vec::new(),
            nested: Vec::new(),
            reserved_ranges: Vec::new(),
            reserved_names: Vec::new(),
            extension_ranges: Vec::new(),
            extension_declarations: Vec::new(),
            map_entry: false,
            map_field: None,
            message_set_wire_format: false,
            options: Vec::new(),
            ast: Some(group.span),
        });
        self.symbols.insert(scope, full_name, Symbol::Type(nested_id));
        self.types_in_order.push(nested_id);

        let mut members = Vec::new();
        let mut nested = Vec::new();
        for body_decl in &group.body {
            if let DeclAny::Field(field_id) = *body_decl {
                let (member, entry_type) = self.define_field(field_id, nested_id, full_name);
                members.push(member);
                if let Some(entry_type) = entry_type {
                    nested.push(entry_type);
                }
            }
        }
        let group_type = self.arena.types.get_mut(nested_id.to_ptr().unwrap());
        group_type.members = members;
        group_type.nested = nested;

        let presence = if group.label == AstFieldLabel::Repeated { Presence::Repeated } else { Presence::Explicit };
        let mut field_member = Member::new(
            group.name,
            json_name_of(self.interner, group.name),
            FieldType::Group(crate::model::TypeRef::local(nested_id)),
            group.label,
            presence,
            owner,
            owner,
        );
        field_member.ast = Some(group.span);
        field_member.declared_number_expr = Some(group.number);
        field_member.options = group.options.clone();
        field_member.default_value = default_option_value(&field_member.options, self.interner);
        let field_member_id = self.arena.alloc_member(field_member);

        (field_member_id, nested_id)
    }

    fn define_oneof(
        &mut self,
        oneof_id: Id<protocore_ast::Oneof>,
        owner: Id<Type>,
        out_members: &mut Vec<Id<Member>>,
        out_nested: &mut Vec<Id<Type>>,
    ) -> Id<IrOneof> {
        let oneof = &self.ast.oneofs[oneof_id].clone();
        let scope = self.arena.types.get(owner.to_ptr().unwrap()).full_name;
        let oneof_stub = self.arena.alloc_oneof(IrOneof { name: oneof.name, parent: owner, members: Vec::new(), synthetic: false, ast: Some(oneof.span) });

        let mut members = Vec::new();
        for body_decl in &oneof.body {
            if let DeclAny::Field(field_id) = *body_decl {
                let (member_id, entry_type) = self.define_field(field_id, owner, scope);
                self.arena.members.get_mut(member_id.to_ptr().unwrap()).set_oneof(oneof_stub);
                members.push(member_id);
                out_members.push(member_id);
                if let Some(entry_type) = entry_type {
                    out_nested.push(entry_type);
                }
            }
        }
        self.arena.oneofs.get_mut(oneof_stub.to_ptr().unwrap()).members = members;
        oneof_stub
    }

    fn define_extend(&mut self, extend_id: Id<protocore_ast::Extend>, scope: Name) -> Option<Id<IrExtend>> {
        let extend = &self.ast.extends[extend_id].clone();
        let extendee = self.resolve_path_to_type(&extend.extendee, scope)?;
        let extendee_type = self.arena.types.get(extendee.id.to_ptr().unwrap());
        let container = extendee.id;
        let _ = extendee_type;

        let mut members = Vec::new();
        for body_decl in &extend.body {
            if let DeclAny::Field(field_id) = *body_decl {
                let field = &self.ast.fields[field_id];
                let ty = self.resolve_field_type(field.ty, container, scope);
                let mut member = Member::new(field.name, json_name_of(self.interner, field.name), ty, field.label, presence_for_label(field.label, field.ty, self.ast), container, container);
                member.ast = Some(field.span);
                member.declared_number_expr = Some(field.number);
                member.options = field.options.clone();
                member.default_value = default_option_value(&member.options, self.interner);
                // `parent` differs from `container` for an extension:
                // the field is declared inside whatever message lexically
                // contains this `extend` block, while `container` is the
                // extendee.
                members.push(self.arena.alloc_member(member));
            }
        }
        Some(self.arena.alloc_extend(IrExtend { extendee, members, ast: extend.span }))
    }

    fn define_service(&mut self, service_id: Id<protocore_ast::Service>, scope: Name) -> Id<Service> {
        let service = &self.ast.services[service_id].clone();
        let full_name = join_scope(self.interner, scope, service.name);
        let mut methods = Vec::new();
        let mut options = Vec::new();
        for body_decl in &service.body {
            match *body_decl {
                DeclAny::Method(method_id) => {
                    let m = &self.ast.methods[method_id];
                    let input = self.resolve_path_to_type(&m.input_type, scope).unwrap_or(crate::model::TypeRef::local(Id::NULL));
                    let output = self.resolve_path_to_type(&m.output_type, scope).unwrap_or(crate::model::TypeRef::local(Id::NULL));
                    let method = Method {
                        name: m.name,
                        input,
                        output,
                        client_streaming: m.input_streaming,
                        server_streaming: m.output_streaming,
                        options: m.options.clone(),
                        ast: m.span,
                    };
                    methods.push(self.arena.alloc_method(method));
                }
                DeclAny::Option(opt_id) => {
                    let opt = &self.ast.options[opt_id];
                    options.push(OptionEntry { path: opt.path.clone(), value: opt.value, span: opt.span });
                }
                _ => {}
            }
        }
        self.arena.alloc_service(Service { name: service.name, full_name, methods, options, ast: service.span })
    }

    fn resolve_field_type(&mut self, type_any: protocore_ast::TypeAny, owner: Id<Type>, scope: Name) -> FieldType {
        let node = self.ast.types[type_any].clone();
        self.resolve_type_node(&node, owner, scope)
    }

    fn resolve_type_node(&mut self, node: &TypeNode, owner: Id<Type>, scope: Name) -> FieldType {
        match &node.kind {
            TypeKind::Scalar(s) => FieldType::Scalar(*s),
            TypeKind::Named(path) => match self.resolve_path_to_type(path, scope) {
                Some(type_ref) => {
                    let is_enum = self.arena.types.get(type_ref.id.to_ptr().expect("resolved type ref must be local during single-file lowering")).is_enum;
                    if is_enum {
                        FieldType::Enum(type_ref)
                    } else {
                        FieldType::Message(type_ref)
                    }
                }
                None => {
                    self.report.push(
                        Diagnostic::error(format!("unresolved type reference '{}'", render_path(self.interner, path)))
                            .with_span(node.span),
                    );
                    FieldType::Message(crate::model::TypeRef::local(Id::NULL))
                }
            },
            TypeKind::Map { .. } => {
                // Map sugar is handled one level up, in `define_field`,
                // since it needs to mint a synthetic sibling `Type` and
                // rewrite the owning `Member`'s cardinality — there is
                // no single `FieldType` that represents "still sugared".
                // An ordinary message/extend field never reaches this
                // arm; an `extend` block's field (resolved directly
                // through `resolve_field_type`, not `define_field`) can
                // syntactically name a map type even though Protobuf
                // forbids map extensions, so this stays a diagnostic
                // rather than a panic.
                self.report.push(Diagnostic::error("map fields cannot be extensions").with_span(node.span));
                FieldType::Message(crate::model::TypeRef::local(Id::NULL))
            }
        }
    }

    fn resolve_path_to_type(&mut self, path: &Path, scope: Name) -> Option<crate::model::TypeRef> {
        if path.leading_dot {
            let full = path.segments.iter().map(|s| self.interner.resolve(*s)).collect::<Vec<_>>().join(".");
            let name = self.interner.intern(&full);
            return match self.symbols.resolve_absolute(name) {
                Some(Symbol::Type(id)) => Some(crate::model::TypeRef::local(id)),
                _ => None,
            };
        }
        let segments: Vec<String> = path.segments.iter().map(|s| self.interner.resolve(*s)).collect();
        let segment_refs: Vec<&str> = segments.iter().map(String::as_str).collect();
        let scopes = enclosing_scopes(self.interner, scope);
        match resolve_scoped(self.symbols, self.interner, &scopes, &segment_refs) {
            Some(Symbol::Type(id)) => Some(crate::model::TypeRef::local(id)),
            _ => None,
        }
    }

    /// Reserved names are parsed as string-literal tokens; the
    /// unescaped text lives in the lexer's out-of-band metadata, not on
    /// the token itself (see `protocore_lexer::Metadata::string_value`).
    fn name_from_string_token(&self, token: protocore_lexer::TokenId) -> Name {
        let text = self.stream.metadata(token).and_then(|m| m.string_value.as_deref()).unwrap_or_default();
        self.interner.intern(text)
    }

    fn evaluate_range(&mut self, start: protocore_ast::TagAny, end: Option<protocore_ast::TagAny>) -> Option<ReservedRange> {
        let start_val = self.evaluate_bound(start, false)?;
        let end_val = match end {
            Some(e) => self.evaluate_bound(e, true)?,
            None => start_val,
        };
        Some(ReservedRange { start: start_val, end: end_val })
    }

    fn evaluate_enum_range(&mut self, start: protocore_ast::TagAny, end: Option<protocore_ast::TagAny>) -> Option<ReservedRange> {
        let start_val = self.evaluate_enum_bound(start)?;
        let end_val = match end {
            Some(e) => self.evaluate_enum_bound(e)?,
            None => start_val,
        };
        Some(ReservedRange { start: start_val, end: end_val })
    }

    /// The span holding a numeric literal's raw digits for `expr`: for a
    /// bare `Int`, that's the expression's own span; for `Negative(inner)`,
    /// the sign lives in the outer span but the digits are `inner`'s own
    /// (the parser gives the wrapped literal its own correctly-scoped span).
    fn literal_text(&self, expr: protocore_ast::TagAny) -> &'a str {
        let inner_span = match &self.ast.exprs[expr].kind {
            protocore_ast::ExprKind::Negative(inner) => self.ast.exprs[*inner].span,
            _ => self.ast.exprs[expr].span,
        };
        inner_span.text(self.map)
    }

    fn evaluate_bound(&mut self, expr: protocore_ast::TagAny, is_upper: bool) -> Option<i32> {
        let kind = crate::eval::NumberKind::RangeBound { is_upper_bound: is_upper };
        let text = self.literal_text(expr);
        let ast = self.ast;
        let token_text = move |_: protocore_lexer::TokenId| -> &str { text };
        let span_of = |id: Id<protocore_ast::Expr>| ast.exprs[id].span;
        match crate::eval::evaluate_number(self.ast, expr, kind, &token_text, &span_of) {
            Ok(crate::eval::EvaluatedNumber::Value(v)) => i32::try_from(v).ok(),
            Ok(crate::eval::EvaluatedNumber::Max) => Some(if is_upper { crate::eval::MAX_FIELD_TAG as i32 } else { 0 }),
            Err(diag) => {
                self.report.push(diag);
                None
            }
        }
    }

    fn evaluate_enum_bound(&mut self, expr: protocore_ast::TagAny) -> Option<i32> {
        let kind = crate::eval::NumberKind::EnumValueNumber;
        let text = self.literal_text(expr);
        let ast = self.ast;
        let token_text = move |_: protocore_lexer::TokenId| -> &str { text };
        let span_of = |id: Id<protocore_ast::Expr>| ast.exprs[id].span;
        match crate::eval::evaluate_number(self.ast, expr, kind, &token_text, &span_of) {
            Ok(crate::eval::EvaluatedNumber::Value(v)) => i32::try_from(v).ok(),
            Ok(crate::eval::EvaluatedNumber::Max) => None,
            Err(diag) => {
                self.report.push(diag);
                None
            }
        }
    }
}

fn enclosing_scopes(interner: &Interner, scope: Name) -> Vec<Name> {
    let text = interner.resolve(scope);
    let mut scopes = Vec::new();
    let segments: Vec<&str> = if text.is_empty() { Vec::new() } else { text.split('.').collect() };
    for i in (0..=segments.len()).rev() {
        let joined = segments[..i].join(".");
        scopes.push(interner.intern(&joined));
    }
    scopes
}

fn render_path(interner: &Interner, path: &Path) -> String {
    let mut out = String::new();
    if path.leading_dot {
        out.push('.');
    }
    let parts: Vec<String> = path.segments.iter().map(|s| interner.resolve(*s)).collect();
    out.push_str(&parts.join("."));
    out
}

fn json_name_of(interner: &Interner, name: Name) -> Name {
    let raw = interner.resolve(name);
    let mut out = String::with_capacity(raw.len());
    let mut upcase_next = false;
    for c in raw.chars() {
        if c == '_' {
            upcase_next = true;
        } else if upcase_next {
            out.extend(c.to_uppercase());
            upcase_next = false;
        } else {
            out.push(c);
        }
    }
    interner.intern(&out)
}

/// The proto2 `[default = ...]` field option, kept as the raw `ExprAny`
/// the parser already produced rather than folded to a concrete value
/// here — evaluating it (matching an enum-value name against the
/// field's resolved enum type, unescaping a string/bytes literal)
/// needs the symbol table and scalar-type context this walker pass has
/// in hand for other fields but not uniformly for every caller of this
/// helper, so that folding is deferred to whichever consumer actually
/// needs the concrete value (the descriptor bridge, not this lowering
/// pass). The parser accepts `[default = ...]` on any field regardless
/// of syntax; `protocore_validate::fields::check_default_value` is what
/// actually rejects it on a repeated/oneof/implicit-presence field.
fn default_option_value(options: &[OptionEntry], interner: &Interner) -> Option<protocore_ast::ExprAny> {
    options
        .iter()
        .rev()
        .find(|entry| entry.path.segments.len() == 1 && !entry.path.leading_dot && interner.resolve(entry.path.segments[0]) == "default")
        .map(|entry| entry.value)
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn presence_for_label(label: AstFieldLabel, _ty: protocore_ast::TypeAny, _ast: &AstContext) -> Presence {
    match label {
        AstFieldLabel::Repeated => Presence::Repeated,
        AstFieldLabel::Required => Presence::Required,
        AstFieldLabel::Optional => Presence::Explicit,
        AstFieldLabel::None => Presence::Implicit,
    }
}

#[cfg(test)]
mod tests {
    use crate::{FieldType, Session, SessionConfig};

    #[test]
    fn map_field_lowers_to_a_synthesized_entry_type() {
        let mut session = Session::new(SessionConfig::default());
        let source = "syntax = \"proto3\";\nmessage M { map<string, int32> m = 1; }\n";
        let (compiled, report) = session.compile_source("t.proto", source);
        assert!(!report.is_failure(), "{:?}", report.into_vec());

        let ty = session.arena.types.get(compiled.file.types[0].to_ptr().unwrap());
        assert_eq!(session.interner.resolve(ty.name), "M");
        assert_eq!(ty.members.len(), 1, "M should have exactly the one map field");
        assert_eq!(ty.nested.len(), 1, "the synthesized MEntry type should be nested in M");

        let field = session.arena.members.get(ty.members[0].to_ptr().unwrap());
        assert_eq!(session.interner.resolve(field.name), "m");
        assert_eq!(field.label, protocore_ast::FieldLabel::Repeated);
        let entry_ref = match field.ty {
            FieldType::Message(type_ref) => type_ref,
            other => panic!("expected the map field to lower to a Message reference, got {other:?}"),
        };
        let entry_id = entry_ref.id;
        assert_eq!(field.map_entry, Some(entry_id));

        let entry = session.arena.types.get(entry_id.to_ptr().unwrap());
        assert_eq!(session.interner.resolve(entry.name), "MEntry");
        assert!(entry.map_entry, "the synthesized entry type must be flagged map_entry");
        assert_eq!(entry.map_field, Some(ty.members[0]));
        assert_eq!(entry.members.len(), 2, "entry type should have exactly key and value fields");

        let key = session.arena.members.get(entry.members[0].to_ptr().unwrap());
        assert_eq!(session.interner.resolve(key.name), "key");
        assert_eq!(key.number, 1);
        assert!(matches!(key.ty, FieldType::Scalar(protocore_ast::ScalarType::String)));

        let value = session.arena.members.get(entry.members[1].to_ptr().unwrap());
        assert_eq!(session.interner.resolve(value.name), "value");
        assert_eq!(value.number, 2);
        assert!(matches!(value.ty, FieldType::Scalar(protocore_ast::ScalarType::Int32)));
    }
}
