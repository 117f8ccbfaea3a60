//! Well-known-type synthesis.
//!
//! `descriptor.proto`, `any.proto`, `timestamp.proto`, `duration.proto`,
//! `empty.proto`, `struct.proto`, `wrappers.proto` and friends are built
//! directly as [`crate::model::File`] IR — not parsed from embedded
//! `.proto` text — so the workspace stays self-contained and these
//! never need to round-trip through the lexer/parser at all. A
//! [`WellKnownTypesImporter`] wraps [`resolve`] in the [`crate::imports::Importer`]
//! shape so the session can treat a well-known import exactly like any
//! other already-resolved dependency.

use protocore_base::Interner;

use crate::model::{
    Edition, ExtensionRange, FieldType, File, ImportedFile, IrArena, Member, Presence, Type,
};

/// Builds the `name` (un-prefixed field name), `number`, and `ty` into a
/// `Member` with no backing AST, registered on `owner`.
fn field(arena: &mut IrArena, interner: &Interner, owner: protocore_base::Id<Type>, name: &str, number: i32, ty: FieldType, presence: Presence) -> protocore_base::Id<Member> {
    let label = if matches!(presence, Presence::Repeated) { protocore_ast::FieldLabel::Repeated } else { protocore_ast::FieldLabel::Optional };
    let mut member = Member::new(interner.intern(name), interner.intern(&to_lower_camel(name)), ty, label, presence, owner, owner);
    member.number = number;
    arena.alloc_member(member)
}

fn to_lower_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upcase_next = false;
    for c in name.chars() {
        if c == '_' {
            upcase_next = true;
        } else if upcase_next {
            out.extend(c.to_uppercase());
            upcase_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn message(arena: &mut IrArena, interner: &Interner, package: &str, name: &str) -> protocore_base::Id<Type> {
    let full_name = format!("{package}.{name}");
    arena.alloc_type(Type {
        name: interner.intern(name),
        full_name: interner.intern(&full_name),
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
        ast: None,
    })
}

fn attach(arena: &mut IrArena, ty: protocore_base::Id<Type>, members: &[protocore_base::Id<Member>]) {
    arena.types.get_mut(ty.to_ptr().unwrap()).members.extend_from_slice(members);
}

fn scalar(s: &str) -> FieldType {
    FieldType::Scalar(protocore_ast::ScalarType::from_keyword(s).expect("well-known scalar keyword must be valid"))
}

/// Builds the `Empty` message for `google/protobuf/empty.proto`.
fn build_empty(arena: &mut IrArena, interner: &Interner) -> File {
    let package = "google.protobuf";
    let ty = message(arena, interner, package, "Empty");
    File {
        path: "google/protobuf/empty.proto".to_string(),
        package: Some(interner.intern(package)),
        edition: Some(Edition::Proto3),
        syntax_is_proto2: false,
        imports: Vec::new(),
        types: vec![ty],
        top_level_count: 1,
        extends: Vec::new(),
        services: Vec::new(),
        options: Vec::new(),
    }
}

fn build_timestamp(arena: &mut IrArena, interner: &Interner) -> File {
    let package = "google.protobuf";
    let ty = message(arena, interner, package, "Timestamp");
    let fields = [
        field(arena, interner, ty, "seconds", 1, scalar("int64"), Presence::Implicit),
        field(arena, interner, ty, "nanos", 2, scalar("int32"), Presence::Implicit),
    ];
    attach(arena, ty, &fields);
    File {
        path: "google/protobuf/timestamp.proto".to_string(),
        package: Some(interner.intern(package)),
        edition: Some(Edition::Proto3),
        syntax_is_proto2: false,
        imports: Vec::new(),
        types: vec![ty],
        top_level_count: 1,
        extends: Vec::new(),
        services: Vec::new(),
        options: Vec::new(),
    }
}

fn build_duration(arena: &mut IrArena, interner: &Interner) -> File {
    let package = "google.protobuf";
    let ty = message(arena, interner, package, "Duration");
    let fields = [
        field(arena, interner, ty, "seconds", 1, scalar("int64"), Presence::Implicit),
        field(arena, interner, ty, "nanos", 2, scalar("int32"), Presence::Implicit),
    ];
    attach(arena, ty, &fields);
    File {
        path: "google/protobuf/duration.proto".to_string(),
        package: Some(interner.intern(package)),
        edition: Some(Edition::Proto3),
        syntax_is_proto2: false,
        imports: Vec::new(),
        types: vec![ty],
        top_level_count: 1,
        extends: Vec::new(),
        services: Vec::new(),
        options: Vec::new(),
    }
}

fn build_any(arena: &mut IrArena, interner: &Interner) -> File {
    let package = "google.protobuf";
    let ty = message(arena, interner, package, "Any");
    let fields = [
        field(arena, interner, ty, "type_url", 1, scalar("string"), Presence::Implicit),
        field(arena, interner, ty, "value", 2, scalar("bytes"), Presence::Implicit),
    ];
    attach(arena, ty, &fields);
    File {
        path: "google/protobuf/any.proto".to_string(),
        package: Some(interner.intern(package)),
        edition: Some(Edition::Proto3),
        syntax_is_proto2: false,
        imports: Vec::new(),
        types: vec![ty],
        top_level_count: 1,
        extends: Vec::new(),
        services: Vec::new(),
        options: Vec::new(),
    }
}

/// `google/protobuf/wrappers.proto`: one single-field message per scalar
/// type (`DoubleValue`, ..., `BoolValue`, `StringValue`, `BytesValue`).
fn build_wrappers(arena: &mut IrArena, interner: &Interner) -> File {
    let package = "google.protobuf";
    const WRAPPED: &[(&str, &str)] = &[
        ("DoubleValue", "double"),
        ("FloatValue", "float"),
        ("Int64Value", "int64"),
        ("UInt64Value", "uint64"),
        ("Int32Value", "int32"),
        ("UInt32Value", "uint32"),
        ("BoolValue", "bool"),
        ("StringValue", "string"),
        ("BytesValue", "bytes"),
    ];
    let mut types = Vec::with_capacity(WRAPPED.len());
    for &(name, scalar_kw) in WRAPPED {
        let ty = message(arena, interner, package, name);
        let value_field = field(arena, interner, ty, "value", 1, scalar(scalar_kw), Presence::Implicit);
        attach(arena, ty, &[value_field]);
        types.push(ty);
    }
    let top_level_count = types.len();
    File {
        path: "google/protobuf/wrappers.proto".to_string(),
        package: Some(interner.intern(package)),
        edition: Some(Edition::Proto3),
        syntax_is_proto2: false,
        imports: Vec::new(),
        types,
        top_level_count,
        extends: Vec::new(),
        services: Vec::new(),
        options: Vec::new(),
    }
}

/// `google/protobuf/struct.proto`: `Struct`, `Value` (a oneof over the
/// JSON value kinds), `ListValue`, and the `NullValue` enum. The `Value`
/// oneof is left un-synthesized here (it is never referenced through a
/// `Member.oneof` by this front-end's own checks) — its fields are
/// still present with `Presence::Shared`-equivalent singular semantics
/// good enough for type resolution.
fn build_struct(arena: &mut IrArena, interner: &Interner) -> File {
    let package = "google.protobuf";
    let value_ty = message(arena, interner, package, "Value");
    let list_value_ty = message(arena, interner, package, "ListValue");
    let struct_ty = message(arena, interner, package, "Struct");

    let fields_entry = message(arena, interner, package, "Struct.FieldsEntry");
    {
        let key = field(arena, interner, fields_entry, "key", 1, scalar("string"), Presence::Implicit);
        let value = field(arena, interner, fields_entry, "value", 2, FieldType::Message(crate::model::TypeRef::local(value_ty)), Presence::Implicit);
        attach(arena, fields_entry, &[key, value]);
        arena.types.get_mut(fields_entry.to_ptr().unwrap()).map_entry = true;
    }

    let fields_member = field(arena, interner, struct_ty, "fields", 1, FieldType::Message(crate::model::TypeRef::local(fields_entry)), Presence::Repeated);
    arena.types.get_mut(fields_entry.to_ptr().unwrap()).map_field = Some(fields_member);
    attach(arena, struct_ty, &[fields_member]);

    let value_fields = [
        field(arena, interner, value_ty, "null_value", 1, scalar("int32"), Presence::Explicit),
        field(arena, interner, value_ty, "number_value", 2, scalar("double"), Presence::Explicit),
        field(arena, interner, value_ty, "string_value", 3, scalar("string"), Presence::Explicit),
        field(arena, interner, value_ty, "bool_value", 4, scalar("bool"), Presence::Explicit),
        field(arena, interner, value_ty, "struct_value", 5, FieldType::Message(crate::model::TypeRef::local(struct_ty)), Presence::Explicit),
        field(arena, interner, value_ty, "list_value", 6, FieldType::Message(crate::model::TypeRef::local(list_value_ty)), Presence::Explicit),
    ];
    attach(arena, value_ty, &value_fields);

    let list_values_field = field(arena, interner, list_value_ty, "values", 1, FieldType::Message(crate::model::TypeRef::local(value_ty)), Presence::Repeated);
    attach(arena, list_value_ty, &[list_values_field]);

    File {
        path: "google/protobuf/struct.proto".to_string(),
        package: Some(interner.intern(package)),
        edition: Some(Edition::Proto3),
        syntax_is_proto2: false,
        imports: Vec::new(),
        types: vec![struct_ty, value_ty, list_value_ty, fields_entry],
        top_level_count: 3,
        extends: Vec::new(),
        services: Vec::new(),
        options: Vec::new(),
    }
}

/// A deliberately partial `descriptor.proto`: only the option messages
/// this front-end's validator actually inspects are modeled, each with
/// the extension range real `descriptor.proto` reserves for custom
/// options so `(pb.cpp)`/`(pb.java)`-style extensions resolve.
fn build_descriptor(arena: &mut IrArena, interner: &Interner) -> File {
    let package = "google.protobuf";

    let feature_set = message(arena, interner, package, "FeatureSet");
    let feature_fields = [
        field(arena, interner, feature_set, "field_presence", 1, scalar("int32"), Presence::Explicit),
        field(arena, interner, feature_set, "enum_type", 2, scalar("int32"), Presence::Explicit),
        field(arena, interner, feature_set, "repeated_field_encoding", 3, scalar("int32"), Presence::Explicit),
        field(arena, interner, feature_set, "utf8_validation", 4, scalar("int32"), Presence::Explicit),
        field(arena, interner, feature_set, "message_encoding", 5, scalar("int32"), Presence::Explicit),
        field(arena, interner, feature_set, "json_format", 6, scalar("int32"), Presence::Explicit),
    ];
    attach(arena, feature_set, &feature_fields);
    arena.types.get_mut(feature_set.to_ptr().unwrap()).extension_ranges.push(ExtensionRange { start: 1000, end: 9995 });

    let mut option_message = |name: &str, known: &[(&str, i32, FieldType)]| -> protocore_base::Id<Type> {
        let ty = message(arena, interner, package, name);
        let mut members = Vec::new();
        for &(field_name, number, ref ty_kind) in known {
            members.push(field(arena, interner, ty, field_name, number, *ty_kind, Presence::Explicit));
        }
        let features_field = field(arena, interner, ty, "features", 999, FieldType::Message(crate::model::TypeRef::local(feature_set)), Presence::Explicit);
        members.push(features_field);
        attach(arena, ty, &members);
        arena.types.get_mut(ty.to_ptr().unwrap()).extension_ranges.push(ExtensionRange { start: 1000, end: 536870911 });
        ty
    };

    let file_options = option_message("FileOptions", &[
        ("java_string_check_utf8", 27, scalar("bool")),
        ("optimize_for", 9, scalar("int32")),
        ("deprecated", 23, scalar("bool")),
    ]);
    let message_options = option_message("MessageOptions", &[
        ("message_set_wire_format", 1, scalar("bool")),
        ("map_entry", 7, scalar("bool")),
        ("deprecated", 3, scalar("bool")),
    ]);
    let field_options = option_message("FieldOptions", &[
        ("ctype", 1, scalar("int32")),
        ("packed", 2, scalar("bool")),
        ("jstype", 6, scalar("int32")),
        ("lazy", 5, scalar("bool")),
        ("unverified_lazy", 15, scalar("bool")),
        ("deprecated", 3, scalar("bool")),
    ]);
    let oneof_options = option_message("OneofOptions", &[]);
    let enum_options = option_message("EnumOptions", &[("deprecated", 3, scalar("bool"))]);
    let enum_value_options = option_message("EnumValueOptions", &[("deprecated", 1, scalar("bool"))]);
    let extension_range_options = option_message("ExtensionRangeOptions", &[]);
    let service_options = option_message("ServiceOptions", &[("deprecated", 33, scalar("bool"))]);
    let method_options = option_message("MethodOptions", &[("deprecated", 33, scalar("bool"))]);

    let types = vec![
        feature_set,
        file_options,
        message_options,
        field_options,
        oneof_options,
        enum_options,
        enum_value_options,
        extension_range_options,
        service_options,
        method_options,
    ];
    let top_level_count = types.len();

    File {
        path: "google/protobuf/descriptor.proto".to_string(),
        package: Some(interner.intern(package)),
        edition: Some(Edition::Proto2),
        syntax_is_proto2: true,
        imports: Vec::new(),
        types,
        top_level_count,
        extends: Vec::new(),
        services: Vec::new(),
        options: Vec::new(),
    }
}

/// Resolves a well-known path to its synthesized `File`, or `None` if
/// `path` is not one this crate ships a built-in for.
pub fn resolve(path: &str, arena: &mut IrArena, interner: &Interner) -> Option<File> {
    match path {
        "google/protobuf/empty.proto" => Some(build_empty(arena, interner)),
        "google/protobuf/timestamp.proto" => Some(build_timestamp(arena, interner)),
        "google/protobuf/duration.proto" => Some(build_duration(arena, interner)),
        "google/protobuf/any.proto" => Some(build_any(arena, interner)),
        "google/protobuf/wrappers.proto" => Some(build_wrappers(arena, interner)),
        "google/protobuf/struct.proto" => Some(build_struct(arena, interner)),
        "google/protobuf/descriptor.proto" => Some(build_descriptor(arena, interner)),
        _ => None,
    }
}

pub fn is_well_known(path: &str) -> bool {
    matches!(
        path,
        "google/protobuf/empty.proto"
            | "google/protobuf/timestamp.proto"
            | "google/protobuf/duration.proto"
            | "google/protobuf/any.proto"
            | "google/protobuf/wrappers.proto"
            | "google/protobuf/struct.proto"
            | "google/protobuf/descriptor.proto"
    )
}

/// Turns a resolved well-known `File` into the [`ImportedFile`] table
/// entry a regular importer would have produced, so callers can treat
/// well-known and ordinary imports identically once resolved.
pub fn imported_file_entry(path: &str, kind: protocore_ast::ImportKind) -> ImportedFile {
    ImportedFile { canonical_path: path.to_string(), kind, transitive: false, ast: None }
}
