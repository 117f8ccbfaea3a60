//! Per-field option legality: `packed`, `jstype`, `ctype`/`lazy` and
//! presence. Each of these is a proto2/proto3 per-field option in
//! legacy syntax and a `features.*` field in editions; the editions
//! rewrite is suggested as an edit rather than silently accepted, per
//! spec.md §4.10's "the validator suggests the replacement".

use protocore_ast::{AstContext, FieldLabel, ScalarType};
use protocore_base::{Diagnostic, Interner, Report, Suggestion};
use protocore_ir::{Edition, FieldType, Member, Presence, WireEncoding};

use crate::options::{expr_bool, expr_enum_name, find_option};

/// `packed` is legacy syntax sugar for `features.repeated_field_encoding
/// = PACKED`; editions express the same thing as a feature, so the
/// bracketed option itself is rejected there with a suggested rewrite.
pub fn check_packed(member: &Member, ast: &AstContext, interner: &Interner, edition: Edition, report: &mut Report) {
    let Some(entry) = find_option(&member.options, "packed", interner) else { return };

    if !edition.is_legacy() {
        let mut diag = Diagnostic::error("cannot set `packed` in editions mode").with_span(entry.span);
        diag = diag.with_suggestion(Suggestion::new(entry.span, "features.repeated_field_encoding = PACKED", "replace with the editions feature"));
        report.push(diag);
        return;
    }

    let Some(true) = expr_bool(ast, entry) else { return };
    let is_packable = member.label == FieldLabel::Repeated && matches!(member.ty.wire_encoding(), WireEncoding::Varint | WireEncoding::Fixed32 | WireEncoding::Fixed64);
    if !is_packable {
        report.push(
            Diagnostic::error(format!("field \"{}\" cannot be packed: only repeated integer, float, bool, or enum fields can be", interner.resolve(member.name)))
                .with_span(entry.span),
        );
    }
}

/// `jstype` only makes sense on 64-bit integer fields, where JavaScript's
/// native number type loses precision.
pub fn check_jstype(member: &Member, interner: &Interner, report: &mut Report) {
    let Some(entry) = find_option(&member.options, "jstype", interner) else { return };
    let is_64_bit = matches!(member.ty, FieldType::Scalar(ScalarType::Int64 | ScalarType::Uint64 | ScalarType::Sint64 | ScalarType::Fixed64 | ScalarType::Sfixed64));
    if !is_64_bit {
        report.push(
            Diagnostic::error(format!("field \"{}\": jstype is only valid on 64-bit integer fields", interner.resolve(member.name))).with_span(entry.span),
        );
    }
}

/// `ctype` only makes sense on `string`/`bytes` fields, and `CORD` may
/// not back an extension (the Cord string class has no extension-safe
/// ABI in the reference C++ runtime this option targets).
pub fn check_ctype(member: &Member, ast: &AstContext, interner: &Interner, edition: Edition, report: &mut Report) {
    let Some(entry) = find_option(&member.options, "ctype", interner) else { return };

    if !edition.is_legacy() {
        let mut diag = Diagnostic::error("cannot set `ctype` in editions mode").with_span(entry.span);
        diag = diag.with_suggestion(Suggestion::new(entry.span, "features.(pb.cpp).string_type = ...", "replace with the editions feature"));
        report.push(diag);
        return;
    }

    let is_string_or_bytes = matches!(member.ty, FieldType::Scalar(ScalarType::String | ScalarType::Bytes));
    if !is_string_or_bytes {
        report.push(
            Diagnostic::error(format!("field \"{}\": ctype is only valid on string or bytes fields", interner.resolve(member.name))).with_span(entry.span),
        );
        return;
    }

    if member.is_extension() && expr_enum_name(ast, interner, entry).as_deref() == Some("CORD") {
        report.push(Diagnostic::error(format!("field \"{}\": ctype = CORD is not allowed on extensions", interner.resolve(member.name))).with_span(entry.span));
    }
}

/// `lazy`/`unverified_lazy` require a length-prefixed (not DELIMITED,
/// not scalar) message field — the lazy-parsing machinery works by
/// deferring the decode of one length-prefixed submessage blob.
pub fn check_lazy(member: &Member, interner: &Interner, report: &mut Report) {
    for name in ["lazy", "unverified_lazy"] {
        let Some(entry) = find_option(&member.options, name, interner) else { continue };
        let ok = matches!(member.ty, FieldType::Message(_)) && member.ty.wire_encoding() == WireEncoding::LengthPrefixed;
        if !ok {
            report.push(
                Diagnostic::error(format!(
                    "field \"{}\": `{name}` is only valid on a length-prefixed message field, not a group or scalar",
                    interner.resolve(member.name)
                ))
                .with_span(entry.span),
            );
        }
    }
}

/// `features.field_presence` may only be set explicitly on a singular,
/// non-oneof, non-extension field; `IMPLICIT` presence is meaningless on
/// a message type (there is no "unset" wire representation to imply);
/// `LEGACY_REQUIRED` is deprecated and may not appear at file scope.
pub fn check_presence(member: &Member, ast: &AstContext, interner: &Interner, report: &mut Report) {
    let Some(entry) = find_option(&member.options, "field_presence", interner) else { return };
    let is_eligible = member.label != FieldLabel::Repeated && member.oneof().is_none() && !member.is_extension();
    if !is_eligible {
        report.push(
            Diagnostic::error(format!(
                "field \"{}\": `features.field_presence` may only be set on a singular, non-oneof, non-extension field",
                interner.resolve(member.name)
            ))
            .with_span(entry.span),
        );
        return;
    }

    let Some(value) = expr_enum_name(ast, interner, entry) else { return };
    if value == "IMPLICIT" && member.ty.is_message_or_group() {
        report.push(
            Diagnostic::error(format!("field \"{}\": `IMPLICIT` presence is not valid on a message-typed field", interner.resolve(member.name)))
                .with_span(entry.span),
        );
    }
    if value == "LEGACY_REQUIRED" {
        report.push(
            Diagnostic::warning(format!("field \"{}\": `LEGACY_REQUIRED` presence is deprecated", interner.resolve(member.name))).with_span(entry.span),
        );
    }
}

/// `[default = ...]` only makes sense on a field with explicit presence:
/// a repeated field has no single scalar slot to default, a oneof
/// member's presence is already tracked by which case is set, and an
/// implicit-presence singular field (proto3, or an editions field that
/// never opted into `LEGACY_REQUIRED`/`EXPLICIT`) defaults to the zero
/// value by definition and may not override it. A message-typed field
/// has no literal default at all — its "unset" state is simply absent.
pub fn check_default_value(member: &Member, interner: &Interner, report: &mut Report) {
    let Some(entry) = find_option(&member.options, "default", interner) else { return };

    if member.ty.is_message_or_group() {
        report.push(Diagnostic::error(format!("field \"{}\": message and group fields cannot declare a default value", interner.resolve(member.name))).with_span(entry.span));
        return;
    }
    if member.label == FieldLabel::Repeated {
        report.push(Diagnostic::error(format!("field \"{}\": repeated fields cannot declare a default value", interner.resolve(member.name))).with_span(entry.span));
        return;
    }
    if member.oneof().is_some() {
        report.push(Diagnostic::error(format!("field \"{}\": oneof members cannot declare a default value", interner.resolve(member.name))).with_span(entry.span));
        return;
    }
    if member.presence() != Presence::Explicit && member.presence() != Presence::Required {
        report.push(
            Diagnostic::error(format!("field \"{}\": only a field with explicit presence can declare a default value", interner.resolve(member.name)))
                .with_span(entry.span)
                .with_note("proto3 and implicit-presence editions fields always default to the type's zero value"),
        );
    }
}
