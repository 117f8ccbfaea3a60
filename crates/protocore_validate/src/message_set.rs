//! Legacy `MessageSet` wire format: a message opting into
//! `message_set_wire_format = true` stops being an ordinary message and
//! becomes purely an extension host — it may declare extension ranges
//! and nothing else, and every extension of it must be a singular
//! message field.

use protocore_base::{Diagnostic, Interner, Report};
use protocore_ir::{Edition, Extend, FieldType, IrArena, Type};

pub fn check_message_set(ty: &Type, ir: &IrArena, interner: &Interner, edition: Edition, report: &mut Report) {
    if !ty.message_set_wire_format {
        return;
    }

    let full_name = interner.resolve(ty.full_name);

    if edition == Edition::Proto3 {
        push(report, ty, format!("message \"{full_name}\" cannot use the legacy MessageSet wire format in proto3"));
    }

    if !ty.members.is_empty() {
        push(report, ty, format!("message set \"{full_name}\" must not declare any fields"));
    }
    if !ty.oneofs.is_empty() {
        push(report, ty, format!("message set \"{full_name}\" must not declare any oneofs"));
    }
    if ty.extension_ranges.is_empty() {
        push(report, ty, format!("message set \"{full_name}\" must declare at least one extension range"));
    }
}

/// Extensions of a message set must be singular, message-typed — the
/// legacy wire format stores each extension's payload as an embedded
/// message keyed by extension number, with no room for a scalar or a
/// repeated slot.
pub fn check_message_set_extension(extend: &Extend, extendee: &Type, ir: &IrArena, interner: &Interner, report: &mut Report) {
    if !extendee.message_set_wire_format {
        return;
    }
    for &member_id in &extend.members {
        let Some(ptr) = member_id.to_ptr() else { continue };
        let member = ir.members.get(ptr);
        let is_singular_message = matches!(member.ty, FieldType::Message(_)) && member.label != protocore_ast::FieldLabel::Repeated;
        if !is_singular_message {
            let mut diag = Diagnostic::error(format!(
                "extension \"{}\" of message set \"{}\" must be a singular message type",
                interner.resolve(member.name),
                interner.resolve(extendee.full_name)
            ));
            if let Some(span) = member.ast {
                diag = diag.with_span(span);
            }
            report.push(diag);
        }
    }
}

fn push(report: &mut Report, ty: &Type, message: String) {
    let mut diag = Diagnostic::error(message);
    if let Some(span) = ty.ast {
        diag = diag.with_span(span);
    }
    report.push(diag);
}
