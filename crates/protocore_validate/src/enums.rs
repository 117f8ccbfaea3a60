//! Enum legality: an empty enum has nothing to default to on the wire,
//! and an "open" (not `features.enum_type = CLOSED`) enum's unknown-
//! value fallback depends on its first declared value being zero.

use protocore_ast::AstContext;
use protocore_base::{Diagnostic, Id, Interner, Report};
use protocore_ir::{Edition, FeatureSetArena, IrArena, Type};

use crate::features::{CoreDefaults, FileFeatures};

pub fn check_enum(
    ty_id: Id<Type>,
    ty: &Type,
    ir: &IrArena,
    interner: &Interner,
    ast: &AstContext,
    file_features: &FileFeatures,
    defaults: &CoreDefaults,
    features_arena: &mut FeatureSetArena,
    edition: Edition,
    report: &mut Report,
) {
    debug_assert!(ty.is_enum);

    let span = ty.ast;
    if ty.members.is_empty() {
        let mut diag = Diagnostic::error(format!("enum \"{}\" has no values", interner.resolve(ty.full_name)));
        if let Some(span) = span {
            diag = diag.with_span(span);
        }
        report.push(diag);
        return;
    }

    let feature_set = file_features.set_for_type(ty_id);
    let is_open = match features_arena.resolve(feature_set, interner.intern("enum_type"), &defaults.enum_type) {
        Some(resolved) => match &ast.exprs[resolved.value].kind {
            protocore_ast::ExprKind::Path(path) if !path.leading_dot && path.segments.len() == 1 => {
                interner.resolve(path.segments[0]) != "CLOSED"
            }
            _ => edition == Edition::Proto3,
        },
        None => edition == Edition::Proto3,
    };

    if !is_open {
        return;
    }

    let Some(&first_id) = ty.members.first() else { return };
    let Some(ptr) = first_id.to_ptr() else { return };
    let first = ir.members.get(ptr);
    if first.number != 0 {
        let mut diag = Diagnostic::error(format!(
            "the first value of open enum \"{}\" must be zero, found {}",
            interner.resolve(ty.full_name),
            first.number
        ));
        if let Some(first_span) = first.ast {
            diag = diag.with_span(first_span);
        }
        let reason = if edition.is_legacy() {
            "this enum is open because it uses proto3 syntax".to_string()
        } else {
            "this enum is open because `features.enum_type` is not `CLOSED`".to_string()
        };
        diag = diag.with_note(reason);
        report.push(diag);
    }
}
