//! Unused-import detection. A direct (non-transitive, non-`weak`) import
//! that no type reference in the file ever resolves into is flagged —
//! weak imports are allowed to go unused by design (they exist so a
//! dependency may vanish without breaking the importer), and a
//! transitive entry was never spelled as an `import` statement in this
//! file's own source, so there is nothing here to suggest deleting.

use protocore_ast::ImportKind;
use protocore_base::{Diagnostic, Report, Suggestion};
use protocore_ir::{FieldType, File, IrArena, TypeRef};

pub fn check_unused_imports(file: &File, ir: &IrArena, report: &mut Report) {
    if file.imports.is_empty() {
        return;
    }
    let mut used = vec![false; file.imports.len()];
    mark_used_in_file(file, ir, &mut used);

    for (index, import) in file.imports.iter().enumerate() {
        if import.transitive || import.kind == ImportKind::Weak || used[index] {
            continue;
        }
        let mut diag = Diagnostic::warning(format!("import of \"{}\" is unused", import.canonical_path));
        if let Some(span) = import.ast {
            diag = diag.with_span(span);
            diag = diag.with_suggestion(Suggestion::new(span, "", "remove this unused import"));
        }
        report.push(diag);
    }
}

fn mark_used_in_file(file: &File, ir: &IrArena, used: &mut [bool]) {
    let mut mark = |r: TypeRef| {
        if r.file.0 > 0 {
            let index = (r.file.0 - 1) as usize;
            if let Some(slot) = used.get_mut(index) {
                *slot = true;
            }
        }
    };

    for &type_id in &file.types {
        let Some(ptr) = type_id.to_ptr() else { continue };
        let ty = ir.types.get(ptr);
        for &member_id in &ty.members {
            let Some(member_ptr) = member_id.to_ptr() else { continue };
            if let Some(r) = member_type_ref(ir.members.get(member_ptr).ty) {
                mark(r);
            }
        }
    }

    for &extend_id in &file.extends {
        let Some(ptr) = extend_id.to_ptr() else { continue };
        let extend = ir.extends.get(ptr);
        mark(extend.extendee);
        for &member_id in &extend.members {
            let Some(member_ptr) = member_id.to_ptr() else { continue };
            if let Some(r) = member_type_ref(ir.members.get(member_ptr).ty) {
                mark(r);
            }
        }
    }

    for &service_id in &file.services {
        let Some(ptr) = service_id.to_ptr() else { continue };
        let service = ir.services.get(ptr);
        for &method_id in &service.methods {
            let Some(method_ptr) = method_id.to_ptr() else { continue };
            let method = ir.methods.get(method_ptr);
            mark(method.input);
            mark(method.output);
        }
    }
}

fn member_type_ref(ty: FieldType) -> Option<TypeRef> {
    match ty {
        FieldType::Message(r) | FieldType::Enum(r) | FieldType::Group(r) => Some(r),
        FieldType::Scalar(_) => None,
    }
}
