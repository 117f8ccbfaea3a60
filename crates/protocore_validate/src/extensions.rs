//! Extension range and extension-declaration legality. Field-number
//! range checks against the *values* declared (disjointness, declared
//! extensions falling inside their owning range) are handled here;
//! whether one particular extension's chosen number falls inside any
//! declared range at all is the field-number evaluator's job
//! (`protocore_ir::evaluate_extension_numbers`), which already runs
//! before the validator sees the file.

use protocore_base::{Diagnostic, Interner, Report, Span};
use protocore_ir::{Extend, FieldType, IrArena, ExtensionRange, ReservedRange, Type};

/// Extension ranges and reserved ranges each form their own pairwise-
/// disjoint group (an extension range may legally overlap a reserved
/// range's numbers only in the sense that both mechanisms independently
/// forbid reuse of the same number by an ordinary field — they do not
/// need to be disjoint from *each other*). Neither range kind carries
/// its own per-declaration span in the IR, so collisions are reported
/// against the owning type's span.
pub fn check_ranges_disjoint(ty: &Type, interner: &Interner, report: &mut Report) {
    check_disjoint(&ty.extension_ranges, "extension", ty, interner, report);
    check_reserved_disjoint(&ty.reserved_ranges, ty, interner, report);
}

fn check_disjoint(ranges: &[ExtensionRange], label: &str, ty: &Type, interner: &Interner, report: &mut Report) {
    for i in 0..ranges.len() {
        for j in (i + 1)..ranges.len() {
            let (a, b) = (ranges[i], ranges[j]);
            if a.start <= b.end && b.start <= a.end {
                push(report, ty, format!(
                    "{label} ranges {}-{} and {}-{} overlap in \"{}\"",
                    a.start, a.end, b.start, b.end, interner.resolve(ty.full_name)
                ));
            }
        }
    }
}

fn check_reserved_disjoint(ranges: &[ReservedRange], ty: &Type, interner: &Interner, report: &mut Report) {
    for i in 0..ranges.len() {
        for j in (i + 1)..ranges.len() {
            let (a, b) = (ranges[i], ranges[j]);
            if a.start <= b.end && b.start <= a.end {
                push(report, ty, format!(
                    "reserved ranges {}-{} and {}-{} overlap in \"{}\"",
                    a.start, a.end, b.start, b.end, interner.resolve(ty.full_name)
                ));
            }
        }
    }
}

/// Each `(range, declarations)` pair in `Type::extension_declarations`
/// must: keep every declaration's number inside that one range (a
/// declaration list does not span multiple ranges), carry a number,
/// name, and type for every entry, use an absolute dotted name made of
/// valid identifier components, and leave no number in the range
/// undeclared without at least a warning.
pub fn check_extension_declarations(ty: &Type, interner: &Interner, report: &mut Report) {
    for (range, declarations) in &ty.extension_declarations {
        let mut declared_numbers = std::collections::HashSet::new();
        for decl in declarations {
            if decl.number < range.start || decl.number > range.end {
                push(report, ty, format!(
                    "extension declaration for {} falls outside its range {}-{}",
                    decl.number, range.start, range.end
                ));
            }
            declared_numbers.insert(decl.number);

            let full_name = interner.resolve(decl.full_name);
            if !full_name.starts_with('.') {
                push_at(report, decl.ast, format!("extension declaration name \"{full_name}\" must be an absolute (leading-dot) name"));
            } else if !is_valid_dotted_identifier(&full_name[1..]) {
                push_at(report, decl.ast, format!("extension declaration name \"{full_name}\" is not a valid fully-qualified name"));
            }

            let type_name = interner.resolve(decl.type_name);
            if type_name.is_empty() {
                push_at(report, decl.ast, "extension declaration is missing a type".to_string());
            }
        }

        let missing = (range.start..=range.end).any(|number| !declared_numbers.contains(&number));
        if missing {
            let mut diag = Diagnostic::warning(format!(
                "extension range {}-{} of \"{}\" is missing a declaration for at least one number in the range",
                range.start, range.end, interner.resolve(ty.full_name)
            ));
            if let Some(span) = ty.ast {
                diag = diag.with_span(span);
            }
            report.push(diag);
        }
    }
}

/// When an extension field's number matches a declaration recorded on
/// its extendee, its name, type, cardinality, and reserved flag must
/// agree with that declaration — the declaration is meant to pin down
/// an extension's shape even for readers who cannot see its defining
/// file, so drift between the two is a real bug, not a style nit.
pub fn check_declared_extension_cross_check(extend: &Extend, extendee: &Type, ir: &IrArena, interner: &Interner, report: &mut Report) {
    let declarations: Vec<_> = extendee.extension_declarations.iter().flat_map(|(_, decls)| decls.iter()).collect();
    if declarations.is_empty() {
        return;
    }

    for &member_id in &extend.members {
        let Some(ptr) = member_id.to_ptr() else { continue };
        let member = ir.members.get(ptr);
        let Some(decl) = declarations.iter().find(|d| d.number == member.number) else { continue };

        let member_full_name = format!(".{}", interner.resolve(member.name));
        let declared_name = interner.resolve(decl.full_name);
        if !declared_name.ends_with(&member_full_name) {
            push_member(report, member.ast, format!(
                "extension field \"{}\" does not match its declared name \"{declared_name}\"",
                interner.resolve(member.name)
            ));
        }

        let is_repeated = member.label == protocore_ast::FieldLabel::Repeated;
        if is_repeated != decl.is_repeated {
            push_member(report, member.ast, format!(
                "extension field \"{}\" cardinality does not match its declaration",
                interner.resolve(member.name)
            ));
        }

        if decl.reserved {
            push_member(report, member.ast, format!(
                "extension number {} is reserved by a declaration and must not be defined",
                member.number
            ));
        }

        if let FieldType::Message(type_ref) = member.ty {
            if let Some(ty_ptr) = type_ref.id.to_ptr() {
                let declared_type = interner.resolve(decl.type_name);
                let actual_type = interner.resolve(ir.types.get(ty_ptr).full_name);
                if !declared_type.trim_start_matches('.').is_empty() && declared_type.trim_start_matches('.') != actual_type {
                    push_member(report, member.ast, format!(
                        "extension field \"{}\" type does not match its declared type \"{declared_type}\"",
                        interner.resolve(member.name)
                    ));
                }
            }
        }
    }
}

fn push_member(report: &mut Report, span: Option<Span>, message: String) {
    let mut diag = Diagnostic::error(message);
    if let Some(span) = span {
        diag = diag.with_span(span);
    }
    report.push(diag);
}

fn is_valid_dotted_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.split('.').all(|segment| {
            !segment.is_empty()
                && segment.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

fn push(report: &mut Report, ty: &Type, message: String) {
    let mut diag = Diagnostic::error(message);
    if let Some(span) = ty.ast {
        diag = diag.with_span(span);
    }
    report.push(diag);
}

fn push_at(report: &mut Report, span: Span, message: String) {
    report.push(Diagnostic::error(message).with_span(span));
}
