//! A `oneof` with no members is meaningless — there is nothing for its
//! "which field is set" tracking to ever track — so it is rejected
//! outright rather than silently accepted as a zero-variant union.

use protocore_base::{Diagnostic, Interner, Report};
use protocore_ir::Oneof;

pub fn check_oneof(oneof: &Oneof, interner: &Interner, report: &mut Report) {
    if oneof.members.is_empty() && !oneof.synthetic {
        let mut diag = Diagnostic::error(format!("oneof \"{}\" must have at least one field", interner.resolve(oneof.name)));
        if let Some(span) = oneof.ast {
            diag = diag.with_span(span);
        }
        report.push(diag);
    }
}
