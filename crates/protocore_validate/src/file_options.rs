//! File-level option legality: `java_string_check_utf8`'s editions
//! rewrite, and the `LITE_RUNTIME` import restriction.

use protocore_ast::AstContext;
use protocore_base::{Diagnostic, Interner, Report, Suggestion};
use protocore_ir::{Edition, File};

use crate::options::{expr_bool, expr_enum_name, find_option};

/// `java_string_check_utf8` is a proto2/proto3 file option; editions
/// express the same knob as `features.(pb.java).utf8_validation`, so the
/// bare option is rejected there with a suggested rewrite, mirroring
/// `fields::check_ctype`'s treatment of `ctype`.
pub fn check_java_string_check_utf8(file: &File, ast: &AstContext, interner: &Interner, edition: Edition, report: &mut Report) {
    let Some(entry) = find_option(&file.options, "java_string_check_utf8", interner) else { return };

    if !edition.is_legacy() {
        let mut diag = Diagnostic::error("cannot set `java_string_check_utf8` in editions mode").with_span(entry.span);
        diag = diag.with_suggestion(Suggestion::new(entry.span, "features.(pb.java).utf8_validation = VERIFY", "replace with the editions feature"));
        report.push(diag);
        return;
    }

    if expr_bool(ast, entry).is_none() {
        report.push(Diagnostic::error("`java_string_check_utf8` must be a bool literal").with_span(entry.span));
    }
}

/// Whether `file` itself declares `optimize_for = LITE_RUNTIME`.
pub fn is_lite_runtime(file: &File, ast: &AstContext, interner: &Interner) -> bool {
    find_option(&file.options, "optimize_for", interner)
        .and_then(|entry| expr_enum_name(ast, interner, entry))
        .as_deref()
        == Some("LITE_RUNTIME")
}

/// A `LITE_RUNTIME` file strips the reflection support its generated
/// code would otherwise need to describe its own messages; an importer
/// that has not also opted into `LITE_RUNTIME` cannot offer full
/// reflection over a dependency it cannot introspect, so the mix is
/// rejected rather than silently downgrading the importer.
pub fn check_lite_runtime_imports(
    file: &File,
    ast: &AstContext,
    interner: &Interner,
    importer_is_lite_runtime: &dyn Fn(&str) -> bool,
    report: &mut Report,
) {
    if is_lite_runtime(file, ast, interner) {
        return;
    }
    for import in &file.imports {
        if import.transitive {
            continue;
        }
        if importer_is_lite_runtime(&import.canonical_path) {
            let mut diag = Diagnostic::error(format!(
                "import of \"{}\" is not allowed: it sets `optimize_for = LITE_RUNTIME` but this file does not",
                import.canonical_path
            ));
            if let Some(span) = import.ast {
                diag = diag.with_span(span);
            }
            report.push(diag);
        }
    }
}
