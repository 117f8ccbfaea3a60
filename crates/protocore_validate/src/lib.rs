//! Cross-cutting semantic validation: the checks that only make sense
//! once a file (and, transitively, everything it imports) has finished
//! lowering and field-number evaluation in `protocore-ir`. Each check
//! lives in its own focused module and pushes into a shared [`Report`]
//! rather than failing fast — a file with a dozen validation errors
//! still gets all of them reported in one pass, matching the rest of
//! this front-end's "always return a report" discipline (see
//! `protocore_base::diag`).
//!
//! [`validate_file`] is the single entry point a driver calls per
//! compiled file; everything else here is implementation detail it
//! wires together.

pub mod bridge;
pub mod comments;
pub mod enums;
pub mod extensions;
pub mod features;
pub mod fields;
pub mod file_options;
pub mod message_set;
pub mod oneofs;
pub mod options;
pub mod unused_imports;

pub use bridge::{DescriptorEntry, DescriptorItem, DescriptorSink};
pub use comments::{attribute_leading, collect_comment_runs, AttributedComments, CommentRun};
pub use features::{CoreDefaults, FileFeatures};

use protocore_ast::AstContext;
use protocore_base::{FileId, Interner, Report};
use protocore_ir::{Edition, FeatureSetArena, File, IrArena};

/// Runs every validator check against one already-lowered, already-
/// number-evaluated [`File`], returning the [`FileFeatures`] tree it
/// built along the way (a driver wanting to query a resolved feature
/// value afterward, e.g. to drive descriptor-bridge output, reuses this
/// rather than rebuilding it).
///
/// `ast` must be the same [`AstContext`] the file was parsed and lowered
/// into (`Session::ast_mut` for a `protocore_ir::Session`-backed
/// driver) — every `ExprAny` id this validator reads off the IR (option
/// values, declared numbers) is only meaningful against that context.
/// `file_id` anchors the edition-default placeholder expressions this
/// pass allocates into `ast` (see [`CoreDefaults`]); passing the file's
/// own id keeps those placeholders in the same arena as everything else
/// this function reads.
///
/// `importer_is_lite_runtime` answers "does the file at this canonical
/// path set `optimize_for = LITE_RUNTIME`?" for each of `file`'s direct
/// imports — a driver backed by a `protocore_ir::Session` can answer
/// this by checking whichever of its own already-compiled files match,
/// since within one session every file is validated only after its
/// imports are. A driver that never expects `LITE_RUNTIME` dependencies
/// may pass `&|_| false`.
pub fn validate_file(
    file: &File,
    file_id: FileId,
    ir: &IrArena,
    ast: &mut AstContext,
    interner: &Interner,
    features_arena: &mut FeatureSetArena,
    importer_is_lite_runtime: &dyn Fn(&str) -> bool,
    report: &mut Report,
) -> FileFeatures {
    let edition = file.edition.unwrap_or(Edition::Proto2);
    let defaults = CoreDefaults::build(interner, ast, file_id);
    let file_features = FileFeatures::build(file, edition, ir, features_arena, interner);

    for &type_id in &file.types {
        let Some(ptr) = type_id.to_ptr() else { continue };
        let ty = ir.types.get(ptr);

        extensions::check_ranges_disjoint(ty, interner, report);
        extensions::check_extension_declarations(ty, interner, report);

        if ty.is_enum {
            enums::check_enum(type_id, ty, ir, interner, ast, &file_features, &defaults, features_arena, edition, report);
            continue;
        }

        message_set::check_message_set(ty, ir, interner, edition, report);

        for &oneof_id in &ty.oneofs {
            let Some(oneof_ptr) = oneof_id.to_ptr() else { continue };
            oneofs::check_oneof(ir.oneofs.get(oneof_ptr), interner, report);
        }

        for &member_id in &ty.members {
            let Some(member_ptr) = member_id.to_ptr() else { continue };
            let member = ir.members.get(member_ptr);
            fields::check_packed(member, ast, interner, edition, report);
            fields::check_jstype(member, interner, report);
            fields::check_ctype(member, ast, interner, edition, report);
            fields::check_lazy(member, interner, report);
            fields::check_presence(member, ast, interner, report);
            fields::check_default_value(member, interner, report);
        }
    }

    for &extend_id in &file.extends {
        let Some(ptr) = extend_id.to_ptr() else { continue };
        let extend = ir.extends.get(ptr);
        let Some(extendee_ptr) = extend.extendee.id.to_ptr() else { continue };
        let extendee = ir.types.get(extendee_ptr);
        extensions::check_declared_extension_cross_check(extend, extendee, ir, interner, report);
        message_set::check_message_set_extension(extend, extendee, ir, interner, report);
    }

    file_options::check_java_string_check_utf8(file, ast, interner, edition, report);
    file_options::check_lite_runtime_imports(file, ast, interner, importer_is_lite_runtime, report);
    unused_imports::check_unused_imports(file, ir, report);

    file_features
}

#[cfg(test)]
mod tests {
    use protocore_ir::{Session, SessionConfig};

    /// Compiles `source` as `t.proto` and runs the full validator over
    /// it, returning the combined lowering + validation report.
    fn compile_and_validate(source: &str) -> protocore_base::Report {
        let mut session = Session::new(SessionConfig::default());
        let (_, mut report) = session.compile_source("t.proto", source);
        let file = session.compiled("t.proto").expect("file compiled").file.clone();
        let file_id = session.file_id("t.proto").expect("file registered");
        let ast = session.asts.get_mut("t.proto").expect("file parsed");
        super::validate_file(&file, file_id, &session.arena, ast, &session.interner, &mut session.features, &|_| false, &mut report);
        report
    }

    #[test]
    fn duplicate_field_tags_are_caught_before_validation_even_runs() {
        let report = compile_and_validate("syntax = \"proto3\"; message M { int32 x = 1; int32 y = 1; }\n");
        assert!(report.is_failure());
    }

    #[test]
    fn empty_enum_is_rejected() {
        let report = compile_and_validate("syntax = \"proto3\"; enum E {}\n");
        assert!(report.is_failure());
    }

    #[test]
    fn proto3_open_enum_must_start_at_zero() {
        let report = compile_and_validate("syntax = \"proto3\"; enum E { A = 1; }\n");
        assert!(report.is_failure());
        assert!(report.iter().any(|d| d.message.contains("must be zero")));
    }

    #[test]
    fn proto2_closed_enum_may_start_anywhere() {
        let report = compile_and_validate("syntax = \"proto2\"; enum E { A = 1; }\n");
        assert!(!report.is_failure(), "{:?}", report.clone().into_vec());
    }

    #[test]
    fn empty_oneof_is_rejected() {
        let report = compile_and_validate("syntax = \"proto3\"; message M { oneof kind {} }\n");
        assert!(report.is_failure());
        assert!(report.iter().any(|d| d.message.contains("must have at least one field")));
    }

    #[test]
    fn packed_is_rejected_in_editions_mode() {
        let report = compile_and_validate("edition = \"2023\"; message M { repeated int32 x = 1 [packed = true]; }\n");
        assert!(report.is_failure());
        assert!(report.iter().any(|d| d.message.contains("editions mode")));
    }

    #[test]
    fn packed_on_a_message_field_is_rejected() {
        let report = compile_and_validate(
            "syntax = \"proto2\"; message Inner {} message M { repeated Inner x = 1 [packed = true]; }\n",
        );
        assert!(report.is_failure());
    }

    #[test]
    fn message_set_without_fields_is_accepted() {
        let report = compile_and_validate(
            "syntax = \"proto2\"; message M { option message_set_wire_format = true; extensions 4 to 100; }\n",
        );
        assert!(!report.is_failure(), "{:?}", report.into_vec());
    }

    #[test]
    fn message_set_with_a_field_is_rejected() {
        let report = compile_and_validate(
            "syntax = \"proto2\"; message M { option message_set_wire_format = true; extensions 4 to 100; optional int32 x = 1; }\n",
        );
        assert!(report.is_failure());
    }

    #[test]
    fn default_value_is_accepted_on_a_proto2_optional_scalar() {
        let report = compile_and_validate("syntax = \"proto2\"; message M { optional int32 x = 1 [default = 5]; }\n");
        assert!(!report.is_failure(), "{:?}", report.into_vec());
    }

    #[test]
    fn default_value_is_rejected_on_a_proto3_field() {
        let report = compile_and_validate("syntax = \"proto3\"; message M { int32 x = 1 [default = 5]; }\n");
        assert!(report.is_failure());
        assert!(report.iter().any(|d| d.message.contains("explicit presence")));
    }

    #[test]
    fn default_value_is_rejected_on_a_repeated_field() {
        let report = compile_and_validate("syntax = \"proto2\"; message M { repeated int32 x = 1 [default = 5]; }\n");
        assert!(report.is_failure());
        assert!(report.iter().any(|d| d.message.contains("repeated fields cannot")));
    }

    #[test]
    fn unused_import_is_a_warning() {
        // `compile_tree` needs an `Opener` to read `t.proto` itself, so
        // it is registered through a tiny in-memory opener rather than
        // `compile_source`, which never resolves imports into
        // `File::imports` at all (see its own doc comment).
        struct MemoryOpener(&'static str);
        impl protocore_ir::Opener for MemoryOpener {
            fn open(&self, path: &str) -> Result<protocore_ir::OpenedSource, protocore_base::OpenError> {
                if path == "t.proto" {
                    Ok(protocore_ir::OpenedSource { path: path.to_string(), contents: self.0.to_string() })
                } else {
                    Err(protocore_base::OpenError::NotFound(path.to_string()))
                }
            }
        }

        let mut session = Session::new(SessionConfig::default());
        let source = "syntax = \"proto3\";\nimport \"google/protobuf/any.proto\";\nmessage M { int32 x = 1; }\n";
        let (entry_path, mut report) = session.compile_tree(&MemoryOpener(source), "t.proto");
        let file = session.compiled(&entry_path).expect("file compiled").file.clone();
        let file_id = session.file_id(&entry_path).expect("file registered");
        let ast = session.asts.get_mut(&entry_path).expect("file parsed");
        super::validate_file(&file, file_id, &session.arena, ast, &session.interner, &mut session.features, &|_| false, &mut report);

        assert!(report.iter().any(|d| d.message.contains("is unused")));
        assert!(!report.is_failure(), "{:?}", report.clone().into_vec());
    }
}
