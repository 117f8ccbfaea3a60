//! Builds the per-file tree of [`FeatureSet`]s the rest of the
//! validator queries: one set per file, one per message (parented to
//! its enclosing message or the file), one per field/extension when it
//! carries its own `features.*` options. `protocore_ir::features`
//! supplies the resolution algorithm (cache → own → parent → edition
//! default); this module is the part spec.md leaves as "the field being
//! used as a feature" — the concrete default tables for the features
//! this validator actually consults.

use protocore_ast::{AstContext, ExprKind};
use protocore_base::{FileId, Id, Interner, Span};
use protocore_ir::{Edition, EditionDefaultTable, FeatureSet, FeatureSetArena, File, IrArena, Type};
use rustc_hash::FxHashMap;

/// The edition-default tables for every core feature this validator
/// resolves. The default *values* are edition-intrinsic, not per-file,
/// but each default's `ExprAny` handle is only valid against whichever
/// [`AstContext`] allocated it — so in practice `validate_file` rebuilds
/// one of these per file, into that file's own context, rather than
/// sharing a single instance across a session and risking a default
/// resolving to an id from the wrong arena. The rebuild is a handful of
/// `alloc_expr` calls, cheap next to the rest of validation.
pub struct CoreDefaults {
    pub field_presence: EditionDefaultTable,
    pub enum_type: EditionDefaultTable,
    pub repeated_field_encoding: EditionDefaultTable,
    pub utf8_validation: EditionDefaultTable,
    pub message_encoding: EditionDefaultTable,
}

impl CoreDefaults {
    /// descriptor.proto's real `edition_defaults` are far more detailed
    /// (including 2024-only additions); this models the subset this
    /// validator's checks actually branch on: explicit presence vs.
    /// implicit, open vs. closed enums, `PACKED` vs. `EXPANDED` repeated
    /// encoding, and UTF-8 validation strictness.
    pub fn build(interner: &Interner, ast: &mut AstContext, placeholder_file: FileId) -> Self {
        let mut literal = |ident: &str| literal_path(interner, ast, placeholder_file, ident);
        let explicit = literal("EXPLICIT");
        let implicit = literal("IMPLICIT");
        let open = literal("OPEN");
        let closed = literal("CLOSED");
        let packed = literal("PACKED");
        let expanded = literal("EXPANDED");
        let verify = literal("VERIFY");
        let none = literal("NONE");
        let delimited = literal("DELIMITED");
        let length_prefixed = literal("LENGTH_PREFIXED");

        CoreDefaults {
            field_presence: EditionDefaultTable::new(vec![
                (Edition::Proto2, explicit),
                (Edition::Proto3, implicit),
                (Edition::Edition2023, explicit),
            ]),
            enum_type: EditionDefaultTable::new(vec![(Edition::Proto2, closed), (Edition::Proto3, open)]),
            repeated_field_encoding: EditionDefaultTable::new(vec![(Edition::Proto2, packed), (Edition::Edition2023, expanded)]),
            utf8_validation: EditionDefaultTable::new(vec![(Edition::Proto2, none), (Edition::Proto3, verify)]),
            message_encoding: EditionDefaultTable::new(vec![(Edition::Proto2, length_prefixed), (Edition::Edition2023, delimited)]),
        }
    }
}

/// Synthesizes a zero-width `Expr::Path` holding a single bare
/// identifier, used only to give `EditionDefaultTable` an `ExprAny` to
/// hand back. These never originate from real source, so their span is
/// a zero-width placeholder anchored at the file being validated — never
/// rendered, since a feature that resolves to its edition default is by
/// definition not an explicit-value diagnostic.
fn literal_path(interner: &Interner, ast: &mut AstContext, placeholder_file: FileId, ident: &str) -> protocore_ast::ExprAny {
    let name = interner.intern(ident);
    let path = protocore_ast::Path::single(name);
    ast.alloc_expr(protocore_ast::Expr { kind: ExprKind::Path(path), span: Span::new(placeholder_file, 0, 0) })
}

/// The feature-set tree for one file: an `Id<FeatureSet>` per message
/// (nested messages parented to their enclosing message) plus the root
/// file-level set every top-level message's parent chain bottoms out
/// in.
pub struct FileFeatures {
    file_set: Id<FeatureSet>,
    by_type: FxHashMap<Id<Type>, Id<FeatureSet>>,
}

impl FileFeatures {
    /// Walks `file.types` (already parent-before-child, since the
    /// walker appends a type to the arena only after declaring it, and
    /// nested types are declared while defining their enclosing one)
    /// allocating one `FeatureSet` per type in the shared arena.
    pub fn build(file: &File, edition: Edition, ir: &IrArena, arena: &mut FeatureSetArena, interner: &Interner) -> Self {
        let file_set = arena.alloc(FeatureSet::new(edition, None, &file.options, "features", interner));
        let mut by_type = FxHashMap::default();

        for &type_id in &file.types {
            let Some(ptr) = type_id.to_ptr() else { continue };
            let ty = ir.types.get(ptr);
            let parent_set = match ty.parent {
                Some(parent_id) => by_type.get(&parent_id).copied().unwrap_or(file_set),
                None => file_set,
            };
            let set = arena.alloc(FeatureSet::new(edition, Some(parent_set), &ty.options, "features", interner));
            by_type.insert(type_id, set);
        }

        FileFeatures { file_set, by_type }
    }

    pub fn file_set(&self) -> Id<FeatureSet> {
        self.file_set
    }

    /// The feature set a member's own `features.*` field options should
    /// be layered on top of: its container type's set, or the file set
    /// for a type the builder never saw (should not happen for a
    /// well-formed `File`, but a missing mapping is not a validator bug
    /// worth panicking over).
    pub fn set_for_type(&self, ty: Id<Type>) -> Id<FeatureSet> {
        self.by_type.get(&ty).copied().unwrap_or(self.file_set)
    }

    /// Builds (and does not cache beyond this call) a one-off
    /// `FeatureSet` layering `member_options` over the container's set —
    /// cheap enough per-field that caching the field level isn't worth
    /// the bookkeeping, unlike the message level which is shared by many
    /// fields.
    pub fn set_for_member(
        &self,
        container: Id<Type>,
        member_options: &[protocore_ast::OptionEntry],
        edition: Edition,
        arena: &mut FeatureSetArena,
        interner: &Interner,
    ) -> Id<FeatureSet> {
        let parent = self.set_for_type(container);
        arena.alloc(FeatureSet::new(edition, Some(parent), member_options, "features", interner))
    }
}
