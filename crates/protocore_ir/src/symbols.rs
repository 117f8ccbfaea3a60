//! Fully-qualified name resolution.
//!
//! A [`SymbolTable`] maps every `Type`/enum-value/extension full name to
//! the `Id` that owns it, scoped the way Protobuf scoping actually works:
//! a bare reference is resolved by walking outward from the referencing
//! message through its enclosing messages and finally the file's
//! package; a leading-dot path is resolved as an absolute full name with
//! no walk.

use protocore_base::{Id, Name};
use rustc_hash::FxHashMap;

use crate::model::Type;

/// What a resolved full name refers to. Enum values share the same
/// namespace as their sibling fields would (an enum value's name is
/// visible in the scope enclosing the enum, not just inside it), so
/// they get their own entry kind rather than aliasing `Type`.
#[derive(Clone, Copy, Debug)]
pub enum Symbol {
    Type(Id<Type>),
    EnumValue { owner: Id<Type>, index: usize },
}

/// The full set of names visible across one compilation: every type and
/// enum value in every file that participates (the file being compiled
/// plus the transitive closure of its imports), keyed by dotted full
/// name with no leading dot.
#[derive(Default)]
pub struct SymbolTable {
    by_full_name: FxHashMap<Name, Symbol>,
    /// For a given scope (a message, or the file's package, keyed by its
    /// full name), the set of immediate child names declared directly in
    /// it — used to walk outward one level at a time during unqualified
    /// lookup instead of re-splitting strings.
    children: FxHashMap<Name, Vec<Name>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `full_name` as resolving to `symbol`, declared directly
    /// inside `parent_scope` (the enclosing message's full name, or the
    /// package's full name, or `Name::EMPTY` for top-level-no-package).
    pub fn insert(&mut self, parent_scope: Name, full_name: Name, symbol: Symbol) {
        self.by_full_name.insert(full_name, symbol);
        self.children.entry(parent_scope).or_default().push(full_name);
    }

    pub fn resolve_absolute(&self, full_name: Name) -> Option<Symbol> {
        self.by_full_name.get(&full_name).copied()
    }

    /// Finds all full names declared immediately inside `scope` for which
    /// `predicate` on the last path segment holds — used by the
    /// scope-walk resolver, and directly by duplicate-name checks in
    /// validation.
    pub fn children_of(&self, scope: Name) -> &[Name] {
        self.children.get(&scope).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Performs Protobuf's scoped name resolution for a reference written as
/// `text` (already split on `.`) inside `scopes`, the chain of enclosing
/// full names from innermost to outermost (message, ..., package, then
/// `""` for the root). Leading-dot references should not go through
/// this: they resolve directly via [`SymbolTable::resolve_absolute`].
///
/// Protobuf tries each enclosing scope outward in turn and, within a
/// scope, resolves the reference's first segment against that scope's
/// children before falling back to the next scope out — it does not
/// simply concatenate `scope + "." + text` and look the whole thing up
/// in one shot, because a partial match at an outer scope must not
/// shadow a full match at an inner one.
pub fn resolve_scoped(
    table: &SymbolTable,
    interner: &protocore_base::Interner,
    scopes: &[Name],
    segments: &[&str],
) -> Option<Symbol> {
    for &scope in scopes {
        let mut candidate = interner.resolve(scope);
        for (i, seg) in segments.iter().enumerate() {
            if i > 0 || !candidate.is_empty() {
                candidate.push('.');
            }
            candidate.push_str(seg);
        }
        if let Some(name) = interner.lookup(&candidate) {
            if let Some(symbol) = table.resolve_absolute(name) {
                return Some(symbol);
            }
        }
    }
    None
}
