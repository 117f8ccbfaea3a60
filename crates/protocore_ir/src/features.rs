//! Editions feature resolution.
//!
//! A [`FeatureSet`] is `(options_message, parent)`: looking up one named
//! feature first checks this set's own cache, then its own options
//! message, then recurses into `parent`, and only at the root falls back
//! to the feature's declared per-edition defaults. The walk is written
//! iteratively (a loop climbing `parent` links), not recursively, since
//! the chain can be as deep as the message nesting it mirrors and this
//! runs once per field per feature queried.

use protocore_ast::{ExprAny, ExprKind, OptionEntry};
use protocore_base::{Id, Name};
use rustc_hash::FxHashMap;

use crate::model::Edition;

/// A resolved feature value together with how it was obtained, for
/// diagnostics that want to say e.g. "this falls back to the edition
/// 2023 default" rather than silently using it.
#[derive(Clone, Copy, Debug)]
pub struct Resolved {
    pub value: ExprAny,
    pub is_inherited: bool,
    pub is_default: bool,
}

#[derive(Clone, Copy, Debug, Default)]
struct CacheEntry {
    value: Option<ExprAny>,
    is_inherited: bool,
    is_default: bool,
}

/// One feature set node: this entity's own `features` options plus a
/// link to the enclosing scope's feature set (file -> message -> nested
/// message -> field). The root file-level set has no parent and bottoms
/// out in [`EditionDefaultTable`] lookups.
pub struct FeatureSet {
    /// This entity's own feature option entries, keyed by the feature's
    /// dotted field name (bare for a core `FeatureSet` field, or the
    /// parenthesized-extension spelling produced by the parser for a
    /// custom feature like `(pb.cpp).string_type`).
    own: FxHashMap<Name, ExprAny>,
    parent: Option<Id<FeatureSet>>,
    edition: Edition,
    cache: FxHashMap<Name, CacheEntry>,
}

impl FeatureSet {
    pub fn new(edition: Edition, parent: Option<Id<FeatureSet>>, options: &[OptionEntry], feature_path_prefix: &str, interner: &protocore_base::Interner) -> Self {
        let mut own = FxHashMap::default();
        for entry in options {
            if let Some(rest) = feature_option_suffix(&entry.path, feature_path_prefix, interner) {
                own.insert(interner.intern(&rest), entry.value);
            }
        }
        FeatureSet { own, parent, edition, cache: FxHashMap::default() }
    }

    pub fn edition(&self) -> Edition {
        self.edition
    }
}

/// If `path` is `prefix.<rest>` (e.g. `prefix = "features"`, path
/// `features.repeated_field_encoding`), returns `rest`; custom features
/// spelled as a parenthesized extension (`(pb.cpp).string_type`) are
/// matched the same way once the parser has joined them into one segment
/// during option-name handling.
fn feature_option_suffix(path: &protocore_ast::Path, prefix: &str, interner: &protocore_base::Interner) -> Option<String> {
    if path.segments.is_empty() {
        return None;
    }
    let first = interner.resolve(path.segments[0]);
    if first != prefix {
        return None;
    }
    let rest: Vec<String> = path.segments[1..].iter().map(|s| interner.resolve(*s)).collect();
    if rest.is_empty() {
        None
    } else {
        Some(rest.join("."))
    }
}

/// The declared per-edition defaults for one feature field, sorted
/// ascending by edition: the greatest default whose edition is ≤ the
/// current edition wins, found by binary search over the sorted list.
pub struct EditionDefaultTable {
    defaults: Vec<(Edition, ExprAny)>,
}

impl EditionDefaultTable {
    /// `defaults` need not already be sorted; this sorts them once at
    /// construction so lookup can binary-search.
    pub fn new(mut defaults: Vec<(Edition, ExprAny)>) -> Self {
        defaults.sort_by_key(|(edition, _)| *edition);
        EditionDefaultTable { defaults }
    }

    pub fn lookup(&self, edition: Edition) -> Option<ExprAny> {
        let idx = self.defaults.partition_point(|(e, _)| *e <= edition);
        if idx == 0 {
            None
        } else {
            Some(self.defaults[idx - 1].1)
        }
    }
}

/// An arena of [`FeatureSet`]s for one file, addressed by [`Id`] so a
/// `Member`/`Type`/`File` node can carry a cheap `Id<FeatureSet>` back-
/// reference instead of an owned tree.
#[derive(Default)]
pub struct FeatureSetArena {
    sets: protocore_base::Arena<FeatureSet>,
}

impl FeatureSetArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, set: FeatureSet) -> Id<FeatureSet> {
        Id::of(self.sets.alloc(set))
    }

    /// Resolves `feature` starting at `start`, walking outward through
    /// `parent` links and finally `defaults`, iteratively rather than
    /// recursively. The cache is populated only at `start` (each level
    /// caches its own resolution independently, so a shared ancestor
    /// resolved once for one descendant is recomputed — but still
    /// cached — for another).
    pub fn resolve(&mut self, start: Id<FeatureSet>, feature: Name, defaults: &EditionDefaultTable) -> Option<Resolved> {
        if let Some(cached) = self.sets.get(start.to_ptr()?).cache.get(&feature) {
            if let Some(value) = cached.value {
                return Some(Resolved { value, is_inherited: cached.is_inherited, is_default: cached.is_default });
            }
        }

        let mut chain = vec![start];
        let mut cursor = start;
        loop {
            let set = self.sets.get(cursor.to_ptr().expect("FeatureSet id in chain must not be null"));
            match set.parent {
                Some(parent) => {
                    chain.push(parent);
                    cursor = parent;
                }
                None => break,
            }
        }

        let mut found: Option<(ExprAny, usize)> = None;
        for (depth, &id) in chain.iter().enumerate() {
            let set = self.sets.get(id.to_ptr().expect("FeatureSet id must not be null"));
            if let Some(&value) = set.own.get(&feature) {
                found = Some((value, depth));
                break;
            }
        }

        let resolved = match found {
            Some((value, depth)) => Resolved { value, is_inherited: depth > 0, is_default: false },
            None => {
                let edition = self.sets.get(chain.last().copied().unwrap().to_ptr().unwrap()).edition;
                let value = defaults.lookup(edition)?;
                Resolved { value, is_inherited: true, is_default: true }
            }
        };

        let set = self.sets.get_mut(start.to_ptr().unwrap());
        set.cache.insert(
            feature,
            CacheEntry { value: Some(resolved.value), is_inherited: resolved.is_inherited, is_default: resolved.is_default },
        );
        Some(resolved)
    }
}

/// Extracts the extension's sub-message before a feature lookup: if the
/// extension is non-zero, the resolver must descend into the
/// extension's sub-message first. Custom features are always spelled
/// `(ext.path).field`, so this just walks one more `MessageLiteral`
/// level when the resolved value turns out to be an aggregate rather
/// than a scalar/path leaf.
pub fn descend_into_extension(ast: &protocore_ast::AstContext, value: ExprAny, sub_field: Name, interner: &protocore_base::Interner) -> Option<ExprAny> {
    match &ast.exprs[value].kind {
        ExprKind::MessageLiteral(fields) => fields.iter().find(|(name, _)| *name == sub_field).map(|(_, v)| *v),
        _ => None,
    }
}

