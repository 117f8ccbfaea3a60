//! Reading option values off the generic `Vec<OptionEntry>` lists the
//! walker attaches to every `Member`/`Type`/`Service`/`Method`/`File`.
//! Everything the validator inspects (`packed`, `lazy`, `deprecated`,
//! `jstype`, `ctype`, `json_name`, `message_set_wire_format`, feature
//! identifiers) is either a bool literal or a bare enum-style path, so
//! these helpers never need the token stream's string metadata.

use protocore_ast::{AstContext, ExprKind, OptionEntry, Path};
use protocore_base::Interner;

/// The last-declared entry in `options` whose path is the single bare
/// segment `name` (a top-level field option, not a feature or extension).
/// Protobuf options may legally repeat in source with the last one
/// winning once merged, so this scans in order and keeps the latest
/// match rather than the first.
pub fn find_option<'a>(options: &'a [OptionEntry], name: &str, interner: &Interner) -> Option<&'a OptionEntry> {
    options.iter().rev().find(|entry| is_bare_path(&entry.path, name, interner))
}

fn is_bare_path(path: &Path, name: &str, interner: &Interner) -> bool {
    path.segments.len() == 1 && interner.resolve(path.segments[0]) == name
}

/// Reads a `bool` literal option value (`packed = true`, `deprecated =
/// false`). Returns `None` if the value is not a bool literal, which the
/// caller should treat as a type-mismatch diagnostic of its own.
pub fn expr_bool(ast: &AstContext, entry: &OptionEntry) -> Option<bool> {
    match ast.exprs[entry.value].kind {
        ExprKind::Bool(b) => Some(b),
        _ => None,
    }
}

/// Reads an enum-style identifier option value (`ctype = CORD`, `jstype
/// = JS_STRING`, `features.field_presence = IMPLICIT`) as its bare name.
/// Returns `None` for a dotted/leading-dot path or any non-path value.
pub fn expr_enum_name(ast: &AstContext, interner: &Interner, entry: &OptionEntry) -> Option<String> {
    match &ast.exprs[entry.value].kind {
        ExprKind::Path(path) if !path.leading_dot && path.segments.len() == 1 => Some(interner.resolve(path.segments[0])),
        _ => None,
    }
}
