//! String interning for identifiers and fully-qualified names.
//!
//! [`Name`] is a 32-bit handle produced by [`Interner::intern`]. Short
//! identifiers (the overwhelming majority of field, message, and package
//! names in real `.proto` files) are packed directly into the handle's bits
//! — no table entry, no lock, no allocation. Everything else falls back to
//! an indirect table shared across the whole compilation session.
//!
//! The sign bit of the handle (read as `i32`) tells the two encodings
//! apart: negative means inline, non-negative means "index into the shared
//! table". The empty string is always the indirect entry at index 0.
//!
//! ```
//! use protocore_base::{Interner, Name};
//!
//! let interner = Interner::new();
//! let short = interner.intern("foo");          // inline, no table entry
//! let long = interner.intern("a_much_longer_identifier"); // indirect
//!
//! assert_eq!(interner.resolve(short), "foo");
//! assert_eq!(interner.resolve(long), "a_much_longer_identifier");
//! assert_ne!(short, long);
//! ```

use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::RwLock;

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_.";
const INLINE_BASE: u32 = 65; // 64 symbols + one "end of string" digit
const INLINE_MAX_LEN: usize = 5;
const INLINE_FLAG: u32 = 1 << 31;

fn char_digit(c: u8) -> Option<u32> {
    ALPHABET.iter().position(|&a| a == c).map(|i| i as u32 + 1)
}

fn digit_char(d: u32) -> u8 {
    ALPHABET[(d - 1) as usize]
}

/// Returns `Some(bits)` if `s` is short enough and drawn from a small
/// enough alphabet to pack inline, per the rules in the module docs.
fn try_encode_inline(s: &str) -> Option<u32> {
    if s.is_empty() || s.len() > INLINE_MAX_LEN || s.ends_with('.') {
        return None;
    }
    let mut value: u32 = 0;
    for &b in s.as_bytes().iter().rev() {
        let digit = char_digit(b)?;
        value = value * INLINE_BASE + digit;
    }
    Some(value | INLINE_FLAG)
}

fn decode_inline(bits: u32) -> String {
    let mut value = bits & !INLINE_FLAG;
    let mut chars = Vec::with_capacity(INLINE_MAX_LEN);
    while value > 0 {
        let digit = value % INLINE_BASE;
        value /= INLINE_BASE;
        chars.push(digit_char(digit));
    }
    chars.reverse();
    String::from_utf8(chars).expect("inline alphabet is ASCII")
}

/// A handle to an interned identifier or fully-qualified name.
///
/// `Name` is `Copy`, compares in O(1), and round-trips through
/// [`Interner::resolve`]. See the module docs for the inline/indirect
/// encoding.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Name(i32);

impl Name {
    /// The empty string, always the indirect entry at table index 0.
    pub const EMPTY: Name = Name(0);

    /// `true` if this name is packed inline (never touches the shared
    /// table). Per the testable property in the design, inline names
    /// always have a negative raw representation.
    #[inline]
    pub fn is_inline(self) -> bool {
        self.0 < 0
    }

    /// The raw `i32` bit pattern, exposed for the sign-bit invariant test.
    pub fn raw(self) -> i32 {
        self.0
    }
}

impl Default for Name {
    fn default() -> Self {
        Name::EMPTY
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_inline() {
            write!(f, "Name::inline({:?})", decode_inline(self.0 as u32))
        } else {
            write!(f, "Name::indirect({})", self.0)
        }
    }
}

struct Table {
    strings: Vec<String>,
    by_string: FxHashMap<String, Name>,
}

/// A process/session-wide string interner.
///
/// Intern tables never delete entries (per the concurrency model:
/// identifiers are never recycled) and are safe to share across the
/// worker pool that lowers files in parallel — `intern`/`resolve` take
/// `&self`, guarded internally by a reader-writer lock.
pub struct Interner {
    table: RwLock<Table>,
}

impl Interner {
    pub fn new() -> Self {
        Interner {
            table: RwLock::new(Table { strings: vec![String::new()], by_string: FxHashMap::default() }),
        }
    }

    /// Interns `s`, returning its handle. Interning the same string twice
    /// (from any thread) returns the same handle.
    pub fn intern(&self, s: &str) -> Name {
        if s.is_empty() {
            return Name::EMPTY;
        }
        if let Some(bits) = try_encode_inline(s) {
            return Name(bits as i32);
        }
        if let Some(existing) = self.table.read().unwrap().by_string.get(s) {
            return *existing;
        }
        let mut table = self.table.write().unwrap();
        if let Some(existing) = table.by_string.get(s) {
            return *existing;
        }
        let index: u32 = table.strings.len().try_into().expect("interner exceeded 2^31 distinct long names");
        assert!(index < INLINE_FLAG, "interner exceeded 2^31 distinct long names");
        let name = Name(index as i32);
        table.strings.push(s.to_string());
        table.by_string.insert(s.to_string(), name);
        name
    }

    /// Resolves a handle back to its string. Panics if `name` is an
    /// indirect handle this interner never produced.
    pub fn resolve(&self, name: Name) -> String {
        if name.is_inline() {
            decode_inline(name.0 as u32)
        } else {
            let table = self.table.read().unwrap();
            table.strings[name.0 as usize].clone()
        }
    }

    /// Looks up an already-interned string without creating a new entry.
    pub fn lookup(&self, s: &str) -> Option<Name> {
        if s.is_empty() {
            return Some(Name::EMPTY);
        }
        if let Some(bits) = try_encode_inline(s) {
            return Some(Name(bits as i32));
        }
        self.table.read().unwrap().by_string.get(s).copied()
    }

    /// Number of strings that live in the indirect table (excluding the
    /// pre-seeded empty string), for diagnostics/metrics.
    pub fn indirect_len(&self) -> usize {
        self.table.read().unwrap().strings.len() - 1
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

/// Compares a [`Name`] to a string literal without always round-tripping
/// through the shared table — inline names decode on the stack.
pub trait NameEq {
    fn is(&self, interner: &Interner, s: &str) -> bool;
}

impl NameEq for Name {
    fn is(&self, interner: &Interner, s: &str) -> bool {
        if self.is_inline() {
            decode_inline(self.0 as u32) == s
        } else {
            interner.resolve(*self) == s
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_short_identifiers() {
        let interner = Interner::new();
        for s in ["a", "Ab", "foo1", "a_b_c", "abcde"] {
            let name = interner.intern(s);
            assert!(name.is_inline(), "{s} should be inline");
            assert_eq!(interner.resolve(name), s);
        }
    }

    #[test]
    fn round_trips_long_identifiers() {
        let interner = Interner::new();
        let s = "a_rather_long_protobuf_field_name_here";
        let name = interner.intern(s);
        assert!(!name.is_inline());
        assert_eq!(interner.resolve(name), s);
    }

    #[test]
    fn empty_string_is_id_zero() {
        let interner = Interner::new();
        let name = interner.intern("");
        assert_eq!(name, Name::EMPTY);
        assert_eq!(name.raw(), 0);
        assert_eq!(interner.resolve(name), "");
    }

    #[test]
    fn inline_ids_are_negative_others_are_not() {
        let interner = Interner::new();
        assert!(interner.intern("x").raw() < 0);
        assert!(interner.intern("abcde").raw() < 0);
        assert!(interner.intern("").raw() >= 0);
        assert!(interner.intern("six_chars").raw() >= 0);
    }

    #[test]
    fn trailing_dot_forces_indirect() {
        // A name ending in '.' (e.g. a partially-qualified path fragment)
        // must not be inline-eligible, or the inline encoding's trailing
        // zero-digit terminator would be ambiguous with a literal '.'.
        let interner = Interner::new();
        let name = interner.intern("a.");
        assert!(!name.is_inline());
        assert_eq!(interner.resolve(name), "a.");
    }

    #[test]
    fn interning_same_string_twice_returns_same_name() {
        let interner = Interner::new();
        let a = interner.intern("some.qualified.name.example");
        let b = interner.intern("some.qualified.name.example");
        assert_eq!(a, b);
    }

    #[test]
    fn lookup_does_not_insert() {
        let interner = Interner::new();
        assert_eq!(interner.lookup("not_interned_yet_and_long_enough"), None);
        assert_eq!(interner.indirect_len(), 0);
        interner.intern("not_interned_yet_and_long_enough");
        assert!(interner.lookup("not_interned_yet_and_long_enough").is_some());
    }

    #[test]
    fn name_eq_matches_without_panicking_on_inline() {
        let interner = Interner::new();
        let name = interner.intern("abc");
        assert!(name.is(&interner, "abc"));
        assert!(!name.is(&interner, "abd"));
    }

    #[test]
    fn distinct_strings_produce_distinct_names() {
        let interner = Interner::new();
        assert_ne!(interner.intern("foo"), interner.intern("bar"));
        assert_ne!(interner.intern("long_name_one"), interner.intern("long_name_two"));
    }
}
