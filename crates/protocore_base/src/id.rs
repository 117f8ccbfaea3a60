//! Arena allocation with 32-bit compressed pointers.
//!
//! Every AST and IR node lives in a typed, growable [`Arena`] and is
//! referenced by a [`Ptr`] — a 32-bit index, not a real pointer. This keeps
//! node references `Copy`, keeps cross-node back-references cheap integers
//! instead of `Rc`/`RefCell` graphs, and lets a whole file's arenas be
//! dropped or rebuilt as a unit.
//!
//! [`Id`] wraps a `Ptr` with a `+1` bias so that the all-zero value means
//! "absent" — useful for fields like `Member.oneof` that need a sentinel
//! without paying for an `Option` discriminant.
//!
//! ## Example
//!
//! ```
//! use protocore_base::{Arena, Ptr};
//!
//! let mut arena: Arena<String> = Arena::new();
//! let a = arena.alloc("hello".to_string());
//! let b = arena.alloc("world".to_string());
//!
//! assert_eq!(arena[a], "hello");
//! assert_eq!(arena[b], "world");
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// A 32-bit compressed pointer into an [`Arena<T>`].
///
/// `Ptr` is `Copy`, carries no lifetime, and is only meaningful relative to
/// the arena that produced it — indexing a `Ptr` from a different arena of
/// the same `T` silently returns the wrong node (or panics if out of
/// bounds). Callers that need cross-arena safety should wrap `Ptr` in a
/// type that also records which context it belongs to.
pub struct Ptr<T> {
    raw: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Ptr<T> {
    #[inline]
    fn new(raw: u32) -> Self {
        Ptr { raw, _marker: PhantomData }
    }

    /// The raw zero-based index backing this pointer.
    #[inline]
    pub fn index(self) -> u32 {
        self.raw
    }
}

impl<T> Clone for Ptr<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Ptr<T> {}
impl<T> PartialEq for Ptr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}
impl<T> Eq for Ptr<T> {}
impl<T> Hash for Ptr<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}
impl<T> fmt::Debug for Ptr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ptr({})", self.raw)
    }
}

/// A `+1`-biased [`Ptr`] in which the all-zero value means "absent".
///
/// Unlike `Option<Ptr<T>>`, `Id<T>` is a single `u32` with no extra
/// discriminant, so it is cheap to store densely (e.g. as a field on an IR
/// node that is usually, but not always, present).
pub struct Id<T> {
    // 0 = null; otherwise Ptr::index() + 1.
    biased: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Id<T> {
    /// The null sentinel. `Id::NULL.is_null()` is always `true`.
    pub const NULL: Id<T> = Id { biased: 0, _marker: PhantomData };

    /// Wraps a `Ptr` as a present `Id`.
    #[inline]
    pub fn of(ptr: Ptr<T>) -> Self {
        Id { biased: ptr.index().checked_add(1).expect("arena overflowed u32 index space"), _marker: PhantomData }
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self.biased == 0
    }

    /// Recovers the underlying `Ptr`, or `None` if this `Id` is null.
    #[inline]
    pub fn to_ptr(self) -> Option<Ptr<T>> {
        if self.biased == 0 {
            None
        } else {
            Some(Ptr::new(self.biased - 1))
        }
    }

    /// The raw biased representation, for cases (like `Member.oneof`'s
    /// `-kind` encoding) that need to fold extra sentinels into the same
    /// 32 bits as this id.
    #[inline]
    pub fn raw(self) -> u32 {
        self.biased
    }

    #[inline]
    pub fn from_raw(raw: u32) -> Self {
        Id { biased: raw, _marker: PhantomData }
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Id<T> {}
impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.biased == other.biased
    }
}
impl<T> Eq for Id<T> {}
impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.biased.hash(state);
    }
}
impl<T> Default for Id<T> {
    fn default() -> Self {
        Self::NULL
    }
}
impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "Id(null)")
        } else {
            write!(f, "Id({})", self.biased - 1)
        }
    }
}
impl<T> From<Ptr<T>> for Id<T> {
    fn from(ptr: Ptr<T>) -> Self {
        Id::of(ptr)
    }
}

/// A typed, append-only store of `T`, indexed by [`Ptr<T>`].
///
/// Arenas are single-writer: one pass (the parser, the walker) owns an
/// arena mutably while building it; after that pass completes, only shared
/// references are handed out. There is no reclamation — nodes live until
/// the whole arena (and its owning file/context) is dropped.
pub struct Arena<T> {
    items: Vec<T>,
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Arena { items: Vec::new() }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Arena { items: Vec::with_capacity(cap) }
    }

    /// Appends `value` and returns a stable pointer to it.
    pub fn alloc(&mut self, value: T) -> Ptr<T> {
        let raw: u32 = self.items.len().try_into().expect("arena exceeded u32 index space");
        self.items.push(value);
        Ptr::new(raw)
    }

    pub fn get(&self, ptr: Ptr<T>) -> &T {
        &self.items[ptr.raw as usize]
    }

    pub fn get_mut(&mut self, ptr: Ptr<T>) -> &mut T {
        &mut self.items[ptr.raw as usize]
    }

    pub fn try_get(&self, ptr: Ptr<T>) -> Option<&T> {
        self.items.get(ptr.raw as usize)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Ptr<T>, &T)> {
        self.items.iter().enumerate().map(|(i, v)| (Ptr::new(i as u32), v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Ptr<T>, &mut T)> {
        self.items.iter_mut().enumerate().map(|(i, v)| (Ptr::new(i as u32), v))
    }

    pub fn values(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<Ptr<T>> for Arena<T> {
    type Output = T;
    fn index(&self, ptr: Ptr<T>) -> &T {
        self.get(ptr)
    }
}

impl<T> IndexMut<Ptr<T>> for Arena<T> {
    fn index_mut(&mut self, ptr: Ptr<T>) -> &mut T {
        self.get_mut(ptr)
    }
}

impl<T> Index<Id<T>> for Arena<T> {
    type Output = T;
    fn index(&self, id: Id<T>) -> &T {
        self.get(id.to_ptr().expect("indexed arena with a null Id"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_returns_stable_pointers() {
        let mut arena: Arena<i32> = Arena::new();
        let a = arena.alloc(42);
        let b = arena.alloc(7);
        assert_eq!(arena[a], 42);
        assert_eq!(arena[b], 7);
        assert_ne!(a, b);
    }

    #[test]
    fn id_null_round_trips() {
        let id: Id<i32> = Id::NULL;
        assert!(id.is_null());
        assert_eq!(id.to_ptr(), None);
    }

    #[test]
    fn id_of_ptr_is_not_null() {
        let mut arena: Arena<i32> = Arena::new();
        let ptr = arena.alloc(10);
        let id = Id::of(ptr);
        assert!(!id.is_null());
        assert_eq!(id.to_ptr(), Some(ptr));
    }

    #[test]
    fn id_biases_by_one() {
        let mut arena: Arena<i32> = Arena::new();
        let first = arena.alloc(1);
        assert_eq!(first.index(), 0);
        let id = Id::of(first);
        assert_eq!(id.raw(), 1);
    }

    #[test]
    fn get_mut_allows_in_place_update() {
        let mut arena: Arena<Vec<i32>> = Arena::new();
        let ptr = arena.alloc(vec![1, 2, 3]);
        arena.get_mut(ptr).push(4);
        assert_eq!(arena[ptr], vec![1, 2, 3, 4]);
    }

    #[test]
    fn iter_yields_pointer_value_pairs_in_order() {
        let mut arena: Arena<&str> = Arena::new();
        arena.alloc("a");
        arena.alloc("b");
        let collected: Vec<_> = arena.iter().map(|(p, v)| (p.index(), *v)).collect();
        assert_eq!(collected, vec![(0, "a"), (1, "b")]);
    }

    #[test]
    fn try_get_is_none_out_of_bounds() {
        let arena: Arena<i32> = Arena::new();
        let mut other: Arena<i32> = Arena::new();
        let ptr = other.alloc(1);
        assert_eq!(arena.try_get(ptr), None);
    }
}
