//! The three-entity IR data model: [`File`], [`Type`], [`Member`], plus
//! [`Oneof`], [`Extend`], [`Service`]/[`Method`], and the small set of
//! value types (presence, wire encoding, cross-file references) the
//! invariants below are stated in terms of.

use protocore_ast::ExprAny;
use protocore_base::{Id, Name, Span};

/// Post-proto3 editions. Ordered: a feature's edition-default lookup
/// picks the greatest default whose edition is `<=` the file's.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub enum Edition {
    Proto2,
    Proto3,
    Edition2023,
    Edition2024,
}

impl Edition {
    pub fn from_str_token(s: &str) -> Option<Edition> {
        match s {
            "2023" => Some(Edition::Edition2023),
            "2024" => Some(Edition::Edition2024),
            _ => None,
        }
    }

    /// `true` for the two legacy syntaxes, where per-field labels and
    /// options (not `features.*`) carry what editions expresses as
    /// features.
    pub fn is_legacy(self) -> bool {
        matches!(self, Edition::Proto2 | Edition::Proto3)
    }
}

/// A cross-file reference: `0` means "this file", `-1`
/// means "a predeclared primitive" (not used for scalar types, which
/// never need a `Type` node, but reserved for built-ins modeled as
/// `Type`s), and `n > 0` means `imports[n - 1]` of the owning file.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct FileRef(pub i32);

impl FileRef {
    pub const CURRENT: FileRef = FileRef(0);
    pub const PREDECLARED: FileRef = FileRef(-1);

    pub fn import(index: usize) -> FileRef {
        FileRef(index as i32 + 1)
    }

    pub fn is_current(self) -> bool {
        self.0 == 0
    }
}

/// A reference to a [`Type`], possibly in another file. Rebinding from
/// one file's context into another's remaps `file` through the file's
/// import table; `id` is only meaningful relative to whichever file
/// `file` resolves to.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct TypeRef {
    pub file: FileRef,
    pub id: Id<Type>,
}

impl TypeRef {
    pub fn local(id: Id<Type>) -> TypeRef {
        TypeRef { file: FileRef::CURRENT, id }
    }
}

/// A field's scalar/message/enum/group shape. Map fields are repeated
/// `Message` fields pointing at a synthesized entry type; there is no
/// separate `Map` variant here because by the time the walker produces a
/// `Member` the sugar has already been desugared.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FieldType {
    Scalar(protocore_ast::ScalarType),
    Message(TypeRef),
    Enum(TypeRef),
    /// A proto2 `group`: wire-encoded `Delimited`, per the §9 Open
    /// Question resolution. The referenced type is the inline nested
    /// message the walker synthesizes for the group body.
    Group(TypeRef),
}

impl FieldType {
    pub fn is_message_or_group(self) -> bool {
        matches!(self, FieldType::Message(_) | FieldType::Group(_))
    }

    pub fn wire_encoding(self) -> WireEncoding {
        match self {
            FieldType::Group(_) => WireEncoding::Delimited,
            FieldType::Message(_) => WireEncoding::LengthPrefixed,
            FieldType::Scalar(s) => WireEncoding::of_scalar(s),
            FieldType::Enum(_) => WireEncoding::Varint,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum WireEncoding {
    Varint,
    Fixed32,
    Fixed64,
    LengthPrefixed,
    Delimited,
}

impl WireEncoding {
    fn of_scalar(s: protocore_ast::ScalarType) -> WireEncoding {
        use protocore_ast::ScalarType::*;
        match s {
            Int32 | Int64 | Uint32 | Uint64 | Sint32 | Sint64 | Bool => WireEncoding::Varint,
            Fixed32 | Sfixed32 | Float => WireEncoding::Fixed32,
            Fixed64 | Sfixed64 | Double => WireEncoding::Fixed64,
            String | Bytes => WireEncoding::LengthPrefixed,
        }
    }
}

/// How a field's presence is tracked on the wire. See the glossary: this
/// is the decoded form of `Member`'s packed `oneof`/presence slot.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Presence {
    Unknown,
    Implicit,
    Explicit,
    Shared,
    Required,
    Repeated,
}

impl Presence {
    fn discriminant(self) -> i32 {
        match self {
            Presence::Unknown => 1,
            Presence::Implicit => 2,
            Presence::Explicit => 3,
            Presence::Shared => 4,
            Presence::Required => 5,
            Presence::Repeated => 6,
        }
    }

    fn from_discriminant(d: i32) -> Presence {
        match d {
            1 => Presence::Unknown,
            2 => Presence::Implicit,
            3 => Presence::Explicit,
            4 => Presence::Shared,
            5 => Presence::Required,
            6 => Presence::Repeated,
            other => unreachable!("invalid presence discriminant {other}"),
        }
    }
}

/// One field on a message, enum value, or extension. Extensions carry
/// both `parent` (where syntactically declared, inside an `extend`
/// block which may live in any message) and `container` (the extendee)
/// — the invariant `Container(extension) == extendee(extend_block)`
/// always holds.
#[derive(Clone, Debug)]
pub struct Member {
    pub name: Name,
    pub json_name: Name,
    /// Zero until the evaluator runs; unique within the
    /// container afterward, and never in `[19000, 19999]` for
    /// non-extensions.
    pub number: i32,
    pub ty: FieldType,
    pub label: protocore_ast::FieldLabel,
    /// `None` for enum values. Packs presence and oneof membership: see
    /// [`Member::presence`]/[`Member::oneof`].
    oneof_slot: i32,
    /// The message/enum this member is declared directly inside.
    pub parent: Id<Type>,
    /// For extensions, the extendee; for ordinary members, equal to
    /// `parent`.
    pub container: Id<Type>,
    /// For a map-entry field (the field whose type is a synthesized
    /// `FooEntry`), the `Type` that entry is — set by the walker so the
    /// validator and descriptor bridge can recognize map sugar.
    pub map_entry: Option<Id<Type>>,
    pub default_value: Option<ExprAny>,
    pub declared_number_expr: Option<ExprAny>,
    pub options: Vec<protocore_ast::OptionEntry>,
    /// `None` only for synthesized members (map-entry `key`/`value`)
    /// that have no corresponding source declaration.
    pub ast: Option<Span>,
}

impl Member {
    /// Builds a member with no declared number/default/options yet and
    /// no backing AST node (appropriate for a synthesized member; the
    /// walker overwrites `ast`/`default_value`/`declared_number_expr`/
    /// `options` directly afterward for a source-backed one, since those
    /// fields are `pub`).
    pub fn new(
        name: Name,
        json_name: Name,
        ty: FieldType,
        label: protocore_ast::FieldLabel,
        presence: Presence,
        parent: Id<Type>,
        container: Id<Type>,
    ) -> Self {
        let mut member = Member {
            name,
            json_name,
            number: 0,
            ty,
            label,
            oneof_slot: 0,
            parent,
            container,
            map_entry: None,
            default_value: None,
            declared_number_expr: None,
            options: Vec::new(),
            ast: None,
        };
        member.set_presence(presence);
        member
    }

    pub fn presence(&self) -> Presence {
        if self.oneof_slot >= 0 {
            Presence::Shared
        } else {
            Presence::from_discriminant(-self.oneof_slot)
        }
    }

    pub fn oneof(&self) -> Option<Id<Oneof>> {
        if self.oneof_slot > 0 {
            Some(Id::from_raw(self.oneof_slot as u32))
        } else {
            None
        }
    }

    pub fn set_presence(&mut self, presence: Presence) {
        self.oneof_slot = -presence.discriminant();
    }

    pub fn set_oneof(&mut self, oneof: Id<Oneof>) {
        self.oneof_slot = oneof.raw() as i32;
    }

    pub fn is_extension(&self) -> bool {
        self.container != self.parent
    }
}

/// A `oneof` block: belongs to exactly one message and owns an ordered
/// list of member ids.
#[derive(Clone, Debug)]
pub struct Oneof {
    pub name: Name,
    pub parent: Id<Type>,
    pub members: Vec<Id<Member>>,
    pub synthetic: bool,
    pub ast: Option<Span>,
}

/// An `extend` block: owns one or more extension members, all sharing
/// the same extendee.
#[derive(Clone, Debug)]
pub struct Extend {
    pub extendee: TypeRef,
    pub members: Vec<Id<Member>>,
    pub ast: Span,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ReservedRange {
    pub start: i32,
    pub end: i32,
}

#[derive(Clone, Copy, Debug)]
pub struct ReservedName {
    pub name: Name,
    pub ast: Span,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ExtensionRange {
    pub start: i32,
    pub end: i32,
}

/// One declared extension inside a `declare { ... }` block on an
/// extension range.
#[derive(Clone, Debug)]
pub struct ExtensionDeclaration {
    pub number: i32,
    pub full_name: Name,
    pub type_name: Name,
    pub is_repeated: bool,
    pub reserved: bool,
    pub ast: Span,
}

/// A message or enum. Distinguished by `is_enum`; nested messages and
/// enums appear in a single flat `types` list on [`File`],
/// so this node does not itself own a separate nested-types vector —
/// `nested` below lists the children for traversal, but their storage
/// lives in the file's flat arena.
#[derive(Clone, Debug)]
pub struct Type {
    pub name: Name,
    pub full_name: Name,
    pub is_enum: bool,
    /// `None` for a top-level type; otherwise the enclosing message.
    pub parent: Option<Id<Type>>,
    pub members: Vec<Id<Member>>,
    pub oneofs: Vec<Id<Oneof>>,
    pub nested: Vec<Id<Type>>,
    pub reserved_ranges: Vec<ReservedRange>,
    pub reserved_names: Vec<ReservedName>,
    pub extension_ranges: Vec<ExtensionRange>,
    pub extension_declarations: Vec<(ExtensionRange, Vec<ExtensionDeclaration>)>,
    /// `true` if this message exists purely to back a `map<K, V>` field,
    /// per the "`map` field sugar" supplemented feature. When set,
    /// `map_field` names the member whose type this is.
    pub map_entry: bool,
    pub map_field: Option<Id<Member>>,
    /// proto2 legacy `MessageSet` wire format.
    pub message_set_wire_format: bool,
    pub options: Vec<protocore_ast::OptionEntry>,
    /// `None` for types synthesized with no source (map-entry messages
    /// and the well-known types built directly in Rust).
    pub ast: Option<Span>,
}

impl Type {
    pub fn is_message(&self) -> bool {
        !self.is_enum
    }
}

#[derive(Clone, Debug)]
pub struct Method {
    pub name: Name,
    pub input: TypeRef,
    pub output: TypeRef,
    pub client_streaming: bool,
    pub server_streaming: bool,
    pub options: Vec<protocore_ast::OptionEntry>,
    pub ast: Span,
}

#[derive(Clone, Debug)]
pub struct Service {
    pub name: Name,
    pub full_name: Name,
    pub methods: Vec<Id<Method>>,
    pub options: Vec<protocore_ast::OptionEntry>,
    pub ast: Span,
}

/// One compiled file's IR: the flat `types` list (top-level types kept
/// contiguous via `top_level_count` so iterating just the top level is
/// O(n) without filtering), its imports, and its
/// top-level `extend`/service/option declarations.
#[derive(Clone, Debug, Default)]
pub struct File {
    pub path: String,
    pub package: Option<Name>,
    pub edition: Option<Edition>,
    pub syntax_is_proto2: bool,
    /// Canonical import paths in declaration order (direct imports
    /// only); index `n` here is what `FileRef::import(n)` refers to.
    pub imports: Vec<ImportedFile>,
    pub types: Vec<Id<Type>>,
    /// The first `top_level_count` entries of `types` are this file's
    /// top-level messages/enums in source order; the rest are nested
    /// types in discovery order.
    pub top_level_count: usize,
    pub extends: Vec<Id<Extend>>,
    pub services: Vec<Id<Service>>,
    pub options: Vec<protocore_ast::OptionEntry>,
}

/// One entry in a file's import table: the canonical path, whether it
/// was `public`/`weak`, and whether it is a *direct* source import vs.
/// one materialized by transitive-public-import closure.
#[derive(Clone, Debug)]
pub struct ImportedFile {
    pub canonical_path: String,
    pub kind: protocore_ast::ImportKind,
    pub transitive: bool,
    pub ast: Option<Span>,
}

/// Every arena one file's lowering needs, mirroring
/// `protocore_ast::AstContext` one layer up: the walker allocates into
/// this as it lowers AST nodes into IR nodes, and every later pass
/// (evaluator, feature resolver, validator) borrows from it rather than
/// threading individual arenas through each function signature.
#[derive(Default)]
pub struct IrArena {
    pub types: protocore_base::Arena<Type>,
    pub members: protocore_base::Arena<Member>,
    pub oneofs: protocore_base::Arena<Oneof>,
    pub extends: protocore_base::Arena<Extend>,
    pub services: protocore_base::Arena<Service>,
    pub methods: protocore_base::Arena<Method>,
}

impl IrArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_type(&mut self, ty: Type) -> Id<Type> {
        Id::of(self.types.alloc(ty))
    }

    pub fn alloc_member(&mut self, member: Member) -> Id<Member> {
        Id::of(self.members.alloc(member))
    }

    pub fn alloc_oneof(&mut self, oneof: Oneof) -> Id<Oneof> {
        Id::of(self.oneofs.alloc(oneof))
    }

    pub fn alloc_extend(&mut self, extend: Extend) -> Id<Extend> {
        Id::of(self.extends.alloc(extend))
    }

    pub fn alloc_service(&mut self, service: Service) -> Id<Service> {
        Id::of(self.services.alloc(service))
    }

    pub fn alloc_method(&mut self, method: Method) -> Id<Method> {
        Id::of(self.methods.alloc(method))
    }
}
