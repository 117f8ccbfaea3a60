//! Type expressions: predeclared scalars, named (message/enum) references,
//! and map types.

use crate::any::Path;
use protocore_base::Span;

/// The fourteen predeclared Protobuf scalar types.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ScalarType {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
}

impl ScalarType {
    pub fn from_keyword(kw: &str) -> Option<Self> {
        Some(match kw {
            "double" => ScalarType::Double,
            "float" => ScalarType::Float,
            "int32" => ScalarType::Int32,
            "int64" => ScalarType::Int64,
            "uint32" => ScalarType::Uint32,
            "uint64" => ScalarType::Uint64,
            "sint32" => ScalarType::Sint32,
            "sint64" => ScalarType::Sint64,
            "fixed32" => ScalarType::Fixed32,
            "fixed64" => ScalarType::Fixed64,
            "sfixed32" => ScalarType::Sfixed32,
            "sfixed64" => ScalarType::Sfixed64,
            "bool" => ScalarType::Bool,
            "string" => ScalarType::String,
            "bytes" => ScalarType::Bytes,
            _ => return None,
        })
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            ScalarType::Int32
                | ScalarType::Int64
                | ScalarType::Uint32
                | ScalarType::Uint64
                | ScalarType::Sint32
                | ScalarType::Sint64
                | ScalarType::Fixed32
                | ScalarType::Fixed64
                | ScalarType::Sfixed32
                | ScalarType::Sfixed64
        )
    }

    pub fn is_64_bit(self) -> bool {
        matches!(
            self,
            ScalarType::Int64 | ScalarType::Uint64 | ScalarType::Sint64 | ScalarType::Fixed64 | ScalarType::Sfixed64
        )
    }
}

/// A field's type: a scalar, a named message/enum reference resolved
/// later by the IR walker, or an inline map type.
#[derive(Clone, Debug)]
pub enum TypeKind {
    Scalar(ScalarType),
    Named(Path),
    Map { key: ScalarType, value: Box<TypeNode> },
}

#[derive(Clone, Debug)]
pub struct TypeNode {
    pub kind: TypeKind,
    pub span: Span,
}
