//! The pending-value stack and its element representation (§3).

use crate::width::Width;

/// The closed set of logical type tags FlexBuffers defines, with their
/// canonical numeric codes (§6.1). Order and values here are load-bearing:
/// they are written directly into packed type bytes and must match the
/// upstream FlexBuffers format byte-for-byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TypeTag {
    Null = 0,
    Int = 1,
    UInt = 2,
    Float = 3,
    Key = 4,
    String = 5,
    IndirectInt = 6,
    IndirectUInt = 7,
    IndirectFloat = 8,
    Map = 9,
    Vector = 10,
    VectorInt = 11,
    VectorUInt = 12,
    VectorFloat = 13,
    VectorKey = 14,
    #[allow(dead_code)]
    VectorStringDeprecated = 15,
    VectorInt2 = 16,
    VectorUInt2 = 17,
    VectorFloat2 = 18,
    VectorInt3 = 19,
    VectorUInt3 = 20,
    VectorFloat3 = 21,
    VectorInt4 = 22,
    VectorUInt4 = 23,
    VectorFloat4 = 24,
    Blob = 25,
    Bool = 26,
    VectorBool = 27,
}

/// The payload of a pending stack entry: either an inline scalar bit
/// pattern or an absolute sink offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    /// Raw bits of a scalar not yet written to the sink. Reinterpreted
    /// per `type_tag` when finally emitted (e.g. as `i64`, `u64`, `f64`
    /// bits, or 0/1 for bool).
    Inline(u64),
    /// Absolute offset into the sink of already-emitted content (a
    /// string, key, blob, indirect scalar, vector, or map).
    Offset(usize),
}

/// One value awaiting emission at the end of its enclosing vector/map,
/// or awaiting `finish` if it is the root (§3 StackEntry).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackEntry {
    pub type_tag: TypeTag,
    pub min_width: Width,
    pub payload: Payload,
}

impl StackEntry {
    pub fn inline(type_tag: TypeTag, min_width: Width, bits: u64) -> Self {
        Self {
            type_tag,
            min_width,
            payload: Payload::Inline(bits),
        }
    }

    pub fn offset(type_tag: TypeTag, min_width: Width, offset: usize) -> Self {
        Self {
            type_tag,
            min_width,
            payload: Payload::Offset(offset),
        }
    }
}
