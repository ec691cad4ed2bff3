//! Little-endian integer encoding.
//!
//! FlexBuffers documents are little-endian only (see the format's root
//! suffix and vector layouts), so unlike a general-purpose binary packer
//! there is no selectable endianness here — just the one encoding every
//! multi-byte field in a buffer uses.

/// Writes the least-significant `into.len()` bytes of `v` into `into`,
/// little-endian order. `into.len()` must be 1, 2, 4, or 8.
pub fn write_uint_le(v: u64, into: &mut [u8]) {
    let l = into.len();
    for (i, b) in into.iter_mut().enumerate().take(l) {
        *b = (v >> (8 * i)) as u8;
    }
}
