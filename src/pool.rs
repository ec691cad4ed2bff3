//! Content-addressed pools for string and key deduplication (§4.3, P6).
//!
//! Both pools map a byte sequence to the absolute offset at which it was
//! first emitted into the sink, so that encoding the same bytes twice
//! never writes them twice.

use std::collections::HashMap;

use crate::error::Result;
use crate::sink::{padding_needed, ByteSink};
use crate::width::{width_uint, Width};

/// Interns null-terminated, width-1 key strings (§6.7).
#[derive(Debug, Default)]
pub struct KeyPool {
    offsets: HashMap<Vec<u8>, usize>,
}

impl KeyPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the offset of `key`'s first byte in `sink`, emitting
    /// `key` followed by a NUL terminator on first sight. Fails with
    /// `SinkOverflow` (§7) rather than growing past the sink's limit.
    pub fn intern(&mut self, sink: &mut ByteSink, key: &[u8]) -> Result<usize> {
        if let Some(&offset) = self.offsets.get(key) {
            log::trace!("key pool hit for {} byte key", key.len());
            return Ok(offset);
        }
        let offset = sink.len();
        sink.check_capacity(offset + key.len() + 1)?;
        sink.push_slice(key);
        sink.push(0);
        self.offsets.insert(key.to_vec(), offset);
        Ok(offset)
    }
}

/// Interns length-prefixed UTF-8 strings and binary blobs (§6.6, §6.8).
///
/// Strings and blobs share one pool: their framing (length at the
/// smallest width that fits it, then raw bytes) is identical except for
/// the string's trailing NUL, which is folded into the cached bytes so
/// two pool entries never straddle a boundary.
#[derive(Debug, Default)]
pub struct StringPool {
    offsets: HashMap<Vec<u8>, usize>,
}

impl StringPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `bytes` with string framing: `[len : W][bytes][0x00]`.
    /// Returns the offset of the first content byte (after the length
    /// field), which is what stack entries and readers use.
    pub fn intern_string(&mut self, sink: &mut ByteSink, bytes: &[u8]) -> Result<usize> {
        self.intern(sink, bytes, true)
    }

    /// Interns `bytes` with blob framing: `[len : W][bytes]`, no
    /// terminator (§6.8).
    pub fn intern_blob(&mut self, sink: &mut ByteSink, bytes: &[u8]) -> Result<usize> {
        self.intern(sink, bytes, false)
    }

    /// Fails with `SinkOverflow` (§7) rather than growing past the
    /// sink's limit.
    fn intern(&mut self, sink: &mut ByteSink, bytes: &[u8], nul_terminated: bool) -> Result<usize> {
        let cache_key = cache_key(bytes, nul_terminated);
        if let Some(&offset) = self.offsets.get(&cache_key) {
            log::trace!("string pool hit for {} byte payload", bytes.len());
            return Ok(offset);
        }
        let len_width = width_uint(bytes.len() as u64);
        let padded_len = sink.len() + padding_needed(sink.len(), len_width.bytes());
        let terminator = if nul_terminated { 1 } else { 0 };
        sink.check_capacity(padded_len + len_width.bytes() + bytes.len() + terminator)?;
        sink.pad_to(len_width.bytes());
        sink.write_uint(sink.len(), bytes.len() as u64, len_width);
        let content_offset = sink.len();
        sink.push_slice(bytes);
        if nul_terminated {
            sink.push(0);
        }
        self.offsets.insert(cache_key, content_offset);
        Ok(content_offset)
    }
}

/// A length-prefixed string may need a wider length field than a blob
/// with identical content has already cached (or vice versa isn't
/// possible since `nul_terminated` only applies to strings) — but the
/// *content offset* each produces always points past the length field,
/// so a string and a blob with the same bytes would in principle be
/// distinguishable only by the terminator. Keep them in one table keyed
/// by a tag byte plus content so a string request never returns a blob's
/// (un-terminated) offset or vice versa.
fn cache_key(bytes: &[u8], nul_terminated: bool) -> Vec<u8> {
    let mut key = Vec::with_capacity(bytes.len() + 1);
    key.push(nul_terminated as u8);
    key.extend_from_slice(bytes);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_same_string_reuses_offset() {
        let mut sink = ByteSink::new();
        let mut pool = StringPool::new();
        let a = pool.intern_string(&mut sink, b"hi").unwrap();
        let before = sink.len();
        let b = pool.intern_string(&mut sink, b"hi").unwrap();
        assert_eq!(a, b);
        assert_eq!(sink.len(), before, "second intern must not append bytes");
    }

    #[test]
    fn string_and_blob_with_same_bytes_are_distinct() {
        let mut sink = ByteSink::new();
        let mut pool = StringPool::new();
        let s = pool.intern_string(&mut sink, b"hi").unwrap();
        let blob = pool.intern_blob(&mut sink, b"hi").unwrap();
        assert_ne!(s, blob);
    }

    #[test]
    fn dedup_same_key_reuses_offset() {
        let mut sink = ByteSink::new();
        let mut pool = KeyPool::new();
        let a = pool.intern(&mut sink, b"name").unwrap();
        let before = sink.len();
        let b = pool.intern(&mut sink, b"name").unwrap();
        assert_eq!(a, b);
        assert_eq!(sink.len(), before);
    }
}
