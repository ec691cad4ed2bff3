//! The encoder core: the single-pass forward writer described in §4.4.
//!
//! `FlexBuffer` owns the sink, the pending-value stack, and both pools,
//! and is the only thing in this crate that mutates any of them. Every
//! fallible operation is guarded by a `poisoned` flag (§7, §10.1): once
//! one operation fails, every later call fails too, without touching the
//! sink or stack again.

use crate::error::{FlexBufferError, Result};
use crate::pool::{KeyPool, StringPool};
use crate::sink::{padding_needed, ByteSink};
use crate::stack::{Payload, StackEntry, TypeTag};
use crate::width::{packed_type, width_float, width_int, width_uint, width_for_offset, Width};

/// Tracks, for each currently-open `start_vector`/`start_map` scope,
/// what must come next — used to enforce I4 ("an `add_key` must
/// immediately precede every value appended inside a map scope") as
/// values are pushed, rather than only at scope close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Vector,
    Map { expect_key: bool },
}

/// A prepended field in a closed sequence's header, written before the
/// length field at the sequence's final element width (§6.5's two map
/// header fields are the only user of this today).
enum HeaderCell {
    /// A plain integer value, not interpreted as an offset.
    Plain(u64),
    /// An absolute sink offset, written as a backward relative offset
    /// from this cell's own final position.
    Offset(usize),
}

/// The FlexBuffers encoder: owns the byte sink, the pending-value stack,
/// and the string/key pools (§2 item 5).
pub struct FlexBuffer {
    sink: ByteSink,
    stack: Vec<StackEntry>,
    scopes: Vec<Scope>,
    strings: StringPool,
    keys: KeyPool,
    poisoned: bool,
}

impl Default for FlexBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FlexBuffer {
    /// Creates an empty encoder with a small default sink capacity.
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Creates an empty encoder whose sink is pre-sized to hold
    /// `capacity` bytes before its first reallocation (§10.3).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sink: ByteSink::with_capacity(capacity),
            stack: Vec::new(),
            scopes: Vec::new(),
            strings: StringPool::new(),
            keys: KeyPool::new(),
            poisoned: false,
        }
    }

    fn check_poisoned(&self) -> Result<()> {
        if self.poisoned {
            return Err(FlexBufferError::Poisoned);
        }
        Ok(())
    }

    /// Marks the encoder poisoned and logs `err` before returning it, per
    /// §7 ("all errors are fatal ... no error is ever silently
    /// swallowed").
    fn fail<T>(&mut self, err: FlexBufferError) -> Result<T> {
        self.poisoned = true;
        match &err {
            FlexBufferError::SinkOverflow { .. } => log::error!("flexbuffer build failed: {err}"),
            _ => log::warn!("flexbuffer build failed: {err}"),
        }
        Err(err)
    }

    /// Called after any value-producing operation pushes exactly one new
    /// entry onto `self.stack`. Enforces I4 against the *enclosing*
    /// scope (the scope this value lands in).
    fn note_value_pushed(&mut self) -> Result<()> {
        if let Some(Scope::Map { expect_key }) = self.scopes.last_mut() {
            if *expect_key {
                return self.fail(FlexBufferError::MissingKey);
            }
            *expect_key = true;
        }
        Ok(())
    }

    // ---- scalar and leaf append primitives (§4.4) -------------------

    pub fn add_null(&mut self) -> Result<()> {
        self.check_poisoned()?;
        self.stack.push(StackEntry::inline(TypeTag::Null, Width::W8, 0));
        self.note_value_pushed()
    }

    pub fn add_i64(&mut self, v: i64) -> Result<()> {
        self.check_poisoned()?;
        self.stack
            .push(StackEntry::inline(TypeTag::Int, width_int(v), v as u64));
        self.note_value_pushed()
    }

    pub fn add_u64(&mut self, v: u64) -> Result<()> {
        self.check_poisoned()?;
        self.stack.push(StackEntry::inline(TypeTag::UInt, width_uint(v), v));
        self.note_value_pushed()
    }

    pub fn add_f64(&mut self, v: f64) -> Result<()> {
        self.check_poisoned()?;
        let w = width_float(v);
        self.stack
            .push(StackEntry::inline(TypeTag::Float, w, float_bits(v, w)));
        self.note_value_pushed()
    }

    pub fn add_bool(&mut self, v: bool) -> Result<()> {
        self.check_poisoned()?;
        self.stack
            .push(StackEntry::inline(TypeTag::Bool, Width::W8, v as u64));
        self.note_value_pushed()
    }

    pub fn add_indirect_i64(&mut self, v: i64) -> Result<()> {
        self.check_poisoned()?;
        let w = width_int(v);
        self.reserve_indirect(w)?;
        self.sink.pad_to(w.bytes());
        let offset = self.sink.len();
        self.sink.write_uint(offset, v as u64, w);
        self.stack.push(StackEntry::offset(
            TypeTag::IndirectInt,
            width_for_offset(self.sink.len(), offset),
            offset,
        ));
        self.note_value_pushed()
    }

    pub fn add_indirect_u64(&mut self, v: u64) -> Result<()> {
        self.check_poisoned()?;
        let w = width_uint(v);
        self.reserve_indirect(w)?;
        self.sink.pad_to(w.bytes());
        let offset = self.sink.len();
        self.sink.write_uint(offset, v, w);
        self.stack.push(StackEntry::offset(
            TypeTag::IndirectUInt,
            width_for_offset(self.sink.len(), offset),
            offset,
        ));
        self.note_value_pushed()
    }

    pub fn add_indirect_f64(&mut self, v: f64) -> Result<()> {
        self.check_poisoned()?;
        let w = width_float(v);
        self.reserve_indirect(w)?;
        self.sink.pad_to(w.bytes());
        let offset = self.sink.len();
        self.sink.write_uint(offset, float_bits(v, w), w);
        self.stack.push(StackEntry::offset(
            TypeTag::IndirectFloat,
            width_for_offset(self.sink.len(), offset),
            offset,
        ));
        self.note_value_pushed()
    }

    /// Checks that padding to `w` and then writing one `w`-byte scalar
    /// would not grow the sink past `MAX_BUFFER_LEN` (§7 `SinkOverflow`),
    /// poisoning the encoder on failure like every other fallible path.
    fn reserve_indirect(&mut self, w: Width) -> Result<()> {
        let padded_len = self.sink.len() + padding_needed(self.sink.len(), w.bytes());
        if let Err(e) = self.sink.check_capacity(padded_len + w.bytes()) {
            return self.fail(e);
        }
        Ok(())
    }

    /// Writes `s` with string framing (§6.6), passing its bytes through
    /// verbatim and deduplicating via the string pool (P6). `s` is a
    /// `&str`, so it is always valid UTF-8 by construction — see
    /// `add_raw_string_bytes` for 8-bit-clean payloads.
    pub fn add_string(&mut self, s: &str) -> Result<()> {
        self.check_poisoned()?;
        let offset = match self.strings.intern_string(&mut self.sink, s.as_bytes()) {
            Ok(offset) => offset,
            Err(e) => return self.fail(e),
        };
        self.push_content_offset(TypeTag::String, offset)
    }

    /// Writes `bytes` with string framing without validating them as
    /// UTF-8 (the documented pass-through default for §9's "Open
    /// question: string UTF-8 validation").
    pub fn add_raw_string_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.check_poisoned()?;
        let offset = match self.strings.intern_string(&mut self.sink, bytes) {
            Ok(offset) => offset,
            Err(e) => return self.fail(e),
        };
        self.push_content_offset(TypeTag::String, offset)
    }

    /// Like `add_raw_string_bytes`, but validates `bytes` as UTF-8 first
    /// and fails with `InvalidUtf8` otherwise — the one checked entry
    /// point §7 documents.
    pub fn add_checked_utf8_string(&mut self, bytes: &[u8]) -> Result<()> {
        self.check_poisoned()?;
        if let Err(e) = std::str::from_utf8(bytes) {
            return self.fail(FlexBufferError::InvalidUtf8(e));
        }
        let offset = match self.strings.intern_string(&mut self.sink, bytes) {
            Ok(offset) => offset,
            Err(e) => return self.fail(e),
        };
        self.push_content_offset(TypeTag::String, offset)
    }

    /// Writes `k` as a map key (§6.7): null-terminated, always width 1,
    /// deduplicated via the key pool. Does not itself push a value slot
    /// (§4.4) — the matching value must follow immediately (I4).
    pub fn add_key(&mut self, k: &str) -> Result<()> {
        self.check_poisoned()?;
        if !matches!(self.scopes.last(), Some(Scope::Map { .. })) {
            return self.fail(FlexBufferError::KeyOutsideMap);
        }
        let offset = match self.keys.intern(&mut self.sink, k.as_bytes()) {
            Ok(offset) => offset,
            Err(e) => return self.fail(e),
        };
        self.stack
            .push(StackEntry::offset(TypeTag::Key, Width::W8, offset));
        if let Some(Scope::Map { expect_key }) = self.scopes.last_mut() {
            *expect_key = false;
        }
        Ok(())
    }

    /// Writes `bytes` with blob framing (§6.8): length-prefixed, no
    /// terminator.
    pub fn add_blob(&mut self, bytes: &[u8]) -> Result<()> {
        self.check_poisoned()?;
        let offset = match self.strings.intern_blob(&mut self.sink, bytes) {
            Ok(offset) => offset,
            Err(e) => return self.fail(e),
        };
        self.push_content_offset(TypeTag::Blob, offset)
    }

    fn push_content_offset(&mut self, tag: TypeTag, offset: usize) -> Result<()> {
        self.stack
            .push(StackEntry::offset(tag, width_for_offset(self.sink.len(), offset), offset));
        self.note_value_pushed()
    }

    // ---- typed numeric vectors: the add_typed_vector_prims fast path
    // (§4.4) ------------------------------------------------------------
    //
    // Every element here is a plain scalar whose required width never
    // depends on where it ends up in the sink, so none of these need the
    // offset-width fixpoint that `close_sequence` implements — they pick
    // one width up front and write a flat array.

    pub fn add_typed_vector_i64(&mut self, xs: &[i64]) -> Result<()> {
        self.check_poisoned()?;
        let w = xs
            .iter()
            .map(|&v| width_int(v))
            .max()
            .unwrap_or(Width::W8)
            .max(width_uint(xs.len() as u64));
        self.write_flat_vector(xs.iter().map(|&v| v as u64), xs.len(), w, true, TypeTag::VectorInt)
    }

    pub fn add_typed_vector_u64(&mut self, xs: &[u64]) -> Result<()> {
        self.check_poisoned()?;
        let w = xs
            .iter()
            .copied()
            .map(width_uint)
            .max()
            .unwrap_or(Width::W8)
            .max(width_uint(xs.len() as u64));
        self.write_flat_vector(xs.iter().copied(), xs.len(), w, true, TypeTag::VectorUInt)
    }

    pub fn add_typed_vector_f64(&mut self, xs: &[f64]) -> Result<()> {
        self.check_poisoned()?;
        let w = xs
            .iter()
            .map(|&v| width_float(v))
            .max()
            .unwrap_or(Width::W32)
            .max(width_uint(xs.len() as u64));
        self.write_flat_vector(xs.iter().map(|&v| float_bits(v, w)), xs.len(), w, true, TypeTag::VectorFloat)
    }

    pub fn add_typed_vector_bool(&mut self, xs: &[bool]) -> Result<()> {
        self.check_poisoned()?;
        let w = width_uint(xs.len() as u64);
        self.write_flat_vector(xs.iter().map(|&v| v as u64), xs.len(), w, true, TypeTag::VectorBool)
    }

    fn write_flat_vector(
        &mut self,
        values: impl Iterator<Item = u64>,
        n: usize,
        w: Width,
        with_length: bool,
        tag: TypeTag,
    ) -> Result<()> {
        let padded_len = self.sink.len() + padding_needed(self.sink.len(), w.bytes());
        let length_bytes = if with_length { w.bytes() } else { 0 };
        if let Err(e) = self.sink.check_capacity(padded_len + length_bytes + n * w.bytes()) {
            return self.fail(e);
        }
        self.sink.pad_to(w.bytes());
        if with_length {
            let pos = self.sink.len();
            self.sink.write_uint(pos, n as u64, w);
        }
        let start = self.sink.len();
        for v in values {
            let pos = self.sink.len();
            self.sink.write_uint(pos, v, w);
        }
        self.stack
            .push(StackEntry::offset(tag, width_for_offset(self.sink.len(), start), start));
        self.note_value_pushed()
    }

    // ---- fixed-size numeric tuples (§6.4) ------------------------------
    //
    // Only 2/3/4-element tuples exist in the format; exposing them as
    // fixed-size array parameters makes a 1-element call a compile error
    // rather than a runtime one (§8 "must fall through ... or error by
    // API shape").

    pub fn add_fixed_vector2_i64(&mut self, xs: [i64; 2]) -> Result<()> {
        self.add_fixed_vector_i64(&xs, TypeTag::VectorInt2)
    }
    pub fn add_fixed_vector3_i64(&mut self, xs: [i64; 3]) -> Result<()> {
        self.add_fixed_vector_i64(&xs, TypeTag::VectorInt3)
    }
    pub fn add_fixed_vector4_i64(&mut self, xs: [i64; 4]) -> Result<()> {
        self.add_fixed_vector_i64(&xs, TypeTag::VectorInt4)
    }

    fn add_fixed_vector_i64(&mut self, xs: &[i64], tag: TypeTag) -> Result<()> {
        self.check_poisoned()?;
        let w = xs.iter().map(|&v| width_int(v)).max().unwrap_or(Width::W8);
        self.write_flat_vector(xs.iter().map(|&v| v as u64), xs.len(), w, false, tag)
    }

    pub fn add_fixed_vector2_u64(&mut self, xs: [u64; 2]) -> Result<()> {
        self.add_fixed_vector_u64(&xs, TypeTag::VectorUInt2)
    }
    pub fn add_fixed_vector3_u64(&mut self, xs: [u64; 3]) -> Result<()> {
        self.add_fixed_vector_u64(&xs, TypeTag::VectorUInt3)
    }
    pub fn add_fixed_vector4_u64(&mut self, xs: [u64; 4]) -> Result<()> {
        self.add_fixed_vector_u64(&xs, TypeTag::VectorUInt4)
    }

    fn add_fixed_vector_u64(&mut self, xs: &[u64], tag: TypeTag) -> Result<()> {
        self.check_poisoned()?;
        let w = xs.iter().copied().map(width_uint).max().unwrap_or(Width::W8);
        self.write_flat_vector(xs.iter().copied(), xs.len(), w, false, tag)
    }

    pub fn add_fixed_vector2_f64(&mut self, xs: [f64; 2]) -> Result<()> {
        self.add_fixed_vector_f64(&xs, TypeTag::VectorFloat2)
    }
    pub fn add_fixed_vector3_f64(&mut self, xs: [f64; 3]) -> Result<()> {
        self.add_fixed_vector_f64(&xs, TypeTag::VectorFloat3)
    }
    pub fn add_fixed_vector4_f64(&mut self, xs: [f64; 4]) -> Result<()> {
        self.add_fixed_vector_f64(&xs, TypeTag::VectorFloat4)
    }

    fn add_fixed_vector_f64(&mut self, xs: &[f64], tag: TypeTag) -> Result<()> {
        self.check_poisoned()?;
        let w = xs.iter().map(|&v| width_float(v)).max().unwrap_or(Width::W32);
        self.write_flat_vector(xs.iter().map(|&v| float_bits(v, w)), xs.len(), w, false, tag)
    }

    // ---- scope management (§3 I3) --------------------------------------

    /// Opens a heterogeneous vector scope. Returns the stack depth to
    /// later pass to `end_vector`.
    pub fn start_vector(&mut self) -> usize {
        self.scopes.push(Scope::Vector);
        self.stack.len()
    }

    /// Opens a map scope. Returns the stack depth to later pass to
    /// `sort_and_end_map`.
    pub fn start_map(&mut self) -> usize {
        self.scopes.push(Scope::Map { expect_key: true });
        self.stack.len()
    }

    /// Closes the heterogeneous vector scope opened at `start` (the
    /// value `start_vector` returned), emitting a length-prefixed,
    /// untyped vector (§6.3) and pushing one `Vector` entry.
    pub fn end_vector(&mut self, start: usize) -> Result<()> {
        self.check_poisoned()?;
        match self.scopes.pop() {
            Some(Scope::Vector) => {}
            _ => {
                let actual = self.stack.len();
                return self.fail(FlexBufferError::UnbalancedScope {
                    expected: start,
                    actual,
                });
            }
        }
        if start > self.stack.len() {
            let actual = self.stack.len();
            return self.fail(FlexBufferError::UnbalancedScope {
                expected: start,
                actual,
            });
        }
        let elems: Vec<StackEntry> = self.stack[start..].to_vec();
        let (_w, payload_offset) = self.close_sequence(&[], &elems, true, true)?;
        self.stack.truncate(start);
        self.stack.push(StackEntry::offset(
            TypeTag::Vector,
            width_for_offset(self.sink.len(), payload_offset),
            payload_offset,
        ));
        self.note_value_pushed()
    }

    /// Closes the map scope opened at `start`, sorting key/value pairs
    /// by the key's UTF-8 byte content (§4.4 map closure, P5), then
    /// emitting the keys vector followed by the values vector and
    /// pushing one `Map` entry.
    ///
    /// Duplicate keys are passed through unmodified (§9 open question:
    /// this implementation does not deduplicate or reject them).
    pub fn sort_and_end_map(&mut self, start: usize) -> Result<()> {
        self.check_poisoned()?;
        match self.scopes.pop() {
            Some(Scope::Map { .. }) => {}
            _ => {
                let actual = self.stack.len();
                return self.fail(FlexBufferError::UnbalancedScope {
                    expected: start,
                    actual,
                });
            }
        }
        if start > self.stack.len() {
            let actual = self.stack.len();
            return self.fail(FlexBufferError::UnbalancedScope {
                expected: start,
                actual,
            });
        }
        let count = self.stack.len() - start;
        if count % 2 != 0 {
            return self.fail(FlexBufferError::OddMapEntries { found: count });
        }

        let mut pairs: Vec<(StackEntry, StackEntry)> = self.stack[start..]
            .chunks_exact(2)
            .map(|pair| (pair[0], pair[1]))
            .collect();

        let sink_bytes = self.sink.as_slice().to_vec();
        pairs.sort_unstable_by(|a, b| {
            key_bytes(&sink_bytes, key_offset(&a.0)).cmp(key_bytes(&sink_bytes, key_offset(&b.0)))
        });

        let keys: Vec<StackEntry> = pairs.iter().map(|(k, _)| *k).collect();
        let values: Vec<StackEntry> = pairs.iter().map(|(_, v)| *v).collect();

        let (keys_width, keys_payload_offset) = self.close_sequence(&[], &keys, false, false)?;
        let header = [
            HeaderCell::Offset(keys_payload_offset),
            HeaderCell::Plain(keys_width.bytes() as u64),
        ];
        let (_w, values_payload_offset) = self.close_sequence(&header, &values, true, true)?;

        self.stack.truncate(start);
        self.stack.push(StackEntry::offset(
            TypeTag::Map,
            width_for_offset(self.sink.len(), values_payload_offset),
            values_payload_offset,
        ));
        self.note_value_pushed()
    }

    /// Closes a contiguous slice of pending entries into the sink: an
    /// optional header of plain/offset cells, then an optional length
    /// field, then the elements themselves, then (optionally) one
    /// `packed_type` byte per element. Implements the bounded width
    /// fixpoint of §9 ("Offset width relaxation") once for all three
    /// sequence shapes this crate emits (vectors, map keys, map values).
    ///
    /// Returns the final element width and the absolute offset of the
    /// first element (what callers store as the sequence's payload
    /// offset).
    fn close_sequence(
        &mut self,
        header: &[HeaderCell],
        elems: &[StackEntry],
        with_length: bool,
        with_type_table: bool,
    ) -> Result<(Width, usize)> {
        let n = elems.len();
        let mut w = elems.iter().map(|e| e.min_width).max().unwrap_or(Width::W8);
        for cell in header {
            if let HeaderCell::Plain(v) = cell {
                w = w.max(width_uint(*v));
            }
        }
        if with_length {
            w = w.max(width_uint(n as u64));
        }

        loop {
            let pad = padding_needed(self.sink.len(), w.bytes());
            let base = self.sink.len() + pad;
            let header_bytes = header.len() * w.bytes();
            let length_bytes = if with_length { w.bytes() } else { 0 };
            let elems_start = base + header_bytes + length_bytes;

            let mut need = w;
            for (i, cell) in header.iter().enumerate() {
                if let HeaderCell::Offset(target) = cell {
                    let pos = base + i * w.bytes();
                    need = need.max(width_for_offset(pos, *target));
                }
            }
            for (i, e) in elems.iter().enumerate() {
                if let Payload::Offset(target) = e.payload {
                    let pos = elems_start + i * w.bytes();
                    need = need.max(width_for_offset(pos, target));
                }
            }

            if need > w {
                log::debug!("widening sequence element width from {w:?} to {need:?}");
                w = need;
                continue;
            }

            let total_len = elems_start + n * w.bytes() + if with_type_table { n } else { 0 };
            if let Err(e) = self.sink.check_capacity(total_len) {
                return self.fail(e);
            }

            self.sink.pad_to(w.bytes());
            for cell in header {
                let v = match cell {
                    HeaderCell::Plain(v) => *v,
                    HeaderCell::Offset(target) => {
                        let pos = self.sink.len();
                        (pos - *target) as u64
                    }
                };
                let pos = self.sink.len();
                self.sink.write_uint(pos, v, w);
            }
            if with_length {
                let pos = self.sink.len();
                self.sink.write_uint(pos, n as u64, w);
            }

            let payload_offset = self.sink.len();
            let mut recorded_widths = Vec::with_capacity(n);
            for e in elems {
                let pos = self.sink.len();
                let (v, recorded) = match e.payload {
                    Payload::Inline(bits) => (bits, e.min_width),
                    Payload::Offset(target) => {
                        let dist = (pos - target) as u64;
                        (dist, width_uint(dist))
                    }
                };
                self.sink.write_uint(pos, v, w);
                recorded_widths.push(recorded);
            }
            if with_type_table {
                for (e, recorded) in elems.iter().zip(recorded_widths.iter()) {
                    self.sink.push(packed_type(e.type_tag, *recorded));
                }
            }

            return Ok((w, payload_offset));
        }
    }

    /// Consumes the encoder, requiring exactly one remaining stack entry
    /// (§3 I2), and appends the three-field root suffix (§6.9).
    pub fn finish(mut self) -> Result<Vec<u8>> {
        self.check_poisoned()?;
        if self.stack.len() != 1 || !self.scopes.is_empty() {
            let actual = self.stack.len();
            return self.fail(FlexBufferError::UnbalancedScope { expected: 1, actual });
        }
        let e = self.stack[0];
        let root_width = match e.payload {
            Payload::Inline(_) => e.min_width,
            Payload::Offset(target) => width_for_offset(self.sink.len(), target),
        };
        self.sink.pad_to(root_width.bytes());
        let pos = self.sink.len();
        let value = match e.payload {
            Payload::Inline(bits) => bits,
            Payload::Offset(target) => (pos - target) as u64,
        };
        self.sink.write_uint(pos, value, root_width);
        self.sink.push(packed_type(e.type_tag, root_width));
        self.sink.push(root_width.bytes() as u8);
        Ok(self.sink.into_vec())
    }
}

fn float_bits(v: f64, w: Width) -> u64 {
    match w {
        Width::W32 => (v as f32).to_bits() as u64,
        _ => v.to_bits(),
    }
}

fn key_offset(key_entry: &StackEntry) -> usize {
    match key_entry.payload {
        Payload::Offset(o) => o,
        Payload::Inline(_) => unreachable!("map keys are always offset-framed"),
    }
}

fn key_bytes(sink_bytes: &[u8], offset: usize) -> &[u8] {
    let end = sink_bytes[offset..]
        .iter()
        .position(|&b| b == 0)
        .map(|p| offset + p)
        .unwrap_or(sink_bytes.len());
    &sink_bytes[offset..end]
}
