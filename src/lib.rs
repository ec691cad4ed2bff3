//! Build self-describing, schema-less FlexBuffers documents: a sibling
//! format to FlatBuffers for dynamically-typed payloads (comparable in
//! expressiveness to JSON/CBOR) that keeps FlatBuffers' O(1) random
//! access without a fixed schema.
//!
//! This crate is the *encoder* half only: a single-pass, in-memory
//! writer that accumulates typed values on a stack, assigns every
//! scalar, string, vector, and map the smallest width that fits it, and
//! emits one finished buffer. Decoding an emitted buffer is out of
//! scope — the byte layout is specified precisely enough (see
//! `DESIGN.md`) that any conforming FlexBuffers reader can parse it.
//!
//! # Example: build a map with the closure-scoped façade
//!
//! ```
//! let buf = flexpack::build_map(|m| {
//!     m.push_string("name", "julian")?;
//!     m.push_i64("age", 40)?;
//!     m.start_vector("tags", |v| {
//!         v.push_string("admin")?;
//!         v.push_string("staff")
//!     })?;
//!     Ok(())
//! }).unwrap();
//! // Every FlexBuffers buffer ends with [root_value | packed_type | root_width].
//! assert_eq!(buf.len() >= 3, true);
//! ```
//!
//! # Example: drive the encoder core directly
//!
//! For callers that need finer control than the builder façade gives —
//! e.g. choosing indirect scalars, or interleaving scope opens with
//! other bookkeeping — [`FlexBuffer`] exposes the same primitives the
//! façade delegates to.
//!
//! ```
//! use flexpack::FlexBuffer;
//!
//! let mut enc = FlexBuffer::new();
//! enc.add_i64(257).unwrap();
//! let buf = enc.finish().unwrap();
//! assert_eq!(buf, vec![0x01, 0x01, 0x05, 0x02]);
//! ```

/// Closure-scoped `MapBuilder`/`VectorBuilder` façades and the
/// `build_map`/`build_vector` entry points (§6.10 of the design doc).
pub mod builder;

/// The encoder core: `FlexBuffer`, the value stack, and scope closure.
pub mod encoder;

/// Little-endian integer encoding used throughout the sink.
pub mod endian;

/// `FlexBufferError` and the crate's `Result` alias.
pub mod error;

/// Content-addressed `StringPool`/`KeyPool` interning.
pub mod pool;

/// `ByteSink`, the append-only, back-patchable byte buffer.
pub mod sink;

/// `StackEntry`/`TypeTag`, the pending-value stack's element type.
pub mod stack;

/// Bit-width selection (`Width`) and the packed type byte.
pub mod width;

#[cfg(test)]
mod tests;

pub use builder::{build_map, build_vector, MapBuilder, VectorBuilder};
pub use encoder::FlexBuffer;
pub use error::{FlexBufferError, Result};
pub use stack::TypeTag;
pub use width::Width;
