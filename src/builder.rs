//! Closure-scoped builder façades over [`FlexBuffer`](crate::FlexBuffer)
//! (§6.10, §10.5).
//!
//! `MapBuilder` and `VectorBuilder` are thin borrows of an in-progress
//! encoder plus the scope's `start` index. Nesting a map or vector opens
//! the child scope, hands the caller a fresh builder borrowing the same
//! encoder, and closes the scope once the caller's closure returns —
//! mirroring the teacher's `Writer::subregion`, except that closing here
//! is fallible (`OddMapEntries`, `MissingKey`, ...) so it cannot live in
//! a `Drop` impl. A closure that itself returns `Err` already did so
//! because some `add_*`/`push_*` call poisoned the encoder, so skipping
//! the close on that path is safe: every later operation on the same
//! encoder, including the top-level `finish`, will see the poisoned flag
//! or an unbalanced stack and fail too.

use crate::encoder::FlexBuffer;
use crate::error::Result;

/// A borrowed handle for populating an open vector scope.
pub struct VectorBuilder<'f> {
    enc: &'f mut FlexBuffer,
}

/// A borrowed handle for populating an open map scope. Every push takes
/// the entry's key; `add_key` plus the value are issued together so
/// callers cannot violate I4 (a key without a following value) through
/// this façade.
pub struct MapBuilder<'f> {
    enc: &'f mut FlexBuffer,
}

macro_rules! vector_pushes {
    ($($name:ident($ty:ty) => $method:ident),* $(,)?) => {
        $(
            pub fn $name(&mut self, v: $ty) -> Result<()> {
                self.enc.$method(v)
            }
        )*
    };
}

macro_rules! map_pushes {
    ($($name:ident($ty:ty) => $method:ident),* $(,)?) => {
        $(
            pub fn $name(&mut self, key: &str, v: $ty) -> Result<()> {
                self.enc.add_key(key)?;
                self.enc.$method(v)
            }
        )*
    };
}

impl<'f> VectorBuilder<'f> {
    fn reborrow(&mut self) -> VectorBuilder<'_> {
        VectorBuilder { enc: self.enc }
    }

    pub fn push_null(&mut self) -> Result<()> {
        self.enc.add_null()
    }

    vector_pushes! {
        push_bool(bool) => add_bool,
        push_i64(i64) => add_i64,
        push_u64(u64) => add_u64,
        push_f64(f64) => add_f64,
        push_indirect_i64(i64) => add_indirect_i64,
        push_indirect_u64(u64) => add_indirect_u64,
        push_indirect_f64(f64) => add_indirect_f64,
    }

    pub fn push_string(&mut self, s: &str) -> Result<()> {
        self.enc.add_string(s)
    }

    pub fn push_raw_string_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.enc.add_raw_string_bytes(bytes)
    }

    pub fn push_blob(&mut self, bytes: &[u8]) -> Result<()> {
        self.enc.add_blob(bytes)
    }

    pub fn push_vector_i64(&mut self, xs: &[i64]) -> Result<()> {
        self.enc.add_typed_vector_i64(xs)
    }

    pub fn push_vector_u64(&mut self, xs: &[u64]) -> Result<()> {
        self.enc.add_typed_vector_u64(xs)
    }

    pub fn push_vector_f64(&mut self, xs: &[f64]) -> Result<()> {
        self.enc.add_typed_vector_f64(xs)
    }

    pub fn push_vector_bool(&mut self, xs: &[bool]) -> Result<()> {
        self.enc.add_typed_vector_bool(xs)
    }

    pub fn push_fixed2_i64(&mut self, xs: [i64; 2]) -> Result<()> {
        self.enc.add_fixed_vector2_i64(xs)
    }
    pub fn push_fixed3_i64(&mut self, xs: [i64; 3]) -> Result<()> {
        self.enc.add_fixed_vector3_i64(xs)
    }
    pub fn push_fixed4_i64(&mut self, xs: [i64; 4]) -> Result<()> {
        self.enc.add_fixed_vector4_i64(xs)
    }
    pub fn push_fixed2_u64(&mut self, xs: [u64; 2]) -> Result<()> {
        self.enc.add_fixed_vector2_u64(xs)
    }
    pub fn push_fixed3_u64(&mut self, xs: [u64; 3]) -> Result<()> {
        self.enc.add_fixed_vector3_u64(xs)
    }
    pub fn push_fixed4_u64(&mut self, xs: [u64; 4]) -> Result<()> {
        self.enc.add_fixed_vector4_u64(xs)
    }
    pub fn push_fixed2_f64(&mut self, xs: [f64; 2]) -> Result<()> {
        self.enc.add_fixed_vector2_f64(xs)
    }
    pub fn push_fixed3_f64(&mut self, xs: [f64; 3]) -> Result<()> {
        self.enc.add_fixed_vector3_f64(xs)
    }
    pub fn push_fixed4_f64(&mut self, xs: [f64; 4]) -> Result<()> {
        self.enc.add_fixed_vector4_f64(xs)
    }

    /// Opens a nested heterogeneous vector, populates it with `f`, and
    /// closes it once `f` returns `Ok`.
    pub fn start_vector<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut VectorBuilder) -> Result<()>,
    {
        let start = self.enc.start_vector();
        f(&mut self.reborrow())?;
        self.enc.end_vector(start)
    }

    /// Opens a nested map, populates it with `f`, and closes it (sorting
    /// keys) once `f` returns `Ok`.
    pub fn start_map<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut MapBuilder) -> Result<()>,
    {
        let start = self.enc.start_map();
        f(&mut MapBuilder { enc: self.enc })?;
        self.enc.sort_and_end_map(start)
    }
}

impl<'f> MapBuilder<'f> {
    pub fn push_null(&mut self, key: &str) -> Result<()> {
        self.enc.add_key(key)?;
        self.enc.add_null()
    }

    map_pushes! {
        push_bool(bool) => add_bool,
        push_i64(i64) => add_i64,
        push_u64(u64) => add_u64,
        push_f64(f64) => add_f64,
        push_indirect_i64(i64) => add_indirect_i64,
        push_indirect_u64(u64) => add_indirect_u64,
        push_indirect_f64(f64) => add_indirect_f64,
    }

    pub fn push_string(&mut self, key: &str, s: &str) -> Result<()> {
        self.enc.add_key(key)?;
        self.enc.add_string(s)
    }

    pub fn push_raw_string_bytes(&mut self, key: &str, bytes: &[u8]) -> Result<()> {
        self.enc.add_key(key)?;
        self.enc.add_raw_string_bytes(bytes)
    }

    pub fn push_blob(&mut self, key: &str, bytes: &[u8]) -> Result<()> {
        self.enc.add_key(key)?;
        self.enc.add_blob(bytes)
    }

    pub fn push_vector_i64(&mut self, key: &str, xs: &[i64]) -> Result<()> {
        self.enc.add_key(key)?;
        self.enc.add_typed_vector_i64(xs)
    }

    pub fn push_vector_u64(&mut self, key: &str, xs: &[u64]) -> Result<()> {
        self.enc.add_key(key)?;
        self.enc.add_typed_vector_u64(xs)
    }

    pub fn push_vector_f64(&mut self, key: &str, xs: &[f64]) -> Result<()> {
        self.enc.add_key(key)?;
        self.enc.add_typed_vector_f64(xs)
    }

    pub fn push_vector_bool(&mut self, key: &str, xs: &[bool]) -> Result<()> {
        self.enc.add_key(key)?;
        self.enc.add_typed_vector_bool(xs)
    }

    /// Opens a nested heterogeneous vector under `key`, populates it with
    /// `f`, and closes it once `f` returns `Ok`.
    pub fn start_vector<F>(&mut self, key: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut VectorBuilder) -> Result<()>,
    {
        self.enc.add_key(key)?;
        let start = self.enc.start_vector();
        f(&mut VectorBuilder { enc: self.enc })?;
        self.enc.end_vector(start)
    }

    /// Opens a nested map under `key`, populates it with `f`, and closes
    /// it (sorting keys) once `f` returns `Ok`.
    pub fn start_map<F>(&mut self, key: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut MapBuilder) -> Result<()>,
    {
        self.enc.add_key(key)?;
        let start = self.enc.start_map();
        f(&mut MapBuilder { enc: self.enc })?;
        self.enc.sort_and_end_map(start)
    }
}

/// Builds a finished buffer whose root is a map, populated by `f`
/// (§6.10's `build_map`).
///
/// ```
/// let buf = flexpack::build_map(|m| {
///     m.push_i64("age", 40)?;
///     m.push_string("name", "julian")?;
///     Ok(())
/// }).unwrap();
/// assert_eq!(*buf.last().unwrap(), 1);
/// ```
pub fn build_map<F>(f: F) -> Result<Vec<u8>>
where
    F: FnOnce(&mut MapBuilder) -> Result<()>,
{
    let mut enc = FlexBuffer::new();
    let start = enc.start_map();
    f(&mut MapBuilder { enc: &mut enc })?;
    enc.sort_and_end_map(start)?;
    enc.finish()
}

/// Builds a finished buffer whose root is a heterogeneous vector,
/// populated by `f` (§6.10's `build_vector`).
pub fn build_vector<F>(f: F) -> Result<Vec<u8>>
where
    F: FnOnce(&mut VectorBuilder) -> Result<()>,
{
    let mut enc = FlexBuffer::new();
    let start = enc.start_vector();
    f(&mut VectorBuilder { enc: &mut enc })?;
    enc.end_vector(start)?;
    enc.finish()
}
