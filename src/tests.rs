//! Literal end-to-end scenarios and boundary cases for the encoder.
//!
//! Kept colocated with the code under test, in the teacher's own style
//! (`apparentlymart-rust-binbin/src/tests.rs`), including its
//! `assert_eq_hex!` macro for readable failure output on byte buffers.

use super::builder::{build_map, build_vector};
use super::encoder::FlexBuffer;
use super::error::FlexBufferError;
use super::stack::TypeTag;
use super::width::{packed_type, Width};

// Borrowed from https://crates.io/crates/assert_hex, under MIT license.
macro_rules! assert_eq_hex {
    ($left:expr, $right:expr $(,)?) => ({
        match (&$left, &$right) {
            (left_val, right_val) => {
                if !(*left_val == *right_val) {
                    panic!(r#"assertion failed: `(left == right)`
  left: `{:#x?}`,
 right: `{:#x?}`"#, &*left_val, &*right_val)
                }
            }
        }
    });
}

#[test]
fn single_null() {
    let mut enc = FlexBuffer::new();
    enc.add_null().unwrap();
    let buf = enc.finish().unwrap();
    assert_eq_hex!(buf, vec![0x00, 0x00, 0x01]);
}

#[test]
fn single_bool_true() {
    let mut enc = FlexBuffer::new();
    enc.add_bool(true).unwrap();
    let buf = enc.finish().unwrap();
    assert_eq_hex!(buf, vec![0x01, packed_type(TypeTag::Bool, Width::W8), 0x01]);
    assert_eq_hex!(buf, vec![0x01, 0x68, 0x01]);
}

#[test]
fn single_int_257_needs_width_16() {
    let mut enc = FlexBuffer::new();
    enc.add_i64(257).unwrap();
    let buf = enc.finish().unwrap();
    assert_eq_hex!(buf, vec![0x01, 0x01, 0x05, 0x02]);
}

#[test]
fn int_minus_one_fits_width_8() {
    let mut enc = FlexBuffer::new();
    enc.add_i64(-1).unwrap();
    let buf = enc.finish().unwrap();
    // -1 as a single signed byte is 0xff; root width 1.
    assert_eq_hex!(buf, vec![0xff, packed_type(TypeTag::Int, Width::W8), 0x01]);
}

#[test]
fn int_128_needs_width_16_but_uint_128_fits_width_8() {
    let mut signed = FlexBuffer::new();
    signed.add_i64(128).unwrap();
    let signed_buf = signed.finish().unwrap();
    assert_eq!(signed_buf.last().copied(), Some(2));

    let mut unsigned = FlexBuffer::new();
    unsigned.add_u64(128).unwrap();
    let unsigned_buf = unsigned.finish().unwrap();
    assert_eq!(unsigned_buf.last().copied(), Some(1));
}

#[test]
fn fixed_vector3_of_small_ints() {
    // [1, 2, 3] as a VectorInt3 needs one byte per element and no
    // length prefix or type table (§6.4).
    let mut enc = FlexBuffer::new();
    enc.add_fixed_vector3_i64([1, 2, 3]).unwrap();
    let buf = enc.finish().unwrap();
    assert_eq_hex!(
        buf,
        vec![0x01, 0x02, 0x03, 0x03, packed_type(TypeTag::VectorInt3, Width::W8), 0x01]
    );
}

#[test]
fn map_is_emitted_in_key_sorted_order_regardless_of_insertion_order() {
    let mut enc = FlexBuffer::new();
    let start = enc.start_map();
    enc.add_key("b").unwrap();
    enc.add_i64(2).unwrap();
    enc.add_key("a").unwrap();
    enc.add_i64(1).unwrap();
    enc.sort_and_end_map(start).unwrap();
    let buf = enc.finish().unwrap();

    assert_eq_hex!(
        buf,
        vec![
            b'b', 0x00, // key "b" (interned first, at its insertion offset)
            b'a', 0x00, // key "a" (interned second)
            // keys vector carries no length of its own (§6.5: the shared
            // length field belongs to the values section) —
            0x02, // key[0] ("a") backward offset
            0x05, // key[1] ("b") backward offset
            0x02, // values header: keys_vector_offset (backward)
            0x01, // values header: keys_byte_width
            0x02, // values length
            0x01, // value for "a"
            0x02, // value for "b"
            packed_type(TypeTag::Int, Width::W8),
            packed_type(TypeTag::Int, Width::W8),
            0x04, // root value: backward offset to the values payload
            packed_type(TypeTag::Map, Width::W8),
            0x01, // root width
        ]
    );
}

#[test]
fn map_builder_sorts_keys_the_same_way() {
    let buf = build_map(|m| {
        m.push_i64("b", 2)?;
        m.push_i64("a", 1)?;
        Ok(())
    })
    .unwrap();
    let direct = {
        let mut enc = FlexBuffer::new();
        let start = enc.start_map();
        enc.add_key("b").unwrap();
        enc.add_i64(2).unwrap();
        enc.add_key("a").unwrap();
        enc.add_i64(1).unwrap();
        enc.sort_and_end_map(start).unwrap();
        enc.finish().unwrap()
    };
    assert_eq_hex!(buf, direct);
}

#[test]
fn duplicate_string_is_emitted_once() {
    let buf = build_vector(|v| {
        v.push_string("hi")?;
        v.push_string("hi")
    })
    .unwrap();
    let occurrences = buf.windows(3).filter(|w| *w == b"hi\0").count();
    assert_eq!(occurrences, 1, "\"hi\\0\" must appear exactly once in {buf:?}");
}

#[test]
fn key_bytes_are_deduplicated_across_nested_maps() {
    let buf = build_map(|m| {
        m.start_map("outer", |inner| {
            inner.push_i64("shared", 1)?;
            Ok(())
        })?;
        m.push_i64("shared", 2)?;
        Ok(())
    })
    .unwrap();
    let occurrences = buf.windows(7).filter(|w| *w == b"shared\0").count();
    assert_eq!(occurrences, 1);
}

#[test]
fn empty_vector_has_zero_length_and_no_elements() {
    let buf = build_vector(|_v| Ok(())).unwrap();
    // [length=0][root value: the payload starts right where the root
    // value is written, so the backward distance is 0][type][width].
    assert_eq_hex!(
        buf,
        vec![0x00, 0x00, packed_type(TypeTag::Vector, Width::W8), 0x01]
    );
}

#[test]
fn empty_map_has_zero_length_keys_and_values() {
    let buf = build_map(|_m| Ok(())).unwrap();
    assert!(buf.len() > 3, "an empty map still carries its (empty) keys/values headers");
    assert_eq!(*buf.last().unwrap(), 1);
}

#[test]
fn finish_requires_exactly_one_root() {
    let mut enc = FlexBuffer::new();
    let err = enc.finish().unwrap_err();
    assert_eq!(
        err,
        FlexBufferError::UnbalancedScope {
            expected: 1,
            actual: 0
        }
    );
}

#[test]
fn finish_rejects_leftover_values() {
    let mut enc = FlexBuffer::new();
    enc.add_null().unwrap();
    enc.add_null().unwrap();
    assert!(enc.finish().is_err());
}

#[test]
fn odd_map_entries_is_rejected() {
    let _ = env_logger::try_init();
    let mut enc = FlexBuffer::new();
    let start = enc.start_map();
    enc.add_key("a").unwrap();
    enc.add_i64(1).unwrap();
    enc.add_key("b").unwrap();
    let err = enc.sort_and_end_map(start).unwrap_err();
    assert_eq!(err, FlexBufferError::OddMapEntries { found: 3 });
}

#[test]
fn value_without_preceding_key_is_rejected() {
    let _ = env_logger::try_init();
    let mut enc = FlexBuffer::new();
    enc.start_map();
    let err = enc.add_i64(1).unwrap_err();
    assert_eq!(err, FlexBufferError::MissingKey);
}

#[test]
fn add_key_outside_a_map_scope_is_rejected() {
    let _ = env_logger::try_init();
    let mut enc = FlexBuffer::new();
    let err = enc.add_key("x").unwrap_err();
    assert_eq!(err, FlexBufferError::KeyOutsideMap);
}

#[test]
fn add_key_inside_a_vector_scope_is_rejected() {
    let _ = env_logger::try_init();
    let mut enc = FlexBuffer::new();
    enc.start_vector();
    let err = enc.add_key("x").unwrap_err();
    assert_eq!(err, FlexBufferError::KeyOutsideMap);
}

#[test]
fn poisoned_encoder_rejects_all_further_operations() {
    let _ = env_logger::try_init();
    let mut enc = FlexBuffer::new();
    enc.start_map();
    assert!(enc.add_i64(1).is_err());
    let err = enc.add_null().unwrap_err();
    assert_eq!(err, FlexBufferError::Poisoned);
}

#[test]
fn nested_vector_round_trips_through_the_builder() {
    let buf = build_vector(|v| {
        v.push_i64(1)?;
        v.start_vector(|inner| {
            inner.push_string("x")?;
            inner.push_string("y")
        })?;
        v.push_bool(true)
    })
    .unwrap();
    assert!(!buf.is_empty());
    assert!(matches!(*buf.last().unwrap(), 1 | 2 | 4 | 8));
}

#[test]
fn same_builder_calls_produce_byte_identical_output() {
    let build = || {
        build_map(|m| {
            m.push_string("name", "julian")?;
            m.push_i64("age", 40)?;
            m.push_vector_f64("scores", &[1.5, 2.0, 3.25])?;
            Ok(())
        })
        .unwrap()
    };
    assert_eq!(build(), build());
}
