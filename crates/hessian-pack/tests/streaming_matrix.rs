use hessian_pack::{HessianDecodeError, HessianDecoder, HessianMap, Value};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Decoding must be insensitive to how the input is partitioned: the whole
/// slice, every two-way split, and one byte at a time all yield the same
/// value.
fn assert_incremental(bytes: &[u8], expected: &Value) {
    let mut decoder = HessianDecoder::new();
    decoder.feed(bytes).unwrap();
    assert_eq!(decoder.finalize().unwrap(), *expected, "whole slice");

    for split in 0..=bytes.len() {
        let mut decoder = HessianDecoder::new();
        decoder.feed(&bytes[..split]).unwrap();
        decoder.feed(&bytes[split..]).unwrap();
        assert_eq!(
            decoder.finalize().unwrap(),
            *expected,
            "split at {split} of {bytes:02x?}"
        );
    }

    let mut decoder = HessianDecoder::new();
    for byte in bytes {
        decoder.feed(std::slice::from_ref(byte)).unwrap();
    }
    assert_eq!(decoder.finalize().unwrap(), *expected, "byte at a time");
}

#[test]
fn incrementality_matrix() {
    let docs: Vec<(Vec<u8>, Value)> = vec![
        (vec![0x49, 0x00, 0x00, 0x01, 0x00], Value::Int(256)),
        (
            vec![0x4c, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00],
            Value::Long(1 << 32),
        ),
        (
            vec![0x44, 0x40, 0x09, 0x21, 0xfb, 0x54, 0x44, 0x2d, 0x18],
            Value::Double(std::f64::consts::PI),
        ),
        (vec![0x03, b'f', b'o', b'o'], Value::Str("foo".into())),
        // Multi-byte characters arrive one byte at a time too.
        (
            vec![0x02, 0xe2, 0x82, 0xac, 0xe2, 0x82, 0xac],
            Value::Str("\u{20ac}\u{20ac}".into()),
        ),
        (
            vec![0x52, 0x00, 0x01, b'a', 0x53, 0x00, 0x01, b'b'],
            Value::Str("ab".into()),
        ),
        (vec![0x23, 1, 2, 3], Value::Bytes(vec![1, 2, 3])),
        (
            vec![0x57, 0x90, 0x91, b'Z'],
            Value::list(vec![Value::Int(0), Value::Int(1)]),
        ),
        (
            vec![0x56, 0x04, b'[', b'i', b'n', b't', 0x92, 0x90, 0x91],
            Value::list(vec![Value::Int(0), Value::Int(1)]),
        ),
        (
            vec![0x48, 0x01, b'k', 0x7a, 0x90, 0x91, b'Z'],
            Value::map(
                [(
                    Value::Str("k".into()),
                    Value::list(vec![Value::Int(0), Value::Int(1)]),
                )]
                .into_iter()
                .collect::<HessianMap>(),
            ),
        ),
        (
            vec![
                0x43, 0x01, b'A', 0x91, 0x01, b'v', // class A {v}
                0x60, 0x99, // A{v: 9}
            ],
            {
                let mut object = hessian_pack::HessianObject::new("A");
                object.set("v", Value::Int(9));
                Value::object(object)
            },
        ),
    ];
    for (bytes, expected) in docs {
        assert_incremental(&bytes, &expected);
    }
}

#[test]
fn seeded_random_partitions() {
    // One composite document, decoded under 64 random partitions.
    let bytes: Vec<u8> = vec![
        0x48, // map
        0x05, b'i', b't', b'e', b'm', b's', // "items"
        0x57, 0x90, 0x5c, 0x03, b'f', b'o', b'o', 0x54, b'Z', // streamed vector
        0x04, b'b', b'l', b'o', b'b', // "blob"
        0x23, 0xde, 0xad, 0xbe, // bytes
        b'Z',
    ];
    let mut decoder = HessianDecoder::new();
    decoder.feed(&bytes).unwrap();
    let expected = decoder.finalize().unwrap();

    let mut rng = StdRng::seed_from_u64(0x4865_7373);
    for _ in 0..64 {
        let mut decoder = HessianDecoder::new();
        let mut rest: &[u8] = &bytes;
        while !rest.is_empty() {
            let take = rng.gen_range(1..=rest.len());
            decoder.feed(&rest[..take]).unwrap();
            rest = &rest[take..];
        }
        assert_eq!(decoder.finalize().unwrap(), expected);
    }
}

#[test]
fn feeding_nothing_is_harmless() {
    let mut decoder = HessianDecoder::new();
    decoder.feed(&[]).unwrap();
    decoder.feed(&[0x54]).unwrap();
    decoder.feed(&[]).unwrap();
    assert_eq!(decoder.finalize().unwrap(), Value::Bool(true));
}

#[test]
fn finalize_before_any_value_fails() {
    let mut decoder = HessianDecoder::new();
    assert_eq!(decoder.finalize(), Err(HessianDecodeError::UnexpectedEnd));
}

#[test]
fn reset_restores_a_fresh_decoder() {
    let mut decoder = HessianDecoder::new();
    decoder.feed(&[0x57, 0x90]).unwrap();
    decoder.reset();
    // Reference and definition tables were cleared along with the stack.
    assert_eq!(
        decoder.decode(&[0x51, 0x90]),
        Err(HessianDecodeError::RefOutOfBounds)
    );
    decoder.reset();
    assert_eq!(decoder.decode(&[0x90]), Ok(Value::Int(0)));
}

#[test]
fn finalize_resets_tables_between_cycles() {
    let mut decoder = HessianDecoder::new();
    decoder.feed(&[0x78]).unwrap();
    decoder.finalize().unwrap();
    // The previous cycle's list no longer occupies reference index 0.
    assert_eq!(
        decoder.decode(&[0x51, 0x90]),
        Err(HessianDecodeError::RefOutOfBounds)
    );
}

#[test]
fn rejection_matrix() {
    // The complete set of bytes that open no value.
    for byte in [0x40u8, 0x45, 0x47, 0x50, 0x5a] {
        let mut decoder = HessianDecoder::new();
        assert_eq!(
            decoder.feed(&[byte]),
            Err(HessianDecodeError::InvalidValueStart),
            "byte 0x{byte:02x}"
        );
    }
    // Every other byte opens a value. (Compact object-instance opcodes are
    // recognized but fail differently here: no class has been defined.)
    for byte in 0..=0xffu8 {
        if [0x40, 0x45, 0x47, 0x50, 0x5a].contains(&byte) {
            continue;
        }
        let mut decoder = HessianDecoder::new();
        assert_ne!(
            decoder.feed(&[byte]),
            Err(HessianDecodeError::InvalidValueStart),
            "byte 0x{byte:02x}"
        );
    }
}

#[test]
fn errors_poison_until_reset() {
    let mut decoder = HessianDecoder::new();
    assert_eq!(
        decoder.feed(&[0x57, 0x45]),
        Err(HessianDecodeError::InvalidValueStart)
    );
    // The original error sticks for feed and finalize alike.
    assert_eq!(
        decoder.feed(&[0x90]),
        Err(HessianDecodeError::InvalidValueStart)
    );
    assert_eq!(
        decoder.finalize(),
        Err(HessianDecodeError::InvalidValueStart)
    );
    decoder.reset();
    assert_eq!(decoder.decode(&[0x90]), Ok(Value::Int(0)));
}

#[test]
fn error_reports_on_the_offending_byte() {
    let mut decoder = HessianDecoder::new();
    // Everything before the bad byte is accepted.
    decoder.feed(&[0x57, 0x90]).unwrap();
    assert_eq!(
        decoder.feed(&[0x45]),
        Err(HessianDecodeError::InvalidValueStart)
    );
}

#[test]
fn strictness_survives_partitioned_input() {
    // The size prefix of a fixed vector stays int-strict even when the
    // opener and the offending byte arrive in separate feeds.
    let mut decoder = HessianDecoder::new();
    decoder.feed(&[0x58]).unwrap();
    assert_eq!(
        decoder.feed(&[0x4e]),
        Err(HessianDecodeError::ExpectedInteger)
    );
}
