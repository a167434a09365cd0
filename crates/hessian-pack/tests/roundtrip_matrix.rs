use chrono::{TimeZone, Utc};
use hessian_pack::{HessianDecoder, HessianEncoder, HessianMap, HessianObject, Value};

fn roundtrip(value: &Value) -> Value {
    let mut encoder = HessianEncoder::new();
    let mut decoder = HessianDecoder::new();
    let bytes = encoder.encode(value);
    // The panic message deliberately omits the value: cyclic graphs cannot
    // be debug-formatted.
    decoder
        .decode(&bytes)
        .unwrap_or_else(|e| panic!("roundtrip decode failed for {bytes:02x?}: {e}"))
}

fn obj(class: &str, fields: &[(&str, Value)]) -> Value {
    let mut object = HessianObject::new(class);
    for (name, value) in fields {
        object.set(*name, value.clone());
    }
    Value::object(object)
}

#[test]
fn scalar_roundtrip_matrix() {
    let docs = vec![
        Value::Null,
        Value::Bool(true),
        Value::Bool(false),
        Value::Int(0),
        Value::Int(-16),
        Value::Int(47),
        Value::Int(48),
        Value::Int(-2048),
        Value::Int(2047),
        Value::Int(-262_144),
        Value::Int(262_143),
        Value::Int(i32::MIN),
        Value::Int(i32::MAX),
        Value::Long(0),
        Value::Long(-8),
        Value::Long(15),
        Value::Long(-2048),
        Value::Long(2047),
        Value::Long(-262_144),
        Value::Long(262_143),
        Value::Long(i32::MIN as i64),
        Value::Long(i32::MAX as i64),
        Value::Long(i64::MIN),
        Value::Long(i64::MAX),
        Value::Double(0.0),
        Value::Double(1.0),
        Value::Double(-1.0),
        Value::Double(127.0),
        Value::Double(-128.0),
        Value::Double(32_767.0),
        Value::Double(12.25),
        Value::Double(std::f64::consts::PI),
        Value::Double(-12_321.321_123),
        Value::Str(String::new()),
        Value::Str("abc123".into()),
        Value::Str("x".repeat(31)),
        Value::Str("x".repeat(32)),
        Value::Str("y".repeat(1023)),
        Value::Str("y".repeat(1024)),
        Value::Str("...................\u{1f389}.....................".into()),
        Value::Bytes(Vec::new()),
        Value::Bytes(vec![1, 2, 3]),
        Value::Bytes(vec![0xab; 15]),
        Value::Bytes(vec![0xab; 16]),
        Value::Bytes(vec![0xcd; 1023]),
        Value::Bytes(vec![0xcd; 1024]),
        Value::Date(Utc.timestamp_millis_opt(0).unwrap()),
        Value::Date(Utc.timestamp_millis_opt(120_000).unwrap()),
        Value::Date(Utc.timestamp_millis_opt(1_234_567_890).unwrap()),
        Value::Date(Utc.timestamp_millis_opt(-1_234_567_890).unwrap()),
        Value::Date(Utc.timestamp_millis_opt(-60_000).unwrap()),
    ];
    for doc in docs {
        assert_eq!(roundtrip(&doc), doc, "roundtrip failed for {doc:?}");
    }
}

#[test]
fn chunked_string_roundtrip() {
    // Past the short-form maximum the encoder chunks at 0xffff characters.
    let long = "a".repeat(70_000);
    let value = Value::Str(long);
    assert_eq!(roundtrip(&value), value);
}

#[test]
fn chunked_binary_roundtrip() {
    let value = Value::Bytes(vec![0x5a; 70_000]);
    assert_eq!(roundtrip(&value), value);
}

#[test]
fn composite_roundtrip_matrix() {
    let docs = vec![
        Value::list(Vec::new()),
        Value::list(vec![Value::Int(1)]),
        Value::list(vec![
            Value::Int(0),
            Value::Double(1.32),
            Value::Str("str".into()),
            Value::Bool(true),
            Value::Bool(false),
            Value::Null,
            Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
        ]),
        // Nine elements forces the sized vector form.
        Value::list((0..9).map(Value::Int).collect()),
        Value::map(HessianMap::new()),
        Value::map(
            [
                (Value::Str("foo".into()), Value::Str("bar".into())),
                (Value::Int(5), Value::Bool(true)),
                (
                    Value::Str("nested".into()),
                    Value::map(
                        [(Value::Str("x".into()), Value::Int(1))]
                            .into_iter()
                            .collect::<HessianMap>(),
                    ),
                ),
            ]
            .into_iter()
            .collect::<HessianMap>(),
        ),
        obj("example.Empty", &[]),
        obj(
            "example.Point",
            &[("x", Value::Int(1)), ("y", Value::Int(2))],
        ),
    ];
    for doc in docs {
        assert_eq!(roundtrip(&doc), doc, "roundtrip failed for {doc:?}");
    }
}

#[test]
fn map_with_composite_key_roundtrips() {
    let key = Value::list(vec![Value::Int(0), Value::Int(1)]);
    let value = Value::map(
        [(key, Value::Str("pair".into()))]
            .into_iter()
            .collect::<HessianMap>(),
    );
    assert_eq!(roundtrip(&value), value);
}

#[test]
fn shared_subtrees_stay_shared() {
    let inner = Value::list(vec![Value::Int(7)]);
    let outer = Value::list(vec![inner.clone(), inner.clone(), inner]);
    let decoded = roundtrip(&outer);
    let items = decoded.as_list().unwrap().borrow();
    assert!(items[0].ptr_eq(&items[1]));
    assert!(items[1].ptr_eq(&items[2]));
    assert_eq!(items[0], Value::list(vec![Value::Int(7)]));
}

#[test]
fn cyclic_list_roundtrips_by_identity() {
    let list = Value::list(Vec::new());
    if let Value::List(handle) = &list {
        handle.borrow_mut().push(list.clone());
        handle.borrow_mut().push(Value::Int(1));
    }
    let decoded = roundtrip(&list);
    let handle = decoded.as_list().unwrap();
    let first = handle.borrow()[0].clone();
    assert!(decoded.ptr_eq(&first));
    assert_eq!(handle.borrow()[1], Value::Int(1));
}

#[test]
fn self_referential_object_roundtrips() {
    let node = Value::object(HessianObject::new("Self"));
    if let Value::Object(handle) = &node {
        handle.borrow_mut().set("next", node.clone());
    }
    let decoded = roundtrip(&node);
    let handle = decoded.as_object().unwrap();
    let next = handle.borrow().get("next").cloned().unwrap();
    assert!(decoded.ptr_eq(&next));
}

#[test]
fn mutually_referencing_objects_roundtrip() {
    let a = Value::object(HessianObject::new("Node"));
    let b = Value::object(HessianObject::new("Node"));
    if let (Value::Object(ha), Value::Object(hb)) = (&a, &b) {
        ha.borrow_mut().set("peer", b.clone());
        hb.borrow_mut().set("peer", a.clone());
    }
    let decoded = roundtrip(&a);
    let da = decoded.as_object().unwrap();
    let db = da.borrow().get("peer").cloned().unwrap();
    let back = db.as_object().unwrap().borrow().get("peer").cloned().unwrap();
    assert!(decoded.ptr_eq(&back));
    assert!(!decoded.ptr_eq(&db));
}

#[test]
fn class_definitions_are_deduplicated() {
    let first = obj("Pt", &[("x", Value::Int(1)), ("y", Value::Int(2))]);
    let second = obj("Pt", &[("x", Value::Int(3)), ("y", Value::Int(4))]);
    let list = Value::list(vec![first, second]);
    let mut encoder = HessianEncoder::new();
    let bytes = encoder.encode(&list);
    // One definition serves both instances.
    assert_eq!(bytes.iter().filter(|&&b| b == b'C').count(), 1);
    let decoded = HessianDecoder::new().decode(&bytes).unwrap();
    assert_eq!(decoded, list);
}

#[test]
fn distinct_field_lists_get_distinct_definitions() {
    let first = obj("Pt", &[("x", Value::Int(1))]);
    let second = obj("Pt", &[("y", Value::Int(2))]);
    let list = Value::list(vec![first, second]);
    let mut encoder = HessianEncoder::new();
    let bytes = encoder.encode(&list);
    assert_eq!(bytes.iter().filter(|&&b| b == b'C').count(), 2);
    let decoded = HessianDecoder::new().decode(&bytes).unwrap();
    assert_eq!(decoded, list);
}

#[test]
fn seventeen_classes_reach_the_long_instance_form() {
    // Definition index 16 no longer fits a compact instance opcode.
    let items: Vec<Value> = (0..17)
        .map(|i| obj(&format!("C{i}"), &[("v", Value::Int(i))]))
        .collect();
    let list = Value::list(items);
    let mut encoder = HessianEncoder::new();
    let bytes = encoder.encode(&list);
    assert!(bytes.contains(&b'O'));
    let decoded = HessianDecoder::new().decode(&bytes).unwrap();
    assert_eq!(decoded, list);
}

#[test]
fn roundtrip_survives_byte_at_a_time_decode() {
    let value = Value::map(
        [
            (
                Value::Str("list".into()),
                Value::list(vec![Value::Int(1), Value::Str("\u{20ac}".into())]),
            ),
            (Value::Str("bin".into()), Value::Bytes(vec![0, 255, 7])),
        ]
        .into_iter()
        .collect::<HessianMap>(),
    );
    let mut encoder = HessianEncoder::new();
    let bytes = encoder.encode(&value);
    let mut decoder = HessianDecoder::new();
    for byte in &bytes {
        decoder.feed(std::slice::from_ref(byte)).unwrap();
    }
    assert_eq!(decoder.finalize().unwrap(), value);
}
