#![cfg(feature = "binary-cache")]

use ruletree::{attr, combine, evaluate, parse, BoolOp, DeserializeError, Node, Record};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn simple_tree() -> Node {
    parse("age > 30 AND department = 'Sales'").unwrap()
}

fn complex_tree() -> Node {
    parse(
        "((age > 30 AND department = 'Sales') OR (age < 25 AND department = 'Marketing')) AND (salary > 50000 OR experience > 5)",
    )
    .unwrap()
}

fn sales_record() -> Record {
    Record::new()
        .set("age", 35_i64)
        .set("department", "Sales")
        .set("salary", 60_000_i64)
        .set("experience", 2_i64)
}

// ---------------------------------------------------------------------------
// Round-trip
// ---------------------------------------------------------------------------

#[test]
fn round_trip_simple() {
    let original = simple_tree();
    let bytes = original.to_bytes().unwrap();
    let restored = Node::from_bytes(&bytes).unwrap();
    assert_eq!(restored, original);

    let record = sales_record();
    assert_eq!(
        evaluate(Some(&original), &record),
        evaluate(Some(&restored), &record)
    );
}

#[test]
fn round_trip_complex() {
    let original = complex_tree();
    let restored = Node::from_bytes(&original.to_bytes().unwrap()).unwrap();
    assert_eq!(restored, original);
    assert!(evaluate(Some(&restored), &sales_record()));

    let junior_sales = Record::new()
        .set("age", 22_i64)
        .set("department", "Sales")
        .set("salary", 60_000_i64);
    assert!(!evaluate(Some(&restored), &junior_sales));
}

#[test]
fn single_condition_round_trip() {
    let original = attr("rating").lt(4.5);
    assert_eq!(Node::from_bytes(&original.to_bytes().unwrap()).unwrap(), original);
}

#[test]
fn long_chain_round_trip() {
    // Same-operator left spines are stored flat; shape must survive.
    let leaves = (0..200).map(|i| attr(&format!("x{i}")).eq(i64::from(i)));
    let original = combine(leaves, BoolOp::And).unwrap();
    let restored = Node::from_bytes(&original.to_bytes().unwrap()).unwrap();
    assert_eq!(restored.leaf_count(), 200);
    assert_eq!(restored.depth(), original.depth());
    assert_eq!(restored, original);
}

#[test]
fn very_deep_chain_round_trip() {
    let text = (0..10_000)
        .map(|i| format!("x{} = {i}", i % 7))
        .collect::<Vec<_>>()
        .join(" OR ");
    let original = parse(&text).unwrap();
    let restored = Node::from_bytes(&original.to_bytes().unwrap()).unwrap();
    assert_eq!(restored.depth(), 10_000);
    assert_eq!(restored, original);

    let record = Record::new().set("x6", 6_i64);
    assert!(evaluate(Some(&restored), &record));
}

#[test]
fn hand_built_ordering_literal_must_be_numeric() {
    let bytes = attr("age").gt("thirty").to_bytes().unwrap();
    let err = Node::from_bytes(&bytes).unwrap_err();
    assert!(
        matches!(err, DeserializeError::Validation(_)),
        "expected Validation, got: {err}"
    );

    let numeric = attr("age").gt(" 30 ");
    assert_eq!(Node::from_bytes(&numeric.to_bytes().unwrap()).unwrap(), numeric);
}

#[test]
fn mixed_nesting_round_trip() {
    let a = attr("a").eq(1);
    let b = attr("b").eq(2);
    let c = attr("c").eq(3);
    let d = attr("d").eq(4);
    let shapes = [
        a.clone().and(b.clone()).and(c.clone()).or(d.clone()),
        a.clone().and(b.clone().and(c.clone())),
        a.clone().or(b.clone()).and(c.clone().or(d.clone())),
        a.or(b.and(c.or(d))),
    ];
    for original in shapes {
        let restored = Node::from_bytes(&original.to_bytes().unwrap()).unwrap();
        assert_eq!(restored, original, "shape {original}");
    }
}

#[test]
fn all_value_types_round_trip() {
    let original = attr("i")
        .eq(-42)
        .and(attr("f").gt(2.5))
        .and(attr("s").eq("O'Neil"))
        .and(attr("n").lt(i64::MAX));
    assert_eq!(Node::from_bytes(&original.to_bytes().unwrap()).unwrap(), original);
}

#[test]
fn encoding_determinism() {
    let tree = complex_tree();
    assert_eq!(tree.to_bytes().unwrap(), tree.to_bytes().unwrap());
}

// ---------------------------------------------------------------------------
// Corruption
// ---------------------------------------------------------------------------

#[test]
fn corruption_byte_flip() {
    let mut corrupted = simple_tree().to_bytes().unwrap();
    let last = corrupted.len() - 1;
    corrupted[last] ^= 0xFF;

    let err = Node::from_bytes(&corrupted).unwrap_err();
    assert!(
        matches!(err, DeserializeError::ChecksumMismatch),
        "expected ChecksumMismatch, got: {err}"
    );
}

#[test]
fn corruption_truncation() {
    let bytes = simple_tree().to_bytes().unwrap();
    let truncated = &bytes[..33];

    let err = Node::from_bytes(truncated).unwrap_err();
    assert!(
        matches!(err, DeserializeError::LengthMismatch { .. }),
        "expected LengthMismatch, got: {err}"
    );
}

#[test]
fn bad_magic() {
    let mut bad = simple_tree().to_bytes().unwrap();
    bad[0..4].copy_from_slice(b"BAAD");

    let err = Node::from_bytes(&bad).unwrap_err();
    assert!(
        matches!(err, DeserializeError::BadMagic),
        "expected BadMagic, got: {err}"
    );
}

#[test]
fn version_mismatch() {
    let mut bad = simple_tree().to_bytes().unwrap();
    bad[4] = 99;
    bad[5] = 0;

    let err = Node::from_bytes(&bad).unwrap_err();
    assert!(
        matches!(
            err,
            DeserializeError::IncompatibleVersion {
                blob: 99,
                supported: 1
            }
        ),
        "expected IncompatibleVersion, got: {err}"
    );
}

#[test]
fn empty_input_rejected() {
    let err = Node::from_bytes(&[]).unwrap_err();
    assert!(matches!(err, DeserializeError::LengthMismatch { .. }));
}

// ---------------------------------------------------------------------------
// File round-trip
// ---------------------------------------------------------------------------

#[test]
fn file_round_trip() {
    let dir = std::env::temp_dir().join("ruletree_test_binary_cache");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("eligibility.rtree");

    let original = complex_tree();
    original.to_binary_file(&path).unwrap();
    let restored = Node::from_binary_file(&path).unwrap();
    assert_eq!(restored, original);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn missing_file_is_io_error() {
    let path = std::env::temp_dir().join("ruletree_test_missing/none.rtree");
    let err = Node::from_binary_file(path).unwrap_err();
    assert!(matches!(err, DeserializeError::Io(_)));
}
