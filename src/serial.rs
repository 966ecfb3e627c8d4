//! Binary serialization of rule trees.
//!
//! Lets a tree parsed in one process be stored and evaluated in another
//! without re-parsing. The format is a 32-byte fixed header followed by a
//! bincode-encoded payload.
//!
//! ## Wire Format
//!
//! ```text
//! Offset  Size  Field
//! 0       4     Magic bytes: b"RTRE"
//! 4       2     Format version (u16, little-endian)
//! 6       2     Engine version (u16, little-endian)
//! 8       4     Flags (u32, reserved)
//! 12      4     Payload length in bytes (u32, little-endian)
//! 16      16    BLAKE3 hash of the payload (truncated to 16 bytes)
//! 32..    var   Bincode-encoded payload
//! ```
//!
//! The payload lists the tree in postfix order: conditions, then an
//! operator entry with its operand count. Chains of the same operator are
//! stored as one n-ary entry and rebuilt left-leaning on decode, which is
//! the shape both the parser and [`combine`](crate::combine()) produce.
//! Neither direction recurses, so trees of any depth round-trip.
//!
//! ## Versioning
//!
//! The format version in the header must match exactly. If it does not,
//! decoding fails immediately with [`DeserializeError::IncompatibleVersion`].
//! The engine version is informational only.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{BoolOp, Comparator, Condition, Node, Value};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const MAGIC: &[u8; 4] = b"RTRE";
const FORMAT_VERSION: u16 = 1;
const ENGINE_VERSION: u16 = 1;
const HEADER_SIZE: usize = 32;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur when serializing a [`Node`] to bytes.
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("failed to encode rule tree: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("I/O error during serialization: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur when deserializing a [`Node`] from bytes.
#[derive(Debug, Error)]
pub enum DeserializeError {
    #[error("not a rule tree binary: invalid magic bytes")]
    BadMagic,

    #[error("incompatible format version: blob is v{blob}, engine supports v{supported}")]
    IncompatibleVersion { blob: u16, supported: u16 },

    #[error("integrity check failed: BLAKE3 checksum mismatch")]
    ChecksumMismatch,

    #[error("payload length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: u32, actual: usize },

    #[error("failed to decode payload: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("I/O error during deserialization: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Serialized type hierarchy
// ---------------------------------------------------------------------------

// bincode cannot drive the self-describing `kind`-tagged representation the
// public types use, so the payload has its own externally tagged mirror.

#[derive(Debug, Serialize, Deserialize)]
struct SerializedTree {
    leaf_count: usize,
    /// Postfix order: an operator entry follows all of its operands.
    nodes: Vec<SerializedNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum SerializedNode {
    Cond {
        attribute: String,
        comparator: SerializedComparator,
        value: SerializedValue,
    },
    /// Operand count of the chain.
    And(usize),
    Or(usize),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum SerializedValue {
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
enum SerializedComparator {
    Gt,
    Lt,
    Eq,
}

// ---------------------------------------------------------------------------
// Leaf conversion
// ---------------------------------------------------------------------------

fn serialize_comparator(cmp: Comparator) -> SerializedComparator {
    match cmp {
        Comparator::Gt => SerializedComparator::Gt,
        Comparator::Lt => SerializedComparator::Lt,
        Comparator::Eq => SerializedComparator::Eq,
    }
}

fn deserialize_comparator(cmp: SerializedComparator) -> Comparator {
    match cmp {
        SerializedComparator::Gt => Comparator::Gt,
        SerializedComparator::Lt => Comparator::Lt,
        SerializedComparator::Eq => Comparator::Eq,
    }
}

fn serialize_value(value: &Value) -> SerializedValue {
    match value {
        Value::Int(v) => SerializedValue::Int(*v),
        Value::Float(v) => SerializedValue::Float(*v),
        Value::String(v) => SerializedValue::Str(v.clone()),
    }
}

fn deserialize_value(value: SerializedValue) -> Value {
    match value {
        SerializedValue::Int(v) => Value::Int(v),
        SerializedValue::Float(v) => Value::Float(v),
        SerializedValue::Str(v) => Value::String(v),
    }
}

// ---------------------------------------------------------------------------
// Tree flattening (binary -> postfix n-ary)
// ---------------------------------------------------------------------------

enum Task<'a> {
    Visit(&'a Node),
    Emit(SerializedNode),
}

fn flatten(root: &Node) -> SerializedTree {
    let mut nodes = Vec::new();
    let mut leaf_count = 0;
    let mut tasks = vec![Task::Visit(root)];

    while let Some(task) = tasks.pop() {
        let node = match task {
            Task::Emit(entry) => {
                nodes.push(entry);
                continue;
            }
            Task::Visit(node) => node,
        };
        match node {
            Node::Operand(cond) => {
                leaf_count += 1;
                nodes.push(SerializedNode::Cond {
                    attribute: cond.attribute.clone(),
                    comparator: serialize_comparator(cond.comparator),
                    value: serialize_value(&cond.value),
                });
            }
            Node::Operator { op: chain_op, .. } => {
                // Only the left spine folds into the chain; a right child
                // using the same operator came from explicit grouping and
                // stays nested.
                let mut rights = Vec::new();
                let mut head = node;
                while let Node::Operator { op, left, right } = head {
                    if *op != *chain_op {
                        break;
                    }
                    rights.push(right.as_ref());
                    head = left.as_ref();
                }
                let arity = rights.len() + 1;
                tasks.push(Task::Emit(match chain_op {
                    BoolOp::And => SerializedNode::And(arity),
                    BoolOp::Or => SerializedNode::Or(arity),
                }));
                // `rights` runs from the last operand back to the second.
                tasks.extend(rights.into_iter().map(Task::Visit));
                tasks.push(Task::Visit(head));
            }
        }
    }

    SerializedTree { leaf_count, nodes }
}

// ---------------------------------------------------------------------------
// Rebuild and validation (postfix n-ary -> binary)
// ---------------------------------------------------------------------------

fn invalid(reason: impl Into<String>) -> DeserializeError {
    DeserializeError::Validation(reason.into())
}

fn rebuild_condition(
    attribute: String,
    comparator: SerializedComparator,
    value: SerializedValue,
) -> Result<Condition, DeserializeError> {
    if attribute.is_empty() {
        return Err(invalid("condition with empty attribute"));
    }
    let comparator = deserialize_comparator(comparator);
    let value = deserialize_value(value);
    if comparator.is_numeric() && value.ordering_bound().is_none() {
        return Err(invalid(format!(
            "condition '{attribute} {comparator} {value}' needs a finite numeric literal"
        )));
    }
    Ok(Condition {
        attribute,
        comparator,
        value,
    })
}

fn fold_chain(stack: &mut Vec<Node>, op: BoolOp, arity: usize) -> Result<(), DeserializeError> {
    if arity < 2 {
        return Err(invalid(format!("operator chain with {arity} operand(s)")));
    }
    if arity > stack.len() {
        return Err(invalid(format!(
            "operator chain wants {arity} operands, only {} available",
            stack.len()
        )));
    }
    let mut operands = stack.split_off(stack.len() - arity).into_iter();
    let Some(first) = operands.next() else {
        return Err(invalid("operator chain with no operands"));
    };
    stack.push(operands.fold(first, |acc, child| Node::operator(op, acc, child)));
    Ok(())
}

/// Rebuild the tree, checking every entry on the way.
fn rebuild(ser: SerializedTree) -> Result<Node, DeserializeError> {
    let mut stack = Vec::new();
    let mut leaves = 0;

    for entry in ser.nodes {
        match entry {
            SerializedNode::Cond {
                attribute,
                comparator,
                value,
            } => {
                leaves += 1;
                stack.push(Node::Operand(rebuild_condition(attribute, comparator, value)?));
            }
            SerializedNode::And(arity) => fold_chain(&mut stack, BoolOp::And, arity)?,
            SerializedNode::Or(arity) => fold_chain(&mut stack, BoolOp::Or, arity)?,
        }
    }

    if leaves != ser.leaf_count {
        return Err(invalid(format!(
            "metadata says {} conditions but payload has {leaves}",
            ser.leaf_count
        )));
    }
    match (stack.pop(), stack.is_empty()) {
        (Some(root), true) => Ok(root),
        (None, _) => Err(invalid("empty payload")),
        (Some(_), false) => Err(invalid(format!(
            "payload leaves {} unconnected subtrees",
            stack.len() + 1
        ))),
    }
}

// ---------------------------------------------------------------------------
// Header I/O
// ---------------------------------------------------------------------------

fn write_header(buf: &mut Vec<u8>, payload: &[u8]) {
    let hash = blake3::hash(payload);
    let hash_bytes = hash.as_bytes();

    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    buf.extend_from_slice(&ENGINE_VERSION.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes()); // flags (reserved)
    #[allow(clippy::cast_possible_truncation)] // rule trees never approach 4 GiB
    let payload_len = payload.len() as u32;
    buf.extend_from_slice(&payload_len.to_le_bytes());
    buf.extend_from_slice(&hash_bytes[..16]);
}

#[allow(clippy::cast_possible_truncation)] // HEADER_SIZE is 32, always fits in u32
fn read_header(bytes: &[u8]) -> Result<(u16, u32, [u8; 16]), DeserializeError> {
    if bytes.len() < HEADER_SIZE {
        return Err(DeserializeError::LengthMismatch {
            expected: HEADER_SIZE as u32,
            actual: bytes.len(),
        });
    }

    if &bytes[0..4] != MAGIC {
        return Err(DeserializeError::BadMagic);
    }

    let format_version = u16::from_le_bytes([bytes[4], bytes[5]]);
    // bytes[6..8] is engine_version, bytes[8..12] is flags
    let payload_len = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);

    let mut hash = [0u8; 16];
    hash.copy_from_slice(&bytes[16..32]);

    Ok((format_version, payload_len, hash))
}

// ---------------------------------------------------------------------------
// Public encode/decode
// ---------------------------------------------------------------------------

pub(crate) fn encode(node: &Node) -> Result<Vec<u8>, SerializeError> {
    let serialized = flatten(node);
    let payload = bincode::serde::encode_to_vec(&serialized, bincode::config::standard())?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    write_header(&mut buf, &payload);
    buf.extend_from_slice(&payload);
    tracing::debug!(bytes = buf.len(), "encoded rule tree");
    Ok(buf)
}

pub(crate) fn decode(bytes: &[u8]) -> Result<Node, DeserializeError> {
    let (format_version, payload_len, stored_hash) = read_header(bytes)?;

    if format_version != FORMAT_VERSION {
        return Err(DeserializeError::IncompatibleVersion {
            blob: format_version,
            supported: FORMAT_VERSION,
        });
    }

    let payload_start = HEADER_SIZE;
    let payload_end = payload_start + payload_len as usize;
    if bytes.len() < payload_end {
        return Err(DeserializeError::LengthMismatch {
            expected: payload_len,
            actual: bytes.len() - HEADER_SIZE,
        });
    }
    let payload = &bytes[payload_start..payload_end];

    let computed_hash = blake3::hash(payload);
    if computed_hash.as_bytes()[..16] != stored_hash {
        return Err(DeserializeError::ChecksumMismatch);
    }

    let (serialized, _): (SerializedTree, usize) =
        bincode::serde::decode_from_slice(payload, bincode::config::standard())?;

    rebuild(serialized)
}

impl Node {
    /// Serialize this tree to a byte vector.
    ///
    /// # Errors
    ///
    /// Returns [`SerializeError`] if encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SerializeError> {
        encode(self)
    }

    /// Deserialize a tree previously produced by [`to_bytes`](Self::to_bytes).
    ///
    /// # Errors
    ///
    /// Returns [`DeserializeError`] on format, integrity, or validation
    /// failure.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DeserializeError> {
        decode(bytes)
    }

    /// Serialize this tree and write it to a file.
    ///
    /// # Errors
    ///
    /// Returns [`SerializeError`] on encoding or I/O failure.
    pub fn to_binary_file(&self, path: impl AsRef<std::path::Path>) -> Result<(), SerializeError> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Read a file and deserialize the tree it contains.
    ///
    /// # Errors
    ///
    /// Returns [`DeserializeError`] on I/O, format, integrity, or
    /// validation failure.
    pub fn from_binary_file(path: impl AsRef<std::path::Path>) -> Result<Self, DeserializeError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{attr, parse};

    fn cond(attribute: &str, comparator: SerializedComparator, value: SerializedValue) -> SerializedNode {
        SerializedNode::Cond {
            attribute: attribute.into(),
            comparator,
            value,
        }
    }

    fn eq_one(attribute: &str) -> SerializedNode {
        cond(attribute, SerializedComparator::Eq, SerializedValue::Int(1))
    }

    fn rejected(leaf_count: usize, nodes: Vec<SerializedNode>) -> bool {
        matches!(
            rebuild(SerializedTree { leaf_count, nodes }),
            Err(DeserializeError::Validation(_))
        )
    }

    #[test]
    fn left_chain_flattens_to_one_entry() {
        let tree = attr("a").eq(1).and(attr("b").eq(2)).and(attr("c").eq(3));
        let ser = flatten(&tree);
        assert_eq!(ser.leaf_count, 3);
        assert_eq!(ser.nodes.len(), 4);
        assert!(matches!(ser.nodes[3], SerializedNode::And(3)));
    }

    #[test]
    fn right_grouping_stays_nested() {
        let tree = parse("a = 1 AND (b = 2 AND c = 3)").unwrap();
        let ser = flatten(&tree);
        assert!(matches!(
            ser.nodes.as_slice(),
            [
                SerializedNode::Cond { .. },
                SerializedNode::Cond { .. },
                SerializedNode::Cond { .. },
                SerializedNode::And(2),
                SerializedNode::And(2),
            ]
        ));
        assert_eq!(rebuild(ser).unwrap(), tree);
    }

    #[test]
    fn mixed_operators_round_trip() {
        let tree = parse("(a = 1 OR b > 2 OR c < 3) AND d = 'x' AND (e = 1 OR f = 2)").unwrap();
        assert_eq!(rebuild(flatten(&tree)).unwrap(), tree);
    }

    #[test]
    fn deep_chain_round_trip() {
        let mut tree = attr("x0").eq(0);
        for i in 1..20_000_i64 {
            tree = tree.or(attr(&format!("x{}", i % 7)).eq(i));
        }
        let ser = flatten(&tree);
        assert_eq!(ser.nodes.len(), 20_001);
        assert_eq!(rebuild(ser).unwrap(), tree);
    }

    #[test]
    fn rebuild_rejects_short_chain() {
        assert!(rejected(1, vec![eq_one("a"), SerializedNode::Or(1)]));
    }

    #[test]
    fn rebuild_rejects_operand_underflow() {
        assert!(rejected(1, vec![eq_one("a"), SerializedNode::And(2)]));
        assert!(rejected(0, vec![SerializedNode::Or(2)]));
    }

    #[test]
    fn rebuild_rejects_unconnected_subtrees() {
        assert!(rejected(2, vec![eq_one("a"), eq_one("b")]));
        assert!(rejected(0, vec![]));
    }

    #[test]
    fn rebuild_rejects_empty_attribute() {
        assert!(rejected(
            1,
            vec![cond("", SerializedComparator::Gt, SerializedValue::Int(3))]
        ));
    }

    #[test]
    fn rebuild_rejects_non_numeric_ordering_literal() {
        assert!(rejected(
            1,
            vec![cond(
                "age",
                SerializedComparator::Gt,
                SerializedValue::Str("thirty".into())
            )]
        ));
        assert!(rejected(
            1,
            vec![cond(
                "age",
                SerializedComparator::Lt,
                SerializedValue::Float(f64::NAN)
            )]
        ));
        // `=` takes any literal.
        let ser = SerializedTree {
            leaf_count: 1,
            nodes: vec![cond(
                "name",
                SerializedComparator::Eq,
                SerializedValue::Str("thirty".into()),
            )],
        };
        assert_eq!(rebuild(ser).unwrap(), attr("name").eq("thirty"));
    }

    #[test]
    fn rebuild_rejects_leaf_count_mismatch() {
        assert!(rejected(5, flatten(&attr("a").eq(1)).nodes));
    }

    #[test]
    fn header_layout() {
        let bytes = encode(&attr("age").gt(30)).unwrap();
        assert_eq!(&bytes[0..4], MAGIC);
        assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), FORMAT_VERSION);
        let len = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]) as usize;
        assert_eq!(bytes.len(), HEADER_SIZE + len);
    }

    #[test]
    fn short_input_is_length_mismatch() {
        assert!(matches!(
            decode(b"RTRE"),
            Err(DeserializeError::LengthMismatch { .. })
        ));
    }
}
