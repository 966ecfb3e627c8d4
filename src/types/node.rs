use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, OnceLock};

use super::Value;

/// Comparators allowed in a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Comparator {
    #[cfg_attr(feature = "serde", serde(rename = ">"))]
    Gt,
    #[cfg_attr(feature = "serde", serde(rename = "<"))]
    Lt,
    #[cfg_attr(feature = "serde", serde(rename = "="))]
    Eq,
}

impl Comparator {
    /// Parse the textual form. Only the exact symbols `>`, `<` and `=` match.
    #[must_use]
    pub fn from_symbol(s: &str) -> Option<Self> {
        match s {
            ">" => Some(Comparator::Gt),
            "<" => Some(Comparator::Lt),
            "=" => Some(Comparator::Eq),
            _ => None,
        }
    }

    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Comparator::Gt => ">",
            Comparator::Lt => "<",
            Comparator::Eq => "=",
        }
    }

    /// `true` for the ordering comparators that need numeric operands.
    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(self, Comparator::Gt | Comparator::Lt)
    }
}

/// Boolean connectives joining two subtrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BoolOp {
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "AND"))]
    And,
    #[cfg_attr(feature = "serde", serde(rename = "OR"))]
    Or,
}

impl BoolOp {
    /// Parse a keyword. Matching is case-sensitive: `and` is not `AND`.
    #[must_use]
    pub fn from_keyword(s: &str) -> Option<Self> {
        match s {
            "AND" => Some(BoolOp::And),
            "OR" => Some(BoolOp::Or),
            _ => None,
        }
    }

    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            BoolOp::And => "AND",
            BoolOp::Or => "OR",
        }
    }
}

/// A single `attribute comparator value` test.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Condition {
    pub attribute: String,
    pub comparator: Comparator,
    pub value: Value,
}

/// A rule tree.
///
/// Operand nodes are leaves; operator nodes always own exactly two children.
/// Children sit behind [`Arc`], so wrapping a tree in a larger one never
/// copies it and one subtree can be shared by several parents or threads.
/// There are no mutating accessors: a tree is fixed once built.
///
/// Combined and flat rules lean left, so a tree can be as deep as it has
/// conditions. Walks, comparison and drop use an explicit stack rather than
/// recursion and handle any depth.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(tag = "kind", rename_all = "lowercase")
)]
pub enum Node {
    Operand(Condition),
    Operator {
        #[cfg_attr(feature = "serde", serde(rename = "operator"))]
        op: BoolOp,
        left: Arc<Node>,
        right: Arc<Node>,
    },
}

impl Node {
    #[must_use]
    pub fn operand(attribute: impl Into<String>, comparator: Comparator, value: Value) -> Node {
        Node::Operand(Condition {
            attribute: attribute.into(),
            comparator,
            value,
        })
    }

    #[must_use]
    pub fn operator(op: BoolOp, left: impl Into<Arc<Node>>, right: impl Into<Arc<Node>>) -> Node {
        Node::Operator {
            op,
            left: left.into(),
            right: right.into(),
        }
    }

    #[must_use]
    pub fn and(self, other: Node) -> Node {
        Node::operator(BoolOp::And, self, other)
    }

    #[must_use]
    pub fn or(self, other: Node) -> Node {
        Node::operator(BoolOp::Or, self, other)
    }

    #[must_use]
    pub fn is_operand(&self) -> bool {
        matches!(self, Node::Operand(_))
    }

    /// Every node, parents before children, left subtree before right.
    pub fn nodes(&self) -> Nodes<'_> {
        Nodes { stack: vec![self] }
    }

    /// Number of operand (leaf) nodes.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.nodes().filter(|n| n.is_operand()).count()
    }

    /// Number of operator (internal) nodes.
    #[must_use]
    pub fn operator_count(&self) -> usize {
        self.nodes().filter(|n| !n.is_operand()).count()
    }

    /// Height of the tree; a lone operand has depth 1.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self, 1_usize)];
        while let Some((node, level)) = stack.pop() {
            deepest = deepest.max(level);
            if let Node::Operator { left, right, .. } = node {
                stack.push((right.as_ref(), level + 1));
                stack.push((left.as_ref(), level + 1));
            }
        }
        deepest
    }

    /// Leaf conditions in left-to-right order.
    #[must_use]
    pub fn conditions(&self) -> Vec<&Condition> {
        self.nodes()
            .filter_map(|n| match n {
                Node::Operand(cond) => Some(cond),
                Node::Operator { .. } => None,
            })
            .collect()
    }

    /// Distinct attribute names read by this tree, sorted.
    #[must_use]
    pub fn attributes(&self) -> BTreeSet<&str> {
        self.conditions()
            .into_iter()
            .map(|c| c.attribute.as_str())
            .collect()
    }
}

/// Pre-order iterator returned by [`Node::nodes`].
#[derive(Debug, Clone)]
pub struct Nodes<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Nodes<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<&'a Node> {
        let node = self.stack.pop()?;
        if let Node::Operator { left, right, .. } = node {
            self.stack.push(right.as_ref());
            self.stack.push(left.as_ref());
        }
        Some(node)
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        let mut pending = vec![(self, other)];
        while let Some((a, b)) = pending.pop() {
            match (a, b) {
                (Node::Operand(x), Node::Operand(y)) => {
                    if x != y {
                        return false;
                    }
                }
                (
                    Node::Operator {
                        op: op_a,
                        left: left_a,
                        right: right_a,
                    },
                    Node::Operator {
                        op: op_b,
                        left: left_b,
                        right: right_b,
                    },
                ) => {
                    if op_a != op_b {
                        return false;
                    }
                    if !Arc::ptr_eq(right_a, right_b) {
                        pending.push((right_a.as_ref(), right_b.as_ref()));
                    }
                    if !Arc::ptr_eq(left_a, left_b) {
                        pending.push((left_a.as_ref(), left_b.as_ref()));
                    }
                }
                _ => return false,
            }
        }
        true
    }
}

/// Stand-in child swapped into a node while it is torn down.
fn detached() -> Arc<Node> {
    static DETACHED: OnceLock<Arc<Node>> = OnceLock::new();
    Arc::clone(DETACHED.get_or_init(|| {
        Arc::new(Node::operand(String::new(), Comparator::Eq, Value::Int(0)))
    }))
}

impl Drop for Node {
    fn drop(&mut self) {
        let Node::Operator { left, right, .. } = self else {
            return;
        };
        let placeholder = detached();
        if Arc::ptr_eq(left, &placeholder) && Arc::ptr_eq(right, &placeholder) {
            return;
        }
        // Children this node owns outright are unlinked here, one level at a
        // time, so the default drop never recurses down a long chain.
        let mut pending = vec![
            std::mem::replace(left, Arc::clone(&placeholder)),
            std::mem::replace(right, Arc::clone(&placeholder)),
        ];
        while let Some(child) = pending.pop() {
            if let Some(mut node) = Arc::into_inner(child) {
                if let Node::Operator { left, right, .. } = &mut node {
                    pending.push(std::mem::replace(left, Arc::clone(&placeholder)));
                    pending.push(std::mem::replace(right, Arc::clone(&placeholder)));
                }
            }
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for BoolOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.attribute, self.comparator, self.value)
    }
}

enum Piece<'a> {
    Node(&'a Node),
    Keyword(BoolOp),
    Close,
}

/// Canonical rule text. Operator nodes are always parenthesized so the
/// output parses back into the same shape.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut stack = vec![Piece::Node(self)];
        while let Some(piece) = stack.pop() {
            match piece {
                Piece::Node(Node::Operand(cond)) => write!(f, "{cond}")?,
                Piece::Node(Node::Operator { op, left, right }) => {
                    f.write_str("(")?;
                    stack.push(Piece::Close);
                    stack.push(Piece::Node(right.as_ref()));
                    stack.push(Piece::Keyword(*op));
                    stack.push(Piece::Node(left.as_ref()));
                }
                Piece::Keyword(op) => write!(f, " {op} ")?,
                Piece::Close => f.write_str(")")?,
            }
        }
        Ok(())
    }
}

/// Deepest tree [`Node`]'s `Serialize` impl writes; deeper trees fail with
/// a serializer error. Self-describing formats nest once per level, and
/// `serde_json` reads at most 127 levels unless its limit is disabled. The
/// binary cache has no depth limit.
#[cfg(feature = "serde")]
pub const MAX_INTERCHANGE_DEPTH: usize = 256;

#[cfg(feature = "serde")]
impl serde::Serialize for Node {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Bounded {
            node: self,
            levels: MAX_INTERCHANGE_DEPTH,
        }
        .serialize(serializer)
    }
}

/// Writes the `kind`-tagged shape, refusing to nest past `levels`.
#[cfg(feature = "serde")]
struct Bounded<'a> {
    node: &'a Node,
    levels: usize,
}

#[cfg(feature = "serde")]
impl serde::Serialize for Bounded<'_> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::{Error, SerializeStruct};

        let Some(levels) = self.levels.checked_sub(1) else {
            return Err(S::Error::custom(format_args!(
                "rule tree nested deeper than {MAX_INTERCHANGE_DEPTH} levels"
            )));
        };
        match self.node {
            Node::Operand(cond) => {
                let mut out = serializer.serialize_struct("Node", 4)?;
                out.serialize_field("kind", "operand")?;
                out.serialize_field("attribute", &cond.attribute)?;
                out.serialize_field("comparator", &cond.comparator)?;
                out.serialize_field("value", &cond.value)?;
                out.end()
            }
            Node::Operator { op, left, right } => {
                let mut out = serializer.serialize_struct("Node", 4)?;
                out.serialize_field("kind", "operator")?;
                out.serialize_field("operator", op)?;
                out.serialize_field("left", &Bounded { node: left.as_ref(), levels })?;
                out.serialize_field("right", &Bounded { node: right.as_ref(), levels })?;
                out.end()
            }
        }
    }
}

/// Intermediate builder for a condition on one attribute.
/// Created by [`attr()`]; a comparison method produces the [`Node`].
#[derive(Debug, Clone)]
pub struct AttrExpr {
    attribute: String,
}

impl AttrExpr {
    #[must_use]
    pub fn gt(self, value: impl Into<Value>) -> Node {
        Node::operand(self.attribute, Comparator::Gt, value.into())
    }

    #[must_use]
    pub fn lt(self, value: impl Into<Value>) -> Node {
        Node::operand(self.attribute, Comparator::Lt, value.into())
    }

    #[must_use]
    pub fn eq(self, value: impl Into<Value>) -> Node {
        Node::operand(self.attribute, Comparator::Eq, value.into())
    }
}

#[must_use]
pub fn attr(attribute: &str) -> AttrExpr {
    AttrExpr {
        attribute: attribute.to_owned(),
    }
}
