use crate::parse::{parse, ParseError};
use crate::{BoolOp, Node};

/// Merge trees into one with `op`, folding from the left.
///
/// An empty input yields `None` ("no rule"), a single tree comes back
/// unchanged, and `[a, b, c]` becomes `((a op b) op c)`. Subtrees are moved
/// under the new operator nodes, never copied.
#[must_use]
pub fn combine(trees: impl IntoIterator<Item = Node>, op: BoolOp) -> Option<Node> {
    let mut iter = trees.into_iter();
    let first = iter.next()?;
    let mut merged = 1_usize;
    let combined = iter.fold(first, |acc, tree| {
        merged += 1;
        Node::operator(op, acc, tree)
    });
    tracing::debug!(trees = merged, %op, "combined rules");
    Some(combined)
}

/// [`combine`] with the default operator, `AND`.
#[must_use]
pub fn combine_all(trees: impl IntoIterator<Item = Node>) -> Option<Node> {
    combine(trees, BoolOp::default())
}

/// Parse every rule text, then [`combine`] the trees.
///
/// # Errors
///
/// Returns the first [`ParseError`]; nothing is combined in that case.
pub fn combine_rules<'a>(
    rule_texts: impl IntoIterator<Item = &'a str>,
    op: BoolOp,
) -> Result<Option<Node>, ParseError> {
    let trees = rule_texts
        .into_iter()
        .map(parse)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(combine(trees, op))
}
