use crate::{BoolOp, Comparator, Condition, Node, Value};

use super::lexer::{Token, TokenKind};
use super::ParseError;

/// Limits applied while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    max_depth: usize,
}

impl ParseOptions {
    pub const DEFAULT_MAX_DEPTH: usize = 64;

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum parenthesis nesting accepted before the parse is rejected
    /// with [`ParseError::NestingTooDeep`].
    #[must_use]
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[must_use]
    pub fn depth_limit(&self) -> usize {
        self.max_depth
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_depth: Self::DEFAULT_MAX_DEPTH,
        }
    }
}

/// An open parenthesis: where its nodes and operators begin on the stacks.
#[derive(Debug)]
struct Frame {
    node_base: usize,
    op_base: usize,
    offset: usize,
}

/// Left-to-right reducer over the token stream.
///
/// Keywords have equal precedence and bind left to right. Each frame reduces
/// eagerly, so a frame never holds more than one pending operator.
struct Reducer<'t, 'i> {
    nodes: Vec<Node>,
    ops: Vec<(BoolOp, usize)>,
    frames: Vec<Frame>,
    condition: Vec<&'t Token<'i>>,
    expect_operand: bool,
    options: ParseOptions,
}

impl<'t, 'i> Reducer<'t, 'i> {
    fn new(options: ParseOptions) -> Self {
        Self {
            nodes: Vec::new(),
            ops: Vec::new(),
            frames: Vec::new(),
            condition: Vec::new(),
            expect_operand: true,
            options,
        }
    }

    fn bases(&self) -> (usize, usize) {
        self.frames
            .last()
            .map_or((0, 0), |f| (f.node_base, f.op_base))
    }

    fn feed(&mut self, token: &'t Token<'i>) -> Result<(), ParseError> {
        match &token.kind {
            TokenKind::Open => self.open(token),
            TokenKind::Close => self.close(token),
            TokenKind::Word(word) => {
                if let Some(op) = BoolOp::from_keyword(word) {
                    self.keyword(op, token)
                } else if self.at_keyword_position() && is_keyword_variant(word) {
                    Err(ParseError::UnsupportedOperator {
                        operator: (*word).to_owned(),
                        offset: token.offset,
                    })
                } else {
                    self.push_field(token)
                }
            }
            TokenKind::Quoted(_) | TokenKind::Symbol(_) => self.push_field(token),
        }
    }

    /// A keyword is expected right after a complete condition or a group.
    fn at_keyword_position(&self) -> bool {
        !self.expect_operand || self.condition.len() == 3
    }

    fn open(&mut self, token: &Token<'_>) -> Result<(), ParseError> {
        if !self.condition.is_empty() {
            return Err(ParseError::UnbalancedGrouping {
                offset: token.offset,
                reason: "'(' inside a condition",
            });
        }
        if !self.expect_operand {
            return Err(ParseError::UnbalancedGrouping {
                offset: token.offset,
                reason: "missing keyword before '('",
            });
        }
        if self.frames.len() >= self.options.max_depth {
            return Err(ParseError::NestingTooDeep {
                limit: self.options.max_depth,
            });
        }
        self.frames.push(Frame {
            node_base: self.nodes.len(),
            op_base: self.ops.len(),
            offset: token.offset,
        });
        Ok(())
    }

    fn close(&mut self, token: &Token<'_>) -> Result<(), ParseError> {
        self.flush()?;
        let Some(frame) = self.frames.pop() else {
            return Err(ParseError::UnbalancedGrouping {
                offset: token.offset,
                reason: "unmatched ')'",
            });
        };
        if self.expect_operand {
            if self.nodes.len() == frame.node_base && self.ops.len() == frame.op_base {
                return Err(ParseError::MalformedCondition {
                    condition: "()".to_owned(),
                    reason: "empty group".to_owned(),
                });
            }
            return Err(ParseError::UnbalancedGrouping {
                offset: token.offset,
                reason: "keyword with no right operand",
            });
        }
        if self.nodes.len() != frame.node_base + 1 || self.ops.len() != frame.op_base {
            return Err(ParseError::UnbalancedGrouping {
                offset: frame.offset,
                reason: "group does not reduce to a single condition",
            });
        }
        // The finished group is one operand of the enclosing frame.
        self.reduce(token.offset)
    }

    fn keyword(&mut self, op: BoolOp, token: &Token<'_>) -> Result<(), ParseError> {
        self.flush()?;
        if self.expect_operand {
            return Err(ParseError::UnbalancedGrouping {
                offset: token.offset,
                reason: "keyword with no left operand",
            });
        }
        self.ops.push((op, token.offset));
        self.expect_operand = true;
        Ok(())
    }

    fn push_field(&mut self, token: &'t Token<'i>) -> Result<(), ParseError> {
        if !self.expect_operand {
            return Err(ParseError::UnbalancedGrouping {
                offset: token.offset,
                reason: "missing keyword after ')'",
            });
        }
        self.condition.push(token);
        Ok(())
    }

    /// Turn the buffered condition tokens into an operand node.
    fn flush(&mut self) -> Result<(), ParseError> {
        if self.condition.is_empty() {
            return Ok(());
        }
        let offset = self.condition[0].offset;
        let condition = parse_condition(&self.condition)?;
        self.condition.clear();
        self.nodes.push(Node::Operand(condition));
        self.reduce(offset)
    }

    /// Fold the current frame's pending operator, if any, over the two
    /// topmost nodes.
    fn reduce(&mut self, offset: usize) -> Result<(), ParseError> {
        self.expect_operand = false;
        let (node_base, op_base) = self.bases();
        while self.ops.len() > op_base {
            let underflow = ParseError::UnbalancedGrouping {
                offset,
                reason: "keyword is missing an operand",
            };
            if self.nodes.len() < node_base + 2 {
                return Err(underflow);
            }
            let (Some((op, op_offset)), Some(right), Some(left)) =
                (self.ops.pop(), self.nodes.pop(), self.nodes.pop())
            else {
                return Err(underflow);
            };
            tracing::trace!(%op, op_offset, "reducing operator");
            self.nodes.push(Node::operator(op, left, right));
        }
        Ok(())
    }

    fn finish(mut self, end: usize) -> Result<Node, ParseError> {
        self.flush()?;
        if let Some(frame) = self.frames.last() {
            return Err(ParseError::UnbalancedGrouping {
                offset: frame.offset,
                reason: "unmatched '('",
            });
        }
        if self.expect_operand {
            return Err(ParseError::UnbalancedGrouping {
                offset: end,
                reason: "keyword with no right operand",
            });
        }
        match (self.nodes.pop(), self.nodes.is_empty(), self.ops.is_empty()) {
            (Some(root), true, true) => Ok(root),
            _ => Err(ParseError::UnbalancedGrouping {
                offset: end,
                reason: "rule does not reduce to a single tree",
            }),
        }
    }
}

/// `and`, `Or` and friends: never valid keywords, and never silently taken
/// as part of a condition.
fn is_keyword_variant(word: &str) -> bool {
    word.eq_ignore_ascii_case("and") || word.eq_ignore_ascii_case("or")
}

fn condition_text(tokens: &[&Token<'_>]) -> String {
    tokens
        .iter()
        .map(|t| t.raw)
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_condition(tokens: &[&Token<'_>]) -> Result<Condition, ParseError> {
    let malformed = |reason: String| ParseError::MalformedCondition {
        condition: condition_text(tokens),
        reason,
    };

    let [attribute, comparator, value] = tokens else {
        return Err(malformed(format!(
            "expected 3 fields (attribute comparator value), found {}",
            tokens.len()
        )));
    };

    // Comparator runs lex as symbols and numbers are literals, so neither
    // can name an attribute.
    let attribute = match attribute.kind {
        TokenKind::Word(name) if numeric_literal(name) == Ok(None) => name,
        _ => return Err(malformed("attribute must be a bare name".to_owned())),
    };

    let cmp = match comparator.kind {
        TokenKind::Symbol(symbol) => Comparator::from_symbol(symbol),
        _ => None,
    }
    .ok_or_else(|| ParseError::UnsupportedOperator {
        operator: comparator.raw.to_owned(),
        offset: comparator.offset,
    })?;

    let out_of_range = |reason: &str| malformed(reason.to_owned());
    let value = match &value.kind {
        TokenKind::Quoted(s) if cmp.is_numeric() => numeric_literal(s.trim())
            .map_err(out_of_range)?
            .unwrap_or_else(|| Value::String(s.clone())),
        TokenKind::Quoted(s) => Value::String(s.clone()),
        TokenKind::Word(w) => numeric_literal(w)
            .map_err(out_of_range)?
            .unwrap_or_else(|| Value::String((*w).to_owned())),
        TokenKind::Symbol(_) => {
            return Err(malformed("value must be a literal".to_owned()));
        }
        TokenKind::Open | TokenKind::Close => {
            return Err(malformed("missing value".to_owned()));
        }
    };

    if cmp.is_numeric() && !value.is_number() {
        return Err(malformed(format!("'{cmp}' needs a numeric value")));
    }

    Ok(Condition {
        attribute: attribute.to_owned(),
        comparator: cmp,
        value,
    })
}

/// Integers stay integers; anything else `f64` accepts counts as a float,
/// provided it actually contains a digit (so `inf` and `NaN` stay words).
/// A float that overflows to infinity is an error, not a word.
fn numeric_literal(text: &str) -> Result<Option<Value>, &'static str> {
    if let Ok(i) = text.parse::<i64>() {
        return Ok(Some(Value::Int(i)));
    }
    if !text.bytes().any(|b| b.is_ascii_digit()) {
        return Ok(None);
    }
    match text.parse::<f64>() {
        Ok(f) if f.is_finite() => Ok(Some(Value::Float(f))),
        Ok(_) => Err("numeric literal out of range"),
        Err(_) => Ok(None),
    }
}

pub(crate) fn build(
    tokens: &[Token<'_>],
    source_len: usize,
    options: ParseOptions,
) -> Result<Node, ParseError> {
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }
    let mut reducer = Reducer::new(options);
    for token in tokens {
        reducer.feed(token)?;
    }
    reducer.finish(source_len)
}
