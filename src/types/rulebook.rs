use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::error::RuleBookError;
use super::node::{BoolOp, Node};
use super::record::Record;
use crate::combine::combine;
use crate::parse::{parse_with, ParseOptions};

#[derive(Debug, Clone)]
struct Entry {
    source: String,
    tree: Node,
}

/// An in-memory catalog of parsed rules keyed by id.
///
/// Stores each rule's source text next to its tree, so callers can combine
/// rules by id and evaluate them without re-parsing.
///
/// # Example
///
/// ```
/// use ruletree::{BoolOp, Record, RuleBook};
///
/// let mut book = RuleBook::new();
/// book.insert("senior", "age > 30").unwrap();
/// book.insert("sales", "department = 'Sales'").unwrap();
///
/// let both = book.combine(["senior", "sales"], BoolOp::And).unwrap();
/// let record = Record::new().set("age", 35_i64).set("department", "Sales");
/// assert!(ruletree::evaluate(both.as_ref(), &record));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RuleBook {
    rules: BTreeMap<String, Entry>,
    options: ParseOptions,
}

impl RuleBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty book that parses rules with the given limits.
    #[must_use]
    pub fn with_options(options: ParseOptions) -> Self {
        Self {
            rules: BTreeMap::new(),
            options,
        }
    }

    /// Parse `rule_text` and store it under `id`.
    ///
    /// # Errors
    ///
    /// [`RuleBookError::DuplicateRule`] if `id` is taken,
    /// [`RuleBookError::Parse`] if the text does not parse. The book is
    /// unchanged on error.
    pub fn insert(&mut self, id: &str, rule_text: &str) -> Result<(), RuleBookError> {
        if self.rules.contains_key(id) {
            return Err(RuleBookError::DuplicateRule { id: id.to_owned() });
        }
        let tree = parse_with(rule_text, &self.options).map_err(|source| RuleBookError::Parse {
            id: id.to_owned(),
            source,
        })?;
        self.rules.insert(
            id.to_owned(),
            Entry {
                source: rule_text.to_owned(),
                tree,
            },
        );
        Ok(())
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Node> {
        self.rules.get(id).map(|e| &e.tree)
    }

    /// The text a rule was parsed from.
    #[must_use]
    pub fn source(&self, id: &str) -> Option<&str> {
        self.rules.get(id).map(|e| e.source.as_str())
    }

    /// Rule ids in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Combine the named rules, in the order given, with `op`.
    ///
    /// # Errors
    ///
    /// [`RuleBookError::UnknownRule`] for the first id not in the book.
    pub fn combine<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a str>,
        op: BoolOp,
    ) -> Result<Option<Node>, RuleBookError> {
        let trees = ids
            .into_iter()
            .map(|id| {
                self.get(id)
                    .cloned()
                    .ok_or_else(|| RuleBookError::UnknownRule { id: id.to_owned() })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(combine(trees, op))
    }

    /// Evaluate one rule against a record, treating undecidable conditions
    /// as `false`.
    ///
    /// # Errors
    ///
    /// [`RuleBookError::UnknownRule`] if `id` is not in the book.
    pub fn evaluate(&self, id: &str, record: &Record) -> Result<bool, RuleBookError> {
        let tree = self
            .get(id)
            .ok_or_else(|| RuleBookError::UnknownRule { id: id.to_owned() })?;
        Ok(crate::evaluate::evaluate(Some(tree), record))
    }

    /// Load rules from text holding one `id: rule` per line. Blank lines and
    /// lines starting with `#` are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`RuleBookError`] for a line without `:`, a duplicate id, or a
    /// rule that does not parse.
    pub fn from_rules_str(input: &str) -> Result<Self, RuleBookError> {
        let mut book = Self::new();
        for (idx, line) in input.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (id, rule_text) = line
                .split_once(':')
                .ok_or(RuleBookError::InvalidLine { line: idx + 1 })?;
            let id = id.trim();
            if id.is_empty() {
                return Err(RuleBookError::InvalidLine { line: idx + 1 });
            }
            book.insert(id, rule_text.trim())?;
        }
        tracing::debug!(rules = book.len(), "loaded rule book");
        Ok(book)
    }

    /// Read a rules file. See [`from_rules_str`](Self::from_rules_str).
    ///
    /// # Errors
    ///
    /// Returns [`RuleTreeError`](crate::RuleTreeError) on I/O or rule errors.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, crate::RuleTreeError> {
        let input = std::fs::read_to_string(path)?;
        Ok(Self::from_rules_str(&input)?)
    }
}

impl FromStr for RuleBook {
    type Err = RuleBookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_rules_str(s)
    }
}

impl fmt::Display for RuleBook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RuleBook({} rules)", self.rules.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::ParseError;

    fn sample() -> RuleBook {
        let mut book = RuleBook::new();
        book.insert("r1", "age > 30 AND department = 'Sales'").unwrap();
        book.insert("r2", "salary > 50000 OR experience > 5").unwrap();
        book
    }

    #[test]
    fn insert_and_lookup() {
        let book = sample();
        assert_eq!(book.len(), 2);
        assert_eq!(book.source("r1"), Some("age > 30 AND department = 'Sales'"));
        assert_eq!(book.get("r1").map(Node::leaf_count), Some(2));
        assert_eq!(book.ids().collect::<Vec<_>>(), ["r1", "r2"]);
        assert!(book.get("missing").is_none());
    }

    #[test]
    fn duplicate_id_rejected() {
        let mut book = sample();
        let err = book.insert("r1", "x = 1").unwrap_err();
        assert!(matches!(err, RuleBookError::DuplicateRule { id } if id == "r1"));
        assert_eq!(book.source("r1"), Some("age > 30 AND department = 'Sales'"));
    }

    #[test]
    fn parse_failure_leaves_book_unchanged() {
        let mut book = sample();
        let err = book.insert("bad", "age 30").unwrap_err();
        assert!(matches!(
            err,
            RuleBookError::Parse {
                source: ParseError::MalformedCondition { .. },
                ..
            }
        ));
        assert_eq!(book.len(), 2);
    }

    #[test]
    fn combine_by_id() {
        let book = sample();
        let combined = book.combine(["r1", "r2"], BoolOp::And).unwrap().unwrap();
        assert_eq!(combined.leaf_count(), 4);

        let single = book.combine(["r2"], BoolOp::And).unwrap();
        assert_eq!(single.as_ref(), book.get("r2"));

        assert_eq!(book.combine([], BoolOp::Or).unwrap(), None);
    }

    #[test]
    fn combine_unknown_id() {
        let book = sample();
        let err = book.combine(["r1", "r9"], BoolOp::Or).unwrap_err();
        assert!(matches!(err, RuleBookError::UnknownRule { id } if id == "r9"));
    }

    #[test]
    fn evaluate_by_id() {
        let book = sample();
        let record = Record::new()
            .set("age", 35_i64)
            .set("department", "Sales")
            .set("salary", 1000_i64)
            .set("experience", 1_i64);
        assert!(book.evaluate("r1", &record).unwrap());
        assert!(!book.evaluate("r2", &record).unwrap());
        assert!(book.evaluate("r3", &record).is_err());
    }

    #[test]
    fn load_from_text() {
        let text = "# eligibility\n\nr1: age > 30\nr2: department = 'Sales'\n";
        let book: RuleBook = text.parse().unwrap();
        assert_eq!(book.len(), 2);
        assert_eq!(book.source("r2"), Some("department = 'Sales'"));
    }

    #[test]
    fn load_rejects_line_without_id() {
        let err = RuleBook::from_rules_str("r1: age > 30\nage > 40\n").unwrap_err();
        assert!(matches!(err, RuleBookError::InvalidLine { line: 2 }));
        let err = RuleBook::from_rules_str(": age > 40").unwrap_err();
        assert!(matches!(err, RuleBookError::InvalidLine { line: 1 }));
    }

    #[test]
    fn options_apply_to_inserted_rules() {
        let mut book = RuleBook::with_options(ParseOptions::new().max_depth(1));
        assert!(book.insert("ok", "(a = 1)").is_ok());
        assert!(matches!(
            book.insert("deep", "((a = 1))"),
            Err(RuleBookError::Parse {
                source: ParseError::NestingTooDeep { limit: 1 },
                ..
            })
        ));
    }

    #[test]
    fn display() {
        assert_eq!(sample().to_string(), "RuleBook(2 rules)");
    }
}
