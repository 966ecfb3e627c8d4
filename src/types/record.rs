use std::collections::HashMap;

use super::Value;

/// A data record: the attribute values a rule tree is evaluated against.
///
/// Records are flat. Attribute names are looked up verbatim, so `user.age`
/// is just a key containing a dot.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Record {
    data: HashMap<String, Value>,
}

impl Record {
    /// Create an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute, consuming and returning the record for chaining.
    #[must_use]
    pub fn set(mut self, attribute: &str, value: impl Into<Value>) -> Self {
        self.insert(attribute, value.into());
        self
    }

    /// Insert or replace an attribute value.
    pub fn insert(&mut self, attribute: &str, value: Value) {
        self.data.insert(attribute.to_owned(), value);
    }

    #[must_use]
    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.data.get(attribute)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.data.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            data: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
