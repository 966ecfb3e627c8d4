use std::fmt;

/// Scalar values carried by rule literals and data records.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Value {
    /// A 64-bit signed integer.
    Int(i64),
    /// A 64-bit floating-point number.
    Float(f64),
    /// A UTF-8 string.
    String(String),
}

impl Value {
    /// Numeric view of this value. `None` for strings.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::String(_) => None,
        }
    }

    #[must_use]
    pub fn is_number(&self) -> bool {
        self.as_number().is_some()
    }

    /// Exact equality without coercion: numbers compare numerically (so `30`
    /// equals `30.0`), strings compare by content, and a number never equals
    /// a string.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::String(_), _) | (_, Value::String(_)) => false,
            (a, b) => a.as_number() == b.as_number(),
        }
    }

    /// The number a `>`/`<` literal stands for. Numeric strings count, as
    /// hand-built trees may carry them; non-finite numbers do not.
    pub(crate) fn ordering_bound(&self) -> Option<f64> {
        let n = match self {
            Value::String(s) => s.trim().parse::<f64>().ok()?,
            other => other.as_number()?,
        };
        n.is_finite().then_some(n)
    }

    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

/// Renders the value as rule-text literal: strings single-quoted, floats
/// always with a decimal point so they parse back as floats.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v:?}"),
            Value::String(v) => {
                f.write_str("'")?;
                for c in v.chars() {
                    if c == '\'' || c == '\\' {
                        f.write_str("\\")?;
                    }
                    write!(f, "{c}")?;
                }
                f.write_str("'")
            }
        }
    }
}
