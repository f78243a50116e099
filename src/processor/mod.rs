use std::cmp::Ordering;
use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

pub mod column;
pub mod columnar_processor;
pub mod pivot;
pub mod query_builder;

/// Error type used across the crate
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Schema/parse error: {0}")]
    Parse(String),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Duplicate column in header: {0}")]
    DuplicateColumn(String),

    #[error("Column '{column}' is not numeric and cannot be aggregated with {op}")]
    NonNumericColumn { column: String, op: AggregateOp },

    #[error("CSV file is empty: {0}")]
    EmptyFile(String),

    #[error("Aggregate overflow in column '{0}'")]
    Overflow(String),

    #[error("Chart error: {0}")]
    Chart(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Default, Clone)]
pub struct ParseSummary {
    pub rows_processed: usize,
    pub errors: Vec<ParseError>,
}

/// A data line that could not be loaded. `row` is the 1-based line number in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub row: usize,
    pub message: String,
}

/// A single cell of the dataset, also used as a grouping key.
///
/// Ordering puts `Null` first, numbers next (compared numerically across
/// `Int` and `Float`), strings last.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    /// Integer column
    Int(i64),
    /// Float column
    Float(f64),
    /// String column
    Str(String),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Int(_) | Value::Float(_) => 1,
            Value::Str(_) => 2,
        }
    }
}

/// Bit pattern identifying a float key; `-0.0` and `0.0` are the same key.
pub(crate) fn float_key_bits(v: f64) -> u64 {
    if v == 0.0 { 0.0f64.to_bits() } else { v.to_bits() }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => float_key_bits(*a) == float_key_bits(*b),
            (Value::Str(a), Value::Str(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Int(v) => v.hash(state),
            Value::Float(v) => float_key_bits(*v).hash(state),
            Value::Str(v) => v.hash(state),
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) if a == b => Ordering::Equal,
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64)
                .total_cmp(b)
                .then(Ordering::Less),
            (Value::Float(a), Value::Int(b)) => a
                .total_cmp(&(*b as f64))
                .then(Ordering::Greater),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) if v.fract() == 0.0 && v.abs() < 1e15 => write!(f, "{v:.1}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(v) => f.write_str(v),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Int(v) => serializer.serialize_i64(*v),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::Str(v) => serializer.serialize_str(v),
        }
    }
}

/// Aggregate operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateOp {
    /// Count of non-null values
    #[default]
    Count,
    /// Sum of all numeric values
    Sum,
    /// Arithmetic mean of numeric values
    Mean,
    /// Minimum value
    Min,
    /// Maximum value
    Max,
}

impl AggregateOp {
    pub const ALL: [AggregateOp; 5] = [
        AggregateOp::Count,
        AggregateOp::Sum,
        AggregateOp::Mean,
        AggregateOp::Min,
        AggregateOp::Max,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AggregateOp::Count => "count",
            AggregateOp::Sum => "sum",
            AggregateOp::Mean => "mean",
            AggregateOp::Min => "min",
            AggregateOp::Max => "max",
        }
    }

    /// Whether the operation needs a numeric column.
    pub fn requires_numeric(self) -> bool {
        !matches!(self, AggregateOp::Count)
    }
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AggregateOp {
    type Err = ProcessorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "count" => Ok(AggregateOp::Count),
            "sum" => Ok(AggregateOp::Sum),
            "mean" | "avg" | "average" => Ok(AggregateOp::Mean),
            "min" => Ok(AggregateOp::Min),
            "max" => Ok(AggregateOp::Max),
            other => Err(ProcessorError::Parse(format!(
                "unknown aggregation function '{other}'"
            ))),
        }
    }
}

/// Result of an aggregation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AggregateResult {
    Int(i64),
    Float(f64),
}

impl AggregateResult {
    pub fn as_f64(self) -> f64 {
        match self {
            AggregateResult::Int(v) => v as f64,
            AggregateResult::Float(v) => v,
        }
    }
}

impl fmt::Display for AggregateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateResult::Int(v) => write!(f, "{v}"),
            AggregateResult::Float(v) if v.fract() == 0.0 && v.abs() < 1e15 => {
                write!(f, "{v:.1}")
            }
            AggregateResult::Float(v) if v.is_finite() => {
                let text = format!("{v:.6}");
                f.write_str(text.trim_end_matches('0').trim_end_matches('.'))
            }
            AggregateResult::Float(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aggregate_op() {
        assert_eq!("SUM".parse::<AggregateOp>().unwrap(), AggregateOp::Sum);
        assert_eq!("avg".parse::<AggregateOp>().unwrap(), AggregateOp::Mean);
        assert!("median".parse::<AggregateOp>().is_err());
    }

    #[test]
    fn test_value_ordering() {
        let mut keys = vec![
            Value::Str("b".into()),
            Value::Int(10),
            Value::Null,
            Value::Float(2.5),
            Value::Str("a".into()),
            Value::Int(2),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                Value::Null,
                Value::Int(2),
                Value::Float(2.5),
                Value::Int(10),
                Value::Str("a".into()),
                Value::Str("b".into()),
            ]
        );
    }

    #[test]
    fn test_float_keys() {
        assert_eq!(Value::Float(5.0).to_string(), "5.0");
        assert_eq!(Value::Float(10.5).to_string(), "10.5");
        assert_eq!(Value::Int(5).to_string(), "5");
        assert_eq!(Value::Null.to_string(), "");

        assert_eq!(Value::Float(-0.0), Value::Float(0.0));
        assert_eq!(Value::Float(-0.0).cmp(&Value::Float(0.0)), Ordering::Equal);
        let keys: std::collections::HashSet<Value> =
            [Value::Float(-0.0), Value::Float(0.0)].into_iter().collect();
        assert_eq!(keys.len(), 1);
    }

    #[test]
    fn test_aggregate_result_display() {
        assert_eq!(AggregateResult::Int(42).to_string(), "42");
        assert_eq!(AggregateResult::Float(20.0).to_string(), "20.0");
        assert_eq!(AggregateResult::Float(2.0 / 3.0).to_string(), "0.666667");
        assert_eq!(AggregateResult::Float(1.25).to_string(), "1.25");
    }

    #[test]
    fn test_value_serializes_as_plain_json() {
        let json = serde_json::to_string(&vec![
            Value::Int(1),
            Value::Float(1.5),
            Value::Str("x".into()),
            Value::Null,
        ])
        .unwrap();
        assert_eq!(json, r#"[1,1.5,"x",null]"#);
    }
}
