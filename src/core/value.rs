//! Scalar values and logical field types.
//!
//! Every cell a dataset provider hands to the engine is a [`FieldValue`];
//! every column has at most one [`LogicalType`]. Numeric conflation
//! between `int` and `real` is a verification-time policy
//! ([`TypeChecking`]), not a property of the values themselves.

use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveDate;
use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// The logical type of a dataset field.
///
/// Arrow schema types map onto these five categories; columns of any
/// other Arrow type have no logical type and are skipped by discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalType {
    Bool,
    Int,
    Real,
    String,
    Date,
}

impl LogicalType {
    /// Returns the lowercase name used in constraint documents.
    pub fn name(&self) -> &'static str {
        match self {
            LogicalType::Bool => "bool",
            LogicalType::Int => "int",
            LogicalType::Real => "real",
            LogicalType::String => "string",
            LogicalType::Date => "date",
        }
    }

    /// Returns true for `int` and `real`.
    pub fn is_numeric(&self) -> bool {
        matches!(self, LogicalType::Int | LogicalType::Real)
    }

    /// Type equality under the given typing policy: sloppy typing treats
    /// `int` and `real` as interchangeable, strict typing does not.
    pub fn matches(&self, other: LogicalType, typing: TypeChecking) -> bool {
        match typing {
            TypeChecking::Strict => *self == other,
            TypeChecking::Sloppy => {
                *self == other || (self.is_numeric() && other.is_numeric())
            }
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether `int` and `real` are interchangeable during type verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeChecking {
    /// `int` and `real` are treated as the same type (the default).
    #[default]
    Sloppy,
    /// Exact logical-type match required.
    Strict,
}

/// A single scalar value observed in (or constrained over) a dataset.
///
/// Serialises to the plain JSON scalar forms used by constraint
/// documents: booleans, numbers, strings, `null`, and dates as ISO
/// `YYYY-MM-DD` strings. ISO-date-shaped strings are recognised on load.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Real(f64),
    Str(String),
    Date(NaiveDate),
    Null,
}

impl FieldValue {
    /// Returns true for [`FieldValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Returns the logical type of this value, if it has one.
    pub fn logical_type(&self) -> Option<LogicalType> {
        match self {
            FieldValue::Bool(_) => Some(LogicalType::Bool),
            FieldValue::Int(_) => Some(LogicalType::Int),
            FieldValue::Real(_) => Some(LogicalType::Real),
            FieldValue::Str(_) => Some(LogicalType::String),
            FieldValue::Date(_) => Some(LogicalType::Date),
            FieldValue::Null => None,
        }
    }

    /// Returns the numeric value as `f64` for `Int` and `Real`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(i) => Some(*i as f64),
            FieldValue::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Returns the string slice for `Str`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the date for `Date`, parsing ISO-formatted `Str` values.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(d) => Some(*d),
            FieldValue::Str(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").ok(),
            _ => None,
        }
    }

    /// Value equality with `int`/`real` conflation and date/string
    /// coercion. This is the equality used for `allowed_values`
    /// membership; nulls are never equal to anything, including nulls.
    pub fn loosely_equals(&self, other: &FieldValue) -> bool {
        match (self, other) {
            (FieldValue::Null, _) | (_, FieldValue::Null) => false,
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a == b,
            (FieldValue::Str(a), FieldValue::Str(b)) => a == b,
            (FieldValue::Date(_), _) | (_, FieldValue::Date(_)) => {
                match (self.as_date(), other.as_date()) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                }
            }
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    /// Ordering with the same coercions as [`Self::loosely_equals`].
    /// Returns `None` when the two values are not comparable (different
    /// non-coercible types, or either side null).
    pub fn partial_cmp_loose(&self, other: &FieldValue) -> Option<Ordering> {
        match (self, other) {
            (FieldValue::Null, _) | (_, FieldValue::Null) => None,
            (FieldValue::Str(a), FieldValue::Str(b)) => Some(a.cmp(b)),
            (FieldValue::Bool(a), FieldValue::Bool(b)) => Some(a.cmp(b)),
            (FieldValue::Date(_), _) | (_, FieldValue::Date(_)) => {
                match (self.as_date(), other.as_date()) {
                    (Some(a), Some(b)) => Some(a.cmp(&b)),
                    _ => None,
                }
            }
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => None,
            },
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Int(i) => write!(f, "{i}"),
            FieldValue::Real(r) => write!(f, "{r}"),
            FieldValue::Str(s) => write!(f, "{s}"),
            FieldValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            FieldValue::Null => write!(f, "null"),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Bool(b) => serializer.serialize_bool(*b),
            FieldValue::Int(i) => serializer.serialize_i64(*i),
            FieldValue::Real(r) => serializer.serialize_f64(*r),
            FieldValue::Str(s) => serializer.serialize_str(s),
            FieldValue::Date(d) => serializer.serialize_str(&d.format("%Y-%m-%d").to_string()),
            FieldValue::Null => serializer.serialize_unit(),
        }
    }
}

/// True for strings shaped like an ISO calendar date (`YYYY-MM-DD`).
fn looks_like_iso_date(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit())
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ScalarVisitor;

        impl<'de> de::Visitor<'de> for ScalarVisitor {
            type Value = FieldValue;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a JSON scalar (bool, number, string or null)")
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<FieldValue, E> {
                Ok(FieldValue::Bool(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<FieldValue, E> {
                Ok(FieldValue::Int(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<FieldValue, E> {
                i64::try_from(v)
                    .map(FieldValue::Int)
                    .map_err(|_| E::custom(format!("integer {v} out of range")))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<FieldValue, E> {
                Ok(FieldValue::Real(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<FieldValue, E> {
                if looks_like_iso_date(v) {
                    if let Ok(d) = NaiveDate::parse_from_str(v, "%Y-%m-%d") {
                        return Ok(FieldValue::Date(d));
                    }
                }
                Ok(FieldValue::Str(v.to_string()))
            }

            fn visit_unit<E: de::Error>(self) -> Result<FieldValue, E> {
                Ok(FieldValue::Null)
            }

            fn visit_none<E: de::Error>(self) -> Result<FieldValue, E> {
                Ok(FieldValue::Null)
            }
        }

        deserializer.deserialize_any(ScalarVisitor)
    }
}

/// Boundary semantics for a `min`/`max` constraint value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    /// Inclusive comparison (the default).
    #[default]
    Closed,
    /// Strict comparison; the bound itself is out of range.
    Open,
    /// Inclusive comparison with an epsilon floor of [`FUZZY_EPSILON`].
    Fuzzy,
}

/// The epsilon floor applied by [`Precision::Fuzzy`] bounds when the
/// verification policy's epsilon is smaller.
pub const FUZZY_EPSILON: f64 = 0.01;

/// A `min` or `max` constraint value with its boundary semantics.
///
/// Serialises as a bare scalar when the precision is the default
/// `closed`, and as `{"value": ..., "precision": ...}` otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct Bound {
    pub value: FieldValue,
    pub precision: Precision,
}

impl Bound {
    /// A closed (inclusive) bound, the form discovery emits.
    pub fn closed(value: FieldValue) -> Self {
        Self {
            value,
            precision: Precision::Closed,
        }
    }

    /// The effective epsilon for this bound under a policy epsilon.
    fn effective_epsilon(&self, epsilon: f64) -> f64 {
        match self.precision {
            Precision::Fuzzy => epsilon.max(FUZZY_EPSILON),
            _ => epsilon,
        }
    }

    /// Whether `v` satisfies this bound read as a minimum.
    ///
    /// Numeric bounds widen by `epsilon * max(1, |bound|)`; dates and
    /// strings compare exactly. Returns `None` when `v` and the bound
    /// are not comparable.
    pub fn admits_min(&self, v: &FieldValue, epsilon: f64) -> Option<bool> {
        self.admits(v, epsilon, true)
    }

    /// Whether `v` satisfies this bound read as a maximum.
    pub fn admits_max(&self, v: &FieldValue, epsilon: f64) -> Option<bool> {
        self.admits(v, epsilon, false)
    }

    fn admits(&self, v: &FieldValue, epsilon: f64, lower: bool) -> Option<bool> {
        if let (Some(x), Some(m)) = (v.as_f64(), self.value.as_f64()) {
            let eps = self.effective_epsilon(epsilon);
            let slack = eps * 1.0_f64.max(m.abs());
            let widened = if lower { m - slack } else { m + slack };
            return Some(match (lower, self.precision) {
                (true, Precision::Open) => x > widened,
                (true, _) => x >= widened,
                (false, Precision::Open) => x < widened,
                (false, _) => x <= widened,
            });
        }
        let ord = v.partial_cmp_loose(&self.value)?;
        Some(match (lower, self.precision) {
            (true, Precision::Open) => ord == Ordering::Greater,
            (true, _) => ord != Ordering::Less,
            (false, Precision::Open) => ord == Ordering::Less,
            (false, _) => ord != Ordering::Greater,
        })
    }
}

impl Serialize for Bound {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.precision == Precision::Closed {
            self.value.serialize(serializer)
        } else {
            let mut map = serializer.serialize_map(Some(2))?;
            map.serialize_entry("value", &self.value)?;
            map.serialize_entry("precision", &self.precision)?;
            map.end()
        }
    }
}

impl<'de> Deserialize<'de> for Bound {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        match raw {
            serde_json::Value::Object(map) => {
                let value = map
                    .get("value")
                    .cloned()
                    .ok_or_else(|| de::Error::custom("bound object missing 'value'"))?;
                let value: FieldValue =
                    serde_json::from_value(value).map_err(de::Error::custom)?;
                let precision = match map.get("precision") {
                    Some(p) => serde_json::from_value(p.clone()).map_err(de::Error::custom)?,
                    None => Precision::Closed,
                };
                Ok(Bound { value, precision })
            }
            scalar => {
                let value: FieldValue =
                    serde_json::from_value(scalar).map_err(de::Error::custom)?;
                Ok(Bound {
                    value,
                    precision: Precision::Closed,
                })
            }
        }
    }
}
