//! The constraint kind hierarchy.
//!
//! Constraints are a closed set of tagged variants ([`FieldConstraint`]),
//! bundled per field as [`FieldConstraints`], a struct of options, so a
//! field can carry at most one constraint of each kind by construction.
//! Iterating a bundle yields variants in the canonical kind order, which
//! is also the order verification reports use.

use std::fmt;

use regex::RegexSet;
use serde::{Deserialize, Serialize};

use crate::core::value::{Bound, FieldValue, LogicalType};
use crate::error::{Result, VeracityError};

/// Identifies a constraint kind, in canonical report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    Type,
    Min,
    Max,
    Sign,
    MinLength,
    MaxLength,
    MaxNulls,
    NoDuplicates,
    AllowedValues,
    Rex,
}

impl ConstraintKind {
    /// The JSON key for this kind, also used in detector column names.
    pub fn name(&self) -> &'static str {
        match self {
            ConstraintKind::Type => "type",
            ConstraintKind::Min => "min",
            ConstraintKind::Max => "max",
            ConstraintKind::Sign => "sign",
            ConstraintKind::MinLength => "min_length",
            ConstraintKind::MaxLength => "max_length",
            ConstraintKind::MaxNulls => "max_nulls",
            ConstraintKind::NoDuplicates => "no_duplicates",
            ConstraintKind::AllowedValues => "allowed_values",
            ConstraintKind::Rex => "rex",
        }
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The sign category of a numeric column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignCategory {
    /// All non-null values > 0.
    Positive,
    /// All non-null values >= 0, with 0 observed.
    NonNegative,
    /// All non-null values are exactly 0.
    Zero,
    /// All non-null values <= 0, with 0 observed.
    NonPositive,
    /// All non-null values < 0.
    Negative,
    /// The column has no non-null values.
    Null,
}

impl SignCategory {
    pub fn name(&self) -> &'static str {
        match self {
            SignCategory::Positive => "positive",
            SignCategory::NonNegative => "non-negative",
            SignCategory::Zero => "zero",
            SignCategory::NonPositive => "non-positive",
            SignCategory::Negative => "negative",
            SignCategory::Null => "null",
        }
    }

    /// Whether a single numeric value has this sign. Used by the
    /// detector's row-level predicate.
    pub fn admits(&self, x: f64) -> bool {
        match self {
            SignCategory::Positive => x > 0.0,
            SignCategory::NonNegative => x >= 0.0,
            SignCategory::Zero => x == 0.0,
            SignCategory::NonPositive => x <= 0.0,
            SignCategory::Negative => x < 0.0,
            // A "null" sign admits no non-null value.
            SignCategory::Null => false,
        }
    }
}

impl fmt::Display for SignCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single field constraint, tagged by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldConstraint {
    Type(LogicalType),
    Min(Bound),
    Max(Bound),
    Sign(SignCategory),
    MinLength(u32),
    MaxLength(u32),
    MaxNulls(u64),
    NoDuplicates,
    AllowedValues(Vec<FieldValue>),
    Rex(Vec<String>),
}

impl FieldConstraint {
    pub fn kind(&self) -> ConstraintKind {
        match self {
            FieldConstraint::Type(_) => ConstraintKind::Type,
            FieldConstraint::Min(_) => ConstraintKind::Min,
            FieldConstraint::Max(_) => ConstraintKind::Max,
            FieldConstraint::Sign(_) => ConstraintKind::Sign,
            FieldConstraint::MinLength(_) => ConstraintKind::MinLength,
            FieldConstraint::MaxLength(_) => ConstraintKind::MaxLength,
            FieldConstraint::MaxNulls(_) => ConstraintKind::MaxNulls,
            FieldConstraint::NoDuplicates => ConstraintKind::NoDuplicates,
            FieldConstraint::AllowedValues(_) => ConstraintKind::AllowedValues,
            FieldConstraint::Rex(_) => ConstraintKind::Rex,
        }
    }
}

/// The constraint bundle of a single field.
///
/// Serialises to the per-field JSON object of a constraint document.
/// Unknown keys encountered on load are retained in `extra` and written
/// back verbatim on save.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldConstraints {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub field_type: Option<LogicalType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<Bound>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<Bound>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sign: Option<SignCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_nulls: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_duplicates: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<FieldValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rex: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl FieldConstraints {
    /// Returns true when the bundle carries no constraints at all.
    pub fn is_empty(&self) -> bool {
        self.iter().is_empty()
    }

    /// The bundle's constraints in canonical kind order.
    ///
    /// `no_duplicates: false` is retained for round-tripping but yields
    /// no constraint.
    pub fn iter(&self) -> Vec<FieldConstraint> {
        let mut out = Vec::new();
        if let Some(t) = self.field_type {
            out.push(FieldConstraint::Type(t));
        }
        if let Some(b) = &self.min {
            out.push(FieldConstraint::Min(b.clone()));
        }
        if let Some(b) = &self.max {
            out.push(FieldConstraint::Max(b.clone()));
        }
        if let Some(s) = self.sign {
            out.push(FieldConstraint::Sign(s));
        }
        if let Some(n) = self.min_length {
            out.push(FieldConstraint::MinLength(n));
        }
        if let Some(n) = self.max_length {
            out.push(FieldConstraint::MaxLength(n));
        }
        if let Some(n) = self.max_nulls {
            out.push(FieldConstraint::MaxNulls(n));
        }
        if self.no_duplicates == Some(true) {
            out.push(FieldConstraint::NoDuplicates);
        }
        if let Some(values) = &self.allowed_values {
            out.push(FieldConstraint::AllowedValues(values.clone()));
        }
        if let Some(patterns) = &self.rex {
            out.push(FieldConstraint::Rex(patterns.clone()));
        }
        out
    }
}

/// Comparison operator of a multi-field constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PairOp {
    Lt,
    Lte,
    Eq,
    Gte,
    Gt,
}

impl PairOp {
    pub fn name(&self) -> &'static str {
        match self {
            PairOp::Lt => "lt",
            PairOp::Lte => "lte",
            PairOp::Eq => "eq",
            PairOp::Gte => "gte",
            PairOp::Gt => "gt",
        }
    }

    /// Whether an ordering between left and right satisfies the operator.
    pub fn holds(&self, ord: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            PairOp::Lt => ord == Less,
            PairOp::Lte => ord != Greater,
            PairOp::Eq => ord == Equal,
            PairOp::Gte => ord != Less,
            PairOp::Gt => ord == Greater,
        }
    }
}

impl fmt::Display for PairOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A constraint between two fields, evaluated row-wise: for every row
/// where both sides are non-null, `left op right` must hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairConstraint {
    pub left: String,
    pub op: PairOp,
    pub right: String,
}

impl PairConstraint {
    pub fn new(left: impl Into<String>, op: PairOp, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            op,
            right: right.into(),
        }
    }

    /// The detector column name for this constraint, e.g. `start_lt_end_ok`.
    pub fn column_name(&self) -> String {
        format!("{}_{}_{}_ok", self.left, self.op.name(), self.right)
    }
}

/// Anchors a pattern for full-string matching, leaving already-anchored
/// patterns untouched so engines never double-anchor.
pub fn anchored(pattern: &str) -> String {
    if pattern.starts_with('^') && pattern.ends_with('$') {
        pattern.to_string()
    } else {
        format!("^(?:{pattern})$")
    }
}

/// Compiles an ordered pattern list into an anchored [`RegexSet`].
pub fn compile_anchored_set(patterns: &[String]) -> Result<RegexSet> {
    let anchored_patterns: Vec<String> = patterns.iter().map(|p| anchored(p)).collect();
    RegexSet::new(&anchored_patterns)
        .map_err(|e| VeracityError::invalid_document(format!("bad rex pattern: {e}")))
}
