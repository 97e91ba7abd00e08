//! In-memory verification report structures.
//!
//! A report lists every (field, constraint) pair present in the
//! document, in document field order and canonical kind order, with a
//! pass/fail/not-applicable outcome. Failures carry a machine-readable
//! reason code, a human-readable message and the first counterexample
//! (or offending aggregate) encountered.

use serde::{Deserialize, Serialize};

use crate::core::{ConstraintKind, FieldValue, PairConstraint};

/// The outcome of one constraint check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Pass,
    Fail,
    /// The check could not be evaluated (typically: no non-null data).
    NotApplicable,
}

impl Outcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, Outcome::Pass)
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, Outcome::Fail)
    }
}

/// Machine-readable failure reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// The document references a field the dataset does not have.
    FieldMissing,
    /// Observed logical type differs from the declared one.
    TypeMismatch,
    /// A min/max bound was breached.
    BoundViolated,
    /// The observed sign category contradicts the declared one.
    SignViolated,
    /// A string length bound was breached.
    LengthViolated,
    /// More nulls than the budget allows.
    ExcessNulls,
    /// Duplicate non-null values in a no-duplicates field.
    DuplicatesFound,
    /// A value outside the allowed set.
    ValueNotAllowed,
    /// A string matching none of the rex patterns.
    PatternUnmatched,
    /// The constraint kind cannot apply to the field's actual type.
    Inapplicable,
}

/// One evaluated constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintCheck {
    pub kind: ConstraintKind,
    pub status: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<ReasonCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// The first counterexample value, or the offending aggregate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<FieldValue>,
}

impl ConstraintCheck {
    pub fn pass(kind: ConstraintKind) -> Self {
        Self {
            kind,
            status: Outcome::Pass,
            reason: None,
            message: None,
            value: None,
        }
    }

    pub fn fail(
        kind: ConstraintKind,
        reason: ReasonCode,
        message: impl Into<String>,
        value: Option<FieldValue>,
    ) -> Self {
        Self {
            kind,
            status: Outcome::Fail,
            reason: Some(reason),
            message: Some(message.into()),
            value,
        }
    }

    pub fn not_applicable(kind: ConstraintKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: Outcome::NotApplicable,
            reason: None,
            message: Some(message.into()),
            value: None,
        }
    }
}

/// All checks for one field, in canonical kind order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldVerification {
    pub field: String,
    pub checks: Vec<ConstraintCheck>,
}

impl FieldVerification {
    /// The check for a given kind, if it was evaluated.
    pub fn check(&self, kind: ConstraintKind) -> Option<&ConstraintCheck> {
        self.checks.iter().find(|c| c.kind == kind)
    }
}

/// One evaluated multi-field constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairCheck {
    pub constraint: PairConstraint,
    pub status: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<ReasonCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// The first offending (left, right) value pair.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<(FieldValue, FieldValue)>,
}

/// A complete verification report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    /// Field reports in document order.
    pub fields: Vec<FieldVerification>,
    /// Multi-field checks in document order.
    pub pairs: Vec<PairCheck>,
    pub passes: u64,
    pub failures: u64,
    /// Dataset fields the document says nothing about.
    pub undocumented_fields: Vec<String>,
}

impl VerificationReport {
    /// True when no check failed.
    pub fn is_success(&self) -> bool {
        self.failures == 0
    }

    /// Looks up one field's report.
    pub fn field(&self, name: &str) -> Option<&FieldVerification> {
        self.fields.iter().find(|f| f.field == name)
    }

    /// Every failing check, with its field name.
    pub fn failed_checks(&self) -> Vec<(&str, &ConstraintCheck)> {
        self.fields
            .iter()
            .flat_map(|f| {
                f.checks
                    .iter()
                    .filter(|c| c.status.is_fail())
                    .map(move |c| (f.field.as_str(), c))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_serialises_without_noise() {
        let report = VerificationReport {
            fields: vec![FieldVerification {
                field: "age".to_string(),
                checks: vec![ConstraintCheck::pass(ConstraintKind::Type)],
            }],
            pairs: vec![],
            passes: 1,
            failures: 0,
            undocumented_fields: vec![],
        };
        let json = serde_json::to_string(&report).unwrap();
        // Passing checks carry no reason/message/value keys.
        assert!(!json.contains("reason"));
        assert!(!json.contains("message"));
        assert!(report.is_success());
    }

    #[test]
    fn test_failed_checks_collects_across_fields() {
        let fail = ConstraintCheck::fail(
            ConstraintKind::Max,
            ReasonCode::BoundViolated,
            "maximum value 50 exceeds max 40",
            Some(FieldValue::Int(50)),
        );
        let report = VerificationReport {
            fields: vec![
                FieldVerification {
                    field: "age".to_string(),
                    checks: vec![ConstraintCheck::pass(ConstraintKind::Min), fail.clone()],
                },
                FieldVerification {
                    field: "code".to_string(),
                    checks: vec![ConstraintCheck::pass(ConstraintKind::Rex)],
                },
            ],
            pairs: vec![],
            passes: 2,
            failures: 1,
            undocumented_fields: vec![],
        };
        let failed = report.failed_checks();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, "age");
        assert_eq!(failed[0].1.reason, Some(ReasonCode::BoundViolated));
    }
}
