//! Constraint verification: evaluating a document against a dataset.
//!
//! The [`Verifier`] evaluates every (field, constraint) pair in a
//! document independently and produces a [`VerificationReport`]; one
//! failing constraint never suppresses the others on the same field.
//! Aggregate constraints (type, bounds, sign, lengths, null budget,
//! duplicates) are answered from the column profile alone; only
//! `allowed_values` and `rex` scan column values, stopping at the first
//! counterexample.

pub mod report;

pub use report::{
    ConstraintCheck, FieldVerification, Outcome, PairCheck, ReasonCode, VerificationReport,
};

use futures::future::try_join_all;
use tracing::{debug, info, instrument};

use crate::core::{
    compile_anchored_set, Bound, CancelToken, ConstraintDocument, ConstraintKind, FieldConstraint,
    FieldConstraints, FieldValue, LogicalType, PairConstraint, SignCategory, TypeChecking,
};
use crate::error::{Result, VeracityError};
use crate::source::{ColumnProfile, DatasetSource, DEFAULT_DISTINCT_CAP};

/// Whether a report keeps every check or only the failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportMode {
    #[default]
    All,
    FailuresOnly,
}

/// Policy values for a verification run. No ambient state: epsilon,
/// typing mode and report shape are always passed explicitly.
#[derive(Debug, Clone)]
pub struct VerifyPolicy {
    /// Fuzz for numeric bound checks: a value `x` satisfies `min m` when
    /// `x >= m - epsilon * max(1, |m|)`, symmetrically for `max`.
    pub epsilon: f64,
    /// Whether `int` and `real` are interchangeable for `type` checks.
    pub type_checking: TypeChecking,
    pub report_mode: ReportMode,
    /// Distinct cap forwarded to the statistics provider.
    pub distinct_cap: usize,
    /// Cooperative cancellation, checked per field.
    pub cancel: CancelToken,
}

impl Default for VerifyPolicy {
    fn default() -> Self {
        Self {
            epsilon: 0.0,
            type_checking: TypeChecking::default(),
            report_mode: ReportMode::default(),
            distinct_cap: DEFAULT_DISTINCT_CAP,
            cancel: CancelToken::default(),
        }
    }
}

impl VerifyPolicy {
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_type_checking(mut self, type_checking: TypeChecking) -> Self {
        self.type_checking = type_checking;
        self
    }

    pub fn with_report_mode(mut self, report_mode: ReportMode) -> Self {
        self.report_mode = report_mode;
        self
    }
}

/// Evaluates constraint documents against datasets.
#[derive(Debug, Clone, Default)]
pub struct Verifier {
    policy: VerifyPolicy,
}

impl Verifier {
    pub fn new(policy: VerifyPolicy) -> Self {
        Self { policy }
    }

    /// Verifies the dataset against the document.
    ///
    /// The report preserves the document's field order and, within each
    /// field, the canonical constraint-kind order. Fields the dataset
    /// lacks report every constraint as failed with `field_missing`.
    #[instrument(skip(self, source, document), fields(fields = document.fields.len()))]
    pub async fn verify(
        &self,
        source: &dyn DatasetSource,
        document: &ConstraintDocument,
    ) -> Result<VerificationReport> {
        document.validate()?;
        let names = source.field_names().await?;

        let mut fields = try_join_all(document.fields.iter().map(|(field, bundle)| {
            let present = names.iter().any(|n| n == field);
            async move {
                self.policy.cancel.check()?;
                self.verify_field(source, field, bundle, present).await
            }
        }))
        .await?;

        let mut pairs = Vec::with_capacity(document.field_pairs.len());
        for pair in &document.field_pairs {
            self.policy.cancel.check()?;
            pairs.push(self.verify_pair(source, pair, &names).await?);
        }

        let mut passes = 0;
        let mut failures = 0;
        for check in fields.iter().flat_map(|f| f.checks.iter()) {
            match check.status {
                Outcome::Pass => passes += 1,
                Outcome::Fail => failures += 1,
                Outcome::NotApplicable => {}
            }
        }
        for pair in &pairs {
            match pair.status {
                Outcome::Pass => passes += 1,
                Outcome::Fail => failures += 1,
                Outcome::NotApplicable => {}
            }
        }

        if self.policy.report_mode == ReportMode::FailuresOnly {
            for field in &mut fields {
                field.checks.retain(|c| c.status.is_fail());
            }
            fields.retain(|f| !f.checks.is_empty());
            pairs.retain(|p| p.status.is_fail());
        }

        let undocumented_fields = names
            .iter()
            .filter(|n| !document.fields.contains_key(*n))
            .cloned()
            .collect();

        info!(passes, failures, "verification complete");
        Ok(VerificationReport {
            fields,
            pairs,
            passes,
            failures,
            undocumented_fields,
        })
    }

    async fn verify_field(
        &self,
        source: &dyn DatasetSource,
        field: &str,
        bundle: &FieldConstraints,
        present: bool,
    ) -> Result<FieldVerification> {
        let constraints = bundle.iter();
        if !present {
            debug!(field, "field missing from dataset");
            return Ok(FieldVerification {
                field: field.to_string(),
                checks: constraints
                    .iter()
                    .map(|c| {
                        ConstraintCheck::fail(
                            c.kind(),
                            ReasonCode::FieldMissing,
                            format!("field '{field}' is missing from the dataset"),
                            None,
                        )
                    })
                    .collect(),
            });
        }

        let profile = source.profile(field, self.policy.distinct_cap).await?;
        let needs_scan = constraints.iter().any(|c| {
            matches!(
                c,
                FieldConstraint::AllowedValues(_) | FieldConstraint::Rex(_)
            )
        });
        let values = if needs_scan {
            Some(source.column_values(field).await?)
        } else {
            None
        };

        let mut checks = Vec::with_capacity(constraints.len());
        for constraint in &constraints {
            checks.push(self.check_constraint(constraint, &profile, values.as_deref())?);
        }
        Ok(FieldVerification {
            field: field.to_string(),
            checks,
        })
    }

    fn check_constraint(
        &self,
        constraint: &FieldConstraint,
        profile: &ColumnProfile,
        values: Option<&[FieldValue]>,
    ) -> Result<ConstraintCheck> {
        Ok(match constraint {
            FieldConstraint::Type(expected) => self.check_type(*expected, profile),
            FieldConstraint::Min(bound) => self.check_bound(bound, profile, true),
            FieldConstraint::Max(bound) => self.check_bound(bound, profile, false),
            FieldConstraint::Sign(sign) => self.check_sign(*sign, profile),
            FieldConstraint::MinLength(n) => self.check_length(*n, profile, true),
            FieldConstraint::MaxLength(n) => self.check_length(*n, profile, false),
            FieldConstraint::MaxNulls(n) => self.check_max_nulls(*n, profile),
            FieldConstraint::NoDuplicates => self.check_no_duplicates(profile),
            FieldConstraint::AllowedValues(allowed) => {
                self.check_allowed_values(allowed, values)?
            }
            FieldConstraint::Rex(patterns) => self.check_rex(patterns, profile, values)?,
        })
    }

    fn check_type(&self, expected: LogicalType, profile: &ColumnProfile) -> ConstraintCheck {
        match profile.logical_type {
            Some(actual) if actual.matches(expected, self.policy.type_checking) => {
                ConstraintCheck::pass(ConstraintKind::Type)
            }
            Some(actual) => ConstraintCheck::fail(
                ConstraintKind::Type,
                ReasonCode::TypeMismatch,
                format!("expected type {expected}, found {actual}"),
                Some(FieldValue::Str(actual.name().to_string())),
            ),
            None => ConstraintCheck::fail(
                ConstraintKind::Type,
                ReasonCode::TypeMismatch,
                format!("expected type {expected}, but the column has no logical type"),
                None,
            ),
        }
    }

    fn check_bound(&self, bound: &Bound, profile: &ColumnProfile, lower: bool) -> ConstraintCheck {
        let kind = if lower {
            ConstraintKind::Min
        } else {
            ConstraintKind::Max
        };
        let observed = if lower {
            profile.min_value.as_ref()
        } else {
            profile.max_value.as_ref()
        };
        let Some(observed) = observed else {
            return ConstraintCheck::not_applicable(kind, "no non-null values to compare");
        };
        let admitted = if lower {
            bound.admits_min(observed, self.policy.epsilon)
        } else {
            bound.admits_max(observed, self.policy.epsilon)
        };
        match admitted {
            Some(true) => ConstraintCheck::pass(kind),
            Some(false) => ConstraintCheck::fail(
                kind,
                ReasonCode::BoundViolated,
                if lower {
                    format!("minimum value {observed} is below min {}", bound.value)
                } else {
                    format!("maximum value {observed} exceeds max {}", bound.value)
                },
                Some(observed.clone()),
            ),
            None => ConstraintCheck::fail(
                kind,
                ReasonCode::Inapplicable,
                format!(
                    "{kind} value {} is not comparable with this column",
                    bound.value
                ),
                Some(observed.clone()),
            ),
        }
    }

    fn check_sign(&self, sign: SignCategory, profile: &ColumnProfile) -> ConstraintCheck {
        if let Some(t) = profile.logical_type {
            if !t.is_numeric() {
                return ConstraintCheck::fail(
                    ConstraintKind::Sign,
                    ReasonCode::Inapplicable,
                    format!("sign constraint is inapplicable to a {t} column"),
                    None,
                );
            }
        }
        if profile.non_null_count == 0 {
            return if sign == SignCategory::Null {
                ConstraintCheck::pass(ConstraintKind::Sign)
            } else {
                ConstraintCheck::not_applicable(
                    ConstraintKind::Sign,
                    "no non-null values to compare",
                )
            };
        }
        if sign == SignCategory::Null {
            return ConstraintCheck::fail(
                ConstraintKind::Sign,
                ReasonCode::SignViolated,
                format!(
                    "expected an all-null column, found {} non-null values",
                    profile.non_null_count
                ),
                profile.min_value.clone(),
            );
        }

        let extrema = (
            profile.min_value.as_ref().and_then(|v| v.as_f64()),
            profile.max_value.as_ref().and_then(|v| v.as_f64()),
        );
        let (Some(min), Some(max)) = extrema else {
            return ConstraintCheck::fail(
                ConstraintKind::Sign,
                ReasonCode::Inapplicable,
                "sign constraint needs numeric extrema",
                None,
            );
        };

        // The boundary that pins down a violation: the minimum for
        // lower-bounded categories, the maximum for upper-bounded ones.
        let (ok, offending) = match sign {
            SignCategory::Positive => (min > 0.0, min),
            SignCategory::NonNegative => (min >= 0.0, min),
            SignCategory::Zero => (min == 0.0 && max == 0.0, if min != 0.0 { min } else { max }),
            SignCategory::NonPositive => (max <= 0.0, max),
            SignCategory::Negative => (max < 0.0, max),
            SignCategory::Null => unreachable!("handled above"),
        };
        if ok {
            ConstraintCheck::pass(ConstraintKind::Sign)
        } else {
            ConstraintCheck::fail(
                ConstraintKind::Sign,
                ReasonCode::SignViolated,
                format!("value {offending} is not {sign}"),
                Some(FieldValue::Real(offending)),
            )
        }
    }

    fn check_length(&self, n: u32, profile: &ColumnProfile, lower: bool) -> ConstraintCheck {
        let kind = if lower {
            ConstraintKind::MinLength
        } else {
            ConstraintKind::MaxLength
        };
        if let Some(t) = profile.logical_type {
            if t != LogicalType::String {
                return ConstraintCheck::fail(
                    kind,
                    ReasonCode::Inapplicable,
                    format!("{kind} constraint is inapplicable to a {t} column"),
                    None,
                );
            }
        }
        let observed = if lower {
            profile.min_length
        } else {
            profile.max_length
        };
        let Some(observed) = observed else {
            return ConstraintCheck::not_applicable(kind, "no non-null values to measure");
        };
        let ok = if lower { observed >= n } else { observed <= n };
        if ok {
            ConstraintCheck::pass(kind)
        } else {
            ConstraintCheck::fail(
                kind,
                ReasonCode::LengthViolated,
                if lower {
                    format!("shortest value has {observed} characters, below min_length {n}")
                } else {
                    format!("longest value has {observed} characters, above max_length {n}")
                },
                Some(FieldValue::Int(observed as i64)),
            )
        }
    }

    fn check_max_nulls(&self, budget: u64, profile: &ColumnProfile) -> ConstraintCheck {
        if profile.null_count <= budget {
            ConstraintCheck::pass(ConstraintKind::MaxNulls)
        } else {
            ConstraintCheck::fail(
                ConstraintKind::MaxNulls,
                ReasonCode::ExcessNulls,
                format!(
                    "{} nulls exceed the budget of {budget}",
                    profile.null_count
                ),
                Some(FieldValue::Int(profile.null_count as i64)),
            )
        }
    }

    fn check_no_duplicates(&self, profile: &ColumnProfile) -> ConstraintCheck {
        if profile.distinct_count == profile.non_null_count {
            ConstraintCheck::pass(ConstraintKind::NoDuplicates)
        } else {
            let duplicates = profile.non_null_count - profile.distinct_count;
            ConstraintCheck::fail(
                ConstraintKind::NoDuplicates,
                ReasonCode::DuplicatesFound,
                format!("{duplicates} duplicate values found"),
                Some(FieldValue::Int(duplicates as i64)),
            )
        }
    }

    fn check_allowed_values(
        &self,
        allowed: &[FieldValue],
        values: Option<&[FieldValue]>,
    ) -> Result<ConstraintCheck> {
        let values = values.ok_or_else(|| {
            VeracityError::internal("allowed_values check requires a column scan")
        })?;
        for value in values {
            if value.is_null() {
                continue;
            }
            if !allowed.iter().any(|a| a.loosely_equals(value)) {
                return Ok(ConstraintCheck::fail(
                    ConstraintKind::AllowedValues,
                    ReasonCode::ValueNotAllowed,
                    format!("value {value} is not in the allowed set"),
                    Some(value.clone()),
                ));
            }
        }
        Ok(ConstraintCheck::pass(ConstraintKind::AllowedValues))
    }

    fn check_rex(
        &self,
        patterns: &[String],
        profile: &ColumnProfile,
        values: Option<&[FieldValue]>,
    ) -> Result<ConstraintCheck> {
        if let Some(t) = profile.logical_type {
            if t != LogicalType::String {
                return Ok(ConstraintCheck::fail(
                    ConstraintKind::Rex,
                    ReasonCode::Inapplicable,
                    format!("rex constraint is inapplicable to a {t} column"),
                    None,
                ));
            }
        }
        let set = compile_anchored_set(patterns)?;
        let values =
            values.ok_or_else(|| VeracityError::internal("rex check requires a column scan"))?;
        for value in values {
            if let FieldValue::Str(s) = value {
                if !set.is_match(s) {
                    return Ok(ConstraintCheck::fail(
                        ConstraintKind::Rex,
                        ReasonCode::PatternUnmatched,
                        format!("value {s} matches none of the {} patterns", patterns.len()),
                        Some(value.clone()),
                    ));
                }
            }
        }
        Ok(ConstraintCheck::pass(ConstraintKind::Rex))
    }

    async fn verify_pair(
        &self,
        source: &dyn DatasetSource,
        pair: &PairConstraint,
        names: &[String],
    ) -> Result<PairCheck> {
        for side in [&pair.left, &pair.right] {
            if !names.iter().any(|n| n == side) {
                return Ok(PairCheck {
                    constraint: pair.clone(),
                    status: Outcome::Fail,
                    reason: Some(ReasonCode::FieldMissing),
                    message: Some(format!("field '{side}' is missing from the dataset")),
                    values: None,
                });
            }
        }

        let left = source.column_values(&pair.left).await?;
        let right = source.column_values(&pair.right).await?;
        if left.len() != right.len() {
            return Err(VeracityError::internal(format!(
                "columns '{}' and '{}' have different lengths",
                pair.left, pair.right
            )));
        }

        for (l, r) in left.iter().zip(&right) {
            if l.is_null() || r.is_null() {
                continue;
            }
            match l.partial_cmp_loose(r) {
                Some(ord) if pair.op.holds(ord) => {}
                Some(_) => {
                    return Ok(PairCheck {
                        constraint: pair.clone(),
                        status: Outcome::Fail,
                        reason: Some(ReasonCode::BoundViolated),
                        message: Some(format!(
                            "'{}' {} '{}' does not hold for values {l} and {r}",
                            pair.left, pair.op, pair.right
                        )),
                        values: Some((l.clone(), r.clone())),
                    });
                }
                None => {
                    return Ok(PairCheck {
                        constraint: pair.clone(),
                        status: Outcome::Fail,
                        reason: Some(ReasonCode::Inapplicable),
                        message: Some(format!(
                            "values of '{}' and '{}' are not comparable",
                            pair.left, pair.right
                        )),
                        values: Some((l.clone(), r.clone())),
                    });
                }
            }
        }

        Ok(PairCheck {
            constraint: pair.clone(),
            status: Outcome::Pass,
            reason: None,
            message: None,
            values: None,
        })
    }
}
