//! Record-level anomaly detection.
//!
//! Where the verifier answers "does this column satisfy the
//! constraint?", the [`Detector`] answers "which rows break it?". Every
//! constraint kind has a row-level predicate (nulls pass everything
//! except the type check, which nulls also pass, and the null budget,
//! see below); each input row is annotated with the number of
//! constraints it violates and, optionally, one boolean `_ok` column per
//! (field, constraint).
//!
//! Two kinds need column-level context at row level: `no_duplicates`
//! marks every row whose value occurs more than once, and `max_nulls`
//! uses the column-aggregate approximation: a null row fails exactly
//! when the column's total null count exceeds the budget, since no
//! single null can meaningfully be "the one over budget".
//!
//! The output is an Arrow record batch in input row order. Rows with no
//! failures are kept only when `write_all` is set.

use std::collections::HashMap;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Date32Array, Float64Array, Int64Array, StringArray,
    UInt64Array,
};
use arrow::datatypes::{DataType, Date32Type, Field, Schema};
use arrow::record_batch::RecordBatch;
use indexmap::IndexMap;
use tracing::{debug, info, instrument, warn};

use crate::core::{
    compile_anchored_set, CancelToken, ConstraintDocument, FieldConstraint, FieldValue,
    LogicalType, PairConstraint, TypeChecking,
};
use crate::error::{Result, VeracityError};
use crate::source::DatasetSource;

/// Policy values for a detection run.
#[derive(Debug, Clone, Default)]
pub struct DetectPolicy {
    /// Keep passing rows in the output as well as failing ones.
    pub write_all: bool,
    /// Emit one boolean `{field}_{kind}_ok` column per constraint.
    pub per_constraint: bool,
    /// Original columns to carry into the output; `None` means all.
    pub output_fields: Option<Vec<String>>,
    /// Prepend the 0-based input row ordinal as an `index` column.
    pub include_index: bool,
    /// Fuzz for numeric bound checks, as in verification.
    pub epsilon: f64,
    /// Typing policy for row-level type checks.
    pub type_checking: TypeChecking,
    /// Cooperative cancellation, checked between column scans and
    /// between constraint evaluations.
    pub cancel: CancelToken,
}

/// The annotated, row-filtered output of a detection run.
#[derive(Debug, Clone)]
pub struct DetectionResult {
    /// Output rows in input order: optional `index`, the selected
    /// original columns, optional per-constraint `_ok` columns, and
    /// `n_failures`.
    pub batch: RecordBatch,
    pub n_records: u64,
    pub n_failing_records: u64,
    pub n_passing_records: u64,
}

impl DetectionResult {
    /// True when no rows made it into the output.
    pub fn is_empty(&self) -> bool {
        self.batch.num_rows() == 0
    }
}

/// Evaluates a constraint document row-by-row.
#[derive(Debug, Clone, Default)]
pub struct Detector {
    policy: DetectPolicy,
}

impl Detector {
    pub fn new(policy: DetectPolicy) -> Self {
        Self { policy }
    }

    /// Runs detection, preserving input row order.
    ///
    /// Constraints on fields the dataset lacks cannot be row-evaluated
    /// and are skipped with a warning.
    #[instrument(skip(self, source, document), fields(fields = document.fields.len()))]
    pub async fn detect(
        &self,
        source: &dyn DatasetSource,
        document: &ConstraintDocument,
    ) -> Result<DetectionResult> {
        document.validate()?;
        let names = source.field_names().await?;
        let n_rows = source.row_count().await? as usize;

        let output_fields: Vec<String> = match &self.policy.output_fields {
            Some(selected) => {
                for field in selected {
                    if !names.iter().any(|n| n == field) {
                        return Err(VeracityError::column_not_found(field));
                    }
                }
                selected.clone()
            }
            None => names.clone(),
        };

        // Materialise every column the run touches, once.
        let mut columns: IndexMap<String, Vec<FieldValue>> = IndexMap::new();
        let mut wanted: Vec<&String> = output_fields.iter().collect();
        wanted.extend(document.fields.keys().filter(|f| names.contains(*f)));
        for pair in &document.field_pairs {
            wanted.push(&pair.left);
            wanted.push(&pair.right);
        }
        for field in wanted {
            if columns.contains_key(field) || !names.iter().any(|n| n == field) {
                continue;
            }
            self.policy.cancel.check()?;
            let values = source.column_values(field).await?;
            if values.len() != n_rows {
                return Err(VeracityError::internal(format!(
                    "column '{field}' has {} rows, expected {n_rows}",
                    values.len()
                )));
            }
            columns.insert(field.clone(), values);
        }

        // One pass mask per (field, constraint), in document order.
        let mut masks: Vec<(String, Vec<bool>)> = Vec::new();
        for (field, bundle) in &document.fields {
            if !names.iter().any(|n| n == field) {
                warn!(field = %field, "skipping constraints on a field the dataset lacks");
                continue;
            }
            let values = &columns[field.as_str()];
            for constraint in bundle.iter() {
                self.policy.cancel.check()?;
                let mask = self.constraint_mask(&constraint, values)?;
                masks.push((format!("{field}_{}_ok", constraint.kind().name()), mask));
            }
        }
        for pair in &document.field_pairs {
            if !names.iter().any(|n| n == &pair.left)
                || !names.iter().any(|n| n == &pair.right)
            {
                warn!(
                    left = %pair.left,
                    right = %pair.right,
                    "skipping pair constraint on missing fields"
                );
                continue;
            }
            self.policy.cancel.check()?;
            let mask = pair_mask(pair, &columns[pair.left.as_str()], &columns[pair.right.as_str()]);
            masks.push((pair.column_name(), mask));
        }

        let mut n_failures = vec![0i64; n_rows];
        for (_, mask) in &masks {
            for (i, ok) in mask.iter().enumerate() {
                if !ok {
                    n_failures[i] += 1;
                }
            }
        }
        let n_failing_records = n_failures.iter().filter(|&&n| n > 0).count() as u64;
        let keep: Vec<bool> = n_failures
            .iter()
            .map(|&n| self.policy.write_all || n > 0)
            .collect();
        let kept = keep.iter().filter(|&&k| k).count();

        debug!(
            rows = n_rows,
            failing = n_failing_records,
            kept,
            constraints = masks.len(),
            "detection evaluated"
        );

        // Assemble the output batch.
        let mut schema_fields: Vec<Field> = Vec::new();
        let mut arrays: Vec<ArrayRef> = Vec::new();

        if self.policy.include_index {
            let index: Vec<u64> = keep
                .iter()
                .enumerate()
                .filter(|(_, k)| **k)
                .map(|(i, _)| i as u64)
                .collect();
            schema_fields.push(Field::new("index", DataType::UInt64, false));
            arrays.push(Arc::new(UInt64Array::from(index)));
        }

        for field in &output_fields {
            let filtered: Vec<&FieldValue> = columns[field.as_str()]
                .iter()
                .zip(&keep)
                .filter(|(_, k)| **k)
                .map(|(v, _)| v)
                .collect();
            let (data_type, array) = values_to_array(&filtered)?;
            schema_fields.push(Field::new(field, data_type, true));
            arrays.push(array);
        }

        if self.policy.per_constraint {
            for (name, mask) in &masks {
                let filtered: Vec<bool> = mask
                    .iter()
                    .zip(&keep)
                    .filter(|(_, k)| **k)
                    .map(|(ok, _)| *ok)
                    .collect();
                schema_fields.push(Field::new(name, DataType::Boolean, false));
                arrays.push(Arc::new(BooleanArray::from(filtered)));
            }
        }

        let failures: Vec<i64> = n_failures
            .iter()
            .zip(&keep)
            .filter(|(_, k)| **k)
            .map(|(n, _)| *n)
            .collect();
        schema_fields.push(Field::new("n_failures", DataType::Int64, false));
        arrays.push(Arc::new(Int64Array::from(failures)));

        let batch = RecordBatch::try_new(Arc::new(Schema::new(schema_fields)), arrays)?;
        info!(
            records = n_rows,
            failing = n_failing_records,
            output_rows = batch.num_rows(),
            "detection complete"
        );
        Ok(DetectionResult {
            batch,
            n_records: n_rows as u64,
            n_failing_records,
            n_passing_records: n_rows as u64 - n_failing_records,
        })
    }

    /// The row-level pass mask for one constraint over one column.
    fn constraint_mask(
        &self,
        constraint: &FieldConstraint,
        values: &[FieldValue],
    ) -> Result<Vec<bool>> {
        Ok(match constraint {
            FieldConstraint::Type(expected) => values
                .iter()
                .map(|v| {
                    v.is_null()
                        || v.logical_type()
                            .is_some_and(|t| t.matches(*expected, self.policy.type_checking))
                })
                .collect(),
            FieldConstraint::Min(bound) => values
                .iter()
                .map(|v| {
                    v.is_null() || bound.admits_min(v, self.policy.epsilon).unwrap_or(false)
                })
                .collect(),
            FieldConstraint::Max(bound) => values
                .iter()
                .map(|v| {
                    v.is_null() || bound.admits_max(v, self.policy.epsilon).unwrap_or(false)
                })
                .collect(),
            FieldConstraint::Sign(sign) => values
                .iter()
                .map(|v| v.is_null() || v.as_f64().is_some_and(|x| sign.admits(x)))
                .collect(),
            FieldConstraint::MinLength(n) => values
                .iter()
                .map(|v| {
                    v.is_null()
                        || v.as_str()
                            .is_some_and(|s| s.chars().count() >= *n as usize)
                })
                .collect(),
            FieldConstraint::MaxLength(n) => values
                .iter()
                .map(|v| {
                    v.is_null()
                        || v.as_str()
                            .is_some_and(|s| s.chars().count() <= *n as usize)
                })
                .collect(),
            FieldConstraint::MaxNulls(budget) => {
                let nulls = values.iter().filter(|v| v.is_null()).count() as u64;
                let within_budget = nulls <= *budget;
                values
                    .iter()
                    .map(|v| !v.is_null() || within_budget)
                    .collect()
            }
            FieldConstraint::NoDuplicates => {
                let mut counts: HashMap<String, u32> = HashMap::new();
                for v in values {
                    if !v.is_null() {
                        *counts.entry(occurrence_key(v)).or_insert(0) += 1;
                    }
                }
                values
                    .iter()
                    .map(|v| v.is_null() || counts[&occurrence_key(v)] == 1)
                    .collect()
            }
            FieldConstraint::AllowedValues(allowed) => values
                .iter()
                .map(|v| v.is_null() || allowed.iter().any(|a| a.loosely_equals(v)))
                .collect(),
            FieldConstraint::Rex(patterns) => {
                let set = compile_anchored_set(patterns)?;
                values
                    .iter()
                    .map(|v| match v {
                        FieldValue::Null => true,
                        FieldValue::Str(s) => set.is_match(s),
                        _ => false,
                    })
                    .collect()
            }
        })
    }
}

/// Row mask for a pair constraint: a row passes when either side is
/// null or the comparison holds; incomparable values fail.
fn pair_mask(pair: &PairConstraint, left: &[FieldValue], right: &[FieldValue]) -> Vec<bool> {
    left.iter()
        .zip(right)
        .map(|(l, r)| {
            l.is_null()
                || r.is_null()
                || l.partial_cmp_loose(r)
                    .is_some_and(|ord| pair.op.holds(ord))
        })
        .collect()
}

/// Canonical occurrence key for duplicate counting. The tag keeps
/// cross-type collisions impossible even though one column never mixes
/// types.
fn occurrence_key(value: &FieldValue) -> String {
    match value {
        FieldValue::Bool(b) => format!("b:{b}"),
        FieldValue::Int(i) => format!("i:{i}"),
        FieldValue::Real(r) => format!("r:{r}"),
        FieldValue::Str(s) => format!("s:{s}"),
        FieldValue::Date(d) => format!("d:{d}"),
        FieldValue::Null => "null".to_string(),
    }
}

/// Rebuilds an Arrow array from filtered column values. The element
/// type comes from the first non-null value; an all-null column comes
/// back as nullable Utf8.
fn values_to_array(values: &[&FieldValue]) -> Result<(DataType, ArrayRef)> {
    let logical = values.iter().find_map(|v| v.logical_type());
    let array: ArrayRef = match logical {
        Some(LogicalType::Bool) => {
            let data: Vec<Option<bool>> = values
                .iter()
                .map(|v| match v {
                    FieldValue::Bool(b) => Ok(Some(*b)),
                    FieldValue::Null => Ok(None),
                    other => Err(mixed_column(other)),
                })
                .collect::<Result<_>>()?;
            Arc::new(BooleanArray::from(data))
        }
        Some(LogicalType::Int) => {
            let data: Vec<Option<i64>> = values
                .iter()
                .map(|v| match v {
                    FieldValue::Int(i) => Ok(Some(*i)),
                    FieldValue::Null => Ok(None),
                    other => Err(mixed_column(other)),
                })
                .collect::<Result<_>>()?;
            Arc::new(Int64Array::from(data))
        }
        Some(LogicalType::Real) => {
            let data: Vec<Option<f64>> = values
                .iter()
                .map(|v| match v {
                    FieldValue::Null => Ok(None),
                    other => other.as_f64().map(Some).ok_or_else(|| mixed_column(other)),
                })
                .collect::<Result<_>>()?;
            Arc::new(Float64Array::from(data))
        }
        Some(LogicalType::String) => {
            let data: Vec<Option<&str>> = values
                .iter()
                .map(|v| match v {
                    FieldValue::Str(s) => Ok(Some(s.as_str())),
                    FieldValue::Null => Ok(None),
                    other => Err(mixed_column(other)),
                })
                .collect::<Result<_>>()?;
            Arc::new(StringArray::from(data))
        }
        Some(LogicalType::Date) => {
            let data: Vec<Option<i32>> = values
                .iter()
                .map(|v| match v {
                    FieldValue::Date(d) => Ok(Some(Date32Type::from_naive_date(*d))),
                    FieldValue::Null => Ok(None),
                    other => Err(mixed_column(other)),
                })
                .collect::<Result<_>>()?;
            Arc::new(Date32Array::from(data))
        }
        None => {
            let data: Vec<Option<&str>> = values.iter().map(|_| None).collect();
            Arc::new(StringArray::from(data))
        }
    };
    Ok((array.data_type().clone(), array))
}

fn mixed_column(value: &FieldValue) -> VeracityError {
    VeracityError::internal(format!("mixed value types in one column: {value}"))
}
