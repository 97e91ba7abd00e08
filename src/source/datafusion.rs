//! The DataFusion-backed reference dataset source.
//!
//! Column reductions are computed with a single SQL aggregate query per
//! field; the ordered distinct sample and column scans materialise the
//! projected column and convert Arrow arrays to [`FieldValue`]s.

use arrow::array::{self as aa, Array, ArrayRef};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use datafusion::prelude::*;
use tracing::{debug, instrument};

use super::{ColumnProfile, DatasetSource};
use crate::core::{FieldValue, LogicalType};
use crate::error::{Result, VeracityError};

/// A [`DatasetSource`] over a registered DataFusion table.
pub struct DataFusionSource {
    ctx: SessionContext,
    table: String,
}

impl DataFusionSource {
    /// Wraps an existing session context and table name.
    pub fn new(ctx: SessionContext, table: impl Into<String>) -> Self {
        Self {
            ctx,
            table: table.into(),
        }
    }

    /// Registers a record batch under the table name `data` in a fresh
    /// session context.
    pub fn from_batch(batch: RecordBatch) -> Result<Self> {
        let ctx = SessionContext::new();
        let _ = ctx.register_batch("data", batch)?;
        Ok(Self::new(ctx, "data"))
    }

    /// The underlying session context.
    pub fn session(&self) -> &SessionContext {
        &self.ctx
    }

    /// The table this source reads.
    pub fn table_name(&self) -> &str {
        &self.table
    }

    async fn arrow_type_of(&self, field: &str) -> Result<DataType> {
        let df = self.ctx.table(self.table.as_str()).await?;
        df.schema()
            .fields()
            .iter()
            .find(|f| f.name() == field)
            .map(|f| f.data_type().clone())
            .ok_or_else(|| VeracityError::column_not_found(field))
    }

    /// Runs an aggregate query and returns its single result row.
    async fn aggregate_row(&self, sql: &str) -> Result<RecordBatch> {
        let df = self.ctx.sql(sql).await?;
        let batches = df.collect().await?;
        batches
            .into_iter()
            .find(|b| b.num_rows() > 0)
            .ok_or_else(|| VeracityError::internal("aggregate query returned no rows"))
    }
}

#[async_trait]
impl DatasetSource for DataFusionSource {
    async fn field_names(&self) -> Result<Vec<String>> {
        let df = self.ctx.table(self.table.as_str()).await?;
        Ok(df
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect())
    }

    async fn row_count(&self) -> Result<u64> {
        let table = quote_ident(&self.table);
        let batch = self
            .aggregate_row(&format!("SELECT COUNT(*) AS total_cnt FROM {table}"))
            .await?;
        count_at(&batch, 0)
    }

    #[instrument(skip(self), fields(table = %self.table))]
    async fn profile(&self, field: &str, distinct_cap: usize) -> Result<ColumnProfile> {
        let arrow_type = self.arrow_type_of(field).await?;
        let logical_type = logical_type_of(&arrow_type);
        let col = quote_ident(field);
        let table = quote_ident(&self.table);

        // Counts are computable for any column; extrema, distincts and
        // length statistics only for columns with a logical type.
        let mut select = format!("COUNT(*) AS total_cnt, COUNT({col}) AS non_null_cnt");
        let mut has_distinct = false;
        let mut has_extrema = false;
        let mut has_lengths = false;
        if let Some(lt) = logical_type {
            select.push_str(&format!(", COUNT(DISTINCT {col}) AS distinct_cnt"));
            has_distinct = true;
            if lt != LogicalType::Bool {
                select.push_str(&format!(", MIN({col}) AS min_v, MAX({col}) AS max_v"));
                has_extrema = true;
            }
            if lt == LogicalType::String {
                select.push_str(&format!(
                    ", MIN(CHAR_LENGTH({col})) AS min_len, MAX(CHAR_LENGTH({col})) AS max_len"
                ));
                has_lengths = true;
            }
        }

        let batch = self
            .aggregate_row(&format!("SELECT {select} FROM {table}"))
            .await?;

        let total_count = count_at(&batch, 0)?;
        let non_null_count = count_at(&batch, 1)?;
        let null_count = total_count - non_null_count;

        let mut idx = 2;
        let distinct_count = if has_distinct {
            let n = count_at(&batch, idx)?;
            idx += 1;
            n
        } else {
            0
        };
        let (min_value, max_value) = if has_extrema {
            let min = scalar_at(&batch, idx)?;
            let max = scalar_at(&batch, idx + 1)?;
            idx += 2;
            (non_null(min), non_null(max))
        } else {
            (None, None)
        };
        let (min_length, max_length) = if has_lengths {
            let min = scalar_at(&batch, idx)?;
            let max = scalar_at(&batch, idx + 1)?;
            (as_length(min), as_length(max))
        } else {
            (None, None)
        };

        // The ordered distinct sample needs a scan; only pay for it when
        // the column is small enough to be worth sampling.
        let distinct_values = if has_distinct && distinct_count as usize <= distinct_cap {
            let values = self.column_values(field).await?;
            let mut distinct: Vec<FieldValue> = Vec::with_capacity(distinct_count as usize);
            for value in values {
                if value.is_null() {
                    continue;
                }
                if !distinct.contains(&value) {
                    distinct.push(value);
                }
            }
            Some(distinct)
        } else {
            None
        };

        debug!(
            field,
            total = total_count,
            nulls = null_count,
            distinct = distinct_count,
            "profiled column"
        );

        Ok(ColumnProfile {
            field: field.to_string(),
            logical_type,
            total_count,
            null_count,
            non_null_count,
            min_value,
            max_value,
            distinct_count,
            distinct_values,
            min_length,
            max_length,
        })
    }

    async fn column_values(&self, field: &str) -> Result<Vec<FieldValue>> {
        // Touch the schema first so unknown fields surface as
        // ColumnNotFound rather than a SQL planning error.
        self.arrow_type_of(field).await?;
        let df = self.ctx.table(self.table.as_str()).await?;
        let df = df.select_columns(&[field])?;
        let batches = df.collect().await?;

        let mut values = Vec::new();
        for batch in &batches {
            append_array_values(batch.column(0), &mut values)?;
        }
        Ok(values)
    }
}

/// Maps an Arrow type to its logical category, `None` when the column
/// has no logical mapping (nested types, timestamps, etc.).
pub fn logical_type_of(data_type: &DataType) -> Option<LogicalType> {
    match data_type {
        DataType::Boolean => Some(LogicalType::Bool),
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => Some(LogicalType::Int),
        DataType::Float32 | DataType::Float64 => Some(LogicalType::Real),
        DataType::Utf8 | DataType::LargeUtf8 => Some(LogicalType::String),
        DataType::Date32 | DataType::Date64 => Some(LogicalType::Date),
        _ => None,
    }
}

/// Quotes a SQL identifier, doubling any embedded quotes.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

macro_rules! append_primitive {
    ($array:expr, $out:expr, $arr_ty:ty, $map:expr) => {{
        let arr = $array
            .as_any()
            .downcast_ref::<$arr_ty>()
            .ok_or_else(|| VeracityError::internal("array type did not match its schema"))?;
        for i in 0..arr.len() {
            $out.push(if arr.is_null(i) {
                FieldValue::Null
            } else {
                $map(arr.value(i))
            });
        }
    }};
}

/// Converts one Arrow array into [`FieldValue`]s, appending to `out`.
pub(crate) fn append_array_values(array: &ArrayRef, out: &mut Vec<FieldValue>) -> Result<()> {
    match array.data_type() {
        DataType::Boolean => {
            append_primitive!(array, out, aa::BooleanArray, |v| FieldValue::Bool(v))
        }
        DataType::Int8 => {
            append_primitive!(array, out, aa::Int8Array, |v| FieldValue::Int(v as i64))
        }
        DataType::Int16 => {
            append_primitive!(array, out, aa::Int16Array, |v| FieldValue::Int(v as i64))
        }
        DataType::Int32 => {
            append_primitive!(array, out, aa::Int32Array, |v| FieldValue::Int(v as i64))
        }
        DataType::Int64 => {
            append_primitive!(array, out, aa::Int64Array, |v| FieldValue::Int(v))
        }
        DataType::UInt8 => {
            append_primitive!(array, out, aa::UInt8Array, |v| FieldValue::Int(v as i64))
        }
        DataType::UInt16 => {
            append_primitive!(array, out, aa::UInt16Array, |v| FieldValue::Int(v as i64))
        }
        DataType::UInt32 => {
            append_primitive!(array, out, aa::UInt32Array, |v| FieldValue::Int(v as i64))
        }
        DataType::UInt64 => {
            append_primitive!(array, out, aa::UInt64Array, |v| FieldValue::Int(v as i64))
        }
        DataType::Float32 => {
            append_primitive!(array, out, aa::Float32Array, |v| FieldValue::Real(
                v as f64
            ))
        }
        DataType::Float64 => {
            append_primitive!(array, out, aa::Float64Array, |v| FieldValue::Real(v))
        }
        DataType::Utf8 => {
            append_primitive!(array, out, aa::StringArray, |v: &str| FieldValue::Str(
                v.to_string()
            ))
        }
        DataType::LargeUtf8 => {
            append_primitive!(array, out, aa::LargeStringArray, |v: &str| {
                FieldValue::Str(v.to_string())
            })
        }
        DataType::Date32 => {
            let arr = array
                .as_any()
                .downcast_ref::<aa::Date32Array>()
                .ok_or_else(|| VeracityError::internal("array type did not match its schema"))?;
            for i in 0..arr.len() {
                out.push(if arr.is_null(i) {
                    FieldValue::Null
                } else {
                    arr.value_as_date(i)
                        .map(FieldValue::Date)
                        .unwrap_or(FieldValue::Null)
                });
            }
        }
        DataType::Date64 => {
            let arr = array
                .as_any()
                .downcast_ref::<aa::Date64Array>()
                .ok_or_else(|| VeracityError::internal("array type did not match its schema"))?;
            for i in 0..arr.len() {
                out.push(if arr.is_null(i) {
                    FieldValue::Null
                } else {
                    arr.value_as_date(i)
                        .map(FieldValue::Date)
                        .unwrap_or(FieldValue::Null)
                });
            }
        }
        other => {
            return Err(VeracityError::internal(format!(
                "unsupported Arrow type in value scan: {other:?}"
            )))
        }
    }
    Ok(())
}

/// Extracts the first-row scalar of an aggregate result column.
fn scalar_at(batch: &RecordBatch, column: usize) -> Result<FieldValue> {
    let mut values = Vec::with_capacity(1);
    append_array_values(batch.column(column), &mut values)?;
    values
        .into_iter()
        .next()
        .ok_or_else(|| VeracityError::internal("empty aggregate column"))
}

/// Extracts a COUNT(...) result, which DataFusion returns as Int64.
fn count_at(batch: &RecordBatch, column: usize) -> Result<u64> {
    match scalar_at(batch, column)? {
        FieldValue::Int(n) if n >= 0 => Ok(n as u64),
        FieldValue::Null => Ok(0),
        other => Err(VeracityError::internal(format!(
            "expected a count, got {other}"
        ))),
    }
}

fn non_null(value: FieldValue) -> Option<FieldValue> {
    if value.is_null() {
        None
    } else {
        Some(value)
    }
}

fn as_length(value: FieldValue) -> Option<u32> {
    match value {
        FieldValue::Int(n) if n >= 0 => Some(n as u32),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, Int64Array, StringArray};
    use arrow::datatypes::{Field, Schema};
    use std::sync::Arc;

    fn test_batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("age", DataType::Int64, true),
            Field::new("score", DataType::Float64, true),
            Field::new("code", DataType::Utf8, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![Some(20), Some(30), Some(40), None])),
                Arc::new(Float64Array::from(vec![
                    Some(1.5),
                    Some(-2.5),
                    Some(1.5),
                    Some(0.0),
                ])),
                Arc::new(StringArray::from(vec![
                    Some("AB-01"),
                    Some("AB-02"),
                    Some("AB-17"),
                    Some("AB-01"),
                ])),
            ],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_profile_counts_and_extrema() {
        let source = DataFusionSource::from_batch(test_batch()).unwrap();
        let profile = source.profile("age", 20).await.unwrap();

        assert_eq!(profile.logical_type, Some(LogicalType::Int));
        assert_eq!(profile.total_count, 4);
        assert_eq!(profile.null_count, 1);
        assert_eq!(profile.non_null_count, 3);
        assert_eq!(profile.distinct_count, 3);
        assert_eq!(profile.min_value, Some(FieldValue::Int(20)));
        assert_eq!(profile.max_value, Some(FieldValue::Int(40)));
        assert_eq!(
            profile.distinct_values,
            Some(vec![
                FieldValue::Int(20),
                FieldValue::Int(30),
                FieldValue::Int(40)
            ])
        );
    }

    #[tokio::test]
    async fn test_profile_string_lengths() {
        let source = DataFusionSource::from_batch(test_batch()).unwrap();
        let profile = source.profile("code", 20).await.unwrap();

        assert_eq!(profile.logical_type, Some(LogicalType::String));
        assert_eq!(profile.min_length, Some(5));
        assert_eq!(profile.max_length, Some(5));
        // Duplicated "AB-01" appears once, in first-seen position.
        assert_eq!(
            profile.distinct_strings().unwrap(),
            vec!["AB-01", "AB-02", "AB-17"]
        );
    }

    #[tokio::test]
    async fn test_distinct_sample_suppressed_above_cap() {
        let source = DataFusionSource::from_batch(test_batch()).unwrap();
        let profile = source.profile("age", 2).await.unwrap();
        assert_eq!(profile.distinct_count, 3);
        assert!(profile.distinct_values.is_none());
    }

    #[tokio::test]
    async fn test_column_values_preserve_row_order() {
        let source = DataFusionSource::from_batch(test_batch()).unwrap();
        let values = source.column_values("score").await.unwrap();
        assert_eq!(
            values,
            vec![
                FieldValue::Real(1.5),
                FieldValue::Real(-2.5),
                FieldValue::Real(1.5),
                FieldValue::Real(0.0),
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_column_is_an_error() {
        let source = DataFusionSource::from_batch(test_batch()).unwrap();
        let err = source.profile("missing", 20).await.unwrap_err();
        assert!(matches!(err, VeracityError::ColumnNotFound { .. }));
        let err = source.column_values("missing").await.unwrap_err();
        assert!(matches!(err, VeracityError::ColumnNotFound { .. }));
    }

    #[tokio::test]
    async fn test_determinism() {
        let source = DataFusionSource::from_batch(test_batch()).unwrap();
        let first = source.profile("score", 20).await.unwrap();
        let second = source.profile("score", 20).await.unwrap();
        assert_eq!(first, second);
    }
}
