//! Shared fixtures for the integration tests: in-memory DataFusion
//! sources built from typed Arrow arrays.

#![allow(dead_code)]

use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Date32Array, Float64Array, Int64Array, StringArray};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use veracity::source::DataFusionSource;

pub fn int_array(values: &[Option<i64>]) -> ArrayRef {
    Arc::new(Int64Array::from(values.to_vec()))
}

pub fn real_array(values: &[Option<f64>]) -> ArrayRef {
    Arc::new(Float64Array::from(values.to_vec()))
}

pub fn string_array(values: &[Option<&str>]) -> ArrayRef {
    Arc::new(StringArray::from(values.to_vec()))
}

pub fn bool_array(values: &[Option<bool>]) -> ArrayRef {
    Arc::new(BooleanArray::from(values.to_vec()))
}

pub fn date_array(values: &[Option<&str>]) -> ArrayRef {
    let days: Vec<Option<i32>> = values
        .iter()
        .map(|v| {
            v.map(|s| {
                let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
                arrow::datatypes::Date32Type::from_naive_date(date)
            })
        })
        .collect();
    Arc::new(Date32Array::from(days))
}

/// Builds a source over a single in-memory table named `data`.
pub fn source_from(columns: Vec<(&str, ArrayRef)>) -> DataFusionSource {
    let batch = RecordBatch::try_from_iter(
        columns
            .into_iter()
            .map(|(name, array)| (name.to_string(), array)),
    )
    .unwrap();
    DataFusionSource::from_batch(batch).unwrap()
}
