//! The dataset capability interface consumed by the engine.
//!
//! The constraint algorithms never touch storage directly: they see a
//! [`DatasetSource`], a small capability set exposing column metadata,
//! cheap per-column reductions ([`ColumnProfile`]) and column
//! materialisation for value scans. The crate ships one reference
//! backend, [`DataFusionSource`]; CSV, columnar-file and database
//! adapters are expected to live outside the core and implement the same
//! trait.

mod datafusion;

pub use self::datafusion::DataFusionSource;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{FieldValue, LogicalType};
use crate::error::Result;

/// Default cap on the number of distinct values a profile materialises.
pub const DEFAULT_DISTINCT_CAP: usize = 20;

/// Per-column statistics, computed lazily by a [`DatasetSource`].
///
/// All statistics ignore nulls except the counts. `distinct_values` is
/// `None` when the column's distinct count exceeds the requested cap
/// ("too many distinct"); when present it lists every distinct non-null
/// value in first-seen row order, which keeps discovery deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub field: String,
    /// The field's logical type, `None` when the physical type has no
    /// logical mapping.
    pub logical_type: Option<LogicalType>,
    pub total_count: u64,
    pub null_count: u64,
    pub non_null_count: u64,
    /// Minimum over non-null values; `None` when the column is all null.
    pub min_value: Option<FieldValue>,
    /// Maximum over non-null values; `None` when the column is all null.
    pub max_value: Option<FieldValue>,
    pub distinct_count: u64,
    pub distinct_values: Option<Vec<FieldValue>>,
    /// Minimum character length, string columns only.
    pub min_length: Option<u32>,
    /// Maximum character length, string columns only.
    pub max_length: Option<u32>,
}

impl ColumnProfile {
    /// The distinct sample as strings, when the column is a string
    /// column with a complete sample. This is the regex inducer's input.
    pub fn distinct_strings(&self) -> Option<Vec<&str>> {
        let values = self.distinct_values.as_ref()?;
        values
            .iter()
            .map(|v| v.as_str())
            .collect::<Option<Vec<&str>>>()
    }
}

/// Abstract provider of dataset metadata, column reductions and column
/// scans.
///
/// Implementations must be deterministic: repeated calls against the
/// same dataset return equal results. They need not be thread-safe
/// beyond `Send + Sync`; the engine drives at most one request per field
/// at a time.
#[async_trait]
pub trait DatasetSource: Send + Sync {
    /// The dataset's field names, in schema order.
    async fn field_names(&self) -> Result<Vec<String>>;

    /// The number of rows in the dataset.
    async fn row_count(&self) -> Result<u64>;

    /// Computes the statistics profile of one field. The distinct sample
    /// is materialised only when the distinct count is at most
    /// `distinct_cap`.
    async fn profile(&self, field: &str, distinct_cap: usize) -> Result<ColumnProfile>;

    /// Materialises one column in row order.
    async fn column_values(&self, field: &str) -> Result<Vec<FieldValue>>;
}
