//! Constraint discovery: inferring the minimal informative constraint
//! set a dataset currently satisfies.
//!
//! The [`Discoverer`] asks the dataset source for one [`ColumnProfile`]
//! per field (one cooperative future per field) and turns each profile
//! into a constraint bundle with a fixed set of emission rules. The
//! result is a [`ConstraintDocument`] whose field order matches the
//! dataset's, ready to be saved and verified against future data.
//!
//! # Example
//!
//! ```rust,ignore
//! use veracity::discover::{Discoverer, DiscoverOptions};
//! use veracity::source::DataFusionSource;
//!
//! # async fn example(source: DataFusionSource) -> veracity::error::Result<()> {
//! let discoverer = Discoverer::new(DiscoverOptions::default());
//! let document = discoverer.discover(&source).await?;
//! document.save("constraints.json")?;
//! # Ok(())
//! # }
//! ```

pub mod rex;

pub use rex::{induce, RexOptions};

use async_trait::async_trait;
use futures::future::try_join_all;
use indexmap::IndexMap;
use tracing::{debug, info, instrument};

use crate::core::{
    Bound, CancelToken, ConstraintDocument, FieldConstraints, LogicalType, PairConstraint,
    SignCategory,
};
use crate::error::Result;
use crate::source::{ColumnProfile, DatasetSource, DEFAULT_DISTINCT_CAP};

/// Configuration for a discovery run.
#[derive(Debug, Clone)]
pub struct DiscoverOptions {
    /// Cap `K` on materialised distinct values; fields with more
    /// distinct values get neither `allowed_values` nor `rex`.
    pub distinct_cap: usize,
    /// Whether to run regex induction over string fields.
    pub discover_rex: bool,
    /// Whether to emit `allowed_values` for low-cardinality fields.
    pub discover_allowed_values: bool,
    /// Tuning for the regex inducer.
    pub rex: RexOptions,
    /// Cooperative cancellation, checked per field.
    pub cancel: CancelToken,
}

impl Default for DiscoverOptions {
    fn default() -> Self {
        Self {
            distinct_cap: DEFAULT_DISTINCT_CAP,
            discover_rex: true,
            discover_allowed_values: true,
            rex: RexOptions::default(),
            cancel: CancelToken::default(),
        }
    }
}

/// Hook for discovering multi-field constraints.
///
/// The core only evaluates pair constraints; inferring them is delegated
/// to implementations of this trait. No default implementation ships.
#[async_trait]
pub trait PairDiscoverer: Send + Sync {
    async fn discover_pairs(&self, source: &dyn DatasetSource) -> Result<Vec<PairConstraint>>;
}

/// Discovers per-field constraints from observed column statistics.
pub struct Discoverer {
    options: DiscoverOptions,
    pair_discoverer: Option<Box<dyn PairDiscoverer>>,
}

impl Default for Discoverer {
    fn default() -> Self {
        Self::new(DiscoverOptions::default())
    }
}

impl Discoverer {
    pub fn new(options: DiscoverOptions) -> Self {
        Self {
            options,
            pair_discoverer: None,
        }
    }

    /// Installs a multi-field discovery hook; its constraints land in
    /// the document's `field_pairs` section.
    pub fn with_pair_discoverer(mut self, hook: Box<dyn PairDiscoverer>) -> Self {
        self.pair_discoverer = Some(hook);
        self
    }

    /// Discovers a constraint document for the dataset.
    ///
    /// Fields are profiled concurrently (one future per field); the
    /// document preserves the dataset's field order. Cancellation or a
    /// provider error aborts the run with no partial document.
    #[instrument(skip(self, source))]
    pub async fn discover(&self, source: &dyn DatasetSource) -> Result<ConstraintDocument> {
        let names = source.field_names().await?;
        info!(fields = names.len(), "starting discovery");

        let profiles = try_join_all(names.iter().map(|name| async move {
            self.options.cancel.check()?;
            source.profile(name, self.options.distinct_cap).await
        }))
        .await?;

        let mut fields = IndexMap::with_capacity(names.len());
        for profile in &profiles {
            let bundle = self.constraints_for(profile);
            debug!(
                field = %profile.field,
                constraints = bundle.iter().len(),
                "discovered field constraints"
            );
            fields.insert(profile.field.clone(), bundle);
        }

        let field_pairs = match &self.pair_discoverer {
            Some(hook) => hook.discover_pairs(source).await?,
            None => Vec::new(),
        };

        let document = ConstraintDocument {
            fields,
            field_pairs,
            extra: serde_json::Map::new(),
        };
        info!(
            constraints = document.constraint_count(),
            "discovery complete"
        );
        Ok(document)
    }

    /// Turns one column profile into its minimal informative bundle.
    fn constraints_for(&self, profile: &ColumnProfile) -> FieldConstraints {
        let mut bundle = FieldConstraints {
            field_type: profile.logical_type,
            ..Default::default()
        };

        // Null budget: a clean column pins the budget at zero; an
        // all-null column records its size; anything in between is
        // uninformative and emits nothing.
        if profile.total_count > 0 {
            if profile.null_count == 0 {
                bundle.max_nulls = Some(0);
            } else if profile.null_count == profile.total_count {
                bundle.max_nulls = Some(profile.total_count);
            }
        }

        if profile.non_null_count == 0 {
            return bundle;
        }

        match profile.logical_type {
            Some(t) if t.is_numeric() => {
                if let (Some(min), Some(max)) = (&profile.min_value, &profile.max_value) {
                    bundle.sign = sign_of(min.as_f64(), max.as_f64());
                    bundle.min = Some(Bound::closed(min.clone()));
                    bundle.max = Some(Bound::closed(max.clone()));
                }
            }
            Some(LogicalType::Date) => {
                if let (Some(min), Some(max)) = (&profile.min_value, &profile.max_value) {
                    bundle.min = Some(Bound::closed(min.clone()));
                    bundle.max = Some(Bound::closed(max.clone()));
                }
            }
            Some(LogicalType::String) => {
                bundle.min_length = profile.min_length;
                bundle.max_length = profile.max_length;
            }
            _ => {}
        }

        if self.options.discover_allowed_values {
            if let Some(distinct) = &profile.distinct_values {
                if !distinct.is_empty() {
                    bundle.allowed_values = Some(distinct.clone());
                }
            }
        }

        if profile.non_null_count >= 2 && profile.distinct_count == profile.non_null_count {
            bundle.no_duplicates = Some(true);
        }

        // Rex only runs over a complete distinct sample; a truncated
        // sample could induce patterns the unseen values fail.
        if self.options.discover_rex && profile.logical_type == Some(LogicalType::String) {
            if let Some(strings) = profile.distinct_strings() {
                let patterns = rex::induce(&strings, &self.options.rex);
                if !patterns.is_empty() {
                    bundle.rex = Some(patterns);
                }
            }
        }

        bundle
    }
}

/// The sign category pinned down by a numeric column's extrema, when it
/// is strictly more informative than the bounds alone.
fn sign_of(min: Option<f64>, max: Option<f64>) -> Option<SignCategory> {
    let (min, max) = (min?, max?);
    if min > 0.0 {
        Some(SignCategory::Positive)
    } else if max < 0.0 {
        Some(SignCategory::Negative)
    } else if min == 0.0 && max == 0.0 {
        Some(SignCategory::Zero)
    } else if min == 0.0 {
        Some(SignCategory::NonNegative)
    } else if max == 0.0 {
        Some(SignCategory::NonPositive)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FieldValue;

    fn profile(field: &str) -> ColumnProfile {
        ColumnProfile {
            field: field.to_string(),
            logical_type: None,
            total_count: 0,
            null_count: 0,
            non_null_count: 0,
            min_value: None,
            max_value: None,
            distinct_count: 0,
            distinct_values: None,
            min_length: None,
            max_length: None,
        }
    }

    fn int_profile(values: &[i64], nulls: u64) -> ColumnProfile {
        let mut distinct: Vec<i64> = Vec::new();
        for v in values {
            if !distinct.contains(v) {
                distinct.push(*v);
            }
        }
        ColumnProfile {
            logical_type: Some(LogicalType::Int),
            total_count: values.len() as u64 + nulls,
            null_count: nulls,
            non_null_count: values.len() as u64,
            min_value: values.iter().min().map(|v| FieldValue::Int(*v)),
            max_value: values.iter().max().map(|v| FieldValue::Int(*v)),
            distinct_count: distinct.len() as u64,
            distinct_values: Some(distinct.into_iter().map(FieldValue::Int).collect()),
            ..profile("x")
        }
    }

    #[test]
    fn test_clean_int_column() {
        let discoverer = Discoverer::default();
        let bundle = discoverer.constraints_for(&int_profile(&[20, 30, 40], 0));

        assert_eq!(bundle.field_type, Some(LogicalType::Int));
        assert_eq!(bundle.min, Some(Bound::closed(FieldValue::Int(20))));
        assert_eq!(bundle.max, Some(Bound::closed(FieldValue::Int(40))));
        assert_eq!(bundle.sign, Some(SignCategory::Positive));
        assert_eq!(bundle.max_nulls, Some(0));
        assert_eq!(bundle.no_duplicates, Some(true));
        assert_eq!(
            bundle.allowed_values,
            Some(vec![
                FieldValue::Int(20),
                FieldValue::Int(30),
                FieldValue::Int(40)
            ])
        );
    }

    #[test]
    fn test_duplicates_suppress_no_duplicates() {
        let discoverer = Discoverer::default();
        let bundle = discoverer.constraints_for(&int_profile(&[1, 1, 2], 0));
        assert_eq!(bundle.no_duplicates, None);
        assert_eq!(
            bundle.allowed_values,
            Some(vec![FieldValue::Int(1), FieldValue::Int(2)])
        );
    }

    #[test]
    fn test_partial_nulls_emit_no_budget() {
        let discoverer = Discoverer::default();
        let bundle = discoverer.constraints_for(&int_profile(&[1, 2], 1));
        assert_eq!(bundle.max_nulls, None);
    }

    #[test]
    fn test_all_null_column() {
        let discoverer = Discoverer::default();
        let p = ColumnProfile {
            logical_type: Some(LogicalType::Int),
            total_count: 3,
            null_count: 3,
            ..profile("empty")
        };
        let bundle = discoverer.constraints_for(&p);
        assert_eq!(bundle.max_nulls, Some(3));
        assert!(bundle.min.is_none());
        assert!(bundle.max.is_none());
        assert!(bundle.sign.is_none());
        assert!(bundle.allowed_values.is_none());
    }

    #[test]
    fn test_empty_dataset_emits_type_only() {
        let discoverer = Discoverer::default();
        let p = ColumnProfile {
            logical_type: Some(LogicalType::Real),
            ..profile("x")
        };
        let bundle = discoverer.constraints_for(&p);
        assert_eq!(bundle.field_type, Some(LogicalType::Real));
        assert_eq!(bundle.iter().len(), 1);
    }

    #[test]
    fn test_constant_numeric_field() {
        let discoverer = Discoverer::default();
        let bundle = discoverer.constraints_for(&int_profile(&[7, 7, 7], 0));
        assert_eq!(bundle.min, bundle.max);
        assert_eq!(bundle.allowed_values, Some(vec![FieldValue::Int(7)]));
        assert_eq!(bundle.no_duplicates, None);
    }

    #[test]
    fn test_sign_categories() {
        assert_eq!(sign_of(Some(1.0), Some(5.0)), Some(SignCategory::Positive));
        assert_eq!(
            sign_of(Some(0.0), Some(5.0)),
            Some(SignCategory::NonNegative)
        );
        assert_eq!(sign_of(Some(0.0), Some(0.0)), Some(SignCategory::Zero));
        assert_eq!(
            sign_of(Some(-5.0), Some(0.0)),
            Some(SignCategory::NonPositive)
        );
        assert_eq!(sign_of(Some(-5.0), Some(-1.0)), Some(SignCategory::Negative));
        assert_eq!(sign_of(Some(-1.0), Some(1.0)), None);
    }

    #[test]
    fn test_string_profile_gets_lengths_and_rex() {
        let discoverer = Discoverer::default();
        let p = ColumnProfile {
            logical_type: Some(LogicalType::String),
            total_count: 3,
            null_count: 0,
            non_null_count: 3,
            distinct_count: 3,
            distinct_values: Some(vec![
                FieldValue::Str("AB-01".to_string()),
                FieldValue::Str("AB-02".to_string()),
                FieldValue::Str("AB-17".to_string()),
            ]),
            min_length: Some(5),
            max_length: Some(5),
            ..profile("code")
        };
        let bundle = discoverer.constraints_for(&p);
        assert_eq!(bundle.min_length, Some(5));
        assert_eq!(bundle.max_length, Some(5));
        assert_eq!(bundle.rex, Some(vec!["^[A-Z]{2}-[0-9]{2}$".to_string()]));
    }

    #[test]
    fn test_truncated_sample_suppresses_values_and_rex() {
        let discoverer = Discoverer::default();
        let p = ColumnProfile {
            logical_type: Some(LogicalType::String),
            total_count: 100,
            null_count: 0,
            non_null_count: 100,
            distinct_count: 90,
            distinct_values: None,
            min_length: Some(1),
            max_length: Some(12),
            ..profile("name")
        };
        let bundle = discoverer.constraints_for(&p);
        assert!(bundle.allowed_values.is_none());
        assert!(bundle.rex.is_none());
        assert_eq!(bundle.min_length, Some(1));
    }
}
