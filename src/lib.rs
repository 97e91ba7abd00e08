//! # Veracity: test-driven data analysis for tabular datasets
//!
//! Veracity discovers the constraints a dataset currently satisfies,
//! verifies datasets against previously saved constraint documents, and
//! marks the individual records that break them. It executes column
//! reductions through DataFusion and works with any tabular data you can
//! register there.
//!
//! ## The three operations
//!
//! - **Discover**: profile every column and emit the minimal informative
//!   constraint set (logical type, bounds, sign, length bounds, null
//!   budget, uniqueness, allowed values and induced regular expressions)
//!   as a portable JSON document.
//! - **Verify**: evaluate a document against a dataset, producing a
//!   structured report with one pass/fail outcome per (field,
//!   constraint) and the first counterexample for each failure.
//! - **Detect**: evaluate the document row by row, producing an Arrow
//!   record batch of the offending records annotated with `n_failures`
//!   and, optionally, one boolean column per constraint.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use datafusion::prelude::*;
//! use veracity::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> veracity::error::Result<()> {
//!     let ctx = SessionContext::new();
//!     ctx.register_csv("data", "example.csv", CsvReadOptions::new()).await?;
//!     let source = DataFusionSource::new(ctx, "data");
//!
//!     // Discover constraints the data currently satisfies.
//!     let document = Discoverer::default().discover(&source).await?;
//!     document.save("constraints.json")?;
//!
//!     // Later: verify fresh data against the saved document.
//!     let report = Verifier::default().verify(&source, &document).await?;
//!     for (field, check) in report.failed_checks() {
//!         println!("{field}: {} failed ({:?})", check.kind, check.reason);
//!     }
//!
//!     // Mark the offending records.
//!     let policy = DetectPolicy { per_constraint: true, ..Default::default() };
//!     let anomalies = Detector::new(policy).detect(&source, &document).await?;
//!     println!("{} failing records", anomalies.n_failing_records);
//!     Ok(())
//! }
//! ```
//!
//! ## Policies, not ambient state
//!
//! Numeric fuzz (`epsilon`), the `int`/`real` typing mode, the distinct
//! cap and the regex alternation cap are all explicit policy values on
//! [`verify::VerifyPolicy`], [`detect::DetectPolicy`] and
//! [`discover::DiscoverOptions`]. Two verifications of the same data
//! with the same policy always agree.
//!
//! ## Architecture
//!
//! - [`core`]: scalar values, the constraint kind hierarchy, the JSON
//!   constraints document and cooperative cancellation
//! - [`source`]: the dataset capability trait and the DataFusion-backed
//!   reference provider
//! - [`discover`]: per-field discovery rules and the regex inducer
//! - [`verify`]: per-column constraint evaluation and the report tree
//! - [`detect`]: row-level evaluation and the annotated output batch
//!
//! Constraint documents are immutable once discovered and safe to share;
//! discovery and verification profile fields concurrently, detection
//! streams rows in input order.

pub mod core;
pub mod detect;
pub mod discover;
pub mod error;
pub mod prelude;
pub mod source;
pub mod verify;
