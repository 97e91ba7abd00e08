//! Convenient re-exports of the types most programs need.

pub use crate::core::{
    Bound, CancelToken, ConstraintDocument, ConstraintKind, FieldConstraint, FieldConstraints,
    FieldValue, LogicalType, PairConstraint, PairOp, Precision, SignCategory, TypeChecking,
};
pub use crate::detect::{DetectPolicy, DetectionResult, Detector};
pub use crate::discover::{DiscoverOptions, Discoverer, PairDiscoverer, RexOptions};
pub use crate::error::{Result, VeracityError};
pub use crate::source::{ColumnProfile, DataFusionSource, DatasetSource};
pub use crate::verify::{
    Outcome, ReasonCode, ReportMode, VerificationReport, Verifier, VerifyPolicy,
};
