//! Core types: scalar values, the constraint hierarchy, the constraints
//! document and cooperative cancellation.

pub mod cancel;
pub mod constraint;
pub mod document;
pub mod value;

pub use cancel::CancelToken;
pub use constraint::{
    anchored, compile_anchored_set, ConstraintKind, FieldConstraint, FieldConstraints,
    PairConstraint, PairOp, SignCategory,
};
pub use document::ConstraintDocument;
pub use value::{Bound, FieldValue, LogicalType, Precision, TypeChecking, FUZZY_EPSILON};
