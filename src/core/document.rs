//! The constraints document: the portable JSON form of a dataset's
//! constraint set.
//!
//! A document maps field names (in dataset order) to constraint bundles,
//! with an optional `field_pairs` section for multi-field constraints.
//! Unknown keys, top-level or inside a field bundle, survive a
//! load/save round trip verbatim. Documents are immutable once
//! discovered; the verifier and detector take them by shared reference.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::core::constraint::{
    compile_anchored_set, FieldConstraints, PairConstraint,
};
use crate::core::value::{FieldValue, LogicalType};
use crate::error::{Result, VeracityError};

/// A complete constraints document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstraintDocument {
    /// Per-field constraint bundles, in dataset field order.
    pub fields: IndexMap<String, FieldConstraints>,
    /// Multi-field constraints, evaluated in list order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub field_pairs: Vec<PairConstraint>,
    /// Unknown top-level keys, preserved verbatim on re-save.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ConstraintDocument {
    /// Parses a document from JSON text and validates its invariants.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let doc: ConstraintDocument = serde_json::from_str(json)
            .map_err(|e| VeracityError::invalid_document(e.to_string()))?;
        doc.validate()?;
        Ok(doc)
    }

    /// Serialises the document to pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Loads and validates a document from a file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Writes the document to a file as pretty-printed JSON.
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }

    /// Total number of field constraints across all bundles.
    pub fn constraint_count(&self) -> usize {
        self.fields.values().map(|b| b.iter().len()).sum::<usize>() + self.field_pairs.len()
    }

    /// Checks the document invariants, returning `InvalidDocument` on the
    /// first violation:
    ///
    /// 1. constraints must be compatible with the field's declared type;
    /// 2. `min <= max` when both are present and comparable;
    /// 3. `rex` patterns must compile;
    /// 4. when both are present, every allowed string value must match
    ///    at least one rex pattern.
    pub fn validate(&self) -> Result<()> {
        for (field, bundle) in &self.fields {
            validate_bundle(field, bundle)?;
        }
        for pair in &self.field_pairs {
            if pair.left == pair.right {
                return Err(VeracityError::invalid_document(format!(
                    "field pair compares '{}' with itself",
                    pair.left
                )));
            }
        }
        Ok(())
    }
}

fn validate_bundle(field: &str, bundle: &FieldConstraints) -> Result<()> {
    if let Some(t) = bundle.field_type {
        let string_only: [(&str, bool); 3] = [
            ("min_length", bundle.min_length.is_some()),
            ("max_length", bundle.max_length.is_some()),
            ("rex", bundle.rex.is_some()),
        ];
        for (name, present) in string_only {
            if present && t != LogicalType::String {
                return Err(VeracityError::invalid_document(format!(
                    "field '{field}': '{name}' requires type string, not {t}"
                )));
            }
        }
        if bundle.sign.is_some() && !t.is_numeric() {
            return Err(VeracityError::invalid_document(format!(
                "field '{field}': 'sign' requires a numeric type, not {t}"
            )));
        }
    }

    if let (Some(min), Some(max)) = (&bundle.min, &bundle.max) {
        if let Some(ord) = min.value.partial_cmp_loose(&max.value) {
            if ord == std::cmp::Ordering::Greater {
                return Err(VeracityError::invalid_document(format!(
                    "field '{field}': min {} exceeds max {}",
                    min.value, max.value
                )));
            }
        }
    }

    if let (Some(min_len), Some(max_len)) = (bundle.min_length, bundle.max_length) {
        if min_len > max_len {
            return Err(VeracityError::invalid_document(format!(
                "field '{field}': min_length {min_len} exceeds max_length {max_len}"
            )));
        }
    }

    if let Some(patterns) = &bundle.rex {
        let set = compile_anchored_set(patterns)
            .map_err(|e| VeracityError::invalid_document(format!("field '{field}': {e}")))?;
        if let Some(values) = &bundle.allowed_values {
            for value in values {
                if let FieldValue::Str(s) = value {
                    if !set.is_match(s) {
                        return Err(VeracityError::invalid_document(format!(
                            "field '{field}': allowed value '{s}' matches no rex pattern"
                        )));
                    }
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::Bound;

    fn int_bundle(min: i64, max: i64) -> FieldConstraints {
        FieldConstraints {
            field_type: Some(LogicalType::Int),
            min: Some(Bound::closed(FieldValue::Int(min))),
            max: Some(Bound::closed(FieldValue::Int(max))),
            ..Default::default()
        }
    }

    #[test]
    fn test_round_trip_preserves_field_order() {
        let mut doc = ConstraintDocument::default();
        doc.fields.insert("zeta".to_string(), int_bundle(0, 1));
        doc.fields.insert("alpha".to_string(), int_bundle(2, 3));

        let json = doc.to_json_string().unwrap();
        let back = ConstraintDocument::from_json_str(&json).unwrap();
        assert_eq!(doc, back);
        let order: Vec<&String> = back.fields.keys().collect();
        assert_eq!(order, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_unknown_keys_preserved() {
        let json = r#"{
            "creation_metadata": {"source": "nightly run"},
            "fields": {
                "age": {"type": "int", "min": 0, "vendor_hint": "x"}
            }
        }"#;
        let doc = ConstraintDocument::from_json_str(json).unwrap();
        assert!(doc.extra.contains_key("creation_metadata"));
        assert!(doc.fields["age"].extra.contains_key("vendor_hint"));

        let saved = doc.to_json_string().unwrap();
        let back = ConstraintDocument::from_json_str(&saved).unwrap();
        assert_eq!(doc, back);
    }

    #[test]
    fn test_min_above_max_is_fatal() {
        let mut doc = ConstraintDocument::default();
        doc.fields.insert("x".to_string(), int_bundle(10, 5));
        assert!(matches!(
            doc.validate(),
            Err(VeracityError::InvalidDocument(_))
        ));
    }

    #[test]
    fn test_sign_on_string_is_fatal() {
        let json = r#"{"fields": {"name": {"type": "string", "sign": "positive"}}}"#;
        assert!(matches!(
            ConstraintDocument::from_json_str(json),
            Err(VeracityError::InvalidDocument(_))
        ));
    }

    #[test]
    fn test_length_on_int_is_fatal() {
        let json = r#"{"fields": {"age": {"type": "int", "min_length": 2}}}"#;
        assert!(ConstraintDocument::from_json_str(json).is_err());
    }

    #[test]
    fn test_allowed_values_must_match_rex() {
        let json = r#"{"fields": {"code": {
            "type": "string",
            "allowed_values": ["AB-01", "nope"],
            "rex": ["[A-Z]{2}-[0-9]{2}"]
        }}}"#;
        let err = ConstraintDocument::from_json_str(json).unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_bad_rex_is_fatal() {
        let json = r#"{"fields": {"code": {"type": "string", "rex": ["[unclosed"]}}}"#;
        assert!(ConstraintDocument::from_json_str(json).is_err());
    }

    #[test]
    fn test_self_referential_pair_is_fatal() {
        let json = r#"{"fields": {}, "field_pairs": [{"left": "a", "op": "lt", "right": "a"}]}"#;
        assert!(ConstraintDocument::from_json_str(json).is_err());
    }

    #[test]
    fn test_malformed_json_is_fatal() {
        assert!(ConstraintDocument::from_json_str("{\"fields\": [").is_err());
    }
}
