#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **config-schema** – wraps a JSON Schema engine behind the narrow contract
//! the replicated configuration engine needs: given a schema document and a
//! candidate document, accept or return a structured rejection.
//!
//! The validator is pure — no I/O, no clock — so it is safe to call again
//! inside the deterministic apply path as a defence-in-depth check, not only
//! on the write pipeline's preflight path.

use std::fmt;

use jsonschema::Validator;
use thiserror::Error;

/// Errors produced while validating a document against a schema.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// The schema document itself is not a valid JSON Schema.
    #[error("schema parse error: {0}")]
    SchemaParseError(String),

    /// The candidate document is not valid JSON.
    #[error("document parse error: {0}")]
    DocumentParseError(String),

    /// The document fails a schema constraint.
    #[error("schema violation at {path}: {message}")]
    SchemaViolation {
        /// JSON pointer to the offending location.
        path: String,
        /// Human-readable constraint violation message.
        message: String,
    },
}

impl SchemaError {
    /// The JSON pointer path of the violation, when this is a [`SchemaError::SchemaViolation`].
    pub fn path(&self) -> Option<&str> {
        match self {
            SchemaError::SchemaViolation { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Compiles a JSON Schema document once and validates candidate documents
/// against it repeatedly.
pub struct SchemaValidator {
    validator: Validator,
}

impl fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaValidator").finish_non_exhaustive()
    }
}

impl SchemaValidator {
    /// Compile a schema document. Fails with [`SchemaError::SchemaParseError`]
    /// if the document is not a valid JSON Schema.
    pub fn compile(schema: &serde_json::Value) -> Result<Self, SchemaError> {
        let validator = jsonschema::options()
            .build(schema)
            .map_err(|e| SchemaError::SchemaParseError(e.to_string()))?;
        Ok(Self { validator })
    }

    /// Validate a document, returning the first constraint violation found.
    pub fn validate(&self, document: &serde_json::Value) -> Result<(), SchemaError> {
        match self.validator.iter_errors(document).next() {
            None => Ok(()),
            Some(error) => Err(SchemaError::SchemaViolation {
                path: error.instance_path().to_string(),
                message: error.to_string(),
            }),
        }
    }
}

/// Convenience one-shot entry point: compile `schema` and validate `document`
/// against it in a single call. Prefer [`SchemaValidator::compile`] directly
/// when validating many documents against the same schema.
pub fn validate(
    schema: &serde_json::Value,
    document: &serde_json::Value,
) -> Result<(), SchemaError> {
    SchemaValidator::compile(schema)?.validate(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bool_schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": { "enabled": { "type": "boolean" } },
            "required": ["enabled"]
        })
    }

    #[test]
    fn accepts_conforming_document() {
        let validator = SchemaValidator::compile(&bool_schema()).unwrap();
        assert!(validator.validate(&json!({"enabled": true})).is_ok());
    }

    #[test]
    fn rejects_nonconforming_document_with_violation() {
        let validator = SchemaValidator::compile(&bool_schema()).unwrap();
        let err = validator.validate(&json!({"enabled": "yes"})).unwrap_err();
        assert!(matches!(err, SchemaError::SchemaViolation { .. }));
    }

    #[test]
    fn rejects_missing_required_property() {
        let validator = SchemaValidator::compile(&bool_schema()).unwrap();
        assert!(validator.validate(&json!({})).is_err());
    }

    #[test]
    fn rejects_invalid_schema_document() {
        let bad_schema = json!({"type": "not-a-real-type"});
        assert!(matches!(
            SchemaValidator::compile(&bad_schema),
            Err(SchemaError::SchemaParseError(_))
        ));
    }

    #[test]
    fn one_shot_validate_matches_compiled_validator() {
        assert!(validate(&bool_schema(), &json!({"enabled": false})).is_ok());
        assert!(validate(&bool_schema(), &json!({"enabled": 1})).is_err());
    }
}
