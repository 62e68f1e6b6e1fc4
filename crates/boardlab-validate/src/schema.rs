//! Structural schema stage.

use crate::diagnostic::Diagnostic;
use crate::document::ConfigDocument;
use jsonschema::error::ValidationErrorKind;
use log::error;
use serde_json::{json, Value};

/// JSON schema of the project configuration document: four required
/// fields, two optional ones, nothing else.
pub fn document_schema() -> Value {
    json!({
        "title": "BoardLab project configuration",
        "type": "object",
        "properties": {
            "schemaVersion": {
                "description": "Version of this file schema.",
                "type": "string",
                "const": "0.0.1"
            },
            "cliVersion": {
                "description": "Toolchain release this project is pinned to.",
                "type": "string"
            },
            "board": {
                "description": "Fully qualified board name (FQBN).",
                "type": "string"
            },
            "port": {
                "description": "Serial port for connecting to the device.",
                "type": "string"
            },
            "alias": {
                "description": "Alias for the project and board.",
                "type": "string"
            },
            "additionalUrls": {
                "type": "array",
                "items": { "type": "string" },
                "minItems": 1
            }
        },
        "additionalProperties": false,
        "required": ["schemaVersion", "cliVersion", "board", "port"]
    })
}

/// Checks the document against [`document_schema`], one positioned `E005`
/// per violation.
pub fn check(doc: &ConfigDocument, source: &str) -> Vec<Diagnostic> {
    let schema = document_schema();
    let validator = match jsonschema::validator_for(&schema) {
        Ok(validator) => validator,
        Err(err) => {
            // The schema is a compile-time constant; this cannot happen
            // outside a broken build.
            error!("document schema failed to compile: {}", err);
            return Vec::new();
        }
    };

    let mut diagnostics = Vec::new();
    for violation in validator.iter_errors(doc.root()) {
        match &violation.kind {
            ValidationErrorKind::Required { property } => {
                let name = property.as_str().unwrap_or_default();
                diagnostics.push(Diagnostic::invalid_content(
                    source,
                    doc.root_range(),
                    format!("Missing property \"{}\".", name),
                ));
            }
            ValidationErrorKind::AdditionalProperties { unexpected } => {
                for property in unexpected {
                    let range = doc
                        .key_range(property)
                        .unwrap_or_else(|| doc.root_range());
                    diagnostics.push(Diagnostic::invalid_content(
                        source,
                        range,
                        format!("Property \"{}\" is not allowed.", property),
                    ));
                }
            }
            _ => {
                let path = violation.instance_path.to_string();
                let field = path.split('/').nth(1).unwrap_or("").to_string();
                diagnostics.push(Diagnostic::invalid_content(
                    source,
                    doc.value_range_or_root(&field),
                    violation.to_string(),
                ));
            }
        }
    }

    diagnostics
}
