//! Schema validation helpers.
//!
//! Validates a `serde_json::Value` configuration against a [`Schema`] and
//! reports problems as [`Diagnostic`]s.
//!
//! # Example
//!
//! ```
//! use hemmer_provider_pagerduty::schema::{Attribute, Schema};
//! use hemmer_provider_pagerduty::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("team_id", Attribute::required_string())
//!     .with_attribute("create_timeout_secs", Attribute::optional_int64());
//!
//! assert!(validate(&schema, &json!({"team_id": "PQ9K7I8"})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"create_timeout_secs": "soon"}));
//! assert_eq!(diagnostics.len(), 2);
//! ```

use crate::schema::{Attribute, AttributeType, Diagnostic, Schema};
use serde_json::Value;

/// Validate a JSON object against a schema.
///
/// - Required attributes must be present and non-null
/// - Optional attributes may be absent or null
/// - Computed-only attributes may not be set
/// - Attribute types must match the schema
/// - Attributes the schema does not know are rejected
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let obj = match value {
        Value::Object(map) => map,
        Value::Null => {
            // An absent config block is checked like an empty one.
            for (name, attr) in &schema.attributes {
                validate_attribute(name, attr, None, &mut diagnostics);
            }
            return diagnostics;
        },
        _ => {
            diagnostics.push(
                Diagnostic::error("Expected object")
                    .with_detail(format!("Got {}", value_type_name(value))),
            );
            return diagnostics;
        },
    };

    for (name, attr) in &schema.attributes {
        validate_attribute(name, attr, obj.get(name), &mut diagnostics);
    }

    for name in obj.keys() {
        if !schema.attributes.contains_key(name) {
            diagnostics.push(
                Diagnostic::error(format!("Unsupported attribute '{}'", name))
                    .with_attribute(name.as_str()),
            );
        }
    }

    diagnostics
}

fn validate_attribute(
    name: &str,
    attr: &Attribute,
    value: Option<&Value>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let computed_only = attr.flags.computed && !attr.flags.optional && !attr.flags.required;

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", name))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(name),
                );
            }
        },
        Some(_) if computed_only => {
            diagnostics.push(
                Diagnostic::error(format!("Attribute '{}' cannot be set", name))
                    .with_detail("This attribute is computed by the provider")
                    .with_attribute(name),
            );
        },
        Some(v) => validate_type(&attr.attr_type, v, name, diagnostics),
    }
}

fn validate_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match attr_type {
        AttributeType::String => {
            if !value.is_string() {
                diagnostics.push(type_error(path, "string", value));
            }
        },
        AttributeType::Int64 => {
            if value.as_i64().is_none() {
                diagnostics.push(type_error(path, "int64", value));
            }
        },
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic::error(format!("Invalid type for attribute '{}'", path))
        .with_detail(format!("Expected {}, got {}", expected, value_type_name(got)))
        .with_attribute(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::LinkKind;
    use crate::schema::Attribute;
    use serde_json::json;

    fn membership_schema() -> Schema {
        LinkKind::TeamMembership.schema()
    }

    #[test]
    fn test_valid_membership_config() {
        let diagnostics = validate(
            &membership_schema(),
            &json!({"user_id": "user_123", "team_id": "team_456"}),
        );
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    }

    #[test]
    fn test_missing_required() {
        let diagnostics = validate(&membership_schema(), &json!({"user_id": "user_123"}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("team_id".to_string()));
        assert!(diagnostics[0].summary.contains("Missing required"));

        let diagnostics = validate(
            &membership_schema(),
            &json!({"user_id": "user_123", "team_id": null}),
        );
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_computed_attribute_cannot_be_set() {
        let diagnostics = validate(
            &membership_schema(),
            &json!({"id": "x:y", "user_id": "x", "team_id": "y"}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("id".to_string()));
    }

    #[test]
    fn test_wrong_type() {
        let diagnostics = validate(
            &membership_schema(),
            &json!({"user_id": 123, "team_id": "team_456"}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].detail,
            Some("Expected string, got number".to_string())
        );
    }

    #[test]
    fn test_unsupported_attribute() {
        let diagnostics = validate(
            &membership_schema(),
            &json!({"user_id": "u", "team_id": "t", "role": "manager"}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Unsupported attribute 'role'"));
    }

    #[test]
    fn test_int64() {
        let schema = Schema::v0().with_attribute("timeout", Attribute::optional_int64());

        assert!(validate(&schema, &json!({"timeout": 30})).is_empty());
        assert!(validate(&schema, &json!({"timeout": null})).is_empty());

        let diagnostics = validate(&schema, &json!({"timeout": 1.5}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("timeout".to_string()));
        assert_eq!(
            diagnostics[0].detail,
            Some("Expected int64, got number".to_string())
        );
    }

    #[test]
    fn test_null_config_treated_as_empty() {
        assert!(validate(&Schema::v0(), &Value::Null).is_empty());
        assert_eq!(validate(&membership_schema(), &Value::Null).len(), 2);
    }

    #[test]
    fn test_root_not_object() {
        let diagnostics = validate(&membership_schema(), &json!("user_123:team_456"));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Expected object");
        assert_eq!(validate(&membership_schema(), &json!([])).len(), 1);
    }
}
