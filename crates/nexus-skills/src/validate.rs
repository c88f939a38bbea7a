// SPDX-License-Identifier: MIT OR Apache-2.0
//! Declarative input validation against each skill's JSON-schema fragment.
//!
//! Validation accumulates every violation instead of failing on the first,
//! so a caller fixing a rejected request sees the whole picture at once.

use serde_json::Value;

/// Validate `input` against a skill's schema, returning all violations.
///
/// The returned strings are human-readable and name the offending field
/// via its instance path.  An empty `Ok(())` means the input may be handed
/// to the skill.
pub fn validate_input(schema: &Value, input: &Value) -> Result<(), Vec<String>> {
    let validator = match jsonschema::validator_for(schema) {
        Ok(validator) => validator,
        // A malformed schema is a programming error in the skill itself;
        // surface it as a validation failure rather than panicking.
        Err(e) => return Err(vec![format!("skill schema is invalid: {e}")]),
    };

    let violations: Vec<String> = validator
        .iter_errors(input)
        .map(|error| {
            let path = error.instance_path.to_string();
            if path.is_empty() {
                error.to_string()
            } else {
                format!("{path}: {error}")
            }
        })
        .collect();

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lesson_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "repository": { "type": "string" },
                "category": {
                    "type": "string",
                    "enum": ["performance", "security", "reliability", "cost", "observability", "deployment"],
                },
                "lesson": { "type": "string" },
                "context": { "type": "string" },
            },
            "required": ["repository", "category", "lesson", "context"],
        })
    }

    #[test]
    fn valid_input_passes() {
        let input = json!({
            "repository": "a/b",
            "category": "security",
            "lesson": "rotate tokens",
            "context": "incident 42",
        });
        assert!(validate_input(&lesson_schema(), &input).is_ok());
    }

    #[test]
    fn all_violations_are_accumulated() {
        // Missing `lesson` and `context`; `category` not in the enum.
        let input = json!({ "repository": "a/b", "category": "unknown" });
        let violations = validate_input(&lesson_schema(), &input).unwrap_err();

        assert!(violations.len() >= 3, "got {violations:?}");
        assert!(violations.iter().any(|v| v.contains("lesson")));
        assert!(violations.iter().any(|v| v.contains("context")));
        assert!(violations.iter().any(|v| v.contains("unknown")));
    }

    #[test]
    fn wrong_type_names_the_field() {
        let input = json!({
            "repository": 7,
            "category": "security",
            "lesson": "x",
            "context": "y",
        });
        let violations = validate_input(&lesson_schema(), &input).unwrap_err();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("/repository"));
    }

    #[test]
    fn non_object_input_rejected() {
        let violations = validate_input(&lesson_schema(), &json!([1, 2])).unwrap_err();
        assert!(!violations.is_empty());
    }

    #[test]
    fn unknown_extra_fields_are_tolerated() {
        let input = json!({
            "repository": "a/b",
            "category": "cost",
            "lesson": "x",
            "context": "y",
            "annotations": { "source": "ci" },
        });
        assert!(validate_input(&lesson_schema(), &input).is_ok());
    }
}
