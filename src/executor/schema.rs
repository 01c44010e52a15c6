// Argument validation against a ToolDefinition, done once at dispatch

use super::types::ToolDefinition;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("arguments must be a JSON object")]
    NotAnObject,

    #[error("missing required parameter '{0}'")]
    MissingRequired(String),

    #[error("parameter '{param}' must be of type {expected}")]
    WrongType {
        param: String,
        expected: &'static str,
    },

    #[error("parameter '{param}' must be one of [{allowed}], got '{value}'")]
    NotInEnum {
        param: String,
        value: String,
        allowed: String,
    },

    #[error("{0}")]
    Malformed(String),
}

/// Check `input` against the declared parameters.
///
/// `null` is accepted as an empty object. Unknown parameters are ignored;
/// models routinely add extra keys.
pub fn validate(def: &ToolDefinition, input: &Value) -> Result<(), ValidationError> {
    let empty = serde_json::Map::new();
    let args = match input {
        Value::Object(map) => map,
        Value::Null => &empty,
        _ => return Err(ValidationError::NotAnObject),
    };

    for param in &def.parameters {
        let value = match args.get(&param.name) {
            None | Some(Value::Null) => {
                if param.required {
                    return Err(ValidationError::MissingRequired(param.name.clone()));
                }
                continue;
            }
            Some(v) => v,
        };

        if !param.kind.matches(value) {
            return Err(ValidationError::WrongType {
                param: param.name.clone(),
                expected: param.kind.as_str(),
            });
        }

        if let (Some(items), Some(arr)) = (param.items, value.as_array()) {
            if arr.iter().any(|item| !items.matches(item)) {
                return Err(ValidationError::WrongType {
                    param: format!("{}[]", param.name),
                    expected: items.as_str(),
                });
            }
        }

        if !param.enum_values.is_empty() {
            let as_text = value
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| value.to_string());
            if !param.enum_values.contains(&as_text) {
                return Err(ValidationError::NotInEnum {
                    param: param.name.clone(),
                    value: as_text,
                    allowed: param.enum_values.join(", "),
                });
            }
        }
    }

    Ok(())
}

/// Deserialize validated arguments into a handler's typed input
pub fn parse<T: DeserializeOwned>(input: Value) -> Result<T, ValidationError> {
    let input = if input.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        input
    };
    serde_json::from_value(input).map_err(|e| ValidationError::Malformed(e.to_string()))
}
