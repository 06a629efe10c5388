use crate::error::{Result, WeaveError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How composite keys are built while flattening
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlattenOptions {
    /// Placed between a parent key and a child key
    pub separator: String,
    /// Placed after every child key
    pub suffix: String,
}

impl Default for FlattenOptions {
    fn default() -> Self {
        Self {
            separator: ".".to_string(),
            suffix: String::new(),
        }
    }
}

impl FlattenOptions {
    /// Bracketed keys: `a[b][0]`
    pub fn brackets() -> Self {
        Self {
            separator: "[".to_string(),
            suffix: "]".to_string(),
        }
    }
}

/// Flattens one record, or an array of records, into a single-level mapping.
///
/// Nested objects and arrays are walked recursively; arrays use their
/// indices as child keys. Empty containers contribute no keys. When records
/// share a key the later record wins.
///
/// # Errors
///
/// Returns `WeaveError::InvalidInput` if the input or any record is not an object.
pub fn flatten(records: &Value, options: &FlattenOptions) -> Result<Map<String, Value>> {
    let mut result = Map::new();

    match records {
        Value::Object(record) => flatten_record(record, options, &mut result),
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                let Value::Object(record) = item else {
                    return Err(WeaveError::invalid_input(format!(
                        "record {index} must be an object"
                    )));
                };
                flatten_record(record, options, &mut result);
            }
        }
        _ => {
            return Err(WeaveError::invalid_input(
                "expected an object or an array of objects",
            ));
        }
    }

    Ok(result)
}

fn flatten_record(
    record: &Map<String, Value>,
    options: &FlattenOptions,
    out: &mut Map<String, Value>,
) {
    for (key, value) in record {
        flatten_value(key.clone(), value, options, out);
    }
}

fn flatten_value(
    key: String,
    value: &Value,
    options: &FlattenOptions,
    out: &mut Map<String, Value>,
) {
    match value {
        Value::Object(map) => {
            for (child, nested) in map {
                flatten_value(compose(&key, child, options), nested, options, out);
            }
        }
        Value::Array(items) => {
            for (index, nested) in items.iter().enumerate() {
                flatten_value(compose(&key, &index.to_string(), options), nested, options, out);
            }
        }
        scalar => {
            out.insert(key, scalar.clone());
        }
    }
}

fn compose(parent: &str, child: &str, options: &FlattenOptions) -> String {
    format!("{parent}{}{child}{}", options.separator, options.suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_default_separator() {
        let flat =
            flatten(&json!([{ "a": { "b": 1, "c": 2 } }]), &FlattenOptions::default()).unwrap();
        assert_eq!(Value::Object(flat), json!({ "a.b": 1, "a.c": 2 }));
    }

    #[test]
    fn test_flatten_deep_and_arrays() {
        let flat = flatten(
            &json!({ "site": { "nav": ["home", { "label": "About" }], "name": "Docs" }, "n": 3 }),
            &FlattenOptions::default(),
        )
        .unwrap();
        assert_eq!(
            Value::Object(flat),
            json!({
                "site.nav.0": "home",
                "site.nav.1.label": "About",
                "site.name": "Docs",
                "n": 3
            })
        );
    }

    #[test]
    fn test_flatten_brackets() {
        let flat = flatten(
            &json!({ "a": { "b": { "c": true } }, "l": [null] }),
            &FlattenOptions::brackets(),
        )
        .unwrap();
        assert_eq!(Value::Object(flat), json!({ "a[b][c]": true, "l[0]": null }));
    }

    #[test]
    fn test_flatten_custom_separator_and_suffix() {
        let options = FlattenOptions {
            separator: "__".to_string(),
            suffix: "!".to_string(),
        };
        let flat = flatten(&json!({ "a": { "b": "x" } }), &options).unwrap();
        assert_eq!(Value::Object(flat), json!({ "a__b!": "x" }));
    }

    #[test]
    fn test_empty_containers_emit_nothing() {
        let flat = flatten(
            &json!({ "empty_obj": {}, "empty_list": [], "nested": { "inner": {} }, "kept": "" }),
            &FlattenOptions::default(),
        )
        .unwrap();
        assert_eq!(Value::Object(flat), json!({ "kept": "" }));
    }

    #[test]
    fn test_later_records_win() {
        let flat = flatten(
            &json!([{ "a": { "b": 1 }, "x": "first" }, { "a": { "b": 2 } }]),
            &FlattenOptions::default(),
        )
        .unwrap();
        assert_eq!(Value::Object(flat), json!({ "a.b": 2, "x": "first" }));
    }

    #[test]
    fn test_flatten_rejects_non_records() {
        assert!(matches!(
            flatten(&json!("text"), &FlattenOptions::default()),
            Err(WeaveError::InvalidInput { .. })
        ));
        assert!(matches!(
            flatten(&json!([{ "a": 1 }, 5]), &FlattenOptions::default()),
            Err(WeaveError::InvalidInput { .. })
        ));
        assert!(flatten(&json!([]), &FlattenOptions::default()).unwrap().is_empty());
    }
}
