//! Variable placeholder substitution.
//!
//! A placeholder is replaced by the value its key names. Lookup tries the key
//! verbatim first, then as a dotted path into nested objects and arrays
//! (`{{ site.nav.0 }}`). Strings, numbers and booleans render as text; null,
//! objects, arrays and absent keys leave the placeholder untouched.
//!
//! A string value that itself contains placeholders is substituted once more
//! with the same mapping. That second pass inserts its values literally, so
//! a self-referencing `x = "{{x}}"` renders as `{{x}}`.

use crate::config::{MissingVariablePolicy, Syntax};
use crate::lexer::{Token, tokenize};
use serde_json::{Map, Value};
use std::borrow::Cow;

/// Total substitution passes: the template plus one level of indirection
pub const MAX_SUBSTITUTION_DEPTH: usize = 2;

/// Outcome of a substitution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substituted {
    pub text: String,
    /// Keys left unresolved, in order of appearance
    pub missing: Vec<String>,
}

/// Replaces variable placeholders with values from a mapping
pub struct VariableSubstitutor<'a> {
    syntax: &'a Syntax,
    policy: MissingVariablePolicy,
}

impl<'a> VariableSubstitutor<'a> {
    pub fn new(syntax: &'a Syntax, policy: MissingVariablePolicy) -> Self {
        Self { syntax, policy }
    }

    pub fn substitute(&self, text: &str, variables: &Map<String, Value>) -> Substituted {
        let mut missing = Vec::new();
        let text = self.pass(text, variables, 1, &mut missing);

        if self.policy == MissingVariablePolicy::Report {
            for key in &missing {
                tracing::warn!("Variable not found: {key}");
            }
        }
        Substituted { text, missing }
    }

    fn pass(
        &self,
        text: &str,
        variables: &Map<String, Value>,
        depth: usize,
        missing: &mut Vec<String>,
    ) -> String {
        let mut result = String::with_capacity(text.len());

        for token in tokenize(text, self.syntax) {
            let Token::Variable { raw, key } = token else {
                result.push_str(token.raw());
                continue;
            };

            match lookup(variables, key).and_then(render_scalar) {
                Some(value) if depth < MAX_SUBSTITUTION_DEPTH && self.has_variables(&value) => {
                    result.push_str(&self.pass(&value, variables, depth + 1, missing));
                }
                Some(value) => result.push_str(&value),
                None => {
                    if !missing.iter().any(|k| k == key) {
                        missing.push(key.to_string());
                    }
                    result.push_str(raw);
                }
            }
        }

        result
    }

    fn has_variables(&self, text: &str) -> bool {
        self.syntax.variable.is_match(text)
    }
}

/// Finds `key` verbatim, falling back to a dotted walk through nested values
pub fn lookup<'v>(variables: &'v Map<String, Value>, key: &str) -> Option<&'v Value> {
    if let Some(value) = variables.get(key) {
        return Some(value);
    }

    let mut segments = key.split('.');
    let mut current = variables.get(segments.next()?)?;
    let mut walked = false;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
        walked = true;
    }
    walked.then_some(current)
}

fn render_scalar(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::String(s) => Some(Cow::Borrowed(s)),
        Value::Number(n) => Some(Cow::Owned(n.to_string())),
        Value::Bool(b) => Some(Cow::Owned(b.to_string())),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_INCLUDE_PATTERN, DEFAULT_VARIABLE_PATTERN};
    use serde_json::json;

    fn syntax() -> Syntax {
        Syntax::new(DEFAULT_INCLUDE_PATTERN, DEFAULT_VARIABLE_PATTERN).unwrap()
    }

    fn vars(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test variables must be an object"),
        }
    }

    fn substitute(text: &str, variables: Value) -> Substituted {
        let syntax = syntax();
        VariableSubstitutor::new(&syntax, MissingVariablePolicy::Echo)
            .substitute(text, &vars(variables))
    }

    #[test]
    fn test_basic_substitution() {
        let out = substitute(
            "<title>{{ title }}</title> v{{version}} {{ draft }}",
            json!({ "title": "Home", "version": 3, "draft": false }),
        );
        assert_eq!(out.text, "<title>Home</title> v3 false");
        assert!(out.missing.is_empty());
    }

    #[test]
    fn test_numbers_render_like_json() {
        let out = substitute("{{ a }} {{ b }} {{ c }}", json!({ "a": 1.5, "b": -7, "c": 0 }));
        assert_eq!(out.text, "1.5 -7 0");
    }

    #[test]
    fn test_one_level_of_indirection() {
        let out = substitute("{{x}}", json!({ "x": "{{y}}", "y": "1" }));
        assert_eq!(out.text, "1");
    }

    #[test]
    fn test_indirection_is_bounded() {
        // Third level stays literal
        let out = substitute("{{a}}", json!({ "a": "{{b}}", "b": "{{c}}", "c": "deep" }));
        assert_eq!(out.text, "{{c}}");
    }

    #[test]
    fn test_self_reference_terminates_with_literal_token() {
        let out = substitute("{{x}}", json!({ "x": "{{x}}" }));
        assert_eq!(out.text, "{{x}}");

        let out = substitute("[{{ x }}]", json!({ "x": "<{{ x }}>" }));
        assert_eq!(out.text, "[<<{{ x }}>>]");
    }

    #[test]
    fn test_missing_key_echoed_verbatim() {
        let out = substitute("{{missing}}", json!({}));
        assert_eq!(out.text, "{{missing}}");
        assert_eq!(out.missing, vec!["missing".to_string()]);

        let out = substitute("{{ a }} and {{ a }} and {{b}}", json!({}));
        assert_eq!(out.text, "{{ a }} and {{ a }} and {{b}}");
        assert_eq!(out.missing, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_structured_and_null_values_echoed() {
        let out = substitute(
            "{{ obj }} {{ list }} {{ nothing }}",
            json!({ "obj": { "a": 1 }, "list": [1, 2], "nothing": null }),
        );
        assert_eq!(out.text, "{{ obj }} {{ list }} {{ nothing }}");
        assert_eq!(out.missing.len(), 3);
    }

    #[test]
    fn test_dotted_paths_reach_into_structures() {
        let out = substitute(
            "{{ site.name }} {{ site.nav.1 }} {{ site.nav.9 }} {{ site.name.x }}",
            json!({ "site": { "name": "Docs", "nav": ["home", "about"] } }),
        );
        assert_eq!(out.text, "Docs about {{ site.nav.9 }} {{ site.name.x }}");
    }

    #[test]
    fn test_exact_flat_key_wins_over_path() {
        let out = substitute(
            "{{ a.b }}",
            json!({ "a.b": "flat", "a": { "b": "nested" } }),
        );
        assert_eq!(out.text, "flat");
    }

    #[test]
    fn test_include_tokens_untouched() {
        let text = r#"{% include "x.txt" %} {{ v }}"#;
        let out = substitute(text, json!({ "v": "ok" }));
        assert_eq!(out.text, r#"{% include "x.txt" %} ok"#);
    }

    #[test]
    fn test_report_policy_still_completes() {
        let syntax = syntax();
        let out = VariableSubstitutor::new(&syntax, MissingVariablePolicy::Report)
            .substitute("{{ a }} {{ b }}", &vars(json!({ "a": "A" })));
        assert_eq!(out.text, "A {{ b }}");
        assert_eq!(out.missing, vec!["b".to_string()]);
    }

    #[test]
    fn test_identity_without_tokens() {
        let text = "plain { text } with {{ braces";
        assert_eq!(substitute(text, json!({ "x": 1 })).text, text);
    }
}
