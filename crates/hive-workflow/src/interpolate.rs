//! `${steps.<stepId>[.path…]}` string interpolation and `ref` navigation
//! (spec §4.7 "Resolve inputs").

use std::collections::HashMap;

use hive_core::{HiveError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static TEMPLATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{steps\.([A-Za-z0-9_\-]+(?:\.[A-Za-z0-9_\-]+)*)\}").unwrap());

/// Navigates `stepId[.path…]` into the stored step-output map.
pub fn navigate(outputs: &HashMap<String, Value>, path: &str) -> Option<Value> {
    let mut segments = path.split('.');
    let step_id = segments.next()?;
    let mut current = outputs.get(step_id)?.clone();
    for segment in segments {
        current = match &current {
            Value::Object(map) => map.get(segment)?.clone(),
            Value::Array(items) => {
                let idx: usize = segment.parse().ok()?;
                items.get(idx)?.clone()
            }
            _ => return None,
        };
    }
    Some(current)
}

/// Renders a looked-up value for inline string substitution: arrays of
/// objects become itemized `[n] key: value` blocks, objects become pretty
/// JSON, primitives become their bare string form (spec §4.7).
pub fn render_for_interpolation(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) if items.iter().all(|v| v.is_object()) && !items.is_empty() => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let Value::Object(map) = item else { unreachable!() };
                let fields = map
                    .iter()
                    .map(|(k, v)| format!("{k}: {}", render_for_interpolation(v)))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("[{i}] {fields}")
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(_) => serde_json::to_string_pretty(value).unwrap_or_default(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Substitutes every `${steps...}` occurrence in `template` with its
/// rendered referenced value. An unresolvable reference is a fatal input
/// error (spec §7 "Validation").
pub fn interpolate(template: &str, outputs: &HashMap<String, Value>) -> Result<String> {
    let mut err: Option<String> = None;
    let rendered = TEMPLATE_RE.replace_all(template, |caps: &regex::Captures| {
        let path = &caps[1];
        match navigate(outputs, path) {
            Some(value) => render_for_interpolation(&value),
            None => {
                err = Some(format!("no step output found for \"${{steps.{path}}}\""));
                String::new()
            }
        }
    });
    if let Some(e) = err {
        return Err(HiveError::Validation(e));
    }
    Ok(rendered.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outputs() -> HashMap<String, Value> {
        let mut m = HashMap::new();
        m.insert("s1".to_string(), serde_json::json!({ "count": 3, "rows": [{"a": 1}, {"a": 2}] }));
        m
    }

    #[test]
    fn interpolates_primitive_path() {
        let result = interpolate("Done: ${steps.s1.count}", &outputs()).unwrap();
        assert_eq!(result, "Done: 3");
    }

    #[test]
    fn interpolates_array_of_objects_as_itemized_blocks() {
        let result = interpolate("${steps.s1.rows}", &outputs()).unwrap();
        assert_eq!(result, "[0] a: 1\n[1] a: 2");
    }

    #[test]
    fn missing_reference_is_an_error() {
        let result = interpolate("${steps.missing.value}", &outputs());
        assert!(result.is_err());
    }

    #[test]
    fn leaves_plain_text_untouched() {
        let result = interpolate("no templates here", &outputs()).unwrap();
        assert_eq!(result, "no templates here");
    }

    #[test]
    fn navigate_resolves_array_index() {
        let v = navigate(&outputs(), "s1.rows.0.a").unwrap();
        assert_eq!(v, serde_json::json!(1));
    }
}
