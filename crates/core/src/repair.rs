//! Best-effort recovery of structured data from loosely formed model output.
//!
//! Completion providers are asked for JSON but routinely wrap it in fences or
//! prose, leave trailing commas, emit raw newlines inside strings, or use
//! bare `"`/`'` as inch and foot marks. [`repair`] tries a direct parse first
//! and only then applies the rewrite pass.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};

/// Parse `text` into a JSON value, repairing it if needed.
///
/// `source_label` names the producer and ends up in the error.
pub fn repair(text: &str, source_label: &str) -> Result<Value> {
    let unfenced = strip_fences(text);
    let payload = extract_payload(unfenced).ok_or_else(|| {
        Error::parse(source_label, "no JSON object or array found in response")
    })?;

    if let Ok(value) = serde_json::from_str::<Value>(payload) {
        return Ok(value);
    }

    let rewritten = rewrite(payload);
    serde_json::from_str::<Value>(&rewritten).map_err(|e| {
        tracing::debug!(source = source_label, error = %e, "Repair pass did not produce valid JSON");
        Error::parse(source_label, e.to_string())
    })
}

/// Repair and then deserialize into `T`, ignoring nulls the model emitted for
/// fields that have a default.
pub fn repair_into<T: DeserializeOwned>(text: &str, source_label: &str) -> Result<T> {
    let mut value = repair(text, source_label)?;
    strip_nulls(&mut value);
    serde_json::from_value(value).map_err(|e| Error::parse(source_label, e.to_string()))
}

/// Remove every `null` object member, recursively.
pub fn strip_nulls(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            for v in map.values_mut() {
                strip_nulls(v);
            }
        }
        Value::Array(items) => {
            for v in items.iter_mut() {
                strip_nulls(v);
            }
        }
        _ => {}
    }
}

fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`, `JSON`, ...) on the opening fence line.
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    body.trim_end().trim_end_matches("```").trim()
}

/// Slice from the earliest `{` or `[` to the last matching closer.
fn extract_payload(text: &str) -> Option<&str> {
    let obj = text.find('{');
    let arr = text.find('[');
    let (start, closer) = match (obj, arr) {
        (Some(o), Some(a)) if a < o => (a, ']'),
        (Some(o), _) => (o, '}'),
        (None, Some(a)) => (a, ']'),
        (None, None) => return None,
    };
    let end = text.rfind(closer)?;
    (end > start).then(|| &text[start..=end])
}

fn rewrite(payload: &str) -> String {
    let chars: Vec<char> = payload.chars().collect();
    let mut out = String::with_capacity(payload.len() + 16);
    let mut in_string = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let prev_is_digit = i > 0 && chars[i - 1].is_ascii_digit();

        if in_string {
            match c {
                '\\' => match chars.get(i + 1) {
                    Some('\'') => {
                        out.push_str(if prev_is_digit { " feet" } else { "'" });
                        i += 2;
                        continue;
                    }
                    Some(&next) => {
                        out.push('\\');
                        out.push(next);
                        i += 2;
                        continue;
                    }
                    None => {}
                },
                '"' if prev_is_digit && is_measurement_follow(&chars[i + 1..]) => {
                    out.push_str(" inches");
                    i += 1;
                    continue;
                }
                '"' => in_string = false,
                '\n' => {
                    out.push_str("\\n");
                    i += 1;
                    continue;
                }
                '\r' => {
                    out.push_str("\\r");
                    i += 1;
                    continue;
                }
                '\t' => {
                    out.push_str("\\t");
                    i += 1;
                    continue;
                }
                _ => {}
            }
            out.push(c);
            i += 1;
            continue;
        }

        match c {
            '"' => in_string = true,
            ',' => {
                let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
                if matches!(next, Some('}') | Some(']')) {
                    i += 1;
                    continue;
                }
            }
            _ => {}
        }
        out.push(c);
        i += 1;
    }

    out
}

/// A quote right after a digit is a measurement mark when the text carries
/// on with a word, number, range or parenthetical rather than JSON structure.
fn is_measurement_follow(rest: &[char]) -> bool {
    let next = match rest.first() {
        Some(' ') => rest.get(1),
        other => other,
    };
    matches!(next, Some(ch) if ch.is_alphanumeric() || *ch == '-' || *ch == '(')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_well_formed_input_is_untouched() {
        let text = r#"{"name":"Robin","tags":["a","b"],"n":3}"#;
        let direct: Value = serde_json::from_str(text).unwrap();
        assert_eq!(repair(text, "test").unwrap(), direct);
    }

    #[test]
    fn test_escaped_measurements_in_valid_json_are_preserved() {
        let text = r#"{"size":"5\" wingspan and is 1' tall"}"#;
        let value = repair(text, "test").unwrap();
        assert_eq!(value["size"], "5\" wingspan and is 1' tall");
    }

    #[test]
    fn test_strips_fences_and_prose() {
        let text = "Sure! Here you go:\n```json\n{\"candidates\": []}\n```\nHope that helps.";
        assert_eq!(repair(text, "test").unwrap(), json!({"candidates": []}));

        let prose = "The answer is [1, 2, 3] as requested";
        assert_eq!(repair(prose, "test").unwrap(), json!([1, 2, 3]));
    }

    #[test]
    fn test_earliest_opener_wins() {
        let text = r#"[{"a":1},{"b":2}]"#;
        assert!(repair(text, "test").unwrap().is_array());
    }

    #[test]
    fn test_rewrites_bare_measurement_marks() {
        let text = r#"{"size":"9-11" long","wingspan":"2\' across","note":"it\'s small"}"#;
        let value = repair(text, "test").unwrap();
        assert_eq!(value["size"], "9-11 inches long");
        assert_eq!(value["wingspan"], "2 feet across");
        assert_eq!(value["note"], "it's small");
    }

    #[test]
    fn test_quote_after_digit_closing_a_value_is_structural() {
        let text = "{\"year\":\"1999\",\"size\":\"12\" (30 cm)\",}";
        let value = repair(text, "test").unwrap();
        assert_eq!(value["year"], "1999");
        assert_eq!(value["size"], "12 inches (30 cm)");
    }

    #[test]
    fn test_trailing_commas_and_raw_newlines() {
        let text = "{\"habitat\":\"Woods\nand fields\",\"tags\":[\"a\",\"b\",],}";
        let value = repair(text, "test").unwrap();
        assert_eq!(value["habitat"], "Woods\nand fields");
        assert_eq!(value["tags"], json!(["a", "b"]));
    }

    #[test]
    fn test_unrecoverable_input_names_source() {
        let err = repair("no structure here", "identify").unwrap_err();
        match err {
            Error::Parse { source_label, .. } => assert_eq!(source_label, "identify"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(repair("{\"a\": }", "enrich").is_err());
    }

    #[test]
    fn test_repair_into_ignores_nulls() {
        #[derive(serde::Deserialize, Default)]
        #[serde(default)]
        struct Sample {
            habitat: String,
            tags: Vec<String>,
        }
        let sample: Sample = repair_into(r#"{"habitat": null, "tags": ["x"]}"#, "test").unwrap();
        assert_eq!(sample.habitat, "");
        assert_eq!(sample.tags, vec!["x"]);
    }
}
