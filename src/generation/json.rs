/// Two-stage parsing of model output into typed JSON.
///
/// Models asked for JSON mostly comply, but some wrap the object in prose or a
/// code fence. Stage one parses the whole text; stage two parses the first
/// balanced `{...}` object found in it. `None` means neither stage produced a
/// value of the requested shape.

use serde::de::DeserializeOwned;

/// Parse `raw` as `T`, falling back to the first balanced object in the text.
pub fn parse_model_json<T: DeserializeOwned>(raw: &str) -> Option<T> {
    let trimmed = raw.trim();
    if let Ok(value) = serde_json::from_str::<T>(trimmed) {
        return Some(value);
    }
    let candidate = first_balanced_object(trimmed)?;
    serde_json::from_str::<T>(candidate).ok()
}

/// Return the first `{...}` slice whose braces balance, skipping braces that
/// appear inside JSON string literals.
pub fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth: usize = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Relevant {
        relevant: Vec<i64>,
    }

    #[test]
    fn test_direct_parse() {
        let parsed: Option<Relevant> = parse_model_json(r#" {"relevant": [2, 1]} "#);
        assert_eq!(parsed, Some(Relevant { relevant: vec![2, 1] }));
    }

    #[test]
    fn test_object_embedded_in_prose() {
        let raw = "Sure! Here is the result:\n```json\n{\"relevant\": [3]}\n```\nHope it helps {sic}";
        let parsed: Option<Relevant> = parse_model_json(raw);
        assert_eq!(parsed, Some(Relevant { relevant: vec![3] }));
    }

    #[test]
    fn test_braces_inside_strings_are_ignored() {
        let raw = r#"note: {"summary": "uses {braces} and \"quotes\"", "n": 1} trailing"#;
        assert_eq!(
            first_balanced_object(raw),
            Some(r#"{"summary": "uses {braces} and \"quotes\"", "n": 1}"#)
        );
    }

    #[test]
    fn test_nested_objects() {
        let raw = r#"x {"a": {"b": 1}} {"c": 2}"#;
        assert_eq!(first_balanced_object(raw), Some(r#"{"a": {"b": 1}}"#));
    }

    #[test]
    fn test_unparseable_yields_none() {
        assert_eq!(parse_model_json::<Relevant>("I cannot help with that."), None);
        assert_eq!(parse_model_json::<Relevant>("{ unterminated"), None);
        assert_eq!(parse_model_json::<Relevant>(r#"{"relevant": "two"}"#), None);
    }
}
