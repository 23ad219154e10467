//! Recover JSON from model output

use crate::LlmError;
use serde_json::Value;

/// Extract a JSON object or array from a model response
///
/// Models sometimes wrap JSON in markdown code blocks or surround it with
/// prose. Fenced blocks are unwrapped first; if the text still does not parse,
/// the outermost `{...}` or `[...]` span is tried. Scalars are rejected.
pub fn extract_json(response: &str) -> Result<Value, LlmError> {
    let trimmed = strip_code_fence(response.trim());

    if trimmed.is_empty() {
        return Err(LlmError::InvalidResponse("Empty response".to_string()));
    }

    let value = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => value,
        Err(first_err) => {
            let span = outermost_span(trimmed).ok_or_else(|| {
                LlmError::InvalidResponse(format!("JSON parse error: {}", first_err))
            })?;
            serde_json::from_str::<Value>(span)
                .map_err(|e| LlmError::InvalidResponse(format!("JSON parse error: {}", e)))?
        }
    };

    if value.is_object() || value.is_array() {
        Ok(value)
    } else {
        Err(LlmError::InvalidResponse(
            "Expected a JSON object or array".to_string(),
        ))
    }
}

fn strip_code_fence(text: &str) -> &str {
    if !text.starts_with("```") {
        return text;
    }
    // Drop the opening fence line (``` or ```json) and a closing fence
    let body = match text.find('\n') {
        Some(pos) => &text[pos + 1..],
        None => return "",
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

fn outermost_span(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let close = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_object() {
        let value = extract_json(r#"{"key": "value"}"#).unwrap();
        assert_eq!(value["key"], "value");
    }

    #[test]
    fn test_markdown_wrapper() {
        let response = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(extract_json(response).unwrap()["key"], "value");
    }

    #[test]
    fn test_markdown_without_language() {
        let response = "```\n[1, 2]\n```";
        assert_eq!(extract_json(response).unwrap().as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_surrounding_prose() {
        let response = "Here is the data:\n{\"summary\": \"short\"}\nHope this helps.";
        assert_eq!(extract_json(response).unwrap()["summary"], "short");
    }

    #[test]
    fn test_not_json() {
        let result = extract_json("This is not JSON");
        assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
    }

    #[test]
    fn test_scalar_rejected() {
        assert!(extract_json("42").is_err());
    }

    #[test]
    fn test_empty_rejected() {
        assert!(extract_json("   ").is_err());
        assert!(extract_json("```").is_err());
    }
}
