//! Structured-response extraction
//!
//! Models are asked for bare JSON but routinely wrap it in markdown fences
//! or explanatory prose. Each candidate (fenced content, then the whole
//! text) gets a strict parse, then a brace-balanced scan for the first
//! embedded object.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::OnceLock;

use super::GenerationError;

/// Article produced by the model, normalized
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedArticle {
    pub title: String,
    pub body: String,
    /// Comma-separated keywords, empty when the model gave none
    pub seo_keywords: String,
}

fn json_fence() -> &'static regex_lite::Regex {
    static RE: OnceLock<regex_lite::Regex> = OnceLock::new();
    RE.get_or_init(|| regex_lite::Regex::new(r"(?is)```json(.*?)(?:```|\z)").unwrap())
}

fn any_fence() -> &'static regex_lite::Regex {
    static RE: OnceLock<regex_lite::Regex> = OnceLock::new();
    RE.get_or_init(|| regex_lite::Regex::new(r"(?s)```(.*?)(?:```|\z)").unwrap())
}

/// Parse raw model output into a [`GeneratedArticle`].
/// Fenced content is tried first, then the whole text.
pub fn extract_article(raw: &str) -> Result<GeneratedArticle, GenerationError> {
    let text = raw.trim();

    let fenced_error = match fenced_payload(text) {
        Some(fenced) => match parse_candidate(fenced.trim()) {
            Ok(article) => return Ok(article),
            Err(err) => {
                // The fence may sit inside a JSON string of an unfenced article
                tracing::debug!(error = %err, "Fenced content rejected, trying the whole response");
                Some(err)
            }
        },
        None => None,
    };

    parse_candidate(text).map_err(|err| fenced_error.unwrap_or(err))
}

/// Strict parse, then the first brace-balanced object
fn parse_candidate(candidate: &str) -> Result<GeneratedArticle, GenerationError> {
    let value = match serde_json::from_str::<Value>(candidate) {
        Ok(value) => value,
        Err(err) => {
            tracing::debug!(error = %err, "Strict parse failed, scanning for embedded object");

            let object = find_balanced_object(candidate).ok_or_else(|| {
                GenerationError::malformed(
                    "no JSON object could be located in the generated response",
                )
            })?;

            serde_json::from_str(object).map_err(|e| {
                GenerationError::malformed(format!(
                    "the generated response contains an invalid JSON object: {}",
                    e
                ))
            })?
        }
    };

    article_from_value(value)
}

/// Content of the first json-labeled fence, else of the first fence of any kind.
/// An unterminated fence runs to the end of the text.
fn fenced_payload(text: &str) -> Option<&str> {
    json_fence()
        .captures(text)
        .or_else(|| any_fence().captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// First `{...}` region whose braces balance, ignoring braces inside JSON strings
fn find_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}

fn article_from_value(value: Value) -> Result<GeneratedArticle, GenerationError> {
    let Value::Object(mut fields) = value else {
        return Err(GenerationError::malformed(
            "the generated response is not a JSON object",
        ));
    };

    let title = required_text(&mut fields, "title")?;
    let body = required_text(&mut fields, "body")?;
    let seo_keywords = keywords(fields.remove("seo_keywords"))?;

    Ok(GeneratedArticle {
        title,
        body,
        seo_keywords,
    })
}

fn required_text(fields: &mut Map<String, Value>, key: &str) -> Result<String, GenerationError> {
    match fields.remove(key) {
        Some(Value::String(text)) if !text.trim().is_empty() => Ok(text),
        Some(Value::String(_)) => Err(GenerationError::malformed(format!(
            "the generated response has an empty `{}`",
            key
        ))),
        Some(Value::Null) | None => Err(GenerationError::malformed(format!(
            "the generated response is missing the required field `{}`",
            key
        ))),
        Some(_) => Err(GenerationError::malformed(format!(
            "the generated response field `{}` is not text",
            key
        ))),
    }
}

fn keywords(value: Option<Value>) -> Result<String, GenerationError> {
    match value {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(text)) => Ok(text),
        Some(Value::Array(items)) => {
            let mut words = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(word) => words.push(word),
                    _ => {
                        return Err(GenerationError::malformed(
                            "the generated `seo_keywords` list contains non-text entries",
                        ))
                    }
                }
            }
            Ok(words.join(", "))
        }
        Some(_) => Err(GenerationError::malformed(
            "the generated `seo_keywords` field is not text",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAIN: &str =
        r#"{"title":"Cats","body":"Cats are great.","seo_keywords":"cats, pets"}"#;

    fn cats() -> GeneratedArticle {
        GeneratedArticle {
            title: "Cats".to_string(),
            body: "Cats are great.".to_string(),
            seo_keywords: "cats, pets".to_string(),
        }
    }

    #[test]
    fn test_plain_json() {
        assert_eq!(extract_article(PLAIN).unwrap(), cats());
    }

    #[test]
    fn test_json_labeled_fence() {
        let raw = format!("```json\n{}\n```", PLAIN);
        assert_eq!(extract_article(&raw).unwrap(), cats());

        let shouted = format!("Sure!\n```JSON\n{}\n```\nEnjoy.", PLAIN);
        assert_eq!(extract_article(&shouted).unwrap(), cats());
    }

    #[test]
    fn test_generic_fence() {
        let raw = format!("  ```\n{}\n```  ", PLAIN);
        assert_eq!(extract_article(&raw).unwrap(), cats());
    }

    #[test]
    fn test_json_fence_preferred_over_earlier_generic_fence() {
        let raw = format!(
            "Run this first:\n```\necho hi\n```\nThen:\n```json\n{}\n```",
            PLAIN
        );
        assert_eq!(extract_article(&raw).unwrap(), cats());
    }

    #[test]
    fn test_fence_with_other_language_tag_recovers_via_scan() {
        let raw = format!("```javascript\n{}\n```", PLAIN);
        assert_eq!(extract_article(&raw).unwrap(), cats());
    }

    #[test]
    fn test_unterminated_fence() {
        let raw = format!("```json\n{}", PLAIN);
        assert_eq!(extract_article(&raw).unwrap(), cats());
    }

    #[test]
    fn test_embedded_in_prose() {
        let raw = format!("Here is your article:\n{}\nLet me know if you need edits.", PLAIN);
        assert_eq!(extract_article(&raw).unwrap(), cats());
    }

    #[test]
    fn test_nested_braces_in_body_survive_scan() {
        let raw = r#"Output follows. {"title":"Rust","body":"Use {} for formatting and {\"a\": {\"b\": 1}} for maps.","seo_keywords":"rust"} That's all."#;
        let article = extract_article(raw).unwrap();
        assert_eq!(article.title, "Rust");
        assert_eq!(
            article.body,
            r#"Use {} for formatting and {"a": {"b": 1}} for maps."#
        );
        assert_eq!(article.seo_keywords, "rust");
    }

    #[test]
    fn test_unbalanced_brace_inside_string() {
        let raw = r#"note: {"title":"T","body":"a lone } brace and a { too"} end"#;
        let article = extract_article(raw).unwrap();
        assert_eq!(article.body, "a lone } brace and a { too");
    }

    #[test]
    fn test_title_and_body_kept_verbatim() {
        let raw = r#"{"title":"  Spaced Title ","body":"Para one.\n\nPara two.\n"}"#;
        let article = extract_article(raw).unwrap();
        assert_eq!(article.title, "  Spaced Title ");
        assert_eq!(article.body, "Para one.\n\nPara two.\n");
    }

    #[test]
    fn test_missing_keywords_default_to_empty() {
        let article = extract_article(r#"{"title":"T","body":"B"}"#).unwrap();
        assert_eq!(article.seo_keywords, "");

        let article = extract_article(r#"{"title":"T","body":"B","seo_keywords":null}"#).unwrap();
        assert_eq!(article.seo_keywords, "");
    }

    #[test]
    fn test_keyword_list_is_joined() {
        let article =
            extract_article(r#"{"title":"T","body":"B","seo_keywords":["a","b","c"]}"#).unwrap();
        assert_eq!(article.seo_keywords, "a, b, c");
    }

    #[test]
    fn test_no_object_is_malformed() {
        let err = extract_article("I'm sorry, I can't help with that.").unwrap_err();
        assert!(matches!(err, GenerationError::MalformedResponse { .. }));
        assert!(err.to_string().contains("no JSON object"));

        let err = extract_article("").unwrap_err();
        assert!(matches!(err, GenerationError::MalformedResponse { .. }));
    }

    #[test]
    fn test_missing_required_fields_are_malformed() {
        let err = extract_article(r#"{"body":"B"}"#).unwrap_err();
        assert!(matches!(err, GenerationError::MalformedResponse { .. }));
        assert!(err.to_string().contains("`title`"));

        let err = extract_article(r#"```json
{"title":"T","seo_keywords":"x"}
```"#)
        .unwrap_err();
        assert!(err.to_string().contains("`body`"));
    }

    #[test]
    fn test_empty_or_non_text_fields_are_malformed() {
        let err = extract_article(r#"{"title":"   ","body":"B"}"#).unwrap_err();
        assert!(matches!(err, GenerationError::MalformedResponse { .. }));

        let err = extract_article(r#"{"title":"T","body":42}"#).unwrap_err();
        assert!(matches!(err, GenerationError::MalformedResponse { .. }));
    }

    #[test]
    fn test_non_object_json_is_malformed() {
        let err = extract_article(r#"["title","body"]"#).unwrap_err();
        assert!(matches!(err, GenerationError::MalformedResponse { .. }));
    }

    #[test]
    fn test_broken_embedded_object_is_malformed() {
        let err = extract_article(r#"prefix {"title": "T", "body": } suffix"#).unwrap_err();
        assert!(matches!(err, GenerationError::MalformedResponse { .. }));
        assert!(err.to_string().contains("invalid JSON object"));
    }

    #[test]
    fn test_code_fence_inside_body_of_unfenced_article() {
        let raw = r#"{"title":"Rust closures","body":"Example:\n```rust\nlet f = || {};\n```\nDone.","seo_keywords":"rust"}"#;
        let article = extract_article(raw).unwrap();
        assert_eq!(article.title, "Rust closures");
        assert_eq!(article.body, "Example:\n```rust\nlet f = || {};\n```\nDone.");
        assert_eq!(article.seo_keywords, "rust");
    }

    #[test]
    fn test_code_fence_inside_body_after_prose() {
        let raw = r#"Here you go: {"title":"T","body":"Run ```cargo build``` first.\n```json\n{}\n```"} Cheers."#;
        let article = extract_article(raw).unwrap();
        assert_eq!(article.title, "T");
        assert!(article.body.starts_with("Run ```cargo build```"));
    }

    #[test]
    fn test_find_balanced_object() {
        assert_eq!(find_balanced_object("x {a} y {b}"), Some("{a}"));
        assert_eq!(find_balanced_object("{ {inner} }"), Some("{ {inner} }"));
        assert_eq!(find_balanced_object("{ never closed"), None);
        assert_eq!(find_balanced_object("no braces"), None);
    }
}
