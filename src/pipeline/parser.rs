//! Tolerant extraction of the label object from a model reply.

use serde_json::Value;

use crate::taxonomy::{normalize_main, normalize_sub};

/// Label pair pulled out of a reply, already normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLabel {
    pub main_category: String,
    pub sub_category: String,
}

/// Why a reply could not be turned into a [`ParsedLabel`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseErrorSignal {
    #[error("no JSON object in reply")]
    NoJsonObject,

    #[error("JSON parse error: {0}")]
    InvalidJson(String),

    #[error("JSON value is not an object")]
    NotAnObject,

    #[error("missing or non-string field '{0}'")]
    MissingField(&'static str),
}

/// Parse a raw reply.
///
/// Takes the greedy span from the first `{` to the last `}`, so conversational
/// text and markdown fences around the object are ignored. A `null`
/// sub-category is read as "not applicable".
pub fn parse(raw: &str) -> Result<ParsedLabel, ParseErrorSignal> {
    let span = extract_json_span(raw).ok_or(ParseErrorSignal::NoJsonObject)?;
    let value: Value =
        serde_json::from_str(span).map_err(|e| ParseErrorSignal::InvalidJson(e.to_string()))?;
    let object = value.as_object().ok_or(ParseErrorSignal::NotAnObject)?;

    let main = object
        .get("main_category")
        .and_then(Value::as_str)
        .ok_or(ParseErrorSignal::MissingField("main_category"))?;

    let sub = match object.get("sub_category") {
        Some(Value::String(s)) => s.as_str(),
        Some(Value::Null) => "",
        _ => return Err(ParseErrorSignal::MissingField("sub_category")),
    };

    Ok(ParsedLabel {
        main_category: normalize_main(main),
        sub_category: normalize_sub(sub),
    })
}

/// Earliest `{` through last `}`, if both exist in that order.
fn extract_json_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_object_with_surrounding_prose() {
        let raw = r#"Sure! {"main_category": "recruiting", "sub_category": "interview_schedule"} Hope that helps!"#;
        assert_eq!(
            parse(raw).unwrap(),
            ParsedLabel {
                main_category: "recruiting".into(),
                sub_category: "interview_schedule".into(),
            }
        );
    }

    #[test]
    fn no_object_is_parse_error() {
        assert_eq!(
            parse("I cannot classify this."),
            Err(ParseErrorSignal::NoJsonObject)
        );
    }

    #[test]
    fn general_na_normalized() {
        let label = parse(r#"{"main_category": "general", "sub_category": "N/A"}"#).unwrap();
        assert_eq!(label.main_category, "general");
        assert_eq!(label.sub_category, "not_applicable");
    }

    #[test]
    fn case_and_whitespace_normalized() {
        let label =
            parse(r#"{"main_category": " Recruiting ", "sub_category": "Rejection\n"}"#).unwrap();
        assert_eq!(label.main_category, "recruiting");
        assert_eq!(label.sub_category, "rejection");
    }

    #[test]
    fn markdown_fenced_reply() {
        let raw = "```json\n{\"main_category\": \"general\", \"sub_category\": \"N/A\"}\n```";
        assert!(parse(raw).is_ok());
    }

    #[test]
    fn null_sub_category_is_not_applicable() {
        let label = parse(r#"{"main_category": "general", "sub_category": null}"#).unwrap();
        assert_eq!(label.sub_category, "not_applicable");
    }

    #[test]
    fn greedy_span_over_two_objects_fails_decoding() {
        let raw = r#"{"main_category": "general"} and {"sub_category": "N/A"}"#;
        assert!(matches!(parse(raw), Err(ParseErrorSignal::InvalidJson(_))));
    }

    #[test]
    fn reversed_braces_are_not_an_object() {
        assert_eq!(parse("} nope {"), Err(ParseErrorSignal::NoJsonObject));
    }

    #[test]
    fn missing_fields_rejected() {
        assert_eq!(
            parse(r#"{"sub_category": "N/A"}"#),
            Err(ParseErrorSignal::MissingField("main_category"))
        );
        assert_eq!(
            parse(r#"{"main_category": "general"}"#),
            Err(ParseErrorSignal::MissingField("sub_category"))
        );
        assert_eq!(
            parse(r#"{"main_category": 3, "sub_category": "N/A"}"#),
            Err(ParseErrorSignal::MissingField("main_category"))
        );
    }

    #[test]
    fn truncated_json_rejected() {
        assert!(matches!(
            parse(r#"{"main_category": "general", "sub_category": }"#),
            Err(ParseErrorSignal::InvalidJson(_))
        ));
    }
}
