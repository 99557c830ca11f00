//! Raw email body → plain text for prompting.

use std::sync::LazyLock;

use html2text::render::text_renderer::TrivialDecorator;
use regex::Regex;

/// Line width handed to the renderer. Output is re-flowed afterwards, so
/// this only has to exceed any realistic single token.
const RENDER_WIDTH: usize = 10_000;

static SCRIPT_OR_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>").unwrap()
});

/// Start tags, end tags, comments and doctypes. A bare `<` is left alone.
static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->|<[/!]?[a-zA-Z][^<>]*>").unwrap());

/// Drop scripts and styles, render to plain text (decoding every HTML5
/// character reference), strip markup that was itself escaped, collapse
/// whitespace. Total over any input.
pub fn normalize(raw: &str) -> String {
    let without_code = SCRIPT_OR_STYLE.replace_all(raw, " ");
    let rendered = html2text::from_read_with_decorator(
        without_code.as_bytes(),
        RENDER_WIDTH,
        TrivialDecorator::new(),
    );
    strip_tags(&rendered)
}

/// Render a JSON cell as text: strings as-is, `null` as empty, anything
/// else as its JSON form.
pub fn value_to_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Strip HTML tags and normalize whitespace.
fn strip_tags(html: &str) -> String {
    // Tags separate words: "<td>a</td><td>b</td>" → "a b"
    let text = TAG.replace_all(html, " ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
