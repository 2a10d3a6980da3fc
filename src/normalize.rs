//! Output normalization for model responses.
//!
//! Models sometimes ignore the "plain text" instruction in the persona prompts
//! and wrap their answer in `{"result": ...}` or sprinkle markdown headings
//! and bold markers. [`normalize`] strips those artifacts. It never fails:
//! anything it does not recognise is passed through unchanged.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#+\s*").expect("valid heading regex"));

static BOLD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("valid bold regex"));

/// Normalize raw model output into plain text.
///
/// Applies [`unwrap_result`], [`strip_headings`] and [`strip_bold`] until the
/// text stops changing, so `normalize(normalize(x)) == normalize(x)`. Every
/// effective pass shortens the text, which bounds the loop.
///
/// ```
/// use versa::normalize::normalize;
///
/// assert_eq!(normalize(r###"{"result": "## 标题\n**重点**内容"}"###), "标题\n重点内容");
/// assert_eq!(normalize("plain"), "plain");
/// ```
pub fn normalize(raw: &str) -> String {
    let mut current = raw.to_string();
    loop {
        let next = normalize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn normalize_once(text: &str) -> String {
    let unwrapped = unwrap_result(text).unwrap_or_else(|| text.to_string());
    strip_bold(&strip_headings(&unwrapped))
}

/// If `text` is a JSON object with a `result` key, return that value as text.
///
/// String values are returned verbatim; any other JSON value is returned in
/// its compact serialized form. Returns `None` when `text` is not such an
/// object.
pub fn unwrap_result(text: &str) -> Option<String> {
    let value: Value = serde_json::from_str(text).ok()?;
    match value.as_object()?.get("result")? {
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Remove leading `#` heading markers (and the whitespace after them) from every line.
pub fn strip_headings(text: &str) -> String {
    HEADING_RE.replace_all(text, "").into_owned()
}

/// Replace `**text**` with `text`.
pub fn strip_bold(text: &str) -> String {
    BOLD_RE.replace_all(text, "$1").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_plain_text_unchanged() {
        let text = "【会议主题】：预算评审\n【核心结论】：通过";
        assert_eq!(normalize(text), text);
    }

    #[test]
    fn test_unwrap_result_string() {
        assert_eq!(normalize(r#"{"result": "hello"}"#), "hello");
        assert_eq!(normalize("  {\"result\": \"padded\"}\n"), "padded");
    }

    #[test]
    fn test_unwrap_result_non_string() {
        assert_eq!(normalize(r#"{"result": {"a": 1}}"#), r#"{"a":1}"#);
        assert_eq!(normalize(r#"{"result": 42}"#), "42");
    }

    #[test]
    fn test_json_without_result_key_unchanged() {
        let text = r#"{"answer": "hello"}"#;
        assert_eq!(normalize(text), text);
        assert_eq!(unwrap_result("[1, 2]"), None);
        assert_eq!(unwrap_result("{broken"), None);
    }

    #[test]
    fn test_strip_headings_every_line() {
        assert_eq!(
            normalize("# Title\nbody\n### Sub\n  # indented stays"),
            "Title\nbody\nSub\n  # indented stays"
        );
    }

    #[test]
    fn test_hash_inside_line_kept() {
        assert_eq!(normalize("issue #42 fixed"), "issue #42 fixed");
    }

    #[test]
    fn test_strip_bold() {
        assert_eq!(normalize("**重点**：完成**上线**"), "重点：完成上线");
        assert_eq!(normalize("a * b ** c"), "a * b ** c");
    }

    #[test]
    fn test_combined() {
        let raw = "{\"result\": \"## **本周核心进展**\\n1. 完成评估\"}";
        assert_eq!(normalize(raw), "本周核心进展\n1. 完成评估");
    }

    #[test]
    fn test_nested_wrapping_reaches_fixed_point() {
        let raw = r##"{"result": "{\"result\": \"# inner\"}"}"##;
        assert_eq!(normalize(raw), "inner");
    }

    #[test]
    fn test_heading_revealed_by_first_pass() {
        // A single pass would leave "# b" behind.
        assert_eq!(normalize("## # b"), "b");
        assert_eq!(normalize("**#** x"), "x");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "",
            "plain",
            "# a\n## b",
            "****a****",
            "***a***",
            "** **x** **",
            r#"{"result": "**# y**"}"#,
            r#"{"result": null}"#,
            "#\n\n# trailing",
            "{\"result\": \"{\\\"result\\\": 1}\"}",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "input: {s:?}");
        }
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(raw in any::<String>()) {
            let once = normalize(&raw);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn normalize_is_idempotent_on_markdown(raw in "[#* \nab]{0,40}") {
            let once = normalize(&raw);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn normalize_is_idempotent_on_wrapped_markdown(inner in "[#* \nab{}\"]{0,30}") {
            let raw = serde_json::json!({ "result": inner }).to_string();
            let once = normalize(&raw);
            prop_assert_eq!(normalize(&once), once);
        }
    }
}
