//! `fetch_url` static tool (spec §4.5): fetches a single URL, strips HTML
//! tags to plain text when the response looks like markup, and truncates
//! to 50KB.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;

use super::{ssrf, Tool, ToolResult};

const MAX_OUTPUT_BYTES: usize = 50 * 1024;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<script.*?</script>|<style.*?</style>|<[^>]+>").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]*\n[ \t]*\n[ \t\n]*").unwrap());

#[derive(Debug, Deserialize)]
struct FetchUrlInput {
    url: String,
}

#[derive(Default)]
pub struct FetchUrlTool;

#[async_trait]
impl Tool for FetchUrlTool {
    fn name(&self) -> &str {
        "fetch_url"
    }

    fn description(&self) -> &str {
        "Fetches a single URL and returns its text content, stripped of HTML markup."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "The URL to fetch." }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let parsed: FetchUrlInput = match serde_json::from_value(input) {
            Ok(v) => v,
            Err(e) => return ToolResult::error(format!("invalid input: {e}")),
        };

        let url = match ssrf::validate_url(&parsed.url).await {
            Ok(u) => u,
            Err(e) => return ToolResult::error(e.to_string()),
        };

        let body = match ssrf::fetch_capped(&url).await {
            Ok(b) => b,
            Err(e) => return ToolResult::error(e.to_string()),
        };

        let text = if looks_like_html(&body) { strip_html(&body) } else { body };
        let truncated = truncate_bytes(&text, MAX_OUTPUT_BYTES);

        ToolResult::from_json(json!({
            "url": parsed.url,
            "content": truncated,
        }))
    }
}

fn looks_like_html(body: &str) -> bool {
    let head: String = body.chars().take(1024).collect::<String>().to_lowercase();
    head.contains("<html") || head.contains("<!doctype html") || head.contains("<body")
}

fn strip_html(body: &str) -> String {
    let no_tags = TAG_RE.replace_all(body, " ");
    let decoded = no_tags
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    WHITESPACE_RE.replace_all(decoded.trim(), "\n\n").to_string()
}

fn truncate_bytes(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\n… [truncated]", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_script_and_style_blocks() {
        let html = "<html><head><style>.a{color:red}</style></head><body><script>alert(1)</script><p>Hello world</p></body></html>";
        let text = strip_html(html);
        assert!(text.contains("Hello world"));
        assert!(!text.contains("alert"));
        assert!(!text.contains("color:red"));
    }

    #[test]
    fn decodes_basic_entities() {
        let html = "<p>Tom &amp; Jerry &lt;3&gt;</p>";
        let text = strip_html(html);
        assert!(text.contains("Tom & Jerry <3>"));
    }

    #[test]
    fn detects_html_by_prefix() {
        assert!(looks_like_html("<!DOCTYPE html><html><body>hi</body></html>"));
        assert!(!looks_like_html("{\"key\": \"value\"}"));
    }

    #[test]
    fn truncates_at_byte_boundary() {
        let text = "a".repeat(100);
        let truncated = truncate_bytes(&text, 10);
        assert!(truncated.starts_with(&"a".repeat(10)));
        assert!(truncated.contains("truncated"));
    }

    #[tokio::test]
    async fn rejects_invalid_url() {
        let tool = FetchUrlTool::default();
        let result = tool.execute(json!({ "url": "not a url" })).await;
        assert!(result.is_error);
    }
}
