//! `fetch_rss` static tool (spec §4.5): fetches up to 10 RSS/Atom feeds,
//! filters by age, dedupes by normalized title, and returns the newest
//! articles across all sources.

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;

use super::{ssrf, Tool, ToolResult};

const MAX_SOURCES: usize = 10;
const DEFAULT_MAX_ARTICLES: usize = 20;
const DEFAULT_MAX_AGE_HOURS: i64 = 24 * 7;

#[derive(Debug, Deserialize)]
struct FetchRssInput {
    urls: Vec<String>,
    #[serde(default)]
    max_articles: Option<usize>,
    #[serde(default)]
    max_age_hours: Option<i64>,
}

#[derive(Debug, Clone)]
struct Article {
    title: String,
    link: String,
    published: Option<chrono::DateTime<chrono::Utc>>,
    source: String,
}

#[derive(Default)]
pub struct FetchRssTool;

#[async_trait]
impl Tool for FetchRssTool {
    fn name(&self) -> &str {
        "fetch_rss"
    }

    fn description(&self) -> &str {
        "Fetches one or more RSS/Atom feeds and returns the newest articles, deduplicated by title."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "urls": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Feed URLs to fetch, up to 10."
                },
                "max_articles": {
                    "type": "integer",
                    "description": "Maximum number of articles to return overall. Defaults to 20."
                },
                "max_age_hours": {
                    "type": "integer",
                    "description": "Drop articles older than this many hours. Defaults to 168 (one week)."
                }
            },
            "required": ["urls"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let parsed: FetchRssInput = match serde_json::from_value(input) {
            Ok(v) => v,
            Err(e) => return ToolResult::error(format!("invalid input: {e}")),
        };

        if parsed.urls.is_empty() {
            return ToolResult::error("urls must contain at least one feed URL");
        }
        if parsed.urls.len() > MAX_SOURCES {
            return ToolResult::error(format!("at most {MAX_SOURCES} feed URLs are allowed per call"));
        }

        let max_articles = parsed.max_articles.unwrap_or(DEFAULT_MAX_ARTICLES);
        let max_age = chrono::Duration::hours(parsed.max_age_hours.unwrap_or(DEFAULT_MAX_AGE_HOURS));
        let cutoff = chrono::Utc::now() - max_age;

        let mut all_articles: Vec<Article> = Vec::new();
        let mut errors: Vec<String> = Vec::new();

        for raw_url in &parsed.urls {
            match fetch_one_feed(raw_url).await {
                Ok(articles) => all_articles.extend(articles),
                Err(e) => errors.push(format!("{raw_url}: {e}")),
            }
        }

        all_articles.retain(|a| a.published.map(|p| p >= cutoff).unwrap_or(true));

        let mut seen_titles: HashSet<String> = HashSet::new();
        all_articles.retain(|a| seen_titles.insert(normalize_title(&a.title)));

        all_articles.sort_by(|a, b| b.published.cmp(&a.published));
        all_articles.truncate(max_articles);

        let articles_json: Vec<serde_json::Value> = all_articles
            .iter()
            .map(|a| {
                json!({
                    "title": a.title,
                    "link": a.link,
                    "publishedAt": a.published.map(|p| p.to_rfc3339()),
                    "source": a.source,
                })
            })
            .collect();

        ToolResult::from_json(json!({
            "articles": articles_json,
            "count": articles_json.len(),
            "errors": errors,
        }))
    }
}

async fn fetch_one_feed(raw_url: &str) -> Result<Vec<Article>, String> {
    let url = ssrf::validate_url(raw_url).await.map_err(|e| e.to_string())?;
    let body = ssrf::fetch_capped(&url).await.map_err(|e| e.to_string())?;
    parse_feed(&body, raw_url)
}

/// Parses either RSS 2.0 `<item>` or Atom `<entry>` elements. Malformed or
/// unrecognized documents yield an empty article list rather than an error
/// so one bad feed doesn't fail the whole call.
fn parse_feed(body: &str, source: &str) -> Result<Vec<Article>, String> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut articles = Vec::new();
    let mut buf = Vec::new();

    let mut in_item = false;
    let mut current_title = String::new();
    let mut current_link = String::new();
    let mut current_date = String::new();
    let mut current_tag: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                match name.as_str() {
                    "item" | "entry" => {
                        in_item = true;
                        current_title.clear();
                        current_link.clear();
                        current_date.clear();
                    }
                    "link" if in_item => {
                        // Atom uses an href attribute; RSS uses text content.
                        if let Some(href) = e.attributes().flatten().find(|a| a.key.as_ref() == b"href") {
                            current_link = String::from_utf8_lossy(&href.value).into_owned();
                        }
                        current_tag = Some(name);
                    }
                    _ if in_item => current_tag = Some(name),
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                if in_item {
                    let text = e.unescape().unwrap_or_default().into_owned();
                    match current_tag.as_deref() {
                        Some("title") => current_title.push_str(&text),
                        Some("link") => current_link.push_str(&text),
                        Some("pubDate") | Some("published") | Some("updated") => current_date.push_str(&text),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name == "item" || name == "entry" {
                    in_item = false;
                    if !current_title.is_empty() {
                        articles.push(Article {
                            title: current_title.clone(),
                            link: current_link.clone(),
                            published: parse_date(&current_date),
                            source: source.to_string(),
                        });
                    }
                }
                current_tag = None;
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("XML parse error: {e}")),
            _ => {}
        }
        buf.clear();
    }

    Ok(articles)
}

fn parse_date(raw: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    if raw.is_empty() {
        return None;
    }
    chrono::DateTime::parse_from_rfc2822(raw)
        .map(|d| d.with_timezone(&chrono::Utc))
        .or_else(|_| chrono::DateTime::parse_from_rfc3339(raw).map(|d| d.with_timezone(&chrono::Utc)))
        .ok()
}

fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rss_items() {
        let body = r#"<?xml version="1.0"?>
        <rss><channel>
            <item>
                <title>First Post</title>
                <link>https://example.com/1</link>
                <pubDate>Mon, 01 Jan 2024 00:00:00 GMT</pubDate>
            </item>
            <item>
                <title>Second Post</title>
                <link>https://example.com/2</link>
                <pubDate>Tue, 02 Jan 2024 00:00:00 GMT</pubDate>
            </item>
        </channel></rss>"#;
        let articles = parse_feed(body, "src").unwrap();
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].title, "First Post");
        assert_eq!(articles[0].link, "https://example.com/1");
        assert!(articles[0].published.is_some());
    }

    #[test]
    fn parses_atom_entries_with_href_link() {
        let body = r#"<?xml version="1.0"?>
        <feed>
            <entry>
                <title>Atom Post</title>
                <link href="https://example.com/atom" />
                <updated>2024-01-03T00:00:00Z</updated>
            </entry>
        </feed>"#;
        let articles = parse_feed(body, "src").unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].link, "https://example.com/atom");
    }

    #[test]
    fn malformed_document_yields_empty_list() {
        let articles = parse_feed("not xml at all", "src").unwrap();
        assert!(articles.is_empty());
    }

    #[test]
    fn normalize_title_collapses_whitespace_and_case() {
        assert_eq!(normalize_title("  Hello   World "), "hello world");
        assert_eq!(normalize_title("Hello World"), "hello world");
    }

    #[tokio::test]
    async fn rejects_more_than_ten_sources() {
        let tool = FetchRssTool::default();
        let urls: Vec<String> = (0..11).map(|i| format!("https://example.com/{i}.xml")).collect();
        let result = tool.execute(json!({ "urls": urls })).await;
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn rejects_empty_urls() {
        let tool = FetchRssTool::default();
        let result = tool.execute(json!({ "urls": [] })).await;
        assert!(result.is_error);
    }
}
