//! schema.org `Article` JSON-LD for published posts.

use serde_json::{json, Value};

use crate::analyzer::strip_html;

const EXCERPT_CHARS: usize = 200;
const HEADLINE_CHARS: usize = 110;

pub struct ArticleSchemaInput<'a> {
    pub title: &'a str,
    pub content: &'a str,
    pub author: &'a str,
    /// RFC 3339 publication time, if published.
    pub published_at: Option<&'a str>,
    pub site_name: &'a str,
    pub site_url: &'a str,
}

pub fn article_schema(input: &ArticleSchemaInput<'_>) -> Value {
    let text = strip_html(input.content);
    let mut excerpt: String = text.chars().take(EXCERPT_CHARS).collect();
    if text.chars().count() > EXCERPT_CHARS {
        excerpt.push_str("...");
    }
    let headline: String = input.title.chars().take(HEADLINE_CHARS).collect();

    let mut schema = json!({
        "@context": "https://schema.org",
        "@type": "Article",
        "headline": headline,
        "description": excerpt,
        "author": { "@type": "Person", "name": input.author },
        "publisher": {
            "@type": "Organization",
            "name": input.site_name,
            "url": input.site_url,
        },
    });
    if let Some(published) = input.published_at {
        schema["datePublished"] = Value::String(published.to_string());
    }
    schema
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input<'a>(content: &'a str, published_at: Option<&'a str>) -> ArticleSchemaInput<'a> {
        ArticleSchemaInput {
            title: "Consensus in practice",
            content,
            author: "Ada",
            published_at,
            site_name: "Blog",
            site_url: "https://example.com",
        }
    }

    #[test]
    fn short_content_has_no_ellipsis() {
        let schema = article_schema(&input("<p>Raft.</p>", None));
        assert_eq!(schema["description"], "Raft.");
        assert_eq!(schema["author"]["name"], "Ada");
        assert!(schema.get("datePublished").is_none());
    }

    #[test]
    fn long_content_is_excerpted() {
        let body = format!("<p>{}</p>", "x".repeat(500));
        let schema = article_schema(&input(&body, Some("2026-04-06T10:00:00Z")));
        let desc = schema["description"].as_str().unwrap();
        assert_eq!(desc.len(), 203);
        assert!(desc.ends_with("..."));
        assert_eq!(schema["datePublished"], "2026-04-06T10:00:00Z");
    }
}
