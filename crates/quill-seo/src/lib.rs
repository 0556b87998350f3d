//! `quill-seo`: readability, keyword density, slugs and schema.org markup.
//!
//! Everything here is deterministic text analysis; no network calls.

pub mod analyzer;
pub mod schema;

pub use analyzer::{strip_html, SeoAnalyzer, StandardSeo};
pub use schema::{article_schema, ArticleSchemaInput};
