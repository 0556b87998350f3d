use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

const MAX_SLUG_LEN: usize = 100;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static SENTENCE_END_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]+").unwrap());
static VOWEL_GROUP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[aeiouy]+").unwrap());
static NON_SLUG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Text metrics used to fill a post's SEO metadata.
pub trait SeoAnalyzer: Send + Sync {
    /// Flesch reading ease of `content` (markup ignored), clamped to 0–100.
    fn readability(&self, content: &str) -> f64;

    /// Occurrences of each keyword per hundred words, rounded to two decimals.
    fn keyword_density(&self, content: &str, keywords: &[String]) -> BTreeMap<String, f64>;

    /// URL-safe slug for a title.
    fn slug(&self, title: &str) -> String;
}

/// English heuristics: vowel-group syllables and Flesch reading ease.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardSeo;

impl SeoAnalyzer for StandardSeo {
    fn readability(&self, content: &str) -> f64 {
        let text = strip_html(content);

        let words = text.split_whitespace().count();
        if words == 0 {
            return 0.0;
        }
        let sentences = SENTENCE_END_RE.find_iter(&text).count().max(1);
        let syllables = count_syllables(&text);

        let words = words as f64;
        let score = 206.835
            - 1.015 * (words / sentences as f64)
            - 84.6 * (syllables as f64 / words);
        score.clamp(0.0, 100.0)
    }

    fn keyword_density(&self, content: &str, keywords: &[String]) -> BTreeMap<String, f64> {
        let text = strip_html(content).to_lowercase();
        let total = text.split_whitespace().count();
        if total == 0 {
            return BTreeMap::new();
        }

        keywords
            .iter()
            .filter(|k| !k.trim().is_empty())
            .map(|keyword| {
                // substring count, so multi-word phrases match too
                let hits = text.matches(&keyword.to_lowercase()).count();
                let density = hits as f64 / total as f64 * 100.0;
                (keyword.clone(), (density * 100.0).round() / 100.0)
            })
            .collect()
    }

    fn slug(&self, title: &str) -> String {
        let ascii: String = title
            .chars()
            .filter(char::is_ascii)
            .collect::<String>()
            .to_ascii_lowercase();
        let slug = NON_SLUG_RE.replace_all(&ascii, "-");
        let slug = slug.trim_matches('-');

        if slug.len() <= MAX_SLUG_LEN {
            return slug.to_string();
        }
        let cut = &slug[..MAX_SLUG_LEN];
        match cut.rfind('-') {
            Some(pos) => cut[..pos].to_string(),
            None => cut.to_string(),
        }
    }
}

/// Remove markup tags, keeping their text content.
pub fn strip_html(content: &str) -> String {
    TAG_RE.replace_all(content, "").into_owned()
}

fn count_syllables(text: &str) -> usize {
    text.to_lowercase()
        .split_whitespace()
        .map(|raw| raw.chars().filter(char::is_ascii_lowercase).collect::<String>())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut n = VOWEL_GROUP_RE.find_iter(&word).count();
            // silent trailing e
            if word.ends_with('e') && n > 1 {
                n -= 1;
            }
            n.max(1)
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syllable_heuristic() {
        assert_eq!(count_syllables("cake"), 1);
        assert_eq!(count_syllables("the"), 1);
        assert_eq!(count_syllables("rhythm"), 1);
        assert_eq!(count_syllables("readability"), 5);
        assert_eq!(count_syllables("123 ---"), 0);
    }

    #[test]
    fn readability_of_simple_prose_is_high() {
        let seo = StandardSeo;
        let score = seo.readability("<p>The cat sat on the mat. The dog ran.</p>");
        assert!(score > 90.0, "score was {score}");
        assert!(score <= 100.0);
    }

    #[test]
    fn readability_is_clamped_and_handles_empty() {
        let seo = StandardSeo;
        assert_eq!(seo.readability(""), 0.0);
        assert_eq!(seo.readability("<div></div>"), 0.0);
        let dense = "Incomprehensibilities institutionalization internationalization \
                     counterrevolutionaries electroencephalography";
        assert_eq!(seo.readability(dense), 0.0);
    }

    #[test]
    fn keyword_density_counts_phrases_case_insensitively() {
        let seo = StandardSeo;
        let content = "<p>Rust async is fun. Async Rust scales.</p> <p>rust async rocks</p>";
        let density = seo.keyword_density(
            content,
            &["rust async".to_string(), "tokio".to_string()],
        );
        // 10 words, 2 hits
        assert_eq!(density.get("rust async"), Some(&20.0));
        assert_eq!(density.get("tokio"), Some(&0.0));
    }

    #[test]
    fn keyword_density_of_empty_content_is_empty() {
        let seo = StandardSeo;
        assert!(seo.keyword_density("", &["rust".to_string()]).is_empty());
    }

    #[test]
    fn density_rounds_to_two_decimals() {
        let seo = StandardSeo;
        let density = seo.keyword_density("a b c rust d e", &["rust".to_string()]);
        assert_eq!(density.get("rust"), Some(&16.67));
    }

    #[test]
    fn slug_basics() {
        let seo = StandardSeo;
        assert_eq!(seo.slug("Hello, World!"), "hello-world");
        assert_eq!(seo.slug("  --Rust 2024: What's new?--  "), "rust-2024-what-s-new");
        assert_eq!(seo.slug("Café Society"), "caf-society");
        assert_eq!(seo.slug("!!!"), "");
    }

    #[test]
    fn long_slug_is_cut_at_word_boundary() {
        let seo = StandardSeo;
        let title = "word ".repeat(40);
        let slug = seo.slug(&title);
        assert!(slug.len() <= 100);
        assert!(!slug.ends_with('-'));
        assert!(slug.split('-').all(|w| w == "word"));
    }

    #[test]
    fn strip_html_keeps_text() {
        assert_eq!(strip_html("<h1 class=\"x\">Title</h1><p>Body</p>"), "TitleBody");
    }
}
