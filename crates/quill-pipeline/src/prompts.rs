//! Prompt assembly. Every function here is deterministic string building.

use quill_core::{Agent, ContentLength};

/// Characters of article text shown to the meta title / description calls.
const META_EXCERPT_CHARS: usize = 1000;
/// Characters of article text shown to the keyword extraction call.
const KEYWORD_EXCERPT_CHARS: usize = 2000;

const WRITING_RULES: &str = "\
WRITING RULES:
1. Structure: use <h2> and <h3> headings, put the main keyword in the first \
100 words, keep paragraphs to three or four sentences, use <ul>/<li> lists.
2. Quality: write naturally without keyword stuffing, use related terms, give \
concrete examples and data.
3. Engagement: open with a strong hook, add practical tips, close with a clear summary.
4. Format: clean HTML only. Use <strong> and <em>, never Markdown (# or **).";

const HTML_COMPONENTS: &str = "\
AVAILABLE HTML COMPONENTS:
- <div class=\"info-box blue|yellow|green|orange\"><div class=\"info-box-title\">Title</div><p>...</p></div>
- <div class=\"highlight-box\"><div class=\"highlight-grid\"><div class=\"highlight-item\">\
<span class=\"highlight-label\">Label</span><span class=\"highlight-value\">Value</span></div></div></div>
- <div class=\"card-grid\"><div class=\"info-card\"><h3>Card</h3><p>...</p></div></div>
- <div class=\"two-columns\"><div class=\"column\">...</div><div class=\"column\">...</div></div>
- <div class=\"tips-list\"><div class=\"tip-item\"><span class=\"tip-number\">1</span>\
<div class=\"tip-content\"><strong>Step</strong><p>...</p></div></div></div>
- <hr class=\"section-divider\" />
- <div class=\"disclaimer-box\"><p><strong>Disclaimer:</strong> ...</p></div>";

pub fn system_prompt(agent: &Agent, language: &str) -> String {
    let mut prompt = format!("You are an expert in: {}", agent.expertise);
    if let Some(persona) = agent.persona.as_deref().filter(|p| !p.trim().is_empty()) {
        prompt.push_str(&format!("\n\nYour persona:\n{persona}"));
    }
    prompt.push_str(&format!("\n\nWriting tone: {}", agent.tone));
    prompt.push_str(&format!("\nContent language: {language}"));
    prompt.push_str("\n\n");
    prompt.push_str(WRITING_RULES);
    prompt.push_str("\n\n");
    prompt.push_str(HTML_COMPONENTS);
    prompt
}

pub fn content_prompt(
    topic: &str,
    keyword: Option<&str>,
    length: ContentLength,
    language: &str,
) -> String {
    let mut prompt = format!(
        "Write a professional blog article about:\n\nTOPIC: {topic}\nLANGUAGE: {language}"
    );
    if let Some(keyword) = keyword {
        prompt.push_str(&format!("\nMAIN SEO KEYWORD: {keyword}"));
    }
    prompt.push_str(&format!(
        "\nTARGET LENGTH: {} words\nFORMAT: Clean HTML with CSS components (not Markdown)\n\n",
        length.word_range()
    ));
    prompt.push_str(
        "REQUIRED STRUCTURE:\n\
         - Open with a short <h1> title, then an intro <p> or an info-box.\n\
         - 3 to 5 sections, each under an <h2>, separated by <hr class=\"section-divider\" />.\n\
         - Use at least three different HTML components.\n\
         - End with a disclaimer-box.\n\
         - Introduce the keyword naturally.",
    );
    prompt
}

pub fn meta_title_prompt(content: &str, keyword: Option<&str>) -> String {
    format!(
        "Based on the following article, generate an SEO-friendly meta title.\n\n\
         Requirements:\n\
         - Maximum 60 characters\n\
         - Contains main keyword: {}\n\
         - Clearly communicates the topic, no clickbait\n\n\
         Article:\n{}...\n\n\
         Respond with ONLY the title, no quotes or additional text.",
        keyword.unwrap_or("extract from content"),
        excerpt(content, META_EXCERPT_CHARS),
    )
}

pub fn meta_description_prompt(content: &str, keyword: Option<&str>) -> String {
    format!(
        "Based on the following article, generate an SEO-friendly meta description.\n\n\
         Requirements:\n\
         - Maximum 160 characters\n\
         - Contains main keyword: {}\n\
         - Communicates the article's value and ends with a call to action\n\n\
         Article:\n{}...\n\n\
         Respond with ONLY the description, no quotes or additional text.",
        keyword.unwrap_or("extract from content"),
        excerpt(content, META_EXCERPT_CHARS),
    )
}

pub fn keywords_prompt(content: &str) -> String {
    format!(
        "Analyze the following article and extract the 5-10 most important keywords.\n\n\
         Requirements:\n\
         - 1-3 word phrases, relevant for SEO, sorted by importance\n\n\
         Article:\n{}...\n\n\
         Respond with a JSON array of strings, e.g. [\"keyword1\", \"keyword2\"]. \
         ONLY JSON, no additional text.",
        excerpt(content, KEYWORD_EXCERPT_CHARS),
    )
}

/// First `max` characters of `text`, on a char boundary.
pub fn excerpt(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_includes_persona_only_when_set() {
        let mut agent = Agent::new("Ada", "distributed systems");
        let prompt = system_prompt(&agent, "English");
        assert!(prompt.starts_with("You are an expert in: distributed systems"));
        assert!(!prompt.contains("Your persona"));

        agent.persona = Some("A pragmatic SRE".into());
        let prompt = system_prompt(&agent, "German");
        assert!(prompt.contains("Your persona:\nA pragmatic SRE"));
        assert!(prompt.contains("Content language: German"));
    }

    #[test]
    fn content_prompt_carries_length_and_keyword() {
        let prompt = content_prompt("Raft", Some("consensus"), ContentLength::Short, "English");
        assert!(prompt.contains("TOPIC: Raft"));
        assert!(prompt.contains("MAIN SEO KEYWORD: consensus"));
        assert!(prompt.contains("500-700 words"));

        let prompt = content_prompt("Raft", None, ContentLength::Medium, "English");
        assert!(!prompt.contains("MAIN SEO KEYWORD"));
    }

    #[test]
    fn excerpt_respects_char_boundaries() {
        assert_eq!(excerpt("héllo", 2), "hé");
        assert_eq!(excerpt("abc", 10), "abc");
        let long = "é".repeat(3000);
        assert_eq!(excerpt(&long, KEYWORD_EXCERPT_CHARS).chars().count(), 2000);
        assert_eq!(keywords_prompt(&long).matches('é').count(), 2000);
    }
}
