use std::sync::LazyLock;

use regex::Regex;

pub const UNTITLED: &str = "Untitled Post";

const MIN_LINE_CHARS: usize = 10;
const MAX_LINE_CHARS: usize = 100;

static H1_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<h1[^>]*>([^<]+)</h1>").unwrap());
static H2_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<h2[^>]*>([^<]+)</h2>").unwrap());
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Derive a post title from generated content.
///
/// Tried in order: first `<h1>`, first `<h2>`, first Markdown `# `/`## `
/// heading, first tag-stripped line longer than ten characters (cut to 100),
/// then [`UNTITLED`].
pub fn extract_title(content: &str) -> String {
    for re in [&*H1_RE, &*H2_RE] {
        if let Some(text) = re.captures(content).and_then(|c| c.get(1)) {
            let title = text.as_str().trim();
            if !title.is_empty() {
                return title.to_string();
            }
        }
    }

    let lines: Vec<&str> = content.trim().lines().map(str::trim).collect();

    for line in &lines {
        if let Some(heading) = line
            .strip_prefix("# ")
            .or_else(|| line.strip_prefix("## "))
        {
            return heading.trim().to_string();
        }
    }

    for line in &lines {
        let clean = TAG_RE.replace_all(line, "");
        let clean = clean.trim();
        if clean.chars().count() > MIN_LINE_CHARS {
            return clean.chars().take(MAX_LINE_CHARS).collect();
        }
    }

    UNTITLED.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn h1_wins_over_markdown() {
        let content = "<h1>Foo</h1>\n## Bar\n<p>body</p>";
        assert_eq!(extract_title(content), "Foo");
    }

    #[test]
    fn h1_match_is_case_insensitive_and_ignores_attributes() {
        let content = "<p>intro</p><H1 class=\"title\">  Spaced Out  </H1>";
        assert_eq!(extract_title(content), "Spaced Out");
    }

    #[test]
    fn h2_used_when_no_h1() {
        let content = "<p>intro</p><h2>Section One</h2><h2>Section Two</h2>";
        assert_eq!(extract_title(content), "Section One");
    }

    #[test]
    fn markdown_heading_only() {
        assert_eq!(extract_title("## Bar"), "Bar");
        assert_eq!(extract_title("intro\n# Top\n## Sub"), "Top");
    }

    #[test]
    fn first_long_line_is_truncated() {
        let long = "word ".repeat(40);
        let content = format!("<p>short</p>\n<p>{long}</p>");
        let title = extract_title(&content);
        assert_eq!(title.chars().count(), 100);
        assert!(title.starts_with("word word"));
    }

    #[test]
    fn short_lines_fall_through_to_placeholder() {
        assert_eq!(extract_title(""), UNTITLED);
        assert_eq!(extract_title("<p>tiny</p>\nabc"), UNTITLED);
        assert_eq!(extract_title("exactly10!"), UNTITLED);
        assert_eq!(extract_title("elevenchars"), "elevenchars");
    }
}
