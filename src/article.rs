//! The article record and text helpers shared by generation and scoring.

use crate::quality::QualityReport;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Author used when the model does not name one.
pub const DEFAULT_AUTHOR: &str = "AI Analyst";

/// Category used when neither the model nor the caller provides one.
pub const DEFAULT_CATEGORY: &str = "AI Insights";

const WORDS_PER_MINUTE: usize = 200;
const MAX_SLUG_LEN: usize = 60;

/// A generated article as persisted in the manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    /// Position in the manifest, assigned by the bulk runner
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    /// Headline
    pub title: String,
    /// Summary shown on cards and in meta descriptions
    pub excerpt: String,
    /// Body HTML
    pub content: String,
    /// Byline
    #[serde(default)]
    pub author: String,
    /// Publication date, `YYYY-MM-DD`
    #[serde(default)]
    pub date: String,
    /// Section the article is filed under
    #[serde(default)]
    pub category: String,
    /// Human-readable reading time, e.g. `5 min read`
    #[serde(default)]
    pub read_time: String,
    /// Length style used for the prompt
    #[serde(default)]
    pub style: String,
    /// Angle or lens used for the prompt
    #[serde(default)]
    pub angle: String,
    /// Measured word count of the body
    #[serde(default)]
    pub word_count: usize,
    /// Slug of the source topic
    #[serde(default)]
    pub topic_slug: String,
    /// Header image URL or site-relative path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Shown in the hero slot
    #[serde(default)]
    pub featured: bool,
    /// Quality scores
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<QualityReport>,
    /// Tokens spent generating the article
    #[serde(rename = "_tokenUsage", default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
    /// Pipeline stages that failed and were skipped
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded_stages: Vec<String>,
}

/// Tokens consumed by one generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens
    pub input: u64,
    /// Completion tokens
    pub output: u64,
    /// Sum of both
    pub total: u64,
    /// Number of calls that contributed
    #[serde(default)]
    pub stages: u32,
}

impl TokenUsage {
    /// Usage of a single call.
    #[must_use]
    pub const fn new(input: u64, output: u64) -> Self {
        Self {
            input,
            output,
            total: input + output,
            stages: 1,
        }
    }

    /// Adds another call's usage.
    pub fn add(&mut self, other: Self) {
        self.input += other.input;
        self.output += other.output;
        self.total += other.total;
        self.stages += other.stages;
    }
}

impl Article {
    /// Synthetic article returned in dry-run mode.
    #[must_use]
    pub fn mock(topic: &str, category: Option<&str>) -> Self {
        let content = format!(
            "<h2>Why {topic} matters</h2>\n\
             <p>This is placeholder content. Set OPENAI_API_KEY to generate real articles.</p>\n\
             <h2>What comes next</h2>\n\
             <p>Dry-run mode makes no API calls, so nothing here was written by a model.</p>"
        );
        Self {
            title: format!("Mock Article: {topic}"),
            excerpt: "This is a mock article generated in dry-run mode.".to_string(),
            word_count: word_count(&content),
            content,
            author: DEFAULT_AUTHOR.to_string(),
            date: today(),
            read_time: "5 min read".to_string(),
            category: category.unwrap_or(DEFAULT_CATEGORY).to_string(),
            ..Self::default()
        }
    }

    /// Article shown in place of one that could not be generated.
    #[must_use]
    pub fn placeholder(topic: &str, reason: &str) -> Self {
        let content = format!(
            "<p>We could not prepare this article about {} right now.</p>\n<p>{}</p>",
            escape_html(topic),
            escape_html(reason)
        );
        Self {
            title: format!("{topic}: Coming Soon"),
            excerpt: format!("Our article on {topic} is being prepared. Please check back soon."),
            word_count: word_count(&content),
            read_time: read_time(&content),
            content,
            author: DEFAULT_AUTHOR.to_string(),
            date: today(),
            category: "Notice".to_string(),
            ..Self::default()
        }
    }

    /// Whether the article carries enough content to publish.
    #[must_use]
    pub fn has_valid_structure(&self) -> bool {
        !self.title.trim().is_empty()
            && !self.content.trim().is_empty()
            && strip_html(&self.content).trim().chars().count() > 100
    }

    /// URL slug derived from the title.
    #[must_use]
    pub fn slug(&self) -> String {
        slugify(&self.title)
    }
}

/// Returns the JSON object spanning the first `{` to the last `}`.
#[must_use]
pub fn extract_json(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let start = memchr::memchr(b'{', bytes)?;
    let end = memchr::memrchr(b'}', bytes)?;
    (end > start).then(|| &text[start..=end])
}

/// Builds an article from a model response, synthesizing any missing field.
#[must_use]
pub fn parse_article_from_text(text: &str, topic: &str, category: Option<&str>) -> Article {
    let parsed = extract_json(text)
        .and_then(|json| serde_json::from_str::<Value>(json).ok())
        .filter(Value::is_object);

    let Some(parsed) = parsed else {
        return Article {
            title: default_title(topic),
            excerpt: format!("An in-depth look at {topic} and its impact on the industry."),
            content: format!("<p>{text}</p>"),
            author: DEFAULT_AUTHOR.to_string(),
            date: today(),
            read_time: read_time(text),
            category: category.unwrap_or(DEFAULT_CATEGORY).to_string(),
            ..Article::default()
        };
    };

    let field = |name: &str| {
        parsed
            .get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let content = field("content");
    let read_time_value = field("readTime")
        .unwrap_or_else(|| read_time(content.as_deref().unwrap_or(text)));

    Article {
        title: field("title").unwrap_or_else(|| default_title(topic)),
        excerpt: field("excerpt")
            .unwrap_or_else(|| format!("An in-depth look at {topic} and its impact.")),
        content: content.unwrap_or_else(|| format!("<p>{text}</p>")),
        author: field("author").unwrap_or_else(|| DEFAULT_AUTHOR.to_string()),
        date: field("date").unwrap_or_else(today),
        read_time: read_time_value,
        category: field("category")
            .or_else(|| category.map(str::to_string))
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        ..Article::default()
    }
}

fn default_title(topic: &str) -> String {
    format!("The Future of {topic}: What You Need to Know")
}

/// `N min read` at 200 words per minute, at least one minute.
#[must_use]
pub fn read_time(content: &str) -> String {
    let words = word_count(content).max(1);
    format!("{} min read", words.div_ceil(WORDS_PER_MINUTE))
}

/// Replaces HTML tags with spaces and collapses whitespace.
///
/// A `<` that is never closed is kept as text.
#[must_use]
pub fn strip_html(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(open) = rest.find('<') {
        text.push_str(&rest[..open]);
        match rest[open..].find('>') {
            Some(close) => {
                text.push(' ');
                rest = &rest[open + close + 1..];
            }
            None => {
                rest = &rest[open..];
                break;
            }
        }
    }
    text.push_str(rest);

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whitespace-separated words after stripping tags.
#[must_use]
pub fn word_count(html: &str) -> usize {
    strip_html(html).split_whitespace().count()
}

/// Lowercase, hyphen-separated, at most 60 characters.
#[must_use]
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    if slug.len() > MAX_SLUG_LEN {
        slug.truncate(MAX_SLUG_LEN);
        slug = slug.trim_end_matches('-').to_string();
    }
    slug
}

/// Escapes text for inclusion in HTML.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Today's local date as `YYYY-MM-DD`.
#[must_use]
pub fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_spans_outer_braces() {
        let text = "Sure! {\"title\": \"A\", \"meta\": {\"x\": 1}} Hope that helps.";
        assert_eq!(
            extract_json(text),
            Some("{\"title\": \"A\", \"meta\": {\"x\": 1}}")
        );
        assert_eq!(extract_json("no json here"), None);
        assert_eq!(extract_json("} backwards {"), None);
    }

    #[test]
    fn test_structure_needs_real_text() {
        let mut article = Article {
            title: "Rivers".to_string(),
            content: format!("<p>{}</p>", "x".repeat(100)),
            ..Article::default()
        };
        assert!(!article.has_valid_structure());

        article.content = format!("<p>{}</p>", "x".repeat(101));
        assert!(article.has_valid_structure());

        article.title = "  ".to_string();
        assert!(!article.has_valid_structure());
    }

    #[test]
    fn test_parse_article_from_json() {
        let text = r#"{"title": "Soil Health", "excerpt": "Why dirt matters.", "content": "<p>Roots</p>", "category": "Nature"}"#;
        let article = parse_article_from_text(text, "soil", None);

        assert_eq!(article.title, "Soil Health");
        assert_eq!(article.excerpt, "Why dirt matters.");
        assert_eq!(article.content, "<p>Roots</p>");
        assert_eq!(article.category, "Nature");
        assert_eq!(article.author, DEFAULT_AUTHOR);
        assert_eq!(article.read_time, "1 min read");
    }

    #[test]
    fn test_parse_article_synthesizes_missing_fields() {
        let article = parse_article_from_text("{\"content\": \"<p>x</p>\"}", "Power BI", Some("Data"));
        assert_eq!(article.title, "The Future of Power BI: What You Need to Know");
        assert_eq!(article.excerpt, "An in-depth look at Power BI and its impact.");
        assert_eq!(article.category, "Data");
    }

    #[test]
    fn test_parse_article_without_json() {
        let article = parse_article_from_text("plain words only", "Tides", None);
        assert_eq!(article.content, "<p>plain words only</p>");
        assert_eq!(
            article.excerpt,
            "An in-depth look at Tides and its impact on the industry."
        );
        assert_eq!(article.category, DEFAULT_CATEGORY);
        assert!(!article.title.is_empty());
    }

    #[test]
    fn test_read_time() {
        assert_eq!(read_time(""), "1 min read");
        assert_eq!(read_time(&"word ".repeat(200)), "1 min read");
        assert_eq!(read_time(&"word ".repeat(201)), "2 min read");
    }

    #[test]
    fn test_strip_and_count() {
        assert_eq!(strip_html("<p>Hello <b>there</b></p>"), "Hello there");
        assert_eq!(word_count("<h2>One</h2><p>two three</p>"), 3);
        assert_eq!(strip_html("a < b"), "a < b");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("  The Future of AI: What's Next?  "), "the-future-of-ai-what-s-next");
        let long = slugify(&"word ".repeat(30));
        assert!(long.len() <= 60);
        assert!(!long.ends_with('-'));
    }

    #[test]
    fn test_token_usage_accumulates() {
        let mut usage = TokenUsage::new(10, 20);
        usage.add(TokenUsage::new(5, 5));
        assert_eq!(usage, TokenUsage { input: 15, output: 25, total: 40, stages: 2 });
    }

    #[test]
    fn test_serializes_token_usage_with_underscore() {
        let article = Article {
            title: "T".into(),
            token_usage: Some(TokenUsage::new(1, 2)),
            ..Article::default()
        };
        let json = serde_json::to_value(&article).unwrap();
        assert_eq!(json["_tokenUsage"]["total"], 3);
        assert!(json.get("degradedStages").is_none());
        assert!(json.get("readTime").is_some());
    }

    #[test]
    fn test_mock_and_placeholder() {
        let mock = Article::mock("Power BI", None);
        assert!(!mock.title.is_empty());
        assert!(!mock.content.is_empty());
        assert_eq!(mock.category, DEFAULT_CATEGORY);

        let placeholder = Article::placeholder("<Rivers>", "timeout");
        assert_eq!(placeholder.category, "Notice");
        assert!(placeholder.content.contains("&lt;Rivers&gt;"));
    }
}
