//! Search-engine analysis of a finished article and the social/structured
//! metadata emitted into its page.

use crate::article::{today, word_count, Article, DEFAULT_AUTHOR};
use crate::quality::{
    count_headings, count_occurrences, grade, is_optimal_excerpt_len, is_optimal_title_len, Check,
    Criterion, CriterionScore, HeadingLevels, WeightedScorer,
};
use crate::site::SiteConfig;
use serde::Serialize;
use serde_json::{json, Value};

const MAX_SLUG_LEN: usize = 60;
const POWER_WORDS: &[&str] = &[
    "essential", "ultimate", "complete", "guide", "best", "top", "how", "why", "what",
];
const CALL_TO_ACTION_WORDS: &[&str] = &["learn", "discover", "explore", "read", "find"];

/// Per-area SEO scores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SeoScores {
    /// Title length and wording
    pub title: f64,
    /// Excerpt used as meta description
    pub meta: f64,
    /// Body length, paragraphs, headings, lists and links
    pub content: f64,
    /// Heading hierarchy
    pub structure: f64,
    /// Featured image
    pub images: f64,
    /// URL slug
    pub url: f64,
    /// Weighted blend
    pub overall: f64,
}

/// Result of [`SeoOptimizer::analyze`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeoAnalysis {
    /// Scores by area
    pub scores: SeoScores,
    /// Letter grade of the overall score
    pub grade: String,
    /// Slug the article is published under
    pub slug: String,
    /// Concrete problems found
    pub issues: Vec<String>,
    /// What to work on first
    pub recommendations: Vec<String>,
}

/// Weighted SEO analysis: title 20%, meta 20%, content 25%, structure 15%,
/// images 10%, URL 10%.
#[derive(Debug)]
pub struct SeoOptimizer {
    scorer: WeightedScorer,
}

impl Default for SeoOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SeoOptimizer {
    /// Optimizer with the standard weights.
    #[must_use]
    pub fn new() -> Self {
        Self {
            scorer: WeightedScorer::new()
                .with(0.2, TitleSeo)
                .with(0.2, MetaSeo)
                .with(0.25, ContentSeo)
                .with(0.15, HeadingSeo)
                .with(0.1, ImageSeo)
                .with(0.1, UrlSeo),
        }
    }

    /// Analyzes an article.
    #[must_use]
    pub fn analyze(&self, article: &Article) -> SeoAnalysis {
        let card = self.scorer.score(article);
        let scores = SeoScores {
            title: card.score_of(TitleSeo.name()),
            meta: card.score_of(MetaSeo.name()),
            content: card.score_of(ContentSeo.name()),
            structure: card.score_of(HeadingSeo.name()),
            images: card.score_of(ImageSeo.name()),
            url: card.score_of(UrlSeo.name()),
            overall: card.overall,
        };

        let issues = card
            .parts
            .iter()
            .flat_map(|(_, part)| part.checks.iter())
            .filter(|check| !check.passed)
            .filter_map(|check| check.message.clone())
            .collect();

        let mut recommendations = Vec::new();
        if scores.overall < 70.0 {
            recommendations.push(
                "Overall SEO score is below optimal. Review and address the issues above."
                    .to_string(),
            );
        }
        if scores.title < 80.0 {
            recommendations.push(
                "Optimize title: Ensure it's 30-60 characters, includes keywords, and is compelling"
                    .to_string(),
            );
        }
        if scores.meta < 80.0 {
            recommendations.push(
                "Optimize meta description: Ensure it's 120-160 characters and includes a call to action"
                    .to_string(),
            );
        }
        if scores.content < 70.0 {
            recommendations
                .push("Enhance content: Add more paragraphs, headings, and internal links".to_string());
        }

        SeoAnalysis {
            scores,
            grade: grade(scores.overall).to_string(),
            slug: article.slug(),
            issues,
            recommendations,
        }
    }
}

/// Public URL of the page published under `slug`.
#[must_use]
pub fn article_url(slug: &str, site: &SiteConfig) -> String {
    site.absolute_url(&format!("/articles/{slug}.html"))
}

fn published(article: &Article) -> String {
    if article.date.is_empty() {
        today()
    } else {
        article.date.clone()
    }
}

fn author(article: &Article) -> &str {
    if article.author.is_empty() {
        DEFAULT_AUTHOR
    } else {
        &article.author
    }
}

fn section(article: &Article) -> &str {
    if article.category.is_empty() {
        "General"
    } else {
        &article.category
    }
}

fn image_url(article: &Article, site: &SiteConfig) -> String {
    article
        .image
        .as_deref()
        .filter(|i| !i.is_empty())
        .map(|i| site.absolute_url(i))
        .unwrap_or_default()
}

/// JSON-LD `Article` object for the page head; `url` is the page's canonical URL.
#[must_use]
pub fn structured_data(article: &Article, url: &str, site: &SiteConfig) -> Value {
    let date = published(article);
    json!({
        "@context": "https://schema.org",
        "@type": "Article",
        "headline": article.title,
        "description": article.excerpt,
        "image": image_url(article, site),
        "datePublished": date,
        "dateModified": date,
        "author": {
            "@type": "Person",
            "name": author(article),
        },
        "publisher": {
            "@type": "Organization",
            "name": site.name,
            "logo": {
                "@type": "ImageObject",
                "url": site.logo.as_deref().map(|l| site.absolute_url(l)).unwrap_or_default(),
            },
        },
        "mainEntityOfPage": {
            "@type": "WebPage",
            "@id": url,
        },
        "articleSection": section(article),
    })
}

/// Open Graph `property`/`content` pairs.
#[must_use]
pub fn open_graph_tags(article: &Article, url: &str, site: &SiteConfig) -> Vec<(&'static str, String)> {
    vec![
        ("og:type", "article".to_string()),
        ("og:title", article.title.clone()),
        ("og:description", article.excerpt.clone()),
        ("og:image", image_url(article, site)),
        ("og:url", url.to_string()),
        ("og:site_name", site.name.clone()),
        ("article:published_time", published(article)),
        ("article:author", author(article).to_string()),
        ("article:section", section(article).to_string()),
    ]
}

/// Twitter Card `name`/`content` pairs.
#[must_use]
pub fn twitter_tags(article: &Article, site: &SiteConfig) -> Vec<(&'static str, String)> {
    vec![
        ("twitter:card", "summary_large_image".to_string()),
        ("twitter:title", article.title.clone()),
        ("twitter:description", article.excerpt.clone()),
        ("twitter:image", image_url(article, site)),
        ("twitter:site", site.twitter_handle.clone().unwrap_or_default()),
    ]
}

fn contains_any(text: &str, words: &[&str]) -> bool {
    let lower = text.to_lowercase();
    words.iter().any(|w| lower.contains(w))
}

/// `<a` followed by whitespace and then `href`.
fn count_links(lower: &str) -> usize {
    memchr::memmem::find_iter(lower.as_bytes(), b"<a")
        .filter(|&at| {
            let rest = &lower[at + 2..];
            let trimmed = rest.trim_start();
            trimmed.len() < rest.len() && trimmed.starts_with("href")
        })
        .count()
}

fn scored(score: f64, item: &str, passed: bool, checks: &mut Vec<Check>) -> f64 {
    checks.push(if passed {
        Check::pass(item)
    } else {
        Check::fail(item, None)
    });
    if passed { score } else { 0.0 }
}

#[derive(Debug, Clone, Copy)]
struct TitleSeo;

impl Criterion for TitleSeo {
    fn name(&self) -> &'static str {
        "title"
    }

    fn evaluate(&self, article: &Article) -> CriterionScore {
        let title = &article.title;
        let len = title.chars().count();
        let mut checks = Vec::new();
        let mut score = 0.0;

        if is_optimal_title_len(len) {
            score += 30.0;
            checks.push(Check::pass("Title length"));
        } else {
            let advice = if len < 30 { "Title is too short" } else { "Title is too long" };
            checks.push(Check::fail("Title length", Some(advice.to_string())));
        }
        score += scored(20.0, "Title keywords", title.split_whitespace().count() >= 3, &mut checks);
        score += scored(20.0, "Power words", contains_any(title, POWER_WORDS), &mut checks);
        score += scored(
            15.0,
            "Numbers in title",
            title.chars().any(|c| c.is_ascii_digit()),
            &mut checks,
        );
        score += scored(15.0, "Title present", !title.is_empty(), &mut checks);

        CriterionScore { score, checks }
    }
}

#[derive(Debug, Clone, Copy)]
struct MetaSeo;

impl Criterion for MetaSeo {
    fn name(&self) -> &'static str {
        "meta"
    }

    fn evaluate(&self, article: &Article) -> CriterionScore {
        let excerpt = &article.excerpt;
        let len = excerpt.chars().count();
        let mut checks = Vec::new();
        let mut score = 0.0;

        if is_optimal_excerpt_len(len) {
            score += 40.0;
            checks.push(Check::pass("Meta length"));
        } else {
            let advice = if len < 120 {
                "Meta description is too short"
            } else {
                "Meta description is too long"
            };
            checks.push(Check::fail("Meta length", Some(advice.to_string())));
        }
        score += scored(
            30.0,
            "Meta keywords",
            excerpt.split_whitespace().count() >= 10,
            &mut checks,
        );
        score += scored(
            30.0,
            "Call to action",
            contains_any(excerpt, CALL_TO_ACTION_WORDS),
            &mut checks,
        );

        CriterionScore { score, checks }
    }
}

#[derive(Debug, Clone, Copy)]
struct ContentSeo;

impl Criterion for ContentSeo {
    fn name(&self) -> &'static str {
        "content"
    }

    fn evaluate(&self, article: &Article) -> CriterionScore {
        let lower = article.content.to_lowercase();
        let words = word_count(&article.content);
        let lists = count_occurrences(&lower, "<ul>") + count_occurrences(&lower, "<ol>");
        let mut checks = Vec::new();
        let mut score = 0.0;

        if words >= 300 {
            score += 25.0;
            checks.push(Check::pass("Word count"));
        } else {
            checks.push(Check::fail(
                "Word count",
                Some("Content is too short (aim for 300+ words)".to_string()),
            ));
        }
        score += scored(20.0, "Paragraphs", count_occurrences(&lower, "<p>") >= 5, &mut checks);
        score += scored(20.0, "Headings", count_headings(&lower) >= 2, &mut checks);
        score += scored(15.0, "Lists", lists >= 1, &mut checks);
        score += scored(20.0, "Links", count_links(&lower) >= 2, &mut checks);

        CriterionScore { score, checks }
    }
}

#[derive(Debug, Clone, Copy)]
struct HeadingSeo;

impl Criterion for HeadingSeo {
    fn name(&self) -> &'static str {
        "structure"
    }

    fn evaluate(&self, article: &Article) -> CriterionScore {
        let levels = HeadingLevels::scan(&article.content);
        let mut checks = Vec::new();
        let mut score = 0.0;

        if levels.h1 {
            score += 30.0;
            checks.push(Check::pass("H1 heading"));
        } else {
            checks.push(Check::fail("H1 heading", Some("Add an H1 heading".to_string())));
        }
        if levels.h2 {
            score += 30.0;
            checks.push(Check::pass("H2 headings"));
        } else {
            let advice = levels.h1.then(|| "Add H2 headings for structure".to_string());
            checks.push(Check::fail("H2 headings", advice));
        }
        score += scored(20.0, "H3 headings", levels.h3, &mut checks);
        score += scored(20.0, "Heading hierarchy", levels.h1 && levels.h2, &mut checks);

        CriterionScore { score, checks }
    }
}

/// Pages render the featured image with the title as its alt text, so an
/// image paired with a non-empty title counts as described.
#[derive(Debug, Clone, Copy)]
struct ImageSeo;

impl Criterion for ImageSeo {
    fn name(&self) -> &'static str {
        "images"
    }

    fn evaluate(&self, article: &Article) -> CriterionScore {
        let has_image = article.image.as_deref().is_some_and(|i| !i.is_empty());
        let has_alt = has_image && !article.title.trim().is_empty();
        let mut checks = Vec::new();
        let mut score = 0.0;

        if has_image {
            score += 50.0;
            checks.push(Check::pass("Featured image"));
        } else {
            checks.push(Check::fail("Featured image", Some("Add a featured image".to_string())));
        }
        if has_alt {
            score += 50.0;
            checks.push(Check::pass("Alt text"));
        } else {
            let advice = has_image.then(|| "Add alt text to images".to_string());
            checks.push(Check::fail("Alt text", advice));
        }

        CriterionScore { score, checks }
    }
}

#[derive(Debug, Clone, Copy)]
struct UrlSeo;

impl Criterion for UrlSeo {
    fn name(&self) -> &'static str {
        "url"
    }

    fn evaluate(&self, article: &Article) -> CriterionScore {
        let slug = article.slug();
        let readable = !slug.is_empty()
            && slug
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
        let mut checks = Vec::new();
        let mut score = 0.0;

        if slug.len() <= MAX_SLUG_LEN {
            score += 40.0;
            checks.push(Check::pass("Slug length"));
        } else {
            checks.push(Check::fail("Slug length", Some("URL slug is too long".to_string())));
        }
        score += scored(30.0, "Hyphenated slug", slug.contains('-'), &mut checks);
        score += scored(30.0, "Readable slug", readable, &mut checks);

        CriterionScore { score, checks }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> SiteConfig {
        SiteConfig {
            name: "Test Site".to_string(),
            domain: "example.com".to_string(),
            twitter_handle: Some("@testsite".to_string()),
            ..SiteConfig::default()
        }
    }

    fn strong_article() -> Article {
        let paragraph = "<p>Dashboards turn raw numbers into decisions that teams can act on every single \
                         day, and the best ones stay simple. <a href=\"/a\">one</a> <a href=\"/b\">two</a></p>";
        Article {
            title: "The Complete Guide to 5 Power BI Dashboards".to_string(),
            excerpt: "Discover how five practical Power BI dashboards help teams spot trends early, \
                      cut reporting time and explain results clearly."
                .to_string(),
            content: format!(
                "<h1>Dashboards</h1><h2>Why</h2><h3>How</h3>{}<ul><li>one</li></ul>",
                paragraph.repeat(15)
            ),
            author: "Ada".to_string(),
            date: "2024-01-01".to_string(),
            category: "Guides".to_string(),
            image: Some("/images/abc.jpg".to_string()),
            ..Article::default()
        }
    }

    #[test]
    fn test_strong_article_scores_high() {
        let analysis = SeoOptimizer::new().analyze(&strong_article());

        assert!((analysis.scores.title - 100.0).abs() < 1e-9);
        assert!((analysis.scores.meta - 100.0).abs() < 1e-9);
        assert!((analysis.scores.content - 100.0).abs() < 1e-9);
        assert!((analysis.scores.structure - 100.0).abs() < 1e-9);
        assert!((analysis.scores.images - 100.0).abs() < 1e-9);
        assert!((analysis.scores.url - 100.0).abs() < 1e-9);
        assert_eq!(analysis.grade, "A+");
        assert!(analysis.issues.is_empty());
        assert!(analysis.recommendations.is_empty());
    }

    #[test]
    fn test_empty_article() {
        let analysis = SeoOptimizer::new().analyze(&Article::default());

        assert!((analysis.scores.url - 40.0).abs() < 1e-9);
        assert!((analysis.scores.overall - 4.0).abs() < 1e-9);
        assert_eq!(analysis.grade, "F");
        assert_eq!(
            analysis.issues,
            vec![
                "Title is too short",
                "Meta description is too short",
                "Content is too short (aim for 300+ words)",
                "Add an H1 heading",
                "Add a featured image",
            ]
        );
        assert_eq!(analysis.recommendations.len(), 4);
    }

    #[test]
    fn test_title_suggestions() {
        let mut article = Article {
            title: "x".repeat(61),
            ..Article::default()
        };
        let result = TitleSeo.evaluate(&article);
        assert_eq!(result.checks[0].message.as_deref(), Some("Title is too long"));

        article.title = "Why Rivers Matter".to_string();
        assert!((TitleSeo.evaluate(&article).score - 55.0).abs() < 1e-9);
    }

    #[test]
    fn test_structure_advice_order() {
        let article = Article {
            content: "<h1 class=\"t\">Only</h1>".to_string(),
            ..Article::default()
        };
        let result = HeadingSeo.evaluate(&article);
        assert!((result.score - 30.0).abs() < 1e-9);
        let advice: Vec<_> = result.checks.iter().filter_map(|c| c.message.as_deref()).collect();
        assert_eq!(advice, vec!["Add H2 headings for structure"]);
    }

    #[test]
    fn test_count_links() {
        assert_eq!(count_links("<a href=\"x\"><a\n  href='y'><ahref=\"z\"><abbr>"), 2);
    }

    #[test]
    fn test_structured_data() {
        let article = strong_article();
        let url = article_url(&article.slug(), &site());
        let data = structured_data(&article, &url, &site());

        assert_eq!(data["@type"], "Article");
        assert_eq!(data["author"]["name"], "Ada");
        assert_eq!(data["publisher"]["name"], "Test Site");
        assert_eq!(data["image"], "https://example.com/images/abc.jpg");
        assert_eq!(
            data["mainEntityOfPage"]["@id"],
            "https://example.com/articles/the-complete-guide-to-5-power-bi-dashboards.html"
        );
    }

    #[test]
    fn test_social_tags_fall_back() {
        let article = Article {
            title: "Soil".to_string(),
            ..Article::default()
        };
        let og = open_graph_tags(&article, "https://example.com/articles/soil.html", &site());
        let lookup = |key: &str| og.iter().find(|(k, _)| *k == key).map(|(_, v)| v.clone());

        assert_eq!(lookup("article:author").as_deref(), Some(DEFAULT_AUTHOR));
        assert_eq!(lookup("article:section").as_deref(), Some("General"));
        assert_eq!(lookup("og:image").as_deref(), Some(""));
        assert_eq!(
            lookup("og:url").as_deref(),
            Some("https://example.com/articles/soil.html")
        );

        let twitter = twitter_tags(&article, &site());
        assert_eq!(twitter[0], ("twitter:card", "summary_large_image".to_string()));
        assert_eq!(twitter[4].1, "@testsite");
    }
}
