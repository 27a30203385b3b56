//! Heuristic article scoring.
//!
//! Scores are built from [`Criterion`] implementations combined by a
//! [`WeightedScorer`]. The same interface backs the SEO analysis in
//! [`crate::seo`]. Everything here is pure: scoring an unchanged article
//! twice gives identical results.

use crate::article::{strip_html, word_count, Article};
use memchr::memmem;
use serde::{Deserialize, Serialize};

const READABILITY_DEFAULT: f64 = 50.0;
const LOW_SCORE: f64 = 60.0;

/// Result of one check inside a criterion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    /// What was checked
    pub item: String,
    /// Whether it passed
    pub passed: bool,
    /// Advice when it did not
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Check {
    /// A passing check.
    #[must_use]
    pub fn pass(item: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            passed: true,
            message: None,
        }
    }

    /// A failing check with optional advice.
    #[must_use]
    pub fn fail(item: impl Into<String>, message: Option<String>) -> Self {
        Self {
            item: item.into(),
            passed: false,
            message,
        }
    }

    /// Advice for a failed check.
    #[must_use]
    pub fn advice(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| format!("Improve {}", self.item))
    }
}

/// Score of one criterion on a 0–100 scale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CriterionScore {
    /// 0–100
    pub score: f64,
    /// Individual findings
    pub checks: Vec<Check>,
}

impl CriterionScore {
    /// Score without findings.
    #[must_use]
    pub const fn bare(score: f64) -> Self {
        Self {
            score,
            checks: Vec::new(),
        }
    }
}

/// One scoring dimension.
pub trait Criterion: Send + Sync {
    /// Key the score is reported under.
    fn name(&self) -> &'static str;

    /// Scores an article.
    fn evaluate(&self, article: &Article) -> CriterionScore;
}

/// Criteria combined by weight.
#[derive(Default)]
pub struct WeightedScorer {
    criteria: Vec<(Box<dyn Criterion>, f64)>,
}

impl std::fmt::Debug for WeightedScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.criteria.iter().map(|(c, w)| (c.name(), w)))
            .finish()
    }
}

/// Output of [`WeightedScorer::score`].
#[derive(Debug, Clone, PartialEq)]
pub struct Scorecard {
    /// Per-criterion scores in registration order
    pub parts: Vec<(&'static str, CriterionScore)>,
    /// Weighted sum
    pub overall: f64,
}

impl Scorecard {
    /// Score of a named criterion, zero if absent.
    #[must_use]
    pub fn score_of(&self, name: &str) -> f64 {
        self.part(name).map_or(0.0, |p| p.score)
    }

    /// Full result of a named criterion.
    #[must_use]
    pub fn part(&self, name: &str) -> Option<&CriterionScore> {
        self.parts.iter().find(|(n, _)| *n == name).map(|(_, p)| p)
    }
}

impl WeightedScorer {
    /// Empty scorer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a criterion with its weight.
    #[must_use]
    pub fn with(mut self, weight: f64, criterion: impl Criterion + 'static) -> Self {
        self.criteria.push((Box::new(criterion), weight));
        self
    }

    /// Evaluates every criterion and combines them.
    #[must_use]
    pub fn score(&self, article: &Article) -> Scorecard {
        let parts: Vec<_> = self
            .criteria
            .iter()
            .map(|(criterion, _)| (criterion.name(), criterion.evaluate(article)))
            .collect();
        let overall = parts
            .iter()
            .zip(&self.criteria)
            .map(|((_, part), (_, weight))| part.score * weight)
            .sum();

        Scorecard { parts, overall }
    }
}

/// Dimension scores of a [`QualityReport`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityScores {
    /// Simplified Flesch reading ease
    pub readability: f64,
    /// Field-length and heading checklist
    pub seo: f64,
    /// Headings, paragraphs and lists
    pub structure: f64,
    /// Hook, excerpt, category and reading time
    pub engagement: f64,
    /// Weighted blend
    pub overall: f64,
}

/// Quality assessment attached to an article.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Dimension scores
    pub scores: QualityScores,
    /// Letter grade of the overall score
    pub grade: String,
    /// Improvement advice
    pub recommendations: Vec<String>,
}

/// Letter grade for a 0–100 score.
#[must_use]
pub fn grade(score: f64) -> &'static str {
    match score {
        s if s >= 90.0 => "A+",
        s if s >= 80.0 => "A",
        s if s >= 70.0 => "B",
        s if s >= 60.0 => "C",
        s if s >= 50.0 => "D",
        _ => "F",
    }
}

/// Readability, SEO, structure and engagement at 30/30/20/20.
#[derive(Debug)]
pub struct QualityScorer {
    scorer: WeightedScorer,
}

impl Default for QualityScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl QualityScorer {
    /// Scorer with the standard weights.
    #[must_use]
    pub fn new() -> Self {
        Self {
            scorer: WeightedScorer::new()
                .with(0.3, Readability)
                .with(0.3, SeoChecklist)
                .with(0.2, Structure)
                .with(0.2, Engagement),
        }
    }

    /// Scores an article.
    #[must_use]
    pub fn score_article(&self, article: &Article) -> QualityReport {
        let card = self.scorer.score(article);
        let scores = QualityScores {
            readability: card.score_of(Readability.name()),
            seo: card.score_of(SeoChecklist.name()),
            structure: card.score_of(Structure.name()),
            engagement: card.score_of(Engagement.name()),
            overall: card.overall,
        };

        let mut recommendations = Vec::new();
        if scores.readability < LOW_SCORE {
            recommendations
                .push("Improve readability: Use shorter sentences and simpler words".to_string());
        }
        if scores.seo < LOW_SCORE {
            if let Some(seo) = card.part(SeoChecklist.name()) {
                recommendations.extend(seo.checks.iter().filter(|c| !c.passed).map(Check::advice));
            }
        }
        if scores.structure < LOW_SCORE {
            recommendations.push(
                "Improve structure: Add more headings, paragraphs, and formatting".to_string(),
            );
        }
        if scores.engagement < LOW_SCORE {
            recommendations
                .push("Improve engagement: Make title and excerpt more compelling".to_string());
        }

        QualityReport {
            scores,
            grade: grade(scores.overall).to_string(),
            recommendations,
        }
    }
}

/// Simplified Flesch reading ease over title, excerpt and body.
#[derive(Debug, Clone, Copy)]
pub struct Readability;

impl Criterion for Readability {
    fn name(&self) -> &'static str {
        "readability"
    }

    #[allow(clippy::cast_precision_loss)]
    fn evaluate(&self, article: &Article) -> CriterionScore {
        let text = format!(
            "{} {} {}",
            article.title,
            article.excerpt,
            strip_html(&article.content)
        );
        let sentences = count_sentences(&text);
        let words: Vec<&str> = text.split_whitespace().collect();
        if sentences == 0 || words.is_empty() {
            return CriterionScore::bare(READABILITY_DEFAULT);
        }

        let syllables = estimate_syllables(&words.join(" "));
        let words_per_sentence = words.len() as f64 / sentences as f64;
        let syllables_per_word = syllables as f64 / words.len() as f64;
        let score = 206.835 - 1.015 * words_per_sentence - 84.6 * syllables_per_word;

        CriterionScore::bare(score.clamp(0.0, 100.0))
    }
}

/// Title, excerpt, length, headings and image, 20 points each.
#[derive(Debug, Clone, Copy)]
pub struct SeoChecklist;

impl Criterion for SeoChecklist {
    fn name(&self) -> &'static str {
        "seo"
    }

    fn evaluate(&self, article: &Article) -> CriterionScore {
        let mut score = 0.0;
        let mut checks = Vec::new();

        let title_len = article.title.chars().count();
        if is_optimal_title_len(title_len) {
            score += 20.0;
            checks.push(Check::pass("Title length"));
        } else {
            checks.push(Check::fail(
                "Title length",
                Some(format!("Title should be 30-60 characters (current: {title_len})")),
            ));
        }

        let excerpt_len = article.excerpt.chars().count();
        if is_optimal_excerpt_len(excerpt_len) {
            score += 20.0;
            checks.push(Check::pass("Meta description"));
        } else {
            checks.push(Check::fail(
                "Meta description",
                Some(format!(
                    "Excerpt should be 120-160 characters (current: {excerpt_len})"
                )),
            ));
        }

        let words = word_count(&article.content);
        if (300..=5000).contains(&words) {
            score += 20.0;
            checks.push(Check::pass("Content length"));
        } else {
            checks.push(Check::fail(
                "Content length",
                Some(format!("Content should be 300-5000 words (current: {words})")),
            ));
        }

        let headings = HeadingLevels::scan(&article.content);
        if headings.h1 || headings.h2 {
            let weight = headings.weight();
            score += weight * 20.0;
            if weight >= 0.5 {
                checks.push(Check::pass("Heading structure"));
            } else {
                checks.push(Check::fail("Heading structure", None));
            }
        } else {
            checks.push(Check::fail(
                "Heading structure",
                Some("Add H1 and H2 headings for better structure".to_string()),
            ));
        }

        if article.image.as_deref().is_some_and(|i| !i.is_empty()) {
            score += 20.0;
            checks.push(Check::pass("Image presence"));
        } else {
            checks.push(Check::fail(
                "Image presence",
                Some("Add a featured image".to_string()),
            ));
        }

        CriterionScore { score, checks }
    }
}

/// Intro length, headings, paragraphs and lists, 25 points each.
#[derive(Debug, Clone, Copy)]
pub struct Structure;

impl Criterion for Structure {
    fn name(&self) -> &'static str {
        "structure"
    }

    fn evaluate(&self, article: &Article) -> CriterionScore {
        let content = &article.content;
        let lower = content.to_lowercase();
        let mut score = 0.0;

        if content.chars().count() > 100 {
            score += 25.0;
        }
        if count_headings(&lower) >= 2 {
            score += 25.0;
        }
        if count_occurrences(&lower, "<p>") >= 3 {
            score += 25.0;
        }
        if ["<ul>", "<ol>", "<blockquote>"]
            .iter()
            .any(|tag| lower.contains(tag))
        {
            score += 25.0;
        }

        CriterionScore::bare(score)
    }
}

/// Hooky title, substantial excerpt, category and a sane reading time.
#[derive(Debug, Clone, Copy)]
pub struct Engagement;

impl Criterion for Engagement {
    fn name(&self) -> &'static str {
        "engagement"
    }

    fn evaluate(&self, article: &Article) -> CriterionScore {
        let mut score = 0.0;
        let title = &article.title;

        if title.contains('?') || title.contains("How") || title.contains("Why") {
            score += 30.0;
        } else if !title.is_empty() {
            score += 15.0;
        }

        if article.excerpt.chars().count() > 50 {
            score += 30.0;
        } else if !article.excerpt.is_empty() {
            score += 15.0;
        }

        if !article.category.is_empty() {
            score += 20.0;
        }

        if leading_int(&article.read_time).is_some_and(|minutes| (3..=15).contains(&minutes)) {
            score += 20.0;
        }

        CriterionScore::bare(score)
    }
}

/// Title length between 30 and 60 characters inclusive.
#[must_use]
pub const fn is_optimal_title_len(len: usize) -> bool {
    len >= 30 && len <= 60
}

/// Excerpt length between 120 and 160 characters inclusive.
#[must_use]
pub const fn is_optimal_excerpt_len(len: usize) -> bool {
    len >= 120 && len <= 160
}

/// Which heading levels a body opens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct HeadingLevels {
    pub(crate) h1: bool,
    pub(crate) h2: bool,
    pub(crate) h3: bool,
}

impl HeadingLevels {
    pub(crate) fn scan(html: &str) -> Self {
        let lower = html.to_lowercase();
        Self {
            h1: has_open_tag(&lower, "<h1"),
            h2: has_open_tag(&lower, "<h2"),
            h3: has_open_tag(&lower, "<h3"),
        }
    }

    fn weight(self) -> f64 {
        let mut weight = 0.0;
        if self.h1 {
            weight += 0.5;
        }
        if self.h2 {
            weight += 0.3;
        }
        if self.h3 {
            weight += 0.2;
        }
        weight
    }
}

/// `prefix` followed later by a closing `>`.
fn has_open_tag(lower: &str, prefix: &str) -> bool {
    memmem::find(lower.as_bytes(), prefix.as_bytes())
        .is_some_and(|at| lower[at + prefix.len()..].contains('>'))
}

pub(crate) fn count_occurrences(haystack: &str, needle: &str) -> usize {
    memmem::find_iter(haystack.as_bytes(), needle.as_bytes()).count()
}

/// Bare `<h1>`..`<h6>` tags in lowercased HTML.
pub(crate) fn count_headings(lower: &str) -> usize {
    ["<h1>", "<h2>", "<h3>", "<h4>", "<h5>", "<h6>"]
        .iter()
        .map(|tag| count_occurrences(lower, tag))
        .sum()
}

/// Pieces between runs of `.`, `!` or `?` followed by whitespace.
fn count_sentences(text: &str) -> usize {
    let mut count = 0;
    let mut piece_start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        while chars.next_if(|&(_, d)| matches!(d, '.' | '!' | '?')).is_some() {}
        if let Some((j, d)) = chars.next_if(|&(_, d)| d.is_whitespace()) {
            if i > piece_start {
                count += 1;
            }
            piece_start = j + d.len_utf8();
        }
    }

    if text.len() > piece_start {
        count += 1;
    }
    count
}

/// Vowel-group syllable estimate over a whole text.
fn estimate_syllables(text: &str) -> usize {
    let lower = text.to_lowercase();
    if lower.chars().count() <= 3 {
        return 1;
    }

    let chars: Vec<char> = lower.chars().collect();
    let chars = strip_silent_suffix(&chars);
    let chars = chars.strip_prefix(&['y']).unwrap_or(chars);

    let mut count = 0;
    let mut run = 0usize;
    for &c in chars {
        if matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y') {
            run += 1;
        } else {
            count += run.div_ceil(2);
            run = 0;
        }
    }
    count += run.div_ceil(2);
    count.max(1)
}

/// Drops a trailing `Xes`, `ed` or `Xe` where `X` is not `l` or a vowel.
fn strip_silent_suffix(chars: &[char]) -> &[char] {
    let sounded = |c: char| matches!(c, 'l' | 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
    let n = chars.len();

    if n >= 3 && chars[n - 2] == 'e' && chars[n - 1] == 's' && !sounded(chars[n - 3]) {
        &chars[..n - 3]
    } else if n >= 2 && chars[n - 2] == 'e' && chars[n - 1] == 'd' {
        &chars[..n - 2]
    } else if n >= 2 && chars[n - 1] == 'e' && !sounded(chars[n - 2]) {
        &chars[..n - 2]
    } else {
        chars
    }
}

/// Leading integer of a string such as `5 min read`.
fn leading_int(text: &str) -> Option<i64> {
    let trimmed = text.trim_start();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(title: &str, excerpt: &str, content: &str) -> Article {
        Article {
            title: title.to_string(),
            excerpt: excerpt.to_string(),
            content: content.to_string(),
            ..Article::default()
        }
    }

    fn rich_article() -> Article {
        let paragraph = "<p>Rivers shape valleys over long spans of time. They carry silt to the sea. \
                         Farmers depend on the floods that follow.</p>";
        Article {
            title: "How Rivers Shape the Land Around Us Today".to_string(),
            excerpt: "Rivers carve valleys, feed farms and move mountains one grain at a time. \
                      Learn how water quietly builds the world we live in."
                .to_string(),
            content: format!(
                "<h1>Rivers</h1><h2>Valleys</h2><h3>Silt</h3>{}<ul><li>silt</li></ul>",
                paragraph.repeat(20)
            ),
            category: "Nature".to_string(),
            read_time: "5 min read".to_string(),
            image: Some("https://images.example/r.jpg".to_string()),
            ..Article::default()
        }
    }

    #[test]
    fn test_grade_bands() {
        assert_eq!(grade(95.0), "A+");
        assert_eq!(grade(90.0), "A+");
        assert_eq!(grade(89.9), "A");
        assert_eq!(grade(80.0), "A");
        assert_eq!(grade(70.0), "B");
        assert_eq!(grade(60.0), "C");
        assert_eq!(grade(55.0), "D");
        assert_eq!(grade(50.0), "D");
        assert_eq!(grade(45.0), "F");
    }

    #[test]
    fn test_title_length_boundaries() {
        for (len, optimal) in [(29, false), (30, true), (60, true), (61, false)] {
            let a = article(&"t".repeat(len), "", "");
            let result = SeoChecklist.evaluate(&a);
            assert_eq!(result.checks[0].passed, optimal, "title length {len}");
        }
    }

    #[test]
    fn test_scoring_is_idempotent() {
        let scorer = QualityScorer::new();
        let a = rich_article();
        assert_eq!(scorer.score_article(&a), scorer.score_article(&a));
    }

    #[test]
    fn test_rich_article_scores_well() {
        let report = QualityScorer::new().score_article(&rich_article());

        assert!((report.scores.structure - 100.0).abs() < 1e-9);
        assert!((report.scores.engagement - 100.0).abs() < 1e-9);
        assert!((report.scores.seo - 100.0).abs() < 1e-9);
        assert!(report.scores.overall > 70.0);
        assert!((0.0..=100.0).contains(&report.scores.readability));
    }

    #[test]
    fn test_minimal_article() {
        let report = QualityScorer::new().score_article(&article("Minimal Article", "", ""));

        assert!(report.scores.overall >= 0.0);
        assert_eq!(report.grade, "F");
        assert!(report
            .recommendations
            .iter()
            .any(|r| r == "Add a featured image"));
        assert!(report.recommendations.iter().any(|r| r.starts_with("Improve structure")));
    }

    #[test]
    fn test_readability_defaults_for_empty_text() {
        let score = Readability.evaluate(&article("", "", ""));
        assert!((score.score - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_readability_is_clamped() {
        let a = article(
            "Test Title",
            "Test excerpt",
            "<p>This is a test paragraph with multiple sentences. It has good readability. The sentences are not too long.</p>",
        );
        let score = Readability.evaluate(&a).score;
        assert!((0.0..=100.0).contains(&score));
    }

    #[test]
    fn test_heading_weight() {
        let a = article("t", "", "<h2 class=\"x\">Only h2</h2>");
        let result = SeoChecklist.evaluate(&a);
        assert!((result.score - 6.0).abs() < 1e-9);
        assert!(!result.checks[3].passed);
    }

    #[test]
    fn test_engagement_parts() {
        let mut a = article("A Plain Title", "short", "");
        assert!((Engagement.evaluate(&a).score - 30.0).abs() < f64::EPSILON);

        a.title = "Why Soil Matters".into();
        a.category = "Nature".into();
        a.read_time = "20 min read".into();
        assert!((Engagement.evaluate(&a).score - 65.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_count_sentences() {
        assert_eq!(count_sentences("One. Two! Three?"), 3);
        assert_eq!(count_sentences("Wait... what?! Yes."), 3);
        assert_eq!(count_sentences("No terminator"), 1);
        assert_eq!(count_sentences("3.14 is pi"), 1);
        assert_eq!(count_sentences(""), 0);
    }

    #[test]
    fn test_estimate_syllables() {
        assert_eq!(estimate_syllables("the"), 1);
        assert_eq!(estimate_syllables("beautiful"), 4);
        assert_eq!(estimate_syllables("make"), 1);
        assert_eq!(estimate_syllables("yellow"), 2);
    }

    #[test]
    fn test_leading_int() {
        assert_eq!(leading_int("5 min read"), Some(5));
        assert_eq!(leading_int("  12min"), Some(12));
        assert_eq!(leading_int("soon"), None);
    }

    #[test]
    fn test_weighted_scorer_combines() {
        struct Fixed(&'static str, f64);
        impl Criterion for Fixed {
            fn name(&self) -> &'static str {
                self.0
            }
            fn evaluate(&self, _: &Article) -> CriterionScore {
                CriterionScore::bare(self.1)
            }
        }

        let card = WeightedScorer::new()
            .with(0.25, Fixed("a", 100.0))
            .with(0.75, Fixed("b", 40.0))
            .score(&Article::default());

        assert!((card.overall - 55.0).abs() < 1e-9);
        assert!((card.score_of("b") - 40.0).abs() < f64::EPSILON);
        assert!(card.part("missing").is_none());
    }
}
