//! Topic catalog plus the style and angle presets articles are written in.

use serde::Serialize;
use std::{collections::BTreeMap, fmt};

/// Topic category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Ecology and the environment
    Nature,
    /// Cognition and attention
    Mind,
    /// Social systems
    Society,
    /// Technology and its effects
    Technology,
    /// Markets and value
    Economy,
    /// Ethics and meaning
    Philosophy,
    /// Health and wellness
    Health,
    /// Learning
    Education,
    /// Communication skills
    Communication,
    /// Institutions and policy
    Governance,
}

impl Category {
    /// Returns the ID string for this category.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Nature => "nature",
            Self::Mind => "mind",
            Self::Society => "society",
            Self::Technology => "technology",
            Self::Economy => "economy",
            Self::Philosophy => "philosophy",
            Self::Health => "health",
            Self::Education => "education",
            Self::Communication => "communication",
            Self::Governance => "governance",
        }
    }

    /// Returns all categories in catalog order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Nature,
            Self::Mind,
            Self::Society,
            Self::Technology,
            Self::Economy,
            Self::Philosophy,
            Self::Health,
            Self::Education,
            Self::Communication,
            Self::Governance,
        ]
    }

    /// Parse category from its ID, ignoring case.
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|c| c.id().eq_ignore_ascii_case(id.trim()))
    }

    /// Display label, e.g. `Nature`.
    #[must_use]
    pub fn label(self) -> String {
        slug_to_title(self.id())
    }

    /// Topic slugs filed under this category.
    #[must_use]
    pub const fn slugs(self) -> &'static [&'static str] {
        match self {
            Self::Nature => &[
                "coastal-erosion",
                "climate-feedbacks",
                "ocean-acidification",
                "biodiversity-loss",
                "resource-depletion",
                "ecosystem-restoration",
                "sustainable-agriculture",
                "renewable-energy-transition",
                "water-security",
                "wildlife-conservation",
            ],
            Self::Mind => &[
                "attention-economy",
                "sleep-architecture",
                "memory-consolidation",
                "cognitive-load",
                "decision-fatigue",
                "mindfulness-practice",
                "neuroplasticity",
                "focus-training",
                "mental-models",
                "cognitive-biases",
            ],
            Self::Society => &[
                "polarization",
                "urban-design",
                "social-cohesion",
                "information-cascades",
                "collective-intelligence",
                "community-building",
                "civic-engagement",
                "social-capital",
                "cultural-evolution",
                "democratic-participation",
            ],
            Self::Technology => &[
                "ai-alignment",
                "algorithmic-bias",
                "network-effects",
                "platform-governance",
                "privacy-tradeoffs",
                "ethical-ai",
                "digital-divide",
                "cybersecurity",
                "data-sovereignty",
                "technological-determinism",
            ],
            Self::Economy => &[
                "incentive-design",
                "market-failures",
                "behavioral-economics",
                "value-creation",
                "systemic-risk",
                "circular-economy",
                "sharing-economy",
                "economic-inequality",
                "sustainable-growth",
                "regenerative-economics",
            ],
            Self::Philosophy => &[
                "virtue-ethics",
                "stoic-practice",
                "existential-meaning",
                "moral-development",
                "wisdom-tradition",
                "philosophical-inquiry",
                "ethics-of-care",
                "justice-theory",
                "metaphysical-foundations",
                "practical-wisdom",
            ],
            Self::Health => &[
                "preventive-medicine",
                "mental-health",
                "lifestyle-medicine",
                "wellness-practice",
                "holistic-health",
                "public-health",
                "health-equity",
                "longevity-research",
                "integrative-medicine",
                "health-literacy",
            ],
            Self::Education => &[
                "lifelong-learning",
                "critical-thinking",
                "educational-innovation",
                "personalized-learning",
                "education-equity",
                "skills-development",
                "learning-sciences",
                "pedagogical-methods",
                "educational-technology",
                "knowledge-construction",
            ],
            Self::Communication => &[
                "rhetorical-strategy",
                "persuasive-communication",
                "active-listening",
                "nonviolent-communication",
                "public-speaking",
                "narrative-persuasion",
                "digital-communication",
                "interpersonal-skills",
                "communication-ethics",
                "effective-messaging",
            ],
            Self::Governance => &[
                "democratic-institutions",
                "policy-design",
                "civic-participation",
                "transparency-accountability",
                "institutional-reform",
                "public-administration",
                "governance-models",
                "policy-innovation",
                "citizen-engagement",
                "institutional-trust",
            ],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// A catalog topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Topic {
    /// URL-style identifier, e.g. `coastal-erosion`
    pub slug: String,
    /// Category the topic is filed under
    pub category: Category,
    /// Readable title, e.g. `Coastal Erosion`
    pub title: String,
}

impl Topic {
    /// `category: Title`
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}: {}", self.category, self.title)
    }
}

/// Every catalog topic, grouped by category.
#[derive(Debug, Clone)]
pub struct TopicCatalog {
    topics: Vec<Topic>,
}

impl Default for TopicCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl TopicCatalog {
    /// Builds the catalog from the built-in topic lists.
    #[must_use]
    pub fn new() -> Self {
        let topics = Category::all()
            .iter()
            .flat_map(|&category| {
                category.slugs().iter().map(move |slug| Topic {
                    slug: (*slug).to_string(),
                    category,
                    title: slug_to_title(slug),
                })
            })
            .collect();
        Self { topics }
    }

    /// All topics in catalog order.
    #[must_use]
    pub fn all(&self) -> &[Topic] {
        &self.topics
    }

    /// Topics of one category.
    pub fn by_category(&self, category: Category) -> impl Iterator<Item = &Topic> {
        self.topics.iter().filter(move |t| t.category == category)
    }

    /// Looks up a topic by slug.
    #[must_use]
    pub fn by_slug(&self, slug: &str) -> Option<&Topic> {
        self.topics.iter().find(|t| t.slug == slug)
    }

    /// Topic at `index`, wrapping around the catalog.
    #[must_use]
    pub fn nth_cyclic(&self, index: usize) -> Option<&Topic> {
        if self.topics.is_empty() {
            return None;
        }
        self.topics.get(index % self.topics.len())
    }

    /// Number of topics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Topic count per category.
    #[must_use]
    pub fn counts(&self) -> BTreeMap<Category, usize> {
        let mut counts = BTreeMap::new();
        for topic in &self.topics {
            *counts.entry(topic.category).or_insert(0) += 1;
        }
        counts
    }
}

/// Article length preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStyle {
    /// 400-700 words, two sections
    Short,
    /// 800-1200 words, three sections
    #[default]
    Medium,
    /// 1500-2500 words, five sections
    Long,
    /// 2500-4000 words, seven sections
    Feature,
}

impl ArticleStyle {
    /// Returns the ID string for this style.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Medium => "medium",
            Self::Long => "long",
            Self::Feature => "feature",
        }
    }

    /// Returns all styles.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Short, Self::Medium, Self::Long, Self::Feature]
    }

    /// Parse style from its ID.
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|s| s.id().eq_ignore_ascii_case(id.trim()))
    }

    /// Inclusive word count range.
    #[must_use]
    pub const fn word_range(self) -> (usize, usize) {
        match self {
            Self::Short => (400, 700),
            Self::Medium => (800, 1200),
            Self::Long => (1500, 2500),
            Self::Feature => (2500, 4000),
        }
    }

    /// Inclusive reading time range in minutes.
    #[must_use]
    pub const fn read_time_range(self) -> (usize, usize) {
        match self {
            Self::Short => (2, 4),
            Self::Medium => (5, 7),
            Self::Long => (8, 12),
            Self::Feature => (13, 18),
        }
    }

    /// Number of main sections.
    #[must_use]
    pub const fn sections(self) -> usize {
        match self {
            Self::Short => 2,
            Self::Medium => 3,
            Self::Long => 5,
            Self::Feature => 7,
        }
    }

    /// How deep the article goes.
    #[must_use]
    pub const fn depth(self) -> &'static str {
        match self {
            Self::Short => "overview",
            Self::Medium => "moderate",
            Self::Long => "comprehensive",
            Self::Feature => "deep-dive",
        }
    }

    /// Prose style hint.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Short => "brief, concise, actionable",
            Self::Medium => "balanced, informative, engaging",
            Self::Long => "in-depth, detailed, thorough",
            Self::Feature => "narrative, immersive, comprehensive",
        }
    }

    /// Target word count: the middle of the range.
    #[must_use]
    pub const fn target_words(self) -> usize {
        let (min, max) = self.word_range();
        (min + max) / 2
    }

    /// Target reading time: the middle of the range.
    #[must_use]
    pub const fn target_read_time(self) -> usize {
        let (min, max) = self.read_time_range();
        (min + max) / 2
    }
}

impl fmt::Display for ArticleStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Point of view an article is written from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Angle {
    /// Expert analyst
    #[default]
    Analytical,
    /// Wise observer
    Reflective,
    /// Practical guide
    Practical,
    /// Storyteller
    Narrative,
    /// Philosopher
    Philosophical,
    /// Journalist
    Journalistic,
}

impl Angle {
    /// Returns the ID string for this angle.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Analytical => "analytical",
            Self::Reflective => "reflective",
            Self::Practical => "practical",
            Self::Narrative => "narrative",
            Self::Philosophical => "philosophical",
            Self::Journalistic => "journalistic",
        }
    }

    /// Returns all angles.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Analytical,
            Self::Reflective,
            Self::Practical,
            Self::Narrative,
            Self::Philosophical,
            Self::Journalistic,
        ]
    }

    /// Parse angle from its ID.
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|a| a.id().eq_ignore_ascii_case(id.trim()))
    }

    /// Tone words.
    #[must_use]
    pub const fn tone(self) -> &'static str {
        match self {
            Self::Analytical => "objective, data-driven, systematic",
            Self::Reflective => "thoughtful, contemplative, introspective",
            Self::Practical => "actionable, direct, solution-oriented",
            Self::Narrative => "storytelling, engaging, human-centered",
            Self::Philosophical => "deep, questioning, contemplative",
            Self::Journalistic => "factual, balanced, investigative",
        }
    }

    /// What the article concentrates on.
    #[must_use]
    pub const fn focus(self) -> &'static str {
        match self {
            Self::Analytical => "analysis, patterns, implications",
            Self::Reflective => "meaning, significance, personal reflection",
            Self::Practical => "how-to, application, implementation",
            Self::Narrative => "stories, experiences, human impact",
            Self::Philosophical => "principles, values, deeper meaning",
            Self::Journalistic => "reporting, context, multiple perspectives",
        }
    }

    /// Persona the writer adopts.
    #[must_use]
    pub const fn voice(self) -> &'static str {
        match self {
            Self::Analytical => "expert analyst",
            Self::Reflective => "wise observer",
            Self::Practical => "practical guide",
            Self::Narrative => "storyteller",
            Self::Philosophical => "philosopher",
            Self::Journalistic => "journalist",
        }
    }
}

impl fmt::Display for Angle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// `coastal-erosion` becomes `Coastal Erosion`.
#[must_use]
pub fn slug_to_title(slug: &str) -> String {
    slug.split('-')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_has_ten_topics_per_category() {
        let catalog = TopicCatalog::new();
        assert_eq!(catalog.len(), 100);
        assert!(catalog.counts().values().all(|&n| n == 10));
        assert_eq!(catalog.by_category(Category::Mind).count(), 10);
    }

    #[test]
    fn test_lookup_by_slug() {
        let catalog = TopicCatalog::new();
        let topic = catalog.by_slug("ai-alignment").unwrap();
        assert_eq!(topic.title, "Ai Alignment");
        assert_eq!(topic.category, Category::Technology);
        assert_eq!(topic.full_name(), "technology: Ai Alignment");
        assert!(catalog.by_slug("nope").is_none());
    }

    #[test]
    fn test_nth_cyclic_wraps() {
        let catalog = TopicCatalog::new();
        assert_eq!(catalog.nth_cyclic(0), catalog.nth_cyclic(100));
        assert_eq!(catalog.nth_cyclic(0).unwrap().slug, "coastal-erosion");
    }

    #[test]
    fn test_style_targets() {
        assert_eq!(ArticleStyle::Short.target_words(), 550);
        assert_eq!(ArticleStyle::Medium.target_read_time(), 6);
        assert_eq!(ArticleStyle::Long.sections(), 5);
        assert_eq!(ArticleStyle::from_id("FEATURE"), Some(ArticleStyle::Feature));
        assert_eq!(ArticleStyle::from_id("huge"), None);
    }

    #[test]
    fn test_ids_round_trip() {
        for &category in Category::all() {
            assert_eq!(Category::from_id(category.id()), Some(category));
        }
        for &angle in Angle::all() {
            assert_eq!(Angle::from_id(angle.id()), Some(angle));
        }
        assert_eq!(Category::Health.label(), "Health");
    }

    #[test]
    fn test_slug_to_title() {
        assert_eq!(slug_to_title("ethics-of-care"), "Ethics Of Care");
        assert_eq!(slug_to_title("polarization"), "Polarization");
        assert_eq!(slug_to_title(""), "");
    }
}
