//! Lenses: the perspectives a topic can be explored from.

use crate::topics::{ArticleStyle, Category};
use serde::Serialize;
use std::fmt;

/// What a lens asks of the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LensDefinition {
    /// Display name
    pub name: &'static str,
    /// One-line summary
    pub description: &'static str,
    /// Tone words
    pub tone: &'static str,
    /// Themes to emphasize
    pub focus: &'static [&'static str],
    /// Question the article answers
    pub question: &'static str,
    /// Persona
    pub voice: &'static str,
    /// Suggested outline
    pub structure: &'static str,
}

/// A perspective on a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Lens {
    /// Data and patterns
    Analytical,
    /// Meaning and significance
    Reflective,
    /// Step-by-step application
    Practical,
    /// Human stories
    Narrative,
    /// Principles and values
    Philosophical,
    /// Balanced reporting
    Journalistic,
    /// Research and evidence
    Scientific,
    /// Interconnections and feedback loops
    Systems,
    /// Evolution over time
    Historical,
    /// Alternatives and trade-offs
    Comparative,
    /// Assumptions and power
    Critical,
    /// Trends and scenarios
    Future,
}

const DEFAULT_PRIORITY: [Lens; 3] = [Lens::Analytical, Lens::Practical, Lens::Reflective];

impl Lens {
    /// Returns the ID string for this lens.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Analytical => "analytical",
            Self::Reflective => "reflective",
            Self::Practical => "practical",
            Self::Narrative => "narrative",
            Self::Philosophical => "philosophical",
            Self::Journalistic => "journalistic",
            Self::Scientific => "scientific",
            Self::Systems => "systems",
            Self::Historical => "historical",
            Self::Comparative => "comparative",
            Self::Critical => "critical",
            Self::Future => "future",
        }
    }

    /// Returns all lenses.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Analytical,
            Self::Reflective,
            Self::Practical,
            Self::Narrative,
            Self::Philosophical,
            Self::Journalistic,
            Self::Scientific,
            Self::Systems,
            Self::Historical,
            Self::Comparative,
            Self::Critical,
            Self::Future,
        ]
    }

    /// Parse lens from its ID.
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|l| l.id().eq_ignore_ascii_case(id.trim()))
    }

    /// Full definition of this lens.
    #[must_use]
    pub const fn definition(self) -> LensDefinition {
        match self {
            Self::Analytical => LensDefinition {
                name: "Analytical",
                description: "Data-driven analysis with systematic examination of patterns and implications",
                tone: "objective, evidence-based, systematic",
                focus: &["patterns", "data", "trends", "causality", "implications"],
                question: "What does the data tell us?",
                voice: "expert analyst",
                structure: "problem → analysis → implications",
            },
            Self::Reflective => LensDefinition {
                name: "Reflective",
                description: "Thoughtful contemplation of deeper meaning and personal significance",
                tone: "contemplative, introspective, wise",
                focus: &["meaning", "significance", "wisdom", "values", "reflection"],
                question: "What does this mean at a deeper level?",
                voice: "wise observer",
                structure: "observation → reflection → insight",
            },
            Self::Practical => LensDefinition {
                name: "Practical",
                description: "Actionable guidance with step-by-step implementation strategies",
                tone: "direct, solution-oriented, actionable",
                focus: &["how-to", "steps", "implementation", "tools", "application"],
                question: "How do we actually do this?",
                voice: "practical guide",
                structure: "goal → method → steps → outcome",
            },
            Self::Narrative => LensDefinition {
                name: "Narrative",
                description: "Storytelling approach focusing on human experiences and impact",
                tone: "engaging, human-centered, storytelling",
                focus: &["stories", "experiences", "people", "impact", "journey"],
                question: "What story does this tell?",
                voice: "storyteller",
                structure: "setup → journey → transformation",
            },
            Self::Philosophical => LensDefinition {
                name: "Philosophical",
                description: "Deep exploration of underlying principles, values, and fundamental questions",
                tone: "questioning, contemplative, principled",
                focus: &["principles", "values", "ethics", "truth", "wisdom"],
                question: "What are the underlying principles?",
                voice: "philosopher",
                structure: "question → exploration → principle",
            },
            Self::Journalistic => LensDefinition {
                name: "Journalistic",
                description: "Factual reporting with balanced presentation of multiple perspectives",
                tone: "factual, balanced, investigative",
                focus: &["facts", "sources", "perspectives", "context", "reporting"],
                question: "What are the facts and who says what?",
                voice: "journalist",
                structure: "who → what → when → where → why → how",
            },
            Self::Scientific => LensDefinition {
                name: "Scientific",
                description: "Methodical approach based on research methodology and evidence",
                tone: "methodical, evidence-based, peer-reviewed",
                focus: &["methodology", "evidence", "hypothesis", "experiments", "results"],
                question: "What does the research show?",
                voice: "researcher",
                structure: "hypothesis → method → results → conclusions",
            },
            Self::Systems => LensDefinition {
                name: "Systems",
                description: "Systems thinking approach examining interconnections and emergent properties",
                tone: "holistic, interconnected, systemic",
                focus: &["systems", "interconnections", "feedback loops", "emergence", "complexity"],
                question: "How does this fit into the larger system?",
                voice: "systems thinker",
                structure: "boundaries → elements → relationships → behavior",
            },
            Self::Historical => LensDefinition {
                name: "Historical",
                description: "Historical context showing how things evolved and patterns over time",
                tone: "contextual, chronological, evolutionary",
                focus: &["history", "evolution", "context", "timeline", "patterns"],
                question: "How did we get here?",
                voice: "historian",
                structure: "origin → evolution → current state → trajectory",
            },
            Self::Comparative => LensDefinition {
                name: "Comparative",
                description: "Comparative analysis examining alternatives, trade-offs, and choices",
                tone: "comparative, evaluative, balanced",
                focus: &["alternatives", "trade-offs", "comparisons", "choices", "options"],
                question: "How does this compare to alternatives?",
                voice: "comparative analyst",
                structure: "alternatives → criteria → comparison → recommendation",
            },
            Self::Critical => LensDefinition {
                name: "Critical",
                description: "Critical examination questioning assumptions, power dynamics, and hidden structures",
                tone: "questioning, challenging, critical",
                focus: &["assumptions", "power", "biases", "structures", "alternatives"],
                question: "What assumptions are we making?",
                voice: "critical thinker",
                structure: "assumption → question → reveal → alternative",
            },
            Self::Future => LensDefinition {
                name: "Future",
                description: "Forward-looking exploration of trends, scenarios, and future possibilities",
                tone: "forward-looking, speculative, trend-focused",
                focus: &["trends", "scenarios", "possibilities", "futures", "innovation"],
                question: "Where is this heading?",
                voice: "futurist",
                structure: "current → trends → scenarios → implications",
            },
        }
    }

    /// Prompt fragment asking the writer to take this lens on `topic`.
    #[must_use]
    pub fn prompt(self, topic: &str) -> String {
        let lens = self.definition();
        format!(
            "Approach \"{topic}\" from the \"{name}\" lens:\n\n\
             Focus: {description}\n\
             Tone: {tone}\n\
             Key Question: {question}\n\
             Voice: Write as a {voice}\n\n\
             Emphasize: {focus}\n\n\
             Structure your article to answer: {question}",
            name = lens.name,
            description = lens.description,
            tone = lens.tone,
            question = lens.question,
            voice = lens.voice,
            focus = lens.focus.join(", "),
        )
    }

    /// Lenses that suit a category best, most suitable first.
    #[must_use]
    pub const fn priority(category: Category) -> [Self; 4] {
        match category {
            Category::Nature => [Self::Scientific, Self::Systems, Self::Analytical, Self::Reflective],
            Category::Mind => [Self::Scientific, Self::Reflective, Self::Practical, Self::Philosophical],
            Category::Society => [Self::Systems, Self::Critical, Self::Journalistic, Self::Comparative],
            Category::Technology => [Self::Analytical, Self::Future, Self::Critical, Self::Practical],
            Category::Economy => [Self::Analytical, Self::Systems, Self::Critical, Self::Comparative],
            Category::Philosophy => {
                [Self::Philosophical, Self::Reflective, Self::Critical, Self::Historical]
            }
            Category::Health => [Self::Scientific, Self::Practical, Self::Reflective, Self::Comparative],
            Category::Education => [Self::Practical, Self::Systems, Self::Reflective, Self::Comparative],
            Category::Communication => {
                [Self::Practical, Self::Narrative, Self::Analytical, Self::Reflective]
            }
            Category::Governance => {
                [Self::Systems, Self::Critical, Self::Comparative, Self::Journalistic]
            }
        }
    }
}

impl fmt::Display for Lens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Picks `count` lenses for a category.
///
/// Category priorities come first; any remaining slots are filled from the
/// rest of the catalog in order. Without a category the general-purpose
/// priority (analytical, practical, reflective) is used.
#[must_use]
pub fn recommended(category: Option<Category>, count: usize) -> Vec<Lens> {
    let preferred = category.map_or_else(|| DEFAULT_PRIORITY.to_vec(), |c| Lens::priority(c).to_vec());

    let mut selected: Vec<Lens> = preferred.into_iter().take(count).collect();
    for &lens in Lens::all() {
        if selected.len() >= count {
            break;
        }
        if !selected.contains(&lens) {
            selected.push(lens);
        }
    }
    selected
}

/// One way of covering a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Perspective {
    /// Lens to write through
    pub lens: Lens,
    /// Length preset
    pub style: ArticleStyle,
    /// 1-based position among the topic's perspectives
    pub index: usize,
    /// How many perspectives the topic gets
    pub total: usize,
}

/// Plans `count` perspectives for a topic.
///
/// With `vary_styles` the styles rotate short, medium, long; otherwise every
/// perspective is medium.
#[must_use]
pub fn perspectives(category: Option<Category>, count: usize, vary_styles: bool) -> Vec<Perspective> {
    const ROTATION: [ArticleStyle; 3] =
        [ArticleStyle::Short, ArticleStyle::Medium, ArticleStyle::Long];

    let lenses = recommended(category, count);
    let total = lenses.len();
    lenses
        .into_iter()
        .enumerate()
        .map(|(i, lens)| Perspective {
            lens,
            style: if vary_styles {
                ROTATION[i % ROTATION.len()]
            } else {
                ArticleStyle::Medium
            },
            index: i + 1,
            total,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recommended_follows_category_priority() {
        assert_eq!(
            recommended(Some(Category::Nature), 3),
            vec![Lens::Scientific, Lens::Systems, Lens::Analytical]
        );
        assert_eq!(recommended(None, 2), vec![Lens::Analytical, Lens::Practical]);
    }

    #[test]
    fn test_recommended_fills_without_duplicates() {
        let lenses = recommended(Some(Category::Technology), 6);
        assert_eq!(lenses.len(), 6);
        assert_eq!(&lenses[..4], &Lens::priority(Category::Technology));
        for (i, lens) in lenses.iter().enumerate() {
            assert!(!lenses[i + 1..].contains(lens));
        }

        assert_eq!(recommended(None, 50).len(), Lens::all().len());
    }

    #[test]
    fn test_perspectives_rotate_styles() {
        let plan = perspectives(Some(Category::Mind), 3, true);
        let styles: Vec<_> = plan.iter().map(|p| p.style).collect();
        assert_eq!(
            styles,
            vec![ArticleStyle::Short, ArticleStyle::Medium, ArticleStyle::Long]
        );
        assert_eq!(plan[2].index, 3);
        assert!(plan.iter().all(|p| p.total == 3));

        let flat = perspectives(Some(Category::Mind), 3, false);
        assert!(flat.iter().all(|p| p.style == ArticleStyle::Medium));
    }

    #[test]
    fn test_lens_prompt_mentions_question() {
        let prompt = Lens::Historical.prompt("Urban Design");
        assert!(prompt.contains("\"Historical\" lens"));
        assert!(prompt.contains("How did we get here?"));
        assert!(prompt.contains("Write as a historian"));
        assert!(prompt.contains("history, evolution"));
    }

    #[test]
    fn test_from_id() {
        assert_eq!(Lens::from_id("Systems"), Some(Lens::Systems));
        assert_eq!(Lens::from_id("astrological"), None);
    }
}
