//! Voice profiles keep each category's articles sounding consistent.

use crate::topics::Category;

/// How articles in a category should sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceProfile {
    /// Persona name
    pub name: &'static str,
    /// Tone words
    pub tone: &'static str,
    /// Traits the prose should show
    pub characteristics: &'static [&'static str],
    /// Sample openings
    pub openings: &'static [&'static str],
    /// Sample transition
    pub transition: &'static str,
    /// Sample closing
    pub closing: &'static str,
    /// Habits to steer clear of
    pub avoid: &'static [&'static str],
    /// Verbs to reach for
    pub prefer_words: &'static [&'static str],
    /// Verbs to avoid
    pub avoid_words: &'static [&'static str],
}

const DEFAULT_VOICE: VoiceProfile = VoiceProfile {
    name: "Thoughtful Writer",
    tone: "engaging, clear, insightful",
    characteristics: &[
        "Balances depth with accessibility",
        "Uses clear, precise language",
        "Creates engaging narrative flow",
        "Provides valuable insights",
        "Maintains reader interest",
    ],
    openings: &[
        "When we examine",
        "The fascinating aspect of",
        "Understanding this topic reveals",
        "At the heart of this lies",
    ],
    transition: "What becomes clear is",
    closing: "In exploring this",
    avoid: &[
        "Overly complex language",
        "Disconnected from reader experience",
        "Dull or repetitive patterns",
        "Lack of clear purpose",
    ],
    prefer_words: &["reveals", "shows", "demonstrates", "illuminates", "enables", "facilitates", "supports"],
    avoid_words: &["proves", "guarantees", "ensures", "requires"],
};

/// Voice for a category; the general-purpose voice when there is none.
#[must_use]
pub const fn voice_profile(category: Option<Category>) -> &'static VoiceProfile {
    let Some(category) = category else {
        return &DEFAULT_VOICE;
    };
    match category {
        Category::Nature => &VoiceProfile {
            name: "Nature Enthusiast",
            tone: "wonder-filled, observant, reverent",
            characteristics: &[
                "Uses vivid sensory language",
                "Connects to larger patterns and cycles",
                "Balances scientific accuracy with poetic insight",
                "Creates sense of connection to natural world",
                "Uses metaphors drawn from nature itself",
            ],
            openings: &[
                "In the intricate dance of ecosystems",
                "Nature reveals its patterns through",
                "The natural world speaks through",
                "From the smallest organism to the largest system",
            ],
            transition: "This interconnectedness reveals",
            closing: "In understanding this, we glimpse",
            avoid: &[
                "Overly technical jargon without context",
                "Detached scientific observation",
                "Doom-and-gloom environmental messaging",
                "Anthropomorphizing too heavily",
            ],
            prefer_words: &["reveals", "emerges", "unfolds", "manifests", "resonates", "echoes", "flows"],
            avoid_words: &["causes", "creates", "makes", "produces", "generates"],
        },
        Category::Mind => &VoiceProfile {
            name: "Thoughtful Guide",
            tone: "curious, reflective, accessible",
            characteristics: &[
                "Uses relatable metaphors",
                "Bridges abstract concepts to daily experience",
                "Balances neuroscience with practical wisdom",
                "Creates moments of personal recognition",
                "Uses questions to engage readers",
            ],
            openings: &[
                "Have you ever noticed how",
                "The human mind operates in fascinating ways",
                "Consider for a moment",
                "Our mental processes reveal",
            ],
            transition: "What this means for daily life is",
            closing: "The invitation is to notice",
            avoid: &[
                "Overly academic language",
                "Disconnected theory",
                "Condescending explanations",
                "Overpromising quick fixes",
            ],
            prefer_words: &["notices", "recognizes", "awakens", "cultivates", "nurtures", "develops", "expands"],
            avoid_words: &["fixes", "cures", "solves", "eliminates", "destroys"],
        },
        Category::Society => &VoiceProfile {
            name: "Insightful Observer",
            tone: "analytical, compassionate, balanced",
            characteristics: &[
                "Examines systems and patterns",
                "Considers multiple perspectives fairly",
                "Uses real-world examples",
                "Connects individual to collective",
                "Offers nuanced analysis",
            ],
            openings: &[
                "When we examine social dynamics",
                "The structures we live within",
                "Society operates through intricate systems",
                "Behind everyday interactions lie",
            ],
            transition: "This systemic view reveals",
            closing: "In understanding these patterns",
            avoid: &[
                "Oversimplified explanations",
                "Partisan language",
                "Pessimistic fatalism",
                "Utopian promises",
            ],
            prefer_words: &["examines", "reveals", "illuminates", "clarifies", "enables", "facilitates", "empowers"],
            avoid_words: &["proves", "disproves", "destroys", "defeats", "conquers"],
        },
        Category::Technology => &VoiceProfile {
            name: "Tech Philosopher",
            tone: "inquisitive, balanced, forward-thinking",
            characteristics: &[
                "Explores implications beyond features",
                "Bridges technical and human concerns",
                "Questions assumptions thoughtfully",
                "Uses clear technical language when needed",
                "Connects innovation to values",
            ],
            openings: &[
                "As technology reshapes our world",
                "Behind every innovation lies",
                "Technology invites us to consider",
                "The tools we build reflect",
            ],
            transition: "The deeper question here is",
            closing: "In navigating this landscape",
            avoid: &[
                "Uncritical techno-optimism",
                "Techno-pessimism without nuance",
                "Jargon for jargon's sake",
                "Disconnected from human impact",
            ],
            prefer_words: &["explores", "questions", "examines", "considers", "evaluates", "reflects", "shapes"],
            avoid_words: &["revolutionizes", "disrupts", "destroys", "replaces", "eliminates"],
        },
        Category::Economy => &VoiceProfile {
            name: "Economic Storyteller",
            tone: "clear, insightful, grounded",
            characteristics: &[
                "Explains complex concepts simply",
                "Uses real-world examples",
                "Connects economics to daily life",
                "Shows both patterns and exceptions",
                "Balances theory with practice",
            ],
            openings: &[
                "Economic systems shape our lives through",
                "When we examine how value flows",
                "The mechanisms of exchange reveal",
                "Behind every transaction lies",
            ],
            transition: "This economic reality means",
            closing: "Understanding these dynamics helps us",
            avoid: &[
                "Overly abstract theory",
                "Jargon-heavy explanations",
                "Detached from human impact",
                "Overconfident predictions",
            ],
            prefer_words: &["reveals", "shows", "demonstrates", "indicates", "suggests", "implies", "enables"],
            avoid_words: &["proves", "guarantees", "ensures", "requires", "forces"],
        },
        Category::Philosophy => &VoiceProfile {
            name: "Wisdom Seeker",
            tone: "contemplative, profound, accessible",
            characteristics: &[
                "Asks meaningful questions",
                "Explores timeless themes",
                "Bridges ancient wisdom to modern life",
                "Uses clear, precise language",
                "Creates moments of insight",
            ],
            openings: &[
                "Throughout human history, we've grappled with",
                "Philosophers have long questioned",
                "At the heart of this inquiry lies",
                "The fundamental questions remain",
            ],
            transition: "This perspective invites us to",
            closing: "In contemplating this",
            avoid: &[
                "Obscure academic language",
                "Unrelated historical references",
                "Abstract without application",
                "Pretentious complexity",
            ],
            prefer_words: &["invites", "suggests", "points toward", "opens", "reveals", "illuminates", "enables"],
            avoid_words: &["demands", "requires", "forces", "commands", "insists"],
        },
        Category::Health => &VoiceProfile {
            name: "Compassionate Guide",
            tone: "supportive, evidence-based, empowering",
            characteristics: &[
                "Balances science with compassion",
                "Uses encouraging but realistic language",
                "Focuses on understanding and agency",
                "Provides practical, actionable insights",
                "Avoids fear-based messaging",
            ],
            openings: &[
                "Our health reflects the complex interplay of",
                "When we understand how our bodies",
                "Health is not merely the absence of illness but",
                "The path to wellness involves",
            ],
            transition: "What this means for you is",
            closing: "Taking small, consistent steps",
            avoid: &[
                "Medical claims without evidence",
                "Fear-based health messaging",
                "One-size-fits-all solutions",
                "Judgmental language about health choices",
            ],
            prefer_words: &["supports", "nurtures", "enhances", "cultivates", "fosters", "enables", "promotes"],
            avoid_words: &["cures", "fixes", "eliminates", "destroys", "battles", "fights"],
        },
        Category::Education => &VoiceProfile {
            name: "Inspirational Teacher",
            tone: "encouraging, clear, engaging",
            characteristics: &[
                "Makes complex concepts accessible",
                "Uses examples and analogies",
                "Encourages curiosity and questions",
                "Celebrates the learning process",
                "Shows practical application",
            ],
            openings: &[
                "Learning transforms when we",
                "Education becomes powerful when",
                "The journey of understanding begins with",
                "When we approach knowledge with curiosity",
            ],
            transition: "This opens up possibilities for",
            closing: "The joy of learning emerges when",
            avoid: &[
                "Condescending explanations",
                "Overly simplified concepts",
                "Dismissive of questions",
                "Rigid, one-way teaching style",
            ],
            prefer_words: &["opens", "reveals", "illuminates", "unlocks", "expands", "cultivates", "nurtures"],
            avoid_words: &["imparts", "gives", "tells", "shows", "pours"],
        },
        Category::Communication => &VoiceProfile {
            name: "Skilled Communicator",
            tone: "insightful, practical, empathetic",
            characteristics: &[
                "Uses real-world communication examples",
                "Shows both theory and practice",
                "Emphasizes listening and understanding",
                "Addresses common challenges",
                "Offers actionable techniques",
            ],
            openings: &[
                "Communication shapes our relationships through",
                "When we pay attention to how we",
                "Effective communication emerges from",
                "The art of connection involves",
            ],
            transition: "This transforms conversations by",
            closing: "In practicing these skills",
            avoid: &[
                "Manipulative techniques",
                "One-size-fits-all formulas",
                "Overly complex frameworks",
                "Disconnected from emotional reality",
            ],
            prefer_words: &["facilitates", "enables", "supports", "creates", "builds", "fosters", "deepens"],
            avoid_words: &["manipulates", "controls", "forces", "demands", "requires"],
        },
        Category::Governance => &VoiceProfile {
            name: "Civic Thinker",
            tone: "thoughtful, balanced, constructive",
            characteristics: &[
                "Examines systems and processes",
                "Considers multiple stakeholders",
                "Focuses on improvement and possibility",
                "Uses historical and contemporary examples",
                "Balances idealism with pragmatism",
            ],
            openings: &[
                "How we govern ourselves reflects",
                "Democratic institutions function best when",
                "Civic engagement transforms when",
                "The health of our democracy depends on",
            ],
            transition: "This creates conditions for",
            closing: "Participating thoughtfully in governance",
            avoid: &[
                "Partisan language",
                "Cynical dismissal",
                "Overly optimistic promises",
                "Detached academic analysis",
            ],
            prefer_words: &["enables", "facilitates", "supports", "creates", "builds", "strengthens", "enhances"],
            avoid_words: &["forces", "demands", "requires", "imposes", "mandates"],
        },
    }
}

impl VoiceProfile {
    /// Prompt block describing the voice.
    #[must_use]
    pub fn guidance(&self) -> String {
        let bullets = |items: &[&str]| -> String {
            items.iter().map(|item| format!("- {item}\n")).collect()
        };

        let mut out = format!(
            "**Voice and Style Guidance:**\n\n**Voice Profile:** {}\n**Tone:** {}\n\n",
            self.name, self.tone
        );

        out.push_str("**Characteristics:**\n");
        out.push_str(&bullets(self.characteristics));

        out.push_str("\n**Writing Patterns:**\n");
        if let Some(opening) = self.openings.first() {
            out.push_str(&format!("- Opening style: {opening}\n"));
        }
        out.push_str(&format!(
            "- Transition style: {}\n- Closing style: {}\n\n",
            self.transition, self.closing
        ));

        out.push_str(&format!(
            "**Word Choices:**\n- Prefer: {}\n- Avoid: {}\n\n",
            self.prefer_words.join(", "),
            self.avoid_words.join(", ")
        ));

        out.push_str("**What to Avoid:**\n");
        out.push_str(&bullets(self.avoid));

        out.push_str(&format!(
            "\nWrite with a {} tone and the voice of a {}. Keep the flow natural, \
             balance depth with accessibility, and stay in this voice throughout.",
            self.tone,
            self.name.to_lowercase()
        ));
        out
    }

    /// Opening line suggestion, picked deterministically from the topic.
    #[must_use]
    pub fn opening_for(&self, topic: &str) -> &'static str {
        if self.openings.is_empty() {
            return "";
        }
        let seed = topic.bytes().fold(0usize, |acc, b| {
            acc.wrapping_mul(31).wrapping_add(usize::from(b))
        });
        self.openings[seed % self.openings.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_category_has_a_voice() {
        for &category in Category::all() {
            let voice = voice_profile(Some(category));
            assert_ne!(voice.name, DEFAULT_VOICE.name);
            assert_eq!(voice.characteristics.len(), 5);
            assert_eq!(voice.openings.len(), 4);
        }
        assert_eq!(voice_profile(None).name, "Thoughtful Writer");
    }

    #[test]
    fn test_guidance_lists_profile() {
        let guidance = voice_profile(Some(Category::Health)).guidance();
        assert!(guidance.contains("**Voice Profile:** Compassionate Guide"));
        assert!(guidance.contains("- Avoids fear-based messaging"));
        assert!(guidance.contains("- Prefer: supports, nurtures"));
        assert!(guidance.contains("compassionate guide"));
    }

    #[test]
    fn test_opening_is_stable() {
        let voice = voice_profile(Some(Category::Mind));
        let first = voice.opening_for("sleep-architecture");
        assert_eq!(first, voice.opening_for("sleep-architecture"));
        assert!(voice.openings.contains(&first));
    }
}
