//! Stage prompt templates with `{variable}` placeholders.
//!
//! Templates are parsed once into literal and variable segments, so a
//! substituted value can never be re-interpreted as a placeholder. A brace
//! that does not wrap a plain identifier is kept as text, which leaves JSON
//! examples inside prompts untouched.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Variables passed to a template.
pub type PromptVars = BTreeMap<String, String>;

/// Name of the single-stage prompt.
pub const DEFAULT_PROMPT: &str = "default";

const BUILTIN_SOURCES: &[(&str, &str)] = &[
    (DEFAULT_PROMPT, include_str!("../prompts/default.md")),
    ("blueprint", include_str!("../prompts/blueprint.md")),
    ("draft", include_str!("../prompts/draft.md")),
    ("enhance", include_str!("../prompts/enhance.md")),
    ("humanize", include_str!("../prompts/humanize.md")),
    ("seo", include_str!("../prompts/seo.md")),
];

static BUILTIN: Lazy<PromptLibrary> = Lazy::new(|| {
    let templates = BUILTIN_SOURCES
        .iter()
        .map(|(name, source)| ((*name).to_string(), PromptTemplate::parse(*name, source)))
        .collect();
    PromptLibrary { templates }
});

/// One piece of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text copied verbatim
    Literal(String),
    /// `{name}` placeholder
    Variable(String),
}

/// A parsed prompt template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    name: String,
    segments: Vec<Segment>,
}

/// Result of rendering a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    /// Final prompt text
    pub text: String,
    /// Placeholders with no value, left in the text as written
    pub missing: Vec<String>,
}

impl PromptTemplate {
    /// Parses template source.
    #[must_use]
    pub fn parse(name: impl Into<String>, source: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = source;

        while let Some(open) = rest.find('{') {
            literal.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let ident_len = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());

            if ident_len > 0 && after[ident_len..].starts_with('}') {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Variable(after[..ident_len].to_string()));
                rest = &after[ident_len + 1..];
            } else {
                literal.push('{');
                rest = after;
            }
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self {
            name: name.into(),
            segments,
        }
    }

    /// Template name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parsed segments.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Placeholder names in order of appearance.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Variable(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Substitutes variables. Unknown placeholders stay as `{name}`.
    #[must_use]
    pub fn render(&self, vars: &PromptVars) -> RenderedPrompt {
        let mut text = String::new();
        let mut missing = Vec::new();

        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => text.push_str(s),
                Segment::Variable(name) => match vars.get(name) {
                    Some(value) => text.push_str(value),
                    None => {
                        text.push('{');
                        text.push_str(name);
                        text.push('}');
                        if !missing.contains(name) {
                            missing.push(name.clone());
                        }
                    }
                },
            }
        }

        RenderedPrompt { text, missing }
    }
}

/// Named prompt templates, built-ins overridable from a directory.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    templates: HashMap<String, PromptTemplate>,
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PromptLibrary {
    /// Library with only the compiled-in templates.
    #[must_use]
    pub fn builtin() -> Self {
        BUILTIN.clone()
    }

    /// Loads every `<dir>/*.md` over the built-ins.
    ///
    /// A missing directory leaves the built-ins in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be read.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut library = Self::builtin();
        if !dir.is_dir() {
            debug!("Prompt directory {} not found, using built-ins", dir.display());
            return Ok(library);
        }

        for entry in fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
            let path = entry.map_err(|e| Error::io(dir, e))?.path();
            if path.extension().is_none_or(|ext| ext != "md") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match fs::read_to_string(&path) {
                Ok(source) => {
                    debug!("Loaded prompt '{}' from {}", name, path.display());
                    library.insert(PromptTemplate::parse(name, &source));
                }
                Err(e) => warn!("Could not read prompt {}: {}", path.display(), e),
            }
        }

        Ok(library)
    }

    /// Adds or replaces a template.
    pub fn insert(&mut self, template: PromptTemplate) {
        self.templates.insert(template.name.clone(), template);
    }

    /// Returns a template, falling back to the default prompt.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PromptTemplate> {
        self.templates
            .get(name)
            .or_else(|| self.templates.get(DEFAULT_PROMPT))
    }

    /// Renders a template, warning about placeholders left unfilled.
    #[must_use]
    pub fn render(&self, name: &str, vars: &PromptVars) -> String {
        let Some(template) = self.get(name) else {
            return vars.get("topic").cloned().unwrap_or_default();
        };

        let rendered = template.render(vars);
        if !rendered.missing.is_empty() {
            warn!(
                "Unreplaced variables in prompt '{}': {}",
                template.name(),
                rendered.missing.join(", ")
            );
        }
        rendered.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    fn vars(pairs: &[(&str, &str)]) -> PromptVars {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_parse_segments() {
        let template = PromptTemplate::parse("t", "About {topic}: {previousContent}!");
        assert_eq!(
            template.segments(),
            &[
                Segment::Literal("About ".into()),
                Segment::Variable("topic".into()),
                Segment::Literal(": ".into()),
                Segment::Variable("previousContent".into()),
                Segment::Literal("!".into()),
            ]
        );
    }

    #[test]
    fn test_non_identifier_braces_stay_literal() {
        let source = "Return {\"title\": \"x\"} or { spaced } or {} for {topic}";
        let template = PromptTemplate::parse("t", source);
        assert_eq!(template.variables().collect::<Vec<_>>(), vec!["topic"]);

        let rendered = template.render(&vars(&[("topic", "rivers")]));
        assert_eq!(
            rendered.text,
            "Return {\"title\": \"x\"} or { spaced } or {} for rivers"
        );
    }

    #[test]
    fn test_values_are_not_reparsed() {
        let template = PromptTemplate::parse("t", "{a}-{b}");
        let rendered = template.render(&vars(&[("a", "{b}"), ("b", "x")]));
        assert_eq!(rendered.text, "{b}-x");
        assert!(rendered.missing.is_empty());
    }

    #[test]
    fn test_missing_variables_are_reported() {
        let template = PromptTemplate::parse("t", "{topic} {style} {style}");
        let rendered = template.render(&vars(&[("topic", "soil")]));
        assert_eq!(rendered.text, "soil {style} {style}");
        assert_eq!(rendered.missing, vec!["style".to_string()]);
    }

    #[test]
    fn test_builtins_present() {
        let library = PromptLibrary::builtin();
        for name in ["default", "blueprint", "draft", "enhance", "humanize", "seo"] {
            assert_eq!(library.get(name).unwrap().name(), name);
        }
        assert_eq!(library.get("unknown").unwrap().name(), DEFAULT_PROMPT);
    }

    #[test]
    fn test_default_prompt_mentions_topic() {
        let library = PromptLibrary::builtin();
        let text = library.render(
            DEFAULT_PROMPT,
            &vars(&[("topic", "Power BI"), ("guidance", "")]),
        );
        assert!(text.starts_with("Write a comprehensive, engaging article about: Power BI"));
    }

    #[test]
    fn test_directory_overrides_builtin() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("draft.md").write_str("Custom draft for {topic}").unwrap();
        temp.child("notes.txt").write_str("ignored").unwrap();

        let library = PromptLibrary::load_dir(temp.path()).unwrap();
        let text = library.render("draft", &vars(&[("topic", "tides")]));
        assert_eq!(text, "Custom draft for tides");
        assert!(library.get("blueprint").unwrap().variables().any(|v| v == "topic"));
    }

    #[test]
    fn test_missing_directory_uses_builtins() {
        let library = PromptLibrary::load_dir("/definitely/not/here").unwrap();
        assert_eq!(library.get("seo").unwrap().name(), "seo");
    }
}
