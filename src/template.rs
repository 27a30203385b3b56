use crate::{
    article::Article,
    error::{Error, Result},
    site::SiteConfig,
};
use serde::Serialize;
use std::collections::HashMap;
use tera::{Context, Tera, Value};

/// Stylesheet copied into every built site.
pub(crate) const STYLESHEET: &str = include_str!("../templates/styles.css");

const INDEX: &str = "index.html";
const ARTICLE: &str = "article.html";
const AD_SLOT: &str = "ad_slot.html";
const SITEMAP: &str = "sitemap.xml";
const ROBOTS: &str = "robots.txt";

/// Ad markup for the fixed page placements, already rendered.
#[derive(Debug, Clone, Default, Serialize)]
pub(crate) struct PageAds {
    pub(crate) header: String,
    pub(crate) sidebar: String,
    pub(crate) footer: String,
}

/// Context of one ad slot.
#[derive(Debug, Serialize)]
pub(crate) struct AdSlot<'a> {
    pub(crate) id: &'a str,
    pub(crate) format: &'a str,
    pub(crate) width: &'a str,
    pub(crate) height: &'a str,
    pub(crate) sticky: bool,
    pub(crate) test_mode: bool,
    pub(crate) publisher_id: &'a str,
}

/// Article summary shown on the home page and in related links.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ArticleCard<'a> {
    pub(crate) title: &'a str,
    pub(crate) excerpt: &'a str,
    pub(crate) category: &'a str,
    pub(crate) author: &'a str,
    pub(crate) date: &'a str,
    pub(crate) read_time: &'a str,
    pub(crate) image: Option<&'a str>,
    pub(crate) href: String,
}

impl<'a> ArticleCard<'a> {
    pub(crate) fn new(article: &'a Article, slug: &str) -> Self {
        Self {
            title: &article.title,
            excerpt: &article.excerpt,
            category: &article.category,
            author: &article.author,
            date: &article.date,
            read_time: &article.read_time,
            image: article.image.as_deref().filter(|i| !i.is_empty()),
            href: format!("/articles/{slug}.html"),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct IndexPage<'a> {
    pub(crate) site: &'a SiteConfig,
    pub(crate) canonical: String,
    pub(crate) json_ld: String,
    pub(crate) featured: Option<ArticleCard<'a>>,
    pub(crate) articles: Vec<ArticleCard<'a>>,
    pub(crate) ads: &'a PageAds,
    pub(crate) ads_script: bool,
    pub(crate) year: i32,
}

#[derive(Debug, Serialize)]
pub(crate) struct ArticlePage<'a> {
    pub(crate) site: &'a SiteConfig,
    pub(crate) canonical: String,
    pub(crate) article: &'a Article,
    pub(crate) body: String,
    pub(crate) json_ld: String,
    pub(crate) og_tags: Vec<(&'static str, String)>,
    pub(crate) twitter_tags: Vec<(&'static str, String)>,
    pub(crate) related: Vec<ArticleCard<'a>>,
    pub(crate) ads: &'a PageAds,
    pub(crate) ads_script: bool,
    pub(crate) year: i32,
}

#[derive(Debug, Serialize)]
pub(crate) struct SitemapEntry {
    pub(crate) loc: String,
    pub(crate) lastmod: String,
}

#[derive(Debug, Serialize)]
struct SitemapContext<'a> {
    base_url: &'a str,
    today: &'a str,
    pages: &'a [SitemapEntry],
}

/// Compiled site templates.
pub(crate) struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    /// Compiles the built-in templates.
    ///
    /// # Errors
    ///
    /// Returns an error if a template fails to parse.
    pub(crate) fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![".html"]);

        // Registered together so `extends` can resolve the base layout
        tera.add_raw_templates(vec![
            ("base.html", include_str!("../templates/base.html")),
            (INDEX, include_str!("../templates/index.html")),
            (ARTICLE, include_str!("../templates/article.html")),
            (AD_SLOT, include_str!("../templates/ad_slot.html")),
            (SITEMAP, include_str!("../templates/sitemap.xml")),
            (ROBOTS, include_str!("../templates/robots.txt")),
        ])
        .map_err(|e| Error::template("site", e))?;

        tera.register_filter("xml_escape", Self::xml_escape_filter);

        Ok(Self { tera })
    }

    /// XML escape filter implementation.
    fn xml_escape_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
        if let Some(s) = value.as_str() {
            let escaped = s
                .replace('&', "&amp;")
                .replace('<', "&lt;")
                .replace('>', "&gt;")
                .replace('"', "&quot;")
                .replace('\'', "&apos;");
            Ok(Value::String(escaped))
        } else {
            Ok(value.clone())
        }
    }

    fn render<T: Serialize>(&self, name: &str, data: &T) -> Result<String> {
        let context = Context::from_serialize(data).map_err(|e| Error::template(name, e))?;
        self.tera
            .render(name, &context)
            .map_err(|e| Error::template(name, e))
    }

    pub(crate) fn render_ad(&self, slot: &AdSlot<'_>) -> Result<String> {
        self.render(AD_SLOT, slot)
    }

    pub(crate) fn render_index(&self, page: &IndexPage<'_>) -> Result<String> {
        self.render(INDEX, page)
    }

    pub(crate) fn render_article(&self, page: &ArticlePage<'_>) -> Result<String> {
        self.render(ARTICLE, page)
    }

    pub(crate) fn render_sitemap(
        &self,
        base_url: &str,
        today: &str,
        pages: &[SitemapEntry],
    ) -> Result<String> {
        self.render(
            SITEMAP,
            &SitemapContext {
                base_url,
                today,
                pages,
            },
        )
    }

    pub(crate) fn render_robots(&self, base_url: &str) -> Result<String> {
        let mut context = Context::new();
        context.insert("base_url", base_url);
        self.tera
            .render(ROBOTS, &context)
            .map_err(|e| Error::template(ROBOTS, e))
    }
}

/// Inserts `ad` after every `every`-th closing paragraph tag.
pub(crate) fn insert_after_paragraphs(html: &str, ad: &str, every: usize) -> String {
    if ad.is_empty() || every == 0 {
        return html.to_string();
    }

    let mut out = String::with_capacity(html.len() + ad.len());
    let mut last = 0;
    for (n, at) in memchr::memmem::find_iter(html.as_bytes(), b"</p>").enumerate() {
        if (n + 1) % every == 0 {
            let end = at + "</p>".len();
            out.push_str(&html[last..end]);
            out.push('\n');
            out.push_str(ad);
            last = end;
        }
    }
    out.push_str(&html[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article() -> Article {
        Article {
            title: "Rivers & <Deltas>".to_string(),
            excerpt: "How water moves.".to_string(),
            content: "<h2>Flow</h2><p>Water runs downhill.</p>".to_string(),
            author: "Ada".to_string(),
            date: "2024-01-01".to_string(),
            category: "Nature".to_string(),
            read_time: "3 min read".to_string(),
            ..Article::default()
        }
    }

    #[test]
    fn test_template_engine_creation() {
        assert!(TemplateEngine::new().is_ok());
    }

    #[test]
    fn test_render_index_escapes_titles() {
        let engine = TemplateEngine::new().unwrap();
        let site = SiteConfig::default();
        let article = article();
        let ads = PageAds::default();
        let page = IndexPage {
            site: &site,
            canonical: site.absolute_url("/"),
            json_ld: "{}".to_string(),
            featured: None,
            articles: vec![ArticleCard::new(&article, "rivers-deltas")],
            ads: &ads,
            ads_script: false,
            year: 2024,
        };

        let html = engine.render_index(&page).unwrap();
        assert!(html.contains("Rivers &amp; &lt;Deltas&gt;"));
        assert!(html.contains("rivers-deltas.html"));
        assert!(html.contains(&site.name));
        assert!(!html.contains("No articles yet"));
    }

    #[test]
    fn test_render_article_keeps_body_html() {
        let engine = TemplateEngine::new().unwrap();
        let site = SiteConfig::default();
        let article = article();
        let ads = PageAds {
            header: "<div id=\"hdr-ad\"></div>".to_string(),
            ..PageAds::default()
        };
        let page = ArticlePage {
            site: &site,
            canonical: site.absolute_url("/articles/x.html"),
            article: &article,
            body: article.content.clone(),
            json_ld: "{\"@type\":\"Article\"}".to_string(),
            og_tags: vec![("og:type", "article".to_string())],
            twitter_tags: vec![("twitter:card", "summary_large_image".to_string())],
            related: vec![],
            ads: &ads,
            ads_script: false,
            year: 2024,
        };

        let html = engine.render_article(&page).unwrap();
        assert!(html.contains("<p>Water runs downhill.</p>"));
        assert!(html.contains("<div id=\"hdr-ad\"></div>"));
        assert!(html.contains("<meta property=\"og:type\" content=\"article\">"));
        assert!(html.contains("{\"@type\":\"Article\"}"));
    }

    #[test]
    fn test_render_ad_modes() {
        let engine = TemplateEngine::new().unwrap();
        let mut slot = AdSlot {
            id: "ad-header-1",
            format: "leaderboard",
            width: "728px",
            height: "90px",
            sticky: false,
            test_mode: true,
            publisher_id: "pub-1",
        };

        let placeholder = engine.render_ad(&slot).unwrap();
        assert!(placeholder.contains("ad-placeholder"));
        assert!(!placeholder.contains("adsbygoogle"));

        slot.test_mode = false;
        slot.sticky = true;
        let live = engine.render_ad(&slot).unwrap();
        assert!(live.contains("data-ad-client=\"ca-pub-1\""));
        assert!(live.contains("ad-sticky"));
    }

    #[test]
    fn test_render_sitemap_and_robots() {
        let engine = TemplateEngine::new().unwrap();
        let pages = vec![SitemapEntry {
            loc: "https://example.com/articles/a.html?x=1&y=2".to_string(),
            lastmod: "2024-01-02".to_string(),
        }];

        let xml = engine
            .render_sitemap("https://example.com", "2024-01-03", &pages)
            .unwrap();
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<loc>https://example.com/</loc>"));
        assert!(xml.contains("a.html?x=1&amp;y=2"));

        let robots = engine.render_robots("https://example.com").unwrap();
        assert!(robots.contains("Sitemap: https://example.com/sitemap.xml"));
    }

    #[test]
    fn test_insert_after_paragraphs() {
        let html = "<p>1</p><p>2</p><p>3</p><p>4</p>";
        assert_eq!(
            insert_after_paragraphs(html, "AD", 2),
            "<p>1</p><p>2</p>\nAD<p>3</p><p>4</p>\nAD"
        );
        assert_eq!(insert_after_paragraphs(html, "", 2), html);
        assert_eq!(insert_after_paragraphs(html, "AD", 0), html);
    }
}
