//! Built-in site templates using the Tera template engine
//!
//! All templates are embedded in the binary. Text coming from the content
//! repository goes through the `escape_html` filter; rendered rich text is
//! inserted with `safe`.

use anyhow::Result;
use serde::Serialize;
use std::collections::HashMap;
use tera::{Context, Tera};

use crate::config::SiteConfig;
use crate::content::{reading_time, richtext, PostDetail, PostSummary, PostsPage};
use crate::helpers::{
    date_xml, display_date, full_url_for, html_escape, meta_generator, post_path, url_for,
};

/// Header logo, written to `images/logo.svg`
pub const LOGO_SVG: &str = include_str!("site/assets/logo.svg");

/// Template renderer with the embedded site templates
pub struct TemplateRenderer {
    tera: Tera,
    config: SiteConfig,
}

impl TemplateRenderer {
    /// Create a new renderer with all templates loaded
    pub fn new(config: &SiteConfig) -> Result<Self> {
        let mut tera = Tera::default();

        // Escaping is explicit via the escape_html filter
        tera.autoescape_on(vec![]);

        tera.add_raw_templates(vec![
            ("layout.html", include_str!("site/layout.html")),
            ("macros.html", include_str!("site/macros.html")),
            ("index.html", include_str!("site/index.html")),
            ("cards.html", include_str!("site/cards.html")),
            ("post.html", include_str!("site/post.html")),
            ("loading.html", include_str!("site/loading.html")),
            ("not_found.html", include_str!("site/not_found.html")),
            // Partials
            (
                "partials/header.html",
                include_str!("site/partials/header.html"),
            ),
        ])?;

        tera.register_filter("escape_html", escape_html_filter);

        Ok(Self {
            tera,
            config: config.clone(),
        })
    }

    /// Render a template with given context
    pub fn render(&self, template_name: &str, context: &Context) -> Result<String> {
        Ok(self.tera.render(template_name, context)?)
    }

    fn base_context(&self) -> Context {
        let mut context = Context::new();
        context.insert(
            "config",
            &ConfigData {
                title: self.config.title.clone(),
                root: url_for(&self.config, ""),
                language: self.config.language.clone(),
            },
        );
        context.insert("generator", &meta_generator());
        context
    }

    /// Listing page (`/`) for the first page of posts
    pub fn render_listing(&self, page: &PostsPage) -> Result<String> {
        let mut context = self.base_context();
        context.insert("posts", &self.cards(&page.results));
        context.insert("next_page", &page.next_page);
        self.render("index.html", &context)
    }

    /// Post cards only, appended by the "load more" control
    pub fn render_cards(&self, posts: &[PostSummary]) -> Result<String> {
        let mut context = self.base_context();
        context.insert("posts", &self.cards(posts));
        self.render("cards.html", &context)
    }

    /// Detail page (`/post/{uid}/`)
    pub fn render_post(&self, post: &PostDetail) -> Result<String> {
        let mut context = self.base_context();
        context.insert("post", &self.post_data(post));
        self.render("post.html", &context)
    }

    /// Placeholder shown while a post page is being generated
    pub fn render_loading(&self) -> Result<String> {
        self.render("loading.html", &self.base_context())
    }

    pub fn render_not_found(&self) -> Result<String> {
        self.render("not_found.html", &self.base_context())
    }

    fn cards(&self, posts: &[PostSummary]) -> Vec<CardData> {
        posts
            .iter()
            .map(|post| CardData {
                uid: post.uid.clone(),
                path: url_for(&self.config, &post_path(&post.uid)),
                title: post.title.clone(),
                subtitle: post.subtitle.clone(),
                author: post.author.clone(),
                date: display_date(post.first_publication_date.as_deref()),
                datetime: date_xml(post.first_publication_date.as_deref()),
            })
            .collect()
    }

    fn post_data(&self, post: &PostDetail) -> PostData {
        PostData {
            uid: post.uid.clone(),
            canonical: full_url_for(&self.config, &post_path(&post.uid)),
            title: post.title.clone(),
            author: post.author.clone(),
            banner: post.banner.clone(),
            date: display_date(post.first_publication_date.as_deref()),
            datetime: date_xml(post.first_publication_date.as_deref()),
            reading_time: reading_time(&post.content, self.config.words_per_minute),
            sections: post
                .content
                .iter()
                .map(|section| SectionData {
                    heading: section.heading.clone(),
                    html: richtext::as_html(&section.body),
                })
                .collect(),
        }
    }
}

/// Tera filter: escape HTML special characters
fn escape_html_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("escape_html", "value", String, value);
    Ok(tera::Value::String(html_escape(&s)))
}

/// Data structures for template context

#[derive(Debug, Clone, Serialize)]
pub struct ConfigData {
    pub title: String,
    pub root: String,
    pub language: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CardData {
    pub uid: String,
    pub path: String,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub date: String,
    pub datetime: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostData {
    pub uid: String,
    pub canonical: String,
    pub title: String,
    pub author: String,
    pub banner: String,
    pub date: String,
    pub datetime: String,
    pub reading_time: usize,
    pub sections: Vec<SectionData>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionData {
    pub heading: String,
    pub html: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::memory::sample_post;

    fn renderer() -> TemplateRenderer {
        TemplateRenderer::new(&SiteConfig::default()).unwrap()
    }

    fn summary(uid: &str, title: &str, date: Option<&str>) -> PostSummary {
        PostSummary {
            uid: uid.to_string(),
            first_publication_date: date.map(str::to_string),
            title: title.to_string(),
            subtitle: "Pensando em sincronização em vez de ciclos de vida.".to_string(),
            author: "Joseph Oliveira".to_string(),
        }
    }

    #[test]
    fn test_listing_with_cursor_has_load_more() {
        let page = PostsPage {
            results: vec![summary(
                "como-utilizar-hooks",
                "Como utilizar Hooks",
                Some("2021-03-15T19:25:28+0000"),
            )],
            next_page: Some("https://blog.cdn.prismic.io/api/v2/documents/search?page=2&pageSize=1".to_string()),
        };

        let html = renderer().render_listing(&page).unwrap();

        assert!(html.contains("Como utilizar Hooks"));
        assert!(html.contains(r#"href="/post/como-utilizar-hooks/""#));
        assert!(html.contains("15 mar 2021"));
        assert!(html.contains("Carregar mais posts"));
        assert!(html.contains("page=2&amp;pageSize=1"));
        assert!(html.contains(r#"src="/images/logo.svg""#));
    }

    #[test]
    fn test_listing_without_cursor_has_no_load_more() {
        let page = PostsPage {
            results: vec![summary("a", "A", None)],
            next_page: None,
        };

        let html = renderer().render_listing(&page).unwrap();

        assert!(!html.contains("Carregar mais posts"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("Não publicado"));
    }

    #[test]
    fn test_cards_escape_titles() {
        let html = renderer()
            .render_cards(&[summary("x", "<script>alert(1)</script>", None)])
            .unwrap();
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_post_page() {
        let post = sample_post("como-utilizar-hooks", 0);
        let html = renderer().render_post(&post).unwrap();

        assert!(html.contains("<title>Post como-utilizar-hooks | Space Traveling</title>"));
        assert!(html.contains("<h1>Post como-utilizar-hooks</h1>"));
        assert!(html.contains("Joseph Oliveira"));
        assert!(html.contains("15 mar 2021"));
        assert!(html.contains(r#"src="https://images.prismic.io/como-utilizar-hooks.png""#));
        assert!(html.contains("1 min"));
        assert!(html.contains(
            r#"<link rel="canonical" href="http://localhost:3000/post/como-utilizar-hooks/">"#
        ));
        assert_eq!(html.matches(r#"<section class="post-content">"#).count(), 2);
        assert!(html.contains("<h2>Proin et varius</h2>"));
        assert!(html.contains("<p>Lorem ipsum dolor sit amet</p>"));
        assert!(html.contains("<p>Nullam dictum &lt;b&gt;felis&lt;/b&gt;</p>"));
    }

    #[test]
    fn test_loading_and_not_found() {
        let renderer = renderer();
        assert!(renderer.render_loading().unwrap().contains("Carregando..."));
        assert!(renderer
            .render_not_found()
            .unwrap()
            .contains("Post não encontrado"));
    }
}
