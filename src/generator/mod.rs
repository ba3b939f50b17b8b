//! Generator module - pre-renders the listing and post pages into the public directory

use anyhow::{Context as _, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::client::ContentSource;
use crate::content::PostDetail;
use crate::helpers::{is_valid_uid, post_path};
use crate::templates::{TemplateRenderer, LOGO_SVG};
use crate::Blog;

/// Static site generator using Tera templates
pub struct Generator {
    blog: Blog,
    renderer: TemplateRenderer,
}

impl Generator {
    /// Create a new generator
    pub fn new(blog: &Blog) -> Result<Self> {
        let renderer = TemplateRenderer::new(&blog.config)?;

        Ok(Self {
            blog: blog.clone(),
            renderer,
        })
    }

    pub fn renderer(&self) -> &TemplateRenderer {
        &self.renderer
    }

    /// Generate the entire site, returning the number of post pages written
    pub async fn generate(&self, source: &dyn ContentSource) -> Result<usize> {
        // Ensure public directory exists
        fs::create_dir_all(&self.blog.public_dir)?;

        self.write_assets()?;

        self.generate_listing(source).await?;

        let uids = source
            .all_post_uids()
            .await
            .context("Failed to enumerate posts")?;
        tracing::info!("Found {} posts", uids.len());

        let mut written = 0;
        for uid in &uids {
            if !is_valid_uid(uid) {
                tracing::warn!("Skipping post with unroutable uid {:?}", uid);
                continue;
            }
            self.generate_post(source, uid).await?;
            written += 1;
        }

        let not_found = self.renderer.render_not_found()?;
        write_page(&self.blog.public_dir.join("404.html"), &not_found)?;

        Ok(written)
    }

    /// Render the listing page from the first page of posts
    pub async fn generate_listing(&self, source: &dyn ContentSource) -> Result<()> {
        let page = source
            .query_posts(self.blog.config.page_size)
            .await
            .context("Failed to query posts")?;

        let html = self.renderer.render_listing(&page)?;
        write_page(&self.listing_output_path(), &html)?;
        tracing::info!(
            "Generated listing with {} posts (more: {})",
            page.results.len(),
            page.next_page.is_some()
        );

        Ok(())
    }

    /// Fetch and render one post page
    pub async fn generate_post(&self, source: &dyn ContentSource, uid: &str) -> Result<PathBuf> {
        let post = source
            .get_post_by_uid(uid)
            .await
            .with_context(|| format!("Failed to fetch post '{}'", uid))?;
        self.write_post(&post)
    }

    /// Render an already fetched post to its output path
    pub fn write_post(&self, post: &PostDetail) -> Result<PathBuf> {
        if !is_valid_uid(&post.uid) {
            anyhow::bail!("Post uid {:?} cannot be used as a path", post.uid);
        }

        let html = self.renderer.render_post(post)?;
        let output_path = self.post_output_path(&post.uid);
        write_page(&output_path, &html)?;
        tracing::debug!("Generated post: {:?}", output_path);

        Ok(output_path)
    }

    pub fn listing_output_path(&self) -> PathBuf {
        self.blog.public_dir.join("index.html")
    }

    pub fn post_output_path(&self, uid: &str) -> PathBuf {
        self.blog.public_dir.join(post_path(uid)).join("index.html")
    }

    /// Write the header logo and copy the static directory
    fn write_assets(&self) -> Result<()> {
        let logo_path = self.blog.public_dir.join("images").join("logo.svg");
        if let Some(parent) = logo_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&logo_path, LOGO_SVG)?;

        self.copy_static_assets()
    }

    /// Copy static assets (images, stylesheets, ...) to public directory
    fn copy_static_assets(&self) -> Result<()> {
        let static_dir = &self.blog.static_dir;
        if !static_dir.exists() {
            return Ok(());
        }

        let mut copied = 0;
        for entry in WalkDir::new(static_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            // Skip hidden files and directories
            let relative = path.strip_prefix(static_dir)?;
            let hidden = relative.components().any(|c| {
                c.as_os_str()
                    .to_str()
                    .map(|s| s.starts_with('.'))
                    .unwrap_or(false)
            });
            if hidden {
                continue;
            }

            let dest = self.blog.public_dir.join(relative);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(path, &dest)?;
            copied += 1;
        }

        tracing::debug!("Copied {} static files", copied);
        Ok(())
    }
}

/// Write a page, creating parent directories
///
/// The page is written to a temporary sibling and renamed into place, so a
/// concurrent reader sees either the old page or the new one.
pub(crate) fn write_page(path: &Path, html: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)
        .map_err(|e| anyhow::anyhow!("Failed to create dir {:?}: {}", parent, e))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".page-")
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|e| anyhow::anyhow!("Failed to create temp file in {:?}: {}", parent, e))?;
    tmp.write_all(html.as_bytes())
        .map_err(|e| anyhow::anyhow!("Failed to write {:?}: {}", path, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(0o644))?;
    }

    tmp.persist(path)
        .map_err(|e| anyhow::anyhow!("Failed to write {:?}: {}", path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::memory::{sample_post, sample_posts, MemorySource};
    use crate::config::SiteConfig;

    fn blog_in(dir: &Path) -> Blog {
        Blog::with_config(dir, SiteConfig::default())
    }

    #[tokio::test]
    async fn test_generate_full_site() {
        let dir = tempfile::tempdir().unwrap();
        let blog = blog_in(dir.path());
        let source = MemorySource::new(sample_posts(6));

        let generator = Generator::new(&blog).unwrap();
        let written = generator.generate(&source).await.unwrap();

        assert_eq!(written, 6);
        let index = fs::read_to_string(blog.public_dir.join("index.html")).unwrap();
        assert_eq!(index.matches(r#"class="post-card""#).count(), 4);
        assert!(index.contains("Carregar mais posts"));

        for i in 1..=6 {
            let page = blog.public_dir.join(format!("post/post-{}/index.html", i));
            assert!(page.exists(), "missing {:?}", page);
        }
        assert!(blog.public_dir.join("404.html").exists());
        assert!(blog.public_dir.join("images/logo.svg").exists());
    }

    #[tokio::test]
    async fn test_generate_copies_static_dir() {
        let dir = tempfile::tempdir().unwrap();
        let blog = blog_in(dir.path());
        fs::create_dir_all(blog.static_dir.join("css")).unwrap();
        fs::write(blog.static_dir.join("css/style.css"), "body {}").unwrap();
        fs::write(blog.static_dir.join(".DS_Store"), "").unwrap();

        let generator = Generator::new(&blog).unwrap();
        generator
            .generate(&MemorySource::new(Vec::new()))
            .await
            .unwrap();

        assert!(blog.public_dir.join("css/style.css").exists());
        assert!(!blog.public_dir.join(".DS_Store").exists());
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_generation() {
        let dir = tempfile::tempdir().unwrap();
        let blog = blog_in(dir.path());
        let source = MemorySource::new(sample_posts(2)).failing();

        let generator = Generator::new(&blog).unwrap();
        assert!(generator.generate(&source).await.is_err());
        assert!(!blog.public_dir.join("index.html").exists());
    }

    #[test]
    fn test_write_post_rejects_path_uids() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Generator::new(&blog_in(dir.path())).unwrap();

        let post = sample_post("../escape", 0);
        assert!(generator.write_post(&post).is_err());
        assert!(!dir.path().join("escape").exists());
    }

    #[test]
    fn test_write_page_replaces_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("post/como-utilizar-hooks/index.html");

        write_page(&path, "<p>old</p>").unwrap();
        write_page(&path, "<p>new</p>").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "<p>new</p>");
        let entries: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(entries, ["index.html"]);
    }
}
