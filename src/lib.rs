//! spacetraveling: a static blog generator backed by a Prismic repository
//!
//! Posts are fetched from the content API at build time and rendered with
//! embedded Tera templates. The development server renders unknown posts on
//! first request and serves the "load more" endpoint of the listing page.

pub mod client;
pub mod commands;
pub mod config;
pub mod content;
pub mod generator;
pub mod helpers;
pub mod listing;
pub mod server;
pub mod templates;

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use client::{ContentSource, PrismicClient};

/// The main blog application
#[derive(Clone)]
pub struct Blog {
    /// Site configuration
    pub config: config::SiteConfig,
    /// Base directory
    pub base_dir: std::path::PathBuf,
    /// Public (output) directory
    pub public_dir: std::path::PathBuf,
    /// Static assets copied verbatim into the output
    pub static_dir: std::path::PathBuf,
}

impl Blog {
    /// Create a new blog instance from a directory
    ///
    /// Reads `_config.yml` when present, then `.env`, then applies
    /// `PRISMIC_*` environment overrides.
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let config_path = base_dir.join("_config.yml");

        let mut config = if config_path.exists() {
            config::SiteConfig::load(&config_path)?
        } else {
            config::SiteConfig::default()
        };

        match dotenvy::from_path(base_dir.join(".env")) {
            Ok(()) => tracing::debug!("Loaded .env from {:?}", base_dir),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!("Ignoring unreadable .env: {}", e),
        }
        config.apply_env();

        Ok(Self::with_config(base_dir, config))
    }

    /// Create a blog instance with an explicit configuration
    pub fn with_config<P: AsRef<Path>>(base_dir: P, config: config::SiteConfig) -> Self {
        let base_dir = base_dir.as_ref().to_path_buf();
        let public_dir = base_dir.join(&config.public_dir);
        let static_dir = base_dir.join(&config.static_dir);

        Self {
            config,
            base_dir,
            public_dir,
            static_dir,
        }
    }

    /// Build the content API client for this blog
    ///
    /// Call once at start-up and hand the result to everything that needs it.
    pub fn client(&self) -> Result<Arc<dyn ContentSource>> {
        let client = PrismicClient::from_config(&self.config)?;
        tracing::info!("Using content API at {}", client.endpoint());
        Ok(Arc::new(client))
    }

    /// Generate the static site
    pub async fn generate(&self, source: &dyn ContentSource) -> Result<()> {
        commands::generate::run(self, source).await
    }

    /// Clean the public directory
    pub fn clean(&self) -> Result<()> {
        commands::clean::run(self)
    }
}
