//! Content API client
//!
//! - [`ContentSource`]: async trait the generator, server and commands depend on
//! - [`PrismicClient`]: reqwest-based implementation against a Prismic repository
//!
//! Errors propagate to the caller unchanged; nothing here retries.

#[cfg(test)]
pub(crate) mod memory;
mod prismic;

use async_trait::async_trait;
use std::collections::HashSet;
use thiserror::Error;

use crate::content::{PostDetail, PostsPage};

pub use prismic::{resolve_endpoint, PrismicClient};

/// Largest page size the content API accepts
pub const MAX_PAGE_SIZE: usize = 100;

/// Errors raised while talking to the content repository
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("content API returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error("cannot decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("post '{uid}' not found")]
    NotFound { uid: String },

    #[error("content API exposes no master ref")]
    NoMasterRef,

    #[error("invalid content API endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("cursor does not belong to the configured endpoint: {0}")]
    ForeignCursor(String),
}

impl ContentError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ContentError::NotFound { .. })
    }
}

/// A repository of blog posts
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// First page of post summaries
    async fn query_posts(&self, page_size: usize) -> Result<PostsPage, ContentError>;

    /// The page a cursor from a previous response points at
    async fn fetch_next_page(&self, cursor: &str) -> Result<PostsPage, ContentError>;

    /// A single post by its uid
    async fn get_post_by_uid(&self, uid: &str) -> Result<PostDetail, ContentError>;

    /// Every known post uid, following cursors to the last page
    async fn all_post_uids(&self) -> Result<Vec<String>, ContentError> {
        let mut page = self.query_posts(MAX_PAGE_SIZE).await?;
        let mut uids: Vec<String> = Vec::new();
        let mut seen_cursors = HashSet::new();

        loop {
            uids.extend(page.results.into_iter().map(|post| post.uid));

            let cursor = match page.next_page {
                Some(cursor) if seen_cursors.insert(cursor.clone()) => cursor,
                Some(cursor) => {
                    tracing::warn!("Cursor {} repeated, stopping enumeration", cursor);
                    break;
                }
                None => break,
            };
            page = self.fetch_next_page(&cursor).await?;
        }

        let mut seen = HashSet::new();
        uids.retain(|uid| seen.insert(uid.clone()));
        Ok(uids)
    }
}
