//! In-memory content source for tests

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{ContentError, ContentSource};
use crate::content::{PostDetail, PostsPage, RichTextBlock, Section};

const CURSOR_PREFIX: &str = "memory://posts?page=";

/// Serves a fixed list of posts, paginated by index
pub struct MemorySource {
    posts: Vec<PostDetail>,
    page_size: usize,
    fail_pages: bool,
    page_fetches: AtomicUsize,
    detail_fetches: AtomicUsize,
}

impl MemorySource {
    pub fn new(posts: Vec<PostDetail>) -> Self {
        Self {
            posts,
            page_size: 0,
            fail_pages: false,
            page_fetches: AtomicUsize::new(0),
            detail_fetches: AtomicUsize::new(0),
        }
    }

    /// Force a page size regardless of what callers ask for
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Make every page request fail
    pub fn failing(mut self) -> Self {
        self.fail_pages = true;
        self
    }

    pub fn page_fetches(&self) -> usize {
        self.page_fetches.load(Ordering::SeqCst)
    }

    pub fn detail_fetches(&self) -> usize {
        self.detail_fetches.load(Ordering::SeqCst)
    }

    fn page(&self, page: usize, size: usize) -> Result<PostsPage, ContentError> {
        self.page_fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_pages {
            return Err(ContentError::Status {
                status: 503,
                url: format!("{}{}", CURSOR_PREFIX, page),
            });
        }

        let size = if self.page_size > 0 { self.page_size } else { size.max(1) };
        let start = (page - 1) * size;
        let results = self
            .posts
            .iter()
            .skip(start)
            .take(size)
            .map(PostDetail::summary)
            .collect();
        let next_page = (start + size < self.posts.len())
            .then(|| format!("{}{}&size={}", CURSOR_PREFIX, page + 1, size));

        Ok(PostsPage { results, next_page })
    }
}

#[async_trait]
impl ContentSource for MemorySource {
    async fn query_posts(&self, page_size: usize) -> Result<PostsPage, ContentError> {
        self.page(1, page_size)
    }

    async fn fetch_next_page(&self, cursor: &str) -> Result<PostsPage, ContentError> {
        let parsed = cursor.strip_prefix(CURSOR_PREFIX).and_then(|rest| {
            let (page, size) = rest.split_once("&size=")?;
            Some((page.parse().ok()?, size.parse().ok()?))
        });
        match parsed {
            Some((page, size)) if page > 0 => self.page(page, size),
            _ => Err(ContentError::ForeignCursor(cursor.to_string())),
        }
    }

    async fn get_post_by_uid(&self, uid: &str) -> Result<PostDetail, ContentError> {
        self.detail_fetches.fetch_add(1, Ordering::SeqCst);
        self.posts
            .iter()
            .find(|p| p.uid == uid)
            .cloned()
            .ok_or_else(|| ContentError::NotFound {
                uid: uid.to_string(),
            })
    }
}

/// A post with two sections, dated 15 March 2021 plus `n` days
pub fn sample_post(uid: &str, n: u32) -> PostDetail {
    PostDetail {
        uid: uid.to_string(),
        first_publication_date: Some(format!("2021-03-{:02}T19:25:28+0000", 15 + n)),
        title: format!("Post {}", uid),
        author: "Joseph Oliveira".to_string(),
        banner: format!("https://images.prismic.io/{}.png", uid),
        content: vec![
            Section {
                heading: "Proin et varius".to_string(),
                body: vec![RichTextBlock::paragraph("Lorem ipsum dolor sit amet")],
            },
            Section {
                heading: "Cras laoreet".to_string(),
                body: vec![RichTextBlock::paragraph("Nullam dictum <b>felis</b>")],
            },
        ],
    }
}

/// `count` sample posts with uids `post-1` .. `post-N`
pub fn sample_posts(count: u32) -> Vec<PostDetail> {
    (1..=count)
        .map(|i| sample_post(&format!("post-{}", i), i))
        .collect()
}
