//! List posts from the content repository

use anyhow::Result;
use std::io::Write;

use crate::client::ContentSource;
use crate::helpers::display_date;
use crate::listing::{Listing, LoadOutcome};
use crate::Blog;

/// Print the first page of posts, or every page with `all`
pub async fn run(blog: &Blog, source: &dyn ContentSource, all: bool) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    write_listing(&mut out, source, blog.config.page_size, all).await
}

async fn write_listing<W: Write>(
    out: &mut W,
    source: &dyn ContentSource,
    page_size: usize,
    all: bool,
) -> Result<()> {
    let mut listing = Listing::new(source.query_posts(page_size).await?);

    if all {
        while listing.has_more() {
            match listing.load_more(source).await? {
                LoadOutcome::Appended(n) => tracing::debug!("Loaded {} more posts", n),
                outcome => {
                    tracing::warn!("Stopped paging: {:?}", outcome);
                    break;
                }
            }
        }
    }

    writeln!(out, "Posts ({}):", listing.posts().len())?;
    for post in listing.posts() {
        writeln!(
            out,
            "  {} - {} by {} [{}]",
            display_date(post.first_publication_date.as_deref()),
            post.title,
            post.author,
            post.uid
        )?;
    }
    if listing.has_more() {
        writeln!(out, "  ... more posts available (use --all)")?;
    }

    Ok(())
}
