//! Generate static files

use anyhow::Result;

use crate::client::ContentSource;
use crate::generator::Generator;
use crate::Blog;

/// Generate the static site from the content repository
pub async fn run(blog: &Blog, source: &dyn ContentSource) -> Result<()> {
    let start = std::time::Instant::now();

    let generator = Generator::new(blog)?;
    let posts = generator.generate(source).await?;

    let duration = start.elapsed();
    tracing::info!(
        "Generated {} posts into {:?} in {:.2}s",
        posts,
        blog.public_dir,
        duration.as_secs_f64()
    );

    Ok(())
}
