//! Content module - post models, reading time and rich text rendering

mod post;
pub mod reading_time;
pub mod richtext;

pub use post::{Embed, PostDetail, PostSummary, PostsPage, RichTextBlock, Section, Span, SpanData};
pub use reading_time::reading_time;
