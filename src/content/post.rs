//! Post models as delivered by the content repository

use serde::{Deserialize, Serialize};

/// A post as it appears on the listing page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostSummary {
    /// Backend-assigned identifier, used as the route slug
    pub uid: String,

    /// First publication timestamp (absent for never-published documents)
    pub first_publication_date: Option<String>,

    pub title: String,
    pub subtitle: String,
    pub author: String,
}

/// A full post document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDetail {
    pub uid: String,
    pub first_publication_date: Option<String>,
    pub title: String,
    pub author: String,

    /// Banner image URL
    pub banner: String,

    /// Ordered content sections
    pub content: Vec<Section>,
}

impl PostDetail {
    /// Project the detail onto the summary shape used by listings
    pub fn summary(&self) -> PostSummary {
        PostSummary {
            uid: self.uid.clone(),
            first_publication_date: self.first_publication_date.clone(),
            title: self.title.clone(),
            subtitle: String::new(),
            author: self.author.clone(),
        }
    }
}

/// A content section: a heading followed by rich-text body fragments
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Section {
    pub heading: String,
    pub body: Vec<RichTextBlock>,
}

/// One rich-text fragment (paragraph, heading, list item, image, ...)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RichTextBlock {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
    pub spans: Vec<Span>,

    /// Image source, for `image` blocks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Image alternative text, for `image` blocks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,

    /// Embedded media, for `embed` blocks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oembed: Option<Embed>,
}

impl RichTextBlock {
    /// Plain paragraph with no inline formatting
    pub fn paragraph(text: &str) -> Self {
        Self {
            kind: "paragraph".to_string(),
            text: text.to_string(),
            ..Default::default()
        }
    }
}

/// Inline formatting over a range of a block's text
///
/// Offsets count UTF-16 code units, matching the content API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<SpanData>,
}

/// Extra span payload (hyperlink target or label name)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// oEmbed payload of an `embed` block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Embed {
    #[serde(rename = "type")]
    pub kind: String,
    pub embed_url: String,
    pub html: Option<String>,
}

/// One page of post summaries plus the cursor of the following page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostsPage {
    pub results: Vec<PostSummary>,
    pub next_page: Option<String>,
}
