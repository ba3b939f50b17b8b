//! Prismic REST API v2 client

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use url::Url;

use super::{ContentError, ContentSource};
use crate::config::SiteConfig;
use crate::content::{PostDetail, PostSummary, PostsPage, RichTextBlock, Section};

/// Custom type holding blog posts in the repository
const DOCUMENT_TYPE: &str = "posts";

/// Fields fetched for listing entries
const SUMMARY_FIELDS: &str = "posts.title,posts.subtitle,posts.author";

/// How long a master ref is reused before the API root is read again
pub const MASTER_REF_TTL: Duration = Duration::from_secs(5);

const REF_PARAM: &str = "ref";
const ACCESS_TOKEN_PARAM: &str = "access_token";

/// Resolve a configured endpoint value into the API root URL
///
/// An absolute URL is used as-is; a bare repository name maps to its CDN
/// endpoint.
///
/// # Examples
/// ```ignore
/// resolve_endpoint("spacetraveling") // -> https://spacetraveling.cdn.prismic.io/api/v2
/// ```
pub fn resolve_endpoint(value: &str) -> Result<Url, ContentError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ContentError::InvalidEndpoint(
            "no endpoint configured (set PRISMIC_API_ENDPOINT)".to_string(),
        ));
    }

    if let Ok(url) = Url::parse(value) {
        if matches!(url.scheme(), "http" | "https") && url.has_host() {
            return Ok(url);
        }
        return Err(ContentError::InvalidEndpoint(value.to_string()));
    }

    let is_repository_name = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-');
    if !is_repository_name {
        return Err(ContentError::InvalidEndpoint(value.to_string()));
    }

    Url::parse(&format!("https://{}.cdn.prismic.io/api/v2", value))
        .map_err(|e| ContentError::InvalidEndpoint(e.to_string()))
}

/// Client for one Prismic repository
pub struct PrismicClient {
    http: reqwest::Client,
    endpoint: Url,
    access_token: Option<String>,
    master_ref: RwLock<Option<CachedRef>>,
    ref_ttl: Duration,
}

struct CachedRef {
    reference: String,
    fetched_at: Instant,
}

impl PrismicClient {
    /// Create a client for an endpoint URL or repository name
    pub fn new(endpoint: &str, access_token: Option<String>) -> Result<Self, ContentError> {
        let endpoint = resolve_endpoint(endpoint)?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("spacetraveling/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            endpoint,
            access_token,
            master_ref: RwLock::new(None),
            ref_ttl: MASTER_REF_TTL,
        })
    }

    /// Reuse a fetched master ref for `ttl` instead of [`MASTER_REF_TTL`]
    pub fn with_ref_ttl(mut self, ttl: Duration) -> Self {
        self.ref_ttl = ttl;
        self
    }

    /// Create a client from site configuration
    pub fn from_config(config: &SiteConfig) -> Result<Self, ContentError> {
        Self::new(&config.api_endpoint, config.access_token.clone())
    }

    /// The resolved API root
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Current master ref, re-read from the API root once the cached one expires
    async fn master_ref(&self) -> Result<String, ContentError> {
        if let Some(reference) = self.cached_ref(&*self.master_ref.read().await) {
            return Ok(reference);
        }

        let mut slot = self.master_ref.write().await;
        // Refreshed by another task while waiting for the lock
        if let Some(reference) = self.cached_ref(&slot) {
            return Ok(reference);
        }

        let reference = self.fetch_master_ref().await?;
        *slot = Some(CachedRef {
            reference: reference.clone(),
            fetched_at: Instant::now(),
        });
        Ok(reference)
    }

    fn cached_ref(&self, slot: &Option<CachedRef>) -> Option<String> {
        slot.as_ref()
            .filter(|cached| cached.fetched_at.elapsed() < self.ref_ttl)
            .map(|cached| cached.reference.clone())
    }

    async fn fetch_master_ref(&self) -> Result<String, ContentError> {
        let mut url = self.endpoint.clone();
        if let Some(token) = &self.access_token {
            url.query_pairs_mut().append_pair(ACCESS_TOKEN_PARAM, token);
        }

        let root: ApiRoot = self.get_json(url).await?;
        let master = root
            .refs
            .into_iter()
            .find(|r| r.is_master_ref)
            .map(|r| r.reference)
            .ok_or(ContentError::NoMasterRef)?;
        tracing::debug!("Using master ref {}", master);
        Ok(master)
    }

    /// Build a search URL for a predicate query
    async fn search_url(
        &self,
        query: &str,
        page_size: usize,
        fetch: Option<&str>,
    ) -> Result<Url, ContentError> {
        let reference = self.master_ref().await?;
        let base = format!(
            "{}/documents/search",
            self.endpoint.as_str().trim_end_matches('/')
        );
        let mut url = Url::parse(&base).map_err(|e| ContentError::InvalidEndpoint(e.to_string()))?;

        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair(REF_PARAM, &reference);
            pairs.append_pair("q", query);
            pairs.append_pair("pageSize", &page_size.to_string());
            if let Some(fields) = fetch {
                pairs.append_pair("fetch", fields);
            }
            if let Some(token) = &self.access_token {
                pairs.append_pair(ACCESS_TOKEN_PARAM, token);
            }
        }

        Ok(url)
    }

    /// Point a cursor at the current master ref and attach the access token
    async fn authorize_cursor(&self, mut url: Url) -> Result<Url, ContentError> {
        let reference = self.master_ref().await?;
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| key != REF_PARAM && key != ACCESS_TOKEN_PARAM)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        {
            let mut pairs = url.query_pairs_mut();
            pairs.clear();
            pairs.append_pair(REF_PARAM, &reference);
            pairs.extend_pairs(kept);
            if let Some(token) = &self.access_token {
                pairs.append_pair(ACCESS_TOKEN_PARAM, token);
            }
        }

        Ok(url)
    }

    /// Accept a cursor only if it points back at this repository
    fn check_cursor(&self, cursor: &str) -> Result<Url, ContentError> {
        let url = Url::parse(cursor).map_err(|_| ContentError::ForeignCursor(cursor.to_string()))?;
        if url.origin() != self.endpoint.origin() {
            return Err(ContentError::ForeignCursor(cursor.to_string()));
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ContentError> {
        tracing::debug!("GET {}", url);
        let response = self.http.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ContentError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|source| ContentError::Decode {
            url: url.to_string(),
            source,
        })
    }

    async fn search_summaries(&self, url: Url) -> Result<PostsPage, ContentError> {
        let response: SearchResponse<SummaryData> = self.get_json(url).await?;
        let mut page = response.into_page();
        page.next_page = page.next_page.map(|cursor| strip_access_token(&cursor));
        Ok(page)
    }
}

#[async_trait]
impl ContentSource for PrismicClient {
    async fn query_posts(&self, page_size: usize) -> Result<PostsPage, ContentError> {
        let query = format!(r#"[[at(document.type, "{}")]]"#, DOCUMENT_TYPE);
        let url = self
            .search_url(&query, page_size.max(1), Some(SUMMARY_FIELDS))
            .await?;
        self.search_summaries(url).await
    }

    async fn fetch_next_page(&self, cursor: &str) -> Result<PostsPage, ContentError> {
        let url = self.check_cursor(cursor)?;
        let url = self.authorize_cursor(url).await?;
        self.search_summaries(url).await
    }

    async fn get_post_by_uid(&self, uid: &str) -> Result<PostDetail, ContentError> {
        let query = format!(
            r#"[[at(my.{}.uid, "{}")]]"#,
            DOCUMENT_TYPE,
            uid.replace('\\', "\\\\").replace('"', "\\\"")
        );
        let url = self.search_url(&query, 1, None).await?;
        let response: SearchResponse<DetailData> = self.get_json(url).await?;

        response
            .results
            .into_iter()
            .next()
            .map(|doc| doc.into_detail(uid))
            .ok_or_else(|| ContentError::NotFound {
                uid: uid.to_string(),
            })
    }
}

/// Cursors end up in rendered pages, so they never carry the token
fn strip_access_token(cursor: &str) -> String {
    let Ok(mut url) = Url::parse(cursor) else {
        return cursor.to_string();
    };
    if !url.query_pairs().any(|(key, _)| key == ACCESS_TOKEN_PARAM) {
        return cursor.to_string();
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != ACCESS_TOKEN_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    url.query_pairs_mut().clear().extend_pairs(kept);
    url.to_string()
}

#[derive(Debug, Deserialize)]
struct ApiRoot {
    #[serde(default)]
    refs: Vec<ApiRef>,
}

#[derive(Debug, Deserialize)]
struct ApiRef {
    #[serde(rename = "ref")]
    reference: String,
    #[serde(rename = "isMasterRef", default)]
    is_master_ref: bool,
}

#[derive(Debug, Deserialize)]
struct SearchResponse<T> {
    #[serde(default = "Vec::new")]
    results: Vec<Document<T>>,
    next_page: Option<String>,
}

impl SearchResponse<SummaryData> {
    fn into_page(self) -> PostsPage {
        let results = self
            .results
            .into_iter()
            .filter_map(|doc| {
                let Some(uid) = doc.uid else {
                    tracing::warn!("Skipping post without uid");
                    return None;
                };
                Some(PostSummary {
                    uid,
                    first_publication_date: doc.first_publication_date,
                    title: doc.data.title.unwrap_or_default(),
                    subtitle: doc.data.subtitle.unwrap_or_default(),
                    author: doc.data.author.unwrap_or_default(),
                })
            })
            .collect();

        PostsPage {
            results,
            next_page: self.next_page,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Document<T> {
    uid: Option<String>,
    first_publication_date: Option<String>,
    data: T,
}

impl Document<DetailData> {
    fn into_detail(self, requested_uid: &str) -> PostDetail {
        let data = self.data;
        PostDetail {
            uid: self.uid.unwrap_or_else(|| requested_uid.to_string()),
            first_publication_date: self.first_publication_date,
            title: data.title.unwrap_or_default(),
            author: data.author.unwrap_or_default(),
            banner: data.banner.and_then(|b| b.url).unwrap_or_default(),
            content: data
                .content
                .unwrap_or_default()
                .into_iter()
                .map(|section| Section {
                    heading: section.heading.unwrap_or_default(),
                    body: section.body.unwrap_or_default(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SummaryData {
    title: Option<String>,
    subtitle: Option<String>,
    author: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DetailData {
    title: Option<String>,
    author: Option<String>,
    banner: Option<ImageField>,
    content: Option<Vec<RawSection>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ImageField {
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSection {
    heading: Option<String>,
    body: Option<Vec<RichTextBlock>>,
}
