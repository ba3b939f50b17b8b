//! Server for the generated site
//!
//! Serves the public directory and adds what a static host cannot do:
//! - `/post/{uid}` pages missing on disk are fetched, rendered and cached
//! - `/` is regenerated in the background once older than `revalidate_secs`
//! - `/api/posts?cursor=...` returns the next page of post cards as JSON

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path as FsPath;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::client::{ContentError, ContentSource};
use crate::generator::{write_page, Generator};
use crate::helpers::is_valid_uid;
use crate::Blog;

/// Shared server state
pub struct AppState {
    blog: Blog,
    generator: Generator,
    source: Arc<dyn ContentSource>,
    /// Post uids currently being rendered on demand
    generating: Mutex<HashSet<String>>,
    /// Whether the listing page is being (re)generated
    revalidating: AtomicBool,
}

impl AppState {
    pub fn new(blog: &Blog, source: Arc<dyn ContentSource>) -> Result<Self> {
        Ok(Self {
            blog: blog.clone(),
            generator: Generator::new(blog)?,
            source,
            generating: Mutex::new(HashSet::new()),
            revalidating: AtomicBool::new(false),
        })
    }

    /// Claim the listing page for regeneration; `None` if one is running
    fn claim_listing(self: &Arc<Self>) -> Option<ListingClaim> {
        (!self.revalidating.swap(true, Ordering::SeqCst)).then(|| ListingClaim {
            state: Arc::clone(self),
        })
    }

    /// Mark `uid` as being generated; `None` if someone else already is
    fn claim(self: &Arc<Self>, uid: &str) -> Option<GenerationClaim> {
        let mut generating = self.generating.lock().unwrap_or_else(|e| e.into_inner());
        generating.insert(uid.to_string()).then(|| GenerationClaim {
            state: Arc::clone(self),
            uid: uid.to_string(),
        })
    }
}

/// Releases a uid claim when the request finishes or is dropped
struct GenerationClaim {
    state: Arc<AppState>,
    uid: String,
}

impl Drop for GenerationClaim {
    fn drop(&mut self) {
        let mut generating = self
            .state
            .generating
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        generating.remove(&self.uid);
    }
}

/// Releases the listing claim when regeneration ends or is dropped
struct ListingClaim {
    state: Arc<AppState>,
}

impl Drop for ListingClaim {
    fn drop(&mut self) {
        self.state.revalidating.store(false, Ordering::SeqCst);
    }
}

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    let public_dir = state.blog.public_dir.clone();
    let static_files = ServeDir::new(&public_dir)
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new(public_dir.join("404.html")));

    Router::new()
        .route("/", get(index_handler))
        .route("/post/:uid", get(post_handler))
        .route("/post/:uid/", get(post_handler))
        .route("/api/posts", get(more_posts_handler))
        .fallback_service(static_files)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the server
pub async fn start(blog: &Blog, source: Arc<dyn ContentSource>, ip: &str, port: u16) -> Result<()> {
    let state = Arc::new(AppState::new(blog, source)?);
    let app = router(state);

    // Parse address - handle "localhost" specially
    let bind_ip = if ip == "localhost" { "127.0.0.1" } else { ip };
    let addr: SocketAddr = format!("{}:{}", bind_ip, port).parse()?;

    println!("Server running at http://{}:{}", ip, port);
    println!("Press Ctrl+C to stop.");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

/// Listing page, regenerated in the background once stale
async fn index_handler(State(state): State<Arc<AppState>>) -> Response {
    let path = state.generator.listing_output_path();

    match tokio::fs::read_to_string(&path).await {
        Ok(html) => {
            if is_stale(&path, state.blog.config.revalidate_secs) {
                spawn_revalidation(&state);
            }
            Html(html).into_response()
        }
        Err(_) => {
            // Nothing generated yet (e.g. --static on a fresh tree)
            let Some(_claim) = state.claim_listing() else {
                tracing::debug!("Listing is being generated, serving placeholder");
                return loading(&state);
            };
            match state.generator.generate_listing(state.source.as_ref()).await {
                Ok(()) => match tokio::fs::read_to_string(&path).await {
                    Ok(html) => Html(html).into_response(),
                    Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
                },
                Err(e) => error_response(StatusCode::BAD_GATEWAY, e),
            }
        }
    }
}

/// Whether a generated page is older than `max_age_secs` (0 disables revalidation)
fn is_stale(path: &FsPath, max_age_secs: u64) -> bool {
    if max_age_secs == 0 {
        return false;
    }
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .map(|age| age > Duration::from_secs(max_age_secs))
        .unwrap_or(false)
}

fn spawn_revalidation(state: &Arc<AppState>) {
    let Some(claim) = state.claim_listing() else {
        return;
    };

    tokio::spawn(async move {
        let state = &claim.state;
        tracing::info!("Revalidating listing page");
        if let Err(e) = state.generator.generate_listing(state.source.as_ref()).await {
            tracing::error!("Listing revalidation failed: {:#}", e);
        }
    });
}

/// Post page: cached on disk, otherwise rendered on first request
async fn post_handler(State(state): State<Arc<AppState>>, Path(uid): Path<String>) -> Response {
    if !is_valid_uid(&uid) {
        return not_found(&state);
    }

    let path = state.generator.post_output_path(&uid);
    if let Ok(html) = tokio::fs::read_to_string(&path).await {
        return Html(html).into_response();
    }

    let Some(_claim) = state.claim(&uid) else {
        tracing::debug!("Post '{}' is being generated, serving placeholder", uid);
        return loading(&state);
    };

    let post = match state.source.get_post_by_uid(&uid).await {
        Ok(post) => post,
        Err(e) if e.is_not_found() => return not_found(&state),
        Err(e) => return error_response(StatusCode::BAD_GATEWAY, e),
    };

    let html = match state.generator.renderer().render_post(&post) {
        Ok(html) => html,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    };

    if let Err(e) = write_page(&path, &html) {
        tracing::warn!("Cannot cache post '{}': {:#}", uid, e);
    } else {
        tracing::info!("Generated post on demand: {:?}", path);
    }

    Html(html).into_response()
}

#[derive(Debug, Deserialize)]
struct MorePostsQuery {
    cursor: String,
}

/// Next page of post cards for the "load more" control
async fn more_posts_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MorePostsQuery>,
) -> Response {
    let page = match state.source.fetch_next_page(&query.cursor).await {
        Ok(page) => page,
        Err(e @ ContentError::ForeignCursor(_)) => {
            return error_response(StatusCode::BAD_REQUEST, e)
        }
        Err(e) => return error_response(StatusCode::BAD_GATEWAY, e),
    };

    match state.generator.renderer().render_cards(&page.results) {
        Ok(html) => Json(serde_json::json!({
            "html": html,
            "next_page": page.next_page,
        }))
        .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

fn not_found(state: &AppState) -> Response {
    match state.generator.renderer().render_not_found() {
        Ok(html) => (StatusCode::NOT_FOUND, Html(html)).into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "Not found").into_response(),
    }
}

fn loading(state: &AppState) -> Response {
    match state.generator.renderer().render_loading() {
        Ok(html) => ([(header::CACHE_CONTROL, "no-store")], Html(html)).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

fn error_response<E: std::fmt::Display>(status: StatusCode, error: E) -> Response {
    tracing::error!("{}: {}", status, error);
    (status, status.canonical_reason().unwrap_or("Error")).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::memory::{sample_posts, MemorySource};
    use crate::config::SiteConfig;

    struct Fixture {
        _dir: tempfile::TempDir,
        source: Arc<MemorySource>,
        state: Arc<AppState>,
    }

    fn fixture(source: MemorySource) -> Fixture {
        fixture_with(SiteConfig::default(), source)
    }

    fn fixture_with(config: SiteConfig, source: MemorySource) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let blog = Blog::with_config(dir.path(), config);
        let source = Arc::new(source);
        let state = Arc::new(AppState::new(&blog, source.clone()).unwrap());
        Fixture {
            _dir: dir,
            source,
            state,
        }
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_post_rendered_on_first_request_then_cached() {
        let fx = fixture(MemorySource::new(sample_posts(3)));

        let response = post_handler(State(fx.state.clone()), Path("post-2".to_string())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("<h1>Post post-2</h1>"));
        assert!(fx.state.generator.post_output_path("post-2").exists());

        let response = post_handler(State(fx.state.clone()), Path("post-2".to_string())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(fx.source.detail_fetches(), 1);
        assert!(fx.state.generating.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_post_is_not_found() {
        let fx = fixture(MemorySource::new(sample_posts(1)));

        let response = post_handler(State(fx.state.clone()), Path("nope".to_string())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_text(response).await.contains("Post não encontrado"));
        assert!(!fx.state.generator.post_output_path("nope").exists());
    }

    #[tokio::test]
    async fn test_invalid_uid_is_not_found() {
        let fx = fixture(MemorySource::new(sample_posts(1)));

        let response = post_handler(State(fx.state.clone()), Path("..".to_string())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(fx.source.detail_fetches(), 0);
    }

    #[tokio::test]
    async fn test_post_in_generation_gets_placeholder() {
        let fx = fixture(MemorySource::new(sample_posts(1)));
        let claim = fx.state.claim("post-1").unwrap();

        let response = post_handler(State(fx.state.clone()), Path("post-1".to_string())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Carregando..."));
        assert_eq!(fx.source.detail_fetches(), 0);

        drop(claim);
        assert!(fx.state.claim("post-1").is_some());
    }

    #[tokio::test]
    async fn test_more_posts_returns_cards_and_cursor() {
        let fx = fixture(MemorySource::new(sample_posts(5)));
        let query = MorePostsQuery {
            cursor: "memory://posts?page=2&size=2".to_string(),
        };

        let response = more_posts_handler(State(fx.state.clone()), Query(query)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        let html = json["html"].as_str().unwrap();
        assert!(html.contains("/post/post-3/"));
        assert!(html.contains("/post/post-4/"));
        assert!(!html.contains("/post/post-5/"));
        assert_eq!(json["next_page"], "memory://posts?page=3&size=2");
    }

    #[tokio::test]
    async fn test_more_posts_rejects_foreign_cursor() {
        let fx = fixture(MemorySource::new(sample_posts(5)));
        let query = MorePostsQuery {
            cursor: "https://attacker.example/".to_string(),
        };

        let response = more_posts_handler(State(fx.state.clone()), Query(query)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_index_generated_when_missing() {
        let fx = fixture(MemorySource::new(sample_posts(2)));

        let response = index_handler(State(fx.state.clone())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Post post-1"));
        assert!(fx.state.generator.listing_output_path().exists());
    }

    #[tokio::test]
    async fn test_missing_index_generated_once() {
        let fx = fixture(MemorySource::new(sample_posts(2)));
        let claim = fx.state.claim_listing().unwrap();

        let response = index_handler(State(fx.state.clone())).await;
        assert!(body_text(response).await.contains("Carregando..."));
        assert_eq!(fx.source.page_fetches(), 0);

        drop(claim);
        let response = index_handler(State(fx.state.clone())).await;
        assert!(body_text(response).await.contains("Post post-1"));
        assert_eq!(fx.source.page_fetches(), 1);
    }

    #[tokio::test]
    async fn test_stale_index_served_and_regenerated_once() {
        let config = SiteConfig {
            revalidate_secs: 3600,
            ..SiteConfig::default()
        };
        let fx = fixture_with(config, MemorySource::new(sample_posts(2)));
        let path = fx.state.generator.listing_output_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "<p>stale listing</p>").unwrap();
        std::fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(std::time::SystemTime::now() - Duration::from_secs(7200))
            .unwrap();

        let first = index_handler(State(fx.state.clone())).await;
        let second = index_handler(State(fx.state.clone())).await;
        assert_eq!(body_text(first).await, "<p>stale listing</p>");
        assert!(!body_text(second).await.is_empty());

        tokio::time::timeout(Duration::from_secs(5), async {
            while fx.state.revalidating.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        let html = std::fs::read_to_string(&path).unwrap();
        assert!(html.contains("Post post-1"));
        assert_eq!(fx.source.page_fetches(), 1);
        assert!(!is_stale(&path, 3600));
    }

    #[test]
    fn test_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.html");
        std::fs::write(&path, "").unwrap();

        assert!(!is_stale(&path, 0));
        assert!(!is_stale(&path, 3600));
        assert!(!is_stale(&dir.path().join("missing.html"), 1));
    }
}
