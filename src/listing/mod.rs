//! Listing state - the "load more" pagination loop
//!
//! A listing starts from the first page rendered at build time and appends
//! subsequent pages on demand. At most one request is in flight; each request
//! carries a sequence number and only the latest one may update the state.
//! The in-flight request is aborted on [`Listing::cancel`] or when the
//! listing is dropped.

use futures::future::{AbortHandle, AbortRegistration, Abortable};

use crate::client::{ContentError, ContentSource};
use crate::content::{PostSummary, PostsPage};

/// A request handed out by [`Listing::begin_load`]
#[derive(Debug)]
pub struct LoadRequest {
    pub seq: u64,
    pub cursor: String,
    registration: AbortRegistration,
}

impl LoadRequest {
    /// Fetch the page this request points at, unless aborted first
    ///
    /// Returns `None` when the request was aborted.
    pub async fn fetch<S>(self, source: &S) -> Option<Result<PostsPage, ContentError>>
    where
        S: ContentSource + ?Sized,
    {
        Abortable::new(source.fetch_next_page(&self.cursor), self.registration)
            .await
            .ok()
    }
}

/// What a call to [`Listing::load_more`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// This many posts were appended
    Appended(usize),
    /// There is no next page
    Exhausted,
    /// Another request is still in flight
    Busy,
    /// The request was aborted before it resolved
    Cancelled,
    /// A newer request superseded this one; the response was dropped
    Stale,
}

/// Posts shown so far plus the cursor of the next page
#[derive(Debug)]
pub struct Listing {
    posts: Vec<PostSummary>,
    next_page: Option<String>,
    last_seq: u64,
    in_flight: Option<(u64, AbortHandle)>,
}

impl Listing {
    /// Start from an initial page
    pub fn new(initial: PostsPage) -> Self {
        Self {
            posts: initial.results,
            next_page: initial.next_page,
            last_seq: 0,
            in_flight: None,
        }
    }

    pub fn posts(&self) -> &[PostSummary] {
        &self.posts
    }

    pub fn next_page(&self) -> Option<&str> {
        self.next_page.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Whether the "load more" control should be offered
    pub fn has_more(&self) -> bool {
        self.next_page.is_some()
    }

    /// Whether a "load more" trigger would start a request right now
    pub fn can_load_more(&self) -> bool {
        self.has_more() && !self.is_loading()
    }

    /// Claim the next request, if there is a cursor and nothing in flight
    pub fn begin_load(&mut self) -> Option<LoadRequest> {
        if !self.can_load_more() {
            return None;
        }
        let cursor = self.next_page.clone()?;

        self.last_seq += 1;
        let (handle, registration) = AbortHandle::new_pair();
        self.in_flight = Some((self.last_seq, handle));

        Some(LoadRequest {
            seq: self.last_seq,
            cursor,
            registration,
        })
    }

    /// Apply the response of request `seq`
    ///
    /// Only the request currently in flight may update the listing; late,
    /// duplicated or superseded responses are discarded.
    pub fn finish_load(&mut self, seq: u64, page: PostsPage) -> LoadOutcome {
        if !self.holds(seq) {
            tracing::debug!("Dropping stale page response #{}", seq);
            return LoadOutcome::Stale;
        }
        self.in_flight = None;

        let appended = page.results.len();
        self.posts.extend(page.results);
        self.next_page = page.next_page;
        LoadOutcome::Appended(appended)
    }

    /// Release request `seq` after a failed fetch, keeping the cursor
    pub fn fail_load(&mut self, seq: u64) {
        if self.holds(seq) {
            self.in_flight = None;
        }
    }

    fn holds(&self, seq: u64) -> bool {
        matches!(self.in_flight, Some((current, _)) if current == seq)
    }

    /// Abort the in-flight request, if any
    ///
    /// The sequence counter moves on, so a response that still arrives is
    /// treated as stale.
    pub fn cancel(&mut self) {
        if let Some((seq, handle)) = self.in_flight.take() {
            tracing::debug!("Aborting page request #{}", seq);
            handle.abort();
            self.last_seq += 1;
        }
    }

    /// Fetch the next page and append it
    pub async fn load_more<S>(&mut self, source: &S) -> Result<LoadOutcome, ContentError>
    where
        S: ContentSource + ?Sized,
    {
        let Some(request) = self.begin_load() else {
            return Ok(if self.is_loading() {
                LoadOutcome::Busy
            } else {
                LoadOutcome::Exhausted
            });
        };

        // Released on every exit, including when this future is dropped
        let claim = InFlightClaim {
            seq: request.seq,
            listing: self,
        };
        match request.fetch(source).await {
            Some(Ok(page)) => Ok(claim.listing.finish_load(claim.seq, page)),
            Some(Err(e)) => Err(e),
            None => Ok(LoadOutcome::Cancelled),
        }
    }
}

struct InFlightClaim<'a> {
    seq: u64,
    listing: &'a mut Listing,
}

impl Drop for InFlightClaim<'_> {
    fn drop(&mut self) {
        self.listing.fail_load(self.seq);
    }
}

impl Drop for Listing {
    fn drop(&mut self) {
        self.cancel();
    }
}
