// src/feed.rs
//! Per-category feed state: the ordered post list, pagination cursor, and
//! loading flags.
//!
//! The state machine is synchronous. Each fetch operation splits into a
//! `begin_*` step (flag checks, returns the page request to issue or None
//! when rejected) and an `apply_*`/`fail` step (merge results or record a
//! feed-local error), so the engine owns all the async orchestration and the
//! merge logic stays unit-testable without a network.

use chrono::{DateTime, Utc};
use metrics::counter;

use crate::error::FeedError;
use crate::notify::relevance_meets;
use crate::post::Post;

/// Server page size; a full page means more history may remain.
pub const PAGE_SIZE: usize = 50;

pub const ALL_FEED: &str = "all";
pub const RELEVANT_FEED: &str = "relevant";

/// Which posts a feed admits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedKind {
    /// Every post, unconditionally.
    All,
    /// Posts at or above the live relevance threshold.
    Relevant,
    /// Posts tagged with this category (case-insensitive).
    Category(String),
}

impl FeedKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            ALL_FEED => FeedKind::All,
            RELEVANT_FEED => FeedKind::Relevant,
            other => FeedKind::Category(other.to_string()),
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            FeedKind::All => ALL_FEED,
            FeedKind::Relevant => RELEVANT_FEED,
            FeedKind::Category(tag) => tag,
        }
    }

    // Server-side filter for page requests; the synthetic feeds request
    // unfiltered and filter client-side.
    fn api_categories(&self) -> Option<Vec<String>> {
        match self {
            FeedKind::All | FeedKind::Relevant => None,
            FeedKind::Category(tag) => Some(vec![tag.clone()]),
        }
    }
}

/// One REST page request the engine issues on a feed's behalf.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub limit: usize,
    /// Exclusive upper bound; omitted for newest-page requests.
    pub before: Option<DateTime<Utc>>,
    pub categories: Option<Vec<String>>,
}

pub struct CategoryFeed {
    kind: FeedKind,
    posts: Vec<Post>,
    /// Minimum `posted_at` of the most recently fetched page; the exclusive
    /// upper bound for the next older page.
    oldest_timestamp: Option<DateTime<Utc>>,
    has_more: bool,
    is_loading_more: bool,
    relevance_threshold: f64,
    capacity: usize,
    /// Bumped on reset; fetches issued before a reset are stale.
    epoch: u64,
    last_error: Option<String>,
}

impl CategoryFeed {
    pub fn new(kind: FeedKind, capacity: usize, relevance_threshold: f64) -> Self {
        Self {
            kind,
            posts: Vec::new(),
            oldest_timestamp: None,
            has_more: true,
            is_loading_more: false,
            relevance_threshold,
            capacity,
            epoch: 0,
            last_error: None,
        }
    }

    pub fn kind(&self) -> &FeedKind {
        &self.kind
    }

    pub fn tag(&self) -> &str {
        self.kind.tag()
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading_more(&self) -> bool {
        self.is_loading_more
    }

    pub fn oldest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.oldest_timestamp
    }

    pub fn relevance_threshold(&self) -> f64 {
        self.relevance_threshold
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Membership predicate for one post.
    pub fn accepts(&self, post: &Post) -> bool {
        match &self.kind {
            FeedKind::All => true,
            FeedKind::Relevant => relevance_meets(post.relevance, self.relevance_threshold),
            FeedKind::Category(tag) => post.has_category(tag),
        }
    }

    fn filter_page(&self, fetched: Vec<Post>) -> Vec<Post> {
        fetched.into_iter().filter(|p| self.accepts(p)).collect()
    }

    /// Start an initial fetch. Clears the pagination cursor and returns the
    /// page request to issue, or None when a fetch is already in flight
    /// (concurrent calls are rejected, not queued).
    pub fn begin_initial(&mut self) -> Option<PageRequest> {
        if self.is_loading_more {
            tracing::debug!(target: "feed", feed = self.tag(), "initial fetch skipped, already loading");
            return None;
        }
        self.is_loading_more = true;
        self.has_more = true;
        self.oldest_timestamp = None;
        self.last_error = None;
        Some(PageRequest {
            limit: PAGE_SIZE,
            before: None,
            categories: self.kind.api_categories(),
        })
    }

    /// Replace the whole list with a fetched first page.
    pub fn apply_initial(&mut self, fetched: Vec<Post>) {
        let mut page = self.filter_page(fetched);
        sort_newest_first(&mut page);
        self.oldest_timestamp = page.iter().map(|p| p.posted_at).min();
        self.has_more = page.len() == PAGE_SIZE;
        self.posts = page;
        self.is_loading_more = false;
    }

    /// Start a load-more fetch bounded above by the pagination cursor.
    /// No-op while loading or when the history is exhausted.
    pub fn begin_load_more(&mut self) -> Option<PageRequest> {
        if self.is_loading_more || !self.has_more {
            tracing::debug!(
                target: "feed",
                feed = self.tag(),
                loading = self.is_loading_more,
                has_more = self.has_more,
                "load more skipped"
            );
            return None;
        }
        self.is_loading_more = true;
        Some(PageRequest {
            limit: PAGE_SIZE,
            before: self.oldest_timestamp,
            categories: self.kind.api_categories(),
        })
    }

    /// Append an older page, deduplicated by id. The cursor follows the
    /// fetched page, not the merged list.
    pub fn apply_load_more(&mut self, fetched: Vec<Post>) {
        let page = self.filter_page(fetched);
        let fresh: Vec<Post> = page
            .iter()
            .filter(|p| !self.contains(&p.id))
            .cloned()
            .collect();
        self.posts.extend(fresh);
        if let Some(min) = page.iter().map(|p| p.posted_at).min() {
            self.oldest_timestamp = Some(min);
        }
        self.has_more = page.len() == PAGE_SIZE;
        sort_newest_first(&mut self.posts);
        self.is_loading_more = false;
    }

    /// Start a foreground catch-up fetch of the newest page. Does not take
    /// the loading flag; it only refuses to overlap an in-flight fetch.
    pub fn begin_top_refresh(&self) -> Option<PageRequest> {
        if self.is_loading_more {
            tracing::debug!(target: "feed", feed = self.tag(), "top refresh skipped, already loading");
            return None;
        }
        Some(PageRequest {
            limit: PAGE_SIZE,
            before: None,
            categories: self.kind.api_categories(),
        })
    }

    /// Prepend unseen posts from a top refresh and restore order. `has_more`
    /// and the cursor stay untouched so load-more continuity survives the
    /// merge.
    pub fn apply_top_refresh(&mut self, fetched: Vec<Post>) {
        let page = self.filter_page(fetched);
        let fresh: Vec<Post> = page.into_iter().filter(|p| !self.contains(&p.id)).collect();
        if fresh.is_empty() {
            return;
        }
        counter!("feed_posts_inserted_total").increment(fresh.len() as u64);
        self.posts.splice(0..0, fresh);
        sort_newest_first(&mut self.posts);
    }

    /// Insert one streamed post at the top. No-ops on duplicate ids and on
    /// membership misses; trims the tail beyond capacity.
    pub fn insert_post(&mut self, post: Post) -> bool {
        if self.contains(&post.id) {
            tracing::debug!(target: "feed", feed = self.tag(), id = %post.id, "duplicate insert skipped");
            return false;
        }
        if !self.accepts(&post) {
            return false;
        }
        self.posts.insert(0, post);
        counter!("feed_posts_inserted_total").increment(1);
        while self.posts.len() > self.capacity {
            self.posts.pop();
            counter!("feed_posts_evicted_total").increment(1);
        }
        true
    }

    /// Record a failed fetch: the flag clears, the list and cursor stay
    /// exactly as they were.
    pub fn fail(&mut self, err: &FeedError) {
        counter!("feed_fetch_errors_total").increment(1);
        self.is_loading_more = false;
        self.last_error = Some(err.to_string());
    }

    /// Meaningful on the "relevant" feed; the engine follows up with a full
    /// initial fetch so the visible set reflects the new threshold exactly.
    pub fn set_relevance_threshold(&mut self, threshold: f64) {
        self.relevance_threshold = threshold;
    }

    /// Full data-reset. Bumps the epoch so completions of fetches issued
    /// before the reset are discarded.
    pub fn reset(&mut self) {
        self.posts.clear();
        self.oldest_timestamp = None;
        self.has_more = true;
        self.is_loading_more = false;
        self.last_error = None;
        self.epoch += 1;
    }

    fn contains(&self, id: &str) -> bool {
        self.posts.iter().any(|p| p.id == id)
    }
}

/// `posted_at` descending, id descending on ties, for determinism.
pub(crate) fn sort_newest_first(posts: &mut [Post]) {
    posts.sort_by(|a, b| b.posted_at.cmp(&a.posted_at).then_with(|| b.id.cmp(&a.id)));
}
