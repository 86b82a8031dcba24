// src/lib.rs
// Public library surface for integration tests (and embedding applications).

pub mod api;
pub mod config;
pub mod decode;
pub mod engine;
pub mod error;
pub mod events;
pub mod feed;
pub mod post;
pub mod router;
pub mod stream;

// Notification gating & device/analytics sinks
pub mod notify;

// ---- Re-exports for stable public API ----
pub use crate::api::{HttpPostsGateway, PostsGateway};
pub use crate::config::ClientConfig;
pub use crate::engine::{FeedEngine, FeedHandle, FeedSnapshot, FetchKind};
pub use crate::error::FeedError;
pub use crate::events::{Event, EventPost, EventsClient};
pub use crate::feed::{CategoryFeed, FeedKind, PageRequest, ALL_FEED, PAGE_SIZE, RELEVANT_FEED};
pub use crate::notify::NotificationPolicy;
pub use crate::post::{LinkPreview, MediaItem, Post};
pub use crate::router::{FeedRouter, RouteOutcome};
pub use crate::stream::SseClient;
