// src/engine.rs
//! The single logical consumer thread.
//!
//! Every mutation of feed state flows through one message loop: stream
//! payloads, page-fetch completions, and external commands all arrive as
//! messages, while the transport's I/O and the REST fetches run on their own
//! tasks. With all writes serialized there is no locking anywhere in the
//! feed path. The loop itself never blocks on I/O: fetches are spawned and
//! their completions come back as messages, so stream events keep flowing
//! while a page fetch is outstanding.

use std::sync::Arc;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use tokio::sync::{mpsc, oneshot};

use crate::api::PostsGateway;
use crate::config::ClientConfig;
use crate::decode;
use crate::error::FeedError;
use crate::feed::{CategoryFeed, FeedKind, PageRequest};
use crate::notify::devices::DeviceGateway;
use crate::notify::NotificationPolicy;
use crate::post::Post;
use crate::router::FeedRouter;
use crate::stream::SseClient;

/// One-time metrics registration (so series show up when a recorder is
/// installed).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("stream_connects_total", "Successful stream connections.");
        describe_counter!("stream_events_total", "Post events received over the stream.");
        describe_counter!(
            "stream_control_total",
            "Heartbeat/connected control messages received."
        );
        describe_counter!("decode_posts_total", "Post records decoded successfully.");
        describe_counter!(
            "decode_dropped_total",
            "Records dropped due to decode failure."
        );
        describe_counter!("feed_posts_inserted_total", "Posts inserted into feeds.");
        describe_counter!(
            "feed_posts_evicted_total",
            "Posts evicted past feed capacity."
        );
        describe_counter!("feed_fetch_errors_total", "Page fetches that failed.");
        describe_counter!(
            "notifications_fired_total",
            "Posts that passed the notification gate."
        );
        describe_gauge!("stream_connected", "Whether the stream is connected.");
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Initial,
    LoadMore,
    TopRefresh,
}

enum EngineMsg {
    FetchInitial(String),
    LoadMore(String),
    RefreshTop,
    SetThreshold(f64),
    SetAuthorized(bool),
    Reset,
    Shutdown,
    StreamPayload(String),
    StreamState(bool),
    FetchDone {
        tag: String,
        kind: FetchKind,
        epoch: u64,
        result: Result<Vec<Post>, FeedError>,
    },
    Snapshot {
        tag: String,
        reply: oneshot::Sender<Option<FeedSnapshot>>,
    },
    Connected {
        reply: oneshot::Sender<bool>,
    },
}

/// Read-only copy of one feed's externally observable state.
#[derive(Debug, Clone)]
pub struct FeedSnapshot {
    pub tag: String,
    pub posts: Vec<Post>,
    pub has_more: bool,
    pub is_loading_more: bool,
    pub relevance_threshold: f64,
    pub last_error: Option<String>,
}

/// Cheap handle into the engine loop. All methods enqueue and return
/// immediately; the queries await a oneshot reply.
#[derive(Clone)]
pub struct FeedHandle {
    tx: mpsc::UnboundedSender<EngineMsg>,
}

impl FeedHandle {
    pub fn fetch_initial(&self, tag: &str) {
        let _ = self.tx.send(EngineMsg::FetchInitial(tag.to_string()));
    }

    pub fn load_more(&self, tag: &str) {
        let _ = self.tx.send(EngineMsg::LoadMore(tag.to_string()));
    }

    /// Foreground catch-up: top-refresh every feed without disturbing
    /// pagination state.
    pub fn refresh_top(&self) {
        let _ = self.tx.send(EngineMsg::RefreshTop);
    }

    pub fn set_relevance_threshold(&self, value: f64) {
        let _ = self.tx.send(EngineMsg::SetThreshold(value));
    }

    pub fn set_authorized(&self, value: bool) {
        let _ = self.tx.send(EngineMsg::SetAuthorized(value));
    }

    pub fn reset(&self) {
        let _ = self.tx.send(EngineMsg::Reset);
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(EngineMsg::Shutdown);
    }

    /// Feed a raw stream payload into the loop; this is what the transport
    /// callbacks call.
    pub fn stream_payload(&self, raw: String) {
        let _ = self.tx.send(EngineMsg::StreamPayload(raw));
    }

    pub fn stream_state(&self, connected: bool) {
        let _ = self.tx.send(EngineMsg::StreamState(connected));
    }

    pub async fn snapshot(&self, tag: &str) -> Option<FeedSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(EngineMsg::Snapshot {
                tag: tag.to_string(),
                reply,
            })
            .ok()?;
        rx.await.ok().flatten()
    }

    pub async fn connected(&self) -> bool {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(EngineMsg::Connected { reply }).is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }
}

pub struct FeedEngine {
    feeds: Vec<CategoryFeed>,
    router: FeedRouter,
    gateway: Arc<dyn PostsGateway>,
    devices: Option<(DeviceGateway, String)>,
    on_notify: Option<Box<dyn Fn(&Post) + Send>>,
    rx: mpsc::UnboundedReceiver<EngineMsg>,
    tx: mpsc::UnboundedSender<EngineMsg>,
    connected: bool,
}

impl FeedEngine {
    pub fn new(cfg: &ClientConfig, gateway: Arc<dyn PostsGateway>) -> (Self, FeedHandle) {
        ensure_metrics_described();
        let (tx, rx) = mpsc::unbounded_channel();
        let feeds = cfg
            .categories
            .iter()
            .map(|tag| {
                let kind = FeedKind::from_tag(tag);
                let capacity = if kind == FeedKind::All {
                    cfg.all_feed_capacity
                } else {
                    cfg.category_feed_capacity
                };
                CategoryFeed::new(kind, capacity, cfg.relevance_threshold)
            })
            .collect();
        let router = FeedRouter::new(NotificationPolicy::new(cfg.relevance_threshold));
        let handle = FeedHandle { tx: tx.clone() };
        let engine = Self {
            feeds,
            router,
            gateway,
            devices: None,
            on_notify: None,
            rx,
            tx,
            connected: false,
        };
        (engine, handle)
    }

    /// Attach the device sinks; threshold changes are pushed through them.
    pub fn with_devices(mut self, gateway: DeviceGateway, token: impl Into<String>) -> Self {
        self.devices = Some((gateway, token.into()));
        self
    }

    /// Single-slot hook invoked (on the engine loop) for each streamed post
    /// that passes the notification gate.
    pub fn set_on_notify(&mut self, hook: impl Fn(&Post) + Send + 'static) {
        self.on_notify = Some(Box::new(hook));
    }

    pub fn handle(&self) -> FeedHandle {
        FeedHandle {
            tx: self.tx.clone(),
        }
    }

    /// Register transport callbacks that forward into this engine's channel.
    /// This is the serialization hop: stream I/O never touches feed state
    /// directly.
    pub fn attach_stream(&self, stream: &SseClient) {
        let h = self.handle();
        stream.set_on_message(move |payload| h.stream_payload(payload));
        let h = self.handle();
        stream.set_on_connect(move || h.stream_state(true));
        let h = self.handle();
        stream.set_on_disconnect(move || h.stream_state(false));
    }

    /// Run the consumer loop until shutdown.
    pub async fn run(mut self) {
        while let Some(msg) = self.rx.recv().await {
            if !self.dispatch(msg) {
                break;
            }
        }
        tracing::info!(target: "engine", "engine loop stopped");
    }

    fn dispatch(&mut self, msg: EngineMsg) -> bool {
        match msg {
            EngineMsg::FetchInitial(tag) => self.start_fetch(&tag, FetchKind::Initial),
            EngineMsg::LoadMore(tag) => self.start_fetch(&tag, FetchKind::LoadMore),
            EngineMsg::RefreshTop => {
                let tags: Vec<String> = self.feeds.iter().map(|f| f.tag().to_string()).collect();
                for tag in tags {
                    self.start_fetch(&tag, FetchKind::TopRefresh);
                }
            }
            EngineMsg::SetThreshold(value) => self.set_threshold(value),
            EngineMsg::SetAuthorized(value) => self.router.policy.authorized = value,
            EngineMsg::Reset => {
                for feed in &mut self.feeds {
                    feed.reset();
                }
                tracing::info!(target: "engine", "all feeds reset");
            }
            EngineMsg::Shutdown => return false,
            EngineMsg::StreamPayload(raw) => self.on_stream_payload(&raw),
            EngineMsg::StreamState(connected) => {
                self.connected = connected;
                gauge!("stream_connected").set(if connected { 1.0 } else { 0.0 });
            }
            EngineMsg::FetchDone {
                tag,
                kind,
                epoch,
                result,
            } => self.on_fetch_done(&tag, kind, epoch, result),
            EngineMsg::Snapshot { tag, reply } => {
                let _ = reply.send(self.feed(&tag).map(snapshot_of));
            }
            EngineMsg::Connected { reply } => {
                let _ = reply.send(self.connected);
            }
        }
        true
    }

    fn feed(&self, tag: &str) -> Option<&CategoryFeed> {
        self.feeds.iter().find(|f| f.tag() == tag)
    }

    fn feed_mut(&mut self, tag: &str) -> Option<&mut CategoryFeed> {
        self.feeds.iter_mut().find(|f| f.tag() == tag)
    }

    fn start_fetch(&mut self, tag: &str, kind: FetchKind) {
        let Some(feed) = self.feed_mut(tag) else {
            tracing::warn!(target: "engine", feed = tag, "unknown feed");
            return;
        };
        let request = match kind {
            FetchKind::Initial => feed.begin_initial(),
            FetchKind::LoadMore => feed.begin_load_more(),
            FetchKind::TopRefresh => feed.begin_top_refresh(),
        };
        let Some(request) = request else { return };
        let epoch = feed.epoch();
        self.spawn_fetch(tag.to_string(), kind, epoch, request);
    }

    fn spawn_fetch(&self, tag: String, kind: FetchKind, epoch: u64, request: PageRequest) {
        let gateway = self.gateway.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = gateway.fetch_page(&request).await;
            let _ = tx.send(EngineMsg::FetchDone {
                tag,
                kind,
                epoch,
                result,
            });
        });
    }

    fn on_fetch_done(
        &mut self,
        tag: &str,
        kind: FetchKind,
        epoch: u64,
        result: Result<Vec<Post>, FeedError>,
    ) {
        let Some(feed) = self.feed_mut(tag) else {
            return;
        };
        if feed.epoch() != epoch {
            // The feed was reset while this fetch was in flight.
            tracing::debug!(target: "engine", feed = tag, "discarding stale fetch result");
            return;
        }
        match result {
            Ok(page) => {
                let fetched = page.len();
                match kind {
                    FetchKind::Initial => feed.apply_initial(page),
                    FetchKind::LoadMore => feed.apply_load_more(page),
                    FetchKind::TopRefresh => feed.apply_top_refresh(page),
                }
                tracing::info!(
                    target: "engine",
                    feed = tag,
                    ?kind,
                    fetched,
                    held = feed.len(),
                    has_more = feed.has_more(),
                    "page merged"
                );
            }
            Err(e) => {
                tracing::warn!(target: "engine", feed = tag, ?kind, error = %e, "page fetch failed");
                feed.fail(&e);
            }
        }
    }

    fn on_stream_payload(&mut self, raw: &str) {
        let post = match decode::decode_post(raw) {
            Ok(p) => p,
            Err(e) => {
                counter!("decode_dropped_total").increment(1);
                tracing::warn!(target: "engine", error = %e, "dropping undecodable stream payload");
                return;
            }
        };
        let outcome = self.router.route(&post, &mut self.feeds);
        tracing::info!(
            target: "engine",
            id = %post.id,
            source = %post.source,
            relevance = post.relevance,
            feeds = ?outcome.inserted,
            notify = outcome.notify,
            "routed stream post"
        );
        if outcome.notify {
            counter!("notifications_fired_total").increment(1);
            if let Some(hook) = &self.on_notify {
                hook(&post);
            }
        }
    }

    fn set_threshold(&mut self, value: f64) {
        self.router.policy.relevance_threshold = value;
        let mut refetch: Option<String> = None;
        for feed in &mut self.feeds {
            if *feed.kind() == FeedKind::Relevant {
                feed.set_relevance_threshold(value);
                refetch = Some(feed.tag().to_string());
            }
        }
        if let Some(tag) = refetch {
            // The visible set must reflect the new threshold exactly, so the
            // relevant feed re-fetches from scratch rather than re-filtering.
            self.start_fetch(&tag, FetchKind::Initial);
        }
        if let Some((devices, token)) = &self.devices {
            let devices = devices.clone();
            let token = token.clone();
            let active = self.router.policy.authorized;
            tokio::spawn(async move {
                if let Err(e) = devices.update_settings(&token, value, active).await {
                    tracing::warn!(target: "engine", error = %e, "device settings push failed");
                }
            });
        }
    }
}

fn snapshot_of(feed: &CategoryFeed) -> FeedSnapshot {
    FeedSnapshot {
        tag: feed.tag().to_string(),
        posts: feed.posts().to_vec(),
        has_more: feed.has_more(),
        is_loading_more: feed.is_loading_more(),
        relevance_threshold: feed.relevance_threshold(),
        last_error: feed.last_error().map(String::from),
    }
}
