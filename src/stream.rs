// src/stream.rs
//! The long-lived server-sent-event transport.
//!
//! One streaming GET against the notification endpoint; received bytes are
//! buffered as text and split on the blank-line event delimiter, and each
//! event's `data:` payload is handed to the subscriber. Heartbeat control
//! messages refresh the connected flag without producing an event. The
//! transport never reconnects on its own; the owning application calls
//! `connect` again after an observed disconnect or a foreground transition.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use metrics::counter;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONNECTION};
use reqwest::Client;
use tokio::task::JoinHandle;

use crate::decode;

type MessageCallback = Arc<dyn Fn(String) + Send + Sync>;
type LifecycleCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Callbacks {
    on_message: Option<MessageCallback>,
    on_connect: Option<LifecycleCallback>,
    on_disconnect: Option<LifecycleCallback>,
}

struct Shared {
    connected: AtomicBool,
    callbacks: Mutex<Callbacks>,
}

impl Shared {
    fn message_cb(&self) -> Option<MessageCallback> {
        self.callbacks
            .lock()
            .expect("callbacks mutex poisoned")
            .on_message
            .clone()
    }

    fn connect_cb(&self) -> Option<LifecycleCallback> {
        self.callbacks
            .lock()
            .expect("callbacks mutex poisoned")
            .on_connect
            .clone()
    }

    fn disconnect_cb(&self) -> Option<LifecycleCallback> {
        self.callbacks
            .lock()
            .expect("callbacks mutex poisoned")
            .on_disconnect
            .clone()
    }
}

pub struct SseClient {
    client: Client,
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SseClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            shared: Arc::new(Shared {
                connected: AtomicBool::new(false),
                callbacks: Mutex::new(Callbacks::default()),
            }),
            task: Mutex::new(None),
        }
    }

    /// Single-slot registration: a new callback replaces the previous one.
    /// Callbacks run on the transport's I/O task; subscribers that touch
    /// shared state must forward into their own execution context (see
    /// `FeedEngine::attach_stream`).
    pub fn set_on_message(&self, cb: impl Fn(String) + Send + Sync + 'static) {
        self.callbacks().on_message = Some(Arc::new(cb));
    }

    pub fn set_on_connect(&self, cb: impl Fn() + Send + Sync + 'static) {
        self.callbacks().on_connect = Some(Arc::new(cb));
    }

    pub fn set_on_disconnect(&self, cb: impl Fn() + Send + Sync + 'static) {
        self.callbacks().on_disconnect = Some(Arc::new(cb));
    }

    fn callbacks(&self) -> std::sync::MutexGuard<'_, Callbacks> {
        self.shared.callbacks.lock().expect("callbacks mutex poisoned")
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Open the streaming request, tearing down any existing connection
    /// first. Transport failures land in the disconnected state; nothing is
    /// ever returned or thrown to the caller.
    pub fn connect(&self, url: &str) {
        self.disconnect();
        tracing::info!(target: "stream", %url, "connecting");
        let client = self.client.clone();
        let shared = self.shared.clone();
        let url = url.to_string();
        let handle = tokio::spawn(async move { run_stream(client, shared, url).await });
        *self.task.lock().expect("task mutex poisoned") = Some(handle);
    }

    /// Cancel the in-flight streaming request immediately; buffered partial
    /// data goes with it. Safe to call when already disconnected.
    pub fn disconnect(&self) {
        if let Some(handle) = self.task.lock().expect("task mutex poisoned").take() {
            handle.abort();
        }
        if self.shared.connected.swap(false, Ordering::SeqCst) {
            tracing::info!(target: "stream", "disconnected");
            if let Some(cb) = self.shared.disconnect_cb() {
                cb();
            }
        }
    }
}

impl Default for SseClient {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_stream(client: Client, shared: Arc<Shared>, url: String) {
    let resp = client
        .get(&url)
        .header(ACCEPT, "text/event-stream")
        .header(CONNECTION, "keep-alive")
        .header(CACHE_CONTROL, "no-cache")
        .send()
        .await;

    let mut resp = match resp {
        Ok(r) if r.status().is_success() => r,
        Ok(r) => {
            tracing::warn!(target: "stream", status = %r.status(), "stream endpoint refused");
            shared.connected.store(false, Ordering::SeqCst);
            if let Some(cb) = shared.disconnect_cb() {
                cb();
            }
            return;
        }
        Err(e) => {
            tracing::warn!(target: "stream", error = %e, "stream connect failed");
            shared.connected.store(false, Ordering::SeqCst);
            if let Some(cb) = shared.disconnect_cb() {
                cb();
            }
            return;
        }
    };

    shared.connected.store(true, Ordering::SeqCst);
    counter!("stream_connects_total").increment(1);
    if let Some(cb) = shared.connect_cb() {
        cb();
    }

    let mut buffer = String::new();
    loop {
        match resp.chunk().await {
            Ok(Some(bytes)) => {
                buffer.push_str(&String::from_utf8_lossy(&bytes));
                for payload in drain_events(&mut buffer) {
                    if let Some(kind) = decode::control_type(&payload) {
                        // Heartbeats only refresh the connected flag.
                        shared.connected.store(true, Ordering::SeqCst);
                        counter!("stream_control_total").increment(1);
                        tracing::trace!(target: "stream", %kind, "control message");
                        continue;
                    }
                    counter!("stream_events_total").increment(1);
                    if let Some(cb) = shared.message_cb() {
                        cb(payload);
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(target: "stream", error = %e, "stream read failed");
                break;
            }
        }
    }

    shared.connected.store(false, Ordering::SeqCst);
    tracing::info!(target: "stream", "stream ended");
    if let Some(cb) = shared.disconnect_cb() {
        cb();
    }
}

/// Split complete events off the front of the buffer, leaving any partial
/// event in place, and extract each event's data payload.
pub fn drain_events(buffer: &mut String) -> Vec<String> {
    let mut out = Vec::new();
    while let Some(pos) = buffer.find("\n\n") {
        let event: String = buffer[..pos].to_string();
        buffer.replace_range(..pos + 2, "");
        if let Some(payload) = data_payload(&event) {
            out.push(payload);
        }
    }
    out
}

/// The payload of the first `data:` line, prefix stripped and trimmed.
pub fn data_payload(event: &str) -> Option<String> {
    event
        .lines()
        .find_map(|line| line.strip_prefix("data:").map(|rest| rest.trim().to_string()))
}
