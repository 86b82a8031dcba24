use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

/// Fire-and-forget sinks for device registration, settings sync, read
/// receipts, and analytics. The server treats these as opaque; the only
/// thing the feed core contributes is the relevance threshold and the
/// notification decision. Failures are logged by callers and swallowed;
/// nothing here feeds back into feed state.
#[derive(Clone)]
pub struct DeviceGateway {
    base_url: String,
    client: Client,
    timeout: Duration,
}

impl DeviceGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::new(),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub async fn register_device(
        &self,
        token: &str,
        relevance_threshold: f64,
        active: bool,
    ) -> Result<()> {
        let body = register_payload(token, relevance_threshold, active);
        self.post(&format!("{}/devices", self.base_url), body).await
    }

    pub async fn update_settings(
        &self,
        token: &str,
        relevance_threshold: f64,
        active: bool,
    ) -> Result<()> {
        let body = json!({
            "relevanceThreshold": relevance_threshold,
            "isActive": active,
            "lastUpdated": now_iso(),
        });
        let url = format!("{}/devices/{}", self.base_url, token);
        let rsp = self
            .client
            .put(&url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;
        rsp.error_for_status()?;
        Ok(())
    }

    pub async fn mark_post_read(&self, token: &str, post_id: &str) -> Result<()> {
        let body = json!({ "postId": post_id, "readAt": now_iso() });
        let url = format!("{}/devices/{}/read", self.base_url, token);
        self.post(&url, body).await
    }

    pub async fn send_analytics(&self, token: &str, event: &str, data: Value) -> Result<()> {
        let body = analytics_payload(token, event, data);
        self.post(&format!("{}/analytics", self.base_url), body)
            .await
    }

    async fn post(&self, url: &str, body: Value) -> Result<()> {
        let rsp = self
            .client
            .post(url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;
        rsp.error_for_status()?;
        Ok(())
    }
}

fn register_payload(token: &str, relevance_threshold: f64, active: bool) -> Value {
    json!({
        "deviceToken": token,
        "platform": "newsdeck",
        "relevanceThreshold": relevance_threshold,
        "isActive": active,
        "registeredAt": now_iso(),
    })
}

fn analytics_payload(token: &str, event: &str, mut data: Value) -> Value {
    let mut body = json!({
        "deviceToken": token,
        "event": event,
        "timestamp": now_iso(),
        "platform": "newsdeck",
    });
    // Extra data merges over the base fields, matching the server contract.
    if let (Some(map), Some(extra)) = (body.as_object_mut(), data.as_object_mut()) {
        for (k, v) in std::mem::take(extra) {
            map.insert(k, v);
        }
    }
    body
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
