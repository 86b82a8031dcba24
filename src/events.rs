// src/events.rs
// Events are the server's clustered view of related posts; a secondary,
// read-only resource beside the live feed.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::error::FeedError;
use crate::post;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPost {
    #[serde(deserialize_with = "de_numeric_id")]
    pub id: i64,
    pub uuid: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    pub score: i64,
    pub author_name: String,
    pub author_handle: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    pub hash: String,
    pub match_score: f64,
}

impl EventPost {
    /// Parsed creation time, when the wire value is well-formed.
    pub fn created_date(&self) -> Option<DateTime<Utc>> {
        post::parse_timestamp_str(&self.created_at)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(deserialize_with = "de_numeric_id")]
    pub id: i64,
    pub uuid: String,
    pub title: String,
    pub summary: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
    pub posts_count: i64,
    #[serde(default)]
    pub posts: Option<Vec<EventPost>>,
}

impl Event {
    pub fn created_date(&self) -> Option<DateTime<Utc>> {
        post::parse_timestamp_str(&self.created_at)
    }

    pub fn updated_date(&self) -> Option<DateTime<Utc>> {
        post::parse_timestamp_str(&self.updated_at)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventsResponse {
    pub events: Vec<Event>,
    pub total: i64,
}

// Ids drift between integer and string across schema generations; anything
// unusable falls back to 0 rather than sinking the record.
fn de_numeric_id<'de, D>(d: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(d)?;
    Ok(match v {
        Value::Number(n) => n.as_i64().unwrap_or(0),
        Value::String(s) => s.parse().unwrap_or(0),
        _ => 0,
    })
}

pub struct EventsClient {
    base_url: String,
    client: Client,
    timeout: Duration,
}

impl EventsClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::new(),
            timeout: Duration::from_secs(15),
        }
    }

    pub async fn fetch_events(&self, limit: Option<usize>) -> Result<EventsResponse, FeedError> {
        let mut url = format!("{}/events", self.base_url);
        if let Some(limit) = limit {
            url.push_str(&format!("?limit={limit}"));
        }
        tracing::debug!(target: "events", %url, "fetching events");
        let resp = self.client.get(&url).timeout(self.timeout).send().await?;
        let status = resp.status();
        if status.as_u16() >= 400 {
            return Err(FeedError::Http(status.as_u16()));
        }
        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| FeedError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_events_envelope_with_drifted_ids() {
        let raw = r#"{
            "events": [{
                "id": "42",
                "uuid": "e-42",
                "title": "Market selloff",
                "summary": "Broad decline across indices",
                "status": "open",
                "created_at": "2025-07-18T14:03:22.000Z",
                "updated_at": "2025-07-18T15:00:00.000Z",
                "posts_count": 2,
                "posts": [{
                    "id": 7,
                    "uuid": "p-7",
                    "title": "Post title",
                    "content": "Post content",
                    "image_url": null,
                    "url": "https://example.com/p/7",
                    "score": 3,
                    "author_name": "Jane",
                    "author_handle": "@jane",
                    "createdAt": "2025-07-18T14:00:00.000Z",
                    "hash": "h7",
                    "match_score": 0.92
                }]
            }],
            "total": 1
        }"#;
        let resp: EventsResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.total, 1);
        let event = &resp.events[0];
        assert_eq!(event.id, 42);
        assert!(event.created_date().is_some());
        let post = &event.posts.as_ref().unwrap()[0];
        assert_eq!(post.id, 7);
        assert_eq!(post.match_score, 0.92);
    }

    #[test]
    fn event_without_posts_decodes() {
        let raw = r#"{
            "id": 1, "uuid": "e-1", "title": "t", "summary": "s",
            "status": "closed",
            "created_at": "2025-07-18T14:03:22Z",
            "updated_at": "2025-07-18T14:03:22Z",
            "posts_count": 0
        }"#;
        let event: Event = serde_json::from_str(raw).unwrap();
        assert!(event.posts.is_none());
    }
}
