// src/post.rs
//! The normalized post entity and its tolerant wire decoding.
//!
//! The API has shipped several generations of the post schema: ids arrive as
//! integers or strings, timestamps in three textual forms or as raw epoch
//! numbers, media as structured objects or bare URL strings, and the stream
//! variant adds bookkeeping fields the client never uses. Decoding accepts
//! the union of all observed shapes and normalizes to one entity.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LinkPreview {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MediaItem {
    pub url: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub alt: Option<String>,
}

impl MediaItem {
    pub fn from_url(url: String) -> Self {
        Self {
            url: Some(url),
            ..Default::default()
        }
    }
}

/// One post. Identity is `id`: two posts with equal `id` are the same
/// logical post regardless of any other field, and no feed ever holds two
/// entries with equal `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub content: String,
    pub source: String,
    #[serde(deserialize_with = "de_posted_at")]
    pub posted_at: DateTime<Utc>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub author: Option<String>,
    pub relevance: i64,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub author_handle: Option<String>,
    #[serde(default)]
    pub author_avatar: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default, deserialize_with = "de_media")]
    pub media: Vec<MediaItem>,
    #[serde(default, alias = "linkPreview", deserialize_with = "de_link_preview")]
    pub link_preview: Option<LinkPreview>,
    #[serde(default)]
    pub lang: Option<String>,
    // Passthrough identifiers, kept for traceability only.
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default, alias = "matchScore")]
    pub match_score: Option<f64>,
}

impl Default for Post {
    fn default() -> Self {
        Self {
            id: String::new(),
            content: String::new(),
            source: String::new(),
            posted_at: DateTime::UNIX_EPOCH,
            categories: Vec::new(),
            author: None,
            relevance: 0,
            author_name: None,
            author_handle: None,
            author_avatar: None,
            uri: None,
            media: Vec::new(),
            link_preview: None,
            lang: None,
            hash: None,
            uuid: None,
            match_score: None,
        }
    }
}

impl Post {
    /// Display author: the explicit author_name wins, then the raw author
    /// field, then a literal fallback.
    pub fn effective_author(&self) -> &str {
        self.author_name
            .as_deref()
            .or(self.author.as_deref())
            .unwrap_or("Unknown Author")
    }

    /// Case-insensitive category membership.
    pub fn has_category(&self, tag: &str) -> bool {
        self.categories.iter().any(|c| c.eq_ignore_ascii_case(tag))
    }

    /// The link to open for this post: the original-post `uri` always wins
    /// over any media URL.
    pub fn primary_link(&self) -> Option<&str> {
        self.uri
            .as_deref()
            .or_else(|| self.media.iter().find_map(|m| m.url.as_deref()))
    }
}

fn de_id<'de, D>(d: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(d)?;
    match v {
        Value::String(s) => Ok(s),
        // Older payloads send numeric ids; normalize to decimal string form.
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "id must be a string or integer, got {other}"
        ))),
    }
}

fn de_posted_at<'de, D>(d: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(d)?;
    parse_timestamp(&v)
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognized timestamp: {v}")))
}

/// Timestamp cascade: ISO-8601 text first, then the fixed millisecond and
/// no-fraction forms, then a raw epoch-seconds number. First success wins;
/// if everything fails the record fails to decode.
pub(crate) fn parse_timestamp(v: &Value) -> Option<DateTime<Utc>> {
    match v {
        Value::String(s) => parse_timestamp_str(s),
        Value::Number(n) => {
            let secs = n.as_f64()?;
            let nanos = (secs.fract().abs() * 1e9) as u32;
            Utc.timestamp_opt(secs.trunc() as i64, nanos).single()
        }
        _ => None,
    }
}

pub(crate) fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.3fZ") {
        return Some(Utc.from_utc_datetime(&dt));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%SZ") {
        return Some(Utc.from_utc_datetime(&dt));
    }
    None
}

fn de_media<'de, D>(d: D) -> Result<Vec<MediaItem>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(d)?;
    Ok(media_from_value(v))
}

/// Media arrives either as structured objects or as a list of nullable URL
/// strings; both normalize to the structured shape (nulls filtered, bare
/// strings wrapped with only `url` set). Anything else yields an empty list
/// rather than failing the record.
pub(crate) fn media_from_value(v: Value) -> Vec<MediaItem> {
    let items = match v {
        Value::Array(items) => items,
        _ => return Vec::new(),
    };
    match serde_json::from_value::<Vec<MediaItem>>(Value::Array(items.clone())) {
        Ok(structured) => structured,
        Err(_) => match serde_json::from_value::<Vec<Option<String>>>(Value::Array(items)) {
            Ok(urls) => urls
                .into_iter()
                .flatten()
                .map(MediaItem::from_url)
                .collect(),
            Err(_) => Vec::new(),
        },
    }
}

fn de_link_preview<'de, D>(d: D) -> Result<Option<LinkPreview>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(d)?;
    Ok(match v {
        Value::Object(_) => serde_json::from_value(v).ok(),
        // The stream variant sends a bare string here; it carries no usable
        // structure and is dropped.
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn decodes_current_rest_shape() {
        let raw = r#"{
            "id": "p-100",
            "content": "Markets opened mixed",
            "source": "bluesky",
            "posted_at": "2025-07-18T14:03:22.123Z",
            "categories": ["Business", "world"],
            "author": null,
            "relevance": 7,
            "author_name": "Jane Doe",
            "author_handle": "@jane",
            "uri": "https://example.com/p/100",
            "media": [{"url": "https://cdn.example.com/a.png", "type": "image", "width": 640, "height": 480}],
            "link_preview": {"title": "Story", "url": "https://example.com/story"},
            "lang": "en"
        }"#;
        let post: Post = serde_json::from_str(raw).unwrap();
        assert_eq!(post.id, "p-100");
        assert_eq!(post.relevance, 7);
        assert_eq!(post.media.len(), 1);
        assert_eq!(post.media[0].kind.as_deref(), Some("image"));
        assert_eq!(
            post.link_preview.as_ref().unwrap().title.as_deref(),
            Some("Story")
        );
        assert_eq!(post.effective_author(), "Jane Doe");
        assert!(post.has_category("BUSINESS"));
    }

    #[test]
    fn decodes_stream_shape_with_extras() {
        // Stream payloads add receipt bookkeeping and send linkPreview as a
        // string; both must be tolerated, the latter dropped.
        let raw = r#"{
            "id": 4217,
            "content": "Severe weather alert",
            "source": "wire",
            "posted_at": "2025-07-18T14:03:22Z",
            "categories": ["weather"],
            "relevance": 9,
            "linkPreview": "https://example.com/preview",
            "received_at": "2025-07-18T14:03:23Z",
            "timestamp": "2025-07-18T14:03:23Z",
            "original": "{...}",
            "hash": "abc123",
            "author_id": "77"
        }"#;
        let post: Post = serde_json::from_str(raw).unwrap();
        assert_eq!(post.id, "4217");
        assert!(post.link_preview.is_none());
        assert_eq!(post.hash.as_deref(), Some("abc123"));
        assert_eq!(post.effective_author(), "Unknown Author");
    }

    #[test]
    fn missing_categories_default_to_empty() {
        let raw = r#"{"id":"1","content":"x","source":"s","posted_at":"2025-01-01T00:00:00Z","relevance":0}"#;
        let post: Post = serde_json::from_str(raw).unwrap();
        assert!(post.categories.is_empty());
    }

    #[test]
    fn timestamp_cascade_accepts_all_observed_forms() {
        let expect = Utc.with_ymd_and_hms(2025, 7, 18, 14, 3, 22).unwrap();
        for s in [
            "2025-07-18T14:03:22.000Z",
            "2025-07-18T14:03:22Z",
            "2025-07-18T14:03:22+00:00",
        ] {
            assert_eq!(parse_timestamp_str(s), Some(expect), "form: {s}");
        }
        assert_eq!(parse_timestamp_str("18/07/2025"), None);
        // Raw epoch number as last resort.
        let v = serde_json::json!(1752847402);
        assert_eq!(
            parse_timestamp(&v),
            Some(Utc.timestamp_opt(1752847402, 0).unwrap())
        );
    }

    #[test]
    fn media_string_list_filters_nulls() {
        let v = serde_json::json!(["http://a/x.png", null, "http://a/y.pdf"]);
        let media = media_from_value(v);
        assert_eq!(media.len(), 2);
        assert_eq!(media[0].url.as_deref(), Some("http://a/x.png"));
        assert_eq!(media[1].url.as_deref(), Some("http://a/y.pdf"));
        assert!(media[0].kind.is_none());
        assert!(media[0].width.is_none());
    }

    #[test]
    fn unusable_media_degrades_to_empty() {
        assert!(media_from_value(serde_json::json!([1, 2, 3])).is_empty());
        assert!(media_from_value(serde_json::json!("not-a-list")).is_empty());
        assert!(media_from_value(serde_json::Value::Null).is_empty());
    }

    #[test]
    fn primary_link_prefers_uri_over_media() {
        let post = Post {
            uri: Some("https://orig.example.com".into()),
            media: vec![MediaItem::from_url("https://cdn.example.com/a.png".into())],
            ..Default::default()
        };
        assert_eq!(post.primary_link(), Some("https://orig.example.com"));

        let post = Post {
            media: vec![MediaItem::from_url("https://cdn.example.com/a.png".into())],
            ..Default::default()
        };
        assert_eq!(post.primary_link(), Some("https://cdn.example.com/a.png"));
    }
}
