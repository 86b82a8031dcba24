// src/decode.rs
//! Envelope handling for page bodies and classification of stream payloads.

use metrics::counter;
use serde_json::Value;

use crate::error::FeedError;
use crate::post::Post;

/// Control payloads (`{"type": "ping"}` / `{"type": "connected"}`) manage the
/// connection instead of carrying a post. Returns the control kind, or None
/// for anything that should be treated as a post event.
pub fn control_type(raw: &str) -> Option<String> {
    let v: Value = serde_json::from_str(raw).ok()?;
    match v.get("type")?.as_str()? {
        t @ ("ping" | "connected") => Some(t.to_string()),
        _ => None,
    }
}

/// Decode one stream payload into a post.
pub fn decode_post(raw: &str) -> Result<Post, FeedError> {
    serde_json::from_str(raw).map_err(|e| FeedError::Decode(e.to_string()))
}

/// Decode a REST page body.
///
/// The envelope is a plain array, or one of the wrapper shapes the API has
/// shipped over time: `{"data": [...]}`, `{"posts": [...]}`,
/// `{"data": {"posts": [...]}}`. Records decode best-effort: a bad record is
/// dropped and counted, the rest of the page survives. Only an unrecognized
/// envelope fails the whole page.
pub fn decode_batch(raw: &str) -> Result<Vec<Post>, FeedError> {
    let root: Value = serde_json::from_str(raw).map_err(|e| FeedError::Decode(e.to_string()))?;
    let items = unwrap_envelope(root)?;
    let total = items.len();
    let mut posts = Vec::with_capacity(total);
    for item in items {
        match serde_json::from_value::<Post>(item) {
            Ok(p) => posts.push(p),
            Err(e) => {
                counter!("decode_dropped_total").increment(1);
                tracing::warn!(target: "decode", error = %e, "dropping undecodable post record");
            }
        }
    }
    counter!("decode_posts_total").increment(posts.len() as u64);
    if posts.len() < total {
        tracing::warn!(target: "decode", kept = posts.len(), total, "page decoded partially");
    }
    Ok(posts)
}

fn unwrap_envelope(root: Value) -> Result<Vec<Value>, FeedError> {
    match root {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => Ok(items),
            data => {
                if let Some(Value::Array(items)) = map.remove("posts") {
                    return Ok(items);
                }
                if let Some(Value::Object(mut inner)) = data {
                    if let Some(Value::Array(items)) = inner.remove("posts") {
                        return Ok(items);
                    }
                }
                Err(FeedError::Decode("unrecognized response envelope".into()))
            }
        },
        _ => Err(FeedError::Decode(
            "response is neither an array nor an object".into(),
        )),
    }
}
