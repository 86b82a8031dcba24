// src/api.rs
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::Client;
use std::time::Duration;

use crate::decode;
use crate::error::FeedError;
use crate::feed::PageRequest;
use crate::post::Post;

/// The REST boundary for page fetches. Production uses [`HttpPostsGateway`];
/// tests provide in-memory implementations so no test ever touches a socket.
#[async_trait]
pub trait PostsGateway: Send + Sync {
    async fn fetch_page(&self, req: &PageRequest) -> Result<Vec<Post>, FeedError>;
}

pub struct HttpPostsGateway {
    base_url: String,
    client: Client,
    timeout: Duration,
}

impl HttpPostsGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::new(),
            timeout: Duration::from_secs(15),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    fn page_url(&self, req: &PageRequest) -> String {
        let mut url = format!("{}/posts?limit={}", self.base_url, req.limit);
        if let Some(before) = req.before {
            url.push_str(&format!(
                "&before={}",
                before.to_rfc3339_opts(SecondsFormat::Millis, true)
            ));
        }
        if let Some(categories) = &req.categories {
            if !categories.is_empty() {
                url.push_str(&format!("&categories={}", categories.join(",")));
            }
        }
        url
    }
}

#[async_trait]
impl PostsGateway for HttpPostsGateway {
    async fn fetch_page(&self, req: &PageRequest) -> Result<Vec<Post>, FeedError> {
        let url = self.page_url(req);
        tracing::debug!(target: "api", %url, "fetching page");
        let resp = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await?;
        let status = resp.status();
        if status.as_u16() >= 400 {
            return Err(FeedError::Http(status.as_u16()));
        }
        let body = resp.text().await?;
        decode::decode_batch(&body)
    }
}
