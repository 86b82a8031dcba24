pub mod devices;

use crate::post::Post;

/// The one comparison shared by the notification gate and the "relevant"
/// feed's membership test, so the two call sites cannot drift. Relevance is
/// documented as an integer 0..=10 but thresholds are plain floats; a
/// fractional threshold behaves by ordinary numeric comparison.
pub fn relevance_meets(relevance: i64, threshold: f64) -> bool {
    relevance as f64 >= threshold
}

/// Decides whether a post merits a local notification.
#[derive(Debug, Clone, Copy)]
pub struct NotificationPolicy {
    pub relevance_threshold: f64,
    pub authorized: bool,
}

impl NotificationPolicy {
    pub fn new(relevance_threshold: f64) -> Self {
        Self {
            relevance_threshold,
            authorized: false,
        }
    }

    pub fn should_notify(&self, post: &Post) -> bool {
        self.authorized && relevance_meets(post.relevance, self.relevance_threshold)
    }
}
