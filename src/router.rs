// src/router.rs
use crate::feed::CategoryFeed;
use crate::notify::NotificationPolicy;
use crate::post::Post;

/// Outcome of routing one post.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RouteOutcome {
    /// Tags of the feeds that accepted the insert.
    pub inserted: Vec<String>,
    /// Whether the notification gate fired for this post.
    pub notify: bool,
}

/// Fans one observed post out to every feed whose membership predicate it
/// satisfies. Inserts are independent: a post can land in "all", "relevant",
/// and several named categories at once. The router also owns the
/// notification policy so the gate is evaluated exactly once per post.
pub struct FeedRouter {
    pub policy: NotificationPolicy,
}

impl FeedRouter {
    pub fn new(policy: NotificationPolicy) -> Self {
        Self { policy }
    }

    pub fn route(&self, post: &Post, feeds: &mut [CategoryFeed]) -> RouteOutcome {
        let mut outcome = RouteOutcome {
            notify: self.policy.should_notify(post),
            ..Default::default()
        };
        for feed in feeds.iter_mut() {
            if feed.accepts(post) && feed.insert_post(post.clone()) {
                outcome.inserted.push(feed.tag().to_string());
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FeedKind;
    use chrono::{TimeZone, Utc};

    fn feeds() -> Vec<CategoryFeed> {
        vec![
            CategoryFeed::new(FeedKind::All, 1000, 0.0),
            CategoryFeed::new(FeedKind::Relevant, 500, 5.0),
            CategoryFeed::new(FeedKind::Category("business".into()), 500, 0.0),
            CategoryFeed::new(FeedKind::Category("weather".into()), 500, 0.0),
        ]
    }

    fn post(id: &str, relevance: i64, categories: &[&str]) -> Post {
        Post {
            id: id.to_string(),
            relevance,
            posted_at: Utc.timestamp_opt(1_752_000_000, 0).unwrap(),
            categories: categories.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn one_post_lands_in_every_matching_feed() {
        let router = FeedRouter::new(NotificationPolicy::new(5.0));
        let mut feeds = feeds();
        let outcome = router.route(&post("1", 8, &["Business"]), &mut feeds);
        assert_eq!(outcome.inserted, vec!["all", "relevant", "business"]);
    }

    #[test]
    fn repeat_routing_inserts_nothing() {
        let router = FeedRouter::new(NotificationPolicy::new(5.0));
        let mut feeds = feeds();
        let p = post("1", 8, &["business"]);
        router.route(&p, &mut feeds);
        let outcome = router.route(&p, &mut feeds);
        assert!(outcome.inserted.is_empty());
        assert_eq!(feeds[0].len(), 1);
    }

    #[test]
    fn notify_matches_relevant_membership() {
        let mut policy = NotificationPolicy::new(5.0);
        policy.authorized = true;
        let router = FeedRouter::new(policy);
        let mut feeds = feeds();

        let low = router.route(&post("low", 3, &[]), &mut feeds);
        assert!(!low.notify);
        assert!(!low.inserted.contains(&"relevant".to_string()));

        let high = router.route(&post("high", 7, &[]), &mut feeds);
        assert!(high.notify);
        assert!(high.inserted.contains(&"relevant".to_string()));
    }
}
