// tests/notify_policy.rs
// The notification gate and the "relevant" feed must agree on the same
// comparison for every threshold and every post.

use chrono::{TimeZone, Utc};
use newsdeck::{CategoryFeed, FeedKind, NotificationPolicy, Post};

fn post(id: &str, relevance: i64) -> Post {
    Post {
        id: id.to_string(),
        relevance,
        posted_at: Utc.timestamp_opt(1_752_000_000, 0).unwrap(),
        ..Default::default()
    }
}

#[test]
fn gate_and_relevant_feed_agree_on_every_boundary() {
    // Integral thresholds plus the fractional case the UI never sets but the
    // comparison must still define.
    for threshold in [0.0, 2.0, 4.5, 5.0, 7.0, 10.0] {
        let mut policy = NotificationPolicy::new(threshold);
        policy.authorized = true;
        for relevance in 0..=10 {
            let p = post(&format!("r{relevance}"), relevance);
            let mut feed = CategoryFeed::new(FeedKind::Relevant, 500, threshold);
            let inserted = feed.insert_post(p.clone());
            assert_eq!(
                policy.should_notify(&p),
                inserted,
                "divergence at threshold {threshold}, relevance {relevance}"
            );
            assert_eq!(inserted, relevance as f64 >= threshold);
        }
    }
}

#[test]
fn authorization_gates_notification_but_not_membership() {
    let policy = NotificationPolicy::new(0.0);
    let p = post("1", 10);
    assert!(!policy.should_notify(&p));

    // The feed keeps admitting posts regardless of notification permission.
    let mut feed = CategoryFeed::new(FeedKind::Relevant, 500, 0.0);
    assert!(feed.insert_post(p));
}

#[test]
fn threshold_five_examples() {
    let mut policy = NotificationPolicy::new(5.0);
    policy.authorized = true;
    assert!(!policy.should_notify(&post("low", 3)));
    assert!(policy.should_notify(&post("edge", 5)));
    assert!(policy.should_notify(&post("high", 8)));
}
