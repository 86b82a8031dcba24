// tests/feed_insert.rs
use chrono::{DateTime, Duration, TimeZone, Utc};
use newsdeck::{CategoryFeed, FeedKind, Post};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 7, 18, 14, 0, 0).unwrap()
}

fn post(id: &str, relevance: i64, posted_at: DateTime<Utc>) -> Post {
    Post {
        id: id.to_string(),
        relevance,
        posted_at,
        ..Default::default()
    }
}

#[test]
fn newer_then_older_insert_keeps_order() {
    // Empty "all" feed; relevance-8 post at t0, then relevance-2 at t0-100s.
    let mut feed = CategoryFeed::new(FeedKind::All, 1000, 0.0);
    feed.insert_post(post("3", 8, t0()));
    feed.insert_post(post("1", 2, t0() - Duration::seconds(100)));
    assert_eq!(
        feed.posts().iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
        vec!["3", "1"]
    );
}

#[test]
fn insert_is_idempotent() {
    let mut feed = CategoryFeed::new(FeedKind::All, 1000, 0.0);
    let p = post("7", 5, t0());
    assert!(feed.insert_post(p.clone()));
    let after_first = feed.posts().to_vec();
    assert!(!feed.insert_post(p));
    assert_eq!(feed.posts(), after_first.as_slice());
}

#[test]
fn relevant_feed_applies_threshold() {
    let mut feed = CategoryFeed::new(FeedKind::Relevant, 500, 5.0);
    feed.insert_post(post("low", 3, t0()));
    assert!(feed.is_empty());
    feed.insert_post(post("high", 7, t0()));
    assert_eq!(feed.len(), 1);
    assert_eq!(feed.posts()[0].id, "high");
}

#[test]
fn insert_changes_list_iff_membership_holds() {
    let mut business = CategoryFeed::new(FeedKind::Category("business".into()), 500, 0.0);
    let mut weather = CategoryFeed::new(FeedKind::Category("weather".into()), 500, 0.0);

    let mut p = post("1", 5, t0());
    p.categories = vec!["Business".into()];
    assert!(business.insert_post(p.clone()));
    assert!(!weather.insert_post(p));
    assert_eq!(business.len(), 1);
    assert!(weather.is_empty());
}

#[test]
fn capacity_trims_the_tail() {
    let mut feed = CategoryFeed::new(FeedKind::All, 2, 0.0);
    feed.insert_post(post("a", 5, t0()));
    feed.insert_post(post("b", 5, t0() + Duration::seconds(1)));
    feed.insert_post(post("c", 5, t0() + Duration::seconds(2)));
    assert_eq!(
        feed.posts().iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
        vec!["c", "b"]
    );
}
