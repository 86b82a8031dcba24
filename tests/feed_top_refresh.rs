// tests/feed_top_refresh.rs
use chrono::{DateTime, TimeZone, Utc};
use newsdeck::{CategoryFeed, FeedKind, Post, PAGE_SIZE};

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_752_000_000 + secs, 0).unwrap()
}

fn post(id: &str, secs: i64) -> Post {
    Post {
        id: id.to_string(),
        relevance: 5,
        posted_at: at(secs),
        ..Default::default()
    }
}

fn seeded_feed() -> CategoryFeed {
    let mut feed = CategoryFeed::new(FeedKind::All, 1000, 0.0);
    feed.begin_initial().unwrap();
    let first: Vec<Post> = (0..PAGE_SIZE)
        .map(|i| post(&format!("p{i:04}"), 10_000 - i as i64))
        .collect();
    feed.apply_initial(first);
    feed
}

#[test]
fn top_refresh_never_touches_pagination_state() {
    let mut feed = seeded_feed();
    let cursor = feed.oldest_timestamp();
    let has_more = feed.has_more();

    feed.begin_top_refresh().unwrap();
    // A full page of newer posts arrives; pagination state must not move.
    let newer: Vec<Post> = (0..PAGE_SIZE)
        .map(|i| post(&format!("n{i:04}"), 20_000 - i as i64))
        .collect();
    feed.apply_top_refresh(newer);

    assert_eq!(feed.oldest_timestamp(), cursor);
    assert_eq!(feed.has_more(), has_more);
    assert_eq!(feed.len(), 2 * PAGE_SIZE);
}

#[test]
fn top_refresh_prepends_only_unseen_posts() {
    let mut feed = seeded_feed();
    let before = feed.len();

    feed.begin_top_refresh().unwrap();
    // Two repeats of the current head plus one genuinely new post.
    feed.apply_top_refresh(vec![
        post("fresh", 10_001),
        post("p0000", 10_000),
        post("p0001", 9_999),
    ]);

    assert_eq!(feed.len(), before + 1);
    assert_eq!(feed.posts()[0].id, "fresh");
}

#[test]
fn merged_list_is_resorted_with_id_tiebreak() {
    let mut feed = CategoryFeed::new(FeedKind::All, 1000, 0.0);
    feed.begin_initial().unwrap();
    feed.apply_initial(vec![post("m", 100), post("a", 50)]);

    feed.begin_top_refresh().unwrap();
    // "z" ties with "m" on timestamp; "k" lands between the existing two.
    feed.apply_top_refresh(vec![post("z", 100), post("k", 75)]);

    assert_eq!(
        feed.posts().iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
        vec!["z", "m", "k", "a"]
    );
}

#[test]
fn refresh_with_nothing_new_is_a_no_op() {
    let mut feed = seeded_feed();
    let before = feed.posts().to_vec();

    feed.begin_top_refresh().unwrap();
    feed.apply_top_refresh(vec![post("p0000", 10_000)]);
    assert_eq!(feed.posts(), before.as_slice());
}

#[test]
fn refresh_is_skipped_while_loading() {
    let mut feed = seeded_feed();
    feed.begin_load_more().unwrap();
    assert!(feed.begin_top_refresh().is_none());
}
