//! Integration tests for the HTTP signal sources using wiremock.

use chrono::Utc;
use trendcast_core::{NewsFeed, WatchKeyword};
use trendcast_signals::{NewsFeedSource, RedditSource, SignalError, SignalSource};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn keyword(k: &str) -> WatchKeyword {
    WatchKeyword {
        keyword: k.to_string(),
        category: "football".to_string(),
        related: vec![],
    }
}

#[allow(clippy::cast_precision_loss)]
fn post(title: &str, score: i64, comments: i64, age_secs: i64) -> serde_json::Value {
    serde_json::json!({
        "kind": "t3",
        "data": {
            "title": title,
            "permalink": format!("/r/soccer/comments/{score}/"),
            "score": score,
            "num_comments": comments,
            "created_utc": (Utc::now().timestamp() - age_secs) as f64
        }
    })
}

#[tokio::test]
async fn reddit_counts_recent_posts_and_keeps_top_samples() {
    let server = MockServer::start().await;
    let body = serde_json::json!({
        "kind": "Listing",
        "data": {
            "children": [
                post("Haaland stunning hat-trick", 900, 100, 60),
                post("Haaland injury worry", 50, 10, 600),
                post("Haaland brilliant again", 300, 20, 1200),
                post("Old Haaland thread", 5000, 900, 3 * 3600)
            ],
            "after": null
        }
    });

    Mock::given(method("GET"))
        .and(path("/r/soccer+football/search.json"))
        .and(query_param("q", "\"Haaland\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let source = RedditSource::with_base_url(
        "trendcast-test",
        5,
        vec!["soccer".to_string(), "football".to_string()],
        &server.uri(),
    )
    .expect("client construction should not fail");

    let signals = source
        .fetch(&[keyword("Haaland")])
        .await
        .expect("fetch should succeed");

    assert_eq!(signals.len(), 1);
    let signal = &signals[0];
    assert_eq!(signal.mention_count, 3);
    assert!((signal.velocity - 3.0 / 60.0).abs() < 1e-9);
    assert_eq!(signal.samples.len(), 3);
    assert_eq!(signal.samples[0].engagement, 1000);
    assert_eq!(
        signal.samples[0].url.as_deref(),
        Some("https://reddit.com/r/soccer/comments/900/")
    );
    assert!(signal.sentiment.is_some());
}

#[tokio::test]
async fn reddit_outage_for_every_keyword_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let source = RedditSource::with_base_url("trendcast-test", 5, vec![], &server.uri())
        .expect("client construction should not fail");

    let err = source
        .fetch(&[keyword("VAR"), keyword("Messi")])
        .await
        .unwrap_err();
    assert!(matches!(err, SignalError::Http(_)));
}

#[tokio::test]
async fn reddit_garbage_body_is_a_deserialize_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>blocked</html>"))
        .mount(&server)
        .await;

    let source = RedditSource::with_base_url("trendcast-test", 5, vec![], &server.uri())
        .expect("client construction should not fail");

    let err = source.fetch(&[keyword("VAR")]).await.unwrap_err();
    assert!(matches!(err, SignalError::Deserialize { .. }));
}

#[tokio::test]
async fn news_feeds_are_isolated_per_feed() {
    let server = MockServer::start().await;
    let rss = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <item>
    <title>Mbappe double sinks rivals</title>
    <link>https://news.example/mbappe</link>
    <description>&lt;p&gt;Two goals in ten minutes.&lt;/p&gt;</description>
    <pubDate>Sun, 01 Mar 2026 20:00:00 +0000</pubDate>
  </item>
</channel></rss>"#;

    Mock::given(method("GET"))
        .and(path("/good.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(rss))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bad.xml"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let source = NewsFeedSource::new(
        "trendcast-test",
        5,
        vec![
            NewsFeed {
                name: "Broken".to_string(),
                url: format!("{}/bad.xml", server.uri()),
            },
            NewsFeed {
                name: "Good".to_string(),
                url: format!("{}/good.xml", server.uri()),
            },
        ],
    )
    .expect("client construction should not fail");

    let items = source.fetch_all().await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].source, "Good");
    assert_eq!(items[0].url, "https://news.example/mbappe");
    assert_eq!(items[0].description, "Two goals in ten minutes.");
}
