//! Integration tests for the feeds document: snapshot, reload, cached entries.
//!
//! Each test writes to its own temporary directory and serves feeds from a
//! mock HTTP server, so a full refresh can be exercised without the network.

use std::sync::Arc;
use std::time::Duration;

use feedshelf::feed::{FeedFetcher, SortMethod, SortOrder, Sorting};
use feedshelf::reader::FeedReader;
use feedshelf::storage::{read_document, FeedUpdate};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TECH_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Tech</title>
    <item>
      <title>Older</title>
      <link>https://tech.example/older</link>
      <pubDate>Mon, 01 Jan 2024 00:00:00 +0000</pubDate>
      <description>first</description>
    </item>
    <item>
      <title>Newer</title>
      <link>https://tech.example/newer</link>
      <pubDate>Tue, 02 Jan 2024 00:00:00 +0000</pubDate>
      <description>second</description>
    </item>
  </channel>
</rss>"#;

fn fetcher() -> FeedFetcher {
    FeedFetcher::new(reqwest::Client::new())
        .with_retry_delay(Duration::from_millis(5))
        .with_max_retries(0)
}

async fn serve(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/tech.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(TECH_RSS))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/down.xml"))
        .respond_with(ResponseTemplate::new(500))
        .mount(server)
        .await;
}

// ============================================================================
// Refresh (snapshot with fetching)
// ============================================================================

#[tokio::test]
async fn test_refresh_keeps_successful_feed_when_other_fails() {
    let server = MockServer::start().await;
    serve(&server).await;

    let dir = TempDir::new().unwrap();
    let feeds_path = dir.path().join("feeds.json");
    let reader = FeedReader::open(&feeds_path, fetcher()).unwrap();

    let ok_url = format!("{}/tech.xml", server.uri());
    let down_url = format!("{}/down.xml", server.uri());
    reader.add_feed(&ok_url, Some("tech".into())).await.unwrap();
    reader.add_feed(&down_url, Some("tech".into())).await.unwrap();

    let document = reader.refresh().await.unwrap();

    let tech = &document.categories["tech"];
    assert_eq!(tech.feeds.len(), 2);
    assert_eq!(tech.entries[&ok_url].len(), 2);
    assert!(!tech.entries.contains_key(&down_url));

    // What was returned is what was written
    assert_eq!(read_document(&feeds_path).unwrap(), document);
}

#[tokio::test]
async fn test_reload_restores_urls_and_categories() {
    let server = MockServer::start().await;
    serve(&server).await;

    let dir = TempDir::new().unwrap();
    let feeds_path = dir.path().join("feeds.json");
    let ok_url = format!("{}/tech.xml", server.uri());

    {
        let reader = FeedReader::open(&feeds_path, fetcher()).unwrap();
        reader.add_feed(&ok_url, Some("tech".into())).await.unwrap();
        reader.add_feed("https://news.example/rss", None).await.unwrap();
        reader
            .update_feed(
                "https://news.example/rss",
                FeedUpdate {
                    category: None,
                    enabled: Some(false),
                },
            )
            .await
            .unwrap();
        reader.refresh().await.unwrap();
    }

    let reader = FeedReader::open(&feeds_path, fetcher()).unwrap();
    let mut feeds: Vec<(String, Option<String>, bool)> = reader
        .feeds(None, true)
        .await
        .into_iter()
        .map(|f| (f.url, f.category, f.enabled))
        .collect();
    feeds.sort();

    // The enabled flag is not persisted, so the disabled feed comes back enabled
    assert_eq!(
        feeds,
        vec![
            (ok_url.clone(), Some("tech".to_string()), true),
            ("https://news.example/rss".to_string(), None, true),
        ]
    );

    let cached = reader
        .cached_entries(&ok_url, Sorting::new(SortMethod::Date, SortOrder::Descending))
        .await;
    let titles: Vec<&str> = cached.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, vec!["Newer", "Older"]);
    assert_eq!(cached[0].summary, "second");
}

#[tokio::test]
async fn test_feed_added_during_refresh_is_kept() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(TECH_RSS)
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let feeds_path = dir.path().join("feeds.json");
    let reader = FeedReader::open(&feeds_path, fetcher()).unwrap();
    let slow_url = format!("{}/slow.xml", server.uri());
    reader.add_feed(&slow_url, None).await.unwrap();

    let (refreshed, persisted) = tokio::join!(reader.refresh(), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        reader
            .add_feed("https://added.example/rss", None)
            .await
            .unwrap();
        reader.persist().await
    });
    persisted.unwrap();
    let document = refreshed.unwrap();

    let on_disk: Vec<String> = read_document(&feeds_path).unwrap().categories[""]
        .feeds
        .iter()
        .map(|r| r.url.clone())
        .collect();
    assert_eq!(on_disk, vec![slow_url.clone(), "https://added.example/rss".to_string()]);
    assert_eq!(read_document(&feeds_path).unwrap(), document);
    assert_eq!(document.categories[""].entries[&slow_url].len(), 2);
}

#[tokio::test]
async fn test_refresh_runs_on_spawned_task() {
    let server = MockServer::start().await;
    serve(&server).await;

    let dir = TempDir::new().unwrap();
    let reader = Arc::new(FeedReader::open(dir.path().join("feeds.json"), fetcher()).unwrap());
    let ok_url = format!("{}/tech.xml", server.uri());
    reader.add_feed(&ok_url, None).await.unwrap();

    let background = Arc::clone(&reader);
    let document = tokio::spawn(async move { background.refresh().await })
        .await
        .unwrap()
        .unwrap();

    assert_eq!(document.categories[""].entries[&ok_url].len(), 2);
    assert_eq!(reader.cached_entries(&ok_url, Sorting::default()).await.len(), 2);
}

// ============================================================================
// Persist (no fetching)
// ============================================================================

#[tokio::test]
async fn test_persist_writes_two_space_json_without_fetching() {
    let dir = TempDir::new().unwrap();
    let feeds_path = dir.path().join("feeds.json");
    let reader = FeedReader::open(&feeds_path, fetcher()).unwrap();
    reader
        .add_feed("https://a.com/rss", Some("tech".into()))
        .await
        .unwrap();

    reader.persist().await.unwrap();

    let content = std::fs::read_to_string(&feeds_path).unwrap();
    assert_eq!(
        content,
        r#"{
  "tech": {
    "feeds": [
      {
        "url": "https://a.com/rss"
      }
    ],
    "entries": {}
  }
}
"#
    );
}

#[tokio::test]
async fn test_missing_file_opens_empty() {
    let dir = TempDir::new().unwrap();
    let reader = FeedReader::open(dir.path().join("nope.json"), fetcher()).unwrap();
    assert!(reader.feeds(None, true).await.is_empty());
    assert!(reader.categories().await.is_empty());
}

#[tokio::test]
async fn test_uncategorized_feed_round_trips_as_none() {
    let dir = TempDir::new().unwrap();
    let feeds_path = dir.path().join("feeds.json");
    {
        let reader = FeedReader::open(&feeds_path, fetcher()).unwrap();
        reader.add_feed("https://a.com/rss", None).await.unwrap();
        reader.persist().await.unwrap();
    }

    let content = std::fs::read_to_string(&feeds_path).unwrap();
    assert!(content.contains(r#""": {"#));

    let reader = FeedReader::open(&feeds_path, fetcher()).unwrap();
    let feeds = reader.feeds(None, true).await;
    assert_eq!(feeds.len(), 1);
    assert_eq!(feeds[0].category, None);
}

#[tokio::test]
async fn test_blank_category_round_trips_as_uncategorized() {
    let dir = TempDir::new().unwrap();
    let feeds_path = dir.path().join("feeds.json");
    let before = {
        let reader = FeedReader::open(&feeds_path, fetcher()).unwrap();
        reader
            .add_feed("https://a.com/rss", Some(String::new()))
            .await
            .unwrap();
        reader.add_feed("https://b.com/rss ", Some("tech".into())).await.unwrap();
        reader.persist().await.unwrap();
        reader.feeds(None, true).await
    };

    let reader = FeedReader::open(&feeds_path, fetcher()).unwrap();
    let mut after = reader.feeds(None, true).await;
    after.sort_by(|a, b| a.url.cmp(&b.url));
    assert_eq!(after, before);
    assert_eq!(after[0].category, None);
    assert_eq!(after[1].url, "https://b.com/rss");
}

// ============================================================================
// Cached Entries
// ============================================================================

#[tokio::test]
async fn test_forget_cached_entry_survives_reload() {
    let server = MockServer::start().await;
    serve(&server).await;

    let dir = TempDir::new().unwrap();
    let feeds_path = dir.path().join("feeds.json");
    let ok_url = format!("{}/tech.xml", server.uri());

    {
        let reader = FeedReader::open(&feeds_path, fetcher()).unwrap();
        reader.add_feed(&ok_url, None).await.unwrap();
        reader.refresh().await.unwrap();

        assert!(reader.remove_entry(&ok_url, "https://tech.example/older").await);
        assert!(!reader.remove_entry(&ok_url, "https://tech.example/older").await);
        reader.persist().await.unwrap();
    }

    let reader = FeedReader::open(&feeds_path, fetcher()).unwrap();
    let cached = reader.cached_entries(&ok_url, Sorting::default()).await;
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].link, "https://tech.example/newer");
}

#[tokio::test]
async fn test_remove_feed_drops_cached_entries() {
    let server = MockServer::start().await;
    serve(&server).await;

    let dir = TempDir::new().unwrap();
    let reader = FeedReader::open(dir.path().join("feeds.json"), fetcher()).unwrap();
    let ok_url = format!("{}/tech.xml", server.uri());
    reader.add_feed(&ok_url, None).await.unwrap();
    reader.refresh().await.unwrap();
    assert_eq!(reader.cached_entries(&ok_url, Sorting::default()).await.len(), 2);

    reader.remove_feed(&ok_url).await;
    reader.persist().await.unwrap();

    assert!(reader.cached_entries(&ok_url, Sorting::default()).await.is_empty());
    let document = read_document(reader.path()).unwrap();
    assert!(document.is_empty());
}
