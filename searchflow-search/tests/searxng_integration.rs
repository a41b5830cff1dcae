//! Integration tests against a mock SearXNG instance.
//!
//! Each test stands up a wiremock server answering `/search` and drives
//! the public retrieval entry points through real HTTP.

use searchflow_search::{SearchConfig, SearchError};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> SearchConfig {
    SearchConfig {
        searxng_url: server.uri(),
        timeout_seconds: 2,
        ..Default::default()
    }
}

#[tokio::test]
async fn returns_results_in_provider_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "python asyncio"))
        .and(query_param("format", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "query": "python asyncio",
            "results": [
                {"url": "https://docs.python.org/3/library/asyncio.html", "title": "asyncio", "content": "Asynchronous I/O", "engine": "duckduckgo"},
                {"url": "https://realpython.com/async-io-python/", "title": "Async IO", "content": "A walkthrough", "engine": "bing"}
            ]
        })))
        .mount(&server)
        .await;

    let results = searchflow_search::search("python asyncio", &config_for(&server))
        .await
        .expect("search");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].url, "https://docs.python.org/3/library/asyncio.html");
    assert_eq!(results[1].engine, "bing");
}

#[tokio::test]
async fn duplicates_removed_and_truncated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"url": "https://a.com/x", "title": "A", "content": "a"},
                {"url": "https://www.a.com/x/", "title": "A again", "content": "a"},
                {"url": "https://b.com", "title": "B", "content": "b"},
                {"url": "https://c.com", "title": "C", "content": "c"}
            ]
        })))
        .mount(&server)
        .await;

    let config = SearchConfig {
        max_results: 2,
        ..config_for(&server)
    };
    let results = searchflow_search::search("q", &config).await.expect("search");
    let titles: Vec<&str> = results.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["A", "B"]);
    assert_eq!(results[0].engine, "unknown");
}

#[tokio::test]
async fn server_error_yields_empty_set() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(502))
        .expect(2)
        .mount(&server)
        .await;

    let results = searchflow_search::search("q", &config_for(&server))
        .await
        .expect("config is valid");
    assert!(results.is_empty());
}

#[tokio::test]
async fn client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let err = searchflow_search::try_search("q", &config_for(&server))
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::Status { status: 403 }));
}

#[tokio::test]
async fn malformed_body_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>captcha</html>"))
        .mount(&server)
        .await;

    let err = searchflow_search::try_search("q", &config_for(&server))
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::Parse(_)));
}

#[tokio::test]
async fn slow_server_times_out_into_empty_set() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"results": []}))
                .set_delay(std::time::Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let config = SearchConfig {
        timeout_seconds: 1,
        retry_attempts: 0,
        ..config_for(&server)
    };
    let results = searchflow_search::search("q", &config).await.expect("search");
    assert!(results.is_empty());
}
