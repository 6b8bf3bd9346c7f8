// ABOUTME: Integration tests for the HTTP serving component over a real socket.
// ABOUTME: Exercises status mapping and query-keyed resolution through the axum router.

mod common;

use std::net::SocketAddr;
use std::sync::Arc;

use common::{page_title, CountingCache, FakeFetcher, FakeStore};
use serde_json::{json, Value};
use siteapi::{Api, Definition};

const BASE: &str = "https://site.test";

async fn spawn(fetcher: FakeFetcher) -> (SocketAddr, Arc<FakeFetcher>) {
    let fetcher = Arc::new(fetcher);
    let api = Api::builder(BASE)
        .fetcher(fetcher.clone())
        .store(Arc::new(FakeStore::default()))
        .cache(Arc::new(CountingCache::default()))
        .register(
            Definition::new("title", r"^/article/\d+", |html| {
                Ok(page_title(html).map(|t| json!(t)).into_iter().collect())
            })
            .unwrap(),
        )
        .build()
        .await
        .unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = siteapi::server::router(Arc::new(api));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, fetcher)
}

#[tokio::test]
async fn routed_path_returns_json() {
    let (addr, fetcher) = spawn(FakeFetcher::with_page(
        &format!("{}/article/1", BASE),
        "<title>First</title>",
    ))
    .await;

    let resp = reqwest::get(format!("http://{}/article/1", addr)).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()["content-type"].to_str().unwrap(),
        "application/json"
    );
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "title": ["First"] }));
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn query_string_is_part_of_the_key() {
    let fetcher = FakeFetcher::default();
    fetcher.add(&format!("{}/article/2?page=1", BASE), 200, "<title>Page one</title>");
    fetcher.add(&format!("{}/article/2?page=2", BASE), 200, "<title>Page two</title>");
    let (addr, fetcher) = spawn(fetcher).await;

    for (page, title) in [(1, "Page one"), (2, "Page two")] {
        let body: Value = reqwest::get(format!("http://{}/article/2?page={}", addr, page))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, json!({ "title": [title] }));
    }
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn unrouted_path_is_404() {
    let (addr, fetcher) = spawn(FakeFetcher::default()).await;

    let resp = reqwest::get(format!("http://{}/unknown/path", addr)).await.unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "not_found");
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn fetch_failure_is_502() {
    let (addr, _) = spawn(FakeFetcher {
        fail: true,
        ..Default::default()
    })
    .await;

    let resp = reqwest::get(format!("http://{}/article/3", addr)).await.unwrap();
    assert_eq!(resp.status(), 502);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("connection reset"));
}

#[tokio::test]
async fn non_get_is_405() {
    let (addr, fetcher) = spawn(FakeFetcher::default()).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{}/article/1", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 405);
    assert_eq!(fetcher.calls(), 0);
}
