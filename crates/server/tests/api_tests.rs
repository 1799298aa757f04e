//! Integration tests for the protocol endpoints.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use bouncer_core::{format_chunk_file, ChunkList};
use bytes::Bytes;
use common::fixtures::{add_chunk, full_hash, prefix_of, sub_chunk, write_chunk_file};
use common::server::{digest256_list, shavar_list, TestServer};
use tower::ServiceExt;

const REDIRECT: &str = "https://tracking.example.com";

/// Helper to POST a raw protocol body.
async fn send(
    router: &axum::Router,
    method: &str,
    uri: &str,
    body: impl Into<Body>,
) -> (StatusCode, Bytes) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(body.into())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body)
}

/// The two-list setup the protocol tests share: one inline digest256 list,
/// one redirect-serving shavar list.
async fn two_list_server() -> TestServer {
    TestServer::with_config(|base, config| {
        write_chunk_file(
            &base.join("mozpub-track-digest256"),
            &[
                add_chunk(4, &["tracker.example/a", "tracker.example/b"]),
                add_chunk(5, &["tracker.example/c", "tracker.example/d"]),
                sub_chunk(3, &["tracker.example/gone"]),
            ],
        );
        write_chunk_file(
            &base.join("moz-abp-shavar"),
            &[
                add_chunk(1, &["ads.example/x", "ads.example/y"]),
                add_chunk(2, &["ads.example/z"]),
                add_chunk(4, &["ads.example/w"]),
                add_chunk(5, &["ads.example/v"]),
                sub_chunk(3, &["ads.example/old"]),
                sub_chunk(6, &["ads.example/older"]),
            ],
        );
        config.lists = vec![
            digest256_list("mozpub-track-digest256", base),
            shavar_list("moz-abp-shavar", base, REDIRECT),
        ];
    })
    .await
}

#[tokio::test]
async fn test_list_view_sorted_names() {
    let server = two_list_server().await;
    let (status, body) = send(&server.router, "GET", "/list", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"moz-abp-shavar\nmozpub-track-digest256\n");
}

#[tokio::test]
async fn test_downloads_shavar_redirects() {
    let server = two_list_server().await;

    // Client holds adds 1-2 and sub 3: it is missing adds 4,5 and sub 6.
    let (status, body) = send(
        &server.router,
        "POST",
        "/downloads?pver=2.0&appver=0.0",
        "moz-abp-shavar;a:1-2,5:s:3\n",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let expected = format!(
        "n:2700\ni:moz-abp-shavar\n\
         u:{REDIRECT}/moz-abp-shavar/4\n\
         u:{REDIRECT}/moz-abp-shavar/6\n"
    );
    assert_eq!(&body[..], expected.as_bytes());
}

#[tokio::test]
async fn test_downloads_digest256_inline() {
    let server = two_list_server().await;

    let (status, body) = send(
        &server.router,
        "POST",
        "/downloads",
        "mozpub-track-digest256;a:4:s:3\n",
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Missing add chunk 5 arrives inline, in the chunk-file record format.
    let mut expected = b"n:2700\ni:mozpub-track-digest256\n".to_vec();
    let mut chunks = ChunkList::new();
    chunks
        .insert(add_chunk(5, &["tracker.example/c", "tracker.example/d"]))
        .unwrap();
    expected.extend_from_slice(&format_chunk_file(&chunks));
    assert_eq!(&body[..], &expected[..]);
}

#[tokio::test]
async fn test_downloads_current_client_gets_interval_only() {
    let server = two_list_server().await;

    let (status, body) = send(
        &server.router,
        "POST",
        "/downloads",
        "moz-abp-shavar;a:1-2,4-5:s:3,6\n",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"n:2700\n");
}

#[tokio::test]
async fn test_downloads_unknown_list_ignored() {
    let server = two_list_server().await;

    let (status, body) = send(
        &server.router,
        "POST",
        "/downloads",
        "never-heard-of-it-shavar;a:1\nmoz-abp-shavar;a:1-2,4-5:s:3\n",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let expected = format!("n:2700\ni:moz-abp-shavar\nu:{REDIRECT}/moz-abp-shavar/6\n");
    assert_eq!(&body[..], expected.as_bytes());
}

#[tokio::test]
async fn test_downloads_malformed_body_is_bad_request() {
    let server = two_list_server().await;

    let (status, _) = send(&server.router, "POST", "/downloads", "no separator").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) =
        send(&server.router, "POST", "/downloads", "moz-abp-shavar;a:5-3\n").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_downloads_mac_rejected_on_protocol_3() {
    let server = two_list_server().await;

    let body = "moz-abp-shavar;a:1,2:mac\n";
    let (status, _) = send(&server.router, "POST", "/downloads?pver=3.0", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // The same body is fine on protocol 2.0.
    let (status, _) = send(&server.router, "POST", "/downloads?pver=2.0", body).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_downloads_reports_stale_claims() {
    let server = TestServer::with_config(|base, config| {
        write_chunk_file(
            &base.join("mozpub-track-digest256"),
            &[add_chunk(17, &["tracker.example/a", "tracker.example/b"])],
        );
        let mut list = digest256_list("mozpub-track-digest256", base);
        list.not_publishing_deltas = true;
        config.lists = vec![list];
    })
    .await;

    let (status, body) = send(
        &server.router,
        "POST",
        "/downloads",
        "mozpub-track-digest256;a:1-2,7,9-14,16,17:s:6\n",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8_lossy(&body);
    assert!(text.starts_with("n:2700\ni:mozpub-track-digest256\n"));
    assert!(text.contains("ad:1,2,7,9,10,11,12,13,14,16\n"));
    assert!(text.contains("sd:6\n"));

    // A fresh client has no stale claims and receives everything inline.
    let (status, body) = send(
        &server.router,
        "POST",
        "/downloads",
        "mozpub-track-digest256;\n",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8_lossy(&body);
    assert!(!text.contains("ad:"));
    assert!(!text.contains("sd:"));
    assert!(text.contains("a:17:32:64\n"));
}

#[tokio::test]
async fn test_downloads_from_directory_source() {
    let server = TestServer::with_config(|base, config| {
        let dir = base.join("moz-abp-shavar");
        std::fs::create_dir_all(&dir).unwrap();
        write_chunk_file(&dir.join("1"), &[add_chunk(1, &["ads.example/x"])]);
        write_chunk_file(&dir.join("2"), &[sub_chunk(2, &["ads.example/old"])]);
        let index = serde_json::json!({
            "name": "moz-abp-shavar",
            "chunks": {"1": {"path": "1"}, "2": {"path": "2"}}
        });
        std::fs::write(dir.join("index.json"), index.to_string()).unwrap();

        let mut list = shavar_list("moz-abp-shavar", base, REDIRECT);
        list.source = format!("dir://{}", dir.display());
        config.lists = vec![list];
    })
    .await;

    let (status, body) = send(&server.router, "POST", "/downloads", "moz-abp-shavar;\n").await;
    assert_eq!(status, StatusCode::OK);
    let expected = format!(
        "n:2700\ni:moz-abp-shavar\n\
         u:{REDIRECT}/moz-abp-shavar/1\n\
         u:{REDIRECT}/moz-abp-shavar/2\n"
    );
    assert_eq!(&body[..], expected.as_bytes());
}

#[tokio::test]
async fn test_gethash_returns_matching_hashes() {
    let server = two_list_server().await;

    let prefix = prefix_of("ads.example/x");
    let mut body = b"4:4\n".to_vec();
    body.extend_from_slice(&prefix);

    let (status, response) = send(&server.router, "POST", "/gethash", body).await;
    assert_eq!(status, StatusCode::OK);

    let mut expected = b"moz-abp-shavar:1:32\n".to_vec();
    expected.extend_from_slice(&full_hash("ads.example/x"));
    assert_eq!(&response[..], &expected[..]);
}

#[tokio::test]
async fn test_gethash_groups_by_chunk() {
    let server = two_list_server().await;

    let mut body = b"4:8\n".to_vec();
    body.extend_from_slice(&prefix_of("ads.example/x"));
    body.extend_from_slice(&prefix_of("ads.example/z"));

    let (status, response) = send(&server.router, "POST", "/gethash", body).await;
    assert_eq!(status, StatusCode::OK);

    let mut expected = b"moz-abp-shavar:1:32\n".to_vec();
    expected.extend_from_slice(&full_hash("ads.example/x"));
    expected.extend_from_slice(b"moz-abp-shavar:2:32\n");
    expected.extend_from_slice(&full_hash("ads.example/z"));
    assert_eq!(&response[..], &expected[..]);
}

#[tokio::test]
async fn test_gethash_no_match_is_no_content() {
    let server = two_list_server().await;

    let (status, body) = send(&server.router, "POST", "/gethash", &b"4:4\n\x00\x00\x00\x00"[..])
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_gethash_malformed_body_is_bad_request() {
    let server = two_list_server().await;

    // A downloads-shaped body on the gethash endpoint.
    let (status, _) = send(
        &server.router,
        "POST",
        "/gethash",
        "moz-abp-shavar;a:1-2\n",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Payload shorter than declared.
    let (status, _) = send(&server.router, "POST", "/gethash", &b"4:8\nAAAA"[..]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
