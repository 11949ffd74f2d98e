use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json as body;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{
    event_names, get, json, mount_html, mount_xml, parse_sse, post_json, setup_test_app,
    setup_test_app_with_keepalive,
};

#[tokio::test]
async fn job_stream_reports_start_progress_done() {
    let server = MockServer::start().await;
    mount_html(&server, "/a", "<html><h1>A</h1></html>", Duration::ZERO).await;
    mount_html(&server, "/b", "<html><p>no heading</p></html>", Duration::ZERO).await;
    Mock::given(method("GET"))
        .and(path("/c"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("%PDF", "application/pdf"))
        .mount(&server)
        .await;
    let app = setup_test_app();

    let urls: Vec<String> = ["/a", "/b", "/c"]
        .iter()
        .map(|p| format!("{}{p}", server.uri()))
        .collect();
    let (_, created) =
        post_json(&app, "/api/jobs", body!({ "urls": urls, "concurrency": 2 })).await;
    let job_id = json(&created)["jobId"].as_str().unwrap().to_string();

    let (status, stream) = get(&app, &format!("/api/jobs/{job_id}/events")).await;
    assert_eq!(status, StatusCode::OK);

    let events = parse_sse(&stream);
    assert_eq!(
        event_names(&events),
        vec!["start", "progress", "progress", "progress", "done"]
    );
    assert_eq!(events[0].1, body!({ "total": 3 }));
    assert_eq!(events[4].1, body!({ "processed": 3, "total": 3 }));

    let processed: Vec<u64> = events[1..4]
        .iter()
        .map(|(_, e)| e["processed"].as_u64().unwrap())
        .collect();
    assert_eq!(processed, vec![1, 2, 3]);

    for (_, progress) in &events[1..4] {
        let index = progress["index"].as_u64().unwrap() as usize;
        let result = &progress["result"];
        assert_eq!(result["url"], urls[index]);
        match index {
            0 => assert_eq!(result["hasH1"], true),
            1 => assert_eq!(result["missingH1"], true),
            _ => {
                assert_eq!(result["status"], 200);
                assert_eq!(result["error"], "Not HTML content");
            }
        }
    }
}

#[tokio::test]
async fn reconnect_after_completion_replays_same_events() {
    let server = MockServer::start().await;
    mount_html(&server, "/a", "<html><h1>A</h1></html>", Duration::ZERO).await;
    let app = setup_test_app();

    let urls = [format!("{}/a", server.uri())];
    let (_, created) = post_json(&app, "/api/jobs", body!({ "urls": urls })).await;
    let job_id = json(&created)["jobId"].as_str().unwrap().to_string();
    let uri = format!("/api/jobs/{job_id}/events");

    let (_, first) = get(&app, &uri).await;
    let (_, second) = get(&app, &uri).await;

    assert_eq!(parse_sse(&first), parse_sse(&second));
    assert_eq!(event_names(&parse_sse(&second)).last(), Some(&"done"));
}

#[tokio::test]
async fn idle_job_stream_sends_pings_that_are_never_replayed() {
    let server = MockServer::start().await;
    mount_html(&server, "/slow", "<html><h1>x</h1></html>", Duration::from_millis(400)).await;
    let app = setup_test_app_with_keepalive(Duration::from_millis(50));

    let urls = [format!("{}/slow", server.uri())];
    let (_, created) = post_json(&app, "/api/jobs", body!({ "urls": urls })).await;
    let job_id = json(&created)["jobId"].as_str().unwrap().to_string();
    let uri = format!("/api/jobs/{job_id}/events");

    let (_, live) = get(&app, &uri).await;
    let live = parse_sse(&live);
    let pings: Vec<_> = live.iter().filter(|(name, _)| name == "ping").collect();
    assert!(!pings.is_empty());
    assert!(pings.iter().all(|(_, data)| *data == body!({})));

    let without_pings: Vec<&str> = event_names(&live)
        .into_iter()
        .filter(|name| *name != "ping")
        .collect();
    assert_eq!(without_pings, vec!["start", "progress", "done"]);

    let (_, replay) = get(&app, &uri).await;
    assert_eq!(event_names(&parse_sse(&replay)), vec!["start", "progress", "done"]);
}

#[tokio::test]
async fn cancelled_job_ends_with_failed_cancelled() {
    let server = MockServer::start().await;
    for route in ["/slow1", "/slow2", "/slow3"] {
        mount_html(&server, route, "<html><h1>x</h1></html>", Duration::from_millis(500)).await;
    }
    let app = setup_test_app();

    let urls: Vec<String> = ["/slow1", "/slow2", "/slow3"]
        .iter()
        .map(|p| format!("{}{p}", server.uri()))
        .collect();
    let (_, created) =
        post_json(&app, "/api/jobs", body!({ "urls": urls, "concurrency": 1 })).await;
    let job_id = json(&created)["jobId"].as_str().unwrap().to_string();

    let (_, cancelled) = post_json(&app, "/api/jobs/cancel", body!({ "jobId": job_id })).await;
    assert_eq!(json(&cancelled)["ok"], true);

    let (_, again) = post_json(&app, "/api/jobs/cancel", body!({ "jobId": job_id })).await;
    assert_eq!(json(&again)["ok"], false);

    let (_, stream) = get(&app, &format!("/api/jobs/{job_id}/events")).await;
    let events = parse_sse(&stream);
    assert_eq!(event_names(&events), vec!["start", "failed"]);
    assert_eq!(events[1].1, body!({ "error": "cancelled" }));

    // The in-flight fetch finishes after cancellation and must not be recorded.
    tokio::time::sleep(Duration::from_millis(700)).await;
    let (_, snapshot) = get(&app, &format!("/api/jobs/{job_id}")).await;
    let snapshot = json(&snapshot);
    assert_eq!(snapshot["status"], "failed");
    assert_eq!(snapshot["processed"], 0);
    assert_eq!(snapshot["error"], "cancelled");
}

#[tokio::test]
async fn sitemap_stream_walks_index_and_dedupes() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_xml(
        &server,
        "/sitemap.xml",
        &format!(
            "<sitemapindex><sitemap><loc>{base}/posts.xml</loc></sitemap>\
             <sitemap><loc>/pages.xml</loc></sitemap></sitemapindex>"
        ),
    )
    .await;
    mount_xml(
        &server,
        "/posts.xml",
        &format!("<urlset><url><loc>{base}/p1</loc></url><url><loc>{base}/p2</loc></url></urlset>"),
    )
    .await;
    mount_xml(
        &server,
        "/pages.xml",
        &format!("<urlset><url><loc>{base}/p2</loc></url><url><loc>{base}/p3</loc></url></urlset>"),
    )
    .await;
    let app = setup_test_app();

    let (status, stream) = get(&app, &format!("/api/sitemap/stream?url={base}/sitemap.xml")).await;
    assert_eq!(status, StatusCode::OK);

    let events = parse_sse(&stream);
    assert_eq!(event_names(&events), vec!["batch", "batch", "done"]);

    let urls: Vec<String> = events
        .iter()
        .filter(|(name, _)| name == "batch")
        .flat_map(|(_, e)| e["urls"].as_array().unwrap().clone())
        .map(|u| u.as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        urls,
        vec![format!("{base}/p1"), format!("{base}/p2"), format!("{base}/p3")]
    );
    assert_eq!(events[1].1["total"], 3);
    assert_eq!(events[2].1, body!({ "total": 3 }));
}

#[tokio::test]
async fn sitemap_stream_respects_max_depth() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_xml(
        &server,
        "/sitemap.xml",
        &format!("<sitemapindex><sitemap><loc>{base}/child.xml</loc></sitemap></sitemapindex>"),
    )
    .await;
    mount_xml(
        &server,
        "/child.xml",
        &format!("<urlset><url><loc>{base}/deep</loc></url></urlset>"),
    )
    .await;
    let app = setup_test_app();

    let (_, stream) =
        get(&app, &format!("/api/sitemap/stream?url={base}/sitemap.xml&maxDepth=0")).await;

    let events = parse_sse(&stream);
    assert_eq!(event_names(&events), vec!["done"]);
    assert_eq!(events[0].1, body!({ "total": 0 }));
}

#[tokio::test]
async fn sitemap_stream_fails_on_unreachable_child() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_xml(
        &server,
        "/sitemap.xml",
        &format!("<sitemapindex><sitemap><loc>{base}/missing.xml</loc></sitemap></sitemapindex>"),
    )
    .await;
    let app = setup_test_app();

    let (_, stream) = get(&app, &format!("/api/sitemap/stream?url={base}/sitemap.xml")).await;

    let events = parse_sse(&stream);
    assert_eq!(event_names(&events), vec!["failed"]);
    assert!(events[0].1["error"].as_str().unwrap().contains("404"));
}

#[tokio::test]
async fn sitemap_stream_without_url_returns_400() {
    let app = setup_test_app();

    let (status, body) = get(&app, "/api/sitemap/stream?url=%20").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["error"], "validation_error");
}
