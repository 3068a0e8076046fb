use anyhow::Result;
use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use mediafold_config::ConversionStrategy;
use mediafold_server::build_state;
use serde_json::Value;

mod common;
use common::{FAKE_JPEG, FAKE_MP4, build_test_app, eventually, test_config};

#[tokio::test]
async fn root_and_health_describe_the_server() -> Result<()> {
    let app = build_test_app(ConversionStrategy::Stream).await?;

    let root: Value = app.server.get("/").await.json();
    assert_eq!(root["message"], "mediafold media server");

    let response = app.server.get("/api/health").await;
    response.assert_status_ok();
    let health: Value = response.json();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["media_root_exists"], true);
    assert_eq!(health["ffmpeg_available"], false);
    assert_eq!(health["conversion_strategy"], "stream");
    assert!(health["conversions"].is_null());
    assert_eq!(health["thumbnails"]["workers"], 2);

    app.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn missing_tool_is_reported_not_fatal() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = test_config(dir.path(), ConversionStrategy::Stream);

    let state = build_state(config).await?;
    assert!(!state.tool().available);
    assert!(state.tool().version.is_none());
    assert!(dir.path().join("scratch").is_dir());

    state.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn folders_are_sorted_and_counted() -> Result<()> {
    let app = build_test_app(ConversionStrategy::Stream).await?;
    app.write("beta/one.jpg", b"jpg");
    app.write("Alpha/clip.mp4", b"mp4");
    app.write("Alpha/notes.txt", b"text");
    app.write(".hidden/secret.jpg", b"jpg");
    app.write("loose.png", b"png");

    let response = app.server.get("/api/folders").await;
    response.assert_status_ok();
    let folders: Value = response.json();
    let folders = folders.as_array().expect("array");

    let names: Vec<&str> = folders
        .iter()
        .map(|f| f["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["Alpha", "beta"]);
    assert_eq!(folders[0]["file_count"], 1);
    assert_eq!(folders[0]["path"], "Alpha");

    app.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn missing_media_root_lists_no_folders() -> Result<()> {
    let app = build_test_app(ConversionStrategy::Stream).await?;
    std::fs::remove_dir_all(&app.root)?;

    let response = app.server.get("/api/folders").await;
    response.assert_status_ok();
    let folders: Value = response.json();
    assert_eq!(folders, serde_json::json!([]));

    app.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn listing_a_folder_makes_it_active() -> Result<()> {
    let app = build_test_app(ConversionStrategy::Stream).await?;
    app.write("trip/b.avi", b"avi");
    app.write("trip/A.jpg", b"jpg");
    app.write("trip/readme.md", b"md");

    let response = app.server.get("/api/photos/trip").await;
    response.assert_status_ok();
    let listing: Value = response.json();
    assert_eq!(listing["folder"], "trip");
    assert_eq!(listing["total_count"], 2);

    let photos = listing["photos"].as_array().expect("array");
    assert_eq!(photos[0]["name"], "A.jpg");
    assert_eq!(photos[0]["type"], "image");
    assert_eq!(photos[0]["needs_conversion"], false);
    assert_eq!(photos[1]["path"], "trip/b.avi");
    assert_eq!(photos[1]["type"], "video");
    assert_eq!(photos[1]["needs_conversion"], true);

    assert_eq!(
        app.state.thumbnails().active_folder().map(|f| f.to_string()),
        Some("trip".to_string())
    );

    app.server.get("/api/photos/nowhere").await.assert_status_not_found();

    app.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn set_current_folder_reports_changes() -> Result<()> {
    let app = build_test_app(ConversionStrategy::Queue).await?;

    let first: Value = app.server.post("/api/set-current-folder/a/b").await.json();
    assert_eq!(first["current_folder"], "a/b");
    assert_eq!(first["changed"], true);

    let again: Value = app.server.post("/api/set-current-folder/a/b").await.json();
    assert_eq!(again["changed"], false);

    let pipeline = app.state.conversion().pipeline().expect("queue strategy");
    assert_eq!(
        pipeline.active_folder().map(|f| f.to_string()),
        Some("a/b".to_string())
    );

    app.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn originals_are_served_with_ranges() -> Result<()> {
    let app = build_test_app(ConversionStrategy::Stream).await?;
    app.write("trip/photo.jpg", b"0123456789");

    let response = app.server.get("/api/photo/trip/photo.jpg").await;
    response.assert_status_ok();
    assert_eq!(response.as_bytes().as_ref(), b"0123456789");
    assert_eq!(response.header(header::CONTENT_TYPE), "image/jpeg");

    let partial = app
        .server
        .get("/api/photo/trip/photo.jpg")
        .add_header(
            HeaderName::from_static("range"),
            HeaderValue::from_static("bytes=2-5"),
        )
        .await;
    partial.assert_status(StatusCode::PARTIAL_CONTENT);
    assert_eq!(partial.as_bytes().as_ref(), b"2345");

    app.server.get("/api/photo/trip/notes.txt").await.assert_status_bad_request();
    app.server.get("/api/photo/trip/missing.jpg").await.assert_status_not_found();

    app.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn parent_segments_are_rejected() -> Result<()> {
    let app = build_test_app(ConversionStrategy::Stream).await?;

    let response = app.server.get("/api/photo/..%2Fsecret.jpg").await;
    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["error"]["status"], 400);

    app.shutdown().await;
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn symlinks_out_of_the_root_are_forbidden() -> Result<()> {
    let app = build_test_app(ConversionStrategy::Stream).await?;
    let outside = tempfile::tempdir()?;
    let target = outside.path().join("secret.jpg");
    std::fs::write(&target, b"secret")?;
    std::os::unix::fs::symlink(&target, app.root.join("escape.jpg"))?;

    let response = app.server.get("/api/photo/escape.jpg").await;
    response.assert_status(StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["error"]["message"], "Access denied");

    app.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn thumbnails_are_only_for_videos() -> Result<()> {
    let app = build_test_app(ConversionStrategy::Stream).await?;
    app.write("trip/photo.jpg", b"jpg");

    app.server.get("/api/thumbnail/trip/photo.jpg").await.assert_status_bad_request();
    app.server
        .get("/api/thumbnail-status/trip/photo.jpg")
        .await
        .assert_status_bad_request();
    app.server.get("/api/thumbnail/trip/gone.mp4").await.assert_status_not_found();

    app.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn thumbnail_becomes_ready_after_processing() -> Result<()> {
    let app = build_test_app(ConversionStrategy::Stream).await?;
    app.write("trip/clip.mp4", b"mp4");

    let status: Value = app
        .server
        .get("/api/thumbnail-status/trip/clip.mp4")
        .await
        .json();
    assert_eq!(status["status"], "not_started");

    let first: Value = app.server.get("/api/thumbnail/trip/clip.mp4").await.json();
    assert!(
        first["status"] == "processing" || first["status"] == "ready",
        "unexpected status {first}"
    );

    let server = &app.server;
    let ready = eventually(|| async move {
        let body: Value = server
            .get("/api/thumbnail-status/trip/clip.mp4")
            .await
            .json();
        body["status"] == "ready"
    })
    .await;
    assert!(ready, "thumbnail never became ready");

    let body: Value = app.server.get("/api/thumbnail/trip/clip.mp4").await.json();
    assert_eq!(body["status"], "ready");
    let expected = format!(
        "data:image/jpeg;base64,{}",
        base64::Engine::encode(&base64::engine::general_purpose::STANDARD, FAKE_JPEG)
    );
    assert_eq!(body["thumbnail"], expected.as_str());

    app.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn thumbnail_cache_status_and_clear() -> Result<()> {
    let app = build_test_app(ConversionStrategy::Stream).await?;
    app.write("trip/a.mp4", b"a");
    app.write("trip/b.webm", b"b");

    app.server.get("/api/photos/trip").await.assert_status_ok();
    app.server.get("/api/thumbnail/trip/a.mp4").await.assert_status_ok();
    app.server.get("/api/thumbnail/trip/b.webm").await.assert_status_ok();

    let server = &app.server;
    let cached = eventually(|| async move {
        let body: Value = server.get("/api/thumbnail-cache/status").await.json();
        body["cache_size"] == 2
    })
    .await;
    assert!(cached, "both thumbnails should be cached");

    let status: Value = app.server.get("/api/thumbnail-cache/status").await.json();
    assert_eq!(status["queue_size"], 0);
    assert_eq!(status["current_folder"], "trip");
    assert_eq!(status["cache_keys"].as_array().map(Vec::len), Some(2));

    let cleared: Value = app.server.post("/api/thumbnail-cache/clear").await.json();
    assert_eq!(cleared["cleared_entries"], 2);
    assert_eq!(cleared["cleared_processing"], 0);

    let status: Value = app.server.get("/api/thumbnail-cache/status").await.json();
    assert_eq!(status["cache_size"], 0);

    app.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn browser_playable_videos_need_no_conversion() -> Result<()> {
    let app = build_test_app(ConversionStrategy::Stream).await?;
    app.write("trip/clip.mp4", b"mp4");

    let response = app.server.get("/api/convert/trip/clip.mp4").await;
    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["error"]["message"], "File does not need conversion");

    app.shutdown().await;
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn stream_strategy_pipes_tool_output() -> Result<()> {
    let app = build_test_app(ConversionStrategy::Stream).await?;
    app.write("trip/old.avi", b"avi");

    let response = app.server.get("/api/convert/trip/old.avi").await;
    response.assert_status_ok();
    assert_eq!(response.header(header::CONTENT_TYPE), "video/mp4");
    assert_eq!(response.header(header::ACCEPT_RANGES), "none");
    assert_eq!(response.as_bytes().as_ref(), b"first-second");

    let status: Value = app
        .server
        .get("/api/conversion-status/trip/old.avi")
        .await
        .json();
    assert_eq!(status["status"], "on_demand");

    let cache: Value = app.server.get("/api/conversion-cache/status").await.json();
    assert_eq!(cache["strategy"], "stream");
    assert_eq!(cache["cache_size"], 0);

    app.server.get("/api/convert/trip/gone.avi").await.assert_status_not_found();

    app.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn queue_strategy_serves_cached_conversions() -> Result<()> {
    let app = build_test_app(ConversionStrategy::Queue).await?;
    app.write("trip/old.mkv", b"mkv");

    let pending = app.server.get("/api/convert/trip/old.mkv").await;
    pending.assert_status(StatusCode::ACCEPTED);
    let body: Value = pending.json();
    assert!(
        body["status"] == "queued" || body["status"] == "processing",
        "unexpected status {body}"
    );

    let server = &app.server;
    let ready = eventually(|| async move {
        let body: Value = server
            .get("/api/conversion-status/trip/old.mkv")
            .await
            .json();
        body["status"] == "ready"
    })
    .await;
    assert!(ready, "conversion never became ready");

    let status: Value = app
        .server
        .get("/api/conversion-status/trip/old.mkv")
        .await
        .json();
    assert_eq!(status["strategy"], "queue");
    assert_eq!(status["size"], FAKE_MP4.len());

    let response = app.server.get("/api/convert/trip/old.mkv").await;
    response.assert_status_ok();
    assert_eq!(response.header(header::CONTENT_TYPE), "video/mp4");
    assert_eq!(response.as_bytes().as_ref(), FAKE_MP4);

    let cleared: Value = app.server.post("/api/conversion-cache/clear").await.json();
    assert_eq!(cleared["cleared_entries"], 1);

    app.shutdown().await;
    Ok(())
}
