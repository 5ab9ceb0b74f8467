//! 배치 파이프라인 통합 테스트.
//!
//! Session → BatchDispatcher → HttpOperationClient → mock 처리 서버.

use cvstudio_batch::events::DispatchEvent;
use cvstudio_batch::session::Session;
use cvstudio_core::config::{AppConfig, DispatchConfig};
use cvstudio_core::error::CoreError;
use cvstudio_core::models::image::SourceFile;
use cvstudio_core::models::operation::OperationKind;
use cvstudio_network::http_client::HttpOperationClient;
use cvstudio_vision::codec::{encode_base64, encode_png};
use cvstudio_vision::local_client::LocalOperationClient;
use image::{DynamicImage, Rgb, RgbImage};
use mockito::Matcher;
use std::sync::Arc;
use std::time::Duration;

fn png(width: u32, height: u32, shade: u8) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([shade, shade, shade])));
    encode_png(&image).unwrap()
}

fn processed_body(bytes: &[u8]) -> String {
    serde_json::json!({ "processed_image": encode_base64(bytes) }).to_string()
}

fn http_session(base_url: &str) -> Session {
    let client = HttpOperationClient::new(base_url, Duration::from_secs(5))
        .unwrap()
        .with_max_retries(0);
    Session::new(Arc::new(client), &DispatchConfig::default())
}

#[tokio::test]
async fn three_images_through_rotate_then_flip() {
    let mut server = mockito::Server::new_async().await;
    let rotated = png(4, 4, 100);
    let flipped = png(4, 4, 200);

    let rotate = server
        .mock("POST", "/api/rotate")
        .match_body(Matcher::UrlEncoded("angle".into(), "90".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(processed_body(&rotated))
        .expect(3)
        .create_async()
        .await;
    let flip = server
        .mock("POST", "/api/flip")
        .match_body(Matcher::UrlEncoded(
            "image_data".into(),
            encode_base64(&rotated),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(processed_body(&flipped))
        .expect(3)
        .create_async()
        .await;

    let mut session = http_session(&server.url());
    let report = session
        .load(vec![
            SourceFile::new("a.png", png(4, 4, 1)),
            SourceFile::new("b.png", png(4, 4, 2)),
            SourceFile::new("c.png", png(4, 4, 3)),
        ])
        .await
        .unwrap();
    assert_eq!(report.loaded.len(), 3);

    session.select_operation(OperationKind::Rotate);
    session.select_operation(OperationKind::Flip);
    session
        .set_param_fields(OperationKind::Rotate, &[("angle", "90")])
        .unwrap();
    session.select_all();

    let summary = session.run_selected().await.unwrap();
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.total, 3);
    assert_eq!(summary.chain_label, "rotate → flip");
    assert!(summary.to_string().contains("3/3"));

    let registry = session.registry();
    for image in registry.read().iter() {
        assert!(image.is_processed);
        assert!(!image.is_processing);
        assert_eq!(image.processed_data.as_deref(), Some(flipped.as_slice()));
        assert_eq!(image.last_operation_label.as_deref(), Some("rotate → flip"));
    }

    rotate.assert_async().await;
    flip.assert_async().await;
}

#[tokio::test]
async fn remote_failure_is_isolated_to_one_image() {
    let mut server = mockito::Server::new_async().await;
    let good = png(2, 2, 10);
    let bad = png(2, 2, 20);

    let _ok = server
        .mock("POST", "/api/blur")
        .match_body(Matcher::UrlEncoded("image_data".into(), encode_base64(&good)))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(processed_body(&png(2, 2, 11)))
        .create_async()
        .await;
    let _fail = server
        .mock("POST", "/api/blur")
        .match_body(Matcher::UrlEncoded("image_data".into(), encode_base64(&bad)))
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(r#"{"detail":"kernel too large for image"}"#)
        .create_async()
        .await;

    let mut session = http_session(&server.url());
    let report = session
        .load(vec![
            SourceFile::new("good.png", good),
            SourceFile::new("bad.png", bad),
        ])
        .await
        .unwrap();
    session.select_operation(OperationKind::Blur);

    let summary = session.run(&report.loaded).await.unwrap();
    assert_eq!((summary.succeeded, summary.total), (1, 2));
    assert_eq!(summary.failures.len(), 1);

    let failure = &summary.failures[0];
    assert_eq!(failure.image_name, "bad.png");
    assert_eq!(failure.operation, Some(OperationKind::Blur));
    assert!(failure.error.contains("kernel too large"));

    let registry = session.registry();
    let registry = registry.read();
    assert!(registry.get(report.loaded[0]).unwrap().is_processed);
    let bad = registry.get(report.loaded[1]).unwrap();
    assert!(!bad.is_processed);
    assert!(bad.processed_data.is_none());
}

#[tokio::test]
async fn compare_dimensions_uses_grayscale_artifact() {
    let mut server = mockito::Server::new_async().await;
    let gray = png(3, 3, 50);

    let _grayscale = server
        .mock("POST", "/api/grayscale")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(processed_body(&gray))
        .create_async()
        .await;
    let compare = server
        .mock("POST", "/api/compare-dimensions")
        .match_body(Matcher::UrlEncoded("image_data".into(), encode_base64(&gray)))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"pixel_values":[[1,2,3],[4,5,6],[7,8,9]],"dimensions":{"height":3,"width":3}}"#,
        )
        .expect(1)
        .create_async()
        .await;

    let mut session = http_session(&server.url());
    let report = session
        .load(vec![SourceFile::new("x.png", png(3, 3, 200))])
        .await
        .unwrap();

    // grayscale 결과 없이 실행하면 호출 없이 실패
    session.select_operation(OperationKind::CompareDimensions);
    let summary = session.run(&report.loaded).await.unwrap();
    assert_eq!(summary.succeeded, 0);
    assert!(summary.failures[0].error.contains("grayscale"));

    session.clear_queue();
    session.select_operation(OperationKind::Grayscale);
    session.run(&report.loaded).await.unwrap();

    session.select_operation(OperationKind::CompareDimensions);
    let summary = session.run(&report.loaded).await.unwrap();
    assert_eq!(summary.succeeded, 1);
    compare.assert_async().await;

    let composite = session
        .registry()
        .read()
        .get(report.loaded[0])
        .unwrap()
        .current_data();
    let composite = image::load_from_memory(&composite).unwrap();
    let canvas = AppConfig::default_config().composite;
    assert_eq!(
        (composite.width(), composite.height()),
        (canvas.width, canvas.height)
    );
}

#[tokio::test]
async fn unreachable_server_fails_every_image_with_network_error() {
    let mut session = http_session("http://127.0.0.1:9");
    let report = session
        .load(vec![
            SourceFile::new("a.png", png(2, 2, 1)),
            SourceFile::new("b.png", png(2, 2, 2)),
        ])
        .await
        .unwrap();
    session.select_operation(OperationKind::Grayscale);

    let summary = session.run(&report.loaded).await.unwrap();
    assert_eq!((summary.succeeded, summary.total), (0, 2));
    assert_eq!(summary.failed(), 2);
    assert!(!session.dispatcher().is_running());
}

#[tokio::test]
async fn demo_client_processes_locally_and_reports_progress() {
    let mut session = Session::new(
        Arc::new(LocalOperationClient::default()),
        &DispatchConfig::default(),
    );
    let report = session
        .load(vec![
            SourceFile::new("a.png", png(6, 4, 30)),
            SourceFile::new("broken.png", b"not an image".to_vec()),
        ])
        .await
        .unwrap();
    assert_eq!(report.loaded.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(report.failures[0], CoreError::DecodeFailure { .. }));

    let mut rx = session.subscribe();
    session.select_operation(OperationKind::Grayscale);
    session.select_operation(OperationKind::Flip);
    session.select_all();
    let summary = session.run_selected().await.unwrap();
    assert!(summary.all_succeeded());

    let mut progress = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let DispatchEvent::Progress { completed, total } = event {
            progress.push((completed, total));
        }
    }
    assert_eq!(progress.last(), Some(&(1, 1)));

    // 데모 모드에서 지원하지 않는 연산은 이미지 단위 실패
    session.clear_queue();
    session.select_operation(OperationKind::Sharpen);
    let summary = session.run_selected().await.unwrap();
    assert_eq!(summary.failed(), 1);
}
