//! 처리 서버 HTTP 클라이언트.
//!
//! `OperationClient` 포트 구현. `POST {base}/api/{id}` form 요청 + 재시도 로직,
//! 분석 응답은 composite 이미지 한 장으로 렌더링한다.

use async_trait::async_trait;
use cvstudio_core::config::AppConfig;
use cvstudio_core::error::CoreError;
use cvstudio_core::models::dispatch::DispatchResult;
use cvstudio_core::models::image::ImageBytes;
use cvstudio_core::models::operation::{OperationKind, ResponseShape};
use cvstudio_core::models::params::OperationParams;
use cvstudio_core::ports::operation_client::{OperationClient, ServiceHealth};
use cvstudio_vision::codec::encode_base64;
use cvstudio_vision::composite::{CompositeRenderer, DimensionReport, PixelGrid};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

use crate::connectivity::SharedConnectivityManager;
use crate::wire::{
    DimensionResponse, ErrorResponse, HsvResponse, PixelGridResponse, ProcessedImageResponse,
    RgbChannelsResponse,
};

/// 기본 재시도 횟수
const DEFAULT_MAX_RETRIES: u32 = 1;
/// 첫 재시도 대기 시간
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
/// 기본 헬스 체크 타임아웃
const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(3);

/// 전송 실패만 재시도한다. 서버가 보낸 실패 응답은 재시도하지 않음.
fn is_retryable(error: &CoreError) -> bool {
    matches!(error, CoreError::Network(_))
}

/// 처리 서버 클라이언트 — `OperationClient` 포트 구현
pub struct HttpOperationClient {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
    retry_delay: Duration,
    health_timeout: Duration,
    renderer: CompositeRenderer,
    connectivity: Option<SharedConnectivityManager>,
}

impl HttpOperationClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Network(format!("HTTP 클라이언트 빌드 실패: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
            renderer: CompositeRenderer::default(),
            connectivity: None,
        })
    }

    /// 설정에서 생성 (URL, 타임아웃, 재시도, 캔버스 크기)
    pub fn from_config(config: &AppConfig) -> Result<Self, CoreError> {
        Ok(Self::new(&config.server.base_url, config.request_timeout())?
            .with_max_retries(config.server.max_retries)
            .with_health_timeout(config.health_timeout())
            .with_renderer(CompositeRenderer::new(config.composite)))
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    pub fn with_renderer(mut self, renderer: CompositeRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    /// 연결 상태 기록 대상 설정
    pub fn with_connectivity(mut self, connectivity: SharedConnectivityManager) -> Self {
        self.connectivity = Some(connectivity);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, kind: OperationKind) -> String {
        format!("{}/api/{}", self.base_url, kind.id())
    }

    fn record(&self, result: &Result<(), &CoreError>) {
        let Some(connectivity) = &self.connectivity else {
            return;
        };
        match result {
            Ok(()) => connectivity.record_success(),
            Err(CoreError::Network(reason)) => connectivity.record_failure(reason),
            Err(_) => connectivity.record_success(),
        }
    }

    /// 응답 상태 코드 확인, 실패 응답은 `detail`을 담은 `RemoteCall`로 매핑
    async fn check_response(
        &self,
        kind: OperationKind,
        resp: reqwest::Response,
    ) -> Result<reqwest::Response, CoreError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let text = resp.text().await.unwrap_or_else(|e| {
            warn!("응답 본문 읽기 실패: {e}");
            String::new()
        });

        Err(CoreError::RemoteCall {
            operation: kind.id().to_string(),
            status: status.as_u16(),
            detail: ErrorResponse::detail_from_body(&text),
        })
    }

    /// 재시도가 포함된 요청 실행
    ///
    /// exponential backoff: delay → 2×delay → … (최대 30초)
    async fn execute_with_retry<F, Fut, T>(&self, operation: F) -> Result<T, CoreError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let mut delay = self.retry_delay;
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if !is_retryable(&e) || attempt >= self.max_retries {
                        return Err(e);
                    }

                    warn!(
                        "요청 실패 (시도 {}/{}): {e}, {delay:?} 후 재시도",
                        attempt + 1,
                        self.max_retries + 1
                    );
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(Duration::from_secs(30));
                }
            }
        }
    }

    /// 한 번의 요청 시도: form POST → 상태 확인 → 본문 바이트
    async fn post_once(
        &self,
        kind: OperationKind,
        form: &[(&'static str, String)],
    ) -> Result<Vec<u8>, CoreError> {
        let resp = self
            .client
            .post(self.endpoint(kind))
            .form(form)
            .send()
            .await
            .map_err(|e| CoreError::Network(format!("{kind} 요청 실패: {e}")))?;

        let resp = self.check_response(kind, resp).await?;
        let body = resp
            .bytes()
            .await
            .map_err(|e| CoreError::Network(format!("{kind} 응답 수신 실패: {e}")))?;
        Ok(body.to_vec())
    }

    /// 응답 형태별 본문 → 결과 이미지 바이트
    fn materialize(&self, kind: OperationKind, body: &[u8]) -> Result<Vec<u8>, CoreError> {
        match kind.response_shape() {
            ResponseShape::ProcessedImage => {
                parse_body::<ProcessedImageResponse>(kind, body)?.into_bytes()
            }
            ResponseShape::DimensionReport => {
                let report: DimensionReport = parse_body::<DimensionResponse>(kind, body)?.into();
                self.renderer.render_dimension_report(&report)
            }
            ResponseShape::PixelGrid => {
                let grid: PixelGrid = parse_body::<PixelGridResponse>(kind, body)?.into();
                self.renderer.render_pixel_grid(&grid)
            }
            ResponseShape::RgbChannels => {
                let set = parse_body::<RgbChannelsResponse>(kind, body)?.decode()?;
                self.renderer.render_rgb_channels(&set)
            }
            ResponseShape::HsvChannels => {
                let set = parse_body::<HsvResponse>(kind, body)?.decode()?;
                self.renderer.render_hsv_channels(&set)
            }
        }
    }
}

fn parse_body<T: DeserializeOwned>(kind: OperationKind, body: &[u8]) -> Result<T, CoreError> {
    serde_json::from_slice(body)
        .map_err(|e| CoreError::Internal(format!("{kind} 응답 파싱 실패: {e}")))
}

#[async_trait]
impl OperationClient for HttpOperationClient {
    async fn invoke(
        &self,
        image: &[u8],
        kind: OperationKind,
        params: &OperationParams,
    ) -> DispatchResult {
        params.validate(kind)?;

        let mut form = vec![("image_data", encode_base64(image))];
        form.extend(params.form_fields());
        debug!(
            "연산 요청: {kind} ({} bytes, 파라미터 {}개)",
            image.len(),
            form.len() - 1
        );

        let result = self.execute_with_retry(|| self.post_once(kind, &form)).await;
        self.record(&result.as_ref().map(|_| ()));
        let body = result?;

        let output = self.materialize(kind, &body)?;
        debug!("연산 성공: {kind} → {} bytes", output.len());
        Ok(ImageBytes::from(output))
    }

    async fn health(&self) -> Result<ServiceHealth, CoreError> {
        let url = format!("{}/health", self.base_url);
        debug!("헬스 체크: {url}");

        let resp = self
            .client
            .get(&url)
            .timeout(self.health_timeout)
            .send()
            .await
            .map_err(|e| {
                let reason = format!("{url}: {e}");
                if let Some(connectivity) = &self.connectivity {
                    connectivity.record_failure(&reason);
                }
                CoreError::TransportUnavailable(reason)
            })?;

        let status = resp.status();
        if !status.is_success() {
            if let Some(connectivity) = &self.connectivity {
                connectivity.record_failure(&format!("health {status}"));
            }
            return Err(CoreError::TransportUnavailable(format!(
                "헬스 체크 실패 ({status})"
            )));
        }

        let health: ServiceHealth = resp
            .json()
            .await
            .map_err(|e| CoreError::TransportUnavailable(format!("헬스 응답 파싱 실패: {e}")))?;

        if let Some(connectivity) = &self.connectivity {
            connectivity.record_health(&health.version);
        }
        debug!("처리 서버 정상: status={}, opencv={}", health.status, health.version);
        Ok(health)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::{ConnectivityManager, ServiceMode};
    use cvstudio_core::models::params::FlipCode;
    use cvstudio_vision::codec::{decode_image, encode_png};
    use image::{DynamicImage, Rgb, RgbImage};
    use mockito::Matcher;
    use std::sync::Arc;

    fn png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
        encode_png(&DynamicImage::ImageRgb8(RgbImage::from_pixel(
            width,
            height,
            Rgb(color),
        )))
        .unwrap()
    }

    fn client_for(server: &mockito::ServerGuard) -> HttpOperationClient {
        HttpOperationClient::new(&server.url(), Duration::from_secs(5))
            .unwrap()
            .with_retry_delay(Duration::from_millis(10))
    }

    #[test]
    fn client_creation() {
        let client =
            HttpOperationClient::new("http://localhost:8000/", Duration::from_secs(30)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(client.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(
            client.endpoint(OperationKind::EdgeDetection),
            "http://localhost:8000/api/edge-detection"
        );
    }

    #[test]
    fn from_config_applies_settings() {
        let mut config = AppConfig::default_config();
        config.server.max_retries = 4;
        config.composite.width = 320;
        let client = HttpOperationClient::from_config(&config).unwrap();
        assert_eq!(client.max_retries, 4);
        assert_eq!(client.renderer.size(), (320, 600));
    }

    #[test]
    fn only_transport_errors_retry() {
        assert!(is_retryable(&CoreError::Network("refused".to_string())));
        assert!(!is_retryable(&CoreError::RemoteCall {
            operation: "blur".to_string(),
            status: 500,
            detail: "boom".to_string(),
        }));
        assert!(!is_retryable(&CoreError::Internal("x".to_string())));
    }

    #[tokio::test]
    async fn processed_image_is_decoded() {
        let mut server = mockito::Server::new_async().await;
        let input = png(4, 4, [10, 20, 30]);
        let output = png(2, 2, [1, 2, 3]);

        let mock = server
            .mock("POST", "/api/grayscale")
            .match_body(Matcher::UrlEncoded(
                "image_data".to_string(),
                encode_base64(&input),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(
                r#"{{"processed_image":"{}","operation":"grayscale_conversion"}}"#,
                encode_base64(&output)
            ))
            .create_async()
            .await;

        let client = client_for(&server);
        let result = client
            .invoke(&input, OperationKind::Grayscale, &OperationParams::None)
            .await
            .unwrap();
        assert_eq!(&*result, &output[..]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn params_are_sent_as_form_fields() {
        let mut server = mockito::Server::new_async().await;
        let output = png(2, 2, [0, 0, 0]);

        let mock = server
            .mock("POST", "/api/flip")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("flip_code".to_string(), "-1".to_string()),
                Matcher::Regex("image_data=".to_string()),
            ]))
            .with_status(200)
            .with_body(format!(
                r#"{{"processed_image":"data:image/png;base64,{}"}}"#,
                encode_base64(&output)
            ))
            .create_async()
            .await;

        let client = client_for(&server);
        let params = OperationParams::Flip {
            flip_code: FlipCode::Both,
        };
        let result = client
            .invoke(&png(2, 2, [9, 9, 9]), OperationKind::Flip, &params)
            .await
            .unwrap();
        assert_eq!(&*result, &output[..]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn error_detail_becomes_remote_call_failure() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/blur")
            .with_status(500)
            .with_body(r#"{"detail":"OpenCV error: bad kernel"}"#)
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server).with_max_retries(3);
        let err = client
            .invoke(
                &png(2, 2, [0, 0, 0]),
                OperationKind::Blur,
                &OperationParams::default_for(OperationKind::Blur),
            )
            .await
            .unwrap_err();

        match err {
            CoreError::RemoteCall {
                operation,
                status,
                detail,
            } => {
                assert_eq!(operation, "blur");
                assert_eq!(status, 500);
                assert_eq!(detail, "OpenCV error: bad kernel");
            }
            other => panic!("unexpected error: {other}"),
        }
        // 서버 실패 응답은 재시도하지 않음
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn invalid_params_never_reach_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/rotate")
            .expect(0)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client
            .invoke(
                &png(2, 2, [0, 0, 0]),
                OperationKind::Rotate,
                &OperationParams::Rotate {
                    angle: 400,
                    scale: 1.0,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn dimension_report_renders_composite() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/dimensions")
            .with_status(200)
            .with_body(
                r#"{"width":640,"height":480,"channels":3,"total_pixels":307200,"data_type":"uint8"}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let result = client
            .invoke(&png(2, 2, [0, 0, 0]), OperationKind::Dimensions, &OperationParams::None)
            .await
            .unwrap();
        let canvas = decode_image(&result).unwrap();
        assert_eq!((canvas.width(), canvas.height()), (800, 600));
    }

    #[tokio::test]
    async fn rgb_channels_render_composite() {
        let mut server = mockito::Server::new_async().await;
        let channel = encode_base64(&png(4, 4, [200, 0, 0]));
        let _mock = server
            .mock("POST", "/api/rgb-channels")
            .with_status(200)
            .with_body(format!(
                r#"{{"channels":{{"red":"{channel}","green":"{channel}","blue":"{channel}"}},"channel_intensities":{{"red_mean":200.0,"green_mean":0.0,"blue_mean":0.0}}}}"#
            ))
            .create_async()
            .await;

        let client = client_for(&server);
        let result = client
            .invoke(&png(4, 4, [200, 0, 0]), OperationKind::RgbChannels, &OperationParams::None)
            .await
            .unwrap();
        let canvas = decode_image(&result).unwrap().to_rgb8();
        assert_eq!(canvas.dimensions(), (800, 600));
        assert_eq!(canvas.get_pixel(1, 1), &Rgb([24, 24, 27]));
    }

    #[tokio::test]
    async fn hsv_and_pixel_grid_render_composites() {
        let mut server = mockito::Server::new_async().await;
        let plane = encode_base64(&png(3, 3, [50, 60, 70]));
        let _hsv = server
            .mock("POST", "/api/hsv-convert")
            .with_status(200)
            .with_body(format!(
                r#"{{"hsv_image":"{plane}","hue_channel":"{plane}","saturation_channel":"{plane}","value_channel":"{plane}"}}"#
            ))
            .create_async()
            .await;
        let _grid = server
            .mock("POST", "/api/compare-dimensions")
            .with_status(200)
            .with_body(r#"{"pixel_values":[[0,128],[255,64]],"dimensions":{"height":2,"width":2,"channels":1}}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        for kind in [OperationKind::HsvConvert, OperationKind::CompareDimensions] {
            let result = client
                .invoke(&png(3, 3, [0, 0, 0]), kind, &OperationParams::None)
                .await
                .unwrap();
            assert_eq!(decode_image(&result).unwrap().width(), 800, "{kind}");
        }
    }

    #[tokio::test]
    async fn malformed_body_is_internal_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/grayscale")
            .with_status(200)
            .with_body(r#"{"unexpected":true}"#)
            .create_async()
            .await;

        let err = client_for(&server)
            .invoke(&png(2, 2, [0, 0, 0]), OperationKind::Grayscale, &OperationParams::None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Internal(_)));
    }

    #[tokio::test]
    async fn transport_failure_is_retried_and_recorded() {
        let connectivity = Arc::new(ConnectivityManager::new(2));
        // 닫힌 포트 — 연결 거부
        let client = HttpOperationClient::new("http://127.0.0.1:1", Duration::from_secs(2))
            .unwrap()
            .with_retry_delay(Duration::from_millis(5))
            .with_connectivity(connectivity.clone());

        let err = client
            .invoke(&png(2, 2, [0, 0, 0]), OperationKind::Grayscale, &OperationParams::None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Network(_)));
        assert_eq!(connectivity.failure_count(), 1);
        assert_eq!(connectivity.mode(), ServiceMode::Degraded);
    }

    #[tokio::test]
    async fn health_reports_version() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/health")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"healthy","opencv_version":"4.9.0"}"#)
            .create_async()
            .await;

        let connectivity = Arc::new(ConnectivityManager::default());
        let client = client_for(&server).with_connectivity(connectivity.clone());
        let health = client.health().await.unwrap();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.version, "4.9.0");
        assert_eq!(connectivity.server_version().as_deref(), Some("4.9.0"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn health_failure_is_transport_unavailable() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/health")
            .with_status(503)
            .create_async()
            .await;

        let err = client_for(&server).health().await.unwrap_err();
        assert!(matches!(err, CoreError::TransportUnavailable(_)));

        let unreachable =
            HttpOperationClient::new("http://127.0.0.1:1", Duration::from_secs(1)).unwrap();
        let err = unreachable.health().await.unwrap_err();
        assert!(matches!(err, CoreError::TransportUnavailable(_)));
    }
}
