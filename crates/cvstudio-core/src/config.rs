//! 애플리케이션 설정 구조체.
//!
//! 처리 서버 URL, 타임아웃, 재시도, composite 캔버스 크기, 내보내기 경로 등
//! 런타임 설정을 정의한다. `ConfigManager`를 통해 JSON 파일에서 로드.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 최상위 애플리케이션 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 처리 서버 연결 설정
    pub server: ServerConfig,
    /// 배치 디스패치 설정
    #[serde(default)]
    pub dispatch: DispatchConfig,
    /// 분석 결과 composite 렌더링 설정
    #[serde(default)]
    pub composite: CompositeConfig,
    /// 결과 내보내기 설정
    #[serde(default)]
    pub export: ExportConfig,
}

// ============================================================
// 서버 설정
// ============================================================

/// 처리 서버 연결 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 처리 서버 기본 URL (예: "http://127.0.0.1:8000")
    pub base_url: String,
    /// 연산 요청 타임아웃 (밀리초)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// 시작 시 헬스 체크 타임아웃 (밀리초)
    #[serde(default = "default_health_timeout_ms")]
    pub health_timeout_ms: u64,
    /// 전송 실패 시 재시도 횟수 (서버 에러 응답은 재시도하지 않음)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// 연속 실패 시 오프라인 전환 임계값
    #[serde(default = "default_offline_threshold")]
    pub offline_threshold: u64,
}

// ============================================================
// 디스패치 설정
// ============================================================

/// 배치 디스패치 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// 진행 이벤트 브로드캐스트 채널 용량
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            event_capacity: default_event_capacity(),
        }
    }
}

// ============================================================
// composite 설정
// ============================================================

/// 분석 결과 composite 캔버스 설정
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeConfig {
    /// 캔버스 너비 (픽셀)
    #[serde(default = "default_canvas_width")]
    pub width: u32,
    /// 캔버스 높이 (픽셀)
    #[serde(default = "default_canvas_height")]
    pub height: u32,
}

impl Default for CompositeConfig {
    fn default() -> Self {
        Self {
            width: default_canvas_width(),
            height: default_canvas_height(),
        }
    }
}

// ============================================================
// 내보내기 설정
// ============================================================

/// 결과 내보내기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// 출력 디렉토리 (None이면 현재 디렉토리의 `cvstudio-output`)
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// 리포트 파일 이름
    #[serde(default = "default_report_file")]
    pub report_file: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            report_file: default_report_file(),
        }
    }
}

impl ExportConfig {
    /// 실제 출력 디렉토리
    pub fn resolved_output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("cvstudio-output"))
    }
}

// ============================================================
// AppConfig impl
// ============================================================

impl AppConfig {
    /// 기본 설정값 반환
    pub fn default_config() -> Self {
        Self {
            server: ServerConfig {
                base_url: "http://127.0.0.1:8000".to_string(),
                request_timeout_ms: default_request_timeout_ms(),
                health_timeout_ms: default_health_timeout_ms(),
                max_retries: default_max_retries(),
                offline_threshold: default_offline_threshold(),
            },
            dispatch: DispatchConfig::default(),
            composite: CompositeConfig::default(),
            export: ExportConfig::default(),
        }
    }

    /// 연산 요청 타임아웃을 Duration으로 반환
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.server.request_timeout_ms)
    }

    /// 헬스 체크 타임아웃을 Duration으로 반환
    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.server.health_timeout_ms)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

// ============================================================
// 기본값 함수
// ============================================================

fn default_request_timeout_ms() -> u64 {
    30_000
}
fn default_health_timeout_ms() -> u64 {
    3_000
}
fn default_max_retries() -> u32 {
    1
}
fn default_offline_threshold() -> u64 {
    3
}
fn default_event_capacity() -> usize {
    64
}
fn default_canvas_width() -> u32 {
    800
}
fn default_canvas_height() -> u32 {
    600
}
fn default_report_file() -> String {
    "report.json".to_string()
}
