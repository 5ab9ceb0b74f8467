//! 처리 서버 연결 상태 관리.
//!
//! 헬스 체크와 연산 호출 결과로 연결 상태를 추적하고,
//! 연속 실패가 임계값에 도달하면 데모(오프라인) 모드로 전환한다.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 서비스 모드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceMode {
    /// 처리 서버 사용 중
    Online,
    /// 실패가 누적되는 중 (아직 임계값 미만)
    Degraded,
    /// 로컬 데모 연산 사용 중
    Demo,
}

impl std::fmt::Display for ServiceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceMode::Online => write!(f, "online"),
            ServiceMode::Degraded => write!(f, "degraded"),
            ServiceMode::Demo => write!(f, "demo"),
        }
    }
}

/// 연결 상태 스냅샷 (리포트에 기록됨)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectivityStats {
    pub mode: ServiceMode,
    /// 연속 전송 실패 횟수
    pub failure_count: u64,
    /// 헬스 체크에서 받은 서버 OpenCV 버전
    pub server_version: Option<String>,
    /// `--offline` 또는 시작 시 헬스 체크 실패로 고정된 데모 모드
    pub force_demo: bool,
}

/// 연결 상태 관리자
pub struct ConnectivityManager {
    state: Mutex<ConnectivityStats>,
    /// 데모 모드 전환 임계값 (연속 실패 횟수)
    offline_threshold: u64,
}

impl ConnectivityManager {
    pub fn new(offline_threshold: u64) -> Self {
        Self {
            state: Mutex::new(ConnectivityStats {
                mode: ServiceMode::Online,
                failure_count: 0,
                server_version: None,
                force_demo: false,
            }),
            offline_threshold: offline_threshold.max(1),
        }
    }

    /// 데모 모드 고정. 이후 성공/실패 기록은 무시된다.
    pub fn set_force_demo(&self) {
        let mut state = self.state.lock();
        state.force_demo = true;
        state.mode = ServiceMode::Demo;
        info!("데모 모드 고정");
    }

    pub fn is_force_demo(&self) -> bool {
        self.state.lock().force_demo
    }

    pub fn mode(&self) -> ServiceMode {
        self.state.lock().mode
    }

    /// 서버 응답 수신 기록 (상태 코드와 무관하게 서버에 도달했음)
    pub fn record_success(&self) {
        let mut state = self.state.lock();
        if state.force_demo {
            return;
        }
        if state.mode == ServiceMode::Demo {
            info!("처리 서버 연결 복구, 온라인 모드");
        }
        state.failure_count = 0;
        state.mode = ServiceMode::Online;
    }

    /// 헬스 체크 성공 기록
    pub fn record_health(&self, version: &str) {
        self.state.lock().server_version = Some(version.to_string());
        self.record_success();
    }

    /// 전송 실패 기록, 임계값 도달 시 데모 모드 전환
    pub fn record_failure(&self, reason: &str) {
        let mut state = self.state.lock();
        if state.force_demo {
            return;
        }

        state.failure_count += 1;
        let count = state.failure_count;
        debug!("처리 서버 연결 실패 (연속 {count}회): {reason}");

        if count < self.offline_threshold {
            state.mode = ServiceMode::Degraded;
        } else if state.mode != ServiceMode::Demo {
            warn!("연속 {count}회 실패, 데모 모드 전환");
            state.mode = ServiceMode::Demo;
        }
    }

    pub fn failure_count(&self) -> u64 {
        self.state.lock().failure_count
    }

    pub fn server_version(&self) -> Option<String> {
        self.state.lock().server_version.clone()
    }

    pub fn stats(&self) -> ConnectivityStats {
        self.state.lock().clone()
    }
}

impl Default for ConnectivityManager {
    fn default() -> Self {
        Self::new(3)
    }
}

pub type SharedConnectivityManager = Arc<ConnectivityManager>;
