//! 시작 시 처리 서버 연결.
//!
//! 헬스 체크를 한 번 수행하고, 실패하면 로컬 데모 클라이언트로 전환한다.

use cvstudio_core::config::AppConfig;
use cvstudio_core::error::CoreError;
use cvstudio_core::ports::operation_client::OperationClient;
use cvstudio_network::connectivity::{ConnectivityManager, ServiceMode, SharedConnectivityManager};
use cvstudio_network::http_client::HttpOperationClient;
use cvstudio_vision::composite::CompositeRenderer;
use cvstudio_vision::local_client::LocalOperationClient;
use std::sync::Arc;
use tracing::{info, warn};

/// 연결 결과
pub struct Connection {
    pub client: Arc<dyn OperationClient>,
    pub connectivity: SharedConnectivityManager,
}

impl Connection {
    pub fn mode(&self) -> ServiceMode {
        self.connectivity.mode()
    }
}

/// 처리 클라이언트 결정
///
/// `force_offline`이면 헬스 체크 없이 데모 모드.
pub async fn connect(config: &AppConfig, force_offline: bool) -> Result<Connection, CoreError> {
    let connectivity = Arc::new(ConnectivityManager::new(config.server.offline_threshold));

    if force_offline {
        connectivity.set_force_demo();
        info!("오프라인 모드: 로컬 데모 연산만 사용");
        return Ok(demo(config, connectivity));
    }

    let http = HttpOperationClient::from_config(config)?.with_connectivity(connectivity.clone());

    match http.health().await {
        Ok(health) => {
            connectivity.record_health(&health.version);
            info!(
                "처리 서버 연결: {} (status={}, opencv={})",
                http.base_url(),
                health.status,
                health.version
            );
            Ok(Connection {
                client: Arc::new(http),
                connectivity,
            })
        }
        Err(e) => {
            warn!("{e} — 데모 모드로 전환");
            connectivity.set_force_demo();
            Ok(demo(config, connectivity))
        }
    }
}

fn demo(config: &AppConfig, connectivity: SharedConnectivityManager) -> Connection {
    let local = LocalOperationClient::new(CompositeRenderer::new(config.composite));
    Connection {
        client: Arc::new(local),
        connectivity,
    }
}
