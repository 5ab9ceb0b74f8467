//! # cvstudio-network
//!
//! 처리 서버 네트워크 어댑터.
//! `POST /api/{id}` form 요청으로 연산을 실행하고, `GET /health`로 서버 상태를 확인하며,
//! 연속 실패 시 데모 모드로 전환하도록 연결 상태를 추적한다.
//!
//! ## 사용 예시
//!
//! ```rust,ignore
//! use cvstudio_network::http_client::HttpOperationClient;
//!
//! let client = HttpOperationClient::from_config(&config)?;
//! let health = client.health().await?;
//! ```

pub mod connectivity;
pub mod http_client;
pub mod wire;
