//! 연산 클라이언트 포트.
//!
//! 구현: `cvstudio-network` (HTTP 처리 서버), `cvstudio-vision` (오프라인 데모)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::models::dispatch::DispatchResult;
use crate::models::operation::OperationKind;
use crate::models::params::OperationParams;

/// 처리 서버 상태 (`GET /health`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub status: String,
    /// 서버 측 OpenCV 버전 문자열
    #[serde(rename = "opencv_version")]
    pub version: String,
}

/// 이미지 한 장에 연산 하나를 적용하는 무상태 클라이언트
#[async_trait]
pub trait OperationClient: Send + Sync {
    /// 연산 실행
    ///
    /// `image`는 인코딩된 원시 바이트(data-URI 접두사 없음)이다.
    /// 전송/서버 실패는 `Err`로 반환되며 panic하지 않는다.
    /// 분석 연산의 구조화된 응답은 구현체가 단일 composite 이미지로 렌더링한다.
    async fn invoke(
        &self,
        image: &[u8],
        kind: OperationKind,
        params: &OperationParams,
    ) -> DispatchResult;

    /// 처리 서버 상태 확인
    async fn health(&self) -> Result<ServiceHealth, CoreError>;

    /// 로그용 구현체 이름
    fn name(&self) -> &'static str;
}
