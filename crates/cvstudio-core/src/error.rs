//! CVSTUDIO 핵심 에러 타입.
//!
//! 모든 어댑터 crate는 이 에러 타입을 그대로 반환하거나 `#[from] CoreError`로 래핑한다.
//! 배치 처리 중 발생한 에러는 이미지 단위로 귀속되며 배치 전체를 중단시키지 않는다.

use thiserror::Error;

/// 코어 레이어 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 설정값 오류
    #[error("설정 에러: {0}")]
    Config(String),

    /// 필드 유효성 검증 실패
    #[error("유효성 검증 실패 — {field}: {message}")]
    Validation {
        /// 검증 실패한 필드명
        field: String,
        /// 실패 사유
        message: String,
    },

    /// 리소스를 찾을 수 없음
    #[error("{resource_type} 미발견: {id}")]
    NotFound {
        /// 리소스 종류 (예: "Image")
        resource_type: String,
        /// 리소스 식별자
        id: String,
    },

    /// 큐에 선택된 연산이 없음
    #[error("선택된 연산이 없습니다")]
    NoOperationSelected,

    /// 처리 대상 이미지가 없음
    #[error("선택된 이미지가 없습니다")]
    NoTargetsSelected,

    /// 선행 연산 결과가 없음 (체인 순서 위반)
    #[error("선행 조건 미충족 — {operation}: {requires} 결과가 먼저 필요합니다")]
    MissingPrecondition {
        /// 실행하려던 연산 ID
        operation: String,
        /// 먼저 실행되어야 하는 연산 ID
        requires: String,
    },

    /// 파일 디코딩 실패 (파일 단위로 격리됨)
    #[error("디코딩 실패 — {name}: {reason}")]
    DecodeFailure {
        /// 파일 이름
        name: String,
        /// 실패 사유
        reason: String,
    },

    /// 원격 처리 서버가 실패 응답을 반환
    #[error("원격 연산 실패 — {operation} ({status}): {detail}")]
    RemoteCall {
        /// 연산 ID
        operation: String,
        /// HTTP 상태 코드
        status: u16,
        /// 서버가 보낸 상세 메시지
        detail: String,
    },

    /// 처리 서버에 연결할 수 없음 (오프라인/데모 모드 전환 사유)
    #[error("처리 서버 사용 불가: {0}")]
    TransportUnavailable(String),

    /// 네트워크 에러 (연결 실패, 타임아웃)
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 이미 다른 배치가 실행 중
    #[error("이미 배치 처리가 진행 중입니다")]
    BatchInProgress,

    /// 해당 이미지가 이미 처리 중
    #[error("이미지가 이미 처리 중입니다: {0}")]
    AlreadyProcessing(String),

    /// 이미지 인코딩/렌더링 실패
    #[error("이미지 처리 에러: {0}")]
    Image(String),

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),

    /// 내부 에러 (예상치 못한 상황)
    #[error("내부 에러: {0}")]
    Internal(String),
}

impl CoreError {
    /// 유효성 검증 에러 생성 헬퍼
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}
