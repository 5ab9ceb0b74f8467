//! 배치 디스패치 결과 모델.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::CoreError;
use crate::models::image::{ImageBytes, ImageId};
use crate::models::operation::OperationKind;

/// (이미지, 연산) 한 단계의 결과. 실패는 값으로 전달되며 호출자를 넘어 전파되지 않는다.
pub type DispatchResult = Result<ImageBytes, CoreError>;

/// 이미지 한 장의 체인 처리 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImageOutcome {
    /// 체인 전체 성공 후 커밋됨
    Succeeded {
        label: String,
        elapsed_ms: u64,
    },
    /// 체인 중 실패. 이전에 커밋된 상태는 그대로 유지됨
    Failed {
        operation: Option<OperationKind>,
        error: String,
    },
    /// 차례가 왔을 때 레지스트리에서 사라진 이미지
    Skipped,
}

/// 실패한 이미지 상세
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageFailure {
    pub image_id: ImageId,
    pub image_name: String,
    /// 실패한 연산 (체인 시작 전 실패면 None)
    pub operation: Option<OperationKind>,
    pub error: String,
}

/// 배치 실행 요약
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    /// 실제 디스패치된 이미지 수 (skipped 제외)
    pub total: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failures: Vec<ImageFailure>,
    /// 적용된 체인 라벨 (예: "rotate → flip")
    pub chain_label: String,
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
}

impl BatchSummary {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.total > 0 && self.succeeded == self.total
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "처리 완료: {}/{} 성공 ({})",
            self.succeeded, self.total, self.chain_label
        )?;
        if self.skipped > 0 {
            write!(f, ", {}개 건너뜀", self.skipped)?;
        }
        for failure in &self.failures {
            write!(f, "\n  ✗ {}", failure.image_name)?;
            if let Some(op) = failure.operation {
                write!(f, " [{op}]")?;
            }
            write!(f, ": {}", failure.error)?;
        }
        Ok(())
    }
}

/// 체인 라벨 조합
pub fn chain_label(chain: &[OperationKind]) -> String {
    chain
        .iter()
        .map(|kind| kind.id())
        .collect::<Vec<_>>()
        .join(" → ")
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
