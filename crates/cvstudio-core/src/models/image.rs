//! 로드된 이미지 모델.
//!
//! 원본 바이트는 로드 이후 불변이며, 처리 결과는 배치 체인이
//! 끝까지 성공했을 때만 커밋된다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// 인코딩된 이미지 바이트 (PNG/JPEG 등, data-URI 접두사 없음)
pub type ImageBytes = Arc<[u8]>;

/// 이미지 식별자 (로드 시점에 발급되는 UUID v4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ImageId(uuid::Uuid);

impl ImageId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ImageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 사용자가 선택한 원본 파일
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// 레지스트리에 올라간 이미지
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub id: ImageId,
    pub name: String,
    pub byte_size: usize,
    pub mime_type: String,
    pub original_data: ImageBytes,
    /// 마지막으로 커밋된 처리 결과
    pub processed_data: Option<ImageBytes>,
    pub selected: bool,
    /// 디스패치 단계가 진행 중일 때만 true
    pub is_processing: bool,
    pub is_processed: bool,
    pub width: u32,
    pub height: u32,
    /// 예: "rotate → blur"
    pub last_operation_label: Option<String>,
    pub last_processing_time: Option<Duration>,
    /// grayscale 연산 결과 (compare-dimensions 선행 조건)
    pub grayscale_artifact: Option<ImageBytes>,
}

impl LoadedImage {
    /// 디코딩이 끝난 파일로 새 이미지 생성
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        data: Vec<u8>,
        width: u32,
        height: u32,
    ) -> Self {
        let byte_size = data.len();
        Self {
            id: ImageId::new(),
            name: name.into(),
            byte_size,
            mime_type: mime_type.into(),
            original_data: Arc::from(data),
            processed_data: None,
            selected: false,
            is_processing: false,
            is_processed: false,
            width,
            height,
            last_operation_label: None,
            last_processing_time: None,
            grayscale_artifact: None,
        }
    }

    /// 다음 체인의 입력: 처리 결과가 있으면 그것, 없으면 원본
    pub fn current_data(&self) -> ImageBytes {
        self.processed_data
            .clone()
            .unwrap_or_else(|| self.original_data.clone())
    }

    /// 체인 결과 커밋
    pub fn commit(&mut self, output: ImageBytes, label: String, elapsed: Duration) {
        self.processed_data = Some(output);
        self.is_processed = true;
        self.last_operation_label = Some(label);
        self.last_processing_time = Some(elapsed);
    }
}
