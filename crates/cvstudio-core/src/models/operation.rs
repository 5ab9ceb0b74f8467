//! 연산 카탈로그.
//!
//! 처리 서버가 제공하는 모든 연산을 닫힌 열거형으로 정의한다.
//! 배타/조합 분류, 응답 형태, 선행 조건은 카탈로그 항목의 정적 속성이다.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// 연산 분류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationClass {
    /// 분석/시각화 연산. 선택 시 큐를 비우고 단독 실행
    Exclusive,
    /// 픽셀 변환 연산. 큐에 순서대로 체이닝 가능
    Composable,
}

/// 원격 응답을 이미지로 바꾸는 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseShape {
    /// `processed_image` 필드에 완성된 이미지
    ProcessedImage,
    /// 크기/채널 정보 리포트
    DimensionReport,
    /// 그레이스케일 픽셀 값 격자
    PixelGrid,
    /// R/G/B 채널 이미지 + 평균 강도
    RgbChannels,
    /// HSV 변환 이미지 + H/S/V 채널 이미지
    HsvChannels,
}

/// 연산 종류 (카탈로그 키)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    Dimensions,
    Grayscale,
    CompareDimensions,
    RgbChannels,
    HsvConvert,
    ColorManipulation,
    DrawShapes,
    AddText,
    Translate,
    Rotate,
    Flip,
    Resize,
    Pyramid,
    Crop,
    Arithmetic,
    Bitwise,
    Blur,
    Sharpen,
    Denoise,
    Threshold,
    AdaptiveThreshold,
    Dilation,
    Erosion,
    Opening,
    Closing,
    EdgeDetection,
}

/// 카탈로그 항목
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationSpec {
    pub kind: OperationKind,
    /// URL 경로 및 체인 라벨에 쓰이는 ID
    pub id: &'static str,
    /// 사람이 읽는 이름
    pub label: &'static str,
    /// 토픽 그룹 (서버 `/api/operations` 분류와 동일)
    pub group: &'static str,
    pub class: OperationClass,
    pub response: ResponseShape,
    /// 이 연산 전에 같은 이미지에 대해 실행되어 있어야 하는 연산
    pub requires: Option<OperationKind>,
}

const fn composable(
    kind: OperationKind,
    id: &'static str,
    label: &'static str,
    group: &'static str,
) -> OperationSpec {
    OperationSpec {
        kind,
        id,
        label,
        group,
        class: OperationClass::Composable,
        response: ResponseShape::ProcessedImage,
        requires: None,
    }
}

const fn exclusive(
    kind: OperationKind,
    id: &'static str,
    label: &'static str,
    group: &'static str,
    response: ResponseShape,
) -> OperationSpec {
    OperationSpec {
        kind,
        id,
        label,
        group,
        class: OperationClass::Exclusive,
        response,
        requires: None,
    }
}

/// 전체 카탈로그 (표시 순서)
pub static CATALOG: [OperationSpec; 26] = [
    exclusive(
        OperationKind::Dimensions,
        "dimensions",
        "Image Dimensions",
        "getting_started",
        ResponseShape::DimensionReport,
    ),
    composable(OperationKind::Grayscale, "grayscale", "Grayscale", "grayscaling"),
    OperationSpec {
        kind: OperationKind::CompareDimensions,
        id: "compare-dimensions",
        label: "Compare Dimensions",
        group: "grayscaling",
        class: OperationClass::Exclusive,
        response: ResponseShape::PixelGrid,
        requires: Some(OperationKind::Grayscale),
    },
    exclusive(
        OperationKind::RgbChannels,
        "rgb-channels",
        "RGB Channels",
        "color_spaces",
        ResponseShape::RgbChannels,
    ),
    exclusive(
        OperationKind::HsvConvert,
        "hsv-convert",
        "HSV Conversion",
        "color_spaces",
        ResponseShape::HsvChannels,
    ),
    composable(
        OperationKind::ColorManipulation,
        "color-manipulation",
        "Color Manipulation",
        "color_spaces",
    ),
    composable(OperationKind::DrawShapes, "draw-shapes", "Draw Shapes", "drawing"),
    composable(OperationKind::AddText, "add-text", "Add Text", "drawing"),
    composable(OperationKind::Translate, "translate", "Translate", "transformations"),
    composable(OperationKind::Rotate, "rotate", "Rotate", "transformations"),
    composable(OperationKind::Flip, "flip", "Flip", "transformations"),
    composable(OperationKind::Resize, "resize", "Resize", "scaling_resizing"),
    composable(OperationKind::Pyramid, "pyramid", "Image Pyramid", "scaling_resizing"),
    composable(OperationKind::Crop, "crop", "Crop", "scaling_resizing"),
    composable(OperationKind::Arithmetic, "arithmetic", "Arithmetic", "arithmetic_bitwise"),
    composable(OperationKind::Bitwise, "bitwise", "Bitwise", "arithmetic_bitwise"),
    composable(OperationKind::Blur, "blur", "Blur", "filtering"),
    composable(OperationKind::Sharpen, "sharpen", "Sharpen", "filtering"),
    composable(OperationKind::Denoise, "denoise", "Denoise", "filtering"),
    composable(OperationKind::Threshold, "threshold", "Threshold", "thresholding"),
    composable(
        OperationKind::AdaptiveThreshold,
        "adaptive-threshold",
        "Adaptive Threshold",
        "thresholding",
    ),
    composable(OperationKind::Dilation, "dilation", "Dilation", "morphology_edges"),
    composable(OperationKind::Erosion, "erosion", "Erosion", "morphology_edges"),
    composable(OperationKind::Opening, "opening", "Opening", "morphology_edges"),
    composable(OperationKind::Closing, "closing", "Closing", "morphology_edges"),
    composable(
        OperationKind::EdgeDetection,
        "edge-detection",
        "Edge Detection",
        "morphology_edges",
    ),
];

impl OperationKind {
    /// 카탈로그 항목 조회
    pub fn spec(self) -> &'static OperationSpec {
        // CATALOG는 열거형 선언 순서와 동일하게 유지된다
        &CATALOG[self as usize]
    }

    pub fn id(self) -> &'static str {
        self.spec().id
    }

    pub fn label(self) -> &'static str {
        self.spec().label
    }

    pub fn class(self) -> OperationClass {
        self.spec().class
    }

    pub fn is_exclusive(self) -> bool {
        self.class() == OperationClass::Exclusive
    }

    pub fn response_shape(self) -> ResponseShape {
        self.spec().response
    }

    pub fn requires(self) -> Option<OperationKind> {
        self.spec().requires
    }

    /// ID 문자열로 연산 조회 (`edge_detection`처럼 밑줄 표기도 허용)
    pub fn from_id(id: &str) -> Result<Self, CoreError> {
        let normalized = id.trim().to_ascii_lowercase().replace('_', "-");
        CATALOG
            .iter()
            .find(|spec| spec.id == normalized)
            .map(|spec| spec.kind)
            .ok_or_else(|| CoreError::validation("operation", format!("알 수 없는 연산: {id}")))
    }

    /// 전체 연산 목록 (카탈로그 순서)
    pub fn all() -> impl Iterator<Item = OperationKind> {
        CATALOG.iter().map(|spec| spec.kind)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}
