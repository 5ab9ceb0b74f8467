//! 연산별 타입 파라미터.
//!
//! 연산 ID마다 고정된 파라미터 집합을 태그드 열거형으로 표현한다.
//! 값 범위 검증은 파라미터 저장소 경계에서 수행되므로
//! 원격 호출 시점에는 항상 유효한 값만 전송된다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::models::operation::OperationKind;

/// 문자열 선택지 파라미터 정의
macro_rules! choice_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            /// 서버 전송용 표기
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok(Self::$variant),)+
                    other => Err(CoreError::validation(
                        stringify!($name),
                        format!("지원하지 않는 값: {other}"),
                    )),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

choice_enum!(
    /// 블러 종류
    BlurType {
        Gaussian => "gaussian",
        Motion => "motion",
        Median => "median",
        Bilateral => "bilateral",
    }
);

choice_enum!(
    /// 임계값 처리 방식
    ThresholdType {
        Binary => "binary",
        BinaryInv => "binary_inv",
        Trunc => "trunc",
        ToZero => "tozero",
        ToZeroInv => "tozero_inv",
    }
);

choice_enum!(
    /// 리사이즈 보간법
    Interpolation {
        Nearest => "nearest",
        Linear => "linear",
        Cubic => "cubic",
        Lanczos => "lanczos",
    }
);

choice_enum!(
    /// 산술 연산
    ArithmeticOp {
        Add => "add",
        Subtract => "subtract",
        Multiply => "multiply",
        Divide => "divide",
    }
);

choice_enum!(
    /// 비트 연산
    BitwiseOp {
        And => "and",
        Or => "or",
        Xor => "xor",
        Not => "not",
    }
);

choice_enum!(
    /// 비트 연산 마스크 모양
    MaskType {
        Circular => "circular",
        Rectangular => "rectangular",
    }
);

choice_enum!(
    /// 노이즈 제거 방식
    DenoiseMethod {
        NlMeans => "nlmeans",
        Bilateral => "bilateral",
        Gaussian => "gaussian",
    }
);

choice_enum!(
    /// 적응형 임계값 방식
    AdaptiveMethod {
        Mean => "mean",
        Gaussian => "gaussian",
    }
);

/// 뒤집기 방향 (OpenCV flip code)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlipCode {
    /// 0: 상하
    Vertical,
    /// 1: 좌우
    Horizontal,
    /// -1: 상하좌우
    Both,
}

impl FlipCode {
    pub fn code(self) -> i32 {
        match self {
            FlipCode::Vertical => 0,
            FlipCode::Horizontal => 1,
            FlipCode::Both => -1,
        }
    }
}

impl FromStr for FlipCode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "0" | "vertical" => Ok(FlipCode::Vertical),
            "1" | "horizontal" => Ok(FlipCode::Horizontal),
            "-1" | "both" => Ok(FlipCode::Both),
            other => Err(CoreError::validation(
                "flip_code",
                format!("0, 1, -1 중 하나여야 합니다: {other}"),
            )),
        }
    }
}

/// 연산 파라미터 스냅샷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationParams {
    /// 파라미터 없는 연산 (분석 연산, grayscale, draw-shapes)
    None,
    Rotate {
        angle: i32,
        scale: f32,
    },
    Blur {
        blur_type: BlurType,
        kernel_size: u32,
    },
    Threshold {
        threshold_value: u8,
        max_value: u8,
        threshold_type: ThresholdType,
    },
    Resize {
        scale_factor: f32,
        interpolation: Interpolation,
    },
    EdgeDetection {
        low_threshold: u16,
        high_threshold: u16,
    },
    ColorManipulation {
        hue_shift: i32,
        saturation_factor: f32,
        value_factor: f32,
    },
    Crop {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
    AddText {
        text: String,
        x: i32,
        y: i32,
        font_scale: f32,
        color: [u8; 3],
    },
    Translate {
        tx: i32,
        ty: i32,
    },
    Flip {
        flip_code: FlipCode,
    },
    Pyramid {
        levels: u8,
    },
    Arithmetic {
        operation: ArithmeticOp,
        value: u8,
    },
    Bitwise {
        operation: BitwiseOp,
        mask_type: MaskType,
    },
    Sharpen {
        strength: f32,
    },
    Denoise {
        method: DenoiseMethod,
        h: f32,
    },
    AdaptiveThreshold {
        max_value: u8,
        adaptive_method: AdaptiveMethod,
        threshold_type: ThresholdType,
        block_size: u32,
        c: i32,
    },
    /// dilation / erosion / opening / closing 공용
    Morphology {
        kernel_size: u32,
        iterations: u32,
    },
}

/// 범위 검사 헬퍼 (float는 NaN/inf도 거부)
fn check_range<T>(field: &str, value: T, min: T, max: T) -> Result<(), CoreError>
where
    T: PartialOrd + fmt::Display + Copy,
{
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(CoreError::validation(
            field,
            format!("{value}: {min}..={max} 범위를 벗어났습니다"),
        ))
    }
}

fn check_odd(field: &str, value: u32) -> Result<(), CoreError> {
    if value % 2 == 1 {
        Ok(())
    } else {
        Err(CoreError::validation(field, format!("{value}: 홀수여야 합니다")))
    }
}

fn parse_value<T>(field: &str, raw: &str) -> Result<T, CoreError>
where
    T: FromStr,
{
    raw.trim()
        .parse::<T>()
        .map_err(|_| CoreError::validation(field, format!("값을 해석할 수 없습니다: {raw}")))
}

impl OperationParams {
    /// 연산별 기본 파라미터
    pub fn default_for(kind: OperationKind) -> Self {
        use OperationKind as K;
        match kind {
            K::Dimensions
            | K::Grayscale
            | K::CompareDimensions
            | K::RgbChannels
            | K::HsvConvert
            | K::DrawShapes => OperationParams::None,
            K::ColorManipulation => OperationParams::ColorManipulation {
                hue_shift: 0,
                saturation_factor: 1.0,
                value_factor: 1.0,
            },
            K::AddText => OperationParams::AddText {
                text: "OpenCV Text".to_string(),
                x: 50,
                y: 50,
                font_scale: 1.0,
                color: [255, 255, 255],
            },
            K::Translate => OperationParams::Translate { tx: 50, ty: 50 },
            K::Rotate => OperationParams::Rotate {
                angle: 45,
                scale: 1.0,
            },
            K::Flip => OperationParams::Flip {
                flip_code: FlipCode::Horizontal,
            },
            K::Resize => OperationParams::Resize {
                scale_factor: 0.5,
                interpolation: Interpolation::Linear,
            },
            K::Pyramid => OperationParams::Pyramid { levels: 3 },
            K::Crop => OperationParams::Crop {
                x: 100,
                y: 100,
                width: 200,
                height: 200,
            },
            K::Arithmetic => OperationParams::Arithmetic {
                operation: ArithmeticOp::Add,
                value: 50,
            },
            K::Bitwise => OperationParams::Bitwise {
                operation: BitwiseOp::And,
                mask_type: MaskType::Circular,
            },
            K::Blur => OperationParams::Blur {
                blur_type: BlurType::Gaussian,
                kernel_size: 15,
            },
            K::Sharpen => OperationParams::Sharpen { strength: 1.0 },
            K::Denoise => OperationParams::Denoise {
                method: DenoiseMethod::NlMeans,
                h: 10.0,
            },
            K::Threshold => OperationParams::Threshold {
                threshold_value: 127,
                max_value: 255,
                threshold_type: ThresholdType::Binary,
            },
            K::AdaptiveThreshold => OperationParams::AdaptiveThreshold {
                max_value: 255,
                adaptive_method: AdaptiveMethod::Mean,
                threshold_type: ThresholdType::Binary,
                block_size: 11,
                c: 2,
            },
            K::Dilation | K::Erosion | K::Opening | K::Closing => OperationParams::Morphology {
                kernel_size: 5,
                iterations: 1,
            },
            K::EdgeDetection => OperationParams::EdgeDetection {
                low_threshold: 50,
                high_threshold: 150,
            },
        }
    }

    /// 이 파라미터가 해당 연산의 형태인지
    pub fn matches(&self, kind: OperationKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(&Self::default_for(kind))
    }

    /// 연산 종류와 값 범위 검증
    pub fn validate(&self, kind: OperationKind) -> Result<(), CoreError> {
        if !self.matches(kind) {
            return Err(CoreError::validation(
                "params",
                format!("{} 연산에 맞지 않는 파라미터입니다", kind.id()),
            ));
        }

        match self {
            OperationParams::None => Ok(()),
            OperationParams::Rotate { angle, scale } => {
                check_range("angle", *angle, 0, 360)?;
                check_range("scale", *scale, 0.1, 2.0)
            }
            OperationParams::Blur { kernel_size, .. } => {
                check_range("kernel_size", *kernel_size, 1, 99)?;
                check_odd("kernel_size", *kernel_size)
            }
            OperationParams::Threshold { .. } => Ok(()),
            OperationParams::Resize { scale_factor, .. } => {
                check_range("scale_factor", *scale_factor, 0.1, 3.0)
            }
            OperationParams::EdgeDetection {
                low_threshold,
                high_threshold,
            } => {
                check_range("low_threshold", *low_threshold, 0, 500)?;
                check_range("high_threshold", *high_threshold, 0, 500)?;
                if low_threshold > high_threshold {
                    return Err(CoreError::validation(
                        "low_threshold",
                        "high_threshold보다 클 수 없습니다",
                    ));
                }
                Ok(())
            }
            OperationParams::ColorManipulation {
                hue_shift,
                saturation_factor,
                value_factor,
            } => {
                check_range("hue_shift", *hue_shift, -180, 180)?;
                check_range("saturation_factor", *saturation_factor, 0.0, 3.0)?;
                check_range("value_factor", *value_factor, 0.0, 3.0)
            }
            OperationParams::Crop { width, height, .. } => {
                check_range("width", *width, 1, u32::MAX)?;
                check_range("height", *height, 1, u32::MAX)
            }
            OperationParams::AddText {
                text, font_scale, ..
            } => {
                if text.trim().is_empty() {
                    return Err(CoreError::validation("text", "비어 있을 수 없습니다"));
                }
                check_range("font_scale", *font_scale, 0.1, 10.0)
            }
            OperationParams::Translate { tx, ty } => {
                check_range("tx", *tx, -2000, 2000)?;
                check_range("ty", *ty, -2000, 2000)
            }
            OperationParams::Flip { .. } => Ok(()),
            OperationParams::Pyramid { levels } => check_range("levels", *levels, 1, 6),
            OperationParams::Arithmetic { .. } | OperationParams::Bitwise { .. } => Ok(()),
            OperationParams::Sharpen { strength } => check_range("strength", *strength, 0.1, 5.0),
            OperationParams::Denoise { h, .. } => check_range("h", *h, 1.0, 30.0),
            OperationParams::AdaptiveThreshold {
                threshold_type,
                block_size,
                c,
                ..
            } => {
                if !matches!(
                    threshold_type,
                    ThresholdType::Binary | ThresholdType::BinaryInv
                ) {
                    return Err(CoreError::validation(
                        "threshold_type",
                        "binary 또는 binary_inv만 지원합니다",
                    ));
                }
                check_range("block_size", *block_size, 3, 99)?;
                check_odd("block_size", *block_size)?;
                check_range("c", *c, -50, 50)
            }
            OperationParams::Morphology {
                kernel_size,
                iterations,
            } => {
                check_range("kernel_size", *kernel_size, 1, 31)?;
                check_range("iterations", *iterations, 1, 10)
            }
        }
    }

    /// 문자열 필드에서 파라미터 생성 (기본값 위에 덮어쓰기)
    ///
    /// 알 수 없는 키는 거부한다. 결과는 검증까지 마친 상태로 반환된다.
    pub fn from_fields<K, V>(kind: OperationKind, fields: &[(K, V)]) -> Result<Self, CoreError>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params = Self::default_for(kind);
        for (key, value) in fields {
            params.set_field(kind, key.as_ref(), value.as_ref())?;
        }
        params.validate(kind)?;
        Ok(params)
    }

    fn set_field(&mut self, kind: OperationKind, key: &str, raw: &str) -> Result<(), CoreError> {
        let key = key.trim();
        match self {
            OperationParams::Rotate { angle, scale } => match key {
                "angle" => *angle = parse_value(key, raw)?,
                "scale" => *scale = parse_value(key, raw)?,
                _ => return Err(unknown_field(kind, key)),
            },
            OperationParams::Blur {
                blur_type,
                kernel_size,
            } => match key {
                "blur_type" => *blur_type = raw.parse()?,
                "kernel_size" => *kernel_size = parse_value(key, raw)?,
                _ => return Err(unknown_field(kind, key)),
            },
            OperationParams::Threshold {
                threshold_value,
                max_value,
                threshold_type,
            } => match key {
                "threshold_value" => *threshold_value = parse_value(key, raw)?,
                "max_value" => *max_value = parse_value(key, raw)?,
                "threshold_type" => *threshold_type = raw.parse()?,
                _ => return Err(unknown_field(kind, key)),
            },
            OperationParams::Resize {
                scale_factor,
                interpolation,
            } => match key {
                "scale_factor" => *scale_factor = parse_value(key, raw)?,
                "interpolation" => *interpolation = raw.parse()?,
                _ => return Err(unknown_field(kind, key)),
            },
            OperationParams::EdgeDetection {
                low_threshold,
                high_threshold,
            } => match key {
                "low_threshold" => *low_threshold = parse_value(key, raw)?,
                "high_threshold" => *high_threshold = parse_value(key, raw)?,
                _ => return Err(unknown_field(kind, key)),
            },
            OperationParams::ColorManipulation {
                hue_shift,
                saturation_factor,
                value_factor,
            } => match key {
                "hue_shift" => *hue_shift = parse_value(key, raw)?,
                "saturation_factor" => *saturation_factor = parse_value(key, raw)?,
                "value_factor" => *value_factor = parse_value(key, raw)?,
                _ => return Err(unknown_field(kind, key)),
            },
            OperationParams::Crop {
                x,
                y,
                width,
                height,
            } => match key {
                "x" => *x = parse_value(key, raw)?,
                "y" => *y = parse_value(key, raw)?,
                "width" => *width = parse_value(key, raw)?,
                "height" => *height = parse_value(key, raw)?,
                _ => return Err(unknown_field(kind, key)),
            },
            OperationParams::AddText {
                text,
                x,
                y,
                font_scale,
                color,
            } => match key {
                "text" => *text = raw.to_string(),
                "x" => *x = parse_value(key, raw)?,
                "y" => *y = parse_value(key, raw)?,
                "font_scale" => *font_scale = parse_value(key, raw)?,
                "color_r" => color[0] = parse_value(key, raw)?,
                "color_g" => color[1] = parse_value(key, raw)?,
                "color_b" => color[2] = parse_value(key, raw)?,
                _ => return Err(unknown_field(kind, key)),
            },
            OperationParams::Translate { tx, ty } => match key {
                "tx" => *tx = parse_value(key, raw)?,
                "ty" => *ty = parse_value(key, raw)?,
                _ => return Err(unknown_field(kind, key)),
            },
            OperationParams::Flip { flip_code } => match key {
                "flip_code" => *flip_code = raw.parse()?,
                _ => return Err(unknown_field(kind, key)),
            },
            OperationParams::Pyramid { levels } => match key {
                "levels" => *levels = parse_value(key, raw)?,
                _ => return Err(unknown_field(kind, key)),
            },
            OperationParams::Arithmetic { operation, value } => match key {
                "operation" => *operation = raw.parse()?,
                "value" => *value = parse_value(key, raw)?,
                _ => return Err(unknown_field(kind, key)),
            },
            OperationParams::Bitwise {
                operation,
                mask_type,
            } => match key {
                "operation" => *operation = raw.parse()?,
                "mask_type" => *mask_type = raw.parse()?,
                _ => return Err(unknown_field(kind, key)),
            },
            OperationParams::Sharpen { strength } => match key {
                "strength" => *strength = parse_value(key, raw)?,
                _ => return Err(unknown_field(kind, key)),
            },
            OperationParams::Denoise { method, h } => match key {
                "method" => *method = raw.parse()?,
                "h" => *h = parse_value(key, raw)?,
                _ => return Err(unknown_field(kind, key)),
            },
            OperationParams::AdaptiveThreshold {
                max_value,
                adaptive_method,
                threshold_type,
                block_size,
                c,
            } => match key {
                "max_value" => *max_value = parse_value(key, raw)?,
                "adaptive_method" => *adaptive_method = raw.parse()?,
                "threshold_type" => *threshold_type = raw.parse()?,
                "block_size" => *block_size = parse_value(key, raw)?,
                "c" => *c = parse_value(key, raw)?,
                _ => return Err(unknown_field(kind, key)),
            },
            OperationParams::Morphology {
                kernel_size,
                iterations,
            } => match key {
                "kernel_size" => *kernel_size = parse_value(key, raw)?,
                "iterations" => *iterations = parse_value(key, raw)?,
                _ => return Err(unknown_field(kind, key)),
            },
            OperationParams::None => return Err(unknown_field(kind, key)),
        }
        Ok(())
    }

    /// 서버 전송용 form 필드 (키는 서버 표기 그대로)
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        match self {
            OperationParams::None => Vec::new(),
            OperationParams::Rotate { angle, scale } => {
                vec![("angle", angle.to_string()), ("scale", scale.to_string())]
            }
            OperationParams::Blur {
                blur_type,
                kernel_size,
            } => vec![
                ("blur_type", blur_type.to_string()),
                ("kernel_size", kernel_size.to_string()),
            ],
            OperationParams::Threshold {
                threshold_value,
                max_value,
                threshold_type,
            } => vec![
                ("threshold_value", threshold_value.to_string()),
                ("threshold_type", threshold_type.to_string()),
                ("max_value", max_value.to_string()),
            ],
            OperationParams::Resize {
                scale_factor,
                interpolation,
            } => vec![
                ("scale_factor", scale_factor.to_string()),
                ("interpolation", interpolation.to_string()),
            ],
            OperationParams::EdgeDetection {
                low_threshold,
                high_threshold,
            } => vec![
                ("low_threshold", low_threshold.to_string()),
                ("high_threshold", high_threshold.to_string()),
            ],
            OperationParams::ColorManipulation {
                hue_shift,
                saturation_factor,
                value_factor,
            } => vec![
                ("hue_shift", hue_shift.to_string()),
                ("saturation_factor", saturation_factor.to_string()),
                ("value_factor", value_factor.to_string()),
            ],
            OperationParams::Crop {
                x,
                y,
                width,
                height,
            } => vec![
                ("x", x.to_string()),
                ("y", y.to_string()),
                ("width", width.to_string()),
                ("height", height.to_string()),
            ],
            OperationParams::AddText {
                text,
                x,
                y,
                font_scale,
                color,
            } => vec![
                ("text", text.clone()),
                ("x", x.to_string()),
                ("y", y.to_string()),
                ("font_scale", font_scale.to_string()),
                ("color_r", color[0].to_string()),
                ("color_g", color[1].to_string()),
                ("color_b", color[2].to_string()),
            ],
            OperationParams::Translate { tx, ty } => {
                vec![("tx", tx.to_string()), ("ty", ty.to_string())]
            }
            OperationParams::Flip { flip_code } => {
                vec![("flip_code", flip_code.code().to_string())]
            }
            OperationParams::Pyramid { levels } => vec![("levels", levels.to_string())],
            OperationParams::Arithmetic { operation, value } => vec![
                ("operation", operation.to_string()),
                ("value", value.to_string()),
            ],
            OperationParams::Bitwise {
                operation,
                mask_type,
            } => vec![
                ("operation", operation.to_string()),
                ("mask_type", mask_type.to_string()),
            ],
            OperationParams::Sharpen { strength } => vec![("strength", strength.to_string())],
            OperationParams::Denoise { method, h } => {
                vec![("method", method.to_string()), ("h", h.to_string())]
            }
            OperationParams::AdaptiveThreshold {
                max_value,
                adaptive_method,
                threshold_type,
                block_size,
                c,
            } => vec![
                ("max_value", max_value.to_string()),
                ("adaptive_method", adaptive_method.to_string()),
                ("threshold_type", threshold_type.to_string()),
                ("block_size", block_size.to_string()),
                ("c", c.to_string()),
            ],
            OperationParams::Morphology {
                kernel_size,
                iterations,
            } => vec![
                ("kernel_size", kernel_size.to_string()),
                ("iterations", iterations.to_string()),
            ],
        }
    }
}

fn unknown_field(kind: OperationKind, key: &str) -> CoreError {
    CoreError::validation(key, format!("{} 연산에 없는 파라미터입니다", kind.id()))
}
