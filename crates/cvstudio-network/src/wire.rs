//! 처리 서버 응답 페이로드.
//!
//! 응답 형태(`ResponseShape`)별 JSON 본문과 에러 본문(`{"detail": ...}`)을 정의하고,
//! 분석 응답을 `cvstudio-vision` composite 모델로 변환한다.

use cvstudio_core::error::CoreError;
use cvstudio_vision::codec::{decode_base64, decode_image};
use cvstudio_vision::composite::{DimensionReport, HsvChannelSet, PixelGrid, RgbChannelSet};
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// 이미지 결과 응답 (`processed_image` 외 필드는 무시)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedImageResponse {
    pub processed_image: String,
}

impl ProcessedImageResponse {
    pub fn into_bytes(self) -> Result<Vec<u8>, CoreError> {
        decode_base64("processed_image", &self.processed_image)
    }
}

/// `dimensions` 응답
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionResponse {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub total_pixels: u64,
    pub data_type: String,
}

impl From<DimensionResponse> for DimensionReport {
    fn from(resp: DimensionResponse) -> Self {
        Self {
            width: resp.width,
            height: resp.height,
            channels: resp.channels,
            total_pixels: resp.total_pixels,
            data_type: resp.data_type,
        }
    }
}

/// `compare-dimensions` 응답
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PixelGridResponse {
    pub pixel_values: Vec<Vec<u8>>,
    pub dimensions: GridDimensions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridDimensions {
    pub height: u32,
    pub width: u32,
    #[serde(default = "default_channels")]
    pub channels: u32,
}

fn default_channels() -> u32 {
    1
}

impl From<PixelGridResponse> for PixelGrid {
    fn from(resp: PixelGridResponse) -> Self {
        Self {
            values: resp.pixel_values,
            width: resp.dimensions.width,
            height: resp.dimensions.height,
            channels: resp.dimensions.channels,
        }
    }
}

/// `rgb-channels` 응답
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RgbChannelsResponse {
    pub channels: ChannelImages,
    pub channel_intensities: ChannelIntensities,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelImages {
    pub red: String,
    pub green: String,
    pub blue: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelIntensities {
    pub red_mean: f32,
    pub green_mean: f32,
    pub blue_mean: f32,
}

impl RgbChannelsResponse {
    pub fn decode(self) -> Result<RgbChannelSet, CoreError> {
        Ok(RgbChannelSet {
            red: decode_field("channels.red", &self.channels.red)?,
            green: decode_field("channels.green", &self.channels.green)?,
            blue: decode_field("channels.blue", &self.channels.blue)?,
            means: [
                self.channel_intensities.red_mean,
                self.channel_intensities.green_mean,
                self.channel_intensities.blue_mean,
            ],
        })
    }
}

/// `hsv-convert` 응답
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HsvResponse {
    pub hsv_image: String,
    pub hue_channel: String,
    pub saturation_channel: String,
    pub value_channel: String,
}

impl HsvResponse {
    pub fn decode(self) -> Result<HsvChannelSet, CoreError> {
        Ok(HsvChannelSet {
            hsv: decode_field("hsv_image", &self.hsv_image)?,
            hue: decode_field("hue_channel", &self.hue_channel)?,
            saturation: decode_field("saturation_channel", &self.saturation_channel)?,
            value: decode_field("value_channel", &self.value_channel)?,
        })
    }
}

/// 에러 응답 본문. FastAPI 검증 에러는 `detail`이 배열로 온다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: serde_json::Value,
}

impl ErrorResponse {
    /// 상세 메시지 문자열
    pub fn message(&self) -> String {
        match &self.detail {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// 에러 본문 해석, JSON이 아니면 원문 그대로
    pub fn detail_from_body(body: &str) -> String {
        serde_json::from_str::<ErrorResponse>(body)
            .map(|e| e.message())
            .unwrap_or_else(|_| body.trim().to_string())
    }
}

fn decode_field(field: &str, encoded: &str) -> Result<DynamicImage, CoreError> {
    decode_image(&decode_base64(field, encoded)?)
}
