//! 이미지 바이트 코덱.
//!
//! 처리 서버와 주고받는 base64 문자열, data-URI 접두사 제거,
//! PNG 인코딩, 크기/포맷 probe를 담당한다.

use base64::{engine::general_purpose::STANDARD as B64, Engine};
use cvstudio_core::error::CoreError;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use tracing::debug;

/// 디코딩 없이 알아낸 이미지 정보
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageProbe {
    pub width: u32,
    pub height: u32,
    pub mime_type: String,
}

/// `data:image/png;base64,` 같은 접두사 제거
pub fn strip_data_uri(encoded: &str) -> &str {
    let trimmed = encoded.trim();
    if trimmed.starts_with("data:") {
        trimmed
            .split_once(',')
            .map(|(_, payload)| payload)
            .unwrap_or(trimmed)
    } else {
        trimmed
    }
}

/// 원시 바이트 → base64 (접두사 없음)
pub fn encode_base64(bytes: &[u8]) -> String {
    B64.encode(bytes)
}

/// base64 (data-URI 허용) → 원시 바이트
pub fn decode_base64(field: &str, encoded: &str) -> Result<Vec<u8>, CoreError> {
    B64.decode(strip_data_uri(encoded))
        .map_err(|e| CoreError::Image(format!("{field} base64 디코딩 실패: {e}")))
}

/// 인코딩된 바이트 디코딩
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, CoreError> {
    image::load_from_memory(bytes).map_err(|e| CoreError::Image(format!("이미지 디코딩 실패: {e}")))
}

/// PNG 인코딩
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, CoreError> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| CoreError::Image(format!("PNG 인코딩 실패: {e}")))?;
    let bytes = buffer.into_inner();
    debug!(
        "PNG 인코딩: {}x{} → {} bytes",
        image.width(),
        image.height(),
        bytes.len()
    );
    Ok(bytes)
}

/// 포맷 추측 + 헤더만 읽어 크기 확인
pub fn probe(bytes: &[u8]) -> Result<ImageProbe, CoreError> {
    let format = image::guess_format(bytes)
        .map_err(|e| CoreError::Image(format!("지원하지 않는 이미지 포맷: {e}")))?;
    let reader = image::ImageReader::with_format(Cursor::new(bytes), format);
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| CoreError::Image(format!("이미지 헤더 해석 실패: {e}")))?;

    Ok(ImageProbe {
        width,
        height,
        mime_type: format.to_mime_type().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn sample_png() -> Vec<u8> {
        let image = RgbImage::from_pixel(7, 3, Rgb([10, 20, 30]));
        encode_png(&DynamicImage::ImageRgb8(image)).unwrap()
    }

    #[test]
    fn strips_data_uri_prefix() {
        assert_eq!(strip_data_uri("data:image/png;base64,QUJD"), "QUJD");
        assert_eq!(strip_data_uri("  QUJD "), "QUJD");
    }

    #[test]
    fn base64_accepts_prefixed_input() {
        let encoded = format!("data:image/png;base64,{}", encode_base64(b"hello"));
        assert_eq!(decode_base64("image", &encoded).unwrap(), b"hello");
        assert!(decode_base64("image", "***").is_err());
    }

    #[test]
    fn probe_reads_dimensions_and_mime() {
        let probe = probe(&sample_png()).unwrap();
        assert_eq!(probe.width, 7);
        assert_eq!(probe.height, 3);
        assert_eq!(probe.mime_type, "image/png");
    }

    #[test]
    fn probe_rejects_garbage() {
        assert!(probe(b"not an image").is_err());
    }

    #[test]
    fn png_roundtrip_keeps_pixels() {
        let decoded = decode_image(&sample_png()).unwrap().to_rgb8();
        assert_eq!(decoded.get_pixel(6, 2), &Rgb([10, 20, 30]));
    }
}
