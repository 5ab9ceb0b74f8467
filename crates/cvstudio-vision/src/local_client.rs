//! 오프라인 데모용 로컬 연산 클라이언트.
//!
//! 처리 서버에 연결할 수 없을 때 `image`/`imageproc`로 일부 연산을 직접 수행한다.
//! 지원하지 않는 연산은 `TransportUnavailable`로 실패한다.

use async_trait::async_trait;
use cvstudio_core::error::CoreError;
use cvstudio_core::models::dispatch::DispatchResult;
use cvstudio_core::models::image::ImageBytes;
use cvstudio_core::models::operation::OperationKind;
use cvstudio_core::models::params::{BlurType, FlipCode, Interpolation, OperationParams, ThresholdType};
use cvstudio_core::ports::operation_client::{OperationClient, ServiceHealth};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use imageproc::geometric_transformations::{self, rotate_about_center};
use tracing::debug;

use crate::codec::{decode_image, encode_png};
use crate::composite::{CompositeRenderer, DimensionReport, PixelGrid, RgbChannelSet};

/// 로컬에서 수행 가능한 연산
const SUPPORTED: &[OperationKind] = &[
    OperationKind::Grayscale,
    OperationKind::Flip,
    OperationKind::Rotate,
    OperationKind::Resize,
    OperationKind::Blur,
    OperationKind::Crop,
    OperationKind::Translate,
    OperationKind::Threshold,
    OperationKind::EdgeDetection,
    OperationKind::Dimensions,
    OperationKind::CompareDimensions,
    OperationKind::RgbChannels,
];

/// `image`/`imageproc` 기반 로컬 연산 클라이언트
#[derive(Debug, Clone, Default)]
pub struct LocalOperationClient {
    renderer: CompositeRenderer,
}

impl LocalOperationClient {
    pub fn new(renderer: CompositeRenderer) -> Self {
        Self { renderer }
    }

    /// 오프라인에서 실행 가능한 연산인지
    pub fn supports(kind: OperationKind) -> bool {
        SUPPORTED.contains(&kind)
    }
}

#[async_trait]
impl OperationClient for LocalOperationClient {
    async fn invoke(
        &self,
        image: &[u8],
        kind: OperationKind,
        params: &OperationParams,
    ) -> DispatchResult {
        if !Self::supports(kind) {
            return Err(CoreError::TransportUnavailable(format!(
                "{kind}: 오프라인 모드에서 지원하지 않는 연산"
            )));
        }
        params.validate(kind)?;

        let input = image.to_vec();
        let params = params.clone();
        let renderer = self.renderer;
        let output = tokio::task::spawn_blocking(move || apply(&renderer, &input, kind, &params))
            .await
            .map_err(|e| CoreError::Internal(format!("로컬 연산 태스크 실패: {e}")))??;

        debug!("로컬 연산 완료: {kind} → {} bytes", output.len());
        Ok(ImageBytes::from(output))
    }

    async fn health(&self) -> Result<ServiceHealth, CoreError> {
        Ok(ServiceHealth {
            status: "offline".to_string(),
            version: "local-demo".to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

fn apply(
    renderer: &CompositeRenderer,
    bytes: &[u8],
    kind: OperationKind,
    params: &OperationParams,
) -> Result<Vec<u8>, CoreError> {
    let image = decode_image(bytes)?;

    let output = match (kind, params) {
        (OperationKind::Dimensions, _) => {
            return renderer.render_dimension_report(&DimensionReport::measure(&image));
        }
        (OperationKind::CompareDimensions, _) => {
            return renderer.render_pixel_grid(&PixelGrid::sample(&image));
        }
        (OperationKind::RgbChannels, _) => {
            return renderer.render_rgb_channels(&RgbChannelSet::split(&image));
        }
        (OperationKind::Grayscale, _) => gray_to_rgb(image.to_luma8()),
        (OperationKind::Flip, OperationParams::Flip { flip_code }) => match flip_code {
            FlipCode::Vertical => image.flipv().to_rgb8(),
            FlipCode::Horizontal => image.fliph().to_rgb8(),
            FlipCode::Both => image.flipv().fliph().to_rgb8(),
        },
        (OperationKind::Rotate, OperationParams::Rotate { angle, scale }) => {
            rotate(&image.to_rgb8(), *angle, *scale)
        }
        (
            OperationKind::Resize,
            OperationParams::Resize {
                scale_factor,
                interpolation,
            },
        ) => {
            let width = scaled(image.width(), *scale_factor);
            let height = scaled(image.height(), *scale_factor);
            imageops::resize(&image.to_rgb8(), width, height, filter_for(*interpolation))
        }
        (
            OperationKind::Blur,
            OperationParams::Blur {
                blur_type,
                kernel_size,
            },
        ) => blur(&image.to_rgb8(), *blur_type, *kernel_size)?,
        (
            OperationKind::Crop,
            OperationParams::Crop {
                x,
                y,
                width,
                height,
            },
        ) => crop(&image.to_rgb8(), *x, *y, *width, *height)?,
        (OperationKind::Translate, OperationParams::Translate { tx, ty }) => {
            geometric_transformations::translate(&image.to_rgb8(), (*tx, *ty))
        }
        (
            OperationKind::Threshold,
            OperationParams::Threshold {
                threshold_value,
                max_value,
                threshold_type,
            },
        ) => {
            let mut gray = image.to_luma8();
            for pixel in gray.pixels_mut() {
                pixel[0] = threshold(pixel[0], *threshold_value, *max_value, *threshold_type);
            }
            gray_to_rgb(gray)
        }
        (
            OperationKind::EdgeDetection,
            OperationParams::EdgeDetection {
                low_threshold,
                high_threshold,
            },
        ) => {
            let high = f32::from(*high_threshold).max(1.0);
            let low = f32::from(*low_threshold).max(1.0).min(high);
            gray_to_rgb(imageproc::edges::canny(&image.to_luma8(), low, high))
        }
        (kind, _) => {
            return Err(CoreError::Internal(format!(
                "{kind}: 파라미터 형태가 연산과 맞지 않음"
            )))
        }
    };

    encode_png(&DynamicImage::ImageRgb8(output))
}

fn gray_to_rgb(gray: GrayImage) -> RgbImage {
    DynamicImage::ImageLuma8(gray).to_rgb8()
}

fn scaled(size: u32, factor: f32) -> u32 {
    ((size as f32 * factor).round() as u32).max(1)
}

fn filter_for(interpolation: Interpolation) -> FilterType {
    match interpolation {
        Interpolation::Nearest => FilterType::Nearest,
        Interpolation::Linear => FilterType::Triangle,
        Interpolation::Cubic => FilterType::CatmullRom,
        Interpolation::Lanczos => FilterType::Lanczos3,
    }
}

/// 중심 기준 회전 (양수 = 반시계) 후 배율 적용, 캔버스 크기는 유지
fn rotate(image: &RgbImage, angle: i32, scale: f32) -> RgbImage {
    let theta = -(angle as f32).to_radians();
    let rotated = rotate_about_center(
        image,
        theta,
        geometric_transformations::Interpolation::Bilinear,
        Rgb([0, 0, 0]),
    );
    if (scale - 1.0).abs() < f32::EPSILON {
        return rotated;
    }

    let (width, height) = image.dimensions();
    let resized = imageops::resize(
        &rotated,
        scaled(width, scale),
        scaled(height, scale),
        FilterType::Triangle,
    );
    let mut canvas = RgbImage::new(width, height);
    let x = (i64::from(width) - i64::from(resized.width())) / 2;
    let y = (i64::from(height) - i64::from(resized.height())) / 2;
    imageops::overlay(&mut canvas, &resized, x, y);
    canvas
}

/// 채널별 가우시안 / median 블러
fn blur(image: &RgbImage, blur_type: BlurType, kernel_size: u32) -> Result<RgbImage, CoreError> {
    match blur_type {
        BlurType::Gaussian => {
            // 커널 크기에서 sigma 유도 (OpenCV getGaussianKernel 규칙)
            let sigma = 0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
            Ok(per_channel(image, |channel| {
                imageproc::filter::gaussian_blur_f32(channel, sigma.max(0.1))
            }))
        }
        BlurType::Median => {
            let radius = kernel_size / 2;
            Ok(per_channel(image, |channel| {
                imageproc::filter::median_filter(channel, radius, radius)
            }))
        }
        BlurType::Motion | BlurType::Bilateral => Err(CoreError::TransportUnavailable(format!(
            "blur({blur_type}): 오프라인 모드에서 지원하지 않는 블러 종류"
        ))),
    }
}

fn per_channel<F>(image: &RgbImage, filter: F) -> RgbImage
where
    F: Fn(&GrayImage) -> GrayImage,
{
    let (width, height) = image.dimensions();
    let channels: [GrayImage; 3] = std::array::from_fn(|c| {
        GrayImage::from_fn(width, height, |x, y| Luma([image.get_pixel(x, y)[c]]))
    });
    let filtered = channels.map(|channel| filter(&channel));

    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            filtered[0].get_pixel(x, y)[0],
            filtered[1].get_pixel(x, y)[0],
            filtered[2].get_pixel(x, y)[0],
        ])
    })
}

/// 영역을 이미지 경계로 잘라낸 뒤 crop
fn crop(image: &RgbImage, x: u32, y: u32, width: u32, height: u32) -> Result<RgbImage, CoreError> {
    let (img_width, img_height) = image.dimensions();
    let x = x.min(img_width);
    let y = y.min(img_height);
    let width = width.min(img_width - x);
    let height = height.min(img_height - y);

    if width == 0 || height == 0 {
        return Err(CoreError::Image(format!(
            "crop 영역이 이미지({img_width}x{img_height}) 밖에 있습니다"
        )));
    }
    Ok(imageops::crop_imm(image, x, y, width, height).to_image())
}

fn threshold(value: u8, thresh: u8, max_value: u8, kind: ThresholdType) -> u8 {
    let above = value > thresh;
    match kind {
        ThresholdType::Binary => {
            if above {
                max_value
            } else {
                0
            }
        }
        ThresholdType::BinaryInv => {
            if above {
                0
            } else {
                max_value
            }
        }
        ThresholdType::Trunc => value.min(thresh),
        ThresholdType::ToZero => {
            if above {
                value
            } else {
                0
            }
        }
        ThresholdType::ToZeroInv => {
            if above {
                0
            } else {
                value
            }
        }
    }
}
