//! 분석 결과 composite 렌더링.
//!
//! 처리 서버의 구조화된 분석 응답(크기 리포트, 픽셀 그리드, RGB/HSV 채널)을
//! 고정 크기 캔버스 한 장으로 그려 PNG로 인코딩한다.
//! 같은 입력과 캔버스 크기에 대해 항상 같은 픽셀을 만든다.

use cvstudio_core::config::CompositeConfig;
use cvstudio_core::error::CoreError;
use image::imageops::{self, FilterType};
use image::{ColorType, DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use tracing::debug;

use crate::codec::encode_png;
use crate::glyph::{draw_text, text_height, text_width};

// ============================================================
// 팔레트
// ============================================================

/// 캔버스 배경
pub const BACKGROUND: Rgb<u8> = Rgb([24, 24, 27]);
/// 막대/박스 바탕
pub const PANEL: Rgb<u8> = Rgb([52, 52, 56]);
pub const KEY_RED: Rgb<u8> = Rgb([220, 53, 69]);
pub const KEY_GREEN: Rgb<u8> = Rgb([40, 167, 69]);
pub const KEY_BLUE: Rgb<u8> = Rgb([13, 110, 253]);
pub const KEY_HUE: Rgb<u8> = Rgb([255, 193, 7]);
pub const KEY_SATURATION: Rgb<u8> = Rgb([111, 66, 193]);
pub const KEY_VALUE: Rgb<u8> = Rgb([173, 181, 189]);
pub const KEY_NEUTRAL: Rgb<u8> = Rgb([248, 249, 250]);

const MARGIN: u32 = 16;
const HEADER_HEIGHT: u32 = 28;
const BAR_HEIGHT: u32 = 16;
const GAP: u32 = 8;

/// 픽셀 그리드 최대 크기 (행 × 열)
pub const GRID_MAX_ROWS: usize = 15;
pub const GRID_MAX_COLS: usize = 20;

// ============================================================
// 분석 결과 모델
// ============================================================

/// `dimensions` 응답
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionReport {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub total_pixels: u64,
    pub data_type: String,
}

impl DimensionReport {
    /// 디코딩된 이미지에서 직접 측정
    pub fn measure(image: &DynamicImage) -> Self {
        let data_type = match image.color() {
            ColorType::L16 | ColorType::La16 | ColorType::Rgb16 | ColorType::Rgba16 => "uint16",
            ColorType::Rgb32F | ColorType::Rgba32F => "float32",
            _ => "uint8",
        };
        Self {
            width: image.width(),
            height: image.height(),
            channels: u32::from(image.color().channel_count()),
            total_pixels: u64::from(image.width()) * u64::from(image.height()),
            data_type: data_type.to_string(),
        }
    }
}

/// `compare-dimensions` 응답: grayscale 샘플 그리드
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelGrid {
    pub values: Vec<Vec<u8>>,
    pub width: u32,
    pub height: u32,
    pub channels: u32,
}

impl PixelGrid {
    /// grayscale 변환 후 최대 15×20 격자로 균등 샘플링
    pub fn sample(image: &DynamicImage) -> Self {
        let gray = image.to_luma8();
        let (width, height) = gray.dimensions();
        let h_step = (height as usize / GRID_MAX_ROWS).max(1);
        let w_step = (width as usize / GRID_MAX_COLS).max(1);

        let values = (0..height as usize)
            .step_by(h_step)
            .take(GRID_MAX_ROWS)
            .map(|y| {
                (0..width as usize)
                    .step_by(w_step)
                    .take(GRID_MAX_COLS)
                    .map(|x| gray.get_pixel(x as u32, y as u32)[0])
                    .collect()
            })
            .collect();

        Self {
            values,
            width,
            height,
            channels: 1,
        }
    }

    fn columns(&self) -> usize {
        self.values.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// `rgb-channels` 응답
#[derive(Debug, Clone)]
pub struct RgbChannelSet {
    pub red: DynamicImage,
    pub green: DynamicImage,
    pub blue: DynamicImage,
    /// 채널별 평균 (R, G, B 순서, 소수 둘째 자리 반올림)
    pub means: [f32; 3],
}

impl RgbChannelSet {
    /// 다른 두 채널을 0으로 만든 채널 이미지와 평균 강도 계산
    pub fn split(image: &DynamicImage) -> Self {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        let mut planes = [
            RgbImage::new(width, height),
            RgbImage::new(width, height),
            RgbImage::new(width, height),
        ];
        let mut sums = [0u64; 3];

        for (x, y, pixel) in rgb.enumerate_pixels() {
            for (channel, plane) in planes.iter_mut().enumerate() {
                let mut isolated = [0u8; 3];
                isolated[channel] = pixel[channel];
                plane.put_pixel(x, y, Rgb(isolated));
                sums[channel] += u64::from(pixel[channel]);
            }
        }

        let count = (u64::from(width) * u64::from(height)).max(1) as f64;
        let means = sums.map(|sum| ((sum as f64 / count) * 100.0).round() as f32 / 100.0);
        let [red, green, blue] = planes;

        Self {
            red: DynamicImage::ImageRgb8(red),
            green: DynamicImage::ImageRgb8(green),
            blue: DynamicImage::ImageRgb8(blue),
            means,
        }
    }
}

/// `hsv-convert` 응답
#[derive(Debug, Clone)]
pub struct HsvChannelSet {
    pub hsv: DynamicImage,
    pub hue: DynamicImage,
    pub saturation: DynamicImage,
    pub value: DynamicImage,
}

// ============================================================
// 렌더러
// ============================================================

/// 고정 캔버스 composite 렌더러
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositeRenderer {
    width: u32,
    height: u32,
}

impl Default for CompositeRenderer {
    fn default() -> Self {
        Self::new(CompositeConfig::default())
    }
}

impl CompositeRenderer {
    pub fn new(config: CompositeConfig) -> Self {
        Self {
            width: config.width.max(1),
            height: config.height.max(1),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn render_dimension_report(&self, report: &DimensionReport) -> Result<Vec<u8>, CoreError> {
        self.encode("dimensions", self.draw_dimension_report(report))
    }

    pub fn render_pixel_grid(&self, grid: &PixelGrid) -> Result<Vec<u8>, CoreError> {
        self.encode("compare-dimensions", self.draw_pixel_grid(grid))
    }

    pub fn render_rgb_channels(&self, set: &RgbChannelSet) -> Result<Vec<u8>, CoreError> {
        self.encode("rgb-channels", self.draw_rgb_channels(set))
    }

    pub fn render_hsv_channels(&self, set: &HsvChannelSet) -> Result<Vec<u8>, CoreError> {
        self.encode("hsv-convert", self.draw_hsv_channels(set))
    }

    fn encode(&self, kind: &str, canvas: RgbImage) -> Result<Vec<u8>, CoreError> {
        debug!("composite 렌더링: {kind} ({}x{})", self.width, self.height);
        encode_png(&DynamicImage::ImageRgb8(canvas))
    }

    fn blank(&self) -> RgbImage {
        RgbImage::from_pixel(self.width, self.height, BACKGROUND)
    }

    fn draw_dimension_report(&self, report: &DimensionReport) -> RgbImage {
        let mut canvas = self.blank();
        let scale = 4;
        let row_height = text_height(scale) + 2 * GAP;

        draw_text(
            &mut canvas,
            MARGIN as i32,
            MARGIN as i32,
            "DIMENSIONS",
            3,
            KEY_NEUTRAL,
        );

        let rows = [
            ("W", report.width.to_string(), KEY_RED),
            ("H", report.height.to_string(), KEY_GREEN),
            ("C", report.channels.to_string(), KEY_BLUE),
            ("PX", report.total_pixels.to_string(), KEY_HUE),
            ("TYPE", report.data_type.clone(), KEY_SATURATION),
        ];
        let label_width = text_width("TYPE", scale) + 2 * GAP;
        let top = MARGIN + HEADER_HEIGHT + GAP;

        for (index, (label, value, key)) in rows.iter().enumerate() {
            let y = (top + index as u32 * row_height) as i32;
            draw_text(&mut canvas, MARGIN as i32, y, label, scale, *key);
            draw_text(
                &mut canvas,
                (MARGIN + label_width) as i32,
                y,
                value,
                scale,
                KEY_NEUTRAL,
            );
        }

        // 오른쪽 절반: 종횡비 박스
        let area_x = self.width / 2;
        let area = Area {
            x: area_x,
            y: top,
            width: self.width.saturating_sub(area_x + MARGIN),
            height: self.height.saturating_sub(top + MARGIN),
        };
        if let Some(rect) = area.fit(report.width, report.height) {
            draw_filled_rect_mut(&mut canvas, rect, PANEL);
            draw_hollow_rect_mut(&mut canvas, rect, KEY_BLUE);
        }

        canvas
    }

    fn draw_pixel_grid(&self, grid: &PixelGrid) -> RgbImage {
        let mut canvas = self.blank();
        let header = format!("GRAY {}X{}", grid.width, grid.height);
        draw_text(&mut canvas, MARGIN as i32, MARGIN as i32, &header, 3, KEY_NEUTRAL);

        let rows = grid.values.len().min(GRID_MAX_ROWS) as u32;
        let cols = grid.columns().min(GRID_MAX_COLS) as u32;
        if rows == 0 || cols == 0 {
            return canvas;
        }

        let top = MARGIN + HEADER_HEIGHT + GAP;
        let avail_w = self.width.saturating_sub(2 * MARGIN);
        let avail_h = self.height.saturating_sub(top + MARGIN);
        let cell = (avail_w / cols).min(avail_h / rows);
        if cell == 0 {
            return canvas;
        }
        let text_scale = (cell.saturating_sub(4) / text_width("000", 1)).clamp(1, 3);

        for (row, values) in grid.values.iter().take(GRID_MAX_ROWS).enumerate() {
            for (col, value) in values.iter().take(GRID_MAX_COLS).enumerate() {
                let x = MARGIN + col as u32 * cell;
                let y = top + row as u32 * cell;
                // 1px 간격을 두고 채움
                let size = cell.saturating_sub(1).max(1);
                draw_filled_rect_mut(
                    &mut canvas,
                    Rect::at(x as i32, y as i32).of_size(size, size),
                    Rgb([*value, *value, *value]),
                );

                let label = value.to_string();
                let ink = if *value >= 128 {
                    Rgb([0, 0, 0])
                } else {
                    Rgb([255, 255, 255])
                };
                let tx = x + size.saturating_sub(text_width(&label, text_scale)) / 2;
                let ty = y + size.saturating_sub(text_height(text_scale)) / 2;
                draw_text(&mut canvas, tx as i32, ty as i32, &label, text_scale, ink);
            }
        }

        canvas
    }

    fn draw_rgb_channels(&self, set: &RgbChannelSet) -> RgbImage {
        let mut canvas = self.blank();
        let panel_width = self.width.saturating_sub(4 * MARGIN) / 3;
        let label_scale = 2;
        let bar_y = self
            .height
            .saturating_sub(MARGIN + text_height(label_scale) + 6 + BAR_HEIGHT);
        let image_top = MARGIN + HEADER_HEIGHT + GAP;

        let panels = [
            ("R", &set.red, KEY_RED, set.means[0]),
            ("G", &set.green, KEY_GREEN, set.means[1]),
            ("B", &set.blue, KEY_BLUE, set.means[2]),
        ];

        for (index, (label, image, key, mean)) in panels.into_iter().enumerate() {
            let x = MARGIN + index as u32 * (panel_width + MARGIN);
            let panel = Area {
                x,
                y: MARGIN,
                width: panel_width,
                height: HEADER_HEIGHT,
            };
            draw_header(&mut canvas, panel, label, key);

            let image_area = Area {
                x,
                y: image_top,
                width: panel_width,
                height: bar_y.saturating_sub(GAP + image_top),
            };
            paste_fitted(&mut canvas, image, image_area);

            if panel_width > 0 {
                draw_filled_rect_mut(
                    &mut canvas,
                    Rect::at(x as i32, bar_y as i32).of_size(panel_width, BAR_HEIGHT),
                    PANEL,
                );
                let filled = ((mean.clamp(0.0, 255.0) / 255.0) * panel_width as f32).round() as u32;
                if filled > 0 {
                    draw_filled_rect_mut(
                        &mut canvas,
                        Rect::at(x as i32, bar_y as i32).of_size(filled, BAR_HEIGHT),
                        key,
                    );
                }
            }
            draw_text(
                &mut canvas,
                x as i32,
                (bar_y + BAR_HEIGHT + 6) as i32,
                &format!("{mean:.2}"),
                label_scale,
                KEY_NEUTRAL,
            );
        }

        canvas
    }

    fn draw_hsv_channels(&self, set: &HsvChannelSet) -> RgbImage {
        let mut canvas = self.blank();
        let cell_width = self.width.saturating_sub(3 * MARGIN) / 2;
        let cell_height = self.height.saturating_sub(3 * MARGIN) / 2;

        let cells = [
            ("HSV", &set.hsv, KEY_NEUTRAL),
            ("H", &set.hue, KEY_HUE),
            ("S", &set.saturation, KEY_SATURATION),
            ("V", &set.value, KEY_VALUE),
        ];

        for (index, (label, image, key)) in cells.into_iter().enumerate() {
            let col = index as u32 % 2;
            let row = index as u32 / 2;
            let x = MARGIN + col * (cell_width + MARGIN);
            let y = MARGIN + row * (cell_height + MARGIN);

            draw_header(
                &mut canvas,
                Area {
                    x,
                    y,
                    width: cell_width,
                    height: HEADER_HEIGHT.min(cell_height),
                },
                label,
                key,
            );
            paste_fitted(
                &mut canvas,
                image,
                Area {
                    x,
                    y: y + HEADER_HEIGHT + GAP,
                    width: cell_width,
                    height: cell_height.saturating_sub(HEADER_HEIGHT + GAP),
                },
            );
        }

        canvas
    }
}

// ============================================================
// 그리기 헬퍼
// ============================================================

#[derive(Debug, Clone, Copy)]
struct Area {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl Area {
    /// 종횡비를 유지하며 영역 안에 가운데 정렬한 사각형
    fn fit(&self, width: u32, height: u32) -> Option<Rect> {
        let (w, h) = fit_size(width, height, self.width, self.height)?;
        let x = self.x + (self.width - w) / 2;
        let y = self.y + (self.height - h) / 2;
        Some(Rect::at(x as i32, y as i32).of_size(w, h))
    }
}

fn fit_size(width: u32, height: u32, max_width: u32, max_height: u32) -> Option<(u32, u32)> {
    if width == 0 || height == 0 || max_width == 0 || max_height == 0 {
        return None;
    }
    let ratio = (max_width as f64 / width as f64).min(max_height as f64 / height as f64);
    let w = ((width as f64 * ratio).round() as u32).clamp(1, max_width);
    let h = ((height as f64 * ratio).round() as u32).clamp(1, max_height);
    Some((w, h))
}

/// 밝은 키 색상 위에는 어두운 글자
fn ink_for(key: Rgb<u8>) -> Rgb<u8> {
    let [r, g, b] = key.0;
    let luma = 0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b);
    if luma >= 128.0 {
        BACKGROUND
    } else {
        KEY_NEUTRAL
    }
}

fn draw_header(canvas: &mut RgbImage, area: Area, label: &str, key: Rgb<u8>) {
    if area.width == 0 || area.height == 0 {
        return;
    }
    draw_filled_rect_mut(
        canvas,
        Rect::at(area.x as i32, area.y as i32).of_size(area.width, area.height),
        key,
    );
    let scale = 3;
    let ty = area.y + area.height.saturating_sub(text_height(scale)) / 2;
    draw_text(canvas, (area.x + GAP) as i32, ty as i32, label, scale, ink_for(key));
}

fn paste_fitted(canvas: &mut RgbImage, image: &DynamicImage, area: Area) {
    let Some((w, h)) = fit_size(image.width(), image.height(), area.width, area.height) else {
        return;
    };
    let resized = imageops::resize(&image.to_rgb8(), w, h, FilterType::Triangle);
    let x = area.x + (area.width - w) / 2;
    let y = area.y + (area.height - h) / 2;
    imageops::overlay(canvas, &resized, i64::from(x), i64::from(y));
}
