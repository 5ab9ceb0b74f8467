//! 처리 결과 내보내기.
//!
//! 처리된 이미지는 `<stem>_processed.png`로, 배치 요약은 JSON 리포트로 저장한다.

use chrono::{DateTime, Utc};
use cvstudio_batch::registry::ImageRegistry;
use cvstudio_core::error::CoreError;
use cvstudio_core::models::dispatch::{BatchSummary, ImageFailure};
use cvstudio_core::models::image::LoadedImage;
use cvstudio_network::connectivity::ConnectivityStats;
use cvstudio_vision::codec::{decode_image, encode_png};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// 배치 리포트 (report.json)
#[derive(Debug, Serialize)]
pub struct BatchReport {
    pub generated_at: DateTime<Utc>,
    /// 사용한 처리 백엔드 ("http" / "local")
    pub backend: String,
    /// 배치 종료 시점의 연결 상태
    pub service: ConnectivityStats,
    pub chain_label: String,
    pub tally: Tally,
    pub elapsed_ms: u64,
    pub images: Vec<ImageRecord>,
    pub failures: Vec<ImageFailure>,
}

#[derive(Debug, Serialize)]
pub struct Tally {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// 이미지별 메타데이터
#[derive(Debug, Serialize)]
pub struct ImageRecord {
    pub name: String,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub byte_size: usize,
    pub is_processed: bool,
    pub last_operation_label: Option<String>,
    pub processing_time_ms: Option<u64>,
    /// 내보낸 파일 이름 (처리 결과가 없으면 None)
    pub output_file: Option<String>,
}

/// 내보내기 결과
#[derive(Debug)]
pub struct ExportOutcome {
    pub written: Vec<PathBuf>,
    pub report_path: PathBuf,
}

/// 처리된 이미지 파일 이름
pub fn processed_file_name(source_name: &str) -> String {
    let stem = Path::new(source_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("image");
    format!("{stem}_processed.png")
}

/// PNG가 아니면 재인코딩
fn as_png(bytes: &[u8]) -> Result<Vec<u8>, CoreError> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        return Ok(bytes.to_vec());
    }
    encode_png(&decode_image(bytes)?)
}

/// 파일 이름 충돌 시 `_2`, `_3` … 접미사
fn unique_name(taken: &mut Vec<String>, name: String) -> String {
    let mut candidate = name.clone();
    let mut n = 2;
    while taken.contains(&candidate) {
        let stem = name.trim_end_matches(".png");
        candidate = format!("{stem}_{n}.png");
        n += 1;
    }
    taken.push(candidate.clone());
    candidate
}

fn record(image: &LoadedImage, output_file: Option<String>) -> ImageRecord {
    ImageRecord {
        name: image.name.clone(),
        mime_type: image.mime_type.clone(),
        width: image.width,
        height: image.height,
        byte_size: image.byte_size,
        is_processed: image.is_processed,
        last_operation_label: image.last_operation_label.clone(),
        processing_time_ms: image.last_processing_time.map(|d| d.as_millis() as u64),
        output_file,
    }
}

/// 레지스트리의 처리 결과와 리포트를 `out_dir`에 기록
pub fn export(
    registry: &ImageRegistry,
    summary: &BatchSummary,
    backend: &str,
    service: ConnectivityStats,
    out_dir: &Path,
    report_file: &str,
) -> Result<ExportOutcome, CoreError> {
    fs::create_dir_all(out_dir)?;

    let mut written = Vec::new();
    let mut taken = Vec::new();
    let mut images = Vec::with_capacity(registry.len());

    for image in registry.iter() {
        let output_file = match &image.processed_data {
            Some(data) => {
                let name = unique_name(&mut taken, processed_file_name(&image.name));
                let path = out_dir.join(&name);
                fs::write(&path, as_png(data)?)?;
                debug!("내보내기: {} → {}", image.name, path.display());
                written.push(path);
                Some(name)
            }
            None => None,
        };
        images.push(record(image, output_file));
    }

    let report = BatchReport {
        generated_at: Utc::now(),
        backend: backend.to_string(),
        service,
        chain_label: summary.chain_label.clone(),
        tally: Tally {
            total: summary.total,
            succeeded: summary.succeeded,
            failed: summary.failed(),
            skipped: summary.skipped,
        },
        elapsed_ms: summary.elapsed.as_millis() as u64,
        images,
        failures: summary.failures.clone(),
    };

    let report_path = out_dir.join(report_file);
    fs::write(&report_path, serde_json::to_vec_pretty(&report)?)?;
    info!(
        "내보내기 완료: 이미지 {}개, 리포트 {}",
        written.len(),
        report_path.display()
    );

    Ok(ExportOutcome {
        written,
        report_path,
    })
}
