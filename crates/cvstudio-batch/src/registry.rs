//! 이미지 레지스트리.
//!
//! 로드된 이미지를 제출 순서대로 보관한다. 디스패처와 표시 계층은
//! `SharedRegistry` 하나를 통해서만 읽고 쓴다.

use cvstudio_core::error::CoreError;
use cvstudio_core::models::image::{ImageId, LoadedImage, SourceFile};
use cvstudio_vision::codec;
use futures::future::join_all;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 디스패처/표시 계층이 공유하는 레지스트리 핸들
pub type SharedRegistry = Arc<RwLock<ImageRegistry>>;

/// 로드 결과
#[derive(Debug, Default)]
pub struct LoadReport {
    /// 새 레지스트리에 들어간 이미지 (제출 순서)
    pub loaded: Vec<ImageId>,
    /// 파일별 `DecodeFailure`
    pub failures: Vec<CoreError>,
}

/// 제출 순서를 유지하는 이미지 목록
#[derive(Debug, Default)]
pub struct ImageRegistry {
    images: Vec<LoadedImage>,
}

impl ImageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 공유 핸들로 감싼 빈 레지스트리
    pub fn shared() -> SharedRegistry {
        Arc::new(RwLock::new(Self::new()))
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LoadedImage> {
        self.images.iter()
    }

    pub fn get(&self, id: ImageId) -> Option<&LoadedImage> {
        self.images.iter().find(|image| image.id == id)
    }

    pub fn get_mut(&mut self, id: ImageId) -> Option<&mut LoadedImage> {
        self.images.iter_mut().find(|image| image.id == id)
    }

    /// 전체 내용을 한 번에 교체
    pub fn replace_all(&mut self, images: Vec<LoadedImage>) {
        self.images = images;
    }

    /// 선택 토글, 토글 후 선택 상태 반환
    pub fn toggle_selection(&mut self, id: ImageId) -> Result<bool, CoreError> {
        let image = self.get_mut(id).ok_or_else(|| not_found(id))?;
        image.selected = !image.selected;
        Ok(image.selected)
    }

    /// 선택 상태 지정 (여러 번 호출해도 결과 동일)
    pub fn set_selected(&mut self, id: ImageId, selected: bool) -> Result<(), CoreError> {
        let image = self.get_mut(id).ok_or_else(|| not_found(id))?;
        image.selected = selected;
        Ok(())
    }

    pub fn select_all(&mut self) {
        for image in &mut self.images {
            image.selected = true;
        }
    }

    pub fn clear_selection(&mut self) {
        for image in &mut self.images {
            image.selected = false;
        }
    }

    /// 선택된 이미지 ID (레지스트리 순서)
    pub fn selected_ids(&self) -> Vec<ImageId> {
        self.images
            .iter()
            .filter(|image| image.selected)
            .map(|image| image.id)
            .collect()
    }

    pub fn ids(&self) -> Vec<ImageId> {
        self.images.iter().map(|image| image.id).collect()
    }

    pub fn remove(&mut self, id: ImageId) -> Result<LoadedImage, CoreError> {
        let index = self
            .images
            .iter()
            .position(|image| image.id == id)
            .ok_or_else(|| not_found(id))?;
        Ok(self.images.remove(index))
    }

    pub fn clear(&mut self) {
        self.images.clear();
    }
}

fn not_found(id: ImageId) -> CoreError {
    CoreError::NotFound {
        resource_type: "Image".to_string(),
        id: id.to_string(),
    }
}

/// 파일 하나 디코딩 (포맷 추측 + 크기 probe)
fn decode_file(file: SourceFile) -> Result<LoadedImage, CoreError> {
    let probe = codec::probe(&file.bytes).map_err(|e| CoreError::DecodeFailure {
        name: file.name.clone(),
        reason: e.to_string(),
    })?;
    Ok(LoadedImage::new(
        file.name,
        probe.mime_type,
        file.bytes,
        probe.width,
        probe.height,
    ))
}

/// 파일들을 병렬로 디코딩, 결과는 제출 순서 그대로
pub async fn decode_files(files: Vec<SourceFile>) -> Vec<Result<LoadedImage, CoreError>> {
    let tasks = files.into_iter().map(|file| {
        let name = file.name.clone();
        async move {
            tokio::task::spawn_blocking(move || decode_file(file))
                .await
                .unwrap_or_else(|e| {
                    Err(CoreError::DecodeFailure {
                        name,
                        reason: format!("디코딩 태스크 실패: {e}"),
                    })
                })
        }
    });
    join_all(tasks).await
}

/// 파일을 디코딩하고 성공한 이미지로 레지스트리를 통째로 교체
///
/// 하나도 디코딩되지 않으면 기존 레지스트리를 그대로 두고 실패한다.
pub async fn load(registry: &SharedRegistry, files: Vec<SourceFile>) -> Result<LoadReport, CoreError> {
    let submitted = files.len();
    let mut report = LoadReport::default();
    let mut images = Vec::with_capacity(submitted);

    for result in decode_files(files).await {
        match result {
            Ok(image) => {
                debug!(
                    "디코딩 완료: {} ({}x{}, {})",
                    image.name, image.width, image.height, image.mime_type
                );
                report.loaded.push(image.id);
                images.push(image);
            }
            Err(e) => {
                warn!("{e}");
                report.failures.push(e);
            }
        }
    }

    if images.is_empty() {
        return Err(CoreError::DecodeFailure {
            name: format!("{submitted}개 파일"),
            reason: "디코딩에 성공한 파일이 없습니다".to_string(),
        });
    }

    registry.write().replace_all(images);
    info!(
        "이미지 로드: {}/{}개 성공",
        report.loaded.len(),
        submitted
    );
    Ok(report)
}
