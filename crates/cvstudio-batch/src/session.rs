//! 세션 컨텍스트.
//!
//! 레지스트리, 연산 큐, 파라미터 저장소, 디스패처를 한 객체가 소유한다.
//! 전역 상태 없이 세션 단위로 명시적으로 전달된다.

use cvstudio_core::config::DispatchConfig;
use cvstudio_core::error::CoreError;
use cvstudio_core::models::dispatch::BatchSummary;
use cvstudio_core::models::image::{ImageId, SourceFile};
use cvstudio_core::models::operation::OperationKind;
use cvstudio_core::models::params::OperationParams;
use cvstudio_core::ports::operation_client::OperationClient;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

use crate::dispatcher::{BatchDispatcher, DispatchPlan};
use crate::events::{DispatchEvent, EventBus};
use crate::params_store::ParameterStore;
use crate::queue::OperationQueue;
use crate::registry::{self, ImageRegistry, LoadReport, SharedRegistry};

pub struct Session {
    registry: SharedRegistry,
    queue: OperationQueue,
    params: ParameterStore,
    events: EventBus,
    dispatcher: BatchDispatcher,
}

impl Session {
    pub fn new(client: Arc<dyn OperationClient>, config: &DispatchConfig) -> Self {
        let registry = ImageRegistry::shared();
        let events = EventBus::new(config.event_capacity);
        let dispatcher = BatchDispatcher::new(client, registry.clone(), events.clone());
        Self {
            registry,
            queue: OperationQueue::new(),
            params: ParameterStore::new(),
            events,
            dispatcher,
        }
    }

    // ============================================================
    // 이미지
    // ============================================================

    /// 파일 로드. 성공한 이미지로 레지스트리 전체를 교체한다.
    pub async fn load(&self, files: Vec<SourceFile>) -> Result<LoadReport, CoreError> {
        registry::load(&self.registry, files).await
    }

    pub fn toggle_selection(&self, id: ImageId) -> Result<bool, CoreError> {
        self.registry.write().toggle_selection(id)
    }

    /// 주어진 이미지만 선택. 중복 id는 한 번 선택한 것과 같다.
    ///
    /// 없는 id가 섞여 있으면 선택 상태를 바꾸지 않고 `NotFound`.
    pub fn select_only(&self, ids: &[ImageId]) -> Result<(), CoreError> {
        let mut registry = self.registry.write();
        if let Some(missing) = ids.iter().find(|id| registry.get(**id).is_none()) {
            return Err(CoreError::NotFound {
                resource_type: "Image".to_string(),
                id: missing.to_string(),
            });
        }
        registry.clear_selection();
        for id in ids {
            registry.set_selected(*id, true)?;
        }
        Ok(())
    }

    pub fn select_all(&self) {
        self.registry.write().select_all();
    }

    pub fn remove_image(&self, id: ImageId) -> Result<(), CoreError> {
        let removed = self.registry.write().remove(id)?;
        info!("이미지 제거: {}", removed.name);
        Ok(())
    }

    /// 이미지, 큐, 파라미터 모두 초기화
    pub fn clear_all(&mut self) {
        self.registry.write().clear();
        self.queue.clear();
        self.params.clear();
        info!("세션 초기화");
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    // ============================================================
    // 연산 큐 / 파라미터
    // ============================================================

    pub fn select_operation(&mut self, kind: OperationKind) -> bool {
        self.queue.select(kind)
    }

    pub fn remove_operation(&mut self, kind: OperationKind) -> bool {
        self.queue.remove(kind)
    }

    /// 큐만 비운다. 파라미터는 재선택 시 재사용된다.
    pub fn clear_queue(&mut self) {
        self.queue.clear();
    }

    pub fn active_operation(&self) -> Option<OperationKind> {
        self.queue.active()
    }

    pub fn queue(&self) -> &OperationQueue {
        &self.queue
    }

    pub fn set_params(&mut self, kind: OperationKind, params: OperationParams) -> Result<(), CoreError> {
        self.params.set(kind, params)
    }

    /// 문자열 필드로 파라미터 설정 (CLI 입력)
    pub fn set_param_fields<K, V>(&mut self, kind: OperationKind, fields: &[(K, V)]) -> Result<(), CoreError>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.params.set_fields(kind, fields)
    }

    pub fn params_for(&self, kind: OperationKind) -> OperationParams {
        self.params.get(kind)
    }

    pub fn params(&self) -> &ParameterStore {
        &self.params
    }

    // ============================================================
    // 실행
    // ============================================================

    /// 현재 큐와 파라미터의 스냅샷
    pub fn plan(&self) -> DispatchPlan {
        DispatchPlan::snapshot(&self.queue, &self.params)
    }

    /// 선택된 이미지에 실행
    pub async fn run_selected(&self) -> Result<BatchSummary, CoreError> {
        let targets = self.registry.read().selected_ids();
        self.run(&targets).await
    }

    pub async fn run(&self, targets: &[ImageId]) -> Result<BatchSummary, CoreError> {
        let plan = self.plan();
        self.dispatcher.run(&plan, targets).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.events.subscribe()
    }

    /// 세션과 실행 상태를 공유하는 디스패처 핸들
    pub fn dispatcher(&self) -> BatchDispatcher {
        self.dispatcher.clone()
    }
}
