//! 배치 디스패처.
//!
//! 대상 이미지마다 연산 체인을 순서대로 적용한다. 단계 N의 출력이 단계 N+1의
//! 입력이 되며, 체인 전체가 성공했을 때만 결과를 커밋한다.
//! 실패는 이미지 단위로 격리되어 다음 이미지 처리를 막지 않는다.

use cvstudio_core::error::CoreError;
use cvstudio_core::models::dispatch::{chain_label, BatchSummary, ImageFailure, ImageOutcome};
use cvstudio_core::models::image::{ImageBytes, ImageId};
use cvstudio_core::models::operation::OperationKind;
use cvstudio_core::models::params::OperationParams;
use cvstudio_core::ports::operation_client::OperationClient;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::events::{DispatchEvent, EventBus};
use crate::params_store::ParameterStore;
use crate::queue::OperationQueue;
use crate::registry::SharedRegistry;

/// 순서를 유지한 채 중복 id 제거
fn unique_targets(targets: &[ImageId]) -> Vec<ImageId> {
    let mut seen = HashSet::with_capacity(targets.len());
    targets.iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// 실행 시작 시점에 고정된 체인과 파라미터
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchPlan {
    steps: Vec<(OperationKind, OperationParams)>,
}

impl DispatchPlan {
    /// 현재 큐와 파라미터 저장소에서 스냅샷 생성
    pub fn snapshot(queue: &OperationQueue, params: &ParameterStore) -> Self {
        Self {
            steps: params.snapshot(queue.entries()),
        }
    }

    /// 명시적 단계로 생성 (각 파라미터 검증)
    pub fn from_steps(steps: Vec<(OperationKind, OperationParams)>) -> Result<Self, CoreError> {
        for (kind, params) in &steps {
            params.validate(*kind)?;
        }
        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[(OperationKind, OperationParams)] {
        &self.steps
    }

    pub fn chain(&self) -> Vec<OperationKind> {
        self.steps.iter().map(|(kind, _)| *kind).collect()
    }

    pub fn label(&self) -> String {
        chain_label(&self.chain())
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// 실행 중 표시. drop 시 해제된다.
struct RunningGuard(Arc<AtomicBool>);

impl RunningGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self, CoreError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| CoreError::BatchInProgress)?;
        Ok(Self(flag.clone()))
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// 이미지의 `is_processing` 플래그. drop 시 결과와 무관하게 해제된다.
struct ProcessingGuard<'a> {
    registry: &'a SharedRegistry,
    id: ImageId,
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        if let Some(image) = self.registry.write().get_mut(self.id) {
            image.is_processing = false;
        }
    }
}

/// 체인 시작 시점에 레지스트리에서 읽은 입력
struct ChainInput {
    name: String,
    data: ImageBytes,
    grayscale_artifact: Option<ImageBytes>,
}

/// 체인 실행 결과
enum ChainResult {
    Completed {
        output: ImageBytes,
        applied: Vec<OperationKind>,
        grayscale_artifact: Option<ImageBytes>,
    },
    Failed {
        operation: OperationKind,
        error: CoreError,
    },
}

/// 배치 디스패처. 복제본끼리 실행 중 상태를 공유한다.
#[derive(Clone)]
pub struct BatchDispatcher {
    client: Arc<dyn OperationClient>,
    registry: SharedRegistry,
    events: EventBus,
    running: Arc<AtomicBool>,
}

impl BatchDispatcher {
    pub fn new(client: Arc<dyn OperationClient>, registry: SharedRegistry, events: EventBus) -> Self {
        Self {
            client,
            registry,
            events,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn client_name(&self) -> &'static str {
        self.client.name()
    }

    /// 대상 이미지들에 체인 적용
    ///
    /// 큐가 비었으면 `NoOperationSelected`, 대상이 없으면 `NoTargetsSelected`,
    /// 다른 배치가 실행 중이면 `BatchInProgress`. 이 경우 원격 호출은 일어나지 않는다.
    /// 그 외 실패는 모두 요약의 이미지별 실패로 보고된다.
    /// 중복된 id는 처음 나온 위치에서 한 번만 처리한다.
    pub async fn run(&self, plan: &DispatchPlan, targets: &[ImageId]) -> Result<BatchSummary, CoreError> {
        if plan.is_empty() {
            return Err(CoreError::NoOperationSelected);
        }
        let targets = unique_targets(targets);
        if targets.is_empty() {
            return Err(CoreError::NoTargetsSelected);
        }
        let _running = RunningGuard::acquire(&self.running)?;

        let started = Instant::now();
        let label = plan.label();
        info!(
            "배치 시작: {}개 이미지, 체인 [{label}], 클라이언트 {}",
            targets.len(),
            self.client.name()
        );
        self.events.publish(DispatchEvent::BatchStarted {
            total: targets.len(),
            chain_label: label.clone(),
        });

        let mut summary = BatchSummary {
            chain_label: label,
            ..Default::default()
        };

        for (index, id) in targets.iter().enumerate() {
            let outcome = self.process_image(plan, *id).await;
            match &outcome {
                (_, ImageOutcome::Succeeded { .. }) => summary.succeeded += 1,
                (_, ImageOutcome::Skipped) => summary.skipped += 1,
                (name, ImageOutcome::Failed { operation, error }) => {
                    summary.failures.push(ImageFailure {
                        image_id: *id,
                        image_name: name.clone(),
                        operation: *operation,
                        error: error.clone(),
                    });
                }
            }

            let (name, outcome) = outcome;
            self.events.publish(DispatchEvent::ImageFinished {
                image_id: *id,
                name,
                outcome,
            });
            self.events.publish(DispatchEvent::Progress {
                completed: index + 1,
                total: targets.len(),
            });
        }

        summary.total = targets.len() - summary.skipped;
        summary.elapsed = started.elapsed();
        info!("{summary}");
        self.events
            .publish(DispatchEvent::BatchFinished(summary.clone()));
        Ok(summary)
    }

    /// 이미지 한 장 처리. (이름, 결과) 반환
    async fn process_image(&self, plan: &DispatchPlan, id: ImageId) -> (String, ImageOutcome) {
        let input = {
            let mut registry = self.registry.write();
            match registry.get_mut(id) {
                None => {
                    debug!("이미지 사라짐, 건너뜀: {id}");
                    return (String::new(), ImageOutcome::Skipped);
                }
                Some(image) if image.is_processing => {
                    let error = CoreError::AlreadyProcessing(image.name.clone());
                    warn!("{error}");
                    return (
                        image.name.clone(),
                        ImageOutcome::Failed {
                            operation: None,
                            error: error.to_string(),
                        },
                    );
                }
                Some(image) => {
                    image.is_processing = true;
                    ChainInput {
                        name: image.name.clone(),
                        data: image.current_data(),
                        grayscale_artifact: image.grayscale_artifact.clone(),
                    }
                }
            }
        };
        let _processing = ProcessingGuard {
            registry: &self.registry,
            id,
        };
        let name = input.name.clone();
        self.events.publish(DispatchEvent::ImageStarted {
            image_id: id,
            name: name.clone(),
        });

        let started = Instant::now();
        let result = self.run_chain(plan, input).await;
        let elapsed = started.elapsed();

        let mut registry = self.registry.write();
        let Some(image) = registry.get_mut(id) else {
            debug!("처리 중 이미지 삭제됨, 결과 폐기: {name}");
            return (name, ImageOutcome::Skipped);
        };

        match result {
            ChainResult::Completed {
                output,
                applied,
                grayscale_artifact,
            } => {
                let label = chain_label(&applied);
                image.commit(output, label.clone(), elapsed);
                if grayscale_artifact.is_some() {
                    image.grayscale_artifact = grayscale_artifact;
                }
                debug!("커밋: {name} [{label}] {elapsed:?}");
                (
                    name,
                    ImageOutcome::Succeeded {
                        label,
                        elapsed_ms: elapsed.as_millis() as u64,
                    },
                )
            }
            ChainResult::Failed { operation, error } => {
                warn!("체인 실패: {name} [{operation}]: {error}");
                (
                    name,
                    ImageOutcome::Failed {
                        operation: Some(operation),
                        error: error.to_string(),
                    },
                )
            }
        }
    }

    /// 체인 실행. 레지스트리 잠금 없이 원격 호출한다.
    async fn run_chain(&self, plan: &DispatchPlan, input: ChainInput) -> ChainResult {
        let mut current = input.data;
        let mut applied = Vec::with_capacity(plan.steps.len());
        let mut grayscale = None;

        for (kind, params) in &plan.steps {
            let kind = *kind;
            let step_input = match kind.requires() {
                None => current.clone(),
                Some(required) => {
                    let artifact = if required == OperationKind::Grayscale {
                        grayscale.clone().or_else(|| input.grayscale_artifact.clone())
                    } else {
                        None
                    };
                    match artifact {
                        Some(artifact) => artifact,
                        None => {
                            return ChainResult::Failed {
                                operation: kind,
                                error: CoreError::MissingPrecondition {
                                    operation: kind.id().to_string(),
                                    requires: required.id().to_string(),
                                },
                            };
                        }
                    }
                }
            };

            debug!("{}: {kind} 호출 ({} bytes)", input.name, step_input.len());
            match self.client.invoke(&step_input, kind, params).await {
                Ok(output) => {
                    if kind == OperationKind::Grayscale {
                        grayscale = Some(output.clone());
                    }
                    current = output;
                    applied.push(kind);
                }
                Err(error) => return ChainResult::Failed { operation: kind, error },
            }
        }

        ChainResult::Completed {
            output: current,
            applied,
            grayscale_artifact: grayscale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ImageRegistry;
    use async_trait::async_trait;
    use cvstudio_core::models::dispatch::DispatchResult;
    use cvstudio_core::models::image::LoadedImage;
    use cvstudio_core::models::params::FlipCode;
    use cvstudio_core::ports::operation_client::ServiceHealth;
    use parking_lot::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    type Behavior = dyn Fn(&[u8], OperationKind) -> DispatchResult + Send + Sync;

    /// 호출을 기록하고 `behavior`로 응답하는 테스트 클라이언트
    struct MockClient {
        calls: Mutex<Vec<(OperationKind, Vec<u8>)>>,
        behavior: Box<Behavior>,
        gate: Option<Arc<Notify>>,
    }

    impl MockClient {
        fn new<F>(behavior: F) -> Arc<Self>
        where
            F: Fn(&[u8], OperationKind) -> DispatchResult + Send + Sync + 'static,
        {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                behavior: Box::new(behavior),
                gate: None,
            })
        }

        /// 입력 뒤에 "|연산id"를 붙여 돌려준다
        fn appending() -> Arc<Self> {
            Self::new(|input, kind| Ok(append(input, kind)))
        }

        fn gated(gate: Arc<Notify>) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                behavior: Box::new(|input: &[u8], kind: OperationKind| Ok(append(input, kind))),
                gate: Some(gate),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    fn append(input: &[u8], kind: OperationKind) -> ImageBytes {
        let mut out = input.to_vec();
        out.push(b'|');
        out.extend_from_slice(kind.id().as_bytes());
        ImageBytes::from(out)
    }

    #[async_trait]
    impl OperationClient for MockClient {
        async fn invoke(
            &self,
            image: &[u8],
            kind: OperationKind,
            _params: &OperationParams,
        ) -> DispatchResult {
            self.calls.lock().push((kind, image.to_vec()));
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            (self.behavior)(image, kind)
        }

        async fn health(&self) -> Result<ServiceHealth, CoreError> {
            Ok(ServiceHealth {
                status: "healthy".to_string(),
                version: "mock".to_string(),
            })
        }

        fn name(&self) -> &'static str {
            "mock"
        }
    }

    fn setup(client: Arc<MockClient>, names: &[&str]) -> (BatchDispatcher, SharedRegistry, Vec<ImageId>) {
        let registry = ImageRegistry::shared();
        let images: Vec<_> = names
            .iter()
            .map(|name| LoadedImage::new(*name, "image/png", name.as_bytes().to_vec(), 1, 1))
            .collect();
        let ids = images.iter().map(|i| i.id).collect();
        registry.write().replace_all(images);
        let dispatcher = BatchDispatcher::new(client, registry.clone(), EventBus::new(64));
        (dispatcher, registry, ids)
    }

    fn plan(kinds: &[OperationKind]) -> DispatchPlan {
        DispatchPlan::from_steps(
            kinds
                .iter()
                .map(|k| (*k, OperationParams::default_for(*k)))
                .collect(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn empty_plan_or_targets_make_no_calls() {
        let client = MockClient::appending();
        let (dispatcher, _, ids) = setup(client.clone(), &["a"]);

        let err = dispatcher.run(&plan(&[]), &ids).await.unwrap_err();
        assert!(matches!(err, CoreError::NoOperationSelected));

        let err = dispatcher
            .run(&plan(&[OperationKind::Blur]), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NoTargetsSelected));
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn chain_feeds_outputs_and_commits_label() {
        let client = MockClient::appending();
        let (dispatcher, registry, ids) = setup(client.clone(), &["a", "b", "c"]);
        let plan = DispatchPlan::from_steps(vec![
            (
                OperationKind::Rotate,
                OperationParams::Rotate {
                    angle: 90,
                    scale: 1.0,
                },
            ),
            (
                OperationKind::Flip,
                OperationParams::Flip {
                    flip_code: FlipCode::Horizontal,
                },
            ),
        ])
        .unwrap();

        let summary = dispatcher.run(&plan, &ids).await.unwrap();
        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.total, 3);
        assert!(summary.all_succeeded());
        assert_eq!(summary.chain_label, "rotate → flip");

        let registry = registry.read();
        for (image, name) in registry.iter().zip(["a", "b", "c"]) {
            assert!(image.is_processed);
            assert!(!image.is_processing);
            assert_eq!(image.last_operation_label.as_deref(), Some("rotate → flip"));
            let expected = format!("{name}|rotate|flip");
            assert_eq!(image.processed_data.as_deref(), Some(expected.as_bytes()));
            assert!(image.last_processing_time.is_some());
        }

        // flip은 rotate 출력을 입력으로 받음
        let calls = client.calls.lock();
        assert_eq!(calls.len(), 6);
        assert_eq!(calls[1], (OperationKind::Flip, b"a|rotate".to_vec()));
    }

    #[tokio::test]
    async fn rerun_starts_from_processed_state() {
        let client = MockClient::appending();
        let (dispatcher, registry, ids) = setup(client, &["a"]);

        dispatcher.run(&plan(&[OperationKind::Blur]), &ids).await.unwrap();
        dispatcher.run(&plan(&[OperationKind::Sharpen]), &ids).await.unwrap();

        let registry = registry.read();
        let image = registry.get(ids[0]).unwrap();
        assert_eq!(image.processed_data.as_deref(), Some(&b"a|blur|sharpen"[..]));
        assert_eq!(image.last_operation_label.as_deref(), Some("sharpen"));
        assert_eq!(&*image.original_data, b"a");
    }

    #[tokio::test]
    async fn mid_chain_failure_leaves_image_unchanged() {
        let client = MockClient::new(|input, kind| {
            if kind == OperationKind::Flip {
                Err(CoreError::RemoteCall {
                    operation: kind.id().to_string(),
                    status: 500,
                    detail: "boom".to_string(),
                })
            } else {
                Ok(append(input, kind))
            }
        });
        let (dispatcher, registry, ids) = setup(client, &["a"]);

        // 먼저 커밋된 상태를 만든다
        {
            let mut reg = registry.write();
            let image = reg.get_mut(ids[0]).unwrap();
            image.commit(ImageBytes::from(&b"prev"[..]), "blur".to_string(), Duration::from_millis(1));
        }

        let summary = dispatcher
            .run(&plan(&[OperationKind::Rotate, OperationKind::Flip]), &ids)
            .await
            .unwrap();
        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.failures[0].operation, Some(OperationKind::Flip));
        assert!(summary.failures[0].error.contains("boom"));

        let reg = registry.read();
        let image = reg.get(ids[0]).unwrap();
        assert_eq!(image.processed_data.as_deref(), Some(&b"prev"[..]));
        assert_eq!(image.last_operation_label.as_deref(), Some("blur"));
        assert!(image.is_processed);
        assert!(!image.is_processing);
    }

    #[tokio::test]
    async fn failures_are_isolated_per_image() {
        let client = MockClient::new(|input, kind| {
            if input.starts_with(b"x") {
                Err(CoreError::Network("refused".to_string()))
            } else {
                Ok(append(input, kind))
            }
        });
        let (dispatcher, registry, ids) = setup(client, &["x", "y"]);

        let summary = dispatcher
            .run(&plan(&[OperationKind::Grayscale]), &ids)
            .await
            .unwrap();
        assert_eq!((summary.succeeded, summary.total), (1, 2));
        assert!(summary.to_string().contains("1/2"));
        assert_eq!(summary.failures[0].image_name, "x");

        let reg = registry.read();
        assert!(!reg.get(ids[0]).unwrap().is_processed);
        assert!(reg.get(ids[1]).unwrap().is_processed);
    }

    #[tokio::test]
    async fn compare_dimensions_requires_grayscale_artifact() {
        let client = MockClient::appending();
        let (dispatcher, registry, ids) = setup(client.clone(), &["a"]);
        let compare = plan(&[OperationKind::CompareDimensions]);

        let summary = dispatcher.run(&compare, &ids).await.unwrap();
        assert_eq!(summary.succeeded, 0);
        assert!(summary.failures[0].error.contains("grayscale"));
        assert_eq!(client.call_count(), 0);

        // grayscale 실행 후에는 캐시된 grayscale 결과를 보낸다
        dispatcher
            .run(&plan(&[OperationKind::Grayscale, OperationKind::Blur]), &ids)
            .await
            .unwrap();
        assert_eq!(
            registry.read().get(ids[0]).unwrap().grayscale_artifact.as_deref(),
            Some(&b"a|grayscale"[..])
        );

        let summary = dispatcher.run(&compare, &ids).await.unwrap();
        assert_eq!(summary.succeeded, 1);
        let calls = client.calls.lock();
        let last = calls.last().unwrap();
        assert_eq!(last, &(OperationKind::CompareDimensions, b"a|grayscale".to_vec()));
    }

    #[tokio::test]
    async fn grayscale_artifact_not_recorded_on_failed_chain() {
        let client = MockClient::new(|input, kind| {
            if kind == OperationKind::Blur {
                Err(CoreError::Network("down".to_string()))
            } else {
                Ok(append(input, kind))
            }
        });
        let (dispatcher, registry, ids) = setup(client, &["a"]);
        dispatcher
            .run(&plan(&[OperationKind::Grayscale, OperationKind::Blur]), &ids)
            .await
            .unwrap();
        assert!(registry.read().get(ids[0]).unwrap().grayscale_artifact.is_none());
    }

    #[tokio::test]
    async fn vanished_images_are_skipped() {
        let registry_slot: Arc<Mutex<Option<SharedRegistry>>> = Arc::new(Mutex::new(None));
        let victim: Arc<Mutex<Option<ImageId>>> = Arc::new(Mutex::new(None));
        let (slot, target) = (registry_slot.clone(), victim.clone());

        // 첫 이미지 처리 중에 두 번째 이미지를 삭제
        let client = MockClient::new(move |input, kind| {
            if let (Some(registry), Some(id)) = (slot.lock().clone(), target.lock().take()) {
                let _ = registry.write().remove(id);
            }
            Ok(append(input, kind))
        });
        let (dispatcher, registry, ids) = setup(client, &["a", "b", "c"]);
        *registry_slot.lock() = Some(registry.clone());
        *victim.lock() = Some(ids[1]);

        let summary = dispatcher.run(&plan(&[OperationKind::Flip]), &ids).await.unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.succeeded, 2);
        assert!(summary.failures.is_empty());
        assert_eq!(registry.read().len(), 2);
    }

    #[tokio::test]
    async fn duplicate_targets_run_once() {
        let client = MockClient::appending();
        let (dispatcher, registry, ids) = setup(client.clone(), &["a", "b"]);

        let targets = [ids[1], ids[0], ids[1], ids[0]];
        let summary = dispatcher
            .run(&plan(&[OperationKind::Flip]), &targets)
            .await
            .unwrap();
        assert_eq!((summary.succeeded, summary.total), (2, 2));
        assert_eq!(client.call_count(), 2);

        // 처음 나온 순서대로 처리
        let calls = client.calls.lock();
        assert_eq!(calls[0].1, b"b".to_vec());
        assert_eq!(calls[1].1, b"a".to_vec());
        drop(calls);

        let registry = registry.read();
        assert_eq!(
            registry.get(ids[0]).unwrap().processed_data.as_deref(),
            Some(&b"a|flip"[..])
        );
    }

    #[tokio::test]
    async fn image_removed_mid_chain_discards_result() {
        let registry_slot: Arc<Mutex<Option<(SharedRegistry, ImageId)>>> = Arc::new(Mutex::new(None));
        let slot = registry_slot.clone();
        let client = MockClient::new(move |input, kind| {
            if let Some((registry, id)) = slot.lock().take() {
                let _ = registry.write().remove(id);
            }
            Ok(append(input, kind))
        });
        let (dispatcher, registry, ids) = setup(client, &["a"]);
        *registry_slot.lock() = Some((registry.clone(), ids[0]));

        let summary = dispatcher.run(&plan(&[OperationKind::Flip]), &ids).await.unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.total, 0);
        assert!(registry.read().is_empty());
    }

    #[tokio::test]
    async fn already_processing_image_is_reported() {
        let client = MockClient::appending();
        let (dispatcher, registry, ids) = setup(client.clone(), &["a", "b"]);
        registry.write().get_mut(ids[0]).unwrap().is_processing = true;

        let summary = dispatcher.run(&plan(&[OperationKind::Flip]), &ids).await.unwrap();
        assert_eq!((summary.succeeded, summary.total), (1, 2));
        assert_eq!(summary.failures[0].operation, None);
        assert_eq!(client.call_count(), 1);
        // 다른 실행이 설정한 플래그는 건드리지 않음
        assert!(registry.read().get(ids[0]).unwrap().is_processing);
    }

    #[tokio::test]
    async fn concurrent_run_is_rejected() {
        let gate = Arc::new(Notify::new());
        let client = MockClient::gated(gate.clone());
        let (dispatcher, registry, ids) = setup(client, &["a"]);
        let mut events = dispatcher.events.subscribe();

        let first = {
            let dispatcher = dispatcher.clone();
            let ids = ids.clone();
            tokio::spawn(async move { dispatcher.run(&plan(&[OperationKind::Flip]), &ids).await })
        };

        // ImageStarted 시점에는 is_processing이 이미 보여야 함
        loop {
            if let DispatchEvent::ImageStarted { image_id, .. } = events.recv().await.unwrap() {
                assert_eq!(image_id, ids[0]);
                break;
            }
        }
        assert!(registry.read().get(ids[0]).unwrap().is_processing);
        assert!(dispatcher.is_running());

        let err = dispatcher
            .run(&plan(&[OperationKind::Blur]), &ids)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::BatchInProgress));

        gate.notify_one();
        let summary = first.await.unwrap().unwrap();
        assert_eq!(summary.succeeded, 1);
        assert!(!dispatcher.is_running());
        assert!(!registry.read().get(ids[0]).unwrap().is_processing);
    }

    #[tokio::test]
    async fn events_report_progress_in_order() {
        let client = MockClient::appending();
        let (dispatcher, _, ids) = setup(client, &["a", "b"]);
        let mut rx = dispatcher.events.subscribe();

        dispatcher.run(&plan(&[OperationKind::Flip]), &ids).await.unwrap();

        let mut progress = Vec::new();
        let mut finished = None;
        while let Ok(event) = rx.try_recv() {
            match event {
                DispatchEvent::Progress { completed, total } => progress.push((completed, total)),
                DispatchEvent::BatchFinished(summary) => finished = Some(summary),
                _ => {}
            }
        }
        assert_eq!(progress, vec![(1, 2), (2, 2)]);
        assert_eq!(finished.unwrap().succeeded, 2);
    }
}
