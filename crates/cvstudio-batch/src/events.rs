//! 디스패치 이벤트 버스.
//!
//! `tokio::broadcast` 기반. 진행률 이벤트는 관찰용이며 제어 흐름에 쓰이지 않는다.

use cvstudio_core::models::dispatch::{BatchSummary, ImageOutcome};
use cvstudio_core::models::image::ImageId;
use tokio::sync::broadcast;
use tracing::debug;

/// 배치 진행 이벤트
#[derive(Debug, Clone)]
pub enum DispatchEvent {
    /// 배치 시작
    BatchStarted { total: usize, chain_label: String },
    /// 이미지 처리 시작 (`is_processing` 설정 후, 첫 원격 호출 전)
    ImageStarted { image_id: ImageId, name: String },
    /// 이미지 처리 종료
    ImageFinished {
        image_id: ImageId,
        name: String,
        outcome: ImageOutcome,
    },
    /// 완료 비율
    Progress { completed: usize, total: usize },
    /// 배치 종료
    BatchFinished(BatchSummary),
}

impl DispatchEvent {
    fn kind(&self) -> &'static str {
        match self {
            DispatchEvent::BatchStarted { .. } => "batch_started",
            DispatchEvent::ImageStarted { .. } => "image_started",
            DispatchEvent::ImageFinished { .. } => "image_finished",
            DispatchEvent::Progress { .. } => "progress",
            DispatchEvent::BatchFinished(_) => "batch_finished",
        }
    }
}

/// 디스패치 이벤트 버스
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DispatchEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// 이벤트 발행 (구독자가 없으면 버려짐)
    pub fn publish(&self, event: DispatchEvent) {
        debug!("이벤트 발행: {}", event.kind());
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DispatchEvent::Progress {
            completed: 1,
            total: 3,
        });

        let event = rx.recv().await.unwrap();
        assert!(matches!(
            event,
            DispatchEvent::Progress {
                completed: 1,
                total: 3
            }
        ));
    }

    #[tokio::test]
    async fn multiple_subscribers() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.clone().subscribe();

        bus.publish(DispatchEvent::BatchStarted {
            total: 2,
            chain_label: "blur".to_string(),
        });

        assert!(matches!(rx1.recv().await.unwrap(), DispatchEvent::BatchStarted { .. }));
        assert!(matches!(rx2.recv().await.unwrap(), DispatchEvent::BatchStarted { .. }));
    }

    #[test]
    fn publish_without_subscribers_is_noop() {
        let bus = EventBus::new(0);
        bus.publish(DispatchEvent::Progress {
            completed: 0,
            total: 0,
        });
    }
}
