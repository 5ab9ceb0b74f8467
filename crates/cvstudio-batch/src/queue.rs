//! 연산 큐.
//!
//! exclusive 연산은 큐를 자기 하나로 교체하고, composable 연산은 토글로
//! 추가/제거된다. 큐에 exclusive 연산과 다른 연산이 섞이는 일은 없다.

use cvstudio_core::models::operation::OperationKind;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationQueue {
    entries: Vec<OperationKind>,
}

impl OperationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 연산 선택. 선택 후 큐에 들어 있으면 true
    pub fn select(&mut self, kind: OperationKind) -> bool {
        if kind.is_exclusive() {
            self.entries = vec![kind];
            debug!("exclusive 연산 선택: {kind}");
            return true;
        }

        if let Some(index) = self.position(kind) {
            self.entries.remove(index);
            debug!("연산 해제: {kind} → {:?}", self.entries);
            return false;
        }

        // composable 선택 시 exclusive 단독 큐는 비운다
        self.entries.retain(|entry| !entry.is_exclusive());
        self.entries.push(kind);
        debug!("연산 추가: {kind} → {:?}", self.entries);
        true
    }

    /// 특정 연산 제거, 제거되었으면 true
    pub fn remove(&mut self, kind: OperationKind) -> bool {
        match self.position(kind) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// 파라미터 표시 대상: 마지막 연산
    pub fn active(&self) -> Option<OperationKind> {
        self.entries.last().copied()
    }

    pub fn entries(&self) -> &[OperationKind] {
        &self.entries
    }

    pub fn contains(&self, kind: OperationKind) -> bool {
        self.position(kind).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, kind: OperationKind) -> Option<usize> {
        self.entries.iter().position(|entry| *entry == kind)
    }
}
