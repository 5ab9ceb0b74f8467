//! 연산별 파라미터 저장소.
//!
//! 연산 종류마다 마지막으로 설정한 파라미터를 기억한다. 저장 시점에 검증하므로
//! 디스패치 단계에는 유효한 파라미터만 도달한다.

use cvstudio_core::error::CoreError;
use cvstudio_core::models::operation::OperationKind;
use cvstudio_core::models::params::OperationParams;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    params: HashMap<OperationKind, OperationParams>,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 검증 후 저장
    pub fn set(&mut self, kind: OperationKind, params: OperationParams) -> Result<(), CoreError> {
        params.validate(kind)?;
        debug!("파라미터 저장: {kind} = {params:?}");
        self.params.insert(kind, params);
        Ok(())
    }

    /// 문자열 필드로 설정 (주어지지 않은 키는 기본값)
    pub fn set_fields<K, V>(&mut self, kind: OperationKind, fields: &[(K, V)]) -> Result<(), CoreError>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let params = OperationParams::from_fields(kind, fields)?;
        self.set(kind, params)
    }

    /// 저장된 값, 없으면 기본값
    pub fn get(&self, kind: OperationKind) -> OperationParams {
        self.params
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| OperationParams::default_for(kind))
    }

    pub fn is_customized(&self, kind: OperationKind) -> bool {
        self.params.contains_key(&kind)
    }

    pub fn reset(&mut self, kind: OperationKind) {
        self.params.remove(&kind);
    }

    pub fn clear(&mut self) {
        self.params.clear();
    }

    /// 체인 순서대로 파라미터 스냅샷
    pub fn snapshot(&self, chain: &[OperationKind]) -> Vec<(OperationKind, OperationParams)> {
        chain.iter().map(|kind| (*kind, self.get(*kind))).collect()
    }
}
