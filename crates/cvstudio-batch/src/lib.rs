//! # cvstudio-batch
//!
//! 클라이언트 배치 파이프라인.
//!
//! ## 구조
//!
//! - [`registry`] — 로드된 이미지 (제출 순서 유지, 병렬 디코딩)
//! - [`queue`] — exclusive/composable 규칙을 따르는 연산 큐
//! - [`params_store`] — 연산별 마지막 파라미터
//! - [`dispatcher`] — 이미지 × 체인 순차 실행, 이미지 단위 실패 격리
//! - [`events`] — 진행 이벤트 브로드캐스트
//! - [`session`] — 위 구성 요소를 소유하는 단일 컨텍스트

pub mod dispatcher;
pub mod events;
pub mod params_store;
pub mod queue;
pub mod registry;
pub mod session;
