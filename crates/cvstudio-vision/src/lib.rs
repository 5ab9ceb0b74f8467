//! # cvstudio-vision
//!
//! 클라이언트 사이드 이미지 처리 크레이트.
//! 바이트 코덱(base64, data-URI, PNG), 분석 결과의 결정적 composite 렌더링,
//! 라벨용 비트맵 글리프, 오프라인 데모용 로컬 연산 클라이언트를 담당한다.

pub mod codec;
pub mod composite;
pub mod glyph;
pub mod local_client;
