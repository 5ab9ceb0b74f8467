//! 도메인 모델.

pub mod dispatch;
pub mod image;
pub mod operation;
pub mod params;
