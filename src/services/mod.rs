pub mod adapter;
pub mod judge_service;

pub use adapter::{DatasetAdapter, FieldAdapter};
pub use judge_service::JudgeService;
