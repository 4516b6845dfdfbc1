pub mod client_pool;
pub mod llm_client;

pub use client_pool::{ClientLease, ClientPool};
pub use llm_client::OpenAiClient;

use crate::models::ModelInput;
use anyhow::Result;
use async_trait::async_trait;

/// 模型客户端
///
/// 对一个统一格式的题目给出答案；任何无法作答的情况都返回错误
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn answer(&self, input: &ModelInput) -> Result<String>;
}
