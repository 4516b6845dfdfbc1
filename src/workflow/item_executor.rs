//! 单题执行器 - 流程层
//!
//! 核心职责：对一行数据调用注入的处理策略，得到 (题目 ID, 结果)
//!
//! - 题目 ID 在调用策略之前、独立于策略得到
//! - 策略返回的错误和 panic 都在这里被捕获并转成失败结果，不会传到工作池

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::models::{Failure, FailureKind, Outcome, QuestionId, QuestionIdSource, Row};
use crate::workflow::item_ctx::ItemCtx;

/// 单行处理策略
///
/// 把一行映射为成功值，或者一个失败标记
#[async_trait]
pub trait ItemStrategy: Send + Sync {
    async fn apply(&self, row: &Row) -> Result<Value, Failure>;
}

/// 单题执行器
pub struct ItemExecutor {
    strategy: Arc<dyn ItemStrategy>,
    id_source: QuestionIdSource,
}

impl ItemExecutor {
    pub fn new(strategy: Arc<dyn ItemStrategy>) -> Self {
        Self {
            strategy,
            id_source: QuestionIdSource::Position,
        }
    }

    pub fn with_id_source(mut self, id_source: QuestionIdSource) -> Self {
        self.id_source = id_source;
        self
    }

    /// 计算题目 ID
    pub fn question_id(&self, index: usize, row: &Row) -> Result<QuestionId, Failure> {
        match &self.id_source {
            QuestionIdSource::Position => Ok(QuestionId::Index(index)),
            QuestionIdSource::Field(field) => match row.get(field) {
                Some(Value::String(s)) if !s.is_empty() => Ok(QuestionId::Key(s.clone())),
                Some(Value::Number(n)) if n.is_i64() || n.is_u64() => {
                    Ok(QuestionId::Key(n.to_string()))
                }
                Some(Value::Number(_)) => Err(id_failure(field, "不是整数")),
                Some(_) => Err(id_failure(field, "类型不支持或为空")),
                None => Err(id_failure(field, "字段不存在")),
            },
        }
    }

    /// 用于记录超时/取消结果的键，无法得到 ID 时使用 `#row<下标>`
    pub fn key_for(&self, index: usize, row: &Row) -> QuestionId {
        self.question_id(index, row)
            .unwrap_or_else(|_| QuestionId::unresolved(index))
    }

    /// 处理一行
    pub async fn execute(&self, ctx: &ItemCtx, row: &Row) -> (QuestionId, Outcome) {
        let qid = match self.question_id(ctx.index, row) {
            Ok(qid) => qid,
            Err(failure) => {
                error!("{} ❌ 无法获取题目 ID: {}", ctx, failure.reason);
                return (QuestionId::unresolved(ctx.index), Outcome::Failure { failure });
            }
        };

        let result = AssertUnwindSafe(self.strategy.apply(row))
            .catch_unwind()
            .await;

        let outcome = match result {
            Ok(Ok(value)) => {
                debug!("{} ✓ 处理成功 (题目 {})", ctx, qid);
                Outcome::Success(value)
            }
            Ok(Err(failure)) => {
                warn!("{} ⚠️ 处理失败 (题目 {}): {}", ctx, qid, failure);
                Outcome::Failure { failure }
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("{} ❌ 处理过程中发生 panic (题目 {}): {}", ctx, qid, message);
                Outcome::failure(FailureKind::Panicked, message)
            }
        };

        (qid, outcome)
    }
}

fn id_failure(field: &str, detail: &str) -> Failure {
    Failure::new(
        FailureKind::IdDerivation,
        format!("题目 ID 字段 '{}' {}", field, detail),
    )
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "未知 panic".to_string()
    }
}
