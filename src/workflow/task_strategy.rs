//! 任务策略 - 流程层
//!
//! 定义"一行数据"在不同任务下怎么处理：
//! 1. 适配器提取题目输入（失败 → extraction）
//! 2. 生成答案：借出模型客户端调用（失败 → answer）
//! 3. 保存题目：输出题目本身和标准答案

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

use crate::clients::{ClientPool, ModelClient};
use crate::models::{Failure, ModelInput, Row, TaskMode};
use crate::services::DatasetAdapter;
use crate::utils::truncate_text;
use crate::workflow::item_executor::ItemStrategy;

/// 按任务类型分发的行处理策略
pub struct TaskStrategy {
    adapter: Arc<dyn DatasetAdapter>,
    clients: Option<Arc<ClientPool>>,
    mode: TaskMode,
}

impl TaskStrategy {
    /// 生成答案
    pub fn generate_answers(adapter: Arc<dyn DatasetAdapter>, clients: Arc<ClientPool>) -> Self {
        Self {
            adapter,
            clients: Some(clients),
            mode: TaskMode::GenerateAnswers,
        }
    }

    /// 保存题目，不需要模型
    pub fn save_questions(adapter: Arc<dyn DatasetAdapter>) -> Self {
        Self {
            adapter,
            clients: None,
            mode: TaskMode::SaveQuestions,
        }
    }

    pub fn mode(&self) -> TaskMode {
        self.mode
    }

    async fn answer(&self, input: &ModelInput) -> Result<Value, Failure> {
        let clients = self
            .clients
            .as_ref()
            .ok_or_else(|| Failure::answer("未配置模型客户端"))?;

        let lease = clients
            .acquire()
            .map_err(|e| Failure::answer(format!("无法获取模型客户端: {e:#}")))?;

        let response = lease
            .answer(input)
            .await
            .map_err(|e| Failure::answer(format!("{e:#}")))?;

        debug!("模型回答: {}", truncate_text(&response, 80));
        Ok(Value::String(response))
    }

    fn question_record(&self, input: ModelInput, row: &Row) -> Result<Value, Failure> {
        let mut record = match serde_json::to_value(input) {
            Ok(Value::Object(map)) => map,
            Ok(_) => Map::new(),
            Err(e) => return Err(Failure::extraction(format!("题目序列化失败: {e}"))),
        };
        record.retain(|_, v| !v.is_null());
        record.insert("answer".to_string(), self.adapter.correct_answer(row));
        Ok(Value::Object(record))
    }
}

#[async_trait]
impl ItemStrategy for TaskStrategy {
    async fn apply(&self, row: &Row) -> Result<Value, Failure> {
        let input = self
            .adapter
            .extract(row)
            .ok_or_else(|| Failure::extraction("无法从该行提取题目"))?;

        match self.mode {
            TaskMode::GenerateAnswers => self.answer(&input).await,
            TaskMode::SaveQuestions => self.question_record(input, row),
        }
    }
}
