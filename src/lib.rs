//! # Sopho Bench
//!
//! 一个用于在公开数据集上批量评测大模型的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 数据从哪里来、结果写到哪里去
//! - `DatasetSource` - HuggingFace / 本地 JSON 数据源
//! - `ResultSink` - 结果持久化（JSON 文件）
//!
//! ### ② 业务能力层（Services / Clients）
//! - `services/` - 描述"我能做什么"，只处理单行
//! - `FieldAdapter` - 把一行转换成统一的题目输入
//! - `JudgeService` - LLM 评审能力
//! - `clients/` - OpenAI 兼容的模型客户端和客户端池
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一行"的完整处理流程
//! - `ItemCtx` - 上下文封装（分区标签 + 行下标）
//! - `ItemExecutor` - 题目 ID + 策略调用 + 失败捕获
//! - `TaskStrategy` - 生成答案 / 保存题目
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/dataset_driver` - 遍历数据集并持久化
//! - `orchestrator/partition_aggregator` - 单个分区的抽样与汇总
//! - `orchestrator/worker_pool` - 并发、超时与取消
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::{ClientPool, ModelClient, OpenAiClient};
pub use config::Config;
pub use error::{HarnessError, HarnessResult, SourceError};
pub use infrastructure::{open_source, DatasetSource, JsonFileSink, ResultSink};
pub use models::{Outcome, QuestionId, ResultTree, TaskMode};
pub use orchestrator::{DatasetDriver, PartitionAggregator, RunSummary, TimeoutMode, WorkerPool};
pub use services::{DatasetAdapter, FieldAdapter, JudgeService};
pub use workflow::{ItemExecutor, ItemStrategy, Sampler, TaskStrategy};
