//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责数据集遍历和并发调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `dataset_driver` - 数据集驱动器
//! - 遍历 subject / split
//! - 合并各分区结果
//! - 所有分区完成后持久化一次
//! - 输出全局统计信息
//!
//! ### `partition_aggregator` - 分区聚合器
//! - 加载单个分区（失败则跳过）
//! - 抽样并交给工作池
//! - 汇总为分区结果树
//!
//! ### `worker_pool` - 有界工作池
//! - 控制并发数量（Semaphore）
//! - 单题超时（Abort / Detach）
//! - 取消与进度
//!
//! ## 层次关系
//!
//! ```text
//! dataset_driver (处理所有分区)
//!     ↓
//! partition_aggregator (处理 Vec<Row>)
//!     ↓
//! worker_pool (并发 + 超时)
//!     ↓
//! workflow::ItemExecutor (处理单行)
//!     ↓
//! services / clients (能力层：适配器 / 模型)
//!     ↓
//! infrastructure (基础设施：数据源 / 结果持久化)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：driver 管数据集，aggregator 管分区，pool 管并发
//! 2. **失败隔离**：单题失败是结果，不是错误
//! 3. **向下依赖**：编排层 → workflow → services → infrastructure
//! 4. **无业务逻辑**：只做调度和统计，不解读行内容

pub mod dataset_driver;
pub mod partition_aggregator;
pub mod worker_pool;

// 重新导出主要类型
pub use dataset_driver::{DatasetDriver, PartitionStatus, RunSummary};
pub use partition_aggregator::PartitionAggregator;
pub use worker_pool::{Progress, ProgressSnapshot, TimeoutMode, WorkerPool};
