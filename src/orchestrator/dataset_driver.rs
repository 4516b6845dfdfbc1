//! 数据集驱动器 - 编排层
//!
//! ## 职责
//!
//! 本模块是一次评测运行的入口，负责整个数据集的遍历和结果持久化。
//!
//! ## 核心功能
//!
//! 1. **遍历**：列出所有 subject，再列出每个 subject 下的 split
//! 2. **委托**：每个分区交给 PartitionAggregator 处理
//! 3. **合并**：把分区结果合并进整次运行的结果树
//! 4. **持久化**：所有分区处理完后调用一次 ResultSink
//! 5. **全局统计**：汇总分区数、题目数和耗时
//!
//! 只有"没有任何 subject"会提前结束运行，此时不写任何输出；
//! 收到取消信号后，尚未开始的分区不再加载，直接记为跳过；
//! 如果取消时还没有任何题目真正处理完，不写输出，避免覆盖上一次的结果文件；
//! 只有持久化失败会让运行返回错误

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, warn, Instrument, Span};

use crate::error::HarnessError;
use crate::infrastructure::ResultSink;
use crate::models::{partition_label, ResultTree};
use crate::orchestrator::partition_aggregator::PartitionAggregator;
use crate::utils::logging::log_final_stats;

/// 分区的最终状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionStatus {
    Merged,
    Skipped,
}

/// 一次运行的摘要
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub dataset_id: String,
    /// (subject, split, 状态)，按处理顺序
    pub partitions: Vec<(String, String, PartitionStatus)>,
    pub outcomes: usize,
    pub failures: usize,
    /// 结果文件路径，没有输出时为 None
    pub saved_to: Option<PathBuf>,
    pub elapsed: Duration,
    /// 运行是否被取消
    pub cancelled: bool,
}

impl RunSummary {
    pub fn merged_count(&self) -> usize {
        self.count(PartitionStatus::Merged)
    }

    pub fn skipped_count(&self) -> usize {
        self.count(PartitionStatus::Skipped)
    }

    fn count(&self, status: PartitionStatus) -> usize {
        self.partitions.iter().filter(|(_, _, s)| *s == status).count()
    }
}

/// 数据集驱动器
pub struct DatasetDriver {
    dataset_id: String,
    suffix: String,
    aggregator: PartitionAggregator,
    sink: Arc<dyn ResultSink>,
    span: Span,
}

impl DatasetDriver {
    /// # 参数
    /// - `dataset_id`: 数据集名称（用于输出文件名）
    /// - `suffix`: 输出文件后缀，通常是模型名
    /// - `span`: 本次运行的日志 span
    pub fn new(
        dataset_id: impl Into<String>,
        suffix: impl Into<String>,
        aggregator: PartitionAggregator,
        sink: Arc<dyn ResultSink>,
        span: Span,
    ) -> Self {
        Self {
            dataset_id: dataset_id.into(),
            suffix: suffix.into(),
            aggregator,
            sink,
            span,
        }
    }

    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    /// 运行整个数据集
    pub async fn run(&self, sample_size: Option<usize>) -> Result<RunSummary, HarnessError> {
        self.run_inner(sample_size)
            .instrument(self.span.clone())
            .await
    }

    async fn run_inner(&self, sample_size: Option<usize>) -> Result<RunSummary, HarnessError> {
        let started = Instant::now();
        let source = self.aggregator.source();
        let cancel = self.aggregator.pool().cancellation_token();
        let mut summary = RunSummary {
            dataset_id: self.dataset_id.clone(),
            ..Default::default()
        };

        let subjects = match source.enumerate_subjects().await {
            Ok(subjects) => subjects,
            Err(e) => {
                error!("❌ 无法列出 {} 的 subject: {}", self.dataset_id, e);
                Vec::new()
            }
        };

        if subjects.is_empty() {
            warn!("⚠️ 数据集 {} 没有可处理的 subject，本次运行不产生输出", self.dataset_id);
            summary.elapsed = started.elapsed();
            return Ok(summary);
        }

        info!("📚 共 {} 个 subject: {:?}", subjects.len(), subjects);

        let mut run_tree = ResultTree::new();
        for subject in &subjects {
            let splits = match source.enumerate_splits(subject).await {
                Ok(splits) => splits,
                Err(e) => {
                    error!("[{}] ❌ 无法列出 split: {}", subject, e);
                    Vec::new()
                }
            };

            if splits.is_empty() {
                warn!("[{}] ⚠️ 没有可用的 split，跳过", subject);
                continue;
            }

            for split in &splits {
                if cancel.is_cancelled() {
                    info!("[{}] 🛑 运行已取消，不再加载", partition_label(subject, split));
                    summary
                        .partitions
                        .push((subject.clone(), split.clone(), PartitionStatus::Skipped));
                    continue;
                }

                match self.aggregator.aggregate(subject, split, sample_size).await {
                    Some(tree) => {
                        run_tree.merge(tree);
                        summary
                            .partitions
                            .push((subject.clone(), split.clone(), PartitionStatus::Merged));
                    }
                    None => {
                        warn!("[{}] ⏭️ 分区已跳过", partition_label(subject, split));
                        summary
                            .partitions
                            .push((subject.clone(), split.clone(), PartitionStatus::Skipped));
                    }
                }
            }
        }

        summary.outcomes = run_tree.outcome_count();
        summary.failures = run_tree.failure_count();
        summary.cancelled = cancel.is_cancelled();

        if summary.cancelled && run_tree.completed_count() == 0 {
            warn!(
                "🛑 {} 在处理任何题目之前被取消，不写入结果文件",
                self.dataset_id
            );
            summary.elapsed = started.elapsed();
            return Ok(summary);
        }
        if summary.cancelled {
            warn!("🛑 {} 被取消，只保存已完成的部分结果", self.dataset_id);
        }

        let path = self
            .sink
            .save(&run_tree, &self.dataset_id, &self.suffix)
            .await
            .map_err(|e| {
                error!("❌ 结果保存失败: {:#}", e);
                HarnessError::persistence(&self.dataset_id, e)
            })?;
        summary.saved_to = Some(path);
        summary.elapsed = started.elapsed();

        log_final_stats(
            &self.dataset_id,
            summary.merged_count(),
            summary.skipped_count(),
            summary.outcomes,
            summary.failures,
            summary.elapsed.as_secs_f64(),
        );

        Ok(summary)
    }
}
