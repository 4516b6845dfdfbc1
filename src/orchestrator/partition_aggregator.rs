//! 分区聚合器 - 编排层
//!
//! ## 职责
//!
//! 处理一个 (subject, split) 分区：
//!
//! 1. **加载**：通过数据源加载分区，失败则跳过整个分区
//! 2. **抽样**：由 Sampler 决定处理哪些行
//! 3. **并发处理**：交给 WorkerPool
//! 4. **汇总**：把 (题目 ID, 结果) 写入分区的结果树
//! 5. **统计输出**：记录成功/失败数量
//!
//! 单道题失败不会影响整个分区，分区结果总会返回

use std::sync::Arc;

use tracing::{error, warn};

use crate::infrastructure::DatasetSource;
use crate::models::{partition_label, ResultTree};
use crate::orchestrator::worker_pool::WorkerPool;
use crate::utils::logging::{log_partition_complete, log_partition_start};
use crate::workflow::{ItemExecutor, Sampler};

/// 分区聚合器
pub struct PartitionAggregator {
    source: Arc<dyn DatasetSource>,
    pool: WorkerPool,
    executor: Arc<ItemExecutor>,
    sampler: Sampler,
}

impl PartitionAggregator {
    pub fn new(
        source: Arc<dyn DatasetSource>,
        pool: WorkerPool,
        executor: Arc<ItemExecutor>,
        sampler: Sampler,
    ) -> Self {
        Self {
            source,
            pool,
            executor,
            sampler,
        }
    }

    pub fn source(&self) -> &Arc<dyn DatasetSource> {
        &self.source
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// 处理单个分区
    ///
    /// # 返回
    /// 分区加载失败时返回 None，否则返回只含该分区的结果树
    pub async fn aggregate(
        &self,
        subject: &str,
        split: &str,
        sample_size: Option<usize>,
    ) -> Option<ResultTree> {
        let label = partition_label(subject, split);

        let partition = match self.source.load_partition(subject, split).await {
            Ok(partition) => Arc::new(partition),
            Err(e) => {
                error!("[{}] ❌ 分区加载失败，跳过: {}", label, e);
                return None;
            }
        };

        let indices = self.sampler.select_indices(partition.len(), sample_size);
        log_partition_start(&label, partition.len(), indices.len());

        let mut tree = ResultTree::new();
        tree.ensure_partition(subject, split);

        let results = self
            .pool
            .run(&label, indices, Arc::clone(&partition), Arc::clone(&self.executor))
            .await;

        let total = results.len();
        let mut success = 0;
        for (qid, outcome) in results {
            let ok = outcome.is_success();
            if tree.insert(subject, split, qid.clone(), outcome) {
                if ok {
                    success += 1;
                }
            } else {
                warn!("[{}] ⚠️ 题目 ID 重复: {}，保留行号靠前的结果", label, qid);
            }
        }

        log_partition_complete(&label, success, total);
        Some(tree)
    }
}
