//! 有界工作池 - 编排层
//!
//! ## 职责
//!
//! 把一个分区中选中的行并发交给 `ItemExecutor` 处理：
//!
//! 1. **并发控制**：Semaphore 限制同时处理的题目数
//! 2. **单题超时**：每道题从开始处理起计时，超时记为 Timeout 失败
//! 3. **取消**：外部 CancellationToken 触发后，排队中的题目记为 Cancelled
//! 4. **进度**：原子计数器，随时可读
//!
//! 无论成功、失败、超时还是取消，每个下标都恰好对应一条结果

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::models::{FailureKind, Outcome, Partition, QuestionId};
use crate::workflow::{ItemCtx, ItemExecutor};

/// 超时后的处理方式
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutMode {
    /// 在下一个 await 点取消该题
    #[default]
    Abort,
    /// 不再等待，任务在后台继续运行直到自行结束
    Detach,
}

impl TimeoutMode {
    pub fn name(self) -> &'static str {
        match self {
            TimeoutMode::Abort => "abort",
            TimeoutMode::Detach => "detach",
        }
    }
}

impl fmt::Display for TimeoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 处理进度
#[derive(Debug, Default)]
pub struct Progress {
    total: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
}

/// 某一时刻的进度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
}

impl Progress {
    fn add_total(&self, n: usize) {
        self.total.fetch_add(n, Ordering::Relaxed);
    }

    fn record(&self, outcome: &Outcome) {
        if !outcome.is_success() {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.total.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// 有界工作池
pub struct WorkerPool {
    max_workers: usize,
    item_timeout: Duration,
    timeout_mode: TimeoutMode,
    cancel: CancellationToken,
    progress: Arc<Progress>,
}

impl WorkerPool {
    pub fn new(max_workers: usize, item_timeout: Duration, timeout_mode: TimeoutMode) -> Self {
        Self {
            max_workers: max_workers.max(1),
            item_timeout,
            timeout_mode,
            cancel: CancellationToken::new(),
            progress: Arc::new(Progress::default()),
        }
    }

    /// 替换取消令牌，已取消的工作池换上新令牌后可以继续使用
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn progress(&self) -> Arc<Progress> {
        Arc::clone(&self.progress)
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// 并发处理 `indices` 指向的行
    ///
    /// 返回值按行下标排序，长度总是等于 `indices.len()`
    pub async fn run(
        &self,
        label: &str,
        indices: Vec<usize>,
        partition: Arc<Partition>,
        executor: Arc<ItemExecutor>,
    ) -> Vec<(QuestionId, Outcome)> {
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut tasks: JoinSet<(QuestionId, Outcome)> = JoinSet::new();
        let mut in_flight: HashMap<tokio::task::Id, (usize, QuestionId)> = HashMap::new();
        let mut results = Vec::with_capacity(indices.len());

        self.progress.add_total(indices.len());
        debug!("[{}] 提交 {} 道题，并发上限 {}", label, indices.len(), self.max_workers);

        let mut queued = indices.into_iter();
        while let Some(index) = queued.next() {
            let Some(permit) = self.next_permit(&semaphore).await else {
                let cancelled: Vec<usize> = std::iter::once(index).chain(queued.by_ref()).collect();
                warn!("[{}] 🛑 收到取消信号，{} 道排队中的题目不再处理", label, cancelled.len());
                for index in cancelled {
                    let outcome = Outcome::failure(FailureKind::Cancelled, "运行已取消");
                    self.progress.record(&outcome);
                    results.push((index, key_of(&executor, &partition, index), outcome));
                }
                break;
            };

            let key = key_of(&executor, &partition, index);
            let handle = tasks.spawn(process_item(
                permit,
                ItemCtx::new(label, index),
                key.clone(),
                Arc::clone(&partition),
                Arc::clone(&executor),
                self.item_timeout,
                self.timeout_mode,
                Arc::clone(&self.progress),
            ));
            in_flight.insert(handle.id(), (index, key));
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((id, (qid, outcome))) => {
                    let index = in_flight.remove(&id).map_or(usize::MAX, |(index, _)| index);
                    results.push((index, qid, outcome));
                }
                Err(e) => {
                    let Some((index, key)) = in_flight.remove(&e.id()) else {
                        error!("[{}] ❌ 未知任务异常退出: {}", label, e);
                        continue;
                    };
                    error!("[{} 行#{}] ❌ 任务异常退出: {}", label, index, e);
                    let outcome = Outcome::failure(FailureKind::Panicked, e.to_string());
                    self.progress.record(&outcome);
                    results.push((index, key, outcome));
                }
            }
        }

        results.sort_by_key(|(index, _, _)| *index);
        results
            .into_iter()
            .map(|(_, qid, outcome)| (qid, outcome))
            .collect()
    }

    /// 等待下一个许可，取消时返回 None
    async fn next_permit(&self, semaphore: &Arc<Semaphore>) -> Option<OwnedSemaphorePermit> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            permit = Arc::clone(semaphore).acquire_owned() => permit.ok(),
        }
    }
}

fn key_of(executor: &ItemExecutor, partition: &Partition, index: usize) -> QuestionId {
    match partition.rows.get(index) {
        Some(row) => executor.key_for(index, row),
        None => QuestionId::unresolved(index),
    }
}

/// 单题任务：内层任务负责执行，外层负责计时
#[allow(clippy::too_many_arguments)]
async fn process_item(
    permit: OwnedSemaphorePermit,
    ctx: ItemCtx,
    key: QuestionId,
    partition: Arc<Partition>,
    executor: Arc<ItemExecutor>,
    item_timeout: Duration,
    timeout_mode: TimeoutMode,
    progress: Arc<Progress>,
) -> (QuestionId, Outcome) {
    let _permit = permit;

    let worker = {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            match partition.rows.get(ctx.index) {
                Some(row) => executor.execute(&ctx, row).await,
                None => (
                    QuestionId::unresolved(ctx.index),
                    Outcome::failure(FailureKind::Extraction, "行下标超出分区范围"),
                ),
            }
        })
    };
    let abort_handle = worker.abort_handle();

    let pair = match tokio::time::timeout(item_timeout, worker).await {
        Ok(Ok(pair)) => pair,
        Ok(Err(e)) => {
            error!("{} ❌ 任务异常退出: {}", ctx, e);
            (key, Outcome::failure(FailureKind::Panicked, e.to_string()))
        }
        Err(_) => {
            match timeout_mode {
                TimeoutMode::Abort => {
                    abort_handle.abort();
                    warn!("{} ⏰ 超时 ({:?})，已取消", ctx, item_timeout);
                }
                TimeoutMode::Detach => {
                    warn!("{} ⏰ 超时 ({:?})，任务转入后台继续运行", ctx, item_timeout);
                }
            }
            (
                key,
                Outcome::failure(
                    FailureKind::Timeout,
                    format!("超过 {:.1} 秒未完成", item_timeout.as_secs_f64()),
                ),
            )
        }
    };

    progress.record(&pair.1);
    let snapshot = progress.snapshot();
    if snapshot.completed % 50 == 0 {
        info!(
            "📈 进度: {}/{}，失败 {}",
            snapshot.completed, snapshot.total, snapshot.failed
        );
    }
    pair
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Failure, Row};
    use crate::workflow::ItemStrategy;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::AtomicBool;
    use tokio::time::Instant;

    /// 按行中的 `sleep_ms` 休眠，然后返回 `question`
    struct Sleepy {
        running: AtomicUsize,
        peak: AtomicUsize,
        finished: Arc<AtomicBool>,
    }

    impl Sleepy {
        fn new() -> Self {
            Self {
                running: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                finished: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    #[async_trait]
    impl ItemStrategy for Sleepy {
        async fn apply(&self, row: &Row) -> Result<Value, Failure> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let ms = row.get("sleep_ms").and_then(Value::as_u64).unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(ms)).await;

            self.running.fetch_sub(1, Ordering::SeqCst);
            if ms > 0 {
                self.finished.store(true, Ordering::SeqCst);
            }
            Ok(row["question"].clone())
        }
    }

    fn partition(sleeps: &[u64]) -> Arc<Partition> {
        let rows = sleeps
            .iter()
            .enumerate()
            .map(|(i, ms)| {
                json!({"question": format!("q{}", i), "sleep_ms": ms})
                    .as_object()
                    .cloned()
                    .unwrap()
            })
            .collect();
        Arc::new(Partition::new("math", "test", rows))
    }

    fn outcome_of(results: &[(QuestionId, Outcome)], index: usize) -> &Outcome {
        &results
            .iter()
            .find(|(qid, _)| *qid == QuestionId::Index(index))
            .unwrap()
            .1
    }

    #[tokio::test]
    async fn test_every_index_gets_one_outcome() {
        let pool = WorkerPool::new(3, Duration::from_secs(5), TimeoutMode::Abort);
        let executor = Arc::new(ItemExecutor::new(Arc::new(Sleepy::new())));

        let results = pool
            .run("math:test", vec![0, 2, 4], partition(&[0; 6]), executor)
            .await;

        let mut ids: Vec<_> = results.iter().map(|(qid, _)| qid.clone()).collect();
        ids.sort();
        assert_eq!(ids, vec![QuestionId::Index(0), QuestionId::Index(2), QuestionId::Index(4)]);
        assert!(results.iter().all(|(_, o)| o.is_success()));
        assert_eq!(
            pool.progress().snapshot(),
            ProgressSnapshot { total: 3, completed: 3, failed: 0 }
        );
    }

    #[tokio::test]
    async fn test_concurrency_is_capped() {
        let strategy = Arc::new(Sleepy::new());
        let pool = WorkerPool::new(2, Duration::from_secs(5), TimeoutMode::Abort);
        let executor = Arc::new(ItemExecutor::new(strategy.clone()));

        let results = pool
            .run("math:test", (0..8).collect(), partition(&[30; 8]), executor)
            .await;

        assert_eq!(results.len(), 8);
        assert!(strategy.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_timeout_isolates_slow_item() {
        let pool = WorkerPool::new(4, Duration::from_millis(100), TimeoutMode::Abort);
        let executor = Arc::new(ItemExecutor::new(Arc::new(Sleepy::new())));

        let started = Instant::now();
        let results = pool
            .run("math:test", vec![0, 1, 2], partition(&[0, 5_000, 0]), executor)
            .await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(results.len(), 3);
        assert_eq!(outcome_of(&results, 1).failure_kind(), Some(FailureKind::Timeout));
        assert!(outcome_of(&results, 0).is_success());
        assert!(outcome_of(&results, 2).is_success());
        assert_eq!(pool.progress().snapshot().failed, 1);
    }

    #[tokio::test]
    async fn test_abort_mode_stops_timed_out_item() {
        let strategy = Arc::new(Sleepy::new());
        let finished = strategy.finished.clone();
        let pool = WorkerPool::new(1, Duration::from_millis(50), TimeoutMode::Abort);
        let executor = Arc::new(ItemExecutor::new(strategy));

        let results = pool.run("a:b", vec![0], partition(&[300]), executor).await;
        assert_eq!(results[0].1.failure_kind(), Some(FailureKind::Timeout));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_detach_mode_lets_item_finish_in_background() {
        let strategy = Arc::new(Sleepy::new());
        let finished = strategy.finished.clone();
        let pool = WorkerPool::new(1, Duration::from_millis(50), TimeoutMode::Detach);
        let executor = Arc::new(ItemExecutor::new(strategy));

        let results = pool.run("a:b", vec![0], partition(&[300]), executor).await;
        assert_eq!(results[0].1.failure_kind(), Some(FailureKind::Timeout));
        assert!(!finished.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cancelled_pool_records_queued_items_and_can_be_reused() {
        let token = CancellationToken::new();
        token.cancel();
        let pool = WorkerPool::new(2, Duration::from_secs(5), TimeoutMode::Abort)
            .with_cancellation_token(token);
        let executor = Arc::new(ItemExecutor::new(Arc::new(Sleepy::new())));

        let results = pool
            .run("a:b", vec![0, 1, 2, 3, 4], partition(&[0; 5]), executor.clone())
            .await;
        assert_eq!(results.len(), 5);
        assert!(results
            .iter()
            .all(|(_, o)| o.failure_kind() == Some(FailureKind::Cancelled)));

        let pool = pool.with_cancellation_token(CancellationToken::new());
        let results = pool
            .run("a:b", vec![0, 1, 2], partition(&[0; 5]), executor)
            .await;
        assert!(results.iter().all(|(_, o)| o.is_success()));
        assert_eq!(pool.progress().snapshot().completed, 8);
    }

    #[tokio::test]
    async fn test_cancel_mid_run_keeps_in_flight_results() {
        let pool = WorkerPool::new(1, Duration::from_secs(5), TimeoutMode::Abort);
        let token = pool.cancellation_token();
        let executor = Arc::new(ItemExecutor::new(Arc::new(Sleepy::new())));

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            token.cancel();
        });

        let results = pool
            .run("a:b", (0..5).collect(), partition(&[100; 5]), executor)
            .await;

        assert_eq!(results.len(), 5);
        let cancelled = results
            .iter()
            .filter(|(_, o)| o.failure_kind() == Some(FailureKind::Cancelled))
            .count();
        let succeeded = results.iter().filter(|(_, o)| o.is_success()).count();
        assert!(cancelled >= 1);
        assert!(succeeded >= 1);
        assert_eq!(cancelled + succeeded, 5);
    }
}
