/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use crate::config::Config;
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// 日志文件名
pub const LOG_FILE_NAME: &str = "sopho_bench.log";

/// 日志配置
///
/// 由 main 显式构造并传入，不在模块加载时修改全局状态
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// 过滤规则，例如 `info` 或 `sopho_bench=debug`
    pub level: String,
    /// 日志文件目录，None 表示只输出到终端
    pub log_dir: Option<PathBuf>,
}

impl LogConfig {
    pub fn from_config(config: &Config) -> Self {
        let level = if config.verbose_logging {
            "debug".to_string()
        } else {
            config.log_level.clone()
        };
        Self {
            level,
            log_dir: Some(PathBuf::from(&config.log_dir)),
        }
    }
}

/// 初始化日志
///
/// 终端输出 + 可选的非阻塞日志文件。返回的 guard 必须持有到程序结束，
/// 否则文件中的缓冲日志会丢失。
pub fn init(log_config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_config.level))
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(filter());

    let Some(log_dir) = &log_config.log_dir else {
        tracing_subscriber::registry()
            .with(stderr_layer)
            .try_init()
            .context("日志初始化失败")?;
        return Ok(None);
    };

    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("无法创建日志目录: {}", log_dir.display()))?;
    let file_appender = tracing_appender::rolling::never(log_dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(non_blocking)
        .with_filter(filter());

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("日志初始化失败")?;

    Ok(Some(guard))
}

/// 记录程序启动信息
pub fn log_startup(dataset: &str, config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 开始评测数据集: {}", dataset);
    info!(
        "📊 任务: {} | 并发数: {} | 单题超时: {} 秒 | 超时策略: {}",
        config.task,
        config.effective_workers(),
        config.item_timeout_secs,
        config.timeout_mode
    );
    match config.sample_size {
        Some(n) => info!("🎲 每个分区抽样 {} 道题", n),
        None => info!("📋 处理全部题目"),
    }
    info!("{}", "=".repeat(60));
}

/// 记录分区开始信息
pub fn log_partition_start(label: &str, total_rows: usize, selected: usize) {
    info!("\n{}", "─".repeat(60));
    info!("[{}] 📦 开始处理分区", label);
    info!("[{}] 📄 共 {} 行，本次处理 {} 道题", label, total_rows, selected);
}

/// 记录分区完成信息
pub fn log_partition_complete(label: &str, success: usize, total: usize) {
    info!(
        "[{}] ✓ 分区完成: 成功 {}/{}，失败 {}",
        label,
        success,
        total,
        total - success
    );
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
pub fn log_final_stats(
    dataset: &str,
    merged: usize,
    skipped: usize,
    outcomes: usize,
    failures: usize,
    elapsed_secs: f64,
) {
    info!("\n{}", "=".repeat(60));
    info!("📊 数据集 {} 处理完成", dataset);
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 分区: 完成 {}，跳过 {}", merged, skipped);
    info!("📝 题目: 成功 {}/{}，失败 {}", outcomes - failures, outcomes, failures);
    info!("⏱️ 总耗时: {:.2} 秒", elapsed_secs);
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大字符数
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
