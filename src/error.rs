use std::path::PathBuf;
use thiserror::Error;

/// 运行级错误
///
/// 题目级和分区级的错误都在各自边界被吸收并记录，
/// 只有结果持久化失败会传到调用方。
#[derive(Debug, Error)]
pub enum HarnessError {
    /// 结果保存失败，已完成的工作会丢失
    #[error("结果保存失败 (数据集: {dataset}): {source}")]
    Persistence {
        dataset: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// 配置错误
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// 数据源错误（只在构造阶段出现）
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// 数据源错误
#[derive(Debug, Error)]
pub enum SourceError {
    /// 网络请求失败
    #[error("请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// 服务返回错误状态
    #[error("服务返回错误 ({endpoint}): HTTP {status}")]
    BadStatus { endpoint: String, status: u16 },

    /// 本地文件不存在
    #[error("数据文件不存在: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// 分区不存在
    #[error("分区不存在: {subject}:{split}")]
    UnknownPartition { subject: String, split: String },

    /// 其他加载错误
    #[error(transparent)]
    Load(#[from] anyhow::Error),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置文件读取失败
    #[error("读取配置文件失败 ({}): {source}", path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 配置文件解析失败
    #[error("解析配置文件失败 ({}): {source}", path.display())]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl HarnessError {
    pub fn persistence(dataset: impl Into<String>, source: anyhow::Error) -> Self {
        HarnessError::Persistence {
            dataset: dataset.into(),
            source: source.into(),
        }
    }
}

/// 运行结果类型
pub type HarnessResult<T> = Result<T, HarnessError>;
