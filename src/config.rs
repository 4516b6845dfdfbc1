use crate::error::ConfigError;
use crate::models::TaskMode;
use crate::orchestrator::TimeoutMode;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

/// 默认单题超时（秒）
pub const DEFAULT_ITEM_TIMEOUT_SECS: u64 = 100;

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 最大并发工作数（实际取值不超过 CPU 逻辑核数）
    pub max_workers: usize,
    /// 单题超时（秒）
    pub item_timeout_secs: u64,
    /// 超时后的处理方式
    pub timeout_mode: TimeoutMode,
    /// 任务类型
    pub task: TaskMode,
    /// 每个分区的抽样数量，None 表示全部
    pub sample_size: Option<usize>,
    /// 抽样随机种子
    pub seed: Option<u64>,
    /// 题目 ID 取自哪个字段，None 表示按位置
    pub id_field: Option<String>,
    // --- 模型配置 ---
    pub text_model: String,
    pub vision_model: String,
    pub judge_model: String,
    pub llm_api_base_url: String,
    pub llm_api_key: String,
    // --- 数据源配置 ---
    pub hf_api_base_url: String,
    pub hf_token: Option<String>,
    // --- 输出配置 ---
    pub output_dir: String,
    pub log_dir: String,
    pub log_level: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_workers: available_cores(),
            item_timeout_secs: DEFAULT_ITEM_TIMEOUT_SECS,
            timeout_mode: TimeoutMode::default(),
            task: TaskMode::default(),
            sample_size: None,
            seed: None,
            id_field: None,
            text_model: "llama3.2".to_string(),
            vision_model: "llama3.2-vision".to_string(),
            judge_model: "llama3.2".to_string(),
            llm_api_base_url: "http://localhost:11434/v1".to_string(),
            llm_api_key: "ollama".to_string(),
            hf_api_base_url: "https://datasets-server.huggingface.co".to_string(),
            hf_token: None,
            output_dir: "results".to_string(),
            log_dir: "logs".to_string(),
            log_level: "info".to_string(),
            verbose_logging: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default().merge_env()
    }

    /// 从 TOML 文件加载，未出现的项使用默认值，再叠加环境变量
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&content).map_err(|source| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(config.merge_env())
    }

    fn merge_env(self) -> Self {
        self.merge_with(|name| std::env::var(name).ok())
    }

    /// 用 `lookup` 提供的变量覆盖配置，无法解析的值保留原配置
    fn merge_with(self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            max_workers: parsed(&lookup, "MAX_WORKERS").unwrap_or(self.max_workers),
            item_timeout_secs: parsed(&lookup, "ITEM_TIMEOUT_SECS").unwrap_or(self.item_timeout_secs),
            sample_size: parsed(&lookup, "SAMPLE_SIZE").or(self.sample_size),
            seed: parsed(&lookup, "SAMPLE_SEED").or(self.seed),
            text_model: lookup("TEXT_MODEL").unwrap_or(self.text_model),
            vision_model: lookup("VISION_MODEL").unwrap_or(self.vision_model),
            judge_model: lookup("JUDGE_MODEL").unwrap_or(self.judge_model),
            llm_api_base_url: lookup("LLM_API_BASE_URL").unwrap_or(self.llm_api_base_url),
            llm_api_key: lookup("LLM_API_KEY").unwrap_or(self.llm_api_key),
            hf_api_base_url: lookup("HF_API_BASE_URL").unwrap_or(self.hf_api_base_url),
            hf_token: lookup("HF_TOKEN").or(self.hf_token),
            output_dir: lookup("OUTPUT_DIR").unwrap_or(self.output_dir),
            log_dir: lookup("LOG_DIR").unwrap_or(self.log_dir),
            log_level: lookup("LOG_LEVEL").unwrap_or(self.log_level),
            verbose_logging: parsed(&lookup, "VERBOSE_LOGGING").unwrap_or(self.verbose_logging),
            ..self
        }
    }

    /// 校验并修正非法值
    pub fn validated(mut self) -> Self {
        let default = Self::default();
        if self.max_workers == 0 {
            warn!("⚠️ 非法的 max_workers: 0，使用 CPU 核数 {}", default.max_workers);
            self.max_workers = default.max_workers;
        }
        if self.item_timeout_secs == 0 {
            warn!(
                "⚠️ 非法的超时时间: 0，使用默认值 {} 秒",
                DEFAULT_ITEM_TIMEOUT_SECS
            );
            self.item_timeout_secs = DEFAULT_ITEM_TIMEOUT_SECS;
        }
        self
    }

    /// 实际使用的并发数：min(配置值, CPU 核数)
    pub fn effective_workers(&self) -> usize {
        self.max_workers.clamp(1, available_cores())
    }

    pub fn item_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.item_timeout_secs)
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    lookup(name).and_then(|v| v.trim().parse().ok())
}

/// CPU 逻辑核数
pub fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
