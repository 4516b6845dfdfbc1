//! 结果持久化 - 基础设施层
//!
//! 只负责"把结果树写出去"，不关心结果是怎么来的

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::models::ResultTree;

/// 结果持久化
///
/// 每个数据集一次运行只调用一次 `save`
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn save(&self, tree: &ResultTree, dataset_id: &str, suffix: &str) -> Result<PathBuf>;
}

/// 写入 `{output_dir}/{dataset}_{suffix}.json`
pub struct JsonFileSink {
    output_dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// 输出文件路径
    pub fn path_for(&self, dataset_id: &str, suffix: &str) -> PathBuf {
        let file_name = format!(
            "{}_{}.json",
            sanitize_file_stem(dataset_id),
            sanitize_file_stem(suffix)
        );
        self.output_dir.join(file_name)
    }
}

#[async_trait]
impl ResultSink for JsonFileSink {
    async fn save(&self, tree: &ResultTree, dataset_id: &str, suffix: &str) -> Result<PathBuf> {
        let path = self.path_for(dataset_id, suffix);
        debug!("写入结果: {} ({} 条)", path.display(), tree.outcome_count());

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| format!("无法创建输出目录: {}", self.output_dir.display()))?;

        let content = serde_json::to_string_pretty(tree).context("结果序列化失败")?;
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("无法写入结果文件: {}", path.display()))?;

        info!("💾 结果已保存到: {}", path.display());
        Ok(path)
    }
}

/// 数据集名和模型名里的 `/` `:` 等字符不能直接出现在文件名里
pub fn sanitize_file_stem(name: &str) -> String {
    let stem: String = name
        .trim_end_matches(".jsonl")
        .trim_end_matches(".json")
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | ' ' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect();
    stem.trim_start_matches(['.', '_']).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Outcome, QuestionId};
    use serde_json::json;

    #[test]
    fn test_sanitize_file_stem() {
        assert_eq!(sanitize_file_stem("cais/mmlu"), "cais_mmlu");
        assert_eq!(sanitize_file_stem("llama3.2:latest"), "llama3.2_latest");
        assert_eq!(sanitize_file_stem("./data/simple_qa.json"), "data_simple_qa");
    }

    #[tokio::test]
    async fn test_save_writes_nested_json() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(dir.path().join("results"));

        let mut tree = ResultTree::new();
        tree.insert("math", "test", QuestionId::Index(0), Outcome::success(json!("4")));
        tree.ensure_partition("math", "validation");

        let path = sink.save(&tree, "cais/mmlu", "llama3.2").await.unwrap();
        assert_eq!(path.file_name().unwrap(), "cais_mmlu_llama3.2.json");

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, json!({"math": {"test": {"0": "4"}, "validation": {}}}));
    }
}
