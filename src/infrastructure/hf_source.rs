//! HuggingFace 数据源
//!
//! 通过 datasets-server 的 REST 接口读取数据：
//! - `/splits` 列出所有 config / split
//! - `/rows` 分页读取行，每页最多 100 行

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::SourceError;
use crate::infrastructure::dataset_source::DatasetSource;
use crate::models::{Partition, Row};

/// `/rows` 接口的单页上限
const PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Deserialize)]
struct SplitEntry {
    config: String,
    split: String,
}

#[derive(Debug, Deserialize)]
struct SplitsResponse {
    splits: Vec<SplitEntry>,
}

#[derive(Debug, Deserialize)]
struct RowEntry {
    row: Row,
}

#[derive(Debug, Deserialize)]
struct RowsResponse {
    rows: Vec<RowEntry>,
    num_rows_total: usize,
}

/// HuggingFace 数据集
pub struct HuggingFaceSource {
    dataset: String,
    base_url: String,
    token: Option<String>,
    http: reqwest::Client,
    splits: OnceCell<Vec<SplitEntry>>,
}

impl HuggingFaceSource {
    pub fn new(dataset: impl Into<String>, base_url: &str, token: Option<String>) -> Self {
        Self {
            dataset: dataset.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            http: reqwest::Client::new(),
            splits: OnceCell::new(),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, SourceError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let mut request = self.http.get(&url).query(query);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|source| SourceError::RequestFailed {
                endpoint: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::BadStatus {
                endpoint: url,
                status: status.as_u16(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|source| SourceError::RequestFailed {
                endpoint: url,
                source,
            })
    }

    async fn split_entries(&self) -> Result<&[SplitEntry], SourceError> {
        let entries = self
            .splits
            .get_or_try_init(|| async {
                let response: SplitsResponse = self
                    .get_json("splits", &[("dataset", self.dataset.clone())])
                    .await?;
                debug!("数据集 {} 共 {} 个分区", self.dataset, response.splits.len());
                Ok::<_, SourceError>(response.splits)
            })
            .await?;
        Ok(entries.as_slice())
    }
}

#[async_trait]
impl DatasetSource for HuggingFaceSource {
    async fn enumerate_subjects(&self) -> Result<Vec<String>, SourceError> {
        Ok(unique_configs(self.split_entries().await?))
    }

    async fn enumerate_splits(&self, subject: &str) -> Result<Vec<String>, SourceError> {
        Ok(splits_of(self.split_entries().await?, subject))
    }

    async fn load_partition(&self, subject: &str, split: &str) -> Result<Partition, SourceError> {
        info!("正在加载: {} [{}:{}]", self.dataset, subject, split);

        let mut rows = Vec::new();
        loop {
            let page: RowsResponse = self
                .get_json(
                    "rows",
                    &[
                        ("dataset", self.dataset.clone()),
                        ("config", subject.to_string()),
                        ("split", split.to_string()),
                        ("offset", rows.len().to_string()),
                        ("length", PAGE_SIZE.to_string()),
                    ],
                )
                .await?;

            let fetched = page.rows.len();
            rows.extend(page.rows.into_iter().map(|entry| entry.row));

            if fetched == 0 || rows.len() >= page.num_rows_total {
                break;
            }
        }

        info!("成功加载 {} 行 [{}:{}]", rows.len(), subject, split);
        Ok(Partition::new(subject, split, rows))
    }
}

fn unique_configs(entries: &[SplitEntry]) -> Vec<String> {
    let mut configs: Vec<String> = Vec::new();
    for entry in entries {
        if !configs.contains(&entry.config) {
            configs.push(entry.config.clone());
        }
    }
    configs
}

fn splits_of(entries: &[SplitEntry], subject: &str) -> Vec<String> {
    entries
        .iter()
        .filter(|e| e.config == subject)
        .map(|e| e.split.clone())
        .collect()
}
