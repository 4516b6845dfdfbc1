//! 本地文件数据源
//!
//! 单文件数据集只有一个固定分区 `default:train`

use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::SourceError;
use crate::infrastructure::dataset_source::DatasetSource;
use crate::models::{load_rows_from_file, Partition};

pub const DEFAULT_SUBJECT: &str = "default";
pub const DEFAULT_SPLIT: &str = "train";

/// JSON / JSONL 文件数据源
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DatasetSource for FileSource {
    async fn enumerate_subjects(&self) -> Result<Vec<String>, SourceError> {
        Ok(vec![DEFAULT_SUBJECT.to_string()])
    }

    async fn enumerate_splits(&self, _subject: &str) -> Result<Vec<String>, SourceError> {
        Ok(vec![DEFAULT_SPLIT.to_string()])
    }

    async fn load_partition(&self, subject: &str, split: &str) -> Result<Partition, SourceError> {
        if subject != DEFAULT_SUBJECT || split != DEFAULT_SPLIT {
            return Err(SourceError::UnknownPartition {
                subject: subject.to_string(),
                split: split.to_string(),
            });
        }
        if !self.path.exists() {
            return Err(SourceError::FileNotFound {
                path: self.path.clone(),
            });
        }
        let rows = load_rows_from_file(&self.path).await?;
        Ok(Partition::new(subject, split, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_single_synthetic_partition() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"[{{"problem": "a"}}, {{"problem": "b"}}, {{"problem": "c"}}]"#).unwrap();

        let source = FileSource::new(file.path());
        assert_eq!(source.enumerate_subjects().await.unwrap(), vec!["default"]);
        assert_eq!(source.enumerate_splits("default").await.unwrap(), vec!["train"]);

        let partition = source.load_partition("default", "train").await.unwrap();
        assert_eq!(partition.len(), 3);
        assert_eq!(partition.label(), "default:train");

        assert!(matches!(
            source.load_partition("default", "test").await,
            Err(SourceError::UnknownPartition { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let source = FileSource::new("/no/such/dir/data.json");
        assert!(matches!(
            source.load_partition(DEFAULT_SUBJECT, DEFAULT_SPLIT).await,
            Err(SourceError::FileNotFound { .. })
        ));
    }
}
