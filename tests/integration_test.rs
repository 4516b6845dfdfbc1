use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_test::{assert_err, assert_ok};
use tracing::Span;

use sopho_bench::clients::{ClientPool, ModelClient};
use sopho_bench::error::{HarnessError, SourceError};
use sopho_bench::infrastructure::{DatasetSource, FileSource, JsonFileSink, ResultSink};
use sopho_bench::models::{AnswerFormat, FailureKind, ModelInput, Partition, QuestionId, ResultTree, Row};
use sopho_bench::orchestrator::{DatasetDriver, PartitionAggregator, TimeoutMode, WorkerPool};
use sopho_bench::services::FieldAdapter;
use sopho_bench::workflow::{ItemExecutor, Sampler, TaskStrategy};

/// 内存中的数据集：subject → split → 行
struct MemorySource {
    partitions: Vec<(String, String, Vec<Row>)>,
}

impl MemorySource {
    fn new(partitions: Vec<(&str, &str, Vec<Value>)>) -> Arc<Self> {
        let partitions = partitions
            .into_iter()
            .map(|(subject, split, rows)| {
                let rows = rows
                    .into_iter()
                    .map(|v| v.as_object().cloned().unwrap())
                    .collect();
                (subject.to_string(), split.to_string(), rows)
            })
            .collect();
        Arc::new(Self { partitions })
    }
}

#[async_trait]
impl DatasetSource for MemorySource {
    async fn enumerate_subjects(&self) -> Result<Vec<String>, SourceError> {
        let mut subjects: Vec<String> = Vec::new();
        for (subject, _, _) in &self.partitions {
            if !subjects.contains(subject) {
                subjects.push(subject.clone());
            }
        }
        Ok(subjects)
    }

    async fn enumerate_splits(&self, subject: &str) -> Result<Vec<String>, SourceError> {
        Ok(self
            .partitions
            .iter()
            .filter(|(s, _, _)| s == subject)
            .map(|(_, split, _)| split.clone())
            .collect())
    }

    async fn load_partition(&self, subject: &str, split: &str) -> Result<Partition, SourceError> {
        self.partitions
            .iter()
            .find(|(s, p, _)| s == subject && p == split)
            .map(|(_, _, rows)| Partition::new(subject, split, rows.clone()))
            .ok_or_else(|| SourceError::UnknownPartition {
                subject: subject.into(),
                split: split.into(),
            })
    }
}

/// 题干里含 "slow" 时休眠很久，其余立即回答
struct FakeModel;

#[async_trait]
impl ModelClient for FakeModel {
    async fn answer(&self, input: &ModelInput) -> anyhow::Result<String> {
        if input.question.contains("slow") {
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
        Ok(format!("answer: {}", input.question))
    }
}

#[derive(Default)]
struct RecordingSink {
    saved: Mutex<Vec<(String, String, ResultTree)>>,
}

#[async_trait]
impl ResultSink for RecordingSink {
    async fn save(&self, tree: &ResultTree, dataset_id: &str, suffix: &str) -> anyhow::Result<PathBuf> {
        self.saved
            .lock()
            .unwrap()
            .push((dataset_id.to_string(), suffix.to_string(), tree.clone()));
        Ok(PathBuf::from("memory.json"))
    }
}

fn generate_driver(
    source: Arc<dyn DatasetSource>,
    sink: Arc<dyn ResultSink>,
    timeout: Duration,
) -> DatasetDriver {
    let adapter = Arc::new(FieldAdapter::new("problem"));
    let pool = ClientPool::new(|| Ok(Box::new(FakeModel) as Box<dyn ModelClient>));
    let strategy = TaskStrategy::generate_answers(adapter, pool);

    let aggregator = PartitionAggregator::new(
        source,
        WorkerPool::new(4, timeout, TimeoutMode::Abort),
        Arc::new(ItemExecutor::new(Arc::new(strategy))),
        Sampler::with_seed(42),
    );
    DatasetDriver::new("demo/set", "fake-model", aggregator, sink, Span::none())
}

#[tokio::test]
async fn test_math_partition_end_to_end() {
    let source = MemorySource::new(vec![(
        "math",
        "test",
        vec![
            json!({"problem": "1+1"}),
            json!({"text": "没有 problem 字段"}),
            json!({"problem": "2+2"}),
        ],
    )]);
    let sink = Arc::new(RecordingSink::default());

    let summary = assert_ok!(
        generate_driver(source, sink.clone(), Duration::from_secs(5))
            .run(None)
            .await
    );
    assert_eq!(summary.outcomes, 3);
    assert_eq!(summary.failures, 1);

    let saved = sink.saved.lock().unwrap();
    assert_eq!(saved.len(), 1);
    let (dataset, suffix, tree) = &saved[0];
    assert_eq!(dataset, "demo/set");
    assert_eq!(suffix, "fake-model");

    let results = tree.get("math", "test").unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(
        results[&QuestionId::Index(0)].as_value(),
        Some(&json!("answer: 1+1"))
    );
    assert_eq!(
        results[&QuestionId::Index(1)].failure_kind(),
        Some(FailureKind::Extraction)
    );
    assert_eq!(
        results[&QuestionId::Index(2)].as_value(),
        Some(&json!("answer: 2+2"))
    );
}

#[tokio::test]
async fn test_persistence_called_once_with_all_partitions() {
    let row = || json!({"problem": "x"});
    let source = MemorySource::new(vec![
        ("algebra", "test", vec![row(), row()]),
        ("algebra", "validation", vec![row()]),
        ("biology", "test", vec![]),
        ("chemistry", "dev", vec![row(), row(), row()]),
    ]);
    let sink = Arc::new(RecordingSink::default());

    assert_ok!(
        generate_driver(source, sink.clone(), Duration::from_secs(5))
            .run(Some(2))
            .await
    );

    let saved = sink.saved.lock().unwrap();
    assert_eq!(saved.len(), 1);
    let tree = &saved[0].2;
    assert_eq!(
        tree.subjects().collect::<Vec<_>>(),
        vec!["algebra", "biology", "chemistry"]
    );
    assert_eq!(tree.splits("algebra"), vec!["test", "validation"]);
    assert_eq!(tree.splits("biology"), vec!["test"]);
    assert_eq!(tree.splits("chemistry"), vec!["dev"]);
    assert_eq!(tree.get("chemistry", "dev").unwrap().len(), 2);
    assert!(tree.get("biology", "test").unwrap().is_empty());
}

#[tokio::test]
async fn test_slow_item_times_out_without_blocking_partition() {
    let source = MemorySource::new(vec![(
        "math",
        "test",
        vec![
            json!({"problem": "fast 1"}),
            json!({"problem": "slow"}),
            json!({"problem": "fast 2"}),
        ],
    )]);
    let sink = Arc::new(RecordingSink::default());

    let started = std::time::Instant::now();
    assert_ok!(
        generate_driver(source, sink.clone(), Duration::from_millis(100))
            .run(None)
            .await
    );
    assert!(started.elapsed() < Duration::from_secs(3));

    let saved = sink.saved.lock().unwrap();
    let results = saved[0].2.get("math", "test").unwrap();
    assert_eq!(
        results[&QuestionId::Index(1)].failure_kind(),
        Some(FailureKind::Timeout)
    );
    assert!(results[&QuestionId::Index(0)].is_success());
    assert!(results[&QuestionId::Index(2)].is_success());
}

#[tokio::test]
async fn test_save_questions_from_jsonl_file() {
    let dir = tempfile::tempdir().unwrap();
    let data_path = dir.path().join("quiz.jsonl");
    std::fs::write(
        &data_path,
        concat!(
            r#"{"question": "Which is a prime?", "choices": ["4", "7", "9"], "answer": 1}"#,
            "\n",
            r#"{"question": "Which is even?", "choices": ["3", "8"], "answer": 1}"#,
            "\n"
        ),
    )
    .unwrap();

    let adapter = FieldAdapter::new("question")
        .with_options("choices")
        .with_answer("answer", AnswerFormat::IndexToLetter);
    let aggregator = PartitionAggregator::new(
        Arc::new(FileSource::new(&data_path)),
        WorkerPool::new(2, Duration::from_secs(5), TimeoutMode::Abort),
        Arc::new(ItemExecutor::new(Arc::new(TaskStrategy::save_questions(
            Arc::new(adapter),
        )))),
        Sampler::new(),
    );
    let output_dir = dir.path().join("results");
    let sink = Arc::new(JsonFileSink::new(&output_dir));
    let driver = DatasetDriver::new("quiz", "questions", aggregator, sink, Span::none());

    let summary = assert_ok!(driver.run(None).await);
    let path = summary.saved_to.unwrap();
    assert_eq!(path, output_dir.join("quiz_questions.json"));

    let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(
        written,
        json!({
            "default": {
                "train": {
                    "0": {"question": "Which is a prime?", "options": ["4", "7", "9"], "answer": "B"},
                    "1": {"question": "Which is even?", "options": ["3", "8"], "answer": "B"}
                }
            }
        })
    );
}

#[tokio::test]
async fn test_unwritable_output_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    // 输出目录被同名文件占用
    let blocker = dir.path().join("results");
    std::fs::write(&blocker, "not a directory").unwrap();

    let source = MemorySource::new(vec![("math", "test", vec![json!({"problem": "1+1"})])]);
    let sink: Arc<dyn ResultSink> = Arc::new(JsonFileSink::new(&blocker));

    let err = assert_err!(
        generate_driver(source, sink, Duration::from_secs(5))
            .run(None)
            .await
    );
    assert!(matches!(err, HarnessError::Persistence { .. }));
}
