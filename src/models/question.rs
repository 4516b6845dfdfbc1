use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// 数据集中的一行记录
///
/// 对编排层来说是不透明的，只有适配器会读取其中的字段
pub type Row = Map<String, Value>;

/// 一个分区：某个 subject 下某个 split 的全部行
#[derive(Debug, Clone, Default)]
pub struct Partition {
    pub subject: String,
    pub split: String,
    pub rows: Vec<Row>,
}

impl Partition {
    pub fn new(subject: impl Into<String>, split: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            subject: subject.into(),
            split: split.into(),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 用于日志的分区标签，例如 `math:test`
    pub fn label(&self) -> String {
        partition_label(&self.subject, &self.split)
    }
}

pub fn partition_label(subject: &str, split: &str) -> String {
    format!("{}:{}", subject, split)
}

/// 题目 ID
///
/// 默认由行在分区中的位置得到（`Index`）；也可以取自行中的某个字段（`Key`，
/// 数值字段同样转为字符串）。同一次运行只使用一种来源，因此两种形式不会
/// 在同一个分区里出现相同的键。序列化为字符串，便于作为 JSON 对象的键。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QuestionId {
    Index(usize),
    Key(String),
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionId::Index(i) => write!(f, "{}", i),
            QuestionId::Key(k) => write!(f, "{}", k),
        }
    }
}

impl QuestionId {
    /// 无法从行中得到 ID 时使用的键，带 `#row` 前缀以免与真实 ID 冲突
    pub fn unresolved(index: usize) -> Self {
        QuestionId::Key(format!("#row{}", index))
    }
}

impl From<usize> for QuestionId {
    fn from(index: usize) -> Self {
        QuestionId::Index(index)
    }
}

impl Serialize for QuestionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// 题目 ID 的来源
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum QuestionIdSource {
    /// 行在分区中的下标
    #[default]
    Position,
    /// 行中的某个字段（字符串或整数）
    Field(String),
}

/// 送给模型的统一输入格式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInput {
    pub question: String,
    pub options: Option<Vec<String>>,
    pub images: Option<Vec<String>>,
}

impl ModelInput {
    pub fn text(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            options: None,
            images: None,
        }
    }

    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = Some(options);
        self
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = Some(images);
        self
    }

    /// 是否为选择题
    pub fn is_mcq(&self) -> bool {
        self.options.as_ref().is_some_and(|o| !o.is_empty())
    }

    /// 是否包含图片
    pub fn has_images(&self) -> bool {
        self.images.as_ref().is_some_and(|i| !i.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_question_id_serializes_as_string_key() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(QuestionId::Index(2), 1);
        map.insert(QuestionId::Index(0), 0);
        let out = serde_json::to_value(&map).unwrap();
        assert_eq!(out, json!({"0": 0, "2": 1}));
    }

    #[test]
    fn test_unresolved_id_is_distinct_from_real_ids() {
        let unresolved = QuestionId::unresolved(3);
        assert_eq!(unresolved.to_string(), "#row3");
        assert_ne!(unresolved, QuestionId::Index(3));
        assert_ne!(unresolved, QuestionId::Key("3".into()));
    }

    #[test]
    fn test_model_input_kinds() {
        let input = ModelInput::text("2+2?");
        assert!(!input.is_mcq());
        assert!(!input.has_images());

        let input = input
            .with_options(vec!["3".into(), "4".into()])
            .with_images(vec![]);
        assert!(input.is_mcq());
        assert!(!input.has_images());
    }
}
