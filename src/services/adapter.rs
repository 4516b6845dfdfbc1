//! 数据集适配器 - 业务能力层
//!
//! 只负责"把一行数据转换成统一的题目输入"，不关心流程

use serde_json::Value;
use tracing::debug;

use crate::models::{AnswerFormat, DatasetProfile, ModelInput, Row};

/// 数据集适配器
///
/// 职责：
/// - 从行中提取 `{question, options, images}`
/// - 给出标准答案（仅保存题目模式使用）
/// - 不调用模型，不关心并发
pub trait DatasetAdapter: Send + Sync {
    /// 提取模型输入，字段缺失或不合法时返回 None
    fn extract(&self, row: &Row) -> Option<ModelInput>;

    /// 标准答案
    fn correct_answer(&self, row: &Row) -> Value;
}

/// 按字段名描述的通用适配器
#[derive(Debug, Clone)]
pub struct FieldAdapter {
    question: String,
    options: Option<String>,
    images: Option<String>,
    answer: String,
    answer_format: AnswerFormat,
}

impl FieldAdapter {
    /// 只有题干字段的适配器，标准答案默认取 `answer`
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            options: None,
            images: None,
            answer: "answer".to_string(),
            answer_format: AnswerFormat::Raw,
        }
    }

    pub fn from_profile(profile: &DatasetProfile) -> Self {
        Self {
            question: profile.question.to_string(),
            options: profile.options.map(str::to_string),
            images: profile.images.map(str::to_string),
            answer: profile.answer.to_string(),
            answer_format: profile.answer_format,
        }
    }

    pub fn with_options(mut self, field: impl Into<String>) -> Self {
        self.options = Some(field.into());
        self
    }

    pub fn with_images(mut self, field: impl Into<String>) -> Self {
        self.images = Some(field.into());
        self
    }

    pub fn with_answer(mut self, field: impl Into<String>, format: AnswerFormat) -> Self {
        self.answer = field.into();
        self.answer_format = format;
        self
    }

    fn extract_options(&self, row: &Row) -> Result<Option<Vec<String>>, ()> {
        let Some(field) = &self.options else {
            return Ok(None);
        };
        let items = lookup(row, field).and_then(Value::as_array).ok_or(())?;
        Ok(Some(items.iter().map(value_to_text).collect()))
    }

    fn extract_images(&self, row: &Row) -> Option<Vec<String>> {
        let field = self.images.as_ref()?;
        let mut refs = Vec::new();
        if let Some(value) = lookup(row, field) {
            collect_image_refs(value, &mut refs);
        }
        if refs.is_empty() {
            debug!("图片字段 '{}' 中没有可用的图片", field);
            None
        } else {
            Some(refs)
        }
    }
}

impl DatasetAdapter for FieldAdapter {
    fn extract(&self, row: &Row) -> Option<ModelInput> {
        let question = lookup(row, &self.question)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|q| !q.is_empty());
        let Some(question) = question else {
            debug!("题干字段 '{}' 缺失或为空", self.question);
            return None;
        };

        let Ok(options) = self.extract_options(row) else {
            debug!("选项字段 {:?} 缺失或不是数组", self.options);
            return None;
        };

        Some(ModelInput {
            question: question.to_string(),
            options,
            images: self.extract_images(row),
        })
    }

    fn correct_answer(&self, row: &Row) -> Value {
        let answer = lookup(row, &self.answer).cloned().unwrap_or(Value::Null);
        match self.answer_format {
            AnswerFormat::Raw => answer,
            AnswerFormat::IndexToLetter => index_to_letter(&answer).unwrap_or(answer),
        }
    }
}

/// 按 `a.b.c` 路径查找字段
pub fn lookup<'a>(row: &'a Row, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = row.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 图片可能是字符串、`{"src": ...}` / `{"path": ...}` 对象，或它们的数组
fn collect_image_refs(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) if !s.trim().is_empty() => out.push(s.clone()),
        Value::Object(map) => {
            if let Some(s) = ["src", "path", "url"]
                .iter()
                .find_map(|k| map.get(*k).and_then(Value::as_str))
            {
                out.push(s.to_string());
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_image_refs(v, out)),
        _ => {}
    }
}

fn index_to_letter(value: &Value) -> Option<Value> {
    let index = match value {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    if index >= 26 {
        return None;
    }
    let letter = char::from(b'A' + index as u8);
    Some(Value::String(letter.to_string()))
}
