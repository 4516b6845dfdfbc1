//! 单道题的处理结果

use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// 失败类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// 适配器无法从行中提取出合法输入
    Extraction,
    /// 模型未能给出答案（配置错误、后端不可达、响应非法）
    Answer,
    /// 超过单题超时时间
    Timeout,
    /// 无法得到题目 ID
    IdDerivation,
    /// 处理过程中 panic
    Panicked,
    /// 排队中被外部取消
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Extraction => "extraction",
            FailureKind::Answer => "answer",
            FailureKind::Timeout => "timeout",
            FailureKind::IdDerivation => "id_derivation",
            FailureKind::Panicked => "panicked",
            FailureKind::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// 失败标记，带可读的原因
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub reason: String,
}

impl Failure {
    pub fn new(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }

    pub fn extraction(reason: impl Into<String>) -> Self {
        Self::new(FailureKind::Extraction, reason)
    }

    pub fn answer(reason: impl Into<String>) -> Self {
        Self::new(FailureKind::Answer, reason)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.reason)
    }
}

/// 题目处理结果：成功值或失败标记
///
/// 成功值由任务决定：生成答案模式下是答案字符串，
/// 保存题目模式下是带标准答案的题目记录。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    Success(Value),
    Failure {
        #[serde(rename = "error")]
        failure: Failure,
    },
}

impl Outcome {
    pub fn success(value: impl Into<Value>) -> Self {
        Outcome::Success(value.into())
    }

    pub fn failure(kind: FailureKind, reason: impl Into<String>) -> Self {
        Outcome::Failure {
            failure: Failure::new(kind, reason),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure { failure } => Some(failure.kind),
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Outcome::Success(v) => Some(v),
            Outcome::Failure { .. } => None,
        }
    }
}

impl From<Result<Value, Failure>> for Outcome {
    fn from(result: Result<Value, Failure>) -> Self {
        match result {
            Ok(value) => Outcome::Success(value),
            Err(failure) => Outcome::Failure { failure },
        }
    }
}
