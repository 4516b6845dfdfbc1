//! 结果树：subject → split → 题目 ID → 结果

use crate::models::outcome::{FailureKind, Outcome};
use crate::models::question::QuestionId;
use serde::Serialize;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

pub type SplitResults = BTreeMap<QuestionId, Outcome>;

/// 一次运行累积的全部结果
///
/// 只由排空分区的任务修改，工作任务不会直接写入
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResultTree {
    subjects: BTreeMap<String, BTreeMap<String, SplitResults>>,
}

impl ResultTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// 确保 subject/split 条目存在（即使没有任何题目）
    pub fn ensure_partition(&mut self, subject: &str, split: &str) -> &mut SplitResults {
        self.subjects
            .entry(subject.to_string())
            .or_default()
            .entry(split.to_string())
            .or_default()
    }

    /// 插入一条结果
    ///
    /// 已存在同一个题目 ID 时保留原结果，返回 false
    pub fn insert(
        &mut self,
        subject: &str,
        split: &str,
        qid: QuestionId,
        outcome: Outcome,
    ) -> bool {
        match self.ensure_partition(subject, split).entry(qid) {
            Entry::Vacant(slot) => {
                slot.insert(outcome);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    /// 合并另一棵树，分区级别覆盖
    pub fn merge(&mut self, other: ResultTree) {
        for (subject, splits) in other.subjects {
            let target = self.subjects.entry(subject).or_default();
            for (split, results) in splits {
                target.insert(split, results);
            }
        }
    }

    pub fn get(&self, subject: &str, split: &str) -> Option<&SplitResults> {
        self.subjects.get(subject).and_then(|s| s.get(split))
    }

    pub fn subjects(&self) -> impl Iterator<Item = &str> {
        self.subjects.keys().map(String::as_str)
    }

    pub fn splits(&self, subject: &str) -> Vec<&str> {
        self.subjects
            .get(subject)
            .map(|s| s.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    /// 所有分区中的结果总数
    pub fn outcome_count(&self) -> usize {
        self.outcomes().count()
    }

    /// 所有分区中的失败数
    pub fn failure_count(&self) -> usize {
        self.outcomes().filter(|o| !o.is_success()).count()
    }

    /// 真正处理过的题目数，不含因取消而未执行的
    pub fn completed_count(&self) -> usize {
        self.outcomes()
            .filter(|o| o.failure_kind() != Some(FailureKind::Cancelled))
            .count()
    }

    fn outcomes(&self) -> impl Iterator<Item = &Outcome> {
        self.subjects
            .values()
            .flat_map(|splits| splits.values())
            .flat_map(|results| results.values())
    }
}
