//! 题目处理上下文
//!
//! 封装"我正在处理哪个分区的第几行"这一信息

use std::fmt::Display;

/// 题目处理上下文
#[derive(Debug, Clone)]
pub struct ItemCtx {
    /// 分区标签，例如 `math:test`
    pub partition: String,

    /// 行在分区中的下标
    pub index: usize,
}

impl ItemCtx {
    pub fn new(partition: impl Into<String>, index: usize) -> Self {
        Self {
            partition: partition.into(),
            index,
        }
    }
}

impl Display for ItemCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} 行#{}]", self.partition, self.index)
    }
}
