//! 抽样器
//!
//! 决定一个分区中要处理哪些行

use rand::rngs::StdRng;
use rand::{seq::index, SeedableRng};

/// 行下标抽样器
///
/// 不带种子时每次运行得到不同的子集；注入种子后结果可复现。
#[derive(Debug, Clone, Copy, Default)]
pub struct Sampler {
    seed: Option<u64>,
}

impl Sampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }

    pub fn from_optional_seed(seed: Option<u64>) -> Self {
        Self { seed }
    }

    /// 选择要处理的行下标，结果升序
    ///
    /// - `sample_size` 为 None 或不小于分区大小时，返回全部下标
    /// - 否则无放回地均匀抽取 `sample_size` 个
    pub fn select_indices(&self, partition_size: usize, sample_size: Option<usize>) -> Vec<usize> {
        let k = match sample_size {
            Some(k) if k < partition_size => k,
            _ => return (0..partition_size).collect(),
        };

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut indices = index::sample(&mut rng, partition_size, k).into_vec();
        indices.sort_unstable();
        indices
    }
}
