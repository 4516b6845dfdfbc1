//! 内置数据集档案
//!
//! 每个档案描述一个数据集的字段布局，由 `FieldAdapter` 统一解释。

use phf::phf_map;

/// 标准答案的格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerFormat {
    /// 原样返回
    Raw,
    /// 0 起始的下标转换为字母（0 → A）
    IndexToLetter,
}

/// 数据集档案
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetProfile {
    /// 保存结果时使用的短名
    pub short_name: &'static str,
    /// 题干字段（支持 `a.b` 形式的嵌套路径）
    pub question: &'static str,
    /// 选项字段
    pub options: Option<&'static str>,
    /// 图片字段
    pub images: Option<&'static str>,
    /// 标准答案字段
    pub answer: &'static str,
    pub answer_format: AnswerFormat,
    /// 是否需要视觉模型
    pub multimodal: bool,
}

static PROFILES: phf::Map<&'static str, DatasetProfile> = phf_map! {
    "cais/mmlu" => DatasetProfile {
        short_name: "mmlu",
        question: "question",
        options: Some("choices"),
        images: None,
        answer: "answer",
        answer_format: AnswerFormat::IndexToLetter,
        multimodal: false,
    },
    "TIGER-Lab/MMLU-Pro" => DatasetProfile {
        short_name: "mmlu_pro",
        question: "question",
        options: Some("options"),
        images: None,
        answer: "answer",
        answer_format: AnswerFormat::Raw,
        multimodal: false,
    },
    "allenai/ai2_arc" => DatasetProfile {
        short_name: "ai2_arc",
        question: "question",
        options: Some("choices.text"),
        images: None,
        answer: "answerKey",
        answer_format: AnswerFormat::Raw,
        multimodal: false,
    },
    "openai/gsm8k" => DatasetProfile {
        short_name: "gsm8k",
        question: "question",
        options: None,
        images: None,
        answer: "answer",
        answer_format: AnswerFormat::Raw,
        multimodal: false,
    },
    "truthfulqa/truthful_qa" => DatasetProfile {
        short_name: "truthfulqa",
        question: "question",
        options: None,
        images: None,
        answer: "best_answer",
        answer_format: AnswerFormat::Raw,
        multimodal: false,
    },
    "lmms-lab/ai2d" => DatasetProfile {
        short_name: "ai2d",
        question: "question",
        options: Some("options"),
        images: Some("image"),
        answer: "answer",
        answer_format: AnswerFormat::IndexToLetter,
        multimodal: true,
    },
    "derek-thomas/ScienceQA" => DatasetProfile {
        short_name: "scienceqa",
        question: "question",
        options: Some("choices"),
        images: Some("image"),
        answer: "answer",
        answer_format: AnswerFormat::IndexToLetter,
        multimodal: true,
    },
    "xai-org/RealworldQA" => DatasetProfile {
        short_name: "realworldqa",
        question: "question",
        options: None,
        images: Some("image"),
        answer: "answer",
        answer_format: AnswerFormat::Raw,
        multimodal: true,
    },
};

impl DatasetProfile {
    /// 按数据集名称查找（精确匹配）
    pub fn lookup(dataset: &str) -> Option<&'static DatasetProfile> {
        PROFILES.get(dataset)
    }

    /// 按短名查找
    pub fn find_by_short_name(short_name: &str) -> Option<(&'static str, &'static DatasetProfile)> {
        PROFILES
            .entries()
            .find(|(_, p)| p.short_name.eq_ignore_ascii_case(short_name))
            .map(|(name, p)| (*name, p))
    }

    /// 所有内置档案，按名称排序
    pub fn all() -> Vec<(&'static str, &'static DatasetProfile)> {
        let mut entries: Vec<_> = PROFILES.entries().map(|(k, v)| (*k, v)).collect();
        entries.sort_by_key(|(k, _)| *k);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let mmlu = DatasetProfile::lookup("cais/mmlu").unwrap();
        assert_eq!(mmlu.short_name, "mmlu");
        assert_eq!(mmlu.answer_format, AnswerFormat::IndexToLetter);
        assert!(DatasetProfile::lookup("unknown/dataset").is_none());
    }

    #[test]
    fn test_find_by_short_name() {
        let (name, profile) = DatasetProfile::find_by_short_name("GSM8K").unwrap();
        assert_eq!(name, "openai/gsm8k");
        assert!(profile.options.is_none());
    }

    #[test]
    fn test_all_sorted() {
        let all = DatasetProfile::all();
        assert!(all.len() >= 8);
        assert!(all.windows(2).all(|w| w[0].0 <= w[1].0));
    }
}
