/// 任务类型
///
/// 在构造驱动器时确定一次，之后用 match 分发
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, clap::ValueEnum, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskMode {
    /// 调用模型生成答案
    #[default]
    GenerateAnswers,
    /// 只保存题目及标准答案，不调用模型
    SaveQuestions,
}

impl TaskMode {
    pub fn name(self) -> &'static str {
        match self {
            TaskMode::GenerateAnswers => "generate_answers",
            TaskMode::SaveQuestions => "save_questions",
        }
    }

    /// 是否需要模型客户端
    pub fn needs_model(self) -> bool {
        matches!(self, TaskMode::GenerateAnswers)
    }
}

impl std::fmt::Display for TaskMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
