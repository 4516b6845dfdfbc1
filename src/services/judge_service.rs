//! 评审服务 - 业务能力层
//!
//! 只负责"让 LLM 按评分标准评价答案"，不关心流程
//!
//! - 单答案评分（pointwise）
//! - 两个答案对比（pairwise）

use anyhow::Result;
use tracing::debug;

use crate::clients::OpenAiClient;
use crate::config::Config;

/// 默认评分标准
pub const DEFAULT_RUBRIC: &str = "\
1. Accuracy: Is the information correct and free from errors?
2. Completeness: Does the response fully address all aspects of the question?
3. Clarity: Is the response well-articulated and easy to understand?
4. Depth of Understanding: Does the response demonstrate a thorough understanding of the topic?
5. Use of Terminology: Are technical terms used correctly and appropriately?
6. Structure and Organization: Is the response logically structured and coherent?
7. Relevance: Does the response stay focused on the question without unnecessary deviation?
8. Integration of Image (if applicable): If an image is provided, does the response effectively utilize it in the explanation?";

const SYSTEM_MESSAGE: &str = "You are a professional evaluator of academic and creative responses.";

/// 评审服务
pub struct JudgeService {
    client: OpenAiClient,
    model_name: String,
}

impl JudgeService {
    pub fn new(config: &Config) -> Self {
        Self {
            client: OpenAiClient::new(config),
            model_name: config.judge_model.clone(),
        }
    }

    /// 按评分标准评价单个答案
    pub async fn evaluate_pointwise(
        &self,
        question: &str,
        answer: &str,
        rubric: Option<&str>,
    ) -> Result<String> {
        debug!("单答案评审，模型: {}", self.model_name);
        let prompt = build_pointwise_prompt(question, answer, rubric.unwrap_or(DEFAULT_RUBRIC));
        self.client
            .send_to_llm(&self.model_name, &prompt, Some(SYSTEM_MESSAGE), None)
            .await
    }

    /// 对比两个答案
    pub async fn evaluate_pairwise(
        &self,
        question: &str,
        answer_1: &str,
        answer_2: &str,
        rubric: Option<&str>,
    ) -> Result<String> {
        debug!("双答案评审，模型: {}", self.model_name);
        let prompt =
            build_pairwise_prompt(question, answer_1, answer_2, rubric.unwrap_or(DEFAULT_RUBRIC));
        self.client
            .send_to_llm(&self.model_name, &prompt, Some(SYSTEM_MESSAGE), None)
            .await
    }
}

fn build_pointwise_prompt(question: &str, answer: &str, rubric: &str) -> String {
    format!(
        r#"You are an expert evaluator. Below is the question, the answer, and the evaluation rubric.

Question: {question}
Answer: {answer}

Evaluation Rubric:
{rubric}

Your response should include:
- A score (0-10) for each criterion with an explanation.
- Additional feedback for the answer."#
    )
}

fn build_pairwise_prompt(question: &str, answer_1: &str, answer_2: &str, rubric: &str) -> String {
    format!(
        r#"You are a highly skilled evaluator. Below is a question and two responses.

Question: {question}

Response 1: {answer_1}
Response 2: {answer_2}

Evaluation Rubric:
{rubric}

Evaluate both responses based on the rubric, and then:
1. Provide scores (0-10) for each response based on the rubric.
2. Explain the strengths and weaknesses of each response.
3. Clearly state which response is better and why."#
    )
}
