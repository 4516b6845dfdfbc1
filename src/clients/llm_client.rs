//! OpenAI 兼容的模型客户端
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 默认指向本地 Ollama 的 OpenAI 兼容端点
//! - 有图片时使用视觉模型，否则使用文本模型

use anyhow::{Context, Result};
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
        ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequestArgs, ImageDetail,
        ImageUrl,
    },
    Client,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use regex::Regex;
use serde::Deserialize;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, warn};

use super::ModelClient;
use crate::config::Config;
use crate::models::ModelInput;

/// 支持的图片扩展名
const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// 选项用 A-Z 标注，超过 26 个无法表示
pub const MAX_OPTIONS: usize = 26;

#[derive(Debug, Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

/// OpenAI 兼容客户端
///
/// 职责：
/// - 校验题目输入
/// - 选择题 / 问答题的提示词格式
/// - 选择题答案的规整与校验
/// - 图片编码，图片不可用时退回文本模型
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    text_model: String,
    vision_model: String,
}

impl OpenAiClient {
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            http: reqwest::Client::new(),
            api_base: config.llm_api_base_url.trim_end_matches('/').to_string(),
            api_key: config.llm_api_key.clone(),
            text_model: config.text_model.clone(),
            vision_model: config.vision_model.clone(),
        }
    }

    /// 检查端点上是否已安装所需模型，任一缺失即报错
    pub async fn ensure_models_available(&self, models: &[&str]) -> Result<()> {
        let url = format!("{}/models", self.api_base);
        let list: ModelList = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("无法获取模型列表: {}", url))?
            .json()
            .await
            .with_context(|| format!("模型列表格式错误: {}", url))?;

        let missing = missing_models(&list, models);
        if !missing.is_empty() {
            anyhow::bail!("端点 {} 未安装模型: {}", self.api_base, missing.join(", "));
        }
        debug!("模型检查通过: {:?}", models);
        Ok(())
    }

    /// 通用的 LLM 调用函数
    ///
    /// # 参数
    /// - `model`: 模型名称
    /// - `user_message`: 用户消息内容
    /// - `system_message`: 系统消息（可选）
    /// - `image_urls`: 图片 URL 或 data URL（可选），会追加到用户消息中
    pub async fn send_to_llm(
        &self,
        model: &str,
        user_message: &str,
        system_message: Option<&str>,
        image_urls: Option<&[String]>,
    ) -> Result<String> {
        debug!("调用 LLM API，模型: {}", model);

        let mut messages = Vec::new();

        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = match image_urls {
            Some(urls) if !urls.is_empty() => {
                let mut content_parts = vec![ChatCompletionRequestUserMessageContentPart::Text(
                    ChatCompletionRequestMessageContentPartText {
                        text: user_message.to_string(),
                    },
                )];
                for url in urls {
                    content_parts.push(ChatCompletionRequestUserMessageContentPart::ImageUrl(
                        ChatCompletionRequestMessageContentPartImage {
                            image_url: ImageUrl {
                                url: url.clone(),
                                detail: Some(ImageDetail::Auto),
                            },
                        },
                    ));
                }
                debug!("使用 Vision API，包含 {} 张图片", urls.len());
                ChatCompletionRequestUserMessageArgs::default()
                    .content(ChatCompletionRequestUserMessageContent::Array(content_parts))
                    .build()?
            }
            _ => ChatCompletionRequestUserMessageArgs::default()
                .content(user_message)
                .build()?,
        };
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(messages)
            .temperature(0.0)
            .max_tokens(1024u32)
            .build()?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            anyhow::anyhow!("LLM API 调用失败 (模型: {}): {}", model, e)
        })?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| anyhow::anyhow!("LLM 返回内容为空 (模型: {})", model))?;

        Ok(content.trim().to_string())
    }

    async fn answer_text(&self, input: &ModelInput) -> Result<String> {
        match &input.options {
            Some(options) if !options.is_empty() => {
                let prompt = format_mcq(&input.question, options);
                let response = self.send_to_llm(&self.text_model, &prompt, None, None).await?;
                parse_mcq_response(&response, options.len())
            }
            _ => {
                let response = self
                    .send_to_llm(&self.text_model, &input.question, None, None)
                    .await?;
                non_empty(response)
            }
        }
    }

    async fn answer_with_images(&self, input: &ModelInput, images: &[String]) -> Result<String> {
        let encoded = match self.encode_images(images).await {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!("图片不可用: {}，退回文本模型", e);
                return self.answer_text(input).await;
            }
        };

        match &input.options {
            Some(options) if !options.is_empty() => {
                let prompt = format_mcq(&input.question, options);
                let response = self
                    .send_to_llm(&self.vision_model, &prompt, None, Some(&encoded))
                    .await?;
                parse_mcq_response(&response, options.len())
            }
            _ => {
                let response = self
                    .send_to_llm(&self.vision_model, &input.question, None, Some(&encoded))
                    .await?;
                non_empty(response)
            }
        }
    }

    /// 把图片编码为 data URL：本地文件直接读取，http(s) 图片先下载
    async fn encode_images(&self, images: &[String]) -> Result<Vec<String>> {
        let mut encoded = Vec::with_capacity(images.len());
        for image in images {
            validate_image_ref(image)?;
            let bytes = if is_remote(image) {
                let response = self
                    .http
                    .get(image)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .with_context(|| format!("无法下载图片: {}", image))?;
                response.bytes().await?.to_vec()
            } else {
                tokio::fs::read(image)
                    .await
                    .with_context(|| format!("无法读取图片: {}", image))?
            };
            encoded.push(format!(
                "data:{};base64,{}",
                mime_type(image),
                STANDARD.encode(bytes)
            ));
        }
        Ok(encoded)
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    async fn answer(&self, input: &ModelInput) -> Result<String> {
        validate_input(input)?;
        match &input.images {
            Some(images) if !images.is_empty() => self.answer_with_images(input, images).await,
            _ => self.answer_text(input).await,
        }
    }
}

/// 校验题目输入
pub fn validate_input(input: &ModelInput) -> Result<()> {
    if input.question.trim().is_empty() {
        anyhow::bail!("题干不能为空");
    }
    if let Some(options) = &input.options {
        if options.len() == 1 {
            anyhow::bail!("选择题至少需要两个选项");
        }
        if options.len() > MAX_OPTIONS {
            anyhow::bail!("选项过多: {} 个，最多 {} 个", options.len(), MAX_OPTIONS);
        }
        if options.iter().any(|o| o.trim().is_empty()) {
            anyhow::bail!("选项中存在空字符串");
        }
    }
    if let Some(images) = &input.images {
        if images.iter().any(|i| i.trim().is_empty()) {
            anyhow::bail!("图片列表中存在空路径");
        }
    }
    Ok(())
}

/// 生成选择题提示词
pub fn format_mcq(question: &str, options: &[String]) -> String {
    let options_text: Vec<String> = options
        .iter()
        .enumerate()
        .map(|(i, option)| format!("({}) {}", option_letter(i), option))
        .collect();
    let choices: Vec<String> = (0..options.len())
        .map(|i| format!("({})", option_letter(i)))
        .collect();
    format!(
        "{}\n{}\nPlease answer with one of the following: {}. Do not include any explanation or additional text, just respond with the letter.",
        question,
        options_text.join("\n"),
        choices.join(", ")
    )
}

/// 规整并校验选择题答案，返回单个字母
pub fn parse_mcq_response(response: &str, num_options: usize) -> Result<String> {
    static STRIP: OnceLock<Regex> = OnceLock::new();
    let strip = STRIP.get_or_init(|| Regex::new(r"[().]").expect("valid regex"));

    let normalized = strip.replace_all(response, "").trim().to_uppercase();
    let mut chars = normalized.chars();
    let letter = match (chars.next(), chars.next()) {
        (None, _) => anyhow::bail!("模型返回了空答案"),
        (Some(letter), None) => letter,
        (Some(_), Some(_)) => anyhow::bail!("选择题答案必须是单个字母: {}", normalized),
    };

    if (0..num_options.min(MAX_OPTIONS)).any(|i| option_letter(i) == letter) {
        Ok(letter.to_string())
    } else {
        anyhow::bail!("非法的选择题答案: {}", normalized)
    }
}

fn option_letter(index: usize) -> char {
    debug_assert!(index < MAX_OPTIONS);
    char::from(b'A' + index as u8)
}

/// Ollama 会给模型名加上 `:latest`，比较前去掉
fn missing_models(list: &ModelList, wanted: &[&str]) -> Vec<String> {
    let available: Vec<&str> = list
        .data
        .iter()
        .map(|m| m.id.strip_suffix(":latest").unwrap_or(m.id.as_str()))
        .collect();
    wanted
        .iter()
        .map(|&w| w.strip_suffix(":latest").unwrap_or(w))
        .filter(|w| !available.contains(w))
        .map(str::to_string)
        .collect()
}

fn non_empty(response: String) -> Result<String> {
    if response.is_empty() {
        anyhow::bail!("模型返回了空答案");
    }
    Ok(response)
}

fn is_remote(image: &str) -> bool {
    image.starts_with("http://") || image.starts_with("https://")
}

fn image_extension(image: &str) -> Option<String> {
    let path = image.split(['?', '#']).next().unwrap_or(image);
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

fn validate_image_ref(image: &str) -> Result<()> {
    if !is_remote(image) && !Path::new(image).is_file() {
        anyhow::bail!("图片文件不存在: {}", image);
    }
    match image_extension(image) {
        Some(ext) if IMAGE_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => anyhow::bail!("不支持的图片格式: {}，仅支持 .jpg/.jpeg/.png", image),
    }
}

fn mime_type(image: &str) -> &'static str {
    match image_extension(image).as_deref() {
        Some("png") => "image/png",
        _ => "image/jpeg",
    }
}
