//! LLM 评分服务 - 业务能力层
//!
//! 只负责"让 LLM 给主观题打分"，不关心提交记录和流程
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 Azure, Gemini, Doubao 等）

use anyhow::Result;
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::grader::{GradeRequest, GradeResult, Grader};
use crate::config::Config;
use crate::error::GraderError;

const SYSTEM_MESSAGE: &str = "You are an expert educator evaluating student responses. \
                              Be fair, constructive, and provide specific feedback. \
                              Always answer with a single JSON object.";

/// 两次重试之间的基础等待
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// LLM 评分服务
///
/// 职责：
/// - 调用 LLM API 给单道主观题打分
/// - 解析并校验 JSON 返回
/// - 失败时有限次重试
pub struct LlmGrader {
    client: Client<OpenAIConfig>,
    model_name: String,
    max_attempts: usize,
}

impl LlmGrader {
    /// 创建新的 LLM 评分服务
    pub fn new(config: &Config) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        let client = Client::with_config(openai_config);

        Self {
            client,
            model_name: config.llm_model_name.clone(),
            max_attempts: config.llm_max_attempts.max(1),
        }
    }

    /// 组装一次评分对话：系统消息在前，用户消息在后
    fn build_chat_request(
        &self,
        system_message: &str,
        user_message: &str,
    ) -> Result<CreateChatCompletionRequest> {
        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(system_message)
            .build()?;
        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(vec![
                ChatCompletionRequestMessage::System(system_msg),
                ChatCompletionRequestMessage::User(user_msg),
            ])
            .temperature(0.3)
            .max_tokens(500u32)
            .build()?;
        Ok(request)
    }

    /// 发送一次对话，返回去掉首尾空白的回复
    pub async fn send_to_llm(&self, system_message: &str, user_message: &str) -> Result<String> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", user_message.len());

        let request = self.build_chat_request(system_message, user_message)?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            anyhow::anyhow!("LLM API 调用失败: {}", e)
        })?;

        debug!("LLM API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| anyhow::anyhow!("LLM 返回内容为空"))?;

        Ok(content.trim().to_string())
    }

    /// 给一道题打分，带重试
    pub async fn evaluate_one(&self, request: &GradeRequest) -> Result<GradeResult, GraderError> {
        let user_message = build_grade_message(request);
        let mut last_error = GraderError::Unavailable {
            attempts: 0,
            reason: "未发起请求".to_string(),
        };

        for attempt in 1..=self.max_attempts {
            let outcome = match self.send_to_llm(SYSTEM_MESSAGE, &user_message).await {
                Ok(response) => parse_grade_response(&response, request.max_points),
                Err(e) => Err(GraderError::Unavailable {
                    attempts: attempt,
                    reason: e.to_string(),
                }),
            };

            match outcome {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    warn!(
                        "⚠️ 评分失败 (第 {}/{} 次): {}，稍后重试",
                        attempt, self.max_attempts, e
                    );
                    tokio::time::sleep(RETRY_BASE_DELAY * attempt as u32).await;
                    last_error = e;
                }
                Err(e) => {
                    last_error = e;
                    break;
                }
            }
        }

        Err(GraderError::Unavailable {
            attempts: self.max_attempts,
            reason: last_error.to_string(),
        })
    }
}

/// 构建评分提示词
fn build_grade_message(request: &GradeRequest) -> String {
    let answer = if request.answer_text.trim().is_empty() {
        "(no answer)"
    } else {
        request.answer_text.as_str()
    };

    format!(
        r#"Evaluate the following student answer for the given question.

Question: {}
Student Answer: {}
Maximum Points: {}

Please provide:
1. A score out of {} points
2. Constructive feedback
3. Suggestions for improvement

Respond in JSON format with fields: score, feedback, suggestions"#,
        request.prompt, answer, request.max_points, request.max_points
    )
}

fn json_object_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("JSON 正则无效"))
}

/// 解析 LLM 返回的 JSON，允许外面包着代码块或说明文字
fn parse_grade_response(response: &str, max_points: u32) -> Result<GradeResult, GraderError> {
    let malformed = |reason: String| GraderError::MalformedResponse {
        response: crate::utils::logging::truncate_text(response, 200),
        reason,
    };

    let json = json_object_regex()
        .find(response)
        .map(|m| m.as_str())
        .ok_or_else(|| malformed("未找到 JSON 对象".to_string()))?;

    let result: GradeResult =
        serde_json::from_str(json).map_err(|e| malformed(e.to_string()))?;

    Ok(result.clamped(max_points))
}

#[async_trait]
impl Grader for LlmGrader {
    async fn evaluate_batch(
        &self,
        requests: &[GradeRequest],
    ) -> Result<Vec<GradeResult>, GraderError> {
        info!(
            "🤖 LLM 评分 {} 道主观题 (模型: {})",
            requests.len(),
            self.model_name
        );

        futures::future::join_all(requests.iter().map(|r| self.evaluate_one(r)))
            .await
            .into_iter()
            .collect()
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}
