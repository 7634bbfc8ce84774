use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::assessment::error::GradingError;
use crate::assessment::grader::{RubricGrader, RubricRequest, RubricVerdict};
use crate::config::LLMConfig;

const MOCK_SCORE_RATIO: f64 = 0.7;
const MOCK_CODE_QUALITY: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct LlmProvider {
    config: LLMConfig,
    client: reqwest::Client,
}

impl LlmProvider {
    pub fn new(config: &LLMConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            config: config.clone(),
            client,
        }
    }

    /// Rejects a live configuration that has nowhere to send requests.
    pub fn validate_config(config: &LLMConfig) -> Result<(), LlmError> {
        if config.enabled && !config.mock && config.api_url.trim().is_empty() {
            return Err(LlmError::Misconfigured(
                "LLM_ENABLED=true with LLM_MOCK=false requires LLM_API_URL".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String, LlmError> {
        if !self.config.enabled {
            return Err(LlmError::Disabled);
        }
        if self.config.mock {
            return Ok("Mock LLM response".to_string());
        }

        let url = format!("{}/chat/completions", self.config.api_url.trim_end_matches('/'));
        let body = ChatRequest {
            model: &self.config.model,
            messages: &messages,
            temperature: 0.0,
        };

        let mut request = self.client.post(&url).json(&body);
        if !self.config.api_key.is_empty() {
            request = request.bearer_auth(&self.config.api_key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout
            } else {
                LlmError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidReply(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidReply("no choices in completion".to_string()))
    }

    fn rubric_messages(request: &RubricRequest) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(
                "You grade student answers. Reply with JSON only: \
                 {\"score\": <number>, \"feedback\": \"<one or two sentences>\"}.",
            ),
            ChatMessage::user(format!(
                "Question:\n{}\n\nRubric:\n{}\n\nMaximum score: {}\n\nStudent answer:\n{}",
                request.prompt, request.rubric, request.max_score, request.answer
            )),
        ]
    }

    fn quality_messages(code: &str, language: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(
                "You review code that already passes its tests. Rate readability and idiom. \
                 Reply with JSON only: {\"quality\": <number between 0 and 1>}.",
            ),
            ChatMessage::user(format!("Language: {language}\n\n{code}")),
        ]
    }
}

#[async_trait]
impl RubricGrader for LlmProvider {
    async fn grade_text(&self, request: &RubricRequest) -> Result<RubricVerdict, GradingError> {
        if self.config.enabled && self.config.mock {
            return Ok(RubricVerdict {
                score: request.max_score * MOCK_SCORE_RATIO,
                feedback: "Mock evaluation".to_string(),
            });
        }

        let reply = self.chat(Self::rubric_messages(request)).await?;
        let verdict: RubricVerdict = extract_json(&reply)?;
        tracing::debug!(score = verdict.score, "Rubric verdict received");
        Ok(verdict)
    }

    async fn code_quality(&self, code: &str, language: &str) -> Result<f64, GradingError> {
        if self.config.enabled && self.config.mock {
            return Ok(MOCK_CODE_QUALITY);
        }

        let reply = self.chat(Self::quality_messages(code, language)).await?;
        let verdict: QualityVerdict = extract_json(&reply)?;
        if !verdict.quality.is_finite() {
            return Err(GradingError::MalformedResponse(
                "quality is not a number".to_string(),
            ));
        }
        Ok(verdict.quality.clamp(0.0, 1.0))
    }
}

/// Pulls the outermost JSON object out of a model reply, tolerating prose or
/// code fences around it.
fn extract_json<T: serde::de::DeserializeOwned>(reply: &str) -> Result<T, GradingError> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    let slice = match (start, end) {
        (Some(s), Some(e)) if s < e => &reply[s..=e],
        _ => {
            return Err(GradingError::MalformedResponse(
                "reply contains no JSON object".to_string(),
            ))
        }
    };
    serde_json::from_str(slice).map_err(|e| GradingError::MalformedResponse(e.to_string()))
}

#[derive(Debug, Deserialize)]
struct QualityVerdict {
    #[serde(alias = "score")]
    quality: f64,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("llm is disabled")]
    Disabled,
    #[error("llm misconfigured: {0}")]
    Misconfigured(String),
    #[error("llm request timed out")]
    Timeout,
    #[error("llm network error: {0}")]
    Network(String),
    #[error("llm api error: status={status}, message={message}")]
    ApiError { status: u16, message: String },
    #[error("llm reply could not be read: {0}")]
    InvalidReply(String),
}

impl From<LlmError> for GradingError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::InvalidReply(msg) => GradingError::MalformedResponse(msg),
            other => GradingError::Unavailable(other.to_string()),
        }
    }
}
