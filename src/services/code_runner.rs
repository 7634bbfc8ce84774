use std::time::Duration;

use async_trait::async_trait;

use crate::assessment::error::GradingError;
use crate::assessment::grader::{CodeExecutor, ExecutionReport, ExecutionRequest};
use crate::config::SandboxConfig;

/// Sandbox client that posts submissions to `{api_url}/execute`.
#[derive(Debug, Clone)]
pub struct HttpCodeRunner {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, thiserror::Error)]
pub enum CodeRunnerError {
    #[error("sandbox is disabled")]
    Disabled,
    #[error("sandbox url is empty")]
    MissingUrl,
    #[error("sandbox request timed out")]
    Timeout,
    #[error("sandbox network error: {0}")]
    Network(String),
    #[error("sandbox returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("sandbox reply could not be read: {0}")]
    InvalidReply(String),
}

impl From<CodeRunnerError> for GradingError {
    fn from(err: CodeRunnerError) -> Self {
        match err {
            CodeRunnerError::InvalidReply(msg) => GradingError::MalformedResponse(msg),
            CodeRunnerError::Status { status, message } if status < 500 => {
                GradingError::MalformedResponse(format!("status {status}: {message}"))
            }
            other => GradingError::Unavailable(other.to_string()),
        }
    }
}

impl HttpCodeRunner {
    /// Returns `None` when the sandbox is switched off.
    pub fn from_config(config: &SandboxConfig) -> Result<Option<Self>, CodeRunnerError> {
        if !config.enabled {
            return Ok(None);
        }
        if config.api_url.trim().is_empty() {
            return Err(CodeRunnerError::MissingUrl);
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CodeRunnerError::Network(e.to_string()))?;
        Ok(Some(Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            client,
        }))
    }

    pub async fn run(&self, request: &ExecutionRequest) -> Result<ExecutionReport, CodeRunnerError> {
        let url = format!("{}/execute", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CodeRunnerError::Timeout
                } else {
                    CodeRunnerError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CodeRunnerError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let report: ExecutionReport = response
            .json()
            .await
            .map_err(|e| CodeRunnerError::InvalidReply(e.to_string()))?;
        tracing::debug!(
            language = %request.language,
            passed = report.passed,
            score = report.score,
            "Sandbox execution finished"
        );
        Ok(report)
    }
}

#[async_trait]
impl CodeExecutor for HttpCodeRunner {
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionReport, GradingError> {
        Ok(self.run(request).await?)
    }
}
