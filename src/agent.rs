//! Delegation of relationship and join-style requests to an external agent.
//!
//! The router only knows the [`ComplexQueryDelegate`] capability. The HTTP
//! implementation posts `{"query": ...}` to a configured endpoint and expects
//! `{"sql": ..., "result_text": ...}` back, both optional.

use crate::config::AgentConfig;
use crate::error::ServerError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What the agent produced for a complex request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DelegatedAnswer {
    /// SQL the agent generated, if it reports one.
    #[serde(default)]
    pub sql: Option<String>,

    /// The agent's final answer text, passed through unmodified.
    #[serde(default, alias = "resultText")]
    pub result_text: Option<String>,
}

/// Answers natural-language requests the keyword router cannot plan itself.
#[async_trait]
pub trait ComplexQueryDelegate: Send + Sync {
    async fn delegate_complex_query(&self, query: &str) -> Result<DelegatedAnswer, ServerError>;
}

/// [`ComplexQueryDelegate`] over HTTP.
pub struct HttpAgentDelegate {
    url: String,
    http_client: reqwest::Client,
}

#[derive(Serialize)]
struct AgentRequest<'a> {
    query: &'a str,
}

impl HttpAgentDelegate {
    /// Create a delegate posting to `url`.
    pub fn new(url: impl Into<String>, http_client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            http_client,
        }
    }

    /// Build a delegate from configuration, or `None` when no URL is set.
    pub fn from_config(config: &AgentConfig) -> Result<Option<Self>, ServerError> {
        let Some(url) = config.url.as_deref() else {
            return Ok(None);
        };

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ServerError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Some(Self::new(url, http_client)))
    }
}

#[async_trait]
impl ComplexQueryDelegate for HttpAgentDelegate {
    async fn delegate_complex_query(&self, query: &str) -> Result<DelegatedAnswer, ServerError> {
        debug!("Delegating complex query to {}", self.url);

        let response = self
            .http_client
            .post(&self.url)
            .json(&AgentRequest { query })
            .send()
            .await
            .map_err(|e| ServerError::delegate(format!("Agent unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServerError::delegate(format!(
                "Agent returned HTTP {}",
                status
            )));
        }

        response
            .json::<DelegatedAnswer>()
            .await
            .map_err(|e| ServerError::delegate(format!("Agent returned an invalid response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_answer_accepts_both_spellings() {
        let answer: DelegatedAnswer =
            serde_json::from_str(r#"{"sql": "SELECT 1", "resultText": "one"}"#).unwrap();
        assert_eq!(answer.sql.as_deref(), Some("SELECT 1"));
        assert_eq!(answer.result_text.as_deref(), Some("one"));

        let answer: DelegatedAnswer = serde_json::from_str(r#"{"result_text": "two"}"#).unwrap();
        assert!(answer.sql.is_none());
        assert_eq!(answer.result_text.as_deref(), Some("two"));
    }

    #[test]
    fn test_from_config_without_url() {
        let config = AgentConfig {
            url: None,
            timeout: Duration::from_secs(5),
        };
        assert!(HttpAgentDelegate::from_config(&config).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unreachable_agent_is_delegate_error() {
        let config = AgentConfig {
            url: Some("http://127.0.0.1:1/agent".to_string()),
            timeout: Duration::from_millis(500),
        };
        let delegate = HttpAgentDelegate::from_config(&config).unwrap().unwrap();

        let err = delegate.delegate_complex_query("users with roles").await.unwrap_err();
        assert!(matches!(err, ServerError::Delegate(_)));
    }
}
