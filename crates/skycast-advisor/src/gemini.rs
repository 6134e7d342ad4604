use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use skycast_core::Advisor;
use tracing::instrument;

use crate::AdvisorError;

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
    pub temperature: f64,
    pub max_output_tokens: u32,
    pub timeout: Duration,
}

/// Google Gemini `generateContent` client
pub struct GeminiAdvisor {
    client: Client,
    settings: GeminiSettings,
}

impl GeminiAdvisor {
    pub fn new(settings: GeminiSettings) -> Result<Self, AdvisorError> {
        if settings.api_key.trim().is_empty() {
            return Err(AdvisorError::MissingApiKey);
        }
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self { client, settings })
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.settings.endpoint.trim_end_matches('/'),
            self.settings.model
        )
    }

    pub fn request_body(&self, prompt: &str) -> Value {
        json!({
            "contents": [
                {"role": "user", "parts": [{"text": prompt}]}
            ],
            "generationConfig": {
                "temperature": self.settings.temperature,
                "maxOutputTokens": self.settings.max_output_tokens
            }
        })
    }

    /// Text of the first part of the first candidate
    pub fn extract_text(response_body: &Value) -> Result<&str, AdvisorError> {
        response_body
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .ok_or(AdvisorError::MissingText)
    }

    #[instrument(skip_all, fields(model = %self.settings.model))]
    pub async fn generate(&self, prompt: &str) -> Result<String, AdvisorError> {
        let response = self
            .client
            .post(self.url())
            .query(&[("key", self.settings.api_key.as_str())])
            .json(&self.request_body(prompt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdvisorError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let response_body: Value = response.json().await?;
        let text = Self::extract_text(&response_body)?;
        tracing::debug!(chars = text.len(), "advice generated");
        Ok(text.to_string())
    }
}

#[async_trait::async_trait]
impl Advisor for GeminiAdvisor {
    async fn advise(&self, prompt: &str) -> anyhow::Result<String> {
        Ok(self.generate(prompt).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn advisor() -> GeminiAdvisor {
        GeminiAdvisor::new(GeminiSettings {
            endpoint: "https://llm.example.test/".into(),
            model: "gemini-2.0-flash-exp".into(),
            api_key: "k".into(),
            temperature: 0.8,
            max_output_tokens: 250,
            timeout: Duration::from_secs(1),
        })
        .unwrap()
    }

    #[test]
    fn request_shape() {
        let advisor = advisor();
        assert_eq!(
            advisor.url(),
            "https://llm.example.test/v1beta/models/gemini-2.0-flash-exp:generateContent"
        );
        let body = advisor.request_body("hello");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(body["generationConfig"]["temperature"], 0.8);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 250);
    }

    #[test]
    fn first_candidate_text_is_returned_verbatim() {
        let body = json!({"candidates": [
            {"content": {"parts": [{"text": "  Bring a jacket.\n"}, {"text": "ignored"}]}},
            {"content": {"parts": [{"text": "second"}]}}
        ]});
        assert_eq!(GeminiAdvisor::extract_text(&body).unwrap(), "  Bring a jacket.\n");
        assert!(matches!(
            GeminiAdvisor::extract_text(&json!({"candidates": []})),
            Err(AdvisorError::MissingText)
        ));
    }

    #[test]
    fn blank_key_is_rejected() {
        let err = GeminiAdvisor::new(GeminiSettings {
            api_key: " ".into(),
            ..advisor().settings
        })
        .err();
        assert!(matches!(err, Some(AdvisorError::MissingApiKey)));
    }
}
