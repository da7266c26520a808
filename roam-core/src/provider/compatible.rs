//! Generic OpenAI-compatible provider.
//!
//! Mistral, OpenAI, and Groq all speak the same `/v1/chat/completions`
//! format, so a single implementation covers the three of them.

use super::{ChatMessage, Provider};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A provider that speaks the OpenAI-compatible chat completions API.
pub struct CompatibleProvider {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct CompatibleRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct CompatibleResponse {
    choices: Vec<CompatibleChoice>,
}

#[derive(Debug, Deserialize)]
struct CompatibleChoice {
    message: CompatibleResponseMessage,
}

#[derive(Debug, Deserialize)]
struct CompatibleResponseMessage {
    content: String,
}

impl CompatibleProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(name: &str, base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            client: Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    /// Create a Mistral provider.
    pub fn mistral(api_key: &str, model: Option<&str>, base_url: Option<&str>) -> Self {
        Self::new(
            "mistral",
            base_url.unwrap_or("https://api.mistral.ai"),
            api_key,
            model.unwrap_or("mistral-tiny"),
        )
    }

    /// Create an OpenAI provider.
    pub fn openai(api_key: &str, model: Option<&str>, base_url: Option<&str>) -> Self {
        Self::new(
            "openai",
            base_url.unwrap_or("https://api.openai.com"),
            api_key,
            model.unwrap_or("gpt-3.5-turbo"),
        )
    }

    /// Create a Groq provider.
    pub fn groq(api_key: &str, model: Option<&str>, base_url: Option<&str>) -> Self {
        Self::new(
            "groq",
            base_url.unwrap_or("https://api.groq.com/openai"),
            api_key,
            model.unwrap_or("llama3-8b-8192"),
        )
    }

    #[cfg(test)]
    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Provider for CompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        temperature: f64,
        timeout: Duration,
    ) -> anyhow::Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let request = CompatibleRequest {
            model: &self.model,
            messages,
            temperature,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("{} request failed: {}", self.name, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("{} API error ({}): {}", self.name, status.as_u16(), body);
        }

        let result: CompatibleResponse = response
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("{} returned malformed response: {}", self.name, e))?;

        let choice = result
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("{} returned no choices", self.name))?;

        Ok(choice.message.content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn vendor_constructors() {
        let provider = CompatibleProvider::mistral("k", None, None);
        assert_eq!(provider.name(), "mistral");
        assert_eq!(provider.base_url(), "https://api.mistral.ai");

        let provider = CompatibleProvider::groq("k", Some("mixtral-8x7b-32768"), None);
        assert_eq!(provider.model, "mixtral-8x7b-32768");
    }

    #[test]
    fn strips_trailing_slash() {
        let provider = CompatibleProvider::new("test", "http://localhost:9/", "k", "m");
        assert_eq!(provider.base_url(), "http://localhost:9");
    }

    #[test]
    fn response_deserializes() {
        let json = r#"{
            "choices": [{ "message": { "content": "  PARIS  " } }]
        }"#;
        let resp: CompatibleResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.choices[0].message.content, "  PARIS  ");
    }

    #[tokio::test]
    async fn generate_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "content": "WEATHER\n" } }]
            })))
            .mount(&server)
            .await;

        let provider = CompatibleProvider::new("mistral", &server.uri(), "test-key", "mistral-tiny");
        let out = provider
            .generate(&[ChatMessage::user("what's the weather")], 0.1, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(out, "WEATHER");
    }

    #[tokio::test]
    async fn generate_surfaces_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let provider = CompatibleProvider::new("mistral", &server.uri(), "k", "m");
        let err = provider
            .generate(&[ChatMessage::user("hi")], 0.1, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("429"));
    }
}
