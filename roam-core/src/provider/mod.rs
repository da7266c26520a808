//! Multi-vendor LLM access behind one capability interface.
//!
//! Every vendor adapter implements [`Provider::generate`]; the pipeline
//! never sees vendor wire formats. Selection happens once at startup from
//! configuration, over a closed set of variants: Mistral, OpenAI, and Groq
//! speak the OpenAI-compatible chat completions API ([`CompatibleProvider`]),
//! Anthropic speaks its own messages API ([`AnthropicProvider`]).

mod anthropic;
mod compatible;

pub use anthropic::AnthropicProvider;
pub use compatible::CompatibleProvider;

use async_trait::async_trait;
use roam_common::config::LlmConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// A message in a model conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// Unified interface for LLM vendors.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Vendor name (e.g., "mistral", "anthropic").
    fn name(&self) -> &str;

    /// Generate a completion for the given messages.
    ///
    /// The timeout bounds the whole HTTP exchange; on expiry the call fails
    /// and the caller decides what that failure means for the turn.
    async fn generate(
        &self,
        messages: &[ChatMessage],
        temperature: f64,
        timeout: Duration,
    ) -> anyhow::Result<String>;
}

/// Build the configured provider.
///
/// `base_url` overrides the vendor endpoint for all adapters; tests and
/// self-hosted gateways point it at their own server.
pub fn from_config(llm: &LlmConfig, base_url: Option<&str>) -> anyhow::Result<Arc<dyn Provider>> {
    let model = llm.model.as_deref();
    let keys = &llm.keys;

    let provider: Arc<dyn Provider> = match llm.provider.to_lowercase().as_str() {
        "mistral" => Arc::new(CompatibleProvider::mistral(
            keys.mistral
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("MISTRAL_API_KEY not configured"))?,
            model,
            base_url,
        )),
        "openai" => Arc::new(CompatibleProvider::openai(
            keys.openai
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY not configured"))?,
            model,
            base_url,
        )),
        "groq" => Arc::new(CompatibleProvider::groq(
            keys.groq
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("GROQ_API_KEY not configured"))?,
            model,
            base_url,
        )),
        "anthropic" => Arc::new(AnthropicProvider::new(
            keys.anthropic
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("ANTHROPIC_API_KEY not configured"))?,
            model,
            base_url,
        )),
        other => anyhow::bail!("Unknown LLM provider '{}'", other),
    };

    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use roam_common::config::ApiKeysConfig;

    fn llm_config(provider: &str, keys: ApiKeysConfig) -> LlmConfig {
        LlmConfig {
            provider: provider.into(),
            model: None,
            keys,
        }
    }

    #[test]
    fn selects_mistral() {
        let config = llm_config(
            "mistral",
            ApiKeysConfig {
                mistral: Some("key".into()),
                ..Default::default()
            },
        );
        let provider = from_config(&config, None).unwrap();
        assert_eq!(provider.name(), "mistral");
    }

    #[test]
    fn selects_anthropic() {
        let config = llm_config(
            "anthropic",
            ApiKeysConfig {
                anthropic: Some("key".into()),
                ..Default::default()
            },
        );
        let provider = from_config(&config, None).unwrap();
        assert_eq!(provider.name(), "anthropic");
    }

    #[test]
    fn missing_key_is_an_error() {
        let config = llm_config("openai", ApiKeysConfig::default());
        assert!(from_config(&config, None).is_err());
    }

    #[test]
    fn unknown_vendor_is_an_error() {
        let config = llm_config("watson", ApiKeysConfig::default());
        assert!(from_config(&config, None).is_err());
    }

    #[test]
    fn chat_message_helpers() {
        let msg = ChatMessage::system("be brief");
        assert_eq!(msg.role, "system");
        let msg = ChatMessage::user("hello");
        assert_eq!(msg.role, "user");
        assert_eq!(msg.content, "hello");
    }
}
