//! Prompted LLM calls used by the resolvers.
//!
//! Each call analyzes the current message alone; conversation history is
//! never sent. Session state, not message replay, carries context.

use crate::provider::{ChatMessage, Provider};
use crate::types::Intent;
use std::sync::Arc;
use std::time::Duration;

/// Timeout for extraction and classification calls.
const RESOLVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for attraction suggestion calls (longer output).
const SUGGEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Low temperature for deterministic classification.
const RESOLVE_TEMPERATURE: f64 = 0.1;

/// Filler phrases an extraction call sometimes echoes back instead of
/// answering "NONE". Never literal locations.
const FILLER_PHRASES: &[&str] = &[
    "there",
    "here",
    "more",
    "some more",
    "what else",
    "anything else",
    "other places",
];

/// Client for the extraction/classification/suggestion collaborators.
#[derive(Clone)]
pub struct LlmClient {
    provider: Arc<dyn Provider>,
}

impl LlmClient {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }

    /// Extract a location explicitly mentioned in this message, if any.
    ///
    /// Returns `None` for "NONE", empty output, filler phrases, and any
    /// provider error or timeout; all of these mean "no explicit location
    /// in this message" to the caller.
    pub async fn extract_location(&self, message: &str) -> Option<String> {
        let system = "You are a location extraction assistant. \
            Extract ONLY the city or location name from THIS SPECIFIC message. \
            Do NOT consider any previous conversation or context. \
            If this message contains a location (city, place, country), return ONLY that location name. \
            If this message says 'there', 'suggest more', 'what else', or does NOT explicitly mention a location, return 'NONE'. \
            Return ONLY the location name or 'NONE', nothing else.";

        let messages = [ChatMessage::system(system), ChatMessage::user(message)];

        let content = match self
            .provider
            .generate(&messages, RESOLVE_TEMPERATURE, RESOLVE_TIMEOUT)
            .await
        {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("Location extraction failed: {}", e);
                return None;
            }
        };

        let content = content.trim();
        if content.is_empty() || content.eq_ignore_ascii_case("none") {
            return None;
        }

        // An echoed filler phrase is not a location.
        let lowered = content.to_lowercase();
        if FILLER_PHRASES.iter().any(|f| lowered == *f) {
            tracing::debug!("Extraction returned filler phrase '{}', treating as none", content);
            return None;
        }

        tracing::info!(location = %content, "Extracted location from message");
        Some(content.to_string())
    }

    /// Classify the message into WEATHER/PLACES/BOTH.
    ///
    /// Returns `None` when the model answers UNCLEAR, answers something
    /// unexpected, or the call fails; the Intent Resolver then falls back to
    /// its keyword heuristic.
    pub async fn classify_intent(&self, message: &str) -> Option<Intent> {
        let system = "You are a travel assistant router. \
            Classify the user's intent from THIS SPECIFIC message into exactly one of these categories: \
            WEATHER, PLACES, BOTH, UNCLEAR. \
            - WEATHER: if explicitly asking about weather, temperature, climate, rain, forecast, etc.\n\
            - PLACES: if explicitly asking about places to visit, attractions, things to do, trip planning, etc.\n\
            - BOTH: if explicitly asking about both weather AND places together in this message.\n\
            - UNCLEAR: if the message uses vague references like 'there', 'more', 'some more', 'what else', 'other places', etc. without being specific.\n\
            Do NOT use any previous context. Only analyze THIS message.\n\
            Return ONLY the category name: WEATHER, PLACES, BOTH, or UNCLEAR.";

        let messages = [ChatMessage::system(system), ChatMessage::user(message)];

        let content = match self
            .provider
            .generate(&messages, RESOLVE_TEMPERATURE, RESOLVE_TIMEOUT)
            .await
        {
            Ok(content) => content.trim().to_uppercase(),
            Err(e) => {
                tracing::warn!("Intent classification failed: {}", e);
                return None;
            }
        };

        match content.as_str() {
            "WEATHER" => Some(Intent::Weather),
            "PLACES" => Some(Intent::Places),
            "BOTH" => Some(Intent::Both),
            "UNCLEAR" => None,
            other => {
                tracing::warn!("Classifier returned unexpected intent '{}'", other);
                None
            }
        }
    }

    /// Suggest popular attractions for a location, supplementing fetched
    /// places. Returns a cleaned list of names, capped at 20.
    pub async fn suggest_attractions(
        &self,
        location_name: &str,
        existing: &[String],
    ) -> anyhow::Result<Vec<String>> {
        let system = "You are a travel expert. Given a city/location name, suggest the most popular and must-visit tourist attractions. \
            Return ONLY a numbered list of place names, one per line. \
            Focus on: famous landmarks, museums, historical sites, parks, monuments, and iconic attractions. \
            Do NOT include: hotels, restaurants, shopping malls, or generic places. \
            Return 15-20 suggestions maximum.";

        let mut prompt = format!("List the top tourist attractions to visit in {location_name}.");
        if !existing.is_empty() {
            let sample = existing
                .iter()
                .take(10)
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            prompt.push_str(&format!("\n\nPlaces already found nearby: {sample}"));
        }

        let messages = [ChatMessage::system(system), ChatMessage::user(&prompt)];
        let content = self.provider.generate(&messages, 0.3, SUGGEST_TIMEOUT).await?;

        Ok(parse_numbered_list(&content))
    }
}

/// Parse "1. Eiffel Tower" / "- Louvre" style lines into clean names.
fn parse_numbered_list(content: &str) -> Vec<String> {
    let mut places = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        let starts_like_item = line
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit() || c == '-');
        if !starts_like_item {
            continue;
        }
        let cleaned = line.trim_start_matches(|c: char| {
            c.is_ascii_digit() || c == '.' || c == '-' || c == ')' || c == ' '
        });
        if !cleaned.is_empty() {
            places.push(cleaned.to_string());
        }
        if places.len() == 20 {
            break;
        }
    }
    places
}
