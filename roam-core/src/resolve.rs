//! Location and intent resolution for a single turn.

use crate::geocode::Geocoder;
use crate::llm::LlmClient;
use crate::types::{Intent, Location, SessionState};

const WEATHER_KEYWORDS: &[&str] = &["weather", "temperature", "climate", "rain", "forecast"];
const PLACES_KEYWORDS: &[&str] = &["place", "visit", "attraction", "suggest", "more"];

/// Outcome of location resolution for one message.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationOutcome {
    /// A usable location, either freshly geocoded from this message or
    /// carried over from session state.
    Resolved {
        location: Location,
        from_message: bool,
    },
    /// Nothing usable; the turn should ask the user to be more specific.
    Clarification { query: String },
}

pub struct LocationResolver {
    llm: LlmClient,
    geocoder: Geocoder,
}

impl LocationResolver {
    pub fn new(llm: LlmClient, geocoder: Geocoder) -> Self {
        Self { llm, geocoder }
    }

    /// Resolve the active location for this turn.
    ///
    /// The message is consulted first; an explicit mention always wins and
    /// is geocoded fresh, even if the session already has a location. Only
    /// when the message names nothing does the stored location apply.
    /// Failure to geocode an explicit mention is never papered over with
    /// stale state.
    pub async fn resolve(&self, message: &str, state: &SessionState) -> LocationOutcome {
        if let Some(query) = self.llm.extract_location(message).await {
            tracing::info!(query = %query, "Location named in message, geocoding");
            return match self.geocoder.lookup(&query).await {
                Ok(Some(location)) => LocationOutcome::Resolved {
                    location,
                    from_message: true,
                },
                Ok(None) => {
                    tracing::warn!(query = %query, "Geocoder found no results");
                    LocationOutcome::Clarification { query }
                }
                Err(e) => {
                    tracing::warn!(query = %query, "Geocoding failed: {}", e);
                    LocationOutcome::Clarification { query }
                }
            };
        }

        match state.location() {
            Some(location) => {
                tracing::info!(location = %location.name, "Reusing session location");
                LocationOutcome::Resolved {
                    location,
                    from_message: false,
                }
            }
            None => LocationOutcome::Clarification {
                query: message.trim().to_string(),
            },
        }
    }
}

/// Human-facing prompt for a turn that could not pin down a location.
pub fn clarification_message(query: &str) -> String {
    format!("I'm sorry, I couldn't find a location matching '{query}'. Could you be more specific?")
}

pub struct IntentResolver {
    llm: LlmClient,
}

impl IntentResolver {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }

    /// Classify what the message is asking for. Falls back to a keyword
    /// heuristic when the classifier is unclear or unavailable, so this
    /// step cannot fail a turn. The bool reports whether the LLM answered.
    pub async fn resolve(&self, message: &str) -> (Intent, bool) {
        if let Some(intent) = self.llm.classify_intent(message).await {
            return (intent, true);
        }
        tracing::info!("Classifier unavailable or unclear, using keyword heuristic");
        (keyword_intent(message), false)
    }
}

fn keyword_intent(message: &str) -> Intent {
    let lower = message.to_lowercase();
    if WEATHER_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Intent::Weather
    } else if PLACES_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Intent::Places
    } else {
        Intent::Both
    }
}

/// Lexical follow-up check: the message asks for "more" of something.
pub fn is_followup(message: &str) -> bool {
    let lower = message.to_lowercase();
    ["more", "else", "other", "another", "additional"]
        .iter()
        .any(|t| lower.contains(t))
}
