//! Core domain types shared across the turn pipeline.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What the user wants from this turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Intent {
    Weather,
    Places,
    Both,
    /// Location could not be resolved; the turn ends with a clarification.
    Unknown,
}

impl Intent {
    pub const fn wants_weather(self) -> bool {
        matches!(self, Self::Weather | Self::Both)
    }

    pub const fn wants_places(self) -> bool {
        matches!(self, Self::Places | Self::Both)
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Weather => write!(f, "WEATHER"),
            Self::Places => write!(f, "PLACES"),
            Self::Both => write!(f, "BOTH"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// A geocoded location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Outcome of one pipeline step, surfaced for debugging and the UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStep {
    pub step_name: String,
    pub status: StepStatus,
    pub details: String,
}

impl AgentStep {
    pub fn success(name: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            step_name: name.into(),
            status: StepStatus::Success,
            details: details.into(),
        }
    }

    pub fn failed(name: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            step_name: name.into(),
            status: StepStatus::Failed,
            details: details.into(),
        }
    }

    pub fn skipped(name: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            step_name: name.into(),
            status: StepStatus::Skipped,
            details: details.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Failed,
    Skipped,
}

/// Incoming chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Unique identifier for the user session
    pub session_id: String,
    /// User's input message
    pub message: String,
}

/// Structured chat response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub session_id: String,
    /// The user-facing answer text
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_location: Option<Location>,
    pub intent: Intent,
    #[serde(default)]
    pub steps: Vec<AgentStep>,
    /// Raw data from the fetch branches (weather/places)
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,
}

/// Append-only audit record of one request/response cycle.
///
/// Write-only from the pipeline's perspective; session state, not this log,
/// is the source of truth for conversation context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub session_id: String,
    pub user_message: String,
    pub bot_response: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(
        session_id: impl Into<String>,
        user_message: impl Into<String>,
        bot_response: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            user_message: user_message.into(),
            bot_response: bot_response.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Durable per-session conversation context.
///
/// Invariant: `current_location` is `Some` iff both coordinates are `Some`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub current_location: Option<String>,
    #[serde(default)]
    pub current_lat: Option<f64>,
    #[serde(default)]
    pub current_lon: Option<f64>,
    /// Recommendation identifiers already surfaced in this session.
    /// Append-only; membership is what matters, order kept for audit.
    #[serde(default)]
    pub shown_places: Vec<String>,
}

impl SessionState {
    /// The stored location as a `Location`, when the invariant holds.
    pub fn location(&self) -> Option<Location> {
        match (&self.current_location, self.current_lat, self.current_lon) {
            (Some(name), Some(lat), Some(lon)) => Some(Location {
                name: name.clone(),
                lat,
                lon,
                display_name: None,
            }),
            _ => None,
        }
    }

    /// Overwrite the tracked location. Latest explicit mention always wins.
    pub fn set_location(&mut self, location: &Location) {
        self.current_location = Some(location.name.clone());
        self.current_lat = Some(location.lat);
        self.current_lon = Some(location.lon);
    }
}

/// One day of forecast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub max_temp: f64,
    pub min_temp: f64,
    pub condition: String,
    /// Percentage
    pub rain_probability: i64,
}

/// Weather for a coordinate, current conditions plus a week of dailies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherReport {
    pub temperature: f64,
    pub condition: String,
    #[serde(default)]
    pub feels_like: Option<f64>,
    #[serde(default)]
    pub humidity: Option<i64>,
    #[serde(default)]
    pub wind_speed: Option<f64>,
    /// Percentage
    #[serde(default)]
    pub rain_probability: Option<i64>,
    #[serde(default)]
    pub pressure: Option<f64>,
    #[serde(default)]
    pub daily_forecast: Vec<DailyForecast>,
}

/// A point of interest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    pub category: String,
    pub lat: f64,
    pub lon: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_and_place_compare_by_value() {
        let paris = Location {
            name: "Paris".into(),
            lat: 48.86,
            lon: 2.35,
            display_name: None,
        };
        assert_eq!(paris, paris.clone());
        let louvre = Place {
            name: "Louvre".into(),
            category: "museum".into(),
            lat: 48.86,
            lon: 2.34,
        };
        assert_eq!(vec![louvre.clone()], vec![louvre]);
    }

    #[test]
    fn intent_serialization() {
        assert_eq!(serde_json::to_string(&Intent::Weather).unwrap(), "\"WEATHER\"");
        assert_eq!(serde_json::to_string(&Intent::Unknown).unwrap(), "\"UNKNOWN\"");
        let intent: Intent = serde_json::from_str("\"BOTH\"").unwrap();
        assert_eq!(intent, Intent::Both);
    }

    #[test]
    fn intent_branch_selection() {
        assert!(Intent::Weather.wants_weather());
        assert!(!Intent::Weather.wants_places());
        assert!(Intent::Both.wants_weather());
        assert!(Intent::Both.wants_places());
        assert!(!Intent::Unknown.wants_weather());
        assert!(!Intent::Unknown.wants_places());
    }

    #[test]
    fn session_state_location_invariant() {
        let mut state = SessionState::default();
        assert!(state.location().is_none());

        state.current_location = Some("Paris".into());
        // Name without coordinates violates the invariant; no Location.
        assert!(state.location().is_none());

        state.current_lat = Some(48.8566);
        state.current_lon = Some(2.3522);
        let loc = state.location().unwrap();
        assert_eq!(loc.name, "Paris");
        assert!((loc.lat - 48.8566).abs() < f64::EPSILON);
    }

    #[test]
    fn session_state_overwrite() {
        let mut state = SessionState::default();
        state.set_location(&Location {
            name: "Paris".into(),
            lat: 48.85,
            lon: 2.35,
            display_name: None,
        });
        state.set_location(&Location {
            name: "Tokyo".into(),
            lat: 35.68,
            lon: 139.76,
            display_name: None,
        });
        assert_eq!(state.current_location.as_deref(), Some("Tokyo"));
        assert_eq!(state.current_lat, Some(35.68));
    }

    #[test]
    fn chat_response_omits_empty_location() {
        let response = ChatResponse {
            session_id: "s1".into(),
            message: "hi".into(),
            extracted_location: None,
            intent: Intent::Unknown,
            steps: vec![AgentStep::failed("Location", "no location")],
            data: HashMap::new(),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("extracted_location"));
        assert!(json.contains("\"status\":\"failed\""));
    }
}
