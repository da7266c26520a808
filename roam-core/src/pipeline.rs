//! Turn orchestration: one user message in, one composed answer out.

use crate::compose::{compose, PlacesShowing, ResponseBundle};
use crate::dedup;
use crate::geocode::Geocoder;
use crate::llm::LlmClient;
use crate::places::PlacesService;
use crate::provider;
use crate::resolve::{clarification_message, IntentResolver, LocationOutcome, LocationResolver};
use crate::sessions::KeyedLocks;
use crate::store::{self, Store};
use crate::weather::WeatherService;
use crate::types::{
    AgentStep, ChatRequest, ChatResponse, ConversationTurn, Intent, Location, SessionState,
};
use roam_common::config::Config;
use roam_common::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// The assembled turn pipeline. One instance serves all sessions.
pub struct Pipeline {
    store: Arc<dyn Store>,
    locations: LocationResolver,
    intents: IntentResolver,
    weather: WeatherService,
    places: PlacesService,
    turns: KeyedLocks,
}

impl Pipeline {
    /// Wire the pipeline up from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = store::from_config(&config.storage)?;
        let provider = provider::from_config(
            &config.llm,
            config.endpoints.llm_base_url.as_deref(),
        )
        .map_err(|e| Error::Config(e.to_string()))?;
        let llm = LlmClient::new(provider);
        let flights = Arc::new(KeyedLocks::new());

        Ok(Self {
            locations: LocationResolver::new(
                llm.clone(),
                Geocoder::new(&config.endpoints.nominatim),
            ),
            intents: IntentResolver::new(llm.clone()),
            weather: WeatherService::new(
                &config.endpoints.open_meteo,
                Arc::clone(&store),
                Arc::clone(&flights),
            ),
            places: PlacesService::new(
                &config.endpoints.overpass,
                Arc::clone(&store),
                flights,
                llm,
            ),
            store,
            turns: KeyedLocks::new(),
        })
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Direct access to the weather service for the standalone endpoint.
    pub fn weather(&self) -> &WeatherService {
        &self.weather
    }

    /// Direct access to the places service for the standalone endpoint.
    pub fn places(&self) -> &PlacesService {
        &self.places
    }

    /// Run one conversational turn. Turns for the same session are
    /// serialized; different sessions proceed in parallel.
    pub async fn run_turn(&self, request: ChatRequest) -> Result<ChatResponse> {
        if request.session_id.trim().is_empty() {
            return Err(Error::InvalidInput("session_id must not be empty".into()));
        }
        if request.message.trim().is_empty() {
            return Err(Error::InvalidInput("message must not be empty".into()));
        }

        let _turn_guard = self.turns.acquire(&request.session_id).await;
        tracing::info!(session_id = %request.session_id, "Processing turn");

        let mut state = match self.store.get_session_state(&request.session_id).await {
            Ok(state) => state,
            Err(e) => {
                // Continuity is lost but the turn can still be answered.
                tracing::error!(session_id = %request.session_id, "Session state unreadable: {}", e);
                SessionState::default()
            }
        };
        let mut steps: Vec<AgentStep> = Vec::new();

        // Location is the gate for the whole turn.
        let location = match self.locations.resolve(&request.message, &state).await {
            LocationOutcome::Resolved {
                location,
                from_message,
            } => {
                if from_message {
                    if let Err(e) = self
                        .store
                        .update_location(&request.session_id, &location)
                        .await
                    {
                        tracing::error!(session_id = %request.session_id, "Could not persist location: {}", e);
                    }
                    state.set_location(&location);
                }
                steps.push(AgentStep::success(
                    "Geocoding",
                    format!("Found {}", location.name),
                ));
                location
            }
            LocationOutcome::Clarification { query } => {
                steps.push(AgentStep::failed(
                    "Geocoding",
                    format!("No results for {query}"),
                ));
                let message = clarification_message(&query);
                self.append_turn(&request, &message).await;
                return Ok(ChatResponse {
                    session_id: request.session_id,
                    message,
                    extracted_location: None,
                    intent: Intent::Unknown,
                    steps,
                    data: HashMap::new(),
                });
            }
        };

        let (intent, from_llm) = self.intents.resolve(&request.message).await;
        steps.push(AgentStep::success(
            "Intent Classification",
            if from_llm {
                format!("LLM decided: {intent}")
            } else {
                format!("Keyword fallback: {intent}")
            },
        ));

        let is_followup = crate::resolve::is_followup(&request.message);
        let (bundle, data) = self
            .fetch_data(&request.session_id, &location, intent, &mut state, &mut steps)
            .await;

        let message = compose(intent, &location, &bundle, is_followup);
        self.append_turn(&request, &message).await;

        Ok(ChatResponse {
            session_id: request.session_id,
            message,
            extracted_location: Some(location),
            intent,
            steps,
            data,
        })
    }

    /// Fetch the branches the intent asks for, concurrently. Either branch
    /// failing is recorded as a failed step and never sinks the other.
    async fn fetch_data(
        &self,
        session_id: &str,
        location: &Location,
        intent: Intent,
        state: &mut SessionState,
        steps: &mut Vec<AgentStep>,
    ) -> (ResponseBundle, HashMap<String, serde_json::Value>) {
        let mut bundle = ResponseBundle::default();
        let mut data = HashMap::new();

        let weather_fut = async {
            if intent.wants_weather() {
                Some(self.weather.get(location.lat, location.lon).await)
            } else {
                None
            }
        };
        let places_fut = async {
            if intent.wants_places() {
                Some(
                    self.places
                        .get(location.lat, location.lon, Some(&location.name))
                        .await,
                )
            } else {
                None
            }
        };
        let (weather_result, places_result) = tokio::join!(weather_fut, places_fut);

        match weather_result {
            Some(Ok(report)) => {
                steps.push(AgentStep::success(
                    "Weather Agent",
                    format!("Fetched: {}", report.condition),
                ));
                if let Ok(value) = serde_json::to_value(&report) {
                    data.insert("weather".to_string(), value);
                }
                bundle.weather = Some(report);
            }
            Some(Err(e)) => {
                tracing::warn!(session_id, "Weather branch failed: {}", e);
                steps.push(AgentStep::failed("Weather Agent", e.to_string()));
            }
            None => steps.push(AgentStep::skipped("Weather Agent", "Not requested")),
        }

        match places_result {
            Some(Ok(candidates)) => {
                let selection =
                    dedup::select(&candidates, &state.shown_places, dedup::DEFAULT_BATCH);
                let names: Vec<String> =
                    selection.selected.iter().map(|p| p.name.clone()).collect();

                if !selection.exhausted && !names.is_empty() {
                    if let Err(e) = self.store.add_shown_places(session_id, &names).await {
                        tracing::error!(session_id, "Could not record shown places: {}", e);
                    } else {
                        state.shown_places.extend(names.iter().cloned());
                    }
                }

                steps.push(AgentStep::success(
                    "Places Agent",
                    format!(
                        "Found {} new places (filtered {} already shown)",
                        names.len(),
                        state.shown_places.len().saturating_sub(names.len())
                    ),
                ));
                if let Ok(value) = serde_json::to_value(&names) {
                    data.insert("places".to_string(), value);
                }
                bundle.places = Some(PlacesShowing {
                    names,
                    exhausted: selection.exhausted,
                });
            }
            Some(Err(e)) => {
                tracing::warn!(session_id, "Places branch failed: {}", e);
                steps.push(AgentStep::failed("Places Agent", e.to_string()));
            }
            None => steps.push(AgentStep::skipped("Places Agent", "Not requested")),
        }

        (bundle, data)
    }

    /// Append the exchange to the audit log. The log is write-only; losing
    /// an entry degrades auditability, not the answer, so failures only warn.
    async fn append_turn(&self, request: &ChatRequest, response: &str) {
        let turn = ConversationTurn::new(&request.session_id, &request.message, response);
        if let Err(e) = self.store.append_turn(&turn).await {
            tracing::warn!(session_id = %request.session_id, "Audit append failed: {}", e);
        }
    }

    /// Drop all session state, starting the conversation over. Returns
    /// whether any state existed. The audit log is untouched.
    pub async fn reset_session(&self, session_id: &str) -> Result<bool> {
        self.store.reset_session(session_id).await
    }

    pub async fn health_check(&self) -> bool {
        self.store.health_check().await
    }
}
