//! Core turn pipeline for the roam travel assistant: location and intent
//! resolution, weather and places fetching with a shared result cache,
//! recommendation de-duplication, and response composition.

pub mod compose;
pub mod dedup;
pub mod geocode;
pub mod llm;
pub mod pipeline;
pub mod places;
pub mod provider;
pub mod resolve;
pub mod sessions;
pub mod store;
pub mod types;
pub mod weather;

pub use pipeline::Pipeline;
pub use types::{ChatRequest, ChatResponse, Intent, Location, SessionState};
