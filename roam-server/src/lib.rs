//! roam-server - HTTP front end for the roam travel assistant.

pub mod routes;

pub use routes::{build_router, AppState};
