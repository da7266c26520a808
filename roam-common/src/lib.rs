//! Shared plumbing for the Roam travel assistant: unified error type,
//! configuration loading, and logging initialization.

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
