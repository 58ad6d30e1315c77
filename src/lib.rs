//! Chat and translation relay in front of a hosted Gemini model.
//!
//! Requests pass a per-client rate limit and a shared input validator, are
//! forwarded to the provider, and come back either as a JSON envelope or as a
//! `data: {"content": ...}` text stream.

pub mod client;
pub mod config;
pub mod error;
pub mod model;
mod state;
pub mod stream;
pub mod web;

pub use state::AppState;
