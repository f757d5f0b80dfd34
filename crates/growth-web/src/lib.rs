//! Growth Web - REST API
//!
//! This crate exposes the case library over HTTP:
//! - Similar-case ranking
//! - Analysis ingestion and history
//! - Experiment status and outcome recording

pub mod api;

pub use api::{create_api_router, create_router, ApiError, AppState};
