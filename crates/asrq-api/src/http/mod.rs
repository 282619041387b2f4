//! HTTP interface module.
//!
//! Provides REST API endpoints for:
//! - Transcription job submission and status
//! - Queue statistics, history and runtime configuration
//! - Health checks

pub mod handlers;
pub mod routes;

pub(crate) mod admin;
pub(crate) mod monitoring;
