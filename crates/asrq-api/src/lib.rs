//! # asrq API
//!
//! HTTP and WebSocket interface for the transcription queue.
//!
//! - **HTTP**: job submission (async and blocking), status, history,
//!   statistics and runtime configuration
//! - **WebSocket**: periodic queue status snapshots for dashboards

pub mod error;
pub mod http;
pub mod server;
pub mod state;
pub mod websocket;

pub use error::ApiError;
pub use http::routes::create_router;
pub use server::ApiServer;
pub use state::AppState;
pub use websocket::spawn_status_broadcaster;

#[cfg(test)]
mod test_support;
