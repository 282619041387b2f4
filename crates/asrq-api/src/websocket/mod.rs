//! WebSocket status stream.

mod status;

pub use status::{spawn_status_broadcaster, status_ws};
