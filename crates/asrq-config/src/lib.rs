//! # asrq Config
//!
//! Configuration management for the transcription queue service.

mod error;
mod loader;
mod schema;
mod validator;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
pub use validator::{
    ConfigValidator, ValidationError, ValidationResult, ValidationWarning, MAX_WINDOW_MINUTES,
};
