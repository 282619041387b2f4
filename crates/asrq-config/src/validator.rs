//! Configuration validation.

use crate::schema::Config;

/// Longest retention age or statistics window accepted, in minutes (100 years).
pub const MAX_WINDOW_MINUTES: u64 = 100 * 365 * 24 * 60;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_server(config, &mut result);
        Self::validate_queue(config, &mut result);
        Self::validate_workers(config, &mut result);
        Self::validate_executor(config, &mut result);
        Self::validate_retention(config, &mut result);
        Self::validate_status(config, &mut result);

        result
    }

    fn validate_server(config: &Config, result: &mut ValidationResult) {
        if config.server.port == 0 {
            result.add_error(ValidationError::new("server.port", "Port cannot be 0"));
        }

        if config.server.host.is_empty() {
            result.add_error(ValidationError::new("server.host", "Host cannot be empty"));
        }

        if config.server.max_upload_mb == 0 {
            result.add_error(ValidationError::new(
                "server.max_upload_mb",
                "max_upload_mb must be greater than 0",
            ));
        }
    }

    fn validate_queue(config: &Config, result: &mut ValidationResult) {
        if config.queue.max_queue_size == 0 {
            result.add_error(ValidationError::new(
                "queue.max_queue_size",
                "max_queue_size must be at least 1",
            ));
        }

        if config.queue.max_queue_size > 10_000 {
            result.add_warning(ValidationWarning::new(
                "queue.max_queue_size",
                "max_queue_size is very high (>10000), uploads are kept on disk until processed",
            ));
        }
    }

    fn validate_workers(config: &Config, result: &mut ValidationResult) {
        if config.workers.devices.is_empty() {
            result.add_error(ValidationError::new(
                "workers.devices",
                "At least one worker device must be configured",
            ));
        }

        if config.workers.devices.iter().any(|d| d.trim().is_empty()) {
            result.add_error(ValidationError::new(
                "workers.devices",
                "Device labels cannot be empty",
            ));
        }

        if config.workers.poll_interval_ms == 0 {
            result.add_error(ValidationError::new(
                "workers.poll_interval_ms",
                "poll_interval_ms must be greater than 0",
            ));
        }
    }

    fn validate_executor(config: &Config, result: &mut ValidationResult) {
        if config.executor.program.trim().is_empty() {
            result.add_error(ValidationError::new(
                "executor.program",
                "Executor program cannot be empty",
            ));
        }

        if !config.executor.args.iter().any(|a| a.contains("{input}")) {
            result.add_warning(ValidationWarning::new(
                "executor.args",
                "No argument references {input}, the executor will not receive the audio path",
            ));
        }

        if config.executor.timeout_seconds == 0 {
            result.add_error(ValidationError::new(
                "executor.timeout_seconds",
                "timeout_seconds must be greater than 0",
            ));
        }
    }

    fn validate_retention(config: &Config, result: &mut ValidationResult) {
        if config.retention.enabled && config.retention.interval_seconds == 0 {
            result.add_error(ValidationError::new(
                "retention.interval_seconds",
                "interval_seconds must be greater than 0",
            ));
        }

        if config.retention.max_age_minutes > MAX_WINDOW_MINUTES {
            result.add_error(ValidationError::new(
                "retention.max_age_minutes",
                format!("max_age_minutes cannot exceed {}", MAX_WINDOW_MINUTES),
            ));
        }
    }

    fn validate_status(config: &Config, result: &mut ValidationResult) {
        if config.status.broadcast_interval_ms == 0 {
            result.add_error(ValidationError::new(
                "status.broadcast_interval_ms",
                "broadcast_interval_ms must be greater than 0",
            ));
        }

        if config.status.statistics_windows.iter().any(|w| *w == 0) {
            result.add_error(ValidationError::new(
                "status.statistics_windows",
                "Statistics windows must be at least one minute",
            ));
        }

        if config
            .status
            .statistics_windows
            .iter()
            .any(|w| *w > MAX_WINDOW_MINUTES)
        {
            result.add_error(ValidationError::new(
                "status.statistics_windows",
                format!("Statistics windows cannot exceed {} minutes", MAX_WINDOW_MINUTES),
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
