use thiserror::Error;

/// Errors that can occur within the cron subsystem.
#[derive(Debug, Error)]
pub enum CronError {
    /// The schedule expression could not be parsed, or describes no future
    /// occurrence.
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    /// A job with the same name is already registered.
    #[error("job [{name}] already exists with plan [{plan}]")]
    JobExists { name: String, plan: String },

    /// No job with the given name is registered.
    #[error("job [{name}] not found")]
    JobNotFound { name: String },

    /// Configuration file / environment extraction failed.
    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, CronError>;
