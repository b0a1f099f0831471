use thiserror::Error;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("missing required configuration: {names:?}")]
    MissingRequired { names: Vec<String> },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Process launch errors.
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("service exited during grace period ({status}); output:\n{output}")]
    ExitedEarly { status: String, output: String },

    #[error("a managed process is already {state}")]
    AlreadyManaged { state: String },

    #[error("launch refused: shutdown in progress")]
    ShuttingDown,
}

/// How a failure should be treated by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Retried locally with bounded attempts and backoff.
    Transient,
    /// Logged; execution continues with the affected value absent.
    Degraded,
    /// Aborts the run at the current step.
    Fatal,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error("dependencies unmet: {}", failed.join("; "))]
    DependenciesUnmet { failed: Vec<String> },

    #[error("certificate provisioning failed: {0}")]
    Certificate(String),

    #[error("service not healthy after {attempts} attempts: {last_error}")]
    HealthCheck { attempts: u32, last_error: String },

    #[error("schema initialization failed: {0}")]
    Schema(String),

    #[error("datastore error: {0}")]
    Datastore(String),

    #[error("step `{step}` requires `{artifact}` from an earlier step")]
    MissingArtifact {
        step: &'static str,
        artifact: &'static str,
    },

    #[error("interrupted by shutdown signal")]
    Interrupted,

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("connection error: {0}")]
    Connection(String),
}

impl Error {
    /// Classify this error for retry and reporting decisions.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::DependenciesUnmet { .. } | Self::Connection(_) | Self::Http(_) => {
                ErrorClass::Transient
            }
            Self::Json(_) => ErrorClass::Degraded,
            _ => ErrorClass::Fatal,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
