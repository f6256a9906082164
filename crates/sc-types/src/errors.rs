use thiserror::Error;

/// Main error type for the ScopeTune engine
#[derive(Error, Debug)]
pub enum ScError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Measurement error: {0}")]
    Measure(#[from] MeasureError),

    #[error("Rating service error: {0}")]
    Rating(#[from] RatingError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration errors. All of these are fatal at session initialization;
/// none may occur after the first measurement.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid range for parameter {name}: {reason}")]
    InvalidParameterRange { name: String, reason: String },

    #[error("no objective selected")]
    NoObjectiveSelected,

    #[error("no parameter selected")]
    NoParameterSelected,

    #[error("noise upper bound for objective {name} must be positive, got {value}")]
    InvalidNoiseBound { name: String, value: f64 },

    #[error("weight for objective {name} must be positive, got {value}")]
    InvalidWeight { name: String, value: f64 },

    #[error("decision policy {policy} requires a configured {role} service endpoint")]
    ServiceNotConfigured { policy: String, role: String },

    #[error("measurement timeout must be positive, got {value} s")]
    InvalidTimeout { value: f64 },
}

/// Round-level measurement failures. The session retries the round once and
/// aborts on a second failure.
#[derive(Error, Debug)]
pub enum MeasureError {
    #[error("acquisition failed: {message}")]
    Failed { message: String },

    #[error("acquisition timed out after {timeout_s} s")]
    Timeout { timeout_s: f64 },

    #[error("instrument rejected action: {message}")]
    Rejected { message: String },

    #[error("measurement missing score for objective {label}")]
    MissingScore { label: String },
}

/// Errors surfaced by the remote rating / trade-off services.
#[derive(Error, Debug)]
pub enum RatingError {
    #[error("rating service unavailable: {message}")]
    Unavailable { message: String },

    #[error("rating request timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("rating service returned malformed response: {message}")]
    Malformed { message: String },
}

/// Session persistence errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("session folder already exists: {path}")]
    SessionExists { path: String },

    #[error("session manifest not found at {path}")]
    ManifestNotFound { path: String },

    #[error("record IO failed: {message}")]
    Io { message: String },

    #[error("malformed record at {path}: {message}")]
    MalformedRecord { path: String, message: String },

    #[error("previous session at {path} is incompatible: {reason}")]
    IncompatibleHistory { path: String, reason: String },
}

/// Result type alias for ScopeTune operations
pub type ScResult<T> = Result<T, ScError>;
