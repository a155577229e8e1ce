use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExperimentError {
    /// Configuration values that cannot produce a valid session
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("config file error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Scan device link errors
    #[error("device error: {0}")]
    Device(String),
}

pub type Result<T> = std::result::Result<T, ExperimentError>;
