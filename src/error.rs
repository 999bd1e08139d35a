#[derive(Debug, thiserror::Error)]
pub enum CrawlerError {
    #[error("Extraction failed for {url}: {message}")]
    ExtractionFailure { url: String, message: String },

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] sqlx::error::Error),

    #[error("Missing credential: environment variable {0} is not set")]
    MissingCredential(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Cannot read config file: {0}")]
    ConfigRead(#[from] std::io::Error),

    #[error("Cannot parse config file: {0}")]
    ConfigParse(#[from] toml::de::Error),
}
