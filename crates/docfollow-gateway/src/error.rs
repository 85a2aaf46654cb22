use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Twilio WhatsApp not configured")]
    NotConfigured,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gateway API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Media too large: {size} bytes (limit {limit})")]
    MediaTooLarge { size: usize, limit: usize },

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GatewayError>;
