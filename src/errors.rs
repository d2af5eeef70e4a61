use thiserror::Error;

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// failures of the upstream flight data source
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned status {0}")]
    Status(u16),

    #[error("malformed upstream data: {0}")]
    Malformed(String),

    #[error("no details for flight {0}")]
    NoDetails(String),
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Server error: {0}")]
    Upstream(#[from] ProviderError),
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned status {0}")]
    Status(u16),

    #[error("{0}")]
    Secrets(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("render error: {0}")]
    Render(String),
}

pub fn malformed(msg: impl ToString) -> ProviderError {
    ProviderError::Malformed(msg.to_string())
}

pub fn render_error(msg: impl ToString) -> ClientError {
    ClientError::Render(msg.to_string())
}
