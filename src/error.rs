use http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum SiftError {
    #[error("index not found: {0}")]
    IndexNotFound(String),

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("document is missing identifier field \"{0}\"")]
    MissingId(String),

    #[error("malformed bulk payload: {0}")]
    MalformedBulk(String),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("engine error: {0}")]
    Engine(String),

    #[error("query parse error: {0}")]
    QueryParse(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SiftError>;

impl From<std::io::Error> for SiftError {
    fn from(e: std::io::Error) -> Self {
        SiftError::Io(e.to_string())
    }
}

impl From<tantivy::TantivyError> for SiftError {
    fn from(e: tantivy::TantivyError) -> Self {
        SiftError::Engine(e.to_string())
    }
}

impl From<tantivy::query::QueryParserError> for SiftError {
    fn from(e: tantivy::query::QueryParserError) -> Self {
        SiftError::QueryParse(e.to_string())
    }
}

impl From<serde_json::Error> for SiftError {
    fn from(e: serde_json::Error) -> Self {
        SiftError::Json(e.to_string())
    }
}

impl SiftError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SiftError::IndexNotFound(_) => StatusCode::BAD_REQUEST,
            SiftError::InvalidDocument(_) => StatusCode::BAD_REQUEST,
            SiftError::MissingId(_) => StatusCode::BAD_REQUEST,
            SiftError::MalformedBulk(_) => StatusCode::BAD_REQUEST,
            SiftError::UnknownCommand(_) => StatusCode::BAD_REQUEST,
            SiftError::QueryParse(_) => StatusCode::BAD_REQUEST,
            SiftError::Json(_) => StatusCode::BAD_REQUEST,
            SiftError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SiftError::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SiftError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
