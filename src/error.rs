use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("bad request")]
    BadRequest,

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("conflict")]
    Conflict,

    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("relay error: {0}")]
    Relay(#[from] RelayError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal server error: {0}")]
    Internal(String),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        // Status-only responses: the code is the entire contract, so a failed
        // login cannot be used to enumerate usernames or emails.
        HttpResponse::build(self.status_code()).finish()
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Conflict => StatusCode::CONFLICT,
            AppError::Directory(_)
            | AppError::Relay(_)
            | AppError::Config(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("lookup failed: {0}")]
    Lookup(String),

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("record already exists")]
    Duplicate,
}

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("malformed frame")]
    MalformedFrame,

    #[error("send failed: {0}")]
    Send(String),
}
