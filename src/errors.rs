//!
//! src/errors.rs
//!
//! Defines enums and methods of error conversion
//! for errors the report pipelines use
//!

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("config error: {0}")]
    Config(String),
    #[error("auth error: {0}")]
    Auth(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("db error: {0}")]
    Db(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error)
}

impl From<reqwest::Error> for ReportError {
    fn from(e: reqwest::Error) -> Self { ReportError::Http(e.to_string()) }
}

impl From<serde_json::Error> for ReportError {
    fn from(e: serde_json::Error) -> Self { ReportError::Parse(e.to_string()) }
}

impl From<sqlx::Error> for ReportError {
    fn from(e: sqlx::Error) -> Self { ReportError::Db(e.to_string()) }
}
