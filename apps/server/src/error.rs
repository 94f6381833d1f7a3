use std::io::Error as IoError;

use healthbeat_service::{StoreError, config};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0:#}")]
    Io(#[from] IoError),
    #[error("Address parsing error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),
    #[error("Configuration error: {0}")]
    Config(#[from] config::Error),
    #[error("Database error: {0}")]
    Store(#[from] StoreError),
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}
