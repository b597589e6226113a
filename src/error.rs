//! Application-wide error types.
//!
//! Layer-specific errors (`StoreError`, `SessionError`, `ProviderError`,
//! `EngineError`) live next to the code that raises them; `AppError` is what
//! startup and wiring code returns.

use thiserror::Error;

use crate::docstore::StoreError;
use crate::llm::ProviderError;
use crate::session::SessionError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("llm error: {0}")]
    Llm(#[from] ProviderError),

    #[error("session error: {0}")]
    Session(#[from] SessionError),
}
