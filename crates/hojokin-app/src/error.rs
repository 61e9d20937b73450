//! Application-level error type shared by the binary and its commands.

use thiserror::Error;

use crate::config;
use crate::jgrants::JGrantsError;
use crate::portal::PortalError;
use crate::server;
use crate::services::LocalDataError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    ConfigLoad(#[from] config::AppConfigError),
    #[error(transparent)]
    Server(#[from] server::ServerError),
    #[error(transparent)]
    Portal(#[from] PortalError),
    #[error(transparent)]
    JGrants(#[from] JGrantsError),
    #[error(transparent)]
    LocalData(#[from] LocalDataError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
