//! The module contains the errors the engine can return.
//!
//! Every operation reports one of five domain kinds:
//!
//! - [`InvalidInput`] for malformed or out-of-range arguments.
//! - [`NotFound`] when a referenced entity is absent (also used when the caller
//!   is not allowed to see it).
//! - [`InvalidState`] / [`AlreadyAccepted`] when the operation is illegal for the
//!   entity's current status.
//! - [`InsufficientFunds`] when a wallet cannot cover a debit.
//! - [`ResourceExhausted`] when no pooled connection could be acquired in time.
//!
//! [`Database`] wraps every other storage failure.
//!
//!  [`InvalidInput`]: EngineError::InvalidInput
//!  [`NotFound`]: EngineError::NotFound
//!  [`InvalidState`]: EngineError::InvalidState
//!  [`AlreadyAccepted`]: EngineError::AlreadyAccepted
//!  [`InsufficientFunds`]: EngineError::InsufficientFunds
//!  [`ResourceExhausted`]: EngineError::ResourceExhausted
//!  [`Database`]: EngineError::Database
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("\"{0}\" not found!")]
    NotFound(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Already accepted: {0}")]
    AlreadyAccepted(String),
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),
    #[error(transparent)]
    Database(DbErr),
}

impl EngineError {
    /// Status code the HTTP layer answers with for this error.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidInput(_) => 400,
            Self::InsufficientFunds(_) => 402,
            Self::NotFound(_) => 404,
            Self::InvalidState(_) | Self::AlreadyAccepted(_) => 409,
            Self::ResourceExhausted(_) => 503,
            Self::Database(_) => 500,
        }
    }
}

impl From<DbErr> for EngineError {
    fn from(value: DbErr) -> Self {
        match value {
            DbErr::ConnectionAcquire(err) => Self::ResourceExhausted(err.to_string()),
            other => Self::Database(other),
        }
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidInput(a), Self::InvalidInput(b)) => a == b,
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::InvalidState(a), Self::InvalidState(b)) => a == b,
            (Self::AlreadyAccepted(a), Self::AlreadyAccepted(b)) => a == b,
            (Self::InsufficientFunds(a), Self::InsufficientFunds(b)) => a == b,
            (Self::ResourceExhausted(a), Self::ResourceExhausted(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::ConnAcquireErr;

    use super::*;

    #[test]
    fn acquire_timeout_maps_to_resource_exhausted() {
        let err = EngineError::from(DbErr::ConnectionAcquire(ConnAcquireErr::Timeout));
        assert!(matches!(err, EngineError::ResourceExhausted(_)));
        assert_eq!(err.http_status(), 503);
    }

    #[test]
    fn domain_errors_map_to_http_statuses() {
        assert_eq!(EngineError::InvalidInput("x".into()).http_status(), 400);
        assert_eq!(EngineError::NotFound("x".into()).http_status(), 404);
        assert_eq!(EngineError::InvalidState("x".into()).http_status(), 409);
        assert_eq!(EngineError::AlreadyAccepted("x".into()).http_status(), 409);
        assert_eq!(EngineError::InsufficientFunds("x".into()).http_status(), 402);
    }

    #[test]
    fn other_db_errors_stay_database_errors() {
        let err = EngineError::from(DbErr::Custom("boom".to_string()));
        assert_eq!(err, EngineError::Database(DbErr::Custom("boom".to_string())));
        assert_eq!(err.http_status(), 500);
    }
}
