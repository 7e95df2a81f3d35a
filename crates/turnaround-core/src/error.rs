//! Error types
//!
//! Nothing in the core is fatal. Transition errors are returned to the
//! caller and logged, collaborator errors degrade to last-known values,
//! configuration errors surface once at startup.

use thiserror::Error;

use crate::phase::FlightPhase;

/// Requested phase change violates the transition table.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid flight phase transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: FlightPhase,
    pub to: FlightPhase,
}

/// Failure talking to one of the external simulations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollaboratorError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
    #[error("unknown variable: {0}")]
    UnknownVariable(String),
}

/// Inconsistent configuration values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("loadsheet delay range is empty: {min}..={max}")]
    EmptyLoadsheetRange { min: u32, max: u32 },
    #[error("circuit breaker window must be non-zero")]
    ZeroBreakerWindow,
    #[error("circuit breaker must allow at least one change per window")]
    ZeroBreakerChanges,
    #[error("poll interval for {0} must be non-zero")]
    ZeroPollInterval(&'static str),
    #[error("refuel rate must be positive, got {0}")]
    InvalidRefuelRate(f64),
}

pub type Result<T> = std::result::Result<T, CollaboratorError>;
