//! Engine-wide error types.
//!
//! Every variant is a recoverable, caller-reportable outcome — losing a claim
//! race or overdrawing a point balance is routine, not exceptional. Nothing
//! in the engine panics on these paths.

use thiserror::Error;

use crate::types::Role;

#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    /// No entity with the given id exists.
    #[error("not found: {0} {1}")]
    NotFound(&'static str, u64),

    /// The requested state-machine transition is not legal from the current state.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// Another actor won the race for this request.
    #[error("request {0} was just taken")]
    AlreadyClaimed(u64),

    /// The underlying waste lot passed its expiry before the claim landed.
    #[error("request {0} is no longer available (waste lot expired)")]
    Expired(u64),

    /// A debit would push the actor's point balance below zero.
    #[error("insufficient balance: have {balance}, need {requested}")]
    InsufficientBalance { balance: i64, requested: i64 },

    /// A purchase asked for more stock than the listing has left.
    #[error("insufficient stock: have {available}, requested {requested}")]
    InsufficientStock { available: f64, requested: f64 },

    /// Non-positive weight, quantity, price, or similar input rejection.
    #[error("validation error: {0}")]
    Validation(String),

    /// The acting id does not hold the role the operation requires.
    #[error("actor {actor} does not hold role {required:?}")]
    RoleMismatch { actor: u64, required: Role },
}

pub type Result<T> = std::result::Result<T, EngineError>;
