//! Scheduler client error types.

use thiserror::Error;

/// Errors reported while synchronizing schedules.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Failed to create schedules due to validation errors in schedule : {0}")]
    Validation(String),

    #[error("Error occurred in scheduler module during creation/update : {0}")]
    Upsert(String),

    #[error("Error occurred in scheduler module during deletion : {0}")]
    Delete(String),

    #[error("scheduler request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
