//! Job error types

use thiserror::Error;

/// Failure of a single augmentation handler call
///
/// Job errors never escape the scheduler: they are recorded on the job's
/// status (and per row for row-scoped jobs) and the base view is unaffected.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("{0}")]
    Failed(String),

    #[error("Handler panicked: {0}")]
    Panicked(String),

    #[error("No async runtime available to run the job")]
    NoRuntime,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl JobError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::Panicked(message)
    }
}

pub type JobResult<T> = std::result::Result<T, JobError>;
