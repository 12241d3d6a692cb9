//! Configuration errors surfaced before a run starts.
//!
//! Per-product failures are not errors at this level: they are recorded in
//! the run report and the batch continues.

use crate::services::storage_sink::SinkError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("bucket `{name}` invalid: {reason}")]
    InvalidBucketName { name: String, reason: String },
    #[error("{var} has invalid value `{value}`: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error(transparent)]
    Endpoint(#[from] SinkError),
}

impl ConfigError {
    pub(crate) fn bucket(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidBucketName {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
