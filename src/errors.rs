// src/errors.rs

//! Crate-wide error types and aliases.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowdagError {
    #[error("executor concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("cycle detected in task graph involving '{0}'")]
    GraphCycle(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, FlowdagError>;
