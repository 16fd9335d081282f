//! Engine error types

use crate::config::ConfigError;
use crate::lens::LensError;
use shrike_bytecode::{DecodeError, OperandError};
use thiserror::Error;

/// Errors raised by the optimizer engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// An encoded body could not be decoded
    #[error("Malformed instruction: {0}")]
    Decode(#[from] DecodeError),

    /// An instruction was built with operands its format cannot hold
    #[error("Invalid operand: {0}")]
    Operand(#[from] OperandError),

    /// A pass recorded an inconsistent lens entry
    #[error("Lens error: {0}")]
    Lens(#[from] LensError),

    /// The program graph violates a structural assumption
    #[error("Broken program graph: {reason}")]
    BrokenProgramGraph {
        /// What is broken
        reason: String,
    },

    /// A type was defined twice
    #[error("Duplicate class definition {0}")]
    DuplicateClass(String),

    /// Two members of one class share a reference
    #[error("Duplicate member {member} in {holder}")]
    DuplicateMember {
        /// Holder type descriptor
        holder: String,
        /// Member reference
        member: String,
    },

    /// An enqueuer analysis aborted the trace
    #[error("Analysis '{analysis}' failed: {source}")]
    Analysis {
        /// Analysis name
        analysis: &'static str,
        /// The error the analysis returned
        #[source]
        source: Box<EngineError>,
    },

    /// Invalid engine configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A worker thread panicked
    #[error("Worker thread panicked during {0}")]
    WorkerPanicked(&'static str),

    /// The enqueuer was asked to trace twice
    #[error("Enqueuer has already traced this program")]
    EnqueuerReused,
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// Create a broken program graph error
    pub fn broken_graph(reason: impl Into<String>) -> Self {
        EngineError::BrokenProgramGraph {
            reason: reason.into(),
        }
    }
}
