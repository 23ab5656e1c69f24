//! Error types for mutation testing

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while declaring or running mutants
#[derive(Debug, Error)]
pub enum MutationError {
    /// Malformed declaration or run request
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// A requested mutant is not declared for the target scope
    #[error("Unknown mutant '{name}' for scope '{scope}'\n  Available mutants: {}", available.join(", "))]
    UnknownMutant {
        name: String,
        scope: String,
        available: Vec<String>,
    },

    /// A function key was bound to two different signatures
    #[error("Function '{function}' declared with conflicting signatures: {existing} vs {conflicting}")]
    SignatureConflict {
        function: String,
        existing: String,
        conflicting: String,
    },

    /// The suite completed cleanly while the mutant was active
    #[error("Test suite passed!\n{name}: {description}")]
    Survived { name: String, description: String },

    /// The suite did not finish within the configured limit
    #[error("Test suite timed out after {:.1}s\n{name}: {description}", limit.as_secs_f64())]
    TimedOut {
        name: String,
        description: String,
        limit: Duration,
    },

    /// Several mutants were not killed
    #[error("{} mutant(s) not killed:\n{}", failures.len(), format_failures(failures))]
    Unkilled { failures: Vec<MutationError> },

    /// Failed to start a worker thread for a mutant run
    #[error("Failed to spawn worker for mutant '{name}': {error}")]
    WorkerSpawn { name: String, error: String },

    /// A worker thread finished without recording a verdict for a mutant
    #[error("Worker running mutant '{name}' exited without a verdict")]
    WorkerLost { name: String },
}

impl MutationError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        MutationError::ConfigError {
            message: message.into(),
        }
    }
}

fn format_failures(failures: &[MutationError]) -> String {
    failures
        .iter()
        .map(|failure| failure.to_string())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Result type for mutation operations
pub type Result<T> = std::result::Result<T, MutationError>;
