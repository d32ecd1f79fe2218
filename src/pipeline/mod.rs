//! Intake pipeline: classify → sentiment → dispatch → retrieve → respond.
//!
//! The three language collaborators (classifier, sentiment estimator,
//! responder) and the retriever are traits, so the pipeline runs the same
//! against a local Ollama model, the offline heuristics, or test doubles.

pub mod classify;
pub mod ollama;
pub mod orchestrator;
pub mod parser;
pub mod prompt;
pub mod respond;
pub mod retrieval;
pub mod sentiment;
pub mod types;

pub use classify::*;
pub use ollama::*;
pub use orchestrator::*;
pub use respond::*;
pub use retrieval::*;
pub use sentiment::*;
pub use types::*;

use thiserror::Error;

use crate::db::DatabaseError;

/// Failure talking to a text-generation backend.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Ollama is not running at {0}")]
    Connection(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Ollama returned error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("Model returned an empty response")]
    EmptyResponse,
}

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Knowledge base has not been built")]
    IndexEmpty,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Errors that abort a pipeline run. Everything else degrades in place.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Responder failed: {0}")]
    Responder(#[source] LlmError),
}
