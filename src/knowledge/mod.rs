//! Knowledge base build: chunk reference documents into the full-text index
//! the retrieval stage searches.

pub mod chunker;
pub mod index;

pub use chunker::*;
pub use index::*;

use std::path::PathBuf;

use thiserror::Error;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum KnowledgeError {
    #[error("Cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<rusqlite::Error> for KnowledgeError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(DatabaseError::from(e))
    }
}
