use rusqlite::Connection;

use super::RetrievalError;
use crate::db::repository;
use crate::models::KnowledgeChunk;

/// Returns at most `k` passages relevant to `topic`, best first.
pub trait Retriever {
    fn retrieve(&self, topic: &str, k: usize) -> Result<Vec<KnowledgeChunk>, RetrievalError>;
}

/// Full-text retrieval over the `knowledge_chunks` index.
pub struct KnowledgeBaseRetriever<'a> {
    conn: &'a Connection,
}

impl<'a> KnowledgeBaseRetriever<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl Retriever for KnowledgeBaseRetriever<'_> {
    fn retrieve(&self, topic: &str, k: usize) -> Result<Vec<KnowledgeChunk>, RetrievalError> {
        if repository::count_knowledge_chunks(self.conn)? == 0 {
            return Err(RetrievalError::IndexEmpty);
        }
        let passages = repository::search_knowledge_chunks(self.conn, topic, k)?;
        tracing::debug!(topic, k, found = passages.len(), "Knowledge base search");
        Ok(passages)
    }
}
