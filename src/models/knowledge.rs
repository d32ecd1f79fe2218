use serde::{Deserialize, Serialize};

/// One indexed passage of the informational knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    pub source: String,
    pub chunk_index: usize,
    pub content: String,
}
