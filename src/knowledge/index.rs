use std::path::{Path, PathBuf};

use rusqlite::Connection;
use serde::Serialize;

use super::{KnowledgeError, TextChunker};
use crate::db::repository;
use crate::models::KnowledgeChunk;

/// Source name of the passage indexed when no documents exist.
pub const PLACEHOLDER_SOURCE: &str = "placeholder";
pub const PLACEHOLDER_TEXT: &str =
    "No reference documents have been added to the knowledge base yet.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub files: usize,
    pub chunks: usize,
}

/// `.txt` / `.md` files directly under `dir`, sorted by name. A missing directory is empty.
pub fn list_source_files(dir: &Path) -> Result<Vec<PathBuf>, KnowledgeError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let entries = std::fs::read_dir(dir).map_err(|source| KnowledgeError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| KnowledgeError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_file() && is_text_document(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn is_text_document(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("txt") || e.eq_ignore_ascii_case("md"))
        .unwrap_or(false)
}

/// Rebuild the full-text index from the documents in `sources_dir`.
///
/// The previous contents are replaced atomically: a read failure leaves the
/// old index in place.
pub fn build_index(conn: &Connection, sources_dir: &Path) -> Result<IndexReport, KnowledgeError> {
    let _span = tracing::info_span!("build_index", dir = %sources_dir.display()).entered();

    let files = list_source_files(sources_dir)?;
    let chunker = TextChunker::default();

    let tx = conn.unchecked_transaction()?;
    repository::clear_knowledge_chunks(&tx)?;

    let mut chunks = 0;
    for path in &files {
        let text = std::fs::read_to_string(path).map_err(|source| KnowledgeError::Io {
            path: path.clone(),
            source,
        })?;
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let pieces = chunker.chunk(&text);
        tracing::debug!(%source, chunks = pieces.len(), "Chunked document");
        for (chunk_index, content) in pieces.into_iter().enumerate() {
            repository::insert_knowledge_chunk(
                &tx,
                &KnowledgeChunk {
                    source: source.clone(),
                    chunk_index,
                    content,
                },
            )?;
            chunks += 1;
        }
    }

    if chunks == 0 {
        repository::insert_knowledge_chunk(
            &tx,
            &KnowledgeChunk {
                source: PLACEHOLDER_SOURCE.to_string(),
                chunk_index: 0,
                content: PLACEHOLDER_TEXT.to_string(),
            },
        )?;
        chunks = 1;
        tracing::warn!("No source documents found, indexed a placeholder passage");
    }

    tx.commit()?;
    tracing::info!(files = files.len(), chunks, "Knowledge base built");
    Ok(IndexReport {
        files: files.len(),
        chunks,
    })
}
