use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::KnowledgeChunk;

/// Remove every indexed passage.
pub fn clear_knowledge_chunks(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute("DELETE FROM knowledge_chunks", [])?;
    Ok(())
}

pub fn insert_knowledge_chunk(conn: &Connection, chunk: &KnowledgeChunk) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO knowledge_chunks (content, source, chunk_index) VALUES (?1, ?2, ?3)",
        params![chunk.content, chunk.source, chunk.chunk_index as i64],
    )?;
    Ok(())
}

pub fn count_knowledge_chunks(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row("SELECT COUNT(*) FROM knowledge_chunks", [], |row| row.get(0))?;
    Ok(count)
}

/// Search passages using FTS5 full-text search.
///
/// Any query term may match; results are ranked by relevance (BM25), best first.
pub fn search_knowledge_chunks(
    conn: &Connection,
    query: &str,
    limit: usize,
) -> Result<Vec<KnowledgeChunk>, DatabaseError> {
    let sanitized = sanitize_fts_query(query);
    if sanitized.is_empty() || limit == 0 {
        return Ok(Vec::new());
    }

    let mut stmt = conn.prepare(
        "SELECT content, source, chunk_index
         FROM knowledge_chunks
         WHERE knowledge_chunks MATCH ?1
         ORDER BY rank
         LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![sanitized, limit as i64], |row| {
        Ok(KnowledgeChunk {
            content: row.get(0)?,
            source: row.get(1)?,
            chunk_index: row.get::<_, i64>(2)? as usize,
        })
    })?;

    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// Sanitize a search query for FTS5.
/// Strips operators, drops very short words and ORs the remaining prefix terms.
fn sanitize_fts_query(query: &str) -> String {
    let cleaned: String = query
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { ' ' })
        .collect();

    cleaned
        .split_whitespace()
        .filter(|w| w.chars().count() >= 3)
        .map(|w| format!("\"{}\"*", w.to_lowercase()))
        .collect::<Vec<_>>()
        .join(" OR ")
}
