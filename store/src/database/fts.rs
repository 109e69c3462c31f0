//! Full-text search shadow table
//!
//! `notes_fts` holds one row per note, keyed by `rowid = notes.id`, with the
//! title, HTML-stripped content and tags. Soft-deleted notes keep their row;
//! hard delete removes it.

use super::repository::Repository;
use crate::error::Result;
use sqlx::SqliteConnection;

/// Upsert the shadow row of a note
pub(crate) async fn sync_fts(
    conn: &mut SqliteConnection,
    id: i64,
    title: &str,
    content: &str,
    tags: &str,
) -> Result<()> {
    remove_fts(conn, id).await?;

    sqlx::query("INSERT INTO notes_fts (rowid, title, content, tags) VALUES (?, ?, ?, ?)")
        .bind(id)
        .bind(title)
        .bind(strip_html(content))
        .bind(tags)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub(crate) async fn remove_fts(conn: &mut SqliteConnection, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM notes_fts WHERE rowid = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Re-derive the shadow row from the stored note.
/// Returns `false` when the note no longer exists.
pub(crate) async fn sync_fts_by_id(conn: &mut SqliteConnection, id: i64) -> Result<bool> {
    let row: Option<(String, String, String)> =
        sqlx::query_as("SELECT title, content, tags FROM notes WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

    match row {
        Some((title, content, tags)) => {
            sync_fts(conn, id, &title, &content, &tags).await?;
            Ok(true)
        }
        None => {
            remove_fts(conn, id).await?;
            Ok(false)
        }
    }
}

/// Turn free user input into a safe FTS5 expression.
///
/// Quotes and `*` are removed and every remaining whitespace-separated term
/// becomes a quoted prefix phrase, so operators (`AND`, `NEAR`, `col:`) and
/// stray syntax are matched literally. Returns `None` when nothing is left,
/// which callers treat as "no keyword filter".
pub fn sanitize_fts_keyword(keyword: &str) -> Option<String> {
    let terms: Vec<String> = keyword
        .split_whitespace()
        .map(|term| term.replace(['"', '*'], ""))
        .filter(|term| !term.is_empty())
        .map(|term| format!("\"{}\"*", term))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}

/// Plain terms of a keyword, for the `LIKE` fallback
pub(crate) fn keyword_terms(keyword: &str) -> Vec<String> {
    keyword
        .split_whitespace()
        .map(|term| term.replace(['"', '*'], ""))
        .filter(|term| !term.is_empty())
        .collect()
}

/// Drop markup so rich-text notes index their visible text only
pub fn strip_html(content: &str) -> String {
    if !(content.contains('<') && content.contains('>')) {
        return content.to_string();
    }

    let mut text = String::with_capacity(content.len());
    let mut in_tag = false;
    for c in content.chars() {
        match c {
            '<' => {
                in_tag = true;
                text.push(' ');
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    let decoded = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl Repository {
    /// Re-derive one shadow row; `false` if the note is gone
    pub async fn sync_fts_by_id(&self, id: i64) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        sync_fts_by_id(&mut conn, id).await
    }

    /// Regenerate the whole shadow table from `notes`
    pub async fn rebuild_search_index(&self) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM notes_fts").execute(&mut *tx).await?;

        let rows: Vec<(i64, String, String, String)> =
            sqlx::query_as("SELECT id, title, content, tags FROM notes")
                .fetch_all(&mut *tx)
                .await?;

        for (id, title, content, tags) in &rows {
            sync_fts(&mut tx, *id, title, content, tags).await?;
        }

        tx.commit().await?;

        tracing::info!("Search index rebuilt ({} notes)", rows.len());
        Ok(rows.len())
    }
}
