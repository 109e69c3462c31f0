//! Tag string handling
//!
//! Tags live on the note row as one `", "`-joined string. Every write goes
//! through [`normalize_tags`], so the stored form is canonical and facet
//! matching can rely on the separator.

use super::fts;
use super::models::StoreEvent;
use super::repository::Repository;
use crate::error::{AppError, Result};
use chrono::Utc;
use serde::Serialize;
use sqlx::SqliteConnection;
use std::collections::{BTreeSet, HashMap};

const SEPARATOR: &str = ", ";

/// Split on ASCII and full-width commas, trim, drop empties and duplicates
pub fn parse_tags(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for part in raw.split([',', '，']) {
        let tag = part.trim();
        if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

pub fn join_tags(tags: &[String]) -> String {
    tags.join(SEPARATOR)
}

pub fn normalize_tags(raw: &str) -> String {
    join_tags(&parse_tags(raw))
}

/// Normalize a caller-supplied list; entries may themselves contain commas
pub fn normalize_tag_list<S: AsRef<str>>(tags: &[S]) -> String {
    let joined = tags.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(",");
    normalize_tags(&joined)
}

/// Append `extra` to `existing`, keeping order and dropping duplicates
pub fn merge_tags(existing: &str, extra: &str) -> String {
    normalize_tags(&format!("{},{}", existing, extra))
}

/// A tag with the number of live notes carrying it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub name: String,
    pub count: i64,
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern
pub(crate) fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

async fn set_note_tags(conn: &mut SqliteConnection, id: i64, tags: &str) -> Result<bool> {
    let rows = sqlx::query("UPDATE notes SET tags = ?, updated_at = ? WHERE id = ?")
        .bind(tags)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    Ok(rows > 0)
}

/// Rewrite the tag string of every row mentioning `tag`. `replace` maps the
/// parsed tag list to its new form. Returns the number of rows changed.
async fn rewrite_tag_everywhere<F>(conn: &mut SqliteConnection, tag: &str, replace: F) -> Result<usize>
where
    F: Fn(Vec<String>) -> Vec<String>,
{
    let candidates: Vec<(i64, String)> =
        sqlx::query_as("SELECT id, tags FROM notes WHERE tags LIKE ? ESCAPE '\\'")
            .bind(format!("%{}%", escape_like(tag)))
            .fetch_all(&mut *conn)
            .await?;

    let mut changed = 0;
    for (id, raw) in candidates {
        let current = parse_tags(&raw);
        if !current.iter().any(|t| t == tag) {
            continue;
        }

        let updated = normalize_tag_list(&replace(current));
        set_note_tags(conn, id, &updated).await?;
        fts::sync_fts_by_id(conn, id).await?;
        changed += 1;
    }

    Ok(changed)
}

impl Repository {
    /// Merge tags into one note
    pub async fn add_tags_to_note<S: AsRef<str>>(&self, id: i64, tags: &[S]) -> Result<()> {
        self.add_tags_to_notes(&[id], tags).await
    }

    /// Merge tags into several notes in one transaction
    pub async fn add_tags_to_notes<S: AsRef<str>>(&self, ids: &[i64], tags: &[S]) -> Result<()> {
        let extra = normalize_tag_list(tags);
        if extra.is_empty() || ids.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for &id in ids {
            let raw: String = sqlx::query_scalar("SELECT tags FROM notes WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(AppError::NoteNotFound(id))?;

            set_note_tags(&mut tx, id, &merge_tags(&raw, &extra)).await?;
            fts::sync_fts_by_id(&mut tx, id).await?;
        }

        tx.commit().await?;

        tracing::debug!("Added tags [{}] to {} notes", extra, ids.len());
        self.emit(StoreEvent::NotesChanged);
        Ok(())
    }

    pub async fn remove_tag_from_note(&self, id: i64, tag: &str) -> Result<()> {
        let tag = tag.trim();
        let mut tx = self.pool.begin().await?;

        let raw: String = sqlx::query_scalar("SELECT tags FROM notes WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::NoteNotFound(id))?;

        let remaining: Vec<String> = parse_tags(&raw).into_iter().filter(|t| t != tag).collect();
        set_note_tags(&mut tx, id, &join_tags(&remaining)).await?;
        fts::sync_fts_by_id(&mut tx, id).await?;

        tx.commit().await?;

        self.emit(StoreEvent::NotesChanged);
        Ok(())
    }

    /// Rename a tag on every note, trashed ones included. Returns rows changed.
    pub async fn rename_tag_globally(&self, old: &str, new: &str) -> Result<usize> {
        let old = old.trim().to_string();
        let new = new.trim().to_string();
        if old.is_empty() || new.is_empty() {
            return Err(AppError::Validation("Tag names must not be empty".to_string()));
        }
        if new.contains([',', '，']) {
            return Err(AppError::Validation(format!("Tag name contains a separator: {}", new)));
        }
        if old == new {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let changed = rewrite_tag_everywhere(&mut tx, &old, |tags| {
            tags.into_iter()
                .map(|t| if t == old { new.clone() } else { t })
                .collect()
        })
        .await?;
        tx.commit().await?;

        tracing::info!("Renamed tag '{}' to '{}' on {} notes", old, new, changed);
        self.emit(StoreEvent::NotesChanged);
        Ok(changed)
    }

    /// Remove a tag from every note. Returns rows changed.
    pub async fn delete_tag_globally(&self, tag: &str) -> Result<usize> {
        let tag = tag.trim().to_string();
        if tag.is_empty() {
            return Err(AppError::Validation("Tag name must not be empty".to_string()));
        }

        let mut tx = self.pool.begin().await?;
        let changed = rewrite_tag_everywhere(&mut tx, &tag, |tags| {
            tags.into_iter().filter(|t| *t != tag).collect()
        })
        .await?;
        tx.commit().await?;

        tracing::info!("Deleted tag '{}' from {} notes", tag, changed);
        self.emit(StoreEvent::NotesChanged);
        Ok(changed)
    }

    /// Distinct tags of live notes, sorted
    pub async fn get_all_tags(&self) -> Result<Vec<String>> {
        let rows: Vec<String> =
            sqlx::query_scalar("SELECT tags FROM notes WHERE is_deleted = 0 AND tags != ''")
                .fetch_all(&self.pool)
                .await?;

        let tags: BTreeSet<String> = rows.iter().flat_map(|raw| parse_tags(raw)).collect();
        Ok(tags.into_iter().collect())
    }

    /// Tags ordered by most recent use, with live note counts
    pub async fn get_recent_tags_with_counts(&self, limit: usize) -> Result<Vec<TagCount>> {
        let rows: Vec<String> = sqlx::query_scalar(
            "SELECT tags FROM notes WHERE is_deleted = 0 AND tags != '' ORDER BY updated_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut order: Vec<String> = Vec::new();
        let mut counts: HashMap<String, i64> = HashMap::new();
        for raw in &rows {
            for tag in parse_tags(raw) {
                let count = counts.entry(tag.clone()).or_insert(0);
                if *count == 0 {
                    order.push(tag);
                }
                *count += 1;
            }
        }

        Ok(order
            .into_iter()
            .take(limit)
            .map(|name| {
                let count = counts.get(&name).copied().unwrap_or_default();
                TagCount { name, count }
            })
            .collect())
    }
}
