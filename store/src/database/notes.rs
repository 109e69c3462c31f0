//! Note operations
//!
//! Every mutation keeps the full-text shadow row in step inside the same
//! transaction, except soft delete which leaves the index untouched so the
//! trash stays searchable.

use super::fts::{self, strip_html};
use super::models::*;
use super::repository::Repository;
use super::tags::{merge_tags, normalize_tag_list};
use crate::config::{DEFAULT_NOTE_COLOR, DEFAULT_NOTE_TITLE, DERIVED_TITLE_MAX_CHARS};
use crate::crypto::sha256_hex;
use crate::error::{AppError, Result};
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

/// Non-empty title: the given one, else the first non-blank content line
/// cut to [`DERIVED_TITLE_MAX_CHARS`], else [`DEFAULT_NOTE_TITLE`].
pub fn normalize_title(title: &str, content: &str) -> String {
    let title = title.trim();
    if !title.is_empty() {
        return title.to_string();
    }

    strip_html(content)
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.chars().take(DERIVED_TITLE_MAX_CHARS).collect::<String>())
        .map(|line| line.trim_end().to_string())
        .unwrap_or_else(|| DEFAULT_NOTE_TITLE.to_string())
}

/// `-1` and other non-positive ids from the UI mean "no category"
pub(crate) fn normalize_category(category_id: Option<i64>) -> Option<i64> {
    category_id.filter(|id| *id > 0)
}

fn content_hash(note: &NewNote) -> Option<String> {
    match &note.data_blob {
        Some(blob) if !blob.is_empty() => Some(sha256_hex(blob)),
        _ => text_hash(&note.content),
    }
}

fn text_hash(content: &str) -> Option<String> {
    if content.trim().is_empty() {
        None
    } else {
        Some(sha256_hex(content.as_bytes()))
    }
}

/// Assignment that re-keys a text note after its content changes. Notes
/// keyed by their blob keep the blob hash.
const REHASH_CONTENT: &str =
    "content_hash = CASE WHEN length(data_blob) > 0 THEN content_hash ELSE ? END";

/// Color and preset tags of a live category
pub(crate) async fn category_defaults(
    conn: &mut SqliteConnection,
    category_id: i64,
) -> Result<(String, String)> {
    sqlx::query_as("SELECT color, preset_tags FROM categories WHERE id = ? AND is_deleted = 0")
        .bind(category_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::CategoryNotFound(category_id))
}

async fn resolve_color(
    conn: &mut SqliteConnection,
    requested: Option<&str>,
    category_id: Option<i64>,
) -> Result<String> {
    if let Some(color) = requested.map(str::trim).filter(|c| !c.is_empty()) {
        return Ok(color.to_string());
    }
    match category_id {
        Some(id) => Ok(category_defaults(conn, id).await?.0),
        None => Ok(DEFAULT_NOTE_COLOR.to_string()),
    }
}

fn push_id_list(qb: &mut QueryBuilder<'_, Sqlite>, ids: &[i64]) {
    qb.push("(");
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");
}

fn bind_state<'q>(
    query: sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    value: &StateValue,
) -> sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    match value {
        StateValue::Null => query.bind(None::<i64>),
        StateValue::Bool(b) => query.bind(*b),
        StateValue::Int(i) => query.bind(*i),
        StateValue::Text(s) => query.bind(s.clone()),
    }
}

impl Repository {
    /// Insert a note and its shadow row. A capture whose content hash
    /// matches a live note is merged into that note instead, and the
    /// existing id is returned.
    pub async fn add_note(&self, note: NewNote) -> Result<i64> {
        let title = normalize_title(&note.title, &note.content);
        let category_id = normalize_category(note.category_id);
        let item_type = if note.item_type.trim().is_empty() {
            "text".to_string()
        } else {
            note.item_type.trim().to_string()
        };
        let hash = content_hash(&note);
        let mut tags = normalize_tag_list(&note.tags);

        let mut tx = self.pool.begin().await?;

        if let Some(hash) = &hash {
            let existing: Option<(i64, String)> = sqlx::query_as(
                "SELECT id, tags FROM notes WHERE content_hash = ? AND is_deleted = 0 ORDER BY id LIMIT 1",
            )
            .bind(hash)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some((id, existing_tags)) = existing {
                sqlx::query(
                    r#"
                    UPDATE notes
                    SET tags = ?, updated_at = ?,
                        source_app = CASE WHEN ? = '' THEN source_app ELSE ? END,
                        source_title = CASE WHEN ? = '' THEN source_title ELSE ? END
                    WHERE id = ?
                    "#,
                )
                .bind(merge_tags(&existing_tags, &tags))
                .bind(Utc::now())
                .bind(&note.source_app)
                .bind(&note.source_app)
                .bind(&note.source_title)
                .bind(&note.source_title)
                .bind(id)
                .execute(&mut *tx)
                .await?;

                fts::sync_fts_by_id(&mut tx, id).await?;
                tx.commit().await?;

                tracing::debug!("Duplicate capture merged into note {}", id);
                self.emit(StoreEvent::NoteAdded { id });
                return Ok(id);
            }
        }

        let color = match category_id {
            Some(cat) => {
                let (cat_color, preset) = category_defaults(&mut tx, cat).await?;
                tags = merge_tags(&tags, &preset);
                match note.color.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
                    Some(c) => c.to_string(),
                    None => cat_color,
                }
            }
            None => resolve_color(&mut tx, note.color.as_deref(), None).await?,
        };

        let now = Utc::now();
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO notes (title, content, tags, color, category_id, item_type, data_blob,
                               content_hash, source_app, source_title, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&title)
        .bind(&note.content)
        .bind(&tags)
        .bind(&color)
        .bind(category_id)
        .bind(&item_type)
        .bind(&note.data_blob)
        .bind(&hash)
        .bind(&note.source_app)
        .bind(&note.source_title)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        fts::sync_fts(&mut tx, id, &title, &note.content, &tags).await?;
        tx.commit().await?;

        tracing::debug!("Created note {} ({})", id, item_type);
        self.emit(StoreEvent::NoteAdded { id });
        Ok(id)
    }

    /// Get a note by id, trashed notes included
    pub async fn get_note_by_id(&self, id: i64) -> Result<Note> {
        sqlx::query_as::<_, Note>("SELECT * FROM notes WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NoteNotFound(id))
    }

    /// All live notes visible in this session, default order
    pub async fn get_all_notes(&self) -> Result<Vec<Note>> {
        self.search_notes(&SearchQuery::default(), None).await
    }

    /// Replace every editable field of a note
    pub async fn update_note(&self, id: i64, update: NoteUpdate) -> Result<()> {
        let title = normalize_title(&update.title, &update.content);
        let tags = normalize_tag_list(&update.tags);
        let category_id = normalize_category(update.category_id);

        let mut tx = self.pool.begin().await?;

        let color = resolve_color(&mut tx, update.color.as_deref(), category_id).await?;

        let rows = sqlx::query(&format!(
            "UPDATE notes SET title = ?, content = ?, {}, tags = ?, color = ?, category_id = ?, \
             updated_at = ? WHERE id = ?",
            REHASH_CONTENT
        ))
        .bind(&title)
        .bind(&update.content)
        .bind(text_hash(&update.content))
        .bind(&tags)
        .bind(&color)
        .bind(category_id)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if rows == 0 {
            return Err(AppError::NoteNotFound(id));
        }

        fts::sync_fts(&mut tx, id, &title, &update.content, &tags).await?;
        tx.commit().await?;

        tracing::debug!("Updated note {}", id);
        self.emit(StoreEvent::NotesChanged);
        Ok(())
    }

    /// Patch one allow-listed column of one note
    pub async fn update_note_state(&self, id: i64, column: NoteColumn, value: StateValue) -> Result<()> {
        let rows = self.update_note_state_batch(&[id], column, value).await?;
        if rows == 0 {
            return Err(AppError::NoteNotFound(id));
        }
        Ok(())
    }

    /// Patch one allow-listed column of many notes in one transaction.
    /// Missing ids are skipped; returns the number of rows changed.
    pub async fn update_note_state_batch(
        &self,
        ids: &[i64],
        column: NoteColumn,
        value: StateValue,
    ) -> Result<u64> {
        // Checked before the connection is touched
        let value = column.validate(value)?;
        if ids.is_empty() {
            return Ok(0);
        }

        // Same color and preset tag handling as an explicit move
        if column == NoteColumn::CategoryId {
            let category_id = match value {
                StateValue::Int(id) => Some(id),
                _ => None,
            };
            return self.move_notes_to_category(ids, category_id).await;
        }

        let rehash = match (&value, column) {
            (StateValue::Text(content), NoteColumn::Content) => Some(text_hash(content)),
            _ => None,
        };
        let sql = match rehash {
            Some(_) => format!(
                "UPDATE notes SET {} = ?, {}, updated_at = ? WHERE id = ?",
                column.column_name(),
                REHASH_CONTENT
            ),
            None => format!(
                "UPDATE notes SET {} = ?, updated_at = ? WHERE id = ?",
                column.column_name()
            ),
        };

        let mut tx = self.pool.begin().await?;

        let now = Utc::now();
        let mut changed = 0;
        for &id in ids {
            let mut query = bind_state(sqlx::query(&sql), &value);
            if let Some(hash) = &rehash {
                query = query.bind(hash.clone());
            }
            let rows = query
                .bind(now)
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
            changed += rows;

            if rows > 0 && column.is_searchable() {
                fts::sync_fts_by_id(&mut tx, id).await?;
            }
        }

        tx.commit().await?;

        tracing::debug!("Set {} on {} notes", column.column_name(), changed);
        self.emit(StoreEvent::NotesChanged);
        Ok(changed)
    }

    /// Flip a boolean column; returns the new value
    pub async fn toggle_note_state(&self, id: i64, column: NoteColumn) -> Result<bool> {
        if !column.is_boolean() {
            return Err(AppError::Validation(format!(
                "Column {} is not a flag",
                column.column_name()
            )));
        }

        let mut tx = self.pool.begin().await?;

        let current: bool = sqlx::query_scalar(&format!(
            "SELECT {} FROM notes WHERE id = ?",
            column.column_name()
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NoteNotFound(id))?;

        sqlx::query(&format!(
            "UPDATE notes SET {} = ?, updated_at = ? WHERE id = ?",
            column.column_name()
        ))
        .bind(!current)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.emit(StoreEvent::NotesChanged);
        Ok(!current)
    }

    /// Move notes to the trash. The shadow rows stay.
    pub async fn soft_delete_notes(&self, ids: &[i64]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE notes SET is_deleted = 1, deleted_at = ");
        qb.push_bind(Utc::now());
        qb.push(" WHERE is_deleted = 0 AND id IN ");
        push_id_list(&mut qb, ids);

        let rows = qb.build().execute(&self.pool).await?.rows_affected();

        tracing::debug!("Soft deleted {} notes", rows);
        self.emit(StoreEvent::NotesChanged);
        Ok(rows)
    }

    /// Bring notes back from the trash. A note whose category is still in
    /// the trash comes back uncategorized.
    pub async fn restore_notes(&self, ids: &[i64]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;

        let mut qb = QueryBuilder::<Sqlite>::new(
            "UPDATE notes SET is_deleted = 0, deleted_at = NULL WHERE is_deleted = 1 AND id IN ",
        );
        push_id_list(&mut qb, ids);
        let rows = qb.build().execute(&mut *tx).await?.rows_affected();

        let mut qb = QueryBuilder::<Sqlite>::new(
            "UPDATE notes SET category_id = NULL WHERE category_id IN \
             (SELECT id FROM categories WHERE is_deleted = 1) AND id IN ",
        );
        push_id_list(&mut qb, ids);
        qb.build().execute(&mut *tx).await?;

        tx.commit().await?;

        tracing::debug!("Restored {} notes", rows);
        self.emit(StoreEvent::NotesChanged);
        Ok(rows)
    }

    /// Permanently delete notes and their shadow rows, all or nothing.
    /// Missing ids are ignored.
    pub async fn delete_notes_batch(&self, ids: &[i64]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;

        let mut deleted = 0;
        for &id in ids {
            deleted += sqlx::query("DELETE FROM notes WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
            fts::remove_fts(&mut tx, id).await?;
        }

        tx.commit().await?;

        tracing::info!("Permanently deleted {} notes", deleted);
        self.emit(StoreEvent::NotesChanged);
        Ok(deleted)
    }

    /// Reassign notes to a category (or none), taking on its color and
    /// merging its preset tags
    pub async fn move_notes_to_category(&self, ids: &[i64], category_id: Option<i64>) -> Result<u64> {
        let category_id = normalize_category(category_id);
        if ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;

        let (color, preset) = match category_id {
            Some(cat) => category_defaults(&mut tx, cat).await?,
            None => (DEFAULT_NOTE_COLOR.to_string(), String::new()),
        };

        let now = Utc::now();
        let mut moved = 0;
        for &id in ids {
            let tags: Option<String> = sqlx::query_scalar("SELECT tags FROM notes WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
            let Some(tags) = tags else { continue };

            sqlx::query(
                "UPDATE notes SET category_id = ?, color = ?, tags = ?, updated_at = ? WHERE id = ?",
            )
            .bind(category_id)
            .bind(&color)
            .bind(merge_tags(&tags, &preset))
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await?;
            fts::sync_fts_by_id(&mut tx, id).await?;
            moved += 1;
        }

        tx.commit().await?;

        tracing::debug!("Moved {} notes to category {:?}", moved, category_id);
        self.emit(StoreEvent::NotesChanged);
        Ok(moved)
    }

    /// Best effort: failures are logged and never reach the caller
    pub async fn record_access(&self, id: i64) {
        let result = sqlx::query(
            "UPDATE notes SET accessed_at = ?, access_count = access_count + 1 WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            tracing::warn!("Failed to record access for note {}: {}", id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repository::tests::create_test_repo;

    async fn fts_count(repo: &Repository, id: i64) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM notes_fts WHERE rowid = ?")
            .bind(id)
            .fetch_one(&repo.pool)
            .await
            .unwrap()
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("  Kept  ", "x"), "Kept");
        assert_eq!(normalize_title("", "\n\n  hello world \nmore"), "hello world");
        assert_eq!(normalize_title("", "   "), DEFAULT_NOTE_TITLE);
        assert_eq!(normalize_title("", &"x".repeat(80)).chars().count(), DERIVED_TITLE_MAX_CHARS);
        assert_eq!(normalize_title("", "<p>rich</p>"), "rich");
    }

    #[tokio::test]
    async fn test_empty_title_is_derived() {
        let repo = create_test_repo().await;

        let id = repo.add_note(NewNote::text("", "hello world")).await.unwrap();

        let note = repo.get_note_by_id(id).await.unwrap();
        assert_eq!(note.title, "hello world");
        assert_eq!(note.color, DEFAULT_NOTE_COLOR);
        assert_eq!(note.item_type, "text");
    }

    #[tokio::test]
    async fn test_add_note_emits_event() {
        let repo = create_test_repo().await;
        let mut rx = repo.subscribe();

        let id = repo.add_note(NewNote::text("Hi", "there")).await.unwrap();

        match rx.recv().await.unwrap() {
            StoreEvent::NoteAdded { id: got } => assert_eq!(got, id),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_capture_merges() {
        let repo = create_test_repo().await;

        let first = repo
            .add_note(NewNote::text("Clip", "same text").with_tags(["a"]))
            .await
            .unwrap();
        let second = repo
            .add_note(NewNote::text("Clip again", "same text").with_tags(["b"]))
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(repo.get_note_by_id(first).await.unwrap().tags, "a, b");
        assert_eq!(repo.get_all_notes().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_add_into_category_inherits_color_and_presets() {
        let repo = create_test_repo().await;
        let cat = repo.add_category("Work", None, Some("#123456")).await.unwrap();
        repo.set_category_preset_tags(cat, "work, q3").await.unwrap();

        let id = repo
            .add_note(NewNote::text("Plan", "body").with_tags(["draft"]).in_category(cat))
            .await
            .unwrap();

        let note = repo.get_note_by_id(id).await.unwrap();
        assert_eq!(note.color, "#123456");
        assert_eq!(note.tags, "draft, work, q3");
        assert_eq!(note.category_id, Some(cat));
    }

    #[tokio::test]
    async fn test_add_into_missing_category_fails() {
        let repo = create_test_repo().await;

        let result = repo.add_note(NewNote::text("x", "y").in_category(77)).await;

        assert!(matches!(result, Err(AppError::CategoryNotFound(77))));
        assert!(repo.get_all_notes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_note() {
        let repo = create_test_repo().await;
        let id = repo.add_note(NewNote::text("Old", "old body")).await.unwrap();

        repo.update_note(
            id,
            NoteUpdate {
                title: "New".into(),
                content: "fresh words".into(),
                tags: vec!["t1".into()],
                color: None,
                category_id: Some(-1),
            },
        )
        .await
        .unwrap();

        let note = repo.get_note_by_id(id).await.unwrap();
        assert_eq!(note.title, "New");
        assert_eq!(note.tags, "t1");
        assert_eq!(note.category_id, None);

        let hits = repo.search_notes(&SearchQuery::keyword("fresh"), None).await.unwrap();
        assert_eq!(hits.len(), 1);

        assert!(matches!(
            repo.update_note(999, NoteUpdate::default()).await,
            Err(AppError::NoteNotFound(999))
        ));
    }

    #[tokio::test]
    async fn test_update_note_state() {
        let repo = create_test_repo().await;
        let id = repo.add_note(NewNote::text("S", "state")).await.unwrap();

        repo.update_note_state(id, NoteColumn::Rating, StateValue::Int(4)).await.unwrap();
        repo.update_note_state(id, NoteColumn::Favorite, true.into()).await.unwrap();

        let note = repo.get_note_by_id(id).await.unwrap();
        assert_eq!(note.rating, 4);
        assert!(note.is_favorite);

        assert!(repo
            .update_note_state(id, NoteColumn::Rating, "high".into())
            .await
            .is_err());
        assert!(matches!(
            repo.update_note_state(999, NoteColumn::Pinned, true.into()).await,
            Err(AppError::NoteNotFound(999))
        ));
    }

    #[tokio::test]
    async fn test_update_state_batch_resyncs_search() {
        let repo = create_test_repo().await;
        let a = repo.add_note(NewNote::text("A", "one")).await.unwrap();
        let b = repo.add_note(NewNote::text("B", "two")).await.unwrap();

        let changed = repo
            .update_note_state_batch(&[a, b, 999], NoteColumn::Content, "zebra".into())
            .await
            .unwrap();

        assert_eq!(changed, 2);
        let hits = repo.search_notes(&SearchQuery::keyword("zebra"), None).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn test_edited_content_no_longer_absorbs_old_capture() {
        let repo = create_test_repo().await;
        let first = repo.add_note(NewNote::text("Clip", "alpha")).await.unwrap();

        repo.update_note(
            first,
            NoteUpdate {
                title: "Clip".into(),
                content: "beta".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(
            repo.get_note_by_id(first).await.unwrap().content_hash,
            Some(sha256_hex(b"beta"))
        );

        let second = repo.add_note(NewNote::text("Clip", "alpha")).await.unwrap();
        assert_ne!(first, second);

        // Editing through a state patch re-keys as well
        repo.update_note_state(second, NoteColumn::Content, "gamma".into())
            .await
            .unwrap();
        let third = repo.add_note(NewNote::text("Clip", "alpha")).await.unwrap();
        assert_ne!(third, second);
        assert_eq!(repo.add_note(NewNote::text("Clip", "gamma")).await.unwrap(), second);

        let mut contents: Vec<String> = repo
            .get_all_notes()
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.content)
            .collect();
        contents.sort();
        assert_eq!(contents, vec!["alpha", "beta", "gamma"]);
    }

    #[tokio::test]
    async fn test_category_patch_applies_category_defaults() {
        let repo = create_test_repo().await;
        let cat = repo.add_category("Ideas", None, Some("#abcdef")).await.unwrap();
        repo.set_category_preset_tags(cat, "idea").await.unwrap();
        let id = repo
            .add_note(NewNote::text("N", "patched").with_tags(["own"]))
            .await
            .unwrap();

        repo.update_note_state(id, NoteColumn::CategoryId, StateValue::Int(cat))
            .await
            .unwrap();

        let note = repo.get_note_by_id(id).await.unwrap();
        assert_eq!(note.category_id, Some(cat));
        assert_eq!(note.color, "#abcdef");
        assert_eq!(note.tags, "own, idea");

        repo.update_note_state(id, NoteColumn::CategoryId, StateValue::Int(-1))
            .await
            .unwrap();
        let note = repo.get_note_by_id(id).await.unwrap();
        assert_eq!(note.category_id, None);
        assert_eq!(note.color, DEFAULT_NOTE_COLOR);

        assert!(matches!(
            repo.update_note_state(id, NoteColumn::CategoryId, StateValue::Int(404)).await,
            Err(AppError::CategoryNotFound(404))
        ));
        assert!(matches!(
            repo.update_note_state(999, NoteColumn::CategoryId, StateValue::Int(cat)).await,
            Err(AppError::NoteNotFound(999))
        ));
    }

    #[tokio::test]
    async fn test_toggle_note_state() {
        let repo = create_test_repo().await;
        let id = repo.add_note(NewNote::text("T", "toggle")).await.unwrap();

        assert!(repo.toggle_note_state(id, NoteColumn::Pinned).await.unwrap());
        assert!(!repo.toggle_note_state(id, NoteColumn::Pinned).await.unwrap());
        assert!(repo.toggle_note_state(id, NoteColumn::Rating).await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_toggles_do_not_lose_updates() {
        let repo = create_test_repo().await;
        let id = repo.add_note(NewNote::text("C", "concurrent")).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.toggle_note_state(id, NoteColumn::Favorite).await.unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // An even number of flips lands back on the start value
        assert!(!repo.get_note_by_id(id).await.unwrap().is_favorite);
    }

    #[tokio::test]
    async fn test_soft_delete_keeps_shadow_row() {
        let repo = create_test_repo().await;
        let id = repo.add_note(NewNote::text("Gone", "soon")).await.unwrap();

        assert_eq!(repo.soft_delete_notes(&[id]).await.unwrap(), 1);

        let note = repo.get_note_by_id(id).await.unwrap();
        assert!(note.is_deleted);
        assert!(note.deleted_at.is_some());
        assert_eq!(fts_count(&repo, id).await, 1);

        assert_eq!(repo.restore_notes(&[id]).await.unwrap(), 1);
        assert!(!repo.get_note_by_id(id).await.unwrap().is_deleted);
    }

    #[tokio::test]
    async fn test_delete_notes_batch_removes_shadow_rows() {
        let repo = create_test_repo().await;
        let a = repo.add_note(NewNote::text("A", "alpha")).await.unwrap();
        let b = repo.add_note(NewNote::text("B", "beta")).await.unwrap();

        assert_eq!(repo.delete_notes_batch(&[a, b, 12345]).await.unwrap(), 2);

        assert!(matches!(
            repo.get_note_by_id(a).await,
            Err(AppError::NoteNotFound(_))
        ));
        assert_eq!(fts_count(&repo, a).await, 0);
        assert_eq!(fts_count(&repo, b).await, 0);
    }

    #[tokio::test]
    async fn test_move_notes_to_category() {
        let repo = create_test_repo().await;
        let cat = repo.add_category("Inbox", None, Some("#abcdef")).await.unwrap();
        repo.set_category_preset_tags(cat, "inbox").await.unwrap();
        let id = repo.add_note(NewNote::text("M", "move me")).await.unwrap();

        assert_eq!(repo.move_notes_to_category(&[id], Some(cat)).await.unwrap(), 1);

        let note = repo.get_note_by_id(id).await.unwrap();
        assert_eq!(note.category_id, Some(cat));
        assert_eq!(note.color, "#abcdef");
        assert_eq!(note.tags, "inbox");

        repo.move_notes_to_category(&[id], Some(-1)).await.unwrap();
        assert_eq!(repo.get_note_by_id(id).await.unwrap().category_id, None);
    }

    #[tokio::test]
    async fn test_record_access() {
        let repo = create_test_repo().await;
        let id = repo.add_note(NewNote::text("R", "visited")).await.unwrap();

        repo.record_access(id).await;
        repo.record_access(id).await;
        // Unknown ids are silently ignored
        repo.record_access(4242).await;

        let note = repo.get_note_by_id(id).await.unwrap();
        assert_eq!(note.access_count, 2);
        assert!(note.accessed_at.is_some());
    }
}
