//! Category tree operations
//!
//! Siblings are ordered by `order_index`. Deleting a category always takes
//! its whole subtree and the notes filed in it along. Passwords are stored
//! as Argon2id PHC strings; unlocking is a session grant kept in memory.

use super::fts;
use super::models::*;
use super::notes::normalize_category;
use super::repository::Repository;
use super::session::{collect_subtree, load_tree};
use super::tags::{merge_tags, normalize_tags};
use crate::config::CATEGORY_PALETTE;
use crate::crypto;
use crate::error::{AppError, Result};
use chrono::Utc;
use rand::seq::SliceRandom;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use std::collections::HashSet;

fn random_palette_color() -> String {
    CATEGORY_PALETTE
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("#808080")
        .to_string()
}

async fn ensure_live_category(conn: &mut SqliteConnection, id: i64) -> Result<()> {
    let found: Option<i64> =
        sqlx::query_scalar("SELECT id FROM categories WHERE id = ? AND is_deleted = 0")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
    found.map(|_| ()).ok_or(AppError::CategoryNotFound(id))
}

/// Live siblings under `parent` in display order
async fn sibling_ids(conn: &mut SqliteConnection, parent: Option<i64>) -> Result<Vec<i64>> {
    Ok(sqlx::query_scalar(
        "SELECT id FROM categories WHERE parent_id IS ? AND is_deleted = 0 ORDER BY order_index, id",
    )
    .bind(parent)
    .fetch_all(&mut *conn)
    .await?)
}

async fn write_order(conn: &mut SqliteConnection, ids: &[i64]) -> Result<()> {
    for (index, id) in ids.iter().enumerate() {
        sqlx::query("UPDATE categories SET order_index = ? WHERE id = ?")
            .bind(index as i64)
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Sort live siblings by name, case-insensitively. The sort is stable, so
/// equal names keep their previous relative order.
async fn reorder_siblings(conn: &mut SqliteConnection, parent: Option<i64>, ascending: bool) -> Result<()> {
    let mut siblings: Vec<(i64, String)> = sqlx::query_as(
        "SELECT id, name FROM categories WHERE parent_id IS ? AND is_deleted = 0 ORDER BY order_index, id",
    )
    .bind(parent)
    .fetch_all(&mut *conn)
    .await?;

    siblings.sort_by(|a, b| {
        let ord = a.1.to_lowercase().cmp(&b.1.to_lowercase());
        if ascending {
            ord
        } else {
            ord.reverse()
        }
    });

    let ids: Vec<i64> = siblings.into_iter().map(|(id, _)| id).collect();
    write_order(conn, &ids).await
}

async fn subtree_of(conn: &mut SqliteConnection, roots: &[i64]) -> Result<Vec<i64>> {
    let rows = load_tree(conn).await?;
    Ok(collect_subtree(&rows, roots))
}

fn push_id_list(qb: &mut QueryBuilder<'_, Sqlite>, ids: &[i64]) {
    qb.push("(");
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");
}

impl Repository {
    /// Append a category as the last child of `parent_id`.
    /// A missing color picks one from the palette.
    pub async fn add_category(&self, name: &str, parent_id: Option<i64>, color: Option<&str>) -> Result<i64> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Category name must not be empty".to_string()));
        }
        let parent_id = normalize_category(parent_id);
        let color = color
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .unwrap_or_else(random_palette_color);

        let mut tx = self.pool.begin().await?;

        if let Some(parent) = parent_id {
            ensure_live_category(&mut tx, parent).await?;
        }

        let order_index: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(order_index), -1) + 1 FROM categories WHERE parent_id IS ?",
        )
        .bind(parent_id)
        .fetch_one(&mut *tx)
        .await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO categories (name, parent_id, color, order_index, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(name)
        .bind(parent_id)
        .bind(&color)
        .bind(order_index)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!("Created category {} '{}' under {:?}", id, name, parent_id);
        self.emit(StoreEvent::CategoriesChanged);
        Ok(id)
    }

    pub async fn rename_category(&self, id: i64, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Category name must not be empty".to_string()));
        }

        let rows = sqlx::query("UPDATE categories SET name = ? WHERE id = ?")
            .bind(name)
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if rows == 0 {
            return Err(AppError::CategoryNotFound(id));
        }

        self.emit(StoreEvent::CategoriesChanged);
        Ok(())
    }

    /// Recolor a category, its descendants and their live notes
    pub async fn set_category_color(&self, id: i64, color: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        ensure_live_category(&mut tx, id).await?;

        let subtree = subtree_of(&mut tx, &[id]).await?;

        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE categories SET color = ");
        qb.push_bind(color.to_string());
        qb.push(" WHERE id IN ");
        push_id_list(&mut qb, &subtree);
        qb.build().execute(&mut *tx).await?;

        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE notes SET color = ");
        qb.push_bind(color.to_string());
        qb.push(" WHERE is_deleted = 0 AND category_id IN ");
        push_id_list(&mut qb, &subtree);
        qb.build().execute(&mut *tx).await?;

        tx.commit().await?;

        self.emit(StoreEvent::CategoriesChanged);
        self.emit(StoreEvent::NotesChanged);
        Ok(())
    }

    /// Store preset tags and merge them into the category's live notes
    pub async fn set_category_preset_tags(&self, id: i64, tags: &str) -> Result<()> {
        let tags = normalize_tags(tags);
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query("UPDATE categories SET preset_tags = ? WHERE id = ?")
            .bind(&tags)
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if rows == 0 {
            return Err(AppError::CategoryNotFound(id));
        }

        if !tags.is_empty() {
            let notes: Vec<(i64, String)> = sqlx::query_as(
                "SELECT id, tags FROM notes WHERE category_id = ? AND is_deleted = 0",
            )
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;

            for (note_id, existing) in notes {
                let merged = merge_tags(&existing, &tags);
                if merged == existing {
                    continue;
                }
                sqlx::query("UPDATE notes SET tags = ?, updated_at = ? WHERE id = ?")
                    .bind(&merged)
                    .bind(Utc::now())
                    .bind(note_id)
                    .execute(&mut *tx)
                    .await?;
                fts::sync_fts_by_id(&mut tx, note_id).await?;
            }
        }

        tx.commit().await?;

        self.emit(StoreEvent::CategoriesChanged);
        Ok(())
    }

    pub async fn get_category_preset_tags(&self, id: i64) -> Result<String> {
        sqlx::query_scalar("SELECT preset_tags FROM categories WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::CategoryNotFound(id))
    }

    /// Fill the session `locked` flag
    async fn with_lock_flags(&self, mut categories: Vec<Category>) -> Vec<Category> {
        let unlocked = self.unlocked_snapshot().await;
        for category in &mut categories {
            category.locked = category.has_password() && !unlocked.contains(&category.id);
        }
        categories
    }

    pub async fn get_category(&self, id: i64) -> Result<Category> {
        let category = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::CategoryNotFound(id))?;

        self.with_lock_flags(vec![category])
            .await
            .pop()
            .ok_or(AppError::CategoryNotFound(id))
    }

    /// Live categories, roots first, siblings in display order
    pub async fn get_all_categories(&self) -> Result<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            r#"
            SELECT * FROM categories
            WHERE is_deleted = 0
            ORDER BY parent_id IS NOT NULL, parent_id, order_index, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(self.with_lock_flags(categories).await)
    }

    pub async fn get_child_categories(&self, parent_id: Option<i64>) -> Result<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT * FROM categories WHERE parent_id IS ? AND is_deleted = 0 ORDER BY order_index, id",
        )
        .bind(normalize_category(parent_id))
        .fetch_all(&self.pool)
        .await?;

        Ok(self.with_lock_flags(categories).await)
    }

    pub async fn get_trashed_categories(&self) -> Result<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT * FROM categories WHERE is_deleted = 1 ORDER BY deleted_at DESC, id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(self.with_lock_flags(categories).await)
    }

    /// Move a category among its siblings
    pub async fn move_category(&self, id: i64, direction: MoveDirection) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let parent: Option<i64> =
            sqlx::query_scalar("SELECT parent_id FROM categories WHERE id = ? AND is_deleted = 0")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(AppError::CategoryNotFound(id))?;

        let mut siblings = sibling_ids(&mut tx, parent).await?;
        let Some(pos) = siblings.iter().position(|s| *s == id) else {
            return Err(AppError::CategoryNotFound(id));
        };

        match direction {
            MoveDirection::Up if pos > 0 => siblings.swap(pos, pos - 1),
            MoveDirection::Down if pos + 1 < siblings.len() => siblings.swap(pos, pos + 1),
            MoveDirection::Top => {
                let moved = siblings.remove(pos);
                siblings.insert(0, moved);
            }
            MoveDirection::Bottom => {
                let moved = siblings.remove(pos);
                siblings.push(moved);
            }
            _ => {}
        }

        write_order(&mut tx, &siblings).await?;
        tx.commit().await?;

        self.emit(StoreEvent::CategoriesChanged);
        Ok(())
    }

    /// Sort the children of one parent by name
    pub async fn reorder_categories(&self, parent_id: Option<i64>, ascending: bool) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        reorder_siblings(&mut tx, normalize_category(parent_id), ascending).await?;
        tx.commit().await?;

        self.emit(StoreEvent::CategoriesChanged);
        Ok(())
    }

    /// Sort every sibling group of the tree by name
    pub async fn reorder_all_categories(&self, ascending: bool) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let parents: Vec<Option<i64>> = sqlx::query_scalar(
            "SELECT DISTINCT parent_id FROM categories WHERE is_deleted = 0",
        )
        .fetch_all(&mut *tx)
        .await?;

        for parent in parents {
            reorder_siblings(&mut tx, parent, ascending).await?;
        }

        tx.commit().await?;

        self.emit(StoreEvent::CategoriesChanged);
        Ok(())
    }

    /// Make `ordered_ids` the children of `parent_id`, in exactly that
    /// order. Other children keep their relative order after them.
    /// Duplicates, unknown ids and cycles are rejected with no change.
    pub async fn update_category_order(&self, parent_id: Option<i64>, ordered_ids: &[i64]) -> Result<()> {
        let parent_id = normalize_category(parent_id);

        let mut seen = HashSet::new();
        for id in ordered_ids {
            if !seen.insert(*id) {
                return Err(AppError::Validation(format!("Duplicate category id {}", id)));
            }
            if Some(*id) == parent_id {
                return Err(AppError::CategoryCycle { child: *id, parent: *id });
            }
        }

        let mut tx = self.pool.begin().await?;

        if let Some(parent) = parent_id {
            ensure_live_category(&mut tx, parent).await?;
        }

        let tree = load_tree(&mut tx).await?;
        for &id in ordered_ids {
            ensure_live_category(&mut tx, id).await?;
            if let Some(parent) = parent_id {
                if collect_subtree(&tree, &[id]).contains(&parent) {
                    return Err(AppError::CategoryCycle { child: id, parent });
                }
            }
        }

        let others: Vec<i64> = sibling_ids(&mut tx, parent_id)
            .await?
            .into_iter()
            .filter(|id| !seen.contains(id))
            .collect();

        for (index, id) in ordered_ids.iter().chain(others.iter()).enumerate() {
            sqlx::query("UPDATE categories SET parent_id = ?, order_index = ? WHERE id = ?")
                .bind(parent_id)
                .bind(index as i64)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::debug!("Reordered {} categories under {:?}", ordered_ids.len(), parent_id);
        self.emit(StoreEvent::CategoriesChanged);
        Ok(())
    }

    /// Trash categories, their descendants and every live note inside
    pub async fn soft_delete_categories(&self, ids: &[i64]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        let subtree = subtree_of(&mut tx, ids).await?;
        let now = Utc::now();

        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE categories SET is_deleted = 1, deleted_at = ");
        qb.push_bind(now);
        qb.push(" WHERE is_deleted = 0 AND id IN ");
        push_id_list(&mut qb, &subtree);
        qb.build().execute(&mut *tx).await?;

        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE notes SET is_deleted = 1, deleted_at = ");
        qb.push_bind(now);
        qb.push(" WHERE is_deleted = 0 AND category_id IN ");
        push_id_list(&mut qb, &subtree);
        let notes = qb.build().execute(&mut *tx).await?.rows_affected();

        tx.commit().await?;

        tracing::info!("Trashed {} categories and {} notes", subtree.len(), notes);
        self.emit(StoreEvent::CategoriesChanged);
        self.emit(StoreEvent::NotesChanged);
        Ok(())
    }

    /// Restore trashed categories with their descendants, and the notes
    /// that were trashed together with them. A category whose parent is
    /// still in the trash is reattached at the root.
    pub async fn restore_categories(&self, ids: &[i64]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        let subtree = subtree_of(&mut tx, ids).await?;

        // Notes first: the match uses the category's deletion stamp
        let mut qb = QueryBuilder::<Sqlite>::new(
            "UPDATE notes SET is_deleted = 0, deleted_at = NULL \
             WHERE is_deleted = 1 \
             AND deleted_at >= (SELECT c.deleted_at FROM categories c WHERE c.id = notes.category_id) \
             AND category_id IN ",
        );
        push_id_list(&mut qb, &subtree);
        let notes = qb.build().execute(&mut *tx).await?.rows_affected();

        let mut qb = QueryBuilder::<Sqlite>::new(
            "UPDATE categories SET is_deleted = 0, deleted_at = NULL WHERE id IN ",
        );
        push_id_list(&mut qb, &subtree);
        qb.build().execute(&mut *tx).await?;

        for &id in ids {
            let orphaned: Option<i64> = sqlx::query_scalar(
                r#"
                SELECT c.id FROM categories c
                JOIN categories p ON p.id = c.parent_id
                WHERE c.id = ? AND p.is_deleted = 1
                "#,
            )
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

            if orphaned.is_some() {
                let order_index: i64 = sqlx::query_scalar(
                    "SELECT COALESCE(MAX(order_index), -1) + 1 FROM categories WHERE parent_id IS NULL",
                )
                .fetch_one(&mut *tx)
                .await?;
                sqlx::query("UPDATE categories SET parent_id = NULL, order_index = ? WHERE id = ?")
                    .bind(order_index)
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;

        tracing::info!("Restored {} categories and {} notes", subtree.len(), notes);
        self.emit(StoreEvent::CategoriesChanged);
        self.emit(StoreEvent::NotesChanged);
        Ok(())
    }

    /// Permanently delete categories, descendants, their notes and
    /// shadow rows
    pub async fn hard_delete_categories(&self, ids: &[i64]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        let subtree = subtree_of(&mut tx, ids).await?;

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT id FROM notes WHERE category_id IN ");
        push_id_list(&mut qb, &subtree);
        let note_ids: Vec<i64> = qb.build_query_scalar().fetch_all(&mut *tx).await?;

        for &note_id in &note_ids {
            fts::remove_fts(&mut tx, note_id).await?;
        }

        let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM notes WHERE category_id IN ");
        push_id_list(&mut qb, &subtree);
        qb.build().execute(&mut *tx).await?;

        let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM categories WHERE id IN ");
        push_id_list(&mut qb, &subtree);
        qb.build().execute(&mut *tx).await?;

        tx.commit().await?;

        {
            let mut session = self.session.lock().await;
            for id in &subtree {
                session.unlocked.remove(id);
            }
            if session.active_category.is_some_and(|active| subtree.contains(&active)) {
                session.active_category = None;
            }
        }

        tracing::info!(
            "Permanently deleted {} categories and {} notes",
            subtree.len(),
            note_ids.len()
        );
        self.emit(StoreEvent::CategoriesChanged);
        self.emit(StoreEvent::NotesChanged);
        Ok(())
    }

    /// Permanently delete every trashed note and category
    pub async fn empty_trash(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let note_ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT id FROM notes
            WHERE is_deleted = 1
               OR category_id IN (SELECT id FROM categories WHERE is_deleted = 1)
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;

        // Live notes filed under a trashed category survive uncategorized
        sqlx::query(
            r#"
            UPDATE notes SET category_id = NULL
            WHERE is_deleted = 0
              AND category_id IN (SELECT id FROM categories WHERE is_deleted = 1)
            "#,
        )
        .execute(&mut *tx)
        .await?;

        let mut removed = 0;
        for &id in &note_ids {
            let rows = sqlx::query("DELETE FROM notes WHERE id = ? AND is_deleted = 1")
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
            if rows > 0 {
                fts::remove_fts(&mut tx, id).await?;
                removed += rows;
            }
        }

        sqlx::query(
            r#"
            UPDATE categories SET parent_id = NULL
            WHERE is_deleted = 0
              AND parent_id IN (SELECT id FROM categories WHERE is_deleted = 1)
            "#,
        )
        .execute(&mut *tx)
        .await?;

        let categories = sqlx::query("DELETE FROM categories WHERE is_deleted = 1")
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        tracing::info!("Emptied trash: {} notes, {} categories", removed, categories);
        self.emit(StoreEvent::CategoriesChanged);
        self.emit(StoreEvent::NotesChanged);
        Ok(())
    }

    pub async fn restore_all_from_trash(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE categories SET is_deleted = 0, deleted_at = NULL WHERE is_deleted = 1")
            .execute(&mut *tx)
            .await?;
        let notes = sqlx::query("UPDATE notes SET is_deleted = 0, deleted_at = NULL WHERE is_deleted = 1")
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        tracing::info!("Restored everything from trash ({} notes)", notes);
        self.emit(StoreEvent::CategoriesChanged);
        self.emit(StoreEvent::NotesChanged);
        Ok(())
    }

    // ===== Password locks =====

    /// Set or replace a category password. The category is locked again
    /// for this session.
    pub async fn set_category_password(&self, id: i64, password: &str, hint: &str) -> Result<()> {
        if password.is_empty() {
            return Err(AppError::Validation("Password must not be empty".to_string()));
        }

        let password = password.to_string();
        let hash = tokio::task::spawn_blocking(move || crypto::hash_password(&password))
            .await
            .map_err(|e| AppError::Crypto(format!("Hash task failed: {}", e)))??;

        let rows = sqlx::query("UPDATE categories SET password_hash = ?, password_hint = ? WHERE id = ?")
            .bind(&hash)
            .bind(hint.trim())
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if rows == 0 {
            return Err(AppError::CategoryNotFound(id));
        }

        self.session.lock().await.unlocked.remove(&id);

        tracing::info!("Password set on category {}", id);
        self.emit(StoreEvent::CategoriesChanged);
        Ok(())
    }

    /// Unlock a category for this session. A wrong password, or a category
    /// without one, returns `false` and changes nothing.
    pub async fn verify_category_password(&self, id: i64, password: &str) -> Result<bool> {
        let hash: Option<String> =
            sqlx::query_scalar("SELECT password_hash FROM categories WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or(AppError::CategoryNotFound(id))?;

        let Some(hash) = hash else {
            return Ok(false);
        };

        let password = password.to_string();
        let ok = tokio::task::spawn_blocking(move || crypto::verify_password(&password, &hash))
            .await
            .map_err(|e| AppError::Crypto(format!("Verify task failed: {}", e)))?;

        if ok {
            self.session.lock().await.unlocked.insert(id);
            tracing::info!("Category {} unlocked for this session", id);
            self.emit(StoreEvent::CategoriesChanged);
            self.emit(StoreEvent::NotesChanged);
        } else {
            tracing::debug!("Wrong password for category {}", id);
        }

        Ok(ok)
    }

    pub async fn remove_category_password(&self, id: i64) -> Result<()> {
        let rows = sqlx::query(
            "UPDATE categories SET password_hash = NULL, password_hint = '' WHERE id = ?",
        )
        .bind(id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        if rows == 0 {
            return Err(AppError::CategoryNotFound(id));
        }

        self.session.lock().await.unlocked.remove(&id);

        tracing::info!("Password removed from category {}", id);
        self.emit(StoreEvent::CategoriesChanged);
        self.emit(StoreEvent::NotesChanged);
        Ok(())
    }

    /// Revoke the session grant for one category
    pub async fn lock_category(&self, id: i64) {
        if self.session.lock().await.unlocked.remove(&id) {
            self.emit(StoreEvent::CategoriesChanged);
            self.emit(StoreEvent::NotesChanged);
        }
    }

    /// Revoke every session grant
    pub async fn lock_all_categories(&self) {
        self.session.lock().await.unlocked.clear();
        self.emit(StoreEvent::CategoriesChanged);
        self.emit(StoreEvent::NotesChanged);
    }

    pub async fn category_lock_state(&self, id: i64) -> Result<LockState> {
        let hash: Option<String> =
            sqlx::query_scalar("SELECT password_hash FROM categories WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or(AppError::CategoryNotFound(id))?;

        if hash.is_none() {
            return Ok(LockState::NoPassword);
        }
        if self.session.lock().await.unlocked.contains(&id) {
            Ok(LockState::SessionUnlocked)
        } else {
            Ok(LockState::Locked)
        }
    }

    pub async fn is_category_locked(&self, id: i64) -> Result<bool> {
        Ok(self.category_lock_state(id).await? == LockState::Locked)
    }
}
