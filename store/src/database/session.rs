//! Per-process session state
//!
//! Unlocked categories, the active category, the auto-categorize switch and
//! the tag clipboard. None of it is persisted: a restart re-locks every
//! category and turns auto-categorize off.

use super::repository::Repository;
use crate::error::Result;
use sqlx::SqliteConnection;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
pub struct SessionState {
    pub(crate) unlocked: HashSet<i64>,
    pub(crate) active_category: Option<i64>,
    pub(crate) auto_categorize: bool,
    pub(crate) tag_clipboard: Vec<String>,
}

/// One row of the category tree as needed for lock evaluation
#[derive(Debug, Clone, Copy)]
pub(crate) struct TreeRow {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub has_password: bool,
}

pub(crate) async fn load_tree(conn: &mut SqliteConnection) -> Result<Vec<TreeRow>> {
    let rows: Vec<(i64, Option<i64>, bool)> = sqlx::query_as(
        "SELECT id, parent_id, password_hash IS NOT NULL FROM categories",
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, parent_id, has_password)| TreeRow {
            id,
            parent_id,
            has_password,
        })
        .collect())
}

/// Categories whose notes are hidden: the category itself or any ancestor
/// has a password and is not in `unlocked`. Cycles in corrupted data are
/// cut at the first repeated node.
pub(crate) fn locked_subtrees(rows: &[TreeRow], unlocked: &HashSet<i64>) -> Vec<i64> {
    let by_id: HashMap<i64, &TreeRow> = rows.iter().map(|row| (row.id, row)).collect();

    let mut hidden: Vec<i64> = rows
        .iter()
        .filter(|row| {
            let mut seen = HashSet::new();
            let mut current = Some(row.id);
            while let Some(id) = current {
                if !seen.insert(id) {
                    break;
                }
                let Some(node) = by_id.get(&id) else { break };
                if node.has_password && !unlocked.contains(&id) {
                    return true;
                }
                current = node.parent_id;
            }
            false
        })
        .map(|row| row.id)
        .collect();

    hidden.sort_unstable();
    hidden
}

/// Ids of `roots` and every descendant, without duplicates
pub(crate) fn collect_subtree(rows: &[TreeRow], roots: &[i64]) -> Vec<i64> {
    let mut children: HashMap<i64, Vec<i64>> = HashMap::new();
    for row in rows {
        if let Some(parent) = row.parent_id {
            children.entry(parent).or_default().push(row.id);
        }
    }

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let mut stack: Vec<i64> = roots.iter().rev().copied().collect();
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        out.push(id);
        if let Some(kids) = children.get(&id) {
            stack.extend(kids.iter().rev().copied());
        }
    }
    out
}

impl Repository {
    pub(crate) async fn unlocked_snapshot(&self) -> HashSet<i64> {
        self.session.lock().await.unlocked.clone()
    }

    /// Category ids excluded from every listing for this session
    pub(crate) async fn hidden_category_ids(&self, conn: &mut SqliteConnection) -> Result<Vec<i64>> {
        let unlocked = self.unlocked_snapshot().await;
        let rows = load_tree(conn).await?;
        Ok(locked_subtrees(&rows, &unlocked))
    }

    pub async fn set_active_category(&self, category_id: Option<i64>) {
        self.session.lock().await.active_category = category_id.filter(|id| *id > 0);
    }

    pub async fn active_category(&self) -> Option<i64> {
        self.session.lock().await.active_category
    }

    pub async fn set_auto_categorize(&self, enabled: bool) {
        self.session.lock().await.auto_categorize = enabled;
        tracing::debug!("Auto-categorize {}", if enabled { "on" } else { "off" });
    }

    pub async fn auto_categorize(&self) -> bool {
        self.session.lock().await.auto_categorize
    }

    /// Copy a note's tags into the session clipboard
    pub async fn copy_tags_from_note(&self, id: i64) -> Result<Vec<String>> {
        let note = self.get_note_by_id(id).await?;
        let tags = note.tag_list();
        self.session.lock().await.tag_clipboard = tags.clone();
        Ok(tags)
    }

    pub async fn tag_clipboard(&self) -> Vec<String> {
        self.session.lock().await.tag_clipboard.clone()
    }

    /// Merge the clipboard tags into each note
    pub async fn paste_tags_to_notes(&self, ids: &[i64]) -> Result<()> {
        let tags = self.tag_clipboard().await;
        self.add_tags_to_notes(ids, tags.as_slice()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::NewNote;
    use crate::database::repository::tests::create_test_repo;

    fn row(id: i64, parent_id: Option<i64>, has_password: bool) -> TreeRow {
        TreeRow {
            id,
            parent_id,
            has_password,
        }
    }

    #[test]
    fn test_locked_subtrees_inherit_from_ancestors() {
        let rows = vec![
            row(1, None, true),
            row(2, Some(1), false),
            row(3, Some(2), false),
            row(4, None, false),
        ];

        assert_eq!(locked_subtrees(&rows, &HashSet::new()), vec![1, 2, 3]);
        assert!(locked_subtrees(&rows, &HashSet::from([1])).is_empty());
    }

    #[test]
    fn test_locked_child_under_unlocked_parent() {
        let rows = vec![row(1, None, true), row(2, Some(1), true)];

        assert_eq!(locked_subtrees(&rows, &HashSet::from([1])), vec![2]);
        // Unlocking the child alone does not expose it under a locked parent
        assert_eq!(locked_subtrees(&rows, &HashSet::from([2])), vec![1, 2]);
    }

    #[test]
    fn test_cycles_terminate() {
        let rows = vec![row(1, Some(2), false), row(2, Some(1), false)];

        assert!(locked_subtrees(&rows, &HashSet::new()).is_empty());
        assert_eq!(collect_subtree(&rows, &[1]), vec![1, 2]);
    }

    #[test]
    fn test_collect_subtree() {
        let rows = vec![
            row(1, None, false),
            row(2, Some(1), false),
            row(3, Some(2), false),
            row(4, None, false),
        ];

        assert_eq!(collect_subtree(&rows, &[1]), vec![1, 2, 3]);
        assert_eq!(collect_subtree(&rows, &[2, 3]), vec![2, 3]);
    }

    #[tokio::test]
    async fn test_session_flags_default_off() {
        let repo = create_test_repo().await;

        assert!(!repo.auto_categorize().await);
        assert_eq!(repo.active_category().await, None);

        repo.set_active_category(Some(-1)).await;
        assert_eq!(repo.active_category().await, None);
    }

    #[tokio::test]
    async fn test_tag_clipboard() {
        let repo = create_test_repo().await;
        let source = repo
            .add_note(NewNote::text("Source", "x").with_tags(["red", "blue"]))
            .await
            .unwrap();
        let target = repo
            .add_note(NewNote::text("Target", "y").with_tags(["green"]))
            .await
            .unwrap();

        repo.copy_tags_from_note(source).await.unwrap();
        repo.paste_tags_to_notes(&[target]).await.unwrap();

        assert_eq!(repo.get_note_by_id(target).await.unwrap().tags, "green, red, blue");
    }
}
