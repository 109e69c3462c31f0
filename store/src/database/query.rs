//! Note listing, counting and facet statistics
//!
//! `search_notes`, `get_notes_count`, `get_filter_stats` and `get_counts`
//! all build their FROM/WHERE clauses through one [`FilterPlan`], so a count
//! always agrees with the page it describes. Notes filed under a locked
//! category (or below one) are excluded from every plan.

use super::fts::{keyword_terms, sanitize_fts_keyword};
use super::models::*;
use super::repository::Repository;
use super::session::{collect_subtree, TreeRow};
use super::tags::{escape_like, parse_tags};
use crate::error::Result;
use chrono::{Local, NaiveDate};
use sqlx::{Encode, QueryBuilder, Sqlite, SqliteConnection, Type};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
enum KeywordMode {
    Off,
    Fts(String),
    Like(Vec<String>),
}

fn push_in<'q, T>(qb: &mut QueryBuilder<'q, Sqlite>, expr: &str, values: impl IntoIterator<Item = T>)
where
    T: 'q + Encode<'q, Sqlite> + Type<Sqlite> + Send,
{
    qb.push(" AND ");
    qb.push(expr);
    qb.push(" IN (");
    let mut separated = qb.separated(", ");
    for value in values {
        separated.push_bind(value);
    }
    separated.push_unseparated(")");
}

fn date_keys(dates: &[NaiveDate]) -> Vec<String> {
    dates.iter().map(|d| d.format("%Y-%m-%d").to_string()).collect()
}

fn push_criteria(qb: &mut QueryBuilder<'_, Sqlite>, criteria: &Criteria) {
    if !criteria.stars.is_empty() {
        push_in(qb, "notes.rating", criteria.stars.iter().copied());
    }
    if !criteria.colors.is_empty() {
        push_in(qb, "notes.color", criteria.colors.iter().cloned());
    }
    if !criteria.types.is_empty() {
        push_in(qb, "notes.item_type", criteria.types.iter().cloned());
    }
    if !criteria.tags.is_empty() {
        qb.push(" AND (");
        for (i, tag) in criteria.tags.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            qb.push("(', ' || notes.tags || ',') LIKE ");
            qb.push_bind(format!("%, {},%", escape_like(tag.trim())));
            qb.push(" ESCAPE '\\'");
        }
        qb.push(")");
    }
    if !criteria.date_create.is_empty() {
        push_in(
            qb,
            "date(notes.created_at, 'localtime')",
            date_keys(&criteria.date_create),
        );
    }
    if !criteria.date_update.is_empty() {
        push_in(
            qb,
            "date(notes.updated_at, 'localtime')",
            date_keys(&criteria.date_update),
        );
    }
}

struct FilterPlan<'a> {
    keyword: KeywordMode,
    filter: FilterType,
    criteria: Option<&'a Criteria>,
    hidden: &'a [i64],
    /// Local date that Today and Yesterday are relative to
    today: NaiveDate,
}

impl<'a> FilterPlan<'a> {
    fn new(filter: FilterType, criteria: Option<&'a Criteria>, hidden: &'a [i64], today: NaiveDate) -> Self {
        Self {
            keyword: KeywordMode::Off,
            filter,
            criteria,
            hidden,
            today,
        }
    }

    /// Settle the keyword strategy. FTS is kept when the sanitized
    /// expression matches a row this plan would return; otherwise
    /// (including FTS syntax errors) the plain terms are scanned with
    /// `LIKE`, which also finds substrings the tokenizer does not split out.
    async fn with_keyword(mut self, conn: &mut SqliteConnection, keyword: &str) -> Self {
        let Some(expr) = sanitize_fts_keyword(keyword) else {
            return self;
        };
        self.keyword = KeywordMode::Fts(expr.clone());

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT EXISTS(SELECT 1");
        self.push_from_where(&mut qb);
        qb.push(")");
        let probe: std::result::Result<i64, sqlx::Error> =
            qb.build_query_scalar().fetch_one(&mut *conn).await;

        match probe {
            Ok(hit) if hit > 0 => {}
            Ok(_) => self.keyword = KeywordMode::Like(keyword_terms(keyword)),
            Err(e) => {
                tracing::warn!("FTS rejected {:?}, falling back to LIKE: {}", expr, e);
                self.keyword = KeywordMode::Like(keyword_terms(keyword));
            }
        }
        self
    }

    fn push_from_where(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        qb.push(" FROM notes");
        if matches!(self.keyword, KeywordMode::Fts(_)) {
            qb.push(" JOIN notes_fts ON notes_fts.rowid = notes.id");
        }

        if self.filter == FilterType::Trash {
            qb.push(" WHERE notes.is_deleted = 1");
        } else {
            qb.push(" WHERE notes.is_deleted = 0");
        }

        match &self.keyword {
            KeywordMode::Off => {}
            KeywordMode::Fts(expr) => {
                qb.push(" AND notes_fts MATCH ");
                qb.push_bind(expr.clone());
            }
            KeywordMode::Like(terms) => {
                for term in terms {
                    let pattern = format!("%{}%", escape_like(term));
                    qb.push(" AND (notes.title LIKE ");
                    qb.push_bind(pattern.clone());
                    qb.push(" ESCAPE '\\' OR notes.content LIKE ");
                    qb.push_bind(pattern.clone());
                    qb.push(" ESCAPE '\\' OR notes.tags LIKE ");
                    qb.push_bind(pattern);
                    qb.push(" ESCAPE '\\')");
                }
            }
        }

        match self.filter {
            FilterType::All | FilterType::Trash => {}
            FilterType::Today => {
                qb.push(" AND date(notes.created_at, 'localtime') = ");
                qb.push_bind(self.today.format("%Y-%m-%d").to_string());
            }
            FilterType::Yesterday => {
                let yesterday = self.today.pred_opt().unwrap_or(self.today);
                qb.push(" AND date(notes.created_at, 'localtime') = ");
                qb.push_bind(yesterday.format("%Y-%m-%d").to_string());
            }
            FilterType::RecentlyVisited => {
                qb.push(" AND notes.accessed_at IS NOT NULL");
            }
            FilterType::Uncategorized => {
                qb.push(" AND notes.category_id IS NULL");
            }
            FilterType::Untagged => {
                qb.push(" AND TRIM(notes.tags) = ''");
            }
            FilterType::Bookmark => {
                qb.push(" AND notes.is_favorite = 1");
            }
            FilterType::Category(id) => {
                // UNION (not UNION ALL) stops on corrupted cyclic parents
                qb.push(" AND notes.category_id IN (WITH RECURSIVE subtree(id) AS (SELECT ");
                qb.push_bind(id);
                qb.push(
                    " UNION SELECT categories.id FROM categories \
                     JOIN subtree ON categories.parent_id = subtree.id) \
                     SELECT id FROM subtree)",
                );
            }
        }

        if !self.hidden.is_empty() {
            qb.push(" AND (notes.category_id IS NULL OR notes.category_id NOT IN (");
            let mut separated = qb.separated(", ");
            for id in self.hidden {
                separated.push_bind(*id);
            }
            separated.push_unseparated("))");
        }

        if let Some(criteria) = self.criteria {
            push_criteria(qb, criteria);
        }
    }

    fn push_order_by(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        match self.filter {
            FilterType::Trash => {
                qb.push(" ORDER BY notes.deleted_at DESC, notes.id DESC");
            }
            FilterType::RecentlyVisited => {
                qb.push(" ORDER BY notes.accessed_at DESC, notes.id DESC");
            }
            _ => {
                qb.push(" ORDER BY notes.is_pinned DESC");
                if matches!(self.keyword, KeywordMode::Fts(_)) {
                    qb.push(", notes_fts.rank");
                }
                qb.push(", notes.updated_at DESC, notes.id DESC");
            }
        }
    }
}

async fn count_plan(conn: &mut SqliteConnection, plan: &FilterPlan<'_>) -> Result<i64> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*)");
    plan.push_from_where(&mut qb);
    Ok(qb.build_query_scalar().fetch_one(&mut *conn).await?)
}

async fn group_counts<K>(conn: &mut SqliteConnection, plan: &FilterPlan<'_>, expr: &str) -> Result<Vec<(K, i64)>>
where
    K: for<'r> sqlx::Decode<'r, Sqlite> + Type<Sqlite> + Send + Unpin,
{
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT ");
    qb.push(expr);
    qb.push(", COUNT(*)");
    plan.push_from_where(&mut qb);
    qb.push(" GROUP BY 1");
    Ok(qb.build_query_as::<(K, i64)>().fetch_all(&mut *conn).await?)
}

/// Add each category's descendants' counts to its own
pub fn roll_up_category_counts(categories: &[Category], direct: &BTreeMap<i64, i64>) -> BTreeMap<i64, i64> {
    let rows: Vec<TreeRow> = categories
        .iter()
        .map(|c| TreeRow {
            id: c.id,
            parent_id: c.parent_id,
            has_password: c.has_password(),
        })
        .collect();

    categories
        .iter()
        .map(|c| {
            let total = collect_subtree(&rows, &[c.id])
                .iter()
                .map(|id| direct.get(id).copied().unwrap_or(0))
                .sum();
            (c.id, total)
        })
        .collect()
}

impl Repository {
    fn local_today(&self) -> NaiveDate {
        self.clock.now().with_timezone(&Local).date_naive()
    }

    /// One page (or all) of notes matching the query
    pub async fn search_notes(&self, query: &SearchQuery, page: Option<Page>) -> Result<Vec<Note>> {
        let mut conn = self.pool.acquire().await?;
        let hidden = self.hidden_category_ids(&mut conn).await?;
        let plan = FilterPlan::new(query.filter, Some(&query.criteria), &hidden, self.local_today())
            .with_keyword(&mut conn, &query.keyword)
            .await;

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT notes.*");
        plan.push_from_where(&mut qb);
        plan.push_order_by(&mut qb);

        if let Some(page) = page {
            let offset = i64::from(page.page.max(1) - 1) * i64::from(page.size);
            qb.push(" LIMIT ");
            qb.push_bind(i64::from(page.size));
            qb.push(" OFFSET ");
            qb.push_bind(offset);
        }

        let notes = qb.build_query_as::<Note>().fetch_all(&mut *conn).await?;
        Ok(notes)
    }

    /// Number of notes `search_notes` would return without paging
    pub async fn get_notes_count(&self, query: &SearchQuery) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        let hidden = self.hidden_category_ids(&mut conn).await?;
        let plan = FilterPlan::new(query.filter, Some(&query.criteria), &hidden, self.local_today())
            .with_keyword(&mut conn, &query.keyword)
            .await;

        count_plan(&mut conn, &plan).await
    }

    /// Facet counts for the keyword and filter. The query's own criteria
    /// are not applied, so every facet value stays selectable.
    pub async fn get_filter_stats(&self, query: &SearchQuery) -> Result<FilterStats> {
        let mut conn = self.pool.acquire().await?;
        let hidden = self.hidden_category_ids(&mut conn).await?;
        let plan = FilterPlan::new(query.filter, None, &hidden, self.local_today())
            .with_keyword(&mut conn, &query.keyword)
            .await;

        let mut stats = FilterStats::default();
        stats.stars = (0..=5).map(|star| (star, 0)).collect();

        for (star, count) in group_counts::<i64>(&mut conn, &plan, "notes.rating").await? {
            stats.stars.insert(star, count);
        }
        stats.colors = group_counts::<String>(&mut conn, &plan, "notes.color")
            .await?
            .into_iter()
            .collect();
        stats.types = group_counts::<String>(&mut conn, &plan, "notes.item_type")
            .await?
            .into_iter()
            .collect();
        stats.date_create =
            group_counts::<Option<String>>(&mut conn, &plan, "date(notes.created_at, 'localtime')")
                .await?
                .into_iter()
                .filter_map(|(date, count)| date.map(|d| (d, count)))
                .collect();
        stats.date_update =
            group_counts::<Option<String>>(&mut conn, &plan, "date(notes.updated_at, 'localtime')")
                .await?
                .into_iter()
                .filter_map(|(date, count)| date.map(|d| (d, count)))
                .collect();

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT notes.tags");
        plan.push_from_where(&mut qb);
        let tag_rows: Vec<String> = qb.build_query_scalar().fetch_all(&mut *conn).await?;
        for raw in tag_rows {
            for tag in parse_tags(&raw) {
                *stats.tags.entry(tag).or_insert(0) += 1;
            }
        }

        Ok(stats)
    }

    /// Sidebar buckets plus direct per-category counts
    pub async fn get_counts(&self) -> Result<Counts> {
        let mut conn = self.pool.acquire().await?;
        let hidden = self.hidden_category_ids(&mut conn).await?;
        let today = self.local_today();
        let plan = |filter| FilterPlan::new(filter, None, &hidden, today);

        let mut counts = Counts {
            all: count_plan(&mut conn, &plan(FilterType::All)).await?,
            today: count_plan(&mut conn, &plan(FilterType::Today)).await?,
            yesterday: count_plan(&mut conn, &plan(FilterType::Yesterday)).await?,
            recently_visited: count_plan(&mut conn, &plan(FilterType::RecentlyVisited)).await?,
            uncategorized: count_plan(&mut conn, &plan(FilterType::Uncategorized)).await?,
            untagged: count_plan(&mut conn, &plan(FilterType::Untagged)).await?,
            bookmark: count_plan(&mut conn, &plan(FilterType::Bookmark)).await?,
            trash: count_plan(&mut conn, &plan(FilterType::Trash)).await?,
            categories: BTreeMap::new(),
        };

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT notes.category_id, COUNT(*)");
        plan(FilterType::All).push_from_where(&mut qb);
        qb.push(" AND notes.category_id IS NOT NULL GROUP BY notes.category_id");
        let rows: Vec<(i64, i64)> = qb.build_query_as().fetch_all(&mut *conn).await?;
        counts.categories = rows.into_iter().collect();

        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repository::tests::create_test_repo;

    async fn ids(repo: &Repository, query: &SearchQuery) -> Vec<i64> {
        repo.search_notes(query, None)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect()
    }

    #[tokio::test]
    async fn test_locked_category_hides_notes() {
        let repo = create_test_repo().await;
        let work = repo.add_category("Work", None, None).await.unwrap();
        let nested = repo.add_category("Nested", Some(work), None).await.unwrap();
        repo.add_note(NewNote::text("Budget", "numbers").in_category(work))
            .await
            .unwrap();
        repo.add_note(NewNote::text("Deeper", "inside").in_category(nested))
            .await
            .unwrap();
        let open = repo.add_note(NewNote::text("Open", "visible")).await.unwrap();

        repo.set_category_password(work, "pw", "").await.unwrap();

        let all = SearchQuery::default();
        assert_eq!(ids(&repo, &all).await, vec![open]);
        assert_eq!(repo.get_notes_count(&all).await.unwrap(), 1);
        assert!(repo
            .search_notes(&SearchQuery::keyword("Budget"), None)
            .await
            .unwrap()
            .is_empty());
        let in_work = SearchQuery::filter(FilterType::Category(work));
        assert_eq!(repo.get_notes_count(&in_work).await.unwrap(), 0);

        assert!(repo.verify_category_password(work, "pw").await.unwrap());
        assert_eq!(repo.get_notes_count(&all).await.unwrap(), 3);
        assert_eq!(repo.get_notes_count(&in_work).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_count_matches_listing_for_every_filter() {
        let repo = create_test_repo().await;
        let cat = repo.add_category("Cat", None, None).await.unwrap();
        let a = repo
            .add_note(NewNote::text("Alpha", "first").with_tags(["x"]))
            .await
            .unwrap();
        let b = repo.add_note(NewNote::text("Beta", "second").in_category(cat)).await.unwrap();
        let c = repo.add_note(NewNote::text("Gamma", "third")).await.unwrap();
        repo.update_note_state(a, NoteColumn::Favorite, true.into()).await.unwrap();
        repo.record_access(b).await;
        repo.soft_delete_notes(&[c]).await.unwrap();

        let filters = [
            FilterType::All,
            FilterType::Today,
            FilterType::Yesterday,
            FilterType::RecentlyVisited,
            FilterType::Uncategorized,
            FilterType::Untagged,
            FilterType::Bookmark,
            FilterType::Trash,
            FilterType::Category(cat),
        ];
        for filter in filters {
            let query = SearchQuery::filter(filter);
            let listed = repo.search_notes(&query, None).await.unwrap().len() as i64;
            assert_eq!(repo.get_notes_count(&query).await.unwrap(), listed, "{filter:?}");
        }

        assert_eq!(ids(&repo, &SearchQuery::filter(FilterType::Trash)).await, vec![c]);
        assert_eq!(ids(&repo, &SearchQuery::filter(FilterType::Bookmark)).await, vec![a]);
        assert_eq!(ids(&repo, &SearchQuery::filter(FilterType::RecentlyVisited)).await, vec![b]);
        assert_eq!(ids(&repo, &SearchQuery::filter(FilterType::Untagged)).await, vec![b]);
        assert_eq!(repo.get_notes_count(&SearchQuery::filter(FilterType::Today)).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_category_filter_includes_descendants() {
        let repo = create_test_repo().await;
        let root = repo.add_category("Root", None, None).await.unwrap();
        let child = repo.add_category("Child", Some(root), None).await.unwrap();
        let other = repo.add_category("Other", None, None).await.unwrap();
        let in_root = repo.add_note(NewNote::text("R", "r").in_category(root)).await.unwrap();
        let in_child = repo.add_note(NewNote::text("C", "c").in_category(child)).await.unwrap();
        repo.add_note(NewNote::text("O", "o").in_category(other)).await.unwrap();

        let mut found = ids(&repo, &SearchQuery::filter(FilterType::Category(root))).await;
        found.sort_unstable();
        assert_eq!(found, vec![in_root, in_child]);
        assert_eq!(
            ids(&repo, &SearchQuery::filter(FilterType::Category(child))).await,
            vec![in_child]
        );
    }

    #[tokio::test]
    async fn test_keyword_fts_and_like_fallback() {
        let repo = create_test_repo().await;
        let budget = repo
            .add_note(NewNote::text("Budget", "<p>quarterly <b>numbers</b></p>"))
            .await
            .unwrap();
        repo.add_note(NewNote::text("Groceries", "milk")).await.unwrap();

        // Prefix match through the index
        assert_eq!(ids(&repo, &SearchQuery::keyword("budg")).await, vec![budget]);
        assert_eq!(ids(&repo, &SearchQuery::keyword("quarterly numbers")).await, vec![budget]);
        // Infix only: the tokenizer can't see it, LIKE can
        assert_eq!(ids(&repo, &SearchQuery::keyword("udge")).await, vec![budget]);
        // LIKE wildcards in the input are literal
        assert!(ids(&repo, &SearchQuery::keyword("%")).await.is_empty());
        // Nothing left after sanitizing means no keyword filter
        assert_eq!(repo.get_notes_count(&SearchQuery::keyword("\"*")).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_keyword_strategy_follows_visible_rows() {
        let repo = create_test_repo().await;
        let trashed = repo.add_note(NewNote::text("Old", "budget")).await.unwrap();
        let live = repo.add_note(NewNote::text("Live", "xbudgetx")).await.unwrap();
        repo.soft_delete_notes(&[trashed]).await.unwrap();

        // The trashed word match must not switch live results to FTS
        let query = SearchQuery::keyword("budget");
        assert_eq!(ids(&repo, &query).await, vec![live]);
        assert_eq!(repo.get_notes_count(&query).await.unwrap(), 1);

        // Inside the trash the indexed word match is used
        let in_trash = SearchQuery {
            filter: FilterType::Trash,
            ..SearchQuery::keyword("budget")
        };
        assert_eq!(ids(&repo, &in_trash).await, vec![trashed]);

        // Same for a word match hidden behind a lock
        let vault = repo.add_category("Vault", None, None).await.unwrap();
        repo.add_note(NewNote::text("Secret", "ledger").in_category(vault))
            .await
            .unwrap();
        let open = repo.add_note(NewNote::text("Open", "subledgers")).await.unwrap();
        repo.set_category_password(vault, "pw", "").await.unwrap();

        let query = SearchQuery::keyword("ledger");
        assert_eq!(ids(&repo, &query).await, vec![open]);
        assert_eq!(repo.get_notes_count(&query).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_today_and_yesterday_follow_clock() {
        struct FixedClock(chrono::DateTime<chrono::Utc>);
        impl crate::config::Clock for FixedClock {
            fn now(&self) -> chrono::DateTime<chrono::Utc> {
                self.0
            }
        }

        let tomorrow = chrono::Utc::now() + chrono::Duration::days(1);
        let repo = create_test_repo()
            .await
            .with_clock(std::sync::Arc::new(FixedClock(tomorrow)));
        let id = repo.add_note(NewNote::text("Now", "written today")).await.unwrap();

        assert!(ids(&repo, &SearchQuery::filter(FilterType::Today)).await.is_empty());
        assert_eq!(
            ids(&repo, &SearchQuery::filter(FilterType::Yesterday)).await,
            vec![id]
        );

        let counts = repo.get_counts().await.unwrap();
        assert_eq!(counts.today, 0);
        assert_eq!(counts.yesterday, 1);
    }

    #[tokio::test]
    async fn test_criteria_or_within_and_across() {
        let repo = create_test_repo().await;
        let a = repo
            .add_note(NewNote::text("A", "a").with_tags(["work", "urgent"]))
            .await
            .unwrap();
        let b = repo
            .add_note(NewNote::text("B", "b").with_tags(["home"]))
            .await
            .unwrap();
        repo.add_note(NewNote::text("C", "c").with_tags(["workshop"]))
            .await
            .unwrap();
        repo.update_note_state(a, NoteColumn::Rating, StateValue::Int(5)).await.unwrap();
        repo.update_note_state(b, NoteColumn::Rating, StateValue::Int(3)).await.unwrap();

        let mut query = SearchQuery::default();
        query.criteria.tags = vec!["work".to_string()];
        // Whole-tag match: "workshop" is not "work"
        assert_eq!(ids(&repo, &query).await, vec![a]);

        query.criteria.tags = vec!["work".to_string(), "home".to_string()];
        let mut found = ids(&repo, &query).await;
        found.sort_unstable();
        assert_eq!(found, vec![a, b]);

        query.criteria.stars = vec![3];
        assert_eq!(ids(&repo, &query).await, vec![b]);

        query.criteria = Criteria {
            date_create: vec![NaiveDate::from_ymd_opt(2001, 1, 1).unwrap()],
            ..Default::default()
        };
        assert!(ids(&repo, &query).await.is_empty());

        query.criteria = Criteria {
            types: vec!["text".to_string()],
            ..Default::default()
        };
        assert_eq!(repo.get_notes_count(&query).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_pagination_and_pinned_first() {
        let repo = create_test_repo().await;
        let mut created = Vec::new();
        for i in 0..5 {
            created.push(
                repo.add_note(NewNote::text(format!("N{i}"), format!("body {i}")))
                    .await
                    .unwrap(),
            );
        }
        repo.update_note_state(created[0], NoteColumn::Pinned, true.into())
            .await
            .unwrap();

        let first = repo
            .search_notes(&SearchQuery::default(), Some(Page { page: 1, size: 2 }))
            .await
            .unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].id, created[0]);

        let last = repo
            .search_notes(&SearchQuery::default(), Some(Page { page: 3, size: 2 }))
            .await
            .unwrap();
        assert_eq!(last.len(), 1);

        let beyond = repo
            .search_notes(&SearchQuery::default(), Some(Page { page: 9, size: 2 }))
            .await
            .unwrap();
        assert!(beyond.is_empty());
    }

    #[tokio::test]
    async fn test_filter_stats_ignore_criteria() {
        let repo = create_test_repo().await;
        let a = repo
            .add_note(NewNote::text("A", "a").with_tags(["red", "blue"]))
            .await
            .unwrap();
        repo.add_note(NewNote::text("B", "b").with_tags(["red"])).await.unwrap();
        repo.update_note_state(a, NoteColumn::Rating, StateValue::Int(4)).await.unwrap();

        let mut query = SearchQuery::default();
        query.criteria.stars = vec![4];
        let stats = repo.get_filter_stats(&query).await.unwrap();

        assert_eq!(stats.stars.len(), 6);
        assert_eq!(stats.stars[&4], 1);
        assert_eq!(stats.stars[&0], 1);
        assert_eq!(stats.tags["red"], 2);
        assert_eq!(stats.tags["blue"], 1);
        assert_eq!(stats.types["text"], 2);
        assert_eq!(stats.date_create.values().sum::<i64>(), 2);
    }

    #[tokio::test]
    async fn test_counts_and_roll_up() {
        let repo = create_test_repo().await;
        let parent = repo.add_category("Parent", None, None).await.unwrap();
        let child = repo.add_category("Child", Some(parent), None).await.unwrap();
        repo.add_note(NewNote::text("P", "p").in_category(parent)).await.unwrap();
        repo.add_note(NewNote::text("C1", "c1").in_category(child)).await.unwrap();
        repo.add_note(NewNote::text("C2", "c2").in_category(child)).await.unwrap();
        let loose = repo.add_note(NewNote::text("L", "l")).await.unwrap();
        repo.soft_delete_notes(&[loose]).await.unwrap();

        let counts = repo.get_counts().await.unwrap();
        assert_eq!(counts.all, 3);
        assert_eq!(counts.trash, 1);
        assert_eq!(counts.uncategorized, 0);
        assert_eq!(counts.categories[&parent], 1);
        assert_eq!(counts.categories[&child], 2);

        let categories = repo.get_all_categories().await.unwrap();
        let totals = roll_up_category_counts(&categories, &counts.categories);
        assert_eq!(totals[&parent], 3);
        assert_eq!(totals[&child], 2);
    }
}
