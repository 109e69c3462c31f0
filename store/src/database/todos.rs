//! Todo CRUD
//!
//! Completing a repeating todo schedules its next occurrence in the same
//! transaction.

use super::models::*;
use super::repository::Repository;
use crate::error::{AppError, Result};
use chrono::{DateTime, Duration, Months, NaiveDate, Utc};
use sqlx::SqliteConnection;

fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("Todo title must not be empty".to_string()));
    }
    Ok(title.to_string())
}

/// The time one repeat step after `time`, or `None` for non-repeating todos
pub fn next_occurrence(time: DateTime<Utc>, mode: RepeatMode) -> Option<DateTime<Utc>> {
    match mode {
        RepeatMode::None => None,
        RepeatMode::Daily => Some(time + Duration::days(1)),
        RepeatMode::Weekly => Some(time + Duration::weeks(1)),
        RepeatMode::Monthly => time.checked_add_months(Months::new(1)),
        RepeatMode::Hourly => Some(time + Duration::hours(1)),
        RepeatMode::Minutely => Some(time + Duration::minutes(1)),
        RepeatMode::Secondly => Some(time + Duration::seconds(1)),
    }
}

async fn insert_todo(conn: &mut SqliteConnection, todo: &NewTodo, title: &str) -> Result<i64> {
    let now = Utc::now();
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO todos (title, content, start_time, end_time, status, reminder_time,
                           priority, color, note_id, repeat_mode, parent_id, progress,
                           created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
        RETURNING id
        "#,
    )
    .bind(title)
    .bind(&todo.content)
    .bind(todo.start_time)
    .bind(todo.end_time)
    .bind(TodoStatus::Pending)
    .bind(todo.reminder_time)
    .bind(todo.priority)
    .bind(&todo.color)
    .bind(todo.note_id)
    .bind(todo.repeat_mode)
    .bind(todo.parent_id)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    Ok(id)
}

/// Copy of `todo` moved one repeat step forward
fn following_occurrence(todo: &Todo) -> Option<NewTodo> {
    let mode = todo.repeat_mode;
    if mode == RepeatMode::None {
        return None;
    }
    let shift = |time: Option<DateTime<Utc>>| time.and_then(|t| next_occurrence(t, mode));

    let start_time = match todo.start_time {
        Some(start) => Some(next_occurrence(start, mode)?),
        None => Some(next_occurrence(Utc::now(), mode)?),
    };

    Some(NewTodo {
        title: todo.title.clone(),
        content: todo.content.clone(),
        start_time,
        end_time: shift(todo.end_time),
        reminder_time: shift(todo.reminder_time),
        priority: todo.priority,
        color: todo.color.clone(),
        note_id: todo.note_id,
        repeat_mode: mode,
        parent_id: todo.parent_id,
    })
}

impl Repository {
    pub async fn add_todo(&self, todo: NewTodo) -> Result<i64> {
        let title = validate_title(&todo.title)?;

        let mut conn = self.pool.acquire().await?;
        let id = insert_todo(&mut conn, &todo, &title).await?;

        tracing::debug!("Created todo {}", id);
        self.emit(StoreEvent::TodosChanged);
        Ok(id)
    }

    pub async fn get_todo(&self, id: i64) -> Result<Todo> {
        sqlx::query_as::<_, Todo>("SELECT * FROM todos WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::TodoNotFound(id))
    }

    /// Save every field of `todo`. Marking a repeating todo done inserts
    /// its next occurrence; returns that occurrence's id.
    pub async fn update_todo(&self, todo: &Todo) -> Result<Option<i64>> {
        let title = validate_title(&todo.title)?;
        if !(0..=100).contains(&todo.progress) {
            return Err(AppError::Validation(format!(
                "Progress must be between 0 and 100, got {}",
                todo.progress
            )));
        }

        let mut tx = self.pool.begin().await?;

        let previous: TodoStatus = sqlx::query_scalar("SELECT status FROM todos WHERE id = ?")
            .bind(todo.id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::TodoNotFound(todo.id))?;

        sqlx::query(
            r#"
            UPDATE todos
            SET title = ?, content = ?, start_time = ?, end_time = ?, status = ?,
                reminder_time = ?, priority = ?, color = ?, note_id = ?, repeat_mode = ?,
                parent_id = ?, progress = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&title)
        .bind(&todo.content)
        .bind(todo.start_time)
        .bind(todo.end_time)
        .bind(todo.status)
        .bind(todo.reminder_time)
        .bind(todo.priority)
        .bind(&todo.color)
        .bind(todo.note_id)
        .bind(todo.repeat_mode)
        .bind(todo.parent_id)
        .bind(todo.progress)
        .bind(Utc::now())
        .bind(todo.id)
        .execute(&mut *tx)
        .await?;

        let mut next_id = None;
        if previous != TodoStatus::Done && todo.status == TodoStatus::Done {
            if let Some(next) = following_occurrence(todo) {
                next_id = Some(insert_todo(&mut tx, &next, &title).await?);
            }
        }

        tx.commit().await?;

        if let Some(next) = next_id {
            tracing::debug!("Todo {} repeats as {}", todo.id, next);
        }
        self.emit(StoreEvent::TodosChanged);
        Ok(next_id)
    }

    /// Delete a todo and its subtasks
    pub async fn delete_todo(&self, id: i64) -> Result<()> {
        let rows = sqlx::query("DELETE FROM todos WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if rows == 0 {
            return Err(AppError::TodoNotFound(id));
        }

        tracing::debug!("Deleted todo {}", id);
        self.emit(StoreEvent::TodosChanged);
        Ok(())
    }

    /// Todos on a local calendar day, by start time or creation time
    pub async fn get_todos_by_date(&self, date: NaiveDate) -> Result<Vec<Todo>> {
        let todos = sqlx::query_as::<_, Todo>(
            r#"
            SELECT * FROM todos
            WHERE date(COALESCE(start_time, created_at), 'localtime') = ?
            ORDER BY COALESCE(start_time, created_at), priority DESC, id
            "#,
        )
        .bind(date.format("%Y-%m-%d").to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(todos)
    }

    /// Every pending todo, whatever its date
    pub async fn get_all_pending_todos(&self) -> Result<Vec<Todo>> {
        let todos = sqlx::query_as::<_, Todo>(
            "SELECT * FROM todos WHERE status = ? ORDER BY reminder_time IS NULL, reminder_time, id",
        )
        .bind(TodoStatus::Pending)
        .fetch_all(&self.pool)
        .await?;

        Ok(todos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repository::tests::create_test_repo;
    use chrono::{Local, TimeZone};

    fn new_todo(title: &str) -> NewTodo {
        NewTodo {
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_todo_crud() {
        let repo = create_test_repo().await;
        let id = repo.add_todo(new_todo("Write report")).await.unwrap();

        let mut todo = repo.get_todo(id).await.unwrap();
        assert_eq!(todo.status, TodoStatus::Pending);
        assert_eq!(todo.progress, 0);

        todo.progress = 40;
        todo.content = "half way".to_string();
        assert_eq!(repo.update_todo(&todo).await.unwrap(), None);
        assert_eq!(repo.get_todo(id).await.unwrap().progress, 40);

        todo.progress = 101;
        assert!(repo.update_todo(&todo).await.is_err());

        repo.delete_todo(id).await.unwrap();
        assert!(matches!(repo.get_todo(id).await, Err(AppError::TodoNotFound(_))));
        assert!(repo.delete_todo(id).await.is_err());
        assert!(repo.add_todo(new_todo("  ")).await.is_err());
    }

    #[tokio::test]
    async fn test_subtasks_deleted_with_parent() {
        let repo = create_test_repo().await;
        let parent = repo.add_todo(new_todo("Parent")).await.unwrap();
        let child = repo
            .add_todo(NewTodo {
                parent_id: Some(parent),
                ..new_todo("Child")
            })
            .await
            .unwrap();

        repo.delete_todo(parent).await.unwrap();

        assert!(repo.get_todo(child).await.is_err());
    }

    #[tokio::test]
    async fn test_pending_and_by_date() {
        let repo = create_test_repo().await;
        let day = NaiveDate::from_ymd_opt(2030, 6, 15).unwrap();
        let local_noon = Local
            .from_local_datetime(&day.and_hms_opt(12, 0, 0).unwrap())
            .unwrap()
            .with_timezone(&Utc);

        let dated = repo
            .add_todo(NewTodo {
                start_time: Some(local_noon),
                ..new_todo("Dated")
            })
            .await
            .unwrap();
        let undated = repo.add_todo(new_todo("Undated")).await.unwrap();

        let on_day: Vec<i64> = repo
            .get_todos_by_date(day)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(on_day, vec![dated]);

        let today = Local::now().date_naive();
        let created_today: Vec<i64> = repo
            .get_todos_by_date(today)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(created_today, vec![undated]);

        let mut done = repo.get_todo(undated).await.unwrap();
        done.status = TodoStatus::Done;
        repo.update_todo(&done).await.unwrap();

        let pending: Vec<i64> = repo
            .get_all_pending_todos()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(pending, vec![dated]);
    }

    #[tokio::test]
    async fn test_completing_repeating_todo_schedules_next() {
        let repo = create_test_repo().await;
        let start = Utc.with_ymd_and_hms(2030, 1, 31, 9, 0, 0).unwrap();
        let id = repo
            .add_todo(NewTodo {
                start_time: Some(start),
                reminder_time: Some(start),
                repeat_mode: RepeatMode::Monthly,
                ..new_todo("Pay rent")
            })
            .await
            .unwrap();

        let mut todo = repo.get_todo(id).await.unwrap();
        todo.status = TodoStatus::Done;
        let next = repo.update_todo(&todo).await.unwrap().unwrap();

        let next = repo.get_todo(next).await.unwrap();
        assert_eq!(next.status, TodoStatus::Pending);
        assert_eq!(next.title, "Pay rent");
        let expected = Utc.with_ymd_and_hms(2030, 2, 28, 9, 0, 0).unwrap();
        assert_eq!(next.start_time, Some(expected));
        assert_eq!(next.reminder_time, Some(expected));

        // Saving an already-done todo again does not repeat twice
        assert_eq!(repo.update_todo(&todo).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_completing_one_off_todo_adds_nothing() {
        let repo = create_test_repo().await;
        let undated = repo.add_todo(new_todo("Call back")).await.unwrap();
        let dated = repo
            .add_todo(NewTodo {
                start_time: Some(Utc.with_ymd_and_hms(2030, 5, 1, 9, 0, 0).unwrap()),
                ..new_todo("Dentist")
            })
            .await
            .unwrap();

        for id in [undated, dated] {
            let mut todo = repo.get_todo(id).await.unwrap();
            todo.status = TodoStatus::Done;
            assert_eq!(repo.update_todo(&todo).await.unwrap(), None);
        }

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM todos")
            .fetch_one(&repo.pool)
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert!(repo.get_all_pending_todos().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_undated_repeating_todo_starts_from_now() {
        let repo = create_test_repo().await;
        let id = repo
            .add_todo(NewTodo {
                repeat_mode: RepeatMode::Daily,
                ..new_todo("Water plants")
            })
            .await
            .unwrap();

        let before = Utc::now();
        let mut todo = repo.get_todo(id).await.unwrap();
        todo.status = TodoStatus::Done;
        let next = repo.update_todo(&todo).await.unwrap().unwrap();

        let start = repo.get_todo(next).await.unwrap().start_time.unwrap();
        assert!(start >= before + Duration::days(1));
        assert!(start <= Utc::now() + Duration::days(1));
    }

    #[test]
    fn test_next_occurrence() {
        let t = Utc.with_ymd_and_hms(2030, 3, 1, 8, 30, 0).unwrap();

        assert_eq!(next_occurrence(t, RepeatMode::None), None);
        assert_eq!(
            next_occurrence(t, RepeatMode::Weekly),
            Some(Utc.with_ymd_and_hms(2030, 3, 8, 8, 30, 0).unwrap())
        );
        assert_eq!(
            next_occurrence(t, RepeatMode::Secondly),
            Some(Utc.with_ymd_and_hms(2030, 3, 1, 8, 30, 1).unwrap())
        );
    }
}
