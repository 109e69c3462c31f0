//! Reminders service
//!
//! Background poller over pending todos. A todo fires once per local day
//! when its reminder time passed within the last ten minutes.

use crate::config::{Clock, REMINDER_FIRE_WINDOW_SECS, REMINDER_POLL_INTERVAL};
use crate::database::{Repository, StoreEvent, Todo};
use crate::error::Result;
use chrono::{DateTime, Local, NaiveDate, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
struct Notified {
    day: Option<NaiveDate>,
    ids: HashSet<i64>,
}

/// Todos whose reminder is due at `now` and not yet fired
pub fn due_reminders<'a>(todos: &'a [Todo], now: DateTime<Utc>, already: &HashSet<i64>) -> Vec<&'a Todo> {
    todos
        .iter()
        .filter(|todo| !already.contains(&todo.id))
        .filter(|todo| {
            todo.reminder_time.is_some_and(|at| {
                let overdue = (now - at).num_seconds();
                (0..=REMINDER_FIRE_WINDOW_SECS).contains(&overdue)
            })
        })
        .collect()
}

/// Reminders service with background scheduler
#[derive(Clone)]
pub struct RemindersService {
    repo: Repository,
    clock: Arc<dyn Clock>,
    notified: Arc<Mutex<Notified>>,
}

impl RemindersService {
    pub fn new(repo: Repository, clock: Arc<dyn Clock>) -> Self {
        Self {
            repo,
            clock,
            notified: Arc::new(Mutex::new(Notified::default())),
        }
    }

    /// Start the background scheduler. Abort the handle to stop it.
    pub fn start_scheduler(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!("Starting reminders scheduler");

            let mut interval = tokio::time::interval(REMINDER_POLL_INTERVAL);

            loop {
                interval.tick().await;

                if let Err(e) = self.check_and_fire().await {
                    tracing::error!("Error checking reminders: {}", e);
                }
            }
        })
    }

    /// One poll: emit `TodoReminder` for every newly due todo.
    /// Returns how many fired.
    pub async fn check_and_fire(&self) -> Result<usize> {
        let todos = self.repo.get_all_pending_todos().await?;
        let now = self.clock.now();
        let today = now.with_timezone(&Local).date_naive();

        let mut notified = self.notified.lock().await;
        if notified.day != Some(today) {
            notified.day = Some(today);
            notified.ids.clear();
        }

        let due: Vec<Todo> = due_reminders(&todos, now, &notified.ids)
            .into_iter()
            .cloned()
            .collect();

        for todo in &due {
            tracing::info!("Reminder due for todo {}", todo.id);
            notified.ids.insert(todo.id);
            self.repo.emit(StoreEvent::TodoReminder { todo: todo.clone() });
        }

        Ok(due.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SystemClock;
    use crate::database::repository::tests::create_test_repo;
    use crate::database::NewTodo;
    use chrono::Duration;

    #[tokio::test]
    async fn test_fires_once_within_window() {
        let repo = create_test_repo().await;
        let now = Utc::now();
        let due = repo
            .add_todo(NewTodo {
                title: "Call back".to_string(),
                reminder_time: Some(now - Duration::minutes(2)),
                ..Default::default()
            })
            .await
            .unwrap();
        repo.add_todo(NewTodo {
            title: "Stale".to_string(),
            reminder_time: Some(now - Duration::hours(2)),
            ..Default::default()
        })
        .await
        .unwrap();
        repo.add_todo(NewTodo {
            title: "Later".to_string(),
            reminder_time: Some(now + Duration::hours(1)),
            ..Default::default()
        })
        .await
        .unwrap();

        let mut events = repo.subscribe();
        let service = RemindersService::new(repo.clone(), Arc::new(SystemClock));

        assert_eq!(service.check_and_fire().await.unwrap(), 1);
        assert_eq!(service.check_and_fire().await.unwrap(), 0);

        match events.recv().await.unwrap() {
            StoreEvent::TodoReminder { todo } => assert_eq!(todo.id, due),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_due_reminders_window() {
        let now = Utc::now();
        let todo = |id: i64, minutes_ago: i64| Todo {
            id,
            title: "t".to_string(),
            content: String::new(),
            start_time: None,
            end_time: None,
            status: Default::default(),
            reminder_time: Some(now - Duration::minutes(minutes_ago)),
            priority: 0,
            color: String::new(),
            note_id: None,
            repeat_mode: Default::default(),
            parent_id: None,
            progress: 0,
            created_at: now,
            updated_at: now,
        };
        let todos = vec![todo(1, 0), todo(2, 10), todo(3, 11), todo(4, -1)];

        let due: Vec<i64> = due_reminders(&todos, now, &HashSet::new())
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(due, vec![1, 2]);

        let due = due_reminders(&todos, now, &HashSet::from([1]));
        assert_eq!(due.len(), 1);
    }
}
