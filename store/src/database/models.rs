//! Database models
//!
//! Rust structs representing database entities and query inputs/outputs.
//! All models use serde for serialization to the UI layer.

use crate::error::{AppError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use std::str::FromStr;

/// A captured or typed note
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Note {
    pub id: i64,
    pub title: String,
    /// Text, or a relative path for file-backed items
    pub content: String,
    /// Comma-joined tag list, e.g. `"work, idea"`
    pub tags: String,
    pub color: String,
    pub category_id: Option<i64>,
    pub item_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_blob: Option<Vec<u8>>,
    pub content_hash: Option<String>,
    pub source_app: String,
    pub source_title: String,
    pub rating: i64,
    pub is_favorite: bool,
    pub is_pinned: bool,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub accessed_at: Option<DateTime<Utc>>,
    pub access_count: i64,
}

impl Note {
    pub fn tag_list(&self) -> Vec<String> {
        super::tags::parse_tags(&self.tags)
    }
}

/// Input for [`super::Repository::add_note`]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewNote {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    /// Empty means `text`
    pub item_type: String,
    pub data_blob: Option<Vec<u8>>,
    /// Empty or `None` inherits the category color
    pub color: Option<String>,
    pub category_id: Option<i64>,
    pub source_app: String,
    pub source_title: String,
}

impl NewNote {
    pub fn text(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            item_type: "text".to_string(),
            ..Default::default()
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn in_category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }
}

/// Full-field note update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoteUpdate {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub color: Option<String>,
    pub category_id: Option<i64>,
}

/// A node of the category tree
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub color: String,
    pub order_index: i64,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub password_hint: String,
    pub preset_tags: String,
    pub created_at: DateTime<Utc>,
    /// Session view: password set and not unlocked in this process
    #[sqlx(skip)]
    #[serde(default)]
    pub locked: bool,
}

impl Category {
    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }
}

/// Lock state of one category for the current session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LockState {
    NoPassword,
    Locked,
    SessionUnlocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveDirection {
    Up,
    Down,
    Top,
    Bottom,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[repr(i32)]
pub enum TodoStatus {
    #[default]
    Pending = 0,
    Done = 1,
    Overdue = 2,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[repr(i32)]
pub enum RepeatMode {
    #[default]
    None = 0,
    Daily = 1,
    Weekly = 2,
    Monthly = 3,
    Hourly = 4,
    Minutely = 5,
    Secondly = 6,
}

/// Scheduled item polled by the reminder service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Todo {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: TodoStatus,
    pub reminder_time: Option<DateTime<Utc>>,
    pub priority: i64,
    pub color: String,
    pub note_id: Option<i64>,
    pub repeat_mode: RepeatMode,
    pub parent_id: Option<i64>,
    pub progress: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTodo {
    pub title: String,
    pub content: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub reminder_time: Option<DateTime<Utc>>,
    pub priority: i64,
    pub color: String,
    pub note_id: Option<i64>,
    pub repeat_mode: RepeatMode,
    pub parent_id: Option<i64>,
}

/// Columns that may be patched through the single-column state API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteColumn {
    Favorite,
    Pinned,
    Rating,
    CategoryId,
    Content,
    Tags,
    Color,
    Title,
    ItemType,
}

impl NoteColumn {
    /// Physical column name. Only these static names ever reach SQL text.
    pub fn column_name(self) -> &'static str {
        match self {
            NoteColumn::Favorite => "is_favorite",
            NoteColumn::Pinned => "is_pinned",
            NoteColumn::Rating => "rating",
            NoteColumn::CategoryId => "category_id",
            NoteColumn::Content => "content",
            NoteColumn::Tags => "tags",
            NoteColumn::Color => "color",
            NoteColumn::Title => "title",
            NoteColumn::ItemType => "item_type",
        }
    }

    pub fn is_boolean(self) -> bool {
        matches!(self, NoteColumn::Favorite | NoteColumn::Pinned)
    }

    /// Whether a change to this column must be mirrored into the search index
    pub fn is_searchable(self) -> bool {
        matches!(self, NoteColumn::Title | NoteColumn::Content | NoteColumn::Tags)
    }

    /// Type-check and normalize a value for this column
    pub fn validate(self, value: StateValue) -> Result<StateValue> {
        let invalid = |value: &StateValue| {
            AppError::Validation(format!(
                "Invalid value {:?} for column {}",
                value,
                self.column_name()
            ))
        };

        match (self, value) {
            (NoteColumn::Favorite | NoteColumn::Pinned, StateValue::Bool(b)) => Ok(StateValue::Bool(b)),
            (NoteColumn::Favorite | NoteColumn::Pinned, StateValue::Int(i @ (0 | 1))) => {
                Ok(StateValue::Bool(i == 1))
            }
            (NoteColumn::Rating, StateValue::Int(i @ 0..=5)) => Ok(StateValue::Int(i)),
            (NoteColumn::CategoryId, StateValue::Null | StateValue::Int(-1)) => Ok(StateValue::Null),
            (NoteColumn::CategoryId, StateValue::Int(i)) if i > 0 => Ok(StateValue::Int(i)),
            (NoteColumn::Title, StateValue::Text(s)) if !s.trim().is_empty() => {
                Ok(StateValue::Text(s.trim().to_string()))
            }
            (NoteColumn::Tags, StateValue::Text(s)) => {
                Ok(StateValue::Text(super::tags::normalize_tags(&s)))
            }
            (
                NoteColumn::Content | NoteColumn::Color | NoteColumn::ItemType,
                StateValue::Text(s),
            ) => Ok(StateValue::Text(s)),
            (_, other) => Err(invalid(&other)),
        }
    }
}

impl FromStr for NoteColumn {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "favorite" | "is_favorite" => Ok(NoteColumn::Favorite),
            "pinned" | "is_pinned" => Ok(NoteColumn::Pinned),
            "rating" => Ok(NoteColumn::Rating),
            "category_id" => Ok(NoteColumn::CategoryId),
            "content" => Ok(NoteColumn::Content),
            "tags" => Ok(NoteColumn::Tags),
            "color" => Ok(NoteColumn::Color),
            "title" => Ok(NoteColumn::Title),
            "item_type" => Ok(NoteColumn::ItemType),
            other => Err(AppError::InvalidColumn(other.to_string())),
        }
    }
}

/// Dynamically typed value for the state-patch API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
}

impl From<bool> for StateValue {
    fn from(value: bool) -> Self {
        StateValue::Bool(value)
    }
}

impl From<i64> for StateValue {
    fn from(value: i64) -> Self {
        StateValue::Int(value)
    }
}

impl From<&str> for StateValue {
    fn from(value: &str) -> Self {
        StateValue::Text(value.to_string())
    }
}

impl From<Option<i64>> for StateValue {
    fn from(value: Option<i64>) -> Self {
        value.map_or(StateValue::Null, StateValue::Int)
    }
}

/// System bucket or category the note list is scoped to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum FilterType {
    #[default]
    All,
    Today,
    Yesterday,
    RecentlyVisited,
    Uncategorized,
    Untagged,
    Bookmark,
    Trash,
    /// Category and all of its descendants
    Category(i64),
}

impl FilterType {
    /// Parse the UI's `(filterType, filterValue)` pair
    pub fn parse(name: &str, value: Option<i64>) -> Result<Self> {
        match name {
            "" | "all" => Ok(FilterType::All),
            "today" => Ok(FilterType::Today),
            "yesterday" => Ok(FilterType::Yesterday),
            "recently_visited" => Ok(FilterType::RecentlyVisited),
            "uncategorized" => Ok(FilterType::Uncategorized),
            "untagged" => Ok(FilterType::Untagged),
            "bookmark" => Ok(FilterType::Bookmark),
            "trash" => Ok(FilterType::Trash),
            "category" => match value {
                Some(-1) => Ok(FilterType::Uncategorized),
                Some(id) if id > 0 => Ok(FilterType::Category(id)),
                _ => Err(AppError::Validation(
                    "Category filter requires a category id".to_string(),
                )),
            },
            other => Err(AppError::Validation(format!("Unknown filter type: {}", other))),
        }
    }
}

/// Facet selections. Values are ORed within a facet and facets are ANDed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Criteria {
    pub stars: Vec<i64>,
    pub colors: Vec<String>,
    pub types: Vec<String>,
    pub tags: Vec<String>,
    pub date_create: Vec<NaiveDate>,
    pub date_update: Vec<NaiveDate>,
}

impl Criteria {
    pub fn is_empty(&self) -> bool {
        self.stars.is_empty()
            && self.colors.is_empty()
            && self.types.is_empty()
            && self.tags.is_empty()
            && self.date_create.is_empty()
            && self.date_update.is_empty()
    }
}

/// Keyword, scope and facets shared by listing, counting and stats
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchQuery {
    pub keyword: String,
    pub filter: FilterType,
    pub criteria: Criteria,
}

impl SearchQuery {
    pub fn keyword(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            ..Default::default()
        }
    }

    pub fn filter(filter: FilterType) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }
}

/// 1-based page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub page: u32,
    pub size: u32,
}

/// Sidebar counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub all: i64,
    pub today: i64,
    pub yesterday: i64,
    pub recently_visited: i64,
    pub uncategorized: i64,
    pub untagged: i64,
    pub bookmark: i64,
    pub trash: i64,
    /// Direct (non-recursive) live note count per category id
    pub categories: BTreeMap<i64, i64>,
}

/// Per-facet counts for the current keyword and filter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterStats {
    pub stars: BTreeMap<i64, i64>,
    pub colors: BTreeMap<String, i64>,
    pub types: BTreeMap<String, i64>,
    pub tags: BTreeMap<String, i64>,
    pub date_create: BTreeMap<String, i64>,
    pub date_update: BTreeMap<String, i64>,
}

/// Change notifications for the UI layer
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StoreEvent {
    NoteAdded { id: i64 },
    NoteAddFailed { reason: String },
    NotesChanged,
    CategoriesChanged,
    TodosChanged,
    TodoReminder { todo: Todo },
}
