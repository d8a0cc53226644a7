/// Task query construction
///
/// Turns untrusted listing parameters into a [`TaskQuery`] descriptor. The
/// builder is total: malformed values are dropped rather than rejected, so a
/// listing request never fails because of its query string.
///
/// The descriptor is consumed two ways. The Postgres store renders it into a
/// parameterized `WHERE`/`ORDER BY` (see `models::task`), and the in-memory
/// store evaluates it directly through [`TaskFilter::matches`] and
/// [`TaskSort::compare`].
///
/// # Example
///
/// ```
/// use taskboard_shared::engine::query::{RawTaskFilters, TaskQueryBuilder, SortField};
///
/// let raw = RawTaskFilters {
///     status: Some("pending".to_string()),
///     sort_by: Some("priority".to_string()),
///     sort_dir: Some("desc".to_string()),
///     ..Default::default()
/// };
///
/// let query = TaskQueryBuilder::build(&raw);
/// assert_eq!(query.sort.field, SortField::Priority);
/// assert_eq!(query.page.skip(), 0);
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

use crate::models::task::{Task, TaskPriority, TaskStatus};

/// Default page size
pub const DEFAULT_LIMIT: i64 = 10;

/// Largest page size a client may request
pub const MAX_LIMIT: i64 = 100;

/// Listing parameters exactly as they arrive on the query string
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTaskFilters {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assigned_to: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_dir: Option<String>,
}

/// Validated task filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assigned_to: Option<Uuid>,

    /// Inclusive lower bound on `due_date`
    pub due_from: Option<DateTime<Utc>>,

    /// Inclusive upper bound on `due_date`
    pub due_to: Option<DateTime<Utc>>,

    /// Literal, case-insensitive substring over title or description
    pub search: Option<String>,
}

impl TaskFilter {
    /// Evaluates the filter against a task held in memory
    pub fn matches(&self, task: &Task) -> bool {
        if self.status.is_some_and(|status| task.status != status) {
            return false;
        }
        if self.priority.is_some_and(|priority| task.priority != priority) {
            return false;
        }
        if self.assigned_to.is_some_and(|id| task.assigned_to != id) {
            return false;
        }
        if self.due_from.is_some_and(|from| task.due_date < from) {
            return false;
        }
        if self.due_to.is_some_and(|to| task.due_date > to) {
            return false;
        }

        match &self.search {
            Some(term) => {
                let term = term.to_lowercase();
                task.title.to_lowercase().contains(&term)
                    || task.description.to_lowercase().contains(&term)
            }
            None => true,
        }
    }
}

/// Fields a listing may be sorted by
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortField {
    Title,
    Status,
    Priority,
    #[default]
    DueDate,
    CreatedAt,
    UpdatedAt,
}

impl SortField {
    /// Parses the public (camelCase) field name
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "title" => Some(SortField::Title),
            "status" => Some(SortField::Status),
            "priority" => Some(SortField::Priority),
            "dueDate" => Some(SortField::DueDate),
            "createdAt" => Some(SortField::CreatedAt),
            "updatedAt" => Some(SortField::UpdatedAt),
            _ => None,
        }
    }

    /// Column name; only ever one of these constants reaches SQL
    pub fn column(&self) -> &'static str {
        match self {
            SortField::Title => "title",
            SortField::Status => "status",
            SortField::Priority => "priority",
            SortField::DueDate => "due_date",
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn keyword(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

/// Single-key sort order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskSort {
    pub field: SortField,
    pub direction: SortDirection,
}

impl TaskSort {
    /// Orders two tasks the way the SQL rendering does, ID breaking ties
    pub fn compare(&self, a: &Task, b: &Task) -> Ordering {
        let primary = match self.field {
            SortField::Title => a.title.cmp(&b.title),
            SortField::Status => a.status.cmp(&b.status),
            SortField::Priority => a.priority.cmp(&b.priority),
            SortField::DueDate => a.due_date.cmp(&b.due_date),
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        };

        let primary = match self.direction {
            SortDirection::Ascending => primary,
            SortDirection::Descending => primary.reverse(),
        };

        primary.then_with(|| a.id.cmp(&b.id))
    }
}

/// Page window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number
    pub page: i64,

    /// Page size, 1..=MAX_LIMIT
    pub limit: i64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageRequest {
    /// Builds a page window from raw strings, falling back to defaults
    pub fn from_raw(page: Option<&str>, limit: Option<&str>) -> Self {
        let page = page
            .and_then(|p| p.trim().parse::<i64>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1);

        let limit = limit
            .and_then(|l| l.trim().parse::<i64>().ok())
            .filter(|l| *l >= 1)
            .map(|l| l.min(MAX_LIMIT))
            .unwrap_or(DEFAULT_LIMIT);

        Self { page, limit }
    }

    /// Number of records to skip
    pub fn skip(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Pagination block for a result of `total` records
    pub fn pagination(&self, total: i64) -> Pagination {
        let pages = if total <= 0 {
            0
        } else {
            (total + self.limit - 1) / self.limit
        };

        Pagination {
            page: self.page,
            limit: self.limit,
            pages,
        }
    }
}

/// Pagination block returned with every listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub pages: i64,
}

/// Validated query descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskQuery {
    pub filter: TaskFilter,
    pub sort: TaskSort,
    pub page: PageRequest,
}

/// Builds [`TaskQuery`] descriptors from raw listing parameters
pub struct TaskQueryBuilder;

impl TaskQueryBuilder {
    /// Validates raw parameters into a query descriptor
    ///
    /// Never fails; each unusable value is simply left out.
    pub fn build(raw: &RawTaskFilters) -> TaskQuery {
        let filter = TaskFilter {
            status: non_blank(&raw.status).and_then(|s| s.parse().ok()),
            priority: non_blank(&raw.priority).and_then(|p| p.parse().ok()),
            assigned_to: non_blank(&raw.assigned_to).and_then(|id| Uuid::parse_str(id).ok()),
            due_from: non_blank(&raw.start_date).and_then(parse_timestamp),
            due_to: non_blank(&raw.end_date).and_then(parse_timestamp),
            search: non_blank(&raw.search).map(str::to_string),
        };

        let sort = TaskSort {
            field: non_blank(&raw.sort_by)
                .and_then(SortField::parse)
                .unwrap_or_default(),
            direction: match non_blank(&raw.sort_dir) {
                Some("desc") => SortDirection::Descending,
                _ => SortDirection::Ascending,
            },
        };

        TaskQuery {
            filter,
            sort,
            page: PageRequest::from_raw(raw.page.as_deref(), raw.limit.as_deref()),
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Parses an RFC 3339 timestamp or a bare `YYYY-MM-DD` date (midnight UTC)
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Builds an unanchored `ILIKE` pattern that matches `term` literally
///
/// Must be paired with `ESCAPE '\'` in the SQL.
pub fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}
