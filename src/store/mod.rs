//! Document store abstraction for todo collections.
//!
//! The persistence layers in this crate never talk to a concrete
//! backend directly. They are written against three capability traits:
//!
//! - [`TodoCollection`]: typed CRUD, filtered scans, counts, bulk
//!   writes, and grouped counts over one todo collection.
//! - [`DocumentStore`]: a collection handle that can also open
//!   sessions.
//! - [`StoreSession`]: a session handle carrying transaction control.
//!   Operations issued through a session with an open transaction see
//!   (and mutate) that transaction's view of the data.
//!
//! Filters, sort specifications, and group keys are plain data defined
//! here so every backend interprets them identically. The bundled
//! in-memory backend lives in [`memory`].
//!
//! Identifiers crossing this boundary are already typed ([`TodoId`]),
//! so a backend never sees a malformed id; syntactic rejection happens
//! in the repository layer above.

use std::cmp::Ordering;
use std::future::Future;

use chrono::{DateTime, Days, Duration, Local, LocalResult, NaiveDate, NaiveTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::model::{Priority, Todo, TodoId, TodoPatch};

mod memory;

pub use memory::{MemorySession, MemoryStore};

/// Half-open time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Creates a range from two instants.
    #[must_use]
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The current calendar day in the local timezone, from local
    /// midnight up to (but excluding) the next midnight.
    #[must_use]
    pub fn today() -> Self {
        let today = Local::now().date_naive();
        Self {
            start: local_day_start(today),
            end: local_day_start(today + Days::new(1)),
        }
    }

    /// The trailing window of `days` days ending now. A window longer
    /// than the representable time span saturates at the earliest
    /// instant.
    #[must_use]
    pub fn trailing_days(days: u32) -> Self {
        let end = Utc::now();
        let start = end
            .checked_sub_signed(Duration::days(i64::from(days)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self { start, end }
    }

    /// True when `instant` falls inside the range. The start bound is
    /// inclusive, the end bound exclusive.
    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

/// First instant of `date` on the local clock, as a UTC instant.
fn local_day_start(date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    match midnight.and_local_timezone(Local) {
        LocalResult::Single(instant) => instant.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        // Midnight can fall into a DST gap; take the first half-hour
        // boundary of the day that exists on the local clock.
        LocalResult::None => (1..=48)
            .filter_map(|half_hours| {
                (midnight + Duration::minutes(30 * half_hours))
                    .and_local_timezone(Local)
                    .earliest()
            })
            .next()
            .map(|instant| instant.with_timezone(&Utc))
            .unwrap_or_else(|| DateTime::from_naive_utc_and_offset(midnight, Utc)),
    }
}

/// Calendar-day bucket key (`YYYY-MM-DD`) of an instant, evaluated on
/// the local clock. Keys are zero-padded, so lexicographic order is
/// chronological order.
#[must_use]
pub fn local_day_key(instant: DateTime<Utc>) -> String {
    instant.with_timezone(&Local).format("%Y-%m-%d").to_string()
}

/// Conjunctive filter over a todo collection.
///
/// Every present field must match for a document to pass; an empty
/// filter matches everything. The `search` term is a case-insensitive
/// literal substring matched against title or description, with regex
/// metacharacters escaped. An empty search term matches every
/// document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoFilter {
    pub priority: Option<Priority>,
    pub completed: Option<bool>,
    pub search: Option<String>,
    pub created: Option<TimeRange>,
    pub updated: Option<TimeRange>,
}

impl TodoFilter {
    /// Filter that matches every document.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Filter on the completion flag.
    #[must_use]
    pub fn completed(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Self::default()
        }
    }

    /// Filter on priority.
    #[must_use]
    pub fn priority(priority: Priority) -> Self {
        Self {
            priority: Some(priority),
            ..Self::default()
        }
    }

    /// Adds a priority condition.
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Adds a completion condition.
    #[must_use]
    pub fn with_completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    /// Adds a text-search condition.
    #[must_use]
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Adds a creation-time window.
    #[must_use]
    pub fn with_created(mut self, range: TimeRange) -> Self {
        self.created = Some(range);
        self
    }

    /// Adds an update-time window.
    #[must_use]
    pub fn with_updated(mut self, range: TimeRange) -> Self {
        self.updated = Some(range);
        self
    }

    /// Compiles the filter into a reusable matcher. The search term is
    /// compiled once here rather than per document.
    pub fn matcher(&self) -> StoreResult<FilterMatcher> {
        let search = self
            .search
            .as_deref()
            .map(|term| {
                Regex::new(&format!("(?i){}", regex::escape(term))).map_err(|err| {
                    StoreError::store(format!("search term failed to compile: {err}"))
                })
            })
            .transpose()?;
        Ok(FilterMatcher {
            priority: self.priority,
            completed: self.completed,
            created: self.created,
            updated: self.updated,
            search,
        })
    }
}

/// Compiled form of a [`TodoFilter`], ready to test documents.
#[derive(Debug)]
pub struct FilterMatcher {
    priority: Option<Priority>,
    completed: Option<bool>,
    created: Option<TimeRange>,
    updated: Option<TimeRange>,
    search: Option<Regex>,
}

impl FilterMatcher {
    /// Tests a document against the filter.
    #[must_use]
    pub fn matches(&self, todo: &Todo) -> bool {
        if let Some(priority) = self.priority {
            if todo.priority != priority {
                return false;
            }
        }
        if let Some(completed) = self.completed {
            if todo.completed != completed {
                return false;
            }
        }
        if let Some(range) = self.created {
            if !range.contains(todo.created_at) {
                return false;
            }
        }
        if let Some(range) = self.updated {
            if !range.contains(todo.updated_at) {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let hit = search.is_match(&todo.title)
                || todo
                    .description
                    .as_deref()
                    .is_some_and(|description| search.is_match(description));
            if !hit {
                return false;
            }
        }
        true
    }
}

/// Direction of a sort key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderDirection {
    #[default]
    #[serde(rename = "asc")]
    Ascending,
    #[serde(rename = "desc")]
    Descending,
}

impl std::fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderDirection::Ascending => write!(f, "asc"),
            OrderDirection::Descending => write!(f, "desc"),
        }
    }
}

/// Sortable document fields.
///
/// Priority sorts by urgency rank, so ascending order lists high
/// priority before medium before low.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    UpdatedAt,
    Title,
    Priority,
    Completed,
}

impl SortField {
    /// Parses a wire field name. Unknown names yield `None`; callers
    /// decide whether that means natural order or an error.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "createdAt" => Some(Self::CreatedAt),
            "updatedAt" => Some(Self::UpdatedAt),
            "title" => Some(Self::Title),
            "priority" => Some(Self::Priority),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// One field/direction pair of a sort specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: SortField,
    pub direction: OrderDirection,
}

/// Ordered list of sort keys. An empty specification means natural
/// (insertion) order; backends must sort stably so equal keys preserve
/// it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortSpec {
    keys: Vec<SortKey>,
}

impl SortSpec {
    /// Natural order: no sorting at all.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Single-key specification.
    #[must_use]
    pub fn by(field: SortField, direction: OrderDirection) -> Self {
        Self {
            keys: vec![SortKey { field, direction }],
        }
    }

    /// Appends a tie-breaking key.
    #[must_use]
    pub fn then(mut self, field: SortField, direction: OrderDirection) -> Self {
        self.keys.push(SortKey { field, direction });
        self
    }

    /// True when no keys are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// The keys, outermost first.
    #[must_use]
    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    /// Compares two documents under this specification. Equal under an
    /// empty specification.
    #[must_use]
    pub fn compare(&self, a: &Todo, b: &Todo) -> Ordering {
        for key in &self.keys {
            let ordering = match key.field {
                SortField::CreatedAt => a.created_at.cmp(&b.created_at),
                SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
                SortField::Title => a.title.cmp(&b.title),
                SortField::Priority => a.priority.rank().cmp(&b.priority.rank()),
                SortField::Completed => a.completed.cmp(&b.completed),
            };
            let ordering = match key.direction {
                OrderDirection::Ascending => ordering,
                OrderDirection::Descending => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

/// Grouping key for [`TodoCollection::group_count`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    /// Group by priority; keys are the wire names.
    Priority,
    /// Group by local calendar day of `created_at`; keys are
    /// `YYYY-MM-DD`.
    CreatedDay,
    /// Group by local calendar day of `updated_at`; keys are
    /// `YYYY-MM-DD`.
    UpdatedDay,
}

/// One bucket of a grouped count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupCount {
    pub key: String,
    pub count: u64,
}

/// Outcome of a bulk update: how many documents the id-set matched and
/// how many were actually modified. A match without a field change
/// counts as matched but not modified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BulkWriteSummary {
    #[serde(rename = "matchedCount")]
    pub matched: u64,
    #[serde(rename = "modifiedCount")]
    pub modified: u64,
}

/// Typed operations over one todo collection.
///
/// Implementations must sort stably, treat an empty filter as
/// match-all, and bump `updated_at` on a mutation only when a field
/// actually changed.
pub trait TodoCollection: Send + Sync {
    /// Inserts a document, returning the stored form.
    fn insert(&self, todo: Todo) -> impl Future<Output = StoreResult<Todo>> + Send;

    /// Looks up one document by id.
    fn find_one(&self, id: &TodoId) -> impl Future<Output = StoreResult<Option<Todo>>> + Send;

    /// Scans the collection: filter, sort, then apply skip/limit.
    fn find_many(
        &self,
        filter: &TodoFilter,
        sort: &SortSpec,
        skip: u64,
        limit: Option<u64>,
    ) -> impl Future<Output = StoreResult<Vec<Todo>>> + Send;

    /// Counts documents matching a filter.
    fn count(&self, filter: &TodoFilter) -> impl Future<Output = StoreResult<u64>> + Send;

    /// Applies a patch to one document, returning the updated form, or
    /// `None` when no document has that id.
    fn update_one(
        &self,
        id: &TodoId,
        patch: &TodoPatch,
    ) -> impl Future<Output = StoreResult<Option<Todo>>> + Send;

    /// Removes one document, returning it, or `None` when absent.
    fn delete_one(&self, id: &TodoId) -> impl Future<Output = StoreResult<Option<Todo>>> + Send;

    /// Applies one patch to every document in the id-set.
    fn update_many(
        &self,
        ids: &[TodoId],
        patch: &TodoPatch,
    ) -> impl Future<Output = StoreResult<BulkWriteSummary>> + Send;

    /// Removes every document in the id-set, returning how many were
    /// removed.
    fn delete_many(&self, ids: &[TodoId]) -> impl Future<Output = StoreResult<u64>> + Send;

    /// Counts matching documents per group key. Buckets with no
    /// documents are omitted; keys come back in ascending order.
    fn group_count(
        &self,
        filter: &TodoFilter,
        group: GroupBy,
    ) -> impl Future<Output = StoreResult<Vec<GroupCount>>> + Send;
}

/// A collection handle that can open sessions.
pub trait DocumentStore: TodoCollection + Clone {
    /// Session type this store hands out.
    type Session: StoreSession;

    /// Opens a new session. The session starts outside any
    /// transaction; operations pass straight through until
    /// [`StoreSession::start_transaction`] is called.
    fn begin_session(&self) -> impl Future<Output = StoreResult<Self::Session>> + Send;
}

/// Session handle with transaction control.
///
/// Sessions are cheap to clone; clones share the same transaction
/// state. The lifecycle is strict: a transaction must be started
/// before [`commit`](Self::commit) or [`abort`](Self::abort), and
/// [`end`](Self::end) is infallible and idempotent so it can sit on
/// every exit path. Ending a session releases whatever the open
/// transaction still held.
pub trait StoreSession: TodoCollection + Clone {
    /// Begins a transaction on this session.
    fn start_transaction(&self) -> impl Future<Output = StoreResult<()>> + Send;

    /// Publishes the transaction's writes.
    fn commit(&self) -> impl Future<Output = StoreResult<()>> + Send;

    /// Discards the transaction's writes.
    fn abort(&self) -> impl Future<Output = StoreResult<()>> + Send;

    /// Ends the session, discarding any transaction still open.
    fn end(&self) -> impl Future<Output = ()> + Send;
}
