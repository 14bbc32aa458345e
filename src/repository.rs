//! Todo repository: typed CRUD and query surface over a document
//! collection.
//!
//! The repository is where untrusted identifiers are handled. Ids
//! arrive as plain strings; anything that is not syntactically valid
//! is rejected locally and treated exactly like a missing document
//! (`Ok(None)`, or silently dropped from bulk id-sets) without ever
//! reaching the store. Input DTOs are trusted here; shape-level
//! validation belongs to the boundary that produced them.
//!
//! [`TodoStore`] is the canonical implementation, generic over any
//! [`TodoCollection`] so the same code serves the base store and a
//! transaction session.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::config::StoreConfig;
use crate::error::StoreResult;
use crate::model::{CreateTodo, Priority, PriorityCounts, Todo, TodoId, TodoPatch};
use crate::store::{
    BulkWriteSummary, GroupBy, OrderDirection, SortField, SortSpec, TodoCollection, TodoFilter,
};

/// Sort field applied when the caller does not name one.
const DEFAULT_SORT_FIELD: &str = "createdAt";

/// Query options for [`TodoRepository::find_all`].
///
/// All fields are optional; defaults are page 1, the configured page
/// size, and newest-first ordering by creation time. `sort_by` is a
/// free-form wire name on purpose: unknown fields fall back to natural
/// order instead of failing the query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FindAllOptions {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<OrderDirection>,
    pub priority: Option<Priority>,
    pub completed: Option<bool>,
    pub search: Option<String>,
}

impl FindAllOptions {
    /// Sets the 1-based page number.
    #[must_use]
    pub fn with_page(mut self, page: u64) -> Self {
        self.page = Some(page);
        self
    }

    /// Sets the page size.
    #[must_use]
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the sort field by wire name.
    #[must_use]
    pub fn with_sort_by(mut self, field: impl Into<String>) -> Self {
        self.sort_by = Some(field.into());
        self
    }

    /// Sets the sort direction.
    #[must_use]
    pub fn with_sort_order(mut self, order: OrderDirection) -> Self {
        self.sort_order = Some(order);
        self
    }

    /// Filters on priority.
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Filters on the completion flag.
    #[must_use]
    pub fn with_completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    /// Filters on a case-insensitive substring of title or
    /// description.
    #[must_use]
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }
}

/// One page of query results plus pagination bookkeeping.
///
/// `total` counts every document matching the filter, not just this
/// page, and `total_pages` is the ceiling of `total / limit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoPage {
    pub data: Vec<Todo>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

/// Collection-level counters: totals plus a per-priority breakdown
/// that is zero-filled for priorities with no documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoStats {
    pub total: u64,
    pub completed: u64,
    pub pending: u64,
    pub by_priority: PriorityCounts,
}

/// Persistence operations for todos.
///
/// Lookup and mutation by id take the id as a raw string and answer
/// `Ok(None)` for both malformed and unknown ids; callers cannot
/// distinguish the two, by contract. Bulk operations drop malformed
/// ids from the set before touching the store, and an id-set that ends
/// up empty costs no store round-trip at all.
pub trait TodoRepository: Send + Sync {
    /// Materializes the input (defaults, id, timestamps) and inserts
    /// it.
    fn create(&self, input: CreateTodo) -> impl Future<Output = StoreResult<Todo>> + Send;

    /// Filtered, sorted, paginated listing. The page of data and the
    /// total count are fetched concurrently.
    fn find_all(
        &self,
        options: FindAllOptions,
    ) -> impl Future<Output = StoreResult<TodoPage>> + Send;

    /// Looks up one todo by id.
    fn find_by_id(&self, id: &str) -> impl Future<Output = StoreResult<Option<Todo>>> + Send;

    /// Applies a partial update, returning the updated todo.
    fn update(
        &self,
        id: &str,
        patch: &TodoPatch,
    ) -> impl Future<Output = StoreResult<Option<Todo>>> + Send;

    /// Removes one todo, returning it.
    fn delete(&self, id: &str) -> impl Future<Output = StoreResult<Option<Todo>>> + Send;

    /// Applies one patch to every valid id in the set. `matched`
    /// counts documents found; `modified` counts documents where a
    /// field actually changed.
    fn bulk_update(
        &self,
        ids: &[String],
        patch: &TodoPatch,
    ) -> impl Future<Output = StoreResult<BulkWriteSummary>> + Send;

    /// Deletes every valid id in the set, returning how many documents
    /// were removed.
    fn bulk_delete(&self, ids: &[String]) -> impl Future<Output = StoreResult<u64>> + Send;

    /// Collection counters, fetched concurrently.
    fn stats(&self) -> impl Future<Output = StoreResult<TodoStats>> + Send;

    /// All todos with the given priority, in natural order.
    fn find_by_priority(
        &self,
        priority: Priority,
    ) -> impl Future<Output = StoreResult<Vec<Todo>>> + Send;

    /// All completed todos, in natural order.
    fn find_completed(&self) -> impl Future<Output = StoreResult<Vec<Todo>>> + Send;

    /// All pending todos, in natural order.
    fn find_pending(&self) -> impl Future<Output = StoreResult<Vec<Todo>>> + Send;

    /// Case-insensitive substring search over title and description.
    /// An empty query matches everything.
    fn search(&self, query: &str) -> impl Future<Output = StoreResult<Vec<Todo>>> + Send;

    /// Counts documents matching a filter.
    fn count(&self, filter: &TodoFilter) -> impl Future<Output = StoreResult<u64>> + Send;
}

/// Repository over a [`TodoCollection`].
///
/// # Example
///
/// ```rust,no_run
/// use todo_store::repository::{FindAllOptions, TodoRepository, TodoStore};
/// use todo_store::model::CreateTodo;
/// use todo_store::store::MemoryStore;
///
/// # async fn demo() -> todo_store::error::StoreResult<()> {
/// let repository = TodoStore::new(MemoryStore::new());
/// repository.create(CreateTodo::new("water the plants")).await?;
///
/// let page = repository
///     .find_all(FindAllOptions::default().with_search("plants"))
///     .await?;
/// assert_eq!(page.total, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TodoStore<C> {
    collection: C,
    config: StoreConfig,
}

impl<C> TodoStore<C> {
    /// Creates a repository with default paging configuration.
    pub fn new(collection: C) -> Self {
        Self {
            collection,
            config: StoreConfig::default(),
        }
    }

    /// Creates a repository with explicit paging configuration.
    pub fn with_config(collection: C, config: StoreConfig) -> Self {
        Self { collection, config }
    }
}

impl<C: TodoCollection> TodoRepository for TodoStore<C> {
    async fn create(&self, input: CreateTodo) -> StoreResult<Todo> {
        let todo = self.collection.insert(input.into_todo()).await?;
        tracing::debug!(id = %todo.id, priority = %todo.priority, "created todo");
        Ok(todo)
    }

    async fn find_all(&self, options: FindAllOptions) -> StoreResult<TodoPage> {
        let FindAllOptions {
            page,
            limit,
            sort_by,
            sort_order,
            priority,
            completed,
            search,
        } = options;

        let page = page.unwrap_or(1).max(1);
        let limit = limit
            .unwrap_or(self.config.default_page_size)
            .max(1)
            .min(self.config.max_page_size.max(1));
        let skip = page.saturating_sub(1).saturating_mul(limit);

        let filter = TodoFilter {
            priority,
            completed,
            search,
            ..TodoFilter::default()
        };
        let direction = sort_order.unwrap_or(OrderDirection::Descending);
        let sort = match SortField::parse(sort_by.as_deref().unwrap_or(DEFAULT_SORT_FIELD)) {
            Some(field) => SortSpec::by(field, direction),
            // Unknown sort fields fall back to natural order.
            None => SortSpec::none(),
        };

        let (data, total) = futures::try_join!(
            self.collection.find_many(&filter, &sort, skip, Some(limit)),
            self.collection.count(&filter),
        )?;

        Ok(TodoPage {
            data,
            total,
            page,
            limit,
            total_pages: total.div_ceil(limit),
        })
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Todo>> {
        let Ok(id) = id.parse::<TodoId>() else {
            tracing::debug!(id, "rejected malformed todo id");
            return Ok(None);
        };
        self.collection.find_one(&id).await
    }

    async fn update(&self, id: &str, patch: &TodoPatch) -> StoreResult<Option<Todo>> {
        let Ok(id) = id.parse::<TodoId>() else {
            tracing::debug!(id, "rejected malformed todo id");
            return Ok(None);
        };
        self.collection.update_one(&id, patch).await
    }

    async fn delete(&self, id: &str) -> StoreResult<Option<Todo>> {
        let Ok(id) = id.parse::<TodoId>() else {
            tracing::debug!(id, "rejected malformed todo id");
            return Ok(None);
        };
        self.collection.delete_one(&id).await
    }

    async fn bulk_update(&self, ids: &[String], patch: &TodoPatch) -> StoreResult<BulkWriteSummary> {
        let valid: Vec<TodoId> = ids.iter().filter_map(|raw| raw.parse().ok()).collect();
        let skipped = ids.len() - valid.len();
        if skipped > 0 {
            tracing::debug!(skipped, "dropped malformed ids from bulk update");
        }
        if valid.is_empty() {
            return Ok(BulkWriteSummary::default());
        }
        let summary = self.collection.update_many(&valid, patch).await?;
        tracing::debug!(
            matched = summary.matched,
            modified = summary.modified,
            "bulk update applied"
        );
        Ok(summary)
    }

    async fn bulk_delete(&self, ids: &[String]) -> StoreResult<u64> {
        let valid: Vec<TodoId> = ids.iter().filter_map(|raw| raw.parse().ok()).collect();
        let skipped = ids.len() - valid.len();
        if skipped > 0 {
            tracing::debug!(skipped, "dropped malformed ids from bulk delete");
        }
        if valid.is_empty() {
            return Ok(0);
        }
        let deleted = self.collection.delete_many(&valid).await?;
        tracing::debug!(deleted, "bulk delete applied");
        Ok(deleted)
    }

    async fn stats(&self) -> StoreResult<TodoStats> {
        // Filters outlive the try_join! expansion below.
        let everything = TodoFilter::all();
        let done = TodoFilter::completed(true);

        let (total, completed, groups) = futures::try_join!(
            self.collection.count(&everything),
            self.collection.count(&done),
            self.collection.group_count(&everything, GroupBy::Priority),
        )?;

        let mut by_priority = PriorityCounts::default();
        for bucket in groups {
            if let Some(priority) = Priority::parse(&bucket.key) {
                by_priority.set(priority, bucket.count);
            }
        }

        Ok(TodoStats {
            total,
            completed,
            pending: total.saturating_sub(completed),
            by_priority,
        })
    }

    async fn find_by_priority(&self, priority: Priority) -> StoreResult<Vec<Todo>> {
        self.collection
            .find_many(&TodoFilter::priority(priority), &SortSpec::none(), 0, None)
            .await
    }

    async fn find_completed(&self) -> StoreResult<Vec<Todo>> {
        self.collection
            .find_many(&TodoFilter::completed(true), &SortSpec::none(), 0, None)
            .await
    }

    async fn find_pending(&self) -> StoreResult<Vec<Todo>> {
        self.collection
            .find_many(&TodoFilter::completed(false), &SortSpec::none(), 0, None)
            .await
    }

    async fn search(&self, query: &str) -> StoreResult<Vec<Todo>> {
        self.collection
            .find_many(
                &TodoFilter::all().with_search(query),
                &SortSpec::none(),
                0,
                None,
            )
            .await
    }

    async fn count(&self, filter: &TodoFilter) -> StoreResult<u64> {
        self.collection.count(filter).await
    }
}
