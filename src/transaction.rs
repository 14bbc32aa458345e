//! Transactional orchestration of composite todo operations.
//!
//! [`TransactionOrchestrator::execute`] runs a unit of work inside a
//! session-scoped transaction with a fixed lifecycle: open a session,
//! start a transaction, run the unit against a repository bound to
//! that session, then commit on success or abort on failure. The
//! session is ended on every path, including panic-free failure paths
//! like a failed commit (which is answered with a best-effort abort).
//!
//! Nothing here re-raises: callers always get a
//! [`TransactionOutcome`] value describing success or failure, never
//! an `Err`. Composite operations built on `execute` therefore
//! compose into services without any transaction-aware error
//! handling at the call site.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::model::{CreateTodo, Priority, Todo, TodoId, TodoPatch};
use crate::repository::{TodoRepository, TodoStore};
use crate::store::{BulkWriteSummary, DocumentStore, StoreSession};

/// Value-level result of a transactional unit of work.
///
/// Exactly one of `data` and `error` is present: `data` carries the
/// unit's output after a successful commit, `error` the rendered
/// failure otherwise. Absent fields are omitted from the wire form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionOutcome<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> TransactionOutcome<T> {
    /// Committed outcome carrying the unit's output.
    #[must_use]
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Failed outcome carrying a rendered error.
    #[must_use]
    pub fn failure(error: impl std::fmt::Display) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
        }
    }
}

/// One entry of a transactional bulk update: which document, and what
/// to change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoUpdate {
    pub id: String,
    pub data: TodoPatch,
}

/// Mixed work for [`TransactionOrchestrator::perform_bulk_operations`]:
/// documents to create, per-document updates, and ids to delete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BulkOperationPlan {
    pub create_todos: Vec<CreateTodo>,
    pub update_todos: Vec<TodoUpdate>,
    pub delete_todo_ids: Vec<String>,
}

impl BulkOperationPlan {
    /// Empty plan.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a document to create.
    #[must_use]
    pub fn with_create(mut self, input: CreateTodo) -> Self {
        self.create_todos.push(input);
        self
    }

    /// Appends a per-document update.
    #[must_use]
    pub fn with_update(mut self, id: impl Into<String>, data: TodoPatch) -> Self {
        self.update_todos.push(TodoUpdate {
            id: id.into(),
            data,
        });
        self
    }

    /// Appends an id to delete.
    #[must_use]
    pub fn with_delete(mut self, id: impl Into<String>) -> Self {
        self.delete_todo_ids.push(id.into());
        self
    }
}

/// What a bulk plan actually did. `errors` holds one rendered message
/// per failed phase; everything the other phases achieved still
/// commits.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BulkOperationReport {
    pub created: Vec<Todo>,
    pub updated: Vec<Todo>,
    pub deleted: u64,
    pub errors: Vec<String>,
}

/// Runs units of work inside store transactions.
#[derive(Debug, Clone)]
pub struct TransactionOrchestrator<S> {
    store: S,
}

impl<S> TransactionOrchestrator<S> {
    /// Creates an orchestrator over a store handle.
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: DocumentStore> TransactionOrchestrator<S> {
    /// Runs `unit` inside a transaction.
    ///
    /// The unit receives a repository bound to the transaction's
    /// session, so everything it does through that repository is
    /// staged until commit. An `Err` from the unit aborts; a failed
    /// commit is answered with a best-effort abort; the session ends
    /// on every path.
    pub async fn execute<T, F, Fut>(&self, unit: F) -> TransactionOutcome<T>
    where
        F: FnOnce(TodoStore<S::Session>) -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let session = match self.store.begin_session().await {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(error = %err, "failed to open store session");
                return TransactionOutcome::failure(err);
            }
        };

        let outcome = Self::run_in_transaction(&session, unit).await;
        // The session ends no matter how the unit fared.
        session.end().await;
        outcome
    }

    async fn run_in_transaction<T, F, Fut>(session: &S::Session, unit: F) -> TransactionOutcome<T>
    where
        F: FnOnce(TodoStore<S::Session>) -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        if let Err(err) = session.start_transaction().await {
            tracing::warn!(error = %err, "failed to start transaction");
            return TransactionOutcome::failure(err);
        }

        match unit(TodoStore::new(session.clone())).await {
            Ok(data) => match session.commit().await {
                Ok(()) => {
                    tracing::debug!("transaction committed");
                    TransactionOutcome::success(data)
                }
                Err(err) => {
                    tracing::warn!(error = %err, "commit failed, aborting transaction");
                    if let Err(abort_err) = session.abort().await {
                        tracing::warn!(error = %abort_err, "abort after failed commit also failed");
                    }
                    TransactionOutcome::failure(err)
                }
            },
            Err(err) => {
                tracing::debug!(error = %err, "unit of work failed, aborting transaction");
                if let Err(abort_err) = session.abort().await {
                    tracing::warn!(error = %abort_err, "failed to abort transaction");
                }
                TransactionOutcome::failure(err)
            }
        }
    }

    /// Creates several todos atomically: either every input is
    /// persisted or none is.
    pub async fn create_multiple(&self, inputs: Vec<CreateTodo>) -> TransactionOutcome<Vec<Todo>> {
        self.execute(move |repository| async move {
            let mut created = Vec::with_capacity(inputs.len());
            for input in inputs {
                created.push(repository.create(input).await?);
            }
            Ok(created)
        })
        .await
    }

    /// Applies per-document updates in one transaction, returning the
    /// updated todos. Entries whose id is malformed or matches no
    /// document are skipped silently.
    pub async fn bulk_update(&self, updates: Vec<TodoUpdate>) -> TransactionOutcome<Vec<Todo>> {
        self.execute(move |repository| async move {
            let mut updated = Vec::new();
            for TodoUpdate { id, data } in updates {
                if let Some(todo) = repository.update(&id, &data).await? {
                    updated.push(todo);
                }
            }
            Ok(updated)
        })
        .await
    }

    /// Deletes an id-set in one transaction, returning how many
    /// documents were removed.
    pub async fn bulk_delete(&self, ids: Vec<String>) -> TransactionOutcome<u64> {
        self.execute(move |repository| async move { repository.bulk_delete(&ids).await })
            .await
    }

    /// Runs a mixed plan in one transaction: creates, then updates,
    /// then deletes.
    ///
    /// Each phase has its own failure boundary. A failing phase stops
    /// where it failed and records one message in
    /// [`BulkOperationReport::errors`], but the transaction still
    /// commits whatever every phase managed to do. In the update
    /// phase a malformed id fails the phase, while a well-formed id
    /// with no document behind it is skipped.
    pub async fn perform_bulk_operations(
        &self,
        plan: BulkOperationPlan,
    ) -> TransactionOutcome<BulkOperationReport> {
        self.execute(move |repository| async move {
            let mut report = BulkOperationReport::default();

            if !plan.create_todos.is_empty() {
                let mut failure = None;
                for input in plan.create_todos {
                    match repository.create(input).await {
                        Ok(todo) => report.created.push(todo),
                        Err(err) => {
                            failure = Some(err);
                            break;
                        }
                    }
                }
                if let Some(err) = failure {
                    report.errors.push(format!("Create operation failed: {err}"));
                }
            }

            if !plan.update_todos.is_empty() {
                let mut failure = None;
                for TodoUpdate { id, data } in plan.update_todos {
                    if let Err(err) = id.parse::<TodoId>() {
                        failure = Some(StoreError::from(err));
                        break;
                    }
                    match repository.update(&id, &data).await {
                        Ok(Some(todo)) => report.updated.push(todo),
                        Ok(None) => {}
                        Err(err) => {
                            failure = Some(err);
                            break;
                        }
                    }
                }
                if let Some(err) = failure {
                    report.errors.push(format!("Update operation failed: {err}"));
                }
            }

            if !plan.delete_todo_ids.is_empty() {
                match repository.bulk_delete(&plan.delete_todo_ids).await {
                    Ok(deleted) => report.deleted = deleted,
                    Err(err) => report.errors.push(format!("Delete operation failed: {err}")),
                }
            }

            Ok(report)
        })
        .await
    }

    /// Moves up to `limit` todos (all of them when `None`) from one
    /// priority to another in one transaction.
    pub async fn transfer_between_priorities(
        &self,
        from: Priority,
        to: Priority,
        limit: Option<usize>,
    ) -> TransactionOutcome<BulkWriteSummary> {
        self.execute(move |repository| async move {
            let todos = repository.find_by_priority(from).await?;
            let selected = match limit {
                Some(limit) => todos.into_iter().take(limit).collect::<Vec<_>>(),
                None => todos,
            };
            let ids: Vec<String> = selected.iter().map(|todo| todo.id.to_string()).collect();
            repository.bulk_update(&ids, &TodoPatch::priority(to)).await
        })
        .await
    }

    /// Completes every pending todo of one priority in one
    /// transaction.
    pub async fn complete_all_by_priority(
        &self,
        priority: Priority,
    ) -> TransactionOutcome<BulkWriteSummary> {
        self.execute(move |repository| async move {
            let todos = repository.find_by_priority(priority).await?;
            let ids: Vec<String> = todos
                .iter()
                .filter(|todo| !todo.completed)
                .map(|todo| todo.id.to_string())
                .collect();
            repository.bulk_update(&ids, &TodoPatch::completed(true)).await
        })
        .await
    }

    /// Deletes every completed todo in one transaction, returning how
    /// many were removed. Running it again once the collection holds
    /// no completed todos reports zero.
    pub async fn archive_completed(&self) -> TransactionOutcome<u64> {
        self.execute(move |repository| async move {
            let todos = repository.find_completed().await?;
            let ids: Vec<String> = todos.iter().map(|todo| todo.id.to_string()).collect();
            repository.bulk_delete(&ids).await
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{
        GroupBy, GroupCount, MemorySession, MemoryStore, SortSpec, TodoCollection, TodoFilter,
    };
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Arc;

    /// Which injected failures a [`FlakyStore`] should produce.
    #[derive(Debug, Clone, Default)]
    struct FailurePlan {
        /// Fail every insert from the nth one on (1-based).
        fail_insert_at: Option<usize>,
        fail_commit: bool,
        fail_begin: bool,
    }

    /// Store double that wraps a [`MemoryStore`] and injects failures
    /// according to its [`FailurePlan`].
    #[derive(Debug, Clone)]
    struct FlakyStore {
        inner: MemoryStore,
        plan: FailurePlan,
        inserts: Arc<AtomicUsize>,
    }

    impl FlakyStore {
        fn new(inner: MemoryStore, plan: FailurePlan) -> Self {
            Self {
                inner,
                plan,
                inserts: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    fn check_insert(plan: &FailurePlan, inserts: &AtomicUsize) -> StoreResult<()> {
        let nth = inserts.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        if plan.fail_insert_at.is_some_and(|at| nth >= at) {
            return Err(StoreError::store("injected insert failure"));
        }
        Ok(())
    }

    impl TodoCollection for FlakyStore {
        async fn insert(&self, todo: Todo) -> StoreResult<Todo> {
            check_insert(&self.plan, &self.inserts)?;
            self.inner.insert(todo).await
        }

        async fn find_one(&self, id: &TodoId) -> StoreResult<Option<Todo>> {
            self.inner.find_one(id).await
        }

        async fn find_many(
            &self,
            filter: &TodoFilter,
            sort: &SortSpec,
            skip: u64,
            limit: Option<u64>,
        ) -> StoreResult<Vec<Todo>> {
            self.inner.find_many(filter, sort, skip, limit).await
        }

        async fn count(&self, filter: &TodoFilter) -> StoreResult<u64> {
            self.inner.count(filter).await
        }

        async fn update_one(&self, id: &TodoId, patch: &TodoPatch) -> StoreResult<Option<Todo>> {
            self.inner.update_one(id, patch).await
        }

        async fn delete_one(&self, id: &TodoId) -> StoreResult<Option<Todo>> {
            self.inner.delete_one(id).await
        }

        async fn update_many(
            &self,
            ids: &[TodoId],
            patch: &TodoPatch,
        ) -> StoreResult<BulkWriteSummary> {
            self.inner.update_many(ids, patch).await
        }

        async fn delete_many(&self, ids: &[TodoId]) -> StoreResult<u64> {
            self.inner.delete_many(ids).await
        }

        async fn group_count(
            &self,
            filter: &TodoFilter,
            group: GroupBy,
        ) -> StoreResult<Vec<GroupCount>> {
            self.inner.group_count(filter, group).await
        }
    }

    impl DocumentStore for FlakyStore {
        type Session = FlakySession;

        async fn begin_session(&self) -> StoreResult<FlakySession> {
            if self.plan.fail_begin {
                return Err(StoreError::store("injected session failure"));
            }
            Ok(FlakySession {
                inner: self.inner.begin_session().await?,
                plan: self.plan.clone(),
                inserts: self.inserts.clone(),
            })
        }
    }

    #[derive(Debug, Clone)]
    struct FlakySession {
        inner: MemorySession,
        plan: FailurePlan,
        inserts: Arc<AtomicUsize>,
    }

    impl TodoCollection for FlakySession {
        async fn insert(&self, todo: Todo) -> StoreResult<Todo> {
            check_insert(&self.plan, &self.inserts)?;
            self.inner.insert(todo).await
        }

        async fn find_one(&self, id: &TodoId) -> StoreResult<Option<Todo>> {
            self.inner.find_one(id).await
        }

        async fn find_many(
            &self,
            filter: &TodoFilter,
            sort: &SortSpec,
            skip: u64,
            limit: Option<u64>,
        ) -> StoreResult<Vec<Todo>> {
            self.inner.find_many(filter, sort, skip, limit).await
        }

        async fn count(&self, filter: &TodoFilter) -> StoreResult<u64> {
            self.inner.count(filter).await
        }

        async fn update_one(&self, id: &TodoId, patch: &TodoPatch) -> StoreResult<Option<Todo>> {
            self.inner.update_one(id, patch).await
        }

        async fn delete_one(&self, id: &TodoId) -> StoreResult<Option<Todo>> {
            self.inner.delete_one(id).await
        }

        async fn update_many(
            &self,
            ids: &[TodoId],
            patch: &TodoPatch,
        ) -> StoreResult<BulkWriteSummary> {
            self.inner.update_many(ids, patch).await
        }

        async fn delete_many(&self, ids: &[TodoId]) -> StoreResult<u64> {
            self.inner.delete_many(ids).await
        }

        async fn group_count(
            &self,
            filter: &TodoFilter,
            group: GroupBy,
        ) -> StoreResult<Vec<GroupCount>> {
            self.inner.group_count(filter, group).await
        }
    }

    impl StoreSession for FlakySession {
        async fn start_transaction(&self) -> StoreResult<()> {
            self.inner.start_transaction().await
        }

        async fn commit(&self) -> StoreResult<()> {
            if self.plan.fail_commit {
                return Err(StoreError::transaction("injected commit failure"));
            }
            self.inner.commit().await
        }

        async fn abort(&self) -> StoreResult<()> {
            self.inner.abort().await
        }

        async fn end(&self) {
            self.inner.end().await;
        }
    }

    #[tokio::test]
    async fn execute_commits_a_successful_unit() {
        let store = MemoryStore::new();
        let orchestrator = TransactionOrchestrator::new(store.clone());

        let outcome = orchestrator
            .execute(|repository| async move { repository.create(CreateTodo::new("kept")).await })
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.data.as_ref().map(|t| t.title.as_str()), Some("kept"));
        assert_eq!(outcome.error, None);
        assert_eq!(store.count(&TodoFilter::all()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn execute_rolls_back_a_failed_unit() {
        let store = MemoryStore::new();
        let orchestrator = TransactionOrchestrator::new(store.clone());

        let outcome = orchestrator
            .execute(|repository| async move {
                repository.create(CreateTodo::new("doomed")).await?;
                Err::<(), _>(StoreError::store("boom"))
            })
            .await;

        assert!(!outcome.success);
        assert!(outcome.error.as_deref().unwrap().contains("boom"));
        assert_eq!(store.count(&TodoFilter::all()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn execute_reports_session_open_failure() {
        let flaky = FlakyStore::new(
            MemoryStore::new(),
            FailurePlan {
                fail_begin: true,
                ..FailurePlan::default()
            },
        );
        let orchestrator = TransactionOrchestrator::new(flaky);

        let outcome = orchestrator
            .execute(|repository| async move { repository.create(CreateTodo::new("never")).await })
            .await;

        assert!(!outcome.success);
        assert!(outcome
            .error
            .as_deref()
            .unwrap()
            .contains("injected session failure"));
    }

    #[tokio::test]
    async fn commit_failure_aborts_and_reports() {
        let base = MemoryStore::new();
        let flaky = FlakyStore::new(
            base.clone(),
            FailurePlan {
                fail_commit: true,
                ..FailurePlan::default()
            },
        );
        let orchestrator = TransactionOrchestrator::new(flaky);

        let outcome = orchestrator.create_multiple(vec![CreateTodo::new("staged")]).await;

        assert!(!outcome.success);
        assert!(outcome
            .error
            .as_deref()
            .unwrap()
            .contains("injected commit failure"));
        // The abort discarded the staged insert.
        assert_eq!(base.count(&TodoFilter::all()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn create_multiple_is_all_or_nothing() {
        let base = MemoryStore::new();
        let flaky = FlakyStore::new(
            base.clone(),
            FailurePlan {
                fail_insert_at: Some(2),
                ..FailurePlan::default()
            },
        );
        let orchestrator = TransactionOrchestrator::new(flaky);

        let outcome = orchestrator
            .create_multiple(vec![
                CreateTodo::new("one"),
                CreateTodo::new("two"),
                CreateTodo::new("three"),
            ])
            .await;

        assert!(!outcome.success);
        assert!(outcome
            .error
            .as_deref()
            .unwrap()
            .contains("injected insert failure"));
        assert_eq!(base.count(&TodoFilter::all()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn create_multiple_returns_everything_created() {
        let store = MemoryStore::new();
        let orchestrator = TransactionOrchestrator::new(store.clone());

        let outcome = orchestrator
            .create_multiple(vec![CreateTodo::new("a"), CreateTodo::new("b")])
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.data.unwrap().len(), 2);
        assert_eq!(store.count(&TodoFilter::all()).await.unwrap(), 2);

        let empty = orchestrator.create_multiple(Vec::new()).await;
        assert!(empty.success);
        assert_eq!(empty.data.unwrap(), Vec::new());
    }

    #[tokio::test]
    async fn bulk_update_skips_missing_and_malformed_entries() {
        let store = MemoryStore::new();
        let existing = store
            .insert(CreateTodo::new("before").into_todo())
            .await
            .unwrap();
        let orchestrator = TransactionOrchestrator::new(store.clone());

        let outcome = orchestrator
            .bulk_update(vec![
                TodoUpdate {
                    id: existing.id.to_string(),
                    data: TodoPatch::title("after"),
                },
                TodoUpdate {
                    id: TodoId::new().to_string(),
                    data: TodoPatch::completed(true),
                },
                TodoUpdate {
                    id: "garbage".to_string(),
                    data: TodoPatch::completed(true),
                },
            ])
            .await;

        assert!(outcome.success);
        let updated = outcome.data.unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].title, "after");

        let persisted = store.find_one(&existing.id).await.unwrap().unwrap();
        assert_eq!(persisted.title, "after");
    }

    #[tokio::test]
    async fn bulk_delete_commits_the_removals() {
        let store = MemoryStore::new();
        let doomed = store
            .insert(CreateTodo::new("doomed").into_todo())
            .await
            .unwrap();
        let kept = store
            .insert(CreateTodo::new("kept").into_todo())
            .await
            .unwrap();
        let orchestrator = TransactionOrchestrator::new(store.clone());

        let outcome = orchestrator
            .bulk_delete(vec![doomed.id.to_string(), "junk".to_string()])
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.data, Some(1));
        assert!(store.find_one(&kept.id).await.unwrap().is_some());
        assert!(store.find_one(&doomed.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn perform_bulk_operations_runs_all_three_phases() {
        let store = MemoryStore::new();
        let to_update = store
            .insert(CreateTodo::new("update me").into_todo())
            .await
            .unwrap();
        let to_delete = store
            .insert(CreateTodo::new("delete me").into_todo())
            .await
            .unwrap();
        let orchestrator = TransactionOrchestrator::new(store.clone());

        let plan = BulkOperationPlan::new()
            .with_create(CreateTodo::new("fresh-a"))
            .with_create(CreateTodo::new("fresh-b"))
            .with_update(to_update.id.to_string(), TodoPatch::completed(true))
            .with_delete(to_delete.id.to_string());
        let outcome = orchestrator.perform_bulk_operations(plan).await;

        assert!(outcome.success);
        let report = outcome.data.unwrap();
        assert_eq!(report.created.len(), 2);
        assert_eq!(report.updated.len(), 1);
        assert!(report.updated[0].completed);
        assert_eq!(report.deleted, 1);
        assert!(report.errors.is_empty());
        assert_eq!(store.count(&TodoFilter::all()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn perform_bulk_operations_records_a_malformed_update_id_but_commits() {
        let store = MemoryStore::new();
        let orchestrator = TransactionOrchestrator::new(store.clone());

        let plan = BulkOperationPlan::new()
            .with_create(CreateTodo::new("still created"))
            .with_update("not-an-id", TodoPatch::completed(true));
        let outcome = orchestrator.perform_bulk_operations(plan).await;

        assert!(outcome.success);
        let report = outcome.data.unwrap();
        assert_eq!(report.created.len(), 1);
        assert!(report.updated.is_empty());
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("Update operation failed:"));
        // The create phase committed despite the update failure.
        assert_eq!(store.count(&TodoFilter::all()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn perform_bulk_operations_skips_missing_update_targets_silently() {
        let store = MemoryStore::new();
        let orchestrator = TransactionOrchestrator::new(store);

        let plan = BulkOperationPlan::new()
            .with_update(TodoId::new().to_string(), TodoPatch::completed(true));
        let outcome = orchestrator.perform_bulk_operations(plan).await;

        assert!(outcome.success);
        let report = outcome.data.unwrap();
        assert!(report.updated.is_empty());
        assert!(report.errors.is_empty());
    }

    #[tokio::test]
    async fn perform_bulk_operations_keeps_partial_phase_progress() {
        let base = MemoryStore::new();
        let victim = base
            .insert(CreateTodo::new("victim").into_todo())
            .await
            .unwrap();
        let flaky = FlakyStore::new(
            base.clone(),
            FailurePlan {
                fail_insert_at: Some(2),
                ..FailurePlan::default()
            },
        );
        let orchestrator = TransactionOrchestrator::new(flaky);

        let plan = BulkOperationPlan::new()
            .with_create(CreateTodo::new("lands"))
            .with_create(CreateTodo::new("fails"))
            .with_create(CreateTodo::new("never tried"))
            .with_delete(victim.id.to_string());
        let outcome = orchestrator.perform_bulk_operations(plan).await;

        assert!(outcome.success);
        let report = outcome.data.unwrap();
        assert_eq!(report.created.len(), 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("Create operation failed:"));
        assert_eq!(report.deleted, 1);

        // The committed state holds the first create, minus the victim.
        assert_eq!(base.count(&TodoFilter::all()).await.unwrap(), 1);
        assert!(base.find_one(&victim.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn transfer_between_priorities_honors_the_limit() {
        let store = MemoryStore::new();
        for title in ["l1", "l2", "l3"] {
            store
                .insert(
                    CreateTodo::new(title)
                        .with_priority(Priority::Low)
                        .into_todo(),
                )
                .await
                .unwrap();
        }
        let orchestrator = TransactionOrchestrator::new(store.clone());

        let outcome = orchestrator
            .transfer_between_priorities(Priority::Low, Priority::High, Some(2))
            .await;

        assert!(outcome.success);
        let summary = outcome.data.unwrap();
        assert_eq!(summary.matched, 2);
        assert_eq!(summary.modified, 2);
        assert_eq!(
            store.count(&TodoFilter::priority(Priority::High)).await.unwrap(),
            2
        );
        assert_eq!(
            store.count(&TodoFilter::priority(Priority::Low)).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn transfer_with_no_matches_reports_zero() {
        let orchestrator = TransactionOrchestrator::new(MemoryStore::new());
        let outcome = orchestrator
            .transfer_between_priorities(Priority::Low, Priority::High, None)
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.data, Some(BulkWriteSummary::default()));
    }

    #[tokio::test]
    async fn complete_all_by_priority_touches_only_pending_todos() {
        let store = MemoryStore::new();
        store
            .insert(CreateTodo::new("h-open-1").with_priority(Priority::High).into_todo())
            .await
            .unwrap();
        store
            .insert(CreateTodo::new("h-open-2").with_priority(Priority::High).into_todo())
            .await
            .unwrap();
        let already_done = store
            .insert(
                CreateTodo::new("h-done")
                    .with_priority(Priority::High)
                    .with_completed(true)
                    .into_todo(),
            )
            .await
            .unwrap();
        store
            .insert(CreateTodo::new("low-open").with_priority(Priority::Low).into_todo())
            .await
            .unwrap();
        let orchestrator = TransactionOrchestrator::new(store.clone());

        let outcome = orchestrator.complete_all_by_priority(Priority::High).await;

        assert!(outcome.success);
        let summary = outcome.data.unwrap();
        assert_eq!(summary.matched, 2);
        assert_eq!(summary.modified, 2);
        assert_eq!(store.count(&TodoFilter::completed(true)).await.unwrap(), 3);

        // The already-completed todo was not rewritten.
        let untouched = store.find_one(&already_done.id).await.unwrap().unwrap();
        assert_eq!(untouched.updated_at, already_done.updated_at);
    }

    #[tokio::test]
    async fn archive_completed_reports_zero_on_the_second_run() {
        let store = MemoryStore::new();
        store
            .insert(CreateTodo::new("done-a").with_completed(true).into_todo())
            .await
            .unwrap();
        store
            .insert(CreateTodo::new("done-b").with_completed(true).into_todo())
            .await
            .unwrap();
        store
            .insert(CreateTodo::new("open").into_todo())
            .await
            .unwrap();
        let orchestrator = TransactionOrchestrator::new(store.clone());

        let first = orchestrator.archive_completed().await;
        assert!(first.success);
        assert_eq!(first.data, Some(2));
        assert_eq!(store.count(&TodoFilter::all()).await.unwrap(), 1);

        let second = orchestrator.archive_completed().await;
        assert!(second.success);
        assert_eq!(second.data, Some(0));
    }

    #[test]
    fn outcome_wire_form_omits_the_absent_side() {
        let success = TransactionOutcome::success(7);
        let value = serde_json::to_value(&success).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["data"], 7);
        assert!(value.get("error").is_none());

        let failure: TransactionOutcome<u64> = TransactionOutcome::failure("boom");
        let value = serde_json::to_value(&failure).unwrap();
        assert_eq!(value["success"], false);
        assert!(value.get("data").is_none());
        assert_eq!(value["error"], "boom");
    }

    #[test]
    fn bulk_plan_deserializes_from_camel_case() {
        let plan: BulkOperationPlan = serde_json::from_str(
            r#"{
                "createTodos": [{"title": "from json"}],
                "updateTodos": [{"id": "68a1b2c3d4e5f60718293a4b", "data": {"completed": true}}],
                "deleteTodoIds": ["68a1b2c3d4e5f60718293a4c"]
            }"#,
        )
        .unwrap();

        assert_eq!(plan.create_todos.len(), 1);
        assert_eq!(plan.update_todos[0].data.completed, Some(true));
        assert_eq!(plan.delete_todo_ids.len(), 1);

        let empty: BulkOperationPlan = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, BulkOperationPlan::new());
    }
}
