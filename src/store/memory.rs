//! In-memory document store.
//!
//! [`MemoryStore`] keeps todos in insertion order in a `Vec` behind an
//! async [`RwLock`]. Handles are cheap to clone and share the same
//! data, which makes the store convenient as a test double and as a
//! development backend.
//!
//! Transactions are serializable through a deliberately coarse
//! single-writer scheme: [`MemorySession::start_transaction`] takes
//! the store's write lock and edits a private working copy. Nothing
//! else can read or write until the session commits (publishing the
//! copy), aborts (discarding it), or ends. The concurrency is crude,
//! but the semantics are exactly what the orchestrator layered on top
//! expects.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, OwnedRwLockWriteGuard, RwLock};

use crate::error::{StoreError, StoreResult};
use crate::model::{Todo, TodoId, TodoPatch};
use crate::store::{
    local_day_key, BulkWriteSummary, DocumentStore, GroupBy, GroupCount, SortSpec, StoreSession,
    TodoCollection, TodoFilter,
};

/// Insertion-ordered in-memory todo collection.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    documents: Arc<RwLock<Vec<Todo>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TodoCollection for MemoryStore {
    async fn insert(&self, todo: Todo) -> StoreResult<Todo> {
        let mut docs = self.documents.write().await;
        insert_into(&mut docs, todo)
    }

    async fn find_one(&self, id: &TodoId) -> StoreResult<Option<Todo>> {
        let docs = self.documents.read().await;
        Ok(find_one_in(&docs, id))
    }

    async fn find_many(
        &self,
        filter: &TodoFilter,
        sort: &SortSpec,
        skip: u64,
        limit: Option<u64>,
    ) -> StoreResult<Vec<Todo>> {
        let docs = self.documents.read().await;
        find_in(&docs, filter, sort, skip, limit)
    }

    async fn count(&self, filter: &TodoFilter) -> StoreResult<u64> {
        let docs = self.documents.read().await;
        count_in(&docs, filter)
    }

    async fn update_one(&self, id: &TodoId, patch: &TodoPatch) -> StoreResult<Option<Todo>> {
        let mut docs = self.documents.write().await;
        Ok(update_one_in(&mut docs, id, patch))
    }

    async fn delete_one(&self, id: &TodoId) -> StoreResult<Option<Todo>> {
        let mut docs = self.documents.write().await;
        Ok(delete_one_in(&mut docs, id))
    }

    async fn update_many(
        &self,
        ids: &[TodoId],
        patch: &TodoPatch,
    ) -> StoreResult<BulkWriteSummary> {
        let mut docs = self.documents.write().await;
        Ok(update_many_in(&mut docs, ids, patch))
    }

    async fn delete_many(&self, ids: &[TodoId]) -> StoreResult<u64> {
        let mut docs = self.documents.write().await;
        Ok(delete_many_in(&mut docs, ids))
    }

    async fn group_count(
        &self,
        filter: &TodoFilter,
        group: GroupBy,
    ) -> StoreResult<Vec<GroupCount>> {
        let docs = self.documents.read().await;
        group_count_in(&docs, filter, group)
    }
}

impl DocumentStore for MemoryStore {
    type Session = MemorySession;

    async fn begin_session(&self) -> StoreResult<MemorySession> {
        Ok(MemorySession {
            store: self.clone(),
            state: Arc::new(Mutex::new(SessionState::Idle)),
        })
    }
}

/// Session over a [`MemoryStore`].
///
/// Outside a transaction every operation passes straight through to
/// the store. Inside one, operations hit the session's working copy,
/// and the store's write lock is held until commit, abort, or end.
/// Clones share state, so a transaction started on one clone is
/// visible through all of them.
#[derive(Debug, Clone)]
pub struct MemorySession {
    store: MemoryStore,
    state: Arc<Mutex<SessionState>>,
}

#[derive(Debug)]
enum SessionState {
    /// No transaction open; operations pass through to the store.
    Idle,
    /// Transaction open: the store's write lock is held and all
    /// operations work against the private copy.
    InTransaction {
        guard: OwnedRwLockWriteGuard<Vec<Todo>>,
        working: Vec<Todo>,
    },
    /// The session has ended; only `end` remains callable.
    Ended,
}

fn session_ended() -> StoreError {
    StoreError::transaction("session already ended")
}

impl StoreSession for MemorySession {
    async fn start_transaction(&self) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        match &*state {
            SessionState::Idle => {
                let guard = self.store.documents.clone().write_owned().await;
                let working = (*guard).clone();
                *state = SessionState::InTransaction { guard, working };
                Ok(())
            }
            SessionState::InTransaction { .. } => {
                Err(StoreError::transaction("transaction already in progress"))
            }
            SessionState::Ended => Err(session_ended()),
        }
    }

    async fn commit(&self) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        match std::mem::replace(&mut *state, SessionState::Idle) {
            SessionState::InTransaction { mut guard, working } => {
                *guard = working;
                Ok(())
            }
            previous => {
                *state = previous;
                Err(StoreError::transaction("no transaction to commit"))
            }
        }
    }

    async fn abort(&self) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        match std::mem::replace(&mut *state, SessionState::Idle) {
            SessionState::InTransaction { guard, working } => {
                drop(working);
                drop(guard);
                Ok(())
            }
            previous => {
                *state = previous;
                Err(StoreError::transaction("no transaction to abort"))
            }
        }
    }

    async fn end(&self) {
        let mut state = self.state.lock().await;
        // Replacing the state drops any held guard and working copy.
        *state = SessionState::Ended;
    }
}

impl TodoCollection for MemorySession {
    async fn insert(&self, todo: Todo) -> StoreResult<Todo> {
        {
            let mut state = self.state.lock().await;
            match &mut *state {
                SessionState::InTransaction { working, .. } => return insert_into(working, todo),
                SessionState::Ended => return Err(session_ended()),
                SessionState::Idle => {}
            }
        }
        self.store.insert(todo).await
    }

    async fn find_one(&self, id: &TodoId) -> StoreResult<Option<Todo>> {
        {
            let state = self.state.lock().await;
            match &*state {
                SessionState::InTransaction { working, .. } => return Ok(find_one_in(working, id)),
                SessionState::Ended => return Err(session_ended()),
                SessionState::Idle => {}
            }
        }
        self.store.find_one(id).await
    }

    async fn find_many(
        &self,
        filter: &TodoFilter,
        sort: &SortSpec,
        skip: u64,
        limit: Option<u64>,
    ) -> StoreResult<Vec<Todo>> {
        {
            let state = self.state.lock().await;
            match &*state {
                SessionState::InTransaction { working, .. } => {
                    return find_in(working, filter, sort, skip, limit)
                }
                SessionState::Ended => return Err(session_ended()),
                SessionState::Idle => {}
            }
        }
        self.store.find_many(filter, sort, skip, limit).await
    }

    async fn count(&self, filter: &TodoFilter) -> StoreResult<u64> {
        {
            let state = self.state.lock().await;
            match &*state {
                SessionState::InTransaction { working, .. } => return count_in(working, filter),
                SessionState::Ended => return Err(session_ended()),
                SessionState::Idle => {}
            }
        }
        self.store.count(filter).await
    }

    async fn update_one(&self, id: &TodoId, patch: &TodoPatch) -> StoreResult<Option<Todo>> {
        {
            let mut state = self.state.lock().await;
            match &mut *state {
                SessionState::InTransaction { working, .. } => {
                    return Ok(update_one_in(working, id, patch))
                }
                SessionState::Ended => return Err(session_ended()),
                SessionState::Idle => {}
            }
        }
        self.store.update_one(id, patch).await
    }

    async fn delete_one(&self, id: &TodoId) -> StoreResult<Option<Todo>> {
        {
            let mut state = self.state.lock().await;
            match &mut *state {
                SessionState::InTransaction { working, .. } => {
                    return Ok(delete_one_in(working, id))
                }
                SessionState::Ended => return Err(session_ended()),
                SessionState::Idle => {}
            }
        }
        self.store.delete_one(id).await
    }

    async fn update_many(
        &self,
        ids: &[TodoId],
        patch: &TodoPatch,
    ) -> StoreResult<BulkWriteSummary> {
        {
            let mut state = self.state.lock().await;
            match &mut *state {
                SessionState::InTransaction { working, .. } => {
                    return Ok(update_many_in(working, ids, patch))
                }
                SessionState::Ended => return Err(session_ended()),
                SessionState::Idle => {}
            }
        }
        self.store.update_many(ids, patch).await
    }

    async fn delete_many(&self, ids: &[TodoId]) -> StoreResult<u64> {
        {
            let mut state = self.state.lock().await;
            match &mut *state {
                SessionState::InTransaction { working, .. } => {
                    return Ok(delete_many_in(working, ids))
                }
                SessionState::Ended => return Err(session_ended()),
                SessionState::Idle => {}
            }
        }
        self.store.delete_many(ids).await
    }

    async fn group_count(
        &self,
        filter: &TodoFilter,
        group: GroupBy,
    ) -> StoreResult<Vec<GroupCount>> {
        {
            let state = self.state.lock().await;
            match &*state {
                SessionState::InTransaction { working, .. } => {
                    return group_count_in(working, filter, group)
                }
                SessionState::Ended => return Err(session_ended()),
                SessionState::Idle => {}
            }
        }
        self.store.group_count(filter, group).await
    }
}

// Collection operations shared between the store (under its lock) and
// session working copies.

fn insert_into(docs: &mut Vec<Todo>, todo: Todo) -> StoreResult<Todo> {
    if docs.iter().any(|existing| existing.id == todo.id) {
        return Err(StoreError::store(format!(
            "duplicate document id: {}",
            todo.id
        )));
    }
    docs.push(todo.clone());
    Ok(todo)
}

fn find_one_in(docs: &[Todo], id: &TodoId) -> Option<Todo> {
    docs.iter().find(|todo| &todo.id == id).cloned()
}

fn find_in(
    docs: &[Todo],
    filter: &TodoFilter,
    sort: &SortSpec,
    skip: u64,
    limit: Option<u64>,
) -> StoreResult<Vec<Todo>> {
    let matcher = filter.matcher()?;
    let mut matches: Vec<Todo> = docs
        .iter()
        .filter(|todo| matcher.matches(todo))
        .cloned()
        .collect();
    // sort_by is stable, so equal keys keep insertion order.
    if !sort.is_empty() {
        matches.sort_by(|a, b| sort.compare(a, b));
    }
    let skipped = matches
        .into_iter()
        .skip(usize::try_from(skip).unwrap_or(usize::MAX));
    Ok(match limit {
        Some(limit) => skipped
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .collect(),
        None => skipped.collect(),
    })
}

fn count_in(docs: &[Todo], filter: &TodoFilter) -> StoreResult<u64> {
    let matcher = filter.matcher()?;
    Ok(docs.iter().filter(|todo| matcher.matches(todo)).count() as u64)
}

fn update_one_in(docs: &mut [Todo], id: &TodoId, patch: &TodoPatch) -> Option<Todo> {
    let todo = docs.iter_mut().find(|todo| &todo.id == id)?;
    if patch.apply(todo) {
        todo.updated_at = Utc::now();
    }
    Some(todo.clone())
}

fn delete_one_in(docs: &mut Vec<Todo>, id: &TodoId) -> Option<Todo> {
    let position = docs.iter().position(|todo| &todo.id == id)?;
    Some(docs.remove(position))
}

fn update_many_in(docs: &mut [Todo], ids: &[TodoId], patch: &TodoPatch) -> BulkWriteSummary {
    let wanted: HashSet<&TodoId> = ids.iter().collect();
    let now = Utc::now();
    let mut summary = BulkWriteSummary::default();
    for todo in docs.iter_mut().filter(|todo| wanted.contains(&todo.id)) {
        summary.matched += 1;
        if patch.apply(todo) {
            todo.updated_at = now;
            summary.modified += 1;
        }
    }
    summary
}

fn delete_many_in(docs: &mut Vec<Todo>, ids: &[TodoId]) -> u64 {
    let wanted: HashSet<&TodoId> = ids.iter().collect();
    let before = docs.len();
    docs.retain(|todo| !wanted.contains(&todo.id));
    (before - docs.len()) as u64
}

fn group_count_in(docs: &[Todo], filter: &TodoFilter, group: GroupBy) -> StoreResult<Vec<GroupCount>> {
    let matcher = filter.matcher()?;
    let mut buckets: BTreeMap<String, u64> = BTreeMap::new();
    for todo in docs.iter().filter(|todo| matcher.matches(todo)) {
        let key = match group {
            GroupBy::Priority => todo.priority.as_str().to_string(),
            GroupBy::CreatedDay => local_day_key(todo.created_at),
            GroupBy::UpdatedDay => local_day_key(todo.updated_at),
        };
        *buckets.entry(key).or_insert(0) += 1;
    }
    Ok(buckets
        .into_iter()
        .map(|(key, count)| GroupCount { key, count })
        .collect())
}
