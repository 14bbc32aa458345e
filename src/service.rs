//! One handle over a document store: repository, aggregation, and
//! transactional orchestration, sharing the same underlying store.

use crate::aggregation::AggregationEngine;
use crate::config::Config;
use crate::error::StoreResult;
use crate::model::TodoPatch;
use crate::repository::{TodoRepository, TodoStore};
use crate::store::DocumentStore;
use crate::transaction::TransactionOrchestrator;

/// Facade bundling the three persistence surfaces.
///
/// The fields are public on purpose: callers go straight to the
/// surface they need (`service.repository.find_all(..)`,
/// `service.aggregation.analytics()`,
/// `service.transactions.create_multiple(..)`). The handful of
/// methods on the facade itself are cross-surface conveniences.
#[derive(Debug, Clone)]
pub struct TodoService<S> {
    pub repository: TodoStore<S>,
    pub aggregation: AggregationEngine<S>,
    pub transactions: TransactionOrchestrator<S>,
}

impl<S: DocumentStore> TodoService<S> {
    /// Builds a service with default sizing.
    pub fn new(store: S) -> Self {
        Self {
            repository: TodoStore::new(store.clone()),
            aggregation: AggregationEngine::new(store.clone()),
            transactions: TransactionOrchestrator::new(store),
        }
    }

    /// Builds a service sized from configuration.
    pub fn with_config(store: S, config: &Config) -> Self {
        Self {
            repository: TodoStore::with_config(store.clone(), config.store.clone()),
            aggregation: AggregationEngine::with_config(store.clone(), config.store.clone()),
            transactions: TransactionOrchestrator::new(store),
        }
    }

    /// Completes every pending todo, returning how many changed.
    pub async fn mark_all_completed(&self) -> StoreResult<u64> {
        let pending = self.repository.find_pending().await?;
        let ids: Vec<String> = pending.iter().map(|todo| todo.id.to_string()).collect();
        let summary = self
            .repository
            .bulk_update(&ids, &TodoPatch::completed(true))
            .await?;
        Ok(summary.modified)
    }

    /// Deletes every completed todo, returning how many were removed.
    pub async fn delete_completed(&self) -> StoreResult<u64> {
        let completed = self.repository.find_completed().await?;
        let ids: Vec<String> = completed.iter().map(|todo| todo.id.to_string()).collect();
        self.repository.bulk_delete(&ids).await
    }
}
