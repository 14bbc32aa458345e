//! # todo-store
//!
//! Async persistence and analytics layer for todo documents over a
//! pluggable document store. Ships an in-memory backend with
//! session-scoped transactions; the same traits fit a remote document
//! database.
//!
//! ## Features
//!
//! - **Repository**: CRUD plus filtered, paginated, sorted, and text-searched queries
//! - **Aggregation**: completion analytics, per-priority distributions, daily trends
//! - **Transactions**: all-or-nothing batch creation plus a bulk pipeline that reports per-phase failures and commits the rest
//! - **Store abstraction**: trait seam with a tokio-based in-memory backend
//! - **Configuration**: layered defaults, TOML file, and environment overrides
//!
//! ## Example
//!
//! ```rust,no_run
//! use todo_store::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> StoreResult<()> {
//!     // Load configuration
//!     let config = Config::load()?;
//!
//!     // Initialize tracing
//!     init_tracing(&config)?;
//!
//!     // One store handle shared by every surface
//!     let service = TodoService::with_config(MemoryStore::new(), &config);
//!
//!     let todo = service
//!         .repository
//!         .create(CreateTodo::new("write the quarterly report").with_priority(Priority::High))
//!         .await?;
//!     info!(id = %todo.id, "created");
//!
//!     let analytics = service.aggregation.analytics().await?;
//!     info!(total = analytics.total_todos, "collection analytics");
//!
//!     Ok(())
//! }
//! ```

pub mod aggregation;
pub mod config;
pub mod error;
pub mod model;
pub mod observability;
pub mod repository;
pub mod service;
pub mod store;
pub mod transaction;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::aggregation::{
        AggregationEngine, CompletionStats, DailyCount, PriorityTrend, TodoAnalytics, TodoTrends,
    };
    pub use crate::config::{Config, ServiceConfig, StoreConfig};
    pub use crate::error::{StoreError, StoreResult};
    pub use crate::model::{CreateTodo, Priority, PriorityCounts, Todo, TodoId, TodoPatch};
    pub use crate::observability::init_tracing;
    pub use crate::repository::{FindAllOptions, TodoPage, TodoRepository, TodoStats, TodoStore};
    pub use crate::service::TodoService;
    pub use crate::store::{
        BulkWriteSummary, DocumentStore, GroupBy, GroupCount, MemorySession, MemoryStore,
        OrderDirection, SortField, SortKey, SortSpec, StoreSession, TimeRange, TodoCollection,
        TodoFilter,
    };
    pub use crate::transaction::{
        BulkOperationPlan, BulkOperationReport, TodoUpdate, TransactionOrchestrator,
        TransactionOutcome,
    };

    pub use serde::{Deserialize, Serialize};

    // Re-export tracing macros and types
    pub use tracing::{debug, error, info, instrument, trace, warn, Level, Span};

    // Re-export tokio for async runtime
    pub use tokio;

    // Re-export time utilities
    pub use chrono::{DateTime, Utc};

    // Re-export UUID
    pub use uuid::Uuid;

    // Re-export futures utilities
    pub use futures::{future, Future};
}
