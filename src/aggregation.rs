//! Read-only analytics over a todo collection.
//!
//! The engine bypasses the repository and works straight against a
//! [`TodoCollection`], fanning independent counts and grouped counts
//! out concurrently and assembling them into fixed report shapes.
//! "Day" always means a calendar day on the local clock, and daily
//! buckets are sparse: days with no documents simply do not appear.

use serde::Serialize;

use crate::config::StoreConfig;
use crate::error::StoreResult;
use crate::model::{Priority, PriorityCounts, Todo};
use crate::store::{
    GroupBy, GroupCount, OrderDirection, SortField, SortSpec, TimeRange, TodoCollection,
    TodoFilter,
};

/// Entry limit for listing queries when the caller does not name one.
pub const DEFAULT_LIST_LIMIT: u64 = 10;

/// Headline analytics for the whole collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoAnalytics {
    pub total_todos: u64,
    /// Share of completed todos in percent, rounded to two decimals.
    /// Zero when the collection is empty.
    pub completion_rate: f64,
    pub priority_distribution: PriorityCounts,
    /// Always zero: completion instants are not tracked, so there is
    /// no duration to average.
    pub average_completion_time: f64,
    pub todos_created_today: u64,
    pub todos_completed_today: u64,
}

/// Documents per local calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyCount {
    /// Day key in `YYYY-MM-DD`.
    pub date: String,
    pub count: u64,
}

impl From<GroupCount> for DailyCount {
    fn from(bucket: GroupCount) -> Self {
        Self {
            date: bucket.key,
            count: bucket.count,
        }
    }
}

/// Share of one priority across the collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityTrend {
    pub priority: Priority,
    pub count: u64,
    /// Whole-number percentage of the collection, rounded half away
    /// from zero. Zero when the collection is empty.
    pub percentage: u32,
}

/// Time-bucketed activity report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoTrends {
    /// Todos created per day inside the window, ascending by day.
    pub daily_creation: Vec<DailyCount>,
    /// Todos completed per day inside the window (bucketed by their
    /// last update), ascending by day.
    pub daily_completion: Vec<DailyCount>,
    /// Collection-wide priority shares, most urgent first, present for
    /// all three priorities.
    pub priority_trends: Vec<PriorityTrend>,
}

/// Completion snapshot.
///
/// The document model carries no due date, so the due-oriented
/// counters are structurally zero; they keep their place in the shape
/// for consumers that expect them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionStats {
    pub overdue: u64,
    pub due_today: u64,
    pub due_tomorrow: u64,
    pub due_this_week: u64,
    pub completed: u64,
    pub pending: u64,
}

/// Analytics engine over a [`TodoCollection`].
#[derive(Debug, Clone)]
pub struct AggregationEngine<C> {
    collection: C,
    config: StoreConfig,
}

impl<C> AggregationEngine<C> {
    /// Creates an engine with default settings.
    pub fn new(collection: C) -> Self {
        Self {
            collection,
            config: StoreConfig::default(),
        }
    }

    /// Creates an engine with explicit settings.
    pub fn with_config(collection: C, config: StoreConfig) -> Self {
        Self { collection, config }
    }
}

impl<C: TodoCollection> AggregationEngine<C> {
    /// Headline numbers: totals, completion rate, priority
    /// distribution, and today's activity. All five queries run
    /// concurrently.
    pub async fn analytics(&self) -> StoreResult<TodoAnalytics> {
        let today = TimeRange::today();
        // try_join! stages each argument in its own statement, so the
        // borrowed filters must be bound ahead of it.
        let everything = TodoFilter::all();
        let done = TodoFilter::completed(true);
        let created_today = TodoFilter::all().with_created(today);
        let finished_today = TodoFilter::completed(true).with_updated(today);

        let (total, completed, groups, created, finished) = futures::try_join!(
            self.collection.count(&everything),
            self.collection.count(&done),
            self.collection.group_count(&everything, GroupBy::Priority),
            self.collection.count(&created_today),
            self.collection.count(&finished_today),
        )?;

        let completion_rate = if total == 0 {
            0.0
        } else {
            round2(completed as f64 / total as f64 * 100.0)
        };

        Ok(TodoAnalytics {
            total_todos: total,
            completion_rate,
            priority_distribution: distribution_from(groups),
            average_completion_time: 0.0,
            todos_created_today: created,
            todos_completed_today: finished,
        })
    }

    /// Daily creation and completion counts over a trailing window of
    /// `days` (the configured window when `None`), plus collection-wide
    /// priority shares.
    pub async fn trends(&self, days: Option<u32>) -> StoreResult<TodoTrends> {
        let days = days.unwrap_or(self.config.trend_days);
        let window = TimeRange::trailing_days(days);
        let everything = TodoFilter::all();
        let created_in_window = TodoFilter::all().with_created(window);
        let finished_in_window = TodoFilter::completed(true).with_updated(window);

        let (creation, completion, priority_groups, total) = futures::try_join!(
            self.collection
                .group_count(&created_in_window, GroupBy::CreatedDay),
            self.collection
                .group_count(&finished_in_window, GroupBy::UpdatedDay),
            self.collection.group_count(&everything, GroupBy::Priority),
            self.collection.count(&everything),
        )?;

        let distribution = distribution_from(priority_groups);
        let priority_trends = Priority::ALL
            .iter()
            .map(|&priority| {
                let count = distribution.get(priority);
                PriorityTrend {
                    priority,
                    count,
                    percentage: percentage(count, total),
                }
            })
            .collect();

        Ok(TodoTrends {
            daily_creation: creation.into_iter().map(DailyCount::from).collect(),
            daily_completion: completion.into_iter().map(DailyCount::from).collect(),
            priority_trends,
        })
    }

    /// Completed/pending snapshot with the fixed-zero due-date
    /// counters.
    pub async fn completion_stats(&self) -> StoreResult<CompletionStats> {
        let done = TodoFilter::completed(true);
        let open = TodoFilter::completed(false);

        let (completed, pending) = futures::try_join!(
            self.collection.count(&done),
            self.collection.count(&open),
        )?;

        Ok(CompletionStats {
            overdue: 0,
            due_today: 0,
            due_tomorrow: 0,
            due_this_week: 0,
            completed,
            pending,
        })
    }

    /// Most urgent pending todos: ascending priority rank, newest
    /// first within a rank.
    pub async fn top_priority(&self, limit: Option<u64>) -> StoreResult<Vec<Todo>> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT);
        let sort = SortSpec::by(SortField::Priority, OrderDirection::Ascending)
            .then(SortField::CreatedAt, OrderDirection::Descending);
        self.collection
            .find_many(&TodoFilter::completed(false), &sort, 0, Some(limit))
            .await
    }

    /// Completed todos, most recently updated first.
    pub async fn recently_completed(&self, limit: Option<u64>) -> StoreResult<Vec<Todo>> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT);
        let sort = SortSpec::by(SortField::UpdatedAt, OrderDirection::Descending);
        self.collection
            .find_many(&TodoFilter::completed(true), &sort, 0, Some(limit))
            .await
    }
}

fn distribution_from(groups: Vec<GroupCount>) -> PriorityCounts {
    let mut distribution = PriorityCounts::default();
    for bucket in groups {
        if let Some(priority) = Priority::parse(&bucket.key) {
            distribution.set(priority, bucket.count);
        }
    }
    distribution
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn percentage(count: u64, total: u64) -> u32 {
    if total == 0 {
        0
    } else {
        (count as f64 / total as f64 * 100.0).round() as u32
    }
}
