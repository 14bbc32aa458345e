//! Core todo domain types.
//!
//! The entity model is deliberately small: a [`Todo`] document with a
//! typed identifier, a three-level [`Priority`], a completion flag, and
//! server-managed timestamps. Input arrives through [`CreateTodo`] and
//! [`TodoPatch`], which carry the shape-level constraints callers are
//! expected to check at the boundary via their `validate` methods.
//!
//! # Example
//!
//! ```rust
//! use todo_store::model::{CreateTodo, Priority};
//!
//! let input = CreateTodo::new("write release notes").with_priority(Priority::High);
//! input.validate().unwrap();
//!
//! let todo = input.into_todo();
//! assert_eq!(todo.priority, Priority::High);
//! assert!(!todo.completed);
//! assert_eq!(todo.created_at, todo.updated_at);
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Maximum length of a todo title, in characters.
pub const TITLE_MAX_LEN: usize = 200;

/// Maximum length of a todo description, in characters.
pub const DESCRIPTION_MAX_LEN: usize = 1000;

/// Unique identifier for a todo document.
///
/// Ids are 24 lowercase hexadecimal characters encoding 12 bytes: a
/// 4-byte unix-seconds creation timestamp followed by 8 random bytes.
/// Because the timestamp leads, ids generated later sort later (at
/// one-second granularity), which keeps insertion-ordered scans and
/// id-ordered scans roughly aligned.
///
/// Parsing is syntactic only: any 24-character hex string is accepted
/// and normalized to lowercase. Whether a document with that id exists
/// is a separate question answered by the store.
///
/// # Example
///
/// ```rust
/// use todo_store::model::TodoId;
///
/// let id = TodoId::new();
/// assert_eq!(id.as_str().len(), 24);
///
/// let parsed: TodoId = "68a1b2c3d4e5f60718293a4b".parse().unwrap();
/// assert_eq!(parsed.as_str(), "68a1b2c3d4e5f60718293a4b");
///
/// assert!("not-a-todo-id".parse::<TodoId>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TodoId(String);

impl TodoId {
    /// Generates a new id from the current time and fresh entropy.
    #[must_use]
    pub fn new() -> Self {
        // Epoch seconds fit 32 bits until 2106, matching the id layout.
        let seconds = Utc::now().timestamp() as u32;
        let entropy = Uuid::new_v4();
        let bytes = entropy.as_bytes();
        let tail = u64::from_be_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]);
        Self(format!("{seconds:08x}{tail:016x}"))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the creation instant embedded in the id, if decodable.
    #[must_use]
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let seconds = u32::from_str_radix(self.0.get(..8)?, 16).ok()?;
        DateTime::from_timestamp(i64::from(seconds), 0)
    }
}

impl Default for TodoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TodoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TodoId {
    type Err = TodoIdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.len() == 24 && value.bytes().all(|b| b.is_ascii_hexdigit()) {
            Ok(Self(value.to_ascii_lowercase()))
        } else {
            Err(TodoIdError {
                value: value.to_string(),
            })
        }
    }
}

impl TryFrom<String> for TodoId {
    type Error = TodoIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TodoId> for String {
    fn from(id: TodoId) -> Self {
        id.0
    }
}

impl AsRef<str> for TodoId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Error returned when parsing an invalid [`TodoId`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid todo id {value:?}: expected 24 hexadecimal characters")]
pub struct TodoIdError {
    value: String,
}

/// Urgency level of a todo.
///
/// Priorities order by urgency: [`Priority::High`] ranks before
/// [`Priority::Medium`], which ranks before [`Priority::Low`]. The wire
/// representation is the lowercase name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// All priorities, ordered from most to least urgent.
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    /// Urgency rank. Lower values are more urgent, so sorting ascending
    /// by rank lists high-priority work first.
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }

    /// Wire name of the priority.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    /// Parses a wire name back into a priority.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-priority document counts, zero-filled for absent priorities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PriorityCounts {
    pub low: u64,
    pub medium: u64,
    pub high: u64,
}

impl PriorityCounts {
    /// Returns the count for one priority.
    #[must_use]
    pub fn get(&self, priority: Priority) -> u64 {
        match priority {
            Priority::Low => self.low,
            Priority::Medium => self.medium,
            Priority::High => self.high,
        }
    }

    /// Sets the count for one priority.
    pub fn set(&mut self, priority: Priority, count: u64) {
        match priority {
            Priority::Low => self.low = count,
            Priority::Medium => self.medium = count,
            Priority::High => self.high = count,
        }
    }

    /// Sum across all priorities.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.low + self.medium + self.high
    }
}

/// A persisted todo document.
///
/// Timestamps are server-managed: `created_at` is set once at insert
/// and `updated_at` is bumped whenever a mutation actually changes a
/// field. On the wire both serialize in camelCase, and an absent
/// description is omitted rather than serialized as null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: TodoId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub priority: Priority,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a todo.
///
/// Only the title is required; priority defaults to
/// [`Priority::Medium`] and the completion flag to `false`. Callers are
/// expected to run [`CreateTodo::validate`] at the boundary before
/// handing input to the repository, which trusts its input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTodo {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl CreateTodo {
    /// Creates an input with just a title.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            priority: None,
            completed: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Sets the completion flag.
    #[must_use]
    pub fn with_completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    /// Checks shape-level constraints: non-empty title within
    /// [`TITLE_MAX_LEN`], description within [`DESCRIPTION_MAX_LEN`].
    pub fn validate(&self) -> crate::error::StoreResult<()> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(crate::error::StoreError::validation(
                "title must not be empty",
            ));
        }
        if title.chars().count() > TITLE_MAX_LEN {
            return Err(crate::error::StoreError::validation(format!(
                "title exceeds {TITLE_MAX_LEN} characters"
            )));
        }
        if let Some(description) = &self.description {
            if description.trim().chars().count() > DESCRIPTION_MAX_LEN {
                return Err(crate::error::StoreError::validation(format!(
                    "description exceeds {DESCRIPTION_MAX_LEN} characters"
                )));
            }
        }
        Ok(())
    }

    /// Materializes the input into a full document: defaults filled,
    /// text trimmed, a fresh id assigned, and both timestamps set to
    /// the same instant. Default-filling happens here and only here.
    #[must_use]
    pub fn into_todo(self) -> Todo {
        let now = Utc::now();
        Todo {
            id: TodoId::new(),
            title: self.title.trim().to_string(),
            description: self.description.map(|d| d.trim().to_string()),
            priority: self.priority.unwrap_or_default(),
            completed: self.completed.unwrap_or(false),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update for a todo. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TodoPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl TodoPatch {
    /// Patch that only sets the priority.
    #[must_use]
    pub fn priority(priority: Priority) -> Self {
        Self {
            priority: Some(priority),
            ..Self::default()
        }
    }

    /// Patch that only sets the completion flag.
    #[must_use]
    pub fn completed(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Self::default()
        }
    }

    /// Patch that only sets the title.
    #[must_use]
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// True when no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.completed.is_none()
    }

    /// Checks shape-level constraints on the fields that are present.
    pub fn validate(&self) -> crate::error::StoreResult<()> {
        if let Some(title) = &self.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(crate::error::StoreError::validation(
                    "title must not be empty",
                ));
            }
            if title.chars().count() > TITLE_MAX_LEN {
                return Err(crate::error::StoreError::validation(format!(
                    "title exceeds {TITLE_MAX_LEN} characters"
                )));
            }
        }
        if let Some(description) = &self.description {
            if description.trim().chars().count() > DESCRIPTION_MAX_LEN {
                return Err(crate::error::StoreError::validation(format!(
                    "description exceeds {DESCRIPTION_MAX_LEN} characters"
                )));
            }
        }
        Ok(())
    }

    /// Applies the patch to a document, returning whether any field
    /// actually changed. Timestamps are left alone; the store bumps
    /// `updated_at` only when this returns true.
    pub fn apply(&self, todo: &mut Todo) -> bool {
        let mut changed = false;
        if let Some(title) = &self.title {
            if todo.title != *title {
                todo.title = title.clone();
                changed = true;
            }
        }
        if let Some(description) = &self.description {
            if todo.description.as_deref() != Some(description.as_str()) {
                todo.description = Some(description.clone());
                changed = true;
            }
        }
        if let Some(priority) = self.priority {
            if todo.priority != priority {
                todo.priority = priority;
                changed = true;
            }
        }
        if let Some(completed) = self.completed {
            if todo.completed != completed {
                todo.completed = completed;
                changed = true;
            }
        }
        changed
    }
}
