//! Push-event envelope for the board's WebSocket channel.
//!
//! Every accepted lifecycle mutation produces exactly one [`BoardEvent`],
//! serialized as a single JSON text frame shaped
//! `{"event": "<kind>", "data": ...}` and fanned out to all currently
//! connected observers.

use serde::{Deserialize, Serialize};

use crate::task::{TaskId, TaskView};

/// A state-change notification broadcast to connected observers.
///
/// All variants except `TaskDeleted` carry the full populated task; a
/// deletion carries only the id, since the task no longer exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum BoardEvent {
    /// A task was created.
    NewTask(TaskView),
    /// An open task's fields were edited.
    TaskUpdated(TaskView),
    /// A helper claimed a task.
    TaskClaimed(TaskView),
    /// A task was marked completed.
    TaskCompleted(TaskView),
    /// A task was deleted by its requester.
    TaskDeleted(TaskId),
}

impl BoardEvent {
    /// Returns the wire name of this event kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NewTask(_) => "new-task",
            Self::TaskUpdated(_) => "task-updated",
            Self::TaskClaimed(_) => "task-claimed",
            Self::TaskCompleted(_) => "task-completed",
            Self::TaskDeleted(_) => "task-deleted",
        }
    }
}

/// Encodes a [`BoardEvent`] as a JSON string.
///
/// # Errors
///
/// Returns an error string if serialization fails.
pub fn encode(event: &BoardEvent) -> Result<String, String> {
    serde_json::to_string(event).map_err(|e| format!("event encode error: {e}"))
}

/// Decodes a [`BoardEvent`] from a JSON string.
///
/// # Errors
///
/// Returns an error string if deserialization fails.
pub fn decode(text: &str) -> Result<BoardEvent, String> {
    serde_json::from_str(text).map_err(|e| format!("event decode error: {e}"))
}
