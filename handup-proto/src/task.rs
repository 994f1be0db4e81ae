//! Task data model: categories, lifecycle status, and request payloads.
//!
//! A task moves forward-only through `open -> claimed -> completed`. The
//! transition rules themselves live in the server's lifecycle engine; this
//! module only defines the shapes that cross the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::user::{UserId, UserProfile};

/// Maximum allowed task title length in characters.
pub const MAX_TITLE_LENGTH: usize = 100;

/// Unique identifier for a task, based on UUID v7 for time-ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Creates a new time-ordered task identifier (UUID v7).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `TaskId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID value.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when parsing an unrecognized task category.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown category: {0}")]
pub struct UnknownCategory(pub String);

/// The fixed set of help-request categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Shopping, pickups, and other small errands.
    Errands,
    /// Household and equipment repairs.
    Repairs,
    /// Tutoring and teaching.
    Education,
    /// Giving away or collecting donations.
    Donations,
    /// Anything that fits nowhere else.
    Other,
}

impl Category {
    /// All categories, in a stable order.
    pub const ALL: [Self; 5] = [
        Self::Errands,
        Self::Repairs,
        Self::Education,
        Self::Donations,
        Self::Other,
    ];
}

impl std::str::FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "errands" => Ok(Self::Errands),
            "repairs" => Ok(Self::Repairs),
            "education" => Ok(Self::Education),
            "donations" => Ok(Self::Donations),
            "other" => Ok(Self::Other),
            other => Err(UnknownCategory(other.to_string())),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Errands => write!(f, "errands"),
            Self::Repairs => write!(f, "repairs"),
            Self::Education => write!(f, "education"),
            Self::Donations => write!(f, "donations"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Lifecycle status of a task.
///
/// There is deliberately no cancelled or expired state; a requester who
/// wants a task gone deletes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Posted and available to claim.
    Open,
    /// A helper has taken the task.
    Claimed,
    /// The work is done.
    Completed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Claimed => write!(f, "claimed"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// Where the help is needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Longitude in degrees.
    pub longitude: f64,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Free-text address, if the poster provided one.
    #[serde(default)]
    pub address: Option<String>,
}

/// A stored help request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier.
    pub id: TaskId,
    /// Short summary, at most [`MAX_TITLE_LENGTH`] characters.
    pub title: String,
    /// What needs doing.
    pub description: String,
    /// Which category the request falls under.
    pub category: Category,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Where the help is needed, if given.
    pub location: Option<Location>,
    /// Optional deadline for the request.
    pub deadline: Option<DateTime<Utc>>,
    /// The user who posted the task. Immutable after creation.
    pub requester: UserId,
    /// The user who claimed the task; `None` exactly while the task is open.
    pub helper: Option<UserId>,
    /// When the task was created.
    pub created_at: DateTime<Utc>,
    /// When the task was last modified.
    pub updated_at: DateTime<Utc>,
}

/// A task with its requester and helper populated for display.
///
/// This is what list responses and push events carry: observers need the
/// participants' names and emails without a second lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskView {
    /// Unique task identifier.
    pub id: TaskId,
    /// Short summary.
    pub title: String,
    /// What needs doing.
    pub description: String,
    /// Which category the request falls under.
    pub category: Category,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Where the help is needed, if given.
    pub location: Option<Location>,
    /// Optional deadline for the request.
    pub deadline: Option<DateTime<Utc>>,
    /// The posting user's public profile.
    pub requester: Option<UserProfile>,
    /// The claiming user's public profile, if claimed.
    pub helper: Option<UserProfile>,
    /// When the task was created.
    pub created_at: DateTime<Utc>,
    /// When the task was last modified.
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating a task.
///
/// Required-ness of title/description/category is enforced by the server
/// so that missing fields produce a validation error, not a serde
/// rejection; the category arrives as a string and is parsed against the
/// fixed set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewTask {
    /// Short summary. Required.
    pub title: Option<String>,
    /// What needs doing. Required.
    pub description: Option<String>,
    /// Category name. Required, must be one of the fixed set.
    pub category: Option<String>,
    /// Where the help is needed.
    pub location: Option<Location>,
    /// Optional deadline.
    pub deadline: Option<DateTime<Utc>>,
}

/// Partial update for an open task; only provided fields are merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskPatch {
    /// Replacement title.
    pub title: Option<String>,
    /// Replacement description.
    pub description: Option<String>,
    /// Replacement category name.
    pub category: Option<String>,
    /// Replacement location.
    pub location: Option<Location>,
    /// Replacement deadline.
    pub deadline: Option<DateTime<Utc>>,
}

impl TaskPatch {
    /// Returns `true` if the patch carries no fields at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.location.is_none()
            && self.deadline.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn category_parses_all_known_names() {
        for category in Category::ALL {
            let parsed = Category::from_str(&category.to_string()).unwrap();
            assert_eq!(parsed, category);
        }
    }

    #[test]
    fn category_rejects_unknown_name() {
        let err = Category::from_str("plumbing").unwrap_err();
        assert_eq!(err, UnknownCategory("plumbing".to_string()));
    }

    #[test]
    fn category_serde_names_are_lowercase() {
        let json = serde_json::to_string(&Category::Donations).unwrap();
        assert_eq!(json, "\"donations\"");
        let parsed: Category = serde_json::from_str("\"errands\"").unwrap();
        assert_eq!(parsed, Category::Errands);
    }

    #[test]
    fn status_serde_names_are_lowercase() {
        assert_eq!(serde_json::to_string(&TaskStatus::Open).unwrap(), "\"open\"");
        assert_eq!(
            serde_json::to_string(&TaskStatus::Claimed).unwrap(),
            "\"claimed\""
        );
        assert_eq!(
            serde_json::to_string(&TaskStatus::Completed).unwrap(),
            "\"completed\""
        );
    }

    #[test]
    fn status_display_matches_wire_names() {
        assert_eq!(TaskStatus::Open.to_string(), "open");
        assert_eq!(TaskStatus::Claimed.to_string(), "claimed");
        assert_eq!(TaskStatus::Completed.to_string(), "completed");
    }

    #[test]
    fn new_task_tolerates_missing_fields() {
        let payload: NewTask = serde_json::from_str(r#"{"title":"Mow lawn"}"#).unwrap();
        assert_eq!(payload.title.as_deref(), Some("Mow lawn"));
        assert!(payload.description.is_none());
        assert!(payload.category.is_none());
    }

    #[test]
    fn patch_is_empty_detects_no_fields() {
        assert!(TaskPatch::default().is_empty());
        let patch = TaskPatch {
            title: Some("new".to_string()),
            ..TaskPatch::default()
        };
        assert!(!patch.is_empty());
    }

    #[test]
    fn task_round_trips_through_json() {
        let now = Utc::now();
        let task = Task {
            id: TaskId::new(),
            title: "Fix the fence".to_string(),
            description: "Two broken boards".to_string(),
            category: Category::Repairs,
            status: TaskStatus::Open,
            location: Some(Location {
                longitude: 13.4,
                latitude: 52.5,
                address: Some("Prenzlauer Berg".to_string()),
            }),
            deadline: None,
            requester: UserId::new(),
            helper: None,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_string(&task).unwrap();
        let back: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(back, task);
    }
}
