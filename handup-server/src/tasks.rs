//! Task lifecycle engine.
//!
//! [`TaskBoard`] owns every transition a task can make: create, update,
//! claim, complete, delete, plus the two listing queries. Each mutating
//! operation takes the caller's resolved identity explicitly, validates
//! ownership and state up front, and then performs a single conditional
//! write; if another writer moved the status in between, the loser gets
//! [`ApiError::Conflict`] instead of silently overwriting. Every accepted
//! mutation publishes exactly one event through the injected sink.

use std::sync::Arc;

use chrono::Utc;

use handup_proto::event::BoardEvent;
use handup_proto::task::{
    Category, MAX_TITLE_LENGTH, NewTask, Task, TaskId, TaskPatch, TaskStatus, TaskView,
};
use handup_proto::user::User;

use crate::broadcast::EventSink;
use crate::error::ApiError;
use crate::store::{StoreError, TaskStore, UserStore};

/// The lifecycle engine: state machine, ownership rules, and event
/// emission for the task board.
pub struct TaskBoard {
    tasks: TaskStore,
    users: Arc<UserStore>,
    events: Arc<dyn EventSink>,
}

impl TaskBoard {
    /// Creates a board over the given user directory, publishing through
    /// the injected sink.
    #[must_use]
    pub fn new(users: Arc<UserStore>, events: Arc<dyn EventSink>) -> Self {
        Self {
            tasks: TaskStore::new(),
            users,
            events,
        }
    }

    /// Creates a new open task owned by the caller.
    ///
    /// # Errors
    ///
    /// [`ApiError::Validation`] if title, description, or category are
    /// missing or malformed.
    pub async fn create(&self, caller: &User, payload: NewTask) -> Result<TaskView, ApiError> {
        let title = validate_title(payload.title)?;
        let description = match payload.description {
            Some(d) if !d.trim().is_empty() => d,
            _ => return Err(ApiError::Validation("Please add a description".to_string())),
        };
        let category = parse_category(payload.category)?;

        let now = Utc::now();
        let task = Task {
            id: TaskId::new(),
            title,
            description,
            category,
            status: TaskStatus::Open,
            location: payload.location,
            deadline: payload.deadline,
            requester: caller.id,
            helper: None,
            created_at: now,
            updated_at: now,
        };
        let id = task.id;
        self.tasks.insert(task.clone()).await;

        tracing::info!(task_id = %id, requester = %caller.id, "task created");
        let view = self.view(&task).await;
        self.events.publish(BoardEvent::NewTask(view.clone()));
        Ok(view)
    }

    /// Merges the provided fields into an open task owned by the caller.
    ///
    /// # Errors
    ///
    /// [`ApiError::NotFound`], [`ApiError::Authorization`] if the caller
    /// is not the requester, [`ApiError::InvalidState`] if the task is no
    /// longer open, [`ApiError::Validation`] on a bad replacement field,
    /// or [`ApiError::Conflict`] if the status moved mid-flight.
    pub async fn update(
        &self,
        caller: &User,
        id: &TaskId,
        patch: TaskPatch,
    ) -> Result<TaskView, ApiError> {
        let task = self.tasks.get(id).await.ok_or(ApiError::NotFound)?;
        if task.requester != caller.id {
            return Err(ApiError::Authorization(
                "Not authorized to update this task".to_string(),
            ));
        }
        if task.status != TaskStatus::Open {
            return Err(ApiError::InvalidState(
                "Only open tasks can be updated".to_string(),
            ));
        }

        // Validate every replacement before touching the task.
        let title = patch.title.map(|t| validate_title(Some(t))).transpose()?;
        let description = match patch.description {
            Some(d) if d.trim().is_empty() => {
                return Err(ApiError::Validation("Please add a description".to_string()));
            }
            other => other,
        };
        let category = patch
            .category
            .map(|c| parse_category(Some(c)))
            .transpose()?;
        let location = patch.location;
        let deadline = patch.deadline;

        let updated = self
            .tasks
            .update_if_status(id, TaskStatus::Open, |t| {
                if let Some(title) = title {
                    t.title = title;
                }
                if let Some(description) = description {
                    t.description = description;
                }
                if let Some(category) = category {
                    t.category = category;
                }
                if let Some(location) = location {
                    t.location = Some(location);
                }
                if let Some(deadline) = deadline {
                    t.deadline = Some(deadline);
                }
            })
            .await
            .map_err(conflict_on_status_change)?;

        tracing::info!(task_id = %id, "task updated");
        let view = self.view(&updated).await;
        self.events.publish(BoardEvent::TaskUpdated(view.clone()));
        Ok(view)
    }

    /// Claims an open task for the caller.
    ///
    /// # Errors
    ///
    /// [`ApiError::NotFound`], [`ApiError::InvalidState`] if the task is
    /// not open, [`ApiError::SelfClaim`] if the caller posted it, or
    /// [`ApiError::Conflict`] if another claim won the race.
    pub async fn claim(&self, caller: &User, id: &TaskId) -> Result<TaskView, ApiError> {
        let task = self.tasks.get(id).await.ok_or(ApiError::NotFound)?;
        if task.status != TaskStatus::Open {
            return Err(ApiError::InvalidState(
                "Task already claimed/completed".to_string(),
            ));
        }
        if task.requester == caller.id {
            return Err(ApiError::SelfClaim);
        }

        let helper = caller.id;
        let updated = self
            .tasks
            .update_if_status(id, TaskStatus::Open, |t| {
                t.helper = Some(helper);
                t.status = TaskStatus::Claimed;
            })
            .await
            .map_err(conflict_on_status_change)?;

        tracing::info!(task_id = %id, helper = %helper, "task claimed");
        let view = self.view(&updated).await;
        self.events.publish(BoardEvent::TaskClaimed(view.clone()));
        Ok(view)
    }

    /// Marks a claimed task completed. Either participant may do this.
    ///
    /// Completion requires a prior claim: an open task has no helper, so
    /// "the work is done" has no one to have done it. A requester who
    /// wants an unclaimed task gone deletes it instead.
    ///
    /// # Errors
    ///
    /// [`ApiError::NotFound`], [`ApiError::Authorization`] if the caller
    /// is neither requester nor helper, [`ApiError::InvalidState`] if the
    /// task is not claimed, or [`ApiError::Conflict`] on a lost race.
    pub async fn complete(&self, caller: &User, id: &TaskId) -> Result<TaskView, ApiError> {
        let task = self.tasks.get(id).await.ok_or(ApiError::NotFound)?;
        if task.requester != caller.id && task.helper != Some(caller.id) {
            return Err(ApiError::Authorization(
                "Not authorized to complete this task".to_string(),
            ));
        }
        if task.status != TaskStatus::Claimed {
            return Err(ApiError::InvalidState(
                "Only claimed tasks can be completed".to_string(),
            ));
        }

        let updated = self
            .tasks
            .update_if_status(id, TaskStatus::Claimed, |t| {
                t.status = TaskStatus::Completed;
            })
            .await
            .map_err(conflict_on_status_change)?;

        tracing::info!(task_id = %id, by = %caller.id, "task completed");
        let view = self.view(&updated).await;
        self.events.publish(BoardEvent::TaskCompleted(view.clone()));
        Ok(view)
    }

    /// Deletes a task. Only the requester may do this, at any status.
    ///
    /// # Errors
    ///
    /// [`ApiError::NotFound`] or [`ApiError::Authorization`] if the
    /// caller is not the requester.
    pub async fn delete(&self, caller: &User, id: &TaskId) -> Result<(), ApiError> {
        let task = self.tasks.get(id).await.ok_or(ApiError::NotFound)?;
        if task.requester != caller.id {
            return Err(ApiError::Authorization(
                "Not authorized to delete this task".to_string(),
            ));
        }

        // The task may have been deleted by a concurrent call in the
        // window since the read; removing nothing is then a NotFound.
        self.tasks.remove(id).await.ok_or(ApiError::NotFound)?;

        tracing::info!(task_id = %id, "task deleted");
        self.events.publish(BoardEvent::TaskDeleted(*id));
        Ok(())
    }

    /// The public feed: all non-completed tasks, newest first.
    pub async fn list(&self) -> Vec<TaskView> {
        let tasks = self.tasks.list_active().await;
        self.views(&tasks).await
    }

    /// Every task the caller posted or claimed, any status, newest first.
    pub async fn list_mine(&self, caller: &User) -> Vec<TaskView> {
        let tasks = self.tasks.list_involving(&caller.id).await;
        self.views(&tasks).await
    }

    /// Populates requester and helper profiles for display.
    async fn view(&self, task: &Task) -> TaskView {
        let requester = self.users.profile(&task.requester).await;
        let helper = match &task.helper {
            Some(id) => self.users.profile(id).await,
            None => None,
        };
        TaskView {
            id: task.id,
            title: task.title.clone(),
            description: task.description.clone(),
            category: task.category,
            status: task.status,
            location: task.location.clone(),
            deadline: task.deadline,
            requester,
            helper,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }

    async fn views(&self, tasks: &[Task]) -> Vec<TaskView> {
        let mut views = Vec::with_capacity(tasks.len());
        for task in tasks {
            views.push(self.view(task).await);
        }
        views
    }
}

/// Maps a lost compare-and-swap to the conflict the caller must retry.
fn conflict_on_status_change(err: StoreError) -> ApiError {
    match err {
        StoreError::NotFound => ApiError::NotFound,
        StoreError::StatusChanged { .. } => ApiError::Conflict,
    }
}

/// Validates a required title: present, non-empty, within the length cap.
fn validate_title(title: Option<String>) -> Result<String, ApiError> {
    match title {
        Some(t) if t.trim().is_empty() => {
            Err(ApiError::Validation("Please add a title".to_string()))
        }
        Some(t) if t.chars().count() > MAX_TITLE_LENGTH => Err(ApiError::Validation(format!(
            "Title cannot exceed {MAX_TITLE_LENGTH} chars"
        ))),
        Some(t) => Ok(t),
        None => Err(ApiError::Validation("Please add a title".to_string())),
    }
}

/// Parses a required category name against the fixed set.
fn parse_category(category: Option<String>) -> Result<Category, ApiError> {
    category
        .ok_or_else(|| ApiError::Validation("Please add a category".to_string()))?
        .parse()
        .map_err(|e: handup_proto::task::UnknownCategory| ApiError::Validation(e.to_string()))
}
