//! In-memory stores for users and tasks.
//!
//! Both stores are `RwLock<HashMap>` maps; tasks additionally expose an
//! atomic conditional write, [`TaskStore::update_if_status`], which is the
//! only way task state is mutated. Holding the write lock across the
//! status check and the mutation is what makes concurrent claims on the
//! same task resolve to exactly one winner.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use handup_proto::task::{Task, TaskId, TaskStatus};
use handup_proto::user::{User, UserId, UserProfile};

/// Errors from user store operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UserStoreError {
    /// Another account already uses this email address.
    #[error("email already registered")]
    DuplicateEmail,
}

/// In-memory user directory, keyed by id with a unique-email constraint.
pub struct UserStore {
    users: RwLock<HashMap<UserId, User>>,
}

impl Default for UserStore {
    fn default() -> Self {
        Self::new()
    }
}

impl UserStore {
    /// Creates an empty user store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
        }
    }

    /// Inserts a new user, enforcing email uniqueness (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`UserStoreError::DuplicateEmail`] if the email is taken.
    pub async fn insert(&self, user: User) -> Result<(), UserStoreError> {
        let mut users = self.users.write().await;
        let email_lower = user.email.to_lowercase();
        if users.values().any(|u| u.email.to_lowercase() == email_lower) {
            return Err(UserStoreError::DuplicateEmail);
        }
        users.insert(user.id, user);
        Ok(())
    }

    /// Looks up a user by id.
    pub async fn get(&self, id: &UserId) -> Option<User> {
        let users = self.users.read().await;
        users.get(id).cloned()
    }

    /// Looks up a user by email (case-insensitive).
    pub async fn find_by_email(&self, email: &str) -> Option<User> {
        let users = self.users.read().await;
        let email_lower = email.to_lowercase();
        users
            .values()
            .find(|u| u.email.to_lowercase() == email_lower)
            .cloned()
    }

    /// Returns the public profile for a user, if they exist.
    pub async fn profile(&self, id: &UserId) -> Option<UserProfile> {
        let users = self.users.read().await;
        users.get(id).map(UserProfile::from)
    }
}

/// Errors from conditional task store operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    /// No task with the given id exists.
    #[error("task not found")]
    NotFound,
    /// The task's status no longer matches what the caller observed.
    #[error("task status changed: expected {expected}, found {actual}")]
    StatusChanged {
        /// Status the caller's validation was based on.
        expected: TaskStatus,
        /// Status actually found at write time.
        actual: TaskStatus,
    },
}

/// In-memory task store with compare-and-swap mutation on status.
pub struct TaskStore {
    tasks: RwLock<HashMap<TaskId, Task>>,
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskStore {
    /// Creates an empty task store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
        }
    }

    /// Inserts a newly created task.
    pub async fn insert(&self, task: Task) {
        let mut tasks = self.tasks.write().await;
        tasks.insert(task.id, task);
    }

    /// Looks up a task by id.
    pub async fn get(&self, id: &TaskId) -> Option<Task> {
        let tasks = self.tasks.read().await;
        tasks.get(id).cloned()
    }

    /// Removes a task, returning it if it existed.
    pub async fn remove(&self, id: &TaskId) -> Option<Task> {
        let mut tasks = self.tasks.write().await;
        tasks.remove(id)
    }

    /// Applies `apply` to the task only if its current status equals
    /// `expected`, bumping `updated_at`. The check and the mutation happen
    /// under one write lock, so a concurrent writer cannot slip between
    /// them.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the task is absent, or
    /// [`StoreError::StatusChanged`] if the status moved since the caller
    /// last read it.
    pub async fn update_if_status<F>(
        &self,
        id: &TaskId,
        expected: TaskStatus,
        apply: F,
    ) -> Result<Task, StoreError>
    where
        F: FnOnce(&mut Task),
    {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(id).ok_or(StoreError::NotFound)?;
        if task.status != expected {
            return Err(StoreError::StatusChanged {
                expected,
                actual: task.status,
            });
        }
        apply(task);
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    /// All tasks that are not completed, newest first.
    pub async fn list_active(&self) -> Vec<Task> {
        let tasks = self.tasks.read().await;
        let mut active: Vec<Task> = tasks
            .values()
            .filter(|t| t.status != TaskStatus::Completed)
            .cloned()
            .collect();
        drop(tasks);
        sort_newest_first(&mut active);
        active
    }

    /// All tasks where the user is requester or helper, any status,
    /// newest first.
    pub async fn list_involving(&self, user: &UserId) -> Vec<Task> {
        let tasks = self.tasks.read().await;
        let mut mine: Vec<Task> = tasks
            .values()
            .filter(|t| t.requester == *user || t.helper == Some(*user))
            .cloned()
            .collect();
        drop(tasks);
        sort_newest_first(&mut mine);
        mine
    }
}

/// Orders tasks by creation time descending; ties broken by id (v7 ids
/// are themselves time-ordered) so the order is deterministic.
fn sort_newest_first(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.as_uuid().cmp(a.id.as_uuid()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use handup_proto::task::Category;

    fn make_user(name: &str, email: &str) -> User {
        let now = Utc::now();
        User {
            id: UserId::new(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn make_task(requester: UserId, title: &str) -> Task {
        let now = Utc::now();
        Task {
            id: TaskId::new(),
            title: title.to_string(),
            description: "desc".to_string(),
            category: Category::Errands,
            status: TaskStatus::Open,
            location: None,
            deadline: None,
            requester,
            helper: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn duplicate_email_rejected_case_insensitive() {
        let store = UserStore::new();
        store
            .insert(make_user("Alice", "alice@example.com"))
            .await
            .unwrap();

        let result = store.insert(make_user("Imposter", "ALICE@example.com")).await;
        assert_eq!(result, Err(UserStoreError::DuplicateEmail));
    }

    #[tokio::test]
    async fn find_by_email_ignores_case() {
        let store = UserStore::new();
        let user = make_user("Alice", "alice@example.com");
        let id = user.id;
        store.insert(user).await.unwrap();

        let found = store.find_by_email("Alice@Example.COM").await.unwrap();
        assert_eq!(found.id, id);
        assert!(store.find_by_email("nobody@example.com").await.is_none());
    }

    #[tokio::test]
    async fn profile_for_unknown_user_is_none() {
        let store = UserStore::new();
        assert!(store.profile(&UserId::new()).await.is_none());
    }

    #[tokio::test]
    async fn update_if_status_applies_and_bumps_updated_at() {
        let store = TaskStore::new();
        let task = make_task(UserId::new(), "t");
        let id = task.id;
        let before = task.updated_at;
        store.insert(task).await;

        let helper = UserId::new();
        let updated = store
            .update_if_status(&id, TaskStatus::Open, |t| {
                t.helper = Some(helper);
                t.status = TaskStatus::Claimed;
            })
            .await
            .unwrap();

        assert_eq!(updated.status, TaskStatus::Claimed);
        assert_eq!(updated.helper, Some(helper));
        assert!(updated.updated_at >= before);
    }

    #[tokio::test]
    async fn update_if_status_rejects_stale_expectation() {
        let store = TaskStore::new();
        let mut task = make_task(UserId::new(), "t");
        task.status = TaskStatus::Claimed;
        task.helper = Some(UserId::new());
        let id = task.id;
        store.insert(task).await;

        let result = store
            .update_if_status(&id, TaskStatus::Open, |t| {
                t.status = TaskStatus::Completed;
            })
            .await;

        assert_eq!(
            result.unwrap_err(),
            StoreError::StatusChanged {
                expected: TaskStatus::Open,
                actual: TaskStatus::Claimed,
            }
        );
        // The task is untouched.
        let task = store.get(&id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Claimed);
    }

    #[tokio::test]
    async fn update_if_status_unknown_task_is_not_found() {
        let store = TaskStore::new();
        let result = store
            .update_if_status(&TaskId::new(), TaskStatus::Open, |_| {})
            .await;
        assert_eq!(result.unwrap_err(), StoreError::NotFound);
    }

    #[tokio::test]
    async fn concurrent_claims_have_one_winner() {
        let store = std::sync::Arc::new(TaskStore::new());
        let task = make_task(UserId::new(), "contested");
        let id = task.id;
        store.insert(task).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = std::sync::Arc::clone(&store);
            let claimer = UserId::new();
            handles.push(tokio::spawn(async move {
                store
                    .update_if_status(&id, TaskStatus::Open, |t| {
                        t.helper = Some(claimer);
                        t.status = TaskStatus::Claimed;
                    })
                    .await
            }));
        }

        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
    }

    #[tokio::test]
    async fn list_active_excludes_completed_and_sorts_newest_first() {
        let store = TaskStore::new();
        let requester = UserId::new();

        let first = make_task(requester, "first");
        let mut done = make_task(requester, "done");
        done.status = TaskStatus::Completed;
        done.helper = Some(UserId::new());
        let second = make_task(requester, "second");

        store.insert(first).await;
        store.insert(done).await;
        store.insert(second).await;

        let active = store.list_active().await;
        assert_eq!(active.len(), 2);
        // Newest first: "second" was created after "first".
        assert_eq!(active[0].title, "second");
        assert_eq!(active[1].title, "first");
    }

    #[tokio::test]
    async fn list_involving_matches_requester_and_helper_any_status() {
        let store = TaskStore::new();
        let alice = UserId::new();
        let bob = UserId::new();

        let posted = make_task(alice, "posted by alice");
        let mut helping = make_task(bob, "alice helping");
        helping.status = TaskStatus::Completed;
        helping.helper = Some(alice);
        let unrelated = make_task(bob, "unrelated");

        store.insert(posted).await;
        store.insert(helping).await;
        store.insert(unrelated).await;

        let mine = store.list_involving(&alice).await;
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|t| t.requester == alice || t.helper == Some(alice)));
    }

    #[tokio::test]
    async fn remove_returns_task_once() {
        let store = TaskStore::new();
        let task = make_task(UserId::new(), "t");
        let id = task.id;
        store.insert(task).await;

        assert!(store.remove(&id).await.is_some());
        assert!(store.remove(&id).await.is_none());
        assert!(store.get(&id).await.is_none());
    }
}
