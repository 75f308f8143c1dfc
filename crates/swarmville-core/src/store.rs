use crate::task::Task;
use crate::SwarmResult;
use async_trait::async_trait;
use uuid::Uuid;

/// Keyed store of [`Task`] records.
///
/// Tasks are only ever replaced as whole values. `compare_and_replace`
/// succeeds when the stored revision still equals `expected_revision`, and
/// bumps the revision of the stored copy.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn insert(&self, task: Task) -> SwarmResult<()>;
    async fn get(&self, id: Uuid) -> SwarmResult<Option<Task>>;
    async fn list(&self) -> SwarmResult<Vec<Task>>;
    async fn compare_and_replace(&self, task: Task, expected_revision: u64) -> SwarmResult<bool>;

    /// Tasks owned by `user_id`, oldest first.
    async fn list_by_user(&self, user_id: &str) -> SwarmResult<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .list()
            .await?
            .into_iter()
            .filter(|t| t.user_id == user_id)
            .collect();
        tasks.sort_by_key(|t| t.created_at);
        Ok(tasks)
    }
}
