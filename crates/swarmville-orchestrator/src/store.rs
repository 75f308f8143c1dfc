use async_trait::async_trait;
use std::collections::HashMap;
use swarmville_core::{SwarmError, SwarmResult, Task, TaskStore};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Process-local [`TaskStore`].
///
/// Readers get clones, so a reader never observes a half-applied mutation.
#[derive(Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<Uuid, Task>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn insert(&self, task: Task) -> SwarmResult<()> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&task.id) {
            return Err(SwarmError::Store(format!("task {} already exists", task.id)));
        }
        tasks.insert(task.id, task);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> SwarmResult<Option<Task>> {
        Ok(self.tasks.read().await.get(&id).cloned())
    }

    async fn list(&self) -> SwarmResult<Vec<Task>> {
        Ok(self.tasks.read().await.values().cloned().collect())
    }

    async fn compare_and_replace(&self, mut task: Task, expected_revision: u64) -> SwarmResult<bool> {
        let mut tasks = self.tasks.write().await;
        let Some(current) = tasks.get_mut(&task.id) else {
            return Err(SwarmError::task_not_found(task.id));
        };
        if current.revision != expected_revision {
            return Ok(false);
        }
        task.revision = expected_revision + 1;
        *current = task;
        Ok(true)
    }
}
