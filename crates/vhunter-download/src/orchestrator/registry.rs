//! In-memory task registry.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use vhunter_core::{Task, TaskId};

/// A task and the token that aborts its in-flight work.
#[derive(Debug)]
pub(crate) struct TaskEntry {
    pub task: Task,
    pub cancel: CancellationToken,
}

/// Identifier → task map behind one reader/writer lock.
#[derive(Debug, Default)]
pub(crate) struct TaskRegistry {
    tasks: RwLock<HashMap<TaskId, TaskEntry>>,
}

impl TaskRegistry {
    pub async fn insert(&self, task: Task, cancel: CancellationToken) {
        self.tasks
            .write()
            .await
            .insert(task.id.clone(), TaskEntry { task, cancel });
    }

    pub async fn get(&self, id: &TaskId) -> Option<Task> {
        self.tasks.read().await.get(id).map(|e| e.task.clone())
    }

    /// All tasks, oldest first.
    pub async fn list(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .tasks
            .read()
            .await
            .values()
            .map(|e| e.task.clone())
            .collect();
        tasks.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
        tasks
    }

    /// Mutate one entry under the write lock. `None` when the id is unknown.
    pub async fn update<F, R>(&self, id: &TaskId, f: F) -> Option<R>
    where
        F: FnOnce(&mut TaskEntry) -> R,
    {
        self.tasks.write().await.get_mut(id).map(f)
    }

    /// Remove every task; returns how many were removed.
    pub async fn clear(&self) -> usize {
        let mut tasks = self.tasks.write().await;
        let removed = tasks.len();
        tasks.clear();
        removed
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use vhunter_core::TaskStatus;

    use super::*;

    #[tokio::test]
    async fn test_update_and_clear() {
        let registry = TaskRegistry::default();
        let id = TaskId::from("a");
        registry.insert(Task::new(id.clone()), CancellationToken::new()).await;

        let moved = registry
            .update(&id, |e| e.task.transition_to(TaskStatus::Downloading).is_ok())
            .await;
        assert_eq!(moved, Some(true));
        assert_eq!(registry.get(&id).await.unwrap().status, TaskStatus::Downloading);
        assert!(registry.update(&TaskId::from("zzz"), |_| ()).await.is_none());

        assert_eq!(registry.clear().await, 1);
        assert_eq!(registry.clear().await, 0);
        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test]
    async fn test_list_is_ordered_by_creation() {
        let registry = TaskRegistry::default();
        let first = Task::new(TaskId::from("z"));
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let second = Task::new(TaskId::from("a"));
        registry.insert(second, CancellationToken::new()).await;
        registry.insert(first, CancellationToken::new()).await;
        let ids: Vec<String> = registry.list().await.iter().map(|t| t.id.to_string()).collect();
        assert_eq!(ids, ["z", "a"]);
    }
}
