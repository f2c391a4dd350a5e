//! Observer fan-out.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;
use tracing::warn;

use vhunter_core::{ObserverId, TaskEvent, TaskObserver};

/// Live observers behind their own reader/writer lock.
#[derive(Default)]
pub(crate) struct ObserverSet {
    next_id: AtomicU64,
    observers: RwLock<Vec<(ObserverId, Arc<dyn TaskObserver>)>>,
}

impl ObserverSet {
    pub async fn subscribe(&self, observer: Arc<dyn TaskObserver>) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.write().await.push((id, observer));
        id
    }

    pub async fn unsubscribe(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.write().await;
        let before = observers.len();
        observers.retain(|(oid, _)| *oid != id);
        observers.len() != before
    }

    /// Deliver `event` to everyone; observers that fail are dropped.
    pub async fn broadcast(&self, event: &TaskEvent) {
        let failed: Vec<ObserverId> = {
            let observers = self.observers.read().await;
            observers
                .iter()
                .filter_map(|(id, observer)| match observer.deliver(event) {
                    Ok(()) => None,
                    Err(e) => {
                        warn!(observer = %id, error = %e, event = event.event_type(), "removing observer");
                        Some(*id)
                    }
                })
                .collect()
        };
        if !failed.is_empty() {
            self.observers
                .write()
                .await
                .retain(|(id, _)| !failed.contains(id));
        }
    }

    pub async fn len(&self) -> usize {
        self.observers.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::Utc;
    use vhunter_core::ObserverError;

    use super::*;

    #[derive(Default)]
    struct Recording(Mutex<Vec<String>>);

    impl TaskObserver for Recording {
        fn deliver(&self, event: &TaskEvent) -> Result<(), ObserverError> {
            self.0.lock().unwrap().push(event.event_type().to_string());
            Ok(())
        }
    }

    struct Broken;

    impl TaskObserver for Broken {
        fn deliver(&self, _event: &TaskEvent) -> Result<(), ObserverError> {
            Err(ObserverError::Closed)
        }
    }

    #[tokio::test]
    async fn test_failing_observer_is_removed() {
        let set = ObserverSet::default();
        let good = Arc::new(Recording::default());
        set.subscribe(good.clone()).await;
        set.subscribe(Arc::new(Broken)).await;
        assert_eq!(set.len().await, 2);

        let event = TaskEvent::Cleared { updated: Utc::now() };
        set.broadcast(&event).await;
        set.broadcast(&event).await;

        assert_eq!(set.len().await, 1);
        assert_eq!(good.0.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let set = ObserverSet::default();
        let id = set.subscribe(Arc::new(Recording::default())).await;
        assert!(set.unsubscribe(id).await);
        assert!(!set.unsubscribe(id).await);
    }
}
