//! Observable mirror of the orchestrator's latest [`FetchState`].

use tokio::sync::watch;

use crate::model::FetchState;

/// Single-writer holder of the latest state. Only the orchestrator publishes;
/// any number of readers subscribe.
#[derive(Debug)]
pub struct QueryStore {
    tx: watch::Sender<FetchState>,
}

impl Default for QueryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(FetchState::Idle);
        Self { tx }
    }

    pub(crate) fn publish(&self, state: FetchState) {
        self.tx.send_replace(state);
    }

    pub fn current(&self) -> FetchState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> StateSubscription {
        StateSubscription {
            rx: self.tx.subscribe(),
        }
    }
}

/// Read handle on a [`QueryStore`].
#[derive(Debug, Clone)]
pub struct StateSubscription {
    rx: watch::Receiver<FetchState>,
}

impl StateSubscription {
    pub fn current(&self) -> FetchState {
        self.rx.borrow().clone()
    }

    /// Wait for the next published state. Returns `None` once the store is gone.
    ///
    /// Intermediate states published between two calls are coalesced; only
    /// the latest is returned.
    pub async fn changed(&mut self) -> Option<FetchState> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Query;

    #[test]
    fn starts_idle() {
        let store = QueryStore::new();
        assert_eq!(store.current(), FetchState::Idle);
        assert_eq!(store.subscribe().current(), FetchState::Idle);
    }

    #[tokio::test]
    async fn subscribers_see_published_state() {
        let store = QueryStore::new();
        let mut first = store.subscribe();
        let mut second = store.subscribe();

        let loading = FetchState::Loading(Query::by_name("Rome"));
        store.publish(loading.clone());

        assert_eq!(first.changed().await, Some(loading.clone()));
        assert_eq!(second.changed().await, Some(loading.clone()));
        assert_eq!(store.current(), loading);
    }

    #[tokio::test]
    async fn changed_returns_none_after_store_dropped() {
        let store = QueryStore::new();
        let mut sub = store.subscribe();
        drop(store);

        assert_eq!(sub.changed().await, None);
    }
}
