// In-memory reference adapter for the PlayerStore port. A production
// deployment swaps this for a durable collaborator; this adapter exists so
// the crate is runnable and testable standalone.
//
// Per-key locking fails loudly if a caller attempts reentrant acquisition.
// Reentrancy here means the *same async call stack* re-entering a lock it
// already holds, not ordinary contention between independent settlements —
// that case is handled by ordinary mutex queuing.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::errors::PlayerStoreError;
use crate::domain::player::{PlayerRecord, SettlementDelta};
use crate::domain::ports::PlayerStore;

tokio::task_local! {
    static HELD_LOCKS: std::cell::RefCell<HashSet<String>>;
}

pub struct InMemoryPlayerStore {
    records: Mutex<HashMap<String, PlayerRecord>>,
    key_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl InMemoryPlayerStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            key_locks: Mutex::new(HashMap::new()),
        }
    }

    pub async fn seed(&self, record: PlayerRecord) {
        self.records.lock().await.insert(record.id.clone(), record);
    }

    async fn lock_for(&self, player_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.key_locks.lock().await;
        locks
            .entry(player_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Runs `f` while holding the per-player lock. Panics if the current
    /// async task already holds this player's lock.
    async fn with_player_lock<F, Fut, R>(&self, player_id: &str, f: F) -> R
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = R>,
    {
        let already_held = HELD_LOCKS
            .try_with(|held| held.borrow().contains(player_id))
            .unwrap_or(false);
        if already_held {
            panic!("reentrant lock acquisition on player {player_id}");
        }

        let lock = self.lock_for(player_id).await;
        let _guard = lock.lock().await;

        let body = async {
            HELD_LOCKS.with(|held| held.borrow_mut().insert(player_id.to_string()));
            let result = f().await;
            HELD_LOCKS.with(|held| held.borrow_mut().remove(player_id));
            result
        };

        if HELD_LOCKS.try_with(|_| ()).is_ok() {
            body.await
        } else {
            HELD_LOCKS.scope(std::cell::RefCell::new(HashSet::new()), body).await
        }
    }
}

impl Default for InMemoryPlayerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlayerStore for InMemoryPlayerStore {
    async fn get(&self, player_id: &str) -> Result<PlayerRecord, PlayerStoreError> {
        self.records
            .lock()
            .await
            .get(player_id)
            .cloned()
            .ok_or_else(|| PlayerStoreError::NotFound(player_id.to_string()))
    }

    async fn apply_settlement(
        &self,
        player_id: &str,
        delta: SettlementDelta,
    ) -> Result<PlayerRecord, PlayerStoreError> {
        let player_id_owned = player_id.to_string();
        self.with_player_lock(player_id, || async {
            let mut records = self.records.lock().await;
            let record = records
                .get_mut(&player_id_owned)
                .ok_or_else(|| PlayerStoreError::NotFound(player_id_owned.clone()))?;
            record.trophies += delta.trophy_change;
            if let Some(rating) = delta.rating {
                record.rating = rating;
            }
            record.extra["gold"] = serde_json::Value::from(
                record.extra.get("gold").and_then(|v| v.as_i64()).unwrap_or(0) + delta.gold_earned,
            );
            Ok(record.clone())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str) -> PlayerRecord {
        PlayerRecord {
            id: id.to_string(),
            username: id.to_string(),
            trophies: 1000,
            rating: 1000,
            deck: vec!["card".to_string()],
            current_deck: 0,
            banned: false,
            clan_id: None,
            extra: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn apply_settlement_updates_trophies_and_rating() {
        let store = InMemoryPlayerStore::new();
        store.seed(sample("p1")).await;

        let updated = store
            .apply_settlement(
                "p1",
                SettlementDelta {
                    trophy_change: 45,
                    rating: Some(1016),
                    gold_earned: 110,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.trophies, 1045);
        assert_eq!(updated.rating, 1016);
    }

    #[tokio::test]
    async fn concurrent_settlements_on_different_players_do_not_block_each_other() {
        let store = Arc::new(InMemoryPlayerStore::new());
        store.seed(sample("a")).await;
        store.seed(sample("b")).await;

        let s1 = store.clone();
        let s2 = store.clone();
        let (r1, r2) = tokio::join!(
            s1.apply_settlement("a", SettlementDelta { trophy_change: 10, rating: None, gold_earned: 0 }),
            s2.apply_settlement("b", SettlementDelta { trophy_change: -5, rating: None, gold_earned: 0 }),
        );
        assert!(r1.is_ok());
        assert!(r2.is_ok());
    }

    #[tokio::test]
    #[should_panic(expected = "reentrant lock acquisition")]
    async fn reentrant_acquisition_panics() {
        let store = InMemoryPlayerStore::new();
        store.seed(sample("p1")).await;

        store
            .with_player_lock("p1", || async {
                store
                    .with_player_lock("p1", || async { 1 })
                    .await
            })
            .await;
    }
}
