//! Per-user single-flight lock for retraining.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::analytics::UserId;

/// Lock for one user plus the number of requests holding or queued on it.
#[derive(Debug, Default)]
struct Slot {
    lock: Arc<AsyncMutex<()>>,
    holders: usize,
}

#[derive(Debug, Default)]
pub struct RetrainGate {
    slots: Mutex<HashMap<UserId, Slot>>,
}

impl RetrainGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other request is retraining `user_id`.
    ///
    /// Dropping the returned future while queued gives up the place in line and frees the slot
    /// once nobody else holds it.
    pub async fn acquire(&self, user_id: &UserId) -> RetrainPermit<'_> {
        let lock = {
            let mut slots = self.lock_slots();
            let slot = slots.entry(user_id.clone()).or_default();
            slot.holders += 1;
            Arc::clone(&slot.lock)
        };
        let mut queued = QueuedSlot { gate: self, user_id, armed: true };

        let (guard, waited) = match Arc::clone(&lock).try_lock_owned() {
            Ok(guard) => (guard, false),
            Err(_) => (lock.lock_owned().await, true),
        };
        queued.armed = false;

        RetrainPermit { gate: self, user_id: user_id.clone(), guard: Some(guard), waited }
    }

    /// Users with a retrain in flight or queued.
    pub fn in_flight(&self) -> usize {
        self.lock_slots().len()
    }

    fn lock_slots(&self) -> MutexGuard<'_, HashMap<UserId, Slot>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn release(&self, user_id: &UserId) {
        let mut slots = self.lock_slots();
        let Some(slot) = slots.get_mut(user_id) else {
            return;
        };
        slot.holders = slot.holders.saturating_sub(1);
        if slot.holders == 0 {
            slots.remove(user_id);
        }
    }
}

/// Releases a queued caller's claim when `acquire` is cancelled before the lock is granted.
struct QueuedSlot<'a> {
    gate: &'a RetrainGate,
    user_id: &'a UserId,
    armed: bool,
}

impl Drop for QueuedSlot<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.gate.release(self.user_id);
        }
    }
}

pub struct RetrainPermit<'a> {
    gate: &'a RetrainGate,
    user_id: UserId,
    guard: Option<OwnedMutexGuard<()>>,
    waited: bool,
}

impl RetrainPermit<'_> {
    /// True when another request held the gate first.
    pub fn waited(&self) -> bool {
        self.waited
    }
}

impl Drop for RetrainPermit<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.gate.release(&self.user_id);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::RetrainGate;
    use crate::domain::analytics::UserId;

    #[tokio::test]
    async fn first_holder_does_not_wait_and_slot_is_released() {
        let gate = RetrainGate::new();
        let user = UserId("u-1".to_string());

        {
            let permit = gate.acquire(&user).await;
            assert!(!permit.waited());
            assert_eq!(gate.in_flight(), 1);
        }

        assert_eq!(gate.in_flight(), 0);
    }

    #[tokio::test]
    async fn second_caller_for_same_user_waits_for_the_first() {
        let gate = Arc::new(RetrainGate::new());
        let user = UserId("u-1".to_string());

        let first = gate.acquire(&user).await;

        let waiter = {
            let gate = Arc::clone(&gate);
            let user = user.clone();
            tokio::spawn(async move { gate.acquire(&user).await.waited() })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished(), "second caller should block while the first holds");

        drop(first);
        let waited = waiter.await.expect("join waiter");
        assert!(waited);
        assert_eq!(gate.in_flight(), 0);
    }

    #[tokio::test]
    async fn different_users_do_not_block_each_other() {
        let gate = RetrainGate::new();

        let first = gate.acquire(&UserId("u-1".to_string())).await;
        let second = gate.acquire(&UserId("u-2".to_string())).await;

        assert!(!first.waited());
        assert!(!second.waited());
        assert_eq!(gate.in_flight(), 2);
    }

    #[tokio::test]
    async fn cancelled_waiter_frees_its_slot_after_the_holder_leaves() {
        let gate = Arc::new(RetrainGate::new());
        let user = UserId("u-1".to_string());

        let first = gate.acquire(&user).await;
        let waiter = {
            let gate = Arc::clone(&gate);
            let user = user.clone();
            tokio::spawn(async move { gate.acquire(&user).await.waited() })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(first);
        waiter.abort();
        let _ = waiter.await;

        assert_eq!(gate.in_flight(), 0);
    }

    #[tokio::test]
    async fn cancelled_waiter_leaves_the_holder_in_place() {
        let gate = Arc::new(RetrainGate::new());
        let user = UserId("u-1".to_string());

        let first = gate.acquire(&user).await;
        let waiter = {
            let gate = Arc::clone(&gate);
            let user = user.clone();
            tokio::spawn(async move { gate.acquire(&user).await.waited() })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        waiter.abort();
        assert!(waiter.await.is_err(), "queued waiter should have been cancelled");
        assert_eq!(gate.in_flight(), 1);

        drop(first);
        assert_eq!(gate.in_flight(), 0);
        let again = gate.acquire(&user).await;
        assert!(!again.waited());
    }
}
