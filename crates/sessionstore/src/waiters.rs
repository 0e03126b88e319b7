//! Pending `wait_session` calls.

use ingest_core::{DeviceId, Session};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tokio::sync::oneshot;

struct Waiter {
    id: u64,
    tx: oneshot::Sender<Session>,
}

/// Waiters keyed by (device, path), owned by a shard.
#[derive(Default)]
pub(crate) struct Waiters {
    next_id: u64,
    pending: HashMap<(DeviceId, String), Vec<Waiter>>,
}

impl Waiters {
    pub fn register(&mut self, device_id: DeviceId, path: &str) -> (u64, oneshot::Receiver<Session>) {
        let (tx, rx) = oneshot::channel();
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);

        self.pending
            .entry((device_id, path.to_string()))
            .or_default()
            .push(Waiter { id, tx });

        (id, rx)
    }

    /// Completes every waiter at (device, path) with `session`.
    pub fn notify(&mut self, device_id: DeviceId, path: &str, session: &Session) -> usize {
        if self.pending.is_empty() {
            return 0;
        }

        let Some(waiters) = self.pending.remove(&(device_id, path.to_string())) else {
            return 0;
        };

        waiters
            .into_iter()
            .filter_map(|waiter| waiter.tx.send(session.clone()).ok())
            .count()
    }

    pub fn cancel(&mut self, device_id: DeviceId, path: &str, id: u64) {
        if let Entry::Occupied(mut waiters) = self.pending.entry((device_id, path.to_string())) {
            waiters.get_mut().retain(|waiter| waiter.id != id);
            if waiters.get().is_empty() {
                waiters.remove();
            }
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }
}
