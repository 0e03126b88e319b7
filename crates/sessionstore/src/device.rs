//! Per-device session records.

use ingest_core::Session;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub(crate) struct SessionEntry {
    pub session: Session,
    pub expires_at: Instant,
}

impl SessionEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Sessions held by one device, sorted by expiry ascending.
///
/// Expired entries therefore always form a prefix of `entries`.
#[derive(Debug, Default)]
pub(crate) struct Device {
    entries: Vec<SessionEntry>,
}

impl Device {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sessions that have not expired yet.
    pub fn live_len(&self, now: Instant) -> usize {
        self.entries.len() - self.expired_prefix(now)
    }

    fn expired_prefix(&self, now: Instant) -> usize {
        self.entries.partition_point(|entry| !entry.is_live(now))
    }

    /// Index of the live session currently at `path`.
    pub fn position(&self, path: &str, now: Instant) -> Option<usize> {
        let start = self.expired_prefix(now);
        self.entries[start..]
            .iter()
            .position(|entry| entry.session.path() == path)
            .map(|i| start + i)
    }

    pub fn get(&self, path: &str, now: Instant) -> Option<&SessionEntry> {
        self.position(path, now).map(|i| &self.entries[i])
    }

    pub fn session(&self, index: usize) -> &Session {
        &self.entries[index].session
    }

    pub fn insert(&mut self, session: Session, expires_at: Instant) {
        let at = self
            .entries
            .partition_point(|entry| entry.expires_at <= expires_at);
        self.entries.insert(at, SessionEntry { session, expires_at });
    }

    /// Replaces the session at `index` and moves it to its new expiry slot.
    pub fn replace(&mut self, index: usize, session: Session, expires_at: Instant) {
        self.entries.remove(index);
        self.insert(session, expires_at);
    }

    /// Expiry at the configured percentile of the sorted list.
    pub fn expiry_cutoff(&self, percentile: u8) -> Option<Instant> {
        if self.entries.is_empty() {
            return None;
        }
        let index = (self.entries.len() - 1) * usize::from(percentile) / 100;
        Some(self.entries[index].expires_at)
    }

    /// Removes every expired session, returning them.
    pub fn remove_expired(&mut self, now: Instant) -> Vec<Session> {
        let expired = self.expired_prefix(now);
        self.entries
            .drain(..expired)
            .map(|entry| entry.session)
            .collect()
    }
}
