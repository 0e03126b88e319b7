//! Sharded in-memory session store.

use ingest_core::{random_visitor_id, DeviceId, PageUri, ReferrerUri, Result, Session};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use validator::Validate;

use crate::config::SessionStoreConfig;
use crate::device::Device;
use crate::metrics::SessionStoreMetrics;
use crate::waiters::Waiters;

/// Result of [`SessionStore::add_pageview`].
#[derive(Debug, Clone, PartialEq)]
pub enum PageviewMatch {
    /// The session navigated from the referrer, now at the new page.
    Found(Session),
    /// No session matched. Carries a fresh, uninserted session for the page.
    Missing(Session),
}

impl PageviewMatch {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn into_session(self) -> Session {
        match self {
            Self::Found(session) | Self::Missing(session) => session,
        }
    }
}

/// Outcome of one garbage collection cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcReport {
    pub sessions_expired: u64,
    pub devices_deleted: u64,
}

#[derive(Default)]
struct Shard {
    devices: HashMap<DeviceId, Device>,
    waiters: Waiters,
}

/// Concurrent store of ephemeral sessions keyed by device and current path.
///
/// Devices are spread over independently locked shards; all operations on
/// one device go through the same shard lock.
pub struct SessionStore {
    config: SessionStoreConfig,
    shards: Box<[RwLock<Shard>]>,
    metrics: Arc<SessionStoreMetrics>,
}

impl SessionStore {
    pub fn new(config: SessionStoreConfig) -> Result<Self> {
        config.validate()?;

        let shards = (0..config.shards).map(|_| RwLock::new(Shard::default())).collect();

        info!(
            shards = config.shards,
            ttl_secs = config.session_inactive_ttl_secs,
            percentile = config.device_expiry_percentile,
            max_sessions_per_visitor = config.max_sessions_per_visitor,
            "Created session store"
        );

        Ok(Self {
            config,
            shards,
            metrics: Arc::new(SessionStoreMetrics::new()),
        })
    }

    pub fn config(&self) -> &SessionStoreConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<SessionStoreMetrics> {
        self.metrics.clone()
    }

    fn shard(&self, device_id: DeviceId) -> &RwLock<Shard> {
        let index = device_id.as_u64() % self.shards.len() as u64;
        &self.shards[index as usize]
    }

    fn expiry_from(&self, now: Instant) -> Instant {
        now + self.config.session_inactive_ttl()
    }

    /// Inserts a new session under its current path.
    ///
    /// Returns `false` when the device already holds the maximum number of
    /// live sessions.
    pub fn insert_session(&self, device_id: DeviceId, session: Session) -> bool {
        let now = Instant::now();
        let expires_at = self.expiry_from(now);

        let mut guard = self.shard(device_id).write();
        let shard = &mut *guard;

        let new_device = !shard.devices.contains_key(&device_id);
        let device = shard.devices.entry(device_id).or_default();
        if device.live_len(now) >= self.config.max_sessions_per_visitor {
            debug!(device_id = %device_id, "Device session limit reached");
            return false;
        }

        device.insert(session.clone(), expires_at);
        let woken = shard.waiters.notify(device_id, session.path(), &session);
        drop(guard);

        self.metrics.sessions_inserted.inc();
        if new_device {
            self.metrics.devices_inserted.inc();
        }

        debug!(
            device_id = %device_id,
            path = session.path(),
            session_uuid = %session.session_uuid,
            woken = woken,
            "Inserted session"
        );
        true
    }

    /// Advances the session found at the referrer's path to `page_uri`.
    pub fn add_pageview(
        &self,
        device_id: DeviceId,
        referrer_uri: &ReferrerUri,
        page_uri: &PageUri,
    ) -> PageviewMatch {
        let missing = || {
            PageviewMatch::Missing(Session::new(
                page_uri.clone(),
                referrer_uri.clone(),
                random_visitor_id(),
            ))
        };

        let Some(referrer_path) = referrer_uri.path() else {
            return missing();
        };

        let now = Instant::now();
        let mut guard = self.shard(device_id).write();
        let shard = &mut *guard;

        let Some(device) = shard.devices.get_mut(&device_id) else {
            return missing();
        };
        let Some(index) = device.position(referrer_path, now) else {
            return missing();
        };

        let Some(session) = device.session(index).next_pageview(page_uri.clone()) else {
            warn!(
                device_id = %device_id,
                session_uuid = %device.session(index).session_uuid,
                "Session pageview counter exhausted, starting a new session"
            );
            return missing();
        };

        device.replace(index, session.clone(), self.expiry_from(now));
        shard.waiters.notify(device_id, session.path(), &session);

        PageviewMatch::Found(session)
    }

    /// Replaces the visitor id of the live session at device and path.
    pub fn identify_session(
        &self,
        device_id: DeviceId,
        page_uri: &PageUri,
        visitor_id: impl Into<String>,
    ) -> Option<Session> {
        let now = Instant::now();
        let mut guard = self.shard(device_id).write();

        let device = guard.devices.get_mut(&device_id)?;
        let index = device.position(page_uri.path(), now)?;

        let mut session = device.session(index).clone();
        session.visitor_id = visitor_id.into();
        device.replace(index, session.clone(), self.expiry_from(now));

        Some(session)
    }

    /// Live session at device and path, without waiting.
    pub fn get_session(&self, device_id: DeviceId, page_uri: &PageUri) -> Option<Session> {
        let now = Instant::now();
        let shard = self.shard(device_id).read();
        shard
            .devices
            .get(&device_id)?
            .get(page_uri.path(), now)
            .map(|entry| entry.session.clone())
    }

    /// Waits up to `timeout` for a session to appear at device and path.
    ///
    /// Returns immediately if one is already there. Dropping the returned
    /// future releases the registration.
    pub async fn wait_session(
        &self,
        device_id: DeviceId,
        page_uri: &PageUri,
        timeout: Duration,
    ) -> Option<Session> {
        let path = page_uri.path();

        let (id, rx) = {
            let mut shard = self.shard(device_id).write();
            let now = Instant::now();
            if let Some(entry) = shard.devices.get(&device_id).and_then(|d| d.get(path, now)) {
                return Some(entry.session.clone());
            }
            if timeout.is_zero() {
                return None;
            }
            shard.waiters.register(device_id, path)
        };

        let _registration = WaitRegistration::new(self, device_id, path, id);

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(session)) => Some(session),
            _ => {
                debug!(device_id = %device_id, path = path, "Timed out waiting for session");
                None
            }
        }
    }

    /// Number of devices currently tracked.
    pub fn device_count(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().devices.len()).sum()
    }

    /// Sessions held by a device, including expired ones not yet collected.
    pub fn device_session_count(&self, device_id: DeviceId) -> usize {
        self.shard(device_id)
            .read()
            .devices
            .get(&device_id)
            .map_or(0, Device::len)
    }

    /// Runs one garbage collection cycle over every shard.
    pub fn collect_garbage(&self) -> GcReport {
        let started = Instant::now();
        let now = started;
        let percentile = self.config.device_expiry_percentile;
        let due = |device: &Device| device.expiry_cutoff(percentile).is_some_and(|cutoff| cutoff <= now);

        let mut report = GcReport::default();

        for shard in self.shards.iter() {
            let candidates: Vec<DeviceId> = {
                let shard = shard.read();
                shard
                    .devices
                    .iter()
                    .filter_map(|(id, device)| due(device).then_some(*id))
                    .collect()
            };

            if candidates.is_empty() {
                continue;
            }

            let mut shard = shard.write();
            for device_id in candidates {
                let Some(device) = shard.devices.get_mut(&device_id) else {
                    continue;
                };
                if !due(&*device) {
                    continue;
                }

                for session in device.remove_expired(now) {
                    report.sessions_expired += 1;
                    self.metrics
                        .sessions_pageviews
                        .observe(u64::from(session.pageview_count));
                }

                if device.is_empty() {
                    shard.devices.remove(&device_id);
                    report.devices_deleted += 1;
                }
            }
        }

        self.metrics.sessions_expired.inc_by(report.sessions_expired);
        self.metrics.devices_deleted.inc_by(report.devices_deleted);
        self.metrics.gc_cycles.inc();
        self.metrics
            .gc_cycles_duration_ms
            .observe(started.elapsed().as_millis() as u64);

        report
    }

    /// Spawns the periodic garbage collector.
    pub fn start_gc(self: Arc<Self>) -> JoinHandle<()> {
        let interval = self.config.gc_interval();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let report = self.collect_garbage();
                if report.sessions_expired > 0 {
                    debug!(
                        sessions_expired = report.sessions_expired,
                        devices_deleted = report.devices_deleted,
                        "Session garbage collection"
                    );
                }
            }
        })
    }
}

/// Removes a waiter from its shard when the wait ends for any reason.
struct WaitRegistration<'a> {
    store: &'a SessionStore,
    device_id: DeviceId,
    path: &'a str,
    id: u64,
}

impl<'a> WaitRegistration<'a> {
    fn new(store: &'a SessionStore, device_id: DeviceId, path: &'a str, id: u64) -> Self {
        store.metrics.sessions_wait.inc();
        Self {
            store,
            device_id,
            path,
            id,
        }
    }
}

impl Drop for WaitRegistration<'_> {
    fn drop(&mut self) {
        self.store
            .shard(self.device_id)
            .write()
            .waiters
            .cancel(self.device_id, self.path, self.id);
        self.store.metrics.sessions_wait.dec();
    }
}
