//! Cookie-less device fingerprints.
//!
//! A device is identified by the xxh3 hash of a salt followed by its user
//! agent, IP address and the visited host. That salt is held for the life
//! of the process.
//! Derived visitor ids are keyed with a salt rotated every UTC day, so they
//! cannot be correlated across days.

use chrono::{NaiveDate, Utc};
use parking_lot::RwLock;
use tracing::info;
use uuid::Uuid;
use xxhash_rust::xxh3::Xxh3;

/// Random hashing key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Salt([u8; 16]);

impl Salt {
    pub fn random() -> Self {
        Self(Uuid::new_v4().into_bytes())
    }

    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }
}

impl std::fmt::Debug for Salt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Salt(..)")
    }
}

/// Identifier of a device, stable for one salt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(u64);

impl DeviceId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// xxh3 of the salt followed by each part, parts separated by a zero byte.
fn salted_hash(salt: &Salt, parts: &[&[u8]]) -> u64 {
    let mut hasher = Xxh3::new();
    hasher.update(&salt.0);
    for part in parts {
        hasher.update(part);
        hasher.update(&[0]);
    }
    hasher.digest()
}

/// Hashes (salt, user agent, ip, host) into a device id.
pub fn device_id(salt: &Salt, user_agent: &str, ip: &str, host: &str) -> DeviceId {
    DeviceId(salted_hash(
        salt,
        &[user_agent.as_bytes(), ip.as_bytes(), host.as_bytes()],
    ))
}

/// Deterministic visitor id for a device.
pub fn visitor_id(salt: &Salt, device: DeviceId) -> String {
    let device = device.0.to_le_bytes();
    let hash = salted_hash(salt, &[&device[..]]);
    format!("visitor_{:016X}", hash)
}

/// Random visitor id for sessions without a fingerprint-derived one.
pub fn random_visitor_id() -> String {
    format!("visitor_{:016X}", Uuid::new_v4().as_u64_pair().0)
}

struct DailySalt {
    day: NaiveDate,
    salt: Salt,
}

/// Holds the daily and static salts.
///
/// The daily salt is replaced lazily on the first read of a new UTC day.
pub struct SaltManager {
    daily: RwLock<DailySalt>,
    static_salt: Salt,
}

impl SaltManager {
    pub fn new() -> Self {
        Self {
            daily: RwLock::new(DailySalt {
                day: Utc::now().date_naive(),
                salt: Salt::random(),
            }),
            static_salt: Salt::random(),
        }
    }

    /// Salt of the current UTC day.
    pub fn daily(&self) -> Salt {
        self.daily_at(Utc::now().date_naive())
    }

    fn daily_at(&self, today: NaiveDate) -> Salt {
        {
            let current = self.daily.read();
            if current.day == today {
                return current.salt;
            }
        }

        let mut current = self.daily.write();
        if current.day != today {
            current.day = today;
            current.salt = Salt::random();
            info!(day = %today, "Rotated daily salt");
        }
        current.salt
    }

    /// Salt kept for the lifetime of the process.
    pub fn static_salt(&self) -> Salt {
        self.static_salt
    }
}

impl Default for SaltManager {
    fn default() -> Self {
        Self::new()
    }
}
