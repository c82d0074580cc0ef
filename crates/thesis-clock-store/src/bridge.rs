//! Keeps the virtual time in local storage and at the remote authority.
//!
//! Local storage is authoritative for resuming virtual mode after a
//! restart: [`PersistenceBridge::load`] at startup decides whether the
//! clock starts in virtual or real mode. The remote authority is told about
//! every committed change so server-side expiry checks use the same "now".
//!
//! Remote calls are plain `async fn`s; the clock service spawns them so
//! they never hold up a local transition.

use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDateTime};
use thesis_clock_core::config::StorageConfig;
use thesis_clock_core::wall::truncate_to_second;
use tracing::{debug, warn};

use crate::authority::{RemoteTime, TimeAuthority};
use crate::error::{AuthorityError, StoreError};
use crate::storage::DurableStorage;

/// Format used for the stored timestamp.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Storage plus remote authority, addressed through one fixed key.
#[derive(Debug, Clone)]
pub struct PersistenceBridge {
    storage: Arc<dyn DurableStorage>,
    authority: Arc<TimeAuthority>,
    key: String,
}

impl PersistenceBridge {
    /// Combine a store and an authority, storing the virtual time at `key`.
    pub fn new(
        storage: Arc<dyn DurableStorage>,
        authority: Arc<TimeAuthority>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            authority,
            key: key.into(),
        }
    }

    /// Build a bridge using the key from configuration.
    pub fn from_config(
        storage: Arc<dyn DurableStorage>,
        authority: Arc<TimeAuthority>,
        config: &StorageConfig,
    ) -> Self {
        Self::new(storage, authority, config.key.clone())
    }

    /// The storage key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The remote authority.
    pub fn authority(&self) -> &TimeAuthority {
        &self.authority
    }

    /// Store `value`, replacing any previous virtual time.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the storage cannot be written.
    pub fn save(&self, value: NaiveDateTime) -> Result<(), StoreError> {
        let formatted = format_timestamp(value);
        self.storage.set(&self.key, &formatted)?;
        debug!(key = %self.key, value = %formatted, "virtual time saved");
        Ok(())
    }

    /// Read the stored virtual time.
    ///
    /// Returns `None` when nothing is stored, the storage cannot be read, or
    /// the value does not parse. None of these are errors: the clock simply
    /// starts on real time.
    pub fn load(&self) -> Option<NaiveDateTime> {
        let raw = match self.storage.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %self.key, error = %e, "could not read stored virtual time");
                return None;
            }
        };
        let parsed = parse_timestamp(&raw);
        if parsed.is_none() {
            debug!(key = %self.key, raw = %raw, "ignoring unparsable stored virtual time");
        }
        parsed
    }

    /// Remove the stored virtual time.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the storage cannot be written.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.storage.remove(&self.key)?;
        debug!(key = %self.key, "virtual time cleared");
        Ok(())
    }

    /// Tell the remote authority about a new virtual time.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorityError`] if the push fails.
    pub async fn push_remote(&self, value: NaiveDateTime) -> Result<(), AuthorityError> {
        self.authority.set_virtual(value).await
    }

    /// Tell the remote authority to resume real time.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorityError`] if the push fails.
    pub async fn push_real_mode(&self) -> Result<(), AuthorityError> {
        self.authority.set_real().await
    }

    /// Ask the remote authority what time it currently uses.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorityError`] if the request fails.
    pub async fn fetch_remote(&self) -> Result<RemoteTime, AuthorityError> {
        self.authority.current().await
    }
}

/// Format a timestamp the way it is stored.
pub fn format_timestamp(value: NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored timestamp.
///
/// Accepts the native `YYYY-MM-DDThh:mm:ss` form (with optional fraction)
/// and RFC 3339 strings such as `2024-06-10T08:00:00.000Z`, which are
/// converted to local wall time. Sub-second precision is dropped.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim().trim_matches('"');
    raw.parse::<NaiveDateTime>()
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Local).naive_local())
        })
        .map(truncate_to_second)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::authority::{AuthorityCall, MemoryAuthority};
    use crate::storage::MemoryStorage;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap()
    }

    fn bridge() -> (PersistenceBridge, Arc<MemoryStorage>, MemoryAuthority) {
        let storage = Arc::new(MemoryStorage::new());
        let memory = MemoryAuthority::new();
        let bridge = PersistenceBridge::new(
            Arc::clone(&storage) as Arc<dyn DurableStorage>,
            Arc::new(TimeAuthority::Memory(memory.clone())),
            "virtualClock",
        );
        (bridge, storage, memory)
    }

    #[test]
    fn save_then_load() {
        let (bridge, storage, _) = bridge();
        let t = at("2024-06-10T10:00:00");
        bridge.save(t).unwrap();
        assert_eq!(bridge.load(), Some(t));
        assert_eq!(
            storage.get("virtualClock").unwrap().as_deref(),
            Some("2024-06-10T10:00:00")
        );
    }

    #[test]
    fn save_replaces_previous_value() {
        let (bridge, _, _) = bridge();
        bridge.save(at("2024-06-10T10:00:00")).unwrap();
        bridge.save(at("2030-01-01T00:00:00")).unwrap();
        assert_eq!(bridge.load(), Some(at("2030-01-01T00:00:00")));
    }

    #[test]
    fn clear_then_load_is_absent() {
        let (bridge, _, _) = bridge();
        bridge.save(at("2024-06-10T10:00:00")).unwrap();
        bridge.clear().unwrap();
        assert_eq!(bridge.load(), None);
    }

    #[test]
    fn garbage_is_treated_as_absent() {
        let (bridge, storage, _) = bridge();
        storage.set("virtualClock", "next tuesday").unwrap();
        assert_eq!(bridge.load(), None);
    }

    #[test]
    fn accepts_fractional_and_quoted_values() {
        assert_eq!(
            parse_timestamp("2024-06-10T10:00:00.250"),
            Some(at("2024-06-10T10:00:00"))
        );
        assert_eq!(
            parse_timestamp("\"2024-06-10T10:00:00\""),
            Some(at("2024-06-10T10:00:00"))
        );
    }

    #[test]
    fn accepts_rfc3339_in_local_time() {
        let expected = DateTime::parse_from_rfc3339("2024-06-10T08:00:00Z")
            .unwrap()
            .with_timezone(&Local)
            .naive_local();
        assert_eq!(parse_timestamp("2024-06-10T08:00:00.000Z"), Some(expected));
    }

    #[tokio::test]
    async fn pushes_reach_the_authority() {
        let (bridge, _, memory) = bridge();
        bridge.push_remote(at("2030-01-01T00:00:00")).await.unwrap();
        assert!(bridge.fetch_remote().await.unwrap().is_virtual);
        bridge.push_real_mode().await.unwrap();
        assert_eq!(
            memory.calls(),
            vec![
                AuthorityCall::SetVirtual(at("2030-01-01T00:00:00")),
                AuthorityCall::SetReal
            ]
        );
    }

    #[tokio::test]
    async fn push_failures_are_returned() {
        let (bridge, _, memory) = bridge();
        memory.set_failing(true);
        assert!(bridge.push_real_mode().await.is_err());
        // Local storage is unaffected by remote trouble.
        bridge.save(at("2030-01-01T00:00:00")).unwrap();
        assert_eq!(bridge.load(), Some(at("2030-01-01T00:00:00")));
    }
}
