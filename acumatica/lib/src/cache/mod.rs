//! Differential snapshot cache for generated components.
//!
//! A snapshot stores per-component content hashes next to the model,
//! service and inquiry descriptions generated from them. On the next
//! connect only components whose hash changed are generated again.
//!
//! ## Cache Location
//!
//! Snapshots live in `dirs::cache_dir()/acumatica-client` unless
//! [`CacheConfig::dir`] says otherwise, one JSON file per base URL,
//! tenant and endpoint name.
//!
//! ## Atomicity
//!
//! Writes go through a temp file in the same directory followed by a
//! rename, so a reader sees either the old snapshot or the new one.

mod diff;
mod differential;
mod snapshot;
mod store;

use std::path::PathBuf;
use std::time::Duration;

pub use diff::{ComponentCounts, ComponentDiff, diff_components};
pub use differential::{CacheState, CacheStats, DifferentialCache, Generation, RebuildReason};
pub use snapshot::{CacheSnapshot, EndpointIdentity, FORMAT_VERSION};
pub use store::SnapshotStore;

use crate::error::CacheError;

/// Directory name under the platform cache directory.
const CACHE_DIR_NAME: &str = "acumatica-client";

/// Default snapshot lifetime.
const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Snapshot cache settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Overrides the platform cache directory.
    pub dir: Option<PathBuf>,
    pub ttl: Duration,
    /// Ignore any snapshot and regenerate everything (the result is still
    /// persisted).
    pub force_rebuild: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
            ttl: DEFAULT_TTL,
            force_rebuild: false,
        }
    }
}

impl CacheConfig {
    /// A configuration that never reads or writes snapshots.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// The configured directory, or the platform default.
    pub fn resolved_dir(&self) -> Result<PathBuf, CacheError> {
        match &self.dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::cache_dir()
                .map(|dir| dir.join(CACHE_DIR_NAME))
                .ok_or(CacheError::NoCacheDir),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert!(!config.force_rebuild);
        assert_eq!(config.ttl, Duration::from_secs(86_400));
        assert!(!CacheConfig::disabled().enabled);
    }

    #[test]
    fn test_explicit_dir_wins() {
        let config = CacheConfig {
            dir: Some(PathBuf::from("/var/cache/acu")),
            ..CacheConfig::default()
        };
        assert_eq!(config.resolved_dir().unwrap(), PathBuf::from("/var/cache/acu"));
    }
}
