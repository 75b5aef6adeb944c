use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::hash::xx_hash;
use crate::inquiry::InquirySpec;
use crate::model::ModelSpec;
use crate::service::ServiceSpec;

/// Current snapshot format version.
///
/// Increment this when making breaking changes to [`CacheSnapshot`].
pub const FORMAT_VERSION: u32 = 1;

/// The connection a snapshot was generated for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointIdentity {
    pub base_url: String,
    pub tenant: String,
    pub endpoint_name: String,
    pub endpoint_version: String,
}

impl EndpointIdentity {
    pub fn new(
        base_url: impl Into<String>,
        tenant: impl Into<String>,
        endpoint_name: impl Into<String>,
        endpoint_version: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            tenant: tenant.into(),
            endpoint_name: endpoint_name.into(),
            endpoint_version: endpoint_version.into(),
        }
    }

    /// Hash of everything but the version; names the snapshot file so a
    /// version change lands on the same file and invalidates it.
    pub fn location_hash(&self) -> u64 {
        xx_hash(&format!(
            "{}|{}|{}",
            self.base_url, self.tenant, self.endpoint_name
        ))
    }
}

/// Everything persisted between runs: content hashes plus the component
/// descriptions they were generated from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub format_version: u32,
    /// Unix seconds.
    pub created_at: u64,
    pub identity: EndpointIdentity,
    pub schema_hash: u64,
    pub inquiry_document_hash: Option<u64>,
    pub model_hashes: BTreeMap<String, u64>,
    pub service_hashes: BTreeMap<String, u64>,
    pub inquiry_hashes: BTreeMap<String, u64>,
    pub models: BTreeMap<String, ModelSpec>,
    pub services: BTreeMap<String, ServiceSpec>,
    pub inquiries: BTreeMap<String, InquirySpec>,
}

impl CacheSnapshot {
    /// Whether the snapshot is older than `ttl` at `now` (unix seconds).
    pub fn is_expired(&self, ttl: Duration, now: u64) -> bool {
        now.saturating_sub(self.created_at) > ttl.as_secs()
    }
}

/// Current time in unix seconds.
pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
