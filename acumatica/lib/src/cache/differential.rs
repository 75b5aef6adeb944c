use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;
use strum::Display;
use tracing::{info, instrument, warn};

use super::CacheConfig;
use super::diff::{ComponentCounts, ComponentDiff, diff_components};
use super::snapshot::{CacheSnapshot, EndpointIdentity, FORMAT_VERSION, now_secs};
use super::store::SnapshotStore;
use crate::error::{AcumaticaError, CacheError, SchemaError};
use crate::hash::{hash_json, xx_hash};
use crate::inquiry::{InquirySpec, parse_metadata};
use crate::model::{ModelSpec, describe_model, describe_models, lineage};
use crate::schema::{PrimitiveWrapper, SchemaDocument};
use crate::service::{ServiceSpec, describe_service, describe_services, operation_groups};

/// Why a snapshot was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RebuildReason {
    Forced,
    Expired,
    IdentityMismatch,
    Unreadable,
}

/// How the components of a generation were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum CacheState {
    /// Caching is off; nothing read or written.
    Disabled,
    /// No snapshot existed.
    Cold,
    /// A snapshot existed but could not be used.
    Rebuilt(RebuildReason),
    /// Valid snapshot, changed schema: only changed components regenerated.
    Differential,
    /// Valid snapshot, identical schema.
    Hit,
}

impl fmt::Display for CacheState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::Cold => write!(f, "cold"),
            Self::Rebuilt(reason) => write!(f, "rebuilt ({reason})"),
            Self::Differential => write!(f, "differential"),
            Self::Hit => write!(f, "hit"),
        }
    }
}

/// Counters describing one generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub state: CacheState,
    /// Components reused from the snapshot.
    pub cache_hits: usize,
    /// Components generated from the live schema.
    pub cache_misses: usize,
    pub models: ComponentCounts,
    pub services: ComponentCounts,
    pub inquiries: ComponentCounts,
    /// Whether a new snapshot was written.
    pub persisted: bool,
    pub cache_file: Option<PathBuf>,
}

impl CacheStats {
    fn new(
        state: CacheState,
        models: ComponentCounts,
        services: ComponentCounts,
        inquiries: ComponentCounts,
    ) -> Self {
        let parts = [models, services, inquiries];
        Self {
            state,
            cache_hits: parts.iter().map(|c| c.retained).sum(),
            cache_misses: parts.iter().map(|c| c.regenerated).sum(),
            models,
            services,
            inquiries,
            persisted: false,
            cache_file: None,
        }
    }
}

/// The component descriptions a client is materialized from.
#[derive(Debug, Clone)]
pub struct Generation {
    pub models: BTreeMap<String, ModelSpec>,
    pub services: BTreeMap<String, ServiceSpec>,
    pub inquiries: BTreeMap<String, InquirySpec>,
    pub stats: CacheStats,
}

/// The snapshot on disk, if it can be diffed against.
enum Previous {
    Valid(CacheSnapshot),
    Unusable(CacheState),
}

/// Live inputs and their hashes.
struct Live<'a> {
    doc: &'a SchemaDocument,
    schema_hash: u64,
    inquiry_document_hash: Option<u64>,
    inquiries: BTreeMap<String, InquirySpec>,
    model_hashes: BTreeMap<String, u64>,
    service_hashes: BTreeMap<String, u64>,
    inquiry_hashes: BTreeMap<String, u64>,
}

/// Snapshot-backed generation of model, service and inquiry descriptions.
#[derive(Debug, Clone)]
pub struct DifferentialCache {
    config: CacheConfig,
}

impl DifferentialCache {
    pub fn new(config: CacheConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The snapshot store for the configured directory.
    pub fn store(&self) -> Result<SnapshotStore, CacheError> {
        self.config.resolved_dir().map(SnapshotStore::new)
    }

    /// Produces the descriptions for `doc` (and the inquiry metadata, when
    /// given), reusing whatever the snapshot for `identity` still covers.
    ///
    /// Snapshot read and write failures never fail this call.
    ///
    /// ## Errors
    ///
    /// Returns schema errors from regenerated components and parse errors
    /// from the inquiry metadata.
    #[instrument(skip_all, fields(endpoint = %identity.endpoint_name, version = %identity.endpoint_version))]
    pub fn generate(
        &self,
        identity: &EndpointIdentity,
        doc: &SchemaDocument,
        inquiry_metadata: Option<&str>,
    ) -> Result<Generation, AcumaticaError> {
        let live = Live::new(doc, inquiry_metadata)?;

        if !self.config.enabled {
            return full_build(&live, CacheState::Disabled);
        }
        let store = match self.store() {
            Ok(store) => store,
            Err(e) => {
                warn!(error = %e, "cache directory unavailable, caching disabled");
                return full_build(&live, CacheState::Disabled);
            }
        };

        let previous = if self.config.force_rebuild {
            Previous::Unusable(CacheState::Rebuilt(RebuildReason::Forced))
        } else {
            match store.try_load(identity) {
                Ok(None) => Previous::Unusable(CacheState::Cold),
                Err(e) => {
                    warn!(error = %e, "snapshot unreadable, rebuilding");
                    Previous::Unusable(CacheState::Rebuilt(RebuildReason::Unreadable))
                }
                Ok(Some(snapshot)) if snapshot.is_expired(self.config.ttl, now_secs()) => {
                    Previous::Unusable(CacheState::Rebuilt(RebuildReason::Expired))
                }
                Ok(Some(snapshot)) if snapshot.identity != *identity => {
                    Previous::Unusable(CacheState::Rebuilt(RebuildReason::IdentityMismatch))
                }
                Ok(Some(snapshot)) => Previous::Valid(snapshot),
            }
        };

        let mut generation = match previous {
            Previous::Valid(snapshot)
                if snapshot.schema_hash == live.schema_hash
                    && snapshot.inquiry_document_hash == live.inquiry_document_hash =>
            {
                info!("schema unchanged, using snapshot");
                return Ok(hit(snapshot, store.path_for(identity)));
            }
            Previous::Valid(snapshot) => differential(&live, snapshot)?,
            Previous::Unusable(state) => full_build(&live, state)?,
        };

        info!(
            state = %generation.stats.state,
            hits = generation.stats.cache_hits,
            misses = generation.stats.cache_misses,
            "generated components"
        );

        let snapshot = CacheSnapshot {
            format_version: FORMAT_VERSION,
            created_at: now_secs(),
            identity: identity.clone(),
            schema_hash: live.schema_hash,
            inquiry_document_hash: live.inquiry_document_hash,
            model_hashes: live.model_hashes,
            service_hashes: live.service_hashes,
            inquiry_hashes: live.inquiry_hashes,
            models: generation.models.clone(),
            services: generation.services.clone(),
            inquiries: generation.inquiries.clone(),
        };
        match store.save(&snapshot) {
            Ok(path) => {
                generation.stats.persisted = true;
                generation.stats.cache_file = Some(path);
            }
            Err(e) => warn!(error = %e, "failed to persist snapshot"),
        }
        Ok(generation)
    }
}

impl<'a> Live<'a> {
    fn new(doc: &'a SchemaDocument, inquiry_metadata: Option<&str>) -> Result<Self, AcumaticaError> {
        let inquiries = match inquiry_metadata {
            Some(xml) => parse_metadata(xml)?,
            None => BTreeMap::new(),
        };

        let model_hashes = doc
            .schemas()
            .into_iter()
            .flatten()
            .filter(|(name, _)| PrimitiveWrapper::from_name(name).is_none())
            .map(|(name, _)| (name.clone(), model_hash(doc, name)))
            .collect();
        let service_hashes = operation_groups(doc)
            .into_iter()
            .map(|(tag, group)| (tag, group.content_hash()))
            .collect();
        let inquiry_hashes = inquiries
            .iter()
            .map(|(name, spec)| (name.clone(), spec.content_hash()))
            .collect();

        Ok(Self {
            doc,
            schema_hash: doc.content_hash(),
            inquiry_document_hash: inquiry_metadata.map(xx_hash),
            inquiries,
            model_hashes,
            service_hashes,
            inquiry_hashes,
        })
    }
}

/// Hash of an entity definition together with its `allOf` bases.
fn model_hash(doc: &SchemaDocument, name: &str) -> u64 {
    let chain: Vec<Value> = lineage(doc, name).into_iter().cloned().collect();
    hash_json(&Value::Array(chain))
}

fn all_regenerated<T>(components: &BTreeMap<String, T>) -> ComponentCounts {
    ComponentCounts {
        regenerated: components.len(),
        ..ComponentCounts::default()
    }
}

fn full_build(live: &Live<'_>, state: CacheState) -> Result<Generation, AcumaticaError> {
    info!(%state, "generating every component");
    let models = describe_models(live.doc)?;
    let services = describe_services(live.doc);
    let inquiries = live.inquiries.clone();
    let stats = CacheStats::new(
        state,
        all_regenerated(&models),
        all_regenerated(&services),
        all_regenerated(&inquiries),
    );
    Ok(Generation {
        models,
        services,
        inquiries,
        stats,
    })
}

fn hit(snapshot: CacheSnapshot, path: PathBuf) -> Generation {
    let retained = |n: usize| ComponentCounts {
        retained: n,
        ..ComponentCounts::default()
    };
    let mut stats = CacheStats::new(
        CacheState::Hit,
        retained(snapshot.models.len()),
        retained(snapshot.services.len()),
        retained(snapshot.inquiries.len()),
    );
    stats.cache_file = Some(path);
    Generation {
        models: snapshot.models,
        services: snapshot.services,
        inquiries: snapshot.inquiries,
        stats,
    }
}

fn differential(live: &Live<'_>, snapshot: CacheSnapshot) -> Result<Generation, AcumaticaError> {
    let groups = operation_groups(live.doc);

    let model_diff = diff_components(&snapshot.model_hashes, &live.model_hashes);
    let models = merge(&model_diff, snapshot.models, |name| describe_model(live.doc, name))?;

    let service_diff = diff_components(&snapshot.service_hashes, &live.service_hashes);
    let services = merge(&service_diff, snapshot.services, |tag| {
        groups
            .get(tag)
            .map(|group| describe_service(live.doc, group))
            .ok_or_else(|| SchemaError::malformed(format!("no operations tagged '{tag}'")))
    })?;

    let inquiry_diff = diff_components(&snapshot.inquiry_hashes, &live.inquiry_hashes);
    let inquiries = merge(&inquiry_diff, snapshot.inquiries, |name| {
        live.inquiries
            .get(name)
            .cloned()
            .ok_or_else(|| SchemaError::malformed(format!("no inquiry '{name}'")))
    })?;

    let categories = [
        ("models", &model_diff),
        ("services", &service_diff),
        ("inquiries", &inquiry_diff),
    ];
    for (category, diff) in categories {
        if !diff.regenerated.is_empty() || !diff.removed.is_empty() {
            info!(
                category,
                regenerated = ?diff.regenerated,
                removed = ?diff.removed,
                "components changed"
            );
        }
    }

    let stats = CacheStats::new(
        CacheState::Differential,
        model_diff.counts(),
        service_diff.counts(),
        inquiry_diff.counts(),
    );
    Ok(Generation {
        models,
        services,
        inquiries,
        stats,
    })
}

/// Retained components come from the snapshot (regenerated if the snapshot
/// lacks them), changed ones from `regenerate`; removed ones are dropped.
fn merge<T>(
    diff: &ComponentDiff,
    mut previous: BTreeMap<String, T>,
    mut regenerate: impl FnMut(&str) -> Result<T, SchemaError>,
) -> Result<BTreeMap<String, T>, AcumaticaError> {
    let mut merged = BTreeMap::new();
    for name in &diff.retained {
        let component = match previous.remove(name) {
            Some(component) => component,
            None => regenerate(name)?,
        };
        merged.insert(name.clone(), component);
    }
    for name in &diff.regenerated {
        merged.insert(name.clone(), regenerate(name)?);
    }
    Ok(merged)
}
