//! Backend adapter registry
//!
//! An explicit startup-time mapping from backend-type string to a
//! factory, so pool targets can be instantiated generically without
//! runtime reflection or hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use zonesync_core::registry::BackendRegistry;
//!
//! let registry = BackendRegistry::new();
//! registry.register("memory", Arc::new(MemoryBackendFactory));
//!
//! let adapter = registry.create(&target, &storage)?;
//! ```
//!
//! The `"multi"` kind is composed here rather than registered: its
//! target options name the master and slave sub-kinds
//! (`master_kind` / `slave_kind`) and carry their options under
//! `master.` / `slave.` prefixes.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::composite::CompositeBackend;
use crate::error::{Error, Result};
use crate::model::PoolTarget;
use crate::traits::backend::{BackendAdapter, BackendFactory};
use crate::traits::storage::Storage;

/// Backend kind resolved by composition instead of a factory
const MULTI_KIND: &str = "multi";

/// Registry of backend adapter factories
///
/// ## Thread Safety
///
/// Interior mutability with RwLock: concurrent reads, exclusive
/// registration writes.
#[derive(Default)]
pub struct BackendRegistry {
    factories: RwLock<HashMap<String, Arc<dyn BackendFactory>>>,
}

impl BackendRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend factory under a kind name
    pub fn register(&self, kind: impl Into<String>, factory: Arc<dyn BackendFactory>) {
        let kind = kind.into();
        debug!(%kind, "registering backend factory");
        let mut factories = self.factories.write().unwrap();
        factories.insert(kind, factory);
    }

    /// Whether a backend kind is registered
    pub fn has(&self, kind: &str) -> bool {
        kind == MULTI_KIND || self.factories.read().unwrap().contains_key(kind)
    }

    /// List all registered backend kinds
    pub fn list(&self) -> Vec<String> {
        let factories = self.factories.read().unwrap();
        factories.keys().cloned().collect()
    }

    /// Instantiate an adapter for a pool target
    ///
    /// The storage handle is only used by the `"multi"` kind, which
    /// needs it for delete compensation snapshots.
    pub fn create(
        &self,
        target: &PoolTarget,
        storage: &Arc<dyn Storage>,
    ) -> Result<Arc<dyn BackendAdapter>> {
        if target.backend_kind == MULTI_KIND {
            return self.create_composite(target, storage);
        }

        let factories = self.factories.read().unwrap();
        let factory = factories.get(&target.backend_kind).ok_or_else(|| {
            Error::configuration(format!("unknown backend kind: {}", target.backend_kind))
        })?;

        factory.create(target)
    }

    fn create_composite(
        &self,
        target: &PoolTarget,
        storage: &Arc<dyn Storage>,
    ) -> Result<Arc<dyn BackendAdapter>> {
        let master = self.create(&sub_target(target, "master")?, storage)?;
        let slave = self.create(&sub_target(target, "slave")?, storage)?;

        Ok(Arc::new(CompositeBackend::new(
            master,
            slave,
            Arc::clone(storage),
        )))
    }
}

/// Derive the master or slave sub-target of a "multi" target
fn sub_target(target: &PoolTarget, role: &str) -> Result<PoolTarget> {
    let kind_key = format!("{role}_kind");
    let kind = target.options.get(&kind_key).ok_or_else(|| {
        Error::configuration(format!(
            "multi target {} is missing option {kind_key}",
            target.id
        ))
    })?;

    if kind == MULTI_KIND {
        return Err(Error::configuration(format!(
            "multi target {} cannot nest another multi backend",
            target.id
        )));
    }

    let prefix = format!("{role}.");
    let options = target
        .options
        .iter()
        .filter_map(|(key, value)| {
            key.strip_prefix(&prefix)
                .map(|stripped| (stripped.to_string(), value.clone()))
        })
        .collect();

    Ok(PoolTarget {
        id: format!("{}-{role}", target.id),
        backend_kind: kind.clone(),
        masters: target.masters.clone(),
        options,
        enabled: true,
    })
}
