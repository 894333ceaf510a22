// Multi-instance registry - ambient convenience for hosting many concurrent
// instances in one process, grounded on the reference crate's per-tenant
// `DashMap` (api/agents/middleware.rs's `tenant_buckets`).

use std::sync::Arc;

use dashmap::DashMap;
use tokio::task::JoinHandle;

use crate::config::InstanceConfig;
use crate::instance::Instance;
use crate::journal::Journal;
use crate::net::Net;
use crate::Result;

/// Owns every running [`Instance`] in this process, keyed by instance id.
/// Each net instance remains single-owner (no cross-instance coordination
/// lives here) — this only saves callers from threading a `HashMap` through
/// their own locking.
#[derive(Default)]
pub struct InstanceRegistry {
    instances: DashMap<String, Instance>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        InstanceRegistry::default()
    }

    /// Spawn (or resume) `instance_id` against `net`/`journal` and register
    /// it. Replacing an already-registered id drops the old handle; its
    /// actor task keeps running until its mailbox is dropped entirely, so
    /// callers that want a clean stop should `shutdown()` first.
    pub async fn spawn(
        &self,
        net: Arc<Net>,
        journal: Arc<dyn Journal>,
        instance_id: impl Into<String>,
        config: InstanceConfig,
    ) -> Result<JoinHandle<()>> {
        let instance_id = instance_id.into();
        let (instance, join) = Instance::spawn(net, journal, instance_id.clone(), config).await?;
        self.instances.insert(instance_id, instance);
        Ok(join)
    }

    pub fn get(&self, instance_id: &str) -> Option<Instance> {
        self.instances.get(instance_id).map(|entry| entry.clone())
    }

    /// Shut down and forget `instance_id`. A no-op if it isn't registered.
    pub fn remove(&self, instance_id: &str) {
        if let Some((_, instance)) = self.instances.remove(instance_id) {
            instance.shutdown();
        }
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::InMemoryJournal;

    #[tokio::test]
    async fn spawn_registers_a_retrievable_instance() {
        let registry = InstanceRegistry::new();
        let net = Arc::new(Net::new(vec![], vec![], vec![]).unwrap());
        let journal: Arc<dyn Journal> = Arc::new(InMemoryJournal::new());

        registry
            .spawn(net, journal, "inst-1", InstanceConfig::default())
            .await
            .unwrap();

        assert!(registry.get("inst-1").is_some());
        assert_eq!(registry.len(), 1);

        registry.remove("inst-1");
        assert!(registry.get("inst-1").is_none());
    }
}
