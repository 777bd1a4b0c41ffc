use crate::descriptor::{ServiceDescriptor, UNREGISTERED};
use crate::registry::err::RegErr;
use crate::registry::ServiceRegistry;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

#[derive(Clone)]
pub struct MemoryRegistryCtx {
    pub sequence: Arc<AtomicI64>,
    pub services: Arc<DashMap<i64, ServiceDescriptor>>,
}

impl MemoryRegistryCtx {
    pub fn new() -> Self {
        Self {
            sequence: Arc::new(AtomicI64::new(0)),
            services: Arc::new(DashMap::new()),
        }
    }
}

impl Default for MemoryRegistryCtx {
    fn default() -> Self {
        Self::new()
    }
}

/// Concurrent-map store.  Fast, volatile, and the default backend for tests
/// and single-process deployments.
pub struct MemoryServiceRegistry {
    ctx: MemoryRegistryCtx,
}

impl MemoryServiceRegistry {
    pub fn new() -> Self {
        let ctx = MemoryRegistryCtx::new();
        Self { ctx }
    }

    fn next_id(&self) -> i64 {
        self.ctx.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl Default for MemoryServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ServiceRegistry for MemoryServiceRegistry {
    async fn load_all<'a>(&'a self) -> Result<Vec<ServiceDescriptor>, RegErr> {
        Ok(self
            .ctx
            .services
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn save<'a>(
        &'a self,
        mut descriptor: ServiceDescriptor,
    ) -> Result<ServiceDescriptor, RegErr> {
        if descriptor.id == UNREGISTERED {
            descriptor.id = self.next_id();
        } else {
            // keep the sequence ahead of explicitly chosen ids
            self.ctx.sequence.fetch_max(descriptor.id, Ordering::SeqCst);
        }
        self.ctx.services.insert(descriptor.id, descriptor.clone());
        Ok(descriptor)
    }

    async fn delete<'a>(&'a self, id: i64) -> Result<bool, RegErr> {
        Ok(self.ctx.services.remove(&id).is_some())
    }

    async fn find_by_id<'a>(&'a self, id: i64) -> Result<Option<ServiceDescriptor>, RegErr> {
        Ok(self.ctx.services.get(&id).map(|entry| entry.value().clone()))
    }
}
