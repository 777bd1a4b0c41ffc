use crate::descriptor::ServiceDescriptor;
use crate::matcher::CompiledMatcher;
use crate::registry::err::RegErr;
use crate::registry::{Registry, ServiceRegistry};
use arc_swap::ArcSwap;
use itertools::Itertools;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// An index entry: a descriptor admitted to resolution together with its
/// compiled matcher, so resolve never recompiles and never fails.
struct IndexedService {
    descriptor: ServiceDescriptor,
    matcher: CompiledMatcher,
}

impl IndexedService {
    fn admit(descriptor: ServiceDescriptor) -> Result<Self, RegErr> {
        let matcher = CompiledMatcher::for_descriptor(&descriptor)?;
        Ok(Self {
            descriptor,
            matcher,
        })
    }
}

type Index = HashMap<i64, Arc<IndexedService>>;

/// Orchestrates every registry operation and owns the in-memory index the
/// resolve path reads.
///
/// The index is derived state: rebuilt from the store on load, kept in sync
/// by write-through afterward, never the source of truth.  Readers run
/// lock-free against an immutable snapshot; each mutation builds the next
/// snapshot and publishes it atomically, and only after the store has
/// confirmed the write, so a reader can never observe an entry that failed
/// to persist.
pub struct ServicesManager {
    registry: Registry,
    index: ArcSwap<Index>,
    write: Mutex<()>,
}

impl ServicesManager {
    /// Explicit initialization: pull every descriptor out of the store and
    /// build the first snapshot.
    pub async fn load(registry: Registry) -> Result<Self, RegErr> {
        let manager = Self {
            registry,
            index: ArcSwap::from_pointee(Index::new()),
            write: Mutex::new(()),
        };
        manager.reload().await?;
        info!(
            "services manager loaded {} service(s)",
            manager.index.load().len()
        );
        Ok(manager)
    }

    /// Rebuild the index from the store and publish it as one snapshot.  A
    /// stored pattern that no longer compiles aborts the rebuild and leaves
    /// the previous snapshot live.
    pub async fn reload(&self) -> Result<(), RegErr> {
        let _guard = self.write.lock().await;
        let stored = self.registry.load_all().await?;
        let mut next = Index::with_capacity(stored.len());
        for descriptor in stored {
            let id = descriptor.id;
            next.insert(id, Arc::new(IndexedService::admit(descriptor)?));
        }
        debug!("index rebuilt with {} service(s)", next.len());
        self.index.store(Arc::new(next));
        Ok(())
    }

    /// Persist `descriptor` and admit it to the index.  Returns the stored
    /// form, including any newly assigned id.
    pub async fn save(&self, descriptor: ServiceDescriptor) -> Result<ServiceDescriptor, RegErr> {
        if descriptor.pattern.trim().is_empty() {
            return Err(RegErr::required("pattern"));
        }
        // compile up front so a pattern that cannot match can never reach
        // the store or the index
        let matcher = CompiledMatcher::for_descriptor(&descriptor)?;

        let _guard = self.write.lock().await;
        let stored = self.registry.save(descriptor).await?;
        let entry = Arc::new(IndexedService {
            descriptor: stored.clone(),
            matcher,
        });
        let mut next = self.index.load_full().as_ref().clone();
        next.insert(stored.id, entry);
        self.index.store(Arc::new(next));
        info!("saved service '{}' (id {})", stored.name, stored.id);
        Ok(stored)
    }

    /// Remove from store then index.  Returns whether the record existed.
    pub async fn delete(&self, id: i64) -> Result<bool, RegErr> {
        let _guard = self.write.lock().await;
        let existed = self.registry.delete(id).await?;
        if existed {
            let mut next = self.index.load_full().as_ref().clone();
            next.remove(&id);
            self.index.store(Arc::new(next));
            info!("deleted service (id {})", id);
        }
        Ok(existed)
    }

    pub fn find_by_id(&self, id: i64) -> Option<ServiceDescriptor> {
        self.index
            .load()
            .get(&id)
            .map(|entry| entry.descriptor.clone())
    }

    /// Resolve a candidate service identifier to the single winning
    /// descriptor: among all entries whose matcher accepts the candidate,
    /// the lowest evaluation order wins and ties break by lowest id.
    pub fn resolve(&self, candidate: &str) -> Option<ServiceDescriptor> {
        let index = self.index.load();
        let winner = index
            .values()
            .filter(|entry| entry.matcher.is_match(candidate))
            .min_by_key(|entry| (entry.descriptor.evaluation_order, entry.descriptor.id))
            .map(|entry| entry.descriptor.clone());
        match &winner {
            Some(descriptor) => debug!(
                "resolved '{}' to service '{}' (id {})",
                candidate, descriptor.name, descriptor.id
            ),
            None => debug!("no service matches '{}'", candidate),
        }
        winner
    }

    /// Snapshot of every registered service, ordered by evaluation order
    /// then id.
    pub fn services(&self) -> Vec<ServiceDescriptor> {
        self.index
            .load()
            .values()
            .map(|entry| entry.descriptor.clone())
            .sorted_by_key(|descriptor| (descriptor.evaluation_order, descriptor.id))
            .collect()
    }

    /// Explicit lifecycle counterpart to [`ServicesManager::load`].  The
    /// index is write-through so there is nothing to flush today; stores
    /// that buffer writes get their hook here.
    pub async fn shutdown(&self) -> Result<(), RegErr> {
        debug!("services manager shutdown");
        Ok(())
    }
}
