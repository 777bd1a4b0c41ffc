use crate::descriptor::ServiceDescriptor;
use crate::registry::err::RegErr;
use async_trait::async_trait;
use std::sync::Arc;

pub mod err;
pub mod mem;
#[cfg(feature = "postgres")]
pub mod postgres;

pub type Registry = Arc<dyn ServiceRegistry>;

/// Durable mapping from descriptor identity to descriptor.  The services
/// manager treats whatever sits behind this contract as the source of truth
/// and rebuilds its in-memory index from it.
///
/// Concurrency contract: a `save` racing another `save` of the same id must
/// leave the store holding exactly one of the two writes; no partial record
/// is ever observable by a subsequent read.
#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    /// Every persisted descriptor.  Order unspecified.
    async fn load_all<'a>(&'a self) -> Result<Vec<ServiceDescriptor>, RegErr>;

    /// Persist `descriptor`, assigning a fresh id when the unregistered
    /// sentinel is present, and return the stored form.  An explicit id
    /// upserts: the prior record (variant included) is replaced entirely.
    async fn save<'a>(&'a self, descriptor: ServiceDescriptor)
        -> Result<ServiceDescriptor, RegErr>;

    /// Returns whether a record existed and was removed.
    async fn delete<'a>(&'a self, id: i64) -> Result<bool, RegErr>;

    async fn find_by_id<'a>(&'a self, id: i64) -> Result<Option<ServiceDescriptor>, RegErr>;
}
