#![allow(warnings)]

pub mod config;
pub mod descriptor;
pub mod editor;
pub mod manager;
pub mod matcher;
pub mod monitor;
pub mod registry;
pub mod validate;

pub use config::{Database, PostgresConnectInfo, RegistryConfig};
pub use descriptor::{Matcher, MatcherKind, ServiceDescriptor, UNREGISTERED};
pub use editor::{
    AttributeRepository, FormView, ServiceEditor, StubAttributeRepository, SubmitOutcome,
    Submission,
};
pub use manager::ServicesManager;
pub use matcher::{CompiledMatcher, PatternErr};
pub use monitor::{
    CacheHealth, CacheMonitor, CacheMonitorHandle, CacheSampler, CacheStatistics, CacheStatus,
    MonitorThresholds, SampleErr,
};
pub use registry::err::RegErr;
pub use registry::mem::MemoryServiceRegistry;
#[cfg(feature = "postgres")]
pub use registry::postgres::PostgresServiceRegistry;
pub use registry::{Registry, ServiceRegistry};
pub use validate::validate;
