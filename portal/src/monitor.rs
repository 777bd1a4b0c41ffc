use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

#[derive(Error, Debug, Clone)]
pub enum SampleErr {
    #[error("{0}")]
    Msg(String),
}

impl From<&str> for SampleErr {
    fn from(err: &str) -> Self {
        Self::Msg(err.to_string())
    }
}

impl From<&String> for SampleErr {
    fn from(err: &String) -> Self {
        Self::Msg(err.to_string())
    }
}

impl SampleErr {
    pub fn msg<M>(msg: M) -> SampleErr
    where
        M: ToString,
    {
        Self::Msg(msg.to_string())
    }
}

/// One sampled view of a named cache instance.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct CacheStatistics {
    pub name: String,
    pub size: i64,
    pub capacity: i64,
    pub evictions: i64,
}

impl CacheStatistics {
    /// Free headroom as an integer percentage.  A zero-capacity cache
    /// reports 0, which the status rules read as "no pressure signal".
    pub fn percent_free(&self) -> i64 {
        if self.capacity == 0 {
            return 0;
        }
        100 - self.size * 100 / self.capacity
    }
}

/// Health of a cache instance or of the whole sample set.  Declaration
/// order is severity order so the worst status of a set is `max()`.
#[derive(
    Debug,
    Clone,
    Copy,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CacheStatus {
    Up,
    Down,
    OutOfService,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorThresholds {
    /// Evictions above this count mark an instance down.
    pub eviction_threshold: i64,
    /// Free space strictly below this percentage marks an instance out of
    /// service, provided the instance reports any free-space signal at all.
    pub free_percent_threshold: i64,
}

impl Default for MonitorThresholds {
    fn default() -> Self {
        Self {
            eviction_threshold: 0,
            free_percent_threshold: 10,
        }
    }
}

/// Status of a single instance.  Evictions dominate: a cache that is both
/// evicting and short on space reports down, not out of service.
pub fn status_of(statistics: &CacheStatistics, thresholds: &MonitorThresholds) -> CacheStatus {
    if statistics.evictions > 0 && statistics.evictions > thresholds.eviction_threshold {
        return CacheStatus::Down;
    }
    let percent_free = statistics.percent_free();
    if percent_free > 0 && percent_free < thresholds.free_percent_threshold {
        return CacheStatus::OutOfService;
    }
    CacheStatus::Up
}

/// An aggregate health report with the per-instance samples as details.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct CacheHealth {
    pub status: CacheStatus,
    pub message: Option<String>,
    pub details: Vec<CacheStatistics>,
}

impl CacheHealth {
    fn unavailable() -> Self {
        Self {
            status: CacheStatus::OutOfService,
            message: Some("Cache statistics not available.".to_string()),
            details: vec![],
        }
    }

    fn failed(err: &SampleErr) -> Self {
        Self {
            status: CacheStatus::Down,
            message: Some(err.to_string()),
            details: vec![],
        }
    }
}

/// Aggregate a sample set: the worst individual status wins, and an empty
/// set means the cache could not be observed at all.
pub fn assess(statistics: Vec<CacheStatistics>, thresholds: &MonitorThresholds) -> CacheHealth {
    if statistics.is_empty() {
        return CacheHealth::unavailable();
    }
    let status = statistics
        .iter()
        .map(|s| status_of(s, thresholds))
        .max()
        .unwrap_or(CacheStatus::Up);
    CacheHealth {
        status,
        message: None,
        details: statistics,
    }
}

/// Source of cache samples.  Implementations wrap whatever cache backs the
/// deployment; the monitor never touches the registry itself, and a
/// sampling failure is [`SampleErr`], not a registry error.
#[async_trait]
pub trait CacheSampler: Send + Sync {
    async fn sample<'a>(&'a self) -> Result<Vec<CacheStatistics>, SampleErr>;
}

/// Periodic sampling task.  Each tick samples, assesses and publishes one
/// [`CacheHealth`] report; a sampling failure publishes a down report
/// carrying the error text rather than killing the loop.
pub struct CacheMonitor {
    sampler: Arc<dyn CacheSampler>,
    thresholds: MonitorThresholds,
    period: Duration,
}

impl CacheMonitor {
    pub fn new(
        sampler: Arc<dyn CacheSampler>,
        thresholds: MonitorThresholds,
        period: Duration,
    ) -> Self {
        Self {
            sampler,
            thresholds,
            period,
        }
    }

    /// Spawn the polling loop.  The channel starts out with the
    /// "statistics not available" report until the first sample lands.
    pub fn start(self) -> CacheMonitorHandle {
        let (tx, rx) = watch::channel(CacheHealth::unavailable());
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("cache monitor stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        let health = match self.sampler.sample().await {
                            Ok(statistics) => assess(statistics, &self.thresholds),
                            Err(err) => {
                                error!("cache sampling failed: {}", err);
                                CacheHealth::failed(&err)
                            }
                        };
                        if tx.send(health).is_err() {
                            // every receiver is gone
                            break;
                        }
                    }
                }
            }
        });
        CacheMonitorHandle {
            health: rx,
            cancel,
            task,
        }
    }
}

pub struct CacheMonitorHandle {
    health: watch::Receiver<CacheHealth>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl CacheMonitorHandle {
    /// Latest published report.
    pub fn health(&self) -> CacheHealth {
        self.health.borrow().clone()
    }

    /// A receiver for callers that want to await report changes.
    pub fn subscribe(&self) -> watch::Receiver<CacheHealth> {
        self.health.clone()
    }

    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}
