//! Performance Module
//!
//! Memoizing cache for complete evaluations plus latency statistics. Entries
//! are keyed by the canonical JSON of the resolved chart and the active
//! algorithm configuration, so a config change never serves a stale result.

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::{AlgorithmConfig, CacheConfig};
use crate::error::Result;
use crate::models::{AlgorithmOutput, Chart};
use crate::observability::EngineMetrics;

/// Performance statistics
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub cache_enabled: bool,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_hit_rate: f64,
    pub cache_evictions: u64,
    pub computation_errors: u64,
    pub entries: usize,
    pub capacity: usize,
    /// 统计窗口内的样本数
    pub latency_samples: usize,
    pub avg_latency_ms: f64,
    pub min_latency_ms: f64,
    pub max_latency_ms: f64,
}

/// Result of a repeated uncached evaluation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub iterations: usize,
    pub total_ms: f64,
    pub average_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

impl BenchmarkReport {
    pub fn from_samples(samples: &[f64]) -> Self {
        let total_ms: f64 = samples.iter().sum();
        let (min_ms, max_ms) = if samples.is_empty() {
            (0.0, 0.0)
        } else {
            (
                samples.iter().copied().fold(f64::MAX, f64::min),
                samples.iter().copied().fold(f64::MIN, f64::max),
            )
        };
        Self {
            iterations: samples.len(),
            total_ms,
            average_ms: if samples.is_empty() {
                0.0
            } else {
                total_ms / samples.len() as f64
            },
            min_ms,
            max_ms,
        }
    }
}

/// Cache entry with TTL and access tracking
#[derive(Debug)]
struct CacheEntry {
    cell: OnceCell<Arc<AlgorithmOutput>>,
    created_at: Instant,
    last_accessed: Mutex<Instant>,
    access_count: AtomicU64,
    /// Callers holding this entry; only changed under a map shard lock or by
    /// an `InFlight` drop
    in_flight: AtomicUsize,
}

impl CacheEntry {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            cell: OnceCell::new(),
            created_at: now,
            last_accessed: Mutex::new(now),
            access_count: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
        }
    }

    fn is_ready(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Pending entries never expire, so a running computation keeps its slot
    fn is_expired(&self, ttl: Duration) -> bool {
        self.is_ready() && self.created_at.elapsed() >= ttl
    }

    /// A failed computation nobody else is waiting on
    fn is_abandoned(&self) -> bool {
        !self.is_ready() && self.in_flight.load(Ordering::SeqCst) == 0
    }

    fn touch(&self) {
        *self.last_accessed.lock() = Instant::now();
        self.access_count.fetch_add(1, Ordering::Relaxed);
    }
}

/// Marks a caller as holding an entry until dropped
struct InFlight {
    entry: Arc<CacheEntry>,
}

impl InFlight {
    /// Must be called while the map guard for `entry` is held
    fn enter(entry: &Arc<CacheEntry>) -> Self {
        entry.in_flight.fetch_add(1, Ordering::SeqCst);
        Self {
            entry: Arc::clone(entry),
        }
    }

    fn release(self) -> Arc<CacheEntry> {
        Arc::clone(&self.entry)
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.entry.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Build the cache key for a chart under a configuration
pub fn cache_key(chart: &Chart, config: &AlgorithmConfig) -> Result<String> {
    Ok(serde_json::to_string(&(chart, config))?)
}

/// Memoizing evaluation cache
///
/// Concurrent requests for one key run the computation at most once; the
/// waiting callers receive the same result and count as hits. An entry whose
/// computation is still running is never expired or evicted, so capacity may
/// be exceeded while every slot is pending. A failed computation leaves no
/// entry behind unless another caller is already waiting to retry it.
pub struct PerformanceManager {
    config: CacheConfig,
    enabled: AtomicBool,
    entries: DashMap<String, Arc<CacheEntry>>,
    admission: Mutex<()>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    errors: AtomicU64,
    latencies: Mutex<VecDeque<f64>>,
    metrics: EngineMetrics,
}

impl PerformanceManager {
    /// Create a new cache
    pub fn new(config: CacheConfig, metrics: EngineMetrics) -> Self {
        Self {
            enabled: AtomicBool::new(config.enabled),
            entries: DashMap::new(),
            admission: Mutex::new(()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            latencies: Mutex::new(VecDeque::with_capacity(config.latency_window)),
            metrics,
            config,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        info!(enabled, "evaluation cache toggled");
    }

    /// Return the cached value for `key`, computing it on a miss
    pub fn get_or_compute<F>(&self, key: String, compute: F) -> Result<Arc<AlgorithmOutput>>
    where
        F: FnOnce() -> Result<AlgorithmOutput>,
    {
        if !self.is_enabled() {
            return self.timed(compute).map(Arc::new);
        }

        let slot = self.entry_for(&key);
        let mut computed = false;
        let result = slot
            .entry
            .cell
            .get_or_try_init(|| {
                computed = true;
                self.timed(compute).map(Arc::new)
            })
            .cloned();
        let entry = slot.release();

        match result {
            Ok(output) => {
                entry.touch();
                if !computed {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    self.metrics.record_hit();
                }
                Ok(output)
            }
            Err(e) => {
                self.entries.remove_if(&key, |_, entry| entry.is_abandoned());
                self.metrics.set_entries(self.entries.len());
                Err(e)
            }
        }
    }

    /// Run one computation, recording its latency or its failure
    fn timed<F>(&self, compute: F) -> Result<AlgorithmOutput>
    where
        F: FnOnce() -> Result<AlgorithmOutput>,
    {
        let start = Instant::now();
        let result = compute();
        let elapsed = start.elapsed();

        match &result {
            Ok(_) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                self.metrics.record_miss(elapsed.as_secs_f64());
                self.record_latency(elapsed.as_secs_f64() * 1000.0);
            }
            Err(e) => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                self.metrics.record_error();
                debug!(error = %e, "evaluation failed, result not cached");
            }
        }
        result
    }

    fn entry_for(&self, key: &str) -> InFlight {
        let ttl = Duration::from_secs(self.config.ttl_secs);

        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(ttl) {
                return InFlight::enter(entry.value());
            }
        }

        let _admission = self.admission.lock();
        if self
            .entries
            .remove_if(key, |_, entry| entry.is_expired(ttl))
            .is_some()
        {
            self.record_evictions(1);
        }
        if !self.entries.contains_key(key) && self.entries.len() >= self.config.max_entries {
            self.make_room(ttl);
        }
        let slot = InFlight::enter(
            self.entries
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(CacheEntry::new()))
                .value(),
        );
        self.metrics.set_entries(self.entries.len());
        slot
    }

    /// Purge expired entries, then evict least recently used ready ones until
    /// there is room for one more
    fn make_room(&self, ttl: Duration) {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(ttl));
        let mut evicted = before.saturating_sub(self.entries.len());

        while self.entries.len() >= self.config.max_entries {
            let oldest = self
                .entries
                .iter()
                .filter(|item| item.value().is_ready())
                .min_by_key(|item| *item.value().last_accessed.lock())
                .map(|item| item.key().clone());
            match oldest {
                Some(key) => {
                    if self.entries.remove(&key).is_some() {
                        evicted += 1;
                    }
                }
                None => {
                    debug!(pending = self.entries.len(), "cache full of pending entries");
                    break;
                }
            }
        }

        if evicted > 0 {
            self.record_evictions(evicted as u64);
            debug!(evicted, remaining = self.entries.len(), "cache entries evicted");
        }
    }

    fn record_evictions(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
        self.metrics.record_evictions(count);
    }

    fn record_latency(&self, millis: f64) {
        let mut latencies = self.latencies.lock();
        if latencies.len() >= self.config.latency_window {
            latencies.pop_front();
        }
        latencies.push_back(millis);
    }

    /// Clear all finished entries; pending computations and counters are kept
    pub fn clear(&self) {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_ready());
        let remaining = self.entries.len();
        self.metrics.set_entries(remaining);
        info!(removed = before.saturating_sub(remaining), "evaluation cache cleared");
    }

    /// Get cache size
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Get cache statistics
    pub fn summary(&self) -> PerformanceStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;

        let latencies = self.latencies.lock();
        let samples = latencies.len();
        let (avg, min, max) = if samples == 0 {
            (0.0, 0.0, 0.0)
        } else {
            (
                latencies.iter().sum::<f64>() / samples as f64,
                latencies.iter().copied().fold(f64::MAX, f64::min),
                latencies.iter().copied().fold(f64::MIN, f64::max),
            )
        };

        PerformanceStats {
            cache_enabled: self.is_enabled(),
            cache_hits: hits,
            cache_misses: misses,
            cache_hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
            cache_evictions: self.evictions.load(Ordering::Relaxed),
            computation_errors: self.errors.load(Ordering::Relaxed),
            entries: self.entries.len(),
            capacity: self.config.max_entries,
            latency_samples: samples,
            avg_latency_ms: avg,
            min_latency_ms: min,
            max_latency_ms: max,
        }
    }

    /// Prometheus text exposition of the cache metrics
    pub fn metrics_text(&self) -> Result<String> {
        self.metrics.gather()
    }
}
