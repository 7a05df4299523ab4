//! In-memory search index over the medicine catalog.
//!
//! Queries run against an immutable [`IndexSnapshot`]. A rebuild constructs a
//! new snapshot off to the side and swaps the shared pointer in one step, so
//! in-flight queries finish on the snapshot they started with. Concurrent
//! rebuild requests collapse into one.

mod snapshot;

pub use snapshot::*;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, TryLockError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::IndexConfig;
use crate::error::{EngineError, EngineResult};
use crate::store::RecordStore;

/// Snapshot metadata for administration endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexStats {
    pub generation: u64,
    pub built_at: DateTime<Utc>,
    pub record_count: usize,
    pub fingerprint: String,
}

/// Candidates for one query, tied to the snapshot they index into.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub snapshot: Arc<IndexSnapshot>,
    pub candidates: Vec<Candidate>,
}

/// TTL-refreshed search index. Construct once and share by handle.
pub struct SearchIndex {
    store: Arc<dyn RecordStore>,
    config: IndexConfig,
    current: RwLock<Option<Arc<IndexSnapshot>>>,
    build_lock: Mutex<()>,
    rebuilding: AtomicBool,
    generation: AtomicU64,
    /// Tickets handed to rebuilds as they start fetching
    builds_started: AtomicU64,
    /// Ticket of the rebuild whose snapshot is installed
    installed_ticket: AtomicU64,
}

impl SearchIndex {
    /// Create an index; nothing is fetched until the first query or [`build`](Self::build).
    pub fn new(store: Arc<dyn RecordStore>, config: IndexConfig) -> Self {
        Self {
            store,
            config,
            current: RwLock::new(None),
            build_lock: Mutex::new(()),
            rebuilding: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            builds_started: AtomicU64::new(0),
            installed_ticket: AtomicU64::new(0),
        }
    }

    /// Create an index with the default candidate limit and the given TTL.
    pub fn with_ttl(store: Arc<dyn RecordStore>, ttl: Duration) -> Self {
        let config = IndexConfig {
            ttl_secs: ttl.as_secs(),
            ..IndexConfig::default()
        };
        Self::new(store, config)
    }

    pub fn ttl(&self) -> Duration {
        self.config.ttl()
    }

    pub fn candidate_limit(&self) -> usize {
        self.config.candidate_limit
    }

    /// Whether a rebuild is running right now.
    pub fn is_rebuilding(&self) -> bool {
        self.rebuilding.load(Ordering::Acquire)
    }

    /// The current snapshot without building or refreshing.
    pub fn current(&self) -> EngineResult<Arc<IndexSnapshot>> {
        self.peek().ok_or(EngineError::IndexNotReady)
    }

    /// A usable snapshot: built on first use and rebuilt once the TTL lapses.
    ///
    /// A stale snapshot is served as-is while another thread is rebuilding.
    pub fn snapshot(&self) -> EngineResult<Arc<IndexSnapshot>> {
        match self.peek() {
            Some(current) if !current.is_stale(self.ttl()) => Ok(current),
            Some(stale) => {
                let Some(_guard) = self.try_build_lock() else {
                    debug!(generation = stale.generation(), "rebuild in flight, serving prior snapshot");
                    return Ok(stale);
                };
                // Another thread may have refreshed while we acquired the lock
                match self.peek() {
                    Some(current) if !current.is_stale(self.ttl()) => Ok(current),
                    _ => self.rebuild_locked(),
                }
            }
            None => {
                let _guard = self.lock_build();
                match self.peek() {
                    Some(current) => Ok(current),
                    None => self.rebuild_locked(),
                }
            }
        }
    }

    /// Build a fresh snapshot, collapsing into a rebuild that started after
    /// this call and finished while it waited for the build lock.
    pub fn build(&self) -> EngineResult<Arc<IndexSnapshot>> {
        let seen = self.builds_started.load(Ordering::Acquire);
        let _guard = self.lock_build();

        if self.installed_ticket.load(Ordering::Acquire) > seen {
            if let Some(current) = self.peek() {
                debug!(generation = current.generation(), "rebuild collapsed into concurrent build");
                return Ok(current);
            }
        }
        self.rebuild_locked()
    }

    /// Administrative refresh, regardless of TTL.
    pub fn force_refresh(&self) -> EngineResult<Arc<IndexSnapshot>> {
        info!("forced search index refresh");
        self.build()
    }

    /// Coarse candidates for a normalized query.
    pub fn query(&self, normalized_query: &str) -> EngineResult<QueryResult> {
        let snapshot = self.snapshot()?;
        let candidates = snapshot.candidates(normalized_query, self.config.candidate_limit);
        Ok(QueryResult {
            snapshot,
            candidates,
        })
    }

    pub fn stats(&self) -> Option<IndexStats> {
        self.peek().map(|s| IndexStats {
            generation: s.generation(),
            built_at: s.built_at(),
            record_count: s.len(),
            fingerprint: s.fingerprint().to_string(),
        })
    }

    /// Caller must hold `build_lock`.
    fn rebuild_locked(&self) -> EngineResult<Arc<IndexSnapshot>> {
        let _flag = RebuildFlag::raise(&self.rebuilding);
        let started = Instant::now();
        let ticket = self.builds_started.fetch_add(1, Ordering::AcqRel) + 1;

        let records = self.store.list_all_medicines()?;
        let generation = self.generation.load(Ordering::Acquire) + 1;
        let snapshot = Arc::new(IndexSnapshot::build(records, generation));

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&snapshot));
        self.generation.store(generation, Ordering::Release);
        self.installed_ticket.store(ticket, Ordering::Release);

        info!(
            generation,
            records = snapshot.len(),
            fingerprint = %snapshot.fingerprint(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "search index rebuilt"
        );
        Ok(snapshot)
    }

    fn peek(&self) -> Option<Arc<IndexSnapshot>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lock_build(&self) -> MutexGuard<'_, ()> {
        self.build_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_build_lock(&self) -> Option<MutexGuard<'_, ()>> {
        match self.build_lock.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }
}

/// Clears the rebuild-in-progress flag on every exit path.
struct RebuildFlag<'a>(&'a AtomicBool);

impl<'a> RebuildFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for RebuildFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
