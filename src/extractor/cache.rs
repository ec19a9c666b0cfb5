//! Process-wide cache of extracted repositories.
//!
//! Each identifier owns one slot holding a [`OnceCell`]. Concurrent callers
//! for the same identifier share the cell, so only the first runs the
//! extraction and the rest wait for its outcome. Failed outcomes are removed
//! from the map right away, leaving nothing registered for the next caller.
//!
//! The map is bounded: slots idle for longer than the TTL expire, and when
//! the capacity is exceeded the least recently used finished slot goes first.
//! A slot whose extraction was abandoned (every caller dropped before it
//! finished) is pruned on the next access.
//! Removing a slot only drops the cache's handle; storage is reclaimed on a
//! blocking thread when the last reader lets go of its `Arc`.
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex as TokioMutex, OnceCell};
use tracing::{debug, info};

use super::ExtractedRepository;
use crate::error::ViewerError;

pub type Outcome = Result<Arc<ExtractedRepository>, ViewerError>;

struct Slot {
    cell: Arc<OnceCell<Outcome>>,
    last_access: Instant,
}

impl Slot {
    /// Finished with a usable repository (not in flight, not failed).
    fn is_ready(&self) -> bool {
        matches!(self.cell.get(), Some(Ok(_)))
    }

    /// Never initialized and nobody outside the map is waiting on it.
    fn is_abandoned(&self) -> bool {
        !self.cell.initialized() && Arc::strong_count(&self.cell) == 1
    }
}

/// Drop removed slots on a blocking thread; deleting a large tree must not
/// stall the runtime.
fn reclaim(slots: Vec<Slot>) -> Option<tokio::task::JoinHandle<()>> {
    if slots.is_empty() {
        return None;
    }
    Some(tokio::task::spawn_blocking(move || drop(slots)))
}

pub struct RepositoryCache {
    slots: TokioMutex<HashMap<String, Slot>>,
    capacity: usize,
    ttl: Option<Duration>,
}

impl RepositoryCache {
    /// `capacity` is clamped to at least one entry.
    #[must_use]
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        Self {
            slots: TokioMutex::new(HashMap::new()),
            capacity: capacity.max(1),
            ttl,
        }
    }

    /// Return the cached repository for `cid`, running `extract` only if no
    /// other caller has produced or is producing it.
    pub async fn get_or_extract<F, Fut>(&self, cid: &str, extract: F) -> Outcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Outcome>,
    {
        let (cell, dropped) = {
            let mut slots = self.slots.lock().await;
            let now = Instant::now();
            let mut dropped = self.expire(&mut slots, now);

            let cell = match slots.get_mut(cid) {
                Some(slot) => {
                    slot.last_access = now;
                    if slot.is_ready() {
                        debug!("cache hit for {cid}");
                    } else {
                        debug!("joining in-flight extraction of {cid}");
                    }
                    slot.cell.clone()
                }
                None => {
                    debug!("cache miss for {cid}");
                    let cell = Arc::new(OnceCell::new());
                    slots.insert(
                        cid.to_string(),
                        Slot {
                            cell: cell.clone(),
                            last_access: now,
                        },
                    );
                    dropped.extend(self.enforce_capacity(&mut slots, cid));
                    cell
                }
            };
            (cell, dropped)
        };
        reclaim(dropped);

        let outcome = cell.get_or_init(extract).await.clone();
        if outcome.is_err() {
            self.discard(cid, &cell).await;
        }
        outcome
    }

    /// Cached repository for `cid`, if one finished extracting and is live.
    pub async fn get(&self, cid: &str) -> Option<Arc<ExtractedRepository>> {
        let mut slots = self.slots.lock().await;
        let now = Instant::now();
        let dropped = self.expire(&mut slots, now);

        let slot = slots.get_mut(cid)?;
        let repo = match slot.cell.get() {
            Some(Ok(repo)) => repo.clone(),
            _ => return None,
        };
        slot.last_access = now;
        drop(slots);
        reclaim(dropped);
        Some(repo)
    }

    /// Remove `cid` from the cache. Returns `true` if it was present.
    /// Storage no reader still holds is gone when this returns.
    pub async fn evict(&self, cid: &str) -> bool {
        let Some(removed) = self.slots.lock().await.remove(cid) else {
            return false;
        };
        info!("evicted {cid} from repository cache");
        if let Some(handle) = reclaim(vec![removed]) {
            let _ = handle.await;
        }
        true
    }

    /// Drop every slot. Returns how many were removed.
    pub async fn clear(&self) -> usize {
        let drained: Vec<Slot> = self.slots.lock().await.drain().map(|(_, s)| s).collect();
        let count = drained.len();
        if let Some(handle) = reclaim(drained) {
            info!(count, "cleared repository cache");
            let _ = handle.await;
        }
        count
    }

    /// Number of slots, including in-flight extractions.
    pub async fn len(&self) -> usize {
        let mut slots = self.slots.lock().await;
        Self::prune_abandoned(&mut slots);
        slots.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Identifiers of finished extractions, most recently used first.
    pub async fn cached_ids(&self) -> Vec<String> {
        let slots = self.slots.lock().await;
        let mut ready: Vec<(&String, Instant)> = slots
            .iter()
            .filter(|(_, s)| s.is_ready())
            .map(|(k, s)| (k, s.last_access))
            .collect();
        ready.sort_by(|a, b| b.1.cmp(&a.1));
        ready.into_iter().map(|(k, _)| k.clone()).collect()
    }

    /// Remove the slot for `cid` if it still holds the failed `cell`.
    async fn discard(&self, cid: &str, cell: &Arc<OnceCell<Outcome>>) {
        let mut slots = self.slots.lock().await;
        if slots
            .get(cid)
            .is_some_and(|slot| Arc::ptr_eq(&slot.cell, cell))
        {
            slots.remove(cid);
            debug!("discarded failed extraction of {cid}");
        }
    }

    /// Remove slots left behind by cancelled extractions.
    fn prune_abandoned(slots: &mut HashMap<String, Slot>) -> Vec<Slot> {
        let abandoned: Vec<String> = slots
            .iter()
            .filter(|(_, s)| s.is_abandoned())
            .map(|(k, _)| k.clone())
            .collect();

        abandoned
            .into_iter()
            .filter_map(|cid| {
                debug!("pruning abandoned extraction of {cid}");
                slots.remove(&cid)
            })
            .collect()
    }

    fn expire(&self, slots: &mut HashMap<String, Slot>, now: Instant) -> Vec<Slot> {
        let mut removed = Self::prune_abandoned(slots);
        let Some(ttl) = self.ttl else {
            return removed;
        };

        let stale: Vec<String> = slots
            .iter()
            .filter(|(_, s)| s.is_ready() && now.duration_since(s.last_access) >= ttl)
            .map(|(k, _)| k.clone())
            .collect();

        removed.extend(stale.into_iter().filter_map(|cid| {
            info!("expiring idle extraction of {cid}");
            slots.remove(&cid)
        }));
        removed
    }

    /// Evict least recently used finished slots until within capacity.
    /// In-flight slots and `keep` are never chosen.
    fn enforce_capacity(&self, slots: &mut HashMap<String, Slot>, keep: &str) -> Vec<Slot> {
        let mut evicted = Vec::new();
        while slots.len() > self.capacity {
            let victim = slots
                .iter()
                .filter(|(k, s)| k.as_str() != keep && s.is_ready())
                .min_by_key(|(_, s)| s.last_access)
                .map(|(k, _)| k.clone());

            let Some(victim) = victim else {
                break;
            };
            info!("evicting least recently used extraction of {victim}");
            if let Some(slot) = slots.remove(&victim) {
                evicted.push(slot);
            }
        }
        evicted
    }
}
