//! Content-addressed verdict cache with time-to-live eviction.
//!
//! Keyed on the pane target; each entry carries a SHA-256 fingerprint of the
//! content it was computed from. A lookup hits only when the fingerprint
//! matches and the entry is younger than the TTL, so a hit can never surface
//! a verdict produced from stale content.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use crate::verdict::Verdict;

type Fingerprint = [u8; 32];

struct CacheEntry {
    fingerprint: Fingerprint,
    verdict: Verdict,
    inserted_at: Instant,
    hits: u64,
}

pub struct VerdictCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl VerdictCache {
    /// A zero TTL disables the cache: every lookup misses, every store is a
    /// no-op.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn fingerprint(content: &str) -> Fingerprint {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        hasher.finalize().into()
    }

    /// Value-copy hit iff the stored fingerprint matches `content` and the
    /// entry is within TTL. Entries past their TTL are evicted on the spot.
    pub fn lookup(&self, target: &str, content: &str) -> Option<Verdict> {
        if self.ttl.is_zero() {
            return None;
        }
        let fingerprint = Self::fingerprint(content);

        // Fast read-locked check; upgrade to the write lock only for
        // bookkeeping or eviction.
        enum Outcome {
            Hit,
            Stale,
            Miss,
        }
        let outcome = {
            let entries = self.entries.read();
            match entries.get(target) {
                Some(entry) if entry.inserted_at.elapsed() > self.ttl => Outcome::Stale,
                Some(entry) if entry.fingerprint == fingerprint => Outcome::Hit,
                _ => Outcome::Miss,
            }
        };

        match outcome {
            Outcome::Miss => None,
            Outcome::Stale => {
                let mut entries = self.entries.write();
                // Re-check under the write lock; a racing store may have
                // refreshed the entry.
                if let Some(entry) = entries.get(target) {
                    if entry.inserted_at.elapsed() > self.ttl {
                        entries.remove(target);
                    }
                }
                None
            }
            Outcome::Hit => {
                let mut entries = self.entries.write();
                match entries.get_mut(target) {
                    Some(entry)
                        if entry.fingerprint == fingerprint
                            && entry.inserted_at.elapsed() <= self.ttl =>
                    {
                        entry.hits += 1;
                        Some(entry.verdict.clone())
                    }
                    // Invalidated or replaced between the locks.
                    _ => None,
                }
            }
        }
    }

    /// Upserts; a later store for the same target replaces the earlier one.
    pub fn store(&self, target: &str, content: &str, verdict: &Verdict) {
        if self.ttl.is_zero() {
            return;
        }
        let entry = CacheEntry {
            fingerprint: Self::fingerprint(content),
            verdict: verdict.clone(),
            inserted_at: Instant::now(),
            hits: 0,
        };
        self.entries.write().insert(target.to_string(), entry);
    }

    /// Unconditional delete. Called after a nudge so the next scan
    /// re-examines the pane.
    pub fn invalidate(&self, target: &str) {
        self.entries.write().remove(target);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Total hit count across live entries, for scan summaries.
    pub fn total_hits(&self) -> u64 {
        self.entries.read().values().map(|e| e.hits).sum()
    }
}
