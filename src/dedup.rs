//! Request deduplication.
//!
//! Coalesces concurrent identical outbound requests into one in-flight
//! operation: at most one physical call per distinct key at any instant,
//! with every caller observing the same resolved value or the same error.
//! Check-then-insert runs under the map's shard lock so two callers can
//! never both believe they are first.

use dashmap::DashMap;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::NetworkError;
use crate::metrics;
use crate::transport::SendOutcome;

pub type CallResult = Result<SendOutcome, NetworkError>;
type SharedCall = Shared<BoxFuture<'static, CallResult>>;

struct InFlightEntry {
    call: SharedCall,
    generation: u64,
    registered_at: Instant,
}

pub struct RequestDeduplicator {
    in_flight: DashMap<String, InFlightEntry>,
    /// Entries older than this are presumed stuck and replaced; bounds the
    /// pathological case of a future that never settles
    expiry: Duration,
    generation: AtomicU64,
}

impl RequestDeduplicator {
    pub fn new(expiry_ms: u64) -> Self {
        Self {
            in_flight: DashMap::new(),
            expiry: Duration::from_millis(expiry_ms),
            generation: AtomicU64::new(0),
        }
    }

    /// Canonical key for an outbound call: endpoint plus serialized body.
    pub fn canonical_key(endpoint: &str, body: &serde_json::Value) -> String {
        format!("{}|{}", endpoint, body)
    }

    /// Join the in-flight call registered under `key`, or start one via
    /// `start`. The entry is removed when the call settles or when the
    /// expiry window passes, whichever comes first.
    pub async fn coalesce<F>(&self, key: &str, start: F) -> CallResult
    where
        F: FnOnce() -> BoxFuture<'static, CallResult>,
    {
        use dashmap::mapref::entry::Entry;

        let (call, generation, joined) = match self.in_flight.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().registered_at.elapsed() < self.expiry {
                    let entry = occupied.get();
                    (entry.call.clone(), entry.generation, true)
                } else {
                    let generation = self.generation.fetch_add(1, Ordering::Relaxed);
                    let call = start().shared();
                    occupied.insert(InFlightEntry {
                        call: call.clone(),
                        generation,
                        registered_at: Instant::now(),
                    });
                    (call, generation, false)
                }
            }
            Entry::Vacant(vacant) => {
                let generation = self.generation.fetch_add(1, Ordering::Relaxed);
                let call = start().shared();
                vacant.insert(InFlightEntry {
                    call: call.clone(),
                    generation,
                    registered_at: Instant::now(),
                });
                (call, generation, false)
            }
        };

        if joined {
            metrics::DEDUP_COALESCED.inc();
            debug!(key, "joined in-flight request");
        }

        let result = call.await;

        // remove on settle, but only the generation this caller awaited;
        // a replacement registered meanwhile stays put
        self.in_flight
            .remove_if(key, |_, entry| entry.generation == generation);

        result
    }

    /// Drop entries past the expiry window. Returns the number removed.
    pub fn sweep(&self) -> usize {
        let before = self.in_flight.len();
        let expiry = self.expiry;
        self.in_flight
            .retain(|_, entry| entry.registered_at.elapsed() < expiry);
        let removed = before.saturating_sub(self.in_flight.len());
        if removed > 0 {
            debug!(removed, "dedup sweep dropped stuck entries");
        }
        removed
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }
}
