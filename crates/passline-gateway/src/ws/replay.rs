use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use passline_core::config::{REPLAY_CAPACITY, REPLAY_TTL_SECS};
use passline_core::types::{DomainEvent, VenueId};

/// A domain event plus the moment it entered the cache.
#[derive(Debug, Clone)]
pub struct CachedEvent {
    pub event: DomainEvent,
    pub cached_at: DateTime<Utc>,
}

/// Per-venue bounded, time-limited buffer of recent events.
///
/// Best-effort convenience for late joiners, not a correctness guarantee:
/// process memory only, reset on restart. Eviction is positional — oldest
/// entries fall off on capacity, and anything past the TTL is pruned
/// whenever the queue is touched.
pub struct ReplayCache {
    venues: DashMap<VenueId, VecDeque<CachedEvent>>,
    capacity: usize,
    ttl: Duration,
}

impl ReplayCache {
    pub fn new() -> Self {
        Self::with_limits(REPLAY_CAPACITY, REPLAY_TTL_SECS)
    }

    pub fn with_limits(capacity: usize, ttl_secs: i64) -> Self {
        Self {
            venues: DashMap::new(),
            capacity,
            ttl: Duration::seconds(ttl_secs),
        }
    }

    /// Append an event to the venue's queue, trimming to capacity and TTL.
    pub fn append(&self, venue_id: &VenueId, event: DomainEvent, now: DateTime<Utc>) {
        let mut queue = self.venues.entry(venue_id.clone()).or_default();
        Self::prune_expired(&mut queue, now, self.ttl);
        queue.push_back(CachedEvent {
            event,
            cached_at: now,
        });
        while queue.len() > self.capacity {
            queue.pop_front();
        }
    }

    /// The most recent `limit` live entries, oldest first.
    pub fn replay(&self, venue_id: &VenueId, limit: usize, now: DateTime<Utc>) -> Vec<CachedEvent> {
        let mut queue = match self.venues.get_mut(venue_id) {
            Some(q) => q,
            None => return Vec::new(),
        };
        Self::prune_expired(&mut queue, now, self.ttl);
        let skip = queue.len().saturating_sub(limit);
        queue.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self, venue_id: &VenueId) -> usize {
        self.venues.get(venue_id).map(|q| q.len()).unwrap_or(0)
    }

    fn prune_expired(queue: &mut VecDeque<CachedEvent>, now: DateTime<Utc>, ttl: Duration) {
        let cutoff = now - ttl;
        while queue.front().is_some_and(|e| e.cached_at < cutoff) {
            queue.pop_front();
        }
    }
}

impl Default for ReplayCache {
    fn default() -> Self {
        Self::new()
    }
}
