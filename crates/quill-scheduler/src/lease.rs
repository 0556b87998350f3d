//! Per-agent leases that keep two generation jobs for the same agent from
//! running at once.

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

/// Proof of ownership returned by [`LeaseTable::try_acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LeaseToken(Uuid);

#[derive(Debug, Clone, Copy)]
struct Lease {
    token: LeaseToken,
    expires_at: DateTime<Utc>,
}

/// Time-bounded exclusive claims keyed by agent id. An expired lease can be
/// taken over, so a crashed worker never blocks its agent for longer than
/// the TTL.
#[derive(Debug)]
pub struct LeaseTable {
    leases: DashMap<String, Lease>,
    ttl: Duration,
}

impl LeaseTable {
    pub fn new(ttl: Duration) -> Self {
        Self {
            leases: DashMap::new(),
            ttl,
        }
    }

    pub fn try_acquire(&self, agent_id: &str, now: DateTime<Utc>) -> Option<LeaseToken> {
        let lease = Lease {
            token: LeaseToken(Uuid::new_v4()),
            expires_at: now + self.ttl,
        };
        match self.leases.entry(agent_id.to_string()) {
            Entry::Occupied(mut held) => {
                if held.get().expires_at > now {
                    return None;
                }
                debug!(%agent_id, "taking over expired lease");
                held.insert(lease);
            }
            Entry::Vacant(slot) => {
                slot.insert(lease);
            }
        }
        Some(lease.token)
    }

    /// Release a lease. A stale token (the lease expired and was taken over)
    /// releases nothing.
    pub fn release(&self, agent_id: &str, token: LeaseToken) -> bool {
        self.leases
            .remove_if(agent_id, |_, lease| lease.token == token)
            .is_some()
    }

    /// Restart the TTL of a lease still owned by `token`. Returns false when
    /// the lease was released or taken over.
    pub fn renew(&self, agent_id: &str, token: LeaseToken, now: DateTime<Utc>) -> bool {
        match self.leases.get_mut(agent_id) {
            Some(mut lease) if lease.token == token => {
                lease.expires_at = now + self.ttl;
                true
            }
            _ => false,
        }
    }

    pub fn is_held(&self, agent_id: &str, now: DateTime<Utc>) -> bool {
        self.leases
            .get(agent_id)
            .is_some_and(|lease| lease.expires_at > now)
    }

    pub fn len(&self) -> usize {
        self.leases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leases.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn second_acquire_is_refused_until_release() {
        let table = LeaseTable::new(Duration::minutes(65));
        let token = table.try_acquire("a1", t0()).unwrap();
        assert!(table.try_acquire("a1", t0() + Duration::minutes(5)).is_none());
        assert!(table.try_acquire("a2", t0()).is_some());

        assert!(table.release("a1", token));
        assert!(!table.is_held("a1", t0()));
        assert!(table.try_acquire("a1", t0() + Duration::minutes(6)).is_some());
    }

    #[test]
    fn expired_lease_can_be_taken_over() {
        let table = LeaseTable::new(Duration::minutes(65));
        let stale = table.try_acquire("a1", t0()).unwrap();
        let later = t0() + Duration::minutes(66);
        assert!(!table.is_held("a1", later));

        let fresh = table.try_acquire("a1", later).unwrap();
        assert_ne!(stale, fresh);
        assert!(!table.release("a1", stale));
        assert!(table.is_held("a1", later));
        assert!(table.release("a1", fresh));
        assert!(table.is_empty());
    }

    #[test]
    fn renew_restarts_the_ttl_for_the_owner_only() {
        let table = LeaseTable::new(Duration::minutes(65));
        let stale = table.try_acquire("a1", t0()).unwrap();
        let queued = t0() + Duration::minutes(60);
        assert!(table.renew("a1", stale, queued));
        assert!(table.is_held("a1", t0() + Duration::minutes(120)));

        let later = queued + Duration::minutes(66);
        let fresh = table.try_acquire("a1", later).unwrap();
        assert!(!table.renew("a1", stale, later));
        assert!(table.renew("a1", fresh, later));
        assert!(!table.renew("a2", fresh, later));
    }
}
