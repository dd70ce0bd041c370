use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use super::Event;

/// Most-recent accepted event per target. Entries expire on snapshot once
/// older than the store TTL.
pub struct EventStore {
    ttl: Duration,
    events: RwLock<HashMap<String, (Event, Instant)>>,
}

impl EventStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            events: RwLock::new(HashMap::new()),
        }
    }

    /// A later event for the same target overwrites the earlier one.
    pub fn upsert(&self, event: Event) {
        self.events
            .write()
            .insert(event.target.clone(), (event, Instant::now()));
    }

    /// The live event for one target, if any.
    pub fn latest(&self, target: &str) -> Option<Event> {
        let events = self.events.read();
        let (event, received) = events.get(target)?;
        if received.elapsed() > self.ttl {
            return None;
        }
        Some(event.clone())
    }

    /// Value-copy slice of live events, sorted by target with ties broken by
    /// timestamp. Expired entries are dropped from the store as a side
    /// effect.
    pub fn snapshot(&self) -> Vec<Event> {
        let expired: Vec<String> = {
            let events = self.events.read();
            events
                .iter()
                .filter(|(_, (_, received))| received.elapsed() > self.ttl)
                .map(|(target, _)| target.clone())
                .collect()
        };
        if !expired.is_empty() {
            let mut events = self.events.write();
            for target in &expired {
                if let Some((_, received)) = events.get(target) {
                    if received.elapsed() > self.ttl {
                        events.remove(target);
                    }
                }
            }
        }

        let mut out: Vec<Event> = {
            let events = self.events.read();
            events
                .values()
                .filter(|(_, received)| received.elapsed() <= self.ttl)
                .map(|(event, _)| event.clone())
                .collect()
        };
        out.sort_by(|a, b| a.target.cmp(&b.target).then(a.ts.cmp(&b.ts)));
        out
    }

    /// Only events in the "needs human" states.
    pub fn snapshot_attention(&self) -> Vec<Event> {
        self.snapshot()
            .into_iter()
            .filter(|e| e.state.needs_attention())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::AgentState;
    use chrono::{TimeZone, Utc};

    fn event(target: &str, state: AgentState, ts: i64) -> Event {
        Event {
            assistant: "claude".to_string(),
            state,
            target: target.to_string(),
            ts: Utc.timestamp_opt(ts, 0).unwrap(),
            message: None,
        }
    }

    #[test]
    fn test_upsert_overwrites_by_target() {
        let store = EventStore::new(Duration::from_secs(60));
        store.upsert(event("dev:0.1", AgentState::Running, 100));
        store.upsert(event("dev:0.1", AgentState::WaitingApproval, 200));

        assert_eq!(store.len(), 1);
        let latest = store.latest("dev:0.1").unwrap();
        assert_eq!(latest.state, AgentState::WaitingApproval);
        assert_eq!(latest.ts.timestamp(), 200);
    }

    #[test]
    fn test_snapshot_sorted_by_target() {
        let store = EventStore::new(Duration::from_secs(60));
        store.upsert(event("zeta:0.0", AgentState::Idle, 100));
        store.upsert(event("alpha:0.0", AgentState::Running, 300));
        store.upsert(event("mid:2.1", AgentState::WaitingInput, 200));

        let targets: Vec<String> = store.snapshot().into_iter().map(|e| e.target).collect();
        assert_eq!(targets, vec!["alpha:0.0", "mid:2.1", "zeta:0.0"]);
    }

    #[test]
    fn test_snapshot_expires_old_entries() {
        let store = EventStore::new(Duration::from_millis(10));
        store.upsert(event("dev:0.1", AgentState::Running, 100));
        std::thread::sleep(Duration::from_millis(25));
        store.upsert(event("dev:0.2", AgentState::Running, 200));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].target, "dev:0.2");
        // Expired entry was deleted, not just filtered.
        assert_eq!(store.len(), 1);
        assert!(store.latest("dev:0.1").is_none());
    }

    #[test]
    fn test_attention_filter() {
        let store = EventStore::new(Duration::from_secs(60));
        store.upsert(event("a:0.0", AgentState::WaitingInput, 1));
        store.upsert(event("b:0.0", AgentState::WaitingApproval, 2));
        store.upsert(event("c:0.0", AgentState::Running, 3));
        store.upsert(event("d:0.0", AgentState::Completed, 4));
        store.upsert(event("e:0.0", AgentState::Error, 5));
        store.upsert(event("f:0.0", AgentState::Idle, 6));

        let attention = store.snapshot_attention();
        let targets: Vec<String> = attention.into_iter().map(|e| e.target).collect();
        assert_eq!(targets, vec!["a:0.0", "b:0.0"]);
    }
}
