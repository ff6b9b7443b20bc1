use crate::models::{CanonicalRecord, Domain, NormalizedText, RawObservation};
use crate::tracking::SessionStats;
use crate::utils::Rejection;
use crate::validation::{ConfidenceAggregator, GateTransition, PersistenceGate};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Result of routing one accepted observation to its record.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedUpdate {
    pub record: CanonicalRecord,
    pub created: bool,
    pub transition: GateTransition,
}

/// Everything a session produced, handed back when it ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub label: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub records: Vec<CanonicalRecord>,
    pub stats: SessionStats,
}

#[derive(Default)]
struct SessionState {
    records: HashMap<String, CanonicalRecord>,
    stats: SessionStats,
}

/// Owns the canonical records of one processing session.
///
/// Create-or-update of a key and its confidence update run under a single
/// lock, so concurrent capture streams observing a new key at the same time
/// produce one record holding both observations.
pub struct DeduplicationTracker {
    label: String,
    started_at: DateTime<Utc>,
    state: Mutex<SessionState>,
}

impl DeduplicationTracker {
    pub fn start_session(label: impl Into<String>) -> Self {
        let label = label.into();
        log::info!("Session {} started", label);
        DeduplicationTracker {
            label,
            started_at: Utc::now(),
            state: Mutex::new(SessionState::default()),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn observe(
        &self,
        normalized: &NormalizedText,
        observation: &RawObservation,
        gate: PersistenceGate,
    ) -> TrackedUpdate {
        self.observe_then(normalized, observation, gate, |_| ()).0
    }

    /// Like [`observe`](Self::observe), but runs `then` on the update before
    /// the session lock is released. Updates to a key reach `then` in the
    /// order they were applied.
    pub fn observe_then<R>(
        &self,
        normalized: &NormalizedText,
        observation: &RawObservation,
        gate: PersistenceGate,
        then: impl FnOnce(&TrackedUpdate) -> R,
    ) -> (TrackedUpdate, R) {
        let at = observation.captured_at.unwrap_or_else(Utc::now);
        let confidence = observation.clamped_confidence();

        let mut state = self.state.lock();
        let SessionState { records, stats } = &mut *state;

        let mut created = false;
        let record = records
            .entry(normalized.canonical_key.clone())
            .and_modify(|record| {
                record.observation_count += 1;
                record.variants_seen.insert(observation.raw_text.clone());
                if at > record.last_seen_at {
                    record.last_seen_at = at;
                }
            })
            .or_insert_with(|| {
                created = true;
                CanonicalRecord::from_first(normalized, observation, at)
            });

        let transition = ConfidenceAggregator::apply(record, confidence, created, gate);

        let domain_stats = stats.domain_mut(normalized.domain);
        domain_stats.observations += 1;
        domain_stats.accepted += 1;
        if created {
            domain_stats.records_created += 1;
            log::info!(
                "[{}] New {} record {} (source {})",
                self.label,
                record.domain,
                record.display_text,
                record.first_seen
            );
        }
        if transition == GateTransition::BecameEligible {
            domain_stats.records_eligible += 1;
            log::info!(
                "[{}] {} eligible at confidence {:.3} after {} observation(s)",
                self.label,
                record.display_text,
                record.best_confidence,
                record.observation_count
            );
        }

        let update = TrackedUpdate {
            record: record.clone(),
            created,
            transition,
        };
        let result = then(&update);
        drop(state);
        (update, result)
    }

    /// Counts an observation the normalizer turned away.
    pub fn record_rejection(&self, domain: Domain, rejection: &Rejection) {
        self.state.lock().stats.record_rejection(domain, rejection);
    }

    pub(crate) fn record_sink_failure(&self) {
        self.state.lock().stats.sink_failures += 1;
    }

    pub fn get(&self, canonical_key: &str) -> Option<CanonicalRecord> {
        self.state.lock().records.get(canonical_key).cloned()
    }

    /// Copy of all records ordered by first sighting.
    pub fn snapshot(&self) -> Vec<CanonicalRecord> {
        let mut records: Vec<CanonicalRecord> = self.state.lock().records.values().cloned().collect();
        records.sort_by(|a, b| {
            a.first_seen
                .cmp(&b.first_seen)
                .then_with(|| a.canonical_key.cmp(&b.canonical_key))
        });
        records
    }

    pub fn stats(&self) -> SessionStats {
        self.state.lock().stats.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn end_session(self) -> SessionSummary {
        let records = self.snapshot();
        let stats = self.stats();
        let total = stats.total();
        log::info!(
            "Session {} ended: {} record(s), {}/{} observation(s) rejected",
            self.label,
            records.len(),
            total.rejected(),
            total.observations
        );
        SessionSummary {
            label: self.label,
            started_at: self.started_at,
            ended_at: Utc::now(),
            records,
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordState;
    use crate::processing::Normalizer;
    use std::sync::Arc;
    use std::thread;

    const PLATE_GATE: PersistenceGate = PersistenceGate { threshold: 0.75 };

    fn observe(tracker: &DeduplicationTracker, text: &str, confidence: f32, index: u64) -> TrackedUpdate {
        let observation = RawObservation::new(text, Domain::VehiclePlate, confidence, index);
        let normalized = Normalizer::default()
            .normalize(text, Domain::VehiclePlate)
            .unwrap();
        tracker.observe(&normalized, &observation, PLATE_GATE)
    }

    #[test]
    fn test_new_record_then_update() {
        let tracker = DeduplicationTracker::start_session("gate-1");

        let first = observe(&tracker, "KA 02 HN 1828", 0.279, 261);
        assert!(first.created);
        assert_eq!(first.transition, GateTransition::StillPending);
        assert_eq!(first.record.canonical_key, "KA02HN1828");
        assert_eq!(first.record.display_text, "KA 02 HN 1828");
        assert_eq!(first.record.observation_count, 1);
        assert_eq!(first.record.first_seen, 261);
        assert_eq!(first.record.state, RecordState::Pending);

        let second = observe(&tracker, "KA02HN1828", 0.92, 270);
        assert!(!second.created);
        assert_eq!(second.transition, GateTransition::BecameEligible);
        assert_eq!(second.record.observation_count, 2);
        assert_eq!(second.record.first_seen, 261);
        assert_eq!(second.record.best_confidence, 0.92);
        assert_eq!(second.record.state, RecordState::Eligible);
        assert_eq!(second.record.variants_seen.len(), 2);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_repeated_variant_counts_each_observation() {
        let tracker = DeduplicationTracker::start_session("gate-1");
        for i in 0..3 {
            observe(&tracker, "KA02HN1828", 0.5, i);
        }
        let record = tracker.get("KA02HN1828").unwrap();
        assert_eq!(record.observation_count, 3);
        assert_eq!(record.variants_seen.len(), 1);
    }

    #[test]
    fn test_distinct_keys_stay_distinct() {
        let tracker = DeduplicationTracker::start_session("gate-1");
        observe(&tracker, "KA02HN1828", 0.5, 1);
        observe(&tracker, "KA02HN1829", 0.5, 2);
        observe(&tracker, "MH12AB1234", 0.5, 0);

        let keys: Vec<String> = tracker.snapshot().into_iter().map(|r| r.canonical_key).collect();
        assert_eq!(keys, vec!["MH12AB1234", "KA02HN1828", "KA02HN1829"]);
    }

    #[test]
    fn test_sessions_are_independent() {
        let north = DeduplicationTracker::start_session("north");
        let south = DeduplicationTracker::start_session("south");
        observe(&north, "KA02HN1828", 0.9, 1);

        assert_eq!(north.len(), 1);
        assert!(south.is_empty());
        assert!(south.get("KA02HN1828").is_none());
    }

    #[test]
    fn test_concurrent_first_observations_merge() {
        let tracker = Arc::new(DeduplicationTracker::start_session("dual-camera"));
        let handles: Vec<_> = (0..8u64)
            .map(|i| {
                let tracker = Arc::clone(&tracker);
                thread::spawn(move || {
                    for j in 0..25u64 {
                        observe(&tracker, "KA02HN1828", 0.5, i * 100 + j);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(tracker.len(), 1);
        let record = tracker.get("KA02HN1828").unwrap();
        assert_eq!(record.observation_count, 200);
        let stats = tracker.stats().domain(Domain::VehiclePlate);
        assert_eq!(stats.records_created, 1);
        assert_eq!(stats.accepted, 200);
    }

    #[test]
    fn test_observe_then_sees_updates_in_order() {
        let tracker = Arc::new(DeduplicationTracker::start_session("dual-camera"));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handles: Vec<_> = (0..4u64)
            .map(|i| {
                let tracker = Arc::clone(&tracker);
                let seen = Arc::clone(&seen);
                thread::spawn(move || {
                    let normalized = Normalizer::default()
                        .normalize("KA02HN1828", Domain::VehiclePlate)
                        .unwrap();
                    for j in 0..500u64 {
                        let observation =
                            RawObservation::new("KA02HN1828", Domain::VehiclePlate, 0.9, i * 1000 + j);
                        tracker.observe_then(&normalized, &observation, PLATE_GATE, |update| {
                            seen.lock().push(update.record.observation_count)
                        });
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let seen = seen.lock();
        assert_eq!(seen.len(), 2000);
        assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_end_session_summary() {
        let tracker = DeduplicationTracker::start_session("gate-1");
        observe(&tracker, "KA02HN1828", 0.8, 1);
        tracker.record_rejection(
            Domain::VehiclePlate,
            &Rejection::MalformedInput { raw: "###".to_string() },
        );

        let summary = tracker.end_session();
        assert_eq!(summary.label, "gate-1");
        assert_eq!(summary.records.len(), 1);
        let plate = summary.stats.domain(Domain::VehiclePlate);
        assert_eq!(plate.observations, 2);
        assert_eq!(plate.rejected_malformed, 1);
        assert_eq!(plate.records_eligible, 1);
        assert!(summary.ended_at >= summary.started_at);
    }
}
