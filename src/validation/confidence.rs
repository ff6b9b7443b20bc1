use crate::models::{CanonicalRecord, RecordState};

/// Change of a record's persistence gate caused by one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateTransition {
    StillPending,
    BecameEligible,
    StillEligible,
}

/// Threshold a record's aggregated confidence must reach before hand-off.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PersistenceGate {
    pub threshold: f32,
}

impl PersistenceGate {
    pub fn new(threshold: f32) -> Self {
        PersistenceGate { threshold }
    }

    pub fn is_eligible(&self, confidence: f32) -> bool {
        confidence >= self.threshold
    }
}

/// Max-based confidence aggregation. A canonical entity is as trustworthy
/// as its clearest read, so `best_confidence` never decreases.
pub struct ConfidenceAggregator;

impl ConfidenceAggregator {
    pub fn aggregate(current: Option<f32>, new: f32) -> f32 {
        match current {
            Some(current) => current.max(new),
            None => new,
        }
    }

    /// Folds `confidence` into the record and advances its state.
    /// `first` marks a record created by this observation.
    pub fn apply(
        record: &mut CanonicalRecord,
        confidence: f32,
        first: bool,
        gate: PersistenceGate,
    ) -> GateTransition {
        let current = if first { None } else { Some(record.best_confidence) };
        record.best_confidence = Self::aggregate(current, confidence);

        match record.state {
            RecordState::Eligible => GateTransition::StillEligible,
            RecordState::Pending if gate.is_eligible(record.best_confidence) => {
                record.state = RecordState::Eligible;
                GateTransition::BecameEligible
            }
            RecordState::Pending => GateTransition::StillPending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Domain, NormalizedText, RawObservation};
    use chrono::Utc;

    fn record() -> CanonicalRecord {
        let normalized = NormalizedText {
            domain: Domain::VehiclePlate,
            canonical_key: "KA02HN1828".to_string(),
            display_text: "KA 02 HN 1828".to_string(),
        };
        let observation = RawObservation::new("KA 02 HN 1828", Domain::VehiclePlate, 0.279, 261);
        CanonicalRecord::from_first(&normalized, &observation, Utc::now())
    }

    #[test]
    fn test_aggregate_is_max() {
        assert_eq!(ConfidenceAggregator::aggregate(None, 0.4), 0.4);
        assert_eq!(ConfidenceAggregator::aggregate(Some(0.4), 0.9), 0.9);
        assert_eq!(ConfidenceAggregator::aggregate(Some(0.9), 0.2), 0.9);
    }

    #[test]
    fn test_monotonic_confidence() {
        let mut rec = record();
        let gate = PersistenceGate::new(0.75);
        let confidences = [0.3, 0.1, 0.5, 0.45, 0.8, 0.2];
        let mut running_max = f32::MIN;
        for (i, c) in confidences.iter().enumerate() {
            ConfidenceAggregator::apply(&mut rec, *c, i == 0, gate);
            running_max = running_max.max(*c);
            assert_eq!(rec.best_confidence, running_max);
        }
    }

    #[test]
    fn test_first_observation_replaces_placeholder() {
        let mut rec = record();
        rec.best_confidence = 0.99;
        ConfidenceAggregator::apply(&mut rec, 0.279, true, PersistenceGate::new(0.75));
        assert_eq!(rec.best_confidence, 0.279);
    }

    #[test]
    fn test_eligibility_is_monotonic() {
        let mut rec = record();
        let gate = PersistenceGate::new(0.75);

        assert_eq!(
            ConfidenceAggregator::apply(&mut rec, 0.279, true, gate),
            GateTransition::StillPending
        );
        assert_eq!(rec.state, RecordState::Pending);

        assert_eq!(
            ConfidenceAggregator::apply(&mut rec, 0.92, false, gate),
            GateTransition::BecameEligible
        );
        assert_eq!(rec.state, RecordState::Eligible);

        for c in [0.0, 0.1, 0.74] {
            assert_eq!(
                ConfidenceAggregator::apply(&mut rec, c, false, gate),
                GateTransition::StillEligible
            );
            assert_eq!(rec.state, RecordState::Eligible);
        }
    }

    #[test]
    fn test_zero_threshold_is_immediately_eligible() {
        let mut rec = record();
        assert_eq!(
            ConfidenceAggregator::apply(&mut rec, 0.0, true, PersistenceGate::new(0.0)),
            GateTransition::BecameEligible
        );
    }
}
