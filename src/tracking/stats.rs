use crate::models::Domain;
use crate::utils::Rejection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-domain counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainStats {
    pub observations: u64,
    pub accepted: u64,
    pub rejected_malformed: u64,
    pub rejected_grammar: u64,
    pub records_created: u64,
    pub records_eligible: u64,
}

impl DomainStats {
    pub fn rejected(&self) -> u64 {
        self.rejected_malformed + self.rejected_grammar
    }

    /// Share of observations that contributed nothing, 0.0 when idle.
    pub fn rejection_rate(&self) -> f64 {
        if self.observations == 0 {
            0.0
        } else {
            self.rejected() as f64 / self.observations as f64
        }
    }
}

/// Aggregate counters operators use to tune camera angle and lighting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub by_domain: BTreeMap<Domain, DomainStats>,
    pub sink_failures: u64,
}

impl SessionStats {
    pub fn domain(&self, domain: Domain) -> DomainStats {
        self.by_domain.get(&domain).copied().unwrap_or_default()
    }

    pub(crate) fn domain_mut(&mut self, domain: Domain) -> &mut DomainStats {
        self.by_domain.entry(domain).or_default()
    }

    pub(crate) fn record_rejection(&mut self, domain: Domain, rejection: &Rejection) {
        let stats = self.domain_mut(domain);
        stats.observations += 1;
        if rejection.is_malformed() {
            stats.rejected_malformed += 1;
        } else {
            stats.rejected_grammar += 1;
        }
    }

    pub fn total(&self) -> DomainStats {
        self.by_domain.values().fold(DomainStats::default(), |acc, s| DomainStats {
            observations: acc.observations + s.observations,
            accepted: acc.accepted + s.accepted,
            rejected_malformed: acc.rejected_malformed + s.rejected_malformed,
            rejected_grammar: acc.rejected_grammar + s.rejected_grammar,
            records_created: acc.records_created + s.records_created,
            records_eligible: acc.records_eligible + s.records_eligible,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::MismatchReason;

    #[test]
    fn test_rejection_rate() {
        let mut stats = SessionStats::default();
        assert_eq!(stats.domain(Domain::VehiclePlate).rejection_rate(), 0.0);

        stats.record_rejection(
            Domain::VehiclePlate,
            &Rejection::MalformedInput { raw: "###".to_string() },
        );
        stats.record_rejection(
            Domain::VehiclePlate,
            &Rejection::GrammarMismatch {
                domain: Domain::VehiclePlate,
                candidate: "OZHNIE2E1".to_string(),
                reason: MismatchReason::Pattern,
            },
        );
        let plate = stats.domain_mut(Domain::VehiclePlate);
        plate.observations += 2;
        plate.accepted += 2;

        let plate = stats.domain(Domain::VehiclePlate);
        assert_eq!(plate.rejected(), 2);
        assert!((plate.rejection_rate() - 0.5).abs() < f64::EPSILON);
        assert_eq!(stats.total().observations, 4);
        assert_eq!(stats.domain(Domain::MoodleId), DomainStats::default());
    }
}
