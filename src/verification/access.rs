use crate::config::AccessConfig;
use crate::models::{CanonicalRecord, Domain};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Plate and ID card both verified within the window
    Matched,
    /// One identification was enough
    Partial,
    /// The counterpart never arrived
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessDecision {
    Granted,
    Denied,
}

/// One gate decision, ready for the access log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessEvent {
    pub at: DateTime<Utc>,
    pub plate: Option<String>,
    pub moodle_id: Option<String>,
    pub status: MatchStatus,
    pub decision: AccessDecision,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessStats {
    pub total_attempts: u64,
    pub access_granted: u64,
    pub access_denied: u64,
    pub both_verified: u64,
    pub vehicle_only: u64,
    pub id_card_only: u64,
}

#[derive(Debug, Clone)]
struct PendingVerification {
    domain: Domain,
    key: String,
    at: DateTime<Utc>,
}

/// Pairs eligible vehicle plates with eligible ID cards seen close together
/// in time.
#[derive(Debug, Clone)]
pub struct AccessMatcher {
    window: Duration,
    require_both: bool,
    pending: Vec<PendingVerification>,
    stats: AccessStats,
}

impl AccessMatcher {
    pub fn new(config: &AccessConfig) -> Self {
        AccessMatcher {
            window: Duration::seconds(config.window_secs.min(u64::from(u32::MAX)) as i64),
            require_both: config.require_both,
            pending: Vec::new(),
            stats: AccessStats::default(),
        }
    }

    pub fn stats(&self) -> AccessStats {
        self.stats
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Offers an eligible record. Returns the decisions it
    /// caused, including timeouts of older pending reads.
    pub fn offer(&mut self, record: &CanonicalRecord, at: DateTime<Utc>) -> Vec<AccessEvent> {
        let mut events = self.expire(at);

        if !self.require_both {
            let event = match record.domain {
                Domain::VehiclePlate => {
                    self.stats.vehicle_only += 1;
                    Self::event(at, Some(record.canonical_key.as_str()), None, MatchStatus::Partial, None)
                }
                Domain::MoodleId => {
                    self.stats.id_card_only += 1;
                    Self::event(at, None, Some(record.canonical_key.as_str()), MatchStatus::Partial, None)
                }
            };
            self.stats.total_attempts += 1;
            self.stats.access_granted += 1;
            events.push(event);
            return events;
        }

        let counterpart = self
            .pending
            .iter()
            .position(|p| p.domain != record.domain);

        match counterpart {
            Some(index) => {
                let other = self.pending.remove(index);
                let (plate, moodle_id) = match record.domain {
                    Domain::VehiclePlate => (record.canonical_key.as_str(), other.key.as_str()),
                    Domain::MoodleId => (other.key.as_str(), record.canonical_key.as_str()),
                };
                log::info!("Access granted: ID {} with vehicle {}", moodle_id, plate);
                self.stats.total_attempts += 1;
                self.stats.access_granted += 1;
                self.stats.both_verified += 1;
                events.push(Self::event(
                    at,
                    Some(plate),
                    Some(moodle_id),
                    MatchStatus::Matched,
                    None,
                ));
            }
            None => {
                log::debug!(
                    "{} {} waiting for its counterpart",
                    record.domain,
                    record.canonical_key
                );
                match self
                    .pending
                    .iter_mut()
                    .find(|p| p.key == record.canonical_key)
                {
                    Some(existing) => existing.at = at,
                    None => self.pending.push(PendingVerification {
                        domain: record.domain,
                        key: record.canonical_key.clone(),
                        at,
                    }),
                }
            }
        }
        events
    }

    /// Denies every pending read older than the window at `now`.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Vec<AccessEvent> {
        let window = self.window;
        let (expired, kept): (Vec<_>, Vec<_>) = self
            .pending
            .drain(..)
            .partition(|p| now.signed_duration_since(p.at) > window);
        self.pending = kept;

        expired
            .into_iter()
            .map(|p| {
                log::info!("Access denied: {} {} timed out", p.domain, p.key);
                self.stats.total_attempts += 1;
                self.stats.access_denied += 1;
                let (plate, moodle_id) = match p.domain {
                    Domain::VehiclePlate => (Some(p.key.as_str()), None),
                    Domain::MoodleId => (None, Some(p.key.as_str())),
                };
                Self::event(
                    now,
                    plate,
                    moodle_id,
                    MatchStatus::TimedOut,
                    Some("Verification timeout"),
                )
            })
            .collect()
    }

    fn event(
        at: DateTime<Utc>,
        plate: Option<&str>,
        moodle_id: Option<&str>,
        status: MatchStatus,
        reason: Option<&str>,
    ) -> AccessEvent {
        AccessEvent {
            at,
            plate: plate.map(str::to_string),
            moodle_id: moodle_id.map(str::to_string),
            status,
            decision: match status {
                MatchStatus::TimedOut => AccessDecision::Denied,
                _ => AccessDecision::Granted,
            },
            reason: reason.map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NormalizedText, RawObservation};
    use chrono::TimeZone;

    fn record(domain: Domain, key: &str) -> CanonicalRecord {
        let normalized = NormalizedText {
            domain,
            canonical_key: key.to_string(),
            display_text: key.to_string(),
        };
        let observation = RawObservation::new(key, domain, 0.9, 1);
        CanonicalRecord::from_first(&normalized, &observation, Utc::now())
    }

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_plate_then_id_within_window() {
        let mut matcher = AccessMatcher::new(&AccessConfig::default());

        assert!(matcher.offer(&record(Domain::VehiclePlate, "KA02HN1828"), t(0)).is_empty());
        assert_eq!(matcher.pending_len(), 1);

        let events = matcher.offer(&record(Domain::MoodleId, "22102003"), t(12));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, MatchStatus::Matched);
        assert_eq!(events[0].decision, AccessDecision::Granted);
        assert_eq!(events[0].plate.as_deref(), Some("KA02HN1828"));
        assert_eq!(events[0].moodle_id.as_deref(), Some("22102003"));
        assert_eq!(matcher.pending_len(), 0);
        assert_eq!(matcher.stats().both_verified, 1);
    }

    #[test]
    fn test_counterpart_after_window_times_out() {
        let mut matcher = AccessMatcher::new(&AccessConfig::default());
        matcher.offer(&record(Domain::MoodleId, "22102003"), t(0));

        let events = matcher.offer(&record(Domain::VehiclePlate, "KA02HN1828"), t(31));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, MatchStatus::TimedOut);
        assert_eq!(events[0].decision, AccessDecision::Denied);
        assert_eq!(events[0].moodle_id.as_deref(), Some("22102003"));
        assert_eq!(events[0].reason.as_deref(), Some("Verification timeout"));
        // the plate now waits on its own
        assert_eq!(matcher.pending_len(), 1);
        assert_eq!(matcher.stats().access_denied, 1);
    }

    #[test]
    fn test_same_domain_does_not_pair() {
        let mut matcher = AccessMatcher::new(&AccessConfig::default());
        matcher.offer(&record(Domain::VehiclePlate, "KA02HN1828"), t(0));
        matcher.offer(&record(Domain::VehiclePlate, "MH12AB1234"), t(1));
        matcher.offer(&record(Domain::VehiclePlate, "KA02HN1828"), t(2));
        assert_eq!(matcher.pending_len(), 2);
        assert_eq!(matcher.stats().total_attempts, 0);
    }

    #[test]
    fn test_either_is_enough_when_not_required() {
        let config = AccessConfig {
            enabled: true,
            window_secs: 30,
            require_both: false,
        };
        let mut matcher = AccessMatcher::new(&config);

        let events = matcher.offer(&record(Domain::MoodleId, "22102003"), t(0));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, MatchStatus::Partial);
        assert_eq!(events[0].decision, AccessDecision::Granted);
        assert_eq!(matcher.stats().id_card_only, 1);
        assert_eq!(matcher.pending_len(), 0);
    }
}
