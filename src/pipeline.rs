use crate::config::{NotifyPolicy, PipelineConfig};
use crate::models::{Domain, RawObservation};
use crate::processing::Normalizer;
use crate::sink::{LogSink, RecordSink};
use crate::tracking::{DeduplicationTracker, SessionStats, SessionSummary, TrackedUpdate};
use crate::utils::{GateError, Rejection};
use crate::validation::{GateTransition, PersistenceGate};
use crate::verification::{AccessEvent, AccessMatcher, AccessStats};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// What one observation did to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum ObservationOutcome {
    Accepted(AcceptedObservation),
    Rejected(Rejection),
}

impl ObservationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ObservationOutcome::Accepted(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedObservation {
    pub update: TrackedUpdate,
    /// The record was handed to the sink for this observation
    pub published: bool,
    pub access_events: Vec<AccessEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessSummary {
    pub stats: AccessStats,
    pub unmatched: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub session: SessionSummary,
    pub access: Option<AccessSummary>,
}

/// Normalizes, deduplicates and gates a stream of OCR observations for one
/// session, publishing eligible records to a sink.
///
/// Observations are processed synchronously in the order they are passed
/// in. The pipeline can be shared between capture threads behind an `Arc`.
pub struct ObservationPipeline {
    normalizer: Normalizer,
    tracker: DeduplicationTracker,
    plate_gate: PersistenceGate,
    moodle_id_gate: PersistenceGate,
    notify_policy: NotifyPolicy,
    sink: Mutex<Box<dyn RecordSink>>,
    matcher: Option<Mutex<AccessMatcher>>,
}

impl ObservationPipeline {
    pub fn new(config: &PipelineConfig, session_label: impl Into<String>) -> Result<Self, GateError> {
        config.validate()?;
        Ok(ObservationPipeline {
            normalizer: Normalizer::from_config(config)?,
            tracker: DeduplicationTracker::start_session(session_label),
            plate_gate: PersistenceGate::new(config.threshold(Domain::VehiclePlate)),
            moodle_id_gate: PersistenceGate::new(config.threshold(Domain::MoodleId)),
            notify_policy: config.notify_policy,
            sink: Mutex::new(Box::new(LogSink)),
            matcher: config
                .access
                .enabled
                .then(|| Mutex::new(AccessMatcher::new(&config.access))),
        })
    }

    pub fn with_sink(mut self, sink: Box<dyn RecordSink>) -> Self {
        self.sink = Mutex::new(sink);
        self
    }

    pub fn gate(&self, domain: Domain) -> PersistenceGate {
        match domain {
            Domain::VehiclePlate => self.plate_gate,
            Domain::MoodleId => self.moodle_id_gate,
        }
    }

    pub fn tracker(&self) -> &DeduplicationTracker {
        &self.tracker
    }

    pub fn stats(&self) -> SessionStats {
        self.tracker.stats()
    }

    pub fn process(&self, observation: &RawObservation) -> ObservationOutcome {
        let confidence = observation.clamped_confidence();
        if confidence != observation.confidence {
            log::warn!(
                "source {}: confidence {} clamped to {}",
                observation.source_index,
                observation.confidence,
                confidence
            );
        }

        let domain = observation.domain;
        let normalized = match self.normalizer.normalize(&observation.raw_text, domain) {
            Ok(normalized) => normalized,
            Err(rejection) => {
                self.tracker.record_rejection(domain, &rejection);
                return ObservationOutcome::Rejected(rejection);
            }
        };

        let notify_policy = self.notify_policy;
        let (update, published) =
            self.tracker
                .observe_then(&normalized, observation, self.gate(domain), |update| {
                    let publish = match (update.transition, notify_policy) {
                        (GateTransition::BecameEligible, _) => true,
                        (GateTransition::StillEligible, NotifyPolicy::OnEveryEligibleUpdate) => true,
                        _ => false,
                    };
                    publish.then(|| self.sink.lock().publish(&update.record))
                });
        let published = match published {
            Some(Ok(())) => true,
            Some(Err(err)) => {
                log::error!("Failed to publish {}: {}", update.record.canonical_key, err);
                self.tracker.record_sink_failure();
                false
            }
            None => false,
        };

        let access_events = match &self.matcher {
            Some(matcher) if update.record.is_eligible() => {
                let at = observation.captured_at.unwrap_or(update.record.last_seen_at);
                matcher.lock().offer(&update.record, at)
            }
            _ => Vec::new(),
        };

        ObservationOutcome::Accepted(AcceptedObservation {
            update,
            published,
            access_events,
        })
    }

    /// Times out pending access verifications while no records arrive.
    pub fn expire_access(&self, now: DateTime<Utc>) -> Vec<AccessEvent> {
        match &self.matcher {
            Some(matcher) => matcher.lock().expire(now),
            None => Vec::new(),
        }
    }

    /// Ends the session, flushing the sink.
    pub fn finish(self) -> PipelineSummary {
        let flushed = self.sink.lock().flush();
        if let Err(err) = flushed {
            log::error!("Failed to flush record sink: {}", err);
            self.tracker.record_sink_failure();
        }
        let access = self.matcher.map(|matcher| {
            let matcher = matcher.into_inner();
            AccessSummary {
                stats: matcher.stats(),
                unmatched: matcher.pending_len(),
            }
        });
        PipelineSummary {
            session: self.tracker.end_session(),
            access,
        }
    }
}
