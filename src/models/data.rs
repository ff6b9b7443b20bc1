use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Which structural grammar a read is validated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    VehiclePlate,
    MoodleId,
}

impl Domain {
    pub const ALL: [Domain; 2] = [Domain::VehiclePlate, Domain::MoodleId];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::VehiclePlate => "vehicle_plate",
            Domain::MoodleId => "moodle_id",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vehicle_plate" | "plate" => Ok(Domain::VehiclePlate),
            "moodle_id" | "id" => Ok(Domain::MoodleId),
            other => Err(format!("unknown domain: {}", other)),
        }
    }
}

/// Character class expected at a grammar position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharClass {
    Alpha,
    Digit,
}

impl CharClass {
    pub fn contains(&self, c: char) -> bool {
        match self {
            CharClass::Alpha => c.is_ascii_alphabetic(),
            CharClass::Digit => c.is_ascii_digit(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

/// One detector + OCR result for a single frame or scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    pub raw_text: String,
    pub confidence: f32,
    pub source_index: u64,
    #[serde(default)]
    pub bbox: BoundingBox,
    pub domain: Domain,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Utc>>,
}

impl RawObservation {
    pub fn new(raw_text: impl Into<String>, domain: Domain, confidence: f32, source_index: u64) -> Self {
        RawObservation {
            raw_text: raw_text.into(),
            confidence,
            source_index,
            bbox: BoundingBox::default(),
            domain,
            captured_at: None,
        }
    }

    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = bbox;
        self
    }

    pub fn captured_at(mut self, at: DateTime<Utc>) -> Self {
        self.captured_at = Some(at);
        self
    }

    /// Confidence forced into [0, 1]; NaN counts as zero.
    pub fn clamped_confidence(&self) -> f32 {
        if self.confidence.is_nan() {
            0.0
        } else {
            self.confidence.clamp(0.0, 1.0)
        }
    }
}

/// Output of a successful normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText {
    pub domain: Domain,
    pub canonical_key: String,
    pub display_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordState {
    Pending,
    Eligible,
}

/// The deduplicated entity kept per canonical key within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub canonical_key: String,
    pub display_text: String,
    pub domain: Domain,
    pub observation_count: u64,
    pub first_seen: u64,
    pub best_confidence: f32,
    pub variants_seen: BTreeSet<String>,
    pub state: RecordState,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl CanonicalRecord {
    /// A record for the first observation of a key. Confidence and state are
    /// settled by the aggregator.
    pub fn from_first(normalized: &NormalizedText, observation: &RawObservation, at: DateTime<Utc>) -> Self {
        let mut variants_seen = BTreeSet::new();
        variants_seen.insert(observation.raw_text.clone());
        CanonicalRecord {
            canonical_key: normalized.canonical_key.clone(),
            display_text: normalized.display_text.clone(),
            domain: normalized.domain,
            observation_count: 1,
            first_seen: observation.source_index,
            best_confidence: 0.0,
            variants_seen,
            state: RecordState::Pending,
            first_seen_at: at,
            last_seen_at: at,
        }
    }

    pub fn is_eligible(&self) -> bool {
        self.state == RecordState::Eligible
    }
}
