//! Pipeline configuration
//!
//! Per-domain persistence thresholds and confusion-table overrides, the
//! record notification policy and access-matching settings, stored as JSON.

use crate::models::Domain;
use crate::processing::ConfusionTable;
use crate::utils::GateError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const DEFAULT_PLATE_THRESHOLD: f32 = 0.75;
pub const DEFAULT_MOODLE_ID_THRESHOLD: f32 = 0.0;
pub const DEFAULT_ACCESS_WINDOW_SECS: u64 = 30;

/// Top-level settings supplied by the embedding application
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub domains: DomainSettings,
    pub notify_policy: NotifyPolicy,
    pub access: AccessConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainSettings {
    pub vehicle_plate: DomainConfig,
    pub moodle_id: DomainConfig,
}

/// Settings for one domain
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainConfig {
    /// Minimum aggregated confidence for hand-off; the domain default when unset
    pub persistence_threshold: Option<f32>,
    /// Extra look-alike substitutions merged over the default table
    pub confusion_overrides: ConfusionOverrides,
    /// Reject plates whose prefix is not a known state code (plates only)
    pub require_known_state_code: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfusionOverrides {
    pub to_digit: BTreeMap<char, char>,
    pub to_alpha: BTreeMap<char, char>,
}

/// When an eligible record is handed to the record sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyPolicy {
    /// Once, when the record first crosses its threshold
    #[default]
    OnTransition,
    /// On the crossing and on every later update of the record
    OnEveryEligibleUpdate,
}

/// Plate / ID-card pairing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    pub enabled: bool,
    /// Both reads must land within this many seconds of each other
    pub window_secs: u64,
    /// Grant only when plate and ID card are both verified
    pub require_both: bool,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            window_secs: DEFAULT_ACCESS_WINDOW_SECS,
            require_both: true,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, GateError> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<(), GateError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn domain(&self, domain: Domain) -> &DomainConfig {
        match domain {
            Domain::VehiclePlate => &self.domains.vehicle_plate,
            Domain::MoodleId => &self.domains.moodle_id,
        }
    }

    pub fn domain_mut(&mut self, domain: Domain) -> &mut DomainConfig {
        match domain {
            Domain::VehiclePlate => &mut self.domains.vehicle_plate,
            Domain::MoodleId => &mut self.domains.moodle_id,
        }
    }

    pub fn threshold(&self, domain: Domain) -> f32 {
        self.domain(domain).persistence_threshold.unwrap_or(match domain {
            Domain::VehiclePlate => DEFAULT_PLATE_THRESHOLD,
            Domain::MoodleId => DEFAULT_MOODLE_ID_THRESHOLD,
        })
    }

    pub fn validate(&self) -> Result<(), GateError> {
        for domain in Domain::ALL {
            let threshold = self.threshold(domain);
            if !(0.0..=1.0).contains(&threshold) {
                return Err(GateError::InvalidConfig(format!(
                    "{} persistence_threshold {} outside [0, 1]",
                    domain, threshold
                )));
            }
            ConfusionTable::with_overrides(&self.domain(domain).confusion_overrides)?;
        }
        if self.access.enabled && self.access.window_secs == 0 {
            return Err(GateError::InvalidConfig(
                "access.window_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
