use crate::config::DomainConfig;
use crate::models::rules::{is_known_state_code, moodle_id_slots, plate_slots};
use crate::models::{Domain, NormalizedText, Slot};
use crate::processing::ConfusionTable;
use crate::utils::{GateError, MismatchReason, Rejection};
use lazy_static::lazy_static;
use regex::Regex;
use std::ops::RangeInclusive;

lazy_static! {
    static ref PLATE_PATTERN: Regex =
        Regex::new(r"^([A-Z]{2})([0-9]{1,2})([A-Z]{1,2})([0-9]{4})$").unwrap();
    static ref MOODLE_ID_PATTERN: Regex = Regex::new(r"^2[0-9]{7}$").unwrap();
}

const PLATE_LENGTH: RangeInclusive<usize> = 8..=10;
const MOODLE_ID_LENGTH: RangeInclusive<usize> = 8..=8;

/// Structural grammar of one domain, with its correction table.
#[derive(Debug, Clone)]
pub struct FormatValidator {
    domain: Domain,
    table: ConfusionTable,
    require_known_state_code: bool,
}

impl FormatValidator {
    pub fn new(domain: Domain, table: ConfusionTable) -> Self {
        FormatValidator {
            domain,
            table,
            require_known_state_code: false,
        }
    }

    pub fn from_config(domain: Domain, config: &DomainConfig) -> Result<Self, GateError> {
        let table = ConfusionTable::with_overrides(&config.confusion_overrides)?;
        let mut validator = FormatValidator::new(domain, table);
        validator.require_known_state_code =
            domain == Domain::VehiclePlate && config.require_known_state_code;
        Ok(validator)
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn length_bounds(&self) -> RangeInclusive<usize> {
        match self.domain {
            Domain::VehiclePlate => PLATE_LENGTH,
            Domain::MoodleId => MOODLE_ID_LENGTH,
        }
    }

    fn slots(&self, len: usize) -> Vec<Slot> {
        match self.domain {
            Domain::VehiclePlate => plate_slots(len),
            Domain::MoodleId => moodle_id_slots(len),
        }
    }

    /// Checks the grammar of `candidate` without correcting it and returns
    /// the canonical key and display form. Spaces, hyphens and other
    /// separators are stripped first; letters are expected uppercase.
    pub fn validate(&self, candidate: &str) -> Result<NormalizedText, MismatchReason> {
        let key = strip_separators(candidate);
        self.check_length(&key)?;

        match self.domain {
            Domain::VehiclePlate => {
                let caps = PLATE_PATTERN.captures(&key).ok_or(MismatchReason::Pattern)?;
                let state = &caps[1];
                if self.require_known_state_code && !is_known_state_code(state) {
                    return Err(MismatchReason::UnknownStateCode(state.to_string()));
                }
                let display_text = format!("{} {} {} {}", state, &caps[2], &caps[3], &caps[4]);
                Ok(NormalizedText {
                    domain: self.domain,
                    canonical_key: key,
                    display_text,
                })
            }
            Domain::MoodleId => {
                if !MOODLE_ID_PATTERN.is_match(&key) {
                    return Err(MismatchReason::Pattern);
                }
                Ok(NormalizedText {
                    domain: self.domain,
                    display_text: key.clone(),
                    canonical_key: key,
                })
            }
        }
    }

    /// Length check, one positional correction pass, one validation.
    pub fn correct_and_validate(&self, candidate: &str) -> Result<NormalizedText, Rejection> {
        let stripped = strip_separators(candidate);
        let mismatch = |candidate: String, reason| Rejection::GrammarMismatch {
            domain: self.domain,
            candidate,
            reason,
        };

        if let Err(reason) = self.check_length(&stripped) {
            return Err(mismatch(stripped, reason));
        }

        let slots = self.slots(stripped.chars().count());
        let corrected = self.table.apply(&stripped, &slots);
        if corrected != stripped {
            log::trace!("{}: corrected {} -> {}", self.domain, stripped, corrected);
        }

        self.validate(&corrected)
            .map_err(|reason| mismatch(corrected, reason))
    }

    fn check_length(&self, key: &str) -> Result<(), MismatchReason> {
        let bounds = self.length_bounds();
        let len = key.chars().count();
        if bounds.contains(&len) {
            Ok(())
        } else {
            Err(MismatchReason::Length {
                len,
                min: *bounds.start(),
                max: *bounds.end(),
            })
        }
    }
}

fn strip_separators(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}
