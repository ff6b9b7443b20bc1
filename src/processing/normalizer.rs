use crate::config::PipelineConfig;
use crate::models::{Domain, NormalizedText};
use crate::processing::ConfusionTable;
use crate::utils::{GateError, Rejection};
use crate::validation::FormatValidator;

/// Turns raw OCR text into a validated canonical form for a domain.
///
/// Pure: the same text and domain always give the same outcome. Rejections
/// are the common case for live camera reads and are returned, never logged
/// above `debug`.
#[derive(Debug, Clone)]
pub struct Normalizer {
    plate: FormatValidator,
    moodle_id: FormatValidator,
}

impl Default for Normalizer {
    fn default() -> Self {
        Normalizer {
            plate: FormatValidator::new(Domain::VehiclePlate, ConfusionTable::default()),
            moodle_id: FormatValidator::new(Domain::MoodleId, ConfusionTable::default()),
        }
    }
}

impl Normalizer {
    pub fn from_config(config: &PipelineConfig) -> Result<Self, GateError> {
        Ok(Normalizer {
            plate: FormatValidator::from_config(
                Domain::VehiclePlate,
                config.domain(Domain::VehiclePlate),
            )?,
            moodle_id: FormatValidator::from_config(Domain::MoodleId, config.domain(Domain::MoodleId))?,
        })
    }

    pub fn validator(&self, domain: Domain) -> &FormatValidator {
        match domain {
            Domain::VehiclePlate => &self.plate,
            Domain::MoodleId => &self.moodle_id,
        }
    }

    pub fn normalize(&self, raw_text: &str, domain: Domain) -> Result<NormalizedText, Rejection> {
        let cleaned = clean_ocr_text(raw_text);
        if cleaned.is_empty() {
            log::debug!("{}: rejected {:?}, nothing alphanumeric", domain, raw_text);
            return Err(Rejection::MalformedInput {
                raw: raw_text.to_string(),
            });
        }

        let result = self.validator(domain).correct_and_validate(&cleaned);
        if let Err(ref rejection) = result {
            log::debug!("{}: rejected {:?}: {}", domain, raw_text, rejection);
        }
        result
    }
}

/// Uppercases and keeps only ASCII letters and digits.
pub fn clean_ocr_text(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}
