// Context-aware OCR character correction
// Fixes look-alike confusions using the class expected at each grammar position

use crate::config::ConfusionOverrides;
use crate::models::{CharClass, Slot};
use crate::utils::GateError;
use lazy_static::lazy_static;
use std::collections::HashMap;

lazy_static! {
    // Letters commonly read where a digit was printed
    static ref DEFAULT_TO_DIGIT: HashMap<char, char> = {
        let mut m = HashMap::new();
        m.insert('O', '0');
        m.insert('D', '0');
        m.insert('Q', '0');
        m.insert('I', '1');
        m.insert('L', '1');
        m.insert('Z', '2');
        m.insert('S', '5');
        m.insert('G', '6');
        m.insert('B', '8');
        m
    };

    // Digits commonly read where a letter was printed
    static ref DEFAULT_TO_ALPHA: HashMap<char, char> = {
        let mut m = HashMap::new();
        m.insert('0', 'O');
        m.insert('1', 'I');
        m.insert('2', 'Z');
        m.insert('5', 'S');
        m.insert('6', 'G');
        m.insert('8', 'B');
        m
    };
}

/// Substitution table partitioned by the expected character class.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfusionTable {
    to_digit: HashMap<char, char>,
    to_alpha: HashMap<char, char>,
}

impl Default for ConfusionTable {
    fn default() -> Self {
        ConfusionTable {
            to_digit: DEFAULT_TO_DIGIT.clone(),
            to_alpha: DEFAULT_TO_ALPHA.clone(),
        }
    }
}

impl ConfusionTable {
    /// Default table with deployment-specific entries merged over it.
    ///
    /// An entry whose source already belongs to the target class, or whose
    /// replacement does not, is refused: it would break idempotence.
    pub fn with_overrides(overrides: &ConfusionOverrides) -> Result<Self, GateError> {
        let mut table = ConfusionTable::default();
        for (&from, &to) in &overrides.to_digit {
            Self::check_entry(from, to, CharClass::Digit)?;
            table.to_digit.insert(from.to_ascii_uppercase(), to);
        }
        for (&from, &to) in &overrides.to_alpha {
            Self::check_entry(from, to.to_ascii_uppercase(), CharClass::Alpha)?;
            table.to_alpha.insert(from, to.to_ascii_uppercase());
        }
        Ok(table)
    }

    fn check_entry(from: char, to: char, class: CharClass) -> Result<(), GateError> {
        if class.contains(from) || !class.contains(to) || !from.is_ascii_alphanumeric() {
            return Err(GateError::InvalidConfig(format!(
                "confusion entry {:?} -> {:?} is not a valid {:?} correction",
                from, to, class
            )));
        }
        Ok(())
    }

    /// Corrected character for the expected class, or `c` unchanged.
    pub fn correct(&self, c: char, class: CharClass) -> char {
        if class.contains(c) {
            return c;
        }
        let map = match class {
            CharClass::Digit => &self.to_digit,
            CharClass::Alpha => &self.to_alpha,
        };
        map.get(&c).copied().unwrap_or(c)
    }

    /// One greedy pass over `text` using the positional class map.
    /// Positions beyond `slots` and `Slot::Open` positions are kept as read.
    pub fn apply(&self, text: &str, slots: &[Slot]) -> String {
        text.chars()
            .enumerate()
            .map(|(i, c)| match slots.get(i) {
                Some(Slot::Expect(class)) => self.correct(c, *class),
                _ => c,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_digit_position_corrections() {
        let table = ConfusionTable::default();
        assert_eq!(table.correct('O', CharClass::Digit), '0');
        assert_eq!(table.correct('I', CharClass::Digit), '1');
        assert_eq!(table.correct('S', CharClass::Digit), '5');
        assert_eq!(table.correct('Z', CharClass::Digit), '2');
        assert_eq!(table.correct('B', CharClass::Digit), '8');
    }

    #[test]
    fn test_alpha_position_corrections() {
        let table = ConfusionTable::default();
        assert_eq!(table.correct('0', CharClass::Alpha), 'O');
        assert_eq!(table.correct('1', CharClass::Alpha), 'I');
        assert_eq!(table.correct('5', CharClass::Alpha), 'S');
        assert_eq!(table.correct('8', CharClass::Alpha), 'B');
    }

    #[test]
    fn test_correction_is_idempotent() {
        let table = ConfusionTable::default();
        for c in ('A'..='Z').chain('0'..='9') {
            for class in [CharClass::Alpha, CharClass::Digit] {
                let once = table.correct(c, class);
                assert_eq!(table.correct(once, class), once);
                if class.contains(c) {
                    assert_eq!(once, c);
                }
            }
        }
    }

    #[test]
    fn test_unmapped_passes_through() {
        let table = ConfusionTable::default();
        assert_eq!(table.correct('E', CharClass::Digit), 'E');
        assert_eq!(table.correct('7', CharClass::Alpha), '7');
    }

    #[test]
    fn test_apply_with_slots() {
        let table = ConfusionTable::default();
        let slots = vec![Slot::Expect(CharClass::Digit); 8];
        assert_eq!(table.apply("22102OO3", &slots), "22102003");
    }

    #[test]
    fn test_overrides_merge_and_reject_bad_entries() {
        let mut overrides = ConfusionOverrides::default();
        overrides.to_digit.insert('T', '7');
        let table = ConfusionTable::with_overrides(&overrides).unwrap();
        assert_eq!(table.correct('T', CharClass::Digit), '7');
        assert_eq!(table.correct('O', CharClass::Digit), '0');

        let bad = ConfusionOverrides {
            to_digit: BTreeMap::from([('3', '8')]),
            to_alpha: BTreeMap::new(),
        };
        assert!(ConfusionTable::with_overrides(&bad).is_err());
    }
}
