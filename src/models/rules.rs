use crate::models::CharClass;

/// Expected content of one grammar position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Expect(CharClass),
    /// Either class is legal here; the character is left as read.
    Open,
}

/// Indian state and union territory registration prefixes.
pub const INDIAN_STATE_CODES: [&str; 36] = [
    "AP", "AR", "AS", "BR", "CG", "GA", "GJ", "HR", "HP", "JK", "JH", "KA",
    "KL", "MP", "MH", "MN", "ML", "MZ", "NL", "OD", "PB", "RJ", "SK", "TN",
    "TS", "TR", "UP", "UK", "WB", "AN", "CH", "DN", "DD", "DL", "LD", "PY",
];

pub fn is_known_state_code(code: &str) -> bool {
    INDIAN_STATE_CODES.contains(&code)
}

/// Positional class map for a plate candidate of `len` characters
/// (`SS D{1,2} C{1,2} NNNN`). Callers bound `len` to 8..=10 first.
pub fn plate_slots(len: usize) -> Vec<Slot> {
    let mut slots = vec![Slot::Expect(CharClass::Alpha); 2];
    let digit = Slot::Expect(CharClass::Digit);
    let alpha = Slot::Expect(CharClass::Alpha);
    match len.saturating_sub(6) {
        2 => slots.extend([digit, alpha]),
        // DD+C and D+CC are both legal with three middle characters
        3 => slots.extend([digit, Slot::Open, alpha]),
        4 => slots.extend([digit, digit, alpha, alpha]),
        other => slots.extend(std::iter::repeat(Slot::Open).take(other)),
    }
    slots.extend(std::iter::repeat(Slot::Expect(CharClass::Digit)).take(len.min(4)));
    slots.truncate(len);
    slots
}

pub fn moodle_id_slots(len: usize) -> Vec<Slot> {
    vec![Slot::Expect(CharClass::Digit); len]
}
