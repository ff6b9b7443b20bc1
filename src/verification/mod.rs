pub mod access;

pub use access::{AccessDecision, AccessEvent, AccessMatcher, AccessStats, MatchStatus};
