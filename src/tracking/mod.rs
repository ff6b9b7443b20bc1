pub mod stats;
pub mod tracker;

pub use stats::{DomainStats, SessionStats};
pub use tracker::{DeduplicationTracker, SessionSummary, TrackedUpdate};
