pub mod confidence;
pub mod format;

pub use confidence::{ConfidenceAggregator, GateTransition, PersistenceGate};
pub use format::FormatValidator;
