pub mod config;
pub mod models;
pub mod pipeline;
pub mod processing;
pub mod sink;
pub mod tracking;
pub mod utils;
pub mod validation;
pub mod verification;

pub use config::PipelineConfig;
pub use pipeline::{ObservationOutcome, ObservationPipeline};
