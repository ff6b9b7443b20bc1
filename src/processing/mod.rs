pub mod confusion;
pub mod normalizer;

pub use confusion::ConfusionTable;
pub use normalizer::Normalizer;
