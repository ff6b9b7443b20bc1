pub mod error;

pub use error::{GateError, MismatchReason, Rejection};
