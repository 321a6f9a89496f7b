//! Schema module - Configuration, dataset and history types.

mod config;
mod dataset;
mod evolution;

pub use config::*;
pub use dataset::*;
pub use evolution::*;
