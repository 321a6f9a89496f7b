//! Post-run analysis: summary tables and prompt replay.

pub mod replay;
mod summary;

pub use summary::{GenerationSummary, render_table, summarize};
