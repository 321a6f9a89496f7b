//! Model backends: the generation, scoring and rewrite capabilities.
//!
//! The search engine only talks to [`ModelBackend`]. Two implementations
//! ship with the crate:
//!
//! - [`OpenAiCompatibleBackend`]: chat completions over HTTP, with images
//!   sent inline as base64 data URLs.
//! - [`DeterministicBackend`]: hash-based offline stand-in for dry runs,
//!   benchmarks and tests.
//!
//! Every call is a blocking round trip. Callers absorb failures with a
//! fallback value; a backend error never aborts a run.

mod deterministic;
mod openai;
pub mod prompts;

use std::io;
use std::path::{Path, PathBuf};

pub use deterministic::DeterministicBackend;
pub use openai::{OpenAiCompatibleBackend, parse_scores};

use crate::schema::ScoreVector;

/// Errors raised by a model backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("failed to read image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("provider returned invalid response: {0}")]
    InvalidResponse(String),

    #[error("provider API error: status={status}, body={body}")]
    Api { status: u16, body: String },

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// The three external capabilities the search depends on.
pub trait ModelBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Produce text for `image` following `instruction`.
    fn generate(
        &self,
        image: &Path,
        definition: &str,
        instruction: &str,
    ) -> Result<String, BackendError>;

    /// Judge `text` in the context of `image`.
    fn score(&self, image: &Path, text: &str, definition: &str)
    -> Result<ScoreVector, BackendError>;

    /// Rewrite `source` according to a strategy instruction. The response is
    /// returned raw; sanitizing is the caller's job.
    fn rewrite(&self, source: &str, instruction: &str) -> Result<String, BackendError>;
}
