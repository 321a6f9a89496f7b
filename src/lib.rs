//! evoprompt - Evolutionary search for generation instructions.
//!
//! A population of natural-language instructions is evolved against a
//! vision-language generator and an LLM judge. Each instruction is scored by
//! generating text for a sample of images and aggregating the judge's scores
//! into one fitness value; the fittest instructions survive and are varied by
//! LLM-driven rewrites.
//!
//! # Architecture
//!
//! - `schema`: Configuration, dataset, candidate and history types
//! - `backend`: The generation / scoring / rewrite capabilities
//! - `evolution`: Fitness, mutation, population building and the scheduler
//! - `analysis`: Summary tables and replay over a finished history
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use evoprompt::{
//!     backend::OpenAiCompatibleBackend,
//!     evolution::{GenerationScheduler, HistoryStore},
//!     schema::{EvolutionConfig, load_positive},
//! };
//!
//! let config = EvolutionConfig::default();
//! let backend = OpenAiCompatibleBackend::new(config.backend.clone()).unwrap();
//! let dataset = load_positive(&config.data_file).unwrap();
//! let history = HistoryStore::in_dir(&config.history_dir);
//!
//! let mut scheduler =
//!     GenerationScheduler::new(config, Arc::new(backend), dataset, history).unwrap();
//! let result = scheduler.run().unwrap();
//!
//! println!("Best fitness {:.4}: {}", result.stats.best_fitness, result.best.text());
//! ```

pub mod analysis;
pub mod backend;
pub mod evolution;
pub mod schema;

// Re-export commonly used types
pub use backend::{DeterministicBackend, ModelBackend, OpenAiCompatibleBackend};
pub use evolution::{EvolutionError, GenerationScheduler, HistoryStore};
pub use schema::{Candidate, EvolutionConfig, GenerationSnapshot};
