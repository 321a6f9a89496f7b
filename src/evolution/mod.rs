//! Evolutionary search over natural-language instructions.
//!
//! # Overview
//!
//! - **Fitness** (`fitness`): sample images, generate, score, aggregate
//! - **Mutation** (`mutation`): span, concept-shift and global rewrites, crossover
//! - **Population** (`population`): grow generation 0 from a seed prompt
//! - **Scheduler** (`scheduler`): evaluate, record, stop check, reproduce
//! - **History** (`history`): per-generation snapshots persisted as JSON
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use evoprompt::backend::DeterministicBackend;
//! use evoprompt::evolution::{GenerationScheduler, HistoryStore};
//! use evoprompt::schema::{EvolutionConfig, load_positive};
//!
//! let config = EvolutionConfig::default();
//! let dataset = load_positive(&config.data_file).unwrap();
//! let history = HistoryStore::in_dir(&config.history_dir);
//!
//! let mut scheduler =
//!     GenerationScheduler::new(config, Arc::new(DeterministicBackend::new()), dataset, history)
//!         .unwrap();
//! let result = scheduler
//!     .run_with_callback(|progress| {
//!         println!(
//!             "Generation {}: best fitness = {:.3}",
//!             progress.generation, progress.best_fitness
//!         );
//!     })
//!     .unwrap();
//!
//! println!("Best prompt: {}", result.best.text());
//! ```

mod fitness;
mod history;
mod mutation;
mod population;
mod scheduler;

pub use fitness::FitnessEvaluator;
pub use history::{HistoryError, HistoryStore};
pub use mutation::{
    ConceptStrategy, GlobalStrategy, Mutation, MutationEngine, SpanStrategy, sanitize_rewrite,
    sentence_spans,
};
pub use population::{MIN_VIABLE_LEN, PopulationBuilder};
pub use scheduler::{EvolutionError, GenerationScheduler};
