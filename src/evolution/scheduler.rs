//! Generation scheduler driving the evolutionary prompt search.
//!
//! Each generation walks the same states:
//!
//! ```text
//! Evaluate -> Record -> CheckStop -> Reproduce -> Evaluate ...
//!                           \-> Stop
//! ```
//!
//! Evaluation runs on a rayon pool. Every candidate draws from its own rng,
//! seeded from the scheduler's rng before the parallel section, so a fixed
//! `random_seed` reproduces a run regardless of thread scheduling.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use log::{debug, info, warn};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand::seq::index;
use rayon::prelude::*;

use super::fitness::FitnessEvaluator;
use super::history::{HistoryError, HistoryStore};
use super::mutation::MutationEngine;
use super::population::PopulationBuilder;
use crate::backend::ModelBackend;
use crate::schema::{
    Candidate, CandidateId, ConfigError, DatasetRecord, EvolutionConfig,
    EvolutionProgress, EvolutionResult, EvolutionStats, FitnessRecord, GenerationSnapshot,
    Origin, ReproductionConfig, SchedulerState, StopReason,
};

/// Errors that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum EvolutionError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Dataset has no records to evaluate against")]
    EmptyDataset,
    #[error("Population is empty")]
    EmptyPopulation,
    #[error(transparent)]
    History(#[from] HistoryError),
}

/// Evolutionary search over prompt candidates.
pub struct GenerationScheduler {
    config: EvolutionConfig,
    rng: StdRng,
    evaluator: FitnessEvaluator,
    mutation: MutationEngine,
    dataset: Vec<DatasetRecord>,
    history: HistoryStore,
    pool: Option<rayon::ThreadPool>,
    state: SchedulerState,
    population: Vec<Candidate>,
    scored: Vec<FitnessRecord>,
    generation: usize,
    best_fitness: f64,
    best_candidate: Option<Candidate>,
    stagnation_count: usize,
    total_evaluations: u64,
    stop_reason: Option<StopReason>,
    cancelled: Arc<AtomicBool>,
}

impl GenerationScheduler {
    /// Create a scheduler.
    ///
    /// Fails on an invalid config or an empty dataset; nothing is written to
    /// the history in that case.
    pub fn new(
        config: EvolutionConfig,
        backend: Arc<dyn ModelBackend>,
        dataset: Vec<DatasetRecord>,
        history: HistoryStore,
    ) -> Result<Self, EvolutionError> {
        config.validate()?;
        if dataset.is_empty() {
            return Err(EvolutionError::EmptyDataset);
        }

        let seed = config.random_seed.unwrap_or_else(rand::random);
        info!("Random seed: {seed}");

        let evaluator = FitnessEvaluator::new(
            Arc::clone(&backend),
            config.fitness.clone(),
            config.domain_definition.clone(),
        );
        let mutation = MutationEngine::new(backend, config.reproduction.operator_mix);

        let pool = match config.evaluation.parallel_workers {
            0 => None,
            workers => match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
                Ok(pool) => Some(pool),
                Err(e) => {
                    warn!("Could not build a {workers}-thread pool, using the global one: {e}");
                    None
                }
            },
        };

        Ok(Self {
            config,
            rng: StdRng::seed_from_u64(seed),
            evaluator,
            mutation,
            dataset,
            history,
            pool,
            state: SchedulerState::default(),
            population: Vec::new(),
            scored: Vec::new(),
            generation: 0,
            best_fitness: f64::NEG_INFINITY,
            best_candidate: None,
            stagnation_count: 0,
            total_evaluations: 0,
            stop_reason: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Get cancellation handle. Cancellation takes effect between generations.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn population(&self) -> &[Candidate] {
        &self.population
    }

    /// Build generation 0 from the configured seed prompt.
    pub fn initialize(&mut self) {
        self.population = PopulationBuilder::new(&self.mutation).build(
            &self.config.seed_prompt,
            self.config.population.size,
            &mut self.rng,
        );
        self.scored.clear();
        self.generation = 0;
        self.best_fitness = f64::NEG_INFINITY;
        self.best_candidate = None;
        self.stagnation_count = 0;
        self.stop_reason = None;
        self.state = SchedulerState::Evaluate;
    }

    /// Advance one state transition.
    fn step<F>(&mut self, callback: &mut F) -> Result<(), EvolutionError>
    where
        F: FnMut(&EvolutionProgress),
    {
        self.state = match self.state {
            SchedulerState::Evaluate => {
                self.evaluate_population();
                SchedulerState::Record
            }
            SchedulerState::Record => {
                self.record()?;
                SchedulerState::CheckStop
            }
            SchedulerState::CheckStop => {
                self.stop_reason = self.check_stop();
                let next = if self.stop_reason.is_some() {
                    SchedulerState::Stop
                } else {
                    SchedulerState::Reproduce
                };
                self.state = next;
                callback(&self.progress());
                next
            }
            SchedulerState::Reproduce => {
                self.reproduce();
                SchedulerState::Evaluate
            }
            SchedulerState::Stop => SchedulerState::Stop,
        };
        Ok(())
    }

    fn evaluate_population(&mut self) {
        info!(
            "--- Generation {}: evaluating {} candidates ---",
            self.generation,
            self.population.len()
        );

        // Generate next u64 for seeding per-candidate RNGs
        let seeds: Vec<u64> = (0..self.population.len())
            .map(|_| self.rng.next_u64())
            .collect();

        let population = &self.population;
        let evaluator = &self.evaluator;
        let dataset = &self.dataset;
        let evaluate = || -> Vec<FitnessRecord> {
            population
                .par_iter()
                .zip(&seeds)
                .map(|(candidate, &seed)| {
                    let mut rng = StdRng::seed_from_u64(seed);
                    evaluator.compute_fitness(candidate, dataset, &mut rng)
                })
                .collect()
        };
        let records = match &self.pool {
            Some(pool) => pool.install(evaluate),
            None => evaluate(),
        };

        for record in &records {
            info!(
                "  [{}] Score: {:.4} | Hate: {:.2} | Preachiness: {:.2}",
                record.candidate.id(),
                record.fitness,
                record.mean_metrics.hate,
                record.mean_metrics.preachiness
            );
            debug!("  [{}] Prompt: {}", record.candidate.id(), record.candidate.text());
        }

        self.total_evaluations += records.len() as u64;
        self.scored = records;
    }

    fn record(&mut self) -> Result<(), EvolutionError> {
        let records = std::mem::take(&mut self.scored);
        let snapshot = GenerationSnapshot::from_records(self.generation, records)
            .ok_or(EvolutionError::EmptyPopulation)?;
        info!(
            "Generation {} best: {:.4} ({}), mean: {:.4}",
            snapshot.generation,
            snapshot.best_fitness,
            snapshot.best_candidate.id(),
            snapshot.mean_fitness
        );
        self.history.append(snapshot)?;
        Ok(())
    }

    /// Update best-ever and stagnation, then decide whether to stop.
    fn check_stop(&mut self) -> Option<StopReason> {
        let Some(current) = self.history.last() else {
            return Some(StopReason::MaxGenerations);
        };

        let improvement = current.best_fitness - self.best_fitness;
        if improvement > self.config.population.min_delta {
            self.best_fitness = current.best_fitness;
            self.best_candidate = Some(current.best_candidate.clone());
            self.stagnation_count = 0;
            info!("New best fitness: {:.4}", self.best_fitness);
        } else {
            self.stagnation_count += 1;
            info!(
                "No significant improvement ({}/{})",
                self.stagnation_count,
                self.config
                    .population
                    .stagnation_limit
                    .map_or_else(|| "-".to_string(), |l| l.to_string())
            );
        }

        if self.cancelled.load(Ordering::Relaxed) {
            return Some(StopReason::Cancelled);
        }

        if let Some(target) = self.config.population.target_fitness
            && self.best_fitness >= target
        {
            return Some(StopReason::TargetReached);
        }

        if let Some(limit) = self.config.population.stagnation_limit
            && self.stagnation_count >= limit
        {
            return Some(StopReason::Stagnation);
        }

        if self.generation + 1 >= self.config.population.max_generations {
            return Some(StopReason::MaxGenerations);
        }

        None
    }

    /// Build the next population from the last recorded generation.
    fn reproduce(&mut self) {
        let Some(current) = self.history.last() else {
            return;
        };
        let ranked = &current.records;
        if ranked.is_empty() {
            return;
        }

        let next_generation = self.generation + 1;
        let size = self.config.population.size;
        let reproduction = &self.config.reproduction;
        let mut next: Vec<Candidate> = Vec::with_capacity(size);

        // Elitism
        for record in ranked.iter().take(self.config.population.elitism) {
            next.push(
                record
                    .candidate
                    .carried_to(CandidateId::new(next_generation, next.len())),
            );
        }

        while next.len() < size {
            let id = CandidateId::new(next_generation, next.len());
            let max_attempts = reproduction.max_child_attempts.max(1);
            let mut attempts = 0;
            let child = loop {
                attempts += 1;
                let child = breed(ranked, id, reproduction, &self.mutation, &mut self.rng);
                if !next.iter().any(|c| c.text() == child.text()) {
                    break child;
                }
                if attempts >= max_attempts {
                    warn!("Accepting duplicate child {id} after {attempts} attempts");
                    break child;
                }
                debug!("Discarded duplicate child for {id}");
            };
            next.push(child);
        }

        self.population = next;
        self.generation = next_generation;
    }

    /// Get current progress.
    pub fn progress(&self) -> EvolutionProgress {
        let (generation_best, mean_fitness) = self
            .history
            .last()
            .map_or((0.0, 0.0), |s| (s.best_fitness, s.mean_fitness));

        EvolutionProgress {
            generation: self.generation,
            total_generations: self.config.population.max_generations,
            best_fitness: self.best_fitness,
            generation_best,
            mean_fitness,
            stagnation_count: self.stagnation_count,
            state: self.state,
            best_candidate: self.best_candidate.clone(),
        }
    }

    /// Run evolution with progress callback.
    pub fn run_with_callback<F>(
        &mut self,
        mut callback: F,
    ) -> Result<EvolutionResult, EvolutionError>
    where
        F: FnMut(&EvolutionProgress),
    {
        let start_time = Instant::now();
        self.initialize();

        let stop_reason = loop {
            self.step(&mut callback)?;
            if let Some(reason) = self.stop_reason {
                break reason;
            }
        };

        let elapsed = start_time.elapsed().as_secs_f64();
        let best = self
            .best_candidate
            .clone()
            .ok_or(EvolutionError::EmptyPopulation)?;
        let final_mean_fitness = self.history.last().map_or(0.0, |s| s.mean_fitness);

        info!(
            "Evolution stopped ({stop_reason:?}) after {} generations, best fitness {:.4}",
            self.history.len(),
            self.best_fitness
        );

        Ok(EvolutionResult {
            best,
            stats: EvolutionStats {
                generations: self.history.len(),
                total_evaluations: self.total_evaluations,
                best_fitness: self.best_fitness,
                final_mean_fitness,
                elapsed_seconds: elapsed,
                stop_reason,
            },
            history_path: self.history.path().to_path_buf(),
        })
    }

    /// Run evolution (blocking).
    pub fn run(&mut self) -> Result<EvolutionResult, EvolutionError> {
        self.run_with_callback(|_| {})
    }
}

/// Produce one child: mutation of a tournament winner, or crossover of two.
fn breed(
    ranked: &[FitnessRecord],
    id: CandidateId,
    config: &ReproductionConfig,
    mutation: &MutationEngine,
    rng: &mut StdRng,
) -> Candidate {
    let first = &tournament(ranked, config.tournament_size, rng).candidate;

    if rng.gen_bool(config.mutation_rate) {
        let child = mutation.mutate(first.text(), rng);
        Candidate::new(
            id,
            child.text,
            Origin::Mutation {
                family: child.family,
            },
            vec![first.id()],
        )
    } else {
        let second = &tournament(ranked, config.tournament_size, rng).candidate;
        let text = mutation.crossover(first.text(), second.text());
        Candidate::new(id, text, Origin::Crossover, vec![first.id(), second.id()])
    }
}

/// Tournament selection over distinct members. Ties go to the first drawn.
///
/// `ranked` must not be empty.
fn tournament<'r, R: Rng + ?Sized>(
    ranked: &'r [FitnessRecord],
    size: usize,
    rng: &mut R,
) -> &'r FitnessRecord {
    let amount = size.clamp(1, ranked.len());
    let mut draws = index::sample(rng, ranked.len(), amount).into_iter();
    let mut winner = &ranked[draws.next().unwrap_or(0)];
    for idx in draws {
        if ranked[idx].fitness > winner.fitness {
            winner = &ranked[idx];
        }
    }
    winner
}
