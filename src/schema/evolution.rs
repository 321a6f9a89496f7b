//! Candidate, score and history types shared by the search engine.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ============================================================================
// Candidates
// ============================================================================

/// Position of a candidate in the run: generation index and slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateId {
    pub generation: usize,
    pub position: usize,
}

impl CandidateId {
    pub fn new(generation: usize, position: usize) -> Self {
        Self {
            generation,
            position,
        }
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen_{}_id_{}", self.generation, self.position)
    }
}

/// Single-parent operator families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutationFamily {
    /// Whole-candidate strategic rewrite (exploration).
    ConceptShift,
    /// Single-sentence edit (exploitation).
    Span,
    /// Generic rephrase / expand / condense.
    Global,
}

/// How a candidate came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Origin {
    /// The configured seed instruction.
    Seed,
    /// Variant of the seed created while building generation 0.
    Initial { family: MutationFamily },
    /// Carried over unchanged from the previous generation.
    Elite,
    /// Mutation of one tournament winner.
    Mutation { family: MutationFamily },
    /// Hybrid of two tournament winners.
    Crossover,
}

/// An instruction under evolutionary search.
///
/// Never edited in place: every operator produces a new `Candidate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    id: CandidateId,
    text: String,
    origin: Origin,
    #[serde(default)]
    parents: Vec<CandidateId>,
}

impl Candidate {
    /// Create a candidate.
    pub fn new(id: CandidateId, text: String, origin: Origin, parents: Vec<CandidateId>) -> Self {
        Self {
            id,
            text,
            origin,
            parents,
        }
    }

    /// The seed candidate, always slot 0 of generation 0.
    pub fn seed(text: impl Into<String>) -> Self {
        Self::new(CandidateId::new(0, 0), text.into(), Origin::Seed, Vec::new())
    }

    /// Copy of this candidate placed at a new position, text untouched.
    pub fn carried_to(&self, id: CandidateId) -> Self {
        Self::new(id, self.text.clone(), Origin::Elite, vec![self.id])
    }

    pub fn id(&self) -> CandidateId {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn parents(&self) -> &[CandidateId] {
        &self.parents
    }
}

// ============================================================================
// Scores
// ============================================================================

/// Raw judge scores, each nominally in `[0, 100]`.
///
/// Hate and preachiness are lower-is-better; the rest are higher-is-better.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreVector {
    pub hate: f64,
    pub fluency: f64,
    pub relevance: f64,
    pub style: f64,
    pub preachiness: f64,
}

impl ScoreVector {
    /// Substituted whenever generation or scoring fails.
    pub const WORST: Self = Self {
        hate: 100.0,
        fluency: 0.0,
        relevance: 0.0,
        style: 0.0,
        preachiness: 100.0,
    };

    /// Components clamped to `[0, 100]`; NaN maps to the worst value.
    pub fn clamped(&self) -> Self {
        let clamp = |v: f64, worst: f64| if v.is_nan() { worst } else { v.clamp(0.0, 100.0) };
        Self {
            hate: clamp(self.hate, Self::WORST.hate),
            fluency: clamp(self.fluency, Self::WORST.fluency),
            relevance: clamp(self.relevance, Self::WORST.relevance),
            style: clamp(self.style, Self::WORST.style),
            preachiness: clamp(self.preachiness, Self::WORST.preachiness),
        }
    }

    /// Component-wise arithmetic mean. Returns `None` for an empty input.
    pub fn mean<'a>(scores: impl IntoIterator<Item = &'a ScoreVector>) -> Option<Self> {
        let mut sum = Self {
            hate: 0.0,
            fluency: 0.0,
            relevance: 0.0,
            style: 0.0,
            preachiness: 0.0,
        };
        let mut count = 0usize;
        for s in scores {
            sum.hate += s.hate;
            sum.fluency += s.fluency;
            sum.relevance += s.relevance;
            sum.style += s.style;
            sum.preachiness += s.preachiness;
            count += 1;
        }
        if count == 0 {
            return None;
        }
        let n = count as f64;
        Some(Self {
            hate: sum.hate / n,
            fluency: sum.fluency / n,
            relevance: sum.relevance / n,
            style: sum.style / n,
            preachiness: sum.preachiness / n,
        })
    }
}

/// Audit detail for one dataset sample used in an evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleDetail {
    pub sample_id: String,
    pub image_path: PathBuf,
    pub generated_text: String,
    pub raw_scores: ScoreVector,
    pub fitness: f64,
    /// True if the worst-case vector was substituted.
    #[serde(default)]
    pub fallback: bool,
}

/// Evaluation outcome for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitnessRecord {
    pub candidate: Candidate,
    /// Mean of per-sample fitness, in `[0, 1]`.
    pub fitness: f64,
    /// Mean of raw (un-normalized) scores. Diagnostic only.
    pub mean_metrics: ScoreVector,
    pub samples: Vec<SampleDetail>,
}

// ============================================================================
// History
// ============================================================================

/// Complete results of one generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSnapshot {
    pub generation: usize,
    /// Records ordered by descending fitness.
    pub records: Vec<FitnessRecord>,
    pub best_candidate: Candidate,
    pub best_fitness: f64,
    pub mean_fitness: f64,
}

impl GenerationSnapshot {
    /// Build a snapshot, sorting records by descending fitness.
    ///
    /// The sort is stable, so equal fitness keeps population order.
    /// Returns `None` when there are no records.
    pub fn from_records(generation: usize, mut records: Vec<FitnessRecord>) -> Option<Self> {
        records.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
        let best = records.first()?;
        let best_candidate = best.candidate.clone();
        let best_fitness = best.fitness;
        let mean_fitness = records.iter().map(|r| r.fitness).sum::<f64>() / records.len() as f64;

        Some(Self {
            generation,
            records,
            best_candidate,
            best_fitness,
            mean_fitness,
        })
    }
}

// ============================================================================
// Progress and Result Types
// ============================================================================

/// States of the generation scheduler.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum SchedulerState {
    /// Scoring every candidate.
    #[default]
    Evaluate,
    /// Sorting and persisting the snapshot.
    Record,
    /// Updating best-ever and deciding whether to continue.
    CheckStop,
    /// Building the next population.
    Reproduce,
    /// Terminal.
    Stop,
}

/// Progress update emitted after every recorded generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionProgress {
    /// Generation just recorded.
    pub generation: usize,
    /// Generation budget.
    pub total_generations: usize,
    /// Best fitness seen so far.
    pub best_fitness: f64,
    /// Best fitness this generation.
    pub generation_best: f64,
    /// Mean fitness this generation.
    pub mean_fitness: f64,
    /// Generations without sufficient improvement.
    pub stagnation_count: usize,
    /// State the scheduler moves to next.
    pub state: SchedulerState,
    /// Best candidate so far.
    pub best_candidate: Option<Candidate>,
}

/// Final result of an evolution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionResult {
    /// Best candidate found.
    pub best: Candidate,
    /// Statistics from the run.
    pub stats: EvolutionStats,
    /// Where the history was persisted.
    pub history_path: PathBuf,
}

/// Statistics from an evolution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionStats {
    /// Generations evaluated and recorded.
    pub generations: usize,
    /// Candidate evaluations performed.
    pub total_evaluations: u64,
    /// Best fitness achieved.
    pub best_fitness: f64,
    /// Mean fitness of the last recorded generation.
    pub final_mean_fitness: f64,
    /// Time taken (in seconds).
    pub elapsed_seconds: f64,
    /// Reason for stopping.
    pub stop_reason: StopReason,
}

/// Reason evolution stopped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    /// Generation budget exhausted.
    MaxGenerations,
    /// Best fitness reached the target.
    TargetReached,
    /// Stagnation limit hit.
    Stagnation,
    /// Cancelled between generations.
    Cancelled,
}
