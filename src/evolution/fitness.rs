//! Fitness evaluation for prompt candidates.
//!
//! A candidate is scored on a random subset of the dataset: the generator
//! writes text for each sampled image, the scorer judges it, and the
//! weighted score vectors are averaged into one fitness in `[0, 1]`.

use std::sync::Arc;

use log::warn;
use rand::Rng;
use rand::seq::SliceRandom;

use crate::backend::ModelBackend;
use crate::schema::{
    Candidate, DatasetRecord, FitnessConfig, FitnessRecord, SampleDetail, ScoreVector,
};

/// Evaluates candidates and returns fitness records.
pub struct FitnessEvaluator {
    backend: Arc<dyn ModelBackend>,
    config: FitnessConfig,
    domain_definition: String,
}

impl FitnessEvaluator {
    /// Create a new fitness evaluator.
    pub fn new(
        backend: Arc<dyn ModelBackend>,
        config: FitnessConfig,
        domain_definition: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            config,
            domain_definition: domain_definition.into(),
        }
    }

    /// Score `candidate` on `min(samples_per_eval, dataset.len())` distinct
    /// samples drawn with `rng`.
    ///
    /// Backend failures never propagate: a failed sample gets the worst-case
    /// score vector and counts toward the mean like any other.
    pub fn compute_fitness<R: Rng + ?Sized>(
        &self,
        candidate: &Candidate,
        dataset: &[DatasetRecord],
        rng: &mut R,
    ) -> FitnessRecord {
        let k = self.config.samples_per_eval.min(dataset.len());
        let samples: Vec<SampleDetail> = dataset
            .choose_multiple(rng, k)
            .map(|record| self.evaluate_sample(candidate, record))
            .collect();

        let fitness = if samples.is_empty() {
            0.0
        } else {
            samples.iter().map(|s| s.fitness).sum::<f64>() / samples.len() as f64
        };
        let mean_metrics =
            ScoreVector::mean(samples.iter().map(|s| &s.raw_scores)).unwrap_or(ScoreVector::WORST);

        FitnessRecord {
            candidate: candidate.clone(),
            fitness,
            mean_metrics,
            samples,
        }
    }

    fn evaluate_sample(&self, candidate: &Candidate, record: &DatasetRecord) -> SampleDetail {
        let generated = self
            .backend
            .generate(&record.image_path, &self.domain_definition, candidate.text())
            .map_err(|e| warn!("Generation failed for {} on {}: {e}", candidate.id(), record.sid))
            .ok();

        let (generated_text, raw_scores, fallback) = match generated {
            None => (String::new(), ScoreVector::WORST, true),
            Some(text) => match self
                .backend
                .score(&record.image_path, &text, &self.domain_definition)
            {
                Ok(scores) => (text, scores.clamped(), false),
                Err(e) => {
                    warn!("Scoring failed for {} on {}: {e}", candidate.id(), record.sid);
                    (text, ScoreVector::WORST, true)
                }
            },
        };

        SampleDetail {
            sample_id: record.sid.clone(),
            image_path: record.image_path.clone(),
            generated_text,
            fitness: self.config.weights.combine(&raw_scores),
            raw_scores,
            fallback,
        }
    }
}
