//! Initial population construction.

use log::{debug, info, warn};
use rand::Rng;

use super::mutation::MutationEngine;
use crate::schema::{Candidate, CandidateId, Origin};

/// Variants at or below this many characters are discarded.
pub const MIN_VIABLE_LEN: usize = 20;

/// Attempts allowed per requested candidate.
const ATTEMPTS_PER_SLOT: usize = 3;

/// Grows generation 0 from a single seed prompt.
pub struct PopulationBuilder<'a> {
    engine: &'a MutationEngine,
}

impl<'a> PopulationBuilder<'a> {
    pub fn new(engine: &'a MutationEngine) -> Self {
        Self { engine }
    }

    /// Build up to `target_size` distinct candidates, the seed first.
    ///
    /// Variants come from mutating the seed, alternating concept shifts
    /// (even attempts) and global rewrites (odd attempts). The builder gives
    /// up after `3 * target_size` attempts and returns what it has.
    pub fn build<R: Rng + ?Sized>(
        &self,
        seed: &str,
        target_size: usize,
        rng: &mut R,
    ) -> Vec<Candidate> {
        let seed = Candidate::seed(seed);
        let seed_id = seed.id();
        let mut population = vec![seed];
        let max_attempts = target_size * ATTEMPTS_PER_SLOT;
        let mut attempts = 0;

        info!("Generating initial population ({target_size})...");
        while population.len() < target_size && attempts < max_attempts {
            let mutation = if attempts % 2 == 0 {
                self.engine.mutate_concept(population[0].text(), rng)
            } else {
                self.engine.mutate_global(population[0].text(), rng)
            };
            attempts += 1;

            let too_short = mutation.text.chars().count() <= MIN_VIABLE_LEN;
            let duplicate = population.iter().any(|c| c.text() == mutation.text);
            if too_short || duplicate {
                debug!("Discarded variant (too_short={too_short}, duplicate={duplicate})");
                continue;
            }

            let id = CandidateId::new(0, population.len());
            population.push(Candidate::new(
                id,
                mutation.text,
                Origin::Initial {
                    family: mutation.family,
                },
                vec![seed_id],
            ));
            debug!("Generated variant {}/{target_size}", population.len());
        }

        if population.len() < target_size {
            warn!(
                "Initial population short: {}/{target_size} after {attempts} attempts",
                population.len()
            );
        }
        population
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::backend::DeterministicBackend;
    use crate::schema::{MutationFamily, OperatorMix};

    const SEED: &str = "Write a short, witty reply that gently pushes back on the image.";

    #[test]
    fn test_build_full_population() {
        let engine = MutationEngine::new(
            Arc::new(DeterministicBackend::new()),
            OperatorMix::default(),
        );
        let mut rng = StdRng::seed_from_u64(42);

        let population = PopulationBuilder::new(&engine).build(SEED, 6, &mut rng);

        assert_eq!(population.len(), 6);
        assert_eq!(population[0].text(), SEED);
        assert_eq!(population[0].origin(), Origin::Seed);

        let texts: HashSet<&str> = population.iter().map(|c| c.text()).collect();
        assert_eq!(texts.len(), 6);

        for (i, candidate) in population.iter().enumerate() {
            assert_eq!(candidate.id(), CandidateId::new(0, i));
        }
        assert_eq!(
            population[1].origin(),
            Origin::Initial {
                family: MutationFamily::ConceptShift
            }
        );
        assert_eq!(
            population[2].origin(),
            Origin::Initial {
                family: MutationFamily::Global
            }
        );
        assert_eq!(population[1].parents(), &[CandidateId::new(0, 0)]);
    }

    #[test]
    fn test_failing_rewrite_returns_seed_only() {
        let backend = DeterministicBackend::new().failing_rewrite();
        let engine = MutationEngine::new(Arc::new(backend), OperatorMix::default());
        let mut rng = StdRng::seed_from_u64(0);

        let population = PopulationBuilder::new(&engine).build(SEED, 5, &mut rng);

        assert_eq!(population.len(), 1);
        assert_eq!(population[0].text(), SEED);
    }

    #[test]
    fn test_short_variants_rejected() {
        let engine = MutationEngine::new(
            Arc::new(DeterministicBackend::new()),
            OperatorMix::default(),
        );
        let mut rng = StdRng::seed_from_u64(0);

        // "Hi [vxxxxxx]" is 12 characters, below the viability threshold.
        let population = PopulationBuilder::new(&engine).build("Hi", 4, &mut rng);
        assert_eq!(population.len(), 1);
    }
}
