//! Replay selected prompts over a whole dataset.
//!
//! Takes the strongest candidates of the last generation and a random draw
//! from the first, and runs the generator once per dataset record.

use std::fs;
use std::io;
use std::path::Path;

use log::{info, warn};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::backend::ModelBackend;
use crate::schema::{Candidate, DatasetRecord, GenerationSnapshot};

/// Candidates taken from the last generation.
pub const DEFAULT_TOP: usize = 3;
/// Candidates drawn at random from generation 0.
pub const DEFAULT_INITIAL: usize = 3;

/// A prompt chosen for replay, with a label describing where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayPrompt {
    pub prompt_id: String,
    pub candidate: Candidate,
}

/// One generated output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayRecord {
    pub sid: String,
    pub prompt_id: String,
    pub prompt: String,
    pub generated_text: String,
}

/// Pick the top `top` candidates of the last generation and up to `initial`
/// random candidates of the first.
///
/// Records are already ordered by descending fitness. A candidate selected
/// as a top pick is not drawn again from generation 0.
pub fn select_prompts<R: Rng + ?Sized>(
    history: &[GenerationSnapshot],
    top: usize,
    initial: usize,
    rng: &mut R,
) -> Vec<ReplayPrompt> {
    let mut prompts = Vec::new();

    if let Some(last) = history.last() {
        for (rank, record) in last.records.iter().take(top).enumerate() {
            prompts.push(ReplayPrompt {
                prompt_id: format!("best_{}_{}", rank + 1, record.candidate.id()),
                candidate: record.candidate.clone(),
            });
        }
    }

    if let Some(first) = history.first() {
        let pool: Vec<&Candidate> = first
            .records
            .iter()
            .map(|r| &r.candidate)
            .filter(|c| !prompts.iter().any(|p| p.candidate.text() == c.text()))
            .collect();
        for candidate in pool.choose_multiple(rng, initial) {
            prompts.push(ReplayPrompt {
                prompt_id: format!("initial_{}", candidate.id()),
                candidate: (*candidate).clone(),
            });
        }
    }

    prompts
}

/// Generate one output per (prompt, record) pair.
///
/// Generation failures are logged and recorded as empty text.
pub fn replay(
    backend: &dyn ModelBackend,
    domain_definition: &str,
    prompts: &[ReplayPrompt],
    dataset: &[DatasetRecord],
) -> Vec<ReplayRecord> {
    let mut records = Vec::with_capacity(prompts.len() * dataset.len());

    for prompt in prompts {
        info!("Replaying {} over {} records", prompt.prompt_id, dataset.len());
        for record in dataset {
            let generated_text = backend
                .generate(&record.image_path, domain_definition, prompt.candidate.text())
                .unwrap_or_else(|e| {
                    warn!("Generation failed for {} on {}: {e}", prompt.prompt_id, record.sid);
                    String::new()
                });
            records.push(ReplayRecord {
                sid: record.sid.clone(),
                prompt_id: prompt.prompt_id.clone(),
                prompt: prompt.candidate.text().to_string(),
                generated_text,
            });
        }
    }

    records
}

/// Write replay records as pretty JSON.
pub fn save<P: AsRef<Path>>(path: P, records: &[ReplayRecord]) -> io::Result<()> {
    let json = serde_json::to_string_pretty(records)?;
    fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::backend::DeterministicBackend;
    use crate::schema::{CandidateId, FitnessRecord, Origin, POSITIVE_LABEL, ScoreVector};

    fn snapshot(generation: usize, texts: &[&str]) -> GenerationSnapshot {
        let records = texts
            .iter()
            .enumerate()
            .map(|(i, text)| FitnessRecord {
                candidate: Candidate::new(
                    CandidateId::new(generation, i),
                    text.to_string(),
                    Origin::Crossover,
                    Vec::new(),
                ),
                fitness: 1.0 - i as f64 * 0.1,
                mean_metrics: ScoreVector::WORST,
                samples: Vec::new(),
            })
            .collect();
        GenerationSnapshot::from_records(generation, records).unwrap()
    }

    fn dataset() -> Vec<DatasetRecord> {
        ["a", "b"]
            .iter()
            .map(|sid| DatasetRecord {
                sid: sid.to_string(),
                image_path: PathBuf::from(format!("{sid}.jpg")),
                label: POSITIVE_LABEL,
            })
            .collect()
    }

    #[test]
    fn test_select_prompts() {
        let history = vec![
            snapshot(0, &["seed", "v1", "v2", "v3", "v4"]),
            snapshot(1, &["best", "seed", "second", "fourth"]),
        ];
        let mut rng = StdRng::seed_from_u64(9);

        let prompts = select_prompts(&history, DEFAULT_TOP, DEFAULT_INITIAL, &mut rng);
        assert_eq!(prompts.len(), 6);
        assert_eq!(prompts[0].prompt_id, "best_1_gen_1_id_0");
        assert_eq!(prompts[0].candidate.text(), "best");
        assert_eq!(prompts[2].candidate.text(), "second");
        for p in &prompts[3..] {
            assert!(p.prompt_id.starts_with("initial_gen_0_id_"));
            assert_ne!(p.candidate.text(), "seed");
        }
    }

    #[test]
    fn test_select_prompts_small_history() {
        let history = vec![snapshot(0, &["only"])];
        let mut rng = StdRng::seed_from_u64(0);

        let prompts = select_prompts(&history, 3, 3, &mut rng);
        assert_eq!(prompts.len(), 1);
        assert!(select_prompts(&[], 3, 3, &mut rng).is_empty());
    }

    #[test]
    fn test_replay_every_record() {
        let history = vec![snapshot(0, &["Be witty.", "Be dry."])];
        let mut rng = StdRng::seed_from_u64(0);
        let prompts = select_prompts(&history, 2, 0, &mut rng);

        let records = replay(&DeterministicBackend::new(), "def", &prompts, &dataset());
        assert_eq!(records.len(), 4);
        assert!(records.iter().all(|r| r.generated_text.starts_with("offline reply")));

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("replay.json");
        save(&out, &records).unwrap();
        let loaded: Vec<ReplayRecord> =
            serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(loaded, records);
    }

    #[test]
    fn test_replay_failure_is_empty_text() {
        let history = vec![snapshot(0, &["Be witty."])];
        let mut rng = StdRng::seed_from_u64(0);
        let prompts = select_prompts(&history, 1, 0, &mut rng);

        let backend = DeterministicBackend::new().failing_generation();
        let records = replay(&backend, "def", &prompts, &dataset());
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.generated_text.is_empty()));
    }
}
