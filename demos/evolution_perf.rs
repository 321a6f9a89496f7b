//! Quick evolution performance test against the offline backend.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use evoprompt::{
    DeterministicBackend, EvolutionConfig, GenerationScheduler, HistoryStore,
    schema::{DatasetRecord, EvaluationConfig, POSITIVE_LABEL, PopulationConfig},
};

fn main() {
    println!("=== Evolution Performance Test ===\n");

    let dir = tempfile::tempdir().expect("temp dir");
    let dataset: Vec<DatasetRecord> = (0..100)
        .map(|i| DatasetRecord {
            sid: format!("s{i}"),
            image_path: PathBuf::from(format!("images/s{i}.jpg")),
            label: POSITIVE_LABEL,
        })
        .collect();

    // Test different population sizes
    for size in [10, 20, 40] {
        println!("Population size: {}", size);

        let config = EvolutionConfig {
            population: PopulationConfig {
                size,
                max_generations: 10,
                elitism: 2,
                target_fitness: None,
                stagnation_limit: None,
                ..Default::default()
            },
            evaluation: EvaluationConfig {
                parallel_workers: 4,
            },
            random_seed: Some(42),
            ..Default::default()
        };

        let history = HistoryStore::new(dir.path().join(format!("history_{size}.json")));
        let start = Instant::now();
        let mut scheduler = GenerationScheduler::new(
            config,
            Arc::new(DeterministicBackend::new()),
            dataset.clone(),
            history,
        )
        .expect("valid config");
        let result = scheduler.run().expect("offline run");
        let elapsed = start.elapsed();

        let total_evals = result.stats.total_evaluations;
        let evals_per_sec = total_evals as f64 / elapsed.as_secs_f64();

        println!("  Generations:    {}", result.stats.generations);
        println!("  Evaluations:    {}", total_evals);
        println!("  Elapsed:        {:.2}s", elapsed.as_secs_f64());
        println!("  Evals/sec:      {:.1}", evals_per_sec);
        println!("  Best fitness:   {:.4}", result.stats.best_fitness);
        println!();
    }
}
