//! Benchmarks for the pure hot paths of the search.

use std::path::PathBuf;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;

use evoprompt::{
    backend::DeterministicBackend,
    evolution::{FitnessEvaluator, sanitize_rewrite, sentence_spans},
    schema::{
        Candidate, DEFAULT_SEED_PROMPT, DatasetRecord, FitnessConfig, FitnessWeights,
        POSITIVE_LABEL, ScoreVector,
    },
};

fn bench_sanitize(c: &mut Criterion) {
    let raw = format!(
        "```\nCertainly! Here is the revised prompt:\n\"{}\"\n```",
        DEFAULT_SEED_PROMPT
    );
    c.bench_function("sanitize_rewrite", |b| {
        b.iter(|| sanitize_rewrite(black_box(&raw)))
    });
}

fn bench_sentence_spans(c: &mut Criterion) {
    let mut group = c.benchmark_group("sentence_spans");

    for repeats in [1, 8, 64] {
        let text = DEFAULT_SEED_PROMPT.repeat(repeats);
        group.bench_with_input(BenchmarkId::from_parameter(repeats), &text, |b, text| {
            b.iter(|| sentence_spans(black_box(text)))
        });
    }

    group.finish();
}

fn bench_combine(c: &mut Criterion) {
    let weights = FitnessWeights::default();
    let scores = ScoreVector {
        hate: 12.0,
        fluency: 88.0,
        relevance: 71.0,
        style: 64.0,
        preachiness: 23.0,
    };
    c.bench_function("fitness_combine", |b| {
        b.iter(|| weights.combine(black_box(&scores)))
    });
}

fn bench_compute_fitness(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_fitness");
    let dataset: Vec<DatasetRecord> = (0..200)
        .map(|i| DatasetRecord {
            sid: format!("s{i}"),
            image_path: PathBuf::from(format!("images/s{i}.jpg")),
            label: POSITIVE_LABEL,
        })
        .collect();
    let candidate = Candidate::seed(DEFAULT_SEED_PROMPT);

    for samples in [5, 20, 100] {
        let evaluator = FitnessEvaluator::new(
            Arc::new(DeterministicBackend::new()),
            FitnessConfig {
                samples_per_eval: samples,
                ..Default::default()
            },
            "definition",
        );
        group.bench_with_input(BenchmarkId::from_parameter(samples), &samples, |b, _| {
            let mut rng = StdRng::seed_from_u64(42);
            b.iter(|| evaluator.compute_fitness(&candidate, &dataset, &mut rng))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_sanitize,
    bench_sentence_spans,
    bench_combine,
    bench_compute_fitness
);
criterion_main!(benches);
