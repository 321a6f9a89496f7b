//! Per-generation statistics over a persisted history.

use std::fmt::Write;

use serde::Serialize;

use crate::schema::{GenerationSnapshot, ScoreVector};

/// Aggregate statistics for one generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationSummary {
    pub generation: usize,
    pub candidates: usize,
    pub max_fitness: f64,
    pub mean_fitness: f64,
    /// Population standard deviation of fitness.
    pub fitness_std: f64,
    /// Mean of each candidate's mean raw metrics.
    pub mean_metrics: ScoreVector,
}

impl GenerationSummary {
    /// Summarize one snapshot. Returns `None` for an empty generation.
    pub fn from_snapshot(snapshot: &GenerationSnapshot) -> Option<Self> {
        let n = snapshot.records.len();
        if n == 0 {
            return None;
        }
        let fitness = snapshot.records.iter().map(|r| r.fitness);
        let mean = fitness.clone().sum::<f64>() / n as f64;
        let variance = fitness.clone().map(|f| (f - mean).powi(2)).sum::<f64>() / n as f64;
        let max = fitness.fold(f64::NEG_INFINITY, f64::max);

        Some(Self {
            generation: snapshot.generation,
            candidates: n,
            max_fitness: max,
            mean_fitness: mean,
            fitness_std: variance.sqrt(),
            mean_metrics: ScoreVector::mean(snapshot.records.iter().map(|r| &r.mean_metrics))?,
        })
    }
}

/// Summarize every non-empty generation, in order.
pub fn summarize(history: &[GenerationSnapshot]) -> Vec<GenerationSummary> {
    history
        .iter()
        .filter_map(GenerationSummary::from_snapshot)
        .collect()
}

/// Render summaries as a fixed-width text table.
pub fn render_table(summaries: &[GenerationSummary]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>4} {:>5} {:>8} {:>8} {:>8} {:>7} {:>7} {:>7} {:>7} {:>7}",
        "gen", "n", "max", "mean", "std", "hate", "preach", "fluency", "relev", "style"
    );
    for s in summaries {
        let m = &s.mean_metrics;
        let _ = writeln!(
            out,
            "{:>4} {:>5} {:>8.4} {:>8.4} {:>8.4} {:>7.2} {:>7.2} {:>7.2} {:>7.2} {:>7.2}",
            s.generation,
            s.candidates,
            s.max_fitness,
            s.mean_fitness,
            s.fitness_std,
            m.hate,
            m.preachiness,
            m.fluency,
            m.relevance,
            m.style
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Candidate, CandidateId, FitnessRecord, Origin};

    fn snapshot(generation: usize, fitness: &[f64], hate: f64) -> GenerationSnapshot {
        let records = fitness
            .iter()
            .enumerate()
            .map(|(i, &f)| FitnessRecord {
                candidate: Candidate::new(
                    CandidateId::new(generation, i),
                    format!("prompt {i}"),
                    Origin::Crossover,
                    Vec::new(),
                ),
                fitness: f,
                mean_metrics: ScoreVector {
                    hate,
                    fluency: 50.0,
                    relevance: 40.0,
                    style: 30.0,
                    preachiness: 20.0,
                },
                samples: Vec::new(),
            })
            .collect();
        GenerationSnapshot::from_records(generation, records).unwrap()
    }

    #[test]
    fn test_summary_stats() {
        let summary =
            GenerationSummary::from_snapshot(&snapshot(0, &[0.2, 0.4, 0.6], 10.0)).unwrap();
        assert_eq!(summary.candidates, 3);
        assert!((summary.max_fitness - 0.6).abs() < 1e-12);
        assert!((summary.mean_fitness - 0.4).abs() < 1e-12);
        assert!((summary.fitness_std - (0.08f64 / 3.0).sqrt()).abs() < 1e-12);
        assert!((summary.mean_metrics.hate - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_render_table() {
        let summaries = summarize(&[snapshot(0, &[0.5], 10.0), snapshot(1, &[0.7, 0.9], 5.0)]);
        let table = render_table(&summaries);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("mean"));
        assert!(lines[2].contains("0.9000"));
        assert!(lines[2].contains("5.00"));
    }
}
