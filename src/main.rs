//! evoprompt CLI - Run and inspect evolutionary prompt searches.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use evoprompt::{
    analysis::{self, replay},
    backend::{DeterministicBackend, ModelBackend, OpenAiCompatibleBackend},
    evolution::{GenerationScheduler, HistoryStore},
    schema::{self, EvolutionConfig, POSITIVE_LABEL},
};
use rand::SeedableRng;
use rand::rngs::StdRng;

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage(&args[0]);
        std::process::exit(1);
    }

    let offline = args.iter().any(|a| a == "--offline");
    let positional: Vec<&str> = args[2..]
        .iter()
        .map(String::as_str)
        .filter(|a| !a.starts_with("--"))
        .collect();

    match (args[1].as_str(), positional.as_slice()) {
        ("--example", _) => print_example_config(),
        ("run", [config]) => run(Path::new(config), offline),
        ("report", [history]) => report(Path::new(history)),
        ("dataset", [image_dir, out]) => build_dataset(Path::new(image_dir), Path::new(out)),
        ("replay", [config, history, out]) => {
            replay_prompts(Path::new(config), Path::new(history), Path::new(out), offline)
        }
        _ => {
            print_usage(&args[0]);
            std::process::exit(1);
        }
    }
}

fn print_usage(program: &str) {
    eprintln!("Usage: {program} <command> [args]");
    eprintln!();
    eprintln!("Evolve generation instructions against an LLM judge.");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  run <config.json> [--offline]           Run the evolutionary search");
    eprintln!("  report <history.json>                   Print per-generation statistics");
    eprintln!("  dataset <image_dir> <out.json>          Build a dataset file from images");
    eprintln!("  replay <config.json> <history.json> <out.json> [--offline]");
    eprintln!("                                          Run selected prompts over the dataset");
    eprintln!("  --example                               Print the default configuration");
    eprintln!();
    eprintln!("--offline uses a deterministic local backend instead of the API.");
}

fn load_config(path: &Path) -> EvolutionConfig {
    let config_str = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    let config: EvolutionConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    }
    config
}

fn build_backend(config: &EvolutionConfig, offline: bool) -> Arc<dyn ModelBackend> {
    if offline {
        return Arc::new(DeterministicBackend::new());
    }
    match OpenAiCompatibleBackend::new(config.backend.clone()) {
        Ok(backend) => Arc::new(backend),
        Err(e) => {
            eprintln!("Error creating backend: {}", e);
            std::process::exit(1);
        }
    }
}

fn run(config_path: &Path, offline: bool) {
    let config = load_config(config_path);
    let backend = build_backend(&config, offline);

    let dataset = schema::load_positive(&config.data_file).unwrap_or_else(|e| {
        eprintln!("Error loading dataset: {}", e);
        std::process::exit(1);
    });
    let history = HistoryStore::in_dir(&config.history_dir);

    println!("Evolutionary Prompt Search");
    println!("==========================");
    println!("Backend: {}", backend.name());
    println!("Dataset: {} positive records", dataset.len());
    println!(
        "Population: {} (elitism {}), up to {} generations",
        config.population.size, config.population.elitism, config.population.max_generations
    );
    println!("History: {}", history.path().display());
    println!();

    let mut scheduler =
        GenerationScheduler::new(config, backend, dataset, history).unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        });

    let result = scheduler
        .run_with_callback(|progress| {
            println!(
                "  Generation {}/{}: best={:.4}, gen_best={:.4}, mean={:.4}, stagnation={}",
                progress.generation + 1,
                progress.total_generations,
                progress.best_fitness,
                progress.generation_best,
                progress.mean_fitness,
                progress.stagnation_count
            );
        })
        .unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        });

    let stats = &result.stats;
    println!();
    println!("Stopped: {:?}", stats.stop_reason);
    println!(
        "Generations: {}, evaluations: {}, time: {:.1}s",
        stats.generations, stats.total_evaluations, stats.elapsed_seconds
    );
    println!("Best fitness: {:.4} ({})", stats.best_fitness, result.best.id());
    println!("Best prompt:");
    println!("{}", result.best.text());
    println!();
    println!("History saved to {}", result.history_path.display());
}

fn report(history_path: &Path) {
    let history = HistoryStore::load(history_path).unwrap_or_else(|e| {
        eprintln!("Error loading history: {}", e);
        std::process::exit(1);
    });

    let summaries = analysis::summarize(&history);
    print!("{}", analysis::render_table(&summaries));

    if let Some(best) = history
        .iter()
        .max_by(|a, b| a.best_fitness.total_cmp(&b.best_fitness))
    {
        println!();
        println!(
            "Best overall: {} in generation {} ({:.4})",
            best.best_candidate.id(),
            best.generation,
            best.best_fitness
        );
        println!("{}", best.best_candidate.text());
    }
}

fn build_dataset(image_dir: &Path, out: &Path) {
    let records = schema::scan_image_dir(image_dir, POSITIVE_LABEL).unwrap_or_else(|e| {
        eprintln!("Error scanning {}: {}", image_dir.display(), e);
        std::process::exit(1);
    });

    if let Err(e) = schema::save(out, &records) {
        eprintln!("Error writing {}: {}", out.display(), e);
        std::process::exit(1);
    }
    println!("Wrote {} records to {}", records.len(), out.display());
}

fn replay_prompts(config_path: &Path, history_path: &Path, out: &Path, offline: bool) {
    let config = load_config(config_path);
    let backend = build_backend(&config, offline);

    let history = HistoryStore::load(history_path).unwrap_or_else(|e| {
        eprintln!("Error loading history: {}", e);
        std::process::exit(1);
    });
    let dataset = schema::load_positive(&config.data_file).unwrap_or_else(|e| {
        eprintln!("Error loading dataset: {}", e);
        std::process::exit(1);
    });

    let mut rng = match config.random_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let prompts = replay::select_prompts(
        &history,
        replay::DEFAULT_TOP,
        replay::DEFAULT_INITIAL,
        &mut rng,
    );
    if prompts.is_empty() {
        eprintln!("History {} has no candidates", history_path.display());
        std::process::exit(1);
    }

    let records = replay::replay(
        backend.as_ref(),
        &config.domain_definition,
        &prompts,
        &dataset,
    );
    if let Err(e) = replay::save(out, &records) {
        eprintln!("Error writing {}: {}", out.display(), e);
        std::process::exit(1);
    }
    println!(
        "Wrote {} outputs for {} prompts to {}",
        records.len(),
        prompts.len(),
        out.display()
    );
}

fn print_example_config() {
    let config = EvolutionConfig::default();

    println!("Example configuration (config.json):");
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error serializing config: {}", e);
            std::process::exit(1);
        }
    }
}
