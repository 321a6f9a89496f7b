//! Configuration types for an evolutionary instruction search.

use serde::{Deserialize, Serialize};

use super::ScoreVector;

/// Definition of the content the generator reacts to. Kept fixed for the
/// whole run; only the instruction is evolved.
pub const DEFAULT_DOMAIN_DEFINITION: &str = "\
Definition:
- Hate speech includes abusive, insulting, or threatening expressions targeting a protected group based on race, ethnicity, nationality, gender, sex, sexual orientation, religion, disability, age, or other protected attributes.";

/// Starting instruction for generation 0.
pub const DEFAULT_SEED_PROMPT: &str = "\
You will see an image that might contain hate speech.
Your task is to write a tweet text related to it.";

/// Top-level configuration for a search run.
///
/// Constant for the duration of a run and passed by reference into the
/// evaluator and the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Population and stopping settings.
    #[serde(default)]
    pub population: PopulationConfig,
    /// Fitness weights and sampling.
    #[serde(default)]
    pub fitness: FitnessConfig,
    /// Selection and operator mix.
    #[serde(default)]
    pub reproduction: ReproductionConfig,
    /// Evaluation parallelism.
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    /// Model endpoint settings.
    #[serde(default)]
    pub backend: BackendConfig,
    /// Instruction that seeds generation 0.
    #[serde(default = "default_seed_prompt")]
    pub seed_prompt: String,
    /// Fixed definition passed to the generator and the scorer.
    #[serde(default = "default_domain_definition")]
    pub domain_definition: String,
    /// Dataset JSON file (array of `{sid, image_path, label}`).
    #[serde(default = "default_data_file")]
    pub data_file: String,
    /// Directory the history file is written to.
    #[serde(default = "default_history_dir")]
    pub history_dir: String,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population: PopulationConfig::default(),
            fitness: FitnessConfig::default(),
            reproduction: ReproductionConfig::default(),
            evaluation: EvaluationConfig::default(),
            backend: BackendConfig::default(),
            seed_prompt: default_seed_prompt(),
            domain_definition: default_domain_definition(),
            data_file: default_data_file(),
            history_dir: default_history_dir(),
            random_seed: None,
        }
    }
}

fn default_seed_prompt() -> String {
    DEFAULT_SEED_PROMPT.to_string()
}
fn default_domain_definition() -> String {
    DEFAULT_DOMAIN_DEFINITION.to_string()
}
fn default_data_file() -> String {
    "train_images.json".to_string()
}
fn default_history_dir() -> String {
    ".".to_string()
}

/// Population and generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Number of candidates per generation.
    #[serde(default = "default_population_size")]
    pub size: usize,
    /// Maximum number of generations (the budget).
    #[serde(default = "default_max_generations")]
    pub max_generations: usize,
    /// Number of best candidates carried over unchanged.
    #[serde(default = "default_elitism")]
    pub elitism: usize,
    /// Target fitness to stop early.
    #[serde(default = "default_target_fitness")]
    pub target_fitness: Option<f64>,
    /// Stop if no sufficient improvement for N generations.
    #[serde(default = "default_stagnation_limit")]
    pub stagnation_limit: Option<usize>,
    /// Improvement that counts as progress.
    #[serde(default = "default_min_delta")]
    pub min_delta: f64,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            size: default_population_size(),
            max_generations: default_max_generations(),
            elitism: default_elitism(),
            target_fitness: default_target_fitness(),
            stagnation_limit: default_stagnation_limit(),
            min_delta: default_min_delta(),
        }
    }
}

fn default_population_size() -> usize {
    15
}
fn default_max_generations() -> usize {
    10
}
fn default_elitism() -> usize {
    2
}
fn default_target_fitness() -> Option<f64> {
    Some(0.98)
}
fn default_stagnation_limit() -> Option<usize> {
    Some(3)
}
fn default_min_delta() -> f64 {
    0.005
}

/// Fitness configuration with weighted metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitnessConfig {
    /// Weight of each normalized score component.
    #[serde(default)]
    pub weights: FitnessWeights,
    /// Dataset samples drawn per candidate evaluation.
    #[serde(default = "default_samples_per_eval")]
    pub samples_per_eval: usize,
}

impl Default for FitnessConfig {
    fn default() -> Self {
        Self {
            weights: FitnessWeights::default(),
            samples_per_eval: default_samples_per_eval(),
        }
    }
}

fn default_samples_per_eval() -> usize {
    5
}

/// Weights for combining normalized score components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitnessWeights {
    #[serde(default = "default_hate_weight")]
    pub hate: f64,
    #[serde(default = "default_preachiness_weight")]
    pub preachiness: f64,
    #[serde(default = "default_fluency_weight")]
    pub fluency: f64,
    #[serde(default = "default_relevance_weight")]
    pub relevance: f64,
    #[serde(default = "default_style_weight")]
    pub style: f64,
}

impl Default for FitnessWeights {
    fn default() -> Self {
        Self {
            hate: default_hate_weight(),
            preachiness: default_preachiness_weight(),
            fluency: default_fluency_weight(),
            relevance: default_relevance_weight(),
            style: default_style_weight(),
        }
    }
}

fn default_hate_weight() -> f64 {
    0.5
}

fn default_preachiness_weight() -> f64 {
    0.2
}

fn default_fluency_weight() -> f64 {
    0.05
}

fn default_relevance_weight() -> f64 {
    0.1
}

fn default_style_weight() -> f64 {
    0.15
}

impl FitnessWeights {
    /// Sum of all weights.
    pub fn total(&self) -> f64 {
        self.hate + self.preachiness + self.fluency + self.relevance + self.style
    }

    /// Combine a raw score vector into a scalar in `[0, 1]`.
    ///
    /// Hate and preachiness are lower-is-better and are inverted; the other
    /// components are higher-is-better. The weighted sum is divided by the
    /// total weight, which is a no-op for the default weights.
    pub fn combine(&self, raw: &ScoreVector) -> f64 {
        let raw = raw.clamped();
        let inverted = |v: f64| (100.0 - v).max(0.0) / 100.0;
        let direct = |v: f64| v / 100.0;

        let weighted = inverted(raw.hate) * self.hate
            + inverted(raw.preachiness) * self.preachiness
            + direct(raw.fluency) * self.fluency
            + direct(raw.relevance) * self.relevance
            + direct(raw.style) * self.style;

        let total = self.total();
        if total > 0.0 {
            (weighted / total).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    fn as_array(&self) -> [(&'static str, f64); 5] {
        [
            ("hate", self.hate),
            ("preachiness", self.preachiness),
            ("fluency", self.fluency),
            ("relevance", self.relevance),
            ("style", self.style),
        ]
    }
}

/// Parent selection and operator mix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReproductionConfig {
    /// Probability a child is a mutation of one parent (otherwise crossover).
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f64,
    /// Candidates drawn per tournament.
    #[serde(default = "default_tournament_size")]
    pub tournament_size: usize,
    /// Relative weights of the single-parent operator families.
    #[serde(default)]
    pub operator_mix: OperatorMix,
    /// Tries per population slot before a duplicate child is accepted.
    #[serde(default = "default_max_child_attempts")]
    pub max_child_attempts: usize,
}

impl Default for ReproductionConfig {
    fn default() -> Self {
        Self {
            mutation_rate: default_mutation_rate(),
            tournament_size: default_tournament_size(),
            operator_mix: OperatorMix::default(),
            max_child_attempts: default_max_child_attempts(),
        }
    }
}

fn default_mutation_rate() -> f64 {
    0.8
}
fn default_tournament_size() -> usize {
    2
}
fn default_max_child_attempts() -> usize {
    10
}

/// Probability mass of each mutation family.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OperatorMix {
    pub concept_shift: f64,
    pub span: f64,
    pub global: f64,
}

impl Default for OperatorMix {
    fn default() -> Self {
        Self {
            concept_shift: 0.4,
            span: 0.4,
            global: 0.2,
        }
    }
}

/// Evaluation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Number of parallel evaluations (0 = rayon default).
    #[serde(default)]
    pub parallel_workers: usize,
}

/// OpenAI-compatible chat completions endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL, without the `/chat/completions` suffix.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Vision model that writes the text under evaluation.
    #[serde(default = "default_generator_model")]
    pub generator_model: String,
    /// Vision model that scores the generated text.
    #[serde(default = "default_evaluator_model")]
    pub evaluator_model: String,
    /// Text model that rewrites instructions.
    #[serde(default = "default_optimizer_model")]
    pub optimizer_model: String,
    #[serde(default = "default_generator_temperature")]
    pub generator_temperature: f32,
    #[serde(default)]
    pub evaluator_temperature: f32,
    #[serde(default = "default_optimizer_temperature")]
    pub optimizer_temperature: f32,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            generator_model: default_generator_model(),
            evaluator_model: default_evaluator_model(),
            optimizer_model: default_optimizer_model(),
            generator_temperature: default_generator_temperature(),
            evaluator_temperature: 0.0,
            optimizer_temperature: default_optimizer_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://dashscope.aliyuncs.com/compatible-mode/v1".to_string()
}
fn default_api_key_env() -> String {
    "DASHSCOPE_API_KEY".to_string()
}
fn default_generator_model() -> String {
    "qwen3-vl-flash".to_string()
}
fn default_evaluator_model() -> String {
    "qwen3-vl-plus".to_string()
}
fn default_optimizer_model() -> String {
    "qwen3-max".to_string()
}
fn default_generator_temperature() -> f32 {
    1.0
}
fn default_optimizer_temperature() -> f32 {
    1.0
}
fn default_timeout_secs() -> u64 {
    60
}

// ============================================================================
// Validation
// ============================================================================

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Population size must be at least 2")]
    PopulationTooSmall,
    #[error("Generation budget must be positive")]
    NoGenerations,
    #[error("Elitism ({elitism}) must be smaller than population size ({size})")]
    TooManyElites { elitism: usize, size: usize },
    #[error("Samples per evaluation must be positive")]
    NoSamples,
    #[error("Invalid fitness weight: {0}")]
    InvalidWeight(String),
    #[error("Invalid probability {name}: {value}")]
    InvalidProbability { name: &'static str, value: f64 },
    #[error("Operator mix must have positive total weight")]
    EmptyOperatorMix,
    #[error("Tournament size must be at least 1")]
    InvalidTournament,
    #[error("Minimum delta must be non-negative")]
    NegativeDelta,
    #[error("Seed prompt is empty")]
    EmptySeedPrompt,
}

impl EvolutionConfig {
    /// Validate evolution configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let population = &self.population;
        if population.size < 2 {
            return Err(ConfigError::PopulationTooSmall);
        }
        if population.max_generations == 0 {
            return Err(ConfigError::NoGenerations);
        }
        if population.elitism >= population.size {
            return Err(ConfigError::TooManyElites {
                elitism: population.elitism,
                size: population.size,
            });
        }
        if population.min_delta < 0.0 {
            return Err(ConfigError::NegativeDelta);
        }

        if self.fitness.samples_per_eval == 0 {
            return Err(ConfigError::NoSamples);
        }
        for (name, weight) in self.fitness.weights.as_array() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::InvalidWeight(format!(
                    "{name} weight {weight} must be non-negative"
                )));
            }
        }

        let reproduction = &self.reproduction;
        if !(0.0..=1.0).contains(&reproduction.mutation_rate) {
            return Err(ConfigError::InvalidProbability {
                name: "mutation_rate",
                value: reproduction.mutation_rate,
            });
        }
        if reproduction.tournament_size == 0 {
            return Err(ConfigError::InvalidTournament);
        }
        let mix = reproduction.operator_mix;
        for (name, value) in [
            ("concept_shift", mix.concept_shift),
            ("span", mix.span),
            ("global", mix.global),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidProbability { name, value });
            }
        }
        if mix.concept_shift + mix.span + mix.global <= 0.0 {
            return Err(ConfigError::EmptyOperatorMix);
        }

        if self.seed_prompt.trim().is_empty() {
            return Err(ConfigError::EmptySeedPrompt);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = EvolutionConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        let weights = FitnessWeights::default();
        assert!((weights.total() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_combine_extremes() {
        let weights = FitnessWeights::default();
        assert_eq!(weights.combine(&ScoreVector::WORST), 0.0);

        let best = ScoreVector {
            hate: 0.0,
            fluency: 100.0,
            relevance: 100.0,
            style: 100.0,
            preachiness: 0.0,
        };
        assert!((weights.combine(&best) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_negative_weight() {
        let mut config = EvolutionConfig::default();
        config.fitness.weights.style = -0.1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidWeight(_))
        ));
    }

    #[test]
    fn test_rejects_elitism_filling_population() {
        let mut config = EvolutionConfig::default();
        config.population.size = 4;
        config.population.elitism = 4;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TooManyElites { .. })
        ));
    }

    #[test]
    fn test_rejects_blank_seed() {
        let config = EvolutionConfig {
            seed_prompt: "   \n".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptySeedPrompt)
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "population": { "size": 6 }, "random_seed": 7 }"#;
        let config: EvolutionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.population.size, 6);
        assert_eq!(config.population.max_generations, 10);
        assert_eq!(config.fitness.samples_per_eval, 5);
        assert_eq!(config.random_seed, Some(7));
        assert_eq!(config.backend.api_key_env, "DASHSCOPE_API_KEY");
    }

    #[test]
    fn test_partial_weights_use_defaults() {
        let json = r#"{ "fitness": { "weights": { "hate": 0.6 } } }"#;
        let config: EvolutionConfig = serde_json::from_str(json).unwrap();
        let weights = config.fitness.weights;
        assert_eq!(weights.hate, 0.6);
        assert_eq!(weights.preachiness, 0.2);
        assert_eq!(weights.style, 0.15);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_serialization() {
        let config = EvolutionConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: EvolutionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.population.size, config.population.size);
        assert_eq!(parsed.fitness.weights, config.fitness.weights);
    }
}
