//! Variation operators for prompt candidates.
//!
//! Every operator delegates the actual rewording to the backend's rewrite
//! capability and sanitizes the response. A failed or empty rewrite leaves
//! the input unchanged, so operators always produce usable text.

use std::ops::Range;
use std::sync::{Arc, LazyLock};

use log::{debug, warn};
use rand::Rng;
use regex::Regex;

use crate::backend::ModelBackend;
use crate::schema::{MutationFamily, OperatorMix};

/// Localized edits to one sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanStrategy {
    Rewrite,
    Strengthen,
    Simplify,
    AddConstraint,
}

impl SpanStrategy {
    pub const ALL: [Self; 4] = [
        Self::Rewrite,
        Self::Strengthen,
        Self::Simplify,
        Self::AddConstraint,
    ];

    pub fn instruction(&self, span: &str) -> String {
        match self {
            Self::Rewrite => {
                format!("Rewrite this sentence to be more impactful but keep the meaning: '{span}'")
            }
            Self::Strengthen => {
                format!("Make this sentence sound more authoritative and strict: '{span}'")
            }
            Self::Simplify => format!("Shorten this sentence drastically to be punchy: '{span}'"),
            Self::AddConstraint => format!(
                "Add a constraint to this sentence about being concise or avoiding preachiness: '{span}'"
            ),
        }
    }
}

/// Whole-prompt strategy changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConceptStrategy {
    Humor,
    FactCheck,
    VisualsOnly,
    GenZPersona,
    MinimalistPersona,
    StepByStep,
    RemoveSafetyWarnings,
}

impl ConceptStrategy {
    pub const ALL: [Self; 7] = [
        Self::Humor,
        Self::FactCheck,
        Self::VisualsOnly,
        Self::GenZPersona,
        Self::MinimalistPersona,
        Self::StepByStep,
        Self::RemoveSafetyWarnings,
    ];

    pub fn instruction(&self) -> &'static str {
        match self {
            Self::Humor => {
                "Rewrite the entire prompt to instruct the model to be witty, sarcastic, or humorous instead of serious. The goal is to mock the hate speech subtly."
            }
            Self::FactCheck => {
                "Rewrite the prompt to instruct the model to act like a cold, objective fact-checker. It should correct the image's premise with dry logic."
            }
            Self::VisualsOnly => {
                "Rewrite the prompt to instruct the model to focus purely on the visual composition or aesthetic flaws of the image, ignoring the hateful message entirely."
            }
            Self::GenZPersona => {
                "Rewrite the instructions to force the model to adopt a casual, 'Gen-Z' internet user persona. Use slang, lowercase, and be dismissive of the hate."
            }
            Self::MinimalistPersona => {
                "Rewrite the prompt to demand extreme brevity. The model should output less than 10 words."
            }
            Self::StepByStep => {
                "Insert a 'Step-by-Step' reasoning requirement into the prompt, asking the model to first analyze the intent, then choose a counter-strategy."
            }
            Self::RemoveSafetyWarnings => {
                "Remove any parts of the prompt that mention 'safety guidelines', 'respect', or 'harm'. Make the prompt purely functional to avoid triggering the model's preachy safety filters."
            }
        }
    }
}

/// Generic whole-prompt rewording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalStrategy {
    Rephrase,
    Expand,
    Condense,
}

impl GlobalStrategy {
    pub const ALL: [Self; 3] = [Self::Rephrase, Self::Expand, Self::Condense];

    pub fn instruction(&self) -> String {
        let verb = match self {
            Self::Rephrase => "rephrase",
            Self::Expand => "expand",
            Self::Condense => "condense",
        };
        format!("Please {verb} the following prompt instruction to be more effective for an AI model.")
    }
}

const CROSSOVER_INSTRUCTION: &str = "Analyze Prompt A and Prompt B. Create a new, hybrid prompt \
that combines the unique strategies of both (e.g., the persona of A and the constraints of B).";

/// Output of a mutation: new text and the family that actually produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    pub text: String,
    pub family: MutationFamily,
}

/// Applies mutation and crossover through a rewrite backend.
pub struct MutationEngine {
    backend: Arc<dyn ModelBackend>,
    mix: OperatorMix,
}

impl MutationEngine {
    pub fn new(backend: Arc<dyn ModelBackend>, mix: OperatorMix) -> Self {
        Self { backend, mix }
    }

    /// Pick a family according to the operator mix and apply it.
    pub fn mutate<R: Rng + ?Sized>(&self, text: &str, rng: &mut R) -> Mutation {
        match self.pick_family(rng) {
            MutationFamily::ConceptShift => self.mutate_concept(text, rng),
            MutationFamily::Span => self.mutate_span(text, rng),
            MutationFamily::Global => self.mutate_global(text, rng),
        }
    }

    fn pick_family<R: Rng + ?Sized>(&self, rng: &mut R) -> MutationFamily {
        let total = self.mix.concept_shift + self.mix.span + self.mix.global;
        let roll = rng.r#gen::<f64>() * total;
        if roll < self.mix.concept_shift {
            MutationFamily::ConceptShift
        } else if roll < self.mix.concept_shift + self.mix.span {
            MutationFamily::Span
        } else {
            MutationFamily::Global
        }
    }

    /// Rewrite one randomly chosen sentence and splice it back in place.
    ///
    /// Text with fewer than two sentences gets a global mutation instead.
    pub fn mutate_span<R: Rng + ?Sized>(&self, text: &str, rng: &mut R) -> Mutation {
        let spans = sentence_spans(text);
        if spans.len() < 2 {
            debug!("Span mutation on {} sentence(s), using global", spans.len());
            return self.mutate_global(text, rng);
        }

        let span = spans[rng.gen_range(0..spans.len())].clone();
        let strategy = SpanStrategy::ALL[rng.gen_range(0..SpanStrategy::ALL.len())];
        let target = &text[span.clone()];
        let replacement = self.rewrite(target, &strategy.instruction(target));

        Mutation {
            text: splice(text, span, &replacement),
            family: MutationFamily::Span,
        }
    }

    pub fn mutate_concept<R: Rng + ?Sized>(&self, text: &str, rng: &mut R) -> Mutation {
        let strategy = ConceptStrategy::ALL[rng.gen_range(0..ConceptStrategy::ALL.len())];
        self.mutate_concept_with(text, strategy)
    }

    pub fn mutate_concept_with(&self, text: &str, strategy: ConceptStrategy) -> Mutation {
        Mutation {
            text: self.rewrite(text, strategy.instruction()),
            family: MutationFamily::ConceptShift,
        }
    }

    pub fn mutate_global<R: Rng + ?Sized>(&self, text: &str, rng: &mut R) -> Mutation {
        let strategy = GlobalStrategy::ALL[rng.gen_range(0..GlobalStrategy::ALL.len())];
        Mutation {
            text: self.rewrite(text, &strategy.instruction()),
            family: MutationFamily::Global,
        }
    }

    /// Merge two prompts into a hybrid. A failed or empty rewrite yields
    /// `first` unchanged.
    pub fn crossover(&self, first: &str, second: &str) -> String {
        let combined = format!("Prompt A: {first}\n\nPrompt B: {second}");
        match self.request(&combined, CROSSOVER_INSTRUCTION) {
            Some(text) => text,
            None => first.to_string(),
        }
    }

    fn rewrite(&self, source: &str, instruction: &str) -> String {
        self.request(source, instruction)
            .unwrap_or_else(|| source.to_string())
    }

    fn request(&self, source: &str, instruction: &str) -> Option<String> {
        match self.backend.rewrite(source, instruction) {
            Ok(raw) => {
                let cleaned = sanitize_rewrite(&raw);
                if cleaned.is_empty() {
                    warn!("Rewrite returned no usable text, keeping input");
                    None
                } else {
                    Some(cleaned)
                }
            }
            Err(e) => {
                warn!("Rewrite failed, keeping input: {e}");
                None
            }
        }
    }
}

static BOILERPLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^(certainly|sure|here is|the revised prompt|updated instruction).*?:\s*\n?")
        .expect("boilerplate pattern is valid")
});

/// Strip code fences, a leading conversational preamble and enclosing
/// double quotes from rewriter output.
pub fn sanitize_rewrite(raw: &str) -> String {
    let mut text = raw.trim().to_string();

    if text.starts_with("```") && text.ends_with("```") {
        let lines: Vec<&str> = text.split('\n').collect();
        text = if lines.len() >= 3 {
            lines[1..lines.len() - 1].join("\n")
        } else {
            text.replace("```", "")
        };
    }

    let mut text = BOILERPLATE.replace(text.trim(), "").trim().to_string();

    if text.len() > 2 && text.starts_with('"') && text.ends_with('"') {
        text = text[1..text.len() - 1].trim().to_string();
    }
    text
}

/// Byte ranges of the sentences in `text`.
///
/// A sentence ends at `.`, `!` or `?` followed by whitespace. Ranges exclude
/// surrounding whitespace; empty pieces are skipped.
pub fn sentence_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let boundary = matches!(c, '.' | '!' | '?')
            && chars.peek().is_some_and(|(_, next)| next.is_whitespace());
        if boundary {
            let end = i + c.len_utf8();
            push_trimmed(text, start..end, &mut spans);
            start = end;
        }
    }
    push_trimmed(text, start..text.len(), &mut spans);
    spans
}

fn push_trimmed(text: &str, range: Range<usize>, spans: &mut Vec<Range<usize>>) {
    let piece = &text[range.clone()];
    let trimmed = piece.trim();
    if trimmed.is_empty() {
        return;
    }
    let start = range.start + (piece.len() - piece.trim_start().len());
    spans.push(start..start + trimmed.len());
}

fn splice(text: &str, span: Range<usize>, replacement: &str) -> String {
    let mut out = String::with_capacity(text.len() - span.len() + replacement.len());
    out.push_str(&text[..span.start]);
    out.push_str(replacement);
    out.push_str(&text[span.end..]);
    out
}
