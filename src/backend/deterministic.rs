use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{BackendError, ModelBackend};
use crate::schema::ScoreVector;

/// Network-free backend whose outputs are pure functions of their inputs.
///
/// Generated text and scores hash the image path and the text, so the same
/// candidate always scores the same on the same sample. Rewrites also mix
/// in a call counter; every rewrite yields a fresh variant.
#[derive(Debug, Default)]
pub struct DeterministicBackend {
    fixed_scores: Option<ScoreVector>,
    fail_generate: bool,
    fail_score: bool,
    fail_rewrite: bool,
    rewrites: AtomicU64,
}

impl DeterministicBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `scores` from every scoring call.
    pub fn with_fixed_scores(mut self, scores: ScoreVector) -> Self {
        self.fixed_scores = Some(scores);
        self
    }

    pub fn failing_generation(mut self) -> Self {
        self.fail_generate = true;
        self
    }

    pub fn failing_scoring(mut self) -> Self {
        self.fail_score = true;
        self
    }

    pub fn failing_rewrite(mut self) -> Self {
        self.fail_rewrite = true;
        self
    }

    /// Number of rewrite calls served so far.
    pub fn rewrite_calls(&self) -> u64 {
        self.rewrites.load(Ordering::Relaxed)
    }
}

/// FNV-1a over the parts, with a separator byte between them.
fn fnv1a(parts: &[&[u8]]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for part in parts {
        for &byte in part.iter().chain(std::iter::once(&0xff)) {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
    }
    hash
}

fn path_bytes(path: &Path) -> &[u8] {
    path.as_os_str().as_encoded_bytes()
}

impl ModelBackend for DeterministicBackend {
    fn name(&self) -> &'static str {
        "deterministic"
    }

    fn generate(
        &self,
        image: &Path,
        definition: &str,
        instruction: &str,
    ) -> Result<String, BackendError> {
        if self.fail_generate {
            return Err(BackendError::Unavailable("generation disabled".to_string()));
        }
        let hash = fnv1a(&[path_bytes(image), definition.as_bytes(), instruction.as_bytes()]);
        Ok(format!("offline reply {hash:016x}"))
    }

    fn score(
        &self,
        image: &Path,
        text: &str,
        _definition: &str,
    ) -> Result<ScoreVector, BackendError> {
        if self.fail_score {
            return Err(BackendError::Unavailable("scoring disabled".to_string()));
        }
        if let Some(scores) = self.fixed_scores {
            return Ok(scores);
        }

        let hash = fnv1a(&[path_bytes(image), text.as_bytes()]);
        let component = |shift: u32| ((hash >> shift) % 101) as f64;
        Ok(ScoreVector {
            hate: component(0),
            fluency: component(12),
            relevance: component(24),
            style: component(36),
            preachiness: component(48),
        })
    }

    fn rewrite(&self, source: &str, instruction: &str) -> Result<String, BackendError> {
        if self.fail_rewrite {
            return Err(BackendError::Unavailable("rewrite disabled".to_string()));
        }
        let call = self.rewrites.fetch_add(1, Ordering::Relaxed).to_le_bytes();
        let hash = fnv1a(&[source.as_bytes(), instruction.as_bytes(), call.as_slice()]);
        Ok(format!("{} [v{:06x}]", source.trim(), hash & 0xff_ffff))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_and_score_are_stable() {
        let backend = DeterministicBackend::new();
        let image = Path::new("images/a.jpg");

        let a = backend.generate(image, "def", "be witty").unwrap();
        let b = backend.generate(image, "def", "be witty").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, backend.generate(image, "def", "be dry").unwrap());

        let s1 = backend.score(image, &a, "def").unwrap();
        let s2 = backend.score(image, &a, "def").unwrap();
        assert_eq!(s1, s2);
        assert_eq!(s1, s1.clamped());
    }

    #[test]
    fn test_rewrites_are_distinct() {
        let backend = DeterministicBackend::new();
        let a = backend.rewrite("Be brief.", "shorten").unwrap();
        let b = backend.rewrite("Be brief.", "shorten").unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("Be brief. [v"));
        assert_eq!(backend.rewrite_calls(), 2);
    }

    #[test]
    fn test_failure_switches() {
        let backend = DeterministicBackend::new()
            .failing_generation()
            .failing_scoring()
            .failing_rewrite();
        let image = Path::new("a.jpg");
        assert!(backend.generate(image, "d", "i").is_err());
        assert!(backend.score(image, "t", "d").is_err());
        assert!(backend.rewrite("s", "i").is_err());
    }

    #[test]
    fn test_fixed_scores() {
        let backend = DeterministicBackend::new().with_fixed_scores(ScoreVector::WORST);
        let scores = backend.score(Path::new("a.jpg"), "anything", "d").unwrap();
        assert_eq!(scores, ScoreVector::WORST);
    }
}
