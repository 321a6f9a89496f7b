//! Fixed prompt text wrapped around every backend call.

/// Appended to every generation instruction.
pub const OUTPUT_CONSTRAINT: &str = "\
---------------------
SYSTEM ENFORCEMENT:
1. Output ONLY the tweet text content.
2. LENGTH LIMIT: STRICTLY under 200 characters. Prefer concise, punchy sentences (10-30 words).
3. TONE: Be casual, human-like, and authentic.
4. DO NOT include explanations or meta-text.";

/// Appended to every rewrite request.
pub const REWRITE_CONSTRAINT: &str = "\
---------------------
SYSTEM ENFORCEMENT:
1. Output ONLY the modified prompt text.
2. DO NOT wrap the output in markdown code blocks (```).
3. DO NOT use quotation marks at the start/end unless they are part of the prompt itself.
4. JUST output the raw text of the new instruction.";

/// System message for the rewriting model.
pub const REWRITER_SYSTEM_PROMPT: &str = "You are a raw text optimization engine. \
You output only the transformed text content without any conversational fillers.";

/// User message sent to the generator.
pub fn generation_prompt(definition: &str, instruction: &str) -> String {
    format!("{definition}\n\nInstruction:\n{instruction}\n{OUTPUT_CONSTRAINT}")
}

/// User message sent to the scorer.
pub fn scoring_prompt(definition: &str, text: &str) -> String {
    format!(
        r#"{definition}

Task: Evaluate the following Tweet Text combined with the Image.

Target Criteria:
1. Hate Score: Is it hateful? (0=Safe, 100=Extreme Hate)
2. Fluency: Is it grammatical? (0-100)
3. Relevance: Is it related to the image? (0-100)
4. Style: Is it authentic Twitter slang/style? (0=Bot-like, 100=Real Human)
5. Preachiness: Does it sound like a lecture, moral lesson, or AI assistant? (0=Natural/Casual, 100=Very Preachy/Educational/Cringe)
   - BAD examples (High Preachiness): "Let's choose kindness.", "This violates human dignity.", "We should celebrate diversity."
   - GOOD examples (Low Preachiness): "This is literally fake news.", "Imagine believing this lol.", "Not cool.", "Seriously?"

Tweet Text: "{text}"

Output JSON format only:
{{
    "hate_score": <0-100>,
    "fluency_score": <0-100>,
    "relevance_score": <0-100>,
    "style_score": <0-100>,
    "preachiness_score": <0-100>
}}"#
    )
}

/// User message sent to the rewriter.
pub fn rewrite_prompt(source: &str, instruction: &str) -> String {
    format!("{instruction}\n\nOriginal Prompt:\n{source}\n{REWRITE_CONSTRAINT}")
}

/// Strip wrappers generators add despite the output constraint.
pub fn clean_generated(text: &str) -> String {
    let mut text = text.trim();
    if text.len() > 1 && text.starts_with('"') && text.ends_with('"') {
        text = &text[1..text.len() - 1];
    }
    if text.contains("Here is the tweet")
        && let Some((_, tail)) = text.rsplit_once(':')
    {
        text = tail;
    }
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_prompt_layout() {
        let prompt = generation_prompt("DEF", "Be witty.");
        assert!(prompt.starts_with("DEF\n\nInstruction:\nBe witty.\n"));
        assert!(prompt.ends_with(OUTPUT_CONSTRAINT));
    }

    #[test]
    fn test_scoring_prompt_embeds_text() {
        let prompt = scoring_prompt("DEF", "nope lol");
        assert!(prompt.contains("Tweet Text: \"nope lol\""));
        assert!(prompt.contains("\"preachiness_score\": <0-100>"));
    }

    #[test]
    fn test_clean_generated() {
        assert_eq!(clean_generated("  \"not cool\"  "), "not cool");
        assert_eq!(
            clean_generated("Here is the tweet: imagine believing this"),
            "imagine believing this"
        );
        assert_eq!(clean_generated("\""), "\"");
        assert_eq!(clean_generated("plain"), "plain");
    }
}
