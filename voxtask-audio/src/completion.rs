//! Utterance-completeness heuristic.
//!
//! Estimates from the partial transcript alone how likely the speaker has
//! finished their thought, so the session controller can shorten or stretch
//! the natural-pause wait. Deliberately a cheap lexical measure — length,
//! terminal punctuation, closing phrases, a clause-shape regex — not
//! language understanding. The weights are a starting calibration.

use once_cell::sync::Lazy;
use regex::Regex;

const LENGTH_BONUS: f32 = 0.3;
const LONG_LENGTH_BONUS: f32 = 0.2;
const PUNCTUATION_BONUS: f32 = 0.4;
const CLOSING_PHRASE_BONUS: f32 = 0.3;
const CLAUSE_SHAPE_BONUS: f32 = 0.2;

/// Blend weights between the lexical score and engine confidence.
const SCORE_WEIGHT: f32 = 0.7;
const ENGINE_WEIGHT: f32 = 0.3;

static CLOSING_PHRASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(that's (it|all)|i'm done|done|thanks|thank you|okay|ok|got it)\W*$")
        .expect("closing phrase pattern")
});

static CLAUSE_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(i|you|he|she|it|we|they|this|that|there)\s+(am|is|are|was|were|will|would|can|could|should|have|has|had|need|needs|want|wants)\b",
    )
    .expect("clause shape pattern")
});

/// Score a partial transcript for completeness, in [0, 1].
pub fn completion_score(text: &str) -> f32 {
    let text = text.trim();
    if text.is_empty() {
        return 0.0;
    }

    let mut score = 0.0;

    let words = text.split_whitespace().count();
    if words >= 5 {
        score += LENGTH_BONUS;
    }
    if words >= 10 {
        score += LONG_LENGTH_BONUS;
    }

    if text.ends_with(['.', '!', '?']) {
        score += PUNCTUATION_BONUS;
    }
    if CLOSING_PHRASE.is_match(text) {
        score += CLOSING_PHRASE_BONUS;
    }
    if CLAUSE_SHAPE.is_match(last_sentence(text)) {
        score += CLAUSE_SHAPE_BONUS;
    }

    score.min(1.0)
}

/// Blend the lexical score with the engine's reported confidence, in [0, 1].
pub fn completion_confidence(text: &str, transcription_confidence: f32) -> f32 {
    let blended = SCORE_WEIGHT * completion_score(text)
        + ENGINE_WEIGHT * transcription_confidence.clamp(0.0, 1.0);
    blended.clamp(0.0, 1.0)
}

/// Last non-empty sentence fragment, for the clause-shape check.
fn last_sentence(text: &str) -> &str {
    text.rsplit(['.', '!', '?'])
        .find(|fragment| !fragment.trim().is_empty())
        .unwrap_or(text)
}
