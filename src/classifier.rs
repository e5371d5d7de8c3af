//! Mood classification: the keyword lexicon and emotion-model output parsing.

use crate::types::ClassificationResponse;
use serde::Deserialize;
use tracing::trace;

/// Minimum rules score for a label. A single lexicon hit scores 0.5.
pub const RULES_MIN_SCORE: f64 = 0.4;

/// Minimum model confidence for a label
pub const ML_MIN_SCORE: f64 = 0.5;

/// Emotion categories in declaration order; ties go to the earlier one
pub const RULES_LEXICON: &[(&str, &[&str])] = &[
    ("sadness", &["sad", "cry", "tears", "lonely", "heartbreak"]),
    ("anger", &["rage", "angry", "furious", "revenge", "hate"]),
    ("fear", &["scared", "fear", "haunted", "nightmare", "horror"]),
];

/// Score text against the lexicon.
///
/// Each lexicon word found as a substring of the lowercased text is one hit
/// for its category. The best category wins, earlier categories win ties, and
/// zero hits yields no label. The reported score is `hits / (hits + 1)`.
pub fn classify_rules(text: &str, min_score: f64) -> ClassificationResponse {
    let lower = text.to_lowercase();

    let mut best: Option<(&str, usize)> = None;
    for (emotion, words) in RULES_LEXICON {
        let hits = words.iter().filter(|w| lower.contains(*w)).count();
        trace!("Rules score {}={}", emotion, hits);
        match best {
            Some((_, top)) if hits <= top => {}
            _ => best = Some((*emotion, hits)),
        }
    }

    match best {
        Some((emotion, hits)) if hits > 0 => {
            let score = hits as f64 / (hits as f64 + 1.0);
            if score >= min_score {
                ClassificationResponse::label(emotion, score)
            } else {
                ClassificationResponse::empty()
            }
        }
        _ => ClassificationResponse::empty(),
    }
}

#[derive(Debug, Deserialize)]
struct ModelLabel {
    label: String,
    score: f64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ModelOutput {
    Batched(Vec<Vec<ModelLabel>>),
    Flat(Vec<ModelLabel>),
}

/// Pick the best label from emotion-model output.
///
/// Accepts `[[{label, score}, ...]]` or `[{label, score}, ...]`; anything
/// else, an empty list, or a best score under `min_score` is no result.
pub fn parse_model_output(data: &serde_json::Value, min_score: f64) -> ClassificationResponse {
    let labels = match ModelOutput::deserialize(data) {
        Ok(ModelOutput::Batched(mut batches)) if !batches.is_empty() => batches.swap_remove(0),
        Ok(ModelOutput::Flat(labels)) => labels,
        _ => return ClassificationResponse::empty(),
    };

    let best = labels
        .into_iter()
        .filter(|l| l.score.is_finite())
        .fold(None::<ModelLabel>, |acc, cur| match acc {
            Some(top) if top.score >= cur.score => Some(top),
            _ => Some(cur),
        });

    match best {
        Some(top) if top.score >= min_score => {
            ClassificationResponse::label(&top.label.to_lowercase(), top.score)
        }
        _ => ClassificationResponse::empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sad_and_cry_is_sadness() {
        let result = classify_rules("I sad, I cry", RULES_MIN_SCORE);
        assert_eq!(result.emotion.as_deref(), Some("sadness"));
    }

    #[test]
    fn test_no_lexicon_words_is_none() {
        let result = classify_rules("sunny beach party anthem", RULES_MIN_SCORE);
        assert_eq!(result.emotion, None);
        assert_eq!(result.score, None);
    }

    #[test]
    fn test_ties_follow_declaration_order() {
        // one sadness hit, one anger hit
        let result = classify_rules("tears of rage", RULES_MIN_SCORE);
        assert_eq!(result.emotion.as_deref(), Some("sadness"));

        // one anger hit, one fear hit
        let result = classify_rules("angry nightmare", RULES_MIN_SCORE);
        assert_eq!(result.emotion.as_deref(), Some("anger"));
    }

    #[test]
    fn test_highest_count_wins() {
        let result = classify_rules("haunted horror nightmare, a little sad", RULES_MIN_SCORE);
        assert_eq!(result.emotion.as_deref(), Some("fear"));
        assert_eq!(result.score, Some(0.75));
    }

    #[test]
    fn test_case_insensitive_substrings() {
        let result = classify_rules("HEARTBREAK Anthem", RULES_MIN_SCORE);
        assert_eq!(result.emotion.as_deref(), Some("sadness"));
    }

    #[test]
    fn test_rules_threshold_applies() {
        let result = classify_rules("sad", 0.6);
        assert_eq!(result.emotion, None);
        let result = classify_rules("sad tears", 0.6);
        assert_eq!(result.emotion.as_deref(), Some("sadness"));
    }

    #[test]
    fn test_model_output_batched() {
        let data = json!([[
            {"label": "joy", "score": 0.1},
            {"label": "Sadness", "score": 0.8},
            {"label": "anger", "score": 0.1}
        ]]);
        let result = parse_model_output(&data, ML_MIN_SCORE);
        assert_eq!(result.emotion.as_deref(), Some("sadness"));
        assert_eq!(result.score, Some(0.8));
    }

    #[test]
    fn test_model_output_flat_below_threshold() {
        let data = json!([
            {"label": "fear", "score": 0.45},
            {"label": "joy", "score": 0.3}
        ]);
        assert_eq!(parse_model_output(&data, ML_MIN_SCORE).emotion, None);
        assert_eq!(
            parse_model_output(&data, RULES_MIN_SCORE).emotion.as_deref(),
            Some("fear")
        );
    }

    #[test]
    fn test_model_output_malformed() {
        assert_eq!(parse_model_output(&json!({"error": "loading"}), ML_MIN_SCORE).emotion, None);
        assert_eq!(parse_model_output(&json!([]), ML_MIN_SCORE).emotion, None);
        assert_eq!(parse_model_output(&json!(null), ML_MIN_SCORE).emotion, None);
    }
}
