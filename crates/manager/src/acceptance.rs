//! Converts a bag of worker labels into an acceptance score and decision.

use dendron_core::model::TextLabels;

/// `1 − mean(spam) − mean(lang_mismatch)` over a message's label submissions.
/// A submission missing `lang_mismatch` contributes 0 for that term.
pub fn acceptance(labels: &[TextLabels]) -> f64 {
    if labels.is_empty() {
        return 1.0;
    }
    let n = labels.len() as f64;
    let spam_mean: f64 = labels.iter().map(|l| l.labels.get("spam").copied().unwrap_or(0.0)).sum::<f64>() / n;
    let lang_mismatch_mean: f64 = labels
        .iter()
        .map(|l| l.labels.get("lang_mismatch").copied().unwrap_or(0.0))
        .sum::<f64>()
        / n;
    1.0 - spam_mean - lang_mismatch_mean
}

/// Whether a message's labels clear the acceptance bar: score above
/// `threshold` and at least `required_reviews` submissions collected.
pub fn accept(labels: &[TextLabels], threshold: f64, required_reviews: i32) -> bool {
    labels.len() as i32 >= required_reviews && acceptance(labels) > threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn labels(spam: f64, lang_mismatch: f64) -> TextLabels {
        let mut m = HashMap::new();
        m.insert("spam".to_string(), spam);
        m.insert("lang_mismatch".to_string(), lang_mismatch);
        TextLabels {
            id: Uuid::new_v4(),
            message_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            task_id: None,
            labels: m,
        }
    }

    #[test]
    fn perfect_labels_accept() {
        let l = vec![labels(0.0, 0.0), labels(0.0, 0.0), labels(0.0, 0.0)];
        assert_eq!(acceptance(&l), 1.0);
        assert!(accept(&l, 0.5, 3));
    }

    #[test]
    fn acceptance_is_monotone_decreasing_in_spam() {
        let low_spam = vec![labels(0.1, 0.0)];
        let high_spam = vec![labels(0.9, 0.0)];
        assert!(acceptance(&low_spam) > acceptance(&high_spam));
    }

    #[test]
    fn acceptance_is_monotone_decreasing_in_lang_mismatch() {
        let low = vec![labels(0.0, 0.1)];
        let high = vec![labels(0.0, 0.9)];
        assert!(acceptance(&low) > acceptance(&high));
    }

    #[test]
    fn missing_lang_mismatch_defaults_to_zero() {
        let mut m = HashMap::new();
        m.insert("spam".to_string(), 0.2);
        let l = TextLabels {
            id: Uuid::new_v4(),
            message_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            task_id: None,
            labels: m,
        };
        assert_eq!(acceptance(&[l]), 0.8);
    }

    #[test]
    fn requires_review_count_even_if_score_is_high() {
        let l = vec![labels(0.0, 0.0)];
        assert!(!accept(&l, 0.5, 3));
    }

    #[test]
    fn low_grade_rejects() {
        let l = vec![labels(1.0, 0.0), labels(1.0, 0.0), labels(1.0, 0.0)];
        assert!(!accept(&l, 0.5, 3));
    }
}
