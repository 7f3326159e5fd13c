//! Weighted (Bayesian) rating
//!
//! `score = v/(v+m)·R + m/(v+m)·C` where `v` is the visitor review count,
//! `R` the place rating, `m` the minimum review count treated as trustworthy
//! and `C` the mean rating over every scored place.

use serde::{Deserialize, Serialize};

/// Rating inputs of one persisted place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreInput {
    pub original_name: String,
    pub rating: f64,
    pub visitor_reviews: f64,
}

/// Computed score for one place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedScore {
    pub original_name: String,
    pub weighted_score: f64,
}

/// Mean rating, non-finite values counted as 0
pub fn mean_rating(inputs: &[ScoreInput]) -> f64 {
    if inputs.is_empty() {
        return 0.0;
    }
    let sum: f64 = inputs.iter().map(|i| sanitize(i.rating)).sum();
    sum / inputs.len() as f64
}

pub fn weighted_score(rating: f64, visitor_reviews: f64, min_reviews: f64, mean: f64) -> f64 {
    let v = sanitize(visitor_reviews);
    let r = sanitize(rating);
    let total = v + min_reviews;
    if total <= 0.0 {
        return mean;
    }
    (v / total) * r + (min_reviews / total) * mean
}

/// Score every input against the population mean
pub fn score_all(inputs: &[ScoreInput], min_reviews: f64) -> Vec<WeightedScore> {
    let mean = mean_rating(inputs);
    inputs
        .iter()
        .map(|input| WeightedScore {
            original_name: input.original_name.clone(),
            weighted_score: weighted_score(input.rating, input.visitor_reviews, min_reviews, mean),
        })
        .collect()
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str, rating: f64, reviews: f64) -> ScoreInput {
        ScoreInput {
            original_name: name.to_string(),
            rating,
            visitor_reviews: reviews,
        }
    }

    #[test]
    fn test_mean_rating() {
        let inputs = vec![input("a", 4.0, 10.0), input("b", 5.0, 10.0), input("c", f64::NAN, 0.0)];
        assert!((mean_rating(&inputs) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_many_reviews_pull_towards_own_rating() {
        let score = weighted_score(4.8, 10_000.0, 200.0, 4.0);
        assert!(score > 4.7 && score < 4.8);
    }

    #[test]
    fn test_no_reviews_yields_mean() {
        assert!((weighted_score(5.0, 0.0, 200.0, 4.2) - 4.2).abs() < 1e-9);
    }

    #[test]
    fn test_zero_min_reviews_and_no_reviews_yields_mean() {
        assert!((weighted_score(5.0, 0.0, 0.0, 3.5) - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_score_all_equal_weights() {
        let scores = score_all(&[input("a", 4.0, 200.0), input("b", 2.0, 200.0)], 200.0);
        // mean 3.0, each place half own rating, half mean
        assert!((scores[0].weighted_score - 3.5).abs() < 1e-9);
        assert!((scores[1].weighted_score - 2.5).abs() < 1e-9);
    }
}
