//! Median frequencies and the drug-versus-placebo comparison.

use serde::{Deserialize, Serialize};

/// Median of a sequence of percentages; `None` when empty.
///
/// Even-length sequences average the two middle elements.
#[must_use]
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Which arm a side effect is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribution {
    /// Drug median strictly exceeds placebo median.
    Drug,
    /// Placebo median is equal or higher; the effect is treated as noise.
    Placebo,
}

/// Compares drug and placebo medians. Ties go to the placebo.
#[must_use]
pub fn attribute(drug_median: f64, placebo_median: f64) -> Attribution {
    if drug_median > placebo_median {
        Attribution::Drug
    } else {
        Attribution::Placebo
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_odd_length() {
        assert_eq!(median(&[1.0, 2.0, 3.0]), Some(2.0));
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
    }

    #[test]
    fn test_even_length() {
        assert_eq!(median(&[1.0, 2.0, 3.0, 4.0]), Some(2.5));
        assert_eq!(median(&[4.0, 1.0]), Some(2.5));
    }

    #[test]
    fn test_single_and_empty() {
        assert_eq!(median(&[7.5]), Some(7.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_placebo_wins_ties() {
        assert_eq!(attribute(8.0, 5.0), Attribution::Drug);
        assert_eq!(attribute(5.0, 8.0), Attribution::Placebo);
        assert_eq!(attribute(5.0, 5.0), Attribution::Placebo);
    }
}
