//! Frequency record classification.
//!
//! Raw SIDER frequency text is one of: an exact percentage (`5%`), a range
//! (`1-5%`, `1 to 5%`, `<1%`), or a qualitative description (`common`,
//! `postmarketing`, ...). Classification never fails: anything that is not a
//! number or a range is kept as a normalized label.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::frequency::normalize_label;

// `a-b`, `atob`, or `<b` once whitespace and `%` are gone.
const RANGE_PATTERN: &str = r"^(?:<(?P<upper>\d+(?:\.\d+)?|\.\d+)|(?P<low>\d+(?:\.\d+)?|\.\d+)(?:-|to)(?P<high>\d+(?:\.\d+)?|\.\d+))$";

static RANGE_REGEX: OnceLock<Regex> = OnceLock::new();

fn range_regex() -> &'static Regex {
    RANGE_REGEX.get_or_init(|| Regex::new(RANGE_PATTERN).expect("RANGE_PATTERN is a valid regex"))
}

/// Classified frequency text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FrequencyValue {
    /// Exact percentage.
    Exact {
        /// Percentage.
        percent: f64,
    },
    /// Percentage range; both bounds are kept.
    Range {
        /// Lower bound.
        low: f64,
        /// Upper bound.
        high: f64,
    },
    /// Normalized qualitative label (possibly unrecognized).
    Label {
        /// Label text after [`normalize_label`].
        label: String,
    },
}

/// The five per-pair buckets a classified record can land in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    /// Drug-arm exact percentages.
    ExactFreq,
    /// Drug-arm range bounds.
    RangeFreq,
    /// Qualitative labels.
    LabelFreq,
    /// Placebo-arm exact percentages.
    PlaceboExactFreq,
    /// Placebo-arm range bounds.
    PlaceboRangeFreq,
}

impl Bucket {
    /// Routes a classified value. Placebo labels have no bucket.
    #[must_use]
    pub fn route(value: &FrequencyValue, placebo: bool) -> Option<Self> {
        match (value, placebo) {
            (FrequencyValue::Exact { .. }, false) => Some(Self::ExactFreq),
            (FrequencyValue::Range { .. }, false) => Some(Self::RangeFreq),
            (FrequencyValue::Label { .. }, false) => Some(Self::LabelFreq),
            (FrequencyValue::Exact { .. }, true) => Some(Self::PlaceboExactFreq),
            (FrequencyValue::Range { .. }, true) => Some(Self::PlaceboRangeFreq),
            (FrequencyValue::Label { .. }, true) => None,
        }
    }
}

/// What to do with labels outside the known vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelPolicy {
    /// Keep them; they fingerprint as postmarketing (`-1`).
    #[default]
    Lenient,
    /// Reject them during aggregation.
    Strict,
}

impl LabelPolicy {
    /// Returns `true` for [`LabelPolicy::Strict`].
    #[must_use]
    pub const fn is_strict(self) -> bool {
        matches!(self, Self::Strict)
    }
}

/// Classifies one frequency description.
#[must_use]
pub fn classify_frequency(text: &str) -> FrequencyValue {
    let compact: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '%')
        .flat_map(char::to_lowercase)
        .collect();

    if let Some(percent) = parse_percentage(&compact) {
        return FrequencyValue::Exact { percent };
    }

    if let Some(caps) = range_regex().captures(&compact) {
        if let Some(upper) = caps.name("upper").and_then(|m| parse_percentage(m.as_str())) {
            return FrequencyValue::Range { low: 0.0, high: upper };
        }
        let low = caps.name("low").and_then(|m| parse_percentage(m.as_str()));
        let high = caps.name("high").and_then(|m| parse_percentage(m.as_str()));
        if let (Some(low), Some(high)) = (low, high) {
            return FrequencyValue::Range { low, high };
        }
    }

    FrequencyValue::Label {
        label: normalize_label(&compact),
    }
}

fn parse_percentage(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|p| p.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exact(percent: f64) -> FrequencyValue {
        FrequencyValue::Exact { percent }
    }

    fn range(low: f64, high: f64) -> FrequencyValue {
        FrequencyValue::Range { low, high }
    }

    fn label(label: &str) -> FrequencyValue {
        FrequencyValue::Label {
            label: label.to_string(),
        }
    }

    #[test]
    fn test_exact_percentages() {
        assert_eq!(classify_frequency("5%"), exact(5.0));
        assert_eq!(classify_frequency(" 0.5 % "), exact(0.5));
        assert_eq!(classify_frequency("12"), exact(12.0));
    }

    #[test]
    fn test_ranges() {
        assert_eq!(classify_frequency("1-5%"), range(1.0, 5.0));
        assert_eq!(classify_frequency("1 to 5%"), range(1.0, 5.0));
        assert_eq!(classify_frequency("0.1 - 1 %"), range(0.1, 1.0));
        assert_eq!(classify_frequency("<1%"), range(0.0, 1.0));
    }

    #[test]
    fn test_labels_are_normalized() {
        assert_eq!(classify_frequency("common"), label("frequent"));
        assert_eq!(classify_frequency("very common"), label("veryfrequent"));
        assert_eq!(classify_frequency("Uncommon"), label("infrequent"));
        assert_eq!(classify_frequency("postmarketing"), label("postmarketing"));
    }

    #[test]
    fn test_malformed_text_falls_through_to_label() {
        assert_eq!(classify_frequency("1-abc"), label("1-abc"));
        assert_eq!(classify_frequency("nan"), label("nan"));
        assert_eq!(classify_frequency("1-2-3"), label("1-2-3"));
        assert_eq!(classify_frequency(""), label(""));
    }

    #[test]
    fn test_routing_by_placebo_flag() {
        assert_eq!(Bucket::route(&exact(1.0), false), Some(Bucket::ExactFreq));
        assert_eq!(Bucket::route(&range(1.0, 2.0), false), Some(Bucket::RangeFreq));
        assert_eq!(Bucket::route(&label("rare"), false), Some(Bucket::LabelFreq));
        assert_eq!(Bucket::route(&exact(1.0), true), Some(Bucket::PlaceboExactFreq));
        assert_eq!(Bucket::route(&range(1.0, 2.0), true), Some(Bucket::PlaceboRangeFreq));
        assert_eq!(Bucket::route(&label("rare"), true), None);
    }

    #[test]
    fn test_default_policy_is_lenient() {
        assert_eq!(LabelPolicy::default(), LabelPolicy::Lenient);
        assert!(LabelPolicy::Strict.is_strict());
        let policy: LabelPolicy = serde_json::from_str("\"strict\"").unwrap();
        assert_eq!(policy, LabelPolicy::Strict);
    }
}
