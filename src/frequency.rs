//! Frequency labels and the 6-point fingerprint scale.
//!
//! Percentages are bucketed following the WHO frequency convention:
//!
//! | label          | percentage            | code |
//! |----------------|-----------------------|------|
//! | `veryfrequent` | `p >= 10`             | 5    |
//! | `frequent`     | `1 <= p < 10`         | 4    |
//! | `infrequent`   | `0.1 <= p < 1`        | 3    |
//! | `rare`         | `0.01 <= p < 0.1`     | 2    |
//! | `veryrare`     | `p < 0.01`            | 1    |
//! | anything else  | postmarketing/unknown | -1   |
//!
//! Each lower bound is inclusive and belongs to the higher bucket.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Marker SIDER uses for effects reported after approval without a rate.
pub const POSTMARKETING_MARKER: &str = "postmarketing";

/// Canonical qualitative frequency label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrequencyLabel {
    /// `< 0.01%`
    VeryRare,
    /// `0.01% ..< 0.1%`
    Rare,
    /// `0.1% ..< 1%`
    Infrequent,
    /// `1% ..< 10%`
    Frequent,
    /// `>= 10%`
    VeryFrequent,
}

impl FrequencyLabel {
    /// Buckets a percentage. Returns `None` for NaN.
    #[must_use]
    pub fn from_percentage(percent: f64) -> Option<Self> {
        if percent.is_nan() {
            None
        } else if percent >= 10.0 {
            Some(Self::VeryFrequent)
        } else if percent >= 1.0 {
            Some(Self::Frequent)
        } else if percent >= 0.1 {
            Some(Self::Infrequent)
        } else if percent >= 0.01 {
            Some(Self::Rare)
        } else {
            Some(Self::VeryRare)
        }
    }

    /// Parses an already-normalized label (see [`normalize_label`]).
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "veryfrequent" => Some(Self::VeryFrequent),
            "frequent" => Some(Self::Frequent),
            "infrequent" => Some(Self::Infrequent),
            "rare" => Some(Self::Rare),
            "veryrare" => Some(Self::VeryRare),
            _ => None,
        }
    }

    /// Canonical text form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::VeryFrequent => "veryfrequent",
            Self::Frequent => "frequent",
            Self::Infrequent => "infrequent",
            Self::Rare => "rare",
            Self::VeryRare => "veryrare",
        }
    }
}

impl fmt::Display for FrequencyLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonicalizes qualitative frequency text.
///
/// Lower-cases, drops whitespace and `%`, then folds the synonyms
/// `common`, `uncommon` and `verycommon` onto the WHO labels. Everything else
/// passes through, so the function is idempotent.
#[must_use]
pub fn normalize_label(raw: &str) -> String {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '%')
        .flat_map(char::to_lowercase)
        .collect();

    match compact.as_str() {
        "common" => FrequencyLabel::Frequent.as_str().to_string(),
        "uncommon" => FrequencyLabel::Infrequent.as_str().to_string(),
        "verycommon" => FrequencyLabel::VeryFrequent.as_str().to_string(),
        _ => compact,
    }
}

/// Returns true if a normalized label maps to a known scale point, including
/// the postmarketing marker.
#[must_use]
pub fn is_recognized_label(label: &str) -> bool {
    label == POSTMARKETING_MARKER || FrequencyLabel::parse(label).is_some()
}

/// Reconciled frequency of one drug–side-effect pair on the 6-point scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum Fingerprint {
    /// Postmarketing report or unrecognized label (`-1`).
    Postmarketing,
    /// `1`
    VeryRare,
    /// `2`
    Rare,
    /// `3`
    Infrequent,
    /// `4`
    Frequent,
    /// `5`
    VeryFrequent,
}

impl Fingerprint {
    /// Fingerprint of a percentage, via its WHO label.
    #[must_use]
    pub fn from_percentage(percent: f64) -> Self {
        FrequencyLabel::from_percentage(percent).map_or(Self::Postmarketing, Self::from)
    }

    /// Fingerprint of a normalized label; unrecognized text maps to
    /// [`Fingerprint::Postmarketing`].
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        FrequencyLabel::parse(label).map_or(Self::Postmarketing, Self::from)
    }

    /// Integer code on the scale.
    #[must_use]
    pub const fn code(self) -> i8 {
        match self {
            Self::Postmarketing => -1,
            Self::VeryRare => 1,
            Self::Rare => 2,
            Self::Infrequent => 3,
            Self::Frequent => 4,
            Self::VeryFrequent => 5,
        }
    }

    /// Code as a float, for averaging.
    #[must_use]
    pub fn value(self) -> f64 {
        f64::from(self.code())
    }

    /// False for the postmarketing/unknown sentinel.
    #[must_use]
    pub const fn is_quantified(self) -> bool {
        !matches!(self, Self::Postmarketing)
    }
}

impl From<FrequencyLabel> for Fingerprint {
    fn from(label: FrequencyLabel) -> Self {
        match label {
            FrequencyLabel::VeryFrequent => Self::VeryFrequent,
            FrequencyLabel::Frequent => Self::Frequent,
            FrequencyLabel::Infrequent => Self::Infrequent,
            FrequencyLabel::Rare => Self::Rare,
            FrequencyLabel::VeryRare => Self::VeryRare,
        }
    }
}

impl From<Fingerprint> for i8 {
    fn from(fingerprint: Fingerprint) -> Self {
        fingerprint.code()
    }
}

impl TryFrom<i8> for Fingerprint {
    type Error = String;

    fn try_from(code: i8) -> Result<Self, Self::Error> {
        match code {
            -1 => Ok(Self::Postmarketing),
            1 => Ok(Self::VeryRare),
            2 => Ok(Self::Rare),
            3 => Ok(Self::Infrequent),
            4 => Ok(Self::Frequent),
            5 => Ok(Self::VeryFrequent),
            other => Err(format!("invalid fingerprint code {other}")),
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(p: f64) -> FrequencyLabel {
        FrequencyLabel::from_percentage(p).unwrap()
    }

    #[test]
    fn test_percentage_tier_boundaries() {
        assert_eq!(label(10.0), FrequencyLabel::VeryFrequent);
        assert_eq!(label(9.99), FrequencyLabel::Frequent);
        assert_eq!(label(1.0), FrequencyLabel::Frequent);
        assert_eq!(label(0.99), FrequencyLabel::Infrequent);
        assert_eq!(label(0.1), FrequencyLabel::Infrequent);
        assert_eq!(label(0.099), FrequencyLabel::Rare);
        assert_eq!(label(0.01), FrequencyLabel::Rare);
        assert_eq!(label(0.001), FrequencyLabel::VeryRare);
    }

    #[test]
    fn test_nan_has_no_label() {
        assert_eq!(FrequencyLabel::from_percentage(f64::NAN), None);
        assert_eq!(Fingerprint::from_percentage(f64::NAN), Fingerprint::Postmarketing);
    }

    #[test]
    fn test_label_round_trips_through_fingerprint() {
        for l in [
            FrequencyLabel::VeryRare,
            FrequencyLabel::Rare,
            FrequencyLabel::Infrequent,
            FrequencyLabel::Frequent,
            FrequencyLabel::VeryFrequent,
        ] {
            assert_eq!(FrequencyLabel::parse(l.as_str()), Some(l));
            assert_eq!(Fingerprint::from_label(l.as_str()), Fingerprint::from(l));
        }
    }

    #[test]
    fn test_codes_are_monotonic_with_percentages() {
        let codes: Vec<i8> = [0.001, 0.05, 0.5, 5.0, 50.0]
            .iter()
            .map(|p| Fingerprint::from_percentage(*p).code())
            .collect();
        assert_eq!(codes, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_synonyms_are_folded() {
        assert_eq!(normalize_label("common"), "frequent");
        assert_eq!(normalize_label("uncommon"), "infrequent");
        assert_eq!(normalize_label("very common"), "veryfrequent");
        assert_eq!(normalize_label("Rare"), "rare");
        assert_eq!(normalize_label("postmarketing"), "postmarketing");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        for raw in ["common", "Very Common", "uncommon", "rare", "post marketing", "10 %", "weird text"] {
            let once = normalize_label(raw);
            assert_eq!(normalize_label(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn test_unknown_labels_are_postmarketing() {
        assert_eq!(Fingerprint::from_label("postmarketing"), Fingerprint::Postmarketing);
        assert_eq!(Fingerprint::from_label("sometimes"), Fingerprint::Postmarketing);
        assert_eq!(Fingerprint::from_label(""), Fingerprint::Postmarketing);
        assert!(is_recognized_label("postmarketing"));
        assert!(!is_recognized_label("sometimes"));
    }

    #[test]
    fn test_fingerprint_serializes_as_code() {
        assert_eq!(serde_json::to_string(&Fingerprint::Frequent).unwrap(), "4");
        assert_eq!(serde_json::to_string(&Fingerprint::Postmarketing).unwrap(), "-1");
        let back: Fingerprint = serde_json::from_str("2").unwrap();
        assert_eq!(back, Fingerprint::Rare);
        assert!(serde_json::from_str::<Fingerprint>("0").is_err());
    }

    #[test]
    fn test_ordering_follows_codes() {
        assert!(Fingerprint::Postmarketing < Fingerprint::VeryRare);
        assert!(Fingerprint::Frequent < Fingerprint::VeryFrequent);
    }
}
