//! Per-pair aggregation of raw frequency records.
//!
//! Records are grouped by [`PairKey`] and each one is classified into one of
//! five buckets. Bucket order reflects source record order. A pair is only
//! created once a record actually lands in a bucket, so every pair in a
//! [`PairTable`] belongs to at least one evidence category.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::classify::{classify_frequency, Bucket, FrequencyValue, LabelPolicy};
use crate::error::ValidationError;
use crate::frequency::is_recognized_label;
use crate::ids::{DrugId, PairKey, TermType};
use crate::median::median;

/// One row of the frequency dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFrequencyRecord {
    /// Stereo compound ID.
    pub drug: DrugId,
    /// Side-effect term as found in the dump.
    pub side_effect: String,
    /// Whether the frequency was observed in the placebo arm.
    pub placebo: bool,
    /// Free-text frequency description.
    pub frequency: String,
    /// MedDRA term type column (`PT`, `LLT`, ...).
    pub term_type: String,
}

impl RawFrequencyRecord {
    /// Creates a preferred-term record.
    pub fn new(
        drug: DrugId,
        side_effect: impl Into<String>,
        placebo: bool,
        frequency: impl Into<String>,
    ) -> Self {
        Self {
            drug,
            side_effect: side_effect.into(),
            placebo,
            frequency: frequency.into(),
            term_type: TermType::PreferredTerm.as_str().to_string(),
        }
    }

    /// Overrides the term type column.
    #[must_use]
    pub fn with_term_type(mut self, term_type: impl Into<String>) -> Self {
        self.term_type = term_type.into();
        self
    }

    /// Pair key of this record.
    #[must_use]
    pub fn pair_key(&self) -> PairKey {
        PairKey::new(self.drug, &self.side_effect)
    }
}

/// Classified values of one pair, split by bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBuckets {
    /// Drug-arm exact percentages.
    pub exact_freq: Vec<f64>,
    /// Drug-arm range bounds (both ends of every range).
    pub range_freq: Vec<f64>,
    /// Normalized qualitative labels.
    pub label_freq: Vec<String>,
    /// Placebo-arm exact percentages.
    pub placebo_exact_freq: Vec<f64>,
    /// Placebo-arm range bounds.
    pub placebo_range_freq: Vec<f64>,
}

impl FrequencyBuckets {
    /// Places a classified value. Returns the bucket used, or `None` for a
    /// placebo label, which has nowhere to go.
    pub fn push(&mut self, value: FrequencyValue, placebo: bool) -> Option<Bucket> {
        let bucket = Bucket::route(&value, placebo)?;
        match value {
            FrequencyValue::Exact { percent } => {
                if placebo {
                    self.placebo_exact_freq.push(percent);
                } else {
                    self.exact_freq.push(percent);
                }
            }
            FrequencyValue::Range { low, high } => {
                let target = if placebo {
                    &mut self.placebo_range_freq
                } else {
                    &mut self.range_freq
                };
                target.push(low);
                target.push(high);
            }
            FrequencyValue::Label { label } => self.label_freq.push(label),
        }
        Some(bucket)
    }

    /// Evidence categories present in this pair.
    #[must_use]
    pub fn membership(&self) -> Membership {
        Membership {
            a: !self.exact_freq.is_empty() || !self.range_freq.is_empty(),
            b: !self.label_freq.is_empty(),
            c: !self.placebo_exact_freq.is_empty() || !self.placebo_range_freq.is_empty(),
        }
    }

    /// Drug-arm percentages: exact values followed by range bounds.
    #[must_use]
    pub fn drug_percentages(&self) -> Vec<f64> {
        self.exact_freq.iter().chain(&self.range_freq).copied().collect()
    }

    /// Placebo-arm percentages: exact values followed by range bounds.
    #[must_use]
    pub fn placebo_percentages(&self) -> Vec<f64> {
        self.placebo_exact_freq
            .iter()
            .chain(&self.placebo_range_freq)
            .copied()
            .collect()
    }

    /// Median of the drug arm (category A).
    #[must_use]
    pub fn drug_median(&self) -> Option<f64> {
        median(&self.drug_percentages())
    }

    /// Median of the placebo arm (category C).
    #[must_use]
    pub fn placebo_median(&self) -> Option<f64> {
        median(&self.placebo_percentages())
    }

    /// True if no bucket holds a value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.membership().subset().is_none()
    }
}

/// Membership in the three evidence categories.
///
/// - A: exact or range drug frequency
/// - B: qualitative label
/// - C: placebo frequency (exact or range)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Membership {
    /// Category A.
    pub a: bool,
    /// Category B.
    pub b: bool,
    /// Category C.
    pub c: bool,
}

impl Membership {
    /// The non-empty subset this membership describes.
    #[must_use]
    pub const fn subset(self) -> Option<EvidenceSubset> {
        match (self.a, self.b, self.c) {
            (true, false, false) => Some(EvidenceSubset::OnlyA),
            (false, true, false) => Some(EvidenceSubset::OnlyB),
            (false, false, true) => Some(EvidenceSubset::OnlyC),
            (true, true, false) => Some(EvidenceSubset::AAndB),
            (true, false, true) => Some(EvidenceSubset::AAndC),
            (false, true, true) => Some(EvidenceSubset::BAndC),
            (true, true, true) => Some(EvidenceSubset::AAndBAndC),
            (false, false, false) => None,
        }
    }
}

/// The seven non-empty subsets of {A, B, C}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceSubset {
    /// A only.
    OnlyA,
    /// B only.
    OnlyB,
    /// C only.
    OnlyC,
    /// A and B, no C.
    AAndB,
    /// A and C, no B.
    AAndC,
    /// B and C, no A.
    BAndC,
    /// All three.
    AAndBAndC,
}

impl EvidenceSubset {
    /// Every subset, in Venn region order.
    pub const ALL: [Self; 7] = [
        Self::OnlyA,
        Self::OnlyB,
        Self::OnlyC,
        Self::AAndB,
        Self::AAndC,
        Self::BAndC,
        Self::AAndBAndC,
    ];

    /// Membership flags of this subset.
    #[must_use]
    pub const fn membership(self) -> Membership {
        let (a, b, c) = match self {
            Self::OnlyA => (true, false, false),
            Self::OnlyB => (false, true, false),
            Self::OnlyC => (false, false, true),
            Self::AAndB => (true, true, false),
            Self::AAndC => (true, false, true),
            Self::BAndC => (false, true, true),
            Self::AAndBAndC => (true, true, true),
        };
        Membership { a, b, c }
    }
}

/// Knobs for [`aggregate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateOptions {
    /// Only records of this MedDRA granularity are kept.
    pub term_type: TermType,
    /// Handling of labels outside the known vocabulary.
    pub label_policy: LabelPolicy,
}

/// Counters collected while aggregating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationStats {
    /// Records offered to the aggregator.
    pub records_seen: usize,
    /// Records of another term type.
    pub skipped_term_type: usize,
    /// Placebo records carrying a qualitative label.
    pub dropped_placebo_labels: usize,
    /// Values placed in a bucket.
    pub bucketed: usize,
}

/// Bucketed records keyed by drug–side-effect pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairTable {
    pairs: BTreeMap<PairKey, FrequencyBuckets>,
    stats: AggregationStats,
}

impl PairTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Buckets of one pair.
    #[must_use]
    pub fn get(&self, key: &PairKey) -> Option<&FrequencyBuckets> {
        self.pairs.get(key)
    }

    /// Iterates pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&PairKey, &FrequencyBuckets)> {
        self.pairs.iter()
    }

    /// Number of pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// True if the table has no pairs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Counters from the aggregation that built this table.
    #[must_use]
    pub const fn stats(&self) -> AggregationStats {
        self.stats
    }
}

impl FromIterator<(PairKey, FrequencyBuckets)> for PairTable {
    fn from_iter<I: IntoIterator<Item = (PairKey, FrequencyBuckets)>>(iter: I) -> Self {
        Self {
            pairs: iter.into_iter().collect(),
            stats: AggregationStats::default(),
        }
    }
}

/// Groups raw records by pair and buckets their frequencies.
///
/// # Errors
/// Only under [`LabelPolicy::Strict`]: returns
/// [`ValidationError::UnrecognizedLabel`] for the first drug-arm label outside
/// the known vocabulary.
pub fn aggregate<I>(records: I, options: &AggregateOptions) -> Result<PairTable, ValidationError>
where
    I: IntoIterator<Item = RawFrequencyRecord>,
{
    let mut table = PairTable::new();
    let mut stats = AggregationStats::default();

    for record in records {
        stats.records_seen += 1;

        if !options.term_type.matches(&record.term_type) {
            stats.skipped_term_type += 1;
            continue;
        }

        let key = record.pair_key();
        let value = classify_frequency(&record.frequency);

        if options.label_policy.is_strict() && !record.placebo {
            if let FrequencyValue::Label { label } = &value {
                if !is_recognized_label(label) {
                    return Err(ValidationError::UnrecognizedLabel {
                        pair: key.to_string(),
                        label: label.clone(),
                    });
                }
            }
        }

        if Bucket::route(&value, record.placebo).is_none() {
            debug!(pair = %key, frequency = %record.frequency, "placebo label has no bucket; dropped");
            stats.dropped_placebo_labels += 1;
            continue;
        }

        table.pairs.entry(key).or_default().push(value, record.placebo);
        stats.bucketed += 1;
    }

    info!(
        records = stats.records_seen,
        pairs = table.len(),
        skipped_term_type = stats.skipped_term_type,
        dropped_placebo_labels = stats.dropped_placebo_labels,
        "aggregated frequency records"
    );

    table.stats = stats;
    Ok(table)
}
