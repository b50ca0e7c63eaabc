//! Unification of branch results into the final per-drug profile.
//!
//! 1. The main branches (`A-only`, `B-only`, `A&B`, `A&C`, `B&C`) are merged
//!    into one fingerprint set per pair; postmarketing codes are left out.
//! 2. Pairs whose only evidence is a single postmarketing entry are promoted with
//!    value `-1` when their side effect has a quantified frequency for some
//!    other drug; otherwise they are dropped.
//! 3. Pairs with more than one distinct fingerprint collapse to the mean.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::frequency::Fingerprint;
use crate::ids::{DrugId, PairKey};
use crate::reconcile::{Branch, Reconciliation};

/// Quantified fingerprints per pair across the main branches.
pub type UnifiedPairs = BTreeMap<PairKey, BTreeSet<Fingerprint>>;

/// Merges the main branches, dropping postmarketing codes.
#[must_use]
pub fn unify(reconciliation: &Reconciliation) -> UnifiedPairs {
    let mut unified = UnifiedPairs::new();
    for branch in Branch::UNIFIED {
        for (key, values) in reconciliation.entries(branch) {
            for &value in values.iter().filter(|v| v.is_quantified()) {
                unified.entry(key.clone()).or_default().insert(value);
            }
        }
    }
    unified
}

/// Pairs whose only main-branch evidence is one postmarketing entry.
///
/// Entries are counted, not deduplicated: two postmarketing rows, or a
/// postmarketing row next to an unrecognized label, do not qualify.
#[must_use]
pub fn postmarketing_only(reconciliation: &Reconciliation) -> BTreeSet<PairKey> {
    let mut seen: BTreeMap<&PairKey, Vec<Fingerprint>> = BTreeMap::new();
    for branch in Branch::UNIFIED {
        for (key, values) in reconciliation.entries(branch) {
            seen.entry(key).or_default().extend_from_slice(values);
        }
    }

    seen.into_iter()
        .filter(|(_, values)| values.as_slice() == [Fingerprint::Postmarketing])
        .map(|(key, _)| key.clone())
        .collect()
}

/// Collapses each pair's fingerprint set to one value: the single value when
/// the evidence agrees, the arithmetic mean otherwise.
#[must_use]
pub fn resolve_inconsistency(unified: &UnifiedPairs) -> BTreeMap<PairKey, f64> {
    unified
        .iter()
        .filter(|(_, values)| !values.is_empty())
        .map(|(key, values)| {
            #[allow(clippy::cast_precision_loss)]
            let mean = values.iter().map(|v| v.value()).sum::<f64>() / values.len() as f64;
            (key.clone(), mean)
        })
        .collect()
}

/// Postmarketing-only pairs whose side effect belongs to `vocabulary`.
#[must_use]
pub fn promote_postmarketing(
    candidates: &BTreeSet<PairKey>,
    vocabulary: &BTreeSet<String>,
) -> BTreeMap<DrugId, BTreeSet<String>> {
    let mut promoted: BTreeMap<DrugId, BTreeSet<String>> = BTreeMap::new();
    for key in candidates {
        if vocabulary.contains(key.side_effect()) {
            promoted
                .entry(key.drug())
                .or_default()
                .insert(key.side_effect().to_string());
        }
    }
    promoted
}

/// Drug → side effect → frequency value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DrugProfile(BTreeMap<DrugId, BTreeMap<String, f64>>);

impl DrugProfile {
    /// Creates an empty profile.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value of one pair.
    pub fn insert(&mut self, drug: DrugId, side_effect: impl Into<String>, value: f64) {
        self.0.entry(drug).or_default().insert(side_effect.into(), value);
    }

    /// Value of one pair.
    #[must_use]
    pub fn get(&self, drug: DrugId, side_effect: &str) -> Option<f64> {
        self.0.get(&drug).and_then(|effects| effects.get(side_effect)).copied()
    }

    /// Side effects of one drug.
    #[must_use]
    pub fn side_effects(&self, drug: DrugId) -> Option<&BTreeMap<String, f64>> {
        self.0.get(&drug)
    }

    /// True if the drug has at least one side effect.
    #[must_use]
    pub fn contains_drug(&self, drug: DrugId) -> bool {
        self.0.contains_key(&drug)
    }

    /// Iterates drugs in ID order.
    pub fn iter(&self) -> impl Iterator<Item = (&DrugId, &BTreeMap<String, f64>)> {
        self.0.iter()
    }

    /// Number of drugs.
    #[must_use]
    pub fn drug_count(&self) -> usize {
        self.0.len()
    }

    /// Number of drug–side-effect pairs.
    #[must_use]
    pub fn pair_count(&self) -> usize {
        self.0.values().map(BTreeMap::len).sum()
    }

    /// Unique side effects across all drugs.
    #[must_use]
    pub fn vocabulary(&self) -> BTreeSet<String> {
        self.0.values().flat_map(|effects| effects.keys().cloned()).collect()
    }
}

impl FromIterator<(PairKey, f64)> for DrugProfile {
    fn from_iter<I: IntoIterator<Item = (PairKey, f64)>>(iter: I) -> Self {
        let mut profile = Self::new();
        for (key, value) in iter {
            profile.insert(key.drug(), key.side_effect(), value);
        }
        profile
    }
}

/// One bar of the final-value histogram.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    /// Final (possibly averaged) value.
    pub value: f64,
    /// Number of pairs with that value.
    pub count: usize,
}

/// Distribution of values, ascending.
#[must_use]
pub fn histogram<'a>(values: impl IntoIterator<Item = &'a f64>) -> Vec<HistogramBin> {
    let mut sorted: Vec<f64> = values.into_iter().copied().collect();
    sorted.sort_by(f64::total_cmp);

    let mut bins: Vec<HistogramBin> = Vec::new();
    for value in sorted {
        match bins.last_mut() {
            Some(bin) if bin.value.total_cmp(&value).is_eq() => bin.count += 1,
            _ => bins.push(HistogramBin { value, count: 1 }),
        }
    }
    bins
}

/// Final output of unification.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UnifiedProfile {
    /// Drug → side effect → value, promoted postmarketing pairs included.
    pub profile: DrugProfile,
    /// Side effects with a quantified frequency for at least one drug.
    pub vocabulary: BTreeSet<String>,
    /// Promoted postmarketing side effects per drug.
    pub postmarketing: BTreeMap<DrugId, BTreeSet<String>>,
    /// Distribution of quantified final values.
    pub histogram: Vec<HistogramBin>,
    /// Pairs whose branches disagreed and were averaged.
    pub inconsistent_pairs: usize,
    /// Postmarketing-only pairs not promoted.
    pub dropped_postmarketing: usize,
}

/// Runs every unification step over a reconciliation.
#[must_use]
pub fn finalize(reconciliation: &Reconciliation) -> UnifiedProfile {
    let unified = unify(reconciliation);
    let inconsistent_pairs = unified.values().filter(|values| values.len() > 1).count();

    let resolved = resolve_inconsistency(&unified);
    let histogram = histogram(resolved.values());
    let mut profile: DrugProfile = resolved.into_iter().collect();
    let vocabulary = profile.vocabulary();

    let candidates = postmarketing_only(reconciliation);
    let postmarketing = promote_postmarketing(&candidates, &vocabulary);
    let promoted: usize = postmarketing.values().map(BTreeSet::len).sum();
    for (drug, effects) in &postmarketing {
        for effect in effects {
            profile.insert(*drug, effect.clone(), Fingerprint::Postmarketing.value());
        }
    }

    info!(
        drugs = profile.drug_count(),
        pairs = profile.pair_count(),
        vocabulary = vocabulary.len(),
        inconsistent = inconsistent_pairs,
        promoted_postmarketing = promoted,
        dropped_postmarketing = candidates.len() - promoted,
        "unified drug profile"
    );

    UnifiedProfile {
        profile,
        vocabulary,
        postmarketing,
        histogram,
        inconsistent_pairs,
        dropped_postmarketing: candidates.len() - promoted,
    }
}

/// Side effects listed for a profiled drug that belong to the frequency
/// vocabulary yet have no value for that drug.
#[must_use]
pub fn side_effects_without_frequency(
    all_side_effects: &BTreeMap<DrugId, BTreeSet<String>>,
    profile: &DrugProfile,
    vocabulary: &BTreeSet<String>,
) -> BTreeMap<DrugId, BTreeSet<String>> {
    let mut missing: BTreeMap<DrugId, BTreeSet<String>> = BTreeMap::new();
    for (drug, effects) in all_side_effects {
        let Some(known) = profile.side_effects(*drug) else {
            continue;
        };
        for effect in effects {
            if vocabulary.contains(effect) && !known.contains_key(effect) {
                missing.entry(*drug).or_default().insert(effect.clone());
            }
        }
    }
    missing
}
