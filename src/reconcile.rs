//! Label reconciliation.
//!
//! Every pair is routed into the branches matching its evidence subset and
//! each branch turns the pair's buckets into fingerprints:
//!
//! | branch  | fingerprints                                                    |
//! |---------|-----------------------------------------------------------------|
//! | `A-only`| median(A)                                                        |
//! | `B-only`| every label                                                      |
//! | `C-only`| none; median(C) is kept aside                                    |
//! | `A&B`   | median(A) and every label                                        |
//! | `A&C`   | median(A) if it beats median(C), else the pair goes to the audit |
//! | `B&C`   | every label (placebo ignored)                                    |
//! | `A&B&C` | median(A) if it beats median(C), and every label                 |
//!
//! A pair with all three categories is recorded under `A&B`, `A&C`, `B&C`
//! and `A&B&C`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::aggregate::{EvidenceSubset, FrequencyBuckets, PairTable};
use crate::frequency::Fingerprint;
use crate::ids::PairKey;
use crate::median::{attribute, Attribution};

/// Reconciliation branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Branch {
    /// A without B or C.
    #[serde(rename = "A-only")]
    OnlyA,
    /// B without A or C.
    #[serde(rename = "B-only")]
    OnlyB,
    /// C without A or B.
    #[serde(rename = "C-only")]
    OnlyC,
    /// A and B.
    #[serde(rename = "A&B")]
    AAndB,
    /// A and C.
    #[serde(rename = "A&C")]
    AAndC,
    /// B and C.
    #[serde(rename = "B&C")]
    BAndC,
    /// A, B and C.
    #[serde(rename = "A&B&C")]
    AAndBAndC,
}

impl Branch {
    /// Every branch.
    pub const ALL: [Self; 7] = [
        Self::OnlyA,
        Self::OnlyB,
        Self::OnlyC,
        Self::AAndB,
        Self::AAndC,
        Self::BAndC,
        Self::AAndBAndC,
    ];

    /// Branches merged into the final profile, in merge order.
    pub const UNIFIED: [Self; 5] = [
        Self::OnlyA,
        Self::OnlyB,
        Self::AAndB,
        Self::AAndC,
        Self::BAndC,
    ];

    /// Display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::OnlyA => "A-only",
            Self::OnlyB => "B-only",
            Self::OnlyC => "C-only",
            Self::AAndB => "A&B",
            Self::AAndC => "A&C",
            Self::BAndC => "B&C",
            Self::AAndBAndC => "A&B&C",
        }
    }

    /// Branches a pair with the given evidence subset is routed into.
    #[must_use]
    pub const fn for_subset(subset: EvidenceSubset) -> &'static [Self] {
        match subset {
            EvidenceSubset::OnlyA => &[Self::OnlyA],
            EvidenceSubset::OnlyB => &[Self::OnlyB],
            EvidenceSubset::OnlyC => &[Self::OnlyC],
            EvidenceSubset::AAndB => &[Self::AAndB],
            EvidenceSubset::AAndC => &[Self::AAndC],
            EvidenceSubset::BAndC => &[Self::BAndC],
            EvidenceSubset::AAndBAndC => &[Self::AAndB, Self::AAndC, Self::BAndC, Self::AAndBAndC],
        }
    }
}

impl std::fmt::Display for Branch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Audit record of a pair whose placebo median matches or beats the drug.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaceboAudit {
    /// Median drug-arm percentage.
    pub drug_median: f64,
    /// Median placebo-arm percentage.
    pub placebo_median: f64,
    /// Fingerprint of the drug median.
    pub drug: Fingerprint,
    /// Fingerprint of the placebo median.
    pub placebo: Fingerprint,
}

impl PlaceboAudit {
    fn new(drug_median: f64, placebo_median: f64) -> Self {
        Self {
            drug_median,
            placebo_median,
            drug: Fingerprint::from_percentage(drug_median),
            placebo: Fingerprint::from_percentage(placebo_median),
        }
    }
}

/// Outcome of one branch for one pair.
#[derive(Debug, Clone, PartialEq)]
pub enum BranchVerdict {
    /// Fingerprints recorded under a main branch.
    Fingerprints {
        /// Branch.
        branch: Branch,
        /// Values, in the order they were produced.
        values: Vec<Fingerprint>,
    },
    /// Placebo-only evidence: median kept aside, no drug signal.
    PlaceboOnly {
        /// Median placebo-arm percentage.
        median: f64,
    },
    /// `A&C` pair attributed to the placebo.
    PlaceboDominant(PlaceboAudit),
}

/// Applies the branch policy to one pair.
///
/// Returns one verdict per branch the pair is routed into, except that an
/// `A&B&C` pair dominated by its placebo yields its `A&C` verdict as
/// [`BranchVerdict::PlaceboDominant`].
#[must_use]
pub fn reconcile_pair(buckets: &FrequencyBuckets) -> Vec<BranchVerdict> {
    let Some(subset) = buckets.membership().subset() else {
        return Vec::new();
    };

    let drug_median = buckets.drug_median();
    let placebo_median = buckets.placebo_median();
    let drug_fingerprint = drug_median.map(Fingerprint::from_percentage);
    let labels = || buckets.label_freq.iter().map(|l| Fingerprint::from_label(l));
    let drug_attributed = match (drug_median, placebo_median) {
        (Some(d), Some(p)) => attribute(d, p) == Attribution::Drug,
        _ => false,
    };

    let mut verdicts = Vec::with_capacity(4);
    for &branch in Branch::for_subset(subset) {
        let values: Vec<Fingerprint> = match branch {
            Branch::OnlyA => drug_fingerprint.into_iter().collect(),
            Branch::OnlyB | Branch::BAndC => labels().collect(),
            Branch::OnlyC => {
                if let Some(median) = placebo_median {
                    verdicts.push(BranchVerdict::PlaceboOnly { median });
                }
                continue;
            }
            Branch::AAndB => drug_fingerprint.into_iter().chain(labels()).collect(),
            Branch::AAndC => {
                if drug_attributed {
                    drug_fingerprint.into_iter().collect()
                } else {
                    if let (Some(d), Some(p)) = (drug_median, placebo_median) {
                        verdicts.push(BranchVerdict::PlaceboDominant(PlaceboAudit::new(d, p)));
                    }
                    continue;
                }
            }
            Branch::AAndBAndC => drug_fingerprint
                .filter(|_| drug_attributed)
                .into_iter()
                .chain(labels())
                .collect(),
        };
        verdicts.push(BranchVerdict::Fingerprints { branch, values });
    }
    verdicts
}

/// Reconciled branch contents for a whole table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Reconciliation {
    branches: BTreeMap<Branch, BTreeMap<PairKey, Vec<Fingerprint>>>,
    placebo_only: BTreeMap<PairKey, f64>,
    placebo_dominant: BTreeMap<PairKey, PlaceboAudit>,
}

impl Reconciliation {
    /// Records fingerprints for a pair under a branch. Returns `false` if the
    /// pair already had an entry there; the existing entry is kept.
    pub fn record(&mut self, branch: Branch, key: PairKey, values: Vec<Fingerprint>) -> bool {
        let entries = self.branches.entry(branch).or_default();
        if entries.contains_key(&key) {
            return false;
        }
        entries.insert(key, values);
        true
    }

    /// Applies one pair's verdicts.
    pub fn apply(&mut self, key: &PairKey, verdicts: Vec<BranchVerdict>) {
        for verdict in verdicts {
            match verdict {
                BranchVerdict::Fingerprints { branch, values } => {
                    let fresh = self.record(branch, key.clone(), values);
                    debug_assert!(fresh, "pair {key} recorded twice under {branch}");
                }
                BranchVerdict::PlaceboOnly { median } => {
                    self.placebo_only.insert(key.clone(), median);
                }
                BranchVerdict::PlaceboDominant(audit) => {
                    debug!(pair = %key, drug = audit.drug_median, placebo = audit.placebo_median, "placebo-dominant pair");
                    self.placebo_dominant.insert(key.clone(), audit);
                }
            }
        }
    }

    /// Fingerprints of a pair under a branch.
    #[must_use]
    pub fn values(&self, branch: Branch, key: &PairKey) -> Option<&[Fingerprint]> {
        self.branches
            .get(&branch)
            .and_then(|entries| entries.get(key))
            .map(Vec::as_slice)
    }

    /// Pairs recorded under a branch, in key order.
    pub fn entries(&self, branch: Branch) -> impl Iterator<Item = (&PairKey, &[Fingerprint])> {
        self.branches
            .get(&branch)
            .into_iter()
            .flat_map(|entries| entries.iter().map(|(k, v)| (k, v.as_slice())))
    }

    /// Number of pairs under a branch. `C-only` counts the placebo-only pairs.
    #[must_use]
    pub fn branch_len(&self, branch: Branch) -> usize {
        match branch {
            Branch::OnlyC => self.placebo_only.len(),
            _ => self.branches.get(&branch).map_or(0, BTreeMap::len),
        }
    }

    /// Branches a pair ended up in (placebo-only included as `C-only`).
    #[must_use]
    pub fn branches_of(&self, key: &PairKey) -> Vec<Branch> {
        Branch::ALL
            .into_iter()
            .filter(|&branch| match branch {
                Branch::OnlyC => self.placebo_only.contains_key(key),
                _ => self.values(branch, key).is_some(),
            })
            .collect()
    }

    /// Placebo-only medians.
    #[must_use]
    pub const fn placebo_only(&self) -> &BTreeMap<PairKey, f64> {
        &self.placebo_only
    }

    /// Placebo-dominant audit group.
    #[must_use]
    pub const fn placebo_dominant(&self) -> &BTreeMap<PairKey, PlaceboAudit> {
        &self.placebo_dominant
    }
}

/// Reconciles every pair of a table.
#[must_use]
pub fn reconcile(table: &PairTable) -> Reconciliation {
    let mut reconciliation = Reconciliation::default();
    for (key, buckets) in table.iter() {
        reconciliation.apply(key, reconcile_pair(buckets));
    }

    info!(
        a_only = reconciliation.branch_len(Branch::OnlyA),
        b_only = reconciliation.branch_len(Branch::OnlyB),
        c_only = reconciliation.branch_len(Branch::OnlyC),
        a_and_b = reconciliation.branch_len(Branch::AAndB),
        a_and_c = reconciliation.branch_len(Branch::AAndC),
        b_and_c = reconciliation.branch_len(Branch::BAndC),
        a_and_b_and_c = reconciliation.branch_len(Branch::AAndBAndC),
        placebo_dominant = reconciliation.placebo_dominant.len(),
        "reconciled pairs"
    );
    reconciliation
}
