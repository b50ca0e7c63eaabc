//! Category overlap counts (the seven regions of an A/B/C Venn diagram).

use serde::{Deserialize, Serialize};

use crate::aggregate::{EvidenceSubset, PairTable};

/// Pair counts per Venn region.
///
/// Single-category regions count pairs with exactly that category.
/// Intersection regions are inclusive: an A&B&C pair also counts towards
/// A&B, A&C and B&C.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlapCounts {
    /// A only.
    pub a_only: usize,
    /// B only.
    pub b_only: usize,
    /// C only.
    pub c_only: usize,
    /// A and B.
    pub a_and_b: usize,
    /// A and C.
    pub a_and_c: usize,
    /// B and C.
    pub b_and_c: usize,
    /// A, B and C.
    pub a_and_b_and_c: usize,
}

impl OverlapCounts {
    /// Counts every pair of a table.
    #[must_use]
    pub fn from_table(table: &PairTable) -> Self {
        let mut counts = Self::default();
        for (_, buckets) in table.iter() {
            if let Some(subset) = buckets.membership().subset() {
                counts.add(subset);
            }
        }
        counts
    }

    /// Adds one pair with the given subset.
    pub fn add(&mut self, subset: EvidenceSubset) {
        match subset {
            EvidenceSubset::OnlyA => self.a_only += 1,
            EvidenceSubset::OnlyB => self.b_only += 1,
            EvidenceSubset::OnlyC => self.c_only += 1,
            EvidenceSubset::AAndB => self.a_and_b += 1,
            EvidenceSubset::AAndC => self.a_and_c += 1,
            EvidenceSubset::BAndC => self.b_and_c += 1,
            EvidenceSubset::AAndBAndC => {
                self.a_and_b += 1;
                self.a_and_c += 1;
                self.b_and_c += 1;
                self.a_and_b_and_c += 1;
            }
        }
    }

    /// Number of distinct pairs behind the counts.
    #[must_use]
    pub const fn total_pairs(&self) -> usize {
        // A&B&C pairs were added to each pairwise region once.
        self.a_only
            + self.b_only
            + self.c_only
            + self.a_and_b
            + self.a_and_c
            + self.b_and_c
            - 2 * self.a_and_b_and_c
    }
}
