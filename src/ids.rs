//! Identifier types: compound IDs, side-effect terms and pair keys.
//!
//! SIDER carries two STITCH compound namespaces. The "stereo" ID equals the
//! PubChem CID and is the key used everywhere downstream; "flat" IDs only
//! appear in the indications dump and are mapped to stereo IDs once.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::ValidationError;

/// Characters preceding the numeric part of a stereo STITCH ID (`CID`).
const STEREO_PREFIX_LEN: usize = 3;

/// Characters preceding the numeric part of a flat STITCH ID (`CID1`).
const FLAT_PREFIX_LEN: usize = 4;

/// Separator between drug and side effect in a [`PairKey`].
pub const PAIR_SEPARATOR: char = '|';

/// Stereo compound identifier (PubChem CID).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DrugId(u64);

impl DrugId {
    /// Wraps a raw stereo ID.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the numeric ID.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Parses a stereo STITCH ID such as `CID000002244`.
    pub fn from_stitch(value: &str) -> Result<Self, ValidationError> {
        parse_stitch(value, STEREO_PREFIX_LEN).map(Self)
    }
}

impl fmt::Display for DrugId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Flat compound identifier (stereo-agnostic).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FlatId(u64);

impl FlatId {
    /// Wraps a raw flat ID.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Parses a flat STITCH ID such as `CID100002244`.
    pub fn from_stitch(value: &str) -> Result<Self, ValidationError> {
        parse_stitch(value, FLAT_PREFIX_LEN).map(Self)
    }
}

impl fmt::Display for FlatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn parse_stitch(value: &str, prefix_len: usize) -> Result<u64, ValidationError> {
    let malformed = || ValidationError::MalformedStitchId {
        value: value.to_string(),
    };
    let trimmed = value.trim();
    let digits = trimmed.get(prefix_len..).ok_or_else(malformed)?;
    digits.parse::<u64>().map_err(|_| malformed())
}

/// MedDRA concept granularity retained by a parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TermType {
    /// Preferred term.
    #[default]
    #[serde(rename = "PT")]
    PreferredTerm,
    /// Lowest level term.
    #[serde(rename = "LLT")]
    LowestLevelTerm,
}

impl TermType {
    /// Column value used by the SIDER dumps.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PreferredTerm => "PT",
            Self::LowestLevelTerm => "LLT",
        }
    }

    /// True if a raw term-type column holds this granularity.
    #[must_use]
    pub fn matches(self, column: &str) -> bool {
        column.trim() == self.as_str()
    }
}

impl fmt::Display for TermType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TermType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PT" => Ok(Self::PreferredTerm),
            "LLT" => Ok(Self::LowestLevelTerm),
            _ => Err(ValidationError::UnknownTermType {
                value: s.to_string(),
            }),
        }
    }
}

/// Normalizes a side-effect (or indication) term: quotes stripped, trimmed,
/// lower-cased. Term identity is textual equality after this step.
#[must_use]
pub fn normalize_term(raw: &str) -> String {
    raw.replace('"', "").trim().to_lowercase()
}

/// Composite key of one drug–side-effect pair, rendered as `drug|term`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairKey {
    drug: DrugId,
    side_effect: String,
}

impl PairKey {
    /// Builds a key, normalizing the side-effect term.
    #[must_use]
    pub fn new(drug: DrugId, side_effect: &str) -> Self {
        Self {
            drug,
            side_effect: normalize_term(side_effect),
        }
    }

    /// The drug half of the key.
    #[must_use]
    pub const fn drug(&self) -> DrugId {
        self.drug
    }

    /// The side-effect half of the key.
    #[must_use]
    pub fn side_effect(&self) -> &str {
        &self.side_effect
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{PAIR_SEPARATOR}{}", self.drug, self.side_effect)
    }
}

// Pair keys are JSON object keys in the outputs, so they travel as strings.
impl Serialize for PairKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}
