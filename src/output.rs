//! Run metadata and JSON output files.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregate::AggregationStats;
use crate::classify::LabelPolicy;
use crate::error::{IngestError, OutputError};
use crate::ids::TermType;
use crate::overlap::OverlapCounts;
use crate::unify::HistogramBin;

/// Output file names.
pub mod files {
    /// Drug → side effect → value.
    pub const PROFILE: &str = "profile.json";
    /// Sorted side-effect vocabulary.
    pub const VOCABULARY: &str = "vocabulary.json";
    /// Promoted postmarketing side effects per drug.
    pub const POSTMARKETING: &str = "postmarketing.json";
    /// Pairs whose placebo arm matched or exceeded the drug arm.
    pub const PLACEBO_DOMINANT: &str = "placebo_dominant.json";
    /// Listed side effects lacking a frequency.
    pub const NO_FREQUENCY: &str = "no_frequency.json";
    /// Text-mention indications per drug.
    pub const INDICATIONS: &str = "indications.json";
    /// Run report.
    pub const REPORT: &str = "report.json";
}

/// Identifier of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(uuid::Uuid);

impl RunId {
    /// Creates a new random run ID.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// BLAKE3 digest of one input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputDigest {
    /// File that was hashed.
    pub path: PathBuf,
    /// Size in bytes.
    pub bytes: u64,
    /// Hex-encoded BLAKE3 hash.
    pub blake3: String,
}

/// Hashes a file with BLAKE3.
///
/// # Errors
/// Returns [`IngestError::Open`] if the file cannot be opened or read.
pub fn digest_file(path: &Path) -> Result<InputDigest, IngestError> {
    let open_err = |source| IngestError::Open {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(open_err)?;
    let mut hasher = blake3::Hasher::new();
    let bytes = io::copy(&mut file, &mut hasher).map_err(open_err)?;
    Ok(InputDigest {
        path: path.to_path_buf(),
        bytes,
        blake3: hasher.finalize().to_hex().to_string(),
    })
}

/// Summary of a pipeline run, written as `report.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Run identifier.
    pub run_id: RunId,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the outputs were complete.
    pub finished_at: DateTime<Utc>,
    /// MedDRA granularity used.
    pub term_type: TermType,
    /// Label policy used.
    pub label_policy: LabelPolicy,
    /// Digests of every input read.
    pub inputs: Vec<InputDigest>,
    /// Aggregation counters.
    pub aggregation: AggregationStats,
    /// Pairs per evidence region.
    pub overlap: OverlapCounts,
    /// Pairs per reconciliation branch.
    pub branches: BTreeMap<String, usize>,
    /// Pairs with placebo evidence only.
    pub placebo_only: usize,
    /// Pairs set aside as placebo-dominant.
    pub placebo_dominant: usize,
    /// Drugs in the profile.
    pub drugs: usize,
    /// Pairs in the profile.
    pub pairs: usize,
    /// Size of the side-effect vocabulary.
    pub vocabulary: usize,
    /// Pairs whose branch values were averaged.
    pub inconsistent_pairs: usize,
    /// Postmarketing pairs added to the profile.
    pub promoted_postmarketing: usize,
    /// Postmarketing pairs left out.
    pub dropped_postmarketing: usize,
    /// Distribution of averaged values.
    pub histogram: Vec<HistogramBin>,
    /// Files written, relative to the output directory.
    pub outputs: Vec<String>,
}

impl RunReport {
    /// One-line summary for terminals.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "run {}: {} drugs, {} pairs, {} side effects, {} placebo-dominant, {} postmarketing promoted",
            self.run_id,
            self.drugs,
            self.pairs,
            self.vocabulary,
            self.placebo_dominant,
            self.promoted_postmarketing,
        )
    }
}

/// Writes pretty JSON files into one directory.
#[derive(Debug, Clone)]
pub struct OutputWriter {
    dir: PathBuf,
    written: Vec<String>,
}

impl OutputWriter {
    /// Creates the directory if needed.
    ///
    /// # Errors
    /// Returns [`OutputError::CreateDir`] if the directory cannot be created.
    pub fn create(dir: &Path) -> Result<Self, OutputError> {
        fs::create_dir_all(dir).map_err(|source| OutputError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
        Ok(Self {
            dir: dir.to_path_buf(),
            written: Vec::new(),
        })
    }

    /// Names of the files written so far.
    #[must_use]
    pub fn written(&self) -> &[String] {
        &self.written
    }

    /// Serializes `value` to `<dir>/<name>`.
    ///
    /// # Errors
    /// Returns [`OutputError::Serialize`] or [`OutputError::Write`].
    pub fn write_json<T: Serialize + ?Sized>(&mut self, name: &str, value: &T) -> Result<PathBuf, OutputError> {
        let json = serde_json::to_string_pretty(value).map_err(|source| OutputError::Serialize {
            name: name.to_string(),
            source,
        })?;
        let path = self.dir.join(name);
        fs::write(&path, json).map_err(|source| OutputError::Write {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "wrote output");
        self.written.push(name.to_string());
        Ok(path)
    }
}
