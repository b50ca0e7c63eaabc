//! Pipeline configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::aggregate::AggregateOptions;
use crate::classify::LabelPolicy;
use crate::error::{IngestError, ValidationError};
use crate::ids::TermType;

/// Default `tracing` filter for the binary when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "siderfreq=info";

/// Settings for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding the SIDER dumps.
    pub data_dir: PathBuf,
    /// Directory receiving the JSON outputs.
    pub output_dir: PathBuf,
    /// File name of the side-effect dump inside `data_dir`.
    pub side_effects_file: String,
    /// File name of the frequency dump inside `data_dir`.
    pub frequencies_file: String,
    /// File name of the indication dump inside `data_dir`.
    pub indications_file: String,
    /// MedDRA granularity to keep.
    pub term_type: TermType,
    /// Handling of unrecognized frequency labels.
    pub label_policy: LabelPolicy,
    /// Whether to read indications and write `indications.json`.
    pub include_indications: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::new(),
            output_dir: PathBuf::new(),
            side_effects_file: "meddra_all_se.tsv".to_string(),
            frequencies_file: "meddra_freq.tsv".to_string(),
            indications_file: "meddra_all_indications.tsv".to_string(),
            term_type: TermType::default(),
            label_policy: LabelPolicy::default(),
            include_indications: true,
        }
    }
}

impl PipelineConfig {
    /// Creates a config with default file names.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    /// Loads a config from a JSON file. Missing keys take their defaults.
    ///
    /// # Errors
    /// Returns [`IngestError::Open`] if the file cannot be read and
    /// [`IngestError::Config`] if it is not valid JSON for this type.
    pub fn from_json_file(path: &Path) -> Result<Self, IngestError> {
        let text = fs::read_to_string(path).map_err(|source| IngestError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| IngestError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Checks that every path is set.
    ///
    /// # Errors
    /// Returns [`ValidationError::MissingField`] naming the first empty field.
    pub fn validate(self) -> Result<Self, ValidationError> {
        let required = [
            ("data_dir", self.data_dir.as_os_str().is_empty()),
            ("output_dir", self.output_dir.as_os_str().is_empty()),
            ("side_effects_file", self.side_effects_file.trim().is_empty()),
            ("frequencies_file", self.frequencies_file.trim().is_empty()),
            (
                "indications_file",
                self.include_indications && self.indications_file.trim().is_empty(),
            ),
        ];
        if let Some((field, _)) = required.iter().find(|(_, missing)| *missing) {
            return Err(ValidationError::MissingField {
                field: (*field).to_string(),
            });
        }
        Ok(self)
    }

    /// Path of the side-effect dump.
    #[must_use]
    pub fn side_effects_path(&self) -> PathBuf {
        self.data_dir.join(&self.side_effects_file)
    }

    /// Path of the frequency dump.
    #[must_use]
    pub fn frequencies_path(&self) -> PathBuf {
        self.data_dir.join(&self.frequencies_file)
    }

    /// Path of the indication dump.
    #[must_use]
    pub fn indications_path(&self) -> PathBuf {
        self.data_dir.join(&self.indications_file)
    }

    /// Options handed to aggregation.
    #[must_use]
    pub const fn aggregate_options(&self) -> AggregateOptions {
        AggregateOptions {
            term_type: self.term_type,
            label_policy: self.label_policy,
        }
    }
}
