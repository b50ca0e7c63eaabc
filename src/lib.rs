//! # siderfreq - side-effect frequency reconciliation for SIDER
//!
//! Turns the heterogeneous frequency descriptions of the SIDER side-effect
//! resource ("5%", "1-10%", "<0.1%", "common", "postmarketing") into one value
//! per drug–side-effect pair on a 6-point scale.
//!
//! ## Stages
//!
//! - **Classify**: each description becomes an exact percentage, a range or a label
//! - **Aggregate**: records are grouped per pair into five evidence buckets
//! - **Reconcile**: pairs are routed by which evidence categories they have
//!   (A numeric drug arm, B labels, C placebo) and fingerprinted, with pairs
//!   whose placebo median matches or exceeds the drug median set aside
//! - **Unify**: branches are merged, disagreements averaged, and
//!   postmarketing-only pairs promoted when the side effect is known elsewhere
//!
//! ## Usage
//!
//! ```rust,ignore
//! use siderfreq::{process_records, AggregateOptions, DrugId, RawFrequencyRecord};
//!
//! let records = vec![
//!     RawFrequencyRecord::new(DrugId::new(85), "Headache", false, "5%"),
//!     RawFrequencyRecord::new(DrugId::new(85), "headache", false, "common"),
//! ];
//! let outcome = process_records(records, &AggregateOptions::default())?;
//! assert_eq!(outcome.unified.profile.get(DrugId::new(85), "headache"), Some(4.0));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core scale and parsing
pub mod classify;
pub mod error;
pub mod frequency;
pub mod ids;
pub mod median;

// Reconciliation
pub mod aggregate;
pub mod overlap;
pub mod reconcile;
pub mod unify;

// Dumps, configuration and outputs
pub mod config;
pub mod output;
pub mod pipeline;
pub mod sider;

// Re-export primary types at crate root for convenience
pub use aggregate::{
    aggregate, AggregateOptions, AggregationStats, EvidenceSubset, FrequencyBuckets, Membership,
    PairTable, RawFrequencyRecord,
};
pub use classify::{classify_frequency, Bucket, FrequencyValue, LabelPolicy};
pub use config::{PipelineConfig, DEFAULT_LOG_FILTER};
pub use error::{IngestError, OutputError, SiderError, SiderResult, ValidationError};
pub use frequency::{normalize_label, Fingerprint, FrequencyLabel};
pub use ids::{normalize_term, DrugId, FlatId, PairKey, TermType};
pub use median::{attribute, median, Attribution};
pub use output::{RunId, RunReport};
pub use overlap::OverlapCounts;
pub use pipeline::{process_records, run, PipelineOutcome};
pub use reconcile::{reconcile, reconcile_pair, Branch, BranchVerdict, PlaceboAudit, Reconciliation};
pub use unify::{finalize, side_effects_without_frequency, DrugProfile, HistogramBin, UnifiedProfile};
