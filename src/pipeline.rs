//! End-to-end pipeline: read the dumps, reconcile, write the outputs.

use std::collections::BTreeMap;

use chrono::Utc;
use tracing::{info, instrument};

use crate::aggregate::{aggregate, AggregateOptions, AggregationStats, RawFrequencyRecord};
use crate::config::PipelineConfig;
use crate::error::{SiderResult, ValidationError};
use crate::output::{digest_file, files, OutputWriter, RunId, RunReport};
use crate::overlap::OverlapCounts;
use crate::reconcile::{reconcile, Branch, Reconciliation};
use crate::sider::{read_flat_to_stereo, read_frequency_records, read_indications, read_side_effects};
use crate::unify::{finalize, side_effects_without_frequency, UnifiedProfile};

/// In-memory result of processing frequency records.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    /// Aggregation counters.
    pub stats: AggregationStats,
    /// Pairs per evidence region.
    pub overlap: OverlapCounts,
    /// Per-branch fingerprints and the placebo audit.
    pub reconciliation: Reconciliation,
    /// Final profile.
    pub unified: UnifiedProfile,
}

impl PipelineOutcome {
    /// Pairs per reconciliation branch, keyed by branch name.
    #[must_use]
    pub fn branch_sizes(&self) -> BTreeMap<String, usize> {
        Branch::ALL
            .iter()
            .map(|branch| (branch.name().to_string(), self.reconciliation.branch_len(*branch)))
            .collect()
    }
}

/// Aggregates, reconciles and unifies raw records without touching disk.
///
/// # Errors
/// Only under the strict label policy; see [`aggregate`].
#[instrument(skip_all, fields(term_type = %options.term_type))]
pub fn process_records<I>(records: I, options: &AggregateOptions) -> Result<PipelineOutcome, ValidationError>
where
    I: IntoIterator<Item = RawFrequencyRecord>,
{
    let table = aggregate(records, options)?;
    let overlap = OverlapCounts::from_table(&table);
    let reconciliation = reconcile(&table);
    let unified = finalize(&reconciliation);

    Ok(PipelineOutcome {
        stats: table.stats(),
        overlap,
        reconciliation,
        unified,
    })
}

/// Runs the whole pipeline described by `config`.
///
/// # Errors
/// Returns a [`crate::SiderError`] if the config is incomplete, a dump cannot
/// be read, the strict label policy rejects a label, or an output cannot be
/// written.
#[instrument(skip_all, fields(data_dir = %config.data_dir.display(), output_dir = %config.output_dir.display()))]
pub fn run(config: &PipelineConfig) -> SiderResult<RunReport> {
    let config = config.clone().validate()?;
    let run_id = RunId::new();
    let started_at = Utc::now();
    info!(%run_id, "starting run");

    let frequencies_path = config.frequencies_path();
    let side_effects_path = config.side_effects_path();
    let mut inputs = vec![digest_file(&frequencies_path)?, digest_file(&side_effects_path)?];

    let records = read_frequency_records(&frequencies_path)?;
    let outcome = process_records(records, &config.aggregate_options())?;
    let all_side_effects = read_side_effects(&side_effects_path, config.term_type)?;
    let unified = &outcome.unified;
    let no_frequency = side_effects_without_frequency(&all_side_effects, &unified.profile, &unified.vocabulary);

    let mut writer = OutputWriter::create(&config.output_dir)?;
    writer.write_json(files::PROFILE, &unified.profile)?;
    writer.write_json(files::VOCABULARY, &unified.vocabulary)?;
    writer.write_json(files::POSTMARKETING, &unified.postmarketing)?;
    writer.write_json(files::PLACEBO_DOMINANT, outcome.reconciliation.placebo_dominant())?;
    writer.write_json(files::NO_FREQUENCY, &no_frequency)?;

    if config.include_indications {
        let indications_path = config.indications_path();
        inputs.push(digest_file(&indications_path)?);
        let ids = read_flat_to_stereo(&side_effects_path)?;
        let indications = read_indications(&indications_path, &ids, config.term_type)?;
        writer.write_json(files::INDICATIONS, &indications)?;
    }

    let mut outputs = writer.written().to_vec();
    outputs.push(files::REPORT.to_string());
    let report = RunReport {
        run_id,
        started_at,
        finished_at: Utc::now(),
        term_type: config.term_type,
        label_policy: config.label_policy,
        inputs,
        aggregation: outcome.stats,
        overlap: outcome.overlap,
        branches: outcome.branch_sizes(),
        placebo_only: outcome.reconciliation.placebo_only().len(),
        placebo_dominant: outcome.reconciliation.placebo_dominant().len(),
        drugs: unified.profile.drug_count(),
        pairs: unified.profile.pair_count(),
        vocabulary: unified.vocabulary.len(),
        inconsistent_pairs: unified.inconsistent_pairs,
        promoted_postmarketing: unified.postmarketing.values().map(std::collections::BTreeSet::len).sum(),
        dropped_postmarketing: unified.dropped_postmarketing,
        histogram: unified.histogram.clone(),
        outputs,
    };
    writer.write_json(files::REPORT, &report)?;

    info!(%run_id, drugs = report.drugs, pairs = report.pairs, "run complete");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::LabelPolicy;
    use crate::ids::DrugId;

    fn record(drug: u64, se: &str, placebo: bool, freq: &str) -> RawFrequencyRecord {
        RawFrequencyRecord::new(DrugId::new(drug), se, placebo, freq)
    }

    #[test]
    fn test_exact_and_label_evidence_agree() {
        let outcome = process_records(
            vec![record(1, "Headache", false, "5%"), record(1, "headache", false, "common")],
            &AggregateOptions::default(),
        )
        .unwrap();

        assert_eq!(outcome.unified.profile.get(DrugId::new(1), "headache"), Some(4.0));
        assert_eq!(outcome.overlap.a_and_b, 1);
        assert_eq!(outcome.unified.inconsistent_pairs, 0);
        assert_eq!(outcome.branch_sizes()["A&B"], 1);
    }

    #[test]
    fn test_placebo_dominant_pairs_leave_the_profile() {
        let outcome = process_records(
            vec![record(2, "nausea", false, "1%"), record(2, "nausea", true, "3%")],
            &AggregateOptions::default(),
        )
        .unwrap();

        assert!(outcome.unified.profile.get(DrugId::new(2), "nausea").is_none());
        assert_eq!(outcome.reconciliation.placebo_dominant().len(), 1);
    }

    #[test]
    fn test_single_postmarketing_row_is_promoted() {
        let outcome = process_records(
            vec![record(1, "nausea", false, "postmarketing"), record(2, "nausea", false, "5%")],
            &AggregateOptions::default(),
        )
        .unwrap();

        assert_eq!(outcome.unified.profile.get(DrugId::new(1), "nausea"), Some(-1.0));
    }

    #[test]
    fn test_repeated_postmarketing_rows_are_not_promoted() {
        let outcome = process_records(
            vec![
                record(1, "nausea", false, "postmarketing"),
                record(1, "nausea", false, "postmarketing"),
                record(2, "nausea", false, "5%"),
            ],
            &AggregateOptions::default(),
        )
        .unwrap();

        assert_eq!(outcome.unified.profile.get(DrugId::new(1), "nausea"), None);
        assert!(outcome.unified.postmarketing.is_empty());
        assert_eq!(outcome.unified.dropped_postmarketing, 0);
    }

    #[test]
    fn test_postmarketing_with_unknown_label_is_not_promoted() {
        let outcome = process_records(
            vec![
                record(1, "rash", false, "postmarketing"),
                record(1, "rash", false, "sometimes"),
                record(2, "rash", false, "2%"),
            ],
            &AggregateOptions::default(),
        )
        .unwrap();

        assert_eq!(outcome.unified.profile.get(DrugId::new(1), "rash"), None);
        assert_eq!(outcome.unified.profile.get(DrugId::new(2), "rash"), Some(4.0));
    }

    #[test]
    fn test_strict_policy_surfaces_unknown_labels() {
        let options = AggregateOptions {
            label_policy: LabelPolicy::Strict,
            ..AggregateOptions::default()
        };
        let err = process_records(vec![record(3, "rash", false, "sometimes")], &options).unwrap_err();
        assert!(matches!(err, ValidationError::UnrecognizedLabel { .. }));
    }

    #[test]
    fn test_run_rejects_incomplete_config() {
        let err = run(&PipelineConfig::default()).unwrap_err();
        assert!(err.is_validation());
    }
}
