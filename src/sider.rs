//! Readers for the SIDER tab-separated dumps.
//!
//! The dumps have no header row and a fixed column layout, captured in
//! [`layout`]. Each reader has a path form and a `*_from` form over any
//! [`Read`] so callers can feed in-memory data.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::aggregate::RawFrequencyRecord;
use crate::error::{IngestError, ValidationError};
use crate::ids::{normalize_term, DrugId, FlatId, TermType};

/// Column positions of the SIDER dumps.
pub mod layout {
    /// `meddra_all_se.tsv`
    pub mod side_effects {
        /// STITCH flat ID.
        pub const FLAT_ID: usize = 0;
        /// STITCH stereo ID.
        pub const STEREO_ID: usize = 1;
        /// MedDRA concept type.
        pub const TERM_TYPE: usize = 3;
        /// Side-effect name.
        pub const NAME: usize = 5;
        /// Minimum row width.
        pub const WIDTH: usize = 6;
    }

    /// `meddra_freq.tsv`
    pub mod frequencies {
        /// STITCH stereo ID.
        pub const STEREO_ID: usize = 1;
        /// `placebo` marker, empty otherwise.
        pub const PLACEBO: usize = 3;
        /// Frequency description.
        pub const FREQUENCY: usize = 4;
        /// MedDRA concept type.
        pub const TERM_TYPE: usize = 7;
        /// Side-effect name.
        pub const NAME: usize = 9;
        /// Minimum row width.
        pub const WIDTH: usize = 10;
    }

    /// `meddra_all_indications.tsv`
    pub mod indications {
        /// STITCH flat ID.
        pub const FLAT_ID: usize = 0;
        /// Detection method (`NLP_indication`, `NLP_precondition`, `text_mention`).
        pub const METHOD: usize = 2;
        /// MedDRA concept type.
        pub const TERM_TYPE: usize = 4;
        /// Indication name.
        pub const NAME: usize = 6;
        /// Minimum row width.
        pub const WIDTH: usize = 7;
    }
}

const PLACEBO_MARKER: &str = "placebo";
const TEXT_MENTION: &str = "text_mention";

/// Flat → stereo compound ID lookup.
pub type StereoIdMap = BTreeMap<FlatId, DrugId>;

/// Drug → set of normalized terms.
pub type DrugTerms = BTreeMap<DrugId, BTreeSet<String>>;

fn open(path: &Path) -> Result<File, IngestError> {
    File::open(path).map_err(|source| IngestError::Open {
        path: path.to_path_buf(),
        source,
    })
}

/// Streams rows of a headerless TSV, checking the minimum width.
fn for_each_row<R, F>(reader: R, origin: &Path, width: usize, mut visit: F) -> Result<(), IngestError>
where
    R: Read,
    F: FnMut(&csv::StringRecord, u64) -> Result<(), ValidationError>,
{
    let mut rows = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(reader);

    for row in rows.records() {
        let row = row.map_err(|source| IngestError::Read {
            path: origin.to_path_buf(),
            source,
        })?;
        let line = row.position().map_or(0, csv::Position::line);
        if row.len() < width {
            return Err(IngestError::ShortRow {
                path: origin.to_path_buf(),
                line,
                expected: width,
                actual: row.len(),
            });
        }
        visit(&row, line).map_err(|source| IngestError::InvalidField {
            path: origin.to_path_buf(),
            line,
            source,
        })?;
    }
    Ok(())
}

fn column<'r>(row: &'r csv::StringRecord, index: usize) -> &'r str {
    row.get(index).unwrap_or_default()
}

/// Reads `meddra_all_se.tsv`: every side effect of each drug.
pub fn read_side_effects(path: &Path, term_type: TermType) -> Result<DrugTerms, IngestError> {
    read_side_effects_from(open(path)?, path, term_type)
}

/// [`read_side_effects`] over any reader; `origin` labels errors.
pub fn read_side_effects_from<R: Read>(
    reader: R,
    origin: &Path,
    term_type: TermType,
) -> Result<DrugTerms, IngestError> {
    use layout::side_effects as col;

    let mut drugs = DrugTerms::new();
    for_each_row(reader, origin, col::WIDTH, |row, _| {
        if term_type.matches(column(row, col::TERM_TYPE)) {
            let drug = DrugId::from_stitch(column(row, col::STEREO_ID))?;
            drugs
                .entry(drug)
                .or_default()
                .insert(normalize_term(column(row, col::NAME)));
        }
        Ok(())
    })?;

    if drugs.is_empty() {
        warn!(path = %origin.display(), %term_type, "no side effects of the requested term type");
    }
    info!(path = %origin.display(), drugs = drugs.len(), "read side effects");
    Ok(drugs)
}

/// Reads the flat → stereo ID mapping from `meddra_all_se.tsv`.
///
/// Later rows overwrite earlier ones for the same flat ID.
pub fn read_flat_to_stereo(path: &Path) -> Result<StereoIdMap, IngestError> {
    read_flat_to_stereo_from(open(path)?, path)
}

/// [`read_flat_to_stereo`] over any reader.
pub fn read_flat_to_stereo_from<R: Read>(reader: R, origin: &Path) -> Result<StereoIdMap, IngestError> {
    use layout::side_effects as col;

    let mut ids = StereoIdMap::new();
    for_each_row(reader, origin, col::WIDTH, |row, _| {
        let flat = FlatId::from_stitch(column(row, col::FLAT_ID))?;
        let stereo = DrugId::from_stitch(column(row, col::STEREO_ID))?;
        ids.insert(flat, stereo);
        Ok(())
    })?;
    debug!(path = %origin.display(), mappings = ids.len(), "read flat to stereo id map");
    Ok(ids)
}

/// Reads `meddra_freq.tsv` into raw records (all term types).
pub fn read_frequency_records(path: &Path) -> Result<Vec<RawFrequencyRecord>, IngestError> {
    read_frequency_records_from(open(path)?, path)
}

/// [`read_frequency_records`] over any reader.
pub fn read_frequency_records_from<R: Read>(
    reader: R,
    origin: &Path,
) -> Result<Vec<RawFrequencyRecord>, IngestError> {
    use layout::frequencies as col;

    let mut records = Vec::new();
    for_each_row(reader, origin, col::WIDTH, |row, _| {
        let drug = DrugId::from_stitch(column(row, col::STEREO_ID))?;
        let placebo = column(row, col::PLACEBO).trim() == PLACEBO_MARKER;
        records.push(
            RawFrequencyRecord::new(
                drug,
                column(row, col::NAME),
                placebo,
                column(row, col::FREQUENCY),
            )
            .with_term_type(column(row, col::TERM_TYPE).trim()),
        );
        Ok(())
    })?;
    info!(path = %origin.display(), records = records.len(), "read frequency records");
    Ok(records)
}

/// Reads `meddra_all_indications.tsv`, keeping text mentions only.
///
/// Rows whose flat ID has no stereo mapping are skipped.
pub fn read_indications(
    path: &Path,
    ids: &StereoIdMap,
    term_type: TermType,
) -> Result<DrugTerms, IngestError> {
    read_indications_from(open(path)?, path, ids, term_type)
}

/// [`read_indications`] over any reader.
pub fn read_indications_from<R: Read>(
    reader: R,
    origin: &Path,
    ids: &StereoIdMap,
    term_type: TermType,
) -> Result<DrugTerms, IngestError> {
    use layout::indications as col;

    let mut drugs = DrugTerms::new();
    let mut unmapped = 0usize;
    for_each_row(reader, origin, col::WIDTH, |row, _| {
        let flat = FlatId::from_stitch(column(row, col::FLAT_ID))?;
        let Some(&stereo) = ids.get(&flat) else {
            unmapped += 1;
            return Ok(());
        };
        if term_type.matches(column(row, col::TERM_TYPE))
            && column(row, col::METHOD).contains(TEXT_MENTION)
        {
            drugs
                .entry(stereo)
                .or_default()
                .insert(normalize_term(column(row, col::NAME)));
        }
        Ok(())
    })?;
    info!(path = %origin.display(), drugs = drugs.len(), unmapped, "read indications");
    Ok(drugs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> &'static Path {
        Path::new("memory.tsv")
    }

    const ALL_SE: &str = "\
CID100000085\tCID000010917\tC0000729\tLLT\tC0000729\tAbdominal cramps
CID100000085\tCID000010917\tC0000729\tPT\tC0000729\tAbdominal Pain
CID100000086\tCID000010918\tC0027497\tPT\tC0027497\tNausea
";

    #[test]
    fn test_side_effects_filter_term_type() {
        let pt = read_side_effects_from(ALL_SE.as_bytes(), origin(), TermType::PreferredTerm).unwrap();
        assert_eq!(pt.len(), 2);
        assert!(pt[&DrugId::new(10917)].contains("abdominal pain"));
        assert!(pt[&DrugId::new(10918)].contains("nausea"));

        let llt = read_side_effects_from(ALL_SE.as_bytes(), origin(), TermType::LowestLevelTerm).unwrap();
        assert_eq!(llt.len(), 1);
        assert!(llt[&DrugId::new(10917)].contains("abdominal cramps"));
    }

    #[test]
    fn test_flat_to_stereo_map() {
        let ids = read_flat_to_stereo_from(ALL_SE.as_bytes(), origin()).unwrap();
        assert_eq!(ids.get(&FlatId::new(85)), Some(&DrugId::new(10917)));
        assert_eq!(ids.get(&FlatId::new(86)), Some(&DrugId::new(10918)));
    }

    #[test]
    fn test_frequency_records_carry_placebo_and_term_type() {
        let data = "\
CID100000085\tCID000010917\tC0000729\t\t5%\t0.05\t0.05\tPT\tC0000729\tAbdominal pain
CID100000085\tCID000010917\tC0000729\tplacebo\t2%\t0.02\t0.02\tPT\tC0000729\tAbdominal pain
CID100000085\tCID000010917\tC0000729\t\tcommon\t0.01\t0.1\tLLT\tC0000729\tAbdominal cramps
";
        let records = read_frequency_records_from(data.as_bytes(), origin()).unwrap();
        assert_eq!(records.len(), 3);
        assert!(!records[0].placebo);
        assert!(records[1].placebo);
        assert_eq!(records[1].frequency, "2%");
        assert_eq!(records[2].term_type, "LLT");
        assert_eq!(records[0].drug, DrugId::new(10917));
    }

    #[test]
    fn test_short_rows_are_rejected_with_line() {
        let data = "CID100000085\tCID000010917\tC0000729\n";
        let err = read_frequency_records_from(data.as_bytes(), origin()).unwrap_err();
        match err {
            IngestError::ShortRow { line, expected, actual, .. } => {
                assert_eq!(line, 1);
                assert_eq!(expected, 10);
                assert_eq!(actual, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_malformed_ids_are_reported() {
        let data = "CID100000085\tXX\tC0\t\t5%\t0\t0\tPT\tC0\tRash\n";
        let err = read_frequency_records_from(data.as_bytes(), origin()).unwrap_err();
        assert!(matches!(err, IngestError::InvalidField { .. }));
    }

    #[test]
    fn test_indications_keep_text_mentions_of_mapped_drugs() {
        let ids = read_flat_to_stereo_from(ALL_SE.as_bytes(), origin()).unwrap();
        let data = "\
CID100000085\tC0018681\ttext_mention\tHeadache\tPT\tC0018681\tHeadache
CID100000085\tC0020538\tNLP_indication\tHypertension\tPT\tC0020538\tHypertension
CID100000999\tC0018681\ttext_mention\tHeadache\tPT\tC0018681\tHeadache
CID100000086\tC0018681\ttext_mention\tHeadache\tLLT\tC0018681\tHeadache
";
        let drugs = read_indications_from(data.as_bytes(), origin(), &ids, TermType::PreferredTerm).unwrap();
        assert_eq!(drugs.len(), 1);
        let found: Vec<&String> = drugs[&DrugId::new(10917)].iter().collect();
        assert_eq!(found, vec!["headache"]);
    }

    #[test]
    fn test_missing_file_is_an_open_error() {
        let err = read_frequency_records(Path::new("/definitely/not/here.tsv")).unwrap_err();
        assert!(matches!(err, IngestError::Open { .. }));
    }
}
