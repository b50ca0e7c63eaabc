use std::fs;
use std::path::Path;

use serde_json::Value;
use siderfreq::{run, LabelPolicy, PipelineConfig, RunReport};
use tempfile::TempDir;

fn se_row(flat: u64, stereo: u64, term_type: &str, name: &str) -> String {
    format!("CID1{flat:08}\tCID0{stereo:08}\tC0000001\t{term_type}\tC0000001\t{name}\n")
}

fn freq_row(stereo: u64, placebo: bool, freq: &str, term_type: &str, name: &str) -> String {
    let marker = if placebo { "placebo" } else { "" };
    format!("CID1{stereo:08}\tCID0{stereo:08}\tC0000001\t{marker}\t{freq}\t0\t0\t{term_type}\tC0000001\t{name}\n")
}

fn indication_row(flat: u64, method: &str, term_type: &str, name: &str) -> String {
    format!("CID1{flat:08}\tC0000002\t{method}\t{name}\t{term_type}\tC0000002\t{name}\n")
}

/// Three drugs: 10917 (flat 85), 10918 (flat 86), 10919 (flat 87).
fn write_dumps(dir: &Path) {
    let mut all_se = String::new();
    for name in ["Headache", "Nausea", "Dizziness", "Rash"] {
        all_se.push_str(&se_row(85, 10917, "PT", name));
    }
    for name in ["Headache", "Dizziness"] {
        all_se.push_str(&se_row(86, 10918, "PT", name));
    }
    for name in ["Headache", "Rash"] {
        all_se.push_str(&se_row(87, 10919, "PT", name));
    }
    all_se.push_str(&se_row(87, 10919, "LLT", "Head pain"));
    fs::write(dir.join("meddra_all_se.tsv"), all_se).unwrap();

    let freq = [
        freq_row(10917, false, "5%", "PT", "Headache"),
        freq_row(10917, false, "common", "PT", "Headache"),
        freq_row(10917, false, "1%", "PT", "Nausea"),
        freq_row(10917, true, "3%", "PT", "Nausea"),
        freq_row(10917, false, "postmarketing", "PT", "Dizziness"),
        freq_row(10918, false, "2%", "PT", "Dizziness"),
        freq_row(10918, false, "0.5%", "PT", "Headache"),
        freq_row(10919, false, "10%", "PT", "Rash"),
        freq_row(10919, false, "10%", "LLT", "Head pain"),
    ]
    .concat();
    fs::write(dir.join("meddra_freq.tsv"), freq).unwrap();

    let indications = [
        indication_row(85, "text_mention", "PT", "Migraine"),
        indication_row(86, "NLP_indication", "PT", "Hypertension"),
        indication_row(999, "text_mention", "PT", "Asthma"),
    ]
    .concat();
    fs::write(dir.join("meddra_all_indications.tsv"), indications).unwrap();
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

fn setup() -> (TempDir, PipelineConfig) {
    let tmp = tempfile::tempdir().unwrap();
    let data = tmp.path().join("data");
    fs::create_dir_all(&data).unwrap();
    write_dumps(&data);
    let config = PipelineConfig::new(data, tmp.path().join("out"));
    (tmp, config)
}

#[test]
fn full_run_writes_reconciled_profile() {
    let (_tmp, config) = setup();
    let report = run(&config).unwrap();
    let out = &config.output_dir;

    let profile = read_json(&out.join("profile.json"));
    assert_eq!(profile["10917"]["headache"], 4.0);
    assert_eq!(profile["10917"]["dizziness"], -1.0);
    assert!(profile["10917"].get("nausea").is_none());
    assert_eq!(profile["10918"]["dizziness"], 4.0);
    assert_eq!(profile["10918"]["headache"], 3.0);
    assert_eq!(profile["10919"]["rash"], 5.0);
    assert!(profile["10919"].get("head pain").is_none());

    let vocabulary = read_json(&out.join("vocabulary.json"));
    assert_eq!(vocabulary, serde_json::json!(["dizziness", "headache", "rash"]));

    let postmarketing = read_json(&out.join("postmarketing.json"));
    assert_eq!(postmarketing, serde_json::json!({"10917": ["dizziness"]}));

    let dominant = read_json(&out.join("placebo_dominant.json"));
    let audit = &dominant["10917|nausea"];
    assert_eq!(audit["drug_median"], 1.0);
    assert_eq!(audit["placebo_median"], 3.0);

    let no_frequency = read_json(&out.join("no_frequency.json"));
    assert_eq!(
        no_frequency,
        serde_json::json!({"10917": ["rash"], "10919": ["headache"]})
    );

    let indications = read_json(&out.join("indications.json"));
    assert_eq!(indications, serde_json::json!({"10917": ["migraine"]}));

    assert_eq!(report.drugs, 3);
    assert_eq!(report.pairs, 5);
    assert_eq!(report.placebo_dominant, 1);
    assert_eq!(report.promoted_postmarketing, 1);
    assert_eq!(report.aggregation.skipped_term_type, 1);
    assert_eq!(report.inputs.len(), 3);
    assert!(report.outputs.contains(&"report.json".to_string()));
}

#[test]
fn report_json_round_trips() {
    let (_tmp, config) = setup();
    let report = run(&config).unwrap();
    let written: RunReport =
        serde_json::from_str(&fs::read_to_string(config.output_dir.join("report.json")).unwrap()).unwrap();
    assert_eq!(written.run_id, report.run_id);
    assert_eq!(written.overlap, report.overlap);
    assert_eq!(written.inputs[0].blake3.len(), 64);
    assert_eq!(written.overlap.a_and_b, 1);
    assert_eq!(written.overlap.a_and_c, 1);
}

#[test]
fn indications_can_be_skipped() {
    let (_tmp, mut config) = setup();
    config.include_indications = false;
    let report = run(&config).unwrap();
    assert!(!config.output_dir.join("indications.json").exists());
    assert_eq!(report.inputs.len(), 2);
}

#[test]
fn strict_labels_fail_on_unknown_text() {
    let (_tmp, mut config) = setup();
    let mut freq = fs::read_to_string(config.frequencies_path()).unwrap();
    freq.push_str(&freq_row(10918, false, "sometimes", "PT", "Rash"));
    fs::write(config.frequencies_path(), freq).unwrap();

    let lenient = run(&config).unwrap();
    assert_eq!(lenient.drugs, 3);

    config.label_policy = LabelPolicy::Strict;
    let err = run(&config).unwrap_err();
    assert!(err.is_validation());
}

#[test]
fn missing_dump_is_an_ingest_error() {
    let (_tmp, config) = setup();
    fs::remove_file(config.side_effects_path()).unwrap();
    let err = run(&config).unwrap_err();
    assert!(err.is_ingest());
    assert!(!config.output_dir.join("profile.json").exists());
}
