// tests/store_roundtrip.rs

//! Persistence of the full experiment record.

mod common;

use common::{dummy_report, experiment_through, ExperimentBuilder};

use postcorr::errors::PostError;
use postcorr::exp::{Credentials, FlagWeight, SourceKind, StepId, Subbands, ToolRun};
use postcorr::store::MetadataStore;

#[test]
fn missing_experiment_is_reported_as_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::new(dir.path());

    let err = store.load("N19C3").unwrap_err();
    assert!(matches!(err, PostError::ExperimentNotFound(name) if name == "N19C3"));
}

#[test]
fn full_record_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::new(dir.path());

    let mut exp = ExperimentBuilder::new("ek051a")
        .obs_date("250214")
        .realtime_name("EK051")
        .antenna("Ef", true)
        .antenna("Jb", false)
        .refant("Ef")
        .source("3C345", SourceKind::FringeFinder, false)
        .source("PSR0329+54", SourceKind::Target, true)
        .pass("ek051a.lis", "ek051a.ms", "ek051a_1_1.IDI", true)
        .pi("Surname", "pi@example.com")
        .build();

    exp.credentials = Some(Credentials {
        username: "ek051a".to_string(),
        password: "s3cret".to_string(),
    });
    exp.passes[0].flag_weights = Some(FlagWeight::new(0.9));
    exp.passes[0].freq_setup = Some(
        Subbands::new(
            vec![2, 2],
            vec![vec![1626.0e6, 1630.0e6], vec![1634.0e6, 1638.0e6]],
            vec![8.0e6, 8.0e6],
        )
        .unwrap(),
    );
    exp.record_report(dummy_report(StepId::Setup));
    exp.record_report(dummy_report(StepId::Listing));
    exp.record_tool_run(ToolRun {
        command: "standardplots".to_string(),
        args: vec!["ek051a.ms".to_string()],
        host: "localhost".to_string(),
        exit_code: 0,
        stdout: "ok".to_string(),
        stderr: String::new(),
        ran_at: chrono::NaiveDate::from_ymd_opt(2025, 2, 15)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap(),
    });

    store.save(&exp).unwrap();
    let restored = store.load("EK051A").unwrap();

    assert_eq!(restored, exp);
    assert_eq!(restored.name(), "EK051A");
    assert_eq!(restored.last_step(), Some(StepId::Listing));
}

#[test]
fn experiment_name_is_case_insensitive_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::new(dir.path());

    let exp = experiment_through("N19C3", StepId::Setup);
    store.save(&exp).unwrap();

    assert!(store.exists("n19c3"));
    assert_eq!(store.load("n19c3").unwrap().name(), "N19C3");
}

#[test]
fn last_step_follows_catalogue_order_not_insertion_time() {
    let mut exp = experiment_through("N19C3", StepId::Fetch);

    // A stale re-run of an earlier step must not change the answer.
    exp.record_report(dummy_report(StepId::Setup));

    assert_eq!(exp.last_step(), Some(StepId::Fetch));
}

#[test]
fn subbands_shape_is_validated() {
    let err = Subbands::new(vec![2], vec![vec![1.0], vec![2.0]], vec![8.0e6]).unwrap_err();
    assert!(matches!(err, PostError::InvalidValue { field, .. } if field == "freq_setup"));

    let err = Subbands::new(vec![2], vec![vec![1.0]], vec![8.0e6]).unwrap_err();
    assert!(matches!(err, PostError::InvalidValue { .. }));
}
