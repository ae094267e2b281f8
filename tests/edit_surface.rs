// tests/edit_surface.rs

//! The `edit` surface: schema validation before any overwrite.

mod common;

use common::{experiment_through, init_tracing};

use postcorr::commands;
use postcorr::errors::PostError;
use postcorr::exp::{SourceKind, StepId};
use postcorr::store::MetadataStore;

fn seeded_store(dir: &std::path::Path) -> MetadataStore {
    let store = MetadataStore::new(dir);
    let exp = experiment_through("N19C3", StepId::Convert);
    store.save(&exp).unwrap();
    store
}

#[test]
fn editing_a_missing_experiment_is_not_found() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::new(dir.path());

    let err = commands::edit_field(&store, "N19C3", "refant", "Ef").unwrap_err();
    assert!(matches!(err, PostError::ExperimentNotFound(_)));
}

#[test]
fn unknown_fields_are_rejected() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(dir.path());

    let err = commands::edit_field(&store, "N19C3", "frobnicate", "1").unwrap_err();
    assert!(matches!(err, PostError::UnknownField(field) if field == "frobnicate"));
}

#[test]
fn an_out_of_domain_source_role_is_rejected_and_nothing_changes() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(dir.path());
    let sources_before = store.load("N19C3").unwrap().sources.clone();

    let err =
        commands::edit_field(&store, "N19C3", "source_kind", "3C274=bogus").unwrap_err();
    assert!(matches!(err, PostError::InvalidValue { field, .. } if field == "source_kind"));

    assert_eq!(store.load("N19C3").unwrap().sources, sources_before);
}

#[test]
fn a_source_role_can_be_reclassified() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(dir.path());

    commands::edit_field(&store, "N19C3", "source_kind", "3C274=calibrator").unwrap();

    let exp = store.load("N19C3").unwrap();
    let source = exp.sources.iter().find(|s| s.name == "3C274").unwrap();
    assert_eq!(source.kind, SourceKind::Calibrator);
}

#[test]
fn antenna_lists_are_validated_against_the_experiment() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(dir.path());

    // Not a station code at all.
    let err = commands::edit_field(&store, "N19C3", "refant", "Effelsberg").unwrap_err();
    assert!(matches!(err, PostError::InvalidValue { .. }));

    // Valid code, but not part of this experiment.
    let err = commands::edit_field(&store, "N19C3", "polswap", "Jb").unwrap_err();
    assert!(matches!(err, PostError::InvalidValue { .. }));

    commands::edit_field(&store, "N19C3", "polswap", "Wb,O8").unwrap();
    let exp = store.load("N19C3").unwrap();
    assert_eq!(exp.antennas.polswap(), vec!["Wb".to_string(), "O8".to_string()]);

    // A later edit overwrites the previous pick entirely.
    commands::edit_field(&store, "N19C3", "polswap", "Ef").unwrap();
    let exp = store.load("N19C3").unwrap();
    assert_eq!(exp.antennas.polswap(), vec!["Ef".to_string()]);
}

#[test]
fn plot_sources_must_belong_to_the_experiment() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(dir.path());

    let err = commands::edit_field(&store, "N19C3", "plot_sources", "3C999").unwrap_err();
    assert!(matches!(err, PostError::InvalidValue { .. }));

    commands::edit_field(&store, "N19C3", "plot_sources", "3C274").unwrap();
    assert_eq!(
        store.load("N19C3").unwrap().plot_sources,
        Some(vec!["3C274".to_string()])
    );
}

#[test]
fn mail_addresses_are_sanity_checked() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(dir.path());

    let err = commands::edit_field(&store, "N19C3", "email", "nonsense").unwrap_err();
    assert!(matches!(err, PostError::InvalidValue { .. }));

    commands::edit_field(&store, "N19C3", "email", "pi@example.com,coi@example.com").unwrap();
    assert_eq!(store.load("N19C3").unwrap().pi_emails.len(), 2);
}

#[test]
fn a_pass_can_be_excluded_from_the_pipeline() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(dir.path());

    let err = commands::edit_field(&store, "N19C3", "pipeline", "missing.lis=false").unwrap_err();
    assert!(matches!(err, PostError::InvalidValue { .. }));

    commands::edit_field(&store, "N19C3", "pipeline", "n19c3.lis=false").unwrap();
    assert!(!store.load("N19C3").unwrap().passes[0].pipeline);
}
