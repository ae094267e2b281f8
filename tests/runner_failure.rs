// tests/runner_failure.rs

//! Failure contract: a failing step leaks no partial output, an abort is
//! a clean terminal state, and a hold stops the run without recording
//! the held step.

mod common;

use common::{experiment_through, init_tracing, FakeRemote, ScriptedDialog};

use postcorr::commands;
use postcorr::config::ConfigFile;
use postcorr::errors::PostError;
use postcorr::exp::StepId;
use postcorr::steps::StepRegistry;
use postcorr::store::MetadataStore;

#[tokio::test]
async fn a_failing_step_leaves_the_stored_outputs_untouched() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::new(dir.path());
    let registry = StepRegistry::standard();
    let cfg = ConfigFile::default();

    let exp = experiment_through("N19C3", StepId::Checklisting);
    store.save(&exp).unwrap();
    let outputs_before = exp.stored_outputs().clone();

    let fake = FakeRemote::new();
    fake.fail("getdata.pl", 3, "disk full on the correlator");
    let mut dialog = ScriptedDialog::new();

    let err = commands::run_steps(
        &cfg,
        &store,
        &registry,
        &fake,
        &mut dialog,
        "N19C3",
        "test",
        Some("fetch"),
        None,
    )
    .await
    .unwrap_err();

    match err {
        PostError::RemoteCommand {
            exit_code, stderr, ..
        } => {
            assert_eq!(exit_code, 3);
            assert!(stderr.contains("disk full"));
        }
        other => panic!("expected a RemoteCommand error, got {other}"),
    }

    let reloaded = store.load("N19C3").unwrap();
    assert_eq!(reloaded.stored_outputs(), &outputs_before);
    assert!(!reloaded.has_completed(StepId::Fetch));
}

#[tokio::test]
async fn a_mid_range_failure_keeps_the_earlier_steps_of_the_same_run() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::new(dir.path());
    let registry = StepRegistry::standard();
    let cfg = ConfigFile::default();

    let exp = experiment_through("N19C3", StepId::Checklisting);
    store.save(&exp).unwrap();

    // fetch succeeds, convert blows up on the converter.
    let fake = FakeRemote::new();
    fake.fail("j2ms2", 1, "cannot open listing");
    let mut dialog = ScriptedDialog::new();

    let err = commands::run_steps(
        &cfg,
        &store,
        &registry,
        &fake,
        &mut dialog,
        "N19C3",
        "test",
        Some("fetch"),
        Some("convert"),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, PostError::RemoteCommand { .. }));

    let reloaded = store.load("N19C3").unwrap();
    assert!(reloaded.has_completed(StepId::Fetch));
    assert!(!reloaded.has_completed(StepId::Convert));
    assert_eq!(commands::report_last(&store, "N19C3").unwrap(), "fetch");
}

#[tokio::test]
async fn aborting_at_the_listing_checkpoint_is_clean_and_records_nothing() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::new(dir.path());
    let registry = StepRegistry::standard();
    let cfg = ConfigFile::default();

    let exp = experiment_through("N19C3", StepId::Listing);
    store.save(&exp).unwrap();

    let fake = FakeRemote::new();
    fake.respond(
        "checklis.py",
        "First scan = 1\nMissing scan No0007\nLast scan = 91\n",
    );
    let mut dialog = ScriptedDialog::with_answers(&["abort"]);

    let err = commands::run_steps(
        &cfg,
        &store,
        &registry,
        &fake,
        &mut dialog,
        "N19C3",
        "test",
        Some("checklisting"),
        Some("checklisting"),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, PostError::UserAborted(step) if step == "checklisting"));
    assert!(!store.load("N19C3").unwrap().has_completed(StepId::Checklisting));
}

#[tokio::test]
async fn a_repeat_answer_revalidates_the_hand_edited_listing() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::new(dir.path());
    let registry = StepRegistry::standard();
    let cfg = ConfigFile::default();

    let exp = experiment_through("N19C3", StepId::Listing);
    store.save(&exp).unwrap();

    let fake = FakeRemote::new();
    fake.respond(
        "checklis.py",
        "First scan = 1\nDuplicated scan No0004\nLast scan = 91\n",
    );
    // First validation is rejected, the re-validation accepted.
    let mut dialog = ScriptedDialog::with_answers(&["repeat", "ok"]);

    commands::run_steps(
        &cfg,
        &store,
        &registry,
        &fake,
        &mut dialog,
        "N19C3",
        "test",
        Some("checklisting"),
        Some("checklisting"),
    )
    .await
    .unwrap();

    assert_eq!(fake.calls_matching("checklis.py"), 2);
    assert!(store.load("N19C3").unwrap().has_completed(StepId::Checklisting));
}

#[tokio::test]
async fn polarization_conversion_holds_the_run_without_recording_the_step() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::new(dir.path());
    let registry = StepRegistry::standard();
    let cfg = ConfigFile::default();

    let mut exp = experiment_through("N19C3", StepId::Msops);
    exp.antennas.get_mut("Wb").unwrap().polconvert = true;
    store.save(&exp).unwrap();

    let fake = FakeRemote::new();
    let mut dialog = ScriptedDialog::new();

    // A hold is a clean stop, not an error.
    commands::run_steps(
        &cfg,
        &store,
        &registry,
        &fake,
        &mut dialog,
        "N19C3",
        "test",
        Some("fitsidi"),
        None,
    )
    .await
    .unwrap();

    assert_eq!(fake.calls_matching("tConvert"), 1);
    let reloaded = store.load("N19C3").unwrap();
    assert!(!reloaded.has_completed(StepId::Fitsidi));
    assert_eq!(commands::report_last(&store, "N19C3").unwrap(), "msops");
}
