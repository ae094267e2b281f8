// tests/plot_review.rs

//! The plotting review gate: accepting, repeating with another source
//! pick, and the recorded result of the accepted attempt.

mod common;

use common::{experiment_through, init_tracing, write_file, FakeRemote, ScriptedDialog};

use postcorr::commands;
use postcorr::config::ConfigFile;
use postcorr::exp::{StepId, StepReport};
use postcorr::steps::StepRegistry;
use postcorr::store::MetadataStore;

fn quiet_config() -> ConfigFile {
    let mut cfg = ConfigFile::default();
    cfg.defaults.open_plots = false;
    cfg
}

#[tokio::test]
async fn accepted_plots_record_the_sources_that_were_used() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::new(dir.path());
    let registry = StepRegistry::standard();
    let cfg = quiet_config();

    let exp = experiment_through("N19C3", StepId::Convert);
    store.save(&exp).unwrap();
    write_file(dir.path(), "n19c3-weight-0.ps", "%PS");
    write_file(dir.path(), "n19c3-ampphase-0.ps", "%PS");

    let fake = FakeRemote::new();
    let mut dialog = ScriptedDialog::with_answers(&["ok"]);

    commands::run_steps(
        &cfg,
        &store,
        &registry,
        &fake,
        &mut dialog,
        "N19C3",
        "test",
        Some("plot"),
        Some("plot"),
    )
    .await
    .unwrap();

    assert_eq!(fake.calls_matching("standardplots"), 1);

    let reloaded = store.load("N19C3").unwrap();
    match reloaded.report_for(StepId::Plot).unwrap() {
        StepReport::Plot { plot_files, sources } => {
            assert_eq!(sources, &vec!["3C274".to_string()]);
            assert_eq!(plot_files.len(), 2);
        }
        other => panic!("unexpected report {other:?}"),
    }
}

#[tokio::test]
async fn a_repeat_answer_replots_and_only_the_second_attempt_is_recorded() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::new(dir.path());
    let registry = StepRegistry::standard();
    let cfg = quiet_config();

    let exp = experiment_through("N19C3", StepId::Convert);
    store.save(&exp).unwrap();
    write_file(dir.path(), "n19c3-weight-0.ps", "%PS");

    let fake = FakeRemote::new();
    // Reject the first plots asking for another calibrator, accept the
    // second attempt.
    let mut dialog = ScriptedDialog::with_answers(&["repeat", "3C345", "ok"]);

    commands::run_steps(
        &cfg,
        &store,
        &registry,
        &fake,
        &mut dialog,
        "N19C3",
        "test",
        Some("plot"),
        Some("plot"),
    )
    .await
    .unwrap();

    // The plotting tool ran once per attempt.
    assert_eq!(fake.calls_matching("standardplots"), 2);

    let calls = fake.calls();
    let plot_calls: Vec<&String> = calls
        .iter()
        .filter(|c| c.contains("standardplots"))
        .collect();
    assert!(plot_calls[0].contains("3C274"));
    assert!(plot_calls[1].contains("3C345"));

    // Only the accepted attempt is in the record.
    let reloaded = store.load("N19C3").unwrap();
    match reloaded.report_for(StepId::Plot).unwrap() {
        StepReport::Plot { sources, .. } => {
            assert_eq!(sources, &vec!["3C345".to_string()]);
        }
        other => panic!("unexpected report {other:?}"),
    }
}
