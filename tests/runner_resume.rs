// tests/runner_resume.rs

//! Resume semantics: fresh experiments, step ranges, preconditions and
//! re-runs over the persisted record.

mod common;

use common::{experiment_through, init_tracing, write_file, FakeRemote, ScriptedDialog};

use postcorr::commands;
use postcorr::config::ConfigFile;
use postcorr::errors::PostError;
use postcorr::exp::{StepId, StepReport};
use postcorr::steps::StepRegistry;
use postcorr::store::MetadataStore;

const EXPSUM: &str = "\
Principal Investigator: Surname  (pi@example.com)
scheduled telescopes: Ef Wb O8
src = 3C274, type = fringefinder (fringe finder), use = YES (freely available)
src = J1945+7055, type = target (the target), use = NO (protected)
";

#[test]
fn info_on_a_fresh_experiment_is_not_found() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::new(dir.path());
    let registry = StepRegistry::standard();

    let err = commands::report_info(&store, &registry, "N19C3").unwrap_err();
    assert!(matches!(err, PostError::ExperimentNotFound(_)));
}

#[tokio::test]
async fn first_two_steps_run_in_order_and_become_the_history() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::new(dir.path());
    let registry = StepRegistry::standard();
    let cfg = ConfigFile::default();

    // Files that "already exist" before the run.
    write_file(dir.path(), "n19c3.expsum", EXPSUM);
    write_file(dir.path(), "n19c3.piletter", "Dear PI,\n");
    write_file(
        dir.path(),
        "n19c3.lis",
        "n19c3.vix n19c3.ms n19c3.ms.UVF PROD\n+ job 1\n+ job 2\n",
    );

    let fake = FakeRemote::new();
    fake.respond("grep", "N19C3 20190612\n");
    let mut dialog = ScriptedDialog::new();

    commands::run_steps(
        &cfg,
        &store,
        &registry,
        &fake,
        &mut dialog,
        "n19c3",
        "test",
        Some("setup"),
        Some("listing"),
    )
    .await
    .unwrap();

    assert_eq!(commands::report_last(&store, "N19C3").unwrap(), "listing");

    let info = commands::report_info(&store, &registry, "N19C3").unwrap();
    assert!(info.contains("[x] setup"));
    assert!(info.contains("[x] listing"));
    assert!(info.contains("[ ] checklisting"));
    assert!(info.contains("[ ] convert"));

    let exp = store.load("N19C3").unwrap();
    assert_eq!(exp.obs_date, "190612");
    assert_eq!(exp.pi_names, vec!["Surname".to_string()]);
    assert_eq!(exp.passes.len(), 1);
    assert!(exp.passes[0].pipeline);
    assert!(exp.sources.iter().any(|s| s.name == "J1945+7055" && s.protected));
    assert!(exp.letter_existed);
    assert!(exp.listing_existed);

    // The catalogue was consulted before anything else ran.
    let calls = fake.calls();
    assert!(calls[0].contains("grep"));
}

#[tokio::test]
async fn skipping_a_step_violates_its_precondition_and_mutates_nothing() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::new(dir.path());
    let registry = StepRegistry::standard();
    let cfg = ConfigFile::default();

    let exp = experiment_through("N19C3", StepId::Listing);
    store.save(&exp).unwrap();

    let on_disk_before = std::fs::read_to_string(store.path_for("N19C3")).unwrap();
    let info_before = commands::report_info(&store, &registry, "N19C3").unwrap();

    let fake = FakeRemote::new();
    let mut dialog = ScriptedDialog::new();

    // 'fetch' needs 'checklisting', which never ran.
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

    assert!(matches!(
        err,
        PostError::PreconditionNotMet { ref step, ref missing }
            if step == "fetch" && missing == "checklisting"
    ));

    let on_disk_after = std::fs::read_to_string(store.path_for("N19C3")).unwrap();
    assert_eq!(on_disk_before, on_disk_after);
    assert_eq!(
        info_before,
        commands::report_info(&store, &registry, "N19C3").unwrap()
    );
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn rerunning_a_succeeded_step_overwrites_only_its_own_output() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::new(dir.path());
    let registry = StepRegistry::standard();
    let cfg = ConfigFile::default();

    let mut exp = experiment_through("N19C3", StepId::Checklisting);
    exp.record_report(StepReport::Fetch { passes_fetched: 7 });
    store.save(&exp).unwrap();

    let others_before: Vec<_> = exp
        .stored_outputs()
        .iter()
        .filter(|(id, _)| **id != StepId::Fetch)
        .map(|(id, report)| (*id, report.clone()))
        .collect();

    let fake = FakeRemote::new();
    let mut dialog = ScriptedDialog::new();

    commands::run_steps(
        &cfg,
        &store,
        &registry,
        &fake,
        &mut dialog,
        "N19C3",
        "test",
        Some("fetch"),
        Some("fetch"),
    )
    .await
    .unwrap();

    let reloaded = store.load("N19C3").unwrap();
    assert_eq!(
        reloaded.report_for(StepId::Fetch),
        Some(&StepReport::Fetch { passes_fetched: 1 })
    );

    let others_after: Vec<_> = reloaded
        .stored_outputs()
        .iter()
        .filter(|(id, _)| **id != StepId::Fetch)
        .map(|(id, report)| (*id, report.clone()))
        .collect();
    assert_eq!(others_before, others_after);

    assert_eq!(fake.calls_matching("getdata.pl"), 1);
}

#[tokio::test]
async fn unknown_step_names_and_reversed_ranges_are_rejected_before_running() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::new(dir.path());
    let registry = StepRegistry::standard();
    let cfg = ConfigFile::default();

    let fake = FakeRemote::new();
    let mut dialog = ScriptedDialog::new();

    let err = commands::run_steps(
        &cfg,
        &store,
        &registry,
        &fake,
        &mut dialog,
        "N19C3",
        "test",
        Some("discombobulate"),
        None,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, PostError::UnknownStep(_)));

    let err = commands::run_steps(
        &cfg,
        &store,
        &registry,
        &fake,
        &mut dialog,
        "N19C3",
        "test",
        Some("archive"),
        Some("plot"),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, PostError::InvalidStepRange { .. }));

    assert!(fake.calls().is_empty());
    assert!(!store.exists("N19C3"));
}
