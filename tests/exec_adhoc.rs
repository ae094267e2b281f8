// tests/exec_adhoc.rs

//! The ad-hoc `exec` surface: one tool straight through the executor,
//! outside the step ordering.

mod common;

use common::{experiment_through, init_tracing, FakeRemote};

use postcorr::commands;
use postcorr::errors::PostError;
use postcorr::exp::StepId;
use postcorr::store::MetadataStore;

#[tokio::test]
async fn exec_derives_parameters_from_the_metadata_and_records_the_run() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::new(dir.path());
    let exp = experiment_through("N19C3", StepId::Convert);
    store.save(&exp).unwrap();

    let fake = FakeRemote::new();
    fake.respond("standardplots", "plots written");

    commands::exec_tool(&store, &fake, "N19C3", "standardplots", &[])
        .await
        .unwrap();

    let calls = fake.calls();
    assert!(calls[0].contains("standardplots n19c3.ms Ef 3C274"));

    let reloaded = store.load("N19C3").unwrap();
    let run = reloaded.tool_runs.get("standardplots").unwrap();
    assert_eq!(run.exit_code, 0);
    assert_eq!(run.stdout, "plots written");

    // The step ordering is untouched.
    assert_eq!(reloaded.last_step(), Some(StepId::Convert));
}

#[tokio::test]
async fn a_failing_tool_is_surfaced_but_its_output_is_still_recorded() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::new(dir.path());
    let exp = experiment_through("N19C3", StepId::Convert);
    store.save(&exp).unwrap();

    let fake = FakeRemote::new();
    fake.fail("flag_weights.py", 2, "weights table missing");

    let err = commands::exec_tool(
        &store,
        &fake,
        "N19C3",
        "flag_weights.py",
        &["n19c3.ms".to_string(), "0.9".to_string()],
    )
    .await
    .unwrap_err();

    assert!(matches!(err, PostError::RemoteCommand { exit_code: 2, .. }));

    let run = store
        .load("N19C3")
        .unwrap()
        .tool_runs
        .get("flag_weights.py")
        .cloned()
        .unwrap();
    assert_eq!(run.exit_code, 2);
    assert!(run.stderr.contains("weights table missing"));
}

#[tokio::test]
async fn exec_on_a_fresh_experiment_is_not_found() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::new(dir.path());
    let fake = FakeRemote::new();

    let err = commands::exec_tool(&store, &fake, "N19C3", "uptime", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, PostError::ExperimentNotFound(_)));
}
