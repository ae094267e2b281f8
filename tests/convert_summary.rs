// tests/convert_summary.rs

//! The conversion step: measurement-set creation and reading the
//! observation setup back from the summary listing.

mod common;

use common::{dummy_report, init_tracing, ExperimentBuilder, FakeRemote, ScriptedDialog};

use postcorr::commands;
use postcorr::config::ConfigFile;
use postcorr::exp::{SourceKind, StepId};
use postcorr::steps::StepRegistry;
use postcorr::store::MetadataStore;

const SUMMARY: &str = "\
ms: Current MS is n19c3.ms
listTimeRange: 2019-06-12 18:30:00 -> 2019-06-12 22:29:59
listSources: 3C274, J1945+7055
listAntennas: Ef Wb O8 Tr
listFreqs: SB 0: 1626.49MHz/8MHz 32ch
listFreqs: SB 1: 1634.49MHz/8MHz 32ch
";

#[tokio::test]
async fn convert_reads_the_observation_setup_from_the_summary() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::new(dir.path());
    let registry = StepRegistry::standard();
    let cfg = ConfigFile::default();

    // Scheduled antennas only; no reference antenna picked yet.
    let mut exp = ExperimentBuilder::new("N19C3")
        .obs_date("190612")
        .antenna("Ef", false)
        .antenna("Wb", false)
        .antenna("O8", false)
        .source("3C274", SourceKind::FringeFinder, false)
        .pass("n19c3.lis", "n19c3.ms", "n19c3_1_1.IDI", true)
        .build();
    for step in [
        StepId::Setup,
        StepId::Listing,
        StepId::Checklisting,
        StepId::Fetch,
    ] {
        exp.record_report(dummy_report(step));
    }
    store.save(&exp).unwrap();

    let fake = FakeRemote::new();
    fake.respond("jplotter", SUMMARY);
    let mut dialog = ScriptedDialog::new();

    commands::run_steps(
        &cfg,
        &store,
        &registry,
        &fake,
        &mut dialog,
        "N19C3",
        "test",
        Some("convert"),
        Some("convert"),
    )
    .await
    .unwrap();

    assert_eq!(fake.calls_matching("j2ms2"), 1);

    let reloaded = store.load("N19C3").unwrap();
    let (start, end) = reloaded.time_range.unwrap();
    assert_eq!(start.format("%Y-%m-%d %H:%M").to_string(), "2019-06-12 18:30");
    assert_eq!(end.format("%H:%M").to_string(), "22:29");

    let pass = &reloaded.passes[0];
    assert_eq!(
        pass.sources,
        vec!["3C274".to_string(), "J1945+7055".to_string()]
    );

    let setup = pass.freq_setup.as_ref().unwrap();
    assert_eq!(setup.n_subbands, 2);
    assert_eq!(setup.channels, vec![32, 32]);
    assert_eq!(setup.frequencies[0].len(), 32);
    assert!((setup.bandwidths[0] - 8.0e6).abs() < 1e-3);

    // Tr appeared in the data without being scheduled; it is now known
    // and observed, and the reference antenna came from the priority
    // list.
    assert!(reloaded.antennas.observed().contains(&"Tr".to_string()));
    assert_eq!(reloaded.ref_antennas, vec!["Ef".to_string()]);
}
