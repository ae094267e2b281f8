#![allow(dead_code)]

pub use postcorr_test_utils::builders::ExperimentBuilder;
pub use postcorr_test_utils::fake_remote::FakeRemote;
pub use postcorr_test_utils::init_tracing;
pub use postcorr_test_utils::scripted_dialog::ScriptedDialog;

use postcorr::exp::{Experiment, SourceKind, StepId, StepReport};

/// A dummy report for any step, used to seed an experiment's history up
/// to a given point without running the real steps.
pub fn dummy_report(step: StepId) -> StepReport {
    match step {
        StepId::Setup => StepReport::Setup {
            obs_date: "190612".to_string(),
            realtime_name: None,
            letter_existed: false,
            listing_existed: false,
            credentials_set: false,
        },
        StepId::Listing => StepReport::Listing {
            listings: vec!["n19c3.lis".to_string()],
            passes: 1,
        },
        StepId::Checklisting => StepReport::Checklisting { issues: vec![] },
        StepId::Fetch => StepReport::Fetch { passes_fetched: 1 },
        StepId::Convert => StepReport::Convert {
            measurement_sets: vec!["n19c3.ms".to_string()],
        },
        StepId::Plot => StepReport::Plot {
            plot_files: vec!["n19c3-weight-0.ps".to_string()],
            sources: vec!["3C274".to_string()],
        },
        StepId::Msops => StepReport::Msops {
            threshold: 0.9,
            flagged_percent: 2.5,
            polswap: vec![],
            onebit: vec![],
            polconvert: vec![],
        },
        StepId::Fitsidi => StepReport::Fitsidi {
            fits_files: vec!["n19c3_1_1.IDI".to_string()],
        },
        StepId::Archive => StepReport::Archive {
            archived: vec!["plots".to_string(), "fits".to_string()],
        },
        StepId::Antab => StepReport::Antab {
            logs_found: vec!["Ef".to_string()],
            antab_found: vec!["Ef".to_string()],
            missing: vec![],
        },
        StepId::Pipeinputs => StepReport::Pipeinputs {
            input_files: vec!["n19c3.inp.txt".to_string()],
        },
        StepId::Pipeline => StepReport::Pipeline { passes_run: 1 },
        StepId::Postpipe => StepReport::Postpipe { reviewed: true },
        StepId::Finalize => StepReport::Finalize { notified: vec![] },
    }
}

/// A small but realistic experiment with history recorded through
/// `upto` (inclusive).
pub fn experiment_through(name: &str, upto: StepId) -> Experiment {
    let mut exp = ExperimentBuilder::new(name)
        .obs_date("190612")
        .antenna("Ef", true)
        .antenna("Wb", true)
        .antenna("O8", true)
        .refant("Ef")
        .source("3C274", SourceKind::FringeFinder, false)
        .source("J1945+7055", SourceKind::Target, true)
        .pass(
            &format!("{}.lis", name.to_lowercase()),
            &format!("{}.ms", name.to_lowercase()),
            &format!("{}_1_1.IDI", name.to_lowercase()),
            true,
        )
        .pi("Surname", "pi@example.com")
        .build();

    for step in StepId::ALL {
        if step > upto {
            break;
        }
        exp.record_report(dummy_report(step));
    }

    exp
}

/// Write a file into the working directory.
pub fn write_file(dir: &std::path::Path, name: &str, contents: &str) {
    std::fs::write(dir.join(name), contents).expect("write test file");
}
