// src/steps/pipeline.rs

//! Steps running against the calibration pipeline host: station file
//! collection, pipeline input preparation, the pipeline run itself and
//! the closing bookkeeping.

use anyhow::anyhow;
use tracing::{info, warn};

use crate::dialog::Dialog as _;
use crate::errors::{PostError, Result};
use crate::exp::{Experiment, StepReport};
use crate::steps::correlator::copy_endpoint;
use crate::steps::processing::run_archive;
use crate::steps::{StepContext, StepOutcome};

/// Collect the station calibration (antab) and log files from the logs
/// host into the pipeline input directory and record which antennas have
/// them. Holds until the merged calibration file exists: merging is the
/// operator's editor session.
pub(crate) async fn antab(ctx: &mut StepContext<'_>, exp: &mut Experiment) -> Result<StepOutcome> {
    let pipe = ctx.pipeline_host();
    let logs = ctx.logs_host();
    let low = exp.lowname();
    let session = exp.session_dir().ok_or_else(|| {
        PostError::Other(anyhow!(
            "observation date unknown for {}; the setup step has not run",
            exp.name()
        ))
    })?;

    let in_dir = format!(
        "{}/in/{}/{low}",
        ctx.config.paths.pipeline_root, exp.supsci
    );

    for ext in ["flag", "log", "antabfs"] {
        let source = copy_endpoint(
            &logs,
            &format!("{}/{session}/{low}*.{ext}", ctx.config.paths.log_archive_dir),
        );
        let fetched = ctx
            .run_unchecked(&pipe, &format!("cd {in_dir} && scp {source} ."), &[])
            .await?;
        if !fetched.success() {
            warn!(ext, "no {ext} files retrieved from the logs host");
        }
    }

    for (ext, mark_log) in [("log", true), ("antabfs", false)] {
        let listing = ctx
            .run_unchecked(&pipe, &format!("ls {in_dir}/{low}*.{ext}"), &[])
            .await?;
        for file in listing.stdout.lines().filter(|l| !l.trim().is_empty()) {
            let Some(code) = antenna_from_filename(file, &low, ext) else {
                continue;
            };
            match exp.antennas.get_mut(&code) {
                Some(ant) => {
                    if mark_log {
                        ant.logs_found = true;
                    } else {
                        ant.antab_found = true;
                    }
                }
                None => warn!(
                    antenna = %code,
                    "station file for an antenna the summary does not know; ignoring"
                ),
            }
        }
    }

    let logs_found = exp.antennas.logs_found();
    let antab_found = exp.antennas.antab_found();
    let missing = exp.antennas.observed_missing(|a| a.antab_found);

    ctx.notebook(&format!("# antab files found for: {}", antab_found.join(", ")));
    if !missing.is_empty() {
        ctx.notebook(&format!("# antab files missing for: {}", missing.join(", ")));
    }

    let merged = format!(
        "{}/in/{low}/{low}.antab",
        ctx.config.paths.pipeline_root
    );
    if !ctx.file_exists(&pipe, &merged).await? {
        return Ok(StepOutcome::Hold(format!(
            "merged calibration file {merged} not found; run antab_editor.py on the \
             pipeline host, then re-run this step"
        )));
    }

    Ok(StepOutcome::Done(StepReport::Antab {
        logs_found,
        antab_found,
        missing,
    }))
}

/// Prepare the pipeline inputs: the flagging template derived from the
/// station logs and the pipeline input file.
pub(crate) async fn pipeinputs(
    ctx: &mut StepContext<'_>,
    exp: &mut Experiment,
) -> Result<StepOutcome> {
    let pipe = ctx.pipeline_host();
    let root = &ctx.config.paths.pipeline_root;
    let low = exp.lowname();
    let in_dir = format!("{root}/in/{}/{low}", exp.supsci);

    ctx.run(&pipe, &format!("cd {in_dir} && uvflgall.csh"), &[])
        .await?;

    let uvflg = format!("{low}.uvflg");
    let input = format!("{low}.inp.txt");
    ctx.run(
        &pipe,
        &format!("cp {in_dir}/{uvflg} {root}/in/{low}/{uvflg}"),
        &[],
    )
    .await?;
    ctx.run(
        &pipe,
        &format!("cp {root}/in/template.inp {root}/in/{low}/{input}"),
        &[],
    )
    .await?;
    ctx.run(
        &pipe,
        &format!("sed -i 's/experiment_name/{low}/g' {root}/in/{low}/{input}"),
        &[],
    )
    .await?;

    Ok(StepOutcome::Done(StepReport::Pipeinputs {
        input_files: vec![uvflg, input],
    }))
}

/// Run the calibration pipeline for every pass marked as pipelined.
pub(crate) async fn run_pipeline(
    ctx: &mut StepContext<'_>,
    exp: &mut Experiment,
) -> Result<StepOutcome> {
    let pipe = ctx.pipeline_host();
    let root = &ctx.config.paths.pipeline_root;
    let low = exp.lowname();

    let pipelined: Vec<usize> = exp
        .passes
        .iter()
        .enumerate()
        .filter(|(_, p)| p.pipeline)
        .map(|(i, _)| i)
        .collect();

    if pipelined.is_empty() {
        return Err(PostError::Other(anyhow!(
            "no pass of {} is marked for the pipeline",
            exp.name()
        )));
    }

    for (n, _) in pipelined.iter().enumerate() {
        let input = if n == 0 {
            format!("{low}.inp.txt")
        } else {
            format!("{low}_{}.inp.txt", n + 1)
        };
        info!(input = %input, "running the calibration pipeline");
        ctx.run(&pipe, &format!("cd {root}/in/{low} && EVN.py {input}"), &[])
            .await?;
    }

    Ok(StepOutcome::Done(StepReport::Pipeline {
        passes_run: pipelined.len(),
    }))
}

/// Post-pipeline bookkeeping: calibration-table comments, station
/// feedback, archiving the pipeline output, and the mandatory review.
pub(crate) async fn postpipe(
    ctx: &mut StepContext<'_>,
    exp: &mut Experiment,
) -> Result<StepOutcome> {
    let pipe = ctx.pipeline_host();
    let low = exp.lowname();

    ctx.run(&pipe, &format!("comment_tasav_file.py {low}"), &[])
        .await?;
    ctx.run(
        &pipe,
        &format!("feedback.pl -exp '{low}' -jss '{}'", exp.supsci),
        &[],
    )
    .await?;

    run_archive(ctx, exp, "-pipe", "").await?;

    if !ctx
        .dialog
        .confirm("Have you reviewed the pipeline results (plots and calibration tables)?")?
    {
        return Ok(StepOutcome::Hold(
            "review the pipeline output, then re-run this step".to_string(),
        ));
    }

    Ok(StepOutcome::Done(StepReport::Postpipe { reviewed: true }))
}

/// Final step: the updated cover letter goes to the archive and the
/// notification addresses are reported. The record itself stays as the
/// audit trail.
pub(crate) async fn finalize(
    ctx: &mut StepContext<'_>,
    exp: &mut Experiment,
) -> Result<StepOutcome> {
    if !ctx
        .dialog
        .confirm("Have you updated the cover letter with the run's particulars?")?
    {
        return Ok(StepOutcome::Hold(
            "update the cover letter, then re-run this step".to_string(),
        ));
    }

    run_archive(ctx, exp, "-stnd", &format!("{}.piletter", exp.lowname())).await?;

    // Protected sources stay out of outward-facing products.
    let public: Vec<&str> = exp
        .sources
        .iter()
        .filter(|s| !s.protected)
        .map(|s| s.name.as_str())
        .collect();

    for (name, email) in exp.pi_names.iter().zip(exp.pi_emails.iter()) {
        println!("Send the cover and access letters to {name} <{email}>.");
    }
    println!("Sources quotable in the letters: {}.", public.join(", "));

    Ok(StepOutcome::Done(StepReport::Finalize {
        notified: exp.pi_emails.clone(),
    }))
}

/// `n19c3ef.antabfs` → `Ef`.
fn antenna_from_filename(path: &str, lowname: &str, ext: &str) -> Option<String> {
    let file = path.rsplit('/').next()?;
    let stem = file.strip_suffix(&format!(".{ext}"))?;
    let code = stem.strip_prefix(lowname)?;
    if code.is_empty() {
        return None;
    }
    let mut chars = code.chars();
    let first = chars.next()?.to_uppercase().to_string();
    Some(first + &chars.as_str().to_lowercase())
}
