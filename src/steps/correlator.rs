// src/steps/correlator.rs

//! Steps talking to the correlator host: catalogue lookup, creation and
//! retrieval of the file listings, and the listing check.

use std::path::Path;

use anyhow::anyhow;
use tracing::{debug, info, warn};

use crate::dialog::{CheckAnswer, Dialog as _};
use crate::errors::{PostError, Result};
use crate::exp::{CorrelatorPass, Experiment, StepReport};
use crate::steps::{StepContext, StepOutcome};

/// Look the experiment up in the correlator catalogue: observation date
/// and, for experiments observed inside a real-time run, the run name.
pub(crate) async fn catalogue_lookup(ctx: &StepContext<'_>, exp: &mut Experiment) -> Result<()> {
    let host = ctx.correlator();
    let catalogue = &ctx.config.paths.catalogue;

    let output = ctx
        .run(&host, "grep", &[exp.name(), catalogue])
        .await
        .map_err(|err| match err {
            PostError::RemoteCommand { .. } => PostError::ExperimentNotFound(format!(
                "{} (not present in the correlator catalogue)",
                exp.name()
            )),
            other => other,
        })?;

    let (obs_date, realtime) = parse_catalogue(&output.stdout, exp.name())?;
    exp.obs_date = obs_date;
    exp.realtime_name = realtime;

    info!(
        experiment = %exp.name(),
        obs_date = %exp.obs_date,
        realtime = ?exp.realtime_name,
        "catalogue lookup done"
    );
    Ok(())
}

/// Parse the catalogue lines for one experiment.
///
/// One line (`EXP YYYYMMDD ...`) is a stand-alone experiment. Two lines
/// mean the experiment was observed inside a real-time run: one line
/// carries `EXP EPOCH`, the other the run name with its member list.
fn parse_catalogue(output: &str, expname: &str) -> Result<(String, Option<String>)> {
    let lines: Vec<Vec<&str>> = output
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.split_whitespace().collect())
        .collect();

    match lines.len() {
        1 => {
            let fields = &lines[0];
            if fields.len() < 2 {
                return Err(PostError::Other(anyhow!(
                    "malformed catalogue line for {expname}: '{}'",
                    output.trim()
                )));
            }
            // More than two fields: this is a run line and the experiment
            // was the first of its real-time run (same name).
            let realtime = if fields.len() > 2 {
                Some(fields[0].to_string())
            } else {
                None
            };
            Ok((short_date(fields[1]), realtime))
        }
        2 => {
            let mut obs_date = String::new();
            let mut realtime = None;
            for fields in &lines {
                if fields[0] == expname {
                    if fields.len() > 1 {
                        obs_date = short_date(fields[1]);
                    }
                } else {
                    realtime = Some(fields[0].to_string());
                }
            }
            if obs_date.is_empty() {
                return Err(PostError::Other(anyhow!(
                    "catalogue lines for {expname} carry no epoch"
                )));
            }
            Ok((obs_date, realtime))
        }
        _ => Err(PostError::ExperimentNotFound(format!(
            "{expname} (no unique catalogue entry)"
        ))),
    }
}

/// Catalogue epochs are YYYYMMDD; the rest of the tooling uses YYMMDD.
fn short_date(epoch: &str) -> String {
    if epoch.len() == 8 {
        epoch[2..].to_string()
    } else {
        epoch.to_string()
    }
}

/// Create the file listings on the correlator host when they do not exist
/// yet, copy them into the working directory and derive the correlator
/// passes from their headers.
pub(crate) async fn listing(ctx: &mut StepContext<'_>, exp: &mut Experiment) -> Result<StepOutcome> {
    let host = ctx.correlator();
    let corr = exp.corr_name().to_string();
    let corr_low = corr.to_lowercase();
    let remote_dir = format!("{}/{}", ctx.config.paths.correlator_exp_dir, corr);

    if ctx.local_files_ending_with(".lis")?.is_empty() {
        let remote_glob = format!("{remote_dir}/{corr_low}*.lis");
        if !ctx.file_exists(&host, &remote_glob).await? {
            info!(experiment = %exp.name(), "creating file listings on the correlator");
            ctx.run(&host, &format!("cd {remote_dir} && make_lis -e {corr}"), &[])
                .await?;
        }

        let from = copy_endpoint(&host, &remote_glob);
        ctx.copy(&from, &ctx.workdir.display().to_string()).await?;
    }

    let mut listings = ctx.local_files_ending_with(".lis")?;
    if listings.is_empty() {
        return Err(PostError::Other(anyhow!(
            "no file listings found for {} after retrieval",
            exp.name()
        )));
    }

    // Real-time runs produce listings under the run name; rename them and
    // rewrite their header references to this experiment.
    if corr != exp.name() {
        for name in &listings {
            rewrite_listing_names(&ctx.workdir.join(name), &corr, exp.name())?;
            let renamed = name.replace(&corr_low, &exp.lowname());
            if renamed != *name {
                std::fs::rename(ctx.workdir.join(name), ctx.workdir.join(&renamed))?;
                ctx.notebook(&format!("mv {name} {renamed}"));
            }
        }
        listings = ctx.local_files_ending_with(".lis")?;
    }

    let passes = derive_passes(ctx, exp, &listings)?;
    if passes.is_empty() {
        return Err(PostError::Other(anyhow!(
            "listings for {} carry no measurement-set header",
            exp.name()
        )));
    }

    let n = passes.len();
    exp.passes = passes;

    Ok(StepOutcome::Done(StepReport::Listing {
        listings,
        passes: n,
    }))
}

/// Run the listing checker on every pass and let the operator decide what
/// to do when something looks wrong. This is the manual-edit checkpoint:
/// the operator may hand-edit a listing and ask for a re-validation.
pub(crate) async fn checklisting(
    ctx: &mut StepContext<'_>,
    exp: &mut Experiment,
) -> Result<StepOutcome> {
    let mut issues = Vec::new();

    for pass in &exp.passes {
        let listing = pass.listing.display().to_string();
        let output = ctx
            .run_unchecked(&crate::remote::Host::local(), "checklis.py", &[&listing])
            .await?;

        // The checker prints first/last scan plus one line per problem.
        let meaningful: Vec<&str> = output
            .stdout
            .lines()
            .filter(|l| !l.trim().is_empty())
            .collect();

        if !output.success() || meaningful.len() > 2 {
            for line in &meaningful {
                ctx.notebook(&format!("# {line}"));
            }
            issues.push(format!("{listing}: {}", meaningful.join(" | ")));
        }
    }

    if exp.realtime_name.is_some() {
        warn!(
            experiment = %exp.name(),
            "experiment belongs to a real-time run; the listings usually need a manual edit"
        );
    }

    if issues.is_empty() && exp.realtime_name.is_none() {
        debug!(experiment = %exp.name(), "listings are clean");
        return Ok(StepOutcome::Done(StepReport::Checklisting { issues }));
    }

    for issue in &issues {
        eprintln!("listing issue: {issue}");
    }

    match ctx.dialog.checkpoint(
        "Inspect (and hand-edit if needed) the file listings. Accept them, abort, or re-validate?",
    )? {
        CheckAnswer::Ok => Ok(StepOutcome::Done(StepReport::Checklisting { issues })),
        CheckAnswer::Repeat => Ok(StepOutcome::Repeat),
        CheckAnswer::Abort => Err(PostError::UserAborted("checklisting".to_string())),
    }
}

/// Build the scp endpoint string for a path on `host`.
pub(crate) fn copy_endpoint(host: &crate::remote::Host, path: &str) -> String {
    if host.is_local() {
        path.to_string()
    } else {
        format!("{}:{path}", host.as_str())
    }
}

/// Rewrite the header lines of a listing that still refer to the
/// real-time run name. Job lines (starting with `+`/`-`) keep their
/// original correlator-output references.
fn rewrite_listing_names(path: &Path, oldname: &str, newname: &str) -> Result<()> {
    let contents = std::fs::read_to_string(path)?;
    let mut lines = Vec::new();

    for line in contents.lines() {
        if line.starts_with('+') || line.starts_with('-') {
            lines.push(line.to_string());
        } else {
            lines.push(
                line.replace(oldname, newname)
                    .replace(&oldname.to_lowercase(), &newname.to_lowercase()),
            );
        }
    }

    std::fs::write(path, lines.join("\n") + "\n")?;
    Ok(())
}

/// Read the header of every listing and derive one correlator pass per
/// file: the measurement set it produces, the archive-format file name
/// and whether the pass feeds the pipeline.
fn derive_passes(
    ctx: &StepContext<'_>,
    exp: &Experiment,
    listings: &[String],
) -> Result<Vec<CorrelatorPass>> {
    let has_line_pass = listings.iter().any(|l| l.contains("_line"));
    let mut passes = Vec::new();

    for (i, name) in listings.iter().enumerate() {
        let contents = std::fs::read_to_string(ctx.workdir.join(name))?;
        let Some(header) = contents.lines().find(|l| l.contains(".ms")) else {
            continue;
        };

        let Some(ms_name) = header
            .split_whitespace()
            .find(|t| t.contains(".ms") && !t.contains(".UVF"))
        else {
            continue;
        };

        let (fits_name, pipeline) = match header.split_whitespace().find(|t| t.contains(".IDI")) {
            Some(existing) => {
                let feeds = existing.split('_').rev().nth(1) == Some("1") || has_line_pass;
                (existing.to_string(), feeds)
            }
            None if has_line_pass => {
                let n = if name.contains("_line") { 2 } else { 1 };
                (format!("{}_{n}_1.IDI", exp.lowname()), true)
            }
            None => (format!("{}_{}_1.IDI", exp.lowname(), i + 1), i == 0),
        };

        // Point the old UVF output reference at the archive-format name.
        if header.contains(".UVF") {
            let updated = contents.replace(&format!("{ms_name}.UVF"), &fits_name);
            std::fs::write(ctx.workdir.join(name), updated)?;
            ctx.notebook(&format!("# {name}: UVF output replaced by {fits_name}"));
        }

        passes.push(CorrelatorPass::new(name, ms_name, fits_name, pipeline));
    }

    Ok(passes)
}
