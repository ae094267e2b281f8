// src/steps/processing.rs

//! Steps running on the processing machine: environment setup, data
//! retrieval, conversion to measurement sets, plotting, measurement-set
//! operations, archive-format conversion and archiving.

use anyhow::anyhow;
use chrono::NaiveDateTime;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::dialog::{ask_antennas, ask_threshold, CheckAnswer, Dialog as _};
use crate::errors::{PostError, Result};
use crate::exp::{Antenna, Credentials, Experiment, FlagWeight, SourceKind, StepReport, Subbands};
use crate::remote::Host;
use crate::steps::correlator::{self, copy_endpoint};
use crate::steps::{StepContext, StepOutcome};

/// Set up the working environment: catalogue lookup, directories here and
/// on the pipeline host, the already-existing experiment files, the
/// summary parse and the archive credentials.
pub(crate) async fn setup(ctx: &mut StepContext<'_>, exp: &mut Experiment) -> Result<StepOutcome> {
    correlator::catalogue_lookup(ctx, exp).await?;

    // Record what existed before this run touches anything.
    let letter_existed = ctx.workdir.join(letter_name(exp)).exists();
    let listing_existed = !ctx.local_files_ending_with(".lis")?.is_empty();
    exp.letter_existed = letter_existed;
    exp.listing_existed = listing_existed;

    std::fs::create_dir_all(ctx.workdir.join("logs"))?;

    let pipe = ctx.pipeline_host();
    let root = &ctx.config.paths.pipeline_root;
    let low = exp.lowname();
    ctx.run(
        &pipe,
        &format!(
            "mkdir -p {root}/in/{low} {root}/out/{low} {root}/in/{}/{low}",
            exp.supsci
        ),
        &[],
    )
    .await?;

    fetch_seed_files(ctx, exp).await?;

    let expsum = std::fs::read_to_string(ctx.workdir.join(format!("{low}.expsum")))?;
    exp.apply_expsum(&expsum)?;

    let credentials_set = ensure_credentials(ctx, exp).await?;

    Ok(StepOutcome::Done(StepReport::Setup {
        obs_date: exp.obs_date.clone(),
        realtime_name: exp.realtime_name.clone(),
        letter_existed,
        listing_existed,
        credentials_set,
    }))
}

/// Retrieve the correlated data for every pass.
pub(crate) async fn fetch(ctx: &mut StepContext<'_>, exp: &mut Experiment) -> Result<StepOutcome> {
    require_passes(exp)?;

    for pass in &exp.passes {
        let listing = pass.listing.display().to_string();
        ctx.run(
            &Host::local(),
            "getdata.pl",
            &["-proj", exp.corr_name(), "-lis", &listing],
        )
        .await?;
    }

    Ok(StepOutcome::Done(StepReport::Fetch {
        passes_fetched: exp.passes.len(),
    }))
}

/// Convert every pass to a measurement set and read the observation setup
/// (time range, sources, antennas, frequency layout) back from it.
pub(crate) async fn convert(ctx: &mut StepContext<'_>, exp: &mut Experiment) -> Result<StepOutcome> {
    require_passes(exp)?;

    let renaming_needed = exp
        .realtime_name
        .as_ref()
        .is_some_and(|rt| rt.as_str() != exp.name());

    let mut measurement_sets = Vec::new();
    let passes = exp.passes.clone();

    for (i, pass) in passes.iter().enumerate() {
        let listing = pass.listing.display().to_string();
        let ms = pass.ms_file.display().to_string();

        if !ctx.workdir.join(&pass.ms_file).exists() {
            ctx.run(&Host::local(), "j2ms2", &["-v", &listing]).await?;
        }

        if renaming_needed {
            ctx.run(&Host::local(), "expname.py", &[&ms, exp.name()])
                .await?;
        }

        let summary = ctx
            .run(&Host::local(), &format!("echo \"ms {ms};r\" | jplotter"), &[])
            .await?;
        apply_ms_summary(exp, i, &summary.stdout)?;

        measurement_sets.push(ms);
    }

    pick_reference_antenna(ctx, exp);

    Ok(StepOutcome::Done(StepReport::Convert { measurement_sets }))
}

/// Produce the standard plots for every pipelined pass and let the
/// operator review them. A `repeat` answer redoes the plots, optionally
/// with a different source pick.
pub(crate) async fn plot(ctx: &mut StepContext<'_>, exp: &mut Experiment) -> Result<StepOutcome> {
    require_passes(exp)?;

    let mut sources = exp.sources_for_plots();
    if sources.is_empty() {
        let answer = ctx
            .dialog
            .ask_text("No fringe finders found. Sources to use for the standard plots?")?;
        sources = split_list(&answer);
        exp.plot_sources = Some(sources.clone());
    }

    let refant = reference_antenna_argument(exp)?;
    let joined = sources.join(",");

    let mut first = true;
    for pass in exp.passes.iter().filter(|p| p.pipeline) {
        let ms = pass.ms_file.display().to_string();
        if first {
            ctx.run(
                &Host::local(),
                "standardplots",
                &["-weight", &ms, &refant, &joined],
            )
            .await?;
            first = false;
        } else {
            ctx.run(&Host::local(), "standardplots", &[&ms, &refant, &joined])
                .await?;
        }
    }

    let plot_files = plot_files_for(ctx, exp)?;
    if plot_files.is_empty() {
        return Err(PostError::Other(anyhow!(
            "standard plots for {} not found but expected",
            exp.name()
        )));
    }

    if ctx.config.defaults.open_plots {
        for file in &plot_files {
            if let Err(err) = ctx.run_unchecked(&Host::local(), "gv", &[file]).await {
                warn!(plot = %file, error = %err, "could not open plot; open it manually");
            }
        }
    }

    match ctx
        .dialog
        .checkpoint("Inspect the standard plots. Accept, abort, or repeat them?")?
    {
        CheckAnswer::Ok => Ok(StepOutcome::Done(StepReport::Plot {
            plot_files,
            sources,
        })),
        CheckAnswer::Repeat => {
            let answer = ctx.dialog.ask_text(
                "Sources to use for the repeated plots (empty keeps the current pick)?",
            )?;
            if !answer.trim().is_empty() {
                exp.plot_sources = Some(split_list(&answer));
            }
            Ok(StepOutcome::Repeat)
        }
        CheckAnswer::Abort => Err(PostError::UserAborted("plot".to_string())),
    }
}

/// Measurement-set operations: the operator provides the weight threshold
/// and the antenna fix lists, then the corresponding tools run on every
/// pass and the cover letter placeholders are filled in.
pub(crate) async fn msops(ctx: &mut StepContext<'_>, exp: &mut Experiment) -> Result<StepOutcome> {
    require_passes(exp)?;

    let threshold = ask_threshold(
        ctx.dialog,
        "Threshold for flagging weights in the measurement sets [0, 1)?",
    )?;
    let polswap = ask_antennas(
        ctx.dialog,
        &exp.antennas,
        "Antennas needing a polarization swap (comma or space separated, empty for none)?",
    )?;
    let onebit = ask_antennas(
        ctx.dialog,
        &exp.antennas,
        "Antennas that recorded one-bit data?",
    )?;
    let polconvert = ask_antennas(
        ctx.dialog,
        &exp.antennas,
        "Antennas needing polarization conversion?",
    )?;

    for name in &polswap {
        if let Some(ant) = exp.antennas.get_mut(name) {
            ant.polswap = true;
        }
    }
    for name in &onebit {
        if let Some(ant) = exp.antennas.get_mut(name) {
            ant.onebit = true;
        }
    }
    for name in &polconvert {
        if let Some(ant) = exp.antennas.get_mut(name) {
            ant.polconvert = true;
        }
    }
    for pass in &mut exp.passes {
        pass.flag_weights = Some(FlagWeight::new(threshold));
    }

    let mut flagged_percent = -1.0;
    let passes = exp.passes.clone();
    for (i, pass) in passes.iter().enumerate() {
        let ms = pass.ms_file.display().to_string();

        ctx.run(&Host::local(), "ysfocus.py", &[&ms]).await?;

        if !polswap.is_empty() {
            ctx.run(&Host::local(), "polswap.py", &[&ms, &polswap.join(",")])
                .await?;
        }

        let output = ctx
            .run(
                &Host::local(),
                "flag_weights.py",
                &[&ms, &threshold.to_string()],
            )
            .await?;
        if let Some(percent) = parse_flagged_percent(&output.stdout) {
            if let Some(fw) = &mut exp.passes[i].flag_weights {
                fw.percentage = percent;
            }
            flagged_percent = percent;
        }

        if !onebit.is_empty() {
            ctx.run(&Host::local(), "scale1bit.py", &[&ms, &onebit.join(" ")])
                .await?;
        }
    }

    update_cover_letter(ctx, exp, threshold, flagged_percent)?;

    // Refresh the plots so they show the data without the flagged drops.
    let refant = reference_antenna_argument(exp)?;
    let joined = exp.sources_for_plots().join(",");
    for pass in exp.passes.iter().filter(|p| p.pipeline) {
        let ms = pass.ms_file.display().to_string();
        ctx.run(&Host::local(), "standardplots", &[&ms, &refant, &joined])
            .await?;
    }

    Ok(StepOutcome::Done(StepReport::Msops {
        threshold,
        flagged_percent,
        polswap,
        onebit,
        polconvert,
    }))
}

/// Convert every pass to the archive format. When any antenna needs a
/// polarization conversion, the run holds after preparing the conversion
/// inputs: that tool is driven manually.
pub(crate) async fn fitsidi(ctx: &mut StepContext<'_>, exp: &mut Experiment) -> Result<StepOutcome> {
    require_passes(exp)?;

    let mut fits_files = Vec::new();
    for pass in &exp.passes {
        let ms = pass.ms_file.display().to_string();
        let existing = ctx.local_files_ending_with("")?;
        let already_there = existing.iter().any(|f| f.starts_with(&pass.fits_file));

        if !already_there {
            ctx.run(&Host::local(), "tConvert", &[&ms, &pass.fits_file])
                .await?;
        }
        fits_files.push(pass.fits_file.clone());
    }

    let converters = exp.antennas.polconvert();
    if !converters.is_empty() {
        let inputs = ctx.workdir.join("polconvert_inputs.ini");
        if !inputs.exists() {
            ctx.run(
                &Host::local(),
                "cp",
                &["~/polconvert/polconvert_inputs.ini", "polconvert_inputs.ini"],
            )
            .await?;
        }

        return Ok(StepOutcome::Hold(format!(
            "polarization conversion required for {}: edit polconvert_inputs.ini, run \
             polconvert.py, then re-run this step",
            converters.join(", ")
        )));
    }

    Ok(StepOutcome::Done(StepReport::Fitsidi { fits_files }))
}

/// Archive the plots and data products, protecting them with the
/// experiment credentials when there are any.
pub(crate) async fn archive(ctx: &mut StepContext<'_>, exp: &mut Experiment) -> Result<StepOutcome> {
    let mut archived = Vec::new();

    if !plot_files_for(ctx, exp)?.is_empty() {
        ctx.run(&Host::local(), "gzip", &["*ps"]).await?;
    }

    if let Some(creds) = &exp.credentials {
        run_archive(
            ctx,
            exp,
            "-auth",
            &format!("-n {} -p {}", creds.username, creds.password),
        )
        .await?;
        archived.push("auth".to_string());
    }

    run_archive(ctx, exp, "-stnd", "*ps.gz").await?;
    archived.push("plots".to_string());
    run_archive(ctx, exp, "-fits", "*IDI*").await?;
    archived.push("fits".to_string());

    Ok(StepOutcome::Done(StepReport::Archive { archived }))
}

/// `archive.pl FLAG -e {exp}_{obsdate} REST`.
pub(crate) async fn run_archive(
    ctx: &StepContext<'_>,
    exp: &Experiment,
    flag: &str,
    rest: &str,
) -> Result<()> {
    let tag = format!("{}_{}", exp.lowname(), exp.obs_date);
    ctx.run(&Host::local(), "archive.pl", &[flag, "-e", &tag, rest])
        .await?;
    Ok(())
}

async fn fetch_seed_files(ctx: &StepContext<'_>, exp: &mut Experiment) -> Result<()> {
    let low = exp.lowname();
    let corr_low = exp.corr_name().to_lowercase();
    let workdir = ctx.workdir.display().to_string();

    // Observation description from the correlator.
    let vix_local = ctx.workdir.join(format!("{low}.vix"));
    if !vix_local.exists() {
        let host = ctx.correlator();
        let from = copy_endpoint(
            &host,
            &format!(
                "{}/{}/{corr_low}.vix",
                ctx.config.paths.correlator_exp_dir,
                exp.corr_name()
            ),
        );
        ctx.copy(&from, &vix_local.display().to_string()).await?;
    }

    // Experiment summary and cover letter from the archive host.
    let arch = ctx.archive_host();
    for ext in ["expsum", "piletter"] {
        let local = ctx.workdir.join(format!("{low}.{ext}"));
        if !local.exists() {
            let from = copy_endpoint(&arch, &format!("piletters/{low}.{ext}"));
            ctx.copy(&from, &local.display().to_string()).await?;
        }
    }

    // Schedule files from the logs host are nice to have; the session may
    // not carry them.
    if let Some(session) = exp.session_dir() {
        let logs = ctx.logs_host();
        for ext in ["key", "sum"] {
            let local = ctx.workdir.join(format!("{low}.{ext}"));
            if local.exists() {
                continue;
            }
            let from = copy_endpoint(
                &logs,
                &format!("{}/{session}/{low}.{ext}", ctx.config.paths.log_archive_dir),
            );
            if let Err(err) = ctx.copy(&from, &workdir).await {
                warn!(ext, error = %err, "schedule file not retrieved; continuing without it");
            }
        }
    }

    Ok(())
}

/// Experiments under the old naming scheme (test and network-monitoring
/// names) are public and carry no credentials; anything else gets a
/// generated password and its access note.
async fn ensure_credentials(ctx: &StepContext<'_>, exp: &mut Experiment) -> Result<bool> {
    if exp.name().starts_with('N') || exp.name().starts_with('F') {
        info!(experiment = %exp.name(), "public experiment; no credentials set");
        return Ok(false);
    }

    if exp.credentials.is_some() {
        return Ok(true);
    }

    // An auth marker left by a previous (manual) run wins over a fresh
    // password.
    let markers: Vec<String> = ctx
        .local_files_ending_with(".auth")?
        .into_iter()
        .filter(|f| f.contains('_'))
        .collect();

    let creds = match markers.as_slice() {
        [] => {
            let password: String = uuid::Uuid::new_v4().simple().to_string()[..12].to_string();
            let creds = Credentials {
                username: exp.lowname(),
                password,
            };
            let marker = format!("{}_{}.auth", creds.username, creds.password);
            std::fs::write(ctx.workdir.join(&marker), "")?;
            ctx.notebook(&format!("touch {marker}"));
            creds
        }
        [single] => {
            let stem = single.trim_end_matches(".auth");
            let (username, password) = stem.split_once('_').ok_or_else(|| {
                PostError::Other(anyhow!("malformed auth marker file name '{single}'"))
            })?;
            Credentials {
                username: username.to_string(),
                password: password.to_string(),
            }
        }
        _ => {
            return Err(PostError::Other(anyhow!(
                "more than one auth marker file in {}",
                ctx.workdir.display()
            )));
        }
    };

    exp.credentials = Some(creds);

    // The access note accompanies the credentials on the archive.
    ctx.run(&Host::local(), "pipelet.py", &[&exp.lowname(), &exp.supsci])
        .await?;

    Ok(true)
}

fn require_passes(exp: &Experiment) -> Result<()> {
    if exp.passes.is_empty() {
        return Err(PostError::Other(anyhow!(
            "no correlator passes recorded for {}; the listing step has not produced any",
            exp.name()
        )));
    }
    Ok(())
}

fn letter_name(exp: &Experiment) -> String {
    format!("{}.piletter", exp.lowname())
}

fn split_list(answer: &str) -> Vec<String> {
    let sep = if answer.contains(',') { ',' } else { ' ' };
    answer
        .split(sep)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// The reference antenna argument for the plotting tool: one name, or an
/// alternation over the picked ones.
fn reference_antenna_argument(exp: &Experiment) -> Result<String> {
    match exp.ref_antennas.as_slice() {
        [] => Err(PostError::InvalidValue {
            field: "refant".to_string(),
            reason: "no reference antenna picked; set one with 'edit refant ...'".to_string(),
        }),
        [single] => Ok(single.clone()),
        several => Ok(format!("({})", several.join("|"))),
    }
}

fn pick_reference_antenna(ctx: &StepContext<'_>, exp: &mut Experiment) {
    if !exp.ref_antennas.is_empty() {
        return;
    }

    for candidate in &ctx.config.defaults.ref_antenna_priority {
        if exp
            .antennas
            .get(candidate)
            .is_some_and(|a| a.observed)
        {
            exp.ref_antennas = vec![candidate.clone()];
            info!(refant = %candidate, "reference antenna picked from the priority list");
            return;
        }
    }

    debug!("no priority antenna observed; reference antenna left unset");
}

fn plot_files_for(ctx: &StepContext<'_>, exp: &Experiment) -> Result<Vec<String>> {
    let low = exp.lowname();
    Ok(ctx
        .local_files_ending_with(".ps")?
        .into_iter()
        .filter(|f| {
            f.starts_with(&low)
                && ["weight", "auto", "cross", "ampphase"]
                    .iter()
                    .any(|t| f.contains(t))
        })
        .collect())
}

/// Pull the flagged-data percentage out of the flagging tool's report
/// line (`... 2.88% data with non-zero weights ...`).
fn parse_flagged_percent(output: &str) -> Option<f64> {
    let re = Regex::new(r"([0-9]+(?:\.[0-9]+)?)%\s*data with non-zero").ok()?;
    re.captures(output)?.get(1)?.as_str().parse().ok()
}

/// Fill the weight-cutoff placeholders in the cover letter and drop the
/// trailing epoch character from the project code line.
fn update_cover_letter(
    ctx: &StepContext<'_>,
    exp: &Experiment,
    threshold: f64,
    percent: f64,
) -> Result<()> {
    let path = ctx.workdir.join(letter_name(exp));
    if !path.exists() {
        warn!(letter = %path.display(), "cover letter not found; skipping the update");
        return Ok(());
    }

    let contents = std::fs::read_to_string(&path)?;
    let mut lines = Vec::new();
    for line in contents.lines() {
        let mut updated = line.to_string();

        if updated.contains("derived from the following EVN project code(s):")
            && exp.name().ends_with(|c: char| c.is_ascii_alphabetic())
        {
            let code = exp.name();
            updated = updated.replace(code, &code[..code.len() - 1]);
        }

        if updated.contains("***SuppSci:") || updated.contains("there is one***") {
            continue;
        }

        updated = updated.replace("***weight cutoff***", &format!("{threshold:.2}"));
        updated = updated.replace("***percent flagged***", &format!("{percent:.2}"));
        lines.push(updated);
    }

    std::fs::write(&path, lines.join("\n") + "\n")?;
    ctx.notebook(&format!("# updated {}", letter_name(exp)));
    Ok(())
}

/// Apply one pass's `jplotter` summary (`listTimeRange`, `listSources`,
/// `listAntennas`, `listFreqs` lines) to the experiment.
fn apply_ms_summary(exp: &mut Experiment, pass_index: usize, output: &str) -> Result<()> {
    let time_re = Regex::new(
        r"listTimeRange:\s*(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2})\s*->\s*(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2})",
    )
    .expect("static regex");
    let freq_re = Regex::new(r"listFreqs:\s*SB\s*(\d+):\s*([0-9.]+)MHz/([0-9.]+)MHz\s+(\d+)ch")
        .expect("static regex");

    let mut channels = Vec::new();
    let mut frequencies = Vec::new();
    let mut bandwidths = Vec::new();

    for line in output.lines() {
        if let Some(caps) = time_re.captures(line) {
            let start = NaiveDateTime::parse_from_str(&caps[1], "%Y-%m-%d %H:%M:%S");
            let end = NaiveDateTime::parse_from_str(&caps[2], "%Y-%m-%d %H:%M:%S");
            if let (Ok(start), Ok(end)) = (start, end) {
                exp.time_range = Some((start, end));
            }
        } else if let Some(rest) = line.strip_prefix("listSources:") {
            let names = split_list(rest);
            // Every pass source must be known at the experiment level. A
            // source the summary did not announce stays protected until
            // someone reclassifies it.
            for name in &names {
                if !exp.sources.iter().any(|s| &s.name == name) {
                    warn!(source = %name, "source seen in the data but not in the summary");
                    exp.sources
                        .push(crate::exp::Source::new(name.clone(), SourceKind::Other, true));
                }
            }
            exp.passes[pass_index].sources = names;
        } else if let Some(rest) = line.strip_prefix("listAntennas:") {
            for code in rest.split([',', ' ']).filter(|s| !s.trim().is_empty()) {
                let code = code.trim();
                match exp.antennas.get_mut(code) {
                    Some(ant) => ant.observed = true,
                    None => {
                        let mut ant = Antenna::scheduled(code);
                        ant.observed = true;
                        exp.antennas.upsert(ant);
                    }
                }
            }
        } else if let Some(caps) = freq_re.captures(line) {
            let ref_freq: f64 = caps[2].parse().unwrap_or(0.0);
            let bandwidth: f64 = caps[3].parse().unwrap_or(0.0);
            let n_chan: usize = caps[4].parse().unwrap_or(0);

            let spacing = if n_chan > 0 {
                bandwidth / n_chan as f64
            } else {
                0.0
            };
            let row: Vec<f64> = (0..n_chan)
                .map(|c| (ref_freq + c as f64 * spacing) * 1e6)
                .collect();

            channels.push(n_chan);
            frequencies.push(row);
            bandwidths.push(bandwidth * 1e6);
        }
    }

    if !channels.is_empty() {
        exp.passes[pass_index].freq_setup = Some(Subbands::new(channels, frequencies, bandwidths)?);
    }

    Ok(())
}
