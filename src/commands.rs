// src/commands.rs

//! The external command surface: `run`, `info`, `last`, `exec`, `edit`.
//!
//! Everything here translates a CLI verb into step-runner invocations or
//! direct reads/writes of the persisted experiment. Validation always
//! happens before any mutation, so a rejected command leaves the
//! persisted state untouched.

use std::str::FromStr;

use tracing::info;

use crate::config::ConfigFile;
use crate::dialog::Dialog;
use crate::errors::{PostError, Result};
use crate::exp::{antenna::is_valid_antenna_code, Credentials, Experiment, SourceKind, ToolRun};
use crate::remote::{Host, RemoteExecutor};
use crate::steps::{StepContext, StepRegistry, StepRunner};
use crate::store::MetadataStore;

/// Run a range of steps, resuming after the last completed one when no
/// explicit start is given.
#[allow(clippy::too_many_arguments)]
pub async fn run_steps(
    config: &ConfigFile,
    store: &MetadataStore,
    registry: &StepRegistry,
    remote: &dyn RemoteExecutor,
    dialog: &mut dyn Dialog,
    expname: &str,
    supsci: &str,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<()> {
    let mut exp = if store.exists(expname) {
        let exp = store.load(expname)?;
        info!(
            experiment = %exp.name(),
            last = ?exp.last_step().map(|s| s.name()),
            "restored persisted state from a previous run"
        );
        exp
    } else {
        Experiment::new(expname, supsci)
    };

    let range = match from {
        Some(from) => {
            let from = registry.lookup(from)?;
            let to = to.map(|t| registry.lookup(t)).transpose()?;
            registry.range(from, to)?
        }
        None => match exp.last_step() {
            None => registry.range(crate::exp::StepId::Setup, None)?,
            Some(last) => match registry.next_after(last) {
                Some(next) => {
                    info!(resuming_after = %last, "resuming after the last completed step");
                    registry.range(next, None)?
                }
                None => {
                    println!(
                        "{} already completed its last step ('{}'); nothing to do.",
                        exp.name(),
                        last
                    );
                    return Ok(());
                }
            },
        },
    };

    let mut ctx = StepContext {
        config,
        remote,
        dialog,
        workdir: store.dir().to_path_buf(),
    };

    let mut runner = StepRunner::new(registry, store);
    let summary = runner.run_range(&mut ctx, &mut exp, &range).await?;

    match &summary.held {
        Some((step, reason)) => {
            println!("Stopped at step '{step}' for manual work: {reason}");
            println!("Re-run once you have done your part.");
        }
        None => {
            println!(
                "Post-processing of {} finished through step '{}'.",
                exp.name(),
                range.last().map(|s| s.name()).unwrap_or("-")
            );
        }
    }

    Ok(())
}

/// Read-only report of which checkpoint-bearing steps already recorded
/// output for the experiment.
pub fn report_info(
    store: &MetadataStore,
    registry: &StepRegistry,
    expname: &str,
) -> Result<String> {
    let exp = store.load(expname)?;

    let mut out = String::new();
    out.push_str(&format!("Experiment {}", exp.name()));
    if let Some(rt) = &exp.realtime_name {
        out.push_str(&format!(" (real-time run {rt})"));
    }
    if !exp.obs_date.is_empty() {
        out.push_str(&format!(", observed {}", exp.obs_date));
    }
    out.push('\n');

    for def in registry.steps() {
        match exp.report_for(def.id) {
            Some(report) => {
                out.push_str(&format!("  [x] {:<12} {}\n", def.id.name(), report.summary()));
            }
            None => {
                out.push_str(&format!("  [ ] {}\n", def.id.name()));
            }
        }
    }

    if !exp.tool_runs.is_empty() {
        let tools: Vec<&str> = exp.tool_runs.keys().map(|k| k.as_str()).collect();
        out.push_str(&format!("  ad-hoc tool runs: {}\n", tools.join(", ")));
    }

    Ok(out)
}

/// Name of the most advanced step with recorded output, by step order.
pub fn report_last(store: &MetadataStore, expname: &str) -> Result<String> {
    let exp = store.load(expname)?;
    Ok(match exp.last_step() {
        Some(step) => step.name().to_string(),
        None => "none".to_string(),
    })
}

/// Run a single external tool directly, bypassing the step ordering.
/// When no parameters are given, defaults are derived from the persisted
/// metadata. The tool's output is recorded under its own name.
pub async fn exec_tool(
    store: &MetadataStore,
    remote: &dyn RemoteExecutor,
    expname: &str,
    tool: &str,
    params: &[String],
) -> Result<()> {
    let mut exp = store.load(expname)?;

    let args = if params.is_empty() {
        default_tool_args(&exp, tool)?
    } else {
        params.to_vec()
    };

    let host = Host::local();
    let output = remote.execute(&host, tool, &args).await?;

    print!("{}", output.stdout);
    eprint!("{}", output.stderr);

    exp.record_tool_run(ToolRun {
        command: tool.to_string(),
        args: args.clone(),
        host: host.to_string(),
        exit_code: output.exit_code,
        stdout: output.stdout.clone(),
        stderr: output.stderr.clone(),
        ran_at: chrono::Local::now().naive_local(),
    });
    store.save(&exp)?;

    if output.success() {
        Ok(())
    } else {
        Err(PostError::RemoteCommand {
            host: host.to_string(),
            command: format!("{tool} {}", args.join(" ")).trim().to_string(),
            exit_code: output.exit_code,
            stderr: output.stderr,
        })
    }
}

/// Derive the conventional arguments of a known tool from the metadata.
fn default_tool_args(exp: &Experiment, tool: &str) -> Result<Vec<String>> {
    let first_pass = || {
        exp.passes.first().ok_or_else(|| PostError::InvalidValue {
            field: "exec".to_string(),
            reason: format!("no correlator passes recorded; pass explicit parameters to {tool}"),
        })
    };

    let args = match tool {
        "standardplots" => {
            let pass = first_pass()?;
            vec![
                pass.ms_file.display().to_string(),
                exp.ref_antennas.first().cloned().unwrap_or_default(),
                exp.sources_for_plots().join(","),
            ]
        }
        "ysfocus.py" => vec![first_pass()?.ms_file.display().to_string()],
        "flag_weights.py" => {
            let pass = first_pass()?;
            let threshold = pass
                .flag_weights
                .as_ref()
                .map(|fw| fw.threshold)
                .ok_or_else(|| PostError::InvalidValue {
                    field: "exec".to_string(),
                    reason: "no flagging threshold recorded yet".to_string(),
                })?;
            vec![pass.ms_file.display().to_string(), threshold.to_string()]
        }
        "polswap.py" => {
            let pass = first_pass()?;
            vec![
                pass.ms_file.display().to_string(),
                exp.antennas.polswap().join(","),
            ]
        }
        "j2ms2" => vec!["-v".to_string(), first_pass()?.listing.display().to_string()],
        "getdata.pl" => {
            let pass = first_pass()?;
            vec![
                "-proj".to_string(),
                exp.corr_name().to_string(),
                "-lis".to_string(),
                pass.listing.display().to_string(),
            ]
        }
        "tConvert" => {
            let pass = first_pass()?;
            vec![pass.ms_file.display().to_string(), pass.fits_file.clone()]
        }
        _ => Vec::new(),
    };

    Ok(args)
}

/// Validate and overwrite one experiment field. No step is re-run.
pub fn edit_field(
    store: &MetadataStore,
    expname: &str,
    field: &str,
    value: &str,
) -> Result<()> {
    let mut exp = store.load(expname)?;

    match field.trim().to_lowercase().as_str() {
        "refant" => {
            let picked = validated_antennas(&exp, field, value, true)?;
            exp.ref_antennas = picked;
        }
        "plot_sources" | "calsources" => {
            let picked = split_values(value);
            for name in &picked {
                if !exp.sources.is_empty() && !exp.sources.iter().any(|s| &s.name == name) {
                    return Err(PostError::InvalidValue {
                        field: field.to_string(),
                        reason: format!("'{name}' is not a source of {}", exp.name()),
                    });
                }
            }
            exp.plot_sources = Some(picked);
        }
        "polswap" => set_antenna_flag(&mut exp, field, value, |a, v| a.polswap = v)?,
        "onebit" => set_antenna_flag(&mut exp, field, value, |a, v| a.onebit = v)?,
        "polconvert" => set_antenna_flag(&mut exp, field, value, |a, v| a.polconvert = v)?,
        "pi_name" => exp.pi_names = split_values(value),
        "email" => {
            let picked = split_values(value);
            for address in &picked {
                if !address.contains('@') {
                    return Err(PostError::InvalidValue {
                        field: field.to_string(),
                        reason: format!("'{address}' is not a mail address"),
                    });
                }
            }
            exp.pi_emails = picked;
        }
        "password" => {
            let username = exp
                .credentials
                .as_ref()
                .map(|c| c.username.clone())
                .unwrap_or_else(|| exp.lowname());
            exp.credentials = Some(Credentials {
                username,
                password: value.to_string(),
            });
        }
        "source_kind" => {
            let (name, kind) = value.split_once('=').ok_or_else(|| PostError::InvalidValue {
                field: field.to_string(),
                reason: "expected NAME=KIND".to_string(),
            })?;
            let kind = SourceKind::from_str(kind).map_err(|reason| PostError::InvalidValue {
                field: field.to_string(),
                reason,
            })?;
            let source = exp
                .sources
                .iter_mut()
                .find(|s| s.name == name.trim())
                .ok_or_else(|| PostError::InvalidValue {
                    field: field.to_string(),
                    reason: format!("no source named '{}'", name.trim()),
                })?;
            source.kind = kind;
        }
        "pipeline" => {
            let (listing, flag) =
                value.split_once('=').ok_or_else(|| PostError::InvalidValue {
                    field: field.to_string(),
                    reason: "expected LISTING=true|false".to_string(),
                })?;
            let flag: bool = flag.trim().parse().map_err(|_| PostError::InvalidValue {
                field: field.to_string(),
                reason: format!("'{}' is not a boolean", flag.trim()),
            })?;
            let pass = exp
                .passes
                .iter_mut()
                .find(|p| p.listing.display().to_string() == listing.trim())
                .ok_or_else(|| PostError::InvalidValue {
                    field: field.to_string(),
                    reason: format!("no pass with listing '{}'", listing.trim()),
                })?;
            pass.pipeline = flag;
        }
        other => return Err(PostError::UnknownField(other.to_string())),
    }

    store.save(&exp)?;
    info!(experiment = %exp.name(), field, value, "field updated");
    Ok(())
}

/// Parse and validate an antenna list: known-format codes, and members of
/// the experiment when its antenna set is already populated.
fn validated_antennas(
    exp: &Experiment,
    field: &str,
    value: &str,
    allow_unknown_set: bool,
) -> Result<Vec<String>> {
    let picked = split_values(value);
    if picked.is_empty() {
        return Err(PostError::InvalidValue {
            field: field.to_string(),
            reason: "empty antenna list".to_string(),
        });
    }

    for code in &picked {
        if !is_valid_antenna_code(code) {
            return Err(PostError::InvalidValue {
                field: field.to_string(),
                reason: format!("'{code}' is not a station code"),
            });
        }
        let set_known = !exp.antennas.is_empty();
        if (!allow_unknown_set || set_known) && !exp.antennas.contains(code) {
            return Err(PostError::InvalidValue {
                field: field.to_string(),
                reason: format!("antenna '{code}' is not part of {}", exp.name()),
            });
        }
    }

    Ok(picked)
}

/// Overwrite one antenna role flag: set for the listed antennas, cleared
/// everywhere else.
fn set_antenna_flag(
    exp: &mut Experiment,
    field: &str,
    value: &str,
    apply: impl Fn(&mut crate::exp::Antenna, bool),
) -> Result<()> {
    let picked = if value.trim().is_empty() {
        Vec::new()
    } else {
        validated_antennas(exp, field, value, false)?
    };

    let names = exp.antennas.names();
    for name in names {
        let member = picked.contains(&name);
        if let Some(ant) = exp.antennas.get_mut(&name) {
            apply(ant, member);
        }
    }

    Ok(())
}

fn split_values(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
