use std::{env, fs, path::PathBuf, process};

use anyhow::{Context, bail};
use gltf_validator::{ValidationOptions, load_validation_options, validate_file};
use log::info;

const USAGE: &str = "Usage: gltf-validator <input.gltf|input.glb> [--config <options.json>] \
                     [--max-issues N] [--ignore CODE]... [--output <report.json>]";

fn main() {
    env_logger::init();

    match run() {
        Ok(has_errors) => process::exit(if has_errors { 1 } else { 0 }),
        Err(err) => {
            eprintln!("{err:#}");
            process::exit(1);
        }
    }
}

struct Args {
    input: PathBuf,
    config: Option<PathBuf>,
    max_issues: Option<usize>,
    ignored: Vec<String>,
    output: Option<PathBuf>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> anyhow::Result<Args> {
    let mut input = None;
    let mut config = None;
    let mut max_issues = None;
    let mut ignored = Vec::new();
    let mut output = None;

    while let Some(arg) = args.next() {
        let mut value =
            |flag: &str| args.next().with_context(|| format!("{flag} requires a value"));
        match arg.as_str() {
            "--config" => config = Some(PathBuf::from(value("--config")?)),
            "--max-issues" => {
                let raw = value("--max-issues")?;
                max_issues = Some(
                    raw.parse()
                        .with_context(|| format!("invalid --max-issues value: {raw}"))?,
                );
            }
            "--ignore" => ignored.push(value("--ignore")?),
            "--output" => output = Some(PathBuf::from(value("--output")?)),
            flag if flag.starts_with("--") => bail!("unknown option: {flag}\n{USAGE}"),
            _ if input.is_none() => input = Some(PathBuf::from(&arg)),
            _ => bail!("unexpected argument: {arg}\n{USAGE}"),
        }
    }

    Ok(Args {
        input: input.with_context(|| USAGE.to_string())?,
        config,
        max_issues,
        ignored,
        output,
    })
}

/// Returns whether the report contains errors.
fn run() -> anyhow::Result<bool> {
    let args = parse_args(env::args().skip(1))?;

    let mut options = match &args.config {
        Some(path) => load_validation_options(path)?,
        None => ValidationOptions::default(),
    };
    if let Some(max_issues) = args.max_issues {
        options.max_issues = max_issues;
    }
    options.ignored_issues.extend(args.ignored);

    let report = validate_file(&args.input, &options)?;
    let json = serde_json::to_string_pretty(&report).context("failed to serialize report")?;
    info!("Validated {}", args.input.display());

    match &args.output {
        Some(path) => {
            fs::write(path, json)
                .with_context(|| format!("failed to write report: {}", path.display()))?;
            println!("Report: {}", path.display());
            println!(
                "Errors: {}, Warnings: {}, Infos: {}{}",
                report.issues.num_errors,
                report.issues.num_warnings,
                report.issues.num_infos,
                if report.issues.truncated { " (truncated)" } else { "" }
            );
        }
        None => println!("{json}"),
    }

    Ok(report.has_errors())
}
