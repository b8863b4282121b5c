//! # ptassist CLI
//!
//! Checks public transport route relations of a JSON dataset and applies
//! membership repairs to it.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{error, warn};
use ptassist_core::{
    plan_platform_transfer, plan_replacement, CancellationToken, Dataset, Fix, FixTask,
    PrimitiveRef, RouteReport, RouteValidator, SeedPolicy, TransportMode, ValidatorConfig,
};
use std::path::{Path, PathBuf};

mod cli;

#[derive(Parser)]
#[command(name = "ptassist")]
#[command(version)]
#[command(about = "Public transport route checker and membership repair tool")]
#[command(long_about = "Validates and repairs public transport route relations:
  ptassist check routes.json                       # Check every route relation
  ptassist check routes.json -r 42 --mode tram     # Check relation 42 as a tram route
  ptassist replace routes.json --old n1 --new n2   # Hand n1's memberships to n2
  ptassist platform routes.json --stop 1 --platform 2 -o fixed.json

Without --output, editing commands only print what they would change.")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Validator configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate route relations
    Check {
        /// Dataset file (JSON)
        dataset: PathBuf,
        /// Relation to check, repeatable; defaults to every route relation
        #[arg(short, long = "relation")]
        relations: Vec<i64>,
        /// Transport mode to check against instead of each relation's route tag
        #[arg(long)]
        mode: Option<String>,
        /// Seed policy after gaps: look_ahead or forward
        #[arg(long)]
        seed_policy: Option<String>,
        /// Print reports as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replace every relation membership of one primitive with another
    Replace {
        dataset: PathBuf,
        /// Primitive to replace, e.g. node:12 or n12
        #[arg(long)]
        old: String,
        /// Replacement primitive
        #[arg(long)]
        new: String,
        /// Role for the replacement (defaults to the configured platform role)
        #[arg(long)]
        role: Option<String>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Move a stop position's tags and memberships onto a platform node
    Platform {
        dataset: PathBuf,
        /// Stop position node id
        #[arg(long)]
        stop: i64,
        /// Platform node id
        #[arg(long)]
        platform: i64,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Apply several replacements as one all-or-nothing batch
    Fix {
        dataset: PathBuf,
        /// Replacement pair OLD=NEW, repeatable
        #[arg(long = "pair", required = true)]
        pairs: Vec<String>,
        #[arg(long)]
        role: Option<String>,
        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(clap::Args)]
struct OutputArgs {
    /// Write the edited dataset here; without it nothing is written
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Overwrite an existing output file
    #[arg(short, long)]
    force: bool,
}

fn main() {
    if let Err(e) = run() {
        error!("❌ Error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging to stderr
    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    logger.target(env_logger::Target::Stderr);
    if cli.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    let config = match &cli.config {
        Some(path) => ValidatorConfig::load(path)?,
        None => ValidatorConfig::default(),
    };

    match cli.command {
        Commands::Check {
            dataset,
            relations,
            mode,
            seed_policy,
            json,
        } => {
            let mut config = config;
            if let Some(policy) = seed_policy {
                config.seed_policy = policy.parse::<SeedPolicy>()?;
            }
            let mode = mode.map(|m| m.parse::<TransportMode>()).transpose()?;
            check(&dataset, &relations, mode, config, json)
        }
        Commands::Replace {
            dataset,
            old,
            new,
            role,
            output,
        } => {
            let old: PrimitiveRef = old.parse()?;
            let new: PrimitiveRef = new.parse()?;
            let role = role.unwrap_or_else(|| config.platform_role.clone());
            replace(&dataset, old, new, &role, &output)
        }
        Commands::Platform {
            dataset,
            stop,
            platform,
            output,
        } => transfer_platform(&dataset, stop, platform, &config.platform_role, &output),
        Commands::Fix {
            dataset,
            pairs,
            role,
            output,
        } => {
            let pairs = pairs
                .iter()
                .map(String::as_str)
                .map(parse_pair)
                .collect::<Result<Vec<_>>>()?;
            let role = role.unwrap_or_else(|| config.platform_role.clone());
            fix(&dataset, &pairs, &role, &output)
        }
    }
}

fn load(path: &Path) -> Result<Dataset> {
    Dataset::load(path).with_context(|| format!("Failed to load dataset {}", path.display()))
}

/// Parse `OLD=NEW`
fn parse_pair(pair: &str) -> Result<(PrimitiveRef, PrimitiveRef)> {
    let Some((old, new)) = pair.split_once('=') else {
        bail!("Replacement pair must be in format 'OLD=NEW', got '{pair}'");
    };
    Ok((old.trim().parse()?, new.trim().parse()?))
}

/// Fail early rather than after the work when the output cannot be written
fn check_output(output: &OutputArgs) -> Result<()> {
    if let Some(path) = &output.output {
        if path.exists() && !output.force {
            bail!(
                "{} already exists, use --force to overwrite",
                path.display()
            );
        }
    }
    Ok(())
}

fn write_output(dataset: &Dataset, output: &OutputArgs) -> Result<()> {
    match &output.output {
        Some(path) => {
            dataset
                .save(path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("📁 Saved to: {}", path.display());
        }
        None => eprintln!("🔍 [DRY RUN] No --output given, nothing written"),
    }
    Ok(())
}

fn check(
    path: &Path,
    relations: &[i64],
    mode: Option<TransportMode>,
    config: ValidatorConfig,
    json: bool,
) -> Result<()> {
    let dataset = load(path)?;
    let validator = RouteValidator::new(&dataset).with_config(config);
    let ids = if relations.is_empty() {
        validator.route_relations()
    } else {
        relations.to_vec()
    };

    let mut reports = Vec::new();
    for (id, result) in ids.iter().zip(validator.validate_all(&ids, mode)) {
        match result {
            Ok(report) => reports.push(report),
            Err(e) => warn!("Skipping relation {id}: {e}"),
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            print_report(report);
        }
        let findings: usize = reports.iter().map(|r| r.findings.len()).sum();
        eprintln!("✅ Checked {} relation(s), {findings} finding(s)", reports.len());
    }
    Ok(())
}

fn print_report(report: &RouteReport) {
    let s = &report.summary;
    println!(
        "relation {} ({}): {} way(s), {} gap(s), {} illegal turn(s), {} unusable way(s){}",
        report.relation,
        report.mode,
        s.ways,
        s.gaps,
        s.illegal_turns,
        s.incompatible_ways,
        if s.incompatible_relation {
            ", not a route of this mode"
        } else {
            ""
        }
    );
    for finding in &report.findings {
        println!("  member {}: {}", finding.position, finding.kind);
    }
}

fn replace(
    path: &Path,
    old: PrimitiveRef,
    new: PrimitiveRef,
    role: &str,
    output: &OutputArgs,
) -> Result<()> {
    check_output(output)?;
    let mut dataset = load(path)?;
    let edits = plan_replacement(&dataset, old, new, role)?;

    println!("{} ({} relation(s))", edits.label, edits.len());
    for edit in &edits {
        println!(
            "  relation {}: members {:?} -> {new} as '{role}'",
            edit.relation_id(),
            edit.changed_positions()
        );
    }

    let mut tx = dataset.begin();
    tx.apply_edit_set(&edits)?;
    tx.commit();
    write_output(&dataset, output)
}

fn transfer_platform(
    path: &Path,
    stop: i64,
    platform: i64,
    role: &str,
    output: &OutputArgs,
) -> Result<()> {
    check_output(output)?;
    let mut dataset = load(path)?;
    let transfer = plan_platform_transfer(&dataset, stop, platform, role)?;

    println!(
        "Stop position {stop} -> platform {platform} ({} relation(s))",
        transfer.memberships.len()
    );
    for (key, value) in &transfer.platform_tags {
        println!("  {key}={value}");
    }

    let mut tx = dataset.begin();
    transfer.apply(&mut tx)?;
    tx.commit();
    write_output(&dataset, output)
}

fn fix(
    path: &Path,
    pairs: &[(PrimitiveRef, PrimitiveRef)],
    role: &str,
    output: &OutputArgs,
) -> Result<()> {
    check_output(output)?;
    let mut dataset = load(path)?;

    let task: FixTask = pairs
        .iter()
        .map(|&(old, new)| Fix::replacement(old, new, role))
        .collect();

    let progress = cli::ProgressManager::new(task.len(), "🔧 Applying fixes");
    let cancel = CancellationToken::new();
    let outcome = match task.run(&mut dataset, &cancel, |done, total, label| {
        progress.update(done, total, label)
    }) {
        Ok(outcome) => outcome,
        Err(e) => {
            progress.abandon("rolled back");
            return Err(e).context("Fix batch rolled back");
        }
    };
    progress.finish("done");

    eprintln!(
        "✅ Applied {} fix(es) to {} relation(s), revision {}",
        outcome.applied, outcome.relations_changed, outcome.revision
    );
    write_output(&dataset, output)
}
