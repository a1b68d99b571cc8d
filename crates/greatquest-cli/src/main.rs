mod manifest;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use greatquest::chunks::Chunk;
use greatquest::script::{CauseType, ExecutedEffect, ScriptContext, ScriptEngine, Trigger};
use greatquest::session::ResolutionMiss;
use greatquest::toc::TocGroup;
use greatquest::{Container, LoadConfig, LoadSession, NameHash, ScriptConfig};
use serde::Serialize;

use crate::manifest::{load_manifest, MANIFEST_NAME};

#[derive(Parser)]
#[command(name = "greatquest", about = "Inspect and check Great Quest chunked resource files")]
struct Cli {
    /// Log more (-v for debug, -vv for trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Checks to relax: strict-toc, strict-arity, sort-warnings, parallel.
    #[arg(long = "skip-check", global = true, value_delimiter = ',')]
    skip_checks: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the chunks of a container.
    Info {
        file: PathBuf,
    },
    /// Print a container as JSON.
    Dump {
        file: PathBuf,
    },
    /// Load every container of a manifest as one session and report unresolved references.
    Validate {
        #[arg(long, default_value = MANIFEST_NAME)]
        manifest: PathBuf,
    },
    /// Load and save a container, checking that the bytes are unchanged.
    Roundtrip {
        file: PathBuf,
        /// Write the re-encoded container here.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the name hash of each argument.
    Hash {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Fire a trigger at a container's scripts and print the effects that ran.
    Fire {
        file: PathBuf,
        /// Cause type name, e.g. Level or Event.
        #[arg(long)]
        trigger: String,
        /// Entity the trigger concerns: a resource name or a 0x-prefixed hash.
        #[arg(long)]
        subject: Option<String>,
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        sub: i32,
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        value: i32,
        /// Take load and script options from this session manifest.
        #[arg(long)]
        manifest: Option<PathBuf>,
        /// Overrides the manifest's `max_cascade`.
        #[arg(long)]
        max_cascade: Option<usize>,
    },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(skip_checks: &[String]) -> LoadConfig {
    let skip: Vec<&str> = skip_checks.iter().map(String::as_str).collect();
    LoadConfig::from_skip_list(&skip)
}

fn read_container(path: &Path, config: &LoadConfig) -> Result<Container> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Container::load(&bytes, config).with_context(|| format!("failed to load {}", path.display()))
}

fn cmd_info(path: &Path, config: &LoadConfig) -> Result<()> {
    let container = read_container(path, config)?;
    println!("{}: {} chunks in {} groups", path.display(), container.registry().len(), container.groups().len());
    println!("{:>10}  {:<16} {:<8}  name", "offset", "kind", "hash");
    for group in container.groups() {
        println!("-- group '{}' ({} resources)", group.name, group.members.len());
        for hash in &group.members {
            let Some(chunk) = container.resolve(*hash) else {
                continue;
            };
            let offset = chunk.offset.map_or_else(|| "-".to_string(), |o| format!("{o:#x}"));
            println!("{offset:>10}  {:<16} {}  {}", chunk.kind.name(), chunk.hash, chunk.name);
        }
    }
    for miss in container.misses() {
        println!(
            "unresolved {}.{} -> {}",
            container.names().display(miss.owner),
            miss.field,
            miss.target
        );
    }
    Ok(())
}

#[derive(Serialize)]
struct ContainerDump<'a> {
    label: &'a str,
    groups: &'a [TocGroup],
    chunks: Vec<&'a Chunk>,
    misses: &'a [ResolutionMiss],
}

fn cmd_dump(path: &Path, config: &LoadConfig) -> Result<()> {
    let container = read_container(path, config)?;
    let label = path.to_string_lossy();
    let dump = ContainerDump {
        label: &label,
        groups: container.groups(),
        chunks: container.chunks().collect(),
        misses: container.misses(),
    };
    println!("{}", serde_json::to_string_pretty(&dump)?);
    Ok(())
}

fn cmd_validate(manifest_path: &Path, skip_checks: &[String]) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let manifest = load_manifest(manifest_path, &cwd)?;
    let mut config = manifest.config.clone();
    if !skip_checks.is_empty() {
        config = load_config(skip_checks);
    }

    let mut session = LoadSession::new(config);
    for path in &manifest.containers {
        session
            .add_file(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
    }
    let archive = session.finish().context("session failed to load")?;

    let mut misses = 0;
    for container in archive.containers() {
        println!("{}: {} chunks", container.label(), container.registry().len());
        for miss in container.misses() {
            misses += 1;
            println!(
                "  {} {}.{} -> {} (not found)",
                miss.tag,
                container.names().display(miss.owner),
                miss.field,
                miss.target
            );
        }
    }
    println!("{} containers, {misses} unresolved optional references", archive.containers().len());
    Ok(())
}

fn cmd_roundtrip(path: &Path, output: Option<&Path>, config: &LoadConfig) -> Result<()> {
    let original = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let container = Container::load(&original, config).with_context(|| format!("failed to load {}", path.display()))?;
    let saved = container.save().context("failed to re-encode container")?;

    if let Some(output) = output {
        std::fs::write(output, &saved).with_context(|| format!("failed to write {}", output.display()))?;
    }
    if saved != original {
        let first = saved
            .iter()
            .zip(&original)
            .position(|(a, b)| a != b)
            .unwrap_or_else(|| saved.len().min(original.len()));
        bail!(
            "re-encoded container differs at offset {first:#x} ({} bytes vs {} original)",
            saved.len(),
            original.len()
        );
    }
    println!("{}: {} bytes round-trip unchanged", path.display(), original.len());
    Ok(())
}

fn cmd_hash(names: &[String]) {
    for name in names {
        println!("{}  {name}", NameHash::of(name));
    }
}

fn parse_subject(subject: &str) -> Result<NameHash> {
    match subject.strip_prefix("0x").or_else(|| subject.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16)
            .map(NameHash)
            .with_context(|| format!("invalid hash: {subject}")),
        None => Ok(NameHash::of(subject)),
    }
}

#[derive(Serialize)]
struct FireReport<'a> {
    executed: &'a [ExecutedEffect],
    context: &'a ScriptContext,
}

struct FireArgs<'a> {
    trigger: &'a str,
    subject: Option<&'a str>,
    sub: i32,
    value: i32,
    manifest: Option<&'a Path>,
    max_cascade: Option<usize>,
}

/// Options for `fire`: the manifest's, then `--skip-check` and `--max-cascade` on top.
fn fire_options(
    manifest: Option<&Path>,
    cwd: &Path,
    skip_checks: &[String],
    max_cascade: Option<usize>,
) -> Result<(LoadConfig, ScriptConfig)> {
    let (mut config, mut script_config) = match manifest {
        Some(manifest) => {
            let manifest = load_manifest(manifest, cwd)?;
            (manifest.config, manifest.script)
        }
        None => (LoadConfig::default(), ScriptConfig::default()),
    };
    if !skip_checks.is_empty() {
        config = load_config(skip_checks);
    }
    if let Some(max) = max_cascade {
        script_config.max_cascade = max;
    }
    Ok((config, script_config))
}

fn cmd_fire(path: &Path, args: FireArgs<'_>, skip_checks: &[String]) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let (config, script_config) = fire_options(args.manifest, &cwd, skip_checks, args.max_cascade)?;

    let container = read_container(path, &config)?;
    let Some((owner, scripts)) = container.script_list() else {
        bail!("{} has no script list", path.display());
    };
    let Some(cause) = CauseType::from_name(args.trigger) else {
        bail!("unknown trigger type: {}", args.trigger);
    };

    let mut trigger = Trigger::new(cause).with_sub(args.sub).with_value(args.value);
    if let Some(subject) = args.subject {
        trigger = trigger.on(parse_subject(subject)?);
    }
    let engine = ScriptEngine::new(scripts, owner, script_config);
    let mut ctx = ScriptContext::new();
    let executed = engine.fire(trigger, &mut ctx)?;
    let report = FireReport {
        executed: &executed,
        context: &ctx,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = load_config(&cli.skip_checks);

    match &cli.command {
        Command::Info { file } => cmd_info(file, &config),
        Command::Dump { file } => cmd_dump(file, &config),
        Command::Validate { manifest } => cmd_validate(manifest, &cli.skip_checks),
        Command::Roundtrip { file, output } => cmd_roundtrip(file, output.as_deref(), &config),
        Command::Hash { names } => {
            cmd_hash(names);
            Ok(())
        }
        Command::Fire {
            file,
            trigger,
            subject,
            sub,
            value,
            manifest,
            max_cascade,
        } => cmd_fire(
            file,
            FireArgs {
                trigger,
                subject: subject.as_deref(),
                sub: *sub,
                value: *value,
                manifest: manifest.as_deref(),
                max_cascade: *max_cascade,
            },
            &cli.skip_checks,
        ),
    }
}
