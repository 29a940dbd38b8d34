//! KL-018: CLI subcommands — init, validate, plan, apply, verify, status, completions.

use crate::core::error::KilnError;
use crate::core::journal::Journal;
use crate::core::provisioner::Provisioner;
use crate::core::{codegen, parser, state, types};
use crate::providers::shell::ShellProviders;
use crate::transport::Environment;
use crate::tripwire::verify;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "kiln",
    version,
    about = "Ordered, fail-fast provisioning of native packages, toolchain components and runtimes"
)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new kiln project
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Validate kiln.yaml without touching the environment
    Validate {
        /// Path to kiln.yaml
        #[arg(short, long, default_value = "kiln.yaml")]
        file: PathBuf,
    },

    /// Show the steps and the scripts each one runs
    Plan {
        /// Path to kiln.yaml
        #[arg(short, long, default_value = "kiln.yaml")]
        file: PathBuf,
    },

    /// Provision the environment
    Apply {
        /// Path to kiln.yaml
        #[arg(short, long, default_value = "kiln.yaml")]
        file: PathBuf,

        /// Environment root (overrides environment.root)
        #[arg(long)]
        root: Option<PathBuf>,

        /// State directory
        #[arg(long, default_value = "state")]
        state_dir: PathBuf,

        /// Keep package-index caches after the run
        #[arg(long)]
        no_cleanup: bool,
    },

    /// Check every target is present in the environment
    Verify {
        /// Path to kiln.yaml
        #[arg(short, long, default_value = "kiln.yaml")]
        file: PathBuf,

        /// Environment root (overrides environment.root)
        #[arg(long)]
        root: Option<PathBuf>,

        /// Exit non-zero on any missing target (for CI)
        #[arg(long)]
        tripwire: bool,
    },

    /// Show the last run from the lock file
    Status {
        /// State directory
        #[arg(long, default_value = "state")]
        state_dir: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), KilnError> {
    match cmd {
        Commands::Init { path } => cmd_init(&path),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Plan { file } => cmd_plan(&file),
        Commands::Apply {
            file,
            root,
            state_dir,
            no_cleanup,
        } => cmd_apply(&file, root.as_deref(), &state_dir, no_cleanup),
        Commands::Verify {
            file,
            root,
            tripwire,
        } => cmd_verify(&file, root.as_deref(), tripwire),
        Commands::Status { state_dir } => cmd_status(&state_dir),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "kiln", &mut std::io::stdout());
            Ok(())
        }
    }
}

const TEMPLATE: &str = r#"version: "1.0"
name: my-image
description: "Provisioned by kiln"

environment:
  root: /

steps:
  - name: native-libraries
    kind: bulk_install
    provider: apt
    targets: [build-essential, cmake, pkg-config]
  - name: toolchain-components
    kind: component_add
    provider: rustup
    targets: [clippy, rustfmt]

policy:
  cleanup_index_cache: true
  verify: true
  tripwire: true
  lock_file: true
"#;

fn cmd_init(path: &Path) -> Result<(), KilnError> {
    let config_path = path.join("kiln.yaml");
    if config_path.exists() {
        return Err(KilnError::Config(format!(
            "{} already exists",
            config_path.display()
        )));
    }

    let state_dir = path.join("state");
    std::fs::create_dir_all(&state_dir).map_err(|e| KilnError::io(&state_dir, e))?;
    std::fs::write(&config_path, TEMPLATE).map_err(|e| KilnError::io(&config_path, e))?;

    println!("Initialized kiln project at {}", path.display());
    println!("  Created: {}", config_path.display());
    println!("  Created: {}/", state_dir.display());
    Ok(())
}

fn cmd_validate(file: &Path) -> Result<(), KilnError> {
    let config = load(file)?;
    let targets: usize = config.steps.iter().map(|s| s.targets.len()).sum();
    println!(
        "OK: {} ({} steps, {} targets)",
        config.name,
        config.steps.len(),
        targets
    );
    Ok(())
}

/// Parse and validate, printing each validation error.
fn load(file: &Path) -> Result<types::KilnConfig, KilnError> {
    match parser::load_config(file) {
        Err(KilnError::Validation(errors)) => {
            for e in &errors {
                eprintln!("  ERROR: {}", e);
            }
            Err(KilnError::Validation(errors))
        }
        other => other,
    }
}

fn cmd_plan(file: &Path) -> Result<(), KilnError> {
    let config = load(file)?;
    println!(
        "Planning: {} ({} steps) on {}",
        config.name,
        config.steps.len(),
        config.environment.root.display()
    );
    println!();

    let mut bulk: Vec<String> = Vec::new();
    for (index, step) in config.steps.iter().enumerate() {
        println!(
            "[{}] {} ({} via {}): {}",
            index,
            step.label(index),
            step.kind,
            step.source_ref,
            step.targets.join(", ")
        );
        let scripts = codegen::step_scripts(step).map_err(KilnError::Config)?;
        for (phase, script) in scripts {
            println!("    {}:", phase);
            for line in script.lines() {
                println!("      | {}", line);
            }
        }
        if step.kind == types::StepKind::BulkInstall && !bulk.contains(&step.source_ref) {
            bulk.push(step.source_ref.clone());
        }
    }

    println!();
    if config.policy.cleanup_index_cache && !bulk.is_empty() {
        println!("Cleanup: purge package index cache for {}", bulk.join(", "));
    } else {
        println!("Cleanup: none");
    }
    Ok(())
}

fn cmd_apply(
    file: &Path,
    root: Option<&Path>,
    state_dir: &Path,
    no_cleanup: bool,
) -> Result<(), KilnError> {
    let config = load(file)?;
    let root = root.unwrap_or(&config.environment.root).to_path_buf();

    let mut policy = config.policy.clone();
    if no_cleanup {
        policy.cleanup_index_cache = false;
    }

    let journal = Journal::new(state_dir, &config.name, &root, &policy);
    let providers = ShellProviders::new(Environment::new(&root));
    let mut provisioner = Provisioner::new(providers)
        .with_policy(policy)
        .with_journal(journal);

    match provisioner.run(&config.steps) {
        Ok(report) => {
            println!(
                "Provisioned {}: {} step(s) completed ({:.1}s)",
                config.name,
                report.steps_completed,
                report.total_duration.as_secs_f64()
            );
            if !report.purged.is_empty() {
                let purged: Vec<String> = report.purged.iter().map(|p| p.to_string()).collect();
                println!("  Purged index cache: {}", purged.join(", "));
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Provisioning halted: {}", e);
            Err(e.into())
        }
    }
}

fn cmd_verify(file: &Path, root: Option<&Path>, tripwire_mode: bool) -> Result<(), KilnError> {
    let config = load(file)?;
    let root = root.unwrap_or(&config.environment.root).to_path_buf();
    let mut providers = ShellProviders::new(Environment::new(&root));

    println!("Verifying {} ({} steps)...", config.name, config.steps.len());
    let findings = verify::verify_steps(&mut providers, &config.steps)?;

    if findings.is_empty() {
        println!("All targets present.");
        return Ok(());
    }

    for f in &findings {
        println!("  MISSING: {} ({} via {})", f.target, f.step, f.provider);
    }
    println!();
    println!("{} target(s) missing", findings.len());
    if tripwire_mode {
        return Err(KilnError::Drift(findings.len()));
    }
    Ok(())
}

fn cmd_status(state_dir: &Path) -> Result<(), KilnError> {
    let Some(lock) = state::load_lock(state_dir)? else {
        println!("No state found. Run `kiln apply` first.");
        return Ok(());
    };

    println!("Image: {} ({})", lock.name, lock.root.display());
    println!("  Generated: {}", lock.generated_at);
    println!("  Generator: {}", lock.generator);
    println!(
        "  Index cache purged: {}",
        if lock.index_cache_purged { "yes" } else { "no" }
    );
    println!("  Steps: {}", lock.steps.len());

    for (label, sl) in &lock.steps {
        let duration = sl
            .duration_seconds
            .map(|d| format!(" ({:.2}s)", d))
            .unwrap_or_default();
        println!(
            "    {}: {} [{} via {}]{}",
            label, sl.status, sl.kind, sl.provider, duration
        );
        if let Some(ref err) = sl.error {
            println!("      error: {}", err);
        }
    }
    Ok(())
}
