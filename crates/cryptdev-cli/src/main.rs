//! cryptdev command-line interface: reconcile one LUKS container to a declared state.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use cryptdev_core::{
    config::CryptdevConfig,
    intent::{Intent, IntentParams},
    logging,
    reconcile::{Reconciler, RunOutcome},
    Action,
};
use cryptdev_luks::SystemContainerOps;
use log::{debug, error};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Declared state of the container, plus how to reach the host tooling.
#[derive(Parser, Debug)]
#[command(
    name = "cryptdev",
    version,
    about = "Reconcile a LUKS container (create/destroy, open/close, keys) to a declared state."
)]
struct Cli {
    /// Path to a TOML configuration file (defaults to $CRYPTDEV_CONFIG or /etc/cryptdev.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON file carrying the declared parameters by name; flags override it.
    #[arg(long)]
    params: Option<PathBuf>,

    /// Device to work with (e.g. /dev/sda1).
    #[arg(long)]
    device: Option<String>,

    /// Desired state of the container: present or absent.
    #[arg(long)]
    state: Option<String>,

    /// Desired mapping state: true to open, false to close; omit to leave as is.
    #[arg(long, value_name = "BOOL", action = ArgAction::Set)]
    open: Option<bool>,

    /// Mapping name; generated from the device UUID when opening without one.
    #[arg(long)]
    name: Option<String>,

    /// Key file authorising format, open, and key enrollment.
    #[arg(long)]
    key: Option<PathBuf>,

    /// Key file to enroll into a new keyslot.
    #[arg(long)]
    new_key: Option<PathBuf>,

    /// Key file whose keyslot should be removed.
    #[arg(long)]
    remove_key: Option<PathBuf>,

    /// Report what would change without touching the system.
    #[arg(long)]
    check: bool,
}

impl Cli {
    fn flag_params(&self) -> IntentParams {
        IntentParams {
            device: self.device.clone(),
            state: self.state.clone(),
            open: self.open,
            name: self.name.clone(),
            key: self.key.clone(),
            new_key: self.new_key.clone(),
            remove_key: self.remove_key.clone(),
        }
    }

    fn intent(&self) -> Result<Intent> {
        let base = match &self.params {
            Some(path) => read_params(path)?,
            None => IntentParams::default(),
        };
        let intent = Intent::try_from(base.merge(self.flag_params()))?;
        Ok(intent)
    }
}

/// JSON document printed on stdout.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Report {
    Done(RunOutcome),
    Checked(CheckReport),
    Failed {
        failed: bool,
        msg: String,
    },
}

/// Check-mode result: the predicted outcome plus the actions a real run would take.
#[derive(Debug, Serialize)]
struct CheckReport {
    #[serde(flatten)]
    outcome: RunOutcome,
    planned: Vec<Action>,
}

fn read_params(path: &Path) -> Result<IntentParams> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read parameters from {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse parameters in {}", path.display()))
}

fn main() {
    logging::init("warn");
    let cli = Cli::parse();

    let report = match run(&cli) {
        Ok(report) => report,
        Err(err) => {
            error!("{err:#}");
            Report::Failed {
                failed: true,
                msg: format!("cryptdev error: {err:#}"),
            }
        }
    };

    match serde_json::to_string(&report) {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("error: failed to encode result: {err}"),
    }
    if matches!(report, Report::Failed { .. }) {
        std::process::exit(1);
    }
}

/// Load configuration, build the backend, and plan or apply the intent.
fn run(cli: &Cli) -> Result<Report> {
    let intent = cli.intent()?;
    debug!("declared intent: {intent:?}");

    let config = CryptdevConfig::resolve(cli.config.as_deref())
        .context("failed to load configuration")?;
    let ops = SystemContainerOps::from_config(&config)?;
    let reconciler = Reconciler::new(ops);

    if cli.check {
        let plan = reconciler.plan(&intent)?;
        return Ok(Report::Checked(CheckReport {
            outcome: plan.outcome(),
            planned: plan.actions,
        }));
    }

    Ok(Report::Done(reconciler.apply(&intent)?))
}
