//! Parcel - application and runtime installer
//!
//! Usage:
//!   parcel install REMOTE REF...     # Install refs from a configured remote
//!   parcel install --bundle FILE     # Install a bundle file
//!   parcel install --from FILE       # Add the remote a descriptor names and install
//!   parcel complete WORDS...         # Shell completion for install

mod observer;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use console::style;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use parcel_core::commands::{InstallCommand, InstallMode, InstallRequest, complete_install};
use parcel_core::keyring::KeySource;
use parcel_core::local::LocalDirectory;
use parcel_core::options::InstallOptions;
use parcel_core::orchestrator::{InstallReport, RelatedStatus};
use parcel_core::reference::KindMask;

use crate::observer::ConsoleObserver;

#[derive(Parser)]
#[command(name = "parcel")]
#[command(about = "Application and runtime installer", long_about = None)]
struct Cli {
    /// Installation root (defaults to the platform data directory)
    #[arg(long, global = true, env = "PARCEL_ROOT")]
    installation: Option<PathBuf>,

    /// Show debug logging for parcel crates
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install applications or runtimes
    Install(Box<InstallArgs>),

    /// Complete an install command line (for shell integration)
    #[command(hide = true)]
    Complete {
        /// Words after `install`; the last one is being completed
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        words: Vec<String>,
    },
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable summary
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

#[derive(Args)]
struct InstallArgs {
    /// REMOTE REF..., or FILE with --bundle/--from
    ///
    /// The legacy form REMOTE ID BRANCH is still accepted.
    args: Vec<String>,

    /// Arch to install for
    #[arg(long)]
    arch: Option<String>,

    /// Don't pull, only install from the local cache
    #[arg(long)]
    no_pull: bool,

    /// Don't deploy, only download to the local cache
    #[arg(long)]
    no_deploy: bool,

    /// Don't install related refs
    #[arg(long)]
    no_related: bool,

    /// Look for runtime with the specified name
    #[arg(long)]
    runtime: bool,

    /// Look for app with the specified name
    #[arg(long)]
    app: bool,

    /// Install from a bundle file
    #[arg(long, conflicts_with = "from")]
    bundle: bool,

    /// Add the remote named by a descriptor file and install from it
    #[arg(long)]
    from: bool,

    /// Key file overriding the bundle's embedded keys (`-` for stdin)
    #[arg(long = "gpg-file", value_name = "FILE")]
    gpg_files: Vec<KeySource>,

    /// Only install this subpath of the content (repeatable)
    #[arg(long = "subpath", value_name = "PATH")]
    subpaths: Vec<String>,

    /// Output format
    #[arg(short = 'o', long, default_value = "table")]
    format: OutputFormat,
}

impl InstallArgs {
    fn request(&self) -> InstallRequest {
        let mode = if self.bundle {
            InstallMode::Bundle
        } else if self.from {
            InstallMode::From
        } else {
            InstallMode::Remote
        };

        let options = InstallOptions::new()
            .with_no_pull(self.no_pull)
            .with_no_deploy(self.no_deploy)
            .with_no_related(self.no_related)
            .with_subpaths(self.subpaths.iter().cloned());

        let mut request = InstallRequest {
            mode,
            args: self.args.clone(),
            kinds: KindMask::from_flags(self.app, self.runtime),
            arch: None,
            key_sources: self.gpg_files.clone(),
            options,
        };
        if let Some(arch) = &self.arch {
            request = request.with_arch(arch);
        }
        request
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_log_filter(cli.verbose).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("Interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    let installation = cli.installation;
    match cli.command {
        Commands::Install(args) => {
            tokio::task::spawn_blocking(move || run_install(installation, &args, &cancel))
                .await
                .context("Install task failed")?
        }
        Commands::Complete { words } => {
            tokio::task::spawn_blocking(move || run_complete(installation, &words, &cancel))
                .await
                .context("Completion task failed")?
        }
    }
}

/// Log filter when `RUST_LOG` is unset. User-facing warnings already reach
/// stderr through the observer, so logging stays at errors unless verbose.
fn default_log_filter(verbose: bool) -> &'static str {
    if verbose {
        "parcel_core=debug,parcel=debug,warn"
    } else {
        "error"
    }
}

fn open_directory(installation: Option<PathBuf>) -> Result<LocalDirectory> {
    let dir = match installation {
        Some(root) => LocalDirectory::open(root)?,
        None => LocalDirectory::with_defaults()?,
    };
    Ok(dir)
}

fn run_install(
    installation: Option<PathBuf>,
    args: &InstallArgs,
    cancel: &CancellationToken,
) -> Result<()> {
    let dir = open_directory(installation)?;
    let request = args.request();
    let observer = ConsoleObserver::new(matches!(args.format, OutputFormat::Json));

    let reports = match InstallCommand::new(&dir, cancel)
        .with_observer(&observer)
        .execute(&request)
    {
        Ok(reports) => reports,
        Err(err) if err.is_usage() => {
            anyhow::bail!("{err}\nSee 'parcel install --help'");
        }
        Err(err) => return Err(err.into()),
    };

    print_install_reports(args.format, &reports)
}

fn print_install_reports(format: OutputFormat, reports: &[InstallReport]) -> Result<()> {
    match format {
        OutputFormat::Table => {
            for report in reports {
                match &report.remote {
                    Some(remote) => println!(
                        "{} Installed {} from {}",
                        style("✓").green(),
                        report.reference,
                        remote
                    ),
                    None => println!("{} Installed {}", style("✓").green(), report.reference),
                }
                for related in &report.related {
                    match &related.status {
                        RelatedStatus::Installed { outcome } => {
                            println!("  • {} ({outcome})", related.reference);
                        }
                        RelatedStatus::Skipped => {
                            println!("  • {} (not downloaded)", related.reference);
                        }
                        // Already reported as a warning
                        RelatedStatus::Failed { .. } => {}
                    }
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(reports)?);
        }
    }

    Ok(())
}

fn run_complete(
    installation: Option<PathBuf>,
    words: &[String],
    cancel: &CancellationToken,
) -> Result<()> {
    let dir = open_directory(installation)?;
    for candidate in complete_install(&dir, words, cancel)? {
        println!("{candidate}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Cli, Commands, default_log_filter};
    use clap::Parser;

    #[test]
    fn quiet_logging_leaves_warnings_to_the_observer() {
        assert_eq!(default_log_filter(false), "error");
        assert!(default_log_filter(true).contains("parcel_core=debug"));
    }

    #[test]
    fn install_flags_accept_separate_values() {
        let cli = Cli::try_parse_from([
            "parcel",
            "install",
            "--arch",
            "aarch64",
            "--subpath",
            "/de",
            "--gpg-file",
            "-",
            "origin",
            "org.example.App",
        ])
        .expect("Failed to parse install");
        let Commands::Install(args) = cli.command else {
            panic!("expected install");
        };
        assert_eq!(args.arch.as_deref(), Some("aarch64"));
        assert_eq!(args.subpaths, vec!["/de".to_string()]);
        assert_eq!(args.args, vec!["origin".to_string(), "org.example.App".to_string()]);
    }

    #[test]
    fn complete_passes_flags_through() {
        let cli = Cli::try_parse_from(["parcel", "complete", "--arch", "x86_64", ""])
            .expect("Failed to parse complete");
        let Commands::Complete { words } = cli.command else {
            panic!("expected complete");
        };
        assert_eq!(words, vec!["--arch", "x86_64", ""]);
    }
}
