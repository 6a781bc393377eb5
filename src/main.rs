use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use exthistory::command::{CommandRunner, SystemRunner};
use exthistory::config::Config;
use exthistory::controller::{RestoreFlag, RestoreOptions, RestoreOutcome, SyncController};
use exthistory::extensions::{resolve_fallback_binary, EditorCli, FallbackManager};
use exthistory::git::GitOps;
use exthistory::prompt::{format_revision, TerminalPrompter};
use exthistory::repo::{is_remote, RepoResolver};
use exthistory::watch::WatchLoop;
use exthistory::writer::{SnapshotWriter, SyncOutcome};
use exthistory::{xlog, xlog_error, xlog_warn, Result};

/// Exthistory - keep the installed editor extensions under git history
#[derive(Parser, Debug)]
#[command(name = "exthistory")]
#[command(version, about, long_about = None)]
#[command(
    after_help = "ENVIRONMENT:\n    EXTHISTORY_DEBUG=1     Enable debug logging (alternative to --debug)"
)]
pub struct Cli {
    /// Enable debug logging (writes to ~/.exthistory/exthistory.log)
    #[arg(short = 'd', long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Snapshot the installed extensions and commit if anything changed
    Sync,

    /// Restore the installed extensions to a snapshot from history
    Restore {
        /// Revision hash or unique prefix (prompts when not given)
        #[arg(long, short = 'r')]
        revision: Option<String>,

        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// List snapshot revisions, newest first
    History,

    /// Sync on extension changes and on a timer until interrupted
    Watch {
        /// Seconds between timer syncs (overrides the config file)
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Show or edit the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Set the history repository (local path or git URL)
    SetRepo { value: String },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    exthistory::log::init_with_debug(cli.debug);
    xlog!("exthistory starting: {:?}", cli.command);

    let result = match cli.command {
        Command::Sync => run_sync(),
        Command::Restore { revision, yes } => run_restore(revision, yes),
        Command::History => run_history(),
        Command::Watch { interval } => run_watch(interval),
        Command::Config { action } => run_config(action),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            xlog_error!("Command failed: {}", e);
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_sync() -> Result<()> {
    let (controller, _) = build_controller()?;
    print_sync_outcome(&controller.sync_now()?);
    Ok(())
}

fn run_restore(revision: Option<String>, assume_yes: bool) -> Result<()> {
    let (controller, _) = build_controller()?;
    let options = RestoreOptions {
        revision,
        assume_yes,
    };

    match controller.restore(&TerminalPrompter, &options)? {
        RestoreOutcome::NoHistory => {
            println!("No snapshot history yet. Run `exthistory sync` first.");
        }
        RestoreOutcome::Cancelled => println!("Restore cancelled."),
        RestoreOutcome::NoChanges { revision } => {
            println!(
                "\x1b[32mInstalled extensions already match {}.\x1b[0m",
                revision.short_hash()
            );
        }
        RestoreOutcome::Declined { revision, plan } => {
            println!(
                "Left extensions unchanged ({} not restored: {}).",
                revision.short_hash(),
                plan.summary()
            );
        }
        RestoreOutcome::Applied {
            revision,
            report,
            resync,
        } => {
            println!();
            println!("Restored {}: {}", revision.short_hash(), report.summary());
            for failure in &report.failed {
                println!(
                    "   \x1b[33m• failed to {} {}: {}\x1b[0m",
                    failure.action, failure.id, failure.error
                );
            }
            match resync {
                Ok(outcome) => print_sync_outcome(&outcome),
                Err(e) => {
                    println!("\x1b[33mWarning: post-restore sync failed: {}\x1b[0m", e);
                }
            }
        }
    }
    Ok(())
}

fn run_history() -> Result<()> {
    let (controller, _) = build_controller()?;
    let history = controller.reconciler().history()?;
    if history.is_empty() {
        println!("No snapshot history yet.");
        return Ok(());
    }
    for rev in &history {
        println!("{}", format_revision(rev));
    }
    Ok(())
}

fn run_watch(interval: Option<u64>) -> Result<()> {
    let (controller, config) = build_controller()?;
    let period = match interval {
        Some(secs) if secs > 0 => Duration::from_secs(secs),
        _ => config.sync_interval(),
    };
    let extensions_dir = config.extensions_dir();

    println!(
        "Watching extensions (timer every {}s). Press Ctrl-C to stop.",
        period.as_secs()
    );

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let cancel = CancellationToken::new();
        let on_signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                xlog!("Interrupted, stopping watch loop");
                on_signal.cancel();
            }
        });

        WatchLoop::new(Arc::new(controller), period)
            .with_extensions_dir(extensions_dir)
            .run(cancel)
            .await
    })
}

fn run_config(action: ConfigAction) -> Result<()> {
    let path = Config::config_path()?;
    let mut config = Config::load_from(&path)?;

    match action {
        ConfigAction::Show => {
            println!("Config file: {}", path.display());
            println!(
                "  repo_path:       {}",
                config.repo_path.as_deref().unwrap_or("(unset)")
            );
            println!("  editor:          {}", config.effective_editor());
            println!(
                "  fallback_editor: {}",
                fallback_binary(&config).unwrap_or_else(|| "(none)".to_string())
            );
            println!(
                "  extensions_dir:  {}",
                config
                    .extensions_dir()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(unknown)".to_string())
            );
            println!("  sync_interval:   {}s", config.sync_interval().as_secs());
            println!("  push:            {}", config.push);
        }
        ConfigAction::SetRepo { value } => {
            let value = value.trim().to_string();
            config.repo_path = Some(value.clone());
            config.save_to(&path)?;
            if is_remote(&value) {
                println!("Repository set to {}. It will be cloned on first use.", value);
            } else {
                println!("Repository set to {}.", value);
            }
        }
    }
    Ok(())
}

/// Resolve the repository and assemble the controller with the system
/// runner, prompting on the terminal where needed. The restore flag lives in
/// the app directory so `watch` and `restore` processes see each other.
fn build_controller() -> Result<(SyncController, Config)> {
    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);
    let mut config = Config::load()?;

    let repo_path: PathBuf =
        RepoResolver::new(runner.as_ref(), &TerminalPrompter, Config::config_path()?)
            .resolve(&mut config)?;

    let writer =
        SnapshotWriter::new(GitOps::new(&repo_path, runner.clone())).with_push(config.push);
    let manager = build_manager(&config, runner);

    let controller = SyncController::new(writer, Arc::new(manager))
        .with_restore_flag(RestoreFlag::shared(&Config::app_dir()?));
    Ok((controller, config))
}

fn build_manager(config: &Config, runner: Arc<dyn CommandRunner>) -> FallbackManager {
    let primary = EditorCli::new(config.effective_editor(), runner.clone());
    if !primary.is_available() {
        xlog_warn!("Editor CLI '{}' not found on PATH", primary.binary());
    }

    let manager = FallbackManager::new(Box::new(primary));
    match fallback_binary(config) {
        Some(bin) => {
            xlog!("Fallback editor CLI: {}", bin);
            manager.with_fallback(Box::new(EditorCli::new(bin, runner)))
        }
        None => manager,
    }
}

fn fallback_binary(config: &Config) -> Option<String> {
    resolve_fallback_binary(config.effective_editor(), config.fallback_editor.as_deref())
}

fn print_sync_outcome(outcome: &SyncOutcome) {
    match outcome {
        SyncOutcome::Unchanged => println!("No extension changes to commit."),
        SyncOutcome::Committed { message, pushed } => {
            println!("\x1b[32mCommitted:\x1b[0m {}", message);
            if !pushed {
                println!("   (not pushed)");
            }
        }
    }
}
