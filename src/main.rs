mod actions;
mod client;
mod config;
mod error;
mod logging;
mod panel;
mod prefs;
mod stack;
mod tui;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use tracing::info;

use actions::{ActionId, Dispatcher};
use client::HttpTransport;
use config::{ConfigFile, ResolvedConfig};
use panel::console::RecordState;
use panel::{Field, PanelState};
use prefs::PreferenceStore;
use stack::PortEncoding;

#[derive(Parser, Debug)]
#[command(
    name = "cpdash",
    about = "Terminal control panel for the stack lifecycle API",
    long_about = None,
)]
struct Args {
    /// Run one action and print its result (omit to open the interactive panel)
    #[command(subcommand)]
    command: Option<Command>,

    /// Override the service base URL
    #[arg(long, env = "CPDASH_BASE_URL")]
    base_url: Option<String>,

    /// Override the API key sent as X-API-KEY
    #[arg(long, env = "CPDASH_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Wire shape of target_port in create requests
    #[arg(long, value_enum)]
    encoding: Option<PortEncoding>,

    /// Write a default config file to ~/.config/cpdash/config.toml and exit
    #[arg(long)]
    init: bool,

    /// Generate shell completions and print to stdout (bash, zsh, fish, elvish)
    #[arg(long, value_name = "SHELL")]
    completions: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// GET /healthz
    Health,
    /// GET /stats
    Stats,
    /// GET /stacks
    List,
    /// GET /stacks/{stack_id}
    Get { stack_id: String },
    /// GET /stacks/{stack_id}/status
    Status { stack_id: String },
    /// DELETE /stacks/{stack_id}
    Delete { stack_id: String },
    /// POST /stacks
    Create {
        /// Comma-separated PORT[/PROTO] entries, e.g. "80,53/udp"
        #[arg(long, default_value = "80")]
        port: String,
        /// Pod spec YAML file, or "-" for stdin (defaults to the configured template)
        #[arg(long, value_name = "FILE")]
        pod_spec: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // ── --init ────────────────────────────────────────────────────────────────
    if args.init {
        let path = ConfigFile::write_default_if_missing()?;
        println!("Config written to: {}", path.display());
        println!("Edit it, then run: cpdash");
        return Ok(ExitCode::SUCCESS);
    }

    // ── --completions ─────────────────────────────────────────────────────────
    if let Some(shell_name) = &args.completions {
        generate_completions(shell_name)?;
        return Ok(ExitCode::SUCCESS);
    }

    let log_path = logging::init_tracing()?;

    let file = ConfigFile::load()?;
    let resolved = ResolvedConfig::resolve(
        &file,
        args.base_url.as_deref(),
        args.api_key.as_deref(),
        args.encoding,
    )?;
    let prefs = PreferenceStore::open(&prefs::default_prefs_path());
    info!(
        base_url = %resolved.base_url,
        encoding = ?resolved.encoding,
        prefs_available = prefs.is_available(),
        "starting cpdash"
    );

    // ── Single-shot mode (non-TUI) ────────────────────────────────────────────
    if let Some(command) = args.command {
        return run_single_shot(command, resolved, prefs).await;
    }

    // ── Interactive TUI mode ──────────────────────────────────────────────────
    tui::run(resolved, prefs, log_path).await?;
    Ok(ExitCode::SUCCESS)
}

// ── Single-shot mode (plain stdout, no TUI) ───────────────────────────────────

async fn run_single_shot(command: Command, resolved: ResolvedConfig, prefs: PreferenceStore) -> Result<ExitCode> {
    let dispatcher = Dispatcher::new(Arc::new(HttpTransport::new()));
    let mut state = PanelState::new(&resolved, prefs);

    let id = match command {
        Command::Health => ActionId::Health,
        Command::Stats => ActionId::Stats,
        Command::List => ActionId::ListStacks,
        Command::Get { stack_id } => {
            state.set_input(Field::StackId, stack_id);
            ActionId::GetStack
        }
        Command::Status { stack_id } => {
            state.set_input(Field::StackId, stack_id);
            ActionId::GetStatus
        }
        Command::Delete { stack_id } => {
            state.set_input(Field::StackId, stack_id);
            ActionId::DeleteStack
        }
        Command::Create { port, pod_spec } => {
            state.set_input(Field::TargetPort, port);
            if let Some(path) = pod_spec {
                state.set_input(Field::PodSpec, read_pod_spec(&path)?);
            }
            ActionId::CreateStack
        }
    };

    dispatcher.run_action(&mut state, id).await;

    let record = state.console.record();
    if record.state == RecordState::Error {
        eprintln!("{record}");
        return Ok(ExitCode::FAILURE);
    }
    println!("{record}");
    if id == ActionId::CreateStack && !state.inputs.last_stack_id.is_empty() {
        println!();
        println!("stack_id: {}", state.inputs.last_stack_id);
    }
    Ok(ExitCode::SUCCESS)
}

fn read_pod_spec(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read pod spec from stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read pod spec at {}", path.display()))
}

// ── Shell completions ─────────────────────────────────────────────────────────

fn generate_completions(shell_name: &str) -> Result<()> {
    use clap_complete::{Shell, generate};

    let shell: Shell = match shell_name.to_lowercase().as_str() {
        "bash"    => Shell::Bash,
        "zsh"     => Shell::Zsh,
        "fish"    => Shell::Fish,
        "elvish"  => Shell::Elvish,
        _ => anyhow::bail!("Unknown shell: {shell_name} (supported: bash, zsh, fish, elvish)"),
    };

    let mut cmd = Args::command();
    generate(shell, &mut cmd, "cpdash", &mut std::io::stdout());
    Ok(())
}
