use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use relay::context::AppContext;
use relay::presenter::{MessageRow, SessionPresenter};

#[derive(Parser)]
#[command(name = "relay")]
#[command(about = "Relay CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and default files (config, workspace/INSTRUCTIONS.md).
    Init {
        /// Config file path (default: RELAY_CONFIG_PATH or ~/.relay/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Chat with the support assistant (interactive). Type /help for commands.
    Chat {
        /// Config file path (default: RELAY_CONFIG_PATH or ~/.relay/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("relay {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Chat { config }) => {
            if let Err(e) = run_chat(config).await {
                log::error!("chat failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(relay::config::default_config_path);
    let dir = relay::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

const HELP: &str = "commands:\n  /new   start a new conversation\n  /help  show this help\n  /quit  exit";

async fn run_chat(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    use std::io::{self, Write};

    let (config, path) = relay::config::load_config(config_path)?;
    let ctx = AppContext::from_config(config, path).context("building application context")?;
    let orchestrator = ctx
        .build_orchestrator()
        .context("configuring the assistant")?;
    let mut presenter = SessionPresenter::new(orchestrator);
    presenter
        .load()
        .await
        .context("connecting to the assistant")?;
    log_ready(&presenter, ctx.config_dir());
    println!("connected; type /help for commands");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        match input.to_ascii_lowercase().as_str() {
            "/quit" | "/exit" => break,
            "/help" => {
                println!("{}", HELP);
                continue;
            }
            "/new" => {
                match presenter.reset().await {
                    Ok(()) => println!("started a new conversation"),
                    Err(e) => eprintln!("chat error: {}", e),
                }
                continue;
            }
            _ => {}
        }

        match presenter.send(input).await {
            Ok(rows) => match latest_reply(&rows) {
                Some(row) => print_reply(row),
                None => println!("< (no reply)"),
            },
            Err(e) => {
                eprintln!("chat error: {}", e);
            }
        }
    }

    presenter.unload();
    Ok(())
}

fn log_ready(presenter: &SessionPresenter, config_dir: &Path) {
    let orchestrator = presenter.orchestrator();
    log::info!(
        "chat: assistant {} ready (config {})",
        orchestrator.assistant_id().unwrap_or("?"),
        config_dir.display()
    );
    if let Some(specialist) = orchestrator.specialist() {
        log::info!(
            "chat: specialist {} reachable via {}",
            specialist.assistant_id().unwrap_or("?"),
            orchestrator.delegation_function()
        );
    }
}

/// Newest assistant row, if the last row is not the user's own message.
fn latest_reply(rows: &[MessageRow]) -> Option<&MessageRow> {
    rows.last().filter(|r| !r.is_user())
}

fn print_reply(row: &MessageRow) {
    println!("< {}", row.text.trim());
    for label in &row.annotations {
        println!("  [{}]", label);
    }
}
