use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use ensemble_core::{ChatSession, EventBus, Message, SessionEvent, Team};
use ensemble_scheduler::{TimerRunner, TokioClock, drive_until_idle};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::EnsembleConfig;

#[derive(Parser)]
#[command(name = "ensemble")]
#[command(version)]
#[command(about = "Ensemble: chat with a team of specialist agents")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Built-in domain pack to load (overrides the config file)
    #[arg(short, long, global = true)]
    pack: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session (default)
    Chat,

    /// Send one message and print every agent reply
    Ask {
        /// The message to send
        message: String,

        /// Print each reply as a JSON line
        #[arg(long)]
        json: bool,
    },

    /// List the agents in the configured pack
    Agents {
        /// Only show one team (research or creative)
        #[arg(long)]
        team: Option<String>,
    },

    /// Initialize config directory and default config
    Init,

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging is set up before the config error surfaces so the level can come from it
    let loaded = EnsembleConfig::load(&cli.config);
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        let level = loaded
            .as_ref()
            .map(|cfg| cfg.logging.level.clone())
            .unwrap_or_else(|_| "warn".to_string());
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let pack = cli.pack;
    let resolve = move || -> Result<EnsembleConfig> {
        let mut cfg = loaded?;
        if let Some(pack) = pack {
            cfg.pack.name = pack;
            cfg.pack.file = None;
        }
        Ok(cfg)
    };

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Init => cmd_init().await,
        Commands::Chat => cmd_chat(&resolve()?).await,
        Commands::Ask { message, json } => cmd_ask(&resolve()?, &message, json).await,
        Commands::Agents { team } => cmd_agents(&resolve()?, team.as_deref()),
        Commands::Config => cmd_config(&resolve()?),
    }
}

async fn cmd_init() -> Result<()> {
    let config_dir = config::config_dir();
    tokio::fs::create_dir_all(&config_dir)
        .await
        .with_context(|| format!("Failed to create config dir: {}", config_dir.display()))?;

    let config_path = config_dir.join("config.toml");
    if config_path.exists() {
        warn!("Config already exists at {}", config_path.display());
    } else {
        let default_config = include_str!("../../../config/default.toml");
        tokio::fs::write(&config_path, default_config).await?;
        info!("Created default config at {}", config_path.display());
    }

    println!("Ensemble initialized at {}", config_dir.display());
    println!("Edit {} to pick a pack and tune reply timing.", config_path.display());
    Ok(())
}

fn cmd_config(cfg: &EnsembleConfig) -> Result<()> {
    let rendered = toml::to_string_pretty(cfg).context("Failed to render config")?;
    println!("{}", rendered);
    Ok(())
}

fn cmd_agents(cfg: &EnsembleConfig, team: Option<&str>) -> Result<()> {
    let pack = cfg.load_pack()?;
    let teams = match team {
        Some(name) => match Team::parse(name) {
            Some(team) => vec![team],
            None => bail!("Unknown team '{}' (expected research or creative)", name),
        },
        None => vec![Team::Research, Team::Creative],
    };

    println!("Pack: {}", pack.name);
    for team in teams {
        println!("\n  {} team", team);
        for agent in pack.roster.list_by_team(team) {
            let status = if agent.active { "on " } else { "off" };
            let lock = if agent.can_toggle() { "" } else { " (locked)" };
            println!(
                "  [{}] {:<12} {} {}  [{}] {}{}",
                status,
                agent.id,
                agent.avatar_glyph,
                agent.name,
                agent.role_icon(),
                agent.role,
                lock
            );
        }
    }
    Ok(())
}

fn build_session(
    cfg: &EnsembleConfig,
    clock: &TokioClock,
    bus: Option<EventBus>,
    show_welcome: bool,
) -> Result<ChatSession> {
    let mut pack = cfg.load_pack()?;
    if !show_welcome {
        pack = pack.without_welcome();
    }
    let mut session = ChatSession::from_pack(
        pack,
        cfg.dispatch.to_dispatch_config(),
        Arc::new(clock.clone()),
    );
    if let Some(bus) = bus {
        session = session.with_event_bus(bus);
    }
    Ok(session)
}

async fn cmd_ask(cfg: &EnsembleConfig, message: &str, json: bool) -> Result<()> {
    let clock = TokioClock::new();
    let mut session = build_session(cfg, &clock, None, false)?;

    if session.submit(message).is_none() {
        bail!("Nothing to send: the message is empty");
    }
    if session.roster().active_count() == 0 {
        warn!("No active agents; nobody will reply");
    }

    let session = Arc::new(Mutex::new(session));
    drive_until_idle(&session, &clock).await;

    let session = session.lock().await;
    for message in session.messages().iter().filter(|m| !m.sender.is_user()) {
        if json {
            println!("{}", serde_json::to_string(message)?);
        } else {
            print_message(message);
        }
    }
    Ok(())
}

async fn cmd_chat(cfg: &EnsembleConfig) -> Result<()> {
    let clock = TokioClock::new();
    let bus = EventBus::new(cfg.session.event_capacity);
    let session = build_session(cfg, &clock, Some(bus.clone()), cfg.session.show_welcome)?;

    println!(
        "Ensemble [{}] with {} of {} agents active. Type /help for commands.\n",
        session.pack_name(),
        session.roster().active_count(),
        session.roster().len()
    );
    for message in session.messages() {
        print_message(message);
    }

    let printer = tokio::spawn(print_events(bus.subscribe()));
    let runner = TimerRunner::spawn(Arc::new(Mutex::new(session)), clock);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if let Some(command) = line.strip_prefix('/') {
                    if !handle_command(command, &runner).await {
                        break;
                    }
                    continue;
                }
                let batch = runner.state().lock().await.submit(line);
                debug!("Submitted batch {:?}", batch);
                runner.notify();
            }
        }
    }

    runner.shutdown().await;
    printer.abort();
    Ok(())
}

/// Run a slash command. Returns false when the session should end.
async fn handle_command(command: &str, runner: &TimerRunner<ChatSession>) -> bool {
    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };

    match name {
        "quit" | "exit" => return false,
        "help" => print_help(),
        "agents" => {
            let session = runner.state().lock().await;
            for agent in session.roster().agents() {
                let status = if agent.active { "on " } else { "off" };
                println!("  [{}] {:<12} {}", status, agent.id, agent.name);
            }
        }
        "team" => match Team::parse(arg) {
            Some(team) => {
                let session = runner.state().lock().await;
                for agent in session.roster().list_by_team(team) {
                    println!("  {} {} ({})", agent.avatar_glyph, agent.name, agent.role);
                }
            }
            None => println!("  Usage: /team research|creative"),
        },
        "toggle" => {
            if arg.is_empty() {
                println!("  Usage: /toggle <agent-id>");
            } else {
                match runner.state().lock().await.toggle(arg) {
                    Ok(true) => println!("  {} is now on", arg),
                    Ok(false) => println!("  {} is now off", arg),
                    Err(e) => println!("  {}", e),
                }
            }
        }
        other => println!("  Unknown command /{}. Type /help for commands.", other),
    }
    true
}

fn print_help() {
    println!("  /agents             list agents and whether they are on");
    println!("  /team <name>        list one team (research or creative)");
    println!("  /toggle <agent-id>  switch an agent on or off");
    println!("  /help               show this help");
    println!("  /quit               leave the session");
}

async fn print_events(mut rx: broadcast::Receiver<SessionEvent>) {
    loop {
        match rx.recv().await {
            Ok(SessionEvent::MessageAppended(message)) if !message.sender.is_user() => {
                print_message(&message);
            }
            Ok(SessionEvent::ThinkingChanged { thinking: true }) => {
                println!("  ... the team is thinking");
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Printer lagged, skipped {} events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn print_message(message: &Message) {
    let sender = &message.sender;
    println!(
        "{} {} [{}]: {}\n",
        sender.avatar_glyph,
        sender.name,
        message.created_at.format("%H:%M:%S"),
        message.content
    );
}
