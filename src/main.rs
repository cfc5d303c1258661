//! Pinboard — real-time collaborative board server.
//!
//! A single-process server that keeps sticky-note boards in sync across
//! WebSocket clients. Each connection joins one room; every board action
//! it sends is sanitized, persisted and rebroadcast to its roommates.
//!
//! Usage:
//!   pinboard                                  # keyed backend, port 8080
//!   pinboard --backend document               # SQLite document backend
//!   pinboard --port 9000 --base-path /board   # ws at /board/ws
//!   pinboard --data-dir /var/lib/pinboard     # backend files location

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use pinboard_protocol::{BoardSize, Card, CardKind, Colour, Row, Theme};
use pinboard_server::BoardServer;
use pinboard_storage::{BoardStore, DocumentStore, KeyedStore};
use pinboard_transport::{TransportConfig, TransportServer};
use rand::Rng;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pinboard", about = "Pinboard — collaborative board sync server")]
struct Cli {
    /// Port to listen on (0 for OS-assigned)
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// URL prefix for the ws and health routes
    #[arg(long, default_value = "/")]
    base_path: String,

    /// Storage backend for board state
    #[arg(long, value_enum, default_value = "keyed")]
    backend: Backend,

    /// Directory for backend database files
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,

    /// Room-key namespace prefix for the keyed backend
    #[arg(long, default_value = "pinboard")]
    key_prefix: String,

    /// Maximum concurrent connections
    #[arg(long)]
    max_connections: Option<usize>,

    /// Log filter (overrides RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,

    /// Write logs to a file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Backend {
    /// Entry-per-entity redb store
    Keyed,
    /// One-JSON-document-per-room SQLite store
    Document,
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let filter = match &cli.log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    if let Some(log_path) = &cli.log_file {
        if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create log directory {}", parent.display()))?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .with_context(|| format!("failed to open log file {}", log_path.display()))?;

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .init();

        eprintln!("Logging to {}", log_path.display());
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

fn open_store(cli: &Cli) -> anyhow::Result<Arc<dyn BoardStore>> {
    Ok(match cli.backend {
        Backend::Keyed => {
            let path = cli.data_dir.join("pinboard.redb");
            Arc::new(KeyedStore::open(&path, cli.key_prefix.clone())?)
        }
        Backend::Document => {
            let path = cli.data_dir.join("pinboard.db");
            Arc::new(DocumentStore::open(&path)?)
        }
    })
}

/// Resets the demo room to its welcome state on every boot.
fn seed_demo_room(store: &dyn BoardStore) -> anyhow::Result<()> {
    const ROOM: &str = "/demo";
    const CARDS: &[(&str, Colour)] = &[
        ("Welcome to **pinboard**!", Colour::Yellow),
        ("Drag cards around, or *double-click* to edit one.", Colour::White),
        ("Everyone in the room sees your edits live.", Colour::Blue),
        ("Columns sort your cards into lanes.", Colour::Green),
        ("Pick a card colour that matches your mood.", Colour::Orange),
        ("Stickers mark cards as done, blocked, or loved.", Colour::Purple),
        ("The eraser and marker are shared too.", Colour::Red),
        ("Make your own room by changing the URL path.", Colour::Yellow),
    ];

    store.clear(ROOM)?;
    store.set_theme(ROOM, Theme::Bigcards)?;
    store.set_board_size(ROOM, BoardSize { width: 1200.0, height: 600.0 })?;
    for name in ["To Do", "In progress", "Done"] {
        store.create_column(ROOM, name)?;
    }

    let mut rng = rand::rng();
    for (i, (text, colour)) in CARDS.iter().enumerate() {
        let id = format!("demo{i}");
        let card = Card {
            id: id.clone(),
            text: (*text).to_owned(),
            colour: *colour,
            x: 80.0 + (i % 4) as f64 * 260.0,
            y: 90.0 + (i / 4) as f64 * 180.0,
            rot: rng.random_range(-5.0..5.0),
            kind: CardKind::Plain,
            sticker: None,
        };
        store.create_card(ROOM, &id, &card)?;
    }

    let row = Row { id: "row123".into(), text: "Other tasks...".into(), y: 400.0 };
    store.create_row(ROOM, &row.id, &row)?;

    info!("Seeded demo room {ROOM}");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    let store = open_store(&cli)?;
    {
        let store = Arc::clone(&store);
        tokio::task::spawn_blocking(move || seed_demo_room(store.as_ref()))
            .await
            .context("demo seed task panicked")??;
    }

    let config = TransportConfig {
        port: cli.port,
        hostname: cli.bind.clone(),
        base_path: cli.base_path.clone(),
        enable_cors: true,
        max_connections: cli.max_connections,
    };

    let mut transport = TransportServer::start(config, BoardServer::new(store))
        .await
        .context("failed to start transport")?;

    println!();
    println!("  pinboard board server");
    println!();
    println!("  Backend:    {:?} ({})", cli.backend, cli.data_dir.display());
    println!("  Listening:  ws://{}:{}{}ws", cli.bind, transport.port(), normalized(&cli.base_path));
    println!();
    println!("  Press Ctrl+C to stop");
    println!();

    tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
    info!("Shutting down");
    transport.stop().await;

    Ok(())
}

/// Base path with exactly one slash on each side, for display.
fn normalized(base: &str) -> String {
    let trimmed = base.trim_matches('/');
    if trimmed.is_empty() {
        "/".into()
    } else {
        format!("/{trimmed}/")
    }
}
