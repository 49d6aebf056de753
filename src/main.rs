//! `sketchroom` command-line entry point.
//!
//! `rooms` and `snapshot` talk to Postgres through `DATABASE_URL`; `demo`
//! runs two peers against the in-memory backend.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use rand::Rng;
use serde_json::{Value, json};
use tokio::time::sleep;
use uuid::Uuid;

use sketchroom::backend::memory::{MemoryHub, MemoryIdentity, MemoryRowStore};
use sketchroom::backend::{BackendError, Filter, ROOMS_TABLE, RowStore};
use sketchroom::backend::postgres::PgRowStore;
use sketchroom::config::Config;
use sketchroom::db;
use sketchroom::render::{Board, RenderTarget, SnapshotError};
use sketchroom::services::room::{self, RoomError};
use sketchroom::services::session::{RoomSession, SessionError, SessionOptions};
use sketchroom::state::{Backend, DrawingPen, Point, Profile, Room, SessionUser, UserMetadata};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("DATABASE_URL is not set")]
    MissingDatabaseUrl,
    #[error("room {0} has no stored drawing")]
    NoDrawing(Uuid),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Room(#[from] RoomError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "sketchroom", about = "Collaborative whiteboard rooms")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Rooms(RoomsCommand),
    Snapshot(SnapshotCommand),
    /// Run two in-memory peers through one drawing session.
    Demo,
}

#[derive(Args, Debug)]
struct RoomsCommand {
    #[command(subcommand)]
    command: RoomsSubcommand,
}

#[derive(Subcommand, Debug)]
enum RoomsSubcommand {
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, env = "SKETCHROOM_USER_ID")]
        owner: Uuid,
        #[arg(long)]
        public: bool,
    },
    List {
        #[arg(long)]
        owner: Option<Uuid>,
    },
    Show {
        room_id: Uuid,
    },
}

#[derive(Args, Debug)]
struct SnapshotCommand {
    #[command(subcommand)]
    command: SnapshotSubcommand,
}

#[derive(Subcommand, Debug)]
enum SnapshotSubcommand {
    /// Write a room's stored drawing as a PNG file.
    Export {
        room_id: Uuid,
        #[arg(long)]
        out: PathBuf,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Command::Rooms(rooms) => run_rooms(&config, rooms).await,
        Command::Snapshot(snapshot) => run_snapshot(&config, snapshot).await,
        Command::Demo => run_demo(&config).await,
    }
}

async fn pg_store(config: &Config) -> Result<PgRowStore, CliError> {
    let url = config.database_url.as_deref().ok_or(CliError::MissingDatabaseUrl)?;
    let pool = db::init_pool(url, config.db_max_connections).await?;
    Ok(PgRowStore::new(pool, config.channel_capacity))
}

// =============================================================================
// ROOMS
// =============================================================================

async fn run_rooms(config: &Config, rooms: RoomsCommand) -> Result<(), CliError> {
    let store = pg_store(config).await?;
    match rooms.command {
        RoomsSubcommand::Create { name, owner, public } => {
            let created = room::create_room(&store, &name, owner, public).await?;
            print_json(&room_summary(&created)?)
        }
        RoomsSubcommand::List { owner } => {
            let rooms = match owner {
                Some(owner) => room::list_user_rooms(&store, owner).await?,
                None => room::list_rooms(&store).await?,
            };
            let summaries = rooms.iter().map(room_summary).collect::<Result<Vec<_>, _>>()?;
            print_json(&Value::Array(summaries))
        }
        RoomsSubcommand::Show { room_id } => {
            let found = room::fetch_room(&store, room_id).await?;
            print_json(&room_summary(&found)?)
        }
    }
}

/// Room as JSON with the drawing replaced by its size.
fn room_summary(room: &Room) -> Result<Value, CliError> {
    let mut value = serde_json::to_value(room)?;
    if let Some(obj) = value.as_object_mut() {
        let drawing = room
            .drawing
            .as_ref()
            .map_or(Value::Null, |d| json!({ "bytes": d.as_str().len() }));
        obj.insert("drawing".into(), drawing);
    }
    Ok(value)
}

// =============================================================================
// SNAPSHOT
// =============================================================================

async fn run_snapshot(config: &Config, snapshot: SnapshotCommand) -> Result<(), CliError> {
    let store = pg_store(config).await?;
    match snapshot.command {
        SnapshotSubcommand::Export { room_id, out } => {
            let found = room::fetch_room(&store, room_id).await?;
            let drawing = found.drawing.ok_or(CliError::NoDrawing(room_id))?;
            let bytes = drawing.png_bytes()?;
            std::fs::write(&out, &bytes)?;
            eprintln!("wrote {} bytes to {}", bytes.len(), out.display());
            Ok(())
        }
    }
}

// =============================================================================
// DEMO
// =============================================================================

fn random_color() -> String {
    let [r, g, b]: [u8; 3] = rand::rng().random();
    format!("#{r:02x}{g:02x}{b:02x}")
}

fn demo_user(name: &str) -> SessionUser {
    SessionUser {
        user_id: Uuid::new_v4(),
        metadata: UserMetadata { user_color: Some(random_color()), name: Some(name.to_owned()) },
    }
}

fn demo_backend(store: &Arc<MemoryRowStore>, hub: &MemoryHub, me: &SessionUser, peers: &[&SessionUser]) -> Backend {
    let mut identity = MemoryIdentity::new().with_session(me.clone());
    for user in std::iter::once(me).chain(peers.iter().copied()) {
        identity = identity.with_profile(Profile { id: user.user_id, metadata: user.metadata.clone() });
    }
    Backend::new(store.clone(), Arc::new(hub.clone()), Arc::new(identity))
}

async fn run_demo(config: &Config) -> Result<(), CliError> {
    let store = Arc::new(MemoryRowStore::with_capacity(config.channel_capacity));
    let hub = MemoryHub::with_capacity(config.channel_capacity);
    let alice = demo_user("alice");
    let bob = demo_user("bob");

    let shared = room::create_room(store.as_ref(), "demo", alice.user_id, true).await?;
    let alice_board = Arc::new(Board::new(config.canvas_width, config.canvas_height));
    let bob_board = Arc::new(Board::new(config.canvas_width, config.canvas_height));
    let options: SessionOptions = config.session_options();
    // Every drawing write to the room shows up here.
    let mut writes = store
        .subscribe(ROOMS_TABLE, Filter::new().eq("id", shared.id.to_string()))
        .await?;

    let alice_session =
        RoomSession::enter(&demo_backend(&store, &hub, &alice, &[&bob]), shared.id, alice_board.clone(), options)
            .await?;
    let bob_session =
        RoomSession::enter(&demo_backend(&store, &hub, &bob, &[&alice]), shared.id, bob_board.clone(), options)
            .await?;

    // PHASE: CURSORS
    bob_session.pointer_move(Point::new(200.0, 150.0));
    alice_session.pointer_move(Point::new(40.0, 40.0));
    sleep(std::time::Duration::from_millis(50)).await;

    // PHASE: STROKE
    alice_session.set_pen(DrawingPen { size: 6.0, color: alice.metadata.user_color.clone().unwrap_or_default() });
    alice_session.pointer_down(Point::new(40.0, 40.0));
    for i in 1..=20 {
        let x = 40.0 + f64::from(i) * 20.0;
        let y = 40.0 + if i % 2 == 0 { 0.0 } else { 30.0 };
        alice_session.pointer_move(Point::new(x, y));
    }
    alice_session.pointer_up();
    sleep(config.quiet_interval() + std::time::Duration::from_millis(200)).await;

    let mut persisted_writes = 0_usize;
    while let Ok(change) = writes.try_recv() {
        if change.new_record.get("drawing").is_some_and(Value::is_string) {
            persisted_writes += 1;
        }
    }
    let synced = bob_board.snapshot() == alice_board.snapshot();
    print_json(&json!({
        "room": shared.id,
        "persisted_writes": persisted_writes,
        "alice_sees_bob": alice_board.marker(bob.user_id).map(|m| json!({"x": m.position.x, "y": m.position.y, "color": m.color})),
        "bob_sees_alice": bob_board.has_marker(alice.user_id),
        "canvases_in_sync": synced,
    }))?;

    alice_session.leave();
    bob_session.leave();
    Ok(())
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
