//! Grocery
//!
//! Command-line client for a shared grocery list. Every command subscribes
//! to the remote collection, waits for the first snapshot, acts on the
//! mirrored list and then unsubscribes. `watch` stays subscribed and
//! redraws the list on every change until interrupted.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use core_config::tracing::{init_tracing, install_color_eyre};
use domain_groceries::{
    ConnectionState, Confirmed, GroceryCommands, GroceryStore, InMemoryCollection, ItemId,
    MongoCollection, NewItem, PrintDocument, RemoteCollection, SortConfig, SortKey, WriteOutcome,
};
use eyre::{Result, bail, eyre};
use tokio::signal;
use tracing::{info, warn};

mod config;
mod table;

use config::{Backend, Config};

#[derive(Parser)]
#[command(name = "grocery")]
#[command(about = "Shared grocery list kept in sync with a remote collection")]
struct Cli {
    /// Storage backend (overrides GROCERY_BACKEND)
    #[arg(long, global = true)]
    backend: Option<Backend>,

    /// Collection holding the list (overrides GROCERY_COLLECTION)
    #[arg(long, global = true)]
    collection: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Copy)]
struct SortArgs {
    /// Column to sort by: none, name, size or status
    #[arg(short, long, default_value_t = SortKey::None)]
    sort: SortKey,

    /// Sort in descending order
    #[arg(long)]
    desc: bool,
}

impl From<SortArgs> for SortConfig {
    fn from(args: SortArgs) -> Self {
        if args.desc {
            SortConfig::descending(args.sort)
        } else {
            SortConfig::ascending(args.sort)
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show the list
    List {
        #[command(flatten)]
        sort: SortArgs,

        /// Print rows as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the list and redraw it on every change
    Watch {
        #[command(flatten)]
        sort: SortArgs,
    },

    /// Add an item
    Add {
        name: String,

        /// Free-text size, e.g. "1 Litre"
        #[arg(short, long, default_value = "")]
        size: String,
    },

    /// Mark an item as picked
    Pick { id: String },

    /// Mark an item as not picked
    Unpick { id: String },

    /// Set the notes of an item; omit TEXT to clear them
    Notes { id: String, text: Option<String> },

    /// Delete an item
    Delete {
        id: String,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Clear status and notes of every item
    Reset {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Render a printable HTML page of the list
    Print {
        #[command(flatten)]
        sort: SortArgs,

        /// Write to FILE instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Page heading
        #[arg(short, long)]
        title: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    install_color_eyre();

    let config = Config::from_env()?;
    init_tracing(&config.environment);

    let cli = Cli::parse();
    let backend = cli.backend.unwrap_or(config.backend);
    let collection = cli.collection.unwrap_or_else(|| config.collection.clone());

    info!(%backend, %collection, "Starting grocery");

    match backend {
        Backend::Mongodb => {
            let mongodb = config
                .mongodb
                .as_ref()
                .ok_or_else(|| eyre!("MONGODB_URL or MONGO_URL must be set for the mongodb backend"))?;
            let remote = MongoCollection::connect(mongodb, &collection).await?;
            run(remote, cli.command, config.snapshot_timeout).await
        }
        Backend::Memory => {
            warn!("In-memory backend: changes are lost when the command exits");
            let remote = InMemoryCollection::seeded(&collection, sample_items());
            run(remote, cli.command, config.snapshot_timeout).await
        }
    }
}

fn sample_items() -> Vec<NewItem> {
    vec![
        NewItem::new("Milk", "1 Litre"),
        NewItem::new("Bread", "500 g"),
        NewItem::new("Rice", "5 kg"),
        NewItem::new("Eggs", "12"),
    ]
}

async fn run<R: RemoteCollection + 'static>(
    remote: R,
    command: Commands,
    snapshot_timeout: Duration,
) -> Result<()> {
    let store = GroceryStore::new(remote);
    store.subscribe().await?;

    let result = match wait_for_first_snapshot(&store, snapshot_timeout).await {
        Ok(()) => execute(&store, command).await,
        Err(e) => Err(e),
    };

    store.unsubscribe().await;
    result
}

async fn wait_for_first_snapshot<R: RemoteCollection + 'static>(
    store: &GroceryStore<R>,
    timeout: Duration,
) -> Result<()> {
    let mut changes = store.changes();
    tokio::time::timeout(
        timeout,
        changes.wait_for(|s| {
            s.snapshots_received() > 0 || s.connection() == ConnectionState::Disconnected
        }),
    )
    .await
    .map_err(|_| eyre!("No snapshot from the collection within {}s", timeout.as_secs()))?
    .map_err(|_| eyre!("Store closed before the first snapshot"))?;

    if store.connection_state() != ConnectionState::Synced {
        bail!("Subscription ended before the first snapshot");
    }
    Ok(())
}

async fn execute<R: RemoteCollection + 'static>(
    store: &GroceryStore<R>,
    command: Commands,
) -> Result<()> {
    let commands = GroceryCommands::new(store);

    match command {
        Commands::List { sort, json } => {
            let rows = store.project(sort.into());
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                print!("{}", table::render(&rows));
            }
        }

        Commands::Watch { sort } => watch(store, sort.into()).await?,

        Commands::Add { name, size } => match commands.add(&name, &size).await? {
            WriteOutcome::Acknowledged(id) => println!("Added {name} ({id})"),
            WriteOutcome::Failed => bail!("Adding {name} was not acknowledged"),
        },

        Commands::Pick { id } => {
            let outcome = commands.toggle_picked(&ItemId::from(id), true).await?;
            expect_acknowledged(outcome, "Status update")?;
        }

        Commands::Unpick { id } => {
            let outcome = commands.toggle_picked(&ItemId::from(id), false).await?;
            expect_acknowledged(outcome, "Status update")?;
        }

        Commands::Notes { id, text } => {
            let outcome = commands
                .commit_notes(&ItemId::from(id), text.as_deref().unwrap_or_default())
                .await?;
            expect_acknowledged(outcome, "Notes update")?;
        }

        Commands::Delete { id, yes } => {
            match commands.delete(&ItemId::from(id), &confirmer(yes)).await? {
                Confirmed::Done(outcome) => expect_acknowledged(outcome, "Delete")?,
                Confirmed::Cancelled => println!("Cancelled"),
            }
        }

        Commands::Reset { yes } => match commands.reset_all(&confirmer(yes)).await {
            Confirmed::Done(report) => {
                println!("Reset {} item(s)", report.acknowledged);
                if report.failed > 0 {
                    bail!("{} item(s) could not be reset", report.failed);
                }
            }
            Confirmed::Cancelled => println!("Cancelled"),
        },

        Commands::Print {
            sort,
            output,
            title,
        } => {
            let rows = store.project(sort.into());
            let mut document = PrintDocument::new(&rows);
            if let Some(title) = title {
                document = document.with_title(title);
            }
            let html = document.render_html();

            match output {
                Some(path) => {
                    std::fs::write(&path, html)?;
                    info!(path = %path.display(), rows = rows.len(), "Print page written");
                }
                None => print!("{html}"),
            }
        }
    }

    Ok(())
}

fn expect_acknowledged(outcome: WriteOutcome, action: &str) -> Result<()> {
    match outcome {
        WriteOutcome::Acknowledged(()) => Ok(()),
        WriteOutcome::Failed => bail!("{action} was not acknowledged by the collection"),
    }
}

/// Confirmation read from the terminal, skipped entirely with `--yes`
fn confirmer(assume_yes: bool) -> impl Fn(&str) -> bool {
    move |prompt| assume_yes || ask(prompt)
}

fn ask(prompt: &str) -> bool {
    eprint!("{prompt} [y/N] ");
    let _ = std::io::stderr().flush();

    let mut answer = String::new();
    if std::io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

async fn watch<R: RemoteCollection + 'static>(store: &GroceryStore<R>, sort: SortConfig) -> Result<()> {
    let mut changes = store.changes();
    let rows = changes.borrow_and_update().project(sort);
    print!("{}", table::render(&rows));

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => return result,
            changed = changes.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let (rows, connection) = {
                    let state = changes.borrow_and_update();
                    (state.project(sort), state.connection())
                };
                if connection == ConnectionState::Disconnected {
                    bail!("Subscription to the collection ended");
                }
                println!();
                print!("{}", table::render(&rows));
            }
        }
    }
}

async fn shutdown_signal() -> Result<()> {
    let ctrl_c = signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())?
            .recv()
            .await;
        Ok::<(), std::io::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<std::io::Result<()>>();

    tokio::select! {
        result = ctrl_c => {
            result?;
            info!("Received Ctrl+C, shutting down...");
        },
        result = terminate => {
            result?;
            info!("Received SIGTERM, shutting down...");
        },
    }

    Ok(())
}
