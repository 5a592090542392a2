//! Binary entrypoint for the Meshmap CLI.
//!
//! Commands:
//! - `init` - write a starter `config.toml`
//! - `status` - print the controller's discovery status
//! - `discover [--refresh]` - start (or refresh) a discovery run if none is in progress
//! - `nodes [--legacy]` / `links [--node <id>]` / `neighbors` - list the controller's inventories
//! - `graph [--pretty]` - print the projected topology graph as JSON
//! - `watch [--ticks <n>]` - run the sync scheduler and log changes until Ctrl-C
//!
//! See the library crate docs for module-level details: `meshmap::`.
use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::sync::Arc;

use meshmap::api::{ControllerApi, HttpControllerApi, ListQuery};
use meshmap::config::Config;
use meshmap::discovery::DiscoveryController;
use meshmap::error::DiscoveryError;
use meshmap::logutil::escape_log;
use meshmap::model::{format_legacy_node_id, format_node_id, normalize_node_label, parse_node_id};
use meshmap::store::TopologyStore;
use meshmap::sync::{start_sync, SyncConfig};

#[derive(Parser)]
#[command(name = "meshmap")]
#[command(about = "Discovery and topology sync client for meshmesh network controllers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,
    /// Show the controller's discovery status
    Status,
    /// Start a discovery run
    Discover {
        /// Re-probe from the current network instead of starting over
        #[arg(short, long)]
        refresh: bool,
    },
    /// List nodes known to the controller
    Nodes {
        /// Show ids in the older 0x form
        #[arg(short, long)]
        legacy: bool,
    },
    /// List links known to the controller
    Links {
        /// Only links touching this node (N0000FF, 0xFF or 255)
        #[arg(short, long)]
        node: Option<String>,
    },
    /// List probe results of the current discovery run
    Neighbors,
    /// Print the projected topology graph as JSON
    Graph {
        /// Pretty-print the JSON
        #[arg(short, long)]
        pretty: bool,
    },
    /// Keep the topology in sync and log changes
    Watch {
        /// Stop after this many scheduler ticks instead of waiting for Ctrl-C
        #[arg(short, long)]
        ticks: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Init = cli.command {
        init_logging(&None, cli.verbose);
        Config::create_default(&cli.config).await?;
        info!("Configuration file created at {}", cli.config);
        return Ok(());
    }

    let config = Config::load(&cli.config).await?;
    init_logging(&Some(config.clone()), cli.verbose);
    let api = HttpControllerApi::new(&config.controller)?;
    info!("Using controller at {}", api.api_root());

    match cli.command {
        Commands::Init => {}
        Commands::Status => {
            let mut discovery = DiscoveryController::new();
            let status = discovery.poll(&api).await?;
            println!("{}", status);
        }
        Commands::Discover { refresh } => {
            let mut discovery = DiscoveryController::new();
            discovery.poll(&api).await?;
            let result = if refresh {
                discovery.refresh(&api).await
            } else {
                discovery.start(&api).await
            };
            match result {
                Ok(()) => {
                    let status = discovery.poll(&api).await?;
                    println!("{}", status);
                }
                Err(DiscoveryError::Rejected(reason)) => {
                    warn!("Not sending discovery command: {}", reason);
                    std::process::exit(1);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Nodes { legacy } => {
            let page = api.list_nodes(&ListQuery::all()).await?;
            let render_id: fn(u32) -> String = if legacy {
                format_legacy_node_id
            } else {
                format_node_id
            };
            for node in &page.items {
                println!(
                    "{:<9} {:<20} {}{}",
                    render_id(node.id),
                    escape_log(&normalize_node_label(&node.tag)),
                    if node.in_use { "in-use" } else { "unused" },
                    if node.is_local { " (local)" } else { "" }
                );
            }
            print_total(page.items.len(), page.total);
        }
        Commands::Links { node } => {
            let mut query = ListQuery::all();
            if let Some(text) = node {
                let id = parse_node_id(&text)
                    .ok_or_else(|| anyhow::anyhow!("invalid node id '{}'", text))?;
                query = query.with_filter("any", id);
            }
            let page = api.list_links(&query).await?;
            for link in &page.items {
                let note = match link.mismatched_id_endpoints() {
                    Some((from, to)) => format!(
                        "  (id encodes {} -> {})",
                        format_node_id(from),
                        format_node_id(to)
                    ),
                    None => String::new(),
                };
                println!(
                    "{:<10} {} -> {}  weight {}{}",
                    link.id,
                    format_node_id(link.from),
                    format_node_id(link.to),
                    link.weight,
                    note
                );
            }
            print_total(page.items.len(), page.total);
        }
        Commands::Neighbors => {
            let page = api.list_neighbors(&ListQuery::all()).await?;
            for neighbor in &page.items {
                println!(
                    "{}  current {:.3} next {:.3} delta {:.3}",
                    format_node_id(neighbor.id),
                    neighbor.current,
                    neighbor.next,
                    neighbor.delta
                );
            }
            print_total(page.items.len(), page.total);
        }
        Commands::Graph { pretty } => {
            let query = ListQuery::all();
            let (nodes, links) = tokio::try_join!(api.list_nodes(&query), api.list_links(&query))?;
            let mut store = TopologyStore::new();
            store.set_nodes(nodes.items);
            store.set_links(links.items);
            if store.dangling_links() > 0 {
                warn!(
                    "{} link(s) reference unknown nodes and were left out",
                    store.dangling_links()
                );
            }
            let graph = store.current_graph();
            let json = if pretty {
                serde_json::to_string_pretty(graph)?
            } else {
                serde_json::to_string(graph)?
            };
            println!("{}", json);
        }
        Commands::Watch { ticks } => {
            run_watch(config, api, ticks).await?;
        }
    }

    Ok(())
}

fn print_total(shown: usize, total: Option<u64>) {
    match total {
        Some(total) => println!("{} of {} record(s)", shown, total),
        None => println!("{} record(s)", shown),
    }
}

async fn run_watch(config: Config, api: HttpControllerApi, ticks: Option<u64>) -> Result<()> {
    let sync = start_sync(SyncConfig::from(&config.sync), Arc::new(api));
    let mut graph_rx = sync.subscribe();
    let mut last_discovery = None;
    let mut report = tokio::time::interval(config.sync.poll_interval());
    report.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    loop {
        tokio::select! {
            changed = graph_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let graph = graph_rx.borrow_and_update().clone();
                info!("Topology: {} node(s), {} edge(s)", graph.nodes.len(), graph.edges.len());
            }
            _ = report.tick() => {
                let snapshot = sync.snapshot().await?;
                if let Some(status) = snapshot.discovery {
                    if last_discovery.as_ref() != Some(&status) {
                        info!("{}", status);
                        last_discovery = Some(status);
                    }
                }
                if let Some(limit) = ticks {
                    if sync.metrics().ticks >= limit {
                        break;
                    }
                }
            }
            _ = &mut interrupted => {
                info!("Interrupted, stopping sync");
                break;
            }
        }
    }

    sync.shutdown().await;
    let m = sync.metrics();
    info!(
        "Sync stopped after {} tick(s): {} request(s), {} skipped, {} failure(s), {} stale response(s) dropped",
        m.ticks,
        m.requests_total(),
        m.fetches_skipped,
        m.failures,
        m.stale_discarded
    );
    Ok(())
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match (verbosity, config) {
        (0, Some(cfg)) => cfg.logging.level_filter(),
        (0, None) => log::LevelFilter::Info,
        (1, _) => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config
        .as_ref()
        .and_then(|cfg| cfg.logging.file.as_ref())
        .and_then(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        });

    if let Some(f) = log_file {
        let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
        // Console output only when attached to a terminal
        let is_tty = atty::is(atty::Stream::Stdout);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if let Ok(mut guard) = write_mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
        });
    }
    let _ = builder.try_init();
}
