use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fzd::output::print_results;
use fzd::search::{MatchResult, Origin, SearchService, SortOrder};
use fzd::server::{run_foreground, ClientError, SearchClient};
use fzd::utils::AppConfig;
use std::io::{self, BufRead, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "fzd")]
#[command(about = "Fuzzy-filter daemon: keeps candidate lists in memory and filters them on request")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Unix socket of the daemon (overrides the config file)
    #[arg(long, global = true, conflicts_with = "tcp")]
    socket: Option<PathBuf>,

    /// Loopback TCP address of the daemon, e.g. 127.0.0.1:7787
    #[arg(long, global = true)]
    tcp: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daemon in the foreground
    Serve {
        /// Serve each connection on its own thread
        #[arg(long)]
        concurrent: bool,
    },
    /// Replace the target list ('-' reads items from stdin)
    SetList {
        #[arg(required = true)]
        items: Vec<String>,
    },
    /// Replace the command list ('-' reads items from stdin)
    SetCommandList {
        #[arg(required = true)]
        items: Vec<String>,
    },
    /// Filter both lists and print the matches
    Filter {
        pattern: String,

        /// Best match first
        #[arg(short, long)]
        reverse: bool,
    },
    /// Show daemon statistics
    Status,
    /// Check that the daemon answers
    Ping,
    /// Stop the running daemon
    Stop,
    /// Score candidates locally without a daemon
    Match {
        pattern: String,

        #[arg(required = true)]
        candidates: Vec<String>,

        /// Best match first
        #[arg(short, long)]
        reverse: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let mut config = AppConfig::load()?;
    if let Some(path) = cli.socket {
        config.socket_path = Some(path);
        config.tcp_addr = None;
    }
    if let Some(addr) = cli.tcp {
        config.tcp_addr = Some(addr);
    }

    match cli.command {
        Commands::Serve { concurrent } => {
            if concurrent {
                config.concurrent_connections = true;
            }
            let options = config.to_server_options()?;
            info!(endpoint = %options.endpoint, "starting fzd");
            let service = Arc::new(SearchService::new(config.parallel_threshold));
            run_foreground(service, options)?;
        }
        Commands::SetList { items } => {
            let items = read_items(items)?;
            let stored = connect(&config)?.set_list(items)?;
            println!("{}", stored);
        }
        Commands::SetCommandList { items } => {
            let items = read_items(items)?;
            let stored = connect(&config)?.set_command_list(items)?;
            println!("{}", stored);
        }
        Commands::Filter { pattern, reverse } => {
            let results = connect(&config)?.filter_sorted(&pattern, sort_order(reverse))?;
            print_results(&results, io::stdout().is_terminal())?;
        }
        Commands::Status => {
            let status = connect(&config)?.status()?;
            println!("fzd daemon status:");
            println!("  Uptime: {}s", status.uptime_secs);
            println!("  List items: {}", status.list_len);
            println!("  Command items: {}", status.command_len);
            println!("  Filters served: {}", status.filters_served);
            println!("  Lists replaced: {}", status.lists_replaced);
        }
        Commands::Ping => {
            println!("{}", connect(&config)?.ping()?);
        }
        Commands::Stop => match SearchClient::connect(&config.endpoint()?) {
            Ok(mut client) => {
                client.shutdown()?;
                println!("Daemon stopped");
            }
            Err(ClientError::NotRunning) => println!("Daemon is not running"),
            Err(e) => return Err(e.into()),
        },
        Commands::Match {
            pattern,
            candidates,
            reverse,
        } => {
            let results = match_locally(&pattern, candidates, sort_order(reverse));
            print_results(&results, io::stdout().is_terminal())?;
        }
    }

    Ok(())
}

fn init_logging(debug: bool) {
    let level = if debug { LevelFilter::DEBUG } else { LevelFilter::INFO };
    let filter = EnvFilter::try_from_env("FZD_LOG")
        .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(io::stderr)
        .compact()
        .init();
}

fn connect(config: &AppConfig) -> Result<SearchClient> {
    let endpoint = config.endpoint()?;
    match SearchClient::connect(&endpoint) {
        Ok(client) => Ok(client),
        Err(ClientError::NotRunning) => {
            bail!("Daemon is not running at {}. Start it with 'fzd serve'", endpoint)
        }
        Err(e) => Err(e).with_context(|| format!("Failed to connect to {}", endpoint)),
    }
}

/// A lone `-` means newline-separated items on stdin
fn read_items(items: Vec<String>) -> Result<Vec<String>> {
    if items.len() != 1 || items[0] != "-" {
        return Ok(items);
    }
    io::stdin()
        .lock()
        .lines()
        .collect::<io::Result<Vec<_>>>()
        .context("Failed to read items from stdin")
}

fn sort_order(reverse: bool) -> SortOrder {
    if reverse {
        SortOrder::Descending
    } else {
        SortOrder::Ascending
    }
}

fn match_locally(pattern: &str, candidates: Vec<String>, order: SortOrder) -> Vec<MatchResult> {
    let service = SearchService::default();
    service.set_list(Origin::List, candidates);
    service.filter_sorted(pattern, order)
}
