mod commands;
mod config;
mod session;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use config::AppConfig;
use lap_store::{BEST_LIMIT, RECENT_LIMIT};
use model::BestLapFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Records personal-best laps from Le Mans Ultimate telemetry", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Config file, defaults to the per-user config.json when present
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Lap store file (newline-delimited JSON)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Listen for telemetry and save personal bests
    Listen(ListenArgs),
    /// Most recently recorded laps
    List {
        #[arg(short, long, default_value_t = RECENT_LIMIT)]
        limit: usize,
    },
    /// Fastest laps, optionally for one track and/or car
    Best {
        #[arg(short, long)]
        track: Option<String>,
        #[arg(short, long)]
        car: Option<String>,
        #[arg(short, long, default_value_t = BEST_LIMIT)]
        limit: usize,
    },
    /// Lap count, overall best and distinct tracks/cars
    Stats,
    /// Delete a lap by id
    Delete { id: u64 },
    /// Write all laps to a CSV file
    Export { path: PathBuf },
}

#[derive(Args, Debug)]
struct ListenArgs {
    /// UDP address to bind, e.g. 0.0.0.0:5000
    #[arg(short, long)]
    bind: Option<String>,
    /// Simulator tag stored with each lap
    #[arg(long)]
    sim: Option<String>,
    /// Timeout for each lap store call
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Reset lap detection when the lap counter drops or the track changes
    #[arg(long)]
    detect_session_change: bool,
}

impl ListenArgs {
    fn apply(self, cfg: &mut AppConfig) {
        if let Some(bind) = self.bind {
            cfg.bind_addr = bind;
        }
        if let Some(sim) = self.sim {
            cfg.sim = sim;
        }
        if let Some(ms) = self.timeout_ms {
            cfg.store_timeout_ms = ms;
        }
        cfg.detect_session_change |= self.detect_session_change;
    }
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = Cli::parse();
    let mut cfg = AppConfig::load(cli.config.as_deref())?;
    if let Some(store) = cli.store {
        cfg.store_path = Some(store);
    }

    let mut out = std::io::stdout();
    match cli.command {
        Commands::Listen(args) => {
            args.apply(&mut cfg);
            session::listen(&cfg).await
        }
        Commands::List { limit } => commands::list(&session::open_store(&cfg)?, limit, &mut out).await,
        Commands::Best { track, car, limit } => {
            let filter = BestLapFilter { track, car };
            commands::best(&session::open_store(&cfg)?, &filter, limit, &mut out).await
        }
        Commands::Stats => commands::stats(&session::open_store(&cfg)?, &mut out).await,
        Commands::Delete { id } => commands::delete(&session::open_store(&cfg)?, id, &mut out).await,
        Commands::Export { path } => commands::export(&session::open_store(&cfg)?, &path, &mut out).await,
    }
}
