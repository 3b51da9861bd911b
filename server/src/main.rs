use clap::Parser;
use log::info;
use server::network::{Server, ServerConfig, DEFAULT_PORT};
use server::BoxError;
use std::path::PathBuf;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Directory holding the browser client
    #[arg(long, default_value = "public")]
    public_dir: PathBuf,

    /// Maximum concurrent players
    #[arg(short, long, default_value = "100")]
    max_clients: usize,

    /// Serve only static files and the status endpoint, no game
    #[arg(long)]
    simple: bool,

    /// Seed for player id and color assignment
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = ServerConfig {
        addr: format!("{}:{}", args.host, args.port),
        public_dir: args.public_dir,
        max_clients: args.max_clients,
        simple: args.simple,
        seed: args.seed,
    };

    if config.simple {
        info!("Starting in HTTP-only mode");
    }
    info!("Open http://localhost:{} in a browser", args.port);

    let mut server = Server::new(config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
