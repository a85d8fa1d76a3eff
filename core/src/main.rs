use clap::Parser;
use relaymq::{BrokerConfig, BrokerServer, Result};
use tokio::signal;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "relaymq")]
#[command(about = "A binary pub/sub event bus broker for CQRS applications")]
struct Args {
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    #[arg(short, long, default_value = "5672")]
    port: u16,

    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Directory for the durable event log; omit to keep events in memory
    #[arg(long)]
    data_dir: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(parse_log_level(&args.log_level))
        .init();

    info!("starting relaymq broker on {}:{}", args.host, args.port);
    match &args.data_dir {
        Some(dir) => info!("event log directory: {}", dir),
        None => info!("event log: in-memory"),
    }

    let config = BrokerConfig {
        host: args.host,
        port: args.port,
        data_dir: args.data_dir,
        ..Default::default()
    };

    let server = BrokerServer::new(config)?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("broker terminated: {}", e);
                return Err(e);
            }
        }
        _ = signal::ctrl_c() => {
            info!("received ctrl-c, shutting down");
            server.shutdown();
        }
    }

    Ok(())
}

fn parse_log_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
