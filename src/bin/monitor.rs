use std::sync::Arc;

use clap::Parser;
use node_monitor::{
    clock::SystemClock,
    config::load_config,
    service,
    tools::SystemTools,
    util::{get_hostname, get_log_level},
};
use tracing::{debug, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Name shown in front of every record (defaults to the hostname)
    #[arg(long = "diag-hostname")]
    diag_hostname: Option<String>,
}

fn init() {
    dotenv::dotenv().ok();

    let level = get_log_level();
    let filter = filter::Targets::new().with_targets(vec![("node_monitor", level)]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = load_config()?.resolve(get_hostname(), args.diag_hostname);
    debug!("resolved config: {config:?}");

    let shutdown = service::shutdown_signal()?;
    if !service::run(&config, Arc::new(SystemTools), Arc::new(SystemClock), shutdown).await {
        debug!("not attached, exiting");
    }

    Ok(())
}
