use std::net::SocketAddr;

use clap::Parser;
use flowchat_core::ai::langflow::DEFAULT_LANGFLOW_URL;
use flowchat_proxy::{spawn_proxy, ProxyConfig, DEFAULT_LISTEN};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "CORS-forwarding proxy for hosted Langflow flows")]
struct Args {
    #[arg(long, env = "FLOWCHAT_PROXY_LISTEN", default_value = DEFAULT_LISTEN)]
    listen: SocketAddr,
    #[arg(long, env = "LANGFLOW_URL", default_value = DEFAULT_LANGFLOW_URL)]
    upstream: String,
    #[arg(long, env = "FLOW_ID")]
    flow_id: String,
    #[arg(long, env = "GRAPH_ID")]
    graph_id: String,
    /// Bearer token sent when the caller supplies no Authorization header
    #[arg(long, env = "ASTRA_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .compact()
        .init();

    let config = ProxyConfig::new(args.listen, &args.upstream, &args.flow_id, &args.graph_id)
        .with_token(args.token);
    if config.token.is_none() {
        warn!("no ASTRA_TOKEN configured; requests without Authorization are forwarded unauthenticated");
    }

    let (bound_addr, handle) = match spawn_proxy(config, async {
        let _ = tokio::signal::ctrl_c().await;
    }) {
        Ok(res) => res,
        Err(err) => {
            error!(error = %err, "failed to start proxy");
            std::process::exit(1);
        }
    };

    info!(listen = %bound_addr, upstream = %args.upstream, flow_id = %args.flow_id, "flowchat proxy ready");

    if let Err(err) = handle.await {
        error!(error = %err, "proxy task exited unexpectedly");
        std::process::exit(1);
    }
}
