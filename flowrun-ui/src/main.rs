//! Flow-run UI server - ingests runner sockets and serves reduced views.

mod relay;
mod routes;
mod sse;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use axum::Router;
use axum::routing::get;
use clap::Parser;
use flowrun::io::config::{DEFAULT_CONFIG_FILE, load_config};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::info;

use crate::state::AppState;

#[derive(Parser)]
#[command(name = "flowrun-ui")]
#[command(about = "Live execution view for flow runs")]
struct Args {
    /// Config file (defaults apply when missing)
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Address to bind the server to (overrides server.bind)
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on (overrides server.port)
    #[arg(long)]
    port: Option<u16>,

    /// Directory containing UI static files
    #[arg(long)]
    ui_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    flowrun::logging::init("flowrun_ui=info,flowrun=info,warn");

    let args = Args::parse();

    let mut config = load_config(&args.config)?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.validate()?;

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .context("parse listen address")?;
    info!(config = %args.config.display(), "starting flowrun-ui");

    let state = AppState::new(config);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = Router::new()
        .nest("/api", routes::api_router())
        .route("/events", get(sse::events_handler))
        .layer(cors)
        .with_state(state);

    if let Some(ui_dir) = args.ui_dir {
        if ui_dir.exists() {
            info!(ui_dir = %ui_dir.display(), "serving static UI files");
            app = app
                .fallback_service(ServeDir::new(ui_dir).append_index_html_on_directories(true));
        } else {
            info!(ui_dir = %ui_dir.display(), "UI directory not found, API-only mode");
        }
    }

    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_are_optional() {
        let args = Args::parse_from(["flowrun-ui"]);
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_FILE));
        assert!(args.bind.is_none());
        assert!(args.port.is_none());

        let args = Args::parse_from(["flowrun-ui", "--port", "4000", "--bind", "0.0.0.0"]);
        assert_eq!(args.port, Some(4000));
        assert_eq!(args.bind.as_deref(), Some("0.0.0.0"));
    }
}
