//! Mood Host - native-messaging collaborator for the page engine
//!
//! Reads length-prefixed `CLASSIFY_MOOD` / `SUMMARISE_TEXT` requests from the
//! browser on stdin and writes one reply per request on stdout. Rules run
//! in-process; model classification and summaries go through the configured
//! proxy. Logs go to stderr so stdout carries frames only.

use declutterer::native::serve_frames;
use declutterer::{Config, LocalBackend, ProxyClient};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = match std::env::args().nth(1).as_deref() {
        Some("--config") | Some("-c") => std::env::args().nth(2).map(PathBuf::from),
        _ => None,
    };
    let (config, origin) =
        Config::read_from_path(path.unwrap_or_else(Config::default_config_path));

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.general.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    origin.log();

    let proxy = ProxyClient::from_config(&config.proxy).unwrap_or_else(|e| {
        warn!("Proxy unavailable, rules only: {}", e);
        None
    });
    if let Some(p) = &proxy {
        info!("Using classification proxy at {}", p.endpoint());
    }
    let backend = LocalBackend::new(config.classifier, proxy);
    info!(
        "Mood host started, {}",
        if backend.has_proxy() {
            "model requests go to the proxy"
        } else {
            "rules only"
        }
    );

    let mut stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    match serve_frames(&backend, &mut stdin, &mut stdout).await {
        Ok(answered) => info!("Connection closed after {} requests", answered),
        Err(e) => {
            error!("Native messaging error: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
