//! Declutter - run the engine over a page snapshot
//!
//! Loads a page snapshot, resolves the site adapter for the given host, runs
//! the engine until every pass and reply has settled, and prints the
//! resulting page as JSON on stdout. Logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! declutter --host open.spotify.com --page page.json
//! declutter --host open.spotify.com --page page.json --settings '{"moodFilterEnabled": true}'
//! declutter --host open.spotify.com --page page.json --teardown
//! ```

use declutterer::{
    AdapterRegistry, Config, ContentMessage, Document, LocalBackend, MessageChannel, Orchestrator, PageSnapshot,
    PartialSettings, ProxyClient,
};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command line options
#[derive(Debug, Default)]
struct CliArgs {
    host: Option<String>,
    /// Snapshot path, `-` or absent for stdin
    page: Option<PathBuf>,
    /// Inline JSON or a path to a JSON file
    settings: Option<String>,
    config_path: Option<PathBuf>,
    teardown: bool,
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-v" => {
                println!("declutter v{}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--host" => {
                i += 1;
                if i < args.len() {
                    cli.host = Some(args[i].clone());
                }
            }
            "--page" | "-p" => {
                i += 1;
                if i < args.len() {
                    cli.page = Some(PathBuf::from(&args[i]));
                }
            }
            "--settings" | "-s" => {
                i += 1;
                if i < args.len() {
                    cli.settings = Some(args[i].clone());
                }
            }
            "--config" | "-c" => {
                i += 1;
                if i < args.len() {
                    cli.config_path = Some(PathBuf::from(&args[i]));
                }
            }
            "--teardown" => {
                cli.teardown = true;
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                eprintln!("Use --help for usage information.");
                std::process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

fn print_help() {
    let sites: Vec<String> = AdapterRegistry::new().keys().map(str::to_string).collect();
    println!(
        r#"declutter - declutter and mood-filter a music-streaming page snapshot

USAGE:
    declutter --host <HOST> [OPTIONS]

OPTIONS:
    -h, --help              Show this help message
    -v, --version           Show version
    --host <HOST>           Hostname or URL the page was served from
    -p, --page <PATH>       Page snapshot JSON (default: stdin)
    -s, --settings <JSON>   Settings update, inline JSON or a file path
    -c, --config <PATH>     Path to configuration file
    --teardown              Reverse everything after settling

SUPPORTED SITES:
    {}

ENVIRONMENT:
    RUST_LOG                Log filter (default: general.log_level)
    DECLUTTER_PROXY_SECRET  Shared secret for the classification proxy
"#,
        sites.join(", ")
    );
}

fn read_page(path: Option<&PathBuf>) -> Result<PageSnapshot, Box<dyn std::error::Error>> {
    match path {
        Some(path) if path.as_os_str() != "-" => Ok(PageSnapshot::from_path(path)?),
        _ => {
            let mut json = String::new();
            std::io::stdin().read_to_string(&mut json)?;
            Ok(PageSnapshot::from_json(&json)?)
        }
    }
}

fn read_settings(raw: &str) -> Result<PartialSettings, Box<dyn std::error::Error>> {
    let trimmed = raw.trim();
    let json = if trimmed.starts_with('{') {
        trimmed.to_string()
    } else {
        std::fs::read_to_string(trimmed)?
    };
    Ok(serde_json::from_str(&json)?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = parse_args();

    let (config, origin) = Config::read_from_path(
        cli.config_path
            .clone()
            .unwrap_or_else(Config::default_config_path),
    );

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.general.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    origin.log();

    let host = match cli.host.as_deref() {
        Some(host) => host.to_string(),
        None => {
            eprintln!("Missing --host. Use --help for usage information.");
            std::process::exit(1);
        }
    };

    let snapshot = read_page(cli.page.as_ref())?;
    let doc = Document::from_snapshot(&snapshot);

    if !config.general.enabled {
        info!("Engine disabled in configuration, page left untouched");
        println!("{}", doc.to_snapshot().to_json_pretty()?);
        return Ok(());
    }

    let proxy = ProxyClient::from_config(&config.proxy).unwrap_or_else(|e| {
        warn!("Proxy unavailable: {}", e);
        None
    });
    let backend = LocalBackend::new(config.classifier, proxy);
    if !backend.has_proxy() {
        info!("No classification proxy configured, model requests use rules");
    }
    let (channel, backend_task) = MessageChannel::spawn(Arc::new(backend));

    let mut engine = Orchestrator::new(doc, &host, &config, channel);
    let report = engine.start();
    info!("Initial pass: {:?}", report);

    if let Some(raw) = &cli.settings {
        let payload = read_settings(raw)?;
        let report = engine.handle_message(ContentMessage::ApplySettings { payload });
        info!("Settings pass: {:?}", report);
    }

    let handled = engine.settle().await;
    info!("Applied {} replies", handled);

    if cli.teardown {
        engine.teardown();
    }

    backend_task.abort();
    let doc = engine.into_document();
    println!("{}", doc.to_snapshot().to_json_pretty()?);
    Ok(())
}
