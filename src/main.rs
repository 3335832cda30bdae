mod cli;

use hlsproxy::{cache::ContentCache, config, server, ProxyServer};
use hlsproxy_media::{decode_origin, encode_proxy_url, ProxyEndpoint};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::net::IpAddr;
use std::path::Path;

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    // Override host/port from CLI if specified
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config::validate_config(&config)?;

    tracing::info!("Starting hlsproxy");

    let server = ProxyServer::new(&config)?;
    let addr = server.start().await?;
    println!("hlsproxy listening on http://{}", addr);

    server::shutdown_signal().await;

    tracing::info!("Shutting down...");
    server.stop().await;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "hlsproxy=trace,hlsproxy_media=trace,hlsproxy_common=debug,tower_http=debug".to_string()
        } else {
            "hlsproxy=info,hlsproxy_media=info,tower_http=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Url { origin, port } => print_proxy_url(&origin, port, cli.config.as_deref()),
        Commands::ClearCache => clear_cache(cli.config.as_deref()),
        Commands::Stats { json } => show_stats(cli.config.as_deref(), json),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("hlsproxy {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn print_proxy_url(origin: &str, port: Option<u16>, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let host: IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("Invalid server host: {}", config.server.host))?;
    let endpoint = ProxyEndpoint::new(host, port.unwrap_or(config.server.port));

    let origin = url::Url::parse(origin).with_context(|| format!("Invalid URL: {}", origin))?;
    let proxy = encode_proxy_url(&origin, &endpoint)?;

    // Refuse to print URLs the proxy would reject.
    decode_origin(proxy.query())?;

    println!("{}", proxy);
    Ok(())
}

fn clear_cache(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let cache = ContentCache::open(&config.cache)?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(cache.clear())?;

    println!("✓ Cache cleared: {:?}", config.cache.resolved_dir());
    Ok(())
}

fn show_stats(config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let cache = ContentCache::open(&config.cache)?;
    let stats = cache.stats();

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("Cache directory: {:?}", config.cache.resolved_dir());
        println!(
            "  Disk: {} entries, {} / {} bytes",
            stats.disk_items, stats.disk_bytes, config.cache.disk_capacity_bytes
        );
        println!("  TTL: {}s", config.cache.ttl_secs);
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Cache dir: {:?}", config.cache.dir);
            println!("  Disk capacity: {} bytes", config.cache.disk_capacity_bytes);
            println!("  TTL: {}s", config.cache.ttl_secs);
            println!(
                "  Memory: {} items / {} bytes",
                config.cache.memory_max_items, config.cache.memory_max_cost_bytes
            );
            println!("  Upstream timeout: {}s", config.upstream.timeout_secs);
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Server: {}:{}", config.server.host, config.server.port);
        }
    }

    Ok(())
}
