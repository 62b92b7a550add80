#![cfg_attr(not(test), deny(clippy::panic))]

use clap::Parser;
use encore_server::auth::TokenAuthenticator;
use encore_server::catalog::StaticCatalog;
use encore_server::config;
use encore_server::logging;
use encore_server::server::GameServer;
use encore_server::store::MemoryStore;
use encore_server::websocket;
use std::net::SocketAddr;
use std::sync::Arc;

/// Encore -- real-time multiplayer server for musical party games
#[derive(Parser, Debug)]
#[command(name = "encore-server")]
#[command(about = "Real-time multiplayer WebSocket server for turn-based musical party games")]
#[command(version)]
struct Cli {
    /// Check the merged configuration and exit (non-zero on problems)
    /// without binding any sockets.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Dump the merged configuration as pretty JSON and exit. Shows what
    /// survived the config.json / env-override / defaults layering.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = Arc::new(config::load());

    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&*cfg)?);
        return Ok(());
    }

    // load() only warns about bad values so it can always return something;
    // both --validate-config and a normal start want a hard failure instead.
    if let Err(e) = config::validate_config(&cfg) {
        eprintln!("Invalid configuration:\n{e}");
        std::process::exit(1);
    }
    if cli.validate_config {
        print_config_summary(&cfg);
        return Ok(());
    }

    logging::init_with_config(&cfg.logging);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    tracing::info!(%addr, "Starting Encore server");

    // Wire the core with its in-memory collaborators.
    let authenticator = Arc::new(TokenAuthenticator::new(
        cfg.security.auth_secret.as_bytes().to_vec(),
    ));
    let catalog = Arc::new(StaticCatalog::builtin());
    let store = Arc::new(MemoryStore::new());
    let server = GameServer::new((*cfg).clone(), authenticator, catalog, store);

    server.spawn_sweeper();

    let app = websocket::create_router(&cfg.security.cors_origins).with_state(Arc::clone(&server));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        cors_origins = %cfg.security.cors_origins,
        "Server started - WebSocket: /ws?room=<code>, Health: /health"
    );

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal(Arc::clone(&server)))
        .await?;

    Ok(())
}

fn print_config_summary(cfg: &config::Config) {
    println!("Configuration OK");
    println!();
    println!("  port:                 {}", cfg.port);
    println!("  max players per room: {}", cfg.server.max_players);
    println!("  sweep interval:       {}s", cfg.server.sweep_interval);
    println!("  blind test playlist:  {}", cfg.games.blind_test.playlist);
    println!(
        "  race categories:      {}",
        cfg.games.category_race.categories.join(", ")
    );
}

async fn shutdown_signal(server: Arc<GameServer>) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("Shutdown signal received; draining connections");
    server.shutdown();
}

#[cfg(test)]
mod cli_tests {
    use super::Cli;
    use clap::Parser;

    #[test]
    fn test_cli_default_no_flags() {
        let cli = Cli::try_parse_from(["encore-server"]).unwrap();
        assert!(!cli.validate_config);
        assert!(!cli.print_config);
    }

    #[test]
    fn test_cli_validate_config_long() {
        let cli = Cli::try_parse_from(["encore-server", "--validate-config"]).unwrap();
        assert!(cli.validate_config);
        assert!(!cli.print_config);
    }

    #[test]
    fn test_cli_validate_config_short() {
        let cli = Cli::try_parse_from(["encore-server", "-c"]).unwrap();
        assert!(cli.validate_config);
    }

    #[test]
    fn test_cli_print_config() {
        let cli = Cli::try_parse_from(["encore-server", "--print-config"]).unwrap();
        assert!(cli.print_config);
    }

    #[test]
    fn test_cli_validate_and_print_config_conflict() {
        // --validate-config and --print-config are mutually exclusive
        let result = Cli::try_parse_from(["encore-server", "--validate-config", "--print-config"]);
        assert!(result.is_err());
    }
}
