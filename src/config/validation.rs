//! Configuration validation.

use super::defaults::default_auth_secret;
use super::Config;

/// Whether the process appears to run in production.
pub fn is_production_mode() -> bool {
    std::env::var("ENCORE_ENV")
        .map(|v| v.eq_ignore_ascii_case("production"))
        .unwrap_or(false)
}

/// Validate the loaded configuration. Collects every problem so operators
/// see the full list at once.
pub fn validate_config(config: &Config) -> anyhow::Result<()> {
    let mut problems: Vec<String> = Vec::new();

    if config.port == 0 {
        problems.push("port must be non-zero".to_string());
    }
    if config.server.max_players == 0 {
        problems.push("server.max_players must be at least 1".to_string());
    }
    if config.server.sweep_interval == 0 {
        problems.push("server.sweep_interval must be at least 1 second".to_string());
    }
    if let Err(e) = config.websocket.validate() {
        problems.push(e.to_string());
    }
    if let Err(e) = config.games.validate() {
        problems.push(e.to_string());
    }
    if is_production_mode() && config.security.auth_secret == default_auth_secret() {
        problems.push(
            "security.auth_secret is the development default; set a real secret in production"
                .to_string(),
        );
    }

    if problems.is_empty() {
        Ok(())
    } else {
        anyhow::bail!(problems.join("\n"))
    }
}
