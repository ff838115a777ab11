//! Application state shared across handlers.

use crate::report::{ErrorReporter, LogReporter};
use spool_core::config::AppConfig;
use spool_player::Player;
use std::sync::Arc;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub player: Arc<Player>,
    /// Sent as `X-Powered-By`.
    pub instance_name: Arc<str>,
    pub reporter: Arc<dyn ErrorReporter>,
}

impl AppState {
    pub fn new(config: AppConfig, player: Player) -> Self {
        let instance_name = instance_name(&config).into();
        Self {
            config: Arc::new(config),
            player: Arc::new(player),
            instance_name,
            reporter: Arc::new(LogReporter),
        }
    }

    /// Replace the failure reporter.
    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }
}

/// Configured instance name, else `PLAYER_NAME`, else the host name.
pub fn instance_name(config: &AppConfig) -> String {
    if let Some(name) = config.server.instance_name.as_deref()
        && !name.is_empty()
    {
        return name.to_string();
    }
    if let Ok(name) = std::env::var("PLAYER_NAME")
        && !name.is_empty()
    {
        return name;
    }
    host_name().unwrap_or_else(|| "unknown-player".to_string())
}

fn host_name() -> Option<String> {
    if let Ok(name) = std::env::var("HOSTNAME")
        && !name.is_empty()
    {
        return Some(name);
    }
    std::fs::read_to_string("/etc/hostname")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_instance_name_wins() {
        let mut config = AppConfig::for_testing();
        config.server.instance_name = Some("player-7".to_string());
        assert_eq!(instance_name(&config), "player-7");
    }

    #[test]
    fn test_instance_name_never_empty() {
        assert!(!instance_name(&AppConfig::for_testing()).is_empty());
    }
}
