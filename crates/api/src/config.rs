//! Application configuration.
//!
//! Values come from `COL_*` environment variables layered over documented
//! defaults. A blank mandatory setting is a startup-aborting configuration
//! fault, the same as a missing handler in the command table.

use std::time::Duration;

use thiserror::Error;

use col_notify::WindowPolicy;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("mandatory configuration parameter '{0}' is empty")]
    MissingParameter(&'static str),

    #[error("invalid value for '{name}': {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    /// Postgres connection string; absent means the in-memory dev gateway.
    pub database_url: Option<String>,
    /// Query parameter carrying the command token.
    pub command_param: String,
    /// View rendered for every dispatch fault.
    pub error_view: String,
    /// Outer template view the client wraps content views with.
    pub template_view: String,
    /// Token the registry falls back to when a request carries none.
    pub home_token: String,
    /// Context path prefixed to generated URLs, empty for the root.
    pub context_path: String,
    pub notifier_period: Duration,
    pub notifier_window: WindowPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".into(),
            database_url: None,
            command_param: "ent".into(),
            error_view: "error".into(),
            template_view: "template".into(),
            home_token: "home".into(),
            context_path: String::new(),
            notifier_period: Duration::from_secs(60 * 60 * 24 * 7),
            notifier_window: WindowPolicy::CalendarYearEnd,
        }
    }
}

fn env_or(name: &str, default: String) -> String {
    std::env::var(name).unwrap_or(default)
}

impl AppConfig {
    /// Environment over defaults, then validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let notifier_period = match std::env::var("COL_NOTIFIER_PERIOD_SECS") {
            Ok(raw) => Duration::from_secs(raw.parse().map_err(|e| ConfigError::InvalidValue {
                name: "COL_NOTIFIER_PERIOD_SECS",
                reason: format!("{e}"),
            })?),
            Err(_) => defaults.notifier_period,
        };
        let notifier_window = match std::env::var("COL_NOTIFIER_WINDOW_DAYS") {
            Ok(raw) => WindowPolicy::RollingDays(raw.parse().map_err(|e| {
                ConfigError::InvalidValue {
                    name: "COL_NOTIFIER_WINDOW_DAYS",
                    reason: format!("{e}"),
                }
            })?),
            Err(_) => defaults.notifier_window,
        };

        let config = Self {
            bind_addr: env_or("COL_BIND_ADDR", defaults.bind_addr),
            database_url: std::env::var("COL_DATABASE_URL").ok(),
            command_param: env_or("COL_COMMAND_PARAM", defaults.command_param),
            error_view: env_or("COL_ERROR_VIEW", defaults.error_view),
            template_view: env_or("COL_TEMPLATE_VIEW", defaults.template_view),
            home_token: env_or("COL_HOME_TOKEN", defaults.home_token),
            context_path: env_or("COL_CONTEXT_PATH", defaults.context_path),
            notifier_period,
            notifier_window,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_addr.trim().is_empty() {
            return Err(ConfigError::MissingParameter("COL_BIND_ADDR"));
        }
        if self.command_param.trim().is_empty() {
            return Err(ConfigError::MissingParameter("COL_COMMAND_PARAM"));
        }
        if self.error_view.trim().is_empty() {
            return Err(ConfigError::MissingParameter("COL_ERROR_VIEW"));
        }
        if self.template_view.trim().is_empty() {
            return Err(ConfigError::MissingParameter("COL_TEMPLATE_VIEW"));
        }
        if self.home_token.trim().is_empty() {
            return Err(ConfigError::MissingParameter("COL_HOME_TOKEN"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn blank_error_view_is_a_configuration_fault() {
        let config = AppConfig {
            error_view: "  ".into(),
            ..AppConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::MissingParameter("COL_ERROR_VIEW"))
        );
    }

    #[test]
    fn blank_command_param_is_a_configuration_fault() {
        let config = AppConfig {
            command_param: String::new(),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
