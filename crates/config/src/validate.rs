//! Semantic validation of a loaded configuration.
//!
//! Loading never fails on a missing field (everything has a default), so this
//! is where a bot that cannot possibly work gets reported before it connects.

use std::{fmt, time::Duration};

use secrecy::ExposeSecret;

use crate::schema::OtisConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "tickets.draft_window"
    pub path: &'static str,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.severity, self.path, self.message)
    }
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(&mut self, severity: Severity, path: &'static str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            path,
            message: message.into(),
        });
    }
}

/// Validate a configuration after env overrides have been applied.
#[must_use]
pub fn validate(config: &OtisConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    if config.discord.token.expose_secret().trim().is_empty() {
        result.push(
            Severity::Error,
            "discord.token",
            "missing bot token (set DISCORD_BOT_TOKEN)",
        );
    }
    if config.openai.api_key.expose_secret().trim().is_empty() {
        result.push(
            Severity::Error,
            "openai.api_key",
            "missing API key (set OPENAI_API_KEY)",
        );
    }
    if config.openai.model.trim().is_empty() {
        result.push(Severity::Error, "openai.model", "model must not be empty");
    }
    if config.openai.timeout_secs == 0 {
        result.push(
            Severity::Error,
            "openai.timeout_secs",
            "timeout must be at least one second",
        );
    }

    let tickets = &config.tickets;
    if tickets.category_ids.is_empty() {
        result.push(
            Severity::Warning,
            "tickets.category_ids",
            "no ticket categories configured; no channel will be routed",
        );
    }
    if tickets.control_role_ids.is_empty() {
        result.push(
            Severity::Warning,
            "tickets.control_role_ids",
            "no control roles configured; tickets cannot be closed or escalated",
        );
    }
    if tickets.history_cap == 0 {
        result.push(
            Severity::Error,
            "tickets.history_cap",
            "history cap must be at least 1",
        );
    }
    if tickets.draft_window == 0 {
        result.push(
            Severity::Error,
            "tickets.draft_window",
            "draft window must be at least 1",
        );
    } else if tickets.draft_window > tickets.history_cap {
        result.push(
            Severity::Warning,
            "tickets.draft_window",
            format!(
                "draft window ({}) exceeds history cap ({}); only {} turns can ever be sent",
                tickets.draft_window, tickets.history_cap, tickets.history_cap
            ),
        );
    }
    if tickets.draft_timeout_secs == 0 {
        result.push(
            Severity::Error,
            "tickets.draft_timeout_secs",
            "draft timeout must be at least one second",
        );
    } else if Duration::from_secs(tickets.draft_timeout_secs) < config.openai.retry_budget() {
        result.push(
            Severity::Error,
            "tickets.draft_timeout_secs",
            format!(
                "draft timeout ({}s) is shorter than the AI client's retry budget ({}s); \
                 the last retries would be cut off and reported as timeouts",
                tickets.draft_timeout_secs,
                config.openai.retry_budget().as_secs_f64().ceil()
            ),
        );
    }
    if tickets.idle_timeout_secs == 0 {
        result.push(
            Severity::Error,
            "tickets.idle_timeout_secs",
            "idle timeout must be at least one second",
        );
    }
    if tickets.sweep_interval_secs == 0 {
        result.push(
            Severity::Error,
            "tickets.sweep_interval_secs",
            "sweep interval must be at least one second",
        );
    }
    if tickets.failure_alert_threshold == 0 && tickets.alert_channel_id.is_some() {
        result.push(
            Severity::Warning,
            "tickets.failure_alert_threshold",
            "threshold is 0; failure alerts are disabled",
        );
    }

    if !config.references.dir.is_dir() {
        result.push(
            Severity::Warning,
            "references.dir",
            format!(
                "{} is not a directory; reference texts will be empty",
                config.references.dir.display()
            ),
        );
    }

    result
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        otis_common::types::{CategoryId, RoleId},
        secrecy::Secret,
    };

    fn paths(result: &ValidationResult, severity: Severity) -> Vec<&'static str> {
        result
            .diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .map(|d| d.path)
            .collect()
    }

    #[test]
    fn default_config_is_missing_credentials() {
        let result = validate(&OtisConfig::default());
        assert!(result.has_errors());
        let errors = paths(&result, Severity::Error);
        assert!(errors.contains(&"discord.token"));
        assert!(errors.contains(&"openai.api_key"));
        assert!(paths(&result, Severity::Warning).contains(&"tickets.category_ids"));
    }

    #[test]
    fn complete_config_has_no_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = OtisConfig::default();
        cfg.discord.token = Secret::new("tok".into());
        cfg.openai.api_key = Secret::new("sk".into());
        cfg.tickets.category_ids = vec![CategoryId(1)];
        cfg.tickets.control_role_ids = vec![RoleId(2)];
        cfg.references.dir = dir.path().to_path_buf();

        let result = validate(&cfg);
        assert!(!result.has_errors(), "{:?}", result.diagnostics);
        assert_eq!(result.count(Severity::Warning), 0);
    }

    #[test]
    fn oversized_draft_window_warns() {
        let mut cfg = OtisConfig::default();
        cfg.tickets.history_cap = 4;
        cfg.tickets.draft_window = 8;
        let result = validate(&cfg);
        assert!(paths(&result, Severity::Warning).contains(&"tickets.draft_window"));
    }

    #[test]
    fn zero_limits_are_errors() {
        let mut cfg = OtisConfig::default();
        cfg.tickets.history_cap = 0;
        cfg.tickets.draft_window = 0;
        let errors = paths(&validate(&cfg), Severity::Error).join(",");
        assert!(errors.contains("tickets.history_cap"));
        assert!(errors.contains("tickets.draft_window"));
    }

    #[test]
    fn draft_timeout_below_retry_budget_is_an_error() {
        let mut cfg = OtisConfig::default();
        cfg.tickets.draft_timeout_secs = 120;
        assert!(paths(&validate(&cfg), Severity::Error).contains(&"tickets.draft_timeout_secs"));

        cfg.tickets.draft_timeout_secs = 180;
        assert!(!paths(&validate(&cfg), Severity::Error).contains(&"tickets.draft_timeout_secs"));

        cfg.openai.max_retries = 5;
        assert!(paths(&validate(&cfg), Severity::Error).contains(&"tickets.draft_timeout_secs"));
    }

    #[test]
    fn diagnostic_display() {
        let d = Diagnostic {
            severity: Severity::Warning,
            path: "tickets.category_ids",
            message: "empty".into(),
        };
        assert_eq!(d.to_string(), "warning: tickets.category_ids: empty");
    }
}
