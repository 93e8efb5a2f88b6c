//! # Setup Configuration
//!
//! Run-level settings loaded from environment variables.
//!
//! Command-line flags take precedence over these values where both exist
//! (for example `--role` over `OIDC_SETUP_ROLE`).

use crate::controller::backoff::FibonacciBackoff;
use std::time::Duration;

/// Setup configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupConfig {
    /// Role granted to the service principal at the selected scope
    pub role: String,
    /// Prefix of the generated application display name
    pub app_name_prefix: String,
    /// Default credential definition file offered when prompting
    pub credentials_file: String,
    /// Environment variable that marks an unsupported sandbox (GitHub Codespaces)
    pub sandbox_flag_var: String,
    /// Delay before the first readiness probe after a create (seconds)
    pub settle_delay_secs: u64,
    /// Readiness backoff starting value (seconds)
    pub readiness_backoff_min_secs: u64,
    /// Readiness backoff maximum value (seconds)
    pub readiness_backoff_max_secs: u64,
    /// Readiness probes attempted before giving up
    pub readiness_max_attempts: u32,
    /// Log filter used when `RUST_LOG` is not set
    pub log_level: String,
}

impl Default for SetupConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            role: DEFAULT_ROLE.to_string(),
            app_name_prefix: DEFAULT_APP_NAME_PREFIX.to_string(),
            credentials_file: DEFAULT_CREDENTIALS_FILE.to_string(),
            sandbox_flag_var: DEFAULT_SANDBOX_FLAG_VAR.to_string(),
            settle_delay_secs: DEFAULT_SETTLE_DELAY_SECS,
            readiness_backoff_min_secs: DEFAULT_READINESS_BACKOFF_MIN_SECS,
            readiness_backoff_max_secs: DEFAULT_READINESS_BACKOFF_MAX_SECS,
            readiness_max_attempts: DEFAULT_READINESS_MAX_ATTEMPTS,
            log_level: "info".to_string(),
        }
    }
}

impl SetupConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        use crate::constants::*;
        Self {
            role: var_or_default_str(&lookup, "OIDC_SETUP_ROLE", DEFAULT_ROLE),
            app_name_prefix: var_or_default_str(
                &lookup,
                "OIDC_SETUP_APP_NAME_PREFIX",
                DEFAULT_APP_NAME_PREFIX,
            ),
            credentials_file: var_or_default_str(
                &lookup,
                "OIDC_SETUP_CREDENTIALS_FILE",
                DEFAULT_CREDENTIALS_FILE,
            ),
            sandbox_flag_var: var_or_default_str(
                &lookup,
                "OIDC_SETUP_SANDBOX_FLAG_VAR",
                DEFAULT_SANDBOX_FLAG_VAR,
            ),
            settle_delay_secs: var_or_default(
                &lookup,
                "OIDC_SETUP_SETTLE_DELAY_SECS",
                DEFAULT_SETTLE_DELAY_SECS,
            ),
            readiness_backoff_min_secs: var_or_default(
                &lookup,
                "OIDC_SETUP_READINESS_BACKOFF_MIN_SECS",
                DEFAULT_READINESS_BACKOFF_MIN_SECS,
            ),
            readiness_backoff_max_secs: var_or_default(
                &lookup,
                "OIDC_SETUP_READINESS_BACKOFF_MAX_SECS",
                DEFAULT_READINESS_BACKOFF_MAX_SECS,
            ),
            readiness_max_attempts: var_or_default(
                &lookup,
                "OIDC_SETUP_READINESS_MAX_ATTEMPTS",
                DEFAULT_READINESS_MAX_ATTEMPTS,
            ),
            log_level: var_or_default_str(&lookup, "OIDC_SETUP_LOG_LEVEL", "info"),
        }
    }

    /// Get settle delay duration
    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }

    /// Fresh backoff sequence for one readiness wait
    #[must_use]
    pub fn readiness_backoff(&self) -> FibonacciBackoff {
        FibonacciBackoff::new(
            self.readiness_backoff_min_secs,
            self.readiness_backoff_max_secs,
        )
    }

    /// Configuration with every delay zeroed, for tests and dry environments
    #[must_use]
    pub fn without_delays() -> Self {
        Self {
            settle_delay_secs: 0,
            readiness_backoff_min_secs: 0,
            readiness_backoff_max_secs: 0,
            ..Self::default()
        }
    }
}

/// Read variable or return default value
fn var_or_default<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Read variable as non-empty string or return default
fn var_or_default_str(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Interpret a flag-style variable value
pub(crate) fn is_truthy(value: &str) -> bool {
    let v_lower = value.trim().to_lowercase();
    v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let config = SetupConfig::from_lookup(|_| None);
        assert_eq!(config, SetupConfig::default());
        assert_eq!(config.role, "Contributor");
        assert_eq!(config.sandbox_flag_var, "CODESPACES");
        assert_eq!(config.credentials_file, "fics.json");
    }

    #[test]
    fn test_overrides_from_environment() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("OIDC_SETUP_ROLE", "Owner"),
            ("OIDC_SETUP_SETTLE_DELAY_SECS", "3"),
            ("OIDC_SETUP_READINESS_MAX_ATTEMPTS", "4"),
            ("OIDC_SETUP_APP_NAME_PREFIX", "Deploy-OIDC"),
        ]);
        let config = SetupConfig::from_lookup(|key| vars.get(key).map(ToString::to_string));

        assert_eq!(config.role, "Owner");
        assert_eq!(config.settle_delay(), Duration::from_secs(3));
        assert_eq!(config.readiness_max_attempts, 4);
        assert_eq!(config.app_name_prefix, "Deploy-OIDC");
    }

    #[test]
    fn test_unparseable_and_blank_values_fall_back() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("OIDC_SETUP_SETTLE_DELAY_SECS", "soon"),
            ("OIDC_SETUP_ROLE", "  "),
        ]);
        let config = SetupConfig::from_lookup(|key| vars.get(key).map(ToString::to_string));

        assert_eq!(config.settle_delay_secs, 10);
        assert_eq!(config.role, "Contributor");
    }

    #[test]
    fn test_truthy_values() {
        for value in ["true", "TRUE", "1", "yes", " on "] {
            assert!(is_truthy(value), "{value} should be truthy");
        }
        for value in ["false", "0", "", "no"] {
            assert!(!is_truthy(value), "{value} should not be truthy");
        }
    }
}
