//! # Constants
//!
//! Shared constants used throughout the setup flow.
//!
//! Values that are operator-tunable have a matching field in
//! [`SetupConfig`](crate::config::SetupConfig) and can be overridden via
//! environment variables.

/// Role granted to the service principal at the selected scope
pub const DEFAULT_ROLE: &str = "Contributor";

/// Prefix of the generated application display name (`Github-OIDC-<environment>`)
pub const DEFAULT_APP_NAME_PREFIX: &str = "Github-OIDC";

/// Credential definition file offered when prompting
pub const DEFAULT_CREDENTIALS_FILE: &str = "fics.json";

/// Environment variable that flags a GitHub Codespaces session
/// Role assignment propagation is unreliable there, so the run is refused
pub const DEFAULT_SANDBOX_FLAG_VAR: &str = "CODESPACES";

/// Delay before the first readiness probe after creating an identity object (seconds)
pub const DEFAULT_SETTLE_DELAY_SECS: u64 = 10;

/// Fibonacci readiness backoff starting value (seconds)
pub const DEFAULT_READINESS_BACKOFF_MIN_SECS: u64 = 5;

/// Fibonacci readiness backoff maximum value (seconds)
pub const DEFAULT_READINESS_BACKOFF_MAX_SECS: u64 = 30;

/// Readiness probes attempted before a created object is declared unreadable
pub const DEFAULT_READINESS_MAX_ATTEMPTS: u32 = 12;

/// Canonical path prefix of an Azure management group
pub const MANAGEMENT_GROUP_PATH_PREFIX: &str = "/providers/Microsoft.Management/managementGroups/";

/// Canonical path prefix of an Azure subscription
pub const SUBSCRIPTION_PATH_PREFIX: &str = "/subscriptions/";

/// GitHub limits environment names to 255 characters
pub const MAX_ENVIRONMENT_NAME_LEN: usize = 255;

/// Secret holding the application (client) id
pub const CLIENT_ID_SECRET: &str = "AZURE_CLIENT_ID";

/// Secret holding the tenant id
pub const TENANT_ID_SECRET: &str = "AZURE_TENANT_ID";

/// Secret holding the management group path
pub const MANAGEMENT_GROUP_SECRET: &str = "AZURE_MANAGEMENT_GROUP_ID";

/// Secret holding the subscription id
pub const SUBSCRIPTION_SECRET: &str = "AZURE_SUBSCRIPTION_ID";
