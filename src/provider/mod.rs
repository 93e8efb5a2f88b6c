//! # Provider Modules
//!
//! Remote systems the setup flow reconciles against.
//!
//! Each provider implements one of:
//! - `IdentityProvider` for the cloud identity plane (Azure via `az`)
//! - `HostingPlatform` for the repository host (GitHub via `gh`)

use crate::scope::{AuthScope, ScopeKind};
use crate::tools::CommandError;
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

pub mod azure;
pub mod github;

/// A registered application (the identity federated credentials attach to)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationIdentity {
    pub display_name: String,
    /// Application (client) id
    pub client_id: String,
    /// Directory object id
    pub object_id: String,
}

/// Tenant-local principal backing an application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicePrincipal {
    /// Principal object id, referenced by role assignments
    pub principal_id: String,
    /// Client id of the backing application
    pub client_id: String,
}

/// A role granted to a principal at a scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssignment {
    pub role: String,
    pub scope: String,
    pub principal_id: String,
}

/// Repository identifier in `owner/repo` form
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoSlug {
    owner: String,
    name: String,
}

static REPO_SLUG_PATTERN: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^([A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)/([A-Za-z0-9._-]+)$")
        .unwrap_or_else(|e| panic!("invalid repository slug pattern: {e}"))
});

impl RepoSlug {
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl FromStr for RepoSlug {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let caps = REPO_SLUG_PATTERN
            .captures(trimmed)
            .ok_or_else(|| format!("'{trimmed}' is not a repository slug of the form org/repo"))?;
        let name = caps[2].trim_end_matches(".git").to_string();
        if name.is_empty() || name == "." || name == ".." {
            return Err(format!("'{trimmed}' has an invalid repository name"));
        }
        Ok(Self {
            owner: caps[1].to_string(),
            name,
        })
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Remote call failure, classified so callers can tolerate conflicts
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The resource already exists
    #[error("{operation}: resource already exists ({message})")]
    Conflict { operation: String, message: String },
    /// The resource does not exist (or is not yet visible)
    #[error("{operation}: resource not found ({message})")]
    NotFound { operation: String, message: String },
    #[error("{operation} failed: {source}")]
    Command {
        operation: String,
        #[source]
        source: CommandError,
    },
    #[error("{operation} returned unexpected output: {source}")]
    Parse {
        operation: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ProviderError {
    /// True when the failure means the desired resource is already in place
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, ProviderError::Conflict { .. })
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound { .. })
    }

    /// Build a parse error for `operation`
    pub fn parse(operation: impl Into<String>, source: serde_json::Error) -> Self {
        ProviderError::Parse {
            operation: operation.into(),
            source,
        }
    }
}

/// Classify a failed tool invocation by inspecting its stderr
///
/// `az` and `gh` report conflicts and missing objects only through their
/// messages, so this matches the markers both tools emit.
pub fn classify_command_error(operation: &str, error: CommandError) -> ProviderError {
    let stderr = error.stderr().to_lowercase();
    let first_line = error
        .stderr()
        .lines()
        .find(|l| !l.trim().is_empty())
        .unwrap_or_default()
        .trim()
        .to_string();

    if stderr.contains("already exists")
        || stderr.contains("roleassignmentexists")
        || stderr.contains("conflict")
        || stderr.contains("(409)")
        || stderr.contains("http 409")
    {
        return ProviderError::Conflict {
            operation: operation.to_string(),
            message: first_line,
        };
    }

    if stderr.contains("does not exist")
        || stderr.contains("request_resourcenotfound")
        || stderr.contains("resourcenotfound")
        || stderr.contains("http 404")
        || stderr.contains("not found")
    {
        return ProviderError::NotFound {
            operation: operation.to_string(),
            message: first_line,
        };
    }

    ProviderError::Command {
        operation: operation.to_string(),
        source: error,
    }
}

/// Cloud identity plane
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Tenant of the signed-in account
    async fn tenant_id(&self) -> Result<String, ProviderError>;

    /// Candidate authorization scopes of the given kind
    async fn list_scopes(&self, kind: ScopeKind) -> Result<Vec<AuthScope>, ProviderError>;

    /// Applications whose display name equals `display_name` exactly
    async fn find_applications(
        &self,
        display_name: &str,
    ) -> Result<Vec<ApplicationIdentity>, ProviderError>;

    async fn create_application(
        &self,
        display_name: &str,
    ) -> Result<ApplicationIdentity, ProviderError>;

    /// Whether the application with `client_id` is readable
    async fn application_exists(&self, client_id: &str) -> Result<bool, ProviderError>;

    /// Service principal backing the application with `client_id`
    async fn find_service_principal(
        &self,
        client_id: &str,
    ) -> Result<Option<ServicePrincipal>, ProviderError>;

    async fn create_service_principal(
        &self,
        client_id: &str,
    ) -> Result<ServicePrincipal, ProviderError>;

    /// Assignments of `role` held by `principal_id` at or above `scope`
    async fn list_role_assignments(
        &self,
        principal_id: &str,
        role: &str,
        scope: &str,
    ) -> Result<Vec<RoleAssignment>, ProviderError>;

    /// Grant `role` to `principal_id` at `scope`
    ///
    /// Returns [`ProviderError::Conflict`] when the grant already exists.
    async fn create_role_assignment(
        &self,
        principal_id: &str,
        role: &str,
        scope: &str,
    ) -> Result<RoleAssignment, ProviderError>;

    /// Create a federated credential from opaque JSON parameters
    ///
    /// Returns [`ProviderError::Conflict`] when a credential with the same name exists.
    async fn create_federated_credential(
        &self,
        client_id: &str,
        parameters: &str,
    ) -> Result<(), ProviderError>;
}

/// Repository hosting platform
#[async_trait]
pub trait HostingPlatform: Send + Sync {
    /// Names of the repository's deployment environments
    async fn list_environments(&self, repo: &RepoSlug) -> Result<Vec<String>, ProviderError>;

    /// Create or replace an environment (idempotent)
    async fn ensure_environment(&self, repo: &RepoSlug, name: &str) -> Result<(), ProviderError>;

    /// Write a secret, overwriting any previous value
    ///
    /// `environment: None` writes a repository-level secret.
    async fn set_secret(
        &self,
        repo: &RepoSlug,
        environment: Option<&str>,
        name: &str,
        value: &str,
    ) -> Result<(), ProviderError>;
}
