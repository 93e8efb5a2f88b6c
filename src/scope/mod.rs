//! # Authorization Scopes
//!
//! Selecting the node of the Azure authorization hierarchy the role is granted at.
//!
//! Two resolution strategies exist and are kept separate:
//!
//! - **Management groups** accept a canonical path, a short name or a display
//!   name. Unknown input that already looks like a management-group path is
//!   accepted verbatim, so groups outside the listed page can still be targeted.
//! - **Subscriptions** accept a canonical path, a subscription id or a display
//!   name. Unknown input that is a well-formed subscription id (bare or as a
//!   path) is accepted verbatim.
//!
//! Resolution is pure; [`crate::prompt::prompt_scope`] wraps it in the
//! interactive retry loop.

use crate::constants::{
    MANAGEMENT_GROUP_PATH_PREFIX, MANAGEMENT_GROUP_SECRET, SUBSCRIPTION_PATH_PREFIX,
    SUBSCRIPTION_SECRET,
};
use crate::error::SetupError;
use crate::provider::IdentityProvider;
use std::fmt;
use thiserror::Error;
use tracing::info;

/// Kind of authorization scope targeted by the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum ScopeKind {
    /// Management group (grouping of subscriptions)
    #[value(name = "management-group", alias = "mg")]
    ManagementGroup,
    /// Single subscription
    #[value(name = "subscription", alias = "sub")]
    Subscription,
}

impl ScopeKind {
    /// Name of the secret carrying the scope identifier
    #[must_use]
    pub fn secret_name(self) -> &'static str {
        match self {
            ScopeKind::ManagementGroup => MANAGEMENT_GROUP_SECRET,
            ScopeKind::Subscription => SUBSCRIPTION_SECRET,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            ScopeKind::ManagementGroup => "management group",
            ScopeKind::Subscription => "subscription",
        }
    }

    /// Canonical path for a short name / id of this kind
    #[must_use]
    pub fn canonical_path(self, name: &str) -> String {
        match self {
            ScopeKind::ManagementGroup => format!("{MANAGEMENT_GROUP_PATH_PREFIX}{name}"),
            ScopeKind::Subscription => format!("{SUBSCRIPTION_PATH_PREFIX}{name}"),
        }
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A node of the authorization hierarchy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthScope {
    pub kind: ScopeKind,
    /// Canonical resource path, e.g. `/providers/Microsoft.Management/managementGroups/platform`
    pub path: String,
    /// Short name (management group name or subscription id)
    pub name: String,
    pub display_name: String,
    /// False when accepted verbatim without matching a listed scope
    pub verified: bool,
}

impl AuthScope {
    /// Scope taken from an identity provider listing
    pub fn listed(
        kind: ScopeKind,
        path: impl Into<String>,
        name: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            path: path.into(),
            name: name.into(),
            display_name: display_name.into(),
            verified: true,
        }
    }

    /// Scope accepted from a canonical path that was not in the listing
    fn unverified(kind: ScopeKind, path: &str) -> Self {
        let name = path.rsplit('/').next().unwrap_or(path).to_string();
        Self {
            kind,
            path: path.to_string(),
            display_name: name.clone(),
            name,
            verified: false,
        }
    }

    /// Value published in the scope secret
    ///
    /// Management groups publish the canonical path, subscriptions the bare id.
    #[must_use]
    pub fn secret_value(&self) -> &str {
        match self.kind {
            ScopeKind::ManagementGroup => &self.path,
            ScopeKind::Subscription => &self.name,
        }
    }
}

impl fmt::Display for AuthScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.display_name == self.name {
            write!(f, "{} ({})", self.name, self.path)
        } else {
            write!(f, "{} [{}] ({})", self.display_name, self.name, self.path)
        }
    }
}

/// Selection that could not be turned into a scope
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScopeResolutionError {
    #[error("no {0} was entered")]
    Empty(ScopeKind),
    #[error("'{input}' does not match any listed {kind} by path, name or display name")]
    Unresolved { kind: ScopeKind, input: String },
}

/// List candidate scopes, failing when there is nothing to target
///
/// # Errors
/// Returns the provider error, or [`SetupError::NoScopes`] for an empty listing
pub async fn list_scopes(
    identity: &dyn IdentityProvider,
    kind: ScopeKind,
) -> Result<Vec<AuthScope>, SetupError> {
    let scopes = identity.list_scopes(kind).await?;
    if scopes.is_empty() {
        return Err(SetupError::NoScopes(kind));
    }
    info!("Found {} {} scope(s)", scopes.len(), kind);
    Ok(scopes)
}

/// Resolve an operator selection against the listed scopes
///
/// # Errors
/// Returns [`ScopeResolutionError`] when the input is empty or cannot be resolved
pub fn resolve_scope(
    kind: ScopeKind,
    scopes: &[AuthScope],
    selection: &str,
) -> Result<AuthScope, ScopeResolutionError> {
    match kind {
        ScopeKind::ManagementGroup => resolve_management_group(scopes, selection),
        ScopeKind::Subscription => resolve_subscription(scopes, selection),
    }
}

/// Exact match on path, then short name, then display name
fn find_listed<'a>(scopes: &'a [AuthScope], input: &str) -> Option<&'a AuthScope> {
    scopes
        .iter()
        .find(|s| s.path == input)
        .or_else(|| scopes.iter().find(|s| s.name == input))
        .or_else(|| scopes.iter().find(|s| s.display_name == input))
}

/// Management-group resolution strategy
///
/// # Errors
/// Returns [`ScopeResolutionError`] when the input is empty or cannot be resolved
pub fn resolve_management_group(
    scopes: &[AuthScope],
    selection: &str,
) -> Result<AuthScope, ScopeResolutionError> {
    let kind = ScopeKind::ManagementGroup;
    let input = selection.trim();
    if input.is_empty() {
        return Err(ScopeResolutionError::Empty(kind));
    }

    if let Some(scope) = find_listed(scopes, input) {
        return Ok(scope.clone());
    }

    if input.starts_with(MANAGEMENT_GROUP_PATH_PREFIX) {
        return Ok(AuthScope::unverified(kind, input));
    }

    // Azure resource ids compare case-insensitively
    let synthesized = kind.canonical_path(input);
    scopes
        .iter()
        .find(|s| s.path.eq_ignore_ascii_case(&synthesized))
        .cloned()
        .ok_or_else(|| ScopeResolutionError::Unresolved {
            kind,
            input: input.to_string(),
        })
}

/// Subscription resolution strategy
///
/// # Errors
/// Returns [`ScopeResolutionError`] when the input is empty or cannot be resolved
pub fn resolve_subscription(
    scopes: &[AuthScope],
    selection: &str,
) -> Result<AuthScope, ScopeResolutionError> {
    let kind = ScopeKind::Subscription;
    let input = selection.trim();
    if input.is_empty() {
        return Err(ScopeResolutionError::Empty(kind));
    }

    if let Some(scope) = find_listed(scopes, input) {
        return Ok(scope.clone());
    }

    let candidate_id = input.strip_prefix(SUBSCRIPTION_PATH_PREFIX).unwrap_or(input);
    match uuid::Uuid::parse_str(candidate_id) {
        Ok(id) => {
            let id = id.hyphenated().to_string();
            if let Some(scope) = scopes.iter().find(|s| s.name.eq_ignore_ascii_case(&id)) {
                return Ok(scope.clone());
            }
            Ok(AuthScope::unverified(kind, &kind.canonical_path(&id)))
        }
        Err(_) => Err(ScopeResolutionError::Unresolved {
            kind,
            input: input.to_string(),
        }),
    }
}
