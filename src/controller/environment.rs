//! # Deployment Environments
//!
//! Target environments of a run and their creation on the hosting platform.
//!
//! An empty target list means repository scope: secrets are written once at
//! the repository level and no environment is created.

use crate::constants::MAX_ENVIRONMENT_NAME_LEN;
use crate::provider::{HostingPlatform, ProviderError, RepoSlug};
use std::fmt;
use tracing::{info, warn};

/// Validate an environment name entered by the operator
///
/// Returns the trimmed name. Reserved characters are allowed; they are
/// percent-encoded when the name is used in an API path.
///
/// # Errors
/// Returns a reason when the name is blank or too long
pub fn validate_environment_name(input: &str) -> Result<String, String> {
    let name = input.trim();
    if name.is_empty() {
        return Err("environment name cannot be blank".to_string());
    }
    if name.chars().count() > MAX_ENVIRONMENT_NAME_LEN {
        return Err(format!(
            "environment name is longer than {MAX_ENVIRONMENT_NAME_LEN} characters"
        ));
    }
    Ok(name.to_string())
}

/// Where secrets are published
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretTarget<'a> {
    Repository,
    Environment(&'a str),
}

impl SecretTarget<'_> {
    /// Environment name passed to the hosting platform
    #[must_use]
    pub fn environment(&self) -> Option<&str> {
        match self {
            SecretTarget::Repository => None,
            SecretTarget::Environment(name) => Some(name),
        }
    }
}

impl fmt::Display for SecretTarget<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretTarget::Repository => f.write_str("repository"),
            SecretTarget::Environment(name) => write!(f, "environment '{name}'"),
        }
    }
}

/// Requested environment names, as given
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetEnvironments {
    names: Vec<String>,
}

impl TargetEnvironments {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Repository scope: no environment was requested at all
    #[must_use]
    pub fn is_repository_scope(&self) -> bool {
        self.names.is_empty()
    }

    /// Non-blank names, trimmed, in request order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|n| n.trim()).filter(|n| !n.is_empty())
    }

    /// Number of blank entries that will be skipped
    #[must_use]
    pub fn blank_count(&self) -> usize {
        self.names.iter().filter(|n| n.trim().is_empty()).count()
    }

    /// Secret targets: the repository alone, or one per non-blank environment
    #[must_use]
    pub fn secret_targets(&self) -> Vec<SecretTarget<'_>> {
        if self.is_repository_scope() {
            vec![SecretTarget::Repository]
        } else {
            self.names().map(SecretTarget::Environment).collect()
        }
    }

    /// First non-blank name, used to derive the default application name
    #[must_use]
    pub fn primary(&self) -> Option<&str> {
        self.names().next()
    }
}

impl fmt::Display for TargetEnvironments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_repository_scope() {
            return f.write_str("(repository scope)");
        }
        let names: Vec<&str> = self.names().collect();
        f.write_str(&names.join(", "))
    }
}

/// Print the repository's current environments
///
/// The listing only informs the operator; failures are logged and ignored.
pub async fn show_existing_environments(
    hosting: &dyn HostingPlatform,
    repo: &RepoSlug,
    targets: &TargetEnvironments,
) {
    match hosting.list_environments(repo).await {
        Ok(existing) => {
            if existing.is_empty() {
                println!("► {repo} has no environments yet");
            } else {
                println!("► {repo} environments: {}", existing.join(", "));
            }
            for name in targets.names() {
                if !existing.iter().any(|e| e == name) {
                    println!("► environment '{name}' will be created");
                }
            }
        }
        Err(e) => warn!("Could not list environments of {}: {}", repo, e),
    }
}

/// Create (or replace with an empty configuration) every requested environment
///
/// # Errors
/// Returns the first hosting platform failure
pub async fn ensure_environments(
    hosting: &dyn HostingPlatform,
    repo: &RepoSlug,
    targets: &TargetEnvironments,
) -> Result<usize, ProviderError> {
    let mut ensured = 0;
    for name in targets.names() {
        hosting.ensure_environment(repo, name).await?;
        println!("✔ environment {name}");
        ensured += 1;
    }
    if ensured > 0 {
        info!("Ensured {} environment(s) on {}", ensured, repo);
    }
    Ok(ensured)
}
