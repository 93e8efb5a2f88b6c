//! # Errors
//!
//! Fatal failures of a setup run. Every variant terminates the run with exit
//! code 1; the non-error early exits (sandbox, operator decline) are
//! [`Outcome`](crate::controller::Outcome) values instead.

use crate::credentials::CredentialsError;
use crate::prompt::PromptError;
use crate::provider::ProviderError;
use crate::scope::{ScopeKind, ScopeResolutionError};
use crate::tools::preflight::PreflightError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SetupError {
    /// Missing or invalid arguments, missing files
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Preflight(#[from] PreflightError),
    #[error("no {0} scopes are visible to the signed-in account; nothing to grant the role at")]
    NoScopes(ScopeKind),
    #[error(transparent)]
    Scope(#[from] ScopeResolutionError),
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Credentials(#[from] CredentialsError),
    #[error("{count} applications are named '{name}'; remove the duplicates or pick another name")]
    AmbiguousApplication { name: String, count: usize },
    #[error("{what} was created but is still not readable after {attempts} attempt(s)")]
    NotReady { what: String, attempts: u32 },
}

impl SetupError {
    /// Remediation hint printed after the error, when one applies
    #[must_use]
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            SetupError::Preflight(_) => Some("install the missing tool and re-run"),
            SetupError::NoScopes(_) => Some("sign in with `az login` to an account that can see the target scope"),
            SetupError::Provider(_) | SetupError::NotReady { .. } => Some(
                "already-created resources are left in place; re-running converges without duplicating them",
            ),
            _ => None,
        }
    }
}
