//! # Secret Publication
//!
//! Publishes the identifiers a workflow needs to log in with OIDC:
//! `AZURE_CLIENT_ID`, `AZURE_TENANT_ID`, and the scope secret
//! (`AZURE_MANAGEMENT_GROUP_ID` or `AZURE_SUBSCRIPTION_ID`).
//!
//! Values always come from the current run and overwrite whatever is stored.

use crate::constants::{CLIENT_ID_SECRET, TENANT_ID_SECRET};
use crate::controller::environment::TargetEnvironments;
use crate::provider::{HostingPlatform, ProviderError, RepoSlug};
use crate::scope::AuthScope;
use tracing::{info, warn};

/// A secret name and the value written under it
#[derive(Clone, PartialEq, Eq)]
pub struct PublishedSecret {
    pub name: &'static str,
    pub value: String,
}

impl std::fmt::Debug for PublishedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishedSecret")
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .finish()
    }
}

/// The fixed secret set for a provisioned identity
#[must_use]
pub fn secret_set(scope: &AuthScope, client_id: &str, tenant_id: &str) -> Vec<PublishedSecret> {
    vec![
        PublishedSecret {
            name: CLIENT_ID_SECRET,
            value: client_id.to_string(),
        },
        PublishedSecret {
            name: TENANT_ID_SECRET,
            value: tenant_id.to_string(),
        },
        PublishedSecret {
            name: scope.kind.secret_name(),
            value: scope.secret_value().to_string(),
        },
    ]
}

/// Write `secrets` to the repository, or to each requested environment
///
/// Returns the number of secret writes performed.
///
/// # Errors
/// Returns the first hosting platform failure
pub async fn publish_secrets(
    hosting: &dyn HostingPlatform,
    repo: &RepoSlug,
    targets: &TargetEnvironments,
    secrets: &[PublishedSecret],
) -> Result<usize, ProviderError> {
    let blank = targets.blank_count();
    if blank > 0 {
        warn!("Skipping {} blank environment name(s)", blank);
    }

    let mut written = 0;
    for target in targets.secret_targets() {
        for secret in secrets {
            hosting
                .set_secret(repo, target.environment(), secret.name, &secret.value)
                .await?;
            written += 1;
        }
        println!("✔ {} secret(s) written to {target}", secrets.len());
    }

    if written == 0 {
        warn!("No secrets were published: every requested environment name was blank");
    } else {
        info!("Published {} secret(s) to {}", written, repo);
    }
    Ok(written)
}
