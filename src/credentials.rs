//! # Federated Credentials
//!
//! Loads federated credential definitions from a declarative JSON file and
//! submits them to the identity provider.
//!
//! ## Loading
//!
//! 1. Read the file
//! 2. Substitute `$VAR` / `${VAR}` placeholders with `envsubst`
//! 3. Split the top-level array with `jq -c`, one compact element per line
//! 4. Parse each element; it must be a JSON object
//!
//! ## Provisioning
//!
//! Elements are submitted verbatim, one at a time. A failing element never
//! stops the remaining ones: conflicts count as already present, any other
//! failure is logged and counted.

use crate::provider::IdentityProvider;
use crate::tools::{run_checked, CommandError, ExternalTool, ToolRunner};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// `jq` program emitting each array element on its own line
pub const SPLIT_FILTER: &str =
    r#"if type == "array" then .[] else error("credential definitions must be a JSON array") end"#;

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("failed to read credential definitions from {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("placeholder substitution failed: {0}")]
    Substitution(#[source] CommandError),
    #[error("credential definitions in {} are not a valid JSON array: {source}", path.display())]
    Split {
        path: PathBuf,
        #[source]
        source: CommandError,
    },
    #[error("credential definition #{index} is not valid JSON: {source}")]
    Parse {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("credential definition #{index} is not a JSON object")]
    NotObject { index: usize },
}

/// One federated credential, kept as the compact JSON submitted to the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialDefinition {
    /// `name` field, when present
    pub name: Option<String>,
    /// `subject` field, when present (for logging only)
    pub subject: Option<String>,
    /// Compact JSON object passed through unchanged
    pub parameters: String,
}

impl CredentialDefinition {
    /// Parse one compact JSON element; `index` is 1-based and used in errors
    ///
    /// # Errors
    /// Returns an error when the element is not a JSON object
    pub fn from_json(index: usize, element: &str) -> Result<Self, CredentialsError> {
        let value: Value = serde_json::from_str(element)
            .map_err(|source| CredentialsError::Parse { index, source })?;
        let object = value
            .as_object()
            .ok_or(CredentialsError::NotObject { index })?;
        let field = |key: &str| object.get(key).and_then(Value::as_str).map(str::to_string);

        Ok(Self {
            name: field("name"),
            subject: field("subject"),
            parameters: element.trim().to_string(),
        })
    }

    /// Short label for progress output
    #[must_use]
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .or(self.subject.as_deref())
            .unwrap_or("<unnamed>")
    }
}

/// Load and validate credential definitions from `path`
///
/// # Errors
/// Returns an error when the file is missing, substitution fails, the content is
/// not a JSON array, or an element is not a JSON object
pub async fn load_definitions(
    runner: &dyn ToolRunner,
    path: &Path,
) -> Result<Vec<CredentialDefinition>, CredentialsError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CredentialsError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    let substituted = run_checked(runner, ExternalTool::Envsubst.program(), &[], Some(&raw))
        .await
        .map_err(CredentialsError::Substitution)?;

    let lines = run_checked(
        runner,
        ExternalTool::Jq.program(),
        &["-c", SPLIT_FILTER],
        Some(&substituted),
    )
    .await
    .map_err(|source| CredentialsError::Split {
        path: path.to_path_buf(),
        source,
    })?;

    let definitions = lines
        .lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(i, line)| CredentialDefinition::from_json(i + 1, line))
        .collect::<Result<Vec<_>, _>>()?;

    debug!(
        "Loaded {} credential definition(s) from {}",
        definitions.len(),
        path.display()
    );
    Ok(definitions)
}

/// Counts of a provisioning pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CredentialReport {
    pub created: usize,
    pub already_present: usize,
    pub failed: usize,
}

impl CredentialReport {
    #[must_use]
    pub fn total(&self) -> usize {
        self.created + self.already_present + self.failed
    }
}

/// Submit every definition to the application with `client_id`
///
/// Never fails as a whole; per-element outcomes are reported in the returned counts.
pub async fn provision_credentials(
    identity: &dyn IdentityProvider,
    client_id: &str,
    definitions: &[CredentialDefinition],
) -> CredentialReport {
    let mut report = CredentialReport::default();

    for definition in definitions {
        let label = definition.label();
        match identity
            .create_federated_credential(client_id, &definition.parameters)
            .await
        {
            Ok(()) => {
                info!(
                    subject = definition.subject.as_deref().unwrap_or_default(),
                    "Created federated credential '{}'", label
                );
                println!("✔ federated credential {label}");
                report.created += 1;
            }
            Err(e) if e.is_conflict() => {
                debug!("Federated credential '{}' already exists", label);
                println!("✔ federated credential {label} (already present)");
                report.already_present += 1;
            }
            Err(e) => {
                warn!("Failed to create federated credential '{}': {}", label, e);
                println!("✗ federated credential {label}: {e}");
                report.failed += 1;
            }
        }
    }

    report
}
