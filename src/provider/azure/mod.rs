//! # Azure Identity Provider
//!
//! [`IdentityProvider`] implementation driving the Azure CLI.
//!
//! This module provides functionality to:
//! - List management groups and subscriptions visible to the signed-in account
//! - Look up and create app registrations and service principals
//! - Query and create role assignments
//! - Create federated identity credentials on an app registration
//!
//! Every call runs `az` with `--output json --only-show-errors` and parses
//! stdout; failures are classified from stderr so conflicts can be tolerated.

pub mod responses;

use crate::provider::{
    classify_command_error, ApplicationIdentity, IdentityProvider, ProviderError,
    RoleAssignment, ServicePrincipal,
};
use crate::scope::{AuthScope, ScopeKind};
use crate::tools::{run_checked, ExternalTool, ToolRunner};
use async_trait::async_trait;
use responses::{
    AccountShow, ApplicationEntry, ManagementGroupEntry, RoleAssignmentEntry,
    ServicePrincipalEntry, SubscriptionEntry,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info};

/// Azure CLI backed identity provider
pub struct AzureCli {
    runner: Arc<dyn ToolRunner>,
}

impl std::fmt::Debug for AzureCli {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureCli").finish_non_exhaustive()
    }
}

impl AzureCli {
    pub fn new(runner: Arc<dyn ToolRunner>) -> Self {
        Self { runner }
    }

    /// Run `az` and return raw stdout
    async fn az(&self, operation: &str, args: &[&str]) -> Result<String, ProviderError> {
        let mut full_args: Vec<&str> = args.to_vec();
        full_args.extend(["--output", "json", "--only-show-errors"]);
        debug!("az {}", args.join(" "));
        run_checked(
            self.runner.as_ref(),
            ExternalTool::AzureCli.program(),
            &full_args,
            None,
        )
        .await
        .map_err(|e| classify_command_error(operation, e))
    }

    /// Run `az` and parse stdout as JSON
    async fn az_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        args: &[&str],
    ) -> Result<T, ProviderError> {
        let stdout = self.az(operation, args).await?;
        serde_json::from_str(&stdout).map_err(|e| ProviderError::parse(operation, e))
    }
}

/// Quote a value for an OData `$filter` string literal
fn odata_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

impl From<ApplicationEntry> for ApplicationIdentity {
    fn from(entry: ApplicationEntry) -> Self {
        Self {
            display_name: entry.display_name,
            client_id: entry.app_id,
            object_id: entry.id,
        }
    }
}

impl From<ServicePrincipalEntry> for ServicePrincipal {
    fn from(entry: ServicePrincipalEntry) -> Self {
        Self {
            principal_id: entry.id,
            client_id: entry.app_id,
        }
    }
}

fn role_assignment(entry: RoleAssignmentEntry, requested_role: &str) -> RoleAssignment {
    RoleAssignment {
        role: entry
            .role_definition_name
            .unwrap_or_else(|| requested_role.to_string()),
        scope: entry.scope,
        principal_id: entry.principal_id,
    }
}

#[async_trait]
impl IdentityProvider for AzureCli {
    async fn tenant_id(&self) -> Result<String, ProviderError> {
        let account: AccountShow = self
            .az_json("show signed-in account", &["account", "show"])
            .await?;
        debug!("Signed in to tenant {} (subscription {})", account.tenant_id, account.id);
        Ok(account.tenant_id)
    }

    async fn list_scopes(&self, kind: ScopeKind) -> Result<Vec<AuthScope>, ProviderError> {
        match kind {
            ScopeKind::ManagementGroup => {
                let groups: Vec<ManagementGroupEntry> = self
                    .az_json(
                        "list management groups",
                        &["account", "management-group", "list"],
                    )
                    .await?;
                Ok(groups
                    .into_iter()
                    .map(|g| {
                        let display = g.display_name.unwrap_or_else(|| g.name.clone());
                        AuthScope::listed(kind, g.id, g.name, display)
                    })
                    .collect())
            }
            ScopeKind::Subscription => {
                let subscriptions: Vec<SubscriptionEntry> = self
                    .az_json("list subscriptions", &["account", "list"])
                    .await?;
                Ok(subscriptions
                    .into_iter()
                    .filter(|s| s.state.as_deref() != Some("Disabled"))
                    .map(|s| AuthScope::listed(kind, kind.canonical_path(&s.id), s.id, s.name))
                    .collect())
            }
        }
    }

    async fn find_applications(
        &self,
        display_name: &str,
    ) -> Result<Vec<ApplicationIdentity>, ProviderError> {
        let filter = format!("displayName eq {}", odata_literal(display_name));
        let apps: Vec<ApplicationEntry> = self
            .az_json("look up application", &["ad", "app", "list", "--filter", &filter])
            .await?;
        Ok(apps
            .into_iter()
            .filter(|a| a.display_name == display_name)
            .map(ApplicationIdentity::from)
            .collect())
    }

    async fn create_application(
        &self,
        display_name: &str,
    ) -> Result<ApplicationIdentity, ProviderError> {
        info!("Creating app registration '{}'", display_name);
        let app: ApplicationEntry = self
            .az_json(
                "create application",
                &["ad", "app", "create", "--display-name", display_name],
            )
            .await?;
        Ok(app.into())
    }

    async fn application_exists(&self, client_id: &str) -> Result<bool, ProviderError> {
        match self
            .az("show application", &["ad", "app", "show", "--id", client_id])
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn find_service_principal(
        &self,
        client_id: &str,
    ) -> Result<Option<ServicePrincipal>, ProviderError> {
        let filter = format!("appId eq {}", odata_literal(client_id));
        let principals: Vec<ServicePrincipalEntry> = self
            .az_json(
                "look up service principal",
                &["ad", "sp", "list", "--filter", &filter],
            )
            .await?;
        Ok(principals
            .into_iter()
            .find(|p| p.app_id.eq_ignore_ascii_case(client_id))
            .map(ServicePrincipal::from))
    }

    async fn create_service_principal(
        &self,
        client_id: &str,
    ) -> Result<ServicePrincipal, ProviderError> {
        info!("Creating service principal for app {}", client_id);
        let principal: ServicePrincipalEntry = self
            .az_json(
                "create service principal",
                &["ad", "sp", "create", "--id", client_id],
            )
            .await?;
        Ok(principal.into())
    }

    async fn list_role_assignments(
        &self,
        principal_id: &str,
        role: &str,
        scope: &str,
    ) -> Result<Vec<RoleAssignment>, ProviderError> {
        let assignments: Vec<RoleAssignmentEntry> = self
            .az_json(
                "list role assignments",
                &[
                    "role",
                    "assignment",
                    "list",
                    "--assignee",
                    principal_id,
                    "--role",
                    role,
                    "--scope",
                    scope,
                ],
            )
            .await?;
        Ok(assignments
            .into_iter()
            .map(|a| role_assignment(a, role))
            .collect())
    }

    async fn create_role_assignment(
        &self,
        principal_id: &str,
        role: &str,
        scope: &str,
    ) -> Result<RoleAssignment, ProviderError> {
        info!("Assigning role '{}' to {} at {}", role, principal_id, scope);
        let assignment: RoleAssignmentEntry = self
            .az_json(
                "create role assignment",
                &[
                    "role",
                    "assignment",
                    "create",
                    "--assignee-object-id",
                    principal_id,
                    "--assignee-principal-type",
                    "ServicePrincipal",
                    "--role",
                    role,
                    "--scope",
                    scope,
                ],
            )
            .await?;
        Ok(role_assignment(assignment, role))
    }

    async fn create_federated_credential(
        &self,
        client_id: &str,
        parameters: &str,
    ) -> Result<(), ProviderError> {
        self.az(
            "create federated credential",
            &[
                "ad",
                "app",
                "federated-credential",
                "create",
                "--id",
                client_id,
                "--parameters",
                parameters,
            ],
        )
        .await?;
        Ok(())
    }
}
