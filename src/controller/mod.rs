//! # Controller
//!
//! Drives one setup run from preflight to secret publication.
//!
//! - `backoff`: Fibonacci backoff between readiness probes
//! - `environment`: target environments and their creation
//! - `identity`: application, service principal and role reconciliation
//! - `request`: turning arguments and prompts into a validated request
//!
//! ## Flow
//!
//! 1. Refuse unsupported sandboxes, verify external tools
//! 2. Gather the request, load the credential definitions
//! 3. Read the tenant, list scopes and resolve the selection
//! 4. Show the repository's environments and confirm the plan
//! 5. Ensure environments, application, service principal and role grant
//! 6. Create federated credentials, publish secrets, print the summary
//!
//! Nothing is mutated before step 5, so an unsupported sandbox, a missing tool,
//! a bad argument or a declined confirmation leave no trace.

pub mod backoff;
pub mod environment;
pub mod identity;
pub mod request;

use crate::config::SetupConfig;
use crate::credentials::{
    load_definitions, provision_credentials, CredentialDefinition, CredentialReport,
};
use crate::error::SetupError;
use crate::prompt::{confirm, prompt_scope, Prompter};
use crate::provider::{HostingPlatform, IdentityProvider};
use crate::scope::{list_scopes, resolve_scope, AuthScope};
use crate::secrets::{publish_secrets, secret_set};
use crate::tools::preflight::{check_dependencies, detect_sandbox};
use crate::tools::ToolRunner;
use environment::{ensure_environments, show_existing_environments};
use identity::{
    ensure_application, ensure_role_assignment, ensure_service_principal, Provenance, RoleOutcome,
};
use request::{gather_request, ProvisionRequest, RequestInput};
use std::fmt;
use tracing::{info, info_span, Instrument};

/// External systems a run talks to
pub struct Collaborators<'a> {
    pub runner: &'a dyn ToolRunner,
    pub identity: &'a dyn IdentityProvider,
    pub hosting: &'a dyn HostingPlatform,
    pub prompter: &'a mut dyn Prompter,
}

impl fmt::Debug for Collaborators<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// Everything later stages need, fixed once the scope is resolved
#[derive(Debug, Clone)]
pub struct ProvisionContext {
    pub request: ProvisionRequest,
    pub tenant_id: String,
    pub scope: AuthScope,
}

/// What a finished run created or reused
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupReport {
    pub repo: String,
    pub app_name: String,
    pub client_id: String,
    pub tenant_id: String,
    pub scope: AuthScope,
    pub role: String,
    pub application: Provenance,
    pub service_principal: Provenance,
    pub role_assignment: RoleOutcome,
    pub environments_ensured: usize,
    pub credentials: CredentialReport,
    pub secrets_written: usize,
}

impl fmt::Display for SetupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Summary for {}", self.repo)?;
        writeln!(
            f,
            "  application        {} ({}, {})",
            self.app_name, self.client_id, self.application
        )?;
        writeln!(f, "  service principal  {}", self.service_principal)?;
        writeln!(
            f,
            "  role assignment    {} at {} ({})",
            self.role, self.scope.path, self.role_assignment
        )?;
        writeln!(f, "  environments       {} ensured", self.environments_ensured)?;
        writeln!(
            f,
            "  federated creds    {} defined: {} created, {} already present, {} failed",
            self.credentials.total(),
            self.credentials.created,
            self.credentials.already_present,
            self.credentials.failed
        )?;
        write!(f, "  secrets            {} written", self.secrets_written)
    }
}

/// How a run ended without error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed(Box<SetupReport>),
    /// Refused to run in an unsupported sandbox
    Unsupported(String),
    /// Operator declined the confirmation
    Declined,
}

/// Run the whole setup flow
///
/// `env` looks up process environment variables (sandbox detection).
///
/// # Errors
/// Returns the first fatal failure; resources created before it are left in place
pub async fn run(
    config: &SetupConfig,
    input: RequestInput,
    env: impl Fn(&str) -> Option<String>,
    deps: Collaborators<'_>,
) -> Result<Outcome, SetupError> {
    if let Some(reason) = detect_sandbox(&env, &config.sandbox_flag_var) {
        return Ok(Outcome::Unsupported(reason));
    }

    println!("► checking prerequisites");
    check_dependencies(deps.runner)?;

    let request = gather_request(input, config, deps.prompter)?;
    let definitions = load_definitions(deps.runner, &request.credentials_file).await?;
    println!(
        "✔ {} federated credential definition(s) in {}",
        definitions.len(),
        request.credentials_file.display()
    );

    let tenant_id = deps.identity.tenant_id().await?;
    let scope = select_scope(deps.identity, &request, deps.prompter).await?;
    println!("✔ {} {}", scope.kind, scope.path);

    let context = ProvisionContext {
        request,
        tenant_id,
        scope,
    };

    show_existing_environments(
        deps.hosting,
        &context.request.repo,
        &context.request.environments,
    )
    .await;

    if !context.request.assume_yes && context.request.mode.can_prompt() {
        print_plan(&context);
        if !confirm(deps.prompter, "Proceed?", false)? {
            info!("Setup declined, nothing was changed");
            return Ok(Outcome::Declined);
        }
    }

    let span = info_span!(
        "setup.provision",
        repo = %context.request.repo,
        app.name = %context.request.app_name,
        scope = %context.scope.path
    );
    let report = provision(config, &context, &definitions, &deps)
        .instrument(span)
        .await?;
    Ok(Outcome::Completed(Box::new(report)))
}

/// Resolve the command-line selection, or ask for one
async fn select_scope(
    identity: &dyn IdentityProvider,
    request: &ProvisionRequest,
    prompter: &mut dyn Prompter,
) -> Result<AuthScope, SetupError> {
    let kind = request.scope_kind;
    let scopes = list_scopes(identity, kind).await?;

    match request.scope_selection.as_deref() {
        Some(selection) => match resolve_scope(kind, &scopes, selection) {
            Ok(scope) => Ok(scope),
            Err(e) if request.mode.can_prompt() => {
                println!("✗ {e}");
                Ok(prompt_scope(prompter, kind, &scopes)?)
            }
            Err(e) => Err(e.into()),
        },
        None => Ok(prompt_scope(prompter, kind, &scopes)?),
    }
}

fn print_plan(context: &ProvisionContext) {
    let request = &context.request;
    println!();
    println!("Repository:       {}", request.repo);
    println!("Environments:     {}", request.environments);
    println!("Application:      {}", request.app_name);
    println!("Role:             {} at {}", request.role, context.scope.path);
    println!("Tenant:           {}", context.tenant_id);
    println!("Credentials file: {}", request.credentials_file.display());
    println!();
}

async fn provision(
    config: &SetupConfig,
    context: &ProvisionContext,
    definitions: &[CredentialDefinition],
    deps: &Collaborators<'_>,
) -> Result<SetupReport, SetupError> {
    let request = &context.request;

    let environments_ensured =
        ensure_environments(deps.hosting, &request.repo, &request.environments).await?;

    let application = ensure_application(deps.identity, config, &request.app_name).await?;
    println!(
        "✔ application {} ({})",
        application.value.display_name, application.provenance
    );

    let principal = ensure_service_principal(deps.identity, config, &application.value).await?;
    println!("✔ service principal {}", principal.provenance);

    let role_assignment =
        ensure_role_assignment(deps.identity, &principal, &request.role, &context.scope).await?;
    println!("✔ role {} ({})", request.role, role_assignment);

    let client_id = application.value.client_id.as_str();
    let credentials = provision_credentials(deps.identity, client_id, definitions).await;

    let secrets = secret_set(&context.scope, client_id, &context.tenant_id);
    let secrets_written =
        publish_secrets(deps.hosting, &request.repo, &request.environments, &secrets).await?;

    Ok(SetupReport {
        repo: request.repo.to_string(),
        app_name: application.value.display_name.clone(),
        client_id: client_id.to_string(),
        tenant_id: context.tenant_id.clone(),
        scope: context.scope.clone(),
        role: request.role.clone(),
        application: application.provenance,
        service_principal: principal.provenance,
        role_assignment,
        environments_ensured,
        credentials,
        secrets_written,
    })
}
