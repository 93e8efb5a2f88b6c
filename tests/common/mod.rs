//! Common test utilities for setup flow integration tests
//!
//! In-memory stand-ins for every external collaborator:
//!
//! - [`FakeIdentityProvider`]: Azure directory state (apps, principals, grants, credentials)
//! - [`FakeHostingPlatform`]: GitHub environments and secrets
//! - [`ScriptedRunner`]: `envsubst` and `jq` emulation plus tool lookup control
//! - [`ScriptedPrompter`]: canned operator answers

#![allow(dead_code, reason = "each integration test crate uses a subset of the helpers")]

use async_trait::async_trait;
use oidc_setup::config::SetupConfig;
use oidc_setup::prompt::{PromptError, Prompter};
use oidc_setup::provider::{
    ApplicationIdentity, HostingPlatform, IdentityProvider, ProviderError, RepoSlug,
    RoleAssignment, ServicePrincipal,
};
use oidc_setup::scope::{AuthScope, ScopeKind};
use oidc_setup::tools::{CommandError, CommandOutput, ToolRunner};
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

pub const TENANT_ID: &str = "72f988bf-86f1-41af-91ab-2d7cd011db47";
pub const PLATFORM_MG: &str = "/providers/Microsoft.Management/managementGroups/platform";
pub const SUBSCRIPTION_ID: &str = "0b1f6471-1bf0-4dda-aec3-cb9272f09590";

/// Configuration with no waiting between readiness probes
pub fn test_config() -> SetupConfig {
    SetupConfig {
        readiness_max_attempts: 5,
        ..SetupConfig::without_delays()
    }
}

/// Environment lookup with nothing set
pub fn no_env(_: &str) -> Option<String> {
    None
}

pub fn management_groups() -> Vec<AuthScope> {
    vec![
        AuthScope::listed(
            ScopeKind::ManagementGroup,
            PLATFORM_MG,
            "platform",
            "Platform Landing Zone",
        ),
        AuthScope::listed(
            ScopeKind::ManagementGroup,
            "/providers/Microsoft.Management/managementGroups/sandbox",
            "sandbox",
            "Sandboxes",
        ),
    ]
}

pub fn subscriptions() -> Vec<AuthScope> {
    vec![AuthScope::listed(
        ScopeKind::Subscription,
        format!("/subscriptions/{SUBSCRIPTION_ID}"),
        SUBSCRIPTION_ID,
        "Production",
    )]
}

/// Credential file with two definitions, one using a `${REPO}` placeholder
pub fn credentials_file() -> tempfile::NamedTempFile {
    write_credentials(
        r#"[
  {
    "name": "prod",
    "issuer": "https://token.actions.githubusercontent.com",
    "subject": "repo:acme/widgets:environment:prod",
    "audiences": ["api://AzureADTokenExchange"]
  },
  {
    "name": "main",
    "issuer": "https://token.actions.githubusercontent.com",
    "subject": "repo:${REPO}:ref:refs/heads/main",
    "audiences": ["api://AzureADTokenExchange"]
  }
]"#,
    )
}

pub fn write_credentials(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write credentials file");
    file
}

#[derive(Debug, Default)]
struct DirectoryState {
    next_id: usize,
    apps: Vec<ApplicationIdentity>,
    principals: Vec<ServicePrincipal>,
    assignments: Vec<RoleAssignment>,
    credentials: Vec<(String, String)>,
    /// Remaining probes for which a new app stays unreadable
    app_lag: u32,
    calls: Vec<String>,
}

/// In-memory Azure directory
#[derive(Debug)]
pub struct FakeIdentityProvider {
    scopes: HashMap<ScopeKind, Vec<AuthScope>>,
    state: Mutex<DirectoryState>,
    failing_credentials: HashSet<String>,
    fail_scope_listing: bool,
    propagation_lag: u32,
}

impl Default for FakeIdentityProvider {
    fn default() -> Self {
        Self {
            scopes: HashMap::from([
                (ScopeKind::ManagementGroup, management_groups()),
                (ScopeKind::Subscription, subscriptions()),
            ]),
            state: Mutex::new(DirectoryState::default()),
            failing_credentials: HashSet::new(),
            fail_scope_listing: false,
            propagation_lag: 0,
        }
    }
}

impl FakeIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Newly created applications stay unreadable for `probes` readiness probes
    pub fn with_propagation_lag(mut self, probes: u32) -> Self {
        self.propagation_lag = probes;
        self
    }

    /// Creating a credential with this name fails with a non-conflict error
    pub fn with_failing_credential(mut self, name: &str) -> Self {
        self.failing_credentials.insert(name.to_string());
        self
    }

    pub fn with_scopes(mut self, kind: ScopeKind, scopes: Vec<AuthScope>) -> Self {
        self.scopes.insert(kind, scopes);
        self
    }

    pub fn with_failing_scope_listing(mut self) -> Self {
        self.fail_scope_listing = true;
        self
    }

    /// Seed an existing application, returning its client id
    pub fn seed_application(&self, display_name: &str) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let app = ApplicationIdentity {
            display_name: display_name.to_string(),
            client_id: format!("app-{}", state.next_id),
            object_id: format!("obj-{}", state.next_id),
        };
        let client_id = app.client_id.clone();
        state.apps.push(app);
        client_id
    }

    /// Seed the service principal of `client_id`, returning its principal id
    pub fn seed_principal(&self, client_id: &str) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let principal_id = format!("sp-{}", state.next_id);
        state.principals.push(ServicePrincipal {
            principal_id: principal_id.clone(),
            client_id: client_id.to_string(),
        });
        principal_id
    }

    pub fn seed_assignment(&self, principal_id: &str, role: &str, scope: &str) {
        self.state.lock().unwrap().assignments.push(RoleAssignment {
            role: role.to_string(),
            scope: scope.to_string(),
            principal_id: principal_id.to_string(),
        });
    }

    pub fn seed_credential(&self, client_id: &str, name: &str) {
        self.state
            .lock()
            .unwrap()
            .credentials
            .push((client_id.to_string(), name.to_string()));
    }

    pub fn apps(&self) -> Vec<ApplicationIdentity> {
        self.state.lock().unwrap().apps.clone()
    }

    pub fn principals(&self) -> Vec<ServicePrincipal> {
        self.state.lock().unwrap().principals.clone()
    }

    pub fn assignments(&self) -> Vec<RoleAssignment> {
        self.state.lock().unwrap().assignments.clone()
    }

    pub fn credential_names(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .credentials
            .iter()
            .map(|(_, name)| name.clone())
            .collect()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count_calls(&self, operation: &str) -> usize {
        self.calls().iter().filter(|c| *c == operation).count()
    }

    fn record(&self, operation: &str) {
        self.state.lock().unwrap().calls.push(operation.to_string());
    }
}

fn conflict(operation: &str) -> ProviderError {
    ProviderError::Conflict {
        operation: operation.to_string(),
        message: "already exists".to_string(),
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    async fn tenant_id(&self) -> Result<String, ProviderError> {
        self.record("tenant_id");
        Ok(TENANT_ID.to_string())
    }

    async fn list_scopes(&self, kind: ScopeKind) -> Result<Vec<AuthScope>, ProviderError> {
        self.record("list_scopes");
        if self.fail_scope_listing {
            return Err(ProviderError::Command {
                operation: format!("list {kind} scopes"),
                source: CommandError::Failed {
                    program: "az".to_string(),
                    args: "account management-group list".to_string(),
                    code: Some(1),
                    stderr: "ERROR: AuthorizationFailed".to_string(),
                },
            });
        }
        Ok(self.scopes.get(&kind).cloned().unwrap_or_default())
    }

    async fn find_applications(
        &self,
        display_name: &str,
    ) -> Result<Vec<ApplicationIdentity>, ProviderError> {
        self.record("find_applications");
        Ok(self
            .apps()
            .into_iter()
            .filter(|a| a.display_name == display_name)
            .collect())
    }

    async fn create_application(
        &self,
        display_name: &str,
    ) -> Result<ApplicationIdentity, ProviderError> {
        self.record("create_application");
        let client_id = self.seed_application(display_name);
        self.state.lock().unwrap().app_lag = self.propagation_lag;
        Ok(self
            .apps()
            .into_iter()
            .find(|a| a.client_id == client_id)
            .expect("seeded application"))
    }

    async fn application_exists(&self, client_id: &str) -> Result<bool, ProviderError> {
        self.record("application_exists");
        let mut state = self.state.lock().unwrap();
        if state.app_lag > 0 {
            state.app_lag -= 1;
            return Err(ProviderError::NotFound {
                operation: "show application".to_string(),
                message: format!("Resource '{client_id}' does not exist"),
            });
        }
        Ok(state.apps.iter().any(|a| a.client_id == client_id))
    }

    async fn find_service_principal(
        &self,
        client_id: &str,
    ) -> Result<Option<ServicePrincipal>, ProviderError> {
        self.record("find_service_principal");
        Ok(self
            .principals()
            .into_iter()
            .find(|p| p.client_id == client_id))
    }

    async fn create_service_principal(
        &self,
        client_id: &str,
    ) -> Result<ServicePrincipal, ProviderError> {
        self.record("create_service_principal");
        if self.principals().iter().any(|p| p.client_id == client_id) {
            return Err(conflict("create service principal"));
        }
        let principal_id = self.seed_principal(client_id);
        Ok(ServicePrincipal {
            principal_id,
            client_id: client_id.to_string(),
        })
    }

    async fn list_role_assignments(
        &self,
        principal_id: &str,
        role: &str,
        scope: &str,
    ) -> Result<Vec<RoleAssignment>, ProviderError> {
        self.record("list_role_assignments");
        // `az role assignment list --scope` also returns grants inherited from parents
        let scope = scope.to_lowercase();
        Ok(self
            .assignments()
            .into_iter()
            .filter(|a| {
                a.principal_id == principal_id
                    && a.role == role
                    && scope.starts_with(&a.scope.to_lowercase())
            })
            .collect())
    }

    async fn create_role_assignment(
        &self,
        principal_id: &str,
        role: &str,
        scope: &str,
    ) -> Result<RoleAssignment, ProviderError> {
        self.record("create_role_assignment");
        let exists = self.assignments().iter().any(|a| {
            a.principal_id == principal_id && a.role == role && a.scope.eq_ignore_ascii_case(scope)
        });
        if exists {
            return Err(conflict("create role assignment"));
        }
        self.seed_assignment(principal_id, role, scope);
        Ok(RoleAssignment {
            role: role.to_string(),
            scope: scope.to_string(),
            principal_id: principal_id.to_string(),
        })
    }

    async fn create_federated_credential(
        &self,
        client_id: &str,
        parameters: &str,
    ) -> Result<(), ProviderError> {
        self.record("create_federated_credential");
        let value: serde_json::Value =
            serde_json::from_str(parameters).expect("parameters are compact JSON");
        let name = value["name"].as_str().unwrap_or_default().to_string();

        if self.failing_credentials.contains(&name) {
            return Err(ProviderError::Command {
                operation: "create federated credential".to_string(),
                source: CommandError::Failed {
                    program: "az".to_string(),
                    args: "ad app federated-credential create".to_string(),
                    code: Some(1),
                    stderr: "ERROR: Invalid issuer".to_string(),
                },
            });
        }

        let mut state = self.state.lock().unwrap();
        if state
            .credentials
            .iter()
            .any(|(c, n)| c == client_id && *n == name)
        {
            return Err(conflict("create federated credential"));
        }
        state.credentials.push((client_id.to_string(), name));
        Ok(())
    }
}

/// A secret write observed by [`FakeHostingPlatform`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretWrite {
    pub repo: String,
    pub environment: Option<String>,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Default)]
struct HostingState {
    environments: Vec<String>,
    ensure_calls: usize,
    secrets: Vec<SecretWrite>,
    calls: usize,
}

/// In-memory GitHub repository
#[derive(Debug, Default)]
pub struct FakeHostingPlatform {
    state: Mutex<HostingState>,
    fail_listing: bool,
}

impl FakeHostingPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_environments(self, names: &[&str]) -> Self {
        self.state.lock().unwrap().environments = names.iter().map(ToString::to_string).collect();
        self
    }

    pub fn with_failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn environments(&self) -> Vec<String> {
        self.state.lock().unwrap().environments.clone()
    }

    pub fn secrets(&self) -> Vec<SecretWrite> {
        self.state.lock().unwrap().secrets.clone()
    }

    pub fn ensure_calls(&self) -> usize {
        self.state.lock().unwrap().ensure_calls
    }

    /// Total calls of any kind
    pub fn calls(&self) -> usize {
        self.state.lock().unwrap().calls
    }
}

#[async_trait]
impl HostingPlatform for FakeHostingPlatform {
    async fn list_environments(&self, _repo: &RepoSlug) -> Result<Vec<String>, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        if self.fail_listing {
            return Err(ProviderError::NotFound {
                operation: "list environments".to_string(),
                message: "HTTP 404: Not Found".to_string(),
            });
        }
        Ok(state.environments.clone())
    }

    async fn ensure_environment(&self, _repo: &RepoSlug, name: &str) -> Result<(), ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        state.ensure_calls += 1;
        if !state.environments.iter().any(|e| e == name) {
            state.environments.push(name.to_string());
        }
        Ok(())
    }

    async fn set_secret(
        &self,
        repo: &RepoSlug,
        environment: Option<&str>,
        name: &str,
        value: &str,
    ) -> Result<(), ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        state.secrets.push(SecretWrite {
            repo: repo.to_string(),
            environment: environment.map(ToString::to_string),
            name: name.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }
}

/// Emulates `envsubst` and `jq -c` and controls which tools are installed
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    missing: HashSet<String>,
    variables: HashMap<String, String>,
    runs: Mutex<Vec<String>>,
    lookups: Mutex<usize>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default().with_variable("REPO", "acme/widgets")
    }

    pub fn without_tool(mut self, program: &str) -> Self {
        self.missing.insert(program.to_string());
        self
    }

    pub fn with_variable(mut self, key: &str, value: &str) -> Self {
        self.variables.insert(key.to_string(), value.to_string());
        self
    }

    /// Programs run so far, in order
    pub fn runs(&self) -> Vec<String> {
        self.runs.lock().unwrap().clone()
    }

    pub fn lookups(&self) -> usize {
        *self.lookups.lock().unwrap()
    }

    fn substitute(&self, input: &str) -> String {
        let mut output = input.to_string();
        for (key, value) in &self.variables {
            output = output
                .replace(&format!("${{{key}}}"), value)
                .replace(&format!("${key}"), value);
        }
        output
    }

    fn split(input: &str) -> CommandOutput {
        match serde_json::from_str::<serde_json::Value>(input) {
            Ok(serde_json::Value::Array(items)) => CommandOutput::ok(
                items
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            Ok(_) => CommandOutput::failed(
                5,
                "jq: error (at <stdin>:1): credential definitions must be a JSON array",
            ),
            Err(e) => CommandOutput::failed(2, format!("jq: error (at <stdin>:1): {e}")),
        }
    }
}

#[async_trait]
impl ToolRunner for ScriptedRunner {
    fn locate(&self, program: &str) -> Option<PathBuf> {
        *self.lookups.lock().unwrap() += 1;
        (!self.missing.contains(program)).then(|| PathBuf::from(format!("/usr/bin/{program}")))
    }

    async fn run(
        &self,
        program: &str,
        _args: &[&str],
        stdin: Option<&str>,
    ) -> Result<CommandOutput, CommandError> {
        self.runs.lock().unwrap().push(program.to_string());
        let input = stdin.unwrap_or_default();
        Ok(match program {
            "envsubst" => CommandOutput::ok(self.substitute(input)),
            "jq" => Self::split(input),
            other => CommandOutput::failed(127, format!("{other}: not scripted")),
        })
    }
}

/// Replays canned answers and records the questions asked
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    pub questions: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(ToString::to_string).collect(),
            questions: Vec::new(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, question: &str) -> Result<String, PromptError> {
        self.questions.push(question.to_string());
        self.answers
            .pop_front()
            .ok_or_else(|| PromptError::Closed(question.to_string()))
    }
}
