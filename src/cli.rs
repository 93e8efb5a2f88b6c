//! # Command Line
//!
//! Argument definitions for `oidc-setup`.
//!
//! ## Usage
//!
//! ```bash
//! # Fully interactive: prompts for repository, environment, names and scope
//! oidc-setup -i
//!
//! # Environment-scoped secrets for prod and staging
//! oidc-setup Github-OIDC-prod acme/widgets fics.json prod staging
//!
//! # Repository-scoped secrets, subscription scope, no prompts
//! oidc-setup --non-interactive --scope-kind subscription \
//!     --scope 0b1f6471-1bf0-4dda-aec3-cb9272f09590 --yes \
//!     Github-OIDC-widgets acme/widgets fics.json
//! ```

use crate::controller::request::{PromptMode, RequestInput};
use crate::scope::ScopeKind;
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

/// Provision GitHub Actions OIDC trust to Azure
#[derive(Debug, Parser)]
#[command(name = "oidc-setup")]
#[command(
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_GIT_HASH"), ", built ", env!("BUILD_DATETIME"), ")"),
    about = "Provision GitHub Actions OIDC trust to Azure",
    long_about = "Creates or reuses an app registration and service principal, grants it a role \
                  at a management group or subscription, adds federated credentials from a JSON \
                  file and publishes AZURE_CLIENT_ID, AZURE_TENANT_ID and the scope id as GitHub \
                  secrets. Re-running converges without duplicating anything.",
    after_help = "\
Credential file:
  A JSON array of federated credential objects. $VAR and ${VAR} placeholders are
  substituted from the environment before parsing.

Examples:
  oidc-setup -i
  oidc-setup Github-OIDC-prod acme/widgets fics.json prod staging
  oidc-setup --scope-kind subscription --scope Production app acme/widgets
"
)]
pub struct Cli {
    /// Display name of the app registration
    #[arg(value_name = "APP_NAME")]
    pub app_name: Option<String>,

    /// Repository in org/repo form
    #[arg(value_name = "REPO")]
    pub repo: Option<String>,

    /// Federated credential definition file
    #[arg(value_name = "CREDENTIALS_FILE")]
    pub credentials_file: Option<PathBuf>,

    /// Environments to publish secrets to (none: repository secrets)
    #[arg(value_name = "ENVIRONMENTS")]
    pub environments: Vec<String>,

    /// Kind of scope the role is granted at
    #[arg(long, value_enum, default_value = "management-group")]
    pub scope_kind: ScopeKind,

    /// Scope selection: canonical path, name or display name
    #[arg(long, value_name = "SELECTION")]
    pub scope: Option<String>,

    /// Role to grant (default: OIDC_SETUP_ROLE or Contributor)
    #[arg(long)]
    pub role: Option<String>,

    /// Prompt for everything not given on the command line
    #[arg(short, long, conflicts_with = "non_interactive")]
    pub interactive: bool,

    /// Never prompt; missing input is an error
    #[arg(long)]
    pub non_interactive: bool,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

impl Cli {
    /// Prompt mode; without a flag, prompting follows whether stdin is a terminal
    #[must_use]
    pub fn prompt_mode(&self, stdin_is_terminal: bool) -> PromptMode {
        if self.interactive {
            PromptMode::Full
        } else if self.non_interactive || !stdin_is_terminal {
            PromptMode::Never
        } else {
            PromptMode::Missing
        }
    }

    /// Convert into raw run input
    #[must_use]
    pub fn into_input(self) -> RequestInput {
        let mode = self.prompt_mode(std::io::stdin().is_terminal());
        self.into_input_with_mode(mode)
    }

    #[must_use]
    pub fn into_input_with_mode(self, mode: PromptMode) -> RequestInput {
        RequestInput {
            app_name: self.app_name,
            repo: self.repo,
            credentials_file: self.credentials_file,
            environments: self.environments,
            scope_kind: self.scope_kind,
            scope: self.scope,
            role: self.role,
            mode,
            assume_yes: self.yes,
        }
    }
}
