//! # GitHub Hosting Platform
//!
//! [`HostingPlatform`] implementation driving the GitHub CLI.
//!
//! Environments are managed through `gh api` (REST), secrets through
//! `gh secret set`, which handles the sealed-box encryption against the
//! repository or environment public key. Secret values are passed on stdin and
//! never appear in the process arguments.

use crate::provider::{classify_command_error, HostingPlatform, ProviderError, RepoSlug};
use crate::tools::{run_checked, ExternalTool, ToolRunner};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

/// `GET /repos/{owner}/{repo}/environments`
#[derive(Debug, Deserialize)]
struct EnvironmentList {
    #[serde(default)]
    environments: Vec<EnvironmentEntry>,
}

#[derive(Debug, Deserialize)]
struct EnvironmentEntry {
    name: String,
}

/// GitHub CLI backed hosting platform
pub struct GithubCli {
    runner: Arc<dyn ToolRunner>,
}

impl std::fmt::Debug for GithubCli {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubCli").finish_non_exhaustive()
    }
}

impl GithubCli {
    pub fn new(runner: Arc<dyn ToolRunner>) -> Self {
        Self { runner }
    }

    async fn gh(
        &self,
        operation: &str,
        args: &[&str],
        stdin: Option<&str>,
    ) -> Result<String, ProviderError> {
        debug!("gh {}", args.join(" "));
        run_checked(
            self.runner.as_ref(),
            ExternalTool::GithubCli.program(),
            args,
            stdin,
        )
        .await
        .map_err(|e| classify_command_error(operation, e))
    }
}

/// REST path of an environment, with the name percent-encoded as one segment
#[must_use]
pub fn environment_path(repo: &RepoSlug, name: &str) -> String {
    format!(
        "repos/{}/{}/environments/{}",
        repo.owner(),
        repo.name(),
        urlencoding::encode(name)
    )
}

#[async_trait]
impl HostingPlatform for GithubCli {
    async fn list_environments(&self, repo: &RepoSlug) -> Result<Vec<String>, ProviderError> {
        let path = format!(
            "repos/{}/{}/environments?per_page=100",
            repo.owner(),
            repo.name()
        );
        let stdout = self.gh("list environments", &["api", &path], None).await?;
        let list: EnvironmentList = serde_json::from_str(&stdout)
            .map_err(|e| ProviderError::parse("list environments", e))?;
        Ok(list.environments.into_iter().map(|e| e.name).collect())
    }

    async fn ensure_environment(&self, repo: &RepoSlug, name: &str) -> Result<(), ProviderError> {
        let path = environment_path(repo, name);
        info!("Ensuring environment '{}' exists on {}", name, repo);
        self.gh(
            "create environment",
            &["api", "--method", "PUT", &path, "--input", "-", "--silent"],
            Some("{}"),
        )
        .await?;
        Ok(())
    }

    async fn set_secret(
        &self,
        repo: &RepoSlug,
        environment: Option<&str>,
        name: &str,
        value: &str,
    ) -> Result<(), ProviderError> {
        let repo_arg = repo.to_string();
        let mut args = vec!["secret", "set", name, "--repo", repo_arg.as_str()];
        if let Some(env) = environment {
            args.extend(["--env", env]);
        }
        self.gh("set secret", &args, Some(value)).await?;
        Ok(())
    }
}
