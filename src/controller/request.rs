//! # Request Gathering
//!
//! Merges command-line arguments, configuration and operator answers into a
//! validated [`ProvisionRequest`].
//!
//! | Mode | Repository | Environments | App name | Credential file | Scope |
//! |------|------------|--------------|----------|-----------------|-------|
//! | `Full` | prompt if missing | prompt if none | prompt with default | prompt with default | prompt if missing |
//! | `Missing` | prompt if missing | none means repository scope | prompt if missing | prompt if missing | prompt if missing |
//! | `Never` | required | none means repository scope | required | configured default | `--scope` required |

use crate::config::SetupConfig;
use crate::controller::environment::TargetEnvironments;
use crate::error::SetupError;
use crate::prompt::{ask_with_default, prompt_environment_name, prompt_repository, Prompter};
use crate::provider::RepoSlug;
use crate::scope::ScopeKind;
use std::path::PathBuf;

/// How far the run may prompt the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    /// Ask for every value not given on the command line
    Full,
    /// Ask only for values that have no default
    Missing,
    /// Never prompt; missing values are usage errors
    Never,
}

impl PromptMode {
    #[must_use]
    pub fn can_prompt(self) -> bool {
        self != PromptMode::Never
    }
}

/// Raw, unvalidated inputs of a run
#[derive(Debug, Clone)]
pub struct RequestInput {
    pub app_name: Option<String>,
    pub repo: Option<String>,
    pub credentials_file: Option<PathBuf>,
    pub environments: Vec<String>,
    pub scope_kind: ScopeKind,
    pub scope: Option<String>,
    pub role: Option<String>,
    pub mode: PromptMode,
    pub assume_yes: bool,
}

impl RequestInput {
    /// Input with nothing supplied
    #[must_use]
    pub fn empty(mode: PromptMode) -> Self {
        Self {
            app_name: None,
            repo: None,
            credentials_file: None,
            environments: Vec::new(),
            scope_kind: ScopeKind::ManagementGroup,
            scope: None,
            role: None,
            mode,
            assume_yes: false,
        }
    }
}

/// Validated request, ready for scope selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionRequest {
    pub repo: RepoSlug,
    pub environments: TargetEnvironments,
    pub app_name: String,
    pub credentials_file: PathBuf,
    pub scope_kind: ScopeKind,
    /// Scope selection from the command line, resolved once scopes are listed
    pub scope_selection: Option<String>,
    pub role: String,
    pub mode: PromptMode,
    pub assume_yes: bool,
}

/// Lowercase slug used in generated names: alphanumerics kept, runs of anything else become `-`
#[must_use]
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    for c in input.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

/// Generated application name: `<prefix>-<environment slug>`, or the repository
/// name for repository scope
#[must_use]
pub fn default_app_name(prefix: &str, repo: &RepoSlug, environments: &TargetEnvironments) -> String {
    let slug = slugify(environments.primary().unwrap_or(repo.name()));
    if slug.is_empty() {
        prefix.to_string()
    } else {
        format!("{prefix}-{slug}")
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Build a [`ProvisionRequest`] from `input`, prompting where the mode allows
///
/// # Errors
/// Returns [`SetupError::Usage`] for missing or malformed values that cannot be
/// prompted for, or a prompt error when input closes
pub fn gather_request(
    input: RequestInput,
    config: &SetupConfig,
    prompter: &mut dyn Prompter,
) -> Result<ProvisionRequest, SetupError> {
    let mode = input.mode;

    let repo = match non_blank(input.repo) {
        Some(raw) => raw.parse::<RepoSlug>().map_err(SetupError::Usage)?,
        None if mode.can_prompt() => prompt_repository(prompter)?,
        None => {
            return Err(SetupError::Usage(
                "a repository (org/repo) is required in non-interactive mode".to_string(),
            ))
        }
    };

    let environments = if input.environments.is_empty() && mode == PromptMode::Full {
        TargetEnvironments::new([prompt_environment_name(prompter)?])
    } else {
        TargetEnvironments::new(input.environments)
    };

    let generated = default_app_name(&config.app_name_prefix, &repo, &environments);
    let app_name = match (non_blank(input.app_name), mode) {
        (Some(name), _) => name,
        (None, PromptMode::Never) => {
            return Err(SetupError::Usage(
                "an application name is required in non-interactive mode".to_string(),
            ))
        }
        (None, _) => ask_with_default(prompter, "Application display name", &generated)?,
    };

    let credentials_file = match (input.credentials_file, mode) {
        (Some(path), _) => path,
        (None, PromptMode::Never) => PathBuf::from(&config.credentials_file),
        (None, _) => PathBuf::from(ask_with_default(
            prompter,
            "Federated credential definition file",
            &config.credentials_file,
        )?),
    };
    if !credentials_file.is_file() {
        return Err(SetupError::Usage(format!(
            "credential definition file {} does not exist",
            credentials_file.display()
        )));
    }

    let scope_selection = non_blank(input.scope);
    if scope_selection.is_none() && !mode.can_prompt() {
        return Err(SetupError::Usage(format!(
            "--scope is required in non-interactive mode (a {} path, name or display name)",
            input.scope_kind
        )));
    }

    Ok(ProvisionRequest {
        repo,
        environments,
        app_name,
        credentials_file,
        scope_kind: input.scope_kind,
        scope_selection,
        role: non_blank(input.role).unwrap_or_else(|| config.role.clone()),
        mode,
        assume_yes: input.assume_yes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::PromptError;
    use std::collections::VecDeque;

    struct Answers(VecDeque<String>);

    impl Prompter for Answers {
        fn ask(&mut self, question: &str) -> Result<String, PromptError> {
            self.0
                .pop_front()
                .ok_or_else(|| PromptError::Closed(question.to_string()))
        }
    }

    fn answers(items: &[&str]) -> Answers {
        Answers(items.iter().map(ToString::to_string).collect())
    }

    fn credentials_file() -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().expect("temp file");
        std::fs::write(file.path(), "[]").expect("write");
        file
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("prod"), "prod");
        assert_eq!(slugify("Prod EU/West"), "prod-eu-west");
        assert_eq!(slugify("--staging--"), "staging");
        assert_eq!(slugify("  "), "");
    }

    #[test]
    fn test_default_app_name_uses_environment_or_repo() {
        let repo: RepoSlug = "acme/widgets".parse().unwrap();
        assert_eq!(
            default_app_name("Github-OIDC", &repo, &TargetEnvironments::new(["prod"])),
            "Github-OIDC-prod"
        );
        assert_eq!(
            default_app_name("Github-OIDC", &repo, &TargetEnvironments::default()),
            "Github-OIDC-widgets"
        );
    }

    #[test]
    fn test_full_mode_prompts_for_everything_missing() {
        let file = credentials_file();
        let path = file.path().to_str().unwrap();
        let mut prompter = answers(&["acme/widgets", "prod", "", path]);

        let request = gather_request(
            RequestInput::empty(PromptMode::Full),
            &SetupConfig::default(),
            &mut prompter,
        )
        .expect("request");

        assert_eq!(request.repo.to_string(), "acme/widgets");
        assert_eq!(request.environments.primary(), Some("prod"));
        assert_eq!(request.app_name, "Github-OIDC-prod");
        assert_eq!(request.role, "Contributor");
        assert!(request.scope_selection.is_none());
    }

    #[test]
    fn test_never_mode_requires_repository() {
        let mut prompter = answers(&[]);
        let err = gather_request(
            RequestInput::empty(PromptMode::Never),
            &SetupConfig::default(),
            &mut prompter,
        )
        .unwrap_err();
        assert!(matches!(err, SetupError::Usage(_)));
    }

    #[test]
    fn test_never_mode_requires_scope() {
        let file = credentials_file();
        let input = RequestInput {
            app_name: Some("Github-OIDC-prod".to_string()),
            repo: Some("acme/widgets".to_string()),
            credentials_file: Some(file.path().to_path_buf()),
            ..RequestInput::empty(PromptMode::Never)
        };
        let err = gather_request(input, &SetupConfig::default(), &mut answers(&[]))
            .unwrap_err();
        assert!(err.to_string().contains("--scope"));
    }

    #[test]
    fn test_missing_credentials_file_is_usage_error() {
        let input = RequestInput {
            app_name: Some("Github-OIDC-prod".to_string()),
            repo: Some("acme/widgets".to_string()),
            credentials_file: Some(PathBuf::from("/nonexistent/fics.json")),
            scope: Some("Platform".to_string()),
            ..RequestInput::empty(PromptMode::Never)
        };
        let err = gather_request(input, &SetupConfig::default(), &mut answers(&[]))
            .unwrap_err();
        assert!(matches!(err, SetupError::Usage(ref m) if m.contains("/nonexistent/fics.json")));
    }

    #[test]
    fn test_role_flag_overrides_config() {
        let file = credentials_file();
        let input = RequestInput {
            app_name: Some("app".to_string()),
            repo: Some("acme/widgets".to_string()),
            credentials_file: Some(file.path().to_path_buf()),
            scope: Some("Platform".to_string()),
            role: Some("Reader".to_string()),
            environments: vec!["prod".to_string(), "staging".to_string()],
            ..RequestInput::empty(PromptMode::Never)
        };
        let request =
            gather_request(input, &SetupConfig::default(), &mut answers(&[]))
                .expect("request");
        assert_eq!(request.role, "Reader");
        assert_eq!(request.environments.to_string(), "prod, staging");
    }
}
