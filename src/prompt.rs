//! # Interactive Prompts
//!
//! Operator input and the retry-until-valid loops built on it. The loops never
//! give up on bad input; they stop only when input is closed.

use crate::controller::environment::validate_environment_name;
use crate::provider::RepoSlug;
use crate::scope::{resolve_scope, AuthScope, ScopeKind};
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("input closed while waiting for {0}")]
    Closed(String),
    #[error("failed to read {what}: {source}")]
    Io {
        what: String,
        #[source]
        source: io::Error,
    },
}

/// Source of operator answers
pub trait Prompter: Send {
    /// Ask a question and return the raw answer without its line ending
    ///
    /// # Errors
    /// Returns [`PromptError::Closed`] when no more input is available
    fn ask(&mut self, question: &str) -> Result<String, PromptError>;
}

/// Prompter reading from the process's stdin
#[derive(Debug, Default)]
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn ask(&mut self, question: &str) -> Result<String, PromptError> {
        print!("{question}");
        io::stdout().flush().map_err(|source| PromptError::Io {
            what: question.trim().to_string(),
            source,
        })?;

        let mut buffer = String::new();
        let read = io::stdin()
            .lock()
            .read_line(&mut buffer)
            .map_err(|source| PromptError::Io {
                what: question.trim().to_string(),
                source,
            })?;
        if read == 0 {
            println!();
            return Err(PromptError::Closed(question.trim().to_string()));
        }
        Ok(buffer.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// Ask with a default used for blank answers
///
/// # Errors
/// Propagates prompt failures
pub fn ask_with_default(
    prompter: &mut dyn Prompter,
    question: &str,
    default: &str,
) -> Result<String, PromptError> {
    let answer = prompter.ask(&format!("{question} [{default}]: "))?;
    let answer = answer.trim();
    Ok(if answer.is_empty() {
        default.to_string()
    } else {
        answer.to_string()
    })
}

/// Ask a yes/no question
///
/// # Errors
/// Propagates prompt failures
pub fn confirm(
    prompter: &mut dyn Prompter,
    question: &str,
    default_yes: bool,
) -> Result<bool, PromptError> {
    let hint = if default_yes { "[Y/n]" } else { "[y/N]" };
    let answer = prompter.ask(&format!("{question} {hint} "))?;
    Ok(parse_yes_no(&answer, default_yes))
}

fn parse_yes_no(answer: &str, default_yes: bool) -> bool {
    match answer.trim().to_lowercase().as_str() {
        "" => default_yes,
        "y" | "yes" => true,
        _ => false,
    }
}

/// Ask for a repository slug until a valid `org/repo` is entered
///
/// # Errors
/// Propagates prompt failures
pub fn prompt_repository(prompter: &mut dyn Prompter) -> Result<RepoSlug, PromptError> {
    loop {
        let answer = prompter.ask("GitHub repository (org/repo): ")?;
        match answer.parse::<RepoSlug>() {
            Ok(slug) => return Ok(slug),
            Err(reason) => println!("✗ {reason}"),
        }
    }
}

/// Ask for an environment name until a valid one is entered
///
/// # Errors
/// Propagates prompt failures
pub fn prompt_environment_name(prompter: &mut dyn Prompter) -> Result<String, PromptError> {
    loop {
        let answer = prompter.ask("GitHub environment name: ")?;
        match validate_environment_name(&answer) {
            Ok(name) => return Ok(name),
            Err(reason) => println!("✗ {reason}"),
        }
    }
}

/// Show the candidate scopes and ask until the selection resolves
///
/// # Errors
/// Propagates prompt failures
pub fn prompt_scope(
    prompter: &mut dyn Prompter,
    kind: ScopeKind,
    scopes: &[AuthScope],
) -> Result<AuthScope, PromptError> {
    println!("\nAvailable {kind}s:");
    for scope in scopes {
        println!("  • {scope}");
    }

    loop {
        let answer = prompter.ask(&format!("Select a {kind} (path, name or display name): "))?;
        match resolve_scope(kind, scopes, &answer) {
            Ok(scope) => {
                if !scope.verified {
                    println!("► using unlisted {kind} {}", scope.path);
                }
                return Ok(scope);
            }
            Err(reason) => println!("✗ {reason}"),
        }
    }
}
