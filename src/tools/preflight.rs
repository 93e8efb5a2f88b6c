//! # Preflight Checks
//!
//! Runs before any remote call:
//!
//! 1. Refuse known-incompatible sandboxes (GitHub Codespaces). Role assignments
//!    made from there do not propagate reliably, so the run stops cleanly.
//! 2. Verify every [`ExternalTool`] is installed. The first missing one aborts.

use super::{ExternalTool, ToolRunner};
use crate::config::is_truthy;
use thiserror::Error;
use tracing::debug;

/// Preflight failure
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PreflightError {
    #[error("required dependency {tool} was not found in PATH ({})", tool.install_hint())]
    MissingDependency { tool: ExternalTool },
}

/// Return an explanation when the process runs inside an unsupported sandbox
///
/// `flag_var` names the variable that marks the sandbox; it counts as set when
/// its value is truthy (`true`, `1`, `yes`, `on`).
pub fn detect_sandbox(lookup: impl Fn(&str) -> Option<String>, flag_var: &str) -> Option<String> {
    let value = lookup(flag_var)?;
    if !is_truthy(&value) {
        return None;
    }
    Some(format!(
        "{flag_var}={value}: role assignments made from this sandboxed environment are not \
         propagated reliably. Run oidc-setup from a local shell or Cloud Shell instead."
    ))
}

/// Verify that all external tools are on `PATH`, reporting the first one missing
///
/// # Errors
/// Returns [`PreflightError::MissingDependency`] for the first absent tool
pub fn check_dependencies(runner: &dyn ToolRunner) -> Result<(), PreflightError> {
    for tool in ExternalTool::REQUIRED {
        match runner.locate(tool.program()) {
            Some(path) => {
                debug!("Found {} at {}", tool.program(), path.display());
                println!("✔ {tool}");
            }
            None => {
                println!("✗ {tool}");
                return Err(PreflightError::MissingDependency { tool });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sandbox_detected_when_flag_is_truthy() {
        let message = detect_sandbox(
            |key| (key == "CODESPACES").then(|| "true".to_string()),
            "CODESPACES",
        );
        let message = message.expect("sandbox should be detected");
        assert!(message.contains("CODESPACES=true"));
    }

    #[test]
    fn test_sandbox_not_detected_when_flag_absent_or_false() {
        assert!(detect_sandbox(|_| None, "CODESPACES").is_none());
        assert!(detect_sandbox(|_| Some("false".to_string()), "CODESPACES").is_none());
    }

    #[test]
    fn test_missing_dependency_message_names_tool() {
        let err = PreflightError::MissingDependency {
            tool: ExternalTool::Jq,
        };
        let message = err.to_string();
        assert!(message.contains("`jq`"));
        assert!(message.contains("JSON query tool"));
    }
}
