//! # OIDC Setup
//!
//! Provisions workload identity federation between GitHub Actions and Azure.
//!
//! A run converges the following to the requested state, creating only what
//! is missing:
//!
//! 1. An Azure app registration and its service principal
//! 2. A role assignment at a management group or subscription
//! 3. Federated credentials declared in a JSON file
//! 4. GitHub environments and the secrets a workflow needs for `azure/login`
//!
//! All remote work goes through the `az`, `gh`, `jq` and `envsubst` command
//! line tools behind the [`tools::ToolRunner`] seam.

pub mod cli;
pub mod config;
pub mod constants;
pub mod controller;
pub mod credentials;
pub mod error;
pub mod prompt;
pub mod provider;
pub mod scope;
pub mod secrets;
pub mod tools;
