//! # Azure CLI Response Types
//!
//! JSON shapes printed by `az ... --output json`. Only the fields the setup
//! flow reads are modelled; everything else is ignored.

use serde::Deserialize;

/// `az account show`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountShow {
    /// Subscription id of the default subscription
    pub id: String,
    pub tenant_id: String,
}

/// Element of `az account management-group list`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagementGroupEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Element of `az account list`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionEntry {
    /// Subscription id (GUID)
    pub id: String,
    /// Subscription display name
    pub name: String,
    #[serde(default)]
    pub state: Option<String>,
}

/// Element of `az ad app list` / output of `az ad app create`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationEntry {
    pub app_id: String,
    pub display_name: String,
    /// Directory object id
    pub id: String,
}

/// Element of `az ad sp list` / output of `az ad sp create`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePrincipalEntry {
    pub id: String,
    pub app_id: String,
}

/// Element of `az role assignment list` / output of `az role assignment create`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAssignmentEntry {
    pub scope: String,
    pub principal_id: String,
    #[serde(default)]
    pub role_definition_name: Option<String>,
}
