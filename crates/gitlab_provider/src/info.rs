//! Provider-agnostic desired-state types.
//!
//! Each Info type is what a caller declares about a resource. Before being
//! sent to the vendor it is validated ([`Validate`]) and defaulted
//! ([`Defaulted`]).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ProviderError;
use crate::permissions::RepositoryPermission;
use crate::validation::{Defaulted, Validate, ValidationErrors, Validator};

/// Default branch for new repositories.
pub const DEFAULT_BRANCH: &str = "main";

/// Repository visibility as understood by GitLab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryVisibility {
    Public,
    Internal,
    #[default]
    Private,
}

impl RepositoryVisibility {
    pub fn as_str(self) -> &'static str {
        match self {
            RepositoryVisibility::Public => "public",
            RepositoryVisibility::Internal => "internal",
            RepositoryVisibility::Private => "private",
        }
    }
}

impl fmt::Display for RepositoryVisibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepositoryVisibility {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "public" => Ok(RepositoryVisibility::Public),
            "internal" => Ok(RepositoryVisibility::Internal),
            "private" => Ok(RepositoryVisibility::Private),
            other => Err(ProviderError::invalid_argument(
                "RepositoryInfo",
                "visibility",
                format!("unknown visibility {other:?}"),
            )),
        }
    }
}

/// Desired state of a repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    pub description: Option<String>,
    pub default_branch: Option<String>,
    pub visibility: Option<RepositoryVisibility>,
}

impl Validate for RepositoryInfo {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new("RepositoryInfo");
        v.not_blank("default_branch", self.default_branch.as_deref());
        v.finish()
    }
}

impl Defaulted for RepositoryInfo {
    fn default_fields(&mut self) {
        self.default_branch
            .get_or_insert_with(|| DEFAULT_BRANCH.to_string());
        self.visibility.get_or_insert(RepositoryVisibility::Private);
    }
}

/// Desired state of a deploy key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployKeyInfo {
    pub name: String,
    /// Public key material, e.g. `ssh-ed25519 AAAA...`.
    pub key: Vec<u8>,
    pub read_only: Option<bool>,
}

impl Validate for DeployKeyInfo {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new("DeployKeyInfo");
        v.required("name", &self.name).required_bytes("key", &self.key);
        if !self.key.is_empty() && std::str::from_utf8(&self.key).is_err() {
            v.invalid("key", "must be valid UTF-8");
        }
        v.finish()
    }
}

impl Defaulted for DeployKeyInfo {
    fn default_fields(&mut self) {
        self.read_only.get_or_insert(true);
    }
}

/// Desired state of a deploy token.
///
/// `token` is only ever filled in from a create response; GitLab never
/// returns it again.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployTokenInfo {
    pub name: String,
    pub username: Option<String>,
    pub token: Option<String>,
}

impl Validate for DeployTokenInfo {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new("DeployTokenInfo");
        v.required("name", &self.name)
            .not_blank("username", self.username.as_deref());
        v.finish()
    }
}

impl Defaulted for DeployTokenInfo {
    fn default_fields(&mut self) {}
}

/// Desired access of a team (a GitLab group, by full path) to a repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamAccessInfo {
    pub name: String,
    pub permission: Option<RepositoryPermission>,
}

impl Validate for TeamAccessInfo {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new("TeamAccessInfo");
        v.required("name", &self.name);
        v.finish()
    }
}

impl Defaulted for TeamAccessInfo {
    fn default_fields(&mut self) {
        self.permission.get_or_insert(RepositoryPermission::Pull);
    }
}

/// Read-only view of an organization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationInfo {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Read-only view of a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub sha: String,
    pub author: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub url: String,
}

/// A file to write (or, with `content: None`, delete) in a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitFile {
    pub path: String,
    pub content: Option<String>,
}

impl Validate for CommitFile {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new("CommitFile");
        v.required("path", &self.path);
        v.finish()
    }
}

/// Read-only view of a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchInfo {
    pub name: String,
    pub sha: String,
    pub protected: bool,
    pub default: bool,
}

/// Read-only view of a pull request (GitLab merge request).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestInfo {
    pub title: String,
    pub description: String,
    pub web_url: String,
    pub number: u64,
    pub merged: bool,
    pub source_branch: String,
    pub target_branch: String,
}

/// How a pull request is merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMethod {
    #[default]
    Merge,
    Squash,
}

/// Editable pull request fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditOptions {
    pub title: Option<String>,
}

/// One entry of a git tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    pub mode: String,
    /// `blob`, `tree` or `commit`.
    pub kind: String,
    pub sha: String,
}

/// A tree and its entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeInfo {
    pub sha: String,
    pub tree: Vec<TreeEntry>,
    pub truncated: bool,
}

/// A team and its members' logins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamInfo {
    pub name: String,
    pub members: Vec<String>,
}
