//! GitLab API data types.
//!
//! Response types model only the fields this crate needs; unknown fields are
//! ignored so the types stay resilient to API additions. Fields GitLab may
//! omit are `Option` or `#[serde(default)]`; anything else missing from a
//! response is a shape error.
//!
//! API docs: https://docs.gitlab.com/ee/api/rest/

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::info::RepositoryVisibility;
use crate::validation::{ValidationErrors, Validator};

/// GitLab project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitLabProject {
    /// Project ID.
    pub id: u64,
    /// Project name.
    pub name: String,
    /// Project path (slug).
    pub path: String,
    /// Full path including namespace (e.g., "group/subgroup/project").
    pub path_with_namespace: String,
    /// Project description.
    #[serde(default)]
    pub description: Option<String>,
    /// Default branch name (absent for empty repositories).
    #[serde(default)]
    pub default_branch: Option<String>,
    /// Visibility level.
    pub visibility: RepositoryVisibility,
    /// Owning namespace (group or user).
    pub namespace: GitLabNamespace,
    /// Web URL to the project.
    pub web_url: String,
    /// SSH clone URL.
    #[serde(default)]
    pub ssh_url_to_repo: Option<String>,
    /// HTTP clone URL.
    #[serde(default)]
    pub http_url_to_repo: Option<String>,
    /// Whether the project is archived.
    #[serde(default)]
    pub archived: bool,
    /// When the project was created.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// When the project was last active.
    #[serde(default)]
    pub last_activity_at: Option<DateTime<Utc>>,
    /// Groups this project is shared with.
    #[serde(default)]
    pub shared_with_groups: Vec<GitLabSharedGroup>,
}

/// GitLab namespace (group or user).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitLabNamespace {
    pub id: u64,
    pub name: String,
    pub path: String,
    /// Full path (e.g., "group/subgroup").
    pub full_path: String,
    /// "group" or "user".
    pub kind: String,
}

/// A group a project is shared with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitLabSharedGroup {
    pub group_id: u64,
    pub group_name: String,
    pub group_full_path: String,
    pub group_access_level: u32,
    #[serde(default)]
    pub expires_at: Option<String>,
}

/// GitLab group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitLabGroup {
    pub id: u64,
    pub name: String,
    pub path: String,
    /// Full path (e.g., "parent/child").
    pub full_path: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub parent_id: Option<u64>,
    #[serde(default)]
    pub web_url: Option<String>,
}

/// GitLab user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitLabUser {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub web_url: Option<String>,
}

/// Member of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitLabGroupMember {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
    pub access_level: u32,
}

/// Project deploy key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitLabDeployKey {
    pub id: u64,
    pub title: String,
    pub key: String,
    #[serde(default)]
    pub can_push: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fingerprint: Option<String>,
}

/// Project deploy token.
///
/// `token` is present only in the create response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitLabDeployToken {
    pub id: u64,
    pub name: String,
    pub username: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub revoked: bool,
    #[serde(default)]
    pub expired: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Repository commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitLabCommit {
    /// Full SHA.
    pub id: String,
    #[serde(default)]
    pub short_id: String,
    #[serde(default)]
    pub title: String,
    pub message: String,
    pub author_name: String,
    #[serde(default)]
    pub author_email: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub web_url: String,
    #[serde(default)]
    pub parent_ids: Vec<String>,
}

/// The head commit reference embedded in a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitLabBranchCommit {
    pub id: String,
}

/// Repository branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitLabBranch {
    pub name: String,
    pub commit: GitLabBranchCommit,
    #[serde(default)]
    pub protected: bool,
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub web_url: Option<String>,
}

/// Merge request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitLabMergeRequest {
    pub id: u64,
    /// Project-scoped number.
    pub iid: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// "opened", "closed", "locked" or "merged".
    pub state: String,
    /// Vendor-computed, asynchronously refreshed mergeability.
    #[serde(default = "unchecked")]
    pub merge_status: String,
    #[serde(default)]
    pub detailed_merge_status: Option<String>,
    pub source_branch: String,
    pub target_branch: String,
    pub web_url: String,
    #[serde(default)]
    pub sha: Option<String>,
    #[serde(default)]
    pub merge_commit_sha: Option<String>,
    #[serde(default)]
    pub squash_commit_sha: Option<String>,
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
}

fn unchecked() -> String {
    "unchecked".to_string()
}

/// Repository tree node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitLabTreeNode {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub path: String,
    pub mode: String,
}

/// Repository file, as returned by the files API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitLabFile {
    pub file_name: String,
    pub file_path: String,
    #[serde(default)]
    pub size: u64,
    /// Always "base64" for the files API.
    pub encoding: String,
    pub content: String,
    #[serde(default)]
    pub blob_id: Option<String>,
    #[serde(default)]
    pub last_commit_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// `POST /projects`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProjectOptions {
    pub name: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<RepositoryVisibility>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<String>,
}

/// `PUT /projects/:id`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditProjectOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<RepositoryVisibility>,
}

/// `POST /projects/:id/deploy_keys`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddDeployKeyOptions {
    pub title: String,
    pub key: String,
    pub can_push: bool,
}

/// `POST /projects/:id/deploy_tokens`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDeployTokenOptions {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub scopes: Vec<String>,
}

/// `POST /projects/:id/share`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareWithGroupOptions {
    pub group_id: u64,
    pub group_access: u32,
}

/// One file action in `POST /projects/:id/repository/commits`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitAction {
    pub action: CommitActionKind,
    pub file_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitActionKind {
    Create,
    Update,
    Delete,
}

/// `POST /projects/:id/repository/commits`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCommitOptions {
    pub branch: String,
    pub commit_message: String,
    pub actions: Vec<CommitAction>,
}

/// `POST /projects/:id/repository/branches`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBranchOptions {
    pub branch: String,
    #[serde(rename = "ref")]
    pub reference: String,
}

/// `POST /projects/:id/merge_requests`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateMergeRequestOptions {
    pub source_branch: String,
    pub target_branch: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// `PUT /projects/:id/merge_requests/:iid`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateMergeRequestOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// `PUT /projects/:id/merge_requests/:iid/merge`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptMergeRequestOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_commit_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub squash_commit_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub squash: Option<bool>,
}

// ---------------------------------------------------------------------------
// Shape checks beyond what serde enforces
// ---------------------------------------------------------------------------

/// Required-field checks on a decoded response object.
pub(crate) trait CheckShape {
    fn check_shape(&self) -> Result<(), ValidationErrors>;
}

impl CheckShape for GitLabProject {
    fn check_shape(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new("GitLabProject");
        if self.id == 0 {
            v.missing("id");
        }
        v.required("name", &self.name)
            .required("path", &self.path)
            .required("path_with_namespace", &self.path_with_namespace)
            .required("namespace.full_path", &self.namespace.full_path);
        v.finish()
    }
}

impl CheckShape for GitLabGroup {
    fn check_shape(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new("GitLabGroup");
        if self.id == 0 {
            v.missing("id");
        }
        v.required("name", &self.name)
            .required("full_path", &self.full_path);
        v.finish()
    }
}

impl CheckShape for GitLabUser {
    fn check_shape(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new("GitLabUser");
        v.required("username", &self.username);
        v.finish()
    }
}

impl CheckShape for GitLabGroupMember {
    fn check_shape(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new("GitLabGroupMember");
        v.required("username", &self.username);
        v.finish()
    }
}

impl CheckShape for GitLabDeployKey {
    fn check_shape(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new("GitLabDeployKey");
        if self.id == 0 {
            v.missing("id");
        }
        v.required("title", &self.title).required("key", &self.key);
        v.finish()
    }
}

impl CheckShape for GitLabDeployToken {
    fn check_shape(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new("GitLabDeployToken");
        if self.id == 0 {
            v.missing("id");
        }
        v.required("name", &self.name);
        v.finish()
    }
}

impl CheckShape for GitLabCommit {
    fn check_shape(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new("GitLabCommit");
        v.required("id", &self.id);
        v.finish()
    }
}

impl CheckShape for GitLabBranch {
    fn check_shape(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new("GitLabBranch");
        v.required("name", &self.name)
            .required("commit.id", &self.commit.id);
        v.finish()
    }
}

impl CheckShape for GitLabMergeRequest {
    fn check_shape(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new("GitLabMergeRequest");
        if self.iid == 0 {
            v.missing("iid");
        }
        v.required("source_branch", &self.source_branch)
            .required("target_branch", &self.target_branch);
        v.finish()
    }
}

impl CheckShape for GitLabTreeNode {
    fn check_shape(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new("GitLabTreeNode");
        v.required("id", &self.id).required("path", &self.path);
        v.finish()
    }
}

impl CheckShape for GitLabFile {
    fn check_shape(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new("GitLabFile");
        v.required("file_path", &self.file_path);
        if self.encoding != "base64" {
            v.invalid("encoding", format!("unsupported encoding {:?}", self.encoding));
        }
        v.finish()
    }
}
