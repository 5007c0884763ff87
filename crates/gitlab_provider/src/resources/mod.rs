//! Resource wrappers and the collection clients that produce them.
//!
//! A wrapper owns the last vendor object it saw. `set` changes only that
//! local copy; `update` and `reconcile` replace it wholesale with the server's
//! answer, or leave it untouched on error. A wrapper must not be reused after
//! its `delete` succeeds.

mod branch;
mod commit;
mod deploy_key;
mod deploy_token;
mod file;
mod organization;
mod pull_request;
mod repository;
mod team_access;
mod tree;

pub use branch::{Branch, BranchClient};
pub use commit::{Commit, CommitClient};
pub use deploy_key::{DeployKey, DeployKeyClient};
pub use deploy_token::{DeployToken, DeployTokenClient};
pub use file::FileClient;
pub use organization::{Organization, OrganizationsClient, Team, TeamsClient};
pub use pull_request::{PullRequest, PullRequestClient};
pub use repository::{OrgRepositoriesClient, OrgRepository, UserRepositoriesClient, UserRepository};
pub use team_access::{TeamAccess, TeamAccessClient};
pub use tree::TreeClient;

use crate::gitlab::{
    GitLabBranch, GitLabCommit, GitLabDeployKey, GitLabDeployToken, GitLabGroup,
    GitLabMergeRequest, GitLabProject, GitLabSharedGroup,
};

/// The raw GitLab object behind a wrapper.
///
/// This is the provider extension point: callers who need GitLab-specific
/// fields match on it (or use the `as_*` accessors) instead of going through
/// the provider-agnostic Info types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiObject<'a> {
    Group(&'a GitLabGroup),
    Project(&'a GitLabProject),
    DeployKey(&'a GitLabDeployKey),
    DeployToken(&'a GitLabDeployToken),
    SharedGroup(&'a GitLabSharedGroup),
    Commit(&'a GitLabCommit),
    Branch(&'a GitLabBranch),
    MergeRequest(&'a GitLabMergeRequest),
}

impl<'a> ApiObject<'a> {
    pub fn as_group(self) -> Option<&'a GitLabGroup> {
        match self {
            ApiObject::Group(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_project(self) -> Option<&'a GitLabProject> {
        match self {
            ApiObject::Project(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_deploy_key(self) -> Option<&'a GitLabDeployKey> {
        match self {
            ApiObject::DeployKey(k) => Some(k),
            _ => None,
        }
    }

    pub fn as_deploy_token(self) -> Option<&'a GitLabDeployToken> {
        match self {
            ApiObject::DeployToken(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_shared_group(self) -> Option<&'a GitLabSharedGroup> {
        match self {
            ApiObject::SharedGroup(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_commit(self) -> Option<&'a GitLabCommit> {
        match self {
            ApiObject::Commit(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_branch(self) -> Option<&'a GitLabBranch> {
        match self {
            ApiObject::Branch(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_merge_request(self) -> Option<&'a GitLabMergeRequest> {
        match self {
            ApiObject::MergeRequest(mr) => Some(mr),
            _ => None,
        }
    }
}
