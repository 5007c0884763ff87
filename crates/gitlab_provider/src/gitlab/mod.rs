//! GitLab vendor client.
//!
//! # Module Structure
//!
//! - [`types`] - Request and response data structures
//! - [`error`] - Classification of responses into [`crate::ProviderError`]
//! - [`pagination`] - `X-Next-Page` pagination
//! - [`client`] - The [`GitLabClient`] itself

mod client;
pub(crate) mod error;
pub mod pagination;
pub mod types;

pub use client::{GitLabClient, TokenType};

pub use types::{
    GitLabBranch, GitLabCommit, GitLabDeployKey, GitLabDeployToken, GitLabFile, GitLabGroup,
    GitLabGroupMember, GitLabMergeRequest, GitLabNamespace, GitLabProject, GitLabSharedGroup,
    GitLabTreeNode, GitLabUser,
};
