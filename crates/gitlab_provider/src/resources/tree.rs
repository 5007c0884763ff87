//! Reading git trees.

use crate::client::Scope;
use crate::errors::{ProviderError, Result};
use crate::gitlab::GitLabTreeNode;
use crate::info::{TreeEntry, TreeInfo};
use crate::refs::RepositoryRef;

fn tree_entry(node: GitLabTreeNode) -> TreeEntry {
    TreeEntry {
        path: node.path,
        mode: node.mode,
        kind: node.kind,
        sha: node.id,
    }
}

/// Trees of one repository.
#[derive(Debug, Clone)]
pub struct TreeClient {
    scope: Scope,
    reference: RepositoryRef,
}

impl TreeClient {
    pub(crate) fn new(scope: Scope, reference: RepositoryRef) -> Self {
        Self { scope, reference }
    }

    /// The tree at `sha` (a commit, branch or tag). Pagination is followed,
    /// so `truncated` is always `false`.
    pub async fn get(&self, sha: &str, recursive: bool) -> Result<TreeInfo> {
        let tree = self.list(sha, "", recursive).await?;
        Ok(TreeInfo {
            sha: sha.to_string(),
            tree,
            truncated: false,
        })
    }

    /// Entries under `path` at `sha`.
    pub async fn list(&self, sha: &str, path: &str, recursive: bool) -> Result<Vec<TreeEntry>> {
        let nodes = self
            .scope
            .gitlab
            .list_tree(&self.reference.full_path(), sha, Some(path), recursive)
            .await?;
        Ok(nodes.into_iter().map(tree_entry).collect())
    }

    /// GitLab has no API for writing raw tree objects.
    pub async fn create(&self, _tree: &[TreeEntry]) -> Result<TreeInfo> {
        Err(ProviderError::no_provider_support("creating git trees"))
    }
}
