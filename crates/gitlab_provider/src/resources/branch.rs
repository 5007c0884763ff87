//! Branches.

use super::ApiObject;
use crate::client::Scope;
use crate::errors::Result;
use crate::gitlab::GitLabBranch;
use crate::gitlab::types::CreateBranchOptions;
use crate::info::BranchInfo;
use crate::refs::RepositoryRef;
use crate::validation::Validator;

#[derive(Debug, Clone)]
pub struct Branch {
    branch: GitLabBranch,
}

impl Branch {
    pub fn get(&self) -> BranchInfo {
        BranchInfo {
            name: self.branch.name.clone(),
            sha: self.branch.commit.id.clone(),
            protected: self.branch.protected,
            default: self.branch.default,
        }
    }

    pub fn api_object(&self) -> ApiObject<'_> {
        ApiObject::Branch(&self.branch)
    }
}

/// Branches of one repository.
#[derive(Debug, Clone)]
pub struct BranchClient {
    scope: Scope,
    reference: RepositoryRef,
}

impl BranchClient {
    pub(crate) fn new(scope: Scope, reference: RepositoryRef) -> Self {
        Self { scope, reference }
    }

    pub async fn get(&self, name: &str) -> Result<Branch> {
        let branch = self
            .scope
            .gitlab
            .get_branch(&self.reference.full_path(), name)
            .await?;
        Ok(Branch { branch })
    }

    pub async fn list(&self) -> Result<Vec<Branch>> {
        let branches = self
            .scope
            .gitlab
            .list_branches(&self.reference.full_path())
            .await?;
        Ok(branches.into_iter().map(|branch| Branch { branch }).collect())
    }

    /// Create `name` pointing at `sha` (or any ref GitLab resolves).
    pub async fn create(&self, name: &str, sha: &str) -> Result<Branch> {
        let mut v = Validator::new("Branch");
        v.required("name", name).required("sha", sha);
        v.finish()?;

        let branch = self
            .scope
            .gitlab
            .create_branch(
                &self.reference.full_path(),
                &CreateBranchOptions {
                    branch: name.to_string(),
                    reference: sha.to_string(),
                },
            )
            .await?;
        Ok(Branch { branch })
    }
}
