//! Pull requests, backed by GitLab merge requests.

use super::ApiObject;
use crate::client::Scope;
use crate::errors::Result;
use crate::gitlab::GitLabMergeRequest;
use crate::gitlab::types::{
    AcceptMergeRequestOptions, CreateMergeRequestOptions, UpdateMergeRequestOptions,
};
use crate::info::{EditOptions, MergeMethod, PullRequestInfo};
use crate::refs::RepositoryRef;
use crate::validation::Validator;

#[derive(Debug, Clone)]
pub struct PullRequest {
    merge_request: GitLabMergeRequest,
}

impl PullRequest {
    pub fn get(&self) -> PullRequestInfo {
        let mr = &self.merge_request;
        PullRequestInfo {
            title: mr.title.clone(),
            description: mr.description.clone().unwrap_or_default(),
            web_url: mr.web_url.clone(),
            number: mr.iid,
            merged: mr.state == "merged",
            source_branch: mr.source_branch.clone(),
            target_branch: mr.target_branch.clone(),
        }
    }

    pub fn api_object(&self) -> ApiObject<'_> {
        ApiObject::MergeRequest(&self.merge_request)
    }
}

/// Pull requests of one repository.
#[derive(Debug, Clone)]
pub struct PullRequestClient {
    scope: Scope,
    reference: RepositoryRef,
}

impl PullRequestClient {
    pub(crate) fn new(scope: Scope, reference: RepositoryRef) -> Self {
        Self { scope, reference }
    }

    pub async fn list(&self) -> Result<Vec<PullRequest>> {
        let mrs = self
            .scope
            .gitlab
            .list_merge_requests(&self.reference.full_path())
            .await?;
        Ok(mrs
            .into_iter()
            .map(|merge_request| PullRequest { merge_request })
            .collect())
    }

    pub async fn get(&self, number: u64) -> Result<PullRequest> {
        let merge_request = self
            .scope
            .gitlab
            .get_merge_request(&self.reference.full_path(), number)
            .await?;
        Ok(PullRequest { merge_request })
    }

    /// Open a pull request from `branch` into `base`.
    pub async fn create(
        &self,
        title: &str,
        branch: &str,
        base: &str,
        description: &str,
    ) -> Result<PullRequest> {
        let mut v = Validator::new("PullRequest");
        v.required("title", title)
            .required("branch", branch)
            .required("base", base);
        v.finish()?;

        let merge_request = self
            .scope
            .gitlab
            .create_merge_request(
                &self.reference.full_path(),
                &CreateMergeRequestOptions {
                    source_branch: branch.to_string(),
                    target_branch: base.to_string(),
                    title: title.to_string(),
                    description: (!description.is_empty()).then(|| description.to_string()),
                },
            )
            .await?;
        Ok(PullRequest { merge_request })
    }

    pub async fn edit(&self, number: u64, options: EditOptions) -> Result<PullRequest> {
        let mut v = Validator::new("EditOptions");
        v.not_blank("title", options.title.as_deref());
        v.finish()?;

        let merge_request = self
            .scope
            .gitlab
            .update_merge_request(
                &self.reference.full_path(),
                number,
                &UpdateMergeRequestOptions {
                    title: options.title,
                    description: None,
                },
            )
            .await?;
        Ok(PullRequest { merge_request })
    }

    /// Merge once GitLab has finished computing mergeability.
    ///
    /// Fails with `MergeabilityPending` if GitLab is still checking after the
    /// configured number of polls, or `NotMergeable` on conflicts.
    pub async fn merge(&self, number: u64, method: MergeMethod, message: &str) -> Result<()> {
        let message = (!message.is_empty()).then(|| message.to_string());
        let options = match method {
            MergeMethod::Merge => AcceptMergeRequestOptions {
                merge_commit_message: message,
                ..Default::default()
            },
            MergeMethod::Squash => AcceptMergeRequestOptions {
                squash_commit_message: message,
                squash: Some(true),
                ..Default::default()
            },
        };

        self.scope
            .gitlab
            .accept_merge_request(&self.reference.full_path(), number, &options)
            .await?;
        Ok(())
    }
}
