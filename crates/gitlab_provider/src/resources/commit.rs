//! Commits.

use std::collections::HashSet;

use super::ApiObject;
use crate::client::Scope;
use crate::errors::Result;
use crate::gitlab::GitLabCommit;
use crate::gitlab::types::{CommitAction, CommitActionKind, CreateCommitOptions};
use crate::info::{CommitFile, CommitInfo};
use crate::refs::RepositoryRef;
use crate::validation::{Validate, Validator};

/// A commit as returned by GitLab.
#[derive(Debug, Clone)]
pub struct Commit {
    commit: GitLabCommit,
}

impl Commit {
    pub fn get(&self) -> CommitInfo {
        CommitInfo {
            sha: self.commit.id.clone(),
            author: self.commit.author_name.clone(),
            message: self.commit.message.clone(),
            created_at: self.commit.created_at,
            url: self.commit.web_url.clone(),
        }
    }

    pub fn api_object(&self) -> ApiObject<'_> {
        ApiObject::Commit(&self.commit)
    }
}

/// Commits of one repository.
#[derive(Debug, Clone)]
pub struct CommitClient {
    scope: Scope,
    reference: RepositoryRef,
}

impl CommitClient {
    pub(crate) fn new(scope: Scope, reference: RepositoryRef) -> Self {
        Self { scope, reference }
    }

    /// One page of commits on `branch`, newest first. Pages start at 1.
    pub async fn list_page(&self, branch: &str, per_page: u32, page: u32) -> Result<Vec<Commit>> {
        let commits = self
            .scope
            .gitlab
            .list_commits_page(&self.reference.full_path(), branch, per_page, page.max(1))
            .await?;
        Ok(commits.into_iter().map(|commit| Commit { commit }).collect())
    }

    /// Commit `files` to `branch`. A file with no content is deleted.
    pub async fn create(&self, branch: &str, message: &str, files: Vec<CommitFile>) -> Result<Commit> {
        let mut v = Validator::new("Commit");
        v.required("branch", branch).required("message", message);
        if files.is_empty() {
            v.missing("files");
        }
        for file in &files {
            if let Err(e) = file.validate() {
                for err in e.errors {
                    v.invalid(&format!("files.{}", err.field), err.to_string());
                }
            }
        }
        v.finish()?;

        let path = self.reference.full_path();
        let existing = self.existing_paths(&path, branch).await?;
        let actions = files
            .into_iter()
            .map(|file| {
                let action = match (&file.content, existing.contains(&file.path)) {
                    (None, _) => CommitActionKind::Delete,
                    (Some(_), true) => CommitActionKind::Update,
                    (Some(_), false) => CommitActionKind::Create,
                };
                CommitAction {
                    action,
                    file_path: file.path,
                    content: file.content,
                }
            })
            .collect();

        let commit = self
            .scope
            .gitlab
            .create_commit(
                &path,
                &CreateCommitOptions {
                    branch: branch.to_string(),
                    commit_message: message.to_string(),
                    actions,
                },
            )
            .await?;
        tracing::info!(repository = %self.reference, branch, sha = %commit.id, "Created commit");
        Ok(Commit { commit })
    }

    /// Blob paths on `branch`; empty when the branch does not exist yet.
    async fn existing_paths(&self, path: &str, branch: &str) -> Result<HashSet<String>> {
        match self.scope.gitlab.list_tree(path, branch, None, true).await {
            Ok(nodes) => Ok(nodes
                .into_iter()
                .filter(|n| n.kind == "blob")
                .map(|n| n.path)
                .collect()),
            Err(e) if e.is_not_found() => Ok(HashSet::new()),
            Err(e) => Err(e),
        }
    }
}
