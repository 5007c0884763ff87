//! Deploy keys.
//!
//! GitLab cannot edit a deploy key's material in place, so a key whose spec
//! differs is deleted and added again.

use async_trait::async_trait;

use super::ApiObject;
use crate::client::Scope;
use crate::errors::{ProviderError, Result};
use crate::gitlab::types::AddDeployKeyOptions;
use crate::gitlab::{GitLabClient, GitLabDeployKey};
use crate::info::DeployKeyInfo;
use crate::reconcile::{Reconcilable, Reconciled, reconcile, recreate};
use crate::refs::RepositoryRef;
use crate::validation::{Defaulted, Validate};

fn deploy_key_info(key: &GitLabDeployKey) -> DeployKeyInfo {
    DeployKeyInfo {
        name: key.title.clone(),
        key: key.key.clone().into_bytes(),
        read_only: Some(!key.can_push),
    }
}

/// Validate and default `info`, then convert it to a request body.
fn add_options(info: &mut DeployKeyInfo) -> Result<AddDeployKeyOptions> {
    info.validate()?;
    info.default_fields();
    let key = String::from_utf8(info.key.clone())
        .map_err(|e| ProviderError::invalid_argument("DeployKeyInfo", "key", e.to_string()))?;
    Ok(AddDeployKeyOptions {
        title: info.name.clone(),
        key,
        can_push: !info.read_only.unwrap_or(true),
    })
}

fn apply(key: &mut GitLabDeployKey, options: &AddDeployKeyOptions) {
    key.title = options.title.clone();
    key.key = options.key.clone();
    key.can_push = options.can_push;
}

struct DeployKeyReconciler<'a> {
    gitlab: &'a GitLabClient,
    reference: &'a RepositoryRef,
    options: AddDeployKeyOptions,
}

#[async_trait]
impl Reconcilable for DeployKeyReconciler<'_> {
    type Object = GitLabDeployKey;

    fn describe(&self) -> String {
        format!(
            "deploy key {} of {}",
            self.options.title,
            self.reference.full_path()
        )
    }

    async fn fetch(&self) -> Result<GitLabDeployKey> {
        self.gitlab
            .get_deploy_key(&self.reference.full_path(), &self.options.title)
            .await
    }

    async fn create(&self) -> Result<GitLabDeployKey> {
        self.gitlab
            .add_deploy_key(&self.reference.full_path(), &self.options)
            .await
    }

    fn desired(&self, actual: &GitLabDeployKey) -> GitLabDeployKey {
        let mut desired = actual.clone();
        apply(&mut desired, &self.options);
        desired
    }

    async fn update(&self, actual: &GitLabDeployKey, _desired: &GitLabDeployKey) -> Result<GitLabDeployKey> {
        let path = self.reference.full_path();
        recreate(
            self.describe(),
            || self.gitlab.delete_deploy_key(&path, actual.id),
            || self.gitlab.add_deploy_key(&path, &self.options),
        )
        .await
    }
}

/// A deploy key as last seen on the server.
#[derive(Debug, Clone)]
pub struct DeployKey {
    scope: Scope,
    reference: RepositoryRef,
    key: GitLabDeployKey,
}

impl DeployKey {
    fn new(scope: Scope, reference: RepositoryRef, key: GitLabDeployKey) -> Self {
        Self {
            scope,
            reference,
            key,
        }
    }

    pub fn repository(&self) -> &RepositoryRef {
        &self.reference
    }

    pub fn get(&self) -> DeployKeyInfo {
        deploy_key_info(&self.key)
    }

    /// Apply `info` to the local copy only.
    pub fn set(&mut self, mut info: DeployKeyInfo) -> Result<()> {
        let options = add_options(&mut info)?;
        apply(&mut self.key, &options);
        Ok(())
    }

    pub fn api_object(&self) -> ApiObject<'_> {
        ApiObject::DeployKey(&self.key)
    }

    /// Replace the key on the server with the local copy.
    pub async fn update(&mut self) -> Result<()> {
        let path = self.reference.full_path();
        let options = add_options(&mut self.get())?;
        let gitlab = &self.scope.gitlab;
        let key = recreate(
            format!("deploy key {} of {path}", options.title),
            || gitlab.delete_deploy_key(&path, self.key.id),
            || gitlab.add_deploy_key(&path, &options),
        )
        .await?;
        self.key = key;
        Ok(())
    }

    pub async fn delete(&self) -> Result<()> {
        self.scope
            .gitlab
            .delete_deploy_key(&self.reference.full_path(), self.key.id)
            .await
    }

    /// Make the server match the local copy. Returns whether anything changed.
    pub async fn reconcile(&mut self) -> Result<bool> {
        let options = add_options(&mut self.get())?;
        let outcome = reconcile(&DeployKeyReconciler {
            gitlab: &self.scope.gitlab,
            reference: &self.reference,
            options,
        })
        .await?;
        let changed = outcome.action_taken();
        self.key = outcome.into_inner();
        Ok(changed)
    }
}

/// Deploy keys of one repository.
#[derive(Debug, Clone)]
pub struct DeployKeyClient {
    scope: Scope,
    reference: RepositoryRef,
}

impl DeployKeyClient {
    pub(crate) fn new(scope: Scope, reference: RepositoryRef) -> Self {
        Self { scope, reference }
    }

    /// Get a deploy key by name.
    pub async fn get(&self, name: &str) -> Result<DeployKey> {
        let key = self
            .scope
            .gitlab
            .get_deploy_key(&self.reference.full_path(), name)
            .await?;
        Ok(self.wrap(key))
    }

    pub async fn list(&self) -> Result<Vec<DeployKey>> {
        let keys = self
            .scope
            .gitlab
            .list_deploy_keys(&self.reference.full_path())
            .await?;
        Ok(keys.into_iter().map(|k| self.wrap(k)).collect())
    }

    pub async fn create(&self, mut info: DeployKeyInfo) -> Result<DeployKey> {
        let options = add_options(&mut info)?;
        let key = self
            .scope
            .gitlab
            .add_deploy_key(&self.reference.full_path(), &options)
            .await?;
        Ok(self.wrap(key))
    }

    pub async fn reconcile(&self, mut info: DeployKeyInfo) -> Result<Reconciled<DeployKey>> {
        let options = add_options(&mut info)?;
        let outcome = reconcile(&DeployKeyReconciler {
            gitlab: &self.scope.gitlab,
            reference: &self.reference,
            options,
        })
        .await?;
        Ok(outcome.map(|k| self.wrap(k)))
    }

    fn wrap(&self, key: GitLabDeployKey) -> DeployKey {
        DeployKey::new(self.scope.clone(), self.reference.clone(), key)
    }
}
