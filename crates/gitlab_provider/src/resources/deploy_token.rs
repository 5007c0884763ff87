//! Deploy tokens.
//!
//! GitLab returns a token's secret only in the create response, so a token
//! found on the server can never be shown to match what was declared. Every
//! reconcile of an existing token deletes and recreates it.

use async_trait::async_trait;

use super::ApiObject;
use crate::client::Scope;
use crate::errors::Result;
use crate::gitlab::types::CreateDeployTokenOptions;
use crate::gitlab::{GitLabClient, GitLabDeployToken};
use crate::info::DeployTokenInfo;
use crate::reconcile::{Reconcilable, Reconciled, reconcile, recreate};
use crate::refs::RepositoryRef;
use crate::validation::{Defaulted, Validate};

/// Scopes granted to tokens created by this crate.
pub const DEPLOY_TOKEN_SCOPES: [&str; 1] = ["read_repository"];

/// Prefix of the usernames GitLab generates when none is given.
const GENERATED_USERNAME_PREFIX: &str = "gitlab+deploy-token-";

/// The username a caller chose, or `None` if GitLab generated it.
fn declared_username(token: &GitLabDeployToken) -> Option<String> {
    (!token.username.starts_with(GENERATED_USERNAME_PREFIX)).then(|| token.username.clone())
}

fn deploy_token_info(token: &GitLabDeployToken) -> DeployTokenInfo {
    DeployTokenInfo {
        name: token.name.clone(),
        username: Some(token.username.clone()),
        token: token.token.clone(),
    }
}

fn create_options(info: &mut DeployTokenInfo) -> Result<CreateDeployTokenOptions> {
    info.validate()?;
    info.default_fields();
    Ok(CreateDeployTokenOptions {
        name: info.name.clone(),
        username: info.username.clone(),
        scopes: DEPLOY_TOKEN_SCOPES.iter().map(|s| s.to_string()).collect(),
    })
}

struct DeployTokenReconciler<'a> {
    gitlab: &'a GitLabClient,
    reference: &'a RepositoryRef,
    options: CreateDeployTokenOptions,
}

#[async_trait]
impl Reconcilable for DeployTokenReconciler<'_> {
    type Object = GitLabDeployToken;

    fn describe(&self) -> String {
        format!(
            "deploy token {} of {}",
            self.options.name,
            self.reference.full_path()
        )
    }

    async fn fetch(&self) -> Result<GitLabDeployToken> {
        self.gitlab
            .get_deploy_token(&self.reference.full_path(), &self.options.name)
            .await
    }

    async fn create(&self) -> Result<GitLabDeployToken> {
        self.gitlab
            .create_deploy_token(&self.reference.full_path(), &self.options)
            .await
    }

    fn desired(&self, actual: &GitLabDeployToken) -> GitLabDeployToken {
        let mut desired = actual.clone();
        desired.name = self.options.name.clone();
        if let Some(username) = &self.options.username {
            desired.username = username.clone();
        }
        desired
    }

    async fn update(
        &self,
        actual: &GitLabDeployToken,
        _desired: &GitLabDeployToken,
    ) -> Result<GitLabDeployToken> {
        let path = self.reference.full_path();
        recreate(
            self.describe(),
            || self.gitlab.delete_deploy_token(&path, actual.id),
            || self.gitlab.create_deploy_token(&path, &self.options),
        )
        .await
    }
}

/// A deploy token as last seen on the server.
#[derive(Debug, Clone)]
pub struct DeployToken {
    scope: Scope,
    reference: RepositoryRef,
    token: GitLabDeployToken,
    /// Username to recreate with; `None` lets GitLab generate a fresh one.
    username: Option<String>,
}

impl DeployToken {
    fn new(scope: Scope, reference: RepositoryRef, token: GitLabDeployToken) -> Self {
        Self {
            scope,
            reference,
            username: declared_username(&token),
            token,
        }
    }

    fn create_options(&self) -> Result<CreateDeployTokenOptions> {
        create_options(&mut DeployTokenInfo {
            name: self.token.name.clone(),
            username: self.username.clone(),
            token: None,
        })
    }

    pub fn repository(&self) -> &RepositoryRef {
        &self.reference
    }

    /// `token` is only set on a wrapper returned by a create or recreate.
    pub fn get(&self) -> DeployTokenInfo {
        deploy_token_info(&self.token)
    }

    pub fn set(&mut self, mut info: DeployTokenInfo) -> Result<()> {
        let options = create_options(&mut info)?;
        self.token.name = options.name;
        if let Some(username) = &options.username {
            self.token.username = username.clone();
        }
        self.username = options.username;
        Ok(())
    }

    pub fn api_object(&self) -> ApiObject<'_> {
        ApiObject::DeployToken(&self.token)
    }

    /// Recreate the token from the local copy.
    pub async fn update(&mut self) -> Result<()> {
        let path = self.reference.full_path();
        let options = self.create_options()?;
        let gitlab = &self.scope.gitlab;
        let token = recreate(
            format!("deploy token {} of {path}", options.name),
            || gitlab.delete_deploy_token(&path, self.token.id),
            || gitlab.create_deploy_token(&path, &options),
        )
        .await?;
        self.token = token;
        Ok(())
    }

    pub async fn delete(&self) -> Result<()> {
        self.scope
            .gitlab
            .delete_deploy_token(&self.reference.full_path(), self.token.id)
            .await
    }

    /// Always recreates an existing token, so always returns `true` on success.
    pub async fn reconcile(&mut self) -> Result<bool> {
        let options = self.create_options()?;
        let outcome = reconcile(&DeployTokenReconciler {
            gitlab: &self.scope.gitlab,
            reference: &self.reference,
            options,
        })
        .await?;
        let changed = outcome.action_taken();
        self.token = outcome.into_inner();
        Ok(changed)
    }
}

/// Deploy tokens of one repository.
#[derive(Debug, Clone)]
pub struct DeployTokenClient {
    scope: Scope,
    reference: RepositoryRef,
}

impl DeployTokenClient {
    pub(crate) fn new(scope: Scope, reference: RepositoryRef) -> Self {
        Self { scope, reference }
    }

    /// Get an active deploy token by name.
    pub async fn get(&self, name: &str) -> Result<DeployToken> {
        let token = self
            .scope
            .gitlab
            .get_deploy_token(&self.reference.full_path(), name)
            .await?;
        Ok(self.wrap(token))
    }

    pub async fn list(&self) -> Result<Vec<DeployToken>> {
        let tokens = self
            .scope
            .gitlab
            .list_deploy_tokens(&self.reference.full_path())
            .await?;
        Ok(tokens.into_iter().map(|t| self.wrap(t)).collect())
    }

    pub async fn create(&self, mut info: DeployTokenInfo) -> Result<DeployToken> {
        let options = create_options(&mut info)?;
        let token = self
            .scope
            .gitlab
            .create_deploy_token(&self.reference.full_path(), &options)
            .await?;
        Ok(self.wrap(token))
    }

    pub async fn reconcile(&self, mut info: DeployTokenInfo) -> Result<Reconciled<DeployToken>> {
        let options = create_options(&mut info)?;
        let outcome = reconcile(&DeployTokenReconciler {
            gitlab: &self.scope.gitlab,
            reference: &self.reference,
            options,
        })
        .await?;
        Ok(outcome.map(|t| self.wrap(t)))
    }

    fn wrap(&self, token: GitLabDeployToken) -> DeployToken {
        DeployToken::new(self.scope.clone(), self.reference.clone(), token)
    }
}
