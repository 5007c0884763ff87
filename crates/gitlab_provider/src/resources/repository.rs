//! Repositories (GitLab projects) owned by users and organizations.

use async_trait::async_trait;

use super::{
    ApiObject, BranchClient, CommitClient, DeployKeyClient, DeployTokenClient, FileClient,
    PullRequestClient, TeamAccessClient, TreeClient,
};
use crate::client::Scope;
use crate::errors::Result;
use crate::gitlab::types::{CreateProjectOptions, EditProjectOptions};
use crate::gitlab::{GitLabClient, GitLabProject};
use crate::info::RepositoryInfo;
use crate::reconcile::{Reconcilable, Reconciled, reconcile};
use crate::refs::{IdentityRef, OrganizationRef, RepositoryRef, UserRef};
use crate::validation::{Defaulted, Validate};

/// Public view of a project.
fn repository_info(project: &GitLabProject) -> RepositoryInfo {
    RepositoryInfo {
        description: project.description.clone(),
        default_branch: project.default_branch.clone(),
        visibility: Some(project.visibility),
    }
}

/// Merge the declared fields of `info` into `project`. Unset fields are left alone.
fn apply_repository_info(project: &mut GitLabProject, info: &RepositoryInfo) {
    if let Some(description) = &info.description {
        project.description = Some(description.clone());
    }
    if let Some(branch) = &info.default_branch {
        project.default_branch = Some(branch.clone());
    }
    if let Some(visibility) = info.visibility {
        project.visibility = visibility;
    }
}

fn edit_options(project: &GitLabProject) -> EditProjectOptions {
    EditProjectOptions {
        name: Some(project.name.clone()),
        // empty string clears the description on the server
        description: Some(project.description.clone().unwrap_or_default()),
        default_branch: project.default_branch.clone(),
        visibility: Some(project.visibility),
    }
}

async fn create_project(
    gitlab: &GitLabClient,
    reference: &RepositoryRef,
    info: &RepositoryInfo,
) -> Result<GitLabProject> {
    let options = CreateProjectOptions {
        name: reference.repository_name.clone(),
        path: reference.repository_name.clone(),
        namespace_id: None,
        description: info.description.clone(),
        visibility: info.visibility,
        default_branch: info.default_branch.clone(),
    };
    match &reference.owner {
        IdentityRef::Organization(org) => {
            gitlab
                .create_group_project(&org.full_path(), options)
                .await
        }
        IdentityRef::User(user) => gitlab.create_user_project(&user.user_login, options).await,
    }
}

/// Drives one project toward a declared [`RepositoryInfo`].
struct ProjectReconciler<'a> {
    gitlab: &'a GitLabClient,
    reference: &'a RepositoryRef,
    info: RepositoryInfo,
}

#[async_trait]
impl Reconcilable for ProjectReconciler<'_> {
    type Object = GitLabProject;

    fn describe(&self) -> String {
        format!("project {}", self.reference.full_path())
    }

    async fn fetch(&self) -> Result<GitLabProject> {
        self.gitlab.get_project(&self.reference.full_path()).await
    }

    async fn create(&self) -> Result<GitLabProject> {
        create_project(self.gitlab, self.reference, &self.info).await
    }

    fn desired(&self, actual: &GitLabProject) -> GitLabProject {
        let mut desired = actual.clone();
        apply_repository_info(&mut desired, &self.info);
        desired
    }

    async fn update(&self, _actual: &GitLabProject, desired: &GitLabProject) -> Result<GitLabProject> {
        self.gitlab
            .edit_project(&self.reference.full_path(), &edit_options(desired))
            .await
    }
}

/// A repository as last seen on the server.
#[derive(Debug, Clone)]
pub struct UserRepository {
    scope: Scope,
    reference: RepositoryRef,
    project: GitLabProject,
}

impl UserRepository {
    pub(crate) fn new(scope: Scope, reference: RepositoryRef, project: GitLabProject) -> Self {
        Self {
            scope,
            reference,
            project,
        }
    }

    pub fn repository(&self) -> &RepositoryRef {
        &self.reference
    }

    pub fn get(&self) -> RepositoryInfo {
        repository_info(&self.project)
    }

    /// Apply `info` to the local copy. Nothing is sent until
    /// [`update`](Self::update) or [`reconcile`](Self::reconcile).
    pub fn set(&mut self, info: RepositoryInfo) -> Result<()> {
        info.validate()?;
        apply_repository_info(&mut self.project, &info);
        Ok(())
    }

    pub fn api_object(&self) -> ApiObject<'_> {
        ApiObject::Project(&self.project)
    }

    /// Push the local copy to the server.
    pub async fn update(&mut self) -> Result<()> {
        let project = self
            .scope
            .gitlab
            .edit_project(&self.reference.full_path(), &edit_options(&self.project))
            .await?;
        self.project = project;
        Ok(())
    }

    /// Make the server match the local copy. Returns whether anything changed.
    pub async fn reconcile(&mut self) -> Result<bool> {
        let mut info = self.get();
        info.default_fields();
        let outcome = reconcile(&ProjectReconciler {
            gitlab: &self.scope.gitlab,
            reference: &self.reference,
            info,
        })
        .await?;
        let changed = outcome.action_taken();
        self.project = outcome.into_inner();
        Ok(changed)
    }

    /// Delete the repository. Requires destructive calls to be enabled.
    pub async fn delete(&self) -> Result<()> {
        self.scope
            .gitlab
            .delete_project(&self.reference.full_path())
            .await
    }

    pub fn deploy_keys(&self) -> DeployKeyClient {
        DeployKeyClient::new(self.scope.clone(), self.reference.clone())
    }

    pub fn deploy_tokens(&self) -> DeployTokenClient {
        DeployTokenClient::new(self.scope.clone(), self.reference.clone())
    }

    pub fn commits(&self) -> CommitClient {
        CommitClient::new(self.scope.clone(), self.reference.clone())
    }

    pub fn branches(&self) -> BranchClient {
        BranchClient::new(self.scope.clone(), self.reference.clone())
    }

    pub fn pull_requests(&self) -> PullRequestClient {
        PullRequestClient::new(self.scope.clone(), self.reference.clone())
    }

    pub fn files(&self) -> FileClient {
        FileClient::new(self.scope.clone(), self.reference.clone())
    }

    pub fn trees(&self) -> TreeClient {
        TreeClient::new(self.scope.clone(), self.reference.clone())
    }
}

/// A repository owned by an organization: a [`UserRepository`] plus team access.
#[derive(Debug, Clone)]
pub struct OrgRepository {
    repository: UserRepository,
    team_access: TeamAccessClient,
}

impl OrgRepository {
    fn from_repository(repository: UserRepository) -> Self {
        let team_access =
            TeamAccessClient::new(repository.scope.clone(), repository.reference.clone());
        Self {
            repository,
            team_access,
        }
    }

    /// The repository part of this wrapper.
    pub fn inner(&self) -> &UserRepository {
        &self.repository
    }

    pub fn inner_mut(&mut self) -> &mut UserRepository {
        &mut self.repository
    }

    pub fn team_access(&self) -> &TeamAccessClient {
        &self.team_access
    }

    pub fn repository(&self) -> &RepositoryRef {
        self.repository.repository()
    }

    pub fn get(&self) -> RepositoryInfo {
        self.repository.get()
    }

    pub fn set(&mut self, info: RepositoryInfo) -> Result<()> {
        self.repository.set(info)
    }

    pub fn api_object(&self) -> ApiObject<'_> {
        self.repository.api_object()
    }

    pub async fn update(&mut self) -> Result<()> {
        self.repository.update().await
    }

    pub async fn reconcile(&mut self) -> Result<bool> {
        self.repository.reconcile().await
    }

    pub async fn delete(&self) -> Result<()> {
        self.repository.delete().await
    }
}

async fn get_repository(scope: &Scope, reference: &RepositoryRef) -> Result<UserRepository> {
    let project = scope.gitlab.get_project(&reference.full_path()).await?;
    Ok(UserRepository::new(scope.clone(), reference.clone(), project))
}

async fn create_repository(
    scope: &Scope,
    reference: &RepositoryRef,
    mut info: RepositoryInfo,
) -> Result<UserRepository> {
    info.validate()?;
    info.default_fields();
    let project = create_project(&scope.gitlab, reference, &info).await?;
    tracing::info!(repository = %reference, "Created repository");
    Ok(UserRepository::new(scope.clone(), reference.clone(), project))
}

async fn reconcile_repository(
    scope: &Scope,
    reference: &RepositoryRef,
    mut info: RepositoryInfo,
) -> Result<Reconciled<UserRepository>> {
    info.validate()?;
    info.default_fields();
    let outcome = reconcile(&ProjectReconciler {
        gitlab: &scope.gitlab,
        reference,
        info,
    })
    .await?;
    Ok(outcome.map(|project| UserRepository::new(scope.clone(), reference.clone(), project)))
}

/// Repositories owned by users.
#[derive(Debug, Clone)]
pub struct UserRepositoriesClient {
    scope: Scope,
}

impl UserRepositoriesClient {
    pub(crate) fn new(scope: Scope) -> Self {
        Self { scope }
    }

    pub async fn get(&self, reference: &RepositoryRef) -> Result<UserRepository> {
        self.scope.check_user_repo(reference)?;
        get_repository(&self.scope, reference).await
    }

    pub async fn list(&self, owner: &UserRef) -> Result<Vec<UserRepository>> {
        self.scope.check_user(owner)?;
        let projects = self
            .scope
            .gitlab
            .list_user_projects(&owner.user_login)
            .await?;
        Ok(projects
            .into_iter()
            .map(|p| {
                let reference = RepositoryRef::new(owner.clone(), p.path.clone());
                UserRepository::new(self.scope.clone(), reference, p)
            })
            .collect())
    }

    /// Create a repository; fails with `AlreadyExists` if the name is taken.
    pub async fn create(
        &self,
        reference: &RepositoryRef,
        info: RepositoryInfo,
    ) -> Result<UserRepository> {
        self.scope.check_user_repo(reference)?;
        create_repository(&self.scope, reference, info).await
    }

    pub async fn reconcile(
        &self,
        reference: &RepositoryRef,
        info: RepositoryInfo,
    ) -> Result<Reconciled<UserRepository>> {
        self.scope.check_user_repo(reference)?;
        reconcile_repository(&self.scope, reference, info).await
    }
}

/// Repositories owned by organizations.
#[derive(Debug, Clone)]
pub struct OrgRepositoriesClient {
    scope: Scope,
}

impl OrgRepositoriesClient {
    pub(crate) fn new(scope: Scope) -> Self {
        Self { scope }
    }

    pub async fn get(&self, reference: &RepositoryRef) -> Result<OrgRepository> {
        self.scope.check_org_repo(reference)?;
        get_repository(&self.scope, reference)
            .await
            .map(OrgRepository::from_repository)
    }

    pub async fn list(&self, owner: &OrganizationRef) -> Result<Vec<OrgRepository>> {
        self.scope.check_org(owner)?;
        let projects = self
            .scope
            .gitlab
            .list_group_projects(&owner.full_path())
            .await?;
        Ok(projects
            .into_iter()
            .map(|p| {
                let reference = RepositoryRef::new(owner.clone(), p.path.clone());
                OrgRepository::from_repository(UserRepository::new(
                    self.scope.clone(),
                    reference,
                    p,
                ))
            })
            .collect())
    }

    /// Create a repository; fails with `AlreadyExists` if the name is taken.
    pub async fn create(
        &self,
        reference: &RepositoryRef,
        info: RepositoryInfo,
    ) -> Result<OrgRepository> {
        self.scope.check_org_repo(reference)?;
        create_repository(&self.scope, reference, info)
            .await
            .map(OrgRepository::from_repository)
    }

    pub async fn reconcile(
        &self,
        reference: &RepositoryRef,
        info: RepositoryInfo,
    ) -> Result<Reconciled<OrgRepository>> {
        self.scope.check_org_repo(reference)?;
        Ok(reconcile_repository(&self.scope, reference, info)
            .await?
            .map(OrgRepository::from_repository))
    }
}
