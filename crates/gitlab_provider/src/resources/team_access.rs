//! Team access: a repository shared with a group at some access level.
//!
//! Teams are named by full group path. GitLab has no endpoint to change the
//! level of an existing share, so a divergent share is removed and re-added.

use async_trait::async_trait;

use super::ApiObject;
use crate::client::Scope;
use crate::errors::{ProviderError, Result};
use crate::gitlab::types::ShareWithGroupOptions;
use crate::gitlab::{GitLabClient, GitLabSharedGroup};
use crate::info::TeamAccessInfo;
use crate::permissions::{access_level_for, permission_for};
use crate::reconcile::{Reconcilable, Reconciled, reconcile, recreate};
use crate::refs::RepositoryRef;
use crate::validation::{Defaulted, Validate};

fn team_access_info(share: &GitLabSharedGroup) -> Result<TeamAccessInfo> {
    Ok(TeamAccessInfo {
        name: share.group_full_path.clone(),
        permission: Some(permission_for(share.group_access_level)?),
    })
}

/// Validate and default `info`, returning the team name and GitLab access level.
fn resolve(info: &mut TeamAccessInfo) -> Result<(String, u32)> {
    info.validate()?;
    info.default_fields();
    let permission = info.permission.unwrap_or_default();
    Ok((info.name.clone(), access_level_for(permission)?))
}

async fn find_share(gitlab: &GitLabClient, path: &str, team: &str) -> Result<GitLabSharedGroup> {
    gitlab
        .get_project(path)
        .await?
        .shared_with_groups
        .into_iter()
        .find(|s| s.group_full_path == team)
        .ok_or_else(|| ProviderError::not_found(format!("team access {team} of {path}")))
}

/// Share `path` with `group_id` and return the resulting share.
async fn share(
    gitlab: &GitLabClient,
    path: &str,
    team: &str,
    group_id: u64,
    access_level: u32,
) -> Result<GitLabSharedGroup> {
    gitlab
        .share_project(
            path,
            &ShareWithGroupOptions {
                group_id,
                group_access: access_level,
            },
        )
        .await?;
    find_share(gitlab, path, team).await
}

struct TeamAccessReconciler<'a> {
    gitlab: &'a GitLabClient,
    reference: &'a RepositoryRef,
    team: String,
    access_level: u32,
}

#[async_trait]
impl Reconcilable for TeamAccessReconciler<'_> {
    type Object = GitLabSharedGroup;

    fn describe(&self) -> String {
        format!(
            "team access {} of {}",
            self.team,
            self.reference.full_path()
        )
    }

    async fn fetch(&self) -> Result<GitLabSharedGroup> {
        find_share(self.gitlab, &self.reference.full_path(), &self.team).await
    }

    async fn create(&self) -> Result<GitLabSharedGroup> {
        let group = self.gitlab.get_group(&self.team).await?;
        share(
            self.gitlab,
            &self.reference.full_path(),
            &self.team,
            group.id,
            self.access_level,
        )
        .await
    }

    fn desired(&self, actual: &GitLabSharedGroup) -> GitLabSharedGroup {
        GitLabSharedGroup {
            group_access_level: self.access_level,
            ..actual.clone()
        }
    }

    async fn update(
        &self,
        actual: &GitLabSharedGroup,
        _desired: &GitLabSharedGroup,
    ) -> Result<GitLabSharedGroup> {
        let path = self.reference.full_path();
        recreate(
            self.describe(),
            || self.gitlab.unshare_project(&path, actual.group_id),
            || share(self.gitlab, &path, &self.team, actual.group_id, self.access_level),
        )
        .await
    }
}

/// A repository's access grant to one team.
#[derive(Debug, Clone)]
pub struct TeamAccess {
    scope: Scope,
    reference: RepositoryRef,
    share: GitLabSharedGroup,
    info: TeamAccessInfo,
}

impl TeamAccess {
    /// Fails with `InvalidPermissionLevel` if GitLab reports a level outside the table.
    fn new(scope: Scope, reference: RepositoryRef, share: GitLabSharedGroup) -> Result<Self> {
        let info = team_access_info(&share)?;
        Ok(Self {
            scope,
            reference,
            share,
            info,
        })
    }

    fn replace(&mut self, share: GitLabSharedGroup) -> Result<()> {
        self.info = team_access_info(&share)?;
        self.share = share;
        Ok(())
    }

    pub fn repository(&self) -> &RepositoryRef {
        &self.reference
    }

    pub fn get(&self) -> TeamAccessInfo {
        self.info.clone()
    }

    /// Apply `info` to the local copy only. The team name cannot change.
    pub fn set(&mut self, mut info: TeamAccessInfo) -> Result<()> {
        let (team, access_level) = resolve(&mut info)?;
        if team != self.share.group_full_path {
            return Err(ProviderError::invalid_argument(
                "TeamAccessInfo",
                "name",
                format!("cannot rename team access {}", self.share.group_full_path),
            ));
        }
        self.share.group_access_level = access_level;
        self.info = info;
        Ok(())
    }

    pub fn api_object(&self) -> ApiObject<'_> {
        ApiObject::SharedGroup(&self.share)
    }

    /// Re-share with the local access level.
    pub async fn update(&mut self) -> Result<()> {
        let path = self.reference.full_path();
        let gitlab = &self.scope.gitlab;
        let current = &self.share;
        let updated = recreate(
            format!("team access {} of {path}", current.group_full_path),
            || gitlab.unshare_project(&path, current.group_id),
            || {
                share(
                    gitlab,
                    &path,
                    &current.group_full_path,
                    current.group_id,
                    current.group_access_level,
                )
            },
        )
        .await?;
        self.replace(updated)
    }

    /// Remove the team's access.
    pub async fn delete(&self) -> Result<()> {
        self.scope
            .gitlab
            .unshare_project(&self.reference.full_path(), self.share.group_id)
            .await
    }

    pub async fn reconcile(&mut self) -> Result<bool> {
        let outcome = reconcile(&TeamAccessReconciler {
            gitlab: &self.scope.gitlab,
            reference: &self.reference,
            team: self.share.group_full_path.clone(),
            access_level: self.share.group_access_level,
        })
        .await?;
        let changed = outcome.action_taken();
        self.replace(outcome.into_inner())?;
        Ok(changed)
    }
}

/// Team access of one organization repository.
#[derive(Debug, Clone)]
pub struct TeamAccessClient {
    scope: Scope,
    reference: RepositoryRef,
}

impl TeamAccessClient {
    pub(crate) fn new(scope: Scope, reference: RepositoryRef) -> Self {
        Self { scope, reference }
    }

    /// Get a team's access by full group path.
    pub async fn get(&self, name: &str) -> Result<TeamAccess> {
        let share = find_share(&self.scope.gitlab, &self.reference.full_path(), name).await?;
        self.wrap(share)
    }

    pub async fn list(&self) -> Result<Vec<TeamAccess>> {
        let project = self
            .scope
            .gitlab
            .get_project(&self.reference.full_path())
            .await?;
        project
            .shared_with_groups
            .into_iter()
            .map(|s| self.wrap(s))
            .collect()
    }

    pub async fn create(&self, mut info: TeamAccessInfo) -> Result<TeamAccess> {
        let (team, access_level) = resolve(&mut info)?;
        let group = self.scope.gitlab.get_group(&team).await?;
        let created = share(
            &self.scope.gitlab,
            &self.reference.full_path(),
            &team,
            group.id,
            access_level,
        )
        .await?;
        self.wrap(created)
    }

    pub async fn reconcile(&self, mut info: TeamAccessInfo) -> Result<Reconciled<TeamAccess>> {
        let (team, access_level) = resolve(&mut info)?;
        let outcome = reconcile(&TeamAccessReconciler {
            gitlab: &self.scope.gitlab,
            reference: &self.reference,
            team,
            access_level,
        })
        .await?;
        outcome.try_map(|s| self.wrap(s))
    }

    fn wrap(&self, share: GitLabSharedGroup) -> Result<TeamAccess> {
        TeamAccess::new(self.scope.clone(), self.reference.clone(), share)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::RepositoryPermission;

    #[test]
    fn resolve_defaults_to_pull() {
        let mut info = TeamAccessInfo {
            name: "acme/devs".into(),
            permission: None,
        };
        assert_eq!(resolve(&mut info).unwrap(), ("acme/devs".to_string(), 10));
    }

    #[test]
    fn resolve_maps_permission() {
        let mut info = TeamAccessInfo {
            name: "acme/devs".into(),
            permission: Some(RepositoryPermission::Maintain),
        };
        assert_eq!(resolve(&mut info).unwrap().1, 40);
    }

    #[test]
    fn unknown_levels_are_rejected() {
        for level in [5, 15, 60] {
            let share = GitLabSharedGroup {
                group_id: 5,
                group_name: "devs".into(),
                group_full_path: "acme/devs".into(),
                group_access_level: level,
                expires_at: None,
            };
            let err = team_access_info(&share).unwrap_err();
            assert!(
                matches!(err, ProviderError::InvalidPermissionLevel { .. }),
                "level {level}: {err:?}"
            );
        }
    }

    #[test]
    fn known_levels_map_to_permissions() {
        let share = GitLabSharedGroup {
            group_id: 5,
            group_name: "devs".into(),
            group_full_path: "acme/devs".into(),
            group_access_level: 40,
            expires_at: None,
        };
        assert_eq!(
            team_access_info(&share).unwrap().permission,
            Some(RepositoryPermission::Maintain)
        );
    }
}
