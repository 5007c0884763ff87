//! Organizations (GitLab groups) and their teams (direct subgroups).

use super::ApiObject;
use crate::client::Scope;
use crate::errors::Result;
use crate::gitlab::{GitLabGroup, GitLabGroupMember};
use crate::info::{OrganizationInfo, TeamInfo};
use crate::refs::OrganizationRef;

/// An organization as last seen on the server.
#[derive(Debug, Clone)]
pub struct Organization {
    scope: Scope,
    reference: OrganizationRef,
    group: GitLabGroup,
}

impl Organization {
    fn new(scope: Scope, reference: OrganizationRef, group: GitLabGroup) -> Self {
        Self {
            scope,
            reference,
            group,
        }
    }

    pub fn organization(&self) -> &OrganizationRef {
        &self.reference
    }

    pub fn get(&self) -> OrganizationInfo {
        OrganizationInfo {
            name: Some(self.group.name.clone()),
            description: self.group.description.clone(),
        }
    }

    pub fn api_object(&self) -> ApiObject<'_> {
        ApiObject::Group(&self.group)
    }

    pub fn teams(&self) -> TeamsClient {
        TeamsClient {
            scope: self.scope.clone(),
            organization: self.reference.clone(),
        }
    }
}

/// Groups visible to the client.
#[derive(Debug, Clone)]
pub struct OrganizationsClient {
    scope: Scope,
}

impl OrganizationsClient {
    pub(crate) fn new(scope: Scope) -> Self {
        Self { scope }
    }

    pub async fn get(&self, reference: &OrganizationRef) -> Result<Organization> {
        self.scope.check_org(reference)?;
        let group = self.scope.gitlab.get_group(&reference.full_path()).await?;
        Ok(Organization::new(
            self.scope.clone(),
            reference.clone(),
            group,
        ))
    }

    /// Top-level groups the token can see.
    pub async fn list(&self) -> Result<Vec<Organization>> {
        let groups = self.scope.gitlab.list_groups().await?;
        Ok(groups
            .into_iter()
            .filter(|g| g.parent_id.is_none())
            .map(|g| {
                let reference = OrganizationRef::new(self.scope.domain(), g.full_path.clone());
                Organization::new(self.scope.clone(), reference, g)
            })
            .collect())
    }

    /// Direct subgroups of an organization.
    ///
    /// The returned references point at sub-organizations, which this
    /// provider otherwise rejects; they are for inspection only.
    pub async fn children(&self, reference: &OrganizationRef) -> Result<Vec<Organization>> {
        self.scope.check_org(reference)?;
        let groups = self
            .scope
            .gitlab
            .list_subgroups(&reference.full_path())
            .await?;
        Ok(groups
            .into_iter()
            .map(|g| {
                let child = reference.clone().with_sub_organizations(
                    reference
                        .sub_organizations
                        .iter()
                        .cloned()
                        .chain(std::iter::once(g.path.clone())),
                );
                Organization::new(self.scope.clone(), child, g)
            })
            .collect())
    }
}

/// A team and its members.
#[derive(Debug, Clone)]
pub struct Team {
    group: GitLabGroup,
    members: Vec<GitLabGroupMember>,
}

impl Team {
    pub fn get(&self) -> TeamInfo {
        TeamInfo {
            name: self.group.path.clone(),
            members: self.members.iter().map(|m| m.username.clone()).collect(),
        }
    }

    pub fn api_object(&self) -> ApiObject<'_> {
        ApiObject::Group(&self.group)
    }
}

/// Teams of one organization.
#[derive(Debug, Clone)]
pub struct TeamsClient {
    scope: Scope,
    organization: OrganizationRef,
}

impl TeamsClient {
    /// Get the team `name` (the subgroup's path).
    pub async fn get(&self, name: &str) -> Result<Team> {
        let full_path = format!("{}/{}", self.organization.full_path(), name);
        let group = self.scope.gitlab.get_group(&full_path).await?;
        let members = self.scope.gitlab.list_group_members(&full_path).await?;
        Ok(Team { group, members })
    }

    pub async fn list(&self) -> Result<Vec<Team>> {
        let groups = self
            .scope
            .gitlab
            .list_subgroups(&self.organization.full_path())
            .await?;
        let mut teams = Vec::with_capacity(groups.len());
        for group in groups {
            let members = self
                .scope
                .gitlab
                .list_group_members(&group.full_path)
                .await?;
            teams.push(Team { group, members });
        }
        Ok(teams)
    }
}
