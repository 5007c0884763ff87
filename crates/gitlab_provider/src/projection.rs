//! Spec projections: the declarable subset of each vendor object.
//!
//! A projection drops IDs, timestamps, computed URLs and anything else the
//! server assigns. Reconciliation acts only when projections differ.

use std::fmt::Debug;

use crate::gitlab::{GitLabDeployKey, GitLabDeployToken, GitLabProject, GitLabSharedGroup};
use crate::info::RepositoryVisibility;

/// A vendor object with a comparable desired-state projection.
pub trait SpecProjection {
    type Spec: PartialEq + Debug;

    /// Whether two specs can be meaningfully compared.
    ///
    /// `false` for objects whose declared state cannot be read back; such
    /// objects are always considered divergent.
    const COMPARABLE: bool = true;

    fn spec(&self) -> Self::Spec;

    fn spec_eq(&self, other: &Self) -> bool {
        Self::COMPARABLE && self.spec() == other.spec()
    }
}

/// Treat blank strings as absent so `""` and `None` compare equal.
fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSpec {
    pub name: String,
    pub namespace: String,
    pub description: Option<String>,
    pub visibility: RepositoryVisibility,
    pub default_branch: Option<String>,
}

impl SpecProjection for GitLabProject {
    type Spec = ProjectSpec;

    fn spec(&self) -> ProjectSpec {
        ProjectSpec {
            name: self.name.clone(),
            namespace: self.namespace.full_path.clone(),
            description: non_blank(self.description.as_deref()),
            visibility: self.visibility,
            default_branch: non_blank(self.default_branch.as_deref()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployKeySpec {
    pub title: String,
    /// Key material with whitespace runs collapsed.
    pub key: String,
    pub can_push: bool,
}

impl SpecProjection for GitLabDeployKey {
    type Spec = DeployKeySpec;

    fn spec(&self) -> DeployKeySpec {
        DeployKeySpec {
            title: self.title.clone(),
            key: self.key.split_whitespace().collect::<Vec<_>>().join(" "),
            can_push: self.can_push,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployTokenSpec {
    pub name: String,
    pub username: Option<String>,
}

/// GitLab never returns a token's secret after creation, so there is
/// nothing to compare against and every reconcile recreates it.
impl SpecProjection for GitLabDeployToken {
    type Spec = DeployTokenSpec;
    const COMPARABLE: bool = false;

    fn spec(&self) -> DeployTokenSpec {
        DeployTokenSpec {
            name: self.name.clone(),
            username: non_blank(Some(&self.username)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamAccessSpec {
    pub group: String,
    pub access_level: u32,
}

impl SpecProjection for GitLabSharedGroup {
    type Spec = TeamAccessSpec;

    fn spec(&self) -> TeamAccessSpec {
        TeamAccessSpec {
            group: self.group_full_path.clone(),
            access_level: self.group_access_level,
        }
    }
}
