//! Mapping between abstract repository permissions and GitLab access levels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{ProviderError, Result};

/// Abstract, ordered repository permission.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryPermission {
    #[default]
    Pull,
    Triage,
    Push,
    Maintain,
    Admin,
}

impl RepositoryPermission {
    pub const ALL: [RepositoryPermission; 5] = [
        RepositoryPermission::Pull,
        RepositoryPermission::Triage,
        RepositoryPermission::Push,
        RepositoryPermission::Maintain,
        RepositoryPermission::Admin,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RepositoryPermission::Pull => "pull",
            RepositoryPermission::Triage => "triage",
            RepositoryPermission::Push => "push",
            RepositoryPermission::Maintain => "maintain",
            RepositoryPermission::Admin => "admin",
        }
    }
}

impl fmt::Display for RepositoryPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepositoryPermission {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self> {
        RepositoryPermission::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ProviderError::InvalidPermissionLevel {
                level: s.to_string(),
            })
    }
}

/// GitLab access levels: guest, reporter, developer, maintainer, owner.
const ACCESS_LEVELS: [(RepositoryPermission, u32); 5] = [
    (RepositoryPermission::Pull, 10),
    (RepositoryPermission::Triage, 20),
    (RepositoryPermission::Push, 30),
    (RepositoryPermission::Maintain, 40),
    (RepositoryPermission::Admin, 50),
];

/// GitLab access level for an abstract permission.
pub fn access_level_for(permission: RepositoryPermission) -> Result<u32> {
    ACCESS_LEVELS
        .iter()
        .find(|(p, _)| *p == permission)
        .map(|(_, level)| *level)
        .ok_or_else(|| ProviderError::InvalidPermissionLevel {
            level: permission.to_string(),
        })
}

/// Abstract permission for a GitLab access level. Unknown levels are rejected.
pub fn permission_for(access_level: u32) -> Result<RepositoryPermission> {
    ACCESS_LEVELS
        .iter()
        .find(|(_, level)| *level == access_level)
        .map(|(p, _)| *p)
        .ok_or_else(|| ProviderError::InvalidPermissionLevel {
            level: access_level.to_string(),
        })
}
