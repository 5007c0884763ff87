//! Immutable references that identify a resource without fetching it.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::{ProviderError, Result};
use crate::validation::{Validate, ValidationErrors, Validator};

/// The domain used when no override is configured.
pub const DEFAULT_DOMAIN: &str = "gitlab.com";

/// What kind of identity owns a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityType {
    User,
    Organization,
    Suborganization,
}

impl fmt::Display for IdentityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IdentityType::User => "user",
            IdentityType::Organization => "organization",
            IdentityType::Suborganization => "suborganization",
        })
    }
}

/// How a repository should be cloned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloneTransport {
    Https,
    Ssh,
    Git,
}

/// Base URL for a domain, defaulting to https when no scheme is given.
pub(crate) fn domain_url(domain: &str) -> String {
    if domain.contains("://") {
        domain.trim_end_matches('/').to_string()
    } else {
        format!("https://{}", domain.trim_end_matches('/'))
    }
}

/// Host (and port) part of a domain, without any scheme.
pub(crate) fn domain_host(domain: &str) -> &str {
    domain
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(domain)
        .trim_end_matches('/')
}

/// A user account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserRef {
    pub domain: String,
    pub user_login: String,
}

impl UserRef {
    pub fn new(domain: impl Into<String>, user_login: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            user_login: user_login.into(),
        }
    }

    /// Parse `https://gitlab.com/<login>`.
    pub fn parse_url(url: &str) -> Result<Self> {
        let (domain, segments) = split_url("UserRef", url)?;
        match segments.as_slice() {
            [login] => Ok(Self::new(domain, login.clone())),
            _ => Err(ProviderError::invalid_argument(
                "UserRef",
                "url",
                format!("expected exactly one path segment in {url}"),
            )),
        }
    }
}

impl Validate for UserRef {
    fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        let mut v = Validator::new("UserRef");
        v.required("domain", &self.domain)
            .required("user_login", &self.user_login);
        v.finish()
    }
}

impl fmt::Display for UserRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", domain_url(&self.domain), self.user_login)
    }
}

/// A top-level group, optionally pointing at a nested subgroup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrganizationRef {
    pub domain: String,
    pub organization: String,
    #[serde(default)]
    pub sub_organizations: Vec<String>,
}

impl OrganizationRef {
    pub fn new(domain: impl Into<String>, organization: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            organization: organization.into(),
            sub_organizations: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_sub_organizations<I, S>(mut self, subs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sub_organizations = subs.into_iter().map(Into::into).collect();
        self
    }

    pub fn identity_type(&self) -> IdentityType {
        if self.sub_organizations.is_empty() {
            IdentityType::Organization
        } else {
            IdentityType::Suborganization
        }
    }

    /// `org/sub/subsub`
    pub fn full_path(&self) -> String {
        std::iter::once(self.organization.as_str())
            .chain(self.sub_organizations.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Parse `https://gitlab.com/<org>[/<sub>...]`.
    pub fn parse_url(url: &str) -> Result<Self> {
        let (domain, mut segments) = split_url("OrganizationRef", url)?;
        if segments.is_empty() {
            return Err(ProviderError::invalid_argument(
                "OrganizationRef",
                "url",
                format!("no organization in {url}"),
            ));
        }
        let organization = segments.remove(0);
        Ok(Self {
            domain,
            organization,
            sub_organizations: segments,
        })
    }
}

impl Validate for OrganizationRef {
    fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        let mut v = Validator::new("OrganizationRef");
        v.required("domain", &self.domain)
            .required("organization", &self.organization);
        for (i, sub) in self.sub_organizations.iter().enumerate() {
            if sub.trim().is_empty() {
                v.invalid(&format!("sub_organizations[{i}]"), "must not be blank");
            }
        }
        v.finish()
    }
}

impl fmt::Display for OrganizationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", domain_url(&self.domain), self.full_path())
    }
}

/// The owner of a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum IdentityRef {
    User(UserRef),
    Organization(OrganizationRef),
}

impl IdentityRef {
    pub fn domain(&self) -> &str {
        match self {
            IdentityRef::User(u) => &u.domain,
            IdentityRef::Organization(o) => &o.domain,
        }
    }

    /// Namespace path on the vendor: login for users, full group path for organizations.
    pub fn identity(&self) -> String {
        match self {
            IdentityRef::User(u) => u.user_login.clone(),
            IdentityRef::Organization(o) => o.full_path(),
        }
    }

    pub fn identity_type(&self) -> IdentityType {
        match self {
            IdentityRef::User(_) => IdentityType::User,
            IdentityRef::Organization(o) => o.identity_type(),
        }
    }
}

impl From<UserRef> for IdentityRef {
    fn from(r: UserRef) -> Self {
        IdentityRef::User(r)
    }
}

impl From<OrganizationRef> for IdentityRef {
    fn from(r: OrganizationRef) -> Self {
        IdentityRef::Organization(r)
    }
}

impl Validate for IdentityRef {
    fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        match self {
            IdentityRef::User(u) => u.validate(),
            IdentityRef::Organization(o) => o.validate(),
        }
    }
}

impl fmt::Display for IdentityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityRef::User(u) => u.fmt(f),
            IdentityRef::Organization(o) => o.fmt(f),
        }
    }
}

/// A repository owned by a user or an organization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryRef {
    pub owner: IdentityRef,
    pub repository_name: String,
}

impl RepositoryRef {
    pub fn new(owner: impl Into<IdentityRef>, repository_name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repository_name: repository_name.into(),
        }
    }

    pub fn domain(&self) -> &str {
        self.owner.domain()
    }

    /// `namespace/name`, the vendor's path-with-namespace.
    pub fn full_path(&self) -> String {
        format!("{}/{}", self.owner.identity(), self.repository_name)
    }

    pub fn clone_url(&self, transport: CloneTransport) -> String {
        let host = domain_host(self.domain());
        match transport {
            CloneTransport::Https => format!("{}.git", self),
            CloneTransport::Ssh => format!("ssh://git@{}/{}.git", host, self.full_path()),
            CloneTransport::Git => format!("git@{}:{}.git", host, self.full_path()),
        }
    }

    /// Parse `https://gitlab.com/<org>[/<sub>...]/<repo>[.git]`.
    pub fn parse_org_url(url: &str) -> Result<Self> {
        let (domain, mut segments) = split_url("RepositoryRef", url)?;
        if segments.len() < 2 {
            return Err(ProviderError::invalid_argument(
                "RepositoryRef",
                "url",
                format!("expected <organization>/<repository> in {url}"),
            ));
        }
        let name = segments.pop().unwrap_or_default();
        let organization = segments.remove(0);
        let org = OrganizationRef {
            domain,
            organization,
            sub_organizations: segments,
        };
        Ok(Self::new(org, name))
    }

    /// Parse `https://gitlab.com/<login>/<repo>[.git]`.
    pub fn parse_user_url(url: &str) -> Result<Self> {
        let (domain, segments) = split_url("RepositoryRef", url)?;
        match segments.as_slice() {
            [login, name] => Ok(Self::new(UserRef::new(domain, login.clone()), name.clone())),
            _ => Err(ProviderError::invalid_argument(
                "RepositoryRef",
                "url",
                format!("expected <user>/<repository> in {url}"),
            )),
        }
    }
}

impl Validate for RepositoryRef {
    fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        let mut errors = match self.owner.validate() {
            Ok(()) => Vec::new(),
            Err(e) => e.errors,
        };
        if self.repository_name.trim().is_empty() {
            let mut v = Validator::new("RepositoryRef");
            v.missing("repository_name");
            if let Err(e) = v.finish() {
                errors.extend(e.errors);
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors {
                kind: "RepositoryRef",
                errors,
            })
        }
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repository_name)
    }
}

/// Split a URL into its domain (host plus optional port) and path segments,
/// with any `.git` suffix removed from the last segment.
fn split_url(kind: &'static str, raw: &str) -> Result<(String, Vec<String>)> {
    let url = Url::parse(raw)
        .map_err(|e| ProviderError::invalid_argument(kind, "url", e.to_string()))?;
    let host = url
        .host_str()
        .ok_or_else(|| ProviderError::invalid_argument(kind, "url", format!("no host in {raw}")))?;
    let domain = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    let mut segments: Vec<String> = url
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).map(str::to_string).collect())
        .unwrap_or_default();
    if let Some(last) = segments.last_mut()
        && let Some(stripped) = last.strip_suffix(".git")
    {
        *last = stripped.to_string();
    }

    Ok((domain, segments))
}
