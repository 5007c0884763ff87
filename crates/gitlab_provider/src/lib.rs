//! GitLab provider - declarative management of GitLab repositories.
//!
//! Callers describe the desired state of repositories, deploy keys, deploy
//! tokens and team access with provider-agnostic Info types. The provider
//! translates them into GitLab API calls and converges the server towards
//! that state, changing nothing when it already matches.
//!
//! # Example
//!
//! ```ignore
//! use gitlab_provider::{Client, ProviderConfig, RepositoryRef, UserRef, RepositoryInfo};
//!
//! let config = ProviderConfig::load(None)?;
//! let client = Client::from_config(&config, Default::default())?;
//!
//! let repo = RepositoryRef::new(UserRef::new("gitlab.com", "alice"), "demo");
//! let created = client
//!     .user_repositories()
//!     .reconcile(&repo, RepositoryInfo::default())
//!     .await?;
//! assert!(created.action_taken());
//! ```

pub mod client;
pub mod config;
pub mod errors;
pub mod gitlab;
pub mod http;
pub mod info;
pub mod permissions;
pub mod projection;
pub mod reconcile;
pub mod refs;
pub mod resources;
pub mod retry;
pub mod validation;

pub use client::{Client, ClientOptions, PROVIDER_ID, TokenPermission};
pub use config::ProviderConfig;
pub use errors::{ProviderError, Result, short_error_message};
pub use gitlab::{GitLabClient, TokenType};
pub use http::{
    HttpError, HttpHeaders, HttpMethod, HttpRequest, HttpResponse, HttpTransport, TransportLayer,
};
pub use info::{
    BranchInfo, CommitFile, CommitInfo, DeployKeyInfo, DeployTokenInfo, EditOptions, MergeMethod,
    OrganizationInfo, PullRequestInfo, RepositoryInfo, RepositoryVisibility, TeamAccessInfo,
    TeamInfo, TreeEntry, TreeInfo,
};
pub use permissions::RepositoryPermission;
pub use reconcile::Reconciled;
pub use refs::{
    CloneTransport, IdentityRef, IdentityType, OrganizationRef, RepositoryRef, UserRef,
};
pub use resources::{
    ApiObject, Branch, BranchClient, Commit, CommitClient, DeployKey, DeployKeyClient,
    DeployToken, DeployTokenClient, FileClient, OrgRepositoriesClient, OrgRepository,
    Organization, OrganizationsClient, PullRequest, PullRequestClient, Team, TeamAccess,
    TeamAccessClient, TeamsClient, TreeClient, UserRepositoriesClient, UserRepository,
};
pub use retry::{MergePollConfig, RetryConfig};
pub use validation::{FieldError, ValidationErrors};
