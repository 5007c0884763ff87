//! Top-level client and reference validation.

use std::sync::Arc;
use std::time::Duration;

use crate::errors::{ProviderError, Result};
use crate::gitlab::{GitLabClient, TokenType};
use crate::gitlab::pagination::PAGE_SIZE;
use crate::http::reqwest_transport::ReqwestTransport;
use crate::http::{HttpTransport, TransportLayer, apply_layers};
use crate::refs::{
    DEFAULT_DOMAIN, IdentityRef, IdentityType, OrganizationRef, RepositoryRef, UserRef,
    domain_host, domain_url,
};
use crate::resources::{OrgRepositoriesClient, OrganizationsClient, UserRepositoriesClient};
use crate::retry::{MergePollConfig, RetryConfig};
use crate::validation::Validate;

/// Identifier returned by [`Client::provider_id`].
pub const PROVIDER_ID: &str = "gitlab";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Options for building a [`Client`].
#[derive(Clone)]
pub struct ClientOptions {
    /// Domain override (host, optionally with scheme and port).
    pub domain: Option<String>,
    pub token_type: TokenType,
    /// Allow repository deletion.
    pub enable_destructive_calls: bool,
    /// Per-request timeout of the default reqwest transport.
    pub timeout: Duration,
    /// Retry transient network failures at the transport level.
    pub retry: Option<RetryConfig>,
    pub merge_poll: MergePollConfig,
    pub page_size: u32,
    /// Base transport; a reqwest transport is built when unset.
    pub transport: Option<Arc<dyn HttpTransport>>,
    /// Layers wrapped directly around the base transport.
    pub pre_chain: Vec<TransportLayer>,
    /// Layers wrapped around everything else.
    pub post_chain: Vec<TransportLayer>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            domain: None,
            token_type: TokenType::default(),
            enable_destructive_calls: false,
            timeout: DEFAULT_TIMEOUT,
            retry: None,
            merge_poll: MergePollConfig::default(),
            page_size: PAGE_SIZE,
            transport: None,
            pre_chain: Vec::new(),
            post_chain: Vec::new(),
        }
    }
}

impl std::fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientOptions")
            .field("domain", &self.domain)
            .field("token_type", &self.token_type)
            .field("enable_destructive_calls", &self.enable_destructive_calls)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("merge_poll", &self.merge_poll)
            .field("page_size", &self.page_size)
            .field("custom_transport", &self.transport.is_some())
            .field("pre_chain", &self.pre_chain.len())
            .field("post_chain", &self.post_chain.len())
            .finish()
    }
}

impl ClientOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn with_token_type(mut self, token_type: TokenType) -> Self {
        self.token_type = token_type;
        self
    }

    #[must_use]
    pub fn with_destructive_calls(mut self, enabled: bool) -> Self {
        self.enable_destructive_calls = enabled;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    #[must_use]
    pub fn with_merge_poll(mut self, merge_poll: MergePollConfig) -> Self {
        self.merge_poll = merge_poll;
        self
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Add a layer that sees every wire attempt (caching goes here).
    #[must_use]
    pub fn with_pre_chain(mut self, layer: TransportLayer) -> Self {
        self.pre_chain.push(layer);
        self
    }

    /// Add a layer that sees each logical request once (logging, counters).
    #[must_use]
    pub fn with_post_chain(mut self, layer: TransportLayer) -> Self {
        self.post_chain.push(layer);
        self
    }

    fn domain(&self) -> &str {
        self.domain.as_deref().unwrap_or(DEFAULT_DOMAIN)
    }

    /// Base transport, then `pre_chain`, then retry, then `post_chain`.
    fn build_transport(&self) -> Result<Arc<dyn HttpTransport>> {
        let base: Arc<dyn HttpTransport> = match &self.transport {
            Some(transport) => transport.clone(),
            None => Arc::new(ReqwestTransport::with_timeout(self.timeout)?),
        };

        let mut transport = apply_layers(base, &self.pre_chain);
        if let Some(retry) = &self.retry {
            transport = (retry.clone().into_layer())(transport);
        }
        Ok(apply_layers(transport, &self.post_chain))
    }
}

/// Scopes a [`TokenPermission`] check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPermission {
    RepositoryWrite,
}

/// The vendor client plus the domain references are checked against.
#[derive(Clone, Debug)]
pub(crate) struct Scope {
    pub(crate) gitlab: GitLabClient,
    domain: String,
}

impl Scope {
    pub(crate) fn new(gitlab: GitLabClient, domain: impl Into<String>) -> Self {
        Self {
            gitlab,
            domain: domain.into(),
        }
    }

    pub(crate) fn domain(&self) -> &str {
        &self.domain
    }

    fn check_domain(&self, domain: &str) -> Result<()> {
        if domain_host(domain).eq_ignore_ascii_case(domain_host(&self.domain)) {
            Ok(())
        } else {
            Err(ProviderError::DomainUnsupported {
                domain: domain.to_string(),
                supported: self.domain.clone(),
            })
        }
    }

    fn check_identity_type(identity_type: IdentityType) -> Result<()> {
        match identity_type {
            IdentityType::User | IdentityType::Organization => Ok(()),
            IdentityType::Suborganization => Err(ProviderError::no_provider_support(
                "sub-organizations",
            )),
        }
    }

    pub(crate) fn check_org(&self, r: &OrganizationRef) -> Result<()> {
        r.validate()?;
        self.check_domain(&r.domain)?;
        Self::check_identity_type(r.identity_type())
    }

    pub(crate) fn check_user(&self, r: &UserRef) -> Result<()> {
        r.validate()?;
        self.check_domain(&r.domain)
    }

    pub(crate) fn check_repo(&self, r: &RepositoryRef) -> Result<()> {
        r.validate()?;
        self.check_domain(r.domain())?;
        Self::check_identity_type(r.owner.identity_type())
    }

    /// Check a repository reference owned by an organization.
    pub(crate) fn check_org_repo(&self, r: &RepositoryRef) -> Result<()> {
        self.check_repo(r)?;
        match &r.owner {
            IdentityRef::Organization(_) => Ok(()),
            IdentityRef::User(_) => Err(ProviderError::invalid_argument(
                "RepositoryRef",
                "owner",
                "expected an organization",
            )),
        }
    }

    /// Check a repository reference owned by a user.
    pub(crate) fn check_user_repo(&self, r: &RepositoryRef) -> Result<()> {
        self.check_repo(r)?;
        match &r.owner {
            IdentityRef::User(_) => Ok(()),
            IdentityRef::Organization(_) => Err(ProviderError::invalid_argument(
                "RepositoryRef",
                "owner",
                "expected a user",
            )),
        }
    }
}

/// Entry point for all GitLab operations.
///
/// ```ignore
/// use gitlab_provider::{Client, ClientOptions, OrganizationRef, RepositoryInfo, RepositoryRef};
///
/// let client = Client::new(Some(&token), ClientOptions::new())?;
/// let repo_ref = RepositoryRef::new(OrganizationRef::new("gitlab.com", "acme"), "demo");
/// let outcome = client
///     .org_repositories()
///     .reconcile(&repo_ref, RepositoryInfo::default())
///     .await?;
/// println!("changed: {}", outcome.action_taken());
/// ```
#[derive(Clone, Debug)]
pub struct Client {
    scope: Scope,
}

impl Client {
    /// Build a client. `token` may be `None` for anonymous read access.
    pub fn new(token: Option<&str>, options: ClientOptions) -> Result<Self> {
        let domain = options.domain().to_string();
        let transport = options.build_transport()?;
        let base_url = format!("{}/api/v4", domain_url(&domain));

        let gitlab = GitLabClient::new_with_transport(
            &base_url,
            token.map(|t| (t, options.token_type)),
            transport,
        )
        .with_destructive_calls(options.enable_destructive_calls)
        .with_merge_poll(options.merge_poll.clone())
        .with_page_size(options.page_size);

        tracing::debug!(
            domain = %domain,
            destructive = options.enable_destructive_calls,
            "Created GitLab provider client"
        );

        Ok(Self {
            scope: Scope::new(gitlab, domain),
        })
    }

    pub fn provider_id(&self) -> &'static str {
        PROVIDER_ID
    }

    /// The domain references must use.
    pub fn supported_domain(&self) -> &str {
        self.scope.domain()
    }

    /// Escape hatch to the underlying vendor client.
    pub fn raw_client(&self) -> &GitLabClient {
        &self.scope.gitlab
    }

    /// GitLab does not expose token scopes per repository.
    pub async fn has_token_permission(&self, permission: TokenPermission) -> Result<bool> {
        Err(ProviderError::no_provider_support(format!(
            "token permission check ({permission:?})"
        )))
    }

    pub fn organizations(&self) -> OrganizationsClient {
        OrganizationsClient::new(self.scope.clone())
    }

    pub fn org_repositories(&self) -> OrgRepositoriesClient {
        OrgRepositoriesClient::new(self.scope.clone())
    }

    pub fn user_repositories(&self) -> UserRepositoriesClient {
        UserRepositoriesClient::new(self.scope.clone())
    }
}
