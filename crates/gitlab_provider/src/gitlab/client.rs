//! GitLab REST client.
//!
//! Every vendor call in the crate goes through [`GitLabClient`]. Each method
//! follows pagination, checks the shape of what comes back and classifies
//! failures into [`ProviderError`] before returning.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration as StdDuration;

use backon::Retryable;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::{decode, decode_list, normalize_response};
use super::pagination::{PAGE_SIZE, Page, collect_all, next_page, with_page};
use super::types::{
    AcceptMergeRequestOptions, AddDeployKeyOptions, CheckShape, CreateBranchOptions,
    CreateCommitOptions, CreateDeployTokenOptions, CreateMergeRequestOptions, CreateProjectOptions,
    EditProjectOptions, GitLabBranch, GitLabCommit, GitLabDeployKey, GitLabDeployToken,
    GitLabFile, GitLabGroup, GitLabGroupMember, GitLabMergeRequest, GitLabProject, GitLabTreeNode,
    GitLabUser, ShareWithGroupOptions, UpdateMergeRequestOptions,
};
use crate::errors::{ProviderError, Result, short_error_message};
use crate::http::reqwest_transport::ReqwestTransport;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use crate::retry::MergePollConfig;

/// User agent sent with every request.
const USER_AGENT: &str = concat!("gitlab-provider/", env!("CARGO_PKG_VERSION"));

/// How the access token is presented to GitLab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Personal, project or group access token (`PRIVATE-TOKEN`).
    #[default]
    Personal,
    /// OAuth2 access token (`Authorization: Bearer`).
    #[serde(alias = "oauth2")]
    OAuth,
    /// CI job token (`JOB-TOKEN`).
    Job,
}

impl TokenType {
    /// Header name and value carrying `token`.
    pub fn auth_header(self, token: &str) -> (String, String) {
        match self {
            TokenType::Personal => ("PRIVATE-TOKEN".to_string(), token.to_string()),
            TokenType::OAuth => ("Authorization".to_string(), format!("Bearer {token}")),
            TokenType::Job => ("JOB-TOKEN".to_string(), token.to_string()),
        }
    }
}

/// Percent-encode a namespaced path or file path for use as a single URL segment.
pub(crate) fn encode_segment(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Merge statuses GitLab reports while it is still computing mergeability.
fn is_merge_status_pending(status: &str) -> bool {
    matches!(
        status,
        "unchecked" | "checking" | "cannot_be_merged_recheck"
    )
}

enum MergePoll {
    Pending(String),
    Failed(ProviderError),
}

/// GitLab API client.
#[derive(Clone)]
pub struct GitLabClient {
    transport: Arc<dyn HttpTransport>,
    /// API root, e.g. `https://gitlab.com/api/v4`.
    base_url: String,
    auth: Option<(String, String)>,
    destructive_calls: bool,
    merge_poll: MergePollConfig,
    page_size: u32,
}

impl std::fmt::Debug for GitLabClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitLabClient")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.auth.is_some())
            .field("destructive_calls", &self.destructive_calls)
            .finish_non_exhaustive()
    }
}

impl GitLabClient {
    /// Create a client backed by reqwest.
    ///
    /// `base_url` is the API root (e.g. `https://gitlab.com/api/v4`).
    pub fn new(base_url: &str, token: Option<(&str, TokenType)>) -> Result<Self> {
        let transport = ReqwestTransport::with_timeout(StdDuration::from_secs(30))?;
        Ok(Self::new_with_transport(base_url, token, Arc::new(transport)))
    }

    pub fn new_with_transport(
        base_url: &str,
        token: Option<(&str, TokenType)>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth: token.map(|(token, kind)| kind.auth_header(token)),
            destructive_calls: false,
            merge_poll: MergePollConfig::default(),
            page_size: PAGE_SIZE,
        }
    }

    /// Allow calls that delete repositories.
    #[must_use]
    pub fn with_destructive_calls(mut self, enabled: bool) -> Self {
        self.destructive_calls = enabled;
        self
    }

    #[must_use]
    pub fn with_merge_poll(mut self, config: MergePollConfig) -> Self {
        self.merge_poll = config;
        self
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, PAGE_SIZE);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn destructive_calls_enabled(&self) -> bool {
        self.destructive_calls
    }

    // -----------------------------------------------------------------------
    // Request plumbing
    // -----------------------------------------------------------------------

    /// Send one request and classify any non-2xx response.
    async fn send(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Vec<u8>>,
        resource: &str,
    ) -> Result<HttpResponse> {
        let url = format!("{}{}", self.base_url, path);

        let mut headers = vec![
            ("Accept".to_string(), "application/json".to_string()),
            ("User-Agent".to_string(), USER_AGENT.to_string()),
        ];
        if let Some((name, value)) = &self.auth {
            headers.push((name.clone(), value.clone()));
        }
        if body.is_some() {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }

        let request = HttpRequest {
            method,
            url,
            headers,
            body: body.unwrap_or_default(),
        };

        let response = self.transport.send(request).await?;
        tracing::debug!(
            method = %method,
            path,
            status = response.status,
            "GitLab API call"
        );

        if !response.is_success() {
            let err = normalize_response(resource, &response);
            if err.is_rate_limited() {
                tracing::warn!(method = %method, path, "{}", short_error_message(&err));
            }
            return Err(err);
        }
        Ok(response)
    }

    async fn get<T>(&self, path: &str, resource: &str) -> Result<T>
    where
        T: DeserializeOwned + CheckShape,
    {
        let response = self.send(HttpMethod::Get, path, None, resource).await?;
        decode(resource, &response.body)
    }

    /// GET every page of a list endpoint.
    async fn get_all<T>(&self, path: &str, resource: &str) -> Result<Vec<T>>
    where
        T: DeserializeOwned + CheckShape,
    {
        collect_all(|page| async move {
            let response = self
                .send(
                    HttpMethod::Get,
                    &with_page(path, page, self.page_size),
                    None,
                    resource,
                )
                .await?;
            Ok(Page {
                items: decode_list(resource, &response.body)?,
                next_page: next_page(&response.headers),
            })
        })
        .await
    }

    async fn write<B, T>(&self, method: HttpMethod, path: &str, body: &B, resource: &str) -> Result<T>
    where
        B: Serialize,
        T: DeserializeOwned + CheckShape,
    {
        let body = serde_json::to_vec(body)
            .map_err(|e| ProviderError::invalid_argument("request", resource.to_string(), e.to_string()))?;
        let response = self.send(method, path, Some(body), resource).await?;
        decode(resource, &response.body)
    }

    async fn delete(&self, path: &str, resource: &str) -> Result<()> {
        self.send(HttpMethod::Delete, path, None, resource).await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Users
    // -----------------------------------------------------------------------

    /// The user the token belongs to.
    pub async fn current_user(&self) -> Result<GitLabUser> {
        self.get("/user", "current user").await
    }

    // -----------------------------------------------------------------------
    // Groups
    // -----------------------------------------------------------------------

    pub async fn get_group(&self, full_path: &str) -> Result<GitLabGroup> {
        self.get(
            &format!("/groups/{}", encode_segment(full_path)),
            &format!("group {full_path}"),
        )
        .await
    }

    /// Groups visible to the token.
    pub async fn list_groups(&self) -> Result<Vec<GitLabGroup>> {
        self.get_all("/groups", "groups").await
    }

    /// Direct subgroups of a group.
    pub async fn list_subgroups(&self, full_path: &str) -> Result<Vec<GitLabGroup>> {
        self.get_all(
            &format!("/groups/{}/subgroups", encode_segment(full_path)),
            &format!("subgroups of {full_path}"),
        )
        .await
    }

    pub async fn list_group_members(&self, full_path: &str) -> Result<Vec<GitLabGroupMember>> {
        self.get_all(
            &format!("/groups/{}/members", encode_segment(full_path)),
            &format!("members of {full_path}"),
        )
        .await
    }

    // -----------------------------------------------------------------------
    // Projects
    // -----------------------------------------------------------------------

    /// Get a project by its full path (e.g. `group/sub/project`).
    pub async fn get_project(&self, full_path: &str) -> Result<GitLabProject> {
        self.get(
            &format!("/projects/{}", encode_segment(full_path)),
            &format!("project {full_path}"),
        )
        .await
    }

    /// Projects directly inside a group.
    pub async fn list_group_projects(&self, full_path: &str) -> Result<Vec<GitLabProject>> {
        self.get_all(
            &format!("/groups/{}/projects", encode_segment(full_path)),
            &format!("projects of {full_path}"),
        )
        .await
    }

    /// Projects owned by a user.
    pub async fn list_user_projects(&self, username: &str) -> Result<Vec<GitLabProject>> {
        self.get_all(
            &format!("/users/{}/projects", encode_segment(username)),
            &format!("projects of {username}"),
        )
        .await
    }

    /// Create a project under the group at `group_path`.
    ///
    /// The group's numeric ID is resolved first.
    pub async fn create_group_project(
        &self,
        group_path: &str,
        mut options: CreateProjectOptions,
    ) -> Result<GitLabProject> {
        let group = self.get_group(group_path).await?;
        options.namespace_id = Some(group.id);
        let resource = format!("project {}/{}", group.full_path, options.path);
        self.write(HttpMethod::Post, "/projects", &options, &resource)
            .await
    }

    /// Create a project in the namespace of the user the token belongs to.
    ///
    /// GitLab only lets a token create projects in its own user namespace, so
    /// a different `username` is rejected before the create call.
    pub async fn create_user_project(
        &self,
        username: &str,
        mut options: CreateProjectOptions,
    ) -> Result<GitLabProject> {
        let me = self.current_user().await?;
        if me.username != username {
            return Err(ProviderError::no_provider_support(format!(
                "creating a repository for user {username} with a token of user {}",
                me.username
            )));
        }
        options.namespace_id = None;
        let resource = format!("project {username}/{}", options.path);
        self.write(HttpMethod::Post, "/projects", &options, &resource)
            .await
    }

    pub async fn edit_project(
        &self,
        full_path: &str,
        options: &EditProjectOptions,
    ) -> Result<GitLabProject> {
        self.write(
            HttpMethod::Put,
            &format!("/projects/{}", encode_segment(full_path)),
            options,
            &format!("project {full_path}"),
        )
        .await
    }

    /// Delete a project. Refused unless destructive calls are enabled.
    pub async fn delete_project(&self, full_path: &str) -> Result<()> {
        if !self.destructive_calls {
            return Err(ProviderError::destructive_call_disallowed(format!(
                "delete project {full_path}"
            )));
        }
        tracing::info!(project = full_path, "Deleting project");
        self.delete(
            &format!("/projects/{}", encode_segment(full_path)),
            &format!("project {full_path}"),
        )
        .await
    }

    // -----------------------------------------------------------------------
    // Group sharing
    // -----------------------------------------------------------------------

    pub async fn share_project(
        &self,
        full_path: &str,
        options: &ShareWithGroupOptions,
    ) -> Result<()> {
        let body = serde_json::to_vec(options).map_err(|e| {
            ProviderError::invalid_argument("ShareWithGroupOptions", "body", e.to_string())
        })?;
        self.send(
            HttpMethod::Post,
            &format!("/projects/{}/share", encode_segment(full_path)),
            Some(body),
            &format!("share of {full_path} with group {}", options.group_id),
        )
        .await?;
        Ok(())
    }

    pub async fn unshare_project(&self, full_path: &str, group_id: u64) -> Result<()> {
        self.delete(
            &format!("/projects/{}/share/{group_id}", encode_segment(full_path)),
            &format!("share of {full_path} with group {group_id}"),
        )
        .await
    }

    // -----------------------------------------------------------------------
    // Deploy keys
    // -----------------------------------------------------------------------

    pub async fn list_deploy_keys(&self, full_path: &str) -> Result<Vec<GitLabDeployKey>> {
        self.get_all(
            &format!("/projects/{}/deploy_keys", encode_segment(full_path)),
            &format!("deploy keys of {full_path}"),
        )
        .await
    }

    /// Find a deploy key by title.
    pub async fn get_deploy_key(&self, full_path: &str, title: &str) -> Result<GitLabDeployKey> {
        self.list_deploy_keys(full_path)
            .await?
            .into_iter()
            .find(|k| k.title == title)
            .ok_or_else(|| ProviderError::not_found(format!("deploy key {title} of {full_path}")))
    }

    pub async fn add_deploy_key(
        &self,
        full_path: &str,
        options: &AddDeployKeyOptions,
    ) -> Result<GitLabDeployKey> {
        self.write(
            HttpMethod::Post,
            &format!("/projects/{}/deploy_keys", encode_segment(full_path)),
            options,
            &format!("deploy key {} of {full_path}", options.title),
        )
        .await
    }

    pub async fn delete_deploy_key(&self, full_path: &str, key_id: u64) -> Result<()> {
        self.delete(
            &format!("/projects/{}/deploy_keys/{key_id}", encode_segment(full_path)),
            &format!("deploy key {key_id} of {full_path}"),
        )
        .await
    }

    // -----------------------------------------------------------------------
    // Deploy tokens
    // -----------------------------------------------------------------------

    pub async fn list_deploy_tokens(&self, full_path: &str) -> Result<Vec<GitLabDeployToken>> {
        self.get_all(
            &format!("/projects/{}/deploy_tokens", encode_segment(full_path)),
            &format!("deploy tokens of {full_path}"),
        )
        .await
    }

    /// Find an active deploy token by name.
    pub async fn get_deploy_token(&self, full_path: &str, name: &str) -> Result<GitLabDeployToken> {
        self.list_deploy_tokens(full_path)
            .await?
            .into_iter()
            .find(|t| t.name == name && !t.revoked && !t.expired)
            .ok_or_else(|| ProviderError::not_found(format!("deploy token {name} of {full_path}")))
    }

    pub async fn create_deploy_token(
        &self,
        full_path: &str,
        options: &CreateDeployTokenOptions,
    ) -> Result<GitLabDeployToken> {
        self.write(
            HttpMethod::Post,
            &format!("/projects/{}/deploy_tokens", encode_segment(full_path)),
            options,
            &format!("deploy token {} of {full_path}", options.name),
        )
        .await
    }

    pub async fn delete_deploy_token(&self, full_path: &str, token_id: u64) -> Result<()> {
        self.delete(
            &format!("/projects/{}/deploy_tokens/{token_id}", encode_segment(full_path)),
            &format!("deploy token {token_id} of {full_path}"),
        )
        .await
    }

    // -----------------------------------------------------------------------
    // Commits and branches
    // -----------------------------------------------------------------------

    /// One page of commits on `branch`, newest first.
    pub async fn list_commits_page(
        &self,
        full_path: &str,
        branch: &str,
        per_page: u32,
        page: u32,
    ) -> Result<Vec<GitLabCommit>> {
        let path = format!(
            "/projects/{}/repository/commits?ref_name={}",
            encode_segment(full_path),
            encode_segment(branch)
        );
        let resource = format!("commits of {full_path}@{branch}");
        let response = self
            .send(HttpMethod::Get, &with_page(&path, page, per_page), None, &resource)
            .await?;
        decode_list(&resource, &response.body)
    }

    pub async fn create_commit(
        &self,
        full_path: &str,
        options: &CreateCommitOptions,
    ) -> Result<GitLabCommit> {
        self.write(
            HttpMethod::Post,
            &format!("/projects/{}/repository/commits", encode_segment(full_path)),
            options,
            &format!("commit on {full_path}@{}", options.branch),
        )
        .await
    }

    pub async fn list_branches(&self, full_path: &str) -> Result<Vec<GitLabBranch>> {
        self.get_all(
            &format!("/projects/{}/repository/branches", encode_segment(full_path)),
            &format!("branches of {full_path}"),
        )
        .await
    }

    pub async fn get_branch(&self, full_path: &str, branch: &str) -> Result<GitLabBranch> {
        self.get(
            &format!(
                "/projects/{}/repository/branches/{}",
                encode_segment(full_path),
                encode_segment(branch)
            ),
            &format!("branch {branch} of {full_path}"),
        )
        .await
    }

    pub async fn create_branch(
        &self,
        full_path: &str,
        options: &CreateBranchOptions,
    ) -> Result<GitLabBranch> {
        self.write(
            HttpMethod::Post,
            &format!("/projects/{}/repository/branches", encode_segment(full_path)),
            options,
            &format!("branch {} of {full_path}", options.branch),
        )
        .await
    }

    // -----------------------------------------------------------------------
    // Merge requests
    // -----------------------------------------------------------------------

    pub async fn list_merge_requests(&self, full_path: &str) -> Result<Vec<GitLabMergeRequest>> {
        self.get_all(
            &format!("/projects/{}/merge_requests", encode_segment(full_path)),
            &format!("merge requests of {full_path}"),
        )
        .await
    }

    pub async fn get_merge_request(&self, full_path: &str, iid: u64) -> Result<GitLabMergeRequest> {
        self.get(
            &format!("/projects/{}/merge_requests/{iid}", encode_segment(full_path)),
            &format!("merge request !{iid} of {full_path}"),
        )
        .await
    }

    pub async fn create_merge_request(
        &self,
        full_path: &str,
        options: &CreateMergeRequestOptions,
    ) -> Result<GitLabMergeRequest> {
        self.write(
            HttpMethod::Post,
            &format!("/projects/{}/merge_requests", encode_segment(full_path)),
            options,
            &format!(
                "merge request {} -> {} of {full_path}",
                options.source_branch, options.target_branch
            ),
        )
        .await
    }

    pub async fn update_merge_request(
        &self,
        full_path: &str,
        iid: u64,
        options: &UpdateMergeRequestOptions,
    ) -> Result<GitLabMergeRequest> {
        self.write(
            HttpMethod::Put,
            &format!("/projects/{}/merge_requests/{iid}", encode_segment(full_path)),
            options,
            &format!("merge request !{iid} of {full_path}"),
        )
        .await
    }

    /// Wait until GitLab has computed the merge request's mergeability.
    ///
    /// Polls on the configured fixed schedule. A status still pending after
    /// the last attempt fails with `MergeabilityPending`; `cannot_be_merged`
    /// fails with `NotMergeable`.
    pub async fn wait_for_mergeability(
        &self,
        full_path: &str,
        iid: u64,
    ) -> Result<GitLabMergeRequest> {
        let attempts = AtomicUsize::new(0);

        let check = || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            let mr = self
                .get_merge_request(full_path, iid)
                .await
                .map_err(MergePoll::Failed)?;
            if is_merge_status_pending(&mr.merge_status) {
                return Err(MergePoll::Pending(mr.merge_status));
            }
            Ok(mr)
        };

        let mr = check
            .retry(self.merge_poll.clone().into_backoff())
            .when(|e| matches!(e, MergePoll::Pending(_)))
            .notify(|e, dur| {
                if let MergePoll::Pending(status) = e {
                    tracing::debug!(
                        project = full_path,
                        iid,
                        status = status.as_str(),
                        "Merge status pending, checking again in {:?}",
                        dur
                    );
                }
            })
            .await
            .map_err(|e| match e {
                MergePoll::Pending(status) => ProviderError::MergeabilityPending {
                    iid,
                    status,
                    attempts: attempts.load(Ordering::SeqCst),
                },
                MergePoll::Failed(err) => err,
            })?;

        if mr.merge_status == "cannot_be_merged" {
            return Err(ProviderError::NotMergeable {
                iid,
                status: mr
                    .detailed_merge_status
                    .clone()
                    .unwrap_or_else(|| mr.merge_status.clone()),
            });
        }
        Ok(mr)
    }

    /// Accept a merge request once GitLab reports it mergeable.
    pub async fn accept_merge_request(
        &self,
        full_path: &str,
        iid: u64,
        options: &AcceptMergeRequestOptions,
    ) -> Result<GitLabMergeRequest> {
        self.wait_for_mergeability(full_path, iid).await?;
        tracing::info!(project = full_path, iid, "Merging merge request");
        self.write(
            HttpMethod::Put,
            &format!("/projects/{}/merge_requests/{iid}/merge", encode_segment(full_path)),
            options,
            &format!("merge request !{iid} of {full_path}"),
        )
        .await
    }

    // -----------------------------------------------------------------------
    // Repository tree and files
    // -----------------------------------------------------------------------

    /// Tree entries at `path` (repository root when `None`) for `reference`.
    pub async fn list_tree(
        &self,
        full_path: &str,
        reference: &str,
        path: Option<&str>,
        recursive: bool,
    ) -> Result<Vec<GitLabTreeNode>> {
        let mut route = format!(
            "/projects/{}/repository/tree?ref={}&recursive={recursive}",
            encode_segment(full_path),
            encode_segment(reference)
        );
        if let Some(path) = path.filter(|p| !p.is_empty()) {
            route.push_str("&path=");
            route.push_str(&encode_segment(path));
        }
        self.get_all(&route, &format!("tree {reference} of {full_path}"))
            .await
    }

    /// A single file; `content` is still base64-encoded.
    pub async fn get_file(
        &self,
        full_path: &str,
        file_path: &str,
        reference: &str,
    ) -> Result<GitLabFile> {
        self.get(
            &format!(
                "/projects/{}/repository/files/{}?ref={}",
                encode_segment(full_path),
                encode_segment(file_path),
                encode_segment(reference)
            ),
            &format!("file {file_path} of {full_path}@{reference}"),
        )
        .await
    }
}
