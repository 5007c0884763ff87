//! In-memory GitLab used by the integration tests.
//!
//! `FakeGitLab` implements just enough of the v4 REST API (projects, groups,
//! deploy keys, deploy tokens, group shares, and repository content such as
//! branches, files, commits and merge requests) to drive full flows through
//! the public client, and records every request it receives.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use gitlab_provider::gitlab::types::{
    AcceptMergeRequestOptions, AddDeployKeyOptions, CommitActionKind, CreateBranchOptions,
    CreateCommitOptions, CreateDeployTokenOptions, CreateMergeRequestOptions,
    CreateProjectOptions, EditProjectOptions, GitLabBranchCommit, ShareWithGroupOptions,
    UpdateMergeRequestOptions,
};
use gitlab_provider::gitlab::{
    GitLabBranch, GitLabCommit, GitLabDeployKey, GitLabDeployToken, GitLabFile, GitLabGroup,
    GitLabGroupMember, GitLabMergeRequest, GitLabNamespace, GitLabProject, GitLabSharedGroup,
    GitLabTreeNode, GitLabUser,
};
use gitlab_provider::{
    Client, ClientOptions, HttpError, HttpMethod, HttpRequest, HttpResponse, HttpTransport,
    RepositoryVisibility,
};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub const API_BASE: &str = "https://gitlab.com/api/v4";
pub const TOKEN: &str = "glpat-test";

/// An injected failure for a request matching `method` and `path`, after
/// `skip` matching requests have been served normally.
#[derive(Debug, Clone)]
struct Failure {
    method: HttpMethod,
    path: String,
    skip: usize,
    status: u16,
}

#[derive(Debug, Clone, Default)]
struct BranchState {
    head: String,
    files: BTreeMap<String, String>,
}

/// Git content of one project.
#[derive(Debug, Default)]
struct Content {
    branches: BTreeMap<String, BranchState>,
    /// `(branch, commit)`, oldest first.
    commits: Vec<(String, GitLabCommit)>,
    merge_requests: Vec<GitLabMergeRequest>,
    /// Merge statuses handed out by successive merge request reads.
    merge_statuses: HashMap<u64, VecDeque<String>>,
    last_commit: Option<CreateCommitOptions>,
    last_merge: Option<AcceptMergeRequestOptions>,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    user: Option<GitLabUser>,
    groups: Vec<GitLabGroup>,
    members: HashMap<String, Vec<GitLabGroupMember>>,
    projects: Vec<GitLabProject>,
    deploy_keys: HashMap<u64, Vec<GitLabDeployKey>>,
    deploy_tokens: HashMap<u64, Vec<GitLabDeployToken>>,
    content: HashMap<u64, Content>,
    failures: Vec<Failure>,
    requests: Vec<HttpRequest>,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn project_index(&self, full_path: &str) -> Option<usize> {
        self.projects
            .iter()
            .position(|p| p.path_with_namespace == full_path)
    }

    fn group(&self, key: &str) -> Option<&GitLabGroup> {
        self.groups
            .iter()
            .find(|g| g.full_path == key || g.id.to_string() == key)
    }

    fn content(&mut self, full_path: &str) -> Option<&mut Content> {
        let id = self.projects[self.project_index(full_path)?].id;
        Some(self.content.entry(id).or_default())
    }

    fn username(&self) -> String {
        self.user
            .as_ref()
            .map(|u| u.username.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Default)]
pub struct FakeGitLab {
    state: Mutex<State>,
}

fn json<T: Serialize>(status: u16, value: &T) -> HttpResponse {
    HttpResponse {
        status,
        headers: vec![("Content-Type".to_string(), "application/json".to_string())],
        body: serde_json::to_vec(value).unwrap(),
    }
}

fn message(status: u16, text: &str) -> HttpResponse {
    json(status, &serde_json::json!({ "message": text }))
}

fn not_found(what: &str) -> HttpResponse {
    message(404, &format!("404 {what} Not Found"))
}

fn empty(status: u16) -> HttpResponse {
    HttpResponse {
        status,
        headers: Vec::new(),
        body: Vec::new(),
    }
}

fn body<T: DeserializeOwned>(request: &HttpRequest) -> T {
    serde_json::from_slice(&request.body).unwrap()
}

/// Serve one page of `items` the way GitLab does, with `X-Next-Page`.
fn paged<T: Serialize>(items: &[T], query: &HashMap<String, String>) -> HttpResponse {
    let page: usize = query.get("page").and_then(|v| v.parse().ok()).unwrap_or(1);
    let per_page: usize = query
        .get("per_page")
        .and_then(|v| v.parse().ok())
        .unwrap_or(20);
    let start = (page - 1) * per_page;
    let slice: Vec<&T> = items.iter().skip(start).take(per_page).collect();
    let next = if start + per_page < items.len() {
        (page + 1).to_string()
    } else {
        String::new()
    };
    let mut response = json(200, &slice);
    response.headers.push(("X-Next-Page".to_string(), next));
    response
}

fn decode_segment(segment: &str) -> String {
    segment.replace("%2F", "/").replace("%2f", "/")
}

impl FakeGitLab {
    /// A server whose token belongs to `username`.
    pub fn new(username: &str) -> Arc<Self> {
        let fake = Self::default();
        {
            let mut state = fake.lock();
            let id = state.next_id();
            state.user = Some(GitLabUser {
                id,
                username: username.to_string(),
                name: Some(username.to_string()),
                web_url: Some(format!("https://gitlab.com/{username}")),
            });
        }
        Arc::new(fake)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// A client talking to this server on gitlab.com.
    pub fn client(self: &Arc<Self>, options: ClientOptions) -> Client {
        Client::new(Some(TOKEN), options.with_transport(self.clone())).unwrap()
    }

    pub fn add_group(&self, full_path: &str) -> GitLabGroup {
        let mut state = self.lock();
        let id = state.next_id();
        let (parent_id, path) = match full_path.rsplit_once('/') {
            Some((parent, path)) => (state.group(parent).map(|g| g.id), path),
            None => (None, full_path),
        };
        let group = GitLabGroup {
            id,
            name: path.to_string(),
            path: path.to_string(),
            full_path: full_path.to_string(),
            description: None,
            visibility: Some("private".to_string()),
            parent_id,
            web_url: Some(format!("https://gitlab.com/groups/{full_path}")),
        };
        state.groups.push(group.clone());
        group
    }

    pub fn add_member(&self, group: &str, username: &str, access_level: u32) {
        let mut state = self.lock();
        let id = state.next_id();
        state
            .members
            .entry(group.to_string())
            .or_default()
            .push(GitLabGroupMember {
                id,
                username: username.to_string(),
                name: None,
                access_level,
            });
    }

    /// Seed a project directly, bypassing the API.
    pub fn add_project(&self, namespace: &str, path: &str) -> GitLabProject {
        let mut state = self.lock();
        let id = state.next_id();
        let project = new_project(&state, id, namespace, path);
        state.projects.push(project.clone());
        project
    }

    /// Mutate a stored project, e.g. to simulate drift made outside the client.
    pub fn edit_project(&self, full_path: &str, edit: impl FnOnce(&mut GitLabProject)) {
        let mut state = self.lock();
        if let Some(index) = state.project_index(full_path) {
            edit(&mut state.projects[index]);
        }
    }

    pub fn project(&self, full_path: &str) -> Option<GitLabProject> {
        let state = self.lock();
        state.project_index(full_path).map(|i| state.projects[i].clone())
    }

    pub fn deploy_keys(&self, full_path: &str) -> Vec<GitLabDeployKey> {
        let state = self.lock();
        state
            .project_index(full_path)
            .and_then(|i| state.deploy_keys.get(&state.projects[i].id).cloned())
            .unwrap_or_default()
    }

    pub fn deploy_tokens(&self, full_path: &str) -> Vec<GitLabDeployToken> {
        let state = self.lock();
        state
            .project_index(full_path)
            .and_then(|i| state.deploy_tokens.get(&state.projects[i].id).cloned())
            .unwrap_or_default()
    }

    /// Seed `branch` of a project with `files` and one commit.
    pub fn add_branch(&self, full_path: &str, branch: &str, files: &[(&str, &str)]) -> String {
        let mut state = self.lock();
        let id = state.next_id();
        let author = state.username();
        let content = state.content(full_path).expect("project exists");
        let commit = new_commit(id, &author, "seed", None);
        content.branches.insert(
            branch.to_string(),
            BranchState {
                head: commit.id.clone(),
                files: files
                    .iter()
                    .map(|(path, body)| (path.to_string(), body.to_string()))
                    .collect(),
            },
        );
        content.commits.push((branch.to_string(), commit.clone()));
        commit.id
    }

    /// Files on `branch`, by path.
    pub fn files(&self, full_path: &str, branch: &str) -> BTreeMap<String, String> {
        let mut state = self.lock();
        state
            .content(full_path)
            .and_then(|c| c.branches.get(branch))
            .map(|b| b.files.clone())
            .unwrap_or_default()
    }

    pub fn branch_head(&self, full_path: &str, branch: &str) -> Option<String> {
        let mut state = self.lock();
        state
            .content(full_path)
            .and_then(|c| c.branches.get(branch))
            .map(|b| b.head.clone())
    }

    /// The body of the last commit request that succeeded.
    pub fn last_commit(&self, full_path: &str) -> Option<CreateCommitOptions> {
        let mut state = self.lock();
        state.content(full_path).and_then(|c| c.last_commit.clone())
    }

    /// The body of the last accepted merge.
    pub fn last_merge(&self, full_path: &str) -> Option<AcceptMergeRequestOptions> {
        let mut state = self.lock();
        state.content(full_path).and_then(|c| c.last_merge.clone())
    }

    /// Report `statuses` as the merge status of `iid`, one per read, before
    /// falling back to the stored status. Scripted statuses are not stored.
    pub fn script_merge_status(&self, full_path: &str, iid: u64, statuses: &[&str]) {
        let mut state = self.lock();
        let content = state.content(full_path).expect("project exists");
        content
            .merge_statuses
            .entry(iid)
            .or_default()
            .extend(statuses.iter().map(|s| s.to_string()));
    }

    pub fn merge_request(&self, full_path: &str, iid: u64) -> Option<GitLabMergeRequest> {
        let mut state = self.lock();
        state
            .content(full_path)
            .and_then(|c| c.merge_requests.iter().find(|mr| mr.iid == iid).cloned())
    }

    /// Make the next `method` request to `path` (relative to the API root,
    /// query excluded) fail with `status`.
    pub fn fail_next(&self, method: HttpMethod, path: &str, status: u16) {
        self.fail_after(method, path, 0, status);
    }

    /// Like [`fail_next`](Self::fail_next), but serve `skip` matching
    /// requests first.
    pub fn fail_after(&self, method: HttpMethod, path: &str, skip: usize, status: u16) {
        self.lock().failures.push(Failure {
            method,
            path: path.to_string(),
            skip,
            status,
        });
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.lock().requests.clone()
    }

    pub fn clear_requests(&self) {
        self.lock().requests.clear();
    }

    /// Requests with `method` whose path (query excluded) equals `path`.
    pub fn count(&self, method: HttpMethod, path: &str) -> usize {
        let url = format!("{API_BASE}{path}");
        self.lock()
            .requests
            .iter()
            .filter(|r| r.method == method && r.url.split('?').next() == Some(url.as_str()))
            .count()
    }

    /// Requests that change server state.
    pub fn mutations(&self) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.method != HttpMethod::Get)
            .count()
    }

    fn handle(&self, request: &HttpRequest) -> HttpResponse {
        let mut state = self.lock();
        state.requests.push(request.clone());

        if request.header("PRIVATE-TOKEN") != Some(TOKEN) {
            return message(401, "401 Unauthorized");
        }

        let Some(rest) = request.url.strip_prefix(API_BASE) else {
            return not_found("host");
        };
        let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
        let query: HashMap<String, String> = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();

        if let Some(index) = state
            .failures
            .iter()
            .position(|f| f.method == request.method && f.path == path)
        {
            if state.failures[index].skip > 0 {
                state.failures[index].skip -= 1;
            } else {
                let failure = state.failures.remove(index);
                return message(failure.status, "injected failure");
            }
        }

        let segments: Vec<String> = path
            .trim_start_matches('/')
            .split('/')
            .map(decode_segment)
            .collect();
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();

        match (request.method, segments.as_slice()) {
            (HttpMethod::Get, ["user"]) => match &state.user {
                Some(user) => json(200, user),
                None => message(401, "401 Unauthorized"),
            },

            (HttpMethod::Get, ["groups"]) => paged(&state.groups, &query),
            (HttpMethod::Get, ["groups", group]) => match state.group(group) {
                Some(g) => json(200, g),
                None => not_found("Group"),
            },
            (HttpMethod::Get, ["groups", group, "subgroups"]) => match state.group(group) {
                Some(parent) => {
                    let parent_id = parent.id;
                    let children: Vec<GitLabGroup> = state
                        .groups
                        .iter()
                        .filter(|g| g.parent_id == Some(parent_id))
                        .cloned()
                        .collect();
                    paged(&children, &query)
                }
                None => not_found("Group"),
            },
            (HttpMethod::Get, ["groups", group, "members"]) => match state.group(group) {
                Some(g) => {
                    let members = state.members.get(&g.full_path).cloned().unwrap_or_default();
                    paged(&members, &query)
                }
                None => not_found("Group"),
            },
            (HttpMethod::Get, ["groups", group, "projects"]) => match state.group(group) {
                Some(g) => {
                    let namespace = g.full_path.clone();
                    let projects: Vec<GitLabProject> = state
                        .projects
                        .iter()
                        .filter(|p| p.namespace.full_path == namespace)
                        .cloned()
                        .collect();
                    paged(&projects, &query)
                }
                None => not_found("Group"),
            },
            (HttpMethod::Get, ["users", username, "projects"]) => {
                let projects: Vec<GitLabProject> = state
                    .projects
                    .iter()
                    .filter(|p| p.namespace.kind == "user" && p.namespace.full_path == *username)
                    .cloned()
                    .collect();
                paged(&projects, &query)
            }

            (HttpMethod::Post, ["projects"]) => create_project(&mut state, &body(request)),
            (HttpMethod::Get, ["projects", project]) => match state.project_index(project) {
                Some(i) => json(200, &state.projects[i]),
                None => not_found("Project"),
            },
            (HttpMethod::Put, ["projects", project]) => {
                let options: EditProjectOptions = body(request);
                match state.project_index(project) {
                    Some(i) => {
                        let p = &mut state.projects[i];
                        if let Some(name) = options.name {
                            p.name = name;
                        }
                        if let Some(description) = options.description {
                            p.description = (!description.is_empty()).then_some(description);
                        }
                        if let Some(branch) = options.default_branch {
                            p.default_branch = Some(branch);
                        }
                        if let Some(visibility) = options.visibility {
                            p.visibility = visibility;
                        }
                        json(200, &state.projects[i])
                    }
                    None => not_found("Project"),
                }
            }
            (HttpMethod::Delete, ["projects", project]) => match state.project_index(project) {
                Some(i) => {
                    let removed = state.projects.remove(i);
                    state.deploy_keys.remove(&removed.id);
                    state.deploy_tokens.remove(&removed.id);
                    empty(202)
                }
                None => not_found("Project"),
            },

            (HttpMethod::Post, ["projects", project, "share"]) => {
                let options: ShareWithGroupOptions = body(request);
                share_project(&mut state, project, &options)
            }
            (HttpMethod::Delete, ["projects", project, "share", group_id]) => {
                let Some(i) = state.project_index(project) else {
                    return not_found("Project");
                };
                let shares = &mut state.projects[i].shared_with_groups;
                let before = shares.len();
                shares.retain(|s| s.group_id.to_string() != *group_id);
                if shares.len() == before {
                    not_found("Group Link")
                } else {
                    empty(204)
                }
            }

            (HttpMethod::Get, ["projects", project, "deploy_keys"]) => {
                let Some(i) = state.project_index(project) else {
                    return not_found("Project");
                };
                let keys = state
                    .deploy_keys
                    .get(&state.projects[i].id)
                    .cloned()
                    .unwrap_or_default();
                paged(&keys, &query)
            }
            (HttpMethod::Post, ["projects", project, "deploy_keys"]) => {
                let options: AddDeployKeyOptions = body(request);
                let Some(i) = state.project_index(project) else {
                    return not_found("Project");
                };
                let project_id = state.projects[i].id;
                let id = state.next_id();
                let keys = state.deploy_keys.entry(project_id).or_default();
                if keys.iter().any(|k| k.key == options.key) {
                    return message(400, "key has already been taken");
                }
                let key = GitLabDeployKey {
                    id,
                    title: options.title,
                    key: options.key,
                    can_push: options.can_push,
                    created_at: None,
                    fingerprint: None,
                };
                keys.push(key.clone());
                json(201, &key)
            }
            (HttpMethod::Delete, ["projects", project, "deploy_keys", key_id]) => {
                let Some(i) = state.project_index(project) else {
                    return not_found("Project");
                };
                let project_id = state.projects[i].id;
                let keys = state.deploy_keys.entry(project_id).or_default();
                let before = keys.len();
                keys.retain(|k| k.id.to_string() != *key_id);
                if keys.len() == before {
                    not_found("Deploy Key")
                } else {
                    empty(204)
                }
            }

            (HttpMethod::Get, ["projects", project, "deploy_tokens"]) => {
                let Some(i) = state.project_index(project) else {
                    return not_found("Project");
                };
                let tokens: Vec<GitLabDeployToken> = state
                    .deploy_tokens
                    .get(&state.projects[i].id)
                    .cloned()
                    .unwrap_or_default()
                    .into_iter()
                    .map(|mut t| {
                        t.token = None;
                        t
                    })
                    .collect();
                paged(&tokens, &query)
            }
            (HttpMethod::Post, ["projects", project, "deploy_tokens"]) => {
                let options: CreateDeployTokenOptions = body(request);
                let Some(i) = state.project_index(project) else {
                    return not_found("Project");
                };
                let project_id = state.projects[i].id;
                let id = state.next_id();
                let token = GitLabDeployToken {
                    id,
                    name: options.name,
                    username: options
                        .username
                        .unwrap_or_else(|| format!("gitlab+deploy-token-{id}")),
                    expires_at: None,
                    scopes: options.scopes,
                    revoked: false,
                    expired: false,
                    token: Some(format!("secret-{id}")),
                };
                state
                    .deploy_tokens
                    .entry(project_id)
                    .or_default()
                    .push(token.clone());
                json(201, &token)
            }
            (HttpMethod::Delete, ["projects", project, "deploy_tokens", token_id]) => {
                let Some(i) = state.project_index(project) else {
                    return not_found("Project");
                };
                let project_id = state.projects[i].id;
                let tokens = state.deploy_tokens.entry(project_id).or_default();
                let before = tokens.len();
                tokens.retain(|t| t.id.to_string() != *token_id);
                if tokens.len() == before {
                    not_found("Deploy Token")
                } else {
                    empty(204)
                }
            }

            (HttpMethod::Get, ["projects", project, "repository", "tree"]) => {
                let Some(content) = state.content(project) else {
                    return not_found("Project");
                };
                let reference = query.get("ref").cloned().unwrap_or_default();
                let Some(branch) = content.branches.get(&reference) else {
                    return not_found("Tree");
                };
                let path = query.get("path").cloned().unwrap_or_default();
                let recursive = query.get("recursive").map(String::as_str) == Some("true");
                let nodes = tree_nodes(&branch.files, &path, recursive);
                if nodes.is_empty() && !path.is_empty() {
                    return not_found("Tree");
                }
                paged(&nodes, &query)
            }
            (HttpMethod::Get, ["projects", project, "repository", "files", file_path]) => {
                let Some(content) = state.content(project) else {
                    return not_found("Project");
                };
                let reference = query.get("ref").cloned().unwrap_or_default();
                let Some(branch) = content.branches.get(&reference) else {
                    return not_found("File");
                };
                match branch.files.get(*file_path) {
                    Some(body) => json(
                        200,
                        &GitLabFile {
                            file_name: file_path.rsplit('/').next().unwrap_or(file_path).to_string(),
                            file_path: file_path.to_string(),
                            size: body.len() as u64,
                            encoding: "base64".to_string(),
                            content: STANDARD.encode(body),
                            blob_id: None,
                            last_commit_id: Some(branch.head.clone()),
                        },
                    ),
                    None => not_found("File"),
                }
            }
            (HttpMethod::Get, ["projects", project, "repository", "commits"]) => {
                let Some(content) = state.content(project) else {
                    return not_found("Project");
                };
                let branch = query.get("ref_name").cloned().unwrap_or_default();
                let commits: Vec<GitLabCommit> = content
                    .commits
                    .iter()
                    .rev()
                    .filter(|(b, _)| *b == branch)
                    .map(|(_, c)| c.clone())
                    .collect();
                paged(&commits, &query)
            }
            (HttpMethod::Post, ["projects", project, "repository", "commits"]) => {
                create_commit(&mut state, project, &body(request))
            }
            (HttpMethod::Get, ["projects", project, "repository", "branches"]) => {
                let Some(i) = state.project_index(project) else {
                    return not_found("Project");
                };
                let default = state.projects[i].default_branch.clone();
                let Some(content) = state.content(project) else {
                    return not_found("Project");
                };
                let branches: Vec<GitLabBranch> = content
                    .branches
                    .iter()
                    .map(|(name, b)| branch_json(name, b, default.as_deref()))
                    .collect();
                paged(&branches, &query)
            }
            (HttpMethod::Get, ["projects", project, "repository", "branches", name]) => {
                let Some(i) = state.project_index(project) else {
                    return not_found("Project");
                };
                let default = state.projects[i].default_branch.clone();
                let Some(content) = state.content(project) else {
                    return not_found("Project");
                };
                match content.branches.get(*name) {
                    Some(b) => json(200, &branch_json(name, b, default.as_deref())),
                    None => not_found("Branch"),
                }
            }
            (HttpMethod::Post, ["projects", project, "repository", "branches"]) => {
                let options: CreateBranchOptions = body(request);
                let Some(content) = state.content(project) else {
                    return not_found("Project");
                };
                if content.branches.contains_key(&options.branch) {
                    return message(400, "Branch already exists");
                }
                let source = content
                    .branches
                    .get(&options.reference)
                    .or_else(|| content.branches.values().find(|b| b.head == options.reference))
                    .cloned();
                let Some(source) = source else {
                    return message(400, "Invalid reference name");
                };
                content.branches.insert(options.branch.clone(), source.clone());
                json(201, &branch_json(&options.branch, &source, None))
            }

            (HttpMethod::Get, ["projects", project, "merge_requests"]) => {
                let Some(content) = state.content(project) else {
                    return not_found("Project");
                };
                paged(&content.merge_requests, &query)
            }
            (HttpMethod::Post, ["projects", project, "merge_requests"]) => {
                let options: CreateMergeRequestOptions = body(request);
                let id = state.next_id();
                let web_base = format!("https://gitlab.com/{project}");
                let Some(content) = state.content(project) else {
                    return not_found("Project");
                };
                if content.merge_requests.iter().any(|mr| {
                    mr.state == "opened"
                        && mr.source_branch == options.source_branch
                        && mr.target_branch == options.target_branch
                }) {
                    return message(409, "Another open merge request already exists for this source branch");
                }
                let iid = content.merge_requests.len() as u64 + 1;
                let mr = GitLabMergeRequest {
                    id,
                    iid,
                    title: options.title,
                    description: options.description,
                    state: "opened".to_string(),
                    merge_status: "can_be_merged".to_string(),
                    detailed_merge_status: None,
                    sha: content
                        .branches
                        .get(&options.source_branch)
                        .map(|b| b.head.clone()),
                    source_branch: options.source_branch,
                    target_branch: options.target_branch,
                    web_url: format!("{web_base}/-/merge_requests/{iid}"),
                    merge_commit_sha: None,
                    squash_commit_sha: None,
                    merged_at: None,
                };
                content.merge_requests.push(mr.clone());
                json(201, &mr)
            }
            (HttpMethod::Get, ["projects", project, "merge_requests", iid]) => {
                let Some(content) = state.content(project) else {
                    return not_found("Project");
                };
                let iid: u64 = iid.parse().unwrap_or_default();
                let scripted = content
                    .merge_statuses
                    .get_mut(&iid)
                    .and_then(VecDeque::pop_front);
                match content.merge_requests.iter().find(|mr| mr.iid == iid) {
                    Some(mr) => {
                        let mut mr = mr.clone();
                        if let Some(status) = scripted {
                            mr.merge_status = status;
                        }
                        json(200, &mr)
                    }
                    None => not_found("Merge Request"),
                }
            }
            (HttpMethod::Put, ["projects", project, "merge_requests", iid]) => {
                let options: UpdateMergeRequestOptions = body(request);
                let Some(content) = state.content(project) else {
                    return not_found("Project");
                };
                let iid: u64 = iid.parse().unwrap_or_default();
                match content.merge_requests.iter_mut().find(|mr| mr.iid == iid) {
                    Some(mr) => {
                        if let Some(title) = options.title {
                            mr.title = title;
                        }
                        if let Some(description) = options.description {
                            mr.description = Some(description);
                        }
                        json(200, &*mr)
                    }
                    None => not_found("Merge Request"),
                }
            }
            (HttpMethod::Put, ["projects", project, "merge_requests", iid, "merge"]) => {
                let options: AcceptMergeRequestOptions = body(request);
                let Some(content) = state.content(project) else {
                    return not_found("Project");
                };
                let iid: u64 = iid.parse().unwrap_or_default();
                let Some(index) = content.merge_requests.iter().position(|mr| mr.iid == iid) else {
                    return not_found("Merge Request");
                };
                if content.merge_requests[index].merge_status != "can_be_merged" {
                    return message(406, "Branch cannot be merged");
                }
                let (source, target) = {
                    let mr = &content.merge_requests[index];
                    (mr.source_branch.clone(), mr.target_branch.clone())
                };
                if let Some(merged) = content.branches.get(&source).cloned() {
                    content.branches.insert(target, merged);
                }
                let mr = &mut content.merge_requests[index];
                mr.state = "merged".to_string();
                content.last_merge = Some(options);
                json(200, &content.merge_requests[index])
            }

            _ => not_found("Route"),
        }
    }
}

fn new_commit(id: u64, author: &str, message: &str, parent: Option<String>) -> GitLabCommit {
    let sha = format!("{id:040x}");
    GitLabCommit {
        short_id: sha[..8].to_string(),
        title: message.lines().next().unwrap_or_default().to_string(),
        message: message.to_string(),
        author_name: author.to_string(),
        author_email: None,
        created_at: chrono::Utc::now(),
        web_url: format!("https://gitlab.com/-/commit/{sha}"),
        parent_ids: parent.into_iter().collect(),
        id: sha,
    }
}

fn branch_json(name: &str, branch: &BranchState, default: Option<&str>) -> GitLabBranch {
    GitLabBranch {
        name: name.to_string(),
        commit: GitLabBranchCommit {
            id: branch.head.clone(),
        },
        protected: false,
        default: default == Some(name),
        web_url: None,
    }
}

/// Tree entries under `path`, directories included, as GitLab lists them.
fn tree_nodes(files: &BTreeMap<String, String>, path: &str, recursive: bool) -> Vec<GitLabTreeNode> {
    let prefix = if path.is_empty() {
        String::new()
    } else {
        format!("{path}/")
    };
    let mut dirs = BTreeSet::new();
    let mut blobs = Vec::new();
    for (file_path, body) in files {
        let Some(rest) = file_path.strip_prefix(&prefix) else {
            continue;
        };
        let parts: Vec<&str> = rest.split('/').collect();
        let depth = if recursive { parts.len() - 1 } else { 1.min(parts.len() - 1) };
        for end in 1..=depth {
            dirs.insert(format!("{prefix}{}", parts[..end].join("/")));
        }
        if recursive || parts.len() == 1 {
            blobs.push(GitLabTreeNode {
                id: format!("{:040x}", body.len() + 1),
                name: parts[parts.len() - 1].to_string(),
                kind: "blob".to_string(),
                path: file_path.clone(),
                mode: "100644".to_string(),
            });
        }
    }
    let mut nodes: Vec<GitLabTreeNode> = dirs
        .into_iter()
        .map(|dir| GitLabTreeNode {
            id: format!("{:040x}", dir.len()),
            name: dir.rsplit('/').next().unwrap_or(&dir).to_string(),
            kind: "tree".to_string(),
            path: dir,
            mode: "040000".to_string(),
        })
        .collect();
    nodes.extend(blobs);
    nodes
}

fn create_commit(state: &mut State, project: &str, options: &CreateCommitOptions) -> HttpResponse {
    let id = state.next_id();
    let author = state.username();
    let Some(content) = state.content(project) else {
        return not_found("Project");
    };
    let current = content.branches.get(&options.branch).cloned();
    let mut files = current.as_ref().map(|b| b.files.clone()).unwrap_or_default();
    for action in &options.actions {
        let path = action.file_path.clone();
        let exists = files.contains_key(&path);
        match action.action {
            CommitActionKind::Create if exists => {
                return message(400, "A file with this name already exists");
            }
            CommitActionKind::Update | CommitActionKind::Delete if !exists => {
                return message(400, "A file with this name doesn't exist");
            }
            CommitActionKind::Create | CommitActionKind::Update => {
                files.insert(path, action.content.clone().unwrap_or_default());
            }
            CommitActionKind::Delete => {
                files.remove(&path);
            }
        }
    }

    let commit = new_commit(id, &author, &options.commit_message, current.map(|b| b.head));
    content.branches.insert(
        options.branch.clone(),
        BranchState {
            head: commit.id.clone(),
            files,
        },
    );
    content.commits.push((options.branch.clone(), commit.clone()));
    content.last_commit = Some(options.clone());
    json(201, &commit)
}

fn new_project(state: &State, id: u64, namespace: &str, path: &str) -> GitLabProject {
    let (namespace_id, kind) = match state.group(namespace) {
        Some(group) => (group.id, "group"),
        None => (state.user.as_ref().map(|u| u.id).unwrap_or(1), "user"),
    };
    let full_path = format!("{namespace}/{path}");
    GitLabProject {
        id,
        name: path.to_string(),
        path: path.to_string(),
        path_with_namespace: full_path.clone(),
        description: None,
        default_branch: Some("main".to_string()),
        visibility: RepositoryVisibility::Private,
        namespace: GitLabNamespace {
            id: namespace_id,
            name: namespace.to_string(),
            path: namespace.rsplit('/').next().unwrap_or(namespace).to_string(),
            full_path: namespace.to_string(),
            kind: kind.to_string(),
        },
        web_url: format!("https://gitlab.com/{full_path}"),
        ssh_url_to_repo: Some(format!("git@gitlab.com:{full_path}.git")),
        http_url_to_repo: Some(format!("https://gitlab.com/{full_path}.git")),
        archived: false,
        created_at: None,
        last_activity_at: None,
        shared_with_groups: Vec::new(),
    }
}

fn create_project(state: &mut State, options: &CreateProjectOptions) -> HttpResponse {
    let namespace = match options.namespace_id {
        Some(id) => match state.group(&id.to_string()) {
            Some(group) => group.full_path.clone(),
            None => return not_found("Namespace"),
        },
        None => match &state.user {
            Some(user) => user.username.clone(),
            None => return message(401, "401 Unauthorized"),
        },
    };
    if state
        .project_index(&format!("{namespace}/{}", options.path))
        .is_some()
    {
        return json(
            400,
            &serde_json::json!({
                "message": { "name": ["has already been taken"], "path": ["has already been taken"] }
            }),
        );
    }

    let id = state.next_id();
    let mut project = new_project(state, id, &namespace, &options.path);
    project.name = options.name.clone();
    project.description = options.description.clone().filter(|d| !d.is_empty());
    if let Some(branch) = &options.default_branch {
        project.default_branch = Some(branch.clone());
    }
    if let Some(visibility) = options.visibility {
        project.visibility = visibility;
    }
    state.projects.push(project.clone());
    json(201, &project)
}

fn share_project(state: &mut State, project: &str, options: &ShareWithGroupOptions) -> HttpResponse {
    let Some(group) = state.group(&options.group_id.to_string()).cloned() else {
        return not_found("Group");
    };
    let Some(i) = state.project_index(project) else {
        return not_found("Project");
    };
    let shares = &mut state.projects[i].shared_with_groups;
    if shares.iter().any(|s| s.group_id == group.id) {
        return message(409, "The project has already been shared with this group");
    }
    shares.push(GitLabSharedGroup {
        group_id: group.id,
        group_name: group.name.clone(),
        group_full_path: group.full_path.clone(),
        group_access_level: options.group_access,
        expires_at: None,
    });
    json(
        201,
        &serde_json::json!({
            "id": state.next_id(),
            "project_id": state.projects[i].id,
            "group_id": group.id,
            "group_access": options.group_access,
        }),
    )
}

#[async_trait]
impl HttpTransport for FakeGitLab {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        Ok(self.handle(&request))
    }
}
