use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use serde::{Deserialize, de::DeserializeOwned};
use thiserror::Error;

use crate::{
    config::Config,
    domain::{
        Alias, CommitInfo, Creator, Deployment, DeploymentState, DeploymentTarget,
        PERSONAL_TEAM_ID, Project, Team, User,
    },
    storage::CredentialProvider,
};

pub const DEPLOYMENT_LIMIT: u32 = 100;
const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    Teams,
    Deployments,
    Projects,
    User,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Teams => "v1/teams",
            Route::Deployments => "v6/now/deployments",
            Route::Projects => "v6/projects",
            Route::User => "www/user",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Route::Teams => "teams",
            Route::Deployments => "deployments",
            Route::Projects => "projects",
            Route::User => "user",
        };
        f.write_str(name)
    }
}

/// Maps the personal scope onto the empty `teamId` the API expects.
pub fn team_query_value(team_id: &str) -> &str {
    if team_id == PERSONAL_TEAM_ID {
        ""
    } else {
        team_id
    }
}

// Transport -----------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(&'static str, String)>,
}

impl ApiRequest {
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

pub trait HttpTransport: Send + Sync {
    fn get(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError>;
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, FetcherError> {
        let client = Client::builder().build().map_err(FetcherError::Client)?;
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn get(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let mut builder = self.client.get(&request.url).query(&request.query);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }
        let response = builder.send()?;
        let status = response.status().as_u16();
        let body = response.bytes()?.to_vec();
        Ok(ApiResponse { status, body })
    }
}

// Client --------------------------------------------------------------------

/// Stateless Vercel API client. Every call reads the current token from the
/// credential provider, so a token change affects only later requests.
pub struct VercelClient {
    transport: Arc<dyn HttpTransport>,
    credentials: Arc<dyn CredentialProvider>,
    base_url: String,
    user_agent: String,
}

impl VercelClient {
    pub fn new(
        config: &Config,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, FetcherError> {
        let transport = ReqwestTransport::new()?;
        Ok(Self::with_transport(
            &config.api_base_url,
            &config.client_id,
            Arc::new(transport),
            credentials,
        ))
    }

    pub fn with_transport(
        base_url: &str,
        client_id: &str,
        transport: Arc<dyn HttpTransport>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            transport,
            credentials,
            base_url: base_url.trim_end_matches('/').to_owned(),
            user_agent: format!("{client_id} {CLIENT_VERSION}"),
        }
    }

    pub fn headers(&self) -> Vec<(&'static str, String)> {
        // An absent token still goes out; the API decides what is unauthorized.
        let token = self.credentials.token().unwrap_or_default();
        vec![
            ("Authorization", format!("Bearer {token}")),
            ("Content-Type", "application/json".to_owned()),
            ("User-Agent", self.user_agent.clone()),
        ]
    }

    fn request(&self, route: Route, suffix: &str, query: Vec<(String, String)>) -> ApiRequest {
        ApiRequest {
            url: format!("{}/{}{suffix}", self.base_url, route.path()),
            query,
            headers: self.headers(),
        }
    }

    pub fn fetch<T: DeserializeOwned>(
        &self,
        route: Route,
        suffix: &str,
        query: Vec<(String, String)>,
    ) -> Result<T, FetcherError> {
        let request = self.request(route, suffix, query);
        let response = self
            .transport
            .get(&request)
            .map_err(|source| FetcherError::Fetching { route, source })?;

        if !(200..300).contains(&response.status) {
            return Err(FetcherError::Fetching {
                route,
                source: TransportError::Status(response.status),
            });
        }

        serde_json::from_slice(&response.body)
            .map_err(|source| FetcherError::Decoding { route, source })
    }

    pub fn fetch_user(&self) -> Result<User, FetcherError> {
        let envelope: UserEnvelope = self.fetch(Route::User, "", Vec::new())?;
        Ok(envelope.user.into())
    }

    /// Teams as the server returns them; the Personal scope is not included.
    pub fn fetch_teams(&self) -> Result<Vec<Team>, FetcherError> {
        let envelope: TeamsEnvelope = self.fetch(Route::Teams, "", Vec::new())?;
        Ok(envelope.teams.into_iter().map(Team::from).collect())
    }

    pub fn fetch_team_collection<C: TeamCollection>(
        &self,
        team_id: &str,
    ) -> Result<Vec<C::Item>, FetcherError> {
        let mut query = vec![("teamId".to_owned(), team_query_value(team_id).to_owned())];
        query.extend(C::extra_query());
        let envelope: C = self.fetch(C::ROUTE, "", query)?;
        Ok(envelope.into_items())
    }

    pub fn fetch_deployments(&self, team_id: &str) -> Result<Vec<Deployment>, FetcherError> {
        self.fetch_team_collection::<DeploymentsEnvelope>(team_id)
    }

    pub fn fetch_projects(&self, team_id: &str) -> Result<Vec<Project>, FetcherError> {
        self.fetch_team_collection::<ProjectsEnvelope>(team_id)
    }

    pub fn fetch_aliases(&self, deployment_id: &str) -> Result<Vec<Alias>, FetcherError> {
        let suffix = format!("/{deployment_id}/aliases");
        let envelope: AliasesEnvelope = self.fetch(Route::Deployments, &suffix, Vec::new())?;
        Ok(envelope.aliases.into_iter().map(Alias::from).collect())
    }
}

/// A per-team list envelope: which route serves it and how its items map
/// into domain values.
pub trait TeamCollection: DeserializeOwned {
    type Item;
    const ROUTE: Route;

    fn extra_query() -> Vec<(String, String)> {
        Vec::new()
    }

    fn into_items(self) -> Vec<Self::Item>;
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server responded with status {0}")]
    Status(u16),
}

#[derive(Error, Debug)]
pub enum FetcherError {
    #[error("failed to decode {route} response: {source}")]
    Decoding {
        route: Route,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to fetch {route}: {source}")]
    Fetching {
        route: Route,
        #[source]
        source: TransportError,
    },
    #[error("{route} result belongs to a superseded polling session")]
    Updating { route: Route },
    #[error("failed to build HTTP client: {0}")]
    Client(reqwest::Error),
}

// Response payloads ---------------------------------------------------------

#[derive(Debug, Deserialize)]
struct UserEnvelope {
    user: UserPayload,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    uid: String,
    #[serde(default)]
    name: Option<String>,
    email: String,
    #[serde(default)]
    avatar: Option<String>,
}

impl From<UserPayload> for User {
    fn from(payload: UserPayload) -> Self {
        User {
            id: payload.uid,
            name: payload.name.unwrap_or_default(),
            email: payload.email,
            avatar: payload.avatar,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TeamsEnvelope {
    #[serde(default)]
    teams: Vec<TeamPayload>,
}

#[derive(Debug, Deserialize)]
struct TeamPayload {
    id: String,
    name: String,
    #[serde(default)]
    avatar: Option<String>,
}

impl From<TeamPayload> for Team {
    fn from(payload: TeamPayload) -> Self {
        Team {
            id: payload.id,
            name: payload.name,
            avatar: payload.avatar,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DeploymentsEnvelope {
    #[serde(default)]
    deployments: Vec<DeploymentPayload>,
}

impl TeamCollection for DeploymentsEnvelope {
    type Item = Deployment;
    const ROUTE: Route = Route::Deployments;

    fn extra_query() -> Vec<(String, String)> {
        vec![("limit".to_owned(), DEPLOYMENT_LIMIT.to_string())]
    }

    fn into_items(self) -> Vec<Deployment> {
        self.deployments.into_iter().map(Deployment::from).collect()
    }
}

#[derive(Debug, Deserialize)]
struct DeploymentPayload {
    uid: String,
    name: String,
    url: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    created: DateTime<Utc>,
    state: DeploymentState,
    creator: CreatorPayload,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    meta: MetaPayload,
}

#[derive(Debug, Deserialize)]
struct CreatorPayload {
    uid: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    username: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetaPayload {
    github_commit_sha: Option<String>,
    github_commit_message: Option<String>,
    github_commit_ref: Option<String>,
    #[serde(alias = "githubOrg")]
    github_commit_org: Option<String>,
    github_commit_repo: Option<String>,
    github_commit_author_login: Option<String>,
    github_commit_author_name: Option<String>,
}

impl MetaPayload {
    fn into_commit(self) -> Option<CommitInfo> {
        let sha = self.github_commit_sha?;
        Some(CommitInfo {
            sha,
            message: self.github_commit_message,
            git_ref: self.github_commit_ref,
            org: self.github_commit_org,
            repo: self.github_commit_repo,
            author_login: self.github_commit_author_login,
            author_name: self.github_commit_author_name,
        })
    }
}

impl From<DeploymentPayload> for Deployment {
    fn from(payload: DeploymentPayload) -> Self {
        Deployment {
            id: payload.uid,
            project: payload.name,
            created_at: payload.created,
            state: payload.state,
            url: payload.url,
            creator: Creator {
                id: payload.creator.uid,
                email: payload.creator.email,
                username: payload.creator.username,
            },
            target: DeploymentTarget::from_wire(payload.target.as_deref()),
            commit: payload.meta.into_commit(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ProjectsEnvelope {
    #[serde(default)]
    projects: Vec<ProjectPayload>,
}

impl TeamCollection for ProjectsEnvelope {
    type Item = Project;
    const ROUTE: Route = Route::Projects;

    fn into_items(self) -> Vec<Project> {
        self.projects
            .into_iter()
            .map(|project| Project {
                id: project.id,
                name: project.name,
                framework: project.framework,
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct ProjectPayload {
    id: String,
    name: String,
    #[serde(default)]
    framework: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AliasesEnvelope {
    #[serde(default)]
    aliases: Vec<AliasPayload>,
}

#[derive(Debug, Deserialize)]
struct AliasPayload {
    uid: String,
    alias: String,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    created: Option<DateTime<Utc>>,
}

impl From<AliasPayload> for Alias {
    fn from(payload: AliasPayload) -> Self {
        Alias {
            id: payload.uid,
            alias: payload.alias,
            created_at: payload.created,
        }
    }
}

// -------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------
