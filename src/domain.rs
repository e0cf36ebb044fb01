use chrono::{DateTime, Utc};
use serde::Deserialize;

// Domain data structures shared across modules.

/// Team id standing in for the personal (non-team) account scope.
pub const PERSONAL_TEAM_ID: &str = "-1";
const PERSONAL_TEAM_NAME: &str = "Personal";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub avatar: Option<String>,
}

impl Team {
    pub fn personal() -> Self {
        Self {
            id: PERSONAL_TEAM_ID.to_owned(),
            name: PERSONAL_TEAM_NAME.to_owned(),
            avatar: None,
        }
    }

    pub fn is_personal(&self) -> bool {
        self.id == PERSONAL_TEAM_ID
    }
}

/// Prepends the synthetic Personal team, dropping any server entry that
/// collides with its id so exactly one personal scope exists.
pub fn with_personal_team(teams: Vec<Team>) -> Vec<Team> {
    let mut merged = Vec::with_capacity(teams.len() + 1);
    merged.push(Team::personal());
    merged.extend(teams.into_iter().filter(|team| !team.is_personal()));
    merged
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentState {
    Ready,
    Queued,
    Error,
    Building,
    Normal,
    Offline,
}

impl DeploymentState {
    pub fn label(&self) -> &'static str {
        match self {
            DeploymentState::Ready => "Ready",
            DeploymentState::Queued => "Queued",
            DeploymentState::Error => "Error",
            DeploymentState::Building => "Building",
            DeploymentState::Normal => "Normal",
            DeploymentState::Offline => "Offline",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeploymentTarget {
    Production,
    Preview,
}

impl DeploymentTarget {
    pub fn from_wire(raw: Option<&str>) -> Self {
        match raw {
            Some("production") => DeploymentTarget::Production,
            _ => DeploymentTarget::Preview,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Creator {
    pub id: String,
    pub email: String,
    pub username: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitInfo {
    pub sha: String,
    pub message: Option<String>,
    pub git_ref: Option<String>,
    pub org: Option<String>,
    pub repo: Option<String>,
    pub author_login: Option<String>,
    pub author_name: Option<String>,
}

impl CommitInfo {
    pub fn short_sha(&self) -> &str {
        self.sha.get(..7).unwrap_or(&self.sha)
    }

    pub fn url(&self) -> Option<String> {
        let org = self.org.as_deref()?;
        let repo = self.repo.as_deref()?;
        Some(format!("https://github.com/{org}/{repo}/commit/{}", self.sha))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Deployment {
    pub id: String,
    pub project: String,
    pub created_at: DateTime<Utc>,
    pub state: DeploymentState,
    pub url: String,
    pub creator: Creator,
    pub target: DeploymentTarget,
    pub commit: Option<CommitInfo>,
}

impl Deployment {
    pub fn absolute_url(&self) -> String {
        format!("https://{}", self.url)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub framework: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Alias {
    pub id: String,
    pub alias: String,
    pub created_at: Option<DateTime<Utc>>,
}
