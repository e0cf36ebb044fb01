use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use thiserror::Error;
use tracing::debug;

use crate::{
    config::{Config, ConfigError},
    domain::{Deployment, DeploymentState, DeploymentTarget, PERSONAL_TEAM_ID},
    events::FetcherEvent,
    fetcher::Fetcher,
    state::FetchState,
    storage::{CredentialProvider, SettingsError, SettingsStore},
    vercel::{FetcherError, VercelClient},
};

pub const APP_NAME: &str = "zeitgeist";

#[derive(Debug, Parser)]
#[command(name = APP_NAME, version, about = "Keep an eye on Vercel deployments")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll continuously and print deployment changes for the selected team
    Watch,
    /// Run one refresh cycle and print the selected team's deployments
    Refresh {
        /// Refresh only this team instead of running a full cycle
        #[arg(long)]
        team: Option<String>,
    },
    /// Store a Vercel access token
    Login { token: String },
    /// Forget the stored token
    Logout,
    /// Show the selected team, or select one by id ("-1" for Personal)
    Team { team_id: Option<String> },
    /// List the teams visible to the token
    Teams,
    /// List the aliases assigned to a deployment
    Aliases { deployment_id: String },
}

pub fn run(cli: Cli, config: &Config) -> Result<(), AppError> {
    let settings = Arc::new(open_settings(config)?);

    match cli.command {
        Command::Login { token } => {
            settings.set_token(Some(token))?;
            println!("Token saved to {}", settings.path().display());
        }
        Command::Logout => {
            settings.set_token(None)?;
            println!("Signed out.");
        }
        Command::Team {
            team_id: Some(team_id),
        } => {
            let stored = (team_id != PERSONAL_TEAM_ID).then_some(team_id);
            settings.set_current_team(stored)?;
            println!(
                "Selected team: {}",
                settings.current_team_id().as_deref().unwrap_or("Personal")
            );
        }
        Command::Team { team_id: None } => {
            println!(
                "Selected team: {}",
                settings.current_team_id().as_deref().unwrap_or("Personal")
            );
        }
        Command::Watch => watch(&connect(config, settings)?, config),
        Command::Refresh { team } => refresh(&connect(config, settings)?, team.as_deref()),
        Command::Teams => list_teams(&connect(config, settings)?),
        Command::Aliases { deployment_id } => {
            list_aliases(&connect(config, settings)?, &deployment_id)?
        }
    }
    Ok(())
}

fn open_settings(config: &Config) -> Result<SettingsStore, SettingsError> {
    let store = match &config.settings_path {
        Some(path) => SettingsStore::open(path)?,
        None => SettingsStore::initialize()?,
    };
    Ok(store.with_overrides(config.token.clone(), config.team_id.clone()))
}

fn connect(config: &Config, settings: Arc<SettingsStore>) -> Result<Fetcher, AppError> {
    if settings.token().is_none() {
        return Err(AppError::NotSignedIn);
    }
    let credentials: Arc<dyn CredentialProvider> = settings;
    let client = VercelClient::new(config, Arc::clone(&credentials))?;
    Ok(Fetcher::new(client, credentials))
}

fn watch(fetcher: &Fetcher, config: &Config) {
    let events = fetcher.subscribe();
    fetcher.start_polling(config.poll_interval);

    let mut board = DeploymentBoard::default();
    for event in events {
        match event {
            FetcherEvent::DeploymentsChanged {
                team_id,
                deployments,
            } if team_id == fetcher.current_team().id => {
                if let Some(lines) = board.changes(&deployments, Utc::now()) {
                    let team = fetcher.current_team();
                    println!("-- {} ({} deployments)", team.name, deployments.len());
                    for line in lines {
                        println!("{line}");
                    }
                }
            }
            FetcherEvent::FetchStateChanged(FetchState::Error) => {
                eprintln!("Refresh failed; showing the last known deployments.");
            }
            other => debug!(?other, "ignoring event"),
        }
    }
}

fn refresh(fetcher: &Fetcher, team_id: Option<&str>) {
    let (label, deployments, projects) = match team_id {
        Some(team_id) => {
            fetcher.refresh_team(team_id);
            (
                team_id.to_owned(),
                fetcher.deployments(team_id),
                fetcher.projects(team_id),
            )
        }
        None => {
            fetcher.tick();
            let team = fetcher.current_team();
            (
                team.name,
                fetcher.deployments(&team.id),
                fetcher.projects(&team.id),
            )
        }
    };
    let state = fetcher.fetch_state();
    debug!(state = state.label(), "refresh finished");
    if state == FetchState::Error {
        eprintln!("Some deployments could not be refreshed.");
    }

    println!(
        "{label} ({} deployments across {} projects)",
        deployments.len(),
        projects.len()
    );
    if deployments.is_empty() {
        println!("No deployments found.");
    }
    let now = Utc::now();
    for deployment in deployments.iter() {
        println!("{}", format_deployment(deployment, now));
        if let Some(url) = deployment.commit.as_ref().and_then(|commit| commit.url()) {
            println!("         {url}");
        }
    }
}

fn list_teams(fetcher: &Fetcher) {
    fetcher.tick();
    if let Some(user) = fetcher.user() {
        println!("Signed in as {} <{}>", user.name, user.email);
    }
    let current = fetcher.current_team();
    for team in fetcher.teams() {
        let marker = if team.id == current.id { "*" } else { " " };
        println!("{marker} {:<24} {}", team.id, team.name);
    }
}

fn list_aliases(fetcher: &Fetcher, deployment_id: &str) -> Result<(), AppError> {
    let aliases = fetcher.load_aliases(deployment_id)?;
    if aliases.is_empty() {
        println!("No aliases assigned to {deployment_id}.");
    }
    for alias in aliases {
        println!("https://{}", alias.alias);
    }
    Ok(())
}

// -----------------------------------------------------------------------------
// Rendering
// -----------------------------------------------------------------------------

/// Remembers what was last printed so watch mode only reprints on change.
#[derive(Default)]
struct DeploymentBoard {
    last_seen: HashMap<String, DeploymentState>,
    initialized: bool,
}

impl DeploymentBoard {
    fn changes(&mut self, deployments: &[Deployment], now: DateTime<Utc>) -> Option<Vec<String>> {
        let snapshot: HashMap<String, DeploymentState> = deployments
            .iter()
            .map(|deployment| (deployment.id.clone(), deployment.state))
            .collect();
        if self.initialized && snapshot == self.last_seen {
            return None;
        }
        self.initialized = true;
        self.last_seen = snapshot;
        Some(
            deployments
                .iter()
                .map(|deployment| format_deployment(deployment, now))
                .collect(),
        )
    }
}

fn format_deployment(deployment: &Deployment, now: DateTime<Utc>) -> String {
    let summary = deployment
        .commit
        .as_ref()
        .and_then(|commit| commit.message.as_deref())
        .and_then(|message| message.lines().next())
        .unwrap_or("Manual deployment");
    let target = match deployment.target {
        DeploymentTarget::Production => " [prod]",
        DeploymentTarget::Preview => "",
    };
    format!(
        "{:<8} {:<20} {}{} ({}) {}",
        deployment.state.label(),
        deployment.project,
        summary,
        target,
        relative_age(deployment.created_at, now),
        deployment.absolute_url()
    )
}

fn relative_age(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(created_at);
    if elapsed.num_minutes() < 1 {
        "just now".to_owned()
    } else if elapsed.num_hours() < 1 {
        format!("{}m ago", elapsed.num_minutes())
    } else if elapsed.num_days() < 1 {
        format!("{}h ago", elapsed.num_hours())
    } else {
        format!("{}d ago", elapsed.num_days())
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Fetcher(#[from] FetcherError),
    #[error("No Vercel token; run `zeitgeist login <token>` or set ZEITGEIST_TOKEN")]
    NotSignedIn,
}
