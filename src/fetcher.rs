use std::{
    sync::{
        Arc, Mutex, PoisonError, RwLock,
        atomic::{AtomicU64, Ordering},
        mpsc::Receiver,
    },
    thread,
    time::Duration,
};

use tracing::{debug, info, warn};

use crate::{
    domain::{Alias, Deployment, Project, Team, User, with_personal_team},
    events::{FetcherEvent, Subscribers},
    poller::Poller,
    state::{FetchState, FetchStateTracker},
    storage::CredentialProvider,
    store::TeamStore,
    vercel::{FetcherError, Route, VercelClient},
};

/// Owns everything the poll cycle produces and the poller that drives it.
pub struct Fetcher {
    // Declared first so the worker is joined before the shared state goes away.
    poller: Mutex<Poller>,
    inner: Arc<Inner>,
}

struct Inner {
    client: VercelClient,
    credentials: Arc<dyn CredentialProvider>,
    user: RwLock<Option<User>>,
    teams: RwLock<Vec<Team>>,
    deployments: TeamStore<Deployment>,
    projects: TeamStore<Project>,
    fetch_state: FetchStateTracker,
    subscribers: Subscribers,
    // Bumped on every polling (re)start; completions tagged with an older
    // value are dropped instead of overwriting fresher data.
    generation: AtomicU64,
}

impl Fetcher {
    pub fn new(client: VercelClient, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            poller: Mutex::new(Poller::new()),
            inner: Arc::new(Inner {
                client,
                credentials,
                user: RwLock::new(None),
                teams: RwLock::new(vec![Team::personal()]),
                deployments: TeamStore::new(),
                projects: TeamStore::new(),
                fetch_state: FetchStateTracker::new(),
                subscribers: Subscribers::new(),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn subscribe(&self) -> Receiver<FetcherEvent> {
        self.inner.subscribers.subscribe()
    }

    pub fn start_polling(&self, interval: Duration) {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let weak = Arc::downgrade(&self.inner);
        info!(generation, interval_secs = interval.as_secs(), "starting polling");
        self.poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .start(interval, move || {
                if let Some(inner) = weak.upgrade() {
                    inner.run_cycle(generation);
                }
            });
    }

    pub fn stop_polling(&self) {
        self.poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stop();
        info!("stopped polling");
    }

    pub fn is_polling(&self) -> bool {
        self.poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_running()
    }

    /// Runs one full poll cycle on the calling thread.
    pub fn tick(&self) {
        self.inner.run_cycle(self.inner.current_generation());
    }

    /// Refreshes deployments and projects for a single team.
    pub fn refresh_team(&self, team_id: &str) {
        if self.inner.credentials.token().is_none() {
            debug!(team_id, "awaiting authentication token; skipping team refresh");
            return;
        }
        let generation = self.inner.current_generation();
        self.inner
            .load_team_collections(generation, &[team_id.to_owned()]);
    }

    pub fn load_aliases(&self, deployment_id: &str) -> Result<Vec<Alias>, FetcherError> {
        self.inner.client.fetch_aliases(deployment_id)
    }

    pub fn user(&self) -> Option<User> {
        self.inner
            .user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn teams(&self) -> Vec<Team> {
        self.inner.teams()
    }

    pub fn deployments(&self, team_id: &str) -> Arc<Vec<Deployment>> {
        self.inner.deployments.get(team_id)
    }

    pub fn projects(&self, team_id: &str) -> Arc<Vec<Project>> {
        self.inner.projects.get(team_id)
    }

    pub fn fetch_state(&self) -> FetchState {
        self.inner.fetch_state.current()
    }

    /// The selected team, or Personal when nothing (or an unknown team) is
    /// selected.
    pub fn current_team(&self) -> Team {
        let selected = self.inner.credentials.current_team_id();
        self.teams()
            .into_iter()
            .find(|team| Some(&team.id) == selected.as_ref())
            .unwrap_or_else(Team::personal)
    }

    pub fn current_deployments(&self) -> Arc<Vec<Deployment>> {
        self.deployments(&self.current_team().id)
    }
}

impl Inner {
    fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn ensure_current(&self, generation: u64, route: Route) -> Result<(), FetcherError> {
        if self.current_generation() == generation {
            Ok(())
        } else {
            Err(FetcherError::Updating { route })
        }
    }

    fn teams(&self) -> Vec<Team> {
        self.teams
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn run_cycle(&self, generation: u64) {
        if self.credentials.token().is_none() {
            debug!("awaiting authentication token; skipping poll cycle");
            return;
        }

        debug!(generation, "starting poll cycle");
        self.load_user(generation);
        let team_ids: Vec<String> = self
            .load_teams(generation)
            .into_iter()
            .map(|team| team.id)
            .collect();
        self.load_team_collections(generation, &team_ids);
    }

    fn load_user(&self, generation: u64) {
        let result = self.client.fetch_user().and_then(|user| {
            self.ensure_current(generation, Route::User)?;
            Ok(user)
        });
        match result {
            Ok(user) => {
                *self.user.write().unwrap_or_else(PoisonError::into_inner) = Some(user.clone());
                self.subscribers.publish(FetcherEvent::UserChanged(user));
            }
            Err(error) => report(&error, None),
        }
    }

    /// Returns the team list the rest of the cycle should use: the fresh one,
    /// or the last known one when the fetch failed.
    fn load_teams(&self, generation: u64) -> Vec<Team> {
        let result = self.client.fetch_teams().and_then(|teams| {
            self.ensure_current(generation, Route::Teams)?;
            Ok(with_personal_team(teams))
        });
        match result {
            Ok(teams) => {
                *self.teams.write().unwrap_or_else(PoisonError::into_inner) = teams.clone();
                self.subscribers
                    .publish(FetcherEvent::TeamsChanged(teams.clone()));
                teams
            }
            Err(error) => {
                report(&error, None);
                self.teams()
            }
        }
    }

    fn load_team_collections(&self, generation: u64, team_ids: &[String]) {
        if self.ensure_current(generation, Route::Deployments).is_err() {
            debug!(generation, "poll cycle superseded before per-team fetches");
            return;
        }
        let state = self.fetch_state.begin(!self.deployments.is_empty());
        self.subscribers
            .publish(FetcherEvent::FetchStateChanged(state));

        let all_succeeded = thread::scope(|scope| {
            let deployment_jobs: Vec<_> = team_ids
                .iter()
                .map(|team_id| scope.spawn(move || self.load_deployments(generation, team_id)))
                .collect();
            let project_jobs: Vec<_> = team_ids
                .iter()
                .map(|team_id| scope.spawn(move || self.load_projects(generation, team_id)))
                .collect();

            for job in project_jobs {
                if job.join().is_err() {
                    warn!("projects fetch worker panicked");
                }
            }
            deployment_jobs
                .into_iter()
                .fold(true, |all, job| job.join().unwrap_or(false) && all)
        });

        if self.ensure_current(generation, Route::Deployments).is_err() {
            debug!(generation, "poll cycle superseded; fetch state left as is");
            return;
        }
        let state = self.fetch_state.complete(all_succeeded);
        self.subscribers
            .publish(FetcherEvent::FetchStateChanged(state));
    }

    fn load_deployments(&self, generation: u64, team_id: &str) -> bool {
        self.load_collection(
            generation,
            team_id,
            Route::Deployments,
            self.client.fetch_deployments(team_id),
            &self.deployments,
            |team_id, deployments| FetcherEvent::DeploymentsChanged {
                team_id,
                deployments,
            },
        )
    }

    fn load_projects(&self, generation: u64, team_id: &str) -> bool {
        self.load_collection(
            generation,
            team_id,
            Route::Projects,
            self.client.fetch_projects(team_id),
            &self.projects,
            |team_id, projects| FetcherEvent::ProjectsChanged { team_id, projects },
        )
    }

    /// Stores a completed per-team fetch. Returns false only for a real
    /// failure; superseded results are dropped but do not count as one.
    fn load_collection<T>(
        &self,
        generation: u64,
        team_id: &str,
        route: Route,
        fetched: Result<Vec<T>, FetcherError>,
        store: &TeamStore<T>,
        event: impl FnOnce(String, Arc<Vec<T>>) -> FetcherEvent,
    ) -> bool {
        let result = fetched.and_then(|entities| {
            self.ensure_current(generation, route)?;
            Ok(entities)
        });
        match result {
            Ok(entities) => {
                let entities = store.update(team_id, entities);
                self.subscribers
                    .publish(event(team_id.to_owned(), entities));
                true
            }
            Err(error @ FetcherError::Updating { .. }) => {
                report(&error, Some(team_id));
                true
            }
            Err(error) => {
                report(&error, Some(team_id));
                false
            }
        }
    }
}

fn report(error: &FetcherError, team_id: Option<&str>) {
    match error {
        FetcherError::Updating { .. } => debug!(%error, team_id, "discarding stale result"),
        _ => warn!(%error, team_id, "fetch failed; keeping previous data"),
    }
}
