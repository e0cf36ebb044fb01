use std::sync::{
    Arc, Mutex, PoisonError,
    mpsc::{self, Receiver, Sender},
};

use crate::{
    domain::{Deployment, Project, Team, User},
    state::FetchState,
};

/// Change notifications pushed to every subscriber. Emitted on every
/// mutation, including replacements with identical data.
#[derive(Clone, Debug)]
pub enum FetcherEvent {
    UserChanged(User),
    TeamsChanged(Vec<Team>),
    DeploymentsChanged {
        team_id: String,
        deployments: Arc<Vec<Deployment>>,
    },
    ProjectsChanged {
        team_id: String,
        projects: Arc<Vec<Project>>,
    },
    FetchStateChanged(FetchState),
}

#[derive(Default)]
pub struct Subscribers {
    senders: Mutex<Vec<Sender<FetcherEvent>>>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<FetcherEvent> {
        let (tx, rx) = mpsc::channel();
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Delivers to every live subscriber and forgets those whose receiver
    /// has been dropped.
    pub fn publish(&self, event: FetcherEvent) {
        let mut senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        senders.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn len(&self) -> usize {
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_subscriber_receives_each_event() {
        let subscribers = Subscribers::new();
        let first = subscribers.subscribe();
        let second = subscribers.subscribe();

        subscribers.publish(FetcherEvent::FetchStateChanged(FetchState::Loading));
        subscribers.publish(FetcherEvent::FetchStateChanged(FetchState::Loading));

        for rx in [first, second] {
            let received: Vec<_> = rx.try_iter().collect();
            assert_eq!(received.len(), 2);
            assert!(matches!(
                received[0],
                FetcherEvent::FetchStateChanged(FetchState::Loading)
            ));
        }
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let subscribers = Subscribers::new();
        let kept = subscribers.subscribe();
        drop(subscribers.subscribe());
        assert_eq!(subscribers.len(), 2);

        subscribers.publish(FetcherEvent::TeamsChanged(vec![Team::personal()]));
        assert_eq!(subscribers.len(), 1);
        assert!(matches!(
            kept.try_recv(),
            Ok(FetcherEvent::TeamsChanged(teams)) if teams.len() == 1
        ));
    }
}
