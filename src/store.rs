use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

/// Latest successfully fetched collection per team.
///
/// Entries are only ever replaced whole. A failed fetch never reaches the
/// store, so whatever a team held before stays available.
pub struct TeamStore<T> {
    entries: RwLock<HashMap<String, Arc<Vec<T>>>>,
}

impl<T> TeamStore<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn update(&self, team_id: &str, entities: Vec<T>) -> Arc<Vec<T>> {
        let entities = Arc::new(entities);
        // Poisoning can only interrupt a single insert, which leaves the map intact.
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(team_id.to_owned(), Arc::clone(&entities));
        entities
    }

    pub fn get(&self, team_id: &str) -> Arc<Vec<T>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(team_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn contains(&self, team_id: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(team_id)
    }

    pub fn team_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub fn total_len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|entities| entities.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_len() == 0
    }
}

impl<T> Default for TeamStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn unknown_team_reads_empty() {
        let store: TeamStore<u32> = TeamStore::new();
        assert!(store.get("t1").is_empty());
        assert!(!store.contains("t1"));
        assert!(store.is_empty());
    }

    #[test]
    fn update_replaces_instead_of_merging() {
        let store = TeamStore::new();
        store.update("t1", vec![1, 2, 3]);
        store.update("t1", vec![4]);
        assert_eq!(*store.get("t1"), vec![4]);
        assert_eq!(store.total_len(), 1);
    }

    #[test]
    fn empty_update_is_still_recorded() {
        let store: TeamStore<u32> = TeamStore::new();
        store.update("t1", Vec::new());
        assert!(store.contains("t1"));
        assert!(store.is_empty());
    }

    #[test]
    fn teams_are_isolated() {
        let store = TeamStore::new();
        store.update("t1", vec!["a"]);
        store.update("t2", vec!["b", "c"]);
        assert_eq!(*store.get("t1"), vec!["a"]);
        assert_eq!(*store.get("t2"), vec!["b", "c"]);
        assert_eq!(store.team_ids(), vec!["t1".to_owned(), "t2".to_owned()]);
        assert_eq!(store.total_len(), 3);
    }

    #[test]
    fn concurrent_updates_for_distinct_teams() {
        let store = TeamStore::new();
        thread::scope(|scope| {
            for idx in 0..16 {
                let store = &store;
                scope.spawn(move || {
                    let team = format!("t{idx}");
                    store.update(&team, vec![idx; idx + 1]);
                });
            }
        });

        for idx in 0..16 {
            assert_eq!(*store.get(&format!("t{idx}")), vec![idx; idx + 1]);
        }
    }

    #[test]
    fn readers_keep_their_snapshot() {
        let store = TeamStore::new();
        store.update("t1", vec![1]);
        let before = store.get("t1");
        store.update("t1", vec![2]);
        assert_eq!(*before, vec![1]);
        assert_eq!(*store.get("t1"), vec![2]);
    }
}
