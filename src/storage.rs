use std::{
    env, fs, io,
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

const STORAGE_DIR_NAME: &str = ".zeitgeist";
const SETTINGS_FILE: &str = "settings.json";

/// Read-only view of the session the fetch core runs under.
pub trait CredentialProvider: Send + Sync {
    fn token(&self) -> Option<String>;
    fn current_team_id(&self) -> Option<String>;
}

#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StoredSettings {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub current_team_id: Option<String>,
}

/// Settings persisted as JSON, with optional overrides that win over the
/// file but are never written back.
pub struct SettingsStore {
    settings_path: PathBuf,
    settings: RwLock<StoredSettings>,
    token_override: Option<String>,
    team_override: Option<String>,
}

impl SettingsStore {
    pub fn initialize() -> Result<Self, SettingsError> {
        let home = env::var("HOME").map_err(|_| SettingsError::HomeDirMissing)?;
        let path = PathBuf::from(home)
            .join(STORAGE_DIR_NAME)
            .join(SETTINGS_FILE);
        Self::open(path)
    }

    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let settings_path = path.into();
        if let Some(dir) = settings_path.parent()
            && !dir.as_os_str().is_empty()
            && !dir.exists()
        {
            fs::create_dir_all(dir)?;
        }
        let settings = read_settings(&settings_path)?;
        Ok(Self {
            settings_path,
            settings: RwLock::new(settings),
            token_override: None,
            team_override: None,
        })
    }

    pub fn with_overrides(mut self, token: Option<String>, team_id: Option<String>) -> Self {
        self.token_override = non_blank(token);
        self.team_override = non_blank(team_id);
        self
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }

    pub fn snapshot(&self) -> StoredSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_token(&self, token: Option<String>) -> Result<(), SettingsError> {
        let token = non_blank(token);
        let signed_in = token.is_some();
        self.update(|settings| settings.token = token)?;
        info!(signed_in, "updated stored token");
        Ok(())
    }

    pub fn set_current_team(&self, team_id: Option<String>) -> Result<(), SettingsError> {
        let team_id = non_blank(team_id);
        info!(team_id = team_id.as_deref().unwrap_or("-"), "selected team");
        self.update(|settings| settings.current_team_id = team_id)
    }

    fn update(&self, apply: impl FnOnce(&mut StoredSettings)) -> Result<(), SettingsError> {
        let mut guard = self
            .settings
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut next = guard.clone();
        apply(&mut next);
        write_settings(&self.settings_path, &next)?;
        *guard = next;
        Ok(())
    }
}

impl CredentialProvider for SettingsStore {
    fn token(&self) -> Option<String> {
        self.token_override
            .clone()
            .or_else(|| non_blank(self.snapshot().token))
    }

    fn current_team_id(&self) -> Option<String> {
        self.team_override
            .clone()
            .or_else(|| non_blank(self.snapshot().current_team_id))
    }
}

/// Fixed credentials, for one-shot runs and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    token: Option<String>,
    team_id: Option<String>,
}

impl StaticCredentials {
    pub fn new(token: Option<&str>, team_id: Option<&str>) -> Self {
        Self {
            token: non_blank(token.map(str::to_owned)),
            team_id: non_blank(team_id.map(str::to_owned)),
        }
    }
}

impl CredentialProvider for StaticCredentials {
    fn token(&self) -> Option<String> {
        self.token.clone()
    }

    fn current_team_id(&self) -> Option<String> {
        self.team_id.clone()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_owned())
        .filter(|trimmed| !trimmed.is_empty())
}

fn read_settings(path: &Path) -> Result<StoredSettings, SettingsError> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(serde_json::from_str(&contents)?),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(StoredSettings::default()),
        Err(err) => Err(err.into()),
    }
}

fn write_settings(path: &Path, settings: &StoredSettings) -> Result<(), SettingsError> {
    let data = serde_json::to_string_pretty(settings)?;
    fs::write(path, data)?;
    Ok(())
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("HOME environment variable is not set; cannot store settings under ~/.zeitgeist")]
    HomeDirMissing,
    #[error("I/O error while handling stored settings: {0}")]
    Io(#[from] io::Error),
    #[error("Failed to serialize stored settings: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reads_as_signed_out() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SettingsStore::open(dir.path().join("nested/settings.json")).expect("store");
        assert_eq!(store.token(), None);
        assert_eq!(store.current_team_id(), None);
        assert!(dir.path().join("nested").exists());
    }

    #[test]
    fn settings_survive_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        let store = SettingsStore::open(&path).expect("store");
        store.set_token(Some("abc".into())).expect("token");
        store.set_current_team(Some("t1".into())).expect("team");
        drop(store);

        let reopened = SettingsStore::open(&path).expect("reopen");
        assert_eq!(reopened.token().as_deref(), Some("abc"));
        assert_eq!(reopened.current_team_id().as_deref(), Some("t1"));
    }

    #[test]
    fn blank_values_read_as_absent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SettingsStore::open(dir.path().join("settings.json")).expect("store");
        store.set_token(Some("   ".into())).expect("token");
        assert_eq!(store.token(), None);
        assert_eq!(store.snapshot().token, None);
    }

    #[test]
    fn overrides_win_without_being_persisted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        let store = SettingsStore::open(&path)
            .expect("store")
            .with_overrides(Some("env-token".into()), Some("t9".into()));
        store.set_token(Some("file-token".into())).expect("token");

        assert_eq!(store.token().as_deref(), Some("env-token"));
        assert_eq!(store.current_team_id().as_deref(), Some("t9"));
        assert_eq!(store.snapshot().token.as_deref(), Some("file-token"));

        let contents = fs::read_to_string(&path).expect("read");
        assert!(!contents.contains("env-token"));
    }

    #[test]
    fn logout_clears_token() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SettingsStore::open(dir.path().join("settings.json")).expect("store");
        store.set_token(Some("abc".into())).expect("login");
        store.set_token(None).expect("logout");
        assert_eq!(store.token(), None);
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").expect("write");
        assert!(matches!(
            SettingsStore::open(&path),
            Err(SettingsError::Serialization(_))
        ));
    }
}
