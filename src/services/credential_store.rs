// src/services/credential_store.rs
use crate::errors::TextileGuardError;
use crate::models::Theme;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Durable client-side state: the bearer token and the display theme.
pub trait CredentialStore: Send + Sync {
    fn token(&self) -> Option<String>;
    fn set_token(&self, token: &str) -> Result<(), TextileGuardError>;
    fn clear_token(&self) -> Result<(), TextileGuardError>;
    fn theme(&self) -> Theme;
    fn set_theme(&self, theme: Theme) -> Result<(), TextileGuardError>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct StoredCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(default)]
    theme: Theme,
}

/// JSON file backed store. The file is rewritten on every change.
pub struct FileCredentialStore {
    path: PathBuf,
    state: RwLock<StoredCredentials>,
}

impl FileCredentialStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, TextileGuardError> {
        let path = path.into();
        let state = if path.exists() {
            let content = fs::read_to_string(&path)
                .map_err(|e| TextileGuardError::Storage(format!("Failed to read {}: {}", path.display(), e)))?;
            match serde_json::from_str(&content) {
                Ok(state) => state,
                Err(e) => {
                    log::warn!("Ignoring unreadable credential file {}: {}", path.display(), e);
                    StoredCredentials::default()
                }
            }
        } else {
            StoredCredentials::default()
        };

        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    fn update(&self, apply: impl FnOnce(&mut StoredCredentials)) -> Result<(), TextileGuardError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| TextileGuardError::Storage("Credential state poisoned".to_string()))?;
        apply(&mut state);
        self.persist(&state)
    }

    /// Writes a sibling temp file, then renames it over the real one.
    fn persist(&self, state: &StoredCredentials) -> Result<(), TextileGuardError> {
        let storage = |what: &str, e: std::io::Error| {
            TextileGuardError::Storage(format!("Failed to {} {}: {}", what, self.path.display(), e))
        };
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(|e| storage("create the directory of", e))?;

        let content = serde_json::to_string_pretty(state)
            .map_err(|e| TextileGuardError::Storage(e.to_string()))?;
        let file_name = self
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("credentials.json");
        let tmp = parent.join(format!(".{}.tmp.{}", file_name, std::process::id()));
        {
            let mut file = owner_only(fs::OpenOptions::new().write(true).create(true).truncate(true))
                .open(&tmp)
                .map_err(|e| storage("write", e))?;
            file.write_all(content.as_bytes())
                .map_err(|e| storage("write", e))?;
            file.sync_all().map_err(|e| storage("write", e))?;
        }
        fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            storage("replace", e)
        })
    }

    fn snapshot(&self) -> StoredCredentials {
        self.state
            .read()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

impl CredentialStore for FileCredentialStore {
    fn token(&self) -> Option<String> {
        self.snapshot().token
    }

    fn set_token(&self, token: &str) -> Result<(), TextileGuardError> {
        self.update(|s| s.token = Some(token.to_string()))
    }

    fn clear_token(&self) -> Result<(), TextileGuardError> {
        self.update(|s| s.token = None)
    }

    fn theme(&self) -> Theme {
        self.snapshot().theme
    }

    fn set_theme(&self, theme: Theme) -> Result<(), TextileGuardError> {
        self.update(|s| s.theme = theme)
    }
}

#[cfg(unix)]
fn owner_only(options: &mut fs::OpenOptions) -> &mut fs::OpenOptions {
    use std::os::unix::fs::OpenOptionsExt;
    options.mode(0o600)
}

#[cfg(not(unix))]
fn owner_only(options: &mut fs::OpenOptions) -> &mut fs::OpenOptions {
    options
}

/// Process-local store, used by tests and throwaway sessions.
#[derive(Default)]
pub struct MemoryCredentialStore {
    state: RwLock<StoredCredentials>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            state: RwLock::new(StoredCredentials {
                token: Some(token.to_string()),
                theme: Theme::default(),
            }),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn token(&self) -> Option<String> {
        self.state.read().ok().and_then(|s| s.token.clone())
    }

    fn set_token(&self, token: &str) -> Result<(), TextileGuardError> {
        if let Ok(mut s) = self.state.write() {
            s.token = Some(token.to_string());
        }
        Ok(())
    }

    fn clear_token(&self) -> Result<(), TextileGuardError> {
        if let Ok(mut s) = self.state.write() {
            s.token = None;
        }
        Ok(())
    }

    fn theme(&self) -> Theme {
        self.state.read().map(|s| s.theme).unwrap_or_default()
    }

    fn set_theme(&self, theme: Theme) -> Result<(), TextileGuardError> {
        if let Ok(mut s) = self.state.write() {
            s.theme = theme;
        }
        Ok(())
    }
}
