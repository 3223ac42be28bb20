// src/stores/session.rs
use crate::errors::TextileGuardError;
use crate::models::{Credentials, Profile, ProfileUpdate, SignupForm};
use crate::services::{AuthApi, CredentialStore};
use log::{info, warn};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// A persisted token is being checked against the profile endpoint.
    Hydrating,
    Anonymous,
    Authenticated,
}

#[derive(Debug)]
struct SessionState {
    phase: SessionPhase,
    user: Option<Profile>,
}

/// Identity of the signed-in user plus the persisted bearer token.
pub struct SessionStore {
    api: Arc<dyn AuthApi>,
    credentials: Arc<dyn CredentialStore>,
    state: RwLock<SessionState>,
}

impl SessionStore {
    pub fn new(api: Arc<dyn AuthApi>, credentials: Arc<dyn CredentialStore>) -> Self {
        let phase = if credentials.token().is_some() {
            SessionPhase::Hydrating
        } else {
            SessionPhase::Anonymous
        };
        Self {
            api,
            credentials,
            state: RwLock::new(SessionState { phase, user: None }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn phase(&self) -> SessionPhase {
        self.read().phase
    }

    pub fn user(&self) -> Option<Profile> {
        self.read().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.phase() == SessionPhase::Authenticated
    }

    /// Restores the session from a persisted token. Runs once at startup.
    pub async fn hydrate(&self) -> Option<Profile> {
        if self.credentials.token().is_none() {
            self.write().phase = SessionPhase::Anonymous;
            return None;
        }

        self.write().phase = SessionPhase::Hydrating;
        match self.api.profile().await {
            Ok(profile) => {
                info!("Restored session for {}", profile.email);
                self.set_user(profile.clone());
                Some(profile)
            }
            Err(e) => {
                warn!("Stored token rejected, signing out: {}", e);
                self.logout();
                None
            }
        }
    }

    pub async fn login(&self, credentials: Credentials) -> Result<Profile, TextileGuardError> {
        let response = self
            .api
            .login(&credentials)
            .await
            .map_err(|e| TextileGuardError::auth(e.detail(), "Login failed"))?;

        let token = response
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| TextileGuardError::Auth(Some("Login response did not include a token".to_string())))?;
        self.credentials.set_token(&token)?;

        match self.api.profile().await {
            Ok(profile) => {
                info!("Logged in as {}", profile.email);
                self.set_user(profile.clone());
                Ok(profile)
            }
            Err(e) => {
                self.logout();
                Err(TextileGuardError::auth(e.detail(), "Login failed"))
            }
        }
    }

    /// Creates an account. The user still has to log in afterwards.
    pub async fn signup(&self, form: SignupForm) -> Result<(), TextileGuardError> {
        if form.name.trim().is_empty() || form.email.trim().is_empty() || form.password.is_empty() {
            return Err(TextileGuardError::validation("Name, email and password are required"));
        }
        // Client-side convenience only; the server re-validates.
        if form.password != form.confirm_password {
            return Err(TextileGuardError::validation("Passwords do not match"));
        }

        let response = self
            .api
            .signup(&form)
            .await
            .map_err(|e| TextileGuardError::auth(e.detail(), "Signup failed"))?;
        info!(
            "Created account {} ({})",
            form.email,
            response.user_id.as_deref().unwrap_or("unknown id")
        );
        Ok(())
    }

    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<Profile, TextileGuardError> {
        let update = update.normalized();
        if update.is_empty() {
            return Err(TextileGuardError::validation("No fields to update"));
        }

        self.api
            .update_profile(&update)
            .await
            .map_err(|e| e.into_store_error(TextileGuardError::Auth))?;

        let profile = self
            .api
            .profile()
            .await
            .map_err(|e| e.into_store_error(TextileGuardError::Auth))?;
        self.set_user(profile.clone());
        Ok(profile)
    }

    /// Always succeeds locally.
    pub fn logout(&self) {
        if let Err(e) = self.credentials.clear_token() {
            warn!("Failed to clear stored token: {}", e);
        }
        let mut state = self.write();
        state.user = None;
        state.phase = SessionPhase::Anonymous;
    }

    /// Drops the session after the backend rejected the token.
    pub fn invalidate(&self) {
        warn!("Session rejected by the server, signing out");
        self.logout();
    }

    fn set_user(&self, profile: Profile) {
        let mut state = self.write();
        state.user = Some(profile);
        state.phase = SessionPhase::Authenticated;
    }
}
