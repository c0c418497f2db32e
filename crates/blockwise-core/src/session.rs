use std::path::{Path, PathBuf};
use std::sync::Arc;

use blockwise_types::{Role, SignInResponse};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("not signed in")]
    NotSignedIn,
    #[error("session expired at {0}; sign in again")]
    Expired(DateTime<Utc>),
    #[error("this account cannot author content")]
    Forbidden,
}

/// An authenticated identity as issued by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthSession {
    pub user_id: String,
    pub email: String,
    pub role: Role,
    pub access_token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AuthSession {
    /// Builds a session from a sign-in reply. The session never outlives
    /// `max_age` from `now`, even if the backend hands out a longer token.
    pub fn from_sign_in(
        email: impl Into<String>,
        response: SignInResponse,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        let issued_at = response
            .issued_at
            .as_ref()
            .and_then(|t| t.to_datetime())
            .unwrap_or(now);
        let local_cap = now + max_age;
        let expires_at = response
            .expires_at
            .as_ref()
            .and_then(|t| t.to_datetime())
            .map(|backend| backend.min(local_cap))
            .unwrap_or(local_cap);
        Self {
            user_id: response.user_id,
            email: email.into(),
            role: response.role,
            access_token: response.token,
            issued_at,
            expires_at,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn can_author(&self) -> bool {
        self.role.can_author()
    }
}

/// Process-wide authenticated identity, handed explicitly to whatever issues
/// outbound requests.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    inner: Arc<RwLock<Option<AuthSession>>>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: AuthSession) -> Self {
        let ctx = Self::new();
        ctx.sign_in(session);
        ctx
    }

    pub fn sign_in(&self, session: AuthSession) {
        *self.inner.write() = Some(session);
    }

    pub fn sign_out(&self) -> Option<AuthSession> {
        self.inner.write().take()
    }

    pub fn current(&self) -> Option<AuthSession> {
        self.inner.read().clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.live_session_at(Utc::now()).is_ok()
    }

    pub fn live_session_at(&self, now: DateTime<Utc>) -> Result<AuthSession, SessionError> {
        let guard = self.inner.read();
        let session = guard.as_ref().ok_or(SessionError::NotSignedIn)?;
        if session.is_expired_at(now) {
            return Err(SessionError::Expired(session.expires_at));
        }
        Ok(session.clone())
    }

    pub fn bearer(&self) -> Result<String, SessionError> {
        self.live_session_at(Utc::now())
            .map(|session| session.access_token)
    }

    pub fn require_author(&self) -> Result<AuthSession, SessionError> {
        let session = self.live_session_at(Utc::now())?;
        if !session.can_author() {
            return Err(SessionError::Forbidden);
        }
        Ok(session)
    }
}

/// Persists the signed-in session between command invocations.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the stored session if there is one and it is still live.
    /// Expired or unreadable files are removed.
    pub async fn load(&self) -> anyhow::Result<Option<AuthSession>> {
        if !fs::try_exists(&self.path).await? {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path).await?;
        let session = match serde_json::from_str::<AuthSession>(&raw) {
            Ok(session) if !session.is_expired_at(Utc::now()) => session,
            Ok(_) => {
                tracing::info!("stored session expired; discarding");
                self.clear().await?;
                return Ok(None);
            }
            Err(err) => {
                tracing::warn!("stored session unreadable ({err}); discarding");
                self.clear().await?;
                return Ok(None);
            }
        };
        Ok(Some(session))
    }

    pub async fn save(&self, session: &AuthSession) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let raw = serde_json::to_string_pretty(session)?;
        fs::write(&self.path, raw).await?;
        Ok(())
    }

    pub async fn clear(&self) -> anyhow::Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
