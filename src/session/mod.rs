//! Process-wide session: the bearer credential and the identity it belongs to.
//!
//! One [`SessionStore`] is created at the process root and handed to every
//! view as an `Arc`. Only [`SessionStore::login`] and [`SessionStore::logout`]
//! change it, and readers always see credential and identity together.

pub mod storage;

use crate::api::{self, ApiClient, Credential};
use crate::data::Identity;
use crate::error::ClientResult;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

pub use storage::{FileStorage, MemoryStorage, SessionStorage};

/// Well-known storage key for the persisted session blob.
pub const STORAGE_KEY: &str = "civiclink_auth";

/// An authenticated session, in the login response's wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_token: Credential,
    pub user: Identity,
}

/// Consistent read of the session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub initializing: bool,
    pub session: Option<Session>,
}

impl SessionSnapshot {
    pub fn credential(&self) -> Option<&Credential> {
        self.session.as_ref().map(|s| &s.access_token)
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.session.as_ref().map(|s| &s.user)
    }
}

pub struct SessionStore {
    client: ApiClient,
    storage: Arc<dyn SessionStorage>,
    state: RwLock<SessionSnapshot>,
    restore_attempted: AtomicBool,
    /// Bumped by every login and logout.
    epoch: AtomicU64,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("state", &self.snapshot())
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    pub fn new(client: ApiClient, storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            client,
            storage,
            state: RwLock::new(SessionSnapshot {
                initializing: true,
                session: None,
            }),
            restore_attempted: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn credential(&self) -> Option<Credential> {
        self.snapshot().session.map(|s| s.access_token)
    }

    pub fn identity(&self) -> Option<Identity> {
        self.snapshot().session.map(|s| s.user)
    }

    pub fn is_initializing(&self) -> bool {
        self.snapshot().initializing
    }

    fn set_session(&self, session: Option<Session>) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.session = session;
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// Load a previously persisted session. Runs at most once; never fails.
    ///
    /// Absent, unreadable or malformed data leaves the session empty.
    pub async fn restore(&self) {
        if self.restore_attempted.swap(true, Ordering::SeqCst) {
            return;
        }
        let epoch = self.epoch.load(Ordering::SeqCst);

        let restored = match self.storage.read(STORAGE_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str::<Session>(&raw) {
                Ok(session) if !session.access_token.is_blank() => Some(session),
                Ok(_) => {
                    tracing::debug!("Ignoring persisted session with empty token");
                    None
                }
                Err(e) => {
                    tracing::debug!("Ignoring malformed persisted session: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::debug!("Could not read persisted session: {}", e);
                None
            }
        };

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        // A login or logout that finished while we were reading wins over storage.
        if self.epoch.load(Ordering::SeqCst) == epoch {
            state.session = restored;
        } else {
            tracing::debug!("Session changed during restore, ignoring stored session");
        }
        state.initializing = false;
    }

    /// Authenticate and persist the session. On failure nothing changes.
    pub async fn login(&self, email: &str, password: &str) -> ClientResult<Identity> {
        let session = api::auth::login(&self.client, email, password).await?;

        match serde_json::to_string(&session) {
            Ok(blob) => {
                if let Err(e) = self.storage.write(STORAGE_KEY, &blob).await {
                    tracing::warn!("Failed to persist session: {}", e);
                }
            }
            Err(e) => tracing::warn!("Failed to serialize session: {}", e),
        }

        let identity = session.user.clone();
        self.set_session(Some(session));
        tracing::info!("Signed in as {} ({})", identity.email, identity.role);

        Ok(identity)
    }

    /// Forget the session in memory and in storage. Safe to call repeatedly.
    pub async fn logout(&self) {
        self.set_session(None);

        if let Err(e) = self.storage.remove(STORAGE_KEY).await {
            tracing::warn!("Failed to clear persisted session: {}", e);
        }
    }
}
