// ABOUTME: Session manager binding authenticated principals to per-client push channels
// ABOUTME: Concurrent create/get/remove with bounded queues and an explicit removal signal
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Contributors

//! Session coordination for the streamable HTTP transport. A [`Session`] owns
//! a bounded push queue consumed by at most one delivery loop; the manager is
//! an owned instance constructed at startup and shared by handle, never a
//! process-wide global. When a session is created by an authenticated request
//! the principal is persisted as an [`AuthSession`] record for auditing.

use crate::config::SessionConfig;
use crate::middleware::AuthPrincipal;
use crate::models::AuthSession;
use crate::store::{AuthStore, Store};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, warn};

/// Principal bound to a session at creation time
#[derive(Debug, Clone)]
pub struct SessionPrincipal {
    /// Local user id
    pub user_id: String,
    /// Upstream login, for log readability
    pub upstream_login: String,
    /// OAuth client that obtained the token
    pub client_id: String,
    /// Access token the session was established with
    pub access_token: String,
}

/// A live client session and its push channel
pub struct Session {
    /// Opaque session id carried in `Mcp-Session-Id`
    pub id: String,
    /// Principal attached at creation, absent when auth is disabled
    pub principal: Option<SessionPrincipal>,
    tx: mpsc::Sender<String>,
    rx: Mutex<Option<mpsc::Receiver<String>>>,
    removed: Notify,
}

impl Session {
    /// Queue an outbound message for delivery. A full queue drops the new
    /// message rather than blocking the producer; returns whether the message
    /// was accepted.
    pub fn push(&self, message: String) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(session_id = %self.id, "Push queue full, dropping outbound message");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(session_id = %self.id, "Push on closed session channel");
                false
            }
        }
    }

    /// Claim the receiving end of the push queue. Only the first caller gets
    /// it; a second concurrent delivery loop for the same session gets `None`.
    pub async fn take_receiver(&self) -> Option<mpsc::Receiver<String>> {
        self.rx.lock().await.take()
    }

    /// Wait until the session is removed from the manager
    pub async fn removed(&self) {
        self.removed.notified().await;
    }
}

/// Concurrent registry of live sessions
pub struct SessionManager {
    sessions: DashMap<String, Arc<Session>>,
    store: Arc<Store>,
    config: SessionConfig,
}

impl SessionManager {
    /// Create an empty manager
    #[must_use]
    pub fn new(store: Arc<Store>, config: SessionConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            store,
            config,
        }
    }

    /// Keepalive interval for delivery loops
    #[must_use]
    pub const fn keepalive_secs(&self) -> u64 {
        self.config.keepalive_secs
    }

    /// Create a session, optionally bound to an authenticated principal.
    ///
    /// The audit record write is best-effort: a storage failure is logged and
    /// the in-memory session still works.
    pub async fn create_session(&self, principal: Option<&AuthPrincipal>) -> Arc<Session> {
        let id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::channel(self.config.push_queue_capacity);

        let session_principal = principal.map(|p| SessionPrincipal {
            user_id: p.user.id.clone(),
            upstream_login: p.user.upstream_login.clone(),
            client_id: p.access_token.client_id.clone(),
            access_token: p.access_token.token.clone(),
        });

        let session = Arc::new(Session {
            id: id.clone(),
            principal: session_principal,
            tx,
            rx: Mutex::new(Some(rx)),
            removed: Notify::new(),
        });
        self.sessions.insert(id.clone(), Arc::clone(&session));

        if let Some(ref principal) = session.principal {
            let now = Utc::now();
            let record = AuthSession {
                session_id: id.clone(),
                user_id: principal.user_id.clone(),
                client_id: principal.client_id.clone(),
                access_token: principal.access_token.clone(),
                created_at: now,
                last_used_at: now,
            };
            if let Err(e) = self.store.store_session(&record).await {
                warn!(session_id = %id, "Failed to persist session record: {e}");
            }
            debug!(
                session_id = %id,
                user_id = %principal.user_id,
                upstream_login = %principal.upstream_login,
                "Session created"
            );
        } else {
            debug!(session_id = %id, "Session created without principal");
        }

        session
    }

    /// Look up a live session
    #[must_use]
    pub fn get_session(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Remove a session: wakes its delivery loop, forgets the id and deletes
    /// the persisted audit record. Removing an unknown id is a no-op.
    pub async fn remove_session(&self, id: &str) {
        if let Some((_, session)) = self.sessions.remove(id) {
            session.removed.notify_one();
            if session.principal.is_some() {
                if let Err(e) = self.store.delete_session(id).await {
                    warn!(session_id = %id, "Failed to delete session record: {e}");
                }
            }
            debug!(session_id = %id, "Session removed");
        }
    }

    /// Refresh a session's last-used timestamp after a completed request
    pub async fn touch(&self, id: &str) {
        if let Err(e) = self.store.update_session_last_used(id).await {
            warn!(session_id = %id, "Failed to update session last-used time: {e}");
        }
    }

    /// Number of live sessions
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no sessions are live
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::models::{AccessToken, User};
    use chrono::Duration;

    fn manager() -> (tempfile::TempDir, SessionManager) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::new(dir.path().to_str().unwrap()).unwrap());
        let manager = SessionManager::new(store, SessionConfig::default());
        (dir, manager)
    }

    fn principal() -> AuthPrincipal {
        AuthPrincipal {
            user: User {
                id: "u1".to_owned(),
                upstream_login: "octocat".to_owned(),
                upstream_id: 42,
                email: None,
                name: None,
                avatar_url: None,
            },
            access_token: AccessToken {
                token: "tok-abc".to_owned(),
                token_type: "Bearer".to_owned(),
                client_id: "c1".to_owned(),
                user_id: "u1".to_owned(),
                scope: "mcp:tools".to_owned(),
                resource: None,
                expires_at: Utc::now() + Duration::seconds(60),
                created_at: Utc::now(),
            },
        }
    }

    #[tokio::test]
    async fn create_get_remove_roundtrip() {
        let (_dir, manager) = manager();
        let session = manager.create_session(None).await;
        assert!(session.principal.is_none());
        assert!(manager.get_session(&session.id).is_some());

        manager.remove_session(&session.id).await;
        assert!(manager.get_session(&session.id).is_none());
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn principal_is_bound_and_audited() {
        let (_dir, manager) = manager();
        let session = manager.create_session(Some(&principal())).await;

        let bound = session.principal.as_ref().unwrap();
        assert_eq!(bound.user_id, "u1");
        assert_eq!(bound.client_id, "c1");

        let record = manager
            .store
            .get_session(&session.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.access_token, "tok-abc");

        // The token index resolves to the same session
        let by_token = manager
            .store
            .get_session_by_token("tok-abc")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_token.session_id, session.id);

        manager.remove_session(&session.id).await;
        assert!(manager.store.get_session(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn push_delivers_until_capacity_then_drops() {
        let (_dir, manager) = manager();
        let session = manager.create_session(None).await;

        let capacity = SessionConfig::default().push_queue_capacity;
        for i in 0..capacity {
            assert!(session.push(format!("msg-{i}")));
        }
        // Queue full: the newest message is dropped
        assert!(!session.push("overflow".to_owned()));

        let mut rx = session.take_receiver().await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), "msg-0");
        // The receiver can only be claimed once
        assert!(session.take_receiver().await.is_none());
    }

    #[tokio::test]
    async fn removal_signal_wakes_waiter() {
        let (_dir, manager) = manager();
        let session = manager.create_session(None).await;

        let waiter = Arc::clone(&session);
        let handle = tokio::spawn(async move { waiter.removed().await });
        manager.remove_session(&session.id).await;
        handle.await.unwrap();
    }
}
