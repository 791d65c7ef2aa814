// ABOUTME: Embedded key-value store backend built on sled trees
// ABOUTME: One tree per collection, JSON records, cross-tree transactions for index writes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Contributors

//! Sled-backed implementation of [`AuthStore`].
//!
//! Records are serialized as JSON. The `users_by_login` and
//! `sessions_by_token` index trees are maintained inside sled cross-tree
//! transactions so a crash can never leave an index entry pointing at a
//! missing record or vice versa.

use super::AuthStore;
use crate::models::{
    AccessToken, AuthSession, AuthorizationCode, PendingAuthRequest, RefreshToken,
    RegisteredClient, User,
};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::TransactionResult;
use sled::Transactional;

/// Embedded store backed by a sled database
#[derive(Clone)]
pub struct SledStore {
    db: sled::Db,
    auth_codes: sled::Tree,
    access_tokens: sled::Tree,
    refresh_tokens: sled::Tree,
    clients: sled::Tree,
    users: sled::Tree,
    users_by_login: sled::Tree,
    auth_requests: sled::Tree,
    sessions: sled::Tree,
    sessions_by_token: sled::Tree,
}

impl SledStore {
    /// Open (or create) a sled database at the given path
    ///
    /// # Errors
    ///
    /// Returns an error if the database or any of its trees cannot be opened
    pub fn new(path: &str) -> Result<Self> {
        let db = sled::open(path).with_context(|| format!("failed to open store at {path}"))?;
        Ok(Self {
            auth_codes: db.open_tree("auth_codes")?,
            access_tokens: db.open_tree("access_tokens")?,
            refresh_tokens: db.open_tree("refresh_tokens")?,
            clients: db.open_tree("clients")?,
            users: db.open_tree("users")?,
            users_by_login: db.open_tree("users_by_login")?,
            auth_requests: db.open_tree("auth_requests")?,
            sessions: db.open_tree("sessions")?,
            sessions_by_token: db.open_tree("sessions_by_token")?,
            db,
        })
    }

    fn put<T: Serialize>(tree: &sled::Tree, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        tree.insert(key.as_bytes(), bytes)?;
        Ok(())
    }

    fn read<T: DeserializeOwned>(tree: &sled::Tree, key: &str) -> Result<Option<T>> {
        match tree.get(key.as_bytes())? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    fn remove(tree: &sled::Tree, key: &str) -> Result<()> {
        tree.remove(key.as_bytes())?;
        Ok(())
    }
}

#[async_trait]
impl AuthStore for SledStore {
    async fn store_auth_code(&self, code: &AuthorizationCode) -> Result<()> {
        Self::put(&self.auth_codes, &code.code, code)
    }

    async fn get_auth_code(&self, code: &str) -> Result<Option<AuthorizationCode>> {
        Self::read(&self.auth_codes, code)
    }

    async fn delete_auth_code(&self, code: &str) -> Result<()> {
        Self::remove(&self.auth_codes, code)
    }

    async fn store_access_token(&self, token: &AccessToken) -> Result<()> {
        Self::put(&self.access_tokens, &token.token, token)
    }

    async fn get_access_token(&self, token: &str) -> Result<Option<AccessToken>> {
        Self::read(&self.access_tokens, token)
    }

    async fn delete_access_token(&self, token: &str) -> Result<()> {
        Self::remove(&self.access_tokens, token)
    }

    async fn store_refresh_token(&self, token: &RefreshToken) -> Result<()> {
        Self::put(&self.refresh_tokens, &token.token, token)
    }

    async fn get_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        Self::read(&self.refresh_tokens, token)
    }

    async fn delete_refresh_token(&self, token: &str) -> Result<()> {
        Self::remove(&self.refresh_tokens, token)
    }

    async fn store_client(&self, client: &RegisteredClient) -> Result<()> {
        Self::put(&self.clients, &client.client_id, client)
    }

    async fn get_client(&self, client_id: &str) -> Result<Option<RegisteredClient>> {
        Self::read(&self.clients, client_id)
    }

    async fn delete_client(&self, client_id: &str) -> Result<()> {
        Self::remove(&self.clients, client_id)
    }

    async fn list_clients(&self) -> Result<Vec<RegisteredClient>> {
        let mut clients = Vec::new();
        for entry in &self.clients {
            let (_, raw) = entry?;
            clients.push(serde_json::from_slice(&raw)?);
        }
        Ok(clients)
    }

    async fn store_user(&self, user: &User) -> Result<()> {
        let bytes = serde_json::to_vec(user)?;
        let id_key = user.id.as_bytes().to_vec();
        let login_key = user.upstream_login.as_bytes().to_vec();

        let result: TransactionResult<(), ()> =
            (&self.users, &self.users_by_login).transaction(|(users, index)| {
                users.insert(id_key.as_slice(), bytes.as_slice())?;
                index.insert(login_key.as_slice(), id_key.as_slice())?;
                Ok(())
            });
        result.map_err(|e| anyhow!("failed to store user {}: {e:?}", user.id))
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        Self::read(&self.users, user_id)
    }

    async fn get_user_by_login(&self, login: &str) -> Result<Option<User>> {
        let Some(id_raw) = self.users_by_login.get(login.as_bytes())? else {
            return Ok(None);
        };
        let user_id = String::from_utf8(id_raw.to_vec())
            .map_err(|_| anyhow!("corrupt users_by_login entry for {login}"))?;
        self.get_user(&user_id).await
    }

    async fn store_auth_request(&self, request: &PendingAuthRequest) -> Result<()> {
        Self::put(&self.auth_requests, &request.id, request)
    }

    async fn get_auth_request(&self, id: &str) -> Result<Option<PendingAuthRequest>> {
        Self::read(&self.auth_requests, id)
    }

    async fn delete_auth_request(&self, id: &str) -> Result<()> {
        Self::remove(&self.auth_requests, id)
    }

    async fn store_session(&self, session: &AuthSession) -> Result<()> {
        let bytes = serde_json::to_vec(session)?;
        let id_key = session.session_id.as_bytes().to_vec();
        let token_key = session.access_token.as_bytes().to_vec();

        let result: TransactionResult<(), ()> =
            (&self.sessions, &self.sessions_by_token).transaction(|(sessions, index)| {
                sessions.insert(id_key.as_slice(), bytes.as_slice())?;
                index.insert(token_key.as_slice(), id_key.as_slice())?;
                Ok(())
            });
        result.map_err(|e| anyhow!("failed to store session {}: {e:?}", session.session_id))
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<AuthSession>> {
        Self::read(&self.sessions, session_id)
    }

    async fn get_session_by_token(&self, access_token: &str) -> Result<Option<AuthSession>> {
        let Some(id_raw) = self.sessions_by_token.get(access_token.as_bytes())? else {
            return Ok(None);
        };
        let session_id = String::from_utf8(id_raw.to_vec())
            .map_err(|_| anyhow!("corrupt sessions_by_token entry"))?;
        self.get_session(&session_id).await
    }

    async fn update_session_last_used(&self, session_id: &str) -> Result<()> {
        // Sessions without a principal carry no audit record; nothing to touch
        let Some(mut session) = self.get_session(session_id).await? else {
            return Ok(());
        };
        session.last_used_at = Utc::now();
        self.store_session(&session).await
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        let id_key = session_id.as_bytes().to_vec();
        let result: TransactionResult<(), ()> =
            (&self.sessions, &self.sessions_by_token).transaction(|(sessions, index)| {
                if let Some(raw) = sessions.remove(id_key.as_slice())? {
                    if let Ok(session) = serde_json::from_slice::<AuthSession>(&raw) {
                        index.remove(session.access_token.as_bytes())?;
                    }
                }
                Ok(())
            });
        result.map_err(|e| anyhow!("failed to delete session {session_id}: {e:?}"))
    }

    async fn close(&self) -> Result<()> {
        self.db.flush_async().await?;
        Ok(())
    }
}
