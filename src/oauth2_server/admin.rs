// ABOUTME: Administrative static-client management behind bearer authentication
// ABOUTME: Create, list, get and delete operator-provisioned OAuth clients
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Contributors

//! Static-client administration. Dynamic clients registered through
//! `/register` are invisible to the list endpoint and protected from
//! deletion; only `is_static` clients are managed here. The plaintext secret
//! appears exactly once, in the creation response.

use super::client_registration::ClientRegistrationManager;
use super::models::OAuth2Error;
use crate::errors::{AppError, AppResult};
use crate::models::RegisteredClient;
use crate::store::{AuthStore, Store};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Request body for creating a static client
#[derive(Debug, Deserialize)]
pub struct CreateStaticClientRequest {
    /// Display name, required
    pub client_name: String,
    /// Redirect URIs, at least one required
    pub redirect_uris: Vec<String>,
}

/// Static client representation returned by the admin endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct StaticClientSummary {
    /// Client identifier
    pub client_id: String,
    /// Plaintext secret, present only in the creation response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// Display name
    pub client_name: String,
    /// Registered redirect URIs
    pub redirect_uris: Vec<String>,
    /// Creation time, RFC 3339
    pub created_at: String,
}

impl StaticClientSummary {
    fn from_client(client: &RegisteredClient) -> Self {
        Self {
            client_id: client.client_id.clone(),
            client_secret: None,
            client_name: client.client_name.clone(),
            redirect_uris: client.redirect_uris.clone(),
            created_at: client.created_at.to_rfc3339(),
        }
    }
}

/// Static-client admin operations
#[derive(Clone)]
pub struct AdminService {
    store: Arc<Store>,
    registration: ClientRegistrationManager,
}

impl AdminService {
    /// Create the service over the given store
    #[must_use]
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            registration: ClientRegistrationManager::new(Arc::clone(&store)),
            store,
        }
    }

    /// Create a static client, returning its plaintext secret once
    ///
    /// # Errors
    ///
    /// `InvalidInput` for validation failures, `StorageError` otherwise
    pub async fn create_client(
        &self,
        request: CreateStaticClientRequest,
    ) -> AppResult<StaticClientSummary> {
        let response = self
            .registration
            .create_static_client(&request.client_name, request.redirect_uris)
            .await
            .map_err(|e: OAuth2Error| {
                AppError::invalid_input(e.error_description.unwrap_or(e.error))
            })?;

        info!(client_id = %response.client_id, "Static client created");
        Ok(StaticClientSummary {
            client_id: response.client_id,
            client_secret: Some(response.client_secret),
            client_name: request.client_name,
            redirect_uris: response.redirect_uris,
            created_at: chrono::DateTime::from_timestamp(response.client_id_issued_at, 0)
                .unwrap_or_default()
                .to_rfc3339(),
        })
    }

    /// List static clients, secrets omitted
    ///
    /// # Errors
    ///
    /// `StorageError` on backend failure
    pub async fn list_clients(&self) -> AppResult<Vec<StaticClientSummary>> {
        let clients = self
            .store
            .list_clients()
            .await
            .map_err(|e| AppError::storage(e.to_string()))?;
        Ok(clients
            .iter()
            .filter(|client| client.is_static)
            .map(StaticClientSummary::from_client)
            .collect())
    }

    /// Fetch one static client
    ///
    /// # Errors
    ///
    /// `ResourceNotFound` for unknown ids, `PermissionDenied` for dynamic
    /// clients
    pub async fn get_client(&self, client_id: &str) -> AppResult<StaticClientSummary> {
        let client = self.load_static(client_id).await?;
        Ok(StaticClientSummary::from_client(&client))
    }

    /// Delete a static client. Dynamic clients are refused.
    ///
    /// # Errors
    ///
    /// `ResourceNotFound`, `PermissionDenied` or `StorageError`
    pub async fn delete_client(&self, client_id: &str) -> AppResult<()> {
        self.load_static(client_id).await?;
        self.store
            .delete_client(client_id)
            .await
            .map_err(|e| AppError::storage(e.to_string()))?;
        info!(client_id = %client_id, "Static client deleted");
        Ok(())
    }

    async fn load_static(&self, client_id: &str) -> AppResult<RegisteredClient> {
        let client = self
            .store
            .get_client(client_id)
            .await
            .map_err(|e| AppError::storage(e.to_string()))?
            .ok_or_else(|| AppError::not_found(format!("client {client_id}")))?;
        if !client.is_static {
            return Err(AppError::permission_denied("not a static client"));
        }
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::errors::ErrorCode;
    use crate::oauth2_server::models::ClientRegistrationRequest;

    fn service() -> (tempfile::TempDir, AdminService) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::new(dir.path().to_str().unwrap()).unwrap());
        (dir, AdminService::new(store))
    }

    fn create_request() -> CreateStaticClientRequest {
        CreateStaticClientRequest {
            client_name: "CI runner".to_owned(),
            redirect_uris: vec!["https://ci.example.com/cb".to_owned()],
        }
    }

    #[tokio::test]
    async fn create_returns_secret_once() {
        let (_dir, service) = service();
        let created = service.create_client(create_request()).await.unwrap();
        assert!(created.client_secret.is_some());

        let fetched = service.get_client(&created.client_id).await.unwrap();
        assert!(fetched.client_secret.is_none());

        let listed = service.list_clients().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].client_secret.is_none());
    }

    #[tokio::test]
    async fn dynamic_clients_are_invisible_and_protected() {
        let (_dir, service) = service();
        let dynamic = service
            .registration
            .register_client(ClientRegistrationRequest {
                redirect_uris: vec!["http://localhost/cb".to_owned()],
                client_name: Some("App".to_owned()),
                client_uri: None,
                grant_types: None,
                response_types: None,
                scope: None,
            })
            .await
            .unwrap();

        assert!(service.list_clients().await.unwrap().is_empty());

        let err = service.get_client(&dynamic.client_id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::PermissionDenied);

        let err = service.delete_client(&dynamic.client_id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::PermissionDenied);
    }

    #[tokio::test]
    async fn delete_removes_the_client() {
        let (_dir, service) = service();
        let created = service.create_client(create_request()).await.unwrap();

        service.delete_client(&created.client_id).await.unwrap();
        let err = service.get_client(&created.client_id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ResourceNotFound);
    }

    #[tokio::test]
    async fn create_validates_input() {
        let (_dir, service) = service();
        let err = service
            .create_client(CreateStaticClientRequest {
                client_name: String::new(),
                redirect_uris: vec!["https://x.example/cb".to_owned()],
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);
    }
}
