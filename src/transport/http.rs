// ABOUTME: Streamable HTTP transport: POST for requests, GET for the SSE push channel
// ABOUTME: Supports push-first and request-first session establishment over /mcp
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Contributors

//! The `/mcp` endpoint. Every request is bearer-authenticated; sessions are
//! established either by a `GET` opening the push channel first (the session
//! id arrives in the initial `endpoint` event) or by a `POST initialize`
//! first (the session id arrives in the `Mcp-Session-Id` response header).
//! Non-initialize requests must carry a known session id.

use crate::mcp::McpServer;
use crate::middleware::{auth::unauthorized_response, AuthPrincipal, BearerAuthMiddleware};
use crate::session::{Session, SessionManager};
use bytes::Bytes;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use warp::http::StatusCode;
use warp::hyper::Body;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

/// Request header carrying the session id
const SESSION_HEADER: &str = "mcp-session-id";

/// The streamable HTTP transport for MCP traffic
pub struct McpTransport {
    mcp: Arc<McpServer>,
    sessions: Arc<SessionManager>,
    auth: BearerAuthMiddleware,
    issuer_url: String,
}

impl McpTransport {
    /// Assemble the transport from its collaborators
    #[must_use]
    pub fn new(
        mcp: Arc<McpServer>,
        sessions: Arc<SessionManager>,
        auth: BearerAuthMiddleware,
        issuer_url: String,
    ) -> Self {
        Self {
            mcp,
            sessions,
            auth,
            issuer_url,
        }
    }

    /// All /mcp routes
    pub fn routes(
        transport: &Arc<Self>,
    ) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
        let base = warp::path("mcp").and(warp::path::end());

        let post = base
            .and(warp::post())
            .and(warp::header::optional::<String>("authorization"))
            .and(warp::header::optional::<String>(SESSION_HEADER))
            .and(warp::body::bytes())
            .and(with_transport(transport))
            .and_then(
                |auth_header, session_id, body, transport: Arc<Self>| async move {
                    Ok::<_, Rejection>(transport.handle_post(auth_header, session_id, body).await)
                },
            );

        let get = base
            .and(warp::get())
            .and(warp::header::optional::<String>("authorization"))
            .and(warp::header::optional::<String>(SESSION_HEADER))
            .and(with_transport(transport))
            .and_then(|auth_header, session_id, transport: Arc<Self>| async move {
                Ok::<_, Rejection>(transport.handle_get(auth_header, session_id).await)
            });

        let delete = base
            .and(warp::delete())
            .and(warp::header::optional::<String>("authorization"))
            .and(warp::header::optional::<String>(SESSION_HEADER))
            .and(with_transport(transport))
            .and_then(|auth_header, session_id, transport: Arc<Self>| async move {
                Ok::<_, Rejection>(transport.handle_delete(auth_header, session_id).await)
            });

        // Preflight carries no Authorization header, so it is not authenticated
        let options = base
            .and(warp::options())
            .map(|| cors(StatusCode::OK.into_response()));

        post.or(get).unify().or(delete).unify().or(options).unify()
    }

    /// POST: client-to-server protocol messages
    async fn handle_post(
        &self,
        auth_header: Option<String>,
        session_id: Option<String>,
        body: Bytes,
    ) -> Response {
        let principal = match self.authenticate(auth_header.as_deref()).await {
            Ok(principal) => principal,
            Err(response) => return response,
        };

        let Ok(envelope) = serde_json::from_slice::<Value>(&body) else {
            return cors(plain(StatusCode::BAD_REQUEST, "Invalid JSON"));
        };
        let method = envelope["method"].as_str().unwrap_or_default();

        if method == "initialize" {
            // Reuse a session established push-first, otherwise create one
            let session = match session_id.as_deref().and_then(|id| self.sessions.get_session(id)) {
                Some(existing) => {
                    debug!(session_id = %existing.id, "Initialize on existing session");
                    existing
                }
                None => self.sessions.create_session(Some(&principal)).await,
            };

            let response = self.mcp.handle_message(&body).await;
            self.sessions.touch(&session.id).await;
            return cors(with_session_header(
                json_or_accepted(response.as_ref()),
                &session.id,
            ));
        }

        let Some(session_id) = session_id.filter(|id| !id.is_empty()) else {
            return cors(plain(StatusCode::BAD_REQUEST, "Missing Mcp-Session-Id header"));
        };
        if self.sessions.get_session(&session_id).is_none() {
            return cors(plain(StatusCode::NOT_FOUND, "Session not found"));
        }

        let response = self.mcp.handle_message(&body).await;
        self.sessions.touch(&session_id).await;
        cors(json_or_accepted(response.as_ref()))
    }

    /// GET: the SSE push channel
    async fn handle_get(
        &self,
        auth_header: Option<String>,
        session_id: Option<String>,
    ) -> Response {
        let principal = match self.authenticate(auth_header.as_deref()).await {
            Ok(principal) => principal,
            Err(response) => return response,
        };

        let (session, is_new) = match session_id.filter(|id| !id.is_empty()) {
            Some(id) => match self.sessions.get_session(&id) {
                Some(session) => (session, false),
                None => return cors(plain(StatusCode::NOT_FOUND, "Session not found")),
            },
            None => (self.sessions.create_session(Some(&principal)).await, true),
        };

        let Some(rx) = session.take_receiver().await else {
            return cors(plain(
                StatusCode::CONFLICT,
                "Session push channel already consumed",
            ));
        };

        debug!(session_id = %session.id, is_new, "SSE push channel opened");
        let response = self.sse_response(session, rx, is_new);
        cors(response)
    }

    /// DELETE: explicit session teardown
    async fn handle_delete(
        &self,
        auth_header: Option<String>,
        session_id: Option<String>,
    ) -> Response {
        if let Err(response) = self.authenticate(auth_header.as_deref()).await {
            return response;
        }
        let Some(session_id) = session_id.filter(|id| !id.is_empty()) else {
            return cors(plain(StatusCode::BAD_REQUEST, "Missing Mcp-Session-Id header"));
        };
        self.sessions.remove_session(&session_id).await;
        cors(StatusCode::OK.into_response())
    }

    async fn authenticate(&self, auth_header: Option<&str>) -> Result<AuthPrincipal, Response> {
        self.auth
            .authenticate(auth_header)
            .await
            .map_err(|e| cors(unauthorized_response(&self.issuer_url, &e.message)))
    }

    /// Build the SSE response: the delivery loop multiplexes queued messages,
    /// the removal signal and client disconnect (the stream being dropped);
    /// keepalive comments ride on warp's keep-alive machinery.
    fn sse_response(
        &self,
        session: Arc<Session>,
        mut rx: tokio::sync::mpsc::Receiver<String>,
        is_new: bool,
    ) -> Response {
        let session_id = session.id.clone();
        let endpoint = format!("/mcp?sessionId={session_id}");

        let stream = async_stream::stream! {
            if is_new {
                // Push-first: the session id reaches the client before any
                // protocol traffic
                yield Ok::<_, warp::Error>(warp::sse::Event::default()
                    .event("endpoint")
                    .data(endpoint));
            }

            loop {
                tokio::select! {
                    () = session.removed() => {
                        debug!(session_id = %session.id, "SSE closed, session removed");
                        break;
                    }
                    message = rx.recv() => match message {
                        Some(message) => {
                            yield Ok(warp::sse::Event::default()
                                .event("message")
                                .data(message));
                        }
                        None => break,
                    },
                }
            }
        };

        let keep_alive = warp::sse::keep_alive()
            .interval(Duration::from_secs(self.sessions.keepalive_secs()))
            .text("ping");

        warp::reply::with_header(
            warp::sse::reply(keep_alive.stream(stream)),
            "Mcp-Session-Id",
            session_id,
        )
        .into_response()
    }
}

fn with_transport(
    transport: &Arc<McpTransport>,
) -> impl Filter<Extract = (Arc<McpTransport>,), Error = std::convert::Infallible> + Clone {
    let transport = Arc::clone(transport);
    warp::any().map(move || Arc::clone(&transport))
}

fn plain(status: StatusCode, message: &str) -> Response {
    let mut response = Response::new(Body::from(message.to_owned()));
    *response.status_mut() = status;
    response
}

/// Serialize a router response, or 202 for notifications that produce none
fn json_or_accepted(response: Option<&crate::mcp::JsonRpcResponse>) -> Response {
    match response {
        Some(response) => warp::reply::with_status(
            warp::reply::json(response),
            StatusCode::OK,
        )
        .into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

fn with_session_header(mut response: Response, session_id: &str) -> Response {
    if let Ok(value) = warp::http::HeaderValue::from_str(session_id) {
        response.headers_mut().insert("Mcp-Session-Id", value);
    }
    response
}

fn cors(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        "Access-Control-Allow-Origin",
        warp::http::HeaderValue::from_static("*"),
    );
    headers.insert(
        "Access-Control-Allow-Methods",
        warp::http::HeaderValue::from_static("GET, POST, DELETE, OPTIONS"),
    );
    headers.insert(
        "Access-Control-Allow-Headers",
        warp::http::HeaderValue::from_static("Content-Type, Mcp-Session-Id, Accept, Authorization"),
    );
    response
}
