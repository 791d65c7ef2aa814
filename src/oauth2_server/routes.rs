// ABOUTME: OAuth 2.1 HTTP route handlers for the warp web framework
// ABOUTME: Discovery metadata, registration, authorize/callback/token and admin routes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Contributors

use super::admin::{AdminService, CreateStaticClientRequest};
use super::endpoints::{AuthFlowError, AuthorizationServer};
use super::models::{
    AuthorizationServerMetadata, AuthorizeRequest, ClientRegistrationRequest, OAuth2Error,
    ProtectedResourceMetadata, TokenRequest,
};
use crate::errors::{AppError, ErrorResponse};
use crate::middleware::{auth::unauthorized_response, BearerAuthMiddleware};
use std::collections::HashMap;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

/// All OAuth 2.1 routes: discovery, registration, the authorization flow and
/// the admin surface
pub fn oauth2_routes(
    server: &Arc<AuthorizationServer>,
    admin: &Arc<AdminService>,
    bearer: &BearerAuthMiddleware,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    discovery_routes(server.issuer_url())
        .or(registration_route(server))
        .unify()
        .or(authorize_routes(server))
        .unify()
        .or(callback_route(server))
        .unify()
        .or(token_route(server))
        .unify()
        .or(admin_routes(admin, bearer, server.issuer_url()))
        .unify()
}

/// Discovery documents (RFC 8414 and RFC 9728), CORS-open so browser-based
/// clients can fetch them cross-origin
fn discovery_routes(
    issuer_url: &str,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let issuer = issuer_url.to_owned();
    let auth_server = warp::path!(".well-known" / "oauth-authorization-server")
        .and(warp::get())
        .map(move || cors_json(&AuthorizationServerMetadata::for_issuer(&issuer)));

    let issuer = issuer_url.to_owned();
    let protected_resource = warp::path!(".well-known" / "oauth-protected-resource")
        .and(warp::get())
        .map(move || cors_json(&ProtectedResourceMetadata::for_issuer(&issuer)));

    auth_server.or(protected_resource).unify()
}

/// Dynamic client registration (RFC 7591)
fn registration_route(
    server: &Arc<AuthorizationServer>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path("register")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(with_server(server))
        .and_then(
            |request: ClientRegistrationRequest, server: Arc<AuthorizationServer>| async move {
                let response = match server.register(request).await {
                    Ok(response) => {
                        warp::reply::with_status(warp::reply::json(&response), StatusCode::CREATED)
                            .into_response()
                    }
                    Err(error) => oauth_error(&error),
                };
                Ok::<_, Rejection>(response)
            },
        )
}

/// The authorization endpoint accepts GET with query parameters and POST with
/// a form body, both carrying the same fields
fn authorize_routes(
    server: &Arc<AuthorizationServer>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let get = warp::path("authorize")
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(with_server(server))
        .and_then(handle_authorize);

    let post = warp::path("authorize")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::form::<HashMap<String, String>>())
        .and(with_server(server))
        .and_then(handle_authorize);

    get.or(post).unify()
}

async fn handle_authorize(
    params: HashMap<String, String>,
    server: Arc<AuthorizationServer>,
) -> Result<Response, Rejection> {
    let take = |key: &str| params.get(key).cloned();
    let request = AuthorizeRequest {
        response_type: take("response_type").unwrap_or_default(),
        client_id: take("client_id").unwrap_or_default(),
        redirect_uri: take("redirect_uri").unwrap_or_default(),
        scope: take("scope"),
        state: take("state"),
        code_challenge: take("code_challenge"),
        code_challenge_method: take("code_challenge_method"),
        resource: take("resource"),
    };
    Ok(flow_response(server.authorize(request).await))
}

/// Federation return from the upstream provider
fn callback_route(
    server: &Arc<AuthorizationServer>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path("callback")
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(with_server(server))
        .and_then(
            |params: HashMap<String, String>, server: Arc<AuthorizationServer>| async move {
                let code = params.get("code").cloned();
                let state = params.get("state").cloned();
                Ok::<_, Rejection>(flow_response(server.callback(code, state).await))
            },
        )
}

/// Token endpoint; every response carries `Cache-Control: no-store`
fn token_route(
    server: &Arc<AuthorizationServer>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path("token")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::form::<TokenRequest>())
        .and(with_server(server))
        .and_then(
            |request: TokenRequest, server: Arc<AuthorizationServer>| async move {
                let response = match server.token(request).await {
                    Ok(tokens) => no_store(
                        warp::reply::with_status(warp::reply::json(&tokens), StatusCode::OK)
                            .into_response(),
                    ),
                    Err(error) => no_store(oauth_error(&error)),
                };
                Ok::<_, Rejection>(response)
            },
        )
}

/// Static-client admin routes, bearer-protected. Authentication happens
/// inside each handler so the 401 carries the RFC 9728 challenge header.
fn admin_routes(
    admin: &Arc<AdminService>,
    bearer: &BearerAuthMiddleware,
    issuer_url: &str,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let base = warp::path("admin").and(warp::path("clients"));
    let context = {
        let admin = Arc::clone(admin);
        let bearer = bearer.clone();
        let issuer = issuer_url.to_owned();
        warp::any().map(move || (Arc::clone(&admin), bearer.clone(), issuer.clone()))
    };
    let auth_header = warp::header::optional::<String>("authorization");

    let create = base
        .and(warp::path::end())
        .and(warp::post())
        .and(auth_header)
        .and(warp::body::json())
        .and(context.clone())
        .and_then(
            |header: Option<String>, request: CreateStaticClientRequest, ctx: AdminContext| async move {
                let (admin, bearer, issuer) = ctx;
                if let Err(e) = bearer.authenticate(header.as_deref()).await {
                    return Ok::<_, Rejection>(unauthorized_response(&issuer, &e.message));
                }
                let response = match admin.create_client(request).await {
                    Ok(client) => {
                        warp::reply::with_status(warp::reply::json(&client), StatusCode::CREATED)
                            .into_response()
                    }
                    Err(e) => app_error(&e),
                };
                Ok(response)
            },
        );

    let list = base
        .and(warp::path::end())
        .and(warp::get())
        .and(auth_header)
        .and(context.clone())
        .and_then(|header: Option<String>, ctx: AdminContext| async move {
            let (admin, bearer, issuer) = ctx;
            if let Err(e) = bearer.authenticate(header.as_deref()).await {
                return Ok::<_, Rejection>(unauthorized_response(&issuer, &e.message));
            }
            let response = match admin.list_clients().await {
                Ok(clients) => warp::reply::json(&clients).into_response(),
                Err(e) => app_error(&e),
            };
            Ok(response)
        });

    let get_one = base
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(warp::get())
        .and(auth_header)
        .and(context.clone())
        .and_then(
            |client_id: String, header: Option<String>, ctx: AdminContext| async move {
                let (admin, bearer, issuer) = ctx;
                if let Err(e) = bearer.authenticate(header.as_deref()).await {
                    return Ok::<_, Rejection>(unauthorized_response(&issuer, &e.message));
                }
                let response = match admin.get_client(&client_id).await {
                    Ok(client) => warp::reply::json(&client).into_response(),
                    Err(e) => app_error(&e),
                };
                Ok(response)
            },
        );

    let delete = base
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(warp::delete())
        .and(auth_header)
        .and(context)
        .and_then(
            |client_id: String, header: Option<String>, ctx: AdminContext| async move {
                let (admin, bearer, issuer) = ctx;
                if let Err(e) = bearer.authenticate(header.as_deref()).await {
                    return Ok::<_, Rejection>(unauthorized_response(&issuer, &e.message));
                }
                let response = match admin.delete_client(&client_id).await {
                    Ok(()) => StatusCode::NO_CONTENT.into_response(),
                    Err(e) => app_error(&e),
                };
                Ok(response)
            },
        );

    create
        .or(list)
        .unify()
        .or(get_one)
        .unify()
        .or(delete)
        .unify()
}

type AdminContext = (Arc<AdminService>, BearerAuthMiddleware, String);

fn with_server(
    server: &Arc<AuthorizationServer>,
) -> impl Filter<Extract = (Arc<AuthorizationServer>,), Error = std::convert::Infallible> + Clone {
    let server = Arc::clone(server);
    warp::any().map(move || Arc::clone(&server))
}

/// Turn an authorization-flow outcome into a 302 or a 400 JSON body
fn flow_response(outcome: Result<String, AuthFlowError>) -> Response {
    match outcome {
        Ok(location) | Err(AuthFlowError::Redirect(location)) => redirect(&location),
        Err(AuthFlowError::Direct(error)) => oauth_error(&error),
    }
}

fn redirect(location: &str) -> Response {
    let mut response = StatusCode::FOUND.into_response();
    if let Ok(value) = warp::http::HeaderValue::from_str(location) {
        response.headers_mut().insert("Location", value);
    }
    response
}

fn oauth_error(error: &OAuth2Error) -> Response {
    warp::reply::with_status(warp::reply::json(error), StatusCode::BAD_REQUEST).into_response()
}

fn app_error(error: &AppError) -> Response {
    let status =
        StatusCode::from_u16(error.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = ErrorResponse::from(AppError::new(error.code, error.message.clone()));
    warp::reply::with_status(warp::reply::json(&body), status).into_response()
}

fn no_store(mut response: Response) -> Response {
    response.headers_mut().insert(
        "Cache-Control",
        warp::http::HeaderValue::from_static("no-store"),
    );
    response
}

fn cors_json<T: serde::Serialize>(value: &T) -> Response {
    let mut response = warp::reply::json(value).into_response();
    response.headers_mut().insert(
        "Access-Control-Allow-Origin",
        warp::http::HeaderValue::from_static("*"),
    );
    response
}
