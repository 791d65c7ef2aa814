// ABOUTME: HTTP middleware for bearer authentication on protected endpoints
// ABOUTME: Validates Authorization headers and resolves the calling principal
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Contributors

/// Bearer token authentication
pub mod auth;

pub use auth::{AuthPrincipal, BearerAuthMiddleware};
