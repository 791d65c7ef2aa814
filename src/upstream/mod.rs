// ABOUTME: Upstream identity provider integration (GitHub wire protocol)
// ABOUTME: Exposes the HTTP client and the allowlist authorization policy
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Contributors

/// GitHub wire-protocol client for code exchange and identity lookups
pub mod github;
/// User/org/team allowlist policy
pub mod policy;

pub use github::{GitHubClient, GitHubOrg, GitHubTeam, GitHubUser, UpstreamError};
pub use policy::AllowlistPolicy;
