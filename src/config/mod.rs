// ABOUTME: Configuration module for environment-driven server settings
// ABOUTME: Exposes typed config structs loaded from environment variables
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Contributors

//! Configuration management

/// Environment variable based configuration
pub mod environment;

pub use environment::{
    PolicyConfig, ServerConfig, SessionConfig, StaticClientConfig, UpstreamConfig,
};
