// ABOUTME: Allowlist authorization policy over upstream users, orgs and teams
// ABOUTME: Empty allowlist admits everyone; membership fetch failures never widen access
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Contributors

//! Authorization policy evaluated after upstream login. All comparisons are
//! case-insensitive. Org and team memberships are only fetched when the
//! corresponding rule lists are non-empty; a fetch failure counts as "no
//! match" for that rule and evaluation continues.

use super::github::{GitHubClient, GitHubOrg, GitHubTeam, GitHubUser};
use crate::config::PolicyConfig;
use tracing::{debug, info};

/// Allowlist policy over upstream identity
#[derive(Clone)]
pub struct AllowlistPolicy {
    config: PolicyConfig,
}

impl AllowlistPolicy {
    /// Create a policy from configuration
    #[must_use]
    pub const fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    /// Decide whether the upstream user may obtain local credentials.
    ///
    /// `upstream_token` is the user's upstream access token, used for
    /// membership lookups when org or team rules are configured.
    pub async fn is_user_authorized(
        &self,
        client: &GitHubClient,
        upstream_token: &str,
        user: &GitHubUser,
    ) -> bool {
        if self.config.is_empty() {
            return true;
        }

        if login_allowed(&self.config.allowed_users, &user.login) {
            info!(login = %user.login, "User allowed by user rule");
            return true;
        }

        if !self.config.allowed_orgs.is_empty() {
            match client.get_user_orgs(upstream_token).await {
                Ok(orgs) => {
                    if org_allowed(&self.config.allowed_orgs, &orgs) {
                        info!(login = %user.login, "User allowed by org rule");
                        return true;
                    }
                }
                Err(e) => debug!(login = %user.login, "Org membership fetch failed: {e}"),
            }
        }

        if !self.config.allowed_teams.is_empty() {
            match client.get_user_teams(upstream_token).await {
                Ok(teams) => {
                    if team_allowed(&self.config.allowed_teams, &teams) {
                        info!(login = %user.login, "User allowed by team rule");
                        return true;
                    }
                }
                Err(e) => debug!(login = %user.login, "Team membership fetch failed: {e}"),
            }
        }

        info!(login = %user.login, "User matched no allowlist rule");
        false
    }
}

fn login_allowed(allowed: &[String], login: &str) -> bool {
    allowed.iter().any(|u| u.eq_ignore_ascii_case(login))
}

fn org_allowed(allowed: &[String], orgs: &[GitHubOrg]) -> bool {
    orgs.iter()
        .any(|org| allowed.iter().any(|a| a.eq_ignore_ascii_case(&org.login)))
}

fn team_allowed(allowed: &[String], teams: &[GitHubTeam]) -> bool {
    teams.iter().any(|team| {
        allowed.iter().any(|rule| {
            rule.split_once('/').is_some_and(|(org, slug)| {
                org.eq_ignore_ascii_case(&team.organization.login)
                    && slug.eq_ignore_ascii_case(&team.slug)
            })
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn org(login: &str) -> GitHubOrg {
        GitHubOrg {
            login: login.into(),
        }
    }

    fn team(org_login: &str, slug: &str) -> GitHubTeam {
        GitHubTeam {
            slug: slug.into(),
            organization: org(org_login),
        }
    }

    #[test]
    fn login_match_is_case_insensitive() {
        let allowed = vec!["OctoCat".to_owned()];
        assert!(login_allowed(&allowed, "octocat"));
        assert!(!login_allowed(&allowed, "hubot"));
    }

    #[test]
    fn org_match_is_case_insensitive() {
        let allowed = vec!["Acme".to_owned()];
        assert!(org_allowed(&allowed, &[org("acme"), org("other")]));
        assert!(!org_allowed(&allowed, &[org("umbrella")]));
    }

    #[test]
    fn team_rule_requires_org_and_slug() {
        let allowed = vec!["acme/platform".to_owned()];
        assert!(team_allowed(&allowed, &[team("Acme", "Platform")]));
        assert!(!team_allowed(&allowed, &[team("acme", "frontend")]));
        assert!(!team_allowed(&allowed, &[team("other", "platform")]));
        // Rules without a slash never match
        assert!(!team_allowed(&["acme".to_owned()], &[team("acme", "platform")]));
    }
}
