//! Session Cleanup Guard
//!
//! Blocks destructive cleanup of a session while a human still has to answer
//! something, unless the cleanup reason is explicitly allow-listed.

use brewid_common::config::SessionPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::{ResolverError, ResolverResult};
use crate::models::DisambiguationSession;

/// Why a session is being cleaned up
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CleanupReason {
    Logout,
    RoleChange,
    ManualAdmin,
    /// Expiry sweep
    Timeout,
    /// Hard session age limit, not subject to the guard
    MaxAge,
    Other(String),
}

impl CleanupReason {
    pub fn as_str(&self) -> &str {
        match self {
            CleanupReason::Logout => "logout",
            CleanupReason::RoleChange => "role_change",
            CleanupReason::ManualAdmin => "manual_admin",
            CleanupReason::Timeout => "timeout",
            CleanupReason::MaxAge => "max_age",
            CleanupReason::Other(reason) => reason,
        }
    }
}

impl From<&str> for CleanupReason {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "logout" => CleanupReason::Logout,
            "role_change" | "role-change" => CleanupReason::RoleChange,
            "manual_admin" | "manual-admin" => CleanupReason::ManualAdmin,
            "timeout" => CleanupReason::Timeout,
            "max_age" | "max-age" => CleanupReason::MaxAge,
            other => CleanupReason::Other(other.to_string()),
        }
    }
}

impl From<String> for CleanupReason {
    fn from(value: String) -> Self {
        CleanupReason::from(value.as_str())
    }
}

impl From<CleanupReason> for String {
    fn from(reason: CleanupReason) -> Self {
        reason.as_str().to_string()
    }
}

impl fmt::Display for CleanupReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session Cleanup Guard
#[derive(Debug, Clone)]
pub struct SessionCleanupGuard {
    allow_list: HashSet<CleanupReason>,
}

impl SessionCleanupGuard {
    pub fn new<I, R>(allow_list: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<CleanupReason>,
    {
        Self {
            allow_list: allow_list.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_policy(policy: &SessionPolicy) -> Self {
        Self::new(policy.cleanup_allow_list.iter().map(String::as_str))
    }

    pub fn is_allow_listed(&self, reason: &CleanupReason) -> bool {
        self.allow_list.contains(reason)
    }

    /// True when nothing awaits a human, or the reason is allow-listed
    pub fn can_cleanup(&self, session: &DisambiguationSession, reason: &CleanupReason) -> bool {
        session.awaiting_human() == 0 || self.is_allow_listed(reason)
    }

    /// [`can_cleanup`](Self::can_cleanup) as a `Result`
    pub fn check(&self, session: &DisambiguationSession, reason: &CleanupReason) -> ResolverResult<()> {
        if self.can_cleanup(session, reason) {
            return Ok(());
        }
        Err(ResolverError::CleanupRefused {
            reason: reason.to_string(),
            awaiting_human: session.awaiting_human(),
        })
    }
}

impl Default for SessionCleanupGuard {
    fn default() -> Self {
        Self::from_policy(&SessionPolicy::default())
    }
}
