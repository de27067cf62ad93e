//! Authenticated principals and scope checks.
//!
//! Credential storage and verification live in the transport layer; the core
//! only consumes an already-authenticated [`User`].

use raven_core::RavenError;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::glob::glob_matches;
use crate::scope::DEFAULT_SCOPES;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Bypasses every scope check.
    #[serde(default)]
    pub admin: bool,
}

impl User {
    /// A regular user holding [`DEFAULT_SCOPES`].
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            admin: false,
        }
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn as_admin(mut self) -> Self {
        self.admin = true;
        self
    }

    /// Evaluate each required scope against the user's grants, in order.
    pub fn check_scope<S: AsRef<str>>(&self, required: &[S]) -> Vec<bool> {
        required
            .iter()
            .map(|scope| self.admin || glob_matches(scope.as_ref(), &self.scopes))
            .collect()
    }

    /// Reduce [`check_scope`](Self::check_scope) with AND (`match_all`) or OR.
    pub fn has_scope_with<S: AsRef<str>>(&self, required: &[S], match_all: bool) -> bool {
        if self.admin {
            return true;
        }
        let checks = self.check_scope(required);
        if match_all {
            checks.into_iter().all(|ok| ok)
        } else {
            checks.into_iter().any(|ok| ok)
        }
    }

    /// OR across `required`.
    pub fn has_scope<S: AsRef<str>>(&self, required: &[S]) -> bool {
        self.has_scope_with(required, false)
    }

    /// Like [`has_scope_with`](Self::has_scope_with) but yields an access-denied error.
    pub fn require<S: AsRef<str>>(&self, required: &[S], match_all: bool) -> Result<(), RavenError> {
        if self.has_scope_with(required, match_all) {
            return Ok(());
        }
        debug!(user = %self.username, "Scope check denied");
        Err(RavenError::Authorization {
            required: required.iter().map(|s| s.as_ref().to_string()).collect(),
        })
    }
}
