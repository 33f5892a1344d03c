//! Sessions and the in-process identity handle.
//!
//! A [`Session`] is the context every Ticket Store call runs in: who is
//! signed in and whether the live provider is still trusted. Replacing a
//! process-wide availability flag with per-session state keeps concurrent
//! sessions from interfering with each other.

use crate::health::ProviderHealth;
use fieldops_core::identity::IdentityProvider;
use fieldops_core::user::{Actor, UserProfile};
use fieldops_core::{Result, TicketError};
use std::sync::Arc;
use tokio::sync::watch;

/// Identity provider backed by a `watch` channel.
///
/// Sign-in state is pushed in by the host application (after its own
/// authentication flow) and observed by subscribers such as the live feed.
#[derive(Debug, Clone)]
pub struct IdentityHandle {
    current: Arc<watch::Sender<Option<UserProfile>>>,
}

impl IdentityHandle {
    /// A handle with nobody signed in.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            current: Arc::new(tx),
        }
    }

    /// A handle with `profile` already signed in.
    #[must_use]
    pub fn signed_in(profile: UserProfile) -> Self {
        let handle = Self::new();
        handle.sign_in(profile);
        handle
    }

    /// Replace the current user.
    pub fn sign_in(&self, profile: UserProfile) {
        tracing::debug!(user_id = %profile.id, role = %profile.role, "Session signed in");
        self.current.send_replace(Some(profile));
    }

    /// Clear the current user.
    pub fn sign_out(&self) {
        if self.current.send_replace(None).is_some() {
            tracing::debug!("Session signed out");
        }
    }
}

impl Default for IdentityHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for IdentityHandle {
    fn current_user(&self) -> Option<UserProfile> {
        self.current.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<UserProfile>> {
        self.current.subscribe()
    }
}

/// Per-session context passed to every Ticket Store operation.
#[derive(Clone)]
pub struct Session {
    identity: Arc<dyn IdentityProvider>,
    health: ProviderHealth,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.identity.current_user().map(|u| u.id))
            .field("health", &self.health)
            .finish()
    }
}

impl Session {
    /// Create a session.
    #[must_use]
    pub fn new(identity: Arc<dyn IdentityProvider>, health: ProviderHealth) -> Self {
        Self { identity, health }
    }

    /// The identity provider.
    #[must_use]
    pub fn identity(&self) -> &Arc<dyn IdentityProvider> {
        &self.identity
    }

    /// The session's provider health.
    #[must_use]
    pub const fn health(&self) -> &ProviderHealth {
        &self.health
    }

    /// Profile of the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::Auth`] when nobody is signed in or the profile
    /// is inactive.
    pub fn current_user(&self) -> Result<UserProfile> {
        let profile = self
            .identity
            .current_user()
            .ok_or_else(|| TicketError::auth("no user is signed in"))?;
        if !profile.is_active {
            return Err(TicketError::auth(format!(
                "account {} is inactive",
                profile.email
            )));
        }
        Ok(profile)
    }

    /// The acting identity for the current call.
    ///
    /// # Errors
    ///
    /// Same as [`Session::current_user`].
    pub fn actor(&self) -> Result<Actor> {
        self.current_user().map(|profile| profile.actor())
    }
}
