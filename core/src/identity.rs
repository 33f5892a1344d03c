//! Identity contract.
//!
//! The identity provider owns authentication. The core only needs the
//! current user's profile and a way to observe sign-in changes.

use crate::user::UserProfile;
use tokio::sync::watch;

/// Source of the current authenticated user.
pub trait IdentityProvider: Send + Sync {
    /// Profile of the signed-in user, or `None` when signed out.
    fn current_user(&self) -> Option<UserProfile>;

    /// Receiver that observes every sign-in and sign-out.
    fn subscribe(&self) -> watch::Receiver<Option<UserProfile>>;
}
