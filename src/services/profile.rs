//! Profile resolution with fail-closed degradation.
//!
//! DESIGN
//! ======
//! `resolve` never fails: any lookup error becomes the degraded profile
//! (placeholder name, admin flag off), so a role can never end up
//! indeterminate. One lookup per identity transition; retries are a user
//! action, not a loop here.

#[cfg(test)]
#[path = "profile_test.rs"]
mod profile_test;

use std::sync::Arc;

use uuid::Uuid;

use crate::net::backend::ProfileStore;
use crate::net::types::Profile;

/// Display name used when a fetched profile has none.
pub const FALLBACK_DISPLAY_NAME: &str = "user";

/// Resolves a user id to a profile, degrading on any error.
#[derive(Clone)]
pub struct ProfileFetcher {
    store: Arc<dyn ProfileStore>,
}

impl ProfileFetcher {
    #[must_use]
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self { store }
    }

    /// Look up the profile for `user_id`. Never fails: fetch errors are
    /// logged and produce `Profile::degraded()`.
    pub async fn resolve(&self, user_id: Uuid) -> Profile {
        match self.store.profile_by_user_id(user_id).await {
            Ok(profile) => Profile {
                display_name: profile
                    .display_name
                    .filter(|name| !name.trim().is_empty())
                    .or_else(|| Some(FALLBACK_DISPLAY_NAME.to_owned())),
                is_admin: profile.is_admin,
            },
            Err(error) => {
                tracing::warn!(%user_id, %error, "profile fetch failed; using non-privileged profile");
                Profile::degraded()
            }
        }
    }
}
