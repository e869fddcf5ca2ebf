//! Session gate: who is acting, whether that is still valid, and where routing sends them.

mod gate;
mod identity;
mod routing;

pub use gate::{SessionEvent, SessionGate, SessionSubscription};
pub use identity::{Claims, IdentityProvider, JwtIdentity};
pub use routing::{route_decision, RouteDecision, DEFAULT_ROUTE, LOGIN_ROUTE};

use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An authenticated identity, passed explicitly to every data-access call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub email: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, email: Option<String>, expires_at: DateTime<Utc>) -> Self {
        Session {
            user_id: user_id.into(),
            email,
            expires_at,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn ensure_active(&self) -> Result<(), AppError> {
        if self.is_expired() {
            tracing::warn!(user = %self.user_id, "expired session rejected");
            return Err(AppError::Unauthorized("session expired".into()));
        }
        Ok(())
    }
}
