use crate::error::AppError;
use crate::session::{IdentityProvider, Session};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// A session transition, pushed to subscribers.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    SignedIn(Session),
    Refreshed(Session),
    SignedOut,
}

/// Holds the current session and notifies subscribers of sign-in, refresh and sign-out.
pub struct SessionGate {
    identity: Arc<dyn IdentityProvider>,
    current: watch::Sender<Option<Session>>,
    events: broadcast::Sender<SessionEvent>,
}

/// Delivery stops when this is unsubscribed or dropped.
pub struct SessionSubscription {
    task: JoinHandle<()>,
}

impl SessionSubscription {
    pub fn unsubscribe(self) {}
}

impl Drop for SessionSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl SessionGate {
    pub fn new(identity: Arc<dyn IdentityProvider>) -> Self {
        let (current, _) = watch::channel(None);
        let (events, _) = broadcast::channel(16);
        SessionGate {
            identity,
            current,
            events,
        }
    }

    /// The present session, or None when signed out or expired.
    pub fn current_session(&self) -> Option<Session> {
        self.current.borrow().clone().filter(|s| !s.is_expired())
    }

    pub fn is_authenticated(&self) -> bool {
        self.current_session().is_some()
    }

    pub fn sign_in(&self, token: &str) -> Result<Session, AppError> {
        let session = self.identity.verify(token)?;
        tracing::info!(user = %session.user_id, "signed in");
        self.current.send_replace(Some(session.clone()));
        self.publish(SessionEvent::SignedIn(session.clone()));
        Ok(session)
    }

    /// Replace the session with one from a newer token for the same user.
    pub fn refresh(&self, token: &str) -> Result<Session, AppError> {
        let previous = self
            .current
            .borrow()
            .clone()
            .ok_or_else(|| AppError::Unauthorized("no session to refresh".into()))?;
        let session = self.identity.verify(token)?;
        if session.user_id != previous.user_id {
            return Err(AppError::Unauthorized("refresh token belongs to another user".into()));
        }
        tracing::debug!(user = %session.user_id, "session refreshed");
        self.current.send_replace(Some(session.clone()));
        self.publish(SessionEvent::Refreshed(session.clone()));
        Ok(session)
    }

    pub fn sign_out(&self) {
        if let Some(previous) = self.current.send_replace(None) {
            tracing::info!(user = %previous.user_id, "signed out");
            self.publish(SessionEvent::SignedOut);
        }
    }

    /// Run `callback` for every later transition until the returned subscription goes away.
    /// Must be called inside a tokio runtime.
    pub fn on_session_change<F>(&self, callback: F) -> SessionSubscription
    where
        F: Fn(SessionEvent) + Send + 'static,
    {
        let mut rx = self.events.subscribe();
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => callback(event),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "session subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        SessionSubscription { task }
    }

    fn publish(&self, event: SessionEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }
}
