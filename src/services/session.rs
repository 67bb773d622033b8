use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::{Identity, Session};
use crate::services::auth::{AuthError, AuthProvider, SignUp};

/// Published whenever a session is established or torn down.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthEvent {
    SignedIn { user_id: String },
    SignedUp { user_id: String },
    Restored { user_id: String },
    SignedOut { user_id: String },
}

#[derive(Debug, Clone)]
pub struct AuthState {
    pub user: Option<Identity>,
    pub session: Option<Session>,
    pub loading: bool,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            user: None,
            session: None,
            loading: true,
        }
    }
}

/// Explicit holder of the caller's auth state. Created by whoever owns the
/// request and handed to the code that needs an identity.
pub struct SessionContext {
    provider: Arc<dyn AuthProvider>,
    events: broadcast::Sender<AuthEvent>,
    state: AuthState,
}

impl SessionContext {
    pub fn new(provider: Arc<dyn AuthProvider>, events: broadcast::Sender<AuthEvent>) -> Self {
        Self {
            provider,
            events,
            state: AuthState::default(),
        }
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn current_user(&self) -> Option<&Identity> {
        self.state.user.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.state.loading
    }

    /// Loads the identity behind `token`, if any. Always leaves the context
    /// out of the loading state.
    pub async fn restore(&mut self, token: Option<&str>) -> Result<Option<&Identity>, AuthError> {
        let session = match token.filter(|t| !t.is_empty()) {
            Some(token) => self.provider.current_user(token).await,
            None => Ok(None),
        };

        match session {
            Ok(Some(session)) => {
                self.publish(AuthEvent::Restored {
                    user_id: session.identity.user_id.clone(),
                });
                self.establish(session);
            }
            Ok(None) => self.clear(),
            Err(e) => {
                self.clear();
                return Err(e);
            }
        }
        Ok(self.state.user.as_ref())
    }

    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<&Session, AuthError> {
        let session = self.provider.sign_in(email, password).await?;
        tracing::info!(user_id = %session.identity.user_id, "signed in");
        self.publish(AuthEvent::SignedIn {
            user_id: session.identity.user_id.clone(),
        });
        Ok(self.establish(session))
    }

    pub async fn sign_up(&mut self, request: SignUp) -> Result<&Session, AuthError> {
        let session = self.provider.sign_up(request).await?;
        self.publish(AuthEvent::SignedUp {
            user_id: session.identity.user_id.clone(),
        });
        Ok(self.establish(session))
    }

    pub async fn sign_out(&mut self) -> Result<(), AuthError> {
        let Some((token, user_id)) = self
            .state
            .session
            .as_ref()
            .map(|s| (s.token.clone(), s.identity.user_id.clone()))
        else {
            self.clear();
            return Ok(());
        };

        self.provider.sign_out(&token).await?;
        tracing::info!(user_id = %user_id, "signed out");
        self.publish(AuthEvent::SignedOut { user_id });
        self.clear();
        Ok(())
    }

    fn establish(&mut self, session: Session) -> &Session {
        self.state.user = Some(session.identity.clone());
        self.state.loading = false;
        self.state.session.insert(session)
    }

    fn clear(&mut self) {
        self.state = AuthState {
            loading: false,
            ..AuthState::default()
        };
    }

    fn publish(&self, event: AuthEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::db;
    use crate::services::auth::SqliteAuthProvider;

    fn context() -> (SessionContext, broadcast::Receiver<AuthEvent>) {
        let conn = db::init_db(":memory:").unwrap();
        let provider = Arc::new(SqliteAuthProvider::new(Arc::new(Mutex::new(conn)), vec![], 24));
        let (tx, rx) = broadcast::channel(16);
        (SessionContext::new(provider, tx), rx)
    }

    fn signup() -> SignUp {
        SignUp {
            email: "jane@x.com".to_string(),
            password: "hunter22".to_string(),
            full_name: "Jane Doe".to_string(),
            phone: None,
        }
    }

    #[tokio::test]
    async fn test_starts_loading_until_restored() {
        let (mut ctx, _rx) = context();
        assert!(ctx.is_loading());
        assert!(ctx.current_user().is_none());

        let user = ctx.restore(None).await.unwrap();
        assert!(user.is_none());
        assert!(!ctx.is_loading());
    }

    #[tokio::test]
    async fn test_sign_up_sign_out_lifecycle_emits_events() {
        let (mut ctx, mut rx) = context();
        let token = ctx.sign_up(signup()).await.unwrap().token.clone();
        let user_id = ctx.current_user().unwrap().user_id.clone();
        assert_eq!(rx.recv().await.unwrap(), AuthEvent::SignedUp { user_id: user_id.clone() });

        ctx.sign_out().await.unwrap();
        assert!(ctx.current_user().is_none());
        assert!(ctx.state().session.is_none());
        assert_eq!(rx.recv().await.unwrap(), AuthEvent::SignedOut { user_id });

        let (tx, _) = broadcast::channel(4);
        let mut fresh = SessionContext::new(Arc::clone(&ctx.provider), tx);
        assert!(fresh.restore(Some(&token)).await.unwrap().is_none());
        assert!(!fresh.is_loading());
    }

    #[tokio::test]
    async fn test_restore_from_token() {
        let (mut ctx, _rx) = context();
        let token = ctx.sign_up(signup()).await.unwrap().token.clone();

        let (tx, _) = broadcast::channel(4);
        let mut other = SessionContext::new(Arc::clone(&ctx.provider), tx);
        let restored = other.restore(Some(&token)).await.unwrap().cloned();
        assert_eq!(restored.unwrap().email, "jane@x.com");
    }

    #[tokio::test]
    async fn test_failed_sign_in_keeps_signed_out() {
        let (mut ctx, _rx) = context();
        ctx.restore(None).await.unwrap();
        assert!(ctx.sign_in("jane@x.com", "whatever").await.is_err());
        assert!(ctx.current_user().is_none());
    }
}
