use crate::api::ApiClient;
use crate::error::ApiError;
use crate::schemas::user::AuthUser;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Anonymous,
    /// Signed in, waiting for an administrator to approve the account.
    PendingApproval,
    Approved,
}

impl SessionStatus {
    pub fn for_user(user: Option<&AuthUser>) -> Self {
        match user {
            None => SessionStatus::Anonymous,
            Some(user) if user.is_approved => SessionStatus::Approved,
            Some(_) => SessionStatus::PendingApproval,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        *self != SessionStatus::Anonymous
    }

    pub fn is_approved(&self) -> bool {
        *self == SessionStatus::Approved
    }
}

/// Signed-in user and session token, shared with the API client.
#[derive(Clone)]
pub struct Session {
    api: ApiClient,
    user: Arc<Mutex<Option<AuthUser>>>,
    status: Arc<watch::Sender<SessionStatus>>,
}

impl Session {
    pub fn new(api: ApiClient) -> Self {
        let (status, _) = watch::channel(SessionStatus::Anonymous);
        Self {
            api,
            user: Arc::new(Mutex::new(None)),
            status: Arc::new(status),
        }
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    pub fn user(&self) -> Option<AuthUser> {
        self.user.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_admin(&self) -> bool {
        self.user().is_some_and(|user| user.is_admin())
    }

    /// Session token to persist between runs.
    pub fn token(&self) -> Option<String> {
        self.api.token()
    }

    /// Signs in with an identity-provider token.
    pub async fn login(&self, id_token: &str) -> Result<AuthUser, ApiError> {
        let (token, user) = self.api.login(id_token).await?;
        self.api.set_token(Some(token));
        self.set_user(Some(user.clone()));
        info!(user_id = user.id, approved = user.is_approved, "signed in");
        Ok(user)
    }

    /// Validates a saved token. Any failure discards it.
    pub async fn restore(&self, token: String) -> Result<AuthUser, ApiError> {
        self.api.set_token(Some(token));
        self.refresh_user().await
    }

    /// Re-reads the profile, e.g. to notice an approval.
    pub async fn refresh_user(&self) -> Result<AuthUser, ApiError> {
        if self.api.token().is_none() {
            return Err(ApiError::Unauthorized("Not authenticated".to_string()));
        }
        match self.api.me().await {
            Ok(user) => {
                self.set_user(Some(user.clone()));
                Ok(user)
            }
            Err(e) => {
                warn!("session validation failed: {}", e);
                self.expire();
                Err(e)
            }
        }
    }

    pub async fn logout(&self) {
        if let Err(e) = self.api.logout().await {
            warn!("logout request failed: {}", e);
        }
        self.expire();
        info!("signed out");
    }

    /// Drops the local session without contacting the backend.
    pub fn expire(&self) {
        self.api.set_token(None);
        self.set_user(None);
    }

    /// Keeps the sign-in but marks the account as waiting for approval.
    pub fn revoke_approval(&self) {
        let user = self.user().map(|user| AuthUser {
            is_approved: false,
            ..user
        });
        if user.is_some() {
            warn!("account is no longer approved");
            self.set_user(user);
        }
    }

    /// Applies a rejection seen on an API call to the local session.
    pub fn handle_rejection(&self, err: &ApiError) {
        match err {
            ApiError::Unauthorized(_) => self.expire(),
            ApiError::PendingApproval => self.revoke_approval(),
            _ => {}
        }
    }

    fn set_user(&self, user: Option<AuthUser>) {
        let status = SessionStatus::for_user(user.as_ref());
        *self.user.lock().unwrap_or_else(|e| e.into_inner()) = user;
        self.status.send_if_modified(|current| {
            let changed = *current != status;
            *current = status;
            changed
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::user::Role;

    fn user(is_approved: bool) -> AuthUser {
        AuthUser {
            id: 7,
            email: "a@b.c".into(),
            name: "A".into(),
            avatar_url: None,
            role: Role::User,
            is_approved,
        }
    }

    #[test]
    fn status_from_user() {
        assert_eq!(SessionStatus::for_user(None), SessionStatus::Anonymous);
        assert_eq!(
            SessionStatus::for_user(Some(&user(false))),
            SessionStatus::PendingApproval
        );
        assert!(SessionStatus::for_user(Some(&user(true))).is_approved());
        assert!(SessionStatus::PendingApproval.is_authenticated());
    }

    #[test]
    fn expire_clears_token_and_notifies() {
        let api = ApiClient::new("http://localhost:8000");
        let session = Session::new(api.clone());
        let mut rx = session.subscribe();

        api.set_token(Some("jwt".into()));
        session.set_user(Some(user(true)));
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), SessionStatus::Approved);

        session.expire();
        assert_eq!(session.status(), SessionStatus::Anonymous);
        assert!(session.token().is_none());
        assert!(rx.has_changed().unwrap());
    }

    #[test]
    fn pending_approval_rejection_downgrades() {
        let api = ApiClient::new("http://localhost:8000");
        let session = Session::new(api.clone());
        api.set_token(Some("jwt".into()));
        session.set_user(Some(user(true)));

        session.handle_rejection(&ApiError::PendingApproval);
        assert_eq!(session.status(), SessionStatus::PendingApproval);
        assert_eq!(session.token().as_deref(), Some("jwt"));

        session.handle_rejection(&ApiError::Unauthorized("expired".into()));
        assert_eq!(session.status(), SessionStatus::Anonymous);
        assert!(session.token().is_none());
    }

    #[tokio::test]
    async fn refresh_without_token_is_unauthorized() {
        let session = Session::new(ApiClient::new("http://localhost:8000"));
        let err = session.refresh_user().await.unwrap_err();
        assert!(err.is_auth_failure());
    }
}
