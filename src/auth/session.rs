use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use super::password::verify_password;
use super::{TokenError, TokenService, TokenSubject};
use crate::access::{AccessError, AccessStore, Region};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Region is not accessible")]
    RegionNotAccessible,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Store(#[from] AccessError),
}

/// Credentials handed back to the client after login, refresh or region selection.
#[derive(Debug, Clone, Serialize)]
pub struct SessionGrant {
    pub user_id: Uuid,
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_expires_at: Option<DateTime<Utc>>,
    pub region_id: Option<i32>,
    pub region_selection_required: bool,
    pub regions: Vec<Region>,
    pub roles: Vec<String>,
}

/// Login, refresh, region selection and logout on top of [`TokenService`].
#[derive(Clone)]
pub struct SessionService {
    tokens: Arc<TokenService>,
    store: Arc<dyn AccessStore>,
}

impl SessionService {
    pub fn new(tokens: Arc<TokenService>, store: Arc<dyn AccessStore>) -> Self {
        Self { tokens, store }
    }

    pub async fn login(
        &self,
        username: &str,
        password: &str,
        region_id: Option<i32>,
    ) -> Result<SessionGrant, SessionError> {
        let account = match self.store.find_user(username).await? {
            Some(account) if account.is_active => account,
            _ => {
                tracing::info!(username, "Login refused: unknown or inactive user");
                return Err(SessionError::InvalidCredentials);
            }
        };

        match verify_password(password, &account.password_hash) {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!(username, "Login refused: bad password");
                return Err(SessionError::InvalidCredentials);
            }
            Err(e) => {
                tracing::error!(user_id = %account.id, "Login refused: {}", e);
                return Err(SessionError::InvalidCredentials);
            }
        }

        let grant = self.grant(account.id, region_id, true).await?;
        tracing::info!(user_id = %account.id, region_id = ?grant.region_id, "User logged in");
        Ok(grant)
    }

    /// Reloads roles and memberships, so a refreshed token reflects current grants.
    pub async fn refresh(&self, refresh_token: &str, region_id: Option<i32>) -> Result<SessionGrant, SessionError> {
        let claims = self.tokens.validate_refresh(refresh_token).await?;
        self.grant(claims.sub, region_id, true).await
    }

    pub async fn select_region(&self, user_id: Uuid, region_id: i32) -> Result<SessionGrant, SessionError> {
        self.grant(user_id, Some(region_id), false).await
    }

    pub async fn logout(&self, user_id: Uuid) -> Result<(), SessionError> {
        self.tokens.revoke(user_id).await?;
        Ok(())
    }

    async fn grant(
        &self,
        user_id: Uuid,
        requested: Option<i32>,
        with_refresh: bool,
    ) -> Result<SessionGrant, SessionError> {
        let Some(token_version) = self.store.token_version(user_id).await? else {
            return Err(SessionError::InvalidCredentials);
        };
        let roles = self.store.user_roles(user_id).await?;
        let memberships = self.store.accessible_regions(user_id).await?;

        let region_id = match requested {
            Some(region_id) if memberships.contains(&region_id) => Some(region_id),
            Some(region_id) => {
                tracing::info!(user_id = %user_id, region_id, "Region selection refused");
                return Err(SessionError::RegionNotAccessible);
            }
            None if memberships.len() == 1 => memberships.iter().next().copied(),
            None => None,
        };

        let subject = TokenSubject { user_id, roles: roles.clone(), token_version };
        let access = self.tokens.issue(&subject, region_id)?;
        let refresh = if with_refresh { Some(self.tokens.issue_refresh(&subject)?) } else { None };
        let regions = self.store.regions(&memberships).await?;

        Ok(SessionGrant {
            user_id,
            access_token: access.token,
            expires_at: access.expires_at,
            refresh_expires_at: refresh.as_ref().map(|r| r.expires_at),
            refresh_token: refresh.map(|r| r.token),
            region_id,
            region_selection_required: region_id.is_none() && !memberships.is_empty(),
            regions,
            roles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenSettings;
    use crate::database::memory::MemoryAccessStore;

    async fn fixture() -> (SessionService, Arc<TokenService>, Arc<MemoryAccessStore>, Uuid) {
        let store = Arc::new(MemoryAccessStore::new());
        store.add_region(5, "North", "north.test", true).await;
        store.add_region(7, "South", "south.test", true).await;
        let user = store.add_user("carla", "hunter2").await.unwrap();
        store.assign_role(user, "Lawyer").await;
        store.add_membership(user, 5).await;

        let tokens = Arc::new(TokenService::new(TokenSettings::new("session-test-secret", 1, 7), store.clone()).unwrap());
        (SessionService::new(tokens.clone(), store.clone()), tokens, store, user)
    }

    #[tokio::test]
    async fn single_membership_is_auto_selected() {
        let (sessions, tokens, _, user) = fixture().await;
        let grant = sessions.login("carla", "hunter2", None).await.unwrap();
        assert_eq!(grant.user_id, user);
        assert_eq!(grant.region_id, Some(5));
        assert!(!grant.region_selection_required);
        assert!(grant.refresh_token.is_some());

        let claims = tokens.validate(&grant.access_token).await.unwrap();
        assert_eq!(claims.region_id, Some(5));
        assert_eq!(claims.roles, vec!["Lawyer".to_string()]);
    }

    #[tokio::test]
    async fn several_memberships_require_selection() {
        let (sessions, _, store, user) = fixture().await;
        store.add_membership(user, 7).await;

        let grant = sessions.login("carla", "hunter2", None).await.unwrap();
        assert_eq!(grant.region_id, None);
        assert!(grant.region_selection_required);
        assert_eq!(grant.regions.len(), 2);

        let selected = sessions.select_region(user, 7).await.unwrap();
        assert_eq!(selected.region_id, Some(7));
        assert!(selected.refresh_token.is_none());
    }

    #[tokio::test]
    async fn wrong_password_and_foreign_region_are_refused() {
        let (sessions, _, _, user) = fixture().await;
        assert!(matches!(sessions.login("carla", "nope", None).await, Err(SessionError::InvalidCredentials)));
        assert!(matches!(sessions.login("nobody", "hunter2", None).await, Err(SessionError::InvalidCredentials)));
        assert!(matches!(sessions.select_region(user, 7).await, Err(SessionError::RegionNotAccessible)));
    }

    #[tokio::test]
    async fn revoked_refresh_token_cannot_mint_access() {
        let (sessions, _, _, user) = fixture().await;
        let grant = sessions.login("carla", "hunter2", None).await.unwrap();
        let refresh = grant.refresh_token.unwrap();

        assert!(sessions.refresh(&refresh, None).await.is_ok());
        sessions.logout(user).await.unwrap();
        assert!(matches!(
            sessions.refresh(&refresh, None).await,
            Err(SessionError::Token(TokenError::Revoked))
        ));
    }
}
