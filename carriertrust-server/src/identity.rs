//! Bearer-token identity lookup against the external identity provider.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest_middleware::ClientWithMiddleware;
use serde::{Deserialize, Serialize};

use carriertrust_core::UserId;

/// An authenticated user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity provider unreachable: {0}")]
    Transport(String),
    #[error("identity provider returned {status}")]
    UnexpectedStatus { status: u16 },
    #[error("identity provider sent an unreadable user: {0}")]
    Decode(String),
    #[error("invalid static token entry: {0:?}")]
    InvalidTokenEntry(String),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve a bearer token. `Ok(None)` means the token is not valid and the
    /// caller is treated as anonymous.
    async fn current_user(&self, token: &str) -> Result<Option<AuthUser>, IdentityError>;
}

/// Looks up the current user at `<auth_url>/user`.
pub struct RemoteIdentityProvider {
    client: ClientWithMiddleware,
    auth_url: String,
    api_key: String,
}

impl RemoteIdentityProvider {
    pub fn new(client: ClientWithMiddleware, auth_url: &str, api_key: String) -> Self {
        Self {
            client,
            auth_url: auth_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl IdentityProvider for RemoteIdentityProvider {
    async fn current_user(&self, token: &str) -> Result<Option<AuthUser>, IdentityError> {
        let response = self
            .client
            .get(format!("{}/user", self.auth_url))
            .bearer_auth(token)
            .header("apikey", &self.api_key)
            .send()
            .await
            .map_err(|e| IdentityError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            status if status.is_success() => response
                .json::<AuthUser>()
                .await
                .map(Some)
                .map_err(|e| IdentityError::Decode(e.to_string())),
            status => Err(IdentityError::UnexpectedStatus {
                status: status.as_u16(),
            }),
        }
    }
}

/// Fixed token table for local development and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityProvider {
    tokens: HashMap<String, AuthUser>,
}

impl StaticIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, token: &str, user_id: &str, email: Option<&str>) -> Self {
        self.tokens.insert(
            token.to_string(),
            AuthUser {
                id: UserId::from(user_id),
                email: email.map(str::to_string),
            },
        );
        self
    }

    /// Parse `token=user_id:email;token=user_id` entries. The email part is
    /// optional; blank entries are skipped.
    pub fn parse(entries: &str) -> Result<Self, IdentityError> {
        let mut provider = Self::new();
        for entry in entries.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let (token, user) = entry
                .split_once('=')
                .ok_or_else(|| IdentityError::InvalidTokenEntry(entry.to_string()))?;
            let (user_id, email) = match user.split_once(':') {
                Some((id, email)) => (id.trim(), Some(email.trim()).filter(|e| !e.is_empty())),
                None => (user.trim(), None),
            };
            let token = token.trim();
            if token.is_empty() || user_id.is_empty() {
                return Err(IdentityError::InvalidTokenEntry(entry.to_string()));
            }
            provider = provider.with_user(token, user_id, email);
        }
        Ok(provider)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn current_user(&self, token: &str) -> Result<Option<AuthUser>, IdentityError> {
        Ok(self.tokens.get(token).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::create_backend_client;
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::get;
    use axum::{Json, Router};

    #[test]
    fn test_parse_static_tokens() {
        let provider =
            StaticIdentityProvider::parse("t1=user-1:one@example.com; t2=user-2 ;").unwrap();
        assert_eq!(provider.len(), 2);
        assert_eq!(provider.tokens["t1"].email.as_deref(), Some("one@example.com"));
        assert_eq!(provider.tokens["t2"].id, UserId::from("user-2"));
        assert!(provider.tokens["t2"].email.is_none());
    }

    #[test]
    fn test_parse_rejects_malformed_entries() {
        assert!(StaticIdentityProvider::parse("no-equals-sign").is_err());
        assert!(StaticIdentityProvider::parse("=user").is_err());
        assert!(StaticIdentityProvider::parse("token=").is_err());
        assert!(StaticIdentityProvider::parse("").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_static_lookup() {
        let provider = StaticIdentityProvider::new().with_user("tok", "u1", None);
        assert!(provider.current_user("tok").await.unwrap().is_some());
        assert!(provider.current_user("other").await.unwrap().is_none());
    }

    async fn user_endpoint(headers: HeaderMap) -> Result<Json<serde_json::Value>, AxumStatus> {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        match auth {
            "Bearer good" => Ok(Json(
                serde_json::json!({"id": "user-9", "email": "nine@example.com", "role": "authenticated"}),
            )),
            "Bearer broken" => Err(AxumStatus::INTERNAL_SERVER_ERROR),
            _ => Err(AxumStatus::UNAUTHORIZED),
        }
    }

    #[tokio::test]
    async fn test_remote_provider_statuses() {
        let app = Router::new().route("/auth/v1/user", get(user_endpoint));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let provider = RemoteIdentityProvider::new(
            create_backend_client().unwrap(),
            &format!("http://{}/auth/v1/", addr),
            "anon-key".to_string(),
        );

        let user = provider.current_user("good").await.unwrap().unwrap();
        assert_eq!(user.id, UserId::from("user-9"));
        assert_eq!(user.email.as_deref(), Some("nine@example.com"));

        assert!(provider.current_user("expired").await.unwrap().is_none());
        assert!(matches!(
            provider.current_user("broken").await,
            Err(IdentityError::UnexpectedStatus { status: 500 })
        ));
    }
}
