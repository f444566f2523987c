//! Per-request session resolution.
//!
//! The caller's identity and admin capability are looked up once, by
//! middleware, and handed to every operation as an explicit `Session`.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use carriertrust_core::UserId;

use crate::error::AppError;
use crate::identity::AuthUser;
use crate::AppState;

/// Who is calling, as resolved at the start of the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub user: Option<AuthUser>,
    pub is_admin: bool,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.user.as_ref().map(|u| &u.id)
    }

    pub fn require_user(&self) -> Result<&AuthUser, AppError> {
        self.user.as_ref().ok_or(AppError::Unauthenticated)
    }

    pub fn require_admin(&self) -> Result<&AuthUser, AppError> {
        let user = self.require_user()?;
        if self.is_admin {
            Ok(user)
        } else {
            Err(AppError::Forbidden)
        }
    }
}

/// Extract the bearer token, if any.
///
/// A missing header is anonymous; any other scheme is rejected.
fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, AppError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| AppError::Unauthenticated)?;
    match value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(Some(token.trim())),
        _ => Err(AppError::Unauthenticated),
    }
}

pub async fn resolve_session(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = match bearer_token(request.headers())? {
        Some(token) => state.identity.current_user(token).await?,
        None => None,
    };

    let is_admin = match &user {
        Some(user) => state.store.is_admin(&user.id).await?,
        None => false,
    };

    if let Some(user) = &user {
        debug!("Request from user {} (admin: {})", user.id, is_admin);
    }

    request.extensions_mut().insert(Session { user, is_admin });
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(auth: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(auth).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&HeaderMap::new()).unwrap(), None);
        assert_eq!(
            bearer_token(&headers_with("Bearer abc")).unwrap(),
            Some("abc")
        );
        assert!(bearer_token(&headers_with("Basic abc")).is_err());
        assert!(bearer_token(&headers_with("Bearer   ")).is_err());
    }

    #[test]
    fn test_require_admin() {
        let anonymous = Session::anonymous();
        assert!(matches!(
            anonymous.require_admin(),
            Err(AppError::Unauthenticated)
        ));

        let user = Session {
            user: Some(AuthUser {
                id: UserId::from("u1"),
                email: None,
            }),
            is_admin: false,
        };
        assert!(user.require_user().is_ok());
        assert!(matches!(user.require_admin(), Err(AppError::Forbidden)));

        let admin = Session {
            is_admin: true,
            ..user
        };
        assert!(admin.require_admin().is_ok());
    }
}
