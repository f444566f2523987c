//! Email notifications about review lifecycle changes.
//!
//! Delivery is delegated to externally hosted functions, one per notification
//! kind, each invoked with the review identifier. Calls are attempted once.

use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde::Serialize;
use tracing::info;

use carriertrust_core::lifecycle::NotificationKind;
use carriertrust_core::{ReviewId, ReviewStatus};

/// A notification request for one review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    ReviewSubmitted {
        review_id: ReviewId,
    },
    StatusChanged {
        review_id: ReviewId,
        new_status: ReviewStatus,
    },
    ReviewDeleted {
        review_id: ReviewId,
    },
}

impl Notification {
    pub fn new(review_id: ReviewId, kind: NotificationKind) -> Self {
        match kind {
            NotificationKind::ReviewSubmitted => Self::ReviewSubmitted { review_id },
            NotificationKind::StatusChanged { new_status } => Self::StatusChanged {
                review_id,
                new_status,
            },
            NotificationKind::ReviewDeleted => Self::ReviewDeleted { review_id },
        }
    }

    pub fn review_id(&self) -> &ReviewId {
        match self {
            Self::ReviewSubmitted { review_id }
            | Self::StatusChanged { review_id, .. }
            | Self::ReviewDeleted { review_id } => review_id,
        }
    }

    /// Name of the remote function that delivers this notification.
    pub fn function_name(&self) -> &'static str {
        match self {
            Self::ReviewSubmitted { .. } => "notify-admin-new-review",
            Self::StatusChanged { .. } => "notify-review-status",
            Self::ReviewDeleted { .. } => "notify-review-deleted",
        }
    }

    fn payload(&self) -> NotificationPayload<'_> {
        match self {
            Self::StatusChanged {
                review_id,
                new_status,
            } => NotificationPayload {
                review_id: review_id.as_str(),
                new_status: Some(new_status.as_str()),
            },
            Self::ReviewSubmitted { review_id } | Self::ReviewDeleted { review_id } => {
                NotificationPayload {
                    review_id: review_id.as_str(),
                    new_status: None,
                }
            }
        }
    }
}

#[derive(Serialize)]
struct NotificationPayload<'a> {
    review_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    new_status: Option<&'a str>,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("request to {function} failed: {message}")]
    Transport {
        function: &'static str,
        message: String,
    },
    #[error("{function} returned {status}: {body}")]
    Rejected {
        function: &'static str,
        status: u16,
        body: String,
    },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Invokes the hosted notification functions over HTTP.
pub struct HttpNotifier {
    client: ClientWithMiddleware,
    functions_url: String,
    service_key: String,
}

impl HttpNotifier {
    pub fn new(client: ClientWithMiddleware, functions_url: &str, service_key: String) -> Self {
        Self {
            client,
            functions_url: functions_url.trim_end_matches('/').to_string(),
            service_key,
        }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let function = notification.function_name();
        let url = format!("{}/{}", self.functions_url, function);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.service_key)
            .json(&notification.payload())
            .send()
            .await
            .map_err(|e| NotifyError::Transport {
                function,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                function,
                status: status.as_u16(),
                body,
            });
        }

        info!(
            "Sent {} for review {}",
            function,
            notification.review_id()
        );
        Ok(())
    }
}

/// Logs notifications instead of sending them.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            "Notification {} for review {} (delivery disabled)",
            notification.function_name(),
            notification.review_id()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::create_backend_client;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use std::sync::{Arc, Mutex};

    type Captured = Arc<Mutex<Vec<(String, serde_json::Value)>>>;

    async fn capture(
        State(captured): State<Captured>,
        headers: HeaderMap,
        Json(body): Json<serde_json::Value>,
    ) -> StatusCode {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        captured.lock().unwrap().push((auth, body));
        StatusCode::OK
    }

    async fn spawn_functions(captured: Captured) -> String {
        let app = Router::new()
            .route("/notify-review-status", post(capture))
            .route("/notify-review-deleted", post(capture))
            .route("/notify-admin-new-review", post(|| async { StatusCode::BAD_GATEWAY }))
            .with_state(captured);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    #[test]
    fn test_notification_from_kind() {
        let id = ReviewId::from("r1");
        let n = Notification::new(
            id.clone(),
            NotificationKind::StatusChanged {
                new_status: ReviewStatus::Published,
            },
        );
        assert_eq!(n.function_name(), "notify-review-status");
        assert_eq!(n.review_id(), &id);
        assert_eq!(
            Notification::new(id, NotificationKind::ReviewDeleted).function_name(),
            "notify-review-deleted"
        );
    }

    #[test]
    fn test_payload_shapes() {
        let status = Notification::StatusChanged {
            review_id: ReviewId::from("r1"),
            new_status: ReviewStatus::Published,
        };
        assert_eq!(
            serde_json::to_value(status.payload()).unwrap(),
            serde_json::json!({"review_id": "r1", "new_status": "published"})
        );
        let deleted = Notification::ReviewDeleted {
            review_id: ReviewId::from("r2"),
        };
        assert_eq!(
            serde_json::to_value(deleted.payload()).unwrap(),
            serde_json::json!({"review_id": "r2"})
        );
    }

    #[tokio::test]
    async fn test_http_notifier_posts_payload_with_key() {
        let captured: Captured = Arc::default();
        let base = spawn_functions(captured.clone()).await;
        let notifier = HttpNotifier::new(
            create_backend_client().unwrap(),
            &base,
            "service-key".to_string(),
        );

        notifier
            .notify(&Notification::StatusChanged {
                review_id: ReviewId::from("r1"),
                new_status: ReviewStatus::Published,
            })
            .await
            .unwrap();

        let captured = captured.lock().unwrap();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].0, "Bearer service-key");
        assert_eq!(captured[0].1["new_status"], "published");
    }

    #[tokio::test]
    async fn test_http_notifier_reports_non_success() {
        let base = spawn_functions(Arc::default()).await;
        let notifier =
            HttpNotifier::new(create_backend_client().unwrap(), &base, "k".to_string());

        let err = notifier
            .notify(&Notification::ReviewSubmitted {
                review_id: ReviewId::from("r1"),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            NotifyError::Rejected {
                status: 502,
                function: "notify-admin-new-review",
                ..
            }
        ));
    }
}
