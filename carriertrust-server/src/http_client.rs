//! Shared outbound HTTP client for the identity and notification backends.

use anyhow::Context;
use axum::http;
use reqwest::{Client, Request, Response};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, Middleware, Next, Result};
use tracing::debug;
use uuid::Uuid;

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Tags every outbound request with a correlation id so backend logs can be
/// matched against ours.
pub struct CorrelationMiddleware;

#[async_trait::async_trait]
impl Middleware for CorrelationMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        if !req.headers().contains_key(CORRELATION_ID_HEADER) {
            let correlation_id = Uuid::new_v4().to_string();
            if let Ok(value) = correlation_id.parse() {
                req.headers_mut().insert(CORRELATION_ID_HEADER, value);
            }
            debug!(
                "{} {} (correlation id {})",
                req.method(),
                req.url().path(),
                correlation_id
            );
        }
        next.run(req, extensions).await
    }
}

pub fn create_backend_client() -> anyhow::Result<ClientWithMiddleware> {
    let client = Client::builder()
        .user_agent(concat!("carriertrust/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to create HTTP client")?;

    Ok(ClientBuilder::new(client).with(CorrelationMiddleware).build())
}
