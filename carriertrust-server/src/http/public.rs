use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};

use carriertrust_core::{Company, CompanyId, ReviewDraft, SubmissionError, VatId};
use tracing::debug;

use crate::directory::CompanyDetail;
use crate::error::AppError;
use crate::lifecycle::SubmissionReceipt;
use crate::session::Session;
use crate::AppState;

pub(super) fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/vat/:vat/country", get(vat_country))
        .route("/api/companies/search", get(search_companies))
        .route("/api/companies/:id", get(company_detail))
        .route("/api/reviews", post(submit_review))
}

#[derive(Serialize)]
struct VatCountry {
    vat: VatId,
    country: Option<&'static str>,
}

async fn vat_country(Path(vat): Path<String>) -> Json<VatCountry> {
    let vat = VatId::normalize(&vat);
    let country = vat.country();
    Json(VatCountry { vat, country })
}

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

#[derive(Serialize)]
struct SearchResult {
    company: Company,
}

async fn search_companies(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResult>, AppError> {
    let company = state.directory().search(&params.q).await?;
    Ok(Json(SearchResult { company }))
}

async fn company_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CompanyDetail>, AppError> {
    let detail = state.directory().company_detail(&CompanyId(id)).await?;
    Ok(Json(detail))
}

async fn submit_review(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    payload: Result<Json<ReviewDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmissionReceipt>), AppError> {
    // Reject anonymous callers before looking at the body.
    session.require_user()?;
    // Field-level decode errors never reach the caller.
    let Json(draft) = payload.map_err(|rejection| {
        debug!("Rejected review body: {}", rejection.body_text());
        SubmissionError
    })?;
    let receipt = state.lifecycle().submit(&session, draft).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}
