use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};

use carriertrust_core::{ReviewEdit, ReviewId, ReviewWithCompany};

use crate::error::AppError;
use crate::lifecycle::TransitionOutcome;
use crate::session::Session;
use crate::store::StatusFilter;
use crate::AppState;

pub(super) fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/api/reviews", get(list_reviews))
        .route("/admin/api/reviews/:id/approve", post(approve_review))
        .route(
            "/admin/api/reviews/:id",
            patch(edit_review).delete(delete_review),
        )
}

#[derive(Deserialize)]
struct ListParams {
    status: Option<String>,
    q: Option<String>,
}

#[derive(Serialize)]
struct ReviewList {
    status: String,
    reviews: Vec<ReviewWithCompany>,
}

async fn list_reviews(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Query(params): Query<ListParams>,
) -> Result<Json<ReviewList>, AppError> {
    let filter = match params.status.as_deref() {
        None | Some("") => StatusFilter::default(),
        Some(raw) => raw
            .parse::<StatusFilter>()
            .map_err(|e| AppError::Validation(e.to_string()))?,
    };

    let reviews = state
        .moderation()
        .list(&session, filter, params.q.as_deref())
        .await?;
    Ok(Json(ReviewList {
        status: filter.to_string(),
        reviews,
    }))
}

async fn approve_review(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<Json<TransitionOutcome>, AppError> {
    let outcome = state.lifecycle().approve(&session, &ReviewId(id)).await?;
    Ok(Json(outcome))
}

async fn edit_review(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    payload: Result<Json<ReviewEdit>, JsonRejection>,
) -> Result<Json<TransitionOutcome>, AppError> {
    session.require_admin()?;
    let Json(edit) = payload?;
    let outcome = state
        .lifecycle()
        .edit(&session, &ReviewId(id), edit)
        .await?;
    Ok(Json(outcome))
}

async fn delete_review(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<Json<TransitionOutcome>, AppError> {
    let outcome = state.lifecycle().delete(&session, &ReviewId(id)).await?;
    Ok(Json(outcome))
}
