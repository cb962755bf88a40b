use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;

use crate::adapters::ReviewView;
use crate::db::{offers, reviews};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::routes::parse_id;
use crate::state::AppState;
use crate::validation;

pub fn router() -> Router<AppState> {
    Router::new().route("/reviews/{offer_id}", get(list_reviews).post(add_review))
}

#[derive(Deserialize)]
pub struct AddReviewRequest {
    pub comment: Option<String>,
    /// Kept loose so that `"4"` and `4` both reach validation.
    pub rating: Option<Value>,
}

/// GET /api/reviews/{offer_id}
async fn list_reviews(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> AppResult<Json<Vec<ReviewView>>> {
    let offer_id = parse_id(&raw_id, "offer")?;
    let conn = state.db.get()?;
    let found = reviews::list_for_offer(&conn, offer_id)?;
    Ok(Json(found.iter().map(|r| state.presenter.review(r)).collect()))
}

/// POST /api/reviews/{offer_id}
async fn add_review(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(raw_id): Path<String>,
    body: Result<Json<AddReviewRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<ReviewView>)> {
    let offer_id = parse_id(&raw_id, "offer")?;
    let Json(req) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let draft = validation::validate_review(req.comment.as_deref(), req.rating.as_ref())?;

    let conn = state.db.get()?;
    if !offers::exists(&conn, offer_id)? {
        return Err(AppError::not_found("Offer not found"));
    }

    let review_id = reviews::insert(&conn, user.id(), offer_id, &draft.text, draft.rating)?;
    tracing::info!(
        "User {} reviewed offer {} ({}/5)",
        user.id(),
        offer_id,
        draft.rating
    );

    let created = reviews::find_with_author(&conn, review_id)?
        .ok_or_else(|| AppError::Internal(format!("review {review_id} vanished after insert")))?;
    Ok((StatusCode::CREATED, Json(state.presenter.review(&created))))
}
