use std::collections::HashSet;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::adapters::{FullOffer, OfferPreview};
use crate::db::favorites::{self, FavoriteError};
use crate::db::models::NewOffer;
use crate::db::offers;
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::routes::parse_id;
use crate::state::AppState;
use crate::uploads;
use crate::validation;

// -- Error conversion --

impl From<FavoriteError> for AppError {
    fn from(err: FavoriteError) -> Self {
        match err {
            FavoriteError::AlreadyExists => {
                AppError::Conflict("Offer is already in favorites".into())
            }
            FavoriteError::NotFound => AppError::not_found("Offer is not in favorites"),
            FavoriteError::Sql(e) => AppError::Database(e),
        }
    }
}

// -- Router --

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/offers", get(list_offers).post(create_offer))
        .route("/offers/favorites/list", get(list_favorites))
        .route("/offers/{id}", get(get_offer))
        .route(
            "/offers/{id}/favorite",
            post(add_favorite).delete(remove_favorite),
        )
}

// -- Handlers --

/// GET /api/offers
async fn list_offers(
    State(state): State<AppState>,
    user: MaybeUser,
) -> AppResult<Json<Vec<OfferPreview>>> {
    let conn = state.db.get()?;
    let offers = offers::list_all(&conn)?;
    let favorite_ids = match user.id() {
        Some(user_id) => favorites::offer_ids(&conn, user_id)?,
        None => HashSet::new(),
    };

    let previews = offers
        .iter()
        .map(|offer| {
            state
                .presenter
                .offer_preview(offer, favorite_ids.contains(&offer.id))
        })
        .collect();
    Ok(Json(previews))
}

/// GET /api/offers/{id}
async fn get_offer(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(raw_id): Path<String>,
) -> AppResult<Json<FullOffer>> {
    let id = parse_id(&raw_id, "offer")?;
    let conn = state.db.get()?;

    let found = offers::find_with_author(&conn, id)?
        .ok_or_else(|| AppError::not_found("Offer not found"))?;
    let is_favorite = match user.id() {
        Some(user_id) => favorites::contains(&conn, user_id, id)?,
        None => false,
    };

    Ok(Json(state.presenter.full_offer(&found, is_favorite)))
}

/// POST /api/offers (multipart)
async fn create_offer(
    State(state): State<AppState>,
    user: CurrentUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<(StatusCode, Json<FullOffer>)> {
    let multipart = multipart.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let mut form = uploads::read_form(multipart, &state.offer_upload_policy()).await?;

    let preview = form
        .take_file("previewImage")
        .ok_or_else(|| AppError::BadRequest("Preview image is required".into()))?;
    let draft = validation::validate_offer(&form.fields)?;
    let photos = form.take_files("photos");

    // Nothing touches disk until the form is known to be valid.
    let preview_path = state.media.save(&preview).await?;
    let photo_paths = match state.media.save_all(&photos).await {
        Ok(paths) => paths,
        Err(e) => {
            state.media.discard(&[preview_path]).await;
            return Err(e.into());
        }
    };

    let mut written = photo_paths.clone();
    written.push(preview_path.clone());
    let new_offer = draft.into_new_offer(preview_path, photo_paths);

    let offer_id = match insert_offer(&state, user.id(), &new_offer) {
        Ok(id) => id,
        Err(e) => {
            state.media.discard(&written).await;
            return Err(e);
        }
    };
    tracing::info!("Offer {} created by user {}", offer_id, user.id());

    let conn = state.db.get()?;
    let found = offers::find_with_author(&conn, offer_id)?
        .ok_or_else(|| AppError::Internal(format!("offer {offer_id} vanished after insert")))?;
    Ok((
        StatusCode::CREATED,
        Json(state.presenter.full_offer(&found, false)),
    ))
}

fn insert_offer(state: &AppState, author_id: i64, offer: &NewOffer) -> AppResult<i64> {
    let mut conn = state.db.get()?;
    Ok(offers::insert(&mut conn, author_id, offer)?)
}

/// GET /api/offers/favorites/list
async fn list_favorites(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<OfferPreview>>> {
    let conn = state.db.get()?;
    let offers = offers::list_favorites(&conn, user.id())?;
    let previews = offers
        .iter()
        .map(|offer| state.presenter.offer_preview(offer, true))
        .collect();
    Ok(Json(previews))
}

/// POST /api/offers/{id}/favorite
async fn add_favorite(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(raw_id): Path<String>,
) -> AppResult<(StatusCode, Json<OfferPreview>)> {
    let offer_id = parse_id(&raw_id, "offer")?;
    let conn = state.db.get()?;

    let offer = offers::find(&conn, offer_id)?
        .ok_or_else(|| AppError::not_found("Offer not found"))?;
    favorites::add(&conn, user.id(), offer_id)?;
    tracing::debug!("User {} favorited offer {}", user.id(), offer_id);

    Ok((
        StatusCode::CREATED,
        Json(state.presenter.offer_preview(&offer, true)),
    ))
}

/// DELETE /api/offers/{id}/favorite
async fn remove_favorite(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(raw_id): Path<String>,
) -> AppResult<Json<OfferPreview>> {
    let offer_id = parse_id(&raw_id, "offer")?;
    let conn = state.db.get()?;

    let offer = offers::find(&conn, offer_id)?
        .ok_or_else(|| AppError::not_found("Offer not found"))?;
    favorites::remove(&conn, user.id(), offer_id)?;
    tracing::debug!("User {} unfavorited offer {}", user.id(), offer_id);

    Ok(Json(state.presenter.offer_preview(&offer, false)))
}
