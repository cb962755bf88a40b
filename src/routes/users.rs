use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::adapters::UserView;
use crate::auth::password;
use crate::db::models::NewUser;
use crate::db::users::{self, Duplicate};
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::routes::parse_id;
use crate::state::AppState;
use crate::uploads::{self, DEFAULT_AVATAR};
use crate::validation;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/register", post(register))
        .route("/users/login", get(check_auth).post(login))
        .route("/users/logout", delete(logout))
        .route("/users/{id}", get(get_user))
}

// -- Request/response types --

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub message: &'static str,
    pub user: UserView,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub user: UserView,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthCheckResponse {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub avatar_url: String,
    pub is_pro: bool,
    pub token: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

// -- Handlers --

/// POST /api/users/register (multipart, optional `avatar` file)
async fn register(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    let multipart = multipart.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let mut form = uploads::read_form(multipart, &state.avatar_upload_policy()).await?;
    let registration = validation::validate_registration(&form.fields)?;
    let avatar_file = form.take_file("avatar");

    {
        let conn = state.db.get()?;
        if users::email_taken(&conn, &registration.email)? {
            return Err(duplicate_conflict(Duplicate::Email));
        }
        if users::username_taken(&conn, &registration.username)? {
            return Err(duplicate_conflict(Duplicate::Username));
        }
    }

    let cost = state.config.auth.bcrypt_cost;
    let plaintext = registration.password.clone();
    let password_hash =
        tokio::task::spawn_blocking(move || password::hash_password(&plaintext, cost))
            .await
            .map_err(|e| AppError::Internal(format!("hashing task failed: {e}")))??;

    let avatar = match &avatar_file {
        Some(file) => state.media.save(file).await?,
        None => DEFAULT_AVATAR.to_string(),
    };

    let new_user = NewUser {
        username: registration.username,
        email: registration.email,
        password_hash,
        user_type: registration.user_type,
        avatar: avatar.clone(),
    };

    let user = match insert_user(&state, &new_user) {
        Ok(user) => user,
        Err(e) => {
            if avatar_file.is_some() {
                state.media.discard(&[avatar]).await;
            }
            return Err(e);
        }
    };
    tracing::info!("Registered user {} ({})", user.id, user.email);

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully",
            user: state.presenter.user(&user),
        }),
    ))
}

fn insert_user(state: &AppState, new_user: &NewUser) -> AppResult<crate::db::models::User> {
    let conn = state.db.get()?;
    // A concurrent registration can still win the unique index.
    let id = users::insert(&conn, new_user).map_err(|e| match users::duplicate_of(&e) {
        Some(dup) => duplicate_conflict(dup),
        None => AppError::Database(e),
    })?;
    users::find_by_id(&conn, id)?
        .ok_or_else(|| AppError::Internal(format!("user {id} vanished after insert")))
}

fn duplicate_conflict(dup: Duplicate) -> AppError {
    let message = match dup {
        Duplicate::Email => "A user with this email already exists",
        Duplicate::Username => "A user with this username already exists",
    };
    AppError::Conflict(message.into())
}

/// POST /api/users/login
async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<TokenResponse>> {
    let Json(req) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let invalid = || AppError::BadRequest("Invalid email or password".into());

    let email = req
        .email
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .ok_or_else(invalid)?;
    let plaintext = req.password.filter(|p| !p.is_empty()).ok_or_else(invalid)?;

    let user = {
        let conn = state.db.get()?;
        users::find_by_email(&conn, &email)?
    };
    let Some(user) = user else {
        tracing::debug!("Login for unknown email {}", email);
        return Err(invalid());
    };

    let hash = user.password_hash.clone();
    let matches = tokio::task::spawn_blocking(move || password::verify_password(&plaintext, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("hashing task failed: {e}")))?;
    if !matches {
        tracing::debug!("Wrong password for user {}", user.id);
        return Err(invalid());
    }

    let token = state.tokens.issue(user.id)?;
    tracing::info!("User {} logged in", user.id);
    Ok(Json(TokenResponse { token }))
}

/// GET /api/users/login: validates the bearer token and returns a fresh one
/// carrying the caller's profile.
async fn check_auth(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<AuthCheckResponse>> {
    let token = state.tokens.issue_with_profile(&user)?;
    let view = state.presenter.user(&user);
    Ok(Json(AuthCheckResponse {
        id: view.id,
        email: view.email,
        username: view.username,
        avatar_url: view.avatar_url,
        is_pro: view.is_pro,
        token,
    }))
}

/// DELETE /api/users/logout
///
/// Tokens are stateless; the client drops its own. Always succeeds.
async fn logout(user: MaybeUser) -> Json<MessageResponse> {
    if let Some(id) = user.id() {
        tracing::debug!("User {} logged out", id);
    }
    Json(MessageResponse {
        message: "Logged out successfully",
    })
}

/// GET /api/users/{id}
async fn get_user(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> AppResult<Json<UserResponse>> {
    let id = parse_id(&raw_id, "user")?;
    let conn = state.db.get()?;
    let user = users::find_by_id(&conn, id)?.ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(Json(UserResponse {
        user: state.presenter.user(&user),
    }))
}
