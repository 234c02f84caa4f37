use axum::{
    Extension, Json,
    extract::{Path, State, rejection::{JsonRejection, PathRejection}},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use solace_types::api::{Claims, SendMessageRequest, StatusMessage};

use crate::error::ApiError;
use crate::state::AppState;

// A path id that is not a UUID cannot name any chat.
fn chat_id(path: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, ApiError> {
    path.map(|Path(id)| id).map_err(|_| ApiError::NotFound("Chat"))
}

pub async fn list_chats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.chats.list_chats(claims.sub).await?))
}

pub async fn create_chat(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let chat = state.chats.create_chat(claims.sub).await?;
    Ok((StatusCode::CREATED, Json(chat)))
}

pub async fn get_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let chat_id = chat_id(path)?;
    Ok(Json(state.chats.list_messages(chat_id, claims.sub).await?))
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let chat_id = chat_id(path)?;
    let Json(req) = payload?;
    Ok(Json(state.chats.post_message(chat_id, claims.sub, req.content).await?))
}

pub async fn delete_chat(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let chat_id = chat_id(path)?;
    state.chats.delete_chat(chat_id, claims.sub).await?;
    Ok(Json(StatusMessage::new("Chat deleted successfully")))
}
