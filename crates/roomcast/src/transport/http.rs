// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for rooms, history and presence.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::error::BrokerError;
use crate::model::{Identity, UserSummary};
use crate::state::AppState;

// -- Request/Response types ---------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub sessions: usize,
    pub rooms: usize,
}

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub since_id: Option<u64>,
    #[serde(default)]
    pub limit: Option<usize>,
}

fn error_response(code: BrokerError) -> Response {
    code.to_http_response(code.message()).into_response()
}

// -- Handlers -----------------------------------------------------------------

/// `GET /api/health`
pub async fn health(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "running".to_owned(),
        sessions: s.broker.session_count(),
        rooms: s.broker.room_count(),
    })
}

/// `GET /api/profile`
pub async fn profile(Extension(identity): Extension<Identity>) -> impl IntoResponse {
    Json(UserSummary { user_id: identity.user_id, username: identity.username })
}

/// `GET /api/chat/rooms`
pub async fn list_rooms(State(s): State<Arc<AppState>>) -> Response {
    match s.broker.list_rooms() {
        Ok(rooms) => Json(rooms).into_response(),
        Err(code) => error_response(code),
    }
}

/// `POST /api/chat/rooms`
pub async fn create_room(
    State(s): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreateRoomRequest>,
) -> Response {
    match s.broker.create_room(&req.name, &req.description) {
        Ok(room) => {
            tracing::debug!(room_id = %room.id, user_id = %identity.user_id, "created by");
            (StatusCode::CREATED, Json(room)).into_response()
        }
        Err(BrokerError::BadRequest) => BrokerError::BadRequest
            .to_http_response("room name is empty or too long")
            .into_response(),
        Err(code) => error_response(code),
    }
}

/// `GET /api/chat/rooms/{id}`
pub async fn get_room(State(s): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match s.broker.get_room(&id) {
        Ok(room) => Json(room).into_response(),
        Err(code) => error_response(code),
    }
}

/// `GET /api/chat/rooms/{id}/messages`
pub async fn room_messages(
    State(s): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(q): Query<HistoryQuery>,
) -> Response {
    match s.broker.history(&id, q.since_id, q.limit).await {
        Ok(messages) => Json(messages).into_response(),
        Err(code) => error_response(code),
    }
}

/// `GET /api/chat/rooms/{id}/online`
pub async fn room_online(State(s): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match s.broker.online_users(&id).await {
        Ok(snapshot) => Json(snapshot.online).into_response(),
        Err(code) => error_response(code),
    }
}
