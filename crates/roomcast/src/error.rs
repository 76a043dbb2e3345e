// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::frame::ServerFrame;

/// Error codes shared by the broker core and both transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrokerError {
    Unauthorized,
    BadRequest,
    RoomNotFound,
    SessionNotFound,
    InvalidMessage,
    ChannelClosed,
    DuplicateName,
    Internal,
}

impl BrokerError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::BadRequest => 400,
            Self::RoomNotFound => 404,
            Self::SessionNotFound => 404,
            Self::InvalidMessage => 422,
            Self::ChannelClosed => 410,
            Self::DuplicateName => 409,
            Self::Internal => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::BadRequest => "BAD_REQUEST",
            Self::RoomNotFound => "ROOM_NOT_FOUND",
            Self::SessionNotFound => "SESSION_NOT_FOUND",
            Self::InvalidMessage => "INVALID_MESSAGE",
            Self::ChannelClosed => "CHANNEL_CLOSED",
            Self::DuplicateName => "DUPLICATE_NAME",
            Self::Internal => "INTERNAL",
        }
    }

    /// Default human-readable message for this code.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::BadRequest => "bad request",
            Self::RoomNotFound => "room not found",
            Self::SessionNotFound => "session not found",
            Self::InvalidMessage => "invalid message",
            Self::ChannelClosed => "channel closed",
            Self::DuplicateName => "room name already taken",
            Self::Internal => "internal error",
        }
    }

    pub fn to_error_body(&self, message: impl Into<String>) -> ErrorBody {
        ErrorBody { code: self.as_str().to_owned(), message: message.into() }
    }

    pub fn to_http_response(
        &self,
        message: impl Into<String>,
    ) -> (StatusCode, Json<ErrorResponse>) {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse { error: self.to_error_body(message) };
        (status, Json(body))
    }

    /// Structured error frame for an open WebSocket connection.
    pub fn to_frame(&self, message: impl Into<String>) -> ServerFrame {
        ServerFrame::Error { code: self.as_str().to_owned(), message: message.into() }
    }
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::error::Error for BrokerError {}

/// Top-level error response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error body with machine-readable code and human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
