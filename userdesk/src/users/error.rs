// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::types::StoreError;
use crate::access::Action;
use crate::session::SessionError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

/// Every failure a user route can surface. All of them end up on the error page.
#[derive(Debug)]
pub enum UserRouteError {
    Forbidden { action: Action, safe: String },
    NotFound { message: String, safe: String },
    Invalid { message: String, safe: String },
    /// The form token did not match the signed-in session.
    StaleForm { safe: String },
    StoreFailure(StoreError),
}

/// What the error page is given to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPayload {
    pub message: String,
    pub status: u16,
    pub safe: String,
}

const DEFAULT_SAFE: &str = "/";

impl UserRouteError {
    pub fn status(&self) -> StatusCode {
        match self {
            UserRouteError::Forbidden { .. } | UserRouteError::StaleForm { .. } => {
                StatusCode::FORBIDDEN
            }
            UserRouteError::NotFound { .. } => StatusCode::NOT_FOUND,
            UserRouteError::Invalid { .. } => StatusCode::BAD_REQUEST,
            UserRouteError::StoreFailure(StoreError::DuplicateEmail(_)) => StatusCode::CONFLICT,
            UserRouteError::StoreFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn safe(&self) -> &str {
        match self {
            UserRouteError::Forbidden { safe, .. }
            | UserRouteError::NotFound { safe, .. }
            | UserRouteError::Invalid { safe, .. }
            | UserRouteError::StaleForm { safe } => safe,
            UserRouteError::StoreFailure(_) => DEFAULT_SAFE,
        }
    }

    /// User-facing text. Store internals are not exposed except for duplicate emails.
    pub fn message(&self) -> String {
        match self {
            UserRouteError::Forbidden { action, .. } => {
                format!("You do not have permission to {} users.", action)
            }
            UserRouteError::NotFound { message, .. } | UserRouteError::Invalid { message, .. } => {
                message.clone()
            }
            UserRouteError::StaleForm { .. } => {
                "This form has expired. Reload the page and try again.".to_string()
            }
            UserRouteError::StoreFailure(err @ StoreError::DuplicateEmail(_)) => err.to_string(),
            UserRouteError::StoreFailure(_) => {
                "The user store could not complete the request.".to_string()
            }
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            message: self.message(),
            status: self.status().as_u16(),
            safe: self.safe().to_string(),
        }
    }
}

impl std::fmt::Display for UserRouteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRouteError::Forbidden { action, .. } => write!(f, "Forbidden: {} users", action),
            UserRouteError::NotFound { message, .. } => write!(f, "Not found: {}", message),
            UserRouteError::Invalid { message, .. } => write!(f, "Invalid input: {}", message),
            UserRouteError::StaleForm { .. } => write!(f, "Stale or missing form token"),
            UserRouteError::StoreFailure(err) => write!(f, "Store failure: {}", err),
        }
    }
}

impl std::error::Error for UserRouteError {}

impl From<StoreError> for UserRouteError {
    fn from(err: StoreError) -> Self {
        UserRouteError::StoreFailure(err)
    }
}

impl From<SessionError> for UserRouteError {
    fn from(err: SessionError) -> Self {
        UserRouteError::StoreFailure(StoreError::Unavailable(err.to_string()))
    }
}

impl ResponseError for UserRouteError {
    fn status_code(&self) -> StatusCode {
        self.status()
    }

    // Plain body; the error page handler replaces it with the rendered page.
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status())
            .content_type("text/plain; charset=utf-8")
            .body(self.message())
    }
}
